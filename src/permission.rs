//! Role and ownership gates evaluated for every API call.
//!
//! Two independent checks decide whether a request may proceed:
//!
//! - [`RoleActionPermission`] runs before any record is loaded and compares the
//!   attempted [`Action`] with the actions the principal's roles grant.
//! - [`IsOwnerOrStaff`] runs once a concrete record has been fetched and
//!   compares the record's resolved owner with the principal.
//!
//! Staff principals pass both gates unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use racine::permission::{Action, IsOwnerOrStaff, RoleActionPermission};
//!
//! let principal = RoleActionPermission::check(ctx_principal.as_ref(), Action::Update)?;
//! let tree = resources::fetch::<Tree>(&conn, id).await?.ok_or(not_found)?;
//! IsOwnerOrStaff::check(Some(principal), &tree)?;
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use hyper::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ownership::OwnershipResolvable;
use crate::principal::Principal;

/// What a request attempts to do, independent of the object it touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Map an HTTP method onto an action.
    ///
    /// Safe methods (GET, HEAD, OPTIONS) read; POST creates; PUT and PATCH
    /// update; DELETE deletes. Anything else has no action.
    pub fn from_method(method: &Method) -> Option<Action> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Some(Action::Read),
            Method::POST => Some(Action::Create),
            Method::PUT | Method::PATCH => Some(Action::Update),
            Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Action::Read => 1,
            Action::Create => 1 << 1,
            Action::Update => 1 << 2,
            Action::Delete => 1 << 3,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// A set of actions, stored as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const EMPTY: ActionSet = ActionSet(0);
    pub const READ_ONLY: ActionSet = ActionSet(Action::Read.bit());
    pub const READ_WRITE: ActionSet =
        ActionSet(Action::Read.bit() | Action::Create.bit() | Action::Update.bit());
    pub const ALL: ActionSet = ActionSet(
        Action::Read.bit() | Action::Create.bit() | Action::Update.bit() | Action::Delete.bit(),
    );

    pub const fn contains(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub const fn union(self, other: ActionSet) -> ActionSet {
        ActionSet(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = [Action::Read, Action::Create, Action::Update, Action::Delete];
        f.debug_set()
            .entries(actions.into_iter().filter(|a| self.contains(*a)))
            .finish()
    }
}

/// Named permission bundle a principal may hold zero or more of.
///
/// Roles are stored as independent groups but grant cumulative actions:
/// Admin ⊇ Editor ⊇ Viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    /// Every role, in seeding order.
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Editor, Role::Admin];

    pub const fn name(self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
        }
    }

    /// Actions this role grants on its own.
    pub const fn allowed(self) -> ActionSet {
        match self {
            Role::Viewer => ActionSet::READ_ONLY,
            Role::Editor => ActionSet::READ_WRITE,
            Role::Admin => ActionSet::ALL,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Actions granted to a principal that holds no role at all.
///
/// Role absence is not a lockout: such principals get the Editor set.
pub const DEFAULT_ACTIONS: ActionSet = Role::Editor.allowed();

/// Union of the actions granted by `roles`, falling back to
/// [`DEFAULT_ACTIONS`] when the union is empty.
pub fn allowed_actions(roles: &BTreeSet<Role>) -> ActionSet {
    let allowed = roles
        .iter()
        .fold(ActionSet::EMPTY, |acc, role| acc.union(role.allowed()));
    if allowed.is_empty() {
        DEFAULT_ACTIONS
    } else {
        allowed
    }
}

/// Why an authorization check denied a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// No authenticated principal is attached to the request.
    #[error("Unauthorized")]
    Unauthenticated,

    /// The principal's roles do not grant the attempted action.
    #[error("Forbidden: role does not permit {action}")]
    MethodNotPermitted { action: Action },

    /// The record resolves to another owner, or to none.
    #[error("Forbidden: not the owner of this {resource}")]
    NotOwner { resource: &'static str },
}

/// Request-level gate mapping roles to permitted actions.
pub struct RoleActionPermission;

impl RoleActionPermission {
    /// Check that `principal` may attempt `action` at all.
    ///
    /// Returns the authenticated principal so callers continue with a value
    /// that has passed the gate.
    pub fn check(principal: Option<&Principal>, action: Action) -> Result<&Principal, Denial> {
        let Some(principal) = principal else {
            debug!(%action, "request has no principal");
            return Err(Denial::Unauthenticated);
        };
        if principal.is_staff {
            return Ok(principal);
        }

        let allowed = allowed_actions(&principal.roles);
        if allowed.contains(action) {
            debug!(user = %principal.id, %action, ?allowed, "role gate passed");
            Ok(principal)
        } else {
            warn!(user = %principal.id, %action, ?allowed, "action not permitted for role");
            Err(Denial::MethodNotPermitted { action })
        }
    }
}

/// Object-level gate: staff, or the record's resolved owner.
pub struct IsOwnerOrStaff;

impl IsOwnerOrStaff {
    /// Check that `principal` may act on `record`.
    pub fn check<R>(principal: Option<&Principal>, record: &R) -> Result<(), Denial>
    where
        R: OwnershipResolvable + ?Sized,
    {
        let Some(principal) = principal else {
            return Err(Denial::Unauthenticated);
        };
        if principal.is_staff {
            return Ok(());
        }

        match record.owner() {
            Some(owner) if owner == principal.id => Ok(()),
            owner => {
                warn!(
                    user = %principal.id,
                    resource = R::KIND,
                    owner = ?owner,
                    "principal does not own record"
                );
                Err(Denial::NotOwner { resource: R::KIND })
            }
        }
    }
}
