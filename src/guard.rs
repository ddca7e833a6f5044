//! Ownership checks at the point of mutation.
//!
//! These run inside the request's transaction, against the record state
//! fetched there, independently of the object gate that already ran. Some
//! mutations change which owner a record resolves to (moving a member to
//! another tree), so both the current and the new anchor are checked.

use tracing::{debug, warn};

use crate::ownership::OwnershipResolvable;
use crate::permission::Denial;
use crate::principal::{Principal, UserId};

/// Mutation checks bound to the acting principal.
#[derive(Debug, Clone, Copy)]
pub struct MutationGuard<'p> {
    principal: &'p Principal,
}

impl<'p> MutationGuard<'p> {
    pub fn new(principal: &'p Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &'p Principal {
        self.principal
    }

    /// Value for a new record's ownership anchor.
    ///
    /// Always the acting principal; never taken from request input.
    pub fn stamp(&self) -> UserId {
        self.principal.id
    }

    /// A new record is about to be attached to `parent`.
    pub fn create_under<P: OwnershipResolvable>(&self, parent: &P) -> Result<(), Denial> {
        self.require_owner(parent, "create under")
    }

    /// `existing` (as stored, before changes) is about to be updated.
    pub fn update<R: OwnershipResolvable>(&self, existing: &R) -> Result<(), Denial> {
        self.require_owner(existing, "update")
    }

    /// An update moves a record onto `new_parent`.
    pub fn relocate<P: OwnershipResolvable>(&self, new_parent: &P) -> Result<(), Denial> {
        self.require_owner(new_parent, "move into")
    }

    /// `existing` is about to be deleted.
    pub fn delete<R: OwnershipResolvable>(&self, existing: &R) -> Result<(), Denial> {
        self.require_owner(existing, "delete")
    }

    fn require_owner<R: OwnershipResolvable>(&self, record: &R, what: &str) -> Result<(), Denial> {
        if self.principal.is_staff {
            return Ok(());
        }
        let owner = record.owner();
        if owner == Some(self.principal.id) {
            debug!(user = %self.principal.id, resource = R::KIND, what, "mutation guard passed");
            Ok(())
        } else {
            warn!(
                user = %self.principal.id,
                resource = R::KIND,
                owner = ?owner,
                what,
                "mutation guard denied"
            );
            Err(Denial::NotOwner { resource: R::KIND })
        }
    }
}
