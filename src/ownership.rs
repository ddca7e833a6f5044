//! Ownership resolution and list scoping.
//!
//! Every record resolves to at most one owning principal through a fixed
//! chain of links, checked in priority order (first match wins):
//!
//! 1. the record's own `created_by`; a record that carries this link is
//!    owned by its creator or by nobody, never by a later link
//! 2. its tree's `created_by`
//! 3. its member's tree's `created_by`
//! 4. its `target_user`
//! 5. its `user`
//!
//! A record type describes which of these links it carries by implementing
//! [`OwnershipResolvable`]; the gates never inspect record fields directly.

use uuid::Uuid;

use crate::principal::{Principal, UserId};

/// Which link of the chain produced an owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    CreatedBy,
    Tree,
    Member,
    TargetUser,
    User,
}

/// The ownership-carrying links of one record.
///
/// Built with the chained setters; unset links are skipped during resolution.
/// `created_by` is the exception: once declared it ends the chain, even when
/// the creator is gone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OwnershipChain {
    created_by: Option<Option<UserId>>,
    tree: Option<UserId>,
    member: Option<UserId>,
    target_user: Option<UserId>,
    user: Option<UserId>,
}

impl OwnershipChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record's direct creator. `None` means the record has a creator
    /// field but the creator no longer exists.
    pub fn created_by(mut self, creator: impl Into<Option<UserId>>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    /// Creator of the tree the record belongs to.
    pub fn tree(mut self, tree_creator: impl Into<Option<UserId>>) -> Self {
        self.tree = tree_creator.into();
        self
    }

    /// Creator of the tree of the member the record belongs to.
    pub fn member(mut self, member_tree_creator: impl Into<Option<UserId>>) -> Self {
        self.member = member_tree_creator.into();
        self
    }

    pub fn target_user(mut self, user: impl Into<Option<UserId>>) -> Self {
        self.target_user = user.into();
        self
    }

    pub fn user(mut self, user: impl Into<Option<UserId>>) -> Self {
        self.user = user.into();
        self
    }

    /// Resolve the owner and the link it came from.
    pub fn resolve(&self) -> Option<(Link, UserId)> {
        if let Some(creator) = self.created_by {
            return creator.map(|id| (Link::CreatedBy, id));
        }
        [
            (Link::Tree, self.tree),
            (Link::Member, self.member),
            (Link::TargetUser, self.target_user),
            (Link::User, self.user),
        ]
        .into_iter()
        .find_map(|(link, owner)| owner.map(|id| (link, id)))
    }

    pub fn owner(&self) -> Option<UserId> {
        self.resolve().map(|(_, id)| id)
    }
}

/// Capability of every record type that participates in ownership.
pub trait OwnershipResolvable {
    /// Short resource name used in denial messages.
    const KIND: &'static str;

    /// The record's ownership links.
    fn ownership(&self) -> OwnershipChain;

    /// The resolved owner, if any link is present.
    fn owner(&self) -> Option<UserId> {
        self.ownership().owner()
    }

    fn is_owned_by(&self, user: UserId) -> bool {
        self.owner() == Some(user)
    }
}

/// Which records a list operation may return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Unfiltered (staff).
    All,
    /// Only records whose owner resolves to this user.
    OwnedBy(UserId),
}

impl Scope {
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_staff {
            Scope::All
        } else {
            Scope::OwnedBy(principal.id)
        }
    }

    /// The owner a query must filter on, or `None` when unfiltered.
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Scope::All => None,
            Scope::OwnedBy(id) => Some(*id),
        }
    }

    /// Whether a loaded record falls inside this scope.
    pub fn admits<R: OwnershipResolvable + ?Sized>(&self, record: &R) -> bool {
        match self {
            Scope::All => true,
            Scope::OwnedBy(id) => record.is_owned_by(*id),
        }
    }
}
