//! The authenticated actor behind a request.

use std::collections::BTreeSet;

use libsql::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::permission::{ActionSet, Role, allowed_actions};

/// Identifier of a user account.
pub type UserId = Uuid;

/// An authenticated user together with its staff flag and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// A non-staff principal without roles.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_staff: false,
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Actions available before ownership is considered.
    pub fn allowed_actions(&self) -> ActionSet {
        if self.is_staff {
            ActionSet::ALL
        } else {
            allowed_actions(&self.roles)
        }
    }
}

/// Load the principal for `id`, with its current roles.
///
/// Returns `None` when no such user exists. Role rows naming unknown
/// groups are ignored.
pub async fn load(conn: &Connection, id: UserId) -> crate::Result<Option<Principal>> {
    let mut rows = conn
        .query(
            "SELECT username, is_staff FROM users WHERE id = ?1",
            libsql::params![id.to_string()],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let username: String = row.get(0)?;
    let is_staff = db::bool_at(&row, 1)?;

    let mut principal = Principal::new(id, username);
    principal.is_staff = is_staff;
    principal.roles = crate::roles::of_user(conn, id).await?;
    Ok(Some(principal))
}
