//! Role groups: bootstrap and membership.

use std::collections::BTreeSet;

use libsql::Connection;
use tracing::{debug, info};

use crate::permission::Role;
use crate::principal::UserId;

/// Ensure the `Viewer`, `Editor` and `Admin` groups exist.
///
/// Idempotent: existing groups are left untouched. Returns the roles that
/// were created by this call.
pub async fn seed(conn: &Connection) -> crate::Result<Vec<Role>> {
    let mut created = Vec::new();
    for role in Role::ALL {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO roles (name) VALUES (?1)",
                libsql::params![role.name()],
            )
            .await?;
        if inserted > 0 {
            info!(%role, "created role");
            created.push(role);
        } else {
            debug!(%role, "role already exists");
        }
    }
    Ok(created)
}

/// Names of every stored role group, including ones unknown to this build.
pub async fn names(conn: &Connection) -> crate::Result<Vec<String>> {
    let mut rows = conn
        .query("SELECT name FROM roles ORDER BY name", ())
        .await?;
    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

/// Roles currently held by `user`.
pub async fn of_user(conn: &Connection, user: UserId) -> crate::Result<BTreeSet<Role>> {
    let mut rows = conn
        .query(
            "SELECT role FROM user_roles WHERE user_id = ?1",
            libsql::params![user.to_string()],
        )
        .await?;
    let mut roles = BTreeSet::new();
    while let Some(row) = rows.next().await? {
        let name: String = row.get(0)?;
        if let Ok(role) = name.parse::<Role>() {
            roles.insert(role);
        }
    }
    Ok(roles)
}

/// Replace the role set of `user`.
///
/// The role groups must have been seeded; assigning to a missing group
/// fails on the foreign key.
pub async fn assign(conn: &Connection, user: UserId, roles: &[Role]) -> crate::Result<()> {
    let tx = conn.transaction().await?;
    tx.execute(
        "DELETE FROM user_roles WHERE user_id = ?1",
        libsql::params![user.to_string()],
    )
    .await?;
    for role in roles {
        tx.execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
            libsql::params![user.to_string(), role.name()],
        )
        .await?;
    }
    tx.commit().await?;
    info!(%user, ?roles, "assigned roles");
    Ok(())
}
