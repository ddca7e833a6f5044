//! Family trees. A tree is owned by the user who created it.

use jiff::Timestamp;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Resource, require_text};
use crate::guard::MutationGuard;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::principal::UserId;
use crate::router::Router;
use crate::{Module, Result, db};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    pub id: Uuid,
    pub name: String,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

impl OwnershipResolvable for Tree {
    const KIND: &'static str = "tree";

    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().created_by(self.created_by)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewTree {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreePatch {
    pub name: Option<String>,
}

impl Resource for Tree {
    const PATH: &'static str = "/api/trees";
    const TABLE: &'static str = "trees";
    const SELECT: &'static str = "SELECT r.id, r.name, r.created_by, r.created_at \
         FROM trees r LEFT JOIN users u ON u.id = r.created_by";
    const OWNER: &'static str = "r.created_by";
    const SEARCH: &'static [&'static str] = &["r.name", "u.username"];
    const ORDERING: &'static [(&'static str, &'static str)] =
        &[("name", "r.name"), ("created_at", "r.created_at")];
    const DEFAULT_ORDER: &'static str = "r.created_at";

    type New = NewTree;
    type Patch = TreePatch;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Tree {
            id: db::uuid_at(row, 0)?,
            name: row.get(1)?,
            created_by: db::uuid_at(row, 2)?,
            created_at: db::timestamp_at(row, 3)?,
        })
    }

    async fn insert(conn: &Connection, guard: &MutationGuard<'_>, input: NewTree) -> Result<Self> {
        require_text("name", &input.name)?;
        let tree = Tree {
            id: Uuid::new_v4(),
            name: input.name,
            created_by: guard.stamp(),
            created_at: Timestamp::now(),
        };
        conn.execute(
            "INSERT INTO trees (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
            libsql::params![
                tree.id.to_string(),
                tree.name.clone(),
                tree.created_by.to_string(),
                db::timestamp_text(tree.created_at),
            ],
        )
        .await?;
        Ok(tree)
    }

    async fn patch(
        conn: &Connection,
        _guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: TreePatch,
    ) -> Result<Self> {
        if let Some(name) = patch.name {
            require_text("name", &name)?;
            existing.name = name;
        }
        conn.execute(
            "UPDATE trees SET name = ?2 WHERE id = ?1",
            libsql::params![existing.id.to_string(), existing.name.clone()],
        )
        .await?;
        Ok(existing)
    }
}

pub struct TreesModule;

impl Module for TreesModule {
    fn name(&self) -> &'static str {
        "trees"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<Tree>(router);
        router.get("/api/trees/{id}/members", super::member::list_for_tree);
    }
}
