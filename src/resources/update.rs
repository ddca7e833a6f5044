//! Narrative updates posted about a family member.
//!
//! An update is owned by its author. Once the author's account is deleted
//! the update has no owner, so only staff can reach it.

use jiff::Timestamp;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::nullable;
use super::{Member, Resource, require_text};
use crate::guard::MutationGuard;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::principal::UserId;
use crate::router::Router;
use crate::{Error, Module, Result, db};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    pub id: Uuid,
    pub member: Uuid,
    pub content: String,
    /// Location of an attached image, if any.
    pub media: Option<String>,
    pub created_by: Option<UserId>,
    pub posted_at: Timestamp,
}

impl OwnershipResolvable for Update {
    const KIND: &'static str = "update";

    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().created_by(self.created_by)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewUpdate {
    pub member: Uuid,
    pub content: String,
    #[serde(default)]
    pub media: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatch {
    pub member: Option<Uuid>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub media: Option<Option<String>>,
}

/// The member an update is (or will be) attached to.
pub(crate) async fn parent_member(conn: &Connection, id: Uuid) -> Result<Member> {
    super::fetch::<Member>(conn, id)
        .await?
        .ok_or_else(|| Error::BadRequest(format!("Unknown member {id}")))
}

impl Resource for Update {
    const PATH: &'static str = "/api/updates";
    const TABLE: &'static str = "updates";
    const SELECT: &'static str = "SELECT r.id, r.member_id, r.content, r.media, r.created_by, \
         r.posted_at \
         FROM updates r JOIN members m ON m.id = r.member_id";
    const OWNER: &'static str = "r.created_by";
    const SEARCH: &'static [&'static str] = &["r.content", "m.first_name", "m.last_name"];
    const ORDERING: &'static [(&'static str, &'static str)] = &[("timestamp", "r.posted_at")];
    const DEFAULT_ORDER: &'static str = "r.posted_at DESC";

    type New = NewUpdate;
    type Patch = UpdatePatch;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Update {
            id: db::uuid_at(row, 0)?,
            member: db::uuid_at(row, 1)?,
            content: row.get(2)?,
            media: row.get(3)?,
            created_by: db::opt_uuid_at(row, 4)?,
            posted_at: db::timestamp_at(row, 5)?,
        })
    }

    async fn insert(conn: &Connection, guard: &MutationGuard<'_>, input: NewUpdate) -> Result<Self> {
        require_text("content", &input.content)?;
        let member = parent_member(conn, input.member).await?;
        guard.create_under(&member)?;

        let update = Update {
            id: Uuid::new_v4(),
            member: member.id,
            content: input.content,
            media: input.media,
            created_by: Some(guard.stamp()),
            posted_at: Timestamp::now(),
        };
        conn.execute(
            "INSERT INTO updates (id, member_id, content, media, created_by, posted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            libsql::params![
                update.id.to_string(),
                update.member.to_string(),
                update.content.clone(),
                update.media.clone(),
                db::opt_text(update.created_by),
                db::timestamp_text(update.posted_at),
            ],
        )
        .await?;
        Ok(update)
    }

    async fn patch(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: UpdatePatch,
    ) -> Result<Self> {
        if let Some(member_id) = patch.member
            && member_id != existing.member
        {
            let member = parent_member(conn, member_id).await?;
            guard.relocate(&member)?;
            existing.member = member.id;
        }
        if let Some(content) = patch.content {
            require_text("content", &content)?;
            existing.content = content;
        }
        if let Some(media) = patch.media {
            existing.media = media;
        }
        conn.execute(
            "UPDATE updates SET member_id = ?2, content = ?3, media = ?4 WHERE id = ?1",
            libsql::params![
                existing.id.to_string(),
                existing.member.to_string(),
                existing.content.clone(),
                existing.media.clone(),
            ],
        )
        .await?;
        Ok(existing)
    }
}

pub struct UpdatesModule;

impl Module for UpdatesModule {
    fn name(&self) -> &'static str {
        "updates"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<Update>(router);
    }
}
