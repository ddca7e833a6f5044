//! Dated events in a member's life (births, marriages, moves).

use jiff::civil::Date;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::update::parent_member;
use super::{Resource, require_text};
use crate::guard::MutationGuard;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::principal::UserId;
use crate::router::Router;
use crate::{Module, Result, db};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEvent {
    pub id: Uuid,
    pub member: Uuid,
    pub event_type: String,
    pub description: String,
    pub date: Date,
    #[serde(skip)]
    pub member_tree_owner: UserId,
}

impl OwnershipResolvable for HistoryEvent {
    const KIND: &'static str = "history event";

    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().member(self.member_tree_owner)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewHistoryEvent {
    pub member: Uuid,
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    pub date: Date,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryEventPatch {
    pub member: Option<Uuid>,
    pub event_type: Option<String>,
    pub description: Option<String>,
    pub date: Option<Date>,
}

impl Resource for HistoryEvent {
    const PATH: &'static str = "/api/historyevents";
    const TABLE: &'static str = "history_events";
    const SELECT: &'static str = "SELECT r.id, r.member_id, r.event_type, r.description, r.date, \
         t.created_by \
         FROM history_events r JOIN members m ON m.id = r.member_id \
         JOIN trees t ON t.id = m.tree_id";
    const OWNER: &'static str = "t.created_by";
    const SEARCH: &'static [&'static str] = &["r.event_type", "m.first_name", "m.last_name"];
    const ORDERING: &'static [(&'static str, &'static str)] = &[("date", "r.date")];
    const DEFAULT_ORDER: &'static str = "r.date";

    type New = NewHistoryEvent;
    type Patch = HistoryEventPatch;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(HistoryEvent {
            id: db::uuid_at(row, 0)?,
            member: db::uuid_at(row, 1)?,
            event_type: row.get(2)?,
            description: row.get(3)?,
            date: db::date_at(row, 4)?,
            member_tree_owner: db::uuid_at(row, 5)?,
        })
    }

    async fn insert(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        input: NewHistoryEvent,
    ) -> Result<Self> {
        require_text("event_type", &input.event_type)?;
        let member = parent_member(conn, input.member).await?;
        guard.create_under(&member)?;

        let event = HistoryEvent {
            id: Uuid::new_v4(),
            member: member.id,
            event_type: input.event_type,
            description: input.description,
            date: input.date,
            member_tree_owner: member.tree_owner,
        };
        conn.execute(
            "INSERT INTO history_events (id, member_id, event_type, description, date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                event.id.to_string(),
                event.member.to_string(),
                event.event_type.clone(),
                event.description.clone(),
                event.date.to_string(),
            ],
        )
        .await?;
        Ok(event)
    }

    async fn patch(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: HistoryEventPatch,
    ) -> Result<Self> {
        if let Some(member_id) = patch.member
            && member_id != existing.member
        {
            let member = parent_member(conn, member_id).await?;
            guard.relocate(&member)?;
            existing.member = member.id;
            existing.member_tree_owner = member.tree_owner;
        }
        if let Some(event_type) = patch.event_type {
            require_text("event_type", &event_type)?;
            existing.event_type = event_type;
        }
        if let Some(description) = patch.description {
            existing.description = description;
        }
        if let Some(date) = patch.date {
            existing.date = date;
        }
        conn.execute(
            "UPDATE history_events SET member_id = ?2, event_type = ?3, description = ?4, \
             date = ?5 WHERE id = ?1",
            libsql::params![
                existing.id.to_string(),
                existing.member.to_string(),
                existing.event_type.clone(),
                existing.description.clone(),
                existing.date.to_string(),
            ],
        )
        .await?;
        Ok(existing)
    }
}

pub struct HistoryModule;

impl Module for HistoryModule {
    fn name(&self) -> &'static str {
        "history"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<HistoryEvent>(router);
    }
}
