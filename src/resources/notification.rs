//! Notifications addressed to a user about a family member.

use std::fmt;

use jiff::Timestamp;
use jiff::civil::Date;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::update::parent_member;
use super::{Member, Resource};
use crate::guard::MutationGuard;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::principal::UserId;
use crate::router::Router;
use crate::{Error, Module, Result, db};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Birthday,
    Death,
    Addition,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Birthday => "Birthday",
            Kind::Death => "Death",
            Kind::Addition => "Addition",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "Birthday" => Ok(Kind::Birthday),
            "Death" => Ok(Kind::Death),
            "Addition" => Ok(Kind::Addition),
            other => Err(Error::Internal(format!("Invalid notification type {other:?}"))),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub target_user: UserId,
    pub event_date: Date,
    pub related_member: Uuid,
    pub created_at: Timestamp,
}

impl OwnershipResolvable for Notification {
    const KIND: &'static str = "notification";

    // `related_member` is not an ownership link; only the recipient owns it.
    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().target_user(self.target_user)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub event_date: Date,
    pub related_member: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationPatch {
    #[serde(rename = "type")]
    pub kind: Option<Kind>,
    pub event_date: Option<Date>,
    pub related_member: Option<Uuid>,
}

/// Store a notification produced by the server itself rather than a request.
pub(crate) async fn deliver(
    conn: &Connection,
    kind: Kind,
    target_user: UserId,
    member: &Member,
    event_date: Date,
) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        kind,
        target_user,
        event_date,
        related_member: member.id,
        created_at: Timestamp::now(),
    };
    store(conn, &notification).await?;
    tracing::info!(
        id = %notification.id,
        kind = %kind,
        target = %target_user,
        member = %member.id,
        "delivered notification"
    );
    Ok(notification)
}

async fn store(conn: &Connection, notification: &Notification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, kind, target_user, event_date, related_member, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        libsql::params![
            notification.id.to_string(),
            notification.kind.as_str(),
            notification.target_user.to_string(),
            notification.event_date.to_string(),
            notification.related_member.to_string(),
            db::timestamp_text(notification.created_at),
        ],
    )
    .await?;
    Ok(())
}

impl Resource for Notification {
    const PATH: &'static str = "/api/notifications";
    const TABLE: &'static str = "notifications";
    const SELECT: &'static str = "SELECT r.id, r.kind, r.target_user, r.event_date, \
         r.related_member, r.created_at \
         FROM notifications r JOIN members m ON m.id = r.related_member";
    const OWNER: &'static str = "r.target_user";
    const SEARCH: &'static [&'static str] = &["r.kind", "m.first_name", "m.last_name"];
    const ORDERING: &'static [(&'static str, &'static str)] = &[
        ("event_date", "r.event_date"),
        ("created_at", "r.created_at"),
    ];
    const DEFAULT_ORDER: &'static str = "r.created_at DESC";

    type New = NewNotification;
    type Patch = NotificationPatch;

    fn from_row(row: &Row) -> Result<Self> {
        let kind: String = row.get(1)?;
        Ok(Notification {
            id: db::uuid_at(row, 0)?,
            kind: Kind::parse(&kind)?,
            target_user: db::uuid_at(row, 2)?,
            event_date: db::date_at(row, 3)?,
            related_member: db::uuid_at(row, 4)?,
            created_at: db::timestamp_at(row, 5)?,
        })
    }

    /// Users may only address notifications to themselves, about members
    /// of their own trees.
    async fn insert(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        input: NewNotification,
    ) -> Result<Self> {
        let member = parent_member(conn, input.related_member).await?;
        guard.create_under(&member)?;

        let notification = Notification {
            id: Uuid::new_v4(),
            kind: input.kind,
            target_user: guard.stamp(),
            event_date: input.event_date,
            related_member: member.id,
            created_at: Timestamp::now(),
        };
        store(conn, &notification).await?;
        Ok(notification)
    }

    async fn patch(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: NotificationPatch,
    ) -> Result<Self> {
        if let Some(member_id) = patch.related_member
            && member_id != existing.related_member
        {
            let member = parent_member(conn, member_id).await?;
            guard.relocate(&member)?;
            existing.related_member = member.id;
        }
        if let Some(kind) = patch.kind {
            existing.kind = kind;
        }
        if let Some(event_date) = patch.event_date {
            existing.event_date = event_date;
        }
        conn.execute(
            "UPDATE notifications SET kind = ?2, event_date = ?3, related_member = ?4 \
             WHERE id = ?1",
            libsql::params![
                existing.id.to_string(),
                existing.kind.as_str(),
                existing.event_date.to_string(),
                existing.related_member.to_string(),
            ],
        )
        .await?;
        Ok(existing)
    }
}

pub struct NotificationsModule;

impl Module for NotificationsModule {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<Notification>(router);
    }
}
