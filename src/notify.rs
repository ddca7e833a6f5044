//! Notifications raised by changes to family members, and the daily
//! birthday job.
//!
//! Every notification about a member goes to the owner of the member's
//! tree, whoever made the change.

use jiff::Zoned;
use jiff::civil::Date;
use libsql::Connection;
use tracing::info;

use crate::Result;
use crate::resources::notification::{self, Kind};
use crate::resources::{Member, Resource};

fn today() -> Date {
    Zoned::now().date()
}

/// A member was created.
pub async fn member_added(conn: &Connection, member: &Member) -> Result<()> {
    notification::deliver(conn, Kind::Addition, member.tree_owner, member, today()).await?;
    Ok(())
}

/// A member was updated. Raises a death notice when the member went from
/// alive to deceased.
pub async fn member_updated(conn: &Connection, before: &Member, after: &Member) -> Result<()> {
    if before.is_alive && !after.is_alive {
        notification::deliver(conn, Kind::Death, after.tree_owner, after, today()).await?;
    }
    Ok(())
}

/// Create a `Birthday` notification for every member born on `today`'s
/// month and day.
///
/// A member gets at most one birthday notification per calendar year, so
/// running the job twice on the same day is harmless. Returns the number of
/// notifications created.
pub async fn send_birthday_notifications(conn: &Connection, today: Date) -> Result<usize> {
    let sql = format!(
        "{} WHERE r.birth_date IS NOT NULL AND substr(r.birth_date, 6, 5) = ?1 \
         AND NOT EXISTS (SELECT 1 FROM notifications n \
             WHERE n.kind = ?2 AND n.related_member = r.id \
             AND substr(n.event_date, 1, 4) = ?3)",
        Member::SELECT
    );
    let month_day = format!("{:02}-{:02}", today.month(), today.day());
    let year = format!("{:04}", today.year());

    let mut rows = conn
        .query(
            &sql,
            libsql::params![month_day, Kind::Birthday.as_str(), year],
        )
        .await?;
    let mut due = Vec::new();
    while let Some(row) = rows.next().await? {
        due.push(Member::from_row(&row)?);
    }
    drop(rows);

    for member in &due {
        notification::deliver(conn, Kind::Birthday, member.tree_owner, member, today).await?;
        info!(member = %member.id, name = %member.name(), "birthday notification created");
    }
    info!(count = due.len(), %today, "birthday notifications sent");
    Ok(due.len())
}
