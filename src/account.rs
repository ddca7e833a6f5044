//! User accounts.

use jiff::Timestamp;
use libsql::{Connection, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::User;
use crate::db;
use crate::principal::UserId;
use crate::{Error, Result};

/// A stored user account.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: Timestamp,
}

impl User for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

const SELECT: &str =
    "SELECT id, username, email, password_hash, is_staff, created_at FROM users";

fn from_row(row: &Row) -> Result<Account> {
    Ok(Account {
        id: db::uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_staff: db::bool_at(row, 4)?,
        created_at: db::timestamp_at(row, 5)?,
    })
}

/// Insert a new account. Fails with `Conflict` when the username is taken.
pub async fn create(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    is_staff: bool,
) -> Result<Account> {
    if find_by_username(conn, username).await?.is_some() {
        return Err(Error::Conflict(format!("Username {username} is taken")));
    }
    let account = Account {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        is_staff,
        created_at: Timestamp::now(),
    };
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, is_staff, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        libsql::params![
            account.id.to_string(),
            account.username.clone(),
            account.email.clone(),
            account.password_hash.clone(),
            i64::from(account.is_staff),
            db::timestamp_text(account.created_at),
        ],
    )
    .await?;
    tracing::info!(user = %account.id, username, is_staff, "created account");
    Ok(account)
}

pub async fn find(conn: &Connection, id: UserId) -> Result<Option<Account>> {
    let mut rows = conn
        .query(
            &format!("{SELECT} WHERE id = ?1"),
            libsql::params![id.to_string()],
        )
        .await?;
    rows.next().await?.as_ref().map(from_row).transpose()
}

pub async fn find_by_username(conn: &Connection, username: &str) -> Result<Option<Account>> {
    let mut rows = conn
        .query(
            &format!("{SELECT} WHERE username = ?1"),
            libsql::params![username],
        )
        .await?;
    rows.next().await?.as_ref().map(from_row).transpose()
}
