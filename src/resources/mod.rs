//! REST resources of the family-tree API.
//!
//! Each resource type implements [`Resource`] and gets the same five
//! endpoints, all enforcing the same request pipeline:
//!
//! | Route              | Method      | Gates                                        |
//! |--------------------|-------------|----------------------------------------------|
//! | `PATH`             | GET         | role(read), then owner-scoped query          |
//! | `PATH`             | POST        | role(create), parent owned, owner stamped    |
//! | `PATH/{id}`        | GET         | role(read), fetch, owner gate                |
//! | `PATH/{id}`        | PUT, PATCH  | role(update), fetch, owner gate, guard       |
//! | `PATH/{id}`        | DELETE      | role(delete), fetch, owner gate, guard       |
//!
//! Mutations run inside one transaction holding the connection lock, so the
//! ownership re-check and the write see the same record state. Post-mutation
//! hooks run after the commit and their failure is reported to the caller.

use std::future::Future;

use libsql::{Connection, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::guard::MutationGuard;
use crate::listing::{ListParams, search_clause};
use crate::ownership::{OwnershipResolvable, Scope};
use crate::permission::{Action, IsOwnerOrStaff, RoleActionPermission};
use crate::response::{self, HttpResponse};
use crate::router::{Context, Router};
use crate::{Error, Module, Result};

pub mod accounts;
pub mod history;
pub mod member;
pub mod notification;
pub mod profile;
pub mod tree;
pub mod update;

pub use history::HistoryEvent;
pub use member::Member;
pub use notification::Notification;
pub use profile::Profile;
pub use tree::Tree;
pub use update::Update;

/// A record type served through the generic CRUD endpoints.
///
/// `SELECT` must alias the record's own table as `r` and return the record's
/// id as its first column.
pub trait Resource: OwnershipResolvable + Serialize + Clone + Send + Sync + Sized + 'static {
    /// Collection route, e.g. `/api/trees`.
    const PATH: &'static str;
    /// Table holding the records.
    const TABLE: &'static str;
    /// Select statement including the joins that carry ownership links.
    const SELECT: &'static str;
    /// SQL expression evaluating to the owner id of a row.
    const OWNER: &'static str;
    /// Columns matched by `?search=`.
    const SEARCH: &'static [&'static str];
    /// Fields accepted by `?ordering=`, with their column expressions.
    const ORDERING: &'static [(&'static str, &'static str)];
    /// `ORDER BY` used when none is requested.
    const DEFAULT_ORDER: &'static str;

    /// Request body for creation.
    type New: DeserializeOwned + Send;
    /// Request body for updates; every field optional.
    type Patch: DeserializeOwned + Send;

    fn from_row(row: &Row) -> Result<Self>;

    /// Validate and insert a new record.
    ///
    /// Implementations stamp the ownership anchor from `guard` and check
    /// that any parent the record hangs off is owned by the actor.
    fn insert(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        input: Self::New,
    ) -> impl Future<Output = Result<Self>> + Send;

    /// Apply `patch` to `existing` and persist it.
    ///
    /// The generic handler has already verified ownership of `existing`.
    /// Implementations must check any relation the patch moves to a new
    /// anchor with [`MutationGuard::relocate`].
    fn patch(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        existing: Self,
        patch: Self::Patch,
    ) -> impl Future<Output = Result<Self>> + Send;

    /// Hook run after a create commits.
    fn after_insert(_conn: &Connection, _record: &Self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Hook run after an update commits.
    fn after_patch(
        _conn: &Connection,
        _before: &Self,
        _after: &Self,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Fetch one record by id, without scoping.
pub async fn fetch<R: Resource>(conn: &Connection, id: Uuid) -> Result<Option<R>> {
    let sql = format!("{} WHERE r.id = ?1", R::SELECT);
    let mut rows = conn.query(&sql, libsql::params![id.to_string()]).await?;
    rows.next().await?.as_ref().map(R::from_row).transpose()
}

/// Fetch a record that must exist.
pub async fn require<R: Resource>(conn: &Connection, id: Uuid) -> Result<R> {
    fetch::<R>(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {id}", R::KIND)))
}

/// List the records visible in `scope`.
pub async fn list<R: Resource>(
    conn: &Connection,
    scope: Scope,
    params: &ListParams,
) -> Result<Vec<R>> {
    let sql = format!(
        "{select} WHERE (?1 IS NULL OR {owner} = ?1) AND (?2 IS NULL OR {search}) ORDER BY {order}",
        select = R::SELECT,
        owner = R::OWNER,
        search = search_clause(R::SEARCH, "?2"),
        order = params.order_by(R::ORDERING, R::DEFAULT_ORDER)?,
    );
    let mut rows = conn
        .query(
            &sql,
            libsql::params![
                scope.owner().map(|id| id.to_string()),
                params.search_pattern()
            ],
        )
        .await?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        records.push(R::from_row(&row)?);
    }
    Ok(records)
}

/// Delete one record by id.
pub async fn remove<R: Resource>(conn: &Connection, id: Uuid) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);
    conn.execute(&sql, libsql::params![id.to_string()]).await?;
    Ok(())
}

async fn list_handler<R: Resource>(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Read)?;
    let params = ListParams::from_query(ctx.query())?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let records = list::<R>(&conn, Scope::for_principal(principal), &params).await?;
    response::ok(&records)
}

async fn create_handler<R: Resource>(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Create)?;
    let input: R::New = ctx.json()?;
    let guard = MutationGuard::new(principal);

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let tx = conn.transaction().await?;
    let record = R::insert(&tx, &guard, input).await?;
    tx.commit().await?;

    R::after_insert(&conn, &record).await?;
    response::created(&record)
}

async fn retrieve_handler<R: Resource>(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Read)?;
    let id = ctx.require_id()?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let record = require::<R>(&conn, id).await?;
    IsOwnerOrStaff::check(Some(principal), &record)?;
    response::ok(&record)
}

async fn update_handler<R: Resource>(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Update)?;
    let id = ctx.require_id()?;
    let patch: R::Patch = ctx.json()?;
    let guard = MutationGuard::new(principal);

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let tx = conn.transaction().await?;
    let existing = require::<R>(&tx, id).await?;
    IsOwnerOrStaff::check(Some(principal), &existing)?;
    guard.update(&existing)?;
    let before = existing.clone();
    let saved = R::patch(&tx, &guard, existing, patch).await?;
    tx.commit().await?;

    R::after_patch(&conn, &before, &saved).await?;
    response::ok(&saved)
}

async fn destroy_handler<R: Resource>(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Delete)?;
    let id = ctx.require_id()?;
    let guard = MutationGuard::new(principal);

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let tx = conn.transaction().await?;
    let existing = require::<R>(&tx, id).await?;
    IsOwnerOrStaff::check(Some(principal), &existing)?;
    guard.delete(&existing)?;
    remove::<R>(&tx, id).await?;
    tx.commit().await?;

    tracing::info!(user = %principal.id, resource = R::KIND, %id, "deleted record");
    Ok(response::no_content())
}

/// Register the five CRUD endpoints of `R`.
pub fn mount<R: Resource>(router: &mut Router) {
    let detail = format!("{}/{{id}}", R::PATH);
    router.get(R::PATH, list_handler::<R>);
    router.post(R::PATH, create_handler::<R>);
    router.get(&detail, retrieve_handler::<R>);
    router.put(&detail, update_handler::<R>);
    router.patch(&detail, update_handler::<R>);
    router.delete(&detail, destroy_handler::<R>);
}

/// Reject blank required text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Every module of the API.
pub fn modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(accounts::AccountsModule),
        Box::new(tree::TreesModule),
        Box::new(member::MembersModule),
        Box::new(update::UpdatesModule),
        Box::new(history::HistoryModule),
        Box::new(notification::NotificationsModule),
        Box::new(profile::ProfilesModule),
    ]
}

/// Router with every API module mounted.
pub fn api() -> Router {
    let mut router = Router::new();
    for module in modules() {
        router.mount(module.as_ref());
    }
    router
}
