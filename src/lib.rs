//! Racine - family-tree API server with role- and ownership-based access
//! control.
//!
//! Every request passes the same gates:
//!
//! - **Role gate** ([`permission::RoleActionPermission`]): the principal's
//!   role groups (`Viewer`, `Editor`, `Admin`) decide which actions are
//!   allowed at all. Staff bypass it.
//! - **Object gate** ([`permission::IsOwnerOrStaff`]): a record is reachable
//!   only by the user its ownership chain resolves to ([`ownership`]).
//! - **Scoping** ([`ownership::Scope`]): list queries only return owned
//!   records.
//! - **Mutation guards** ([`guard::MutationGuard`]): owners are stamped on
//!   create and re-checked inside the write transaction on update and delete.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use racine::{ConfigLoader, DbHandle, Overrides};
//!
//! #[tokio::main]
//! async fn main() -> racine::Result<()> {
//!     let config = ConfigLoader::default().load(None, &Overrides::default())?;
//!     let db = DbHandle::open(&config.database.url).await?;
//!     racine::roles::seed(&*db.lock().await).await?;
//!
//!     let router = racine::resources::api();
//!     racine::server::run(Arc::new(config), Some(db), router.into_handle()).await
//! }
//! ```

pub mod account;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod listing;
pub mod module;
pub mod notify;
pub mod ownership;
pub mod permission;
pub mod principal;
pub mod resources;
pub mod response;
pub mod roles;
pub mod router;
pub mod server;

// Re-export main types at crate root
pub use config::{Config, ConfigLoader, Overrides, SharedConfig};
pub use db::Handle as DbHandle;
pub use error::{Error, Result};
pub use guard::MutationGuard;
pub use module::Module;
pub use ownership::{OwnershipChain, OwnershipResolvable, Scope};
pub use permission::{Action, ActionSet, Denial, IsOwnerOrStaff, Role, RoleActionPermission};
pub use principal::{Principal, UserId};
pub use router::{Context, Router};

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;
