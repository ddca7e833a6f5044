//! Module trait for pluggable API modules.
//!
//! Every resource of the API is a module that registers its routes with the
//! server's router.
//!
//! # Example
//!
//! ```ignore
//! use racine::{Module, Router};
//!
//! pub struct HealthModule;
//!
//! impl Module for HealthModule {
//!     fn name(&self) -> &'static str {
//!         "health"
//!     }
//!
//!     fn routes(&self, router: &mut Router) {
//!         router.get("/health", |_ctx| async move {
//!             racine::response::ok(&serde_json::json!({ "status": "ok" }))
//!         });
//!     }
//! }
//! ```

use crate::router::Router;

/// A pluggable API module.
pub trait Module: Send + Sync {
    /// Module name for identification and logging.
    fn name(&self) -> &'static str;

    /// Register routes with the router.
    fn routes(&self, router: &mut Router);
}
