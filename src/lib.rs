//! Shared runtime scaffold for HTTP services.
//!
//! Every service built on this crate gets the same operational behavior for
//! free: a standard JSON response envelope, panic and error recovery that
//! never leaks a stack trace, pagination with allow-listed sorting, layered
//! configuration, structured access logs, and a managed lifecycle with a
//! main listener, a debug listener, and graceful shutdown.
//!
//! # Quick start
//!
//! ```ignore
//! use svckit::prelude::*;
//!
//! async fn list_users(mut pager: Query<Pager>) -> ApiResponse {
//!     ApiResponse::paginated(StatusCode::OK, vec!["ada", "grace"], &pager)
//! }
//!
//! #[tokio::main]
//! async fn main() -> svckit::error::Result<()> {
//!     let mut app = App::new("users", env!("CARGO_PKG_VERSION"))
//!         .route("/users", get(list_users));
//!     app.initialize().await?;
//!     init_tracing(app.config().expect("initialized"))?;
//!     app.start(CancellationToken::new()).await
//! }
//! ```

pub mod config;
pub mod dates;
#[cfg(feature = "database")]
pub mod db;
pub mod envelope;
pub mod error;
pub mod health;
pub mod middleware;
pub mod observability;
pub mod pager;
pub mod server;
pub mod validate;

/// Common imports for service code
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, ServiceConfig};
    #[cfg(feature = "database")]
    pub use crate::db::Database;
    pub use crate::envelope::{ApiResponse, Body, BodyMeta};
    pub use crate::error::{ApiError, Error, FieldError, Result};
    pub use crate::health::HealthInfo;
    pub use crate::middleware::{auth_required, ErrorStack, Identity};
    pub use crate::observability::init_tracing;
    pub use crate::pager::{Pager, QueryScope, Sortable};
    pub use crate::server::App;
    pub use crate::validate::Payload;

    pub use axum::extract::{Path, Query, State};
    pub use axum::http::StatusCode;
    pub use axum::response::IntoResponse;
    pub use axum::routing::{delete, get, patch, post, put};
    pub use axum::{Json, Router};
    pub use tokio_util::sync::CancellationToken;
    pub use validator::Validate;
}
