//! # Splicer Core
//!
//! Core library for Splicer, an LTI 1.0/1.1 tool consumer. It builds and
//! OAuth-signs launches into external learning tools, caches the launch
//! context, and processes the score callbacks the tools post back.
//!
//! ## Overview
//!
//! - **Tool registry**: a closed set of supported tools with per-tool
//!   credentials from the environment and behavior hooks as data
//! - **Launch**: identifier validation, LTI body construction, OAuth 1.0
//!   HMAC-SHA1 body signing, and mediated-platform redirects
//! - **Outcome**: hardened POX XML parsing, score normalization, monotonic
//!   progress reconciliation, UM-service forwarding, and an audit log
//! - **Storage**: repository ports with Postgres adapters behind a
//!   unit-of-work struct, so services run against in-memory fakes in tests
//!
//! ## Examples
//!
//! ```no_run
//! use splicer_core::launch::{LaunchRequest, prepare_launch};
//! use splicer_core::tools::ToolRegistry;
//!
//! async fn launch(
//!     registry: &ToolRegistry,
//!     cache: &dyn splicer_core::database::ports::LaunchCacheRepository,
//! ) -> splicer_core::error::Result<()> {
//!     let request = LaunchRequest {
//!         tool: "codecheck".to_string(),
//!         sub: "ex1".to_string(),
//!         usr: "42".to_string(),
//!         grp: "7".to_string(),
//!         module_id: Some(5),
//!         ..LaunchRequest::default()
//!     };
//!     let prepared =
//!         prepare_launch(registry, cache, &request, "https://host/lti/outcome", 24).await?;
//!     println!("launching {} as {}", prepared.tool, prepared.source_id);
//!     Ok(())
//! }
//! ```

/// Service composition over the repository ports.
pub mod application;

/// Repository ports and Postgres adapters.
pub mod database;

/// Error types shared across the crate.
pub mod error;

/// Launch preparation: validation, body construction, OAuth signing.
pub mod launch;

/// Outcome callbacks: POX payloads, processing pipeline, UM forwarding.
pub mod outcome;

/// The closed tool catalogue and its per-tool configuration.
pub mod tools;

/// Embedded schema migrations, applied by `db migrate` or at first serve.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{LtiError, Result};
