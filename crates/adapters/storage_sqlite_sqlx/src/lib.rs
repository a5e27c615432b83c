//! # cadence-adapter-storage-sqlite-sqlx
//!
//! `SQLite` adapters using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Record submitted jobs and answer job queries (`JobSubmitter`, `JobRepository`)
//! - Run SQL trigger queries with `@name` placeholders (`SqlConnection`, `SqlConnector`)
//! - Keep the audit values written by the executor (`ScalarStore`)
//! - Manage the connection pool and run the embedded migrations
//!
//! ## Dependency rule
//! Depends on `cadence-app` (for port traits) and `cadence-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod job_repo;
pub mod pool;
pub mod scalar_store;
pub mod sql_connection;

pub use job_repo::SqliteJobRepository;
pub use pool::{Config, Database};
pub use scalar_store::SqliteScalarStore;
pub use sql_connection::{SqliteConnection, SqliteConnector};
