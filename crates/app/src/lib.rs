//! # cadence-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository`: grouped CRUD for automations plus the version marker
//!   - `JobRepository`: read jobs by task and status
//!   - `JobSubmitter`: hand a met automation's parameters to the job system
//!   - `SqlConnection` / `SqlConnector`: parameterized queries for SQL triggers
//!   - `ScalarStore`: audit values recording each evaluation outcome
//! - Define the **Trigger** abstraction and its reference implementations
//! - Provide the **trigger registry** (kind → schema + factory)
//! - Provide the **automation executor** (trigger condition → met / not met)
//! - Define **driving/inbound ports** as use-case structs:
//!   - `AutomationService`: manage automations, enriched with audit values
//!   - `Scheduler`: poll, evaluate and submit
//!
//! ## Dependency rule
//! Depends on `cadence-domain` only (plus `tokio` for sync primitives and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_executor;
pub mod ports;
pub mod scalar_store;
pub mod scheduler;
pub mod services;
pub mod triggers;

#[cfg(test)]
mod testing;
