//! Driving-side use cases.
//!
//! Services take their ports as generic parameters and never name an adapter.

pub mod automation_service;

pub use automation_service::{AutomationService, AutomationStatus};
