//! # cadence-domain
//!
//! Pure domain model for the cadence automation system.
//!
//! ## Responsibilities
//! - Foundational types: hierarchical names, error conventions, timestamps and clocks
//! - Define **Automations** (a task, its declared parameters and a trigger condition)
//! - Define **Trigger definitions** (the persisted, kind-tagged envelope of a trigger)
//! - Define **Trigger conditions** (implicit AND, or an explicit boolean notation)
//! - Define **Automation results** (met / not met plus released parameters)
//! - Define **Jobs** (what the downstream job system records per task)
//! - Evaluate the boolean notation used by explicit conditions
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod expression;
pub mod job;
