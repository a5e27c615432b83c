//! # cadence-adapter-storage-fs
//!
//! File-system persistence for automations.
//!
//! ## Responsibilities
//! - [`DirectoryAutomationRepository`]: one `{group-path}/{name}.json` per
//!   automation, with `version.txt` at the root
//! - [`JsonFileAutomationRepository`]: every automation in a single JSON
//!   document, with a sibling `<file>.version`
//! - [`VersionMarker`]: the ISO-8601 timestamp both repositories advance on
//!   every add, update and remove
//!
//! ## Dependency rule
//! Depends on `cadence-app` (for the port trait) and `cadence-domain`.
//! Neither of those crates references this adapter.

pub mod directory_repo;
pub mod error;
pub mod file_repo;
pub mod version;

pub use directory_repo::DirectoryAutomationRepository;
pub use error::StorageError;
pub use file_repo::JsonFileAutomationRepository;
pub use version::VersionMarker;
