//! Persistence layer: JSON files for the release cache and user settings.
//!
//! Both stores are optional. When no path is configured the session runs
//! purely in memory.

pub mod file;
pub mod models;

pub use file::JsonFile;
pub use models::{PersistedReleaseCache, PersistedResource};
