//! Core type definitions for fsv.

mod config;
pub mod diff;
mod error;
mod generation;
mod snapshot;

pub use config::{
    ArchiverConfig, Config, FixtureConfig, FixtureKind, PacingConfig, CONFIG_FILE_NAME,
    DEFAULT_SUBJECT,
};
pub use diff::{DiffEntry, EntryKind, Mismatch, Side, SnapshotDiff};
pub use error::{ErrorKind, FsvError};
pub use generation::{ArchiveKind, Generation};
pub use snapshot::{Snapshot, SpecialEntryPolicy, SpecialKind};
