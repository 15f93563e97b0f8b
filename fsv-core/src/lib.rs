//! fsv Core Library
//!
//! Snapshot-and-diff engine for verifying archiver round trips.
//! This crate performs no archiver invocations of its own.
//!
//! # Architecture
//!
//! - `types`: Core data types (Snapshot, SnapshotDiff, Generation, Config, errors)
//! - `ops`: High-level operations (capture, diff)
//! - `helpers`: Low-level utilities (fingerprinting, exclusion patterns, pacing)

pub mod types;
pub mod ops;
pub mod helpers;

// Re-export commonly used types at crate root
pub use types::{
    Config,
    ArchiverConfig,
    FixtureConfig,
    FixtureKind,
    PacingConfig,
    Snapshot,
    SpecialKind,
    SpecialEntryPolicy,
    SnapshotDiff,
    DiffEntry,
    EntryKind,
    Mismatch,
    Side,
    Generation,
    ArchiveKind,
    FsvError,
    ErrorKind,
    CONFIG_FILE_NAME,
    DEFAULT_SUBJECT,
};

// Re-export operations at crate root
pub use ops::{capture, capture_with, diff, diff_with_reference, CaptureOptions};

// Re-export helper types used across crates
pub use helpers::hash::{HashAlgo, Fingerprinter};
pub use helpers::pattern::ExclusionSet;
pub use helpers::clock::{Clock, SystemClock, ManualClock, Pacer};
