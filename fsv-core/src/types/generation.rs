//! Archive generations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an archive stands alone or depends on its predecessor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Self-contained archive.
    Full,
    /// Archive encoding changes since the previous generation.
    Delta,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Full => write!(f, "full"),
            ArchiveKind::Delta => write!(f, "delta"),
        }
    }
}

/// One create invocation's result within a lineage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Generation {
    /// Position in the lineage, starting at 0.
    pub ordinal: usize,

    /// Artifact file name chosen by the archiver.
    pub artifact: String,

    /// Full or delta.
    pub kind: ArchiveKind,

    /// Instant the create invocation was started.
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.ordinal, self.artifact, self.kind)
    }
}
