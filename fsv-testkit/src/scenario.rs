//! Scenario definitions.

use std::fmt;
use std::path::{Path, PathBuf};

use fsv_core::{ArchiveKind, SnapshotDiff};
use serde::{Deserialize, Serialize};

/// A scripted sequence of mutate, create, restore and verify steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,

    /// What this scenario checks.
    pub description: String,

    /// Steps to run in order.
    pub steps: Vec<Step>,
}

/// Which generation a restore step extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationRef {
    /// Most recent generation.
    Latest,
    /// The one before the most recent.
    Previous,
    /// By ordinal, starting at 0.
    Index(usize),
}

impl fmt::Display for GenerationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationRef::Latest => write!(f, "latest"),
            GenerationRef::Previous => write!(f, "previous"),
            GenerationRef::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// One side of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRef {
    /// The live subject tree in the workspace.
    Source,
    /// The subject tree inside the restore directory with this label.
    Restored(String),
}

impl fmt::Display for TreeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeRef::Source => write!(f, "source"),
            TreeRef::Restored(label) => write!(f, "restored:{}", label),
        }
    }
}

/// Expected outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// No differences at all.
    Identical,
    /// Exactly these classifications, nothing else.
    Entries(SnapshotDiff),
    /// Every left path matching one of the patterns is `missing_in_right`,
    /// everything else matches. Patterns matching nothing on the left fail
    /// the step.
    Excluded(Vec<String>),
}

/// A step in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Write a file (workspace-relative), creating parents.
    WriteFile { path: PathBuf, contents: String },
    /// Remove a file or directory (workspace-relative).
    Remove { path: PathBuf },
    /// Invoke the archiver in create mode.
    Create {
        /// Workspace-relative sources; empty means the subject.
        #[serde(default)]
        sources: Vec<PathBuf>,
        #[serde(default)]
        excludes: Vec<String>,
        #[serde(default)]
        force_full: bool,
    },
    /// Restore a generation into a fresh directory labelled `label`.
    Restore { generation: GenerationRef, label: String },
    /// Compare two trees.
    Verify {
        left: TreeRef,
        right: TreeRef,
        expect: Expectation,
    },
    /// Check the generations created so far.
    ExpectGenerations { kinds: Vec<ArchiveKind> },
}

impl Step {
    /// Short label for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Step::WriteFile { path, .. } => format!("write {}", path.display()),
            Step::Remove { path } => format!("remove {}", path.display()),
            Step::Create {
                excludes,
                force_full,
                ..
            } => {
                let mut s = "create".to_string();
                if *force_full {
                    s.push_str(" (full)");
                }
                if !excludes.is_empty() {
                    s.push_str(&format!(" excluding {}", excludes.join(", ")));
                }
                s
            }
            Step::Restore { generation, label } => format!("restore {} into {}", generation, label),
            Step::Verify { left, right, .. } => format!("verify {} vs {}", left, right),
            Step::ExpectGenerations { kinds } => format!("expect {} generations", kinds.len()),
        }
    }
}

impl Scenario {
    /// Create a new scenario builder.
    pub fn builder(name: &str) -> ScenarioBuilder {
        ScenarioBuilder::new(name)
    }
}

/// Builder for creating scenarios.
pub struct ScenarioBuilder {
    name: String,
    description: String,
    steps: Vec<Step>,
}

impl ScenarioBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn write_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.steps.push(Step::WriteFile {
            path: path.into(),
            contents: contents.to_string(),
        });
        self
    }

    pub fn remove(mut self, path: impl Into<PathBuf>) -> Self {
        self.steps.push(Step::Remove { path: path.into() });
        self
    }

    /// Create from the subject with no exclusions.
    pub fn create(self) -> Self {
        self.create_with(&[], false)
    }

    pub fn create_with(mut self, excludes: &[&str], force_full: bool) -> Self {
        self.steps.push(Step::Create {
            sources: Vec::new(),
            excludes: excludes.iter().map(|s| s.to_string()).collect(),
            force_full,
        });
        self
    }

    pub fn restore(mut self, generation: GenerationRef, label: &str) -> Self {
        self.steps.push(Step::Restore {
            generation,
            label: label.to_string(),
        });
        self
    }

    pub fn verify(mut self, left: TreeRef, right: TreeRef, expect: Expectation) -> Self {
        self.steps.push(Step::Verify {
            left,
            right,
            expect,
        });
        self
    }

    /// Verify that the restore labelled `label` equals the source.
    pub fn verify_roundtrip(self, label: &str) -> Self {
        self.verify(
            TreeRef::Source,
            TreeRef::Restored(label.to_string()),
            Expectation::Identical,
        )
    }

    pub fn expect_generations(mut self, kinds: &[ArchiveKind]) -> Self {
        self.steps.push(Step::ExpectGenerations {
            kinds: kinds.to_vec(),
        });
        self
    }

    pub fn build(self) -> Scenario {
        Scenario {
            name: self.name,
            description: self.description,
            steps: self.steps,
        }
    }
}

/// The standard scenario suite for a subject tree seeded with the baseline
/// (`a.txt`, `abc/something.txt`, `abc/def/something.txt`).
pub mod standard {
    use super::*;
    use fsv_core::{DiffEntry, EntryKind, Side};

    use fsv_core::ArchiveKind::{Delta, Full};

    pub const BASE_ROUNDTRIP: &str = "base_roundtrip";
    pub const ADDITIVE_DELTA: &str = "additive_delta";
    pub const SUBTRACTIVE_DELTA: &str = "subtractive_delta";
    pub const EXCLUDE_PATH: &str = "exclude_path";
    pub const EXCLUDE_GLOB: &str = "exclude_glob";
    pub const MODIFIED_DELTA: &str = "modified_delta";
    pub const FORCED_FULL: &str = "forced_full";

    pub fn base_roundtrip() -> Scenario {
        Scenario::builder(BASE_ROUNDTRIP)
            .description("One create and one restore reproduce the tree exactly")
            .create()
            .expect_generations(&[Full])
            .restore(GenerationRef::Latest, "base")
            .verify_roundtrip("base")
            .build()
    }

    pub fn additive_delta(subject: &Path) -> Scenario {
        Scenario::builder(ADDITIVE_DELTA)
            .description("A file added between creates appears in the delta's restore")
            .create()
            .write_file(subject.join("newfile.bin"), "\u{0}\u{1}binary-ish payload\u{ff}")
            .create()
            .expect_generations(&[Full, Delta])
            .restore(GenerationRef::Latest, "latest")
            .verify_roundtrip("latest")
            .build()
    }

    pub fn subtractive_delta(subject: &Path) -> Scenario {
        let removed = subject.join("a.txt");
        Scenario::builder(SUBTRACTIVE_DELTA)
            .description("A file removed between creates is absent from the delta's restore")
            .create()
            .remove(&removed)
            .create()
            .expect_generations(&[Full, Delta])
            .restore(GenerationRef::Latest, "latest")
            .verify_roundtrip("latest")
            .restore(GenerationRef::Previous, "previous")
            .verify(
                TreeRef::Source,
                TreeRef::Restored("previous".into()),
                Expectation::Entries(SnapshotDiff::default().with(
                    EntryKind::File,
                    removed,
                    DiffEntry::MissingInLeft,
                )),
            )
            .build()
    }

    /// Excludes `<subject>/a.txt` with one `*` per subject component, so
    /// the default subject gives `*/a.txt`.
    pub fn exclude_path(subject: &Path) -> Scenario {
        let depth = subject
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .count();
        let pattern = format!("{}a.txt", "*/".repeat(depth));
        Scenario::builder(EXCLUDE_PATH)
            .description("An exact-path exclusion drops only that file")
            .create_with(&[pattern.as_str()], false)
            .restore(GenerationRef::Latest, "excluded")
            .verify(
                TreeRef::Source,
                TreeRef::Restored("excluded".into()),
                Expectation::Entries(SnapshotDiff::default().with(
                    EntryKind::File,
                    subject.join("a.txt"),
                    DiffEntry::MissingInRight,
                )),
            )
            .build()
    }

    pub fn exclude_glob(subject: &Path) -> Scenario {
        Scenario::builder(EXCLUDE_GLOB)
            .description("A basename glob drops every matching file at any depth")
            .create_with(&["*something.txt"], false)
            .restore(GenerationRef::Latest, "excluded")
            .verify(
                TreeRef::Source,
                TreeRef::Restored("excluded".into()),
                Expectation::Entries(
                    SnapshotDiff::default()
                        .with(
                            EntryKind::File,
                            subject.join("abc/something.txt"),
                            DiffEntry::MissingInRight,
                        )
                        .with(
                            EntryKind::File,
                            subject.join("abc/def/something.txt"),
                            DiffEntry::MissingInRight,
                        ),
                ),
            )
            .build()
    }

    pub fn modified_delta(subject: &Path) -> Scenario {
        let changed = subject.join("a.txt");
        Scenario::builder(MODIFIED_DELTA)
            .description("A rewritten file is carried by the delta; the first generation keeps the old bytes")
            .create()
            .write_file(&changed, "rewritten after the first generation\n")
            .create()
            .expect_generations(&[Full, Delta])
            .restore(GenerationRef::Latest, "latest")
            .verify_roundtrip("latest")
            .restore(GenerationRef::Index(0), "first")
            .verify(
                TreeRef::Source,
                TreeRef::Restored("first".into()),
                Expectation::Entries(SnapshotDiff::default().with(
                    EntryKind::File,
                    changed,
                    DiffEntry::ContentDiffers {
                        divergent: Side::Right,
                    },
                )),
            )
            .build()
    }

    pub fn forced_full() -> Scenario {
        Scenario::builder(FORCED_FULL)
            .description("A forced full create stands alone")
            .create()
            .create_with(&[], true)
            .expect_generations(&[Full, Full])
            .restore(GenerationRef::Index(0), "first")
            .verify_roundtrip("first")
            .restore(GenerationRef::Latest, "latest")
            .verify_roundtrip("latest")
            .build()
    }

    /// Every standard scenario, in run order.
    pub fn all(subject: &Path) -> Vec<Scenario> {
        vec![
            base_roundtrip(),
            additive_delta(subject),
            subtractive_delta(subject),
            exclude_path(subject),
            exclude_glob(subject),
            modified_delta(subject),
            forced_full(),
        ]
    }
}
