//! fsv Test Kit - archive lifecycle harness.
//!
//! This crate drives an archiver through create/restore cycles and checks
//! each restore against the source with `fsv-core` snapshots.
//!
//! # Key Types
//!
//! - [`Archiver`]: Narrow create/restore interface over the archiver under test
//! - [`Workspace`]: Root directory, artifact registry and restore directories
//! - [`FixtureController`]: Resets the subject tree between scenarios
//! - [`Scenario`]: Scripted mutate/create/restore/verify steps
//! - [`Orchestrator`]: Runs scenarios and produces [`ScenarioReport`]s
//!
//! # Available Archivers
//!
//! | Archiver | Description |
//! |----------|-------------|
//! | `CommandArchiver` | Runs an external program from argv templates |
//! | `ManifestArchiver` | In-process reference archiver writing JSON manifests |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fsv_testkit::{standard, Orchestrator};
//!
//! let config = fsv_core::Config::default();
//! let root = std::env::current_dir().unwrap();
//! let mut orchestrator =
//!     Orchestrator::for_reference(&config, &root, Arc::new(fsv_core::SystemClock)).unwrap();
//!
//! for report in orchestrator.run_all(&standard::all(&config.subject)) {
//!     println!("{}: {}", report.scenario, report.passed);
//! }
//! ```

mod archiver;
mod command;
mod fixture;
mod integration;
mod orchestrator;
mod reference;
mod scenario;
mod workspace;

pub use archiver::{Archiver, ArtifactConvention, CreateRequest, Invocation, RestoreRequest};
pub use command::CommandArchiver;
pub use fixture::{from_kind as fixture_from_kind, FixtureController, GitFixture, SeededFixture};
pub use orchestrator::{
    expected_exclusions, Failure, Orchestrator, ScenarioReport, ScenarioState, Verification,
};
pub use reference::{Manifest, ManifestArchiver, ManifestEntry, REFERENCE_PREFIX, REFERENCE_SUFFIX};
pub use scenario::{standard, Expectation, GenerationRef, Scenario, ScenarioBuilder, Step, TreeRef};
pub use workspace::{Workspace, RESTORE_DIR_PREFIX};

/// Re-export fsv_core for convenience in tests.
pub use fsv_core;
