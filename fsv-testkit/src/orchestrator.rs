//! Archive lifecycle orchestration.
//!
//! The orchestrator owns the workspace for the duration of a scenario. It
//! paces create invocations, discovers the artifact each one produced,
//! restores generations into fresh directories and compares snapshots.
//! Teardown runs after every scenario, whatever its outcome.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fsv_core::{
    capture_with, diff, ArchiveKind, CaptureOptions, Clock, Config, ExclusionSet, FsvError,
    Generation, Mismatch, Pacer, Snapshot, SnapshotDiff, SystemClock,
};
use serde::Serialize;

use crate::archiver::{Archiver, CreateRequest, Invocation, RestoreRequest};
use crate::command::CommandArchiver;
use crate::fixture::{self, FixtureController};
use crate::reference::ManifestArchiver;
use crate::scenario::{Expectation, GenerationRef, Scenario, Step, TreeRef};
use crate::workspace::Workspace;

/// Lifecycle state of a running scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pristine,
    Mutated,
    /// Holds the number of generations created so far.
    Created(usize),
    Restored,
    Verified,
    Failed,
    CleanedUp,
}

/// One comparison made by a verify step.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub left: String,
    pub right: String,
    pub diff: SnapshotDiff,
    /// Empty when the diff was as expected.
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Serializable summary of a failure.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub passed: bool,
    /// Every state the scenario went through, in order.
    pub states: Vec<ScenarioState>,
    pub generations: Vec<Generation>,
    pub verifications: Vec<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(skip)]
    pub error: Option<FsvError>,
    #[serde(skip)]
    failed_step: Option<String>,
}

impl ScenarioReport {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            passed: false,
            states: Vec::new(),
            generations: Vec::new(),
            verifications: Vec::new(),
            failure: None,
            error: None,
            failed_step: None,
        }
    }

    fn transition(&mut self, state: ScenarioState) {
        log::debug!("Scenario '{}' -> {:?}", self.scenario, state);
        self.states.push(state);
    }

    fn finish(mut self, result: Result<(), FsvError>) -> Self {
        match result {
            Ok(()) => self.passed = true,
            Err(e) => {
                self.failure = Some(Failure {
                    error_type: e.error_type().to_string(),
                    message: e.to_string(),
                    step: self.failed_step.take(),
                });
                self.error = Some(e);
            }
        }
        self
    }

    /// Last state reached.
    pub fn final_state(&self) -> Option<ScenarioState> {
        self.states.last().copied()
    }

    /// Turn a failed report back into its error.
    pub fn into_result(self) -> Result<Self, FsvError> {
        match self.error.clone() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Drives an archiver through scenarios in a workspace.
pub struct Orchestrator {
    workspace: Workspace,
    archiver: Box<dyn Archiver>,
    fixture: Box<dyn FixtureController>,
    clock: Arc<dyn Clock>,
    pacer: Pacer,
    subject: PathBuf,
    capture: CaptureOptions,
}

impl Orchestrator {
    pub fn new(
        workspace: Workspace,
        archiver: Box<dyn Archiver>,
        fixture: Box<dyn FixtureController>,
        config: &Config,
    ) -> Self {
        Self {
            workspace,
            archiver,
            fixture,
            clock: Arc::new(SystemClock),
            pacer: Pacer::new(config.pacing.min_interval()),
            subject: config.subject.clone(),
            capture: CaptureOptions::from(config),
        }
    }

    /// Orchestrator for the configured external archiver, working in `root`.
    pub fn for_command(config: &Config, root: &Path) -> Result<Self, FsvError> {
        let workspace = Workspace::at(root)?;
        let archiver = CommandArchiver::new(config.archiver.clone(), root);
        Ok(Self::new(
            workspace,
            Box::new(archiver),
            fixture::from_kind(config.fixture.kind),
            config,
        ))
    }

    /// Orchestrator for the in-process reference archiver.
    pub fn for_reference(config: &Config, root: &Path, clock: Arc<dyn Clock>) -> Result<Self, FsvError> {
        let workspace = Workspace::at(root)?;
        let archiver = ManifestArchiver::new(clock.clone());
        Ok(Self::new(
            workspace,
            Box::new(archiver),
            fixture::from_kind(config.fixture.kind),
            config,
        )
        .with_clock(clock))
    }

    /// Replace the clock used for pacing and timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn subject(&self) -> &Path {
        &self.subject
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn archiver_name(&self) -> &str {
        self.archiver.name()
    }

    /// Reset the subject through the fixture controller.
    pub fn reset_fixture(&self) -> Result<(), FsvError> {
        self.fixture.reset(self.workspace.root(), &self.subject)
    }

    /// Run the archiver in create mode and register the generation it made.
    pub fn create(
        &mut self,
        sources: &[PathBuf],
        excludes: &[String],
        force_full: bool,
    ) -> Result<Generation, FsvError> {
        ExclusionSet::check(excludes)?;
        let root = self.workspace.root().to_path_buf();
        let convention = self.archiver.convention().clone();
        let before: BTreeSet<String> = convention.list(&root)?.into_iter().collect();

        self.pacer.wait_turn(self.clock.as_ref());
        let created_at = self.clock.now();
        let invocation = self.archiver.create(&CreateRequest {
            workdir: &root,
            sources,
            excludes,
            force_full,
        })?;
        ensure_success("create", &invocation)?;

        let newest = convention
            .newest(&root)?
            .ok_or_else(|| FsvError::no_new_artifact(&root))?;
        if before.contains(&newest) || self.workspace.is_registered(&newest) {
            return Err(FsvError::no_new_artifact(&root));
        }

        let kind = if force_full || before.is_empty() {
            ArchiveKind::Full
        } else {
            ArchiveKind::Delta
        };
        let generation = Generation {
            ordinal: self.workspace.generations().len(),
            artifact: newest,
            kind,
            created_at,
        };
        log::info!("Created generation {}", generation);
        self.workspace.register(generation.clone());
        Ok(generation)
    }

    /// Restore a generation into a fresh directory labelled `label`.
    pub fn restore(&mut self, generation: &Generation, label: &str) -> Result<PathBuf, FsvError> {
        let dest = self.workspace.fresh_restore_dir(label)?;
        let invocation = self.archiver.restore(&RestoreRequest {
            workdir: self.workspace.root(),
            artifact: &generation.artifact,
            dest: &dest,
        })?;
        ensure_success("restore", &invocation)?;
        log::info!("Restored generation {} into {}", generation, dest.display());
        Ok(dest)
    }

    /// Look up a generation of the running scenario.
    pub fn resolve(&self, reference: GenerationRef) -> Result<Generation, FsvError> {
        let generations = self.workspace.generations();
        let found = match reference {
            GenerationRef::Latest => generations.last(),
            GenerationRef::Previous => generations
                .len()
                .checked_sub(2)
                .and_then(|i| generations.get(i)),
            GenerationRef::Index(i) => generations.get(i),
        };
        found
            .cloned()
            .ok_or_else(|| FsvError::unknown_generation(reference.to_string()))
    }

    /// Capture the subject within a tree.
    pub fn snapshot(&self, tree: &TreeRef) -> Result<Snapshot, FsvError> {
        let base = match tree {
            TreeRef::Source => self.workspace.root(),
            TreeRef::Restored(label) => self
                .workspace
                .restore_dir(label)
                .ok_or_else(|| FsvError::config(format!("no restore labelled '{}'", label)))?,
        };
        capture_with(base, &self.subject, self.capture)
    }

    /// Compare two trees against an expectation.
    pub fn verify(
        &self,
        left: &TreeRef,
        right: &TreeRef,
        expect: &Expectation,
    ) -> Result<Verification, FsvError> {
        let left_snap = self.snapshot(left)?;
        let right_snap = self.snapshot(right)?;
        let actual = diff(&left_snap, &right_snap);
        let expected = match expect {
            Expectation::Identical => SnapshotDiff::default(),
            Expectation::Entries(entries) => entries.clone(),
            Expectation::Excluded(patterns) => {
                let expected = expected_exclusions(&left_snap, &ExclusionSet::new(patterns)?);
                if expected.is_empty() {
                    return Err(FsvError::config(format!(
                        "exclusion patterns [{}] match nothing in {}",
                        patterns.join(", "),
                        left
                    )));
                }
                expected
            }
        };
        let mismatches = actual.mismatches_against(&expected);
        log::info!(
            "Verified {} vs {}: {} differences, {} unexpected",
            left,
            right,
            actual.len(),
            mismatches.len()
        );
        Ok(Verification {
            left: left.to_string(),
            right: right.to_string(),
            diff: actual,
            mismatches,
        })
    }

    /// Run a scenario, returning its report whatever the outcome.
    pub fn run_scenario_report(&mut self, scenario: &Scenario) -> ScenarioReport {
        log::info!("Scenario '{}' starting", scenario.name);
        let mut report = ScenarioReport::new(&scenario.name);

        let outcome = self.execute(scenario, &mut report);
        if let Err(e) = &outcome {
            log::warn!("Scenario '{}' failed: {}", scenario.name, e);
            report.transition(ScenarioState::Failed);
        }
        report.generations = self.workspace.generations().to_vec();

        let teardown = self.teardown();
        report.transition(ScenarioState::CleanedUp);

        let result = match (outcome, teardown) {
            (Err(e), Err(t)) => {
                log::warn!("Teardown of '{}' also failed: {}", scenario.name, t);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(t)) => Err(t),
            (Ok(()), Ok(())) => Ok(()),
        };
        let report = report.finish(result);
        log::info!(
            "Scenario '{}' {}",
            scenario.name,
            if report.passed { "passed" } else { "failed" }
        );
        report
    }

    /// Run a scenario; a failure is returned as the error after teardown.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> Result<ScenarioReport, FsvError> {
        self.run_scenario_report(scenario).into_result()
    }

    /// Run scenarios one after another.
    pub fn run_all(&mut self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        scenarios
            .iter()
            .map(|s| self.run_scenario_report(s))
            .collect()
    }

    fn execute(&mut self, scenario: &Scenario, report: &mut ScenarioReport) -> Result<(), FsvError> {
        self.claim_workspace()?;
        self.reset_fixture()?;
        report.transition(ScenarioState::Pristine);
        for (index, step) in scenario.steps.iter().enumerate() {
            let label = format!("{}: {}", index + 1, step.describe());
            log::debug!("Scenario '{}' step {}", scenario.name, label);
            if let Err(e) = self.run_step(step, &label, report) {
                report.failed_step = Some(label);
                return Err(e);
            }
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step, label: &str, report: &mut ScenarioReport) -> Result<(), FsvError> {
        match step {
            Step::WriteFile { path, contents } => {
                self.workspace.write_file(path, contents.as_bytes())?;
                report.transition(ScenarioState::Mutated);
            }
            Step::Remove { path } => {
                self.workspace.remove(path)?;
                report.transition(ScenarioState::Mutated);
            }
            Step::Create {
                sources,
                excludes,
                force_full,
            } => {
                let sources = if sources.is_empty() {
                    vec![self.subject.clone()]
                } else {
                    sources.clone()
                };
                self.create(&sources, excludes, *force_full)?;
                report.transition(ScenarioState::Created(self.workspace.generations().len()));
            }
            Step::Restore { generation, label } => {
                let generation = self.resolve(*generation)?;
                self.restore(&generation, label)?;
                report.transition(ScenarioState::Restored);
            }
            Step::Verify {
                left,
                right,
                expect,
            } => {
                let verification = self.verify(left, right, expect)?;
                let mismatches = verification.mismatches.clone();
                report.verifications.push(verification);
                if !mismatches.is_empty() {
                    return Err(FsvError::assertion(label, mismatches));
                }
                report.transition(ScenarioState::Verified);
            }
            Step::ExpectGenerations { kinds } => {
                let actual: Vec<ArchiveKind> =
                    self.workspace.generations().iter().map(|g| g.kind).collect();
                if actual.len() != kinds.len() {
                    return Err(FsvError::generation_count(label, kinds.len(), actual.len()));
                }
                if &actual != kinds {
                    return Err(FsvError::generation_kinds(
                        label,
                        join_kinds(kinds),
                        join_kinds(&actual),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Refuse to start while artifacts of the archiver's convention are
    /// already present. Those artifacts are kept out of teardown.
    fn claim_workspace(&mut self) -> Result<(), FsvError> {
        let existing = self.archiver.convention().list(self.workspace.root())?;
        if existing.is_empty() {
            return Ok(());
        }
        self.workspace.preserve(existing.iter().cloned());
        Err(FsvError::preexisting_artifacts(self.workspace.root(), existing))
    }

    /// Remove artifacts and restore directories, then reset the fixture.
    fn teardown(&mut self) -> Result<(), FsvError> {
        let convention = self.archiver.convention().clone();
        let cleaned = self.workspace.clean(&convention);
        let reset = self.reset_fixture();
        if let Err(e) = &reset {
            log::warn!("Fixture reset failed: {}", e);
        }
        cleaned.and(reset)
    }
}

fn ensure_success(operation: &str, invocation: &Invocation) -> Result<(), FsvError> {
    if invocation.success() {
        return Ok(());
    }
    let stderr = invocation.stderr.trim();
    Err(FsvError::archiver(
        operation,
        if stderr.is_empty() {
            format!("exited with code {}", invocation.exit_code)
        } else {
            format!("exited with code {}: {}", invocation.exit_code, stderr)
        },
    ))
}

fn join_kinds(kinds: &[ArchiveKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expected diff when `exclusions` were applied at create time: every
/// excluded entry of `left` is missing on the right.
pub fn expected_exclusions(left: &Snapshot, exclusions: &ExclusionSet) -> SnapshotDiff {
    use fsv_core::{DiffEntry, EntryKind};

    let mut out = SnapshotDiff::default();
    let excluded = |p: &Path| exclusions.is_excluded(p);
    for path in left.files.keys().filter(|p| excluded(p)) {
        out.map_mut(EntryKind::File)
            .insert(path.clone(), DiffEntry::MissingInRight);
    }
    for path in left.dirs.iter().filter(|p| excluded(p)) {
        out.map_mut(EntryKind::Dir)
            .insert(path.clone(), DiffEntry::MissingInRight);
    }
    for path in left.specials.keys().filter(|p| excluded(p)) {
        out.map_mut(EntryKind::Special)
            .insert(path.clone(), DiffEntry::MissingInRight);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsv_core::{EntryKind, HashAlgo};

    #[test]
    fn test_expected_exclusions_by_glob() {
        let left = Snapshot::new(HashAlgo::Blake3)
            .with_dir("test_data")
            .with_dir("test_data/abc")
            .with_file("test_data/a.txt", "1")
            .with_file("test_data/abc/something.txt", "2");
        let set = ExclusionSet::new(["*something.txt"]).unwrap();

        let expected = expected_exclusions(&left, &set);
        assert_eq!(expected.len(), 1);
        assert!(expected
            .missing_in_right(EntryKind::File)
            .contains(Path::new("test_data/abc/something.txt")));
    }

    #[test]
    fn test_excluded_directory_takes_subtree() {
        let left = Snapshot::new(HashAlgo::Blake3)
            .with_dir("test_data")
            .with_dir("test_data/abc")
            .with_file("test_data/abc/something.txt", "2");
        let set = ExclusionSet::new(["abc"]).unwrap();

        let expected = expected_exclusions(&left, &set);
        assert_eq!(expected.dirs.len(), 1);
        assert_eq!(expected.files.len(), 1);
    }

    #[test]
    fn test_failed_invocation_carries_stderr() {
        let inv = Invocation {
            exit_code: 2,
            stderr: "boom\n".into(),
            ..Default::default()
        };
        let err = ensure_success("restore", &inv).unwrap_err();
        assert_eq!(err.error_type(), "archiver_invocation");
        assert!(err.to_string().contains("exited with code 2: boom"));
    }
}
