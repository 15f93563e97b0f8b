//! Integration tests for full archive lifecycles.
//!
//! These tests run the standard scenarios end to end against the reference
//! archiver in temp workspaces, with a manual clock so pacing never sleeps.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use fs_err as fs;
    use fsv_core::{
        ArchiveKind, Clock, Config, EntryKind, FsvError, ManualClock, PacingConfig,
    };

    use crate::archiver::{Archiver, ArtifactConvention, CreateRequest, Invocation, RestoreRequest};
    use crate::fixture::SeededFixture;
    use crate::orchestrator::{Orchestrator, ScenarioState};
    use crate::reference::ManifestArchiver;
    use crate::scenario::{standard, Expectation, GenerationRef, Scenario, TreeRef};
    use crate::workspace::{Workspace, RESTORE_DIR_PREFIX};

    const START: i64 = 1_700_000_000;

    fn config(min_interval_ms: u64) -> Config {
        Config {
            pacing: PacingConfig { min_interval_ms },
            ..Config::default()
        }
    }

    fn orchestrator_with(
        archiver: Box<dyn Archiver>,
        clock: Arc<ManualClock>,
        min_interval_ms: u64,
    ) -> Orchestrator {
        let _ = env_logger::builder().is_test(true).try_init();
        Orchestrator::new(
            Workspace::temp().unwrap(),
            archiver,
            Box::new(SeededFixture::baseline()),
            &config(min_interval_ms),
        )
        .with_clock(clock)
    }

    fn reference() -> (Orchestrator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(ManifestArchiver::new(clock.clone()));
        (orchestrator_with(archiver, clock.clone(), 1100), clock)
    }

    fn nested(archiver: Box<dyn Archiver>, clock: Arc<ManualClock>) -> Orchestrator {
        let config = Config {
            subject: "fixtures/test_data".into(),
            ..config(1100)
        };
        Orchestrator::new(
            Workspace::temp().unwrap(),
            archiver,
            Box::new(SeededFixture::baseline()),
            &config,
        )
        .with_clock(clock)
    }

    fn subject() -> &'static Path {
        Path::new("test_data")
    }

    fn leftovers(orchestrator: &Orchestrator) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(orchestrator.workspace().root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "test_data")
            .collect();
        names.sort();
        names
    }

    /// Reference archiver whose restore silently drops one path.
    struct LossyArchiver {
        inner: ManifestArchiver,
        drop: &'static str,
    }

    impl Archiver for LossyArchiver {
        fn name(&self) -> &str {
            "lossy"
        }

        fn convention(&self) -> &ArtifactConvention {
            self.inner.convention()
        }

        fn create(&self, request: &CreateRequest<'_>) -> Result<Invocation, FsvError> {
            self.inner.create(request)
        }

        fn restore(&self, request: &RestoreRequest<'_>) -> Result<Invocation, FsvError> {
            let invocation = self.inner.restore(request)?;
            fs::remove_file(request.dest.join(self.drop))?;
            Ok(invocation)
        }
    }

    /// Reference archiver that drops every exclusion pattern.
    struct IgnoresExcludes {
        inner: ManifestArchiver,
    }

    impl Archiver for IgnoresExcludes {
        fn name(&self) -> &str {
            "ignores-excludes"
        }

        fn convention(&self) -> &ArtifactConvention {
            self.inner.convention()
        }

        fn create(&self, request: &CreateRequest<'_>) -> Result<Invocation, FsvError> {
            self.inner.create(&CreateRequest {
                excludes: &[],
                ..*request
            })
        }

        fn restore(&self, request: &RestoreRequest<'_>) -> Result<Invocation, FsvError> {
            self.inner.restore(request)
        }
    }

    fn ignoring_excludes(clock: &Arc<ManualClock>) -> Box<dyn Archiver> {
        Box::new(IgnoresExcludes {
            inner: ManifestArchiver::new(clock.clone()),
        })
    }

    /// Archiver that exits cleanly without writing anything.
    struct SilentArchiver {
        convention: ArtifactConvention,
        exit_code: i32,
    }

    impl Archiver for SilentArchiver {
        fn name(&self) -> &str {
            "silent"
        }

        fn convention(&self) -> &ArtifactConvention {
            &self.convention
        }

        fn create(&self, _request: &CreateRequest<'_>) -> Result<Invocation, FsvError> {
            Ok(Invocation {
                exit_code: self.exit_code,
                stderr: "disk full".into(),
                ..Default::default()
            })
        }

        fn restore(&self, _request: &RestoreRequest<'_>) -> Result<Invocation, FsvError> {
            Ok(Invocation::ok(""))
        }
    }

    // ============================================================================
    // Standard scenarios
    // ============================================================================

    #[test]
    fn test_standard_suite_passes_against_reference() {
        let (mut orchestrator, _clock) = reference();
        let reports = orchestrator.run_all(&standard::all(subject()));

        assert_eq!(reports.len(), 7);
        for report in &reports {
            assert!(report.passed, "{} failed: {:?}", report.scenario, report.failure);
            assert_eq!(report.final_state(), Some(ScenarioState::CleanedUp));
        }
        assert!(leftovers(&orchestrator).is_empty());
    }

    #[test]
    fn test_base_roundtrip_states() {
        let (mut orchestrator, _clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::base_roundtrip())
            .unwrap();

        assert_eq!(
            report.states,
            vec![
                ScenarioState::Pristine,
                ScenarioState::Created(1),
                ScenarioState::Restored,
                ScenarioState::Verified,
                ScenarioState::CleanedUp,
            ]
        );
        assert_eq!(report.generations.len(), 1);
        assert_eq!(report.generations[0].artifact, "fsarc_1700000000.json");
        assert!(report.verifications[0].diff.is_empty());
    }

    #[test]
    fn test_subtractive_delta_cross_generation() {
        let (mut orchestrator, _clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::subtractive_delta(subject()))
            .unwrap();

        let kinds: Vec<_> = report.generations.iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![ArchiveKind::Full, ArchiveKind::Delta]);

        let previous = &report.verifications[1];
        assert_eq!(previous.right, "restored:previous");
        assert!(previous
            .diff
            .missing_in_left(EntryKind::File)
            .contains(Path::new("test_data/a.txt")));
        assert_eq!(previous.diff.len(), 1);

        // Teardown puts the removed file back.
        assert!(orchestrator.workspace().path("test_data/a.txt").is_file());
    }

    #[test]
    fn test_exclusion_by_exact_path() {
        let (mut orchestrator, _clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::exclude_path(subject()))
            .unwrap();

        let diff = &report.verifications[0].diff;
        let missing: Vec<_> = diff.missing_in_right(EntryKind::File).into_iter().collect();
        assert_eq!(missing, vec![Path::new("test_data/a.txt")]);
        assert!(diff.dirs.is_empty());
    }

    #[test]
    fn test_exclusion_by_glob() {
        let (mut orchestrator, _clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::exclude_glob(subject()))
            .unwrap();

        let diff = &report.verifications[0].diff;
        let missing: Vec<_> = diff.missing_in_right(EntryKind::File).into_iter().collect();
        assert_eq!(
            missing,
            vec![
                Path::new("test_data/abc/def/something.txt"),
                Path::new("test_data/abc/something.txt"),
            ]
        );
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_exclusions_ignored_by_archiver_fail() {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let mut orchestrator = orchestrator_with(ignoring_excludes(&clock), clock, 1100);

        let err = orchestrator
            .run_scenario(&standard::exclude_path(subject()))
            .unwrap_err();
        assert!(err.is_assertion_failure());
        let mismatches = err.mismatches();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, Path::new("test_data/a.txt"));
        assert_eq!(mismatches[0].actual, None);

        let err = orchestrator
            .run_scenario(&standard::exclude_glob(subject()))
            .unwrap_err();
        assert_eq!(err.mismatches().len(), 2);
    }

    #[test]
    fn test_exclusions_under_nested_subject() {
        let nested_subject = Path::new("fixtures/test_data");

        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(ManifestArchiver::new(clock.clone()));
        let mut orchestrator = nested(archiver, clock);
        let report = orchestrator
            .run_scenario(&standard::exclude_path(nested_subject))
            .unwrap();
        let missing: Vec<_> = report.verifications[0]
            .diff
            .missing_in_right(EntryKind::File)
            .into_iter()
            .collect();
        assert_eq!(missing, vec![Path::new("fixtures/test_data/a.txt")]);

        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let mut orchestrator = nested(ignoring_excludes(&clock), clock);
        let report = orchestrator.run_scenario_report(&standard::exclude_path(nested_subject));
        assert!(!report.passed);
        assert_eq!(report.failure.unwrap().error_type, "assertion_failure");
    }

    #[test]
    fn test_exclusion_matching_nothing_is_rejected() {
        let (mut orchestrator, _clock) = reference();
        let scenario = Scenario::builder("excludes_nothing")
            .create_with(&["*.nowhere"], false)
            .restore(GenerationRef::Latest, "r")
            .verify(
                TreeRef::Source,
                TreeRef::Restored("r".into()),
                Expectation::Excluded(vec!["*.nowhere".into()]),
            )
            .build();

        let err = orchestrator.run_scenario(&scenario).unwrap_err();
        assert_eq!(err.error_type(), "config_error");
        assert!(err.to_string().contains("match nothing"));
    }

    #[test]
    fn test_modified_delta_first_generation_differs() {
        let (mut orchestrator, _clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::modified_delta(subject()))
            .unwrap();

        assert!(report.verifications[1]
            .diff
            .content_differs(EntryKind::File)
            .contains(Path::new("test_data/a.txt")));
    }

    // ============================================================================
    // Pacing
    // ============================================================================

    #[test]
    fn test_creates_are_paced_without_real_sleep() {
        let (mut orchestrator, clock) = reference();
        let report = orchestrator
            .run_scenario(&standard::additive_delta(subject()))
            .unwrap();

        assert_eq!(clock.total_slept(), Duration::from_millis(1100));
        let gap = report.generations[1].created_at - report.generations[0].created_at;
        assert!(gap.to_std().unwrap() >= Duration::from_millis(1100));
        assert_ne!(report.generations[0].artifact, report.generations[1].artifact);
    }

    #[test]
    fn test_pacing_holds_across_scenarios() {
        let (mut orchestrator, clock) = reference();
        orchestrator.run_scenario(&standard::base_roundtrip()).unwrap();
        orchestrator.run_scenario(&standard::base_roundtrip()).unwrap();

        assert_eq!(clock.total_slept(), Duration::from_millis(1100));
        assert_eq!(orchestrator.pacer().last(), Some(clock.now()));
    }

    #[test]
    fn test_without_pacing_artifacts_collide() {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(ManifestArchiver::new(clock.clone()));
        let mut orchestrator = orchestrator_with(archiver, clock, 0);

        let report = orchestrator.run_scenario_report(&standard::additive_delta(subject()));
        assert!(!report.passed);
        let failure = report.failure.unwrap();
        assert_eq!(failure.error_type, "archiver_invocation");
        assert_eq!(failure.step.as_deref(), Some("3: create"));
    }

    // ============================================================================
    // Failures and teardown
    // ============================================================================

    #[test]
    fn test_lossy_restore_is_assertion_failure() {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(LossyArchiver {
            inner: ManifestArchiver::new(clock.clone()),
            drop: "test_data/abc/something.txt",
        });
        let mut orchestrator = orchestrator_with(archiver, clock, 1100);

        let err = orchestrator
            .run_scenario(&standard::base_roundtrip())
            .unwrap_err();
        assert!(err.is_assertion_failure());
        let mismatches = err.mismatches();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, Path::new("test_data/abc/something.txt"));
        assert_eq!(mismatches[0].expected, None);

        // Teardown ran despite the failure.
        assert!(leftovers(&orchestrator).is_empty());
        assert!(orchestrator.workspace().generations().is_empty());
    }

    #[test]
    fn test_no_new_artifact() {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(SilentArchiver {
            convention: ArtifactConvention::new("fsarc_", ".zip"),
            exit_code: 0,
        });
        let mut orchestrator = orchestrator_with(archiver, clock, 1100);

        let report = orchestrator.run_scenario_report(&standard::base_roundtrip());
        assert_eq!(report.error.unwrap().error_type(), "no_new_artifact");
        assert_eq!(
            report.states,
            vec![
                ScenarioState::Pristine,
                ScenarioState::Failed,
                ScenarioState::CleanedUp
            ]
        );
    }

    #[test]
    fn test_archiver_exit_code_is_reported() {
        let clock = Arc::new(ManualClock::at_epoch_secs(START));
        let archiver = Box::new(SilentArchiver {
            convention: ArtifactConvention::new("fsarc_", ".zip"),
            exit_code: 1,
        });
        let mut orchestrator = orchestrator_with(archiver, clock, 1100);

        let err = orchestrator
            .run_scenario(&standard::base_roundtrip())
            .unwrap_err();
        assert!(err.is_archiver_error());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_unknown_generation() {
        let (mut orchestrator, _clock) = reference();
        let scenario = Scenario::builder("previous_of_one")
            .create()
            .restore(GenerationRef::Previous, "prev")
            .build();

        let err = orchestrator.run_scenario(&scenario).unwrap_err();
        assert_eq!(err.error_type(), "unknown_generation");
    }

    #[test]
    fn test_generation_count_mismatch() {
        let (mut orchestrator, _clock) = reference();
        let scenario = Scenario::builder("count")
            .create()
            .expect_generations(&[ArchiveKind::Full, ArchiveKind::Delta])
            .build();

        let err = orchestrator.run_scenario(&scenario).unwrap_err();
        assert!(err.is_assertion_failure());
        assert!(err.to_string().contains("expected 2 generations, found 1"));
    }

    #[test]
    fn test_non_empty_restore_target() {
        let (mut orchestrator, _clock) = reference();
        let stale = orchestrator
            .workspace()
            .path(format!("{}base", RESTORE_DIR_PREFIX));
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("junk"), "left over").unwrap();

        let err = orchestrator
            .run_scenario(&standard::base_roundtrip())
            .unwrap_err();
        assert_eq!(err.error_type(), "restore_target_not_empty");
    }

    #[test]
    fn test_preexisting_artifact_is_refused_and_kept() {
        let (mut orchestrator, _clock) = reference();
        let stale = orchestrator.workspace().path("fsarc_1600000000.json");
        fs::write(&stale, "someone else's archive").unwrap();

        let report = orchestrator.run_scenario_report(&standard::base_roundtrip());
        assert!(!report.passed);
        assert_eq!(report.failure.unwrap().error_type, "preexisting_artifacts");
        assert!(report.generations.is_empty());
        assert_eq!(
            report.states,
            vec![ScenarioState::Failed, ScenarioState::CleanedUp]
        );
        assert_eq!(fs::read_to_string(&stale).unwrap(), "someone else's archive");

        // Once the workspace is clear the same scenario runs normally.
        fs::remove_file(&stale).unwrap();
        let report = orchestrator
            .run_scenario(&standard::base_roundtrip())
            .unwrap();
        assert_eq!(report.generations[0].kind, ArchiveKind::Full);
    }

    #[test]
    fn test_restore_of_each_generation_reflects_its_time() {
        let (mut orchestrator, _clock) = reference();
        orchestrator.reset_fixture().unwrap();
        let sources = vec![subject().to_path_buf()];

        let first = orchestrator.create(&sources, &[], false).unwrap();
        orchestrator
            .workspace()
            .write_file("test_data/a.txt", b"second version\n")
            .unwrap();
        let second = orchestrator.create(&sources, &[], false).unwrap();
        assert_eq!((first.ordinal, second.ordinal), (0, 1));
        assert_eq!(second.kind, ArchiveKind::Delta);

        let dir0 = orchestrator.restore(&first, "g0").unwrap();
        let dir1 = orchestrator.restore(&second, "g1").unwrap();
        let baseline = SeededFixture::baseline();
        assert_eq!(
            fs::read(dir0.join("test_data/a.txt")).unwrap(),
            baseline.files()[Path::new("a.txt")]
        );
        assert_eq!(
            fs::read_to_string(dir1.join("test_data/a.txt")).unwrap(),
            "second version\n"
        );
    }
}
