//! fsv run command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tabled::Tabled;

use fsv_core::{Config, SystemClock};
use fsv_testkit::{standard, Orchestrator, Scenario, ScenarioReport};

use crate::output::Output;

/// Table row for run output.
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Scenario")]
    scenario: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Generations")]
    generations: String,
    #[tabled(rename = "Failure")]
    failure: String,
}

impl From<&ScenarioReport> for ReportRow {
    fn from(report: &ScenarioReport) -> Self {
        Self {
            scenario: report.scenario.clone(),
            result: if report.passed { "pass" } else { "FAIL" }.to_string(),
            generations: report
                .generations
                .iter()
                .map(|g| g.kind.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            failure: report
                .failure
                .as_ref()
                .map(|f| match &f.step {
                    Some(step) => format!("[{}] {}", step, f.message),
                    None => f.message.clone(),
                })
                .unwrap_or_default(),
        }
    }
}

/// Pick scenarios by name; no names means all of them.
fn select(all: Vec<Scenario>, names: &[String]) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(all);
    }
    let mut selected = Vec::new();
    for name in names {
        match all.iter().find(|s| &s.name == name) {
            Some(s) => selected.push(s.clone()),
            None => {
                let known: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
                bail!("unknown scenario '{}' (known: {})", name, known.join(", "));
            }
        }
    }
    Ok(selected)
}

/// Run scenarios against the configured archiver, or the reference one.
pub fn run(
    output: &Output,
    root: &Path,
    config: &Config,
    names: &[String],
    reference: bool,
) -> Result<bool> {
    let scenarios = select(standard::all(&config.subject), names)?;
    let mut orchestrator = if reference {
        Orchestrator::for_reference(config, root, Arc::new(SystemClock))?
    } else {
        Orchestrator::for_command(config, root)?
    };
    log::info!(
        "Running {} scenarios against {} in {}",
        scenarios.len(),
        orchestrator.archiver_name(),
        root.display()
    );

    let reports = orchestrator.run_all(&scenarios);
    let passed = reports.iter().filter(|r| r.passed).count();

    if output.is_json() {
        output.json(&reports);
    } else {
        let rows: Vec<ReportRow> = reports.iter().map(ReportRow::from).collect();
        output.table(&rows);
        for report in reports.iter().filter(|r| !r.passed) {
            for verification in report.verifications.iter().filter(|v| !v.passed()) {
                output.error(&format!(
                    "{}: {} vs {}",
                    report.scenario, verification.left, verification.right
                ));
                for mismatch in &verification.mismatches {
                    output.println(&format!("  {}", mismatch));
                }
            }
        }
        let summary = format!("{}/{} scenarios passed", passed, reports.len());
        if passed == reports.len() {
            output.success(&summary);
        } else {
            output.warn(&summary);
        }
    }
    Ok(passed == reports.len())
}
