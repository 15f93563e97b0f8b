//! fsv list command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use fsv_testkit::standard;

use crate::output::Output;

#[derive(Serialize, Tabled)]
struct ScenarioRow {
    #[tabled(rename = "Scenario")]
    name: String,
    #[tabled(rename = "Steps")]
    steps: usize,
    #[tabled(rename = "Description")]
    description: String,
}

/// List the standard scenarios.
pub fn run(output: &Output, subject: &Path) -> Result<bool> {
    let rows: Vec<ScenarioRow> = standard::all(subject)
        .into_iter()
        .map(|s| ScenarioRow {
            steps: s.steps.len(),
            name: s.name,
            description: s.description,
        })
        .collect();
    if output.is_json() {
        output.json(&rows);
    } else {
        output.table(&rows);
    }
    Ok(true)
}
