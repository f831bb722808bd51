use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use juicer_core::page::KeyChord;

/// A scripted page session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoScenario {
    /// Location path the page starts at
    #[serde(default = "default_path")]
    pub path: String,

    /// How long to keep watching after the last step
    #[serde(default = "default_grace")]
    pub grace_ms: u64,

    #[serde(default)]
    pub steps: Vec<DemoStep>,
}

/// One page change at an offset from scenario start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoStep {
    pub at_ms: u64,
    pub action: DemoAction,
}

/// What a step does to the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DemoAction {
    /// Clear the document and move to another path
    Navigate { path: String },
    AddDetail { status: String },
    /// Swap the detail element for a fresh node
    ReplaceDetail { status: String },
    /// Change the detail element's text
    SetStatus { status: String },
    AddRow { row: String, status: String },
    SetRowStatus { row: String, status: String },
    RemoveRow { row: String },
    ClickRow { row: String },
    Key(KeyChord),
    Scroll { x: f64, y: f64 },
}

fn default_path() -> String {
    "/jira/software/projects/PROJ/boards/1".to_string()
}

fn default_grace() -> u64 {
    2000
}

/// Load a scenario file
///
/// An explicit path must exist. Without one, `<config dir>/juicer/scenario.toml`
/// is used when present, else the built-in scenario.
pub fn load_scenario(path: Option<&PathBuf>) -> Result<DemoScenario> {
    if let Some(p) = path {
        return read_scenario(p);
    }

    if let Some(p) = dirs::config_dir().map(|d| d.join("juicer/scenario.toml")) {
        if p.exists() {
            return read_scenario(&p);
        }
    }

    Ok(default_scenario())
}

fn read_scenario(path: &PathBuf) -> Result<DemoScenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {:?}", path))?;
    let mut scenario: DemoScenario = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;
    scenario.steps.sort_by_key(|s| s.at_ms);
    Ok(scenario)
}

fn step(at_ms: u64, action: DemoAction) -> DemoStep {
    DemoStep { at_ms, action }
}

fn set_row(row: &str, status: &str) -> DemoAction {
    DemoAction::SetRowStatus {
        row: row.to_string(),
        status: status.to_string(),
    }
}

/// Build the default scenario (~14 seconds, board then issue page)
pub fn default_scenario() -> DemoScenario {
    let add_row = |row: &str, status: &str| DemoAction::AddRow {
        row: row.to_string(),
        status: status.to_string(),
    };

    let steps = vec![
        // t=0: board with three issues, one already done
        step(0, add_row("PROJ-101", "To Do")),
        step(0, add_row("PROJ-102", "In Progress")),
        step(0, add_row("PROJ-103", "Done")),
        // t=2s: first real transition
        step(2000, set_row("PROJ-102", "Done")),
        // t=2.5s: status menu opened, moved to a non-target state
        step(
            2500,
            DemoAction::ClickRow {
                row: "PROJ-101".to_string(),
            },
        ),
        step(2600, set_row("PROJ-101", "In Progress")),
        step(3500, set_row("PROJ-101", "Dev Complete")),
        // t=4s: re-render of an already-done row
        step(4000, set_row("PROJ-103", "Done")),
        // t=4.5s: late row, changed before it is armed
        step(4500, add_row("PROJ-104", "In Review")),
        step(5000, set_row("PROJ-104", "Done")),
        // t=6.5s: open an issue
        step(
            6500,
            DemoAction::Navigate {
                path: "/browse/PROJ-102".to_string(),
            },
        ),
        step(
            6600,
            DemoAction::AddDetail {
                status: "In Progress".to_string(),
            },
        ),
        step(
            9000,
            DemoAction::SetStatus {
                status: "Done".to_string(),
            },
        ),
        // t=9.5s: the app re-renders the status button
        step(
            9500,
            DemoAction::ReplaceDetail {
                status: "In Progress".to_string(),
            },
        ),
        step(10500, DemoAction::Scroll { x: 0.0, y: 120.0 }),
        step(
            11000,
            DemoAction::SetStatus {
                status: "Done".to_string(),
            },
        ),
        // t=12s: manual trigger
        step(
            12000,
            DemoAction::Key(KeyChord::new("KeyJ").with_alt().with_shift()),
        ),
    ];

    DemoScenario {
        path: default_path(),
        grace_ms: default_grace(),
        steps,
    }
}
