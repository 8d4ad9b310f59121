//! Scenario files: named tests run one after another in one session.
//!
//! ```json
//! { "name": "viewport", "tests": [
//!     { "name": "syncs", "steps": [
//!         { "cmd": "viewport", "width": 320, "height": 480 },
//!         { "cmd": "switch_to_domain", "origin": "http://foobar.com:3500",
//!           "script": { "steps": [{ "cmd": "capture", "key": "vp", "probe": "viewport" }] },
//!           "capture": "foobar" }
//!     ] }
//! ] }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use xdomain_driver::{Script, Session};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("cannot read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub tests: Vec<ScenarioTest>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioTest {
    pub name: String,
    #[serde(flatten)]
    pub script: Script,
}

#[derive(Debug, Serialize)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub tests: Vec<TestOutcome>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.tests.iter().filter(|t| !t.passed).count()
    }
}

pub fn load(path: &Path) -> Result<Scenario, ScenarioError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ScenarioError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Run each test in the primary, with a test boundary after each one.
pub async fn run(session: &mut Session, scenario: &Scenario) -> Report {
    let mut tests = Vec::with_capacity(scenario.tests.len());

    for test in &scenario.tests {
        let result = session.run(&test.script).await;
        let boundary = session.end_test();

        let outcome = match (result, boundary) {
            (Ok(value), Ok(())) => TestOutcome {
                name: test.name.clone(),
                passed: true,
                value: Some(value),
                error: None,
            },
            (Err(e), _) | (Ok(_), Err(e)) => TestOutcome {
                name: test.name.clone(),
                passed: false,
                value: None,
                error: Some(e.to_string()),
            },
        };
        if outcome.passed {
            info!(test = %outcome.name, "passed");
        } else {
            warn!(test = %outcome.name, error = ?outcome.error, "failed");
        }
        tests.push(outcome);
    }

    Report {
        scenario: scenario.name.clone(),
        tests,
    }
}
