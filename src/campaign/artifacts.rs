use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::JobOutcome;
use crate::errors::SymwpError;
use crate::extract::{format_tuple, TestCaseBucket, VulnClass};
use crate::verify::Verdict;

/// Persisted record of one job, one row of the campaign summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub harness: String,
    pub project: String,
    pub trial: u32,
    pub outcome: JobOutcome,
    pub confirmed: bool,
    pub time_to_detection_secs: Option<f64>,
}

/// Machine-readable campaign result, written next to the per-job artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub plugin: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<JobRecord>,
}

impl CampaignSummary {
    pub fn confirmed_count(&self) -> usize {
        self.records.iter().filter(|record| record.confirmed).count()
    }
}

/// Write the per-class listing of confirmed-complete candidate tuples.
pub async fn write_args(
    dir: &Path,
    harness_file: &str,
    bucket: &TestCaseBucket,
) -> Result<PathBuf, SymwpError> {
    let mut text = String::new();
    for class in VulnClass::ALL {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(class.label());
        text.push_str(": ");
        let tuples: Vec<String> = bucket
            .sorted_tuples(class)
            .into_iter()
            .map(|tuple| format_tuple(tuple))
            .collect();
        text.push_str(&tuples.join(", "));
    }

    let path = dir.join(format!("{}.args", harness_file));
    tokio::fs::write(&path, text).await?;
    Ok(path)
}

/// Write the full verifier diagnostic text.
pub async fn write_dynamic(
    dir: &Path,
    harness_file: &str,
    verdict: &Verdict,
) -> Result<PathBuf, SymwpError> {
    let path = dir.join(format!("{}.dynamic", harness_file));
    tokio::fs::write(&path, &verdict.text).await?;
    Ok(path)
}

/// Write the time-to-detection report produced when a job stops early.
pub async fn write_time_to_bug(
    dir: &Path,
    harness_file: &str,
    time_to_detection: Duration,
    harness_path: &Path,
    project: &str,
    trial: u32,
) -> Result<PathBuf, SymwpError> {
    let secs = time_to_detection.as_secs_f64();
    let text = format!(
        "Time-to-bug: {:.2} seconds ({:.2} minutes)\nHarness: {}\nProject: {}\nIteration: {}\n",
        secs,
        secs / 60.0,
        harness_path.display(),
        project,
        trial,
    );

    let path = dir.join(format!("{}.time_to_bug", harness_file));
    tokio::fs::write(&path, text).await?;
    Ok(path)
}

/// Persist the campaign summary as JSON.
pub async fn write_summary(dir: &Path, summary: &CampaignSummary) -> Result<PathBuf, SymwpError> {
    let path = dir.join("campaign.json");
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
