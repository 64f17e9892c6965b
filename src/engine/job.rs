use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::extract::OUTPUT_LOG_NAME;

/// Everything needed to launch one engine run against one harness.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub project_name: String,
    pub project_dir: PathBuf,
    pub harness_path: PathBuf,
    pub argv_count: usize,
    /// Wall-clock budget enforced by the monitor, independent of the
    /// engine's own timeout flag.
    pub timeout: Duration,
    pub cores: u32,
    pub engine_command: String,
}

impl JobSpec {
    pub fn log_path(&self) -> PathBuf {
        self.project_dir.join(OUTPUT_LOG_NAME)
    }

    /// Timeout in whole minutes for the engine's own `-t` flag. The engine
    /// does not honor it reliably, so the monitor keeps its own deadline.
    pub fn timeout_minutes(&self) -> u64 {
        (self.timeout.as_secs().div_ceil(60)).max(1)
    }
}

/// Terminal state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobOutcome {
    /// The engine exited on its own before the deadline.
    Completed,
    /// The deadline elapsed and the process group was terminated.
    TimedOut,
    /// A confirmed vulnerability stopped the job before the deadline.
    StoppedEarly,
    /// A user interrupt stopped the job; the campaign stops with it.
    Interrupted,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed-out"),
            Self::StoppedEarly => write!(f, "stopped-early"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Per-job mutable monitoring state. Each job owns its own context; nothing
/// here is shared between concurrent jobs.
#[derive(Debug)]
pub struct JobContext {
    pub started_at: Instant,
    /// Fatal-error count reported by the most recent extraction pass.
    pub fatal_errors: u64,
    pub early_stop: bool,
    pub time_to_detection: Option<Duration>,
}

impl JobContext {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            fatal_errors: 0,
            early_stop: false,
            time_to_detection: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(timeout: Duration) -> JobSpec {
        JobSpec {
            project_name: "plugin_harness".to_string(),
            project_dir: PathBuf::from("/tmp/projects/plugin_harness"),
            harness_path: PathBuf::from("harness.php"),
            argv_count: 3,
            timeout,
            cores: 4,
            engine_command: "s2e".to_string(),
        }
    }

    #[test]
    fn test_timeout_minutes_rounds_up() {
        assert_eq!(spec(Duration::from_secs(90)).timeout_minutes(), 2);
        assert_eq!(spec(Duration::from_secs(1800)).timeout_minutes(), 30);
    }

    #[test]
    fn test_timeout_minutes_never_zero() {
        assert_eq!(spec(Duration::from_secs(1)).timeout_minutes(), 1);
    }

    #[test]
    fn test_log_path_scoped_to_project() {
        assert_eq!(
            spec(Duration::from_secs(60)).log_path(),
            PathBuf::from("/tmp/projects/plugin_harness/stdout.txt")
        );
    }
}
