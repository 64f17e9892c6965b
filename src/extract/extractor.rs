use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::SymwpError;
use super::patterns::{ClassPattern, VulnClass};

/// An ordered assignment of concrete values to the harness's symbolic
/// argument slots.
pub type ArgTuple = Vec<String>;

/// Lines containing this text indicate engine-internal I/O instability under
/// concurrent load, not job failure.
pub const FATAL_ERROR_MARKER: &str = "Fatal error";

/// Number of fatal-error lines after which a single extraction pass gives up
/// on the current output.
pub const FATAL_ERROR_THRESHOLD: u64 = 10_000;

/// File the engine's standard output is redirected to, scoped per project.
pub const OUTPUT_LOG_NAME: &str = "stdout.txt";

/// Candidate tuples grouped by vulnerability class, rebuilt from scratch on
/// every extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCaseBucket {
    classes: HashMap<VulnClass, HashSet<ArgTuple>>,
}

impl TestCaseBucket {
    pub fn insert(&mut self, class: VulnClass, tuple: ArgTuple) {
        self.classes.entry(class).or_default().insert(tuple);
    }

    pub fn count(&self, class: VulnClass) -> usize {
        self.classes.get(&class).map_or(0, |set| set.len())
    }

    pub fn has_candidates(&self) -> bool {
        self.classes.values().any(|set| !set.is_empty())
    }

    /// Tuples for one class in a stable order, for diagnostics and artifacts.
    pub fn sorted_tuples(&self, class: VulnClass) -> Vec<&ArgTuple> {
        let mut tuples: Vec<&ArgTuple> = self
            .classes
            .get(&class)
            .map(|set| set.iter().collect())
            .unwrap_or_default();
        tuples.sort();
        tuples
    }

    /// Drop tuples shorter than the longest one observed for their class.
    /// A short tuple means the engine was still writing the record when it
    /// was read.
    pub fn retain_complete(&mut self) {
        for set in self.classes.values_mut() {
            if let Some(max) = set.iter().map(|tuple| tuple.len()).max() {
                set.retain(|tuple| tuple.len() == max);
            }
        }
    }
}

/// Outcome of one extraction pass over a job's output.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// The scan finished; candidate tuples are grouped by class.
    Complete(TestCaseBucket),
    /// The fatal-error threshold was reached and the pass was abandoned.
    /// The output is currently too noisy to parse; the job itself may keep
    /// running.
    Fatal { fatal_errors: u64 },
}

/// Parses the engine's incremental output into candidate argument tuples.
#[derive(Clone)]
pub struct TestCaseExtractor {
    patterns: std::sync::Arc<Vec<ClassPattern>>,
}

impl TestCaseExtractor {
    pub fn new() -> Self {
        Self {
            patterns: std::sync::Arc::new(ClassPattern::table()),
        }
    }

    /// Scan every output log currently under the project directory.
    ///
    /// Safe to call repeatedly while the engine is still appending: a torn
    /// trailing record matches no pattern and is picked up once complete on
    /// a later pass.
    pub fn extract(&self, project_dir: &Path) -> Result<ExtractOutcome, SymwpError> {
        let mut bucket = TestCaseBucket::default();
        let mut fatal_errors: u64 = 0;

        for log in find_output_logs(project_dir)? {
            // The log may rotate or vanish between listing and open.
            let file = match File::open(&log) {
                Ok(file) => file,
                Err(_) => continue,
            };

            let mut reader = BufReader::new(file);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
                let line = String::from_utf8_lossy(&raw);

                if line.contains(FATAL_ERROR_MARKER) {
                    fatal_errors += 1;
                    if fatal_errors >= FATAL_ERROR_THRESHOLD {
                        warn!(
                            fatal_errors,
                            log = %log.display(),
                            "Fatal-error threshold reached, abandoning extraction pass"
                        );
                        return Ok(ExtractOutcome::Fatal { fatal_errors });
                    }
                    continue;
                }

                for pattern in self.patterns.iter() {
                    if let Some(tuple) = pattern.match_line(&line) {
                        bucket.insert(pattern.class, tuple);
                        break;
                    }
                }
            }
        }

        bucket.retain_complete();
        Ok(ExtractOutcome::Complete(bucket))
    }
}

impl Default for TestCaseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a tuple for diagnostics and artifact files, e.g. `("a", "b")`.
pub fn format_tuple(tuple: &ArgTuple) -> String {
    let values: Vec<String> = tuple.iter().map(|v| format!("{:?}", v)).collect();
    format!("({})", values.join(", "))
}

fn find_output_logs(project_dir: &Path) -> Result<Vec<PathBuf>, SymwpError> {
    let pattern = project_dir.join("**").join(OUTPUT_LOG_NAME);
    let pattern = pattern.to_string_lossy();
    let mut logs: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| SymwpError::Extraction(format!("Bad log pattern {}: {}", pattern, e)))?
        .filter_map(Result::ok)
        .collect();
    logs.sort();
    Ok(logs)
}
