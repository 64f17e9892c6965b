use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{JobOutcome, JobRunner, JobSpec, MonitorLoop};
use crate::errors::SymwpError;
use crate::extract::{ExtractOutcome, TestCaseExtractor};
use crate::harness::{self, Harness};
use crate::project::{resolve_tracker_addresses, ProjectBuilder};
use crate::verify::DynamicVerifier;
use super::artifacts::{self, CampaignSummary, JobRecord};
use super::preflight;

/// Fully resolved campaign configuration: CLI flags merged with the
/// optional config file and environment.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub plugin_dir: PathBuf,
    pub timeout_minutes: u64,
    pub argv_fill_length: usize,
    pub cores: u32,
    /// Normalized include filter; None analyzes every harness.
    pub include: Option<String>,
    pub stop_if_found: bool,
    pub iterations: u32,
    pub use_wp_loader: bool,
    pub output_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub engine_command: String,
    pub objdump_command: String,
    pub php_executable: PathBuf,
    pub xss_checker: PathBuf,
    pub sqli_checker: PathBuf,
    pub harness_generator: PathBuf,
    pub bootstrap_template: PathBuf,
}

impl CampaignSettings {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    /// Output directory for one trial. Single-trial campaigns write directly
    /// into the output directory.
    pub fn trial_output_dir(&self, trial: u32) -> PathBuf {
        if self.iterations > 1 {
            self.output_dir.join(format!("iteration_{}", trial))
        } else {
            self.output_dir.clone()
        }
    }

    /// Engine project name for one harness in one trial.
    pub fn project_name(&self, plugin_name: &str, harness: &Harness, trial: u32) -> String {
        if self.iterations > 1 {
            format!("{}_{}_iter{}", plugin_name, harness.stem(), trial)
        } else {
            format!("{}_{}", plugin_name, harness.stem())
        }
    }
}

/// Iterates the analysis over every harness and trial, aggregating per-job
/// outcomes.
pub struct CampaignDriver {
    settings: CampaignSettings,
    cancel: CancellationToken,
}

impl CampaignDriver {
    pub fn new(settings: CampaignSettings) -> Self {
        Self {
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the driver's cancel token with an external one (e.g. the
    /// CLI's Ctrl-C handler) so user interrupts reach the running job.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the whole campaign. Returns the persisted summary, or
    /// `SymwpError::Interrupted` after a user interrupt (the partial summary
    /// is still written out first).
    pub async fn run(&self) -> Result<CampaignSummary, SymwpError> {
        let settings = &self.settings;

        if !settings.plugin_dir.is_dir() {
            return Err(SymwpError::Config(format!(
                "Plugin folder {} does not exist",
                settings.plugin_dir.display()
            )));
        }
        let plugin_name = settings
            .plugin_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SymwpError::Config("Plugin folder has no name".to_string()))?;

        preflight::check(settings).await?;
        self.generate_harnesses().await?;

        let harnesses = harness::discover(&settings.plugin_dir, settings.include.as_deref())?;
        if harnesses.is_empty() {
            warn!(plugin = %plugin_name, "No harnesses with symbolic arguments to analyze");
        }
        info!(count = harnesses.len(), "Harnesses ready");

        let addresses =
            resolve_tracker_addresses(&settings.objdump_command, &settings.php_executable).await?;
        let builder = ProjectBuilder::new(settings, &addresses);
        let extractor = TestCaseExtractor::new();
        let verifier = DynamicVerifier::new(
            settings.php_executable.clone(),
            settings.xss_checker.clone(),
            settings.sqli_checker.clone(),
        );
        let monitor = MonitorLoop::new(verifier.clone(), self.cancel.clone());

        let started_at = Utc::now();
        let mut records: Vec<JobRecord> = Vec::new();
        let mut interrupted = false;

        'trials: for trial in 1..=settings.iterations {
            info!(trial, total = settings.iterations, "Starting trial");
            let out_dir = settings.trial_output_dir(trial);
            tokio::fs::create_dir_all(&out_dir).await?;

            for harness in &harnesses {
                info!(
                    harness = %harness.path.display(),
                    argv_count = harness.argv_count,
                    "Analyzing harness"
                );

                let project_name = settings.project_name(&plugin_name, harness, trial);
                let project_dir = builder.build(&plugin_name, harness, &project_name).await?;

                let spec = JobSpec {
                    project_name,
                    project_dir,
                    harness_path: harness.path.clone(),
                    argv_count: harness.argv_count,
                    timeout: settings.job_timeout(),
                    cores: settings.cores,
                    engine_command: settings.engine_command.clone(),
                };

                let mut handle = JobRunner::start(&spec).await?;
                let result = monitor
                    .run(&spec, &mut handle, settings.stop_if_found)
                    .await?;

                let harness_file = harness.file_name();
                let mut record = JobRecord {
                    harness: harness.path.display().to_string(),
                    project: spec.project_name.clone(),
                    trial,
                    outcome: result.outcome,
                    confirmed: result.outcome == JobOutcome::StoppedEarly,
                    time_to_detection_secs: result
                        .time_to_detection
                        .map(|ttd| ttd.as_secs_f64()),
                };

                match result.outcome {
                    JobOutcome::Interrupted => {
                        records.push(record);
                        interrupted = true;
                        break 'trials;
                    }
                    JobOutcome::StoppedEarly => {
                        let ttd = result.time_to_detection.unwrap_or_default();
                        artifacts::write_time_to_bug(
                            &out_dir,
                            &harness_file,
                            ttd,
                            &harness.path,
                            &record.project,
                            trial,
                        )
                        .await?;
                        records.push(record);
                        warn!(
                            trial,
                            "Vulnerability confirmed, skipping remaining harnesses in this trial"
                        );
                        break;
                    }
                    JobOutcome::Completed | JobOutcome::TimedOut => {
                        match extractor.extract(&spec.project_dir)? {
                            ExtractOutcome::Fatal { fatal_errors } => {
                                warn!(
                                    fatal_errors,
                                    trial, "Output log unparseable, abandoning this trial"
                                );
                                records.push(record);
                                break;
                            }
                            ExtractOutcome::Complete(bucket) => {
                                let verdict =
                                    verifier.verify(&harness.concrete_path(), &bucket).await;
                                record.confirmed = verdict.confirmed;
                                if verdict.confirmed {
                                    info!(
                                        harness = %harness_file,
                                        "Dynamic verification confirmed a vulnerability"
                                    );
                                }
                                artifacts::write_args(&out_dir, &harness_file, &bucket).await?;
                                artifacts::write_dynamic(&out_dir, &harness_file, &verdict).await?;
                                records.push(record);
                            }
                        }
                    }
                }
            }
        }

        let summary = CampaignSummary {
            plugin: plugin_name,
            started_at,
            finished_at: Utc::now(),
            records,
        };
        tokio::fs::create_dir_all(&settings.output_dir).await?;
        let summary_path = artifacts::write_summary(&settings.output_dir, &summary).await?;
        info!(
            summary = %summary_path.display(),
            jobs = summary.records.len(),
            confirmed = summary.confirmed_count(),
            "Campaign summary written"
        );

        if interrupted {
            return Err(SymwpError::Interrupted);
        }
        Ok(summary)
    }

    /// Invoke the external harness generator for the plugin.
    async fn generate_harnesses(&self) -> Result<(), SymwpError> {
        let settings = &self.settings;
        info!(plugin = %settings.plugin_dir.display(), "Generating harnesses");

        let mut command = Command::new(&settings.php_executable);
        command
            .arg(&settings.harness_generator)
            .arg(&settings.plugin_dir)
            .stdin(Stdio::null());
        if settings.use_wp_loader {
            command.arg("--use-wp-loader");
        }

        let status = command.status().await.map_err(|e| {
            SymwpError::Harness(format!("Failed to launch harness generator: {}", e))
        })?;
        if !status.success() {
            return Err(SymwpError::Harness(format!(
                "Harness generator exited with {}",
                status
            )));
        }
        Ok(())
    }
}
