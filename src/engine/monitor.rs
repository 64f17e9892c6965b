use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::SymwpError;
use crate::extract::{ExtractOutcome, TestCaseExtractor};
use crate::harness::concrete_harness_path;
use crate::verify::DynamicVerifier;
use super::job::{JobContext, JobOutcome, JobSpec};
use super::runner::JobHandle;

/// How often a monitored job's output is re-examined.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How long a terminated process group is given to exit before we log a
/// complaint and move on.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Terminal result of monitoring one job.
#[derive(Debug)]
pub struct MonitorResult {
    pub outcome: JobOutcome,
    pub time_to_detection: Option<Duration>,
}

/// Drives one running job to a terminal state: polls its output for
/// candidate test cases, verifies them dynamically, and stops the engine
/// early on a confirmed vulnerability.
pub struct MonitorLoop {
    extractor: TestCaseExtractor,
    verifier: DynamicVerifier,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl MonitorLoop {
    pub fn new(verifier: DynamicVerifier, cancel: CancellationToken) -> Self {
        Self {
            extractor: TestCaseExtractor::new(),
            verifier,
            poll_interval: POLL_INTERVAL,
            cancel,
        }
    }

    /// Override the poll interval (tests drive the loop at millisecond
    /// scale).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drive `handle` to a terminal state. With early stopping enabled the
    /// loop polls on the configured interval; otherwise it degenerates to a
    /// single bounded wait for the deadline.
    pub async fn run(
        &self,
        spec: &JobSpec,
        handle: &mut JobHandle,
        early_stop: bool,
    ) -> Result<MonitorResult, SymwpError> {
        let mut ctx = JobContext::new();
        ctx.early_stop = early_stop;

        let now = chrono::Local::now();
        let estimated_end = now + chrono::Duration::seconds(spec.timeout.as_secs() as i64);
        info!(
            project = %spec.project_name,
            start = %now.format("%Y-%m-%d %H:%M:%S"),
            estimated_end = %estimated_end.format("%Y-%m-%d %H:%M:%S"),
            "Monitoring engine run"
        );

        if !early_stop {
            return self.wait_to_deadline(spec, handle).await;
        }

        let deadline = Instant::now() + spec.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                info!(project = %spec.project_name, "Deadline elapsed, stopping engine");
                self.stop_and_reap(handle).await;
                return Ok(MonitorResult {
                    outcome: JobOutcome::TimedOut,
                    time_to_detection: None,
                });
            }

            let slice = remaining.min(self.poll_interval);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!(project = %spec.project_name, "Interrupted, stopping engine");
                    self.stop_and_reap(handle).await;
                    return Ok(MonitorResult {
                        outcome: JobOutcome::Interrupted,
                        time_to_detection: None,
                    });
                }
                exited = handle.wait_for(slice) => {
                    if let Some(status) = exited? {
                        info!(project = %spec.project_name, %status, "Engine exited on its own");
                        return Ok(MonitorResult {
                            outcome: JobOutcome::Completed,
                            time_to_detection: None,
                        });
                    }
                }
            }

            // Still running; examine the output written so far.
            if self.check_for_vulnerability(spec, &mut ctx).await? {
                let ttd = ctx.elapsed();
                ctx.time_to_detection = Some(ttd);
                warn!(
                    project = %spec.project_name,
                    seconds = ttd.as_secs_f64(),
                    minutes = ttd.as_secs_f64() / 60.0,
                    "Confirmed vulnerability, stopping engine early"
                );
                self.stop_and_reap(handle).await;
                return Ok(MonitorResult {
                    outcome: JobOutcome::StoppedEarly,
                    time_to_detection: Some(ttd),
                });
            }
        }
    }

    /// One extraction + verification pass. True only when the dynamic
    /// verdict confirms a vulnerability.
    async fn check_for_vulnerability(
        &self,
        spec: &JobSpec,
        ctx: &mut JobContext,
    ) -> Result<bool, SymwpError> {
        let bucket = match self.extractor.extract(&spec.project_dir)? {
            ExtractOutcome::Complete(bucket) => bucket,
            ExtractOutcome::Fatal { fatal_errors } => {
                // The output is too noisy to parse right now. Not evidence
                // either way; the job keeps running.
                ctx.fatal_errors = fatal_errors;
                return Ok(false);
            }
        };

        if !bucket.has_candidates() {
            return Ok(false);
        }

        let concrete = concrete_harness_path(&spec.harness_path);
        if !concrete.exists() {
            debug!(
                harness = %spec.harness_path.display(),
                "No concrete harness counterpart, skipping dynamic verification"
            );
            return Ok(false);
        }

        let verdict = self.verifier.verify(&concrete, &bucket).await;
        if verdict.confirmed {
            info!(harness = %concrete.display(), "Dynamic verification confirmed a vulnerability");
            debug!(diagnostic = %verdict.text, "Verifier output");
        }
        Ok(verdict.confirmed)
    }

    /// Early stopping disabled: block until the engine exits or the deadline
    /// elapses, with no intermediate polling.
    async fn wait_to_deadline(
        &self,
        spec: &JobSpec,
        handle: &mut JobHandle,
    ) -> Result<MonitorResult, SymwpError> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!(project = %spec.project_name, "Interrupted, stopping engine");
                self.stop_and_reap(handle).await;
                Ok(MonitorResult {
                    outcome: JobOutcome::Interrupted,
                    time_to_detection: None,
                })
            }
            exited = handle.wait_for(spec.timeout) => {
                match exited? {
                    Some(status) => {
                        info!(project = %spec.project_name, %status, "Engine exited on its own");
                        Ok(MonitorResult {
                            outcome: JobOutcome::Completed,
                            time_to_detection: None,
                        })
                    }
                    None => {
                        info!(project = %spec.project_name, "Deadline elapsed, stopping engine");
                        self.stop_and_reap(handle).await;
                        Ok(MonitorResult {
                            outcome: JobOutcome::TimedOut,
                            time_to_detection: None,
                        })
                    }
                }
            }
        }
    }

    async fn stop_and_reap(&self, handle: &mut JobHandle) {
        handle.stop();
        match handle.wait_for(STOP_GRACE).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(
                pgid = handle.pgid(),
                "Engine process group did not exit after termination"
            ),
            Err(e) => warn!(pgid = handle.pgid(), error = %e, "Failed to reap engine process"),
        }
    }
}
