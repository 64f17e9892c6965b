use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::SymwpError;
use super::job::JobSpec;

/// Handle to a running engine job: the child process plus the process group
/// it leads. The engine forks internal workers, so lifecycle operations
/// always target the whole group.
pub struct JobHandle {
    child: Child,
    pgid: Pid,
}

/// Starts engine runs and owns their lifecycle.
pub struct JobRunner;

impl JobRunner {
    /// Launch the engine run for `spec` as a new process group, standard
    /// output redirected to the job's log file, standard error discarded.
    pub async fn start(spec: &JobSpec) -> Result<JobHandle, SymwpError> {
        let log = std::fs::File::create(spec.log_path())?;

        let child = Command::new(&spec.engine_command)
            .arg("run")
            .arg("-n")
            .arg("-t")
            .arg(spec.timeout_minutes().to_string())
            .arg("-c")
            .arg(spec.cores.to_string())
            .arg(&spec.project_name)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| {
                SymwpError::Engine(format!("Failed to launch {}: {}", spec.engine_command, e))
            })?;

        let pid = child.id().ok_or_else(|| {
            SymwpError::Engine("Engine exited before its pid could be read".to_string())
        })?;

        info!(
            project = %spec.project_name,
            pid,
            timeout_minutes = spec.timeout_minutes(),
            cores = spec.cores,
            "Engine run started"
        );

        Ok(JobHandle {
            child,
            // process_group(0) makes the child the leader of a fresh group,
            // so the group id equals its pid.
            pgid: Pid::from_raw(pid as i32),
        })
    }
}

impl JobHandle {
    pub fn pgid(&self) -> i32 {
        self.pgid.as_raw()
    }

    /// Wait up to `limit` for natural exit. `Ok(Some(status))` on exit,
    /// `Ok(None)` when the limit elapsed with the process still running.
    pub async fn wait_for(&mut self, limit: Duration) -> Result<Option<ExitStatus>, SymwpError> {
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(status) => Ok(Some(status?)),
            Err(_) => Ok(None),
        }
    }

    /// Terminate the whole process group. Idempotent: a group that has
    /// already exited is a no-op.
    pub fn stop(&self) {
        match killpg(self.pgid, Signal::SIGTERM) {
            Ok(()) => info!(pgid = self.pgid.as_raw(), "Terminated engine process group"),
            Err(Errno::ESRCH) => {
                debug!(pgid = self.pgid.as_raw(), "Engine process group already gone")
            }
            Err(e) => warn!(
                pgid = self.pgid.as_raw(),
                error = %e,
                "Failed to signal engine process group"
            ),
        }
    }
}
