use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use symwp::engine::{JobOutcome, JobRunner, JobSpec, MonitorLoop};
use symwp::verify::DynamicVerifier;

const XSS_LINE: &str = r#"EchoFunctionTracker: Test case: v0_arg1_0(exploitable) = {3c}; (string) "<script>""#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A harness whose concrete twin exists, as dynamic verification requires.
fn write_harness_pair(root: &Path) -> PathBuf {
    let symbolic = root.join(".harness/symbolic");
    let concrete = root.join(".harness/concrete");
    std::fs::create_dir_all(&symbolic).unwrap();
    std::fs::create_dir_all(&concrete).unwrap();
    std::fs::write(symbolic.join("h.php"), "<?php echo $argv[1]; ?>").unwrap();
    std::fs::write(concrete.join("h.php"), "<?php echo $argv[1]; ?>").unwrap();
    symbolic.join("h.php")
}

struct Fixture {
    _dir: TempDir,
    spec: JobSpec,
    monitor: MonitorLoop,
    cancel: CancellationToken,
}

/// Wire a monitor and job spec around a stub engine script. The stub's
/// stdout lands in the project log exactly as the real engine's would.
fn fixture(engine_body: &str, checker_body: &str, timeout: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let project_dir = dir.path().join("project");
    std::fs::create_dir_all(&project_dir).unwrap();

    let engine = write_script(dir.path(), "engine.sh", engine_body);
    let xss_checker = write_script(dir.path(), "xss_checker.sh", checker_body);
    let sqli_checker = write_script(dir.path(), "sqli_checker.sh", "echo no findings");
    let harness_path = write_harness_pair(dir.path());

    let spec = JobSpec {
        project_name: "plugin_h".to_string(),
        project_dir,
        harness_path,
        argv_count: 2,
        timeout,
        cores: 1,
        engine_command: engine.to_string_lossy().into_owned(),
    };

    let cancel = CancellationToken::new();
    let verifier = DynamicVerifier::new(PathBuf::from("/bin/sh"), xss_checker, sqli_checker);
    let monitor = MonitorLoop::new(verifier, cancel.clone())
        .with_poll_interval(Duration::from_millis(200));

    Fixture {
        _dir: dir,
        spec,
        monitor,
        cancel,
    }
}

#[tokio::test]
async fn natural_exit_between_polls_is_completed() {
    let fixture = fixture("exit 0", "echo unused", Duration::from_secs(30));

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::Completed);
    assert!(result.time_to_detection.is_none());
}

#[tokio::test]
async fn confirmed_vulnerability_stops_job_early() {
    let fixture = fixture(
        &format!("echo '{}'\nsleep 30", XSS_LINE),
        r#"echo "[!] Potential tags injection detected: <script>""#,
        Duration::from_secs(30),
    );

    let started = Instant::now();
    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::StoppedEarly);
    let ttd = result.time_to_detection.expect("time-to-detection recorded");
    assert!(ttd > Duration::ZERO);
    // Stopped on the first poll, far short of the engine's 30s sleep.
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn unconfirmed_candidates_do_not_stop_job() {
    let fixture = fixture(
        &format!("echo '{}'\nsleep 30", XSS_LINE),
        "echo nothing suspicious here",
        Duration::from_millis(900),
    );

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::TimedOut);
}

#[tokio::test]
async fn deadline_without_confirmation_times_out() {
    let fixture = fixture("sleep 30", "echo unused", Duration::from_millis(700));

    let started = Instant::now();
    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::TimedOut);
    assert!(result.time_to_detection.is_none());
    // The group was terminated rather than waited out.
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn fatal_error_flood_alone_never_stops_job() {
    // The log fills with fatal-error lines and no test cases: extraction
    // reports the threshold, and the monitor must keep the job running
    // until the deadline.
    let engine = "i=0\n\
                  while [ $i -lt 10000 ]; do echo 'Fatal error: I/O'; i=$((i+1)); done\n\
                  sleep 30";
    let fixture = fixture(engine, "echo unused", Duration::from_millis(1500));

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::TimedOut);
}

#[tokio::test]
async fn interrupt_stops_job_distinctly() {
    let fixture = fixture("sleep 30", "echo unused", Duration::from_secs(30));

    let cancel = fixture.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::Interrupted);
}

#[tokio::test]
async fn disabled_early_stop_waits_blocking() {
    // Candidates and a confirming checker are present, but with early
    // stopping disabled the monitor must not look at them.
    let fixture = fixture(
        &format!("echo '{}'\nsleep 30", XSS_LINE),
        r#"echo "[!] Potential tags injection detected: <script>""#,
        Duration::from_millis(800),
    );

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, false)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::TimedOut);
}

#[tokio::test]
async fn disabled_early_stop_sees_natural_exit() {
    let fixture = fixture("exit 0", "echo unused", Duration::from_secs(30));

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, false)
        .await
        .unwrap();

    assert_eq!(result.outcome, JobOutcome::Completed);
}

#[tokio::test]
async fn missing_concrete_harness_skips_verification() {
    let fixture = fixture(
        &format!("echo '{}'\nsleep 30", XSS_LINE),
        r#"echo "[!] Potential tags injection detected: <script>""#,
        Duration::from_millis(900),
    );
    std::fs::remove_file(fixture.spec.harness_path.to_string_lossy().replace(
        "/symbolic/",
        "/concrete/",
    ))
    .unwrap();

    let mut handle = JobRunner::start(&fixture.spec).await.unwrap();
    let result = fixture
        .monitor
        .run(&fixture.spec, &mut handle, true)
        .await
        .unwrap();

    // Candidates exist and the checker would confirm, but without a
    // concrete harness there is nothing to verify against.
    assert_eq!(result.outcome, JobOutcome::TimedOut);
}

#[tokio::test]
async fn missing_engine_binary_fails_start() {
    let dir = TempDir::new().unwrap();
    let project_dir = dir.path().join("project");
    std::fs::create_dir_all(&project_dir).unwrap();

    let spec = JobSpec {
        project_name: "plugin_h".to_string(),
        project_dir,
        harness_path: dir.path().join("h.php"),
        argv_count: 2,
        timeout: Duration::from_secs(1),
        cores: 1,
        engine_command: dir.path().join("no-such-engine").to_string_lossy().into_owned(),
    };

    assert!(JobRunner::start(&spec).await.is_err());
}
