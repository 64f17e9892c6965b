use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use crate::errors::SymwpError;
use super::driver::CampaignSettings;

/// Environment variable naming the instrumented PHP interpreter.
pub const ENV_SYMWP_PHP: &str = "SYMWP_PHP";

/// Verify every external collaborator is reachable before any job starts:
/// the helper scripts, the engine and objdump binaries, and the interpreter.
pub async fn check(settings: &CampaignSettings) -> Result<(), SymwpError> {
    let mut missing = Vec::new();

    for path in [
        &settings.harness_generator,
        &settings.xss_checker,
        &settings.sqli_checker,
        &settings.bootstrap_template,
        &settings.php_executable,
    ] {
        if !path.exists() {
            missing.push(path.display().to_string());
        }
    }

    // The engine prints usage and exits when run bare; objdump needs a flag
    // to do the same. Either way a spawn failure means the tool is absent.
    for (command, args) in [
        (settings.engine_command.as_str(), &[][..]),
        (settings.objdump_command.as_str(), &["-v"][..]),
    ] {
        let launched = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if launched.is_err() {
            missing.push(command.to_string());
        }
    }

    if missing.is_empty() {
        info!("All external dependencies present");
        Ok(())
    } else {
        Err(SymwpError::MissingDependency(missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings_with_tools(dir: &TempDir) -> CampaignSettings {
        let touch = |name: &str| -> PathBuf {
            let path = dir.path().join(name);
            std::fs::write(&path, "").unwrap();
            path
        };
        CampaignSettings {
            plugin_dir: dir.path().to_path_buf(),
            timeout_minutes: 30,
            argv_fill_length: 20,
            cores: 16,
            include: None,
            stop_if_found: false,
            iterations: 1,
            use_wp_loader: false,
            output_dir: dir.path().join("out"),
            projects_dir: dir.path().join("projects"),
            engine_command: "true".to_string(),
            objdump_command: "true".to_string(),
            php_executable: touch("php"),
            xss_checker: touch("XSSChecker.php"),
            sqli_checker: touch("SQLiChecker.php"),
            harness_generator: touch("harness_generator.php"),
            bootstrap_template: touch("bootstrap_template.sh"),
        }
    }

    #[tokio::test]
    async fn test_all_present_passes() {
        let dir = TempDir::new().unwrap();
        let settings = settings_with_tools(&dir);
        assert!(check(&settings).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_script_reported() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_tools(&dir);
        settings.xss_checker = dir.path().join("not-there.php");

        let err = check(&settings).await.unwrap_err();
        assert!(matches!(err, SymwpError::MissingDependency(_)));
        assert!(err.to_string().contains("not-there.php"));
    }

    #[tokio::test]
    async fn test_missing_engine_binary_reported() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_tools(&dir);
        settings.engine_command = dir
            .path()
            .join("no-such-engine")
            .to_string_lossy()
            .into_owned();

        let err = check(&settings).await.unwrap_err();
        assert!(err.to_string().contains("no-such-engine"));
    }
}
