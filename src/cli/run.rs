use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::campaign::{preflight, CampaignDriver, CampaignSettings};
use crate::config::{self, SymwpConfig};
use crate::errors::SymwpError;
use crate::harness;
use super::commands::RunArgs;

pub async fn handle_run(args: RunArgs) -> Result<(), SymwpError> {
    let file_config = match &args.config {
        Some(path) => Some(config::parse_config(std::path::Path::new(path)).await?),
        None => None,
    };

    let settings = build_settings(&args, file_config.as_ref())?;
    info!(
        plugin = %settings.plugin_dir.display(),
        timeout_minutes = settings.timeout_minutes,
        cores = settings.cores,
        iterations = settings.iterations,
        stop_if_found = settings.stop_if_found,
        "Starting analysis campaign"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping the running job");
                cancel.cancel();
            }
        });
    }

    let driver = CampaignDriver::new(settings).with_cancel_token(cancel);
    let summary = driver.run().await?;

    info!(
        jobs = summary.records.len(),
        confirmed = summary.confirmed_count(),
        "Campaign finished"
    );
    Ok(())
}

fn build_settings(
    args: &RunArgs,
    file: Option<&SymwpConfig>,
) -> Result<CampaignSettings, SymwpError> {
    let analysis = file.and_then(|c| c.analysis.clone()).unwrap_or_default();
    let engine = file.and_then(|c| c.engine.clone()).unwrap_or_default();
    let checkers = file.and_then(|c| c.checkers.clone()).unwrap_or_default();
    let output = file.and_then(|c| c.output.clone()).unwrap_or_default();

    let php_executable = std::env::var(preflight::ENV_SYMWP_PHP)
        .map(PathBuf::from)
        .map_err(|_| {
            SymwpError::Config(format!(
                "Environment variable {} is not set",
                preflight::ENV_SYMWP_PHP
            ))
        })?;

    let include = args
        .include
        .clone()
        .or(analysis.include)
        .map(|value| harness::normalize_include(&value))
        .filter(|value| !value.is_empty());

    Ok(CampaignSettings {
        plugin_dir: PathBuf::from(&args.plugin_folder),
        timeout_minutes: args.timeout.or(analysis.timeout_minutes).unwrap_or(30),
        argv_fill_length: args.argv_length.or(analysis.argv_fill_length).unwrap_or(20),
        cores: args.core.or(analysis.cores).unwrap_or(16),
        include,
        stop_if_found: args.stop_if_found || analysis.stop_if_found.unwrap_or(false),
        iterations: args.iterations.or(analysis.iterations).unwrap_or(1).max(1),
        use_wp_loader: args.use_wp_loader || analysis.use_wp_loader.unwrap_or(false),
        output_dir: args
            .output
            .clone()
            .map(PathBuf::from)
            .or(output.dir)
            .unwrap_or_else(|| PathBuf::from("SymWP")),
        projects_dir: engine
            .projects_dir
            .unwrap_or_else(|| PathBuf::from("projects")),
        engine_command: engine.command.unwrap_or_else(|| "s2e".to_string()),
        objdump_command: engine
            .objdump_command
            .unwrap_or_else(|| "objdump".to_string()),
        php_executable,
        xss_checker: checkers
            .xss_checker
            .unwrap_or_else(|| PathBuf::from("XSSChecker.php")),
        sqli_checker: checkers
            .sqli_checker
            .unwrap_or_else(|| PathBuf::from("SQLiChecker.php")),
        harness_generator: checkers
            .harness_generator
            .unwrap_or_else(|| PathBuf::from("harness_generator.php")),
        bootstrap_template: engine
            .bootstrap_template
            .unwrap_or_else(|| PathBuf::from("bootstrap_template.sh")),
    })
}
