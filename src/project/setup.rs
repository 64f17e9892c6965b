use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::campaign::CampaignSettings;
use crate::errors::SymwpError;
use crate::harness::Harness;
use super::addresses::TrackerAddresses;
use super::bootstrap::BootstrapSpec;

/// Loader scripts copied into each project when the custom loaders are in
/// use.
const LOADER_SCRIPTS: [&str; 3] = [
    "base-wordpress-loader.php",
    "symbolic-wordpress-loader.php",
    "concrete-wordpress-loader.php",
];

/// Creates and configures engine projects, one per harness.
pub struct ProjectBuilder<'a> {
    settings: &'a CampaignSettings,
    addresses: &'a TrackerAddresses,
}

impl<'a> ProjectBuilder<'a> {
    pub fn new(settings: &'a CampaignSettings, addresses: &'a TrackerAddresses) -> Self {
        Self {
            settings,
            addresses,
        }
    }

    /// Create the engine project for one harness and stage its inputs.
    /// Returns the project directory.
    pub async fn build(
        &self,
        plugin_name: &str,
        harness: &Harness,
        project_name: &str,
    ) -> Result<PathBuf, SymwpError> {
        info!(project = project_name, harness = %harness.path.display(), "Setting up engine project");

        self.create_project(harness, project_name).await?;
        let project_dir = self.settings.projects_dir.join(project_name);

        self.write_bootstrap(&project_dir, plugin_name, harness)
            .await?;
        self.append_plugin_config(&project_dir).await?;
        self.stage_inputs(&project_dir, plugin_name, harness).await?;

        Ok(project_dir)
    }

    async fn create_project(&self, harness: &Harness, project_name: &str) -> Result<(), SymwpError> {
        let status = Command::new(&self.settings.engine_command)
            .args(["new_project", "-f", "-n", project_name])
            .arg(&self.settings.php_executable)
            .arg(&harness.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                SymwpError::Engine(format!(
                    "Failed to launch {}: {}",
                    self.settings.engine_command, e
                ))
            })?;

        if !status.success() {
            return Err(SymwpError::Project(format!(
                "new_project for {} failed with {}",
                project_name, status
            )));
        }
        Ok(())
    }

    async fn write_bootstrap(
        &self,
        project_dir: &Path,
        plugin_name: &str,
        harness: &Harness,
    ) -> Result<(), SymwpError> {
        let template = tokio::fs::read_to_string(&self.settings.bootstrap_template)
            .await
            .map_err(|e| {
                SymwpError::Project(format!(
                    "Failed to read bootstrap template {}: {}",
                    self.settings.bootstrap_template.display(),
                    e
                ))
            })?;

        let spec = BootstrapSpec::new(
            harness.argv_count,
            self.settings.argv_fill_length,
            plugin_name,
        );
        tokio::fs::write(
            project_dir.join("bootstrap.sh"),
            spec.apply_to_template(&template),
        )
        .await?;
        Ok(())
    }

    async fn append_plugin_config(&self, project_dir: &Path) -> Result<(), SymwpError> {
        use tokio::io::AsyncWriteExt;

        let config_path = project_dir.join("s2e-config.lua");
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&config_path)
            .await?;
        file.write_all(self.addresses.plugin_config().as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    async fn stage_inputs(
        &self,
        project_dir: &Path,
        plugin_name: &str,
        harness: &Harness,
    ) -> Result<(), SymwpError> {
        tokio::fs::copy(&harness.path, project_dir.join("harness.php")).await?;

        // new_project leaves the symranges file under the harness's own
        // name; the bootstrap script expects the canonical one.
        let symranges = project_dir.join(format!("{}.symranges", harness.file_name()));
        if symranges.exists() {
            tokio::fs::rename(&symranges, project_dir.join("harness.symranges")).await?;
        } else {
            warn!(path = %symranges.display(), "No symranges file produced for harness");
        }

        // Packaging is out of scope here: archives are expected to be
        // prepared next to the working directory.
        for archive in [format!("{}.tar.gz", plugin_name), "WordPress.tar.gz".to_string()] {
            let source = PathBuf::from(&archive);
            if source.exists() {
                tokio::fs::copy(&source, project_dir.join(&archive)).await?;
            } else {
                warn!(archive = %archive, "Input archive not found, engine bootstrap may fail");
            }
        }

        if !self.settings.use_wp_loader {
            for script in LOADER_SCRIPTS {
                let source = PathBuf::from(script);
                if source.exists() {
                    tokio::fs::copy(&source, project_dir.join(script)).await?;
                } else {
                    debug!(script, "Loader script not found, skipping copy");
                }
            }
        }

        Ok(())
    }
}
