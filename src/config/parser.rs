use std::path::Path;

use crate::errors::SymwpError;
use super::types::SymwpConfig;

pub async fn parse_config(path: &Path) -> Result<SymwpConfig, SymwpError> {
    if !path.exists() {
        return Err(SymwpError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: SymwpConfig = serde_yaml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Reject values that would make a campaign silently do nothing.
fn validate(config: &SymwpConfig) -> Result<(), SymwpError> {
    if let Some(analysis) = &config.analysis {
        if analysis.timeout_minutes == Some(0) {
            return Err(SymwpError::Config("timeout_minutes must be positive".into()));
        }
        if analysis.iterations == Some(0) {
            return Err(SymwpError::Config("iterations must be positive".into()));
        }
        if analysis.argv_fill_length == Some(0) {
            return Err(SymwpError::Config(
                "argv_fill_length must be positive".into(),
            ));
        }
        if analysis.cores == Some(0) {
            return Err(SymwpError::Config("cores must be positive".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_parse_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symwp.yaml");
        std::fs::write(
            &path,
            "analysis:\n  timeout_minutes: 10\n  stop_if_found: true\nengine:\n  command: /opt/s2e/bin/s2e\n",
        )
        .unwrap();

        let config = parse_config(&path).await.unwrap();
        let analysis = config.analysis.unwrap();
        assert_eq!(analysis.timeout_minutes, Some(10));
        assert_eq!(analysis.stop_if_found, Some(true));
        assert_eq!(
            config.engine.unwrap().command.as_deref(),
            Some("/opt/s2e/bin/s2e")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = parse_config(&dir.path().join("nope.yaml")).await.unwrap_err();
        assert!(matches!(err, SymwpError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symwp.yaml");
        std::fs::write(&path, "analysis:\n  timeout_minutes: 0\n").unwrap();
        assert!(parse_config(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_yaml_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symwp.yaml");
        std::fs::write(&path, "analysis: [not a mapping\n").unwrap();
        assert!(matches!(
            parse_config(&path).await.unwrap_err(),
            SymwpError::Yaml(_)
        ));
    }
}
