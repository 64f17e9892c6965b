use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymwpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Project setup error: {0}")]
    Project(String),

    #[error("Harness error: {0}")]
    Harness(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
