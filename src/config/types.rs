use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Optional YAML campaign configuration. Every field has a CLI counterpart;
/// CLI flags win where both are given.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SymwpConfig {
    pub analysis: Option<AnalysisConfig>,
    pub engine: Option<EngineConfig>,
    pub checkers: Option<CheckerConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnalysisConfig {
    pub timeout_minutes: Option<u64>,
    pub argv_fill_length: Option<usize>,
    pub cores: Option<u32>,
    pub include: Option<String>,
    pub stop_if_found: Option<bool>,
    pub iterations: Option<u32>,
    pub use_wp_loader: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    /// Engine CLI name or path (default "s2e").
    pub command: Option<String>,
    /// Disassembler used for tracker-address resolution (default "objdump").
    pub objdump_command: Option<String>,
    /// Where the engine creates projects (default "projects").
    pub projects_dir: Option<PathBuf>,
    pub bootstrap_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CheckerConfig {
    pub xss_checker: Option<PathBuf>,
    pub sqli_checker: Option<PathBuf>,
    pub harness_generator: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
}
