use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::SymwpError;

/// Where the harness generator places symbolic harnesses, relative to the
/// plugin folder.
pub const SYMBOLIC_HARNESS_DIR: &str = ".harness/symbolic";

/// A generated symbolic harness plus what was learned from scanning it.
#[derive(Debug, Clone)]
pub struct Harness {
    pub path: PathBuf,
    /// Number of argv slots the harness reads, including the script path
    /// slot. Slots 2.. are made symbolic.
    pub argv_count: usize,
}

impl Harness {
    /// File name used to derive project and artifact names.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The concrete (non-symbolic) twin used for dynamic verification.
    pub fn concrete_path(&self) -> PathBuf {
        concrete_harness_path(&self.path)
    }
}

/// Swap the symbolic harness directory for its concrete twin. The generator
/// emits both trees side by side.
pub fn concrete_harness_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace("/symbolic/", "/concrete/"))
}

/// Count the argv slots referenced by a harness via `$argv[N]` accesses:
/// highest index + 1, or 0 when the harness takes no arguments.
pub fn count_symbolic_args(path: &Path) -> Result<usize, SymwpError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SymwpError::Harness(format!("Failed to read {}: {}", path.display(), e)))?;
    let pattern = Regex::new(r"\$argv\[(\d+)\]").unwrap();
    let max = pattern
        .captures_iter(&content)
        .filter_map(|cap| cap[1].parse::<usize>().ok())
        .max();
    Ok(max.map_or(0, |m| m + 1))
}

/// Normalize an include filter the same way the generator names harness
/// files: path separators and dots become dashes.
pub fn normalize_include(include: &str) -> String {
    include.replace('/', "-").replace('.', "-")
}

/// Discover harnesses under the plugin folder, skipping those with no
/// symbolic arguments and those not matching the include filter.
pub fn discover(plugin_dir: &Path, include: Option<&str>) -> Result<Vec<Harness>, SymwpError> {
    let pattern = plugin_dir
        .join(SYMBOLIC_HARNESS_DIR)
        .join("**")
        .join("*.php");
    let pattern = pattern.to_string_lossy();

    let mut harnesses = Vec::new();
    let entries = glob::glob(&pattern)
        .map_err(|e| SymwpError::Harness(format!("Bad harness pattern {}: {}", pattern, e)))?;
    for entry in entries.filter_map(Result::ok) {
        if let Some(filter) = include {
            if !entry.to_string_lossy().contains(filter) {
                debug!(harness = %entry.display(), filter, "Skipping, include filter not matched");
                continue;
            }
        }

        let argv_count = count_symbolic_args(&entry)?;
        if argv_count == 0 {
            info!(harness = %entry.display(), "No symbolic arguments, skipping");
            continue;
        }

        harnesses.push(Harness {
            path: entry,
            argv_count,
        });
    }

    harnesses.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(harnesses)
}
