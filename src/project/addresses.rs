use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use crate::errors::SymwpError;

/// Symbol line fragments identifying the two tracked interpreter functions
/// in `objdump -d` output.
pub const ECHO_FUNCTION_SYMBOL: &str = "php_output_write>:";
pub const SQLITE_FUNCTION_SYMBOL: &str = "sqlite_handle_preparer>:";

/// Entry-point addresses of the tracked interpreter functions, forwarded
/// into the engine's plugin configuration. Resolved once per campaign.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerAddresses {
    /// Hex address without the 0x prefix, as printed by objdump.
    pub echo_function: String,
    pub sqlite_function: String,
}

impl TrackerAddresses {
    /// Engine plugin-configuration block appended to a project's
    /// s2e-config.lua.
    pub fn plugin_config(&self) -> String {
        format!(
            "\nadd_plugin(\"FunctionMonitor\")\n\
             add_plugin(\"EchoFunctionTracker\")\n\
             pluginsConfig.EchoFunctionTracker = {{\n    addressToTrack = 0x{},\n}}\n\
             add_plugin(\"SqliteFunctionTracker\")\n\
             pluginsConfig.SqliteFunctionTracker = {{\n    addressToTrack = 0x{},\n}}\n",
            self.echo_function, self.sqlite_function
        )
    }
}

/// Scan disassembly output for the tracked symbol lines. The address is the
/// first column of a symbol-definition line.
pub fn parse_disassembly(output: &str) -> Option<TrackerAddresses> {
    let mut echo = None;
    let mut sqlite = None;

    for line in output.lines() {
        if line.contains(ECHO_FUNCTION_SYMBOL) {
            echo = line.split_whitespace().next().map(str::to_string);
        } else if line.contains(SQLITE_FUNCTION_SYMBOL) {
            sqlite = line.split_whitespace().next().map(str::to_string);
        }
    }

    match (echo, sqlite) {
        (Some(echo_function), Some(sqlite_function)) => Some(TrackerAddresses {
            echo_function,
            sqlite_function,
        }),
        _ => None,
    }
}

/// Disassemble the instrumented interpreter and extract the two tracked
/// addresses.
pub async fn resolve(objdump: &str, php_executable: &Path) -> Result<TrackerAddresses, SymwpError> {
    let output = Command::new(objdump)
        .arg("-d")
        .arg(php_executable)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| SymwpError::MissingDependency(format!("{}: {}", objdump, e)))?;

    if !output.status.success() {
        return Err(SymwpError::Project(format!(
            "{} exited with {}",
            objdump, output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let addresses = parse_disassembly(&text).ok_or_else(|| {
        SymwpError::Project(
            "Could not locate tracked function symbols in the interpreter disassembly".to_string(),
        )
    })?;

    info!(
        echo_function = %addresses.echo_function,
        sqlite_function = %addresses.sqlite_function,
        "Resolved tracker addresses"
    );
    Ok(addresses)
}
