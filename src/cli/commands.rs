use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(
    name = "symwp",
    version,
    about = "Symbolic-execution driven vulnerability discovery for WordPress plugins"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run symbolic and dynamic analysis over a plugin's harnesses
    Run(RunArgs),
    /// Extract candidate test cases from an existing project's output
    Extract(ExtractArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Path to the WordPress plugin folder
    pub plugin_folder: String,

    /// Engine timeout in minutes (default: 30)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Length of each symbolic argv filler (default: 20)
    #[arg(short = 'l', long)]
    pub argv_length: Option<usize>,

    /// Number of cores for the engine (default: 16)
    #[arg(short, long)]
    pub core: Option<u32>,

    /// Only analyze harnesses matching this file, path or method name
    #[arg(short, long)]
    pub include: Option<String>,

    /// Stop the engine early once a vulnerability is confirmed
    #[arg(long)]
    pub stop_if_found: bool,

    /// Number of times to run the whole analysis (default: 1)
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Use the original wp-loader.php instead of the custom loaders
    #[arg(long)]
    pub use_wp_loader: bool,

    /// Output directory for results (default: SymWP)
    #[arg(short, long)]
    pub output: Option<String>,

    /// YAML configuration file
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Args, Clone)]
pub struct ExtractArgs {
    /// Project directory holding engine output logs
    pub project_dir: String,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
