pub mod commands;
pub mod extract;
pub mod run;

pub use commands::{Cli, Commands};
