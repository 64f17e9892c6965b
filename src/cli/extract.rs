use std::path::Path;

use crate::errors::SymwpError;
use crate::extract::{format_tuple, ExtractOutcome, TestCaseExtractor, VulnClass};
use super::commands::ExtractArgs;

/// One-shot extraction over an existing project directory, printing the
/// candidate tuples per class.
pub async fn handle_extract(args: ExtractArgs) -> Result<(), SymwpError> {
    let project_dir = Path::new(&args.project_dir);
    if !project_dir.is_dir() {
        return Err(SymwpError::Config(format!(
            "Project directory {} does not exist",
            project_dir.display()
        )));
    }

    match TestCaseExtractor::new().extract(project_dir)? {
        ExtractOutcome::Fatal { fatal_errors } => {
            println!(
                "Extraction abandoned: {} fatal-error lines in the output (threshold reached).",
                fatal_errors
            );
        }
        ExtractOutcome::Complete(bucket) => {
            for class in VulnClass::ALL {
                let tuples = bucket.sorted_tuples(class);
                println!("{}: {} candidate tuple(s)", class.label(), tuples.len());
                for tuple in tuples {
                    println!("  {}", format_tuple(tuple));
                }
            }
        }
    }
    Ok(())
}
