use std::io::Write;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

const BIN_NAME: &str = "pocketfriend";

/// Completion script for `shell`, covering every subcommand and flag.
pub fn completion_script(shell: CompletionShell) -> Vec<u8> {
    let mut script = Vec::new();
    generate(Shell::from(shell), &mut Cli::command(), BIN_NAME, &mut script);
    script
}

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let script = completion_script(shell);
    match output_path {
        Some(path) => {
            std::fs::write(path, &script)?;
            tracing::debug!("Wrote {:?} completions to {}", shell, path.display());
            println!("{}", path.display());
        }
        None => std::io::stdout().lock().write_all(&script)?,
    }
    Ok(())
}
