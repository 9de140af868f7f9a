//! CSV input/output for the commands

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufWriter;
use std::path::Path;

use crate::records::RecordBatch;

/// Read the input CSV; `-` reads stdin
pub(super) fn read_input(path: &Path, has_headers: bool) -> Result<RecordBatch> {
    if path == Path::new("-") {
        let stdin = std::io::stdin();
        return RecordBatch::from_reader(stdin.lock(), has_headers).context("Failed to read CSV from stdin");
    }
    RecordBatch::from_path(path, has_headers).with_context(|| format!("Failed to read input {}", path.display()))
}

/// Write the result CSV to a file, or stdout when no path is given
pub(super) fn write_output(batch: &RecordBatch, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            batch
                .write_csv(BufWriter::new(file))
                .with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let stdout = std::io::stdout();
            batch
                .write_csv(stdout.lock())
                .context("Failed to write CSV to stdout")
        }
    }
}

/// Where the result went, for summary lines
pub(super) fn destination(output: Option<&Path>) -> String {
    output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string())
}

/// Spinner on stderr (hidden when stderr is not a terminal)
pub(super) fn spinner(message: String) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.set_message(message);
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}
