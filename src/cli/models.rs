//! Models command - list the catalog

use anyhow::Result;
use console::style;

use crate::catalog::{ModelKind, NameInput};
use crate::config::UserConfig;
use crate::ngram::NgramWidth;

/// Run the models command
pub fn run(config: &UserConfig) -> Result<()> {
    let model_dir = config.model_dir();
    println!("\n{} Models in {}\n", style("ethnicolr").bold(), style(model_dir.display()).cyan());

    for kind in ModelKind::ALL {
        let spec = kind.resolve(None)?;
        let installed = spec
            .artifacts(&model_dir)
            .paths()
            .iter()
            .all(|p| p.is_file());
        let mark = if installed {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let input = match spec.input {
            NameInput::LastName => "last",
            NameInput::FullName => "last+first",
        };
        let ngrams = match spec.width {
            NgramWidth::Fixed(n) => n.to_string(),
            NgramWidth::Range { lo, hi } => format!("{}-{}", lo, hi),
        };
        let years = kind
            .supported_years()
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join(",");

        println!(
            "  {} {:<22} {:<10} n={:<4} len={:<3} {}",
            mark,
            style(kind.name()).bold(),
            input,
            ngrams,
            spec.feature_len,
            style(kind.description()).dim()
        );
        if !years.is_empty() {
            println!("      years: {} (default {})", years, kind.default_year().unwrap_or_default());
        }
    }

    println!(
        "\nSet the model directory with {} or {}.",
        style("--model-dir").cyan(),
        style(crate::config::MODEL_DIR_ENV).cyan()
    );
    Ok(())
}
