//! CLI command definitions and handlers

mod census;
mod init;
mod io;
mod models;
mod predict;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::ModelKind;
use crate::census::CensusYear;
use crate::config::UserConfig;

/// Parse a census year (2000 or 2010)
fn parse_census_year(s: &str) -> Result<CensusYear, String> {
    s.parse::<CensusYear>()
        .map_err(|_| format!("'{}' is not a census year (2000 or 2010)", s))
}

/// Parse and validate a confidence level in (0, 1]
fn parse_confidence(s: &str) -> Result<f64, String> {
    let level: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if level > 0.0 && level <= 1.0 {
        Ok(level)
    } else {
        Err("confidence must be in (0, 1]".to_string())
    }
}

/// Parse and validate an iteration count (at least 1)
fn parse_iterations(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("iterations must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// ethnicolr - Predict race and ethnicity from names
#[derive(Parser, Debug)]
#[command(name = "ethnicolr")]
#[command(
    version,
    about = "Predict race/ethnicity from names using census lookups or character-level LSTM models",
    long_about = "ethnicolr appends race/ethnicity columns to a CSV of names, either by \
looking last names up in the US census surname tables or by running a trained \
character n-gram sequence model over last or full names.\n\n\
Column arguments that are all digits select columns by position and read the \
input without a header row.",
    after_help = "\
Examples:
  ethnicolr census names.csv -l last                      Census 2000 percentages by last name
  ethnicolr predict names.csv -m wiki-ln -l last          Wikipedia last-name model
  ethnicolr predict names.csv -m nc-reg-name -l last -f first -c 0.9
                                                          Full-name model with 90% intervals
  ethnicolr models                                        List available models"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Directory with exported models (overrides config and ETHNICOLR_MODEL_DIR)
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Directory with census tables (overrides config and ETHNICOLR_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append census surname percentages by last name
    #[command(after_help = "\
Examples:
  ethnicolr census names.csv -l last                  2000 census, output to stdout
  ethnicolr census names.csv -l last -y 2010 -o out.csv
  ethnicolr census headerless.csv -l 0                First column, no header row")]
    Census {
        /// Input CSV file ('-' for stdin)
        input: PathBuf,

        /// Name or zero-based position of the last-name column
        #[arg(long, short = 'l')]
        last: String,

        /// Census year (2000 or 2010)
        #[arg(long, short = 'y', default_value = "2000", value_parser = parse_census_year)]
        year: CensusYear,

        /// Output CSV file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Predict race/ethnicity with a sequence model
    #[command(after_help = "\
Examples:
  ethnicolr predict names.csv -m census-ln -l last -y 2000
  ethnicolr predict names.csv -m fl-reg-name -l last -f first -o out.csv
  ethnicolr predict names.csv -m fl-reg-ln -l last -c 0.95 -i 200 --seed 7

Confidence 1.0 gives one deterministic pass with a probability per class.
Lower levels run ITERATIONS dropout passes and report {class}_mean, _std,
_lb and _ub columns.")]
    Predict {
        /// Input CSV file ('-' for stdin)
        input: PathBuf,

        /// Model to use (see `ethnicolr models`)
        #[arg(long, short = 'm')]
        model: ModelKind,

        /// Name or zero-based position of the last-name column
        #[arg(long, short = 'l')]
        last: String,

        /// Name or zero-based position of the first-name column (full-name models)
        #[arg(long, short = 'f')]
        first: Option<String>,

        /// Model year, for models trained on several years
        #[arg(long, short = 'y')]
        year: Option<u16>,

        /// Stochastic passes for interval estimates
        #[arg(long, short = 'i', value_parser = parse_iterations)]
        iterations: Option<usize>,

        /// Confidence level in (0, 1]; 1.0 gives point estimates
        #[arg(long, short = 'c', value_parser = parse_confidence)]
        confidence: Option<f64>,

        /// Seed for dropout masks
        #[arg(long)]
        seed: Option<u64>,

        /// Output CSV file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List available models and whether their artifacts are installed
    Models,

    /// Initialize config file with example settings
    Init {
        /// Write here instead of the user config directory
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { path } = &cli.command {
        return init::run(path.as_deref());
    }

    let mut config = UserConfig::load()?;
    if let Some(dir) = cli.model_dir {
        config.paths.models = Some(dir);
    }
    if let Some(dir) = cli.data_dir {
        config.paths.data = Some(dir);
    }

    match cli.command {
        Commands::Census {
            input,
            last,
            year,
            output,
        } => census::run(&config, &input, &last, year, output.as_deref()),

        Commands::Predict {
            input,
            model,
            last,
            first,
            year,
            iterations,
            confidence,
            seed,
            output,
        } => predict::run(
            &config,
            predict::Options {
                input,
                model,
                last,
                first,
                year,
                iterations,
                confidence,
                seed,
                output,
            },
        ),

        Commands::Models => models::run(&config),

        Commands::Init { .. } => Ok(()),
    }
}
