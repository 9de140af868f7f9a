//! Census command - append census surname percentages

use anyhow::Result;
use console::style;
use std::path::Path;

use super::io::{destination, read_input, spinner, write_output};
use crate::census::{CensusData, CensusYear, CENSUS_COLUMNS};
use crate::config::UserConfig;
use crate::records::ColumnSelector;

/// Run the census command
pub fn run(config: &UserConfig, input: &Path, last: &str, year: CensusYear, output: Option<&Path>) -> Result<()> {
    let last = ColumnSelector::parse(last);
    let records = read_input(input, !last.is_position())?;
    let total = records.len();

    let bar = spinner(format!("Looking up {} names in the {} census...", total, year));
    let census = CensusData::new(config.data_dir());
    let result = census.lookup(records, &last, year);
    bar.finish_and_clear();
    let out = result?;

    write_output(&out, output)?;

    let matched = (0..out.len())
        .filter(|&row| CENSUS_COLUMNS.iter().any(|c| out.get(row, c).is_some()))
        .count();
    eprintln!(
        "{} Matched {} of {} names against census {} → {}",
        style("✓").green(),
        style(matched).cyan(),
        total,
        style(year).yellow(),
        style(destination(output)).cyan()
    );
    Ok(())
}
