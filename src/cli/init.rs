//! Init command - write an example config file

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::config::UserConfig;

/// Run the init command
pub fn run(path: Option<&Path>) -> Result<()> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => UserConfig::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    if crate::config::write_example(&config_path)? {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    } else {
        println!(
            "{} Config already exists at {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    }

    println!("\nNext steps:");
    println!("  {} Point [paths] models/data at your artifacts", style("edit config.toml").cyan());
    println!("  {} List models and check they are installed", style("ethnicolr models").cyan());
    Ok(())
}
