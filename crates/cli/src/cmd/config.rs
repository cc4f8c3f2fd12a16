//! Configuration management command
//!
//! Provides CLI interface to view and edit system configuration.

use crate::system_config::{self, KEYS};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    println!("{}", "System Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    let mut section = "";
    for &key in KEYS {
        let (key_section, name) = key.split_once('.').unwrap_or(("", key));
        if key_section != section {
            println!("\n{}", format!("[{}]", key_section).yellow());
            section = key_section;
        }
        println!("  {} = {}", name.cyan(), config.get(key)?);
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  discover_depth: 1-8");
    println!("  fetch.subprocess_concurrency: 1-64");
    println!("  fetch.debounce_ms, watch.debounce_ms: 0-10,000");
    println!("  *_ttl_secs, refresh.interval_secs: 0-86,400 (refresh 0 = disabled)");
    println!("  review.limit: at least 1");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;
    println!("{}", config.get(key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load()?;
    config.set(key, value)?;
    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), config.get(key)?);
    println!(
        "{}",
        "Note: Restart running dashboards for changes to take effect".yellow()
    );

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
