//! One-shot status of every repository

use crate::render;
use crate::session::Session;
use crate::system_config;
use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(paths: Vec<PathBuf>) -> Result<()> {
    let config = system_config::load().context("Failed to load configuration")?;
    let repos = util::resolve_repos(&paths, &config)?;

    if repos.is_empty() {
        println!("{}", "No repositories to show".yellow());
        println!(
            "  {}",
            "Tip: pass repository paths, or set `repos` / `roots` (vigil config path --create)"
                .dimmed()
        );
        return Ok(());
    }

    let session = Session::new(&config, repos);
    let reports = session.snapshot().await;

    println!("{}", "Repository Status".bold());
    println!("{}", render::RULE);
    for (index, report) in reports.iter().enumerate() {
        println!("{}", render::status_line(index, &report.path, &report.status));
    }
    println!();
    println!("{}", render::summary_line(&reports).dimmed());

    Ok(())
}
