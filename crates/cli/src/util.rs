//! Shared utilities for CLI commands

use crate::system_config::SystemConfig;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for repositories
const SKIP_DIRS: &[&str] = &["node_modules", "target"];

/// Whether `path` is the root of a git repository (`.git` dir or file)
pub fn is_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Find repositories below each of `roots`, at most `depth` levels down.
///
/// Found repositories are not descended into. Hidden directories,
/// `node_modules` and `target` are skipped. Sorted, without duplicates.
pub fn discover_repos(roots: &[PathBuf], depth: usize) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for root in roots {
        let mut walker = WalkDir::new(root)
            .min_depth(0)
            .max_depth(depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !should_skip(entry));

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if is_repo(entry.path()) {
                found.insert(entry.path().to_path_buf());
                walker.skip_current_dir();
            }
        }
    }

    found.into_iter().collect()
}

fn should_skip(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    match entry.file_name().to_str() {
        Some(name) => name.starts_with('.') || SKIP_DIRS.contains(&name),
        None => false,
    }
}

/// Repositories to show: explicit `paths`, else the configured list plus
/// everything discovered under the configured roots.
pub fn resolve_repos(paths: &[PathBuf], config: &SystemConfig) -> Result<Vec<PathBuf>> {
    if !paths.is_empty() {
        let mut repos = Vec::new();
        for path in paths {
            let repo = path
                .canonicalize()
                .with_context(|| format!("Repository not found: {}", path.display()))?;
            if !repos.contains(&repo) {
                repos.push(repo);
            }
        }
        return Ok(repos);
    }

    let mut repos: Vec<PathBuf> = Vec::new();
    for path in config.repos.iter().map(|p| expand_tilde(p)) {
        if !repos.contains(&path) {
            repos.push(path);
        }
    }

    let roots: Vec<PathBuf> = config.roots.iter().map(|p| expand_tilde(p)).collect();
    for repo in discover_repos(&roots, config.discover_depth) {
        if !repos.contains(&repo) {
            repos.push(repo);
        }
    }

    Ok(repos)
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Display `path` with the home directory shortened to `~`.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return if rest.as_os_str().is_empty() {
                "~".to_string()
            } else {
                format!("~/{}", rest.display())
            };
        }
    }
    path.display().to_string()
}

/// Format a pluralized count ("1 repository", "3 repositories")
pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
