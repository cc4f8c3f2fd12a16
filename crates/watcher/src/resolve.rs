//! Watch-target resolution
//!
//! Repository state lives in the git directory, which is not always at
//! `<repo>/.git`: linked worktrees and submodules have a `.git` *file* that
//! points elsewhere with a `gitdir: <path>` line.

use crate::error::{Result, WatchError};
use std::io;
use std::path::{Path, PathBuf};

/// Resolve the directory that should actually be observed for `path`.
///
/// - `<path>/.git` is a directory: watch it
/// - `<path>/.git` is a `gitdir:` file: follow it (relative to `path`)
/// - anything else that exists: watch `path` itself
pub fn resolve_watch_target(path: &Path) -> Result<PathBuf> {
    let path = canonicalize(path)?;

    let dot_git = path.join(".git");
    if dot_git.is_dir() {
        return Ok(dot_git);
    }
    if dot_git.is_file() {
        return follow_gitdir_file(&dot_git, &path);
    }

    Ok(path)
}

/// Read a `gitdir:` indirection file and resolve its target.
fn follow_gitdir_file(file: &Path, base: &Path) -> Result<PathBuf> {
    let contents = std::fs::read_to_string(file).map_err(|source| WatchError::Resolve {
        path: file.to_path_buf(),
        source,
    })?;

    let gitdir = contents
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .ok_or_else(|| WatchError::BadGitFile(file.to_path_buf()))?;

    let target = Path::new(gitdir);
    if target.is_absolute() {
        canonicalize(target)
    } else {
        canonicalize(&base.join(target))
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => WatchError::NotFound(path.to_path_buf()),
        _ => WatchError::Resolve {
            path: path.to_path_buf(),
            source,
        },
    })
}
