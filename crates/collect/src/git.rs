//! Working-tree status via `git status --porcelain=v2 --branch`

use crate::error::{CollectError, Result};
use crate::process::{describe, run_command};
use crate::Collector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

const GIT_STATUS_ARGS: &[&str] = &["status", "--porcelain=v2", "--branch"];

/// Summary of one repository's working tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatus {
    /// Checked-out branch; `None` when HEAD is detached
    pub branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub conflicted: usize,
}

impl RepoStatus {
    /// Parse porcelain v2 output (with `--branch` headers).
    ///
    /// Only the counts are derived; per-file records are not kept.
    pub fn parse(output: &str) -> std::result::Result<Self, String> {
        let mut status = RepoStatus::default();

        for line in output.lines() {
            let mut fields = line.split(' ');
            match fields.next() {
                Some("#") => status.parse_header(line)?,
                Some("1") | Some("2") => {
                    let xy = fields
                        .next()
                        .filter(|xy| xy.len() == 2)
                        .ok_or_else(|| format!("missing XY field: {line}"))?;
                    let mut codes = xy.chars();
                    if codes.next() != Some('.') {
                        status.staged += 1;
                    }
                    if codes.next() != Some('.') {
                        status.unstaged += 1;
                    }
                }
                Some("u") => status.conflicted += 1,
                Some("?") => status.untracked += 1,
                // Ignored entries ("!") and blank lines
                _ => {}
            }
        }

        Ok(status)
    }

    fn parse_header(&mut self, line: &str) -> std::result::Result<(), String> {
        let mut parts = line.splitn(3, ' ').skip(1);
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            return Ok(());
        };

        match key {
            "branch.head" => {
                self.branch = (value != "(detached)").then(|| value.to_string());
            }
            "branch.upstream" => self.upstream = Some(value.to_string()),
            "branch.ab" => {
                let (ahead, behind) = value
                    .split_once(' ')
                    .ok_or_else(|| format!("malformed branch.ab: {line}"))?;
                self.ahead = parse_count(ahead, '+')?;
                self.behind = parse_count(behind, '-')?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Nothing staged, modified, untracked or conflicted
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0 && self.conflicted == 0
    }

    /// In step with the upstream (or no upstream at all)
    pub fn is_synced(&self) -> bool {
        self.ahead == 0 && self.behind == 0
    }
}

fn parse_count(field: &str, sign: char) -> std::result::Result<u32, String> {
    field
        .strip_prefix(sign)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| format!("bad ahead/behind count: {field}"))
}

/// Collects [`RepoStatus`] by running `git`
#[derive(Debug, Clone, Default)]
pub struct GitStatusCollector;

impl GitStatusCollector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collector for GitStatusCollector {
    type Output = RepoStatus;

    fn name(&self) -> &'static str {
        "git-status"
    }

    async fn collect(&self, repo: &Path) -> Result<RepoStatus> {
        let output = run_command("git", GIT_STATUS_ARGS, repo).await?;
        RepoStatus::parse(&output).map_err(|reason| CollectError::Parse {
            command: describe("git", GIT_STATUS_ARGS),
            reason,
        })
    }
}
