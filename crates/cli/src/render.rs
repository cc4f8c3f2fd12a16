//! Plain-text dashboard rendering

use crate::session::{RepoReport, ReviewResult, StatusResult};
use crate::util;
use collect::{PullRequest, RepoStatus, ReviewDecision};
use owo_colors::OwoColorize;
use std::path::Path;

pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// One dashboard line for a repository
pub fn status_line(index: usize, repo: &Path, status: &StatusResult) -> String {
    let label = format!("[{:>2}]", index);
    let name = util::display_path(repo);

    match status {
        Ok(status) => format!(
            "{} {}  {}",
            label.dimmed(),
            name.bold(),
            describe_status(status)
        ),
        Err(err) => format!(
            "{} {}  {} {}",
            label.dimmed(),
            name.bold(),
            "unavailable".red(),
            format!("({})", err.summary()).dimmed()
        ),
    }
}

/// Branch, divergence and working-tree counts
pub fn describe_status(status: &RepoStatus) -> String {
    let mut parts = Vec::new();

    let branch = status.branch.as_deref().unwrap_or("(detached)");
    parts.push(branch.cyan().to_string());

    if status.ahead > 0 {
        parts.push(format!("↑{}", status.ahead).green().to_string());
    }
    if status.behind > 0 {
        parts.push(format!("↓{}", status.behind).yellow().to_string());
    }

    if status.is_clean() {
        parts.push("clean".green().to_string());
    } else {
        if status.staged > 0 {
            parts.push(format!("+{}", status.staged).green().to_string());
        }
        if status.unstaged > 0 {
            parts.push(format!("~{}", status.unstaged).yellow().to_string());
        }
        if status.untracked > 0 {
            parts.push(format!("?{}", status.untracked).dimmed().to_string());
        }
        if status.conflicted > 0 {
            parts.push(format!("!{}", status.conflicted).red().to_string());
        }
    }

    parts.join(" ")
}

/// Closing line of a snapshot
pub fn summary_line(reports: &[RepoReport]) -> String {
    let unavailable = reports.iter().filter(|r| !r.is_available()).count();
    let dirty = reports
        .iter()
        .filter(|r| matches!(&r.status, Ok(status) if !status.is_clean()))
        .count();

    let mut line = util::plural(reports.len(), "repository", "repositories");
    if dirty > 0 {
        line.push_str(&format!(", {} with changes", dirty));
    }
    if unavailable > 0 {
        line.push_str(&format!(", {} unavailable", unavailable));
    }
    line
}

/// Detail lines for the selected repository
pub fn review_lines(repo: &Path, reviews: Option<&ReviewResult>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}",
        "Pull requests:".bold(),
        util::display_path(repo).cyan()
    )];

    match reviews {
        None => lines.push(format!("  {}", "review collection is disabled".dimmed())),
        Some(Err(err)) => lines.push(format!("  {} {}", "unavailable:".red(), err)),
        Some(Ok(prs)) if prs.is_empty() => {
            lines.push(format!("  {}", "no open pull requests".dimmed()))
        }
        Some(Ok(prs)) => lines.extend(prs.iter().map(pull_request_line)),
    }
    lines
}

fn pull_request_line(pr: &PullRequest) -> String {
    let decision = match pr.review_decision {
        Some(d @ ReviewDecision::Approved) => d.label().green().to_string(),
        Some(d @ ReviewDecision::ChangesRequested) => d.label().red().to_string(),
        Some(d) => d.label().yellow().to_string(),
        None => String::new(),
    };
    let draft = if pr.is_draft {
        format!(" {}", "draft".dimmed())
    } else {
        String::new()
    };

    format!(
        "  {} {} {}{} {}",
        format!("#{}", pr.number).yellow(),
        pr.title,
        format!("({})", pr.head_ref_name).dimmed(),
        draft,
        decision
    )
    .trim_end()
    .to_string()
}

/// Keys understood by `vigil watch`
pub fn help_text() -> String {
    format!(
        "{}  {} select  {} refresh  {} quit",
        "Keys:".dimmed(),
        "<n>".cyan(),
        "r".cyan(),
        "q".cyan()
    )
}
