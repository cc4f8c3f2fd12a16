//! Open pull requests via the GitHub CLI (`gh pr list`)

use crate::error::{CollectError, Result};
use crate::process::{describe, run_command};
use crate::Collector;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

const PR_FIELDS: &str = "number,title,isDraft,reviewDecision,headRefName";

/// One open pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub is_draft: bool,
    #[serde(default, deserialize_with = "review_decision")]
    pub review_decision: Option<ReviewDecision>,
    pub head_ref_name: String,
}

/// Aggregate review state of a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
    #[serde(other)]
    Unknown,
}

impl ReviewDecision {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::ChangesRequested => "changes requested",
            ReviewDecision::ReviewRequired => "review required",
            ReviewDecision::Unknown => "unknown",
        }
    }
}

/// `gh` reports "no decision" as an empty string
fn review_decision<'de, D>(deserializer: D) -> std::result::Result<Option<ReviewDecision>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None | Some("") => None,
        Some("APPROVED") => Some(ReviewDecision::Approved),
        Some("CHANGES_REQUESTED") => Some(ReviewDecision::ChangesRequested),
        Some("REVIEW_REQUIRED") => Some(ReviewDecision::ReviewRequired),
        Some(_) => Some(ReviewDecision::Unknown),
    })
}

/// Parse the JSON array printed by `gh pr list --json ...`.
pub fn parse_pull_requests(json: &str) -> std::result::Result<Vec<PullRequest>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Collects open pull requests for a repository
#[derive(Debug, Clone)]
pub struct ReviewCollector {
    limit: usize,
}

impl ReviewCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[async_trait]
impl Collector for ReviewCollector {
    type Output = Vec<PullRequest>;

    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn collect(&self, repo: &Path) -> Result<Vec<PullRequest>> {
        let limit = self.limit.to_string();
        let args = ["pr", "list", "--json", PR_FIELDS, "--limit", limit.as_str()];

        let output = run_command("gh", &args, repo).await?;
        parse_pull_requests(&output).map_err(|err| CollectError::Parse {
            command: describe("gh", &args),
            reason: err.to_string(),
        })
    }
}
