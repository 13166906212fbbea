use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live repository metadata as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Provider-assigned numeric id.
    pub provider_id: i64,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    /// Browser URL of the repository.
    pub url: String,
    pub language: Option<String>,
    pub forks_count: i32,
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,
    pub provider_created_at: DateTime<Utc>,
    pub provider_updated_at: DateTime<Utc>,
}

/// One commit as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Browser URL of the commit.
    pub url: String,
    /// Author date.
    pub commit_date: DateTime<Utc>,
}

/// A single page of a commit listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitPage {
    pub commits: Vec<CommitData>,
    /// Page number to request next, `None` on the last page.
    pub next_page: Option<u32>,
}
