//! GitHub REST API data types.
//!
//! Only the fields harvester stores are modelled; everything else in the
//! payloads is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository owner (user or organization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubOwner {
    pub login: String,
}

/// `GET /repos/{owner}/{repo}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: i64,
    pub name: String,
    pub owner: GitHubOwner,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub forks_count: i32,
    #[serde(default)]
    pub stargazers_count: i32,
    #[serde(default)]
    pub open_issues_count: i32,
    #[serde(default)]
    pub watchers_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Git identity attached to a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubGitActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// The git-level part of a commit listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubGitCommit {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitHubGitActor>,
    #[serde(default)]
    pub committer: Option<GitHubGitActor>,
}

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: GitHubGitCommit,
}

/// Error payload returned with non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubErrorBody {
    pub message: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_deserializes_from_api_payload() {
        let json = r#"{
            "id": 1296269,
            "node_id": "MDEwOlJlcG9zaXRvcnkxMjk2MjY5",
            "name": "widgets",
            "full_name": "acme/widgets",
            "owner": { "login": "acme", "id": 1 },
            "private": false,
            "html_url": "https://github.com/acme/widgets",
            "description": null,
            "language": "Rust",
            "forks_count": 9,
            "stargazers_count": 80,
            "watchers_count": 80,
            "open_issues_count": 2,
            "created_at": "2011-01-26T19:01:12Z",
            "updated_at": "2024-01-26T19:14:43Z"
        }"#;

        let repo: GitHubRepo = serde_json::from_str(json).unwrap();
        assert_eq!(repo.id, 1296269);
        assert_eq!(repo.owner.login, "acme");
        assert!(repo.description.is_none());
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert_eq!(repo.stargazers_count, 80);
    }

    #[test]
    fn commit_tolerates_missing_actor_fields() {
        let json = r#"{
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "html_url": "https://github.com/acme/widgets/commit/6dcb09b",
            "commit": {
                "message": "Fix all the bugs",
                "author": { "date": "2024-01-01T00:00:00Z" },
                "committer": null
            },
            "author": null
        }"#;

        let commit: GitHubCommit = serde_json::from_str(json).unwrap();
        let author = commit.commit.author.unwrap();
        assert!(author.name.is_none());
        assert!(author.date.is_some());
        assert!(commit.commit.committer.is_none());
    }
}
