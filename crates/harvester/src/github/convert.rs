//! Conversion from GitHub payloads to fetcher records.

use super::types::{GitHubCommit, GitHubRepo};
use crate::fetch::{CommitData, ProviderFailure, RepositoryMetadata};

/// Convert a GitHub repository payload to [`RepositoryMetadata`].
pub fn to_repository_metadata(repo: GitHubRepo) -> RepositoryMetadata {
    RepositoryMetadata {
        provider_id: repo.id,
        owner: repo.owner.login,
        name: repo.name,
        description: repo.description.filter(|d| !d.is_empty()),
        url: repo.html_url,
        language: repo.language.filter(|l| !l.is_empty()),
        forks_count: repo.forks_count,
        stars_count: repo.stargazers_count,
        open_issues_count: repo.open_issues_count,
        watchers_count: repo.watchers_count,
        provider_created_at: repo.created_at,
        provider_updated_at: repo.updated_at,
    }
}

/// Convert a commit listing entry to [`CommitData`].
///
/// The committer date is the commit date, since that is the date the
/// listing's `since` filter compares against; the author date is used when
/// the committer carries none. An entry with neither is undecodable.
pub fn to_commit_data(commit: GitHubCommit) -> Result<CommitData, ProviderFailure> {
    let author = commit.commit.author.unwrap_or_default();
    let commit_date = commit
        .commit
        .committer
        .as_ref()
        .and_then(|c| c.date)
        .or(author.date)
        .ok_or_else(|| ProviderFailure::Decode(format!("commit {} has no date", commit.sha)))?;

    Ok(CommitData {
        sha: commit.sha,
        author_name: author.name.unwrap_or_default(),
        author_email: author.email.unwrap_or_default(),
        message: commit.commit.message,
        url: commit.html_url,
        commit_date,
    })
}
