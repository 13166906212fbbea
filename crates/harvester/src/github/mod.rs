//! GitHub REST provider.
//!
//! # Module Structure
//!
//! - [`types`] - Wire payloads for the repository and commit endpoints
//! - `client` - [`GitHubClient`], Link-header pagination, failure extraction
//! - `convert` - Payload to fetcher record conversion
//!
//! ```ignore
//! use harvester::github::GitHubClient;
//! use harvester::fetch::ResilientFetcher;
//!
//! let client = GitHubClient::with_reqwest(Some(token))?;
//! let fetcher = ResilientFetcher::new(client, policy);
//! ```

mod client;
mod convert;
pub mod types;

pub use client::{
    API_VERSION, COMMITS_PER_PAGE, DEFAULT_API_URL, GitHubClient, LinkPagination, USER_AGENT,
    failure_from_response, parse_link_header,
};
pub use convert::{to_commit_data, to_repository_metadata};
