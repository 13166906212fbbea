//! GitHub REST client implementing [`ProviderApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use super::convert::{to_commit_data, to_repository_metadata};
use super::types::{GitHubCommit, GitHubErrorBody, GitHubRepo};
use crate::fetch::{CommitPage, ProviderApi, ProviderFailure, RepositoryMetadata};
use crate::http::{
    DEFAULT_REQUEST_TIMEOUT, HttpHeaders, HttpRequest, HttpResponse, HttpTransport,
};

/// Public GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page size the commits endpoint accepts.
pub const COMMITS_PER_PAGE: u32 = 100;

/// REST API version sent with every request.
pub const API_VERSION: &str = "2022-11-28";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("harvester/", env!("CARGO_PKG_VERSION"));

/// Pagination information extracted from GitHub's Link header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// The last page number (from rel="last" link).
    pub last_page: Option<u32>,
    /// The next page number (from rel="next" link).
    pub next_page: Option<u32>,
}

/// Parse the Link header to extract pagination info.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
            {
                url = Some(inner);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel_type)) = (url, rel)
            && let Some(page_num) = extract_page_from_url(url)
        {
            match rel_type {
                "last" => info.last_page = Some(page_num),
                "next" => info.next_page = Some(page_num),
                _ => {}
            }
        }
    }

    info
}

/// Extract the page parameter from a URL.
fn extract_page_from_url(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}

/// Build a [`ProviderFailure`] from a non-success response.
///
/// Picks up the JSON `message` and the rate-limit headers GitHub attaches to
/// 403/429 responses.
pub fn failure_from_response(response: &HttpResponse) -> ProviderFailure {
    let message = serde_json::from_slice::<GitHubErrorBody>(&response.body)
        .map(|body| body.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).trim().to_string());

    let retry_after = response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let rate_limit_remaining = response
        .header("x-ratelimit-remaining")
        .and_then(|v| v.trim().parse::<u64>().ok());
    let rate_limit_reset = response
        .header("x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0));

    ProviderFailure::Http {
        status: response.status,
        message,
        retry_after,
        rate_limit_remaining,
        rate_limit_reset,
    }
}

/// GitHub REST client. One method call is one HTTP request; retries live in
/// [`crate::fetch::ResilientFetcher`].
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client over `transport`. Without a token requests are
    /// anonymous and subject to the much lower unauthenticated quota.
    pub fn new(transport: Arc<dyn HttpTransport>, token: Option<String>) -> Self {
        Self {
            transport,
            api_url: DEFAULT_API_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a client backed by reqwest, with requests bounded by
    /// [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn with_reqwest(token: Option<String>) -> Result<Self, crate::http::HttpError> {
        let transport = crate::http::reqwest_transport::ReqwestTransport::with_timeout(
            USER_AGENT,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        Ok(Self::new(Arc::new(transport), token))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn headers(&self) -> HttpHeaders {
        let mut headers = vec![
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    fn repo_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, owner, name)
    }

    fn commits_url(&self, owner: &str, name: &str, since: DateTime<Utc>, page: u32) -> String {
        format!(
            "{}/commits?since={}&per_page={}&page={}",
            self.repo_url(owner, name),
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
            COMMITS_PER_PAGE,
            page
        )
    }

    /// GET `url` and decode a JSON body, returning the response headers too.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<(T, HttpHeaders), ProviderFailure> {
        let response = self
            .transport
            .send(HttpRequest {
                url,
                headers: self.headers(),
            })
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(failure_from_response(&response));
        }

        let data = serde_json::from_slice(&response.body)
            .map_err(|e| ProviderFailure::Decode(e.to_string()))?;
        Ok((data, response.headers))
    }
}

#[async_trait]
impl ProviderApi for GitHubClient {
    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryMetadata, ProviderFailure> {
        let (repo, _) = self.get_json::<GitHubRepo>(self.repo_url(owner, name)).await?;
        Ok(to_repository_metadata(repo))
    }

    async fn list_commits_page(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<CommitPage, ProviderFailure> {
        let url = self.commits_url(owner, name, since, page);
        let (items, headers) = match self.get_json::<Vec<GitHubCommit>>(url).await {
            Ok(found) => found,
            // An empty repository answers 409 "Git Repository is empty."
            Err(ProviderFailure::Http { status: 409, .. }) => {
                return Ok(CommitPage {
                    commits: Vec::new(),
                    next_page: None,
                });
            }
            Err(e) => return Err(e),
        };

        let next_page = crate::http::header_get(&headers, "link")
            .map(parse_link_header)
            .and_then(|links| links.next_page);
        let commits = items
            .into_iter()
            .map(to_commit_data)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommitPage { commits, next_page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedRandom, PausedClock};
    use crate::fetch::{FailureKind, FetchError, RepositoryFetcher, ResilientFetcher, classify};
    use crate::http::MockTransport;
    use crate::identifier::RepositoryIdentifier;
    use crate::retry::{RetryConfig, RetryPolicy};
    use tokio_util::sync::CancellationToken;

    const REPO_JSON: &str = r#"{
        "id": 42,
        "name": "widgets",
        "owner": { "login": "acme" },
        "html_url": "https://github.com/acme/widgets",
        "description": "Widgets for everyone",
        "language": "Rust",
        "forks_count": 3,
        "stargazers_count": 10,
        "open_issues_count": 1,
        "watchers_count": 10,
        "created_at": "2020-01-01T00:00:00Z",
        "updated_at": "2024-01-05T00:00:00Z"
    }"#;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn commit_json(sha: &str, date: &str) -> String {
        format!(
            r#"{{
                "sha": "{sha}",
                "html_url": "https://github.com/acme/widgets/commit/{sha}",
                "commit": {{
                    "message": "change {sha}",
                    "author": {{ "name": "Ada", "email": "ada@example.com", "date": "{date}" }}
                }}
            }}"#
        )
    }

    fn ok(body: impl Into<Vec<u8>>, headers: HttpHeaders) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers,
            body: body.into(),
        }
    }

    fn status(code: u16, body: &str, headers: HttpHeaders) -> HttpResponse {
        HttpResponse {
            status: code,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    fn client(transport: &MockTransport, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(Arc::new(transport.clone()), token.map(str::to_string))
            .with_api_url("https://api.test/")
    }

    #[test]
    fn test_parse_link_header_full() {
        let header = r#"<https://api.github.com/repositories/1/commits?per_page=100&page=2>; rel="next", <https://api.github.com/repositories/1/commits?per_page=100&page=3>; rel="last""#;

        let info = parse_link_header(header);
        assert_eq!(info.next_page, Some(2));
        assert_eq!(info.last_page, Some(3));
    }

    #[test]
    fn test_parse_link_header_last_page_has_no_next() {
        let header = r#"<https://api.github.com/repositories/1/commits?page=1>; rel="first", <https://api.github.com/repositories/1/commits?page=2>; rel="prev""#;

        let info = parse_link_header(header);
        assert_eq!(info.next_page, None);
        assert_eq!(info.last_page, None);
    }

    #[test]
    fn test_parse_link_header_empty() {
        assert_eq!(parse_link_header(""), LinkPagination::default());
    }

    #[test]
    fn test_extract_page_from_url() {
        assert_eq!(
            extract_page_from_url("https://api.github.com/repos?page=5"),
            Some(5)
        );
        assert_eq!(
            extract_page_from_url("https://api.github.com/repos?per_page=100&page=3"),
            Some(3)
        );
        assert_eq!(
            extract_page_from_url("https://api.github.com/repos?per_page=100"),
            None
        );
        assert_eq!(extract_page_from_url("https://api.github.com/repos"), None);
    }

    #[test]
    fn failure_extraction_reads_rate_limit_headers() {
        let response = status(
            403,
            r#"{"message":"API rate limit exceeded for user ID 1.","documentation_url":"https://docs.github.com"}"#,
            vec![
                ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                ("X-RateLimit-Reset".to_string(), "1717243200".to_string()),
            ],
        );

        let failure = failure_from_response(&response);
        match &failure {
            ProviderFailure::Http {
                status,
                message,
                retry_after,
                rate_limit_remaining,
                rate_limit_reset,
            } => {
                assert_eq!(*status, 403);
                assert!(message.starts_with("API rate limit exceeded"));
                assert_eq!(*retry_after, None);
                assert_eq!(*rate_limit_remaining, Some(0));
                assert_eq!(*rate_limit_reset, Some(ts("2024-06-01T12:00:00Z")));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert_eq!(
            classify(&failure),
            FailureKind::RateLimited {
                reset_at: ts("2024-06-01T12:00:00Z")
            }
        );
    }

    #[test]
    fn failure_extraction_reads_retry_after_and_plain_bodies() {
        let response = status(
            429,
            "slow down",
            vec![("Retry-After".to_string(), "17".to_string())],
        );
        let failure = failure_from_response(&response);
        assert_eq!(
            classify(&failure),
            FailureKind::Throttled {
                retry_after: Duration::from_secs(17)
            }
        );
        assert!(failure.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn get_repository_sends_headers_and_decodes() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/widgets",
            ok(REPO_JSON, Vec::new()),
        );

        let meta = client(&transport, Some("secret"))
            .get_repository("acme", "widgets")
            .await
            .unwrap();

        assert_eq!(meta.provider_id, 42);
        assert_eq!(meta.description.as_deref(), Some("Widgets for everyone"));
        assert_eq!(meta.provider_updated_at, ts("2024-01-05T00:00:00Z"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let headers = &requests[0].headers;
        assert_eq!(
            crate::http::header_get(headers, "authorization"),
            Some("Bearer secret")
        );
        assert_eq!(
            crate::http::header_get(headers, "accept"),
            Some("application/vnd.github+json")
        );
        assert_eq!(
            crate::http::header_get(headers, "x-github-api-version"),
            Some(API_VERSION)
        );
    }

    #[tokio::test]
    async fn anonymous_client_sends_no_authorization() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/widgets",
            ok(REPO_JSON, Vec::new()),
        );

        client(&transport, Some(""))
            .get_repository("acme", "widgets")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "authorization"),
            None
        );
    }

    #[tokio::test]
    async fn commits_page_uses_since_and_link_header() {
        let transport = MockTransport::new();
        let url = "https://api.test/repos/acme/widgets/commits?since=2024-01-02T00:00:01Z&per_page=100&page=1";
        let body = format!(
            "[{},{}]",
            commit_json("b", "2024-01-04T00:00:00Z"),
            commit_json("a", "2024-01-03T00:00:00Z")
        );
        transport.push_response(
            url,
            ok(
                body,
                vec![(
                    "Link".to_string(),
                    r#"<https://api.test/repositories/42/commits?since=2024-01-02T00%3A00%3A01Z&per_page=100&page=2>; rel="next""#.to_string(),
                )],
            ),
        );

        let page = client(&transport, None)
            .list_commits_page("acme", "widgets", ts("2024-01-02T00:00:01Z"), 1)
            .await
            .unwrap();

        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.commits.len(), 2);
        assert_eq!(page.commits[0].sha, "b");
        assert_eq!(page.commits[1].commit_date, ts("2024-01-03T00:00:00Z"));
    }

    #[tokio::test]
    async fn empty_repository_yields_empty_last_page() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/empty/commits?since=2023-01-01T00:00:00Z&per_page=100&page=1",
            status(409, r#"{"message":"Git Repository is empty."}"#, Vec::new()),
        );

        let page = client(&transport, None)
            .list_commits_page("acme", "empty", ts("2023-01-01T00:00:00Z"), 1)
            .await
            .unwrap();

        assert!(page.commits.is_empty());
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn not_found_maps_to_http_failure_with_message() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/missing",
            status(404, r#"{"message":"Not Found"}"#, Vec::new()),
        );

        let err = client(&transport, None)
            .get_repository("acme", "missing")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderFailure::http(404, "Not Found"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_failure() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/widgets",
            ok("{not json", Vec::new()),
        );

        let err = client(&transport, None)
            .get_repository("acme", "widgets")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Decode(_)));
    }

    #[tokio::test]
    async fn transport_errors_map_to_transport_failures() {
        let transport = MockTransport::new();
        transport.push_transport_error("https://api.test/repos/acme/widgets", "connection reset");

        let err = client(&transport, None)
            .get_repository("acme", "widgets")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Transport(ref m) if m.contains("connection reset")));
    }

    fn resilient(transport: &MockTransport) -> ResilientFetcher<GitHubClient> {
        let policy = RetryPolicy::new(
            RetryConfig::default(),
            Arc::new(PausedClock::new(ts("2024-06-01T11:59:00Z"))),
            Arc::new(FixedRandom(0.5)),
        );
        ResilientFetcher::new(client(transport, Some("secret")), policy)
    }

    #[tokio::test(start_paused = true)]
    async fn service_unavailable_then_success_makes_two_requests() {
        let transport = MockTransport::new();
        let url = "https://api.test/repos/acme/widgets";
        transport.push_response(url, status(503, "", Vec::new()));
        transport.push_response(url, ok(REPO_JSON, Vec::new()));

        let id = RepositoryIdentifier::new("acme", "widgets").unwrap();
        let meta = resilient(&transport)
            .fetch_repository_metadata(&id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(meta.name, "widgets");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_request_waits_for_reset() {
        let transport = MockTransport::new();
        let url = "https://api.test/repos/acme/widgets";
        // Clock starts at 11:59:00, reset is at 12:00:00.
        transport.push_response(
            url,
            status(
                403,
                r#"{"message":"API rate limit exceeded"}"#,
                vec![
                    ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                    ("X-RateLimit-Reset".to_string(), "1717243200".to_string()),
                ],
            ),
        );
        transport.push_response(url, ok(REPO_JSON, Vec::new()));

        let id = RepositoryIdentifier::new("acme", "widgets").unwrap();
        let started = tokio::time::Instant::now();
        resilient(&transport)
            .fetch_repository_metadata(&id, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_server_error_exhausts_attempts() {
        let transport = MockTransport::new();
        let url = "https://api.test/repos/acme/widgets";
        for _ in 0..10 {
            transport.push_response(url, status(500, "", Vec::new()));
        }

        let id = RepositoryIdentifier::new("acme", "widgets").unwrap();
        let err = resilient(&transport)
            .fetch_repository_metadata(&id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transient { attempts: 5, .. }));
        assert_eq!(transport.requests().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_fails_after_one_request() {
        let transport = MockTransport::new();
        transport.push_response(
            "https://api.test/repos/acme/widgets",
            status(401, r#"{"message":"Bad credentials"}"#, Vec::new()),
        );

        let id = RepositoryIdentifier::new("acme", "widgets").unwrap();
        let err = resilient(&transport)
            .fetch_repository_metadata(&id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Permanent { ref message } if message.contains("Bad credentials")));
        assert_eq!(transport.requests().len(), 1);
    }
}
