// # GitHub Store
//
// Publishes the monitor document as a file in a GitHub repository, using the
// REST contents API. Every publish is a commit.
//
// ## Versioning
//
// The blob `sha` GitHub returns for a file is the version token. A PUT that
// carries a stale `sha`, or none for a file that already exists, is rejected
// by GitHub and reported as a conflict.
//
// ## Failure Handling
//
// - One HTTP request per operation, no retries (the next cycle retries)
// - Transport timeouts are reqwest's defaults
// - The token never appears in logs, errors or `Debug` output
//
// ## API Reference
//
// - Get contents: GET `/repos/{owner}/{repo}/contents/{path}?ref={branch}`
// - Create or update: PUT `/repos/{owner}/{repo}/contents/{path}`

use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use ipmon_core::config::StoreConfig;
use ipmon_core::traits::{RemoteDocument, RemoteStore, VersionToken};
use ipmon_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

/// Media type for the v3 REST API
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// User-Agent sent with every request (GitHub rejects requests without one)
const USER_AGENT: &str = concat!("ipmon/", env!("CARGO_PKG_VERSION"));

/// GET response of the contents endpoint (file case)
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    /// Base64, wrapped at 60 columns
    content: String,
    sha: String,
}

/// PUT body of the contents endpoint
#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// PUT response of the contents endpoint
#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: CommittedFile,
}

#[derive(Debug, Deserialize)]
struct CommittedFile {
    sha: String,
}

/// Document store backed by a GitHub repository
pub struct GitHubStore {
    /// Personal access token
    /// ⚠️ NEVER log this value
    token: String,

    /// Repository in `owner/name` form
    repo: String,

    /// Branch to read from and commit to
    branch: String,

    /// API base URL without trailing slash
    api_base: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("token", &"<REDACTED>")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubStore {
    /// Create a new GitHub store
    ///
    /// # Parameters
    ///
    /// - `token`: Token with contents write permission on `repo`
    /// - `repo`: Repository in `owner/name` form
    /// - `branch`: Branch to commit to
    /// - `api_base`: API base URL, `https://api.github.com` for github.com
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty token or if the HTTP client
    /// cannot be built.
    pub fn new(
        token: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("GitHub token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token,
            repo: repo.into(),
            branch: branch.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a store from the `store` section of the configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config {
            StoreConfig::Github {
                token,
                repo,
                branch,
                api_base,
            } => Self::new(token.clone(), repo.clone(), branch.clone(), api_base.clone()),
            other => Err(Error::config(format!(
                "Invalid config for GitHub store: {}",
                other.type_name()
            ))),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    /// Read a file from the configured branch
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /repos/owner/name/contents/data.json?ref=main
    /// Authorization: token <token>
    /// ```
    async fn fetch(&self, path: &str) -> Result<Option<RemoteDocument>> {
        let url = self.contents_url(path);
        tracing::debug!("Fetching {} from {}@{}", path, self.repo, self.branch);

        let response = self
            .request(Method::GET, &url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| Error::remote_read(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        match read_status(status) {
            ReadStatus::Found => {}
            ReadStatus::Absent => {
                tracing::debug!("{} not found in {}", path, self.repo);
                return Ok(None);
            }
            ReadStatus::Failed => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(read_error(status, &error_text));
            }
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| Error::remote_read(format!("Failed to parse response: {}", e)))?;

        let content = decode_content(&body.content)?;
        Ok(Some(RemoteDocument {
            content,
            version: VersionToken::new(body.sha),
        }))
    }

    /// Create or update a file with one commit
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /repos/owner/name/contents/data.json
    /// {
    ///   "message": "Update local IP: ...",
    ///   "content": "<base64>",
    ///   "branch": "main",
    ///   "sha": "<blob sha>"
    /// }
    /// ```
    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<VersionToken> {
        let url = self.contents_url(path);
        let body = PutContentsRequest {
            message,
            content: BASE64_STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha: version.map(VersionToken::as_str),
        };

        let response = self
            .request(Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::remote_write(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(write_error(status, &error_text));
        }

        let committed: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| Error::remote_write(format!("Failed to parse response: {}", e)))?;

        tracing::info!("Committed {} to {}@{}: {}", path, self.repo, self.branch, message);
        Ok(VersionToken::new(committed.content.sha))
    }

    fn store_name(&self) -> &'static str {
        "github"
    }
}

/// Decode the line-wrapped base64 `content` field
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::remote_read(format!("Invalid base64 content: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| Error::remote_read(format!("Content is not UTF-8: {}", e)))
}

/// How a GET status is handled before the body is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStatus {
    Found,
    /// The file does not exist on the branch
    Absent,
    Failed,
}

fn read_status(status: StatusCode) -> ReadStatus {
    if status == StatusCode::NOT_FOUND {
        ReadStatus::Absent
    } else if status.is_success() {
        ReadStatus::Found
    } else {
        ReadStatus::Failed
    }
}

/// Map a failed GET status to an error
fn read_error(status: StatusCode, error_text: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::remote_read(format!(
            "Authentication failed: invalid token or insufficient permissions. Status: {}",
            status
        )),
        500..=599 => Error::remote_read(format!(
            "GitHub server error (transient): {} - {}",
            status, error_text
        )),
        _ => Error::remote_read(format!("Read failed: {} - {}", status, error_text)),
    }
}

/// Map a failed PUT status to an error
fn write_error(status: StatusCode, error_text: &str) -> Error {
    match status.as_u16() {
        // 409: sha does not match the branch head
        // 422: sha missing for an existing file
        409 | 422 => Error::conflict(format!(
            "File changed concurrently. Status: {} - {}",
            status, error_text
        )),
        401 | 403 => Error::remote_write(format!(
            "Authentication failed: invalid token or insufficient permissions. Status: {}",
            status
        )),
        500..=599 => Error::remote_write(format!(
            "GitHub server error (transient): {} - {}",
            status, error_text
        )),
        _ => Error::remote_write(format!("Commit failed: {} - {}", status, error_text)),
    }
}
