//! store::github
//!
//! GitHub Git Data API implementation of [`VersionStore`].
//!
//! # Design
//!
//! Each trait method is exactly one REST round trip against
//! `repos/{owner}/{repo}/git/...`. Responses are decoded into the crate's
//! data model; only the fields the wire contract guarantees are required,
//! anything else falls back to what the request already established.
//!
//! # Authentication
//!
//! Bearer tokens and basic credentials are both supported. Credentials are
//! attached to every request when configured. Mutating calls without
//! credentials fail with `StoreError::AuthRequired` before any request is
//! sent; reads go out unauthenticated so public repositories still work.
//!
//! # Retries
//!
//! None. Rate limiting surfaces as `StoreError::RateLimited` and transport
//! failures as `StoreError::Transport`; the caller decides what to do.
//!
//! # Example
//!
//! ```ignore
//! use ghcommit::core::config::Credentials;
//! use ghcommit::store::github::GitHubStore;
//!
//! let store = GitHubStore::new(Credentials::Token(token), "octocat", "hello-world");
//! let head = store.get_ref(&BranchName::new("main")?).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{StoreError, VersionStore};
use crate::core::config::schema::{DEFAULT_API_BASE, DEFAULT_USER_AGENT};
use crate::core::config::{Config, ConfigError, Credentials};
use crate::core::types::{
    Blob, BlobEncoding, BranchName, Commit, EntryKind, FileMode, NewTreeEntry, Oid,
    RecursiveTree, Ref, Tree, TreeEntry,
};

/// GitHub REST API version pinned on every request.
const API_VERSION: &str = "2022-11-28";

/// GitHub implementation of the version store.
pub struct GitHubStore {
    /// HTTP client for making requests
    client: Client,
    /// Credentials attached to requests
    credentials: Credentials,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing credentials
impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("has_credentials", &self.credentials.is_present())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubStore {
    /// Create a store client for `owner/repo` on github.com.
    pub fn new(credentials: Credentials, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_api_base(credentials, owner, repo, DEFAULT_API_BASE)
    }

    /// Create a store client with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (e.g. `https://github.example.com/api/v3`)
    /// or for pointing at a test server.
    pub fn with_api_base(
        credentials: Credentials,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: default_client(),
            credentials,
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Create a store client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the credentials are incomplete
    /// or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            credentials: config.credentials()?,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            api_base: config.api_base.clone(),
        })
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build the URL for a `repos/{owner}/{repo}/git/...` endpoint.
    ///
    /// Segments are percent-encoded individually; a branch like
    /// `feature/x` is passed as two segments.
    fn git_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Validation(format!("invalid api base '{}': {}", self.api_base, e)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                StoreError::Validation(format!("api base '{}' cannot be a base URL", self.api_base))
            })?;
            path.pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str(), "git"])
                .extend(segments);
        }
        Ok(url)
    }

    fn ref_url(&self, singular: &str, branch: &BranchName) -> Result<Url, StoreError> {
        let path = branch.ref_path();
        self.git_url(std::iter::once(singular).chain(path.split('/')))
    }

    /// Start a request with the standard headers and credentials.
    fn request(&self, method: Method, url: Url, mutating: bool) -> Result<RequestBuilder, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let builder = self.client.request(method, url).headers(headers);
        match &self.credentials {
            Credentials::Token(token) => Ok(builder.bearer_auth(token)),
            Credentials::Basic { username, password } => {
                Ok(builder.basic_auth(username, Some(password)))
            }
            Credentials::Anonymous if mutating => Err(StoreError::AuthRequired),
            Credentials::Anonymous => Ok(builder),
        }
    }

    /// Send a request and decode a successful JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
        ref_update: Option<&BranchName>,
    ) -> Result<T, StoreError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(status = status.as_u16(), "{}", what);

        if status.is_success() {
            response.json().await.map_err(|e| StoreError::Api {
                status: status.as_u16(),
                message: format!("failed to parse {} response: {}", what, e),
            })
        } else {
            Err(self.error_response(response, status, what, ref_update).await)
        }
    }

    /// Turn a non-success response into a typed error.
    async fn error_response(
        &self,
        response: Response,
        status: StatusCode,
        what: &str,
        ref_update: Option<&BranchName>,
    ) -> StoreError {
        let quota_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false);

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        classify_status(status, message, quota_exhausted, what, ref_update)
    }
}

fn default_client() -> Client {
    Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .build()
        .unwrap_or_default()
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Transport(format!("request timed out: {}", err))
    } else {
        StoreError::Transport(err.to_string())
    }
}

/// Map an HTTP status to the error taxonomy.
///
/// `ref_update` names the branch when the failed call was a ref update, so
/// that non-fast-forward rejections classify as conflicts.
pub(crate) fn classify_status(
    status: StatusCode,
    message: String,
    quota_exhausted: bool,
    what: &str,
    ref_update: Option<&BranchName>,
) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED => {
            StoreError::AuthFailed(format!("invalid or expired credentials: {}", message))
        }
        StatusCode::FORBIDDEN if quota_exhausted => StoreError::RateLimited,
        StatusCode::FORBIDDEN => StoreError::AuthFailed(format!("permission denied: {}", message)),
        StatusCode::NOT_FOUND => StoreError::NotFound(format!("{}: {}", what, message)),
        StatusCode::CONFLICT => match ref_update {
            Some(branch) if mentions_ref_race(&message, true) => StoreError::Conflict {
                branch: branch.to_string(),
                detail: message,
            },
            _ => StoreError::Api {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::UNPROCESSABLE_ENTITY => match ref_update {
            Some(branch) if mentions_ref_race(&message, false) => {
                StoreError::Conflict {
                    branch: branch.to_string(),
                    detail: message,
                }
            }
            _ => StoreError::Validation(format!("{}: {}", what, message)),
        },
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited,
        _ => StoreError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Whether a ref update rejection means the branch moved underneath us.
///
/// A 409 may also name the reference as such ("Reference update failed");
/// a 422 naming the reference is a missing or malformed ref instead.
fn mentions_ref_race(message: &str, accept_reference: bool) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("fast forward")
        || message.contains("fast-forward")
        || (accept_reference && message.contains("reference"))
}

#[async_trait]
impl VersionStore for GitHubStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_ref(&self, branch: &BranchName) -> Result<Ref, StoreError> {
        let url = self.ref_url("ref", branch)?;
        let what = format!("GET ref {}", branch.ref_path());
        let body: GitRefResponse = self
            .send(self.request(Method::GET, url, false)?, &what, None)
            .await?;

        Ok(Ref {
            branch: branch.clone(),
            commit: body.object.sha,
        })
    }

    async fn get_commit(&self, sha: &Oid) -> Result<Commit, StoreError> {
        let url = self.git_url(["commits", sha.as_str()])?;
        let what = format!("GET commit {}", sha);
        let body: GitCommitResponse = self
            .send(self.request(Method::GET, url, false)?, &what, None)
            .await?;

        Ok(Commit {
            sha: body.sha.unwrap_or_else(|| sha.clone()),
            tree: body.tree.sha,
            parents: body.parents.into_iter().map(|p| p.sha).collect(),
            message: body.message.unwrap_or_default(),
        })
    }

    async fn create_tree(
        &self,
        base_tree: &Oid,
        entries: &[NewTreeEntry],
    ) -> Result<Tree, StoreError> {
        let url = self.git_url(["trees"])?;
        let body = CreateTreeBody {
            base_tree,
            tree: entries
                .iter()
                .map(|e| CreateTreeItem {
                    path: &e.path,
                    mode: e.mode.as_str(),
                    kind: "blob",
                    content: &e.content,
                })
                .collect(),
        };

        let what = format!("POST tree ({} entries)", entries.len());
        let request = self.request(Method::POST, url, true)?.json(&body);
        let response: GitTreeResponse = self.send(request, &what, None).await?;

        Ok(Tree {
            sha: response.sha,
            entries: convert_entries(response.tree)?,
        })
    }

    async fn create_commit(
        &self,
        tree: &Oid,
        parents: &[Oid],
        message: &str,
    ) -> Result<Commit, StoreError> {
        let url = self.git_url(["commits"])?;
        let body = CreateCommitBody {
            message,
            parents,
            tree,
        };

        let request = self.request(Method::POST, url, true)?.json(&body);
        let response: GitCommitResponse = self.send(request, "POST commit", None).await?;

        let sha = response.sha.ok_or_else(|| StoreError::Api {
            status: 201,
            message: "commit response is missing sha".into(),
        })?;
        let parents = if response.parents.is_empty() {
            parents.to_vec()
        } else {
            response.parents.into_iter().map(|p| p.sha).collect()
        };

        Ok(Commit {
            sha,
            tree: tree.clone(),
            parents,
            message: response.message.unwrap_or_else(|| message.to_string()),
        })
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        sha: &Oid,
        force: bool,
    ) -> Result<Ref, StoreError> {
        let url = self.ref_url("refs", branch)?;
        let body = UpdateRefBody { sha, force };

        let what = format!("PATCH ref {}", branch.ref_path());
        let request = self.request(Method::PATCH, url, true)?.json(&body);
        let response: GitRefResponse = self.send(request, &what, Some(branch)).await?;

        Ok(Ref {
            branch: branch.clone(),
            commit: response.object.sha,
        })
    }

    async fn get_tree_recursive(&self, sha: &Oid) -> Result<RecursiveTree, StoreError> {
        let mut url = self.git_url(["trees", sha.as_str()])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let what = format!("GET tree {} (recursive)", sha);
        let response: GitTreeResponse = self
            .send(self.request(Method::GET, url, false)?, &what, None)
            .await?;

        Ok(RecursiveTree {
            sha: response.sha,
            entries: convert_entries(response.tree)?,
            truncated: response.truncated,
        })
    }

    async fn get_blob(&self, sha: &Oid) -> Result<Blob, StoreError> {
        let url = self.git_url(["blobs", sha.as_str()])?;
        let what = format!("GET blob {}", sha);
        let response: GitBlobResponse = self
            .send(self.request(Method::GET, url, false)?, &what, None)
            .await?;

        Ok(Blob {
            sha: response.sha.unwrap_or_else(|| sha.clone()),
            encoding: response.encoding,
            content: response.content,
        })
    }
}

fn convert_entries(items: Vec<GitTreeItem>) -> Result<Vec<TreeEntry>, StoreError> {
    items
        .into_iter()
        .map(|item| {
            let mode = match item.mode.as_deref() {
                Some(mode) => FileMode::parse(mode).ok_or_else(|| {
                    StoreError::Corrupt(format!("unknown mode '{}' for '{}'", mode, item.path))
                })?,
                None => match item.kind {
                    EntryKind::Blob => FileMode::Normal,
                    EntryKind::Tree => FileMode::Directory,
                    EntryKind::Commit => FileMode::Submodule,
                },
            };
            Ok(TreeEntry {
                path: item.path,
                mode,
                kind: item.kind,
                sha: item.sha,
            })
        })
        .collect()
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a Oid,
    tree: Vec<CreateTreeItem<'a>>,
}

/// One entry of a tree creation request.
#[derive(Serialize)]
struct CreateTreeItem<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    parents: &'a [Oid],
    tree: &'a Oid,
}

/// Request body for updating a ref.
#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a Oid,
    force: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// A `{ "sha": ... }` object pointer.
#[derive(Deserialize)]
struct GitObjectPointer {
    sha: Oid,
}

/// GitHub ref response format.
#[derive(Deserialize)]
struct GitRefResponse {
    object: GitObjectPointer,
}

/// GitHub commit response format.
#[derive(Deserialize)]
struct GitCommitResponse {
    sha: Option<Oid>,
    tree: GitObjectPointer,
    #[serde(default)]
    parents: Vec<GitObjectPointer>,
    message: Option<String>,
}

/// GitHub tree response format (creation and listing).
#[derive(Deserialize)]
struct GitTreeResponse {
    sha: Oid,
    #[serde(default)]
    tree: Vec<GitTreeItem>,
    #[serde(default)]
    truncated: bool,
}

/// One entry of a tree listing.
#[derive(Deserialize)]
struct GitTreeItem {
    path: String,
    mode: Option<String>,
    #[serde(rename = "type")]
    kind: EntryKind,
    sha: Oid,
}

/// GitHub blob response format.
#[derive(Deserialize)]
struct GitBlobResponse {
    sha: Option<Oid>,
    encoding: BlobEncoding,
    content: String,
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use ghcommit::store::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
