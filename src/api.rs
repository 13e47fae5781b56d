// API client module: a small blocking HTTP client for GitHub's Git Data
// endpoints. The pipeline only sees the `GitData` trait, so tests can swap
// in an in-memory remote.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const API_VERSION: &str = "2022-11-28";
/// Git mode for a regular, non-executable file.
pub const FILE_MODE: &str = "100644";

/// The remote operations the sync pipeline needs, one per step.
pub trait GitData {
    /// Commit the branch currently points at.
    fn branch_head(&self, branch: &str) -> Result<String>;
    /// Root tree of a commit.
    fn commit_tree(&self, commit: &str) -> Result<String>;
    fn create_blob(&self, content: &[u8]) -> Result<String>;
    /// New tree that overlays `entries` on `base_tree`.
    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;
    fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String>;
    /// Move the branch to `commit`. With `force == false` this must fail with
    /// `SyncError::Conflict` unless the move is a fast forward.
    fn update_branch(&self, branch: &str, commit: &str, force: bool) -> Result<()>;
}

/// One entry of a tree write request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    pub fn blob(path: &str, sha: &str) -> Self {
        TreeEntry {
            path: path.to_string(),
            mode: FILE_MODE.to_string(),
            kind: "blob".to_string(),
            sha: sha.to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct NewBlob {
    pub content: String,
    pub encoding: &'static str,
}

impl NewBlob {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        NewBlob {
            content: STANDARD.encode(bytes),
            encoding: "base64",
        }
    }
}

#[derive(Serialize, Debug)]
pub struct NewTree<'a> {
    pub base_tree: &'a str,
    pub tree: &'a [TreeEntry],
}

#[derive(Serialize, Debug)]
pub struct NewCommit<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: &'a [String],
}

#[derive(Serialize, Debug)]
pub struct RefUpdate<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Deserialize, Debug)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize, Debug)]
struct RefObject {
    object: ShaOnly,
}

#[derive(Deserialize, Debug)]
struct CommitObject {
    tree: ShaOnly,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
}

/// Blocking client bound to one repository.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    repo_url: String,
}

impl ApiClient {
    /// Build a client whose every request carries the credential, the API
    /// version and a user agent.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers(&config.token)?)
            .build()?;
        Ok(ApiClient {
            client,
            repo_url: repo_url(config),
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}", self.repo_url, tail)
    }

    /// Send a request and decode the JSON answer, mapping failures to the
    /// error taxonomy. `what` is used in not-found messages.
    fn call<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let res = check(req.send()?, what)?;
        let status = res.status().as_u16();
        let txt = res.text()?;
        serde_json::from_str(&txt).map_err(|e| SyncError::Api {
            status,
            detail: format!("unexpected response body ({}): {}", e, txt.trim()),
        })
    }
}

impl GitData for ApiClient {
    fn branch_head(&self, branch: &str) -> Result<String> {
        let url = self.url(&format!("git/ref/heads/{}", ref_path(branch)));
        debug!(%url, "reading branch ref");
        let r: RefObject = self.call(self.client.get(&url), &format!("branch `{}`", branch))?;
        Ok(r.object.sha)
    }

    fn commit_tree(&self, commit: &str) -> Result<String> {
        let url = self.url(&format!("git/commits/{}", urlencoding::encode(commit)));
        debug!(%url, "reading commit");
        let c: CommitObject = self.call(self.client.get(&url), &format!("commit {}", commit))?;
        Ok(c.tree.sha)
    }

    fn create_blob(&self, content: &[u8]) -> Result<String> {
        let url = self.url("git/blobs");
        debug!(%url, bytes = content.len(), "creating blob");
        let body = NewBlob::from_bytes(content);
        let b: ShaOnly = self.call(self.client.post(&url).json(&body), "blob")?;
        Ok(b.sha)
    }

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let url = self.url("git/trees");
        debug!(%url, base_tree, entries = entries.len(), "creating tree");
        let body = NewTree { base_tree, tree: entries };
        let t: ShaOnly = self.call(self.client.post(&url).json(&body), &format!("tree {}", base_tree))?;
        Ok(t.sha)
    }

    fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let url = self.url("git/commits");
        debug!(%url, tree, "creating commit");
        let body = NewCommit { message, tree, parents };
        let c: ShaOnly = self.call(self.client.post(&url).json(&body), "commit")?;
        Ok(c.sha)
    }

    fn update_branch(&self, branch: &str, commit: &str, force: bool) -> Result<()> {
        let url = self.url(&format!("git/refs/heads/{}", ref_path(branch)));
        debug!(%url, commit, force, "updating branch ref");
        let body = RefUpdate { sha: commit, force };
        let res = self.client.patch(&url).json(&body).send()?;
        match check(res, &format!("branch `{}`", branch)) {
            Ok(_) => Ok(()),
            Err(e) => Err(as_conflict(e, branch)),
        }
    }
}

/// Headers shared by every request.
fn default_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| SyncError::Config("token contains characters not allowed in a header".into()))?;
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("gitdata-sync/", env!("CARGO_PKG_VERSION"))),
    );
    Ok(headers)
}

/// Branch name as a URL path. Each `/`-separated segment is percent-encoded
/// so `#`, `%` and `?` stay part of the name.
fn ref_path(branch: &str) -> String {
    branch
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn repo_url(config: &SyncConfig) -> String {
    format!("{}/repos/{}/{}", config.api_url, config.owner, config.repo)
}

/// Pass successful responses through; turn anything else into a
/// `SyncError` carrying the server's message.
fn check(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let txt = res.text().unwrap_or_else(|_| "".into());
    Err(SyncError::from_status(status.as_u16(), what, error_detail(&txt)))
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": ...}`;
/// fall back to the raw text for anything else.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.message,
        Err(_) => body.trim().to_string(),
    }
}

/// A refused non-force ref update comes back as 409, or as 422 with
/// "not a fast forward". Both mean the branch moved under us.
fn as_conflict(err: SyncError, branch: &str) -> SyncError {
    match err {
        SyncError::Api { status: 409, detail } => SyncError::Conflict {
            branch: branch.to_string(),
            detail,
        },
        SyncError::Api { status: 422, detail } if detail.to_lowercase().contains("fast forward") => {
            SyncError::Conflict {
                branch: branch.to_string(),
                detail,
            }
        }
        other => other,
    }
}
