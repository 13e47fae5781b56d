// Configuration: credential and repository coordinates, resolved once at
// startup and then passed around by reference. Nothing here is global.

use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
const TOKEN_FILE: &str = ".github_token";

/// Immutable settings for one run.
#[derive(Clone)]
pub struct SyncConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_url: String,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repo: Option<String>,
    pub branch: Option<String>,
}

impl SyncConfig {
    /// Build the configuration from the process environment, falling back to
    /// `~/.github_token` for the credential.
    pub fn from_env(overrides: &Overrides) -> Result<Self> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok(), token_file())
    }

    /// Same as `from_env` but with an injectable variable lookup and token
    /// file location.
    pub fn from_lookup<F>(overrides: &Overrides, lookup: F, token_file: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = var("GITHUB_TOKEN")
            .or_else(|| var("GH_TOKEN"))
            .or_else(|| token_file.and_then(|p| read_token_file(&p)))
            .ok_or_else(|| {
                SyncError::Config(
                    "no GitHub token found; set GITHUB_TOKEN or write one to ~/.github_token".into(),
                )
            })?;

        let (owner, repo) = match overrides.repo.clone().or_else(|| var("GITHUB_REPOSITORY")) {
            Some(slug) => split_slug(&slug)?,
            None => match (var("GITHUB_OWNER"), var("GITHUB_REPO")) {
                (Some(owner), Some(repo)) => (owner, repo),
                _ => {
                    return Err(SyncError::Config(
                        "no repository given; use --repo owner/name or set GITHUB_REPOSITORY".into(),
                    ))
                }
            },
        };

        let branch = overrides
            .branch
            .clone()
            .or_else(|| var("GITHUB_BRANCH"))
            .unwrap_or_else(|| DEFAULT_BRANCH.into());

        let api_url = var("GITHUB_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();

        Ok(SyncConfig {
            token,
            owner,
            repo,
            branch,
            api_url,
        })
    }
}

/// Split `owner/name` into its two halves.
fn split_slug(slug: &str) -> Result<(String, String)> {
    match slug.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(SyncError::Config(format!(
            "repository `{}` is not in owner/name form",
            slug
        ))),
    }
}

fn token_file() -> Option<PathBuf> {
    dirs::home_dir().map(|dir| dir.join(TOKEN_FILE))
}

/// Load the token from a file; first non-empty line wins.
fn read_token_file(path: &Path) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    data.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
