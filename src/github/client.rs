//! GitHub REST implementation of [`RemoteApi`].
//!
//! Each call is one blocking HTTP request (pages of reference listings are
//! followed). Failure responses are mapped onto the crate error taxonomy by
//! [`classify_failure`]; response bodies are inspected for throttling hints
//! but never copied into an error.

use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ContentEntry, ContentKind, FileContent, Quota, RawRef, RemoteApi, RepositoryInfo};
use crate::config::Settings;
use crate::defaults::{ABUSE_LIMIT_MESSAGE, RATE_LIMIT_MESSAGE};
use crate::error::{Error, Result};

const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking GitHub REST client
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
    identity: String,
}

impl GitHubClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("dockstore-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport {
                detail: e.to_string(),
            })?;
        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            identity: settings.acting_identity().to_string(),
        })
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = format!("{}/{}", self.api_url, path.trim_start_matches('/'));
        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|e| {
            log::info!("{}: request for {} failed", self.identity, path);
            Error::Transport {
                detail: e.to_string(),
            }
        })?;
        self.check_response(response, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.get(path, query)?;
        response.json::<T>().map_err(|e| Error::Decode {
            message: format!("{}: {}", path, e),
        })
    }

    fn check_response(&self, response: Response, resource: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let retry_after = response.headers().contains_key(RETRY_AFTER);
        let body = response.text().unwrap_or_default();
        let error = classify_failure(status.as_u16(), remaining, retry_after, &body, resource);
        match error {
            Error::RateLimitExceeded => log::error!("{}: {}", self.identity, RATE_LIMIT_MESSAGE),
            Error::AbuseLimitReached => log::error!("{}: {}", self.identity, ABUSE_LIMIT_MESSAGE),
            _ => log::debug!("{}: {} answered {}", self.identity, resource, status),
        }
        Err(error)
    }

    fn repo_path(repository: &str, rest: &str) -> String {
        format!("repos/{}/{}", repository, rest.trim_start_matches('/'))
    }
}

/// Maps a failed response onto an [`Error`].
///
/// The body is only searched for throttling hints.
pub fn classify_failure(
    status: u16,
    remaining: Option<u64>,
    retry_after: bool,
    body: &str,
    resource: &str,
) -> Error {
    match status {
        404 => Error::NotFound {
            resource: resource.to_string(),
        },
        409 => Error::EmptyRepository {
            repository: resource.to_string(),
        },
        403 | 429 if remaining == Some(0) => Error::RateLimitExceeded,
        403 | 429 => {
            let lowered = body.to_ascii_lowercase();
            if status == 429
                || retry_after
                || lowered.contains("secondary rate limit")
                || lowered.contains("abuse")
            {
                Error::AbuseLimitReached
            } else {
                Error::UnexpectedStatus {
                    status,
                    resource: resource.to_string(),
                }
            }
        }
        s if s >= 500 => Error::Transport {
            detail: format!("{} answered {}", resource, s),
        },
        s => Error::UnexpectedStatus {
            status: s,
            resource: resource.to_string(),
        },
    }
}

/// Decodes base64 content as served by the contents and blob endpoints.
pub fn decode_base64_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Decode {
            message: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Deserialize)]
struct ApiRepository {
    full_name: String,
    default_branch: String,
    #[serde(default)]
    private: bool,
}

#[derive(Deserialize)]
struct ApiObject {
    #[serde(rename = "type", default)]
    object_type: String,
    sha: String,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
    object: ApiObject,
}

impl From<ApiRef> for RawRef {
    fn from(api: ApiRef) -> Self {
        RawRef {
            name: api.name,
            object_type: api.object.object_type,
            sha: api.object.sha,
        }
    }
}

#[derive(Deserialize)]
struct ApiTag {
    object: ApiObject,
}

#[derive(Deserialize)]
struct ApiBranch {
    commit: ApiShaOnly,
}

#[derive(Deserialize)]
struct ApiShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct ApiCommit {
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    committer: ApiSignature,
}

#[derive(Deserialize)]
struct ApiSignature {
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(rename = "type")]
    kind: ContentKind,
    name: String,
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    content: Option<String>,
    encoding: Option<String>,
    target: Option<String>,
    git_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiBlob {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct ApiRateLimit {
    resources: ApiRateResources,
}

#[derive(Deserialize)]
struct ApiRateResources {
    core: Quota,
}

impl RemoteApi for GitHubClient {
    fn repository(&self, repository: &str) -> Result<RepositoryInfo> {
        let api: ApiRepository = self.get_json(&format!("repos/{}", repository), &[])?;
        Ok(RepositoryInfo {
            full_name: api.full_name,
            default_branch: api.default_branch,
            private: api.private,
        })
    }

    fn list_refs(&self, repository: &str, namespace: &str) -> Result<Vec<RawRef>> {
        let namespace = namespace.trim_start_matches("refs/").trim_end_matches('/');
        let path = Self::repo_path(repository, &format!("git/refs/{}", namespace));
        let per_page = PAGE_SIZE.to_string();
        let mut refs = Vec::new();
        let mut page = 1usize;
        loop {
            let page_str = page.to_string();
            let batch: Vec<ApiRef> =
                self.get_json(&path, &[("per_page", per_page.as_str()), ("page", page_str.as_str())])?;
            let count = batch.len();
            refs.extend(batch.into_iter().map(RawRef::from));
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(refs)
    }

    fn has_tags(&self, repository: &str) -> Result<bool> {
        let tags: Vec<serde_json::Value> =
            self.get_json(&Self::repo_path(repository, "tags"), &[("per_page", "1")])?;
        Ok(!tags.is_empty())
    }

    fn get_ref(&self, repository: &str, qualified: &str) -> Result<RawRef> {
        let api: ApiRef =
            self.get_json(&Self::repo_path(repository, &format!("git/ref/{}", qualified)), &[])?;
        Ok(api.into())
    }

    fn tag_target(&self, repository: &str, tag_sha: &str) -> Result<String> {
        let api: ApiTag =
            self.get_json(&Self::repo_path(repository, &format!("git/tags/{}", tag_sha)), &[])?;
        Ok(api.object.sha)
    }

    fn branch_head(&self, repository: &str, branch: &str) -> Result<String> {
        let api: ApiBranch =
            self.get_json(&Self::repo_path(repository, &format!("branches/{}", branch)), &[])?;
        Ok(api.commit.sha)
    }

    fn commit_date(&self, repository: &str, sha: &str) -> Result<DateTime<Utc>> {
        let api: ApiCommit =
            self.get_json(&Self::repo_path(repository, &format!("commits/{}", sha)), &[])?;
        Ok(api.commit.committer.date)
    }

    fn directory_listing(
        &self,
        repository: &str,
        dir: &str,
        reference: &str,
    ) -> Result<Vec<ContentEntry>> {
        let path = Self::repo_path(repository, &format!("contents/{}", dir.trim_matches('/')));
        let items: Vec<ApiContent> = self.get_json(&path, &[("ref", reference)])?;
        Ok(items
            .into_iter()
            .map(|item| ContentEntry {
                name: item.name,
                path: item.path,
                kind: item.kind,
                sha: item.sha,
                size: item.size,
            })
            .collect())
    }

    fn file_content(&self, repository: &str, path: &str, reference: &str) -> Result<FileContent> {
        let api_path =
            Self::repo_path(repository, &format!("contents/{}", path.trim_start_matches('/')));
        let item: ApiContent = self.get_json(&api_path, &[("ref", reference)])?;
        let encoding = item.encoding.unwrap_or_default();
        let content = match (item.content.as_deref(), encoding.as_str()) {
            (Some(encoded), "base64") => decode_base64_content(encoded)?,
            (Some(raw), _) => raw.to_string(),
            (None, _) => String::new(),
        };
        Ok(FileContent {
            kind: item.kind,
            path: item.path,
            sha: item.sha,
            size: item.size,
            content,
            encoding,
            target: item.target,
            git_url: item.git_url,
        })
    }

    fn blob(&self, repository: &str, sha: &str) -> Result<String> {
        let api: ApiBlob =
            self.get_json(&Self::repo_path(repository, &format!("git/blobs/{}", sha)), &[])?;
        match api.encoding.as_str() {
            "base64" => decode_base64_content(&api.content),
            _ => Ok(api.content),
        }
    }

    fn rate_limit(&self) -> Result<Quota> {
        let api: ApiRateLimit = self.get_json("rate_limit", &[])?;
        Ok(api.resources.core)
    }
}
