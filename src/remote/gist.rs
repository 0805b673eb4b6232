//! GitHub gist remote.
//!
//! Talks to the gists REST API with `reqwest` on a private tokio runtime;
//! the rest of the crate stays synchronous.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{RemoteSnapshot, RemoteStore};
use crate::error::{Error, Result};
use crate::sync::{META_KEY, RemoteMeta};

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const TIMEOUT: Duration = Duration::from_secs(30);
const DISCOVER_PAGES: usize = 5;
const DISCOVER_PER_PAGE: usize = 100;

/// Description given to gists created by `confsync init`.
pub const GIST_DESCRIPTION: &str = "confsync configuration store";

#[derive(Debug, Deserialize)]
struct Gist {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

/// Ids of listed gists that carry a meta blob, in listing order.
fn tagged_gists(gists: &[Gist]) -> Vec<&str> {
    gists
        .iter()
        .filter(|g| g.files.contains_key(META_KEY))
        .map(|g| g.id.as_str())
        .collect()
}

/// True when a fully fetched gist has a meta blob with an identity.
fn has_identity(gist: &Gist) -> bool {
    gist.files
        .get(META_KEY)
        .and_then(|f| f.content.as_deref())
        .and_then(|raw| RemoteMeta::parse(raw).ok())
        .is_some_and(|meta| meta.identity.is_some())
}

/// Authenticated gists API client.
pub struct GistClient {
    runtime: Runtime,
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl GistClient {
    /// Build a client for the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or HTTP client cannot be created.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_base(token, API_BASE)
    }

    /// Build a client for a different API root (GitHub Enterprise).
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or HTTP client cannot be created.
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("confsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Remote(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            runtime,
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Remote(format!("{what} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::Remote(format!("{what} failed: not found")));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Remote(format!("{what} failed: token rejected")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!("{what} failed: {status} - {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Remote(format!("{what}: invalid response: {e}")))
    }

    async fn raw(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("failed to fetch file content: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "failed to fetch file content: {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::Remote(format!("failed to read file content: {e}")))
    }

    async fn get(&self, id: &str) -> Result<Gist> {
        Self::send(self.request(Method::GET, &format!("/gists/{id}")), &format!("get gist {id}")).await
    }

    /// Create a private gist holding `files`. Returns its id and page URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the API rejects the request.
    pub fn create(&self, files: &BTreeMap<String, String>) -> Result<(String, Option<String>)> {
        let files: serde_json::Map<String, Value> = files
            .iter()
            .map(|(name, content)| (name.clone(), json!({ "content": content })))
            .collect();
        let body = json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": files,
        });
        let gist: Gist = self.runtime.block_on(Self::send(
            self.request(Method::POST, "/gists").json(&body),
            "create gist",
        ))?;
        Ok((gist.id, gist.html_url))
    }

    /// Find an existing confsync gist owned by the token's user.
    ///
    /// Walks up to five listing pages. A gist qualifies only when it holds
    /// a meta blob that parses and carries an identity tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if a listing page cannot be read.
    pub fn discover(&self) -> Result<Option<String>> {
        self.runtime.block_on(async {
            for page in 1..=DISCOVER_PAGES {
                let path = format!("/gists?per_page={DISCOVER_PER_PAGE}&page={page}");
                let gists: Vec<Gist> =
                    Self::send(self.request(Method::GET, &path), "list gists").await?;
                if gists.is_empty() {
                    break;
                }
                for id in tagged_gists(&gists) {
                    match self.get(id).await {
                        Ok(full) if has_identity(&full) => return Ok(Some(full.id)),
                        Ok(_) => debug!(gist = id, "Skipping gist without an identity tag"),
                        Err(e) => debug!(gist = id, error = %e, "Skipping unreadable gist"),
                    }
                }
            }
            Ok::<_, Error>(None)
        })
    }

    /// Check that a gist exists and is readable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if it does not.
    pub fn verify(&self, id: &str) -> Result<()> {
        self.runtime.block_on(self.get(id)).map(|_| ())
    }
}

/// One gist used as the remote.
pub struct GistRemote {
    client: GistClient,
    id: String,
}

impl GistRemote {
    #[must_use]
    pub fn new(client: GistClient, id: &str) -> Self {
        Self {
            client,
            id: id.to_string(),
        }
    }

    async fn fetch_async(&self) -> Result<RemoteSnapshot> {
        let gist = self.client.get(&self.id).await?;
        let mut blobs = BTreeMap::new();
        for (name, file) in gist.files {
            let content = match (file.content, file.raw_url) {
                (Some(content), _) if !file.truncated => content,
                (_, Some(url)) => {
                    debug!(file = %name, "Fetching truncated gist file");
                    self.client.raw(&url).await?
                }
                (content, None) => content.unwrap_or_default(),
            };
            blobs.insert(name, content);
        }
        Ok(RemoteSnapshot::new(blobs))
    }
}

impl RemoteStore for GistRemote {
    fn fetch(&self) -> Result<RemoteSnapshot> {
        self.client.runtime.block_on(self.fetch_async())
    }

    fn update(&self, blobs: &BTreeMap<String, String>) -> Result<()> {
        if blobs.is_empty() {
            return Ok(());
        }
        // A null file entry deletes it from the gist.
        let files: serde_json::Map<String, Value> = blobs
            .iter()
            .map(|(name, content)| {
                let entry = if content.is_empty() {
                    Value::Null
                } else {
                    json!({ "content": content })
                };
                (name.clone(), entry)
            })
            .collect();
        let request = self
            .client
            .request(Method::PATCH, &format!("/gists/{}", self.id))
            .json(&json!({ "files": files }));
        let _: Value = self
            .client
            .runtime
            .block_on(GistClient::send(request, &format!("update gist {}", self.id)))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("gist {}", self.id)
    }
}
