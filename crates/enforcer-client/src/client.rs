//! reqwest-backed GitLab REST client.

use crate::api::{GitLabApi, Settings};
use crate::branch::{BranchAccessSetting, ProtectedBranch};
use crate::error::{ClientError, Result};
use crate::models::{Group, Project, PushRules};
use crate::pagination::{next_link, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the personal access token.
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Connection settings for [`GitLabClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Instance URL, e.g. `https://gitlab.example.com`.
    pub server_url: String,
    /// Personal access token.
    pub token: String,
    /// Page size for list calls.
    pub per_page: u32,
    /// Timeout applied to every request.
    pub timeout: Duration,
    /// Optional HTTP proxy URL.
    pub proxy: Option<String>,
}

impl ClientConfig {
    /// Settings with default page size, a 30 second timeout and no proxy.
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            per_page: DEFAULT_PER_PAGE,
            timeout: Duration::from_secs(30),
            proxy: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("per_page", &self.per_page)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Client for the GitLab v4 REST API.
pub struct GitLabClient {
    client: Client,
    base_url: Url,
    token: String,
    per_page: u32,
}

impl GitLabClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.server_url)?;
        base_url
            .path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(config.server_url.clone()))?
            .pop_if_empty()
            .extend(["api", "v4"]);

        let mut builder = Client::builder()
            .user_agent("gitlab-enforcer")
            .timeout(config.timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
            per_page: config.per_page.clamp(1, MAX_PER_PAGE),
        })
    }

    /// Build an endpoint URL. Each segment is encoded as a single path
    /// segment, so `release/1.0` becomes `release%2F1.0`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// Send a request with the token attached and map non-2xx answers.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        form: Option<&[(&str, String)]>,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(method = %method, url = %url, "GitLab request");
        let mut request = self.client.request(method, url);
        if let Some(form) = form {
            request = request.form(form);
        }
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<()> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GitLab delete");
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// Fetch every page of a list resource.
    ///
    /// Follows the `next` relation of the `Link` header until it is absent.
    /// Any failure aborts the whole fetch; pages read so far are dropped.
    async fn get_all<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let mut first = self.endpoint(segments)?;
        first
            .query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string());

        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            if !seen.insert(url.to_string()) {
                return Err(ClientError::Pagination {
                    url: url.to_string(),
                    source: Box::new(ClientError::Decode("pagination link cycle".into())),
                });
            }

            let page = self.get_page::<T>(&url).await;
            match page {
                Ok((batch, link)) => {
                    items.extend(batch);
                    next = link;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Paginated fetch failed");
                    return Err(ClientError::Pagination {
                        url: url.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(items)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<(Vec<T>, Option<Url>)> {
        debug!(url = %url, "Fetching page");
        let response = self.send(self.client.get(url.clone())).await?;
        let next = match next_link(response.headers()) {
            Some(link) => Some(self.follow(&link)?),
            None => None,
        };
        let batch = Self::decode(response).await?;
        Ok((batch, next))
    }

    /// Resolve a `next` link, refusing to send the token to another origin.
    fn follow(&self, link: &str) -> Result<Url> {
        let url = self.base_url.join(link)?;
        if url.origin() != self.base_url.origin() {
            return Err(ClientError::InvalidUrl(format!(
                "pagination link leaves the server: {link}"
            )));
        }
        Ok(url)
    }
}

fn params(settings: &Settings) -> Vec<(&str, String)> {
    settings
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect()
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.get_all(&["groups"]).await
    }

    async fn get_group(&self, group_id: u64) -> Result<Group> {
        self.call(Method::GET, &["groups", &group_id.to_string()], None)
            .await
    }

    async fn update_group(&self, group_id: u64, settings: &Settings) -> Result<Group> {
        let form = params(settings);
        self.call(
            Method::PUT,
            &["groups", &group_id.to_string()],
            Some(form.as_slice()),
        )
        .await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_all(&["projects"]).await
    }

    async fn get_project(&self, project_id: u64) -> Result<Project> {
        self.call(Method::GET, &["projects", &project_id.to_string()], None)
            .await
    }

    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>> {
        self.get_all(&["projects", &project_id.to_string(), "protected_branches"])
            .await
    }

    async fn protect_branch(
        &self,
        project_id: u64,
        branch: &str,
        settings: &[BranchAccessSetting],
    ) -> Result<ProtectedBranch> {
        let mut form = vec![("name", branch.to_string())];
        form.extend(settings.iter().map(BranchAccessSetting::to_param));
        self.call(
            Method::POST,
            &["projects", &project_id.to_string(), "protected_branches"],
            Some(form.as_slice()),
        )
        .await
    }

    async fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<()> {
        self.delete(&[
            "projects",
            &project_id.to_string(),
            "protected_branches",
            branch,
        ])
        .await
    }

    async fn get_push_rules(&self, project_id: u64) -> Result<Option<PushRules>> {
        let result = self
            .call::<Option<PushRules>>(
                Method::GET,
                &["projects", &project_id.to_string(), "push_rule"],
                None,
            )
            .await;
        match result {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }

    async fn create_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules> {
        let form = params(settings);
        self.call(
            Method::POST,
            &["projects", &project_id.to_string(), "push_rule"],
            Some(form.as_slice()),
        )
        .await
    }

    async fn update_push_rules(&self, project_id: u64, settings: &Settings) -> Result<PushRules> {
        let form = params(settings);
        self.call(
            Method::PUT,
            &["projects", &project_id.to_string(), "push_rule"],
            Some(form.as_slice()),
        )
        .await
    }

    async fn unshare_project_with_group(&self, project_id: u64, group_id: u64) -> Result<()> {
        self.delete(&[
            "projects",
            &project_id.to_string(),
            "share",
            &group_id.to_string(),
        ])
        .await
    }
}
