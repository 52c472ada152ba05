use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{ContentStore, ContentStoreError, DeleteContent, PutContent};
use crate::config::GitHubConfig;

const USER_AGENT: &str = concat!("content-relay/", env!("CARGO_PKG_VERSION"));

/// GitHub repository contents API.
pub struct GitHubStore {
    branch: String,
    client: Client,
    contents_base: Url,
}

#[derive(Deserialize)]
struct ContentMetadata {
    sha: String,
}

#[derive(Serialize)]
struct PutBody<'a> {
    branch: &'a str,
    content: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    branch: &'a str,
    message: &'a str,
    sha: &'a str,
}

impl GitHubStore {
    pub fn new(config: &GitHubConfig) -> Result<Self, ContentStoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let base = format!(
            "{}/repos/{}/{}/contents",
            config.api_url.trim_end_matches('/'),
            config.owner,
            config.repo
        );
        let contents_base = Url::parse(&base)
            .map_err(|e| ContentStoreError::Decode(format!("invalid API URL '{base}': {e}")))?;

        Ok(Self {
            branch: config.branch.clone(),
            client,
            contents_base,
        })
    }

    fn contents_url(&self, path: &str) -> Result<Url, ContentStoreError> {
        let mut url = self.contents_base.clone();
        url.path_segments_mut()
            .map_err(|_| ContentStoreError::Decode("API URL cannot be a base".to_string()))?
            .extend(path.split('/'));
        url.query_pairs_mut().append_pair("ref", &self.branch);
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        token: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }
}

/// Turn a non-2xx response into an error, keeping the body for the logs.
async fn check(resp: Response, path: &str) -> Result<Response, ContentStoreError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ContentStoreError::NotFound(path.to_string()));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ContentStoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

#[async_trait]
impl ContentStore for GitHubStore {
    async fn revision(&self, path: &str, token: &str) -> Result<String, ContentStoreError> {
        let url = self.contents_url(path)?;
        let resp = self
            .request(reqwest::Method::GET, url, token)
            .send()
            .await?;

        let metadata: ContentMetadata = check(resp, path)
            .await?
            .json()
            .await
            .map_err(|e| ContentStoreError::Decode(e.to_string()))?;

        Ok(metadata.sha)
    }

    async fn put(
        &self,
        path: &str,
        token: &str,
        content: PutContent,
    ) -> Result<(), ContentStoreError> {
        let url = self.contents_url(path)?;
        let body = PutBody {
            branch: &self.branch,
            content: &content.content,
            message: &content.message,
            sha: content.sha.as_deref(),
        };

        let resp = self
            .request(reqwest::Method::PUT, url, token)
            .json(&body)
            .send()
            .await?;

        check(resp, path).await?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &str,
        token: &str,
        content: DeleteContent,
    ) -> Result<(), ContentStoreError> {
        let url = self.contents_url(path)?;
        let body = DeleteBody {
            branch: &self.branch,
            message: &content.message,
            sha: &content.sha,
        };

        let resp = self
            .request(reqwest::Method::DELETE, url, token)
            .json(&body)
            .send()
            .await?;

        check(resp, path).await?;
        Ok(())
    }
}
