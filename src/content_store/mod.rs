mod github;

pub use github::GitHubStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("Content not found: {0}")]
    NotFound(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// A new version of a file, committed to the configured branch.
#[derive(Debug, Clone)]
pub struct PutContent {
    pub message: String,
    /// Base64-encoded file bytes
    pub content: String,
    /// Current revision when replacing an existing file
    pub sha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteContent {
    pub message: String,
    pub sha: String,
}

/// Key-addressed content storage backed by a repository.
/// Every call carries the token selected for the request.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Current revision marker of `path`. Fails with `NotFound` when absent.
    async fn revision(&self, path: &str, token: &str) -> Result<String, ContentStoreError>;
    /// Create `path`, or update it when `content.sha` names its current revision.
    async fn put(&self, path: &str, token: &str, content: PutContent)
        -> Result<(), ContentStoreError>;
    async fn delete(
        &self,
        path: &str,
        token: &str,
        content: DeleteContent,
    ) -> Result<(), ContentStoreError>;
}
