use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

/// Number of `GITHUB_TOKEN*` variables read into the credential pool.
pub const MAX_TOKENS: usize = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub github: GitHubConfig,
    pub publish: PublishConfig,
    pub server: ServerConfig,
    /// Retry policy for content writes
    pub retry: RetryPolicy,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Directory holding per-request staging slots
    pub staging_dir: String,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub branch: String,
    pub owner: String,
    pub repo: String,
    /// Timeout applied to every request against the contents API
    pub timeout: Duration,
    pub tokens: Vec<String>,
}

/// Where uploads land in the repository and how their public links are built.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Repository folder used when no `folder` is given
    pub base_folder: String,
    pub base_url: String,
    /// Repository folder that caller-supplied folders are nested under
    pub custom_folder: String,
    pub custom_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            branch: "main".to_string(),
            owner: String::new(),
            repo: String::new(),
            timeout: Duration::from_secs(15),
            tokens: Vec::new(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            base_folder: "cdn-1".to_string(),
            base_url: "https://cdn.picgenv.us.kg/cdn1".to_string(),
            custom_folder: "aura".to_string(),
            custom_url: "https://cdn.prxy.us.kg/aura".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:30009".to_string(),
            staging_dir: "./uploads".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let server_defaults = ServerConfig::default();
        let github_defaults = GitHubConfig::default();
        let publish_defaults = PublishConfig::default();
        let retry_defaults = RetryPolicy::default();

        let bind_address = env_or("BIND_ADDRESS", server_defaults.bind_address);
        let staging_dir = env_or("STAGING_DIR", server_defaults.staging_dir);

        let max_upload_size = env_parse("MAX_UPLOAD_SIZE").unwrap_or(50 * 1024 * 1024); // 50MB

        let tokens = token_pool(|name| std::env::var(name).ok());

        let timeout = env_parse("REMOTE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(github_defaults.timeout);

        let max_attempts = env_parse("UPLOAD_MAX_ATTEMPTS").unwrap_or(retry_defaults.max_attempts);
        let delay = env_parse("UPLOAD_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(retry_defaults.delay);

        let config = Config {
            server: ServerConfig {
                bind_address,
                staging_dir,
            },
            github: GitHubConfig {
                api_url: env_or("GITHUB_API_URL", github_defaults.api_url),
                branch: env_or("GITHUB_BRANCH", github_defaults.branch),
                owner: std::env::var("GITHUB_USERNAME").unwrap_or_default(),
                repo: std::env::var("GITHUB_REPO").unwrap_or_default(),
                timeout,
                tokens,
            },
            publish: PublishConfig {
                base_folder: env_or("BASE_FOLDER", publish_defaults.base_folder),
                base_url: env_or("BASE_URL", publish_defaults.base_url),
                custom_folder: env_or("CUSTOM_FOLDER", publish_defaults.custom_folder),
                custom_url: env_or("CUSTOM_URL", publish_defaults.custom_url),
            },
            retry: RetryPolicy {
                max_attempts,
                delay,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.owner.is_empty() {
            return Err(ConfigError::ValidationError(
                "GITHUB_USERNAME is required".to_string(),
            ));
        }

        if self.github.repo.is_empty() {
            return Err(ConfigError::ValidationError(
                "GITHUB_REPO is required".to_string(),
            ));
        }

        if self.github.tokens.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one of GITHUB_TOKEN, GITHUB_TOKEN1..GITHUB_TOKEN11 must be set"
                    .to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "UPLOAD_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.publish.base_folder.is_empty() || self.publish.custom_folder.is_empty() {
            return Err(ConfigError::ValidationError(
                "BASE_FOLDER and CUSTOM_FOLDER cannot be empty".to_string(),
            ));
        }

        if self.github.tokens.len() == 1 {
            tracing::warn!("Only one GitHub token configured; rotation is disabled");
        }

        Ok(())
    }
}

/// Collect the credential pool in order: `GITHUB_TOKEN`, `GITHUB_TOKEN1` .. `GITHUB_TOKEN11`.
/// Unset or blank entries are skipped.
pub fn token_pool<F>(lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    (0..MAX_TOKENS)
        .map(|i| {
            if i == 0 {
                "GITHUB_TOKEN".to_string()
            } else {
                format!("GITHUB_TOKEN{i}")
            }
        })
        .filter_map(|name| lookup(&name))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
