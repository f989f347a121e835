//! Data types for listing, select events and configuration.

use std::path::PathBuf;

use rusty_s3access_common::{default_parallelism, CACHE_DIR_ENV, DEFAULT_REGION, ENDPOINT_URL_ENV};
use rusty_s3access_query::S3Path;
use serde::{Deserialize, Serialize};

/// Settings shared by both schedulers and the transport clients.
#[derive(Debug, Clone)]
pub struct AccessSettings {
    /// Maximum number of select queries in flight at once (at least 1).
    pub parallelism: usize,
    /// Root of the local result cache. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Custom S3 endpoint, e.g. a MinIO instance.
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
    /// Static credentials; `None` uses the default provider chain.
    pub credentials: Option<AwsCredentials>,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            cache_dir: None,
            endpoint_url: None,
            region: DEFAULT_REGION.into(),
            credentials: None,
        }
    }
}

impl AccessSettings {
    /// Defaults overridden by `S3ACCESSCACHE` and `S3_ENDPOINT_URL`.
    ///
    /// Empty variables are treated as unset.
    pub fn from_env() -> Self {
        let mut settings: AccessSettings = Self::default();
        if let Some(dir) = non_empty_env(CACHE_DIR_ENV) {
            settings.cache_dir = Some(PathBuf::from(dir));
        }
        settings.endpoint_url = non_empty_env(ENDPOINT_URL_ENV);
        settings
    }

    /// Set the concurrency bound. Zero is raised to one.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Enable caching under `dir`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Use a custom endpoint.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Use static credentials.
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// AWS credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// One page of a listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Common prefixes ("directories") when listing with a delimiter.
    pub common_prefixes: Vec<String>,
    /// Object keys.
    pub keys: Vec<String>,
    /// Token for the next page, if the listing is truncated.
    pub next_token: Option<String>,
}

/// Result of listing one directory level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    /// Sub-directories.
    pub prefixes: Vec<S3Path>,
    /// Objects directly under the directory.
    pub entries: Vec<S3Path>,
}

/// Byte counters reported by S3 Select progress and stats events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetails {
    pub bytes_scanned: u64,
    pub bytes_processed: u64,
    pub bytes_returned: u64,
}

/// A decoded frame of a select response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectEvent {
    /// A chunk of result records.
    Records(Vec<u8>),
    /// Progress counters.
    Progress(ProgressDetails),
    /// The response is complete.
    End,
}

/// Progress of one object's select query, as delivered to callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectProgress {
    pub bucket: String,
    pub key: String,
    /// Counters from the service; zero for completion notices.
    pub details: ProgressDetails,
    /// `true` once the object's stream has been read to its end event.
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let settings: AccessSettings = AccessSettings::default()
            .with_parallelism(0)
            .with_cache_dir("/tmp/cache")
            .with_endpoint_url("http://localhost:9000")
            .with_region("eu-west-1");
        assert_eq!(settings.parallelism, 1);
        assert_eq!(settings.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.region, "eu-west-1");
    }

    #[test]
    fn test_default_parallelism() {
        assert!(AccessSettings::default().parallelism >= 1);
        assert!(AccessSettings::default().cache_dir.is_none());
    }
}
