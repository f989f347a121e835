//! Shared constants used across rusty-s3access crates.

/// Environment variable naming the local result cache directory.
pub const CACHE_DIR_ENV: &str = "S3ACCESSCACHE";

/// Environment variable overriding the S3 endpoint (e.g. a MinIO instance).
pub const ENDPOINT_URL_ENV: &str = "S3_ENDPOINT_URL";

/// Default number of in-flight select queries per available CPU.
pub const PARALLELISM_PER_CPU: usize = 4;

/// Fallback parallelism when the number of CPUs cannot be determined.
pub const FALLBACK_PARALLELISM: usize = 4;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Cache realm for queries against a single, literal object key.
pub const FILE_REALM: &str = "file";

/// Prefix of cache realms derived from glob patterns.
pub const GLOB_REALM_PREFIX: &str = "glob_";

/// Alias used for the queried object in generated S3 Select SQL.
pub const OBJECT_ALIAS: &str = "s";

/// Default concurrency: a multiple of the available parallel execution units.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * PARALLELISM_PER_CPU)
        .unwrap_or(FALLBACK_PARALLELISM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parallelism_is_positive_multiple() {
        let parallelism: usize = default_parallelism();
        assert!(parallelism >= 1);
        assert_eq!(parallelism % PARALLELISM_PER_CPU, 0);
    }
}
