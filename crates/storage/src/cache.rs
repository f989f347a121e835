//! Local file cache of decoded select results.
//!
//! Cache files live at `{root}/{bucket}/{realm}/{fingerprint}.{ext}` where:
//! - `realm` is `file` for literal object keys, or a sanitised form of the key
//!   pattern (prefixed with `glob_`) for whole-pattern results
//! - `fingerprint` is an XXH3-128 digest of the address and the query text
//!
//! The cache never fails a query. A missing root disables it, an unreadable
//! entry is a miss (and is removed), an unwritable entry is skipped.

use std::path::{Path, PathBuf};

use rusty_s3access_common::{fingerprint_parts, FILE_REALM, GLOB_REALM_PREFIX};
use rusty_s3access_query::S3Path;

use crate::error::CacheError;
use crate::reader::Reader;

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    /// Whether a cache file exists.
    pub hit: bool,
    /// Location of the cache file; `None` when caching is disabled.
    pub path: Option<PathBuf>,
}

impl CacheLookup {
    fn disabled() -> Self {
        Self {
            hit: false,
            path: None,
        }
    }
}

/// Fingerprint of a query against an address.
///
/// # Arguments
/// * `path` - Object address or key pattern
/// * `query_text` - S3 Select expression
///
/// # Returns
/// A fixed-length lowercase hex token.
pub fn fingerprint(path: &S3Path, query_text: &str) -> String {
    let address: String = path.to_string();
    fingerprint_parts(&[&address, query_text])
}

/// Cache namespace of an address.
///
/// Literal keys share the `file` realm. Patterns get their own realm so that
/// their whole-pattern entries can be told apart on disk.
pub fn realm(path: &S3Path) -> String {
    if !path.is_glob() {
        return FILE_REALM.to_string();
    }
    let sanitised: String = path
        .key()
        .chars()
        .map(|c| match c {
            '/' => ',',
            '*' | '?' | '[' | ']' | '\\' => '_',
            other => other,
        })
        .collect();
    format!("{}{}", GLOB_REALM_PREFIX, sanitised)
}

/// File cache rooted at a local directory.
#[derive(Debug, Clone, Default)]
pub struct CacheLayer {
    root: Option<PathBuf>,
}

impl CacheLayer {
    /// Create a cache rooted at `root`.
    ///
    /// A root that is missing or not a directory disables the cache with a
    /// warning.
    pub fn new(root: Option<PathBuf>) -> Self {
        let root: Option<PathBuf> = root.filter(|dir| {
            if dir.is_dir() {
                true
            } else {
                log::warn!(
                    "Cache directory {} does not exist or is not a directory; caching disabled",
                    dir.display()
                );
                false
            }
        });
        Self { root }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// Whether a usable root is configured.
    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// Root directory, if enabled.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Locate the cache file of a query. Creates nothing on disk.
    ///
    /// # Arguments
    /// * `path` - Object address or key pattern
    /// * `query_text` - S3 Select expression
    /// * `extension` - Cache file extension of the reader
    pub fn lookup(&self, path: &S3Path, query_text: &str, extension: &str) -> CacheLookup {
        let Some(root) = &self.root else {
            return CacheLookup::disabled();
        };
        let file: PathBuf = root
            .join(path.bucket())
            .join(realm(path))
            .join(format!("{}.{}", fingerprint(path, query_text), extension));
        CacheLookup {
            hit: file.is_file(),
            path: Some(file),
        }
    }

    /// Load a cached result.
    ///
    /// A file that cannot be read is treated as a miss and removed.
    ///
    /// # Returns
    /// The cached value, or `None` on a miss.
    pub fn load<R: Reader + ?Sized>(&self, reader: &R, file: &Path) -> Option<R::Output> {
        match reader.read_cache(file) {
            Ok(value) => {
                log::debug!("Cache hit {}", file.display());
                Some(value)
            }
            Err(source) => {
                let err: CacheError = CacheError::Corrupt {
                    path: file.display().to_string(),
                    source,
                };
                log::warn!("{}; ignoring it", err);
                if let Err(e) = std::fs::remove_file(file) {
                    log::warn!("Failed to delete cache file {}: {}", file.display(), e);
                }
                None
            }
        }
    }

    /// Persist a result, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns `CacheError::Unwritable` if the directory or file cannot be
    /// written. The failure has already been logged; callers carry on.
    pub fn store<R: Reader + ?Sized>(
        &self,
        reader: &R,
        file: &Path,
        value: &R::Output,
    ) -> Result<(), CacheError> {
        let unwritable = |message: String| {
            let err: CacheError = CacheError::Unwritable {
                path: file.display().to_string(),
                message,
            };
            log::warn!("{}", err);
            err
        };

        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unwritable(e.to_string()))?;
        }
        reader
            .write_cache(file, value)
            .map_err(|e| unwritable(e.to_string()))?;
        log::debug!("Cached result at {}", file.display());
        Ok(())
    }
}
