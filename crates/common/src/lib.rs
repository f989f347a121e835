//! Shared types and utilities for rusty-s3access.
//!
//! This crate provides common functionality used across all rusty-s3access crates:
//! - Environment variable names and tuning defaults
//! - Fingerprint hashing (XXH3-128)
//! - Generic progress callback trait

pub mod constants;
pub mod hash;
pub mod progress;

// Re-export commonly used items at crate root
pub use constants::*;
pub use hash::{fingerprint_parts, hash_bytes, Xxh3Hasher, FINGERPRINT_LEN};
pub use progress::{progress_fn, FnProgress, NoOpProgress, ProgressCallback};
