//! AWS SDK S3 backend for rusty-s3access.
//!
//! This crate provides the transport implementations used against real S3 or
//! S3-compatible stores:
//! - [`CrtSelectClient`] for the cooperative scheduler
//! - [`CrtClientFactory`] / [`BlockingCrtClient`] for the thread-pool scheduler
//!
//! # Example
//!
//! ```ignore
//! use rusty_s3access_storage_crt::{CrtClientFactory, CrtSelectClient};
//! use rusty_s3access_storage::{AccessSettings, BlockingS3Access, RowReader, S3Access};
//!
//! let settings = AccessSettings::from_env();
//! let client = CrtSelectClient::new(&settings).await?;
//! let access = S3Access::new(client, settings.clone());
//!
//! let blocking = BlockingS3Access::new(CrtClientFactory::new(settings.clone()), settings)?;
//! ```

mod blocking;
mod client;
mod error;

pub use blocking::{BlockingCrtClient, CrtClientFactory};
pub use client::CrtSelectClient;
pub use error::CrtError;
