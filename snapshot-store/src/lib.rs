/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Backup snapshot storage over pre-signed object store URLs.
//!
//! Snapshots of feature-flag state are written and read as whole JSON objects. Every
//! transfer goes through a short lived pre-signed URL rather than a credentialed SDK call,
//! so the data path only ever talks to the object store's public endpoint.
//!
//! Reads are retried with a deterministic exponential backoff. A missing object is not an
//! error: [`Client::get`] returns `Ok(None)`. Writes are attempted exactly once.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> Result<(), snapshot_store::error::Error> {
//! let config = snapshot_store::from_env().load().await?;
//! let client = snapshot_store::Client::new(config);
//!
//! client.set("flags-v1", &serde_json::json!({ "flags": [] })).await?;
//! let restored: Option<serde_json::Value> = client.get("flags-v1").await?;
//! # Ok(())
//! # }
//! ```

/// Default lifetime of an issued signed URL, in seconds
pub(crate) const DEFAULT_URL_TTL_SECS: u64 = 900;

/// Error types emitted by `snapshot-store`
pub mod error;

/// Common types used by `snapshot-store`
pub mod types;

/// Snapshot store client
pub mod client;

/// Snapshot store configuration
pub mod config;

/// Signed URL issuance
pub mod signer;

/// HTTP transfer of signed URL requests
pub mod http;

/// Snapshot store operations
pub(crate) mod operation;

/// Tower related middleware and components
pub(crate) mod middleware;

pub use self::client::{Client, StorageProvider};
use self::config::loader::ConfigLoader;
pub use self::config::Config;

/// Create a config loader
pub fn from_env() -> ConfigLoader {
    ConfigLoader::default()
}
