/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{self, Error};
use crate::http::{HttpTransport, Transport};
use crate::signer::{PresignedUrlIssuer, SignUrl};
use crate::DEFAULT_URL_TTL_SECS;

pub(crate) mod loader;

/// Longest lifetime a SigV4 presigned URL may have
pub(crate) const MAX_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for a [`Client`](crate::client::Client)
///
/// Built once and shared by every operation the client performs.
#[derive(Clone)]
pub struct Config {
    backup_path: PathBuf,
    url_ttl: Duration,
    signer: Arc<dyn SignUrl>,
    transport: Arc<dyn Transport>,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Directory the local staging copy of each snapshot is written to
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Lifetime of each signed URL issued
    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// The signed URL issuer
    pub fn signer(&self) -> &dyn SignUrl {
        self.signer.as_ref()
    }

    /// The HTTP transport used for transfers
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backup_path", &self.backup_path)
            .field("url_ttl", &self.url_ttl)
            .field("signer", &self.signer)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Fluent style builder for [Config]
#[derive(Default)]
pub struct Builder {
    bucket: Option<String>,
    backup_path: Option<PathBuf>,
    url_ttl: Option<Duration>,
    client: Option<aws_sdk_s3::Client>,
    signer: Option<Arc<dyn SignUrl>>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("bucket", &self.bucket)
            .field("backup_path", &self.backup_path)
            .field("url_ttl", &self.url_ttl)
            .field("client", &self.client.is_some())
            .field("signer", &self.signer)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Builder {
    /// Bucket holding the snapshots. Required unless an explicit [`signer`](Self::signer) is set.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Directory the local staging copy of each snapshot is written to. Required.
    pub fn backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    /// Lifetime of each signed URL. Must be non-zero and at most seven days.
    ///
    /// Default is 900 seconds.
    pub fn url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = Some(ttl);
        self
    }

    /// Set the S3 client used to presign URLs.
    ///
    /// The client only signs URLs; it is never used to transfer data. Credentials are resolved
    /// when a URL is signed, [`ConfigLoader`](crate::config::loader::ConfigLoader) resolves
    /// them eagerly.
    pub fn client(mut self, client: aws_sdk_s3::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a custom signed URL issuer instead of presigning with [`client`](Self::client).
    pub fn signer(mut self, signer: impl SignUrl + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Use a custom transport instead of the default [`HttpTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Consumes the builder and constructs a [`Config`]
    ///
    /// Fails with [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) when a required
    /// setting is missing.
    pub fn build(self) -> Result<Config, Error> {
        let backup_path = self
            .backup_path
            .ok_or_else(|| error::config_invalid("backup path is required"))?;

        let url_ttl = self
            .url_ttl
            .unwrap_or(Duration::from_secs(DEFAULT_URL_TTL_SECS));
        if url_ttl.is_zero() || url_ttl > MAX_URL_TTL {
            return Err(error::config_invalid(format!(
                "signed URL TTL must be between 1s and {}s, got {}s",
                MAX_URL_TTL.as_secs(),
                url_ttl.as_secs()
            )));
        }

        let signer = match self.signer {
            Some(signer) => signer,
            None => Arc::new(presigner(self.bucket, self.client)?),
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::default()));

        Ok(Config {
            backup_path,
            url_ttl,
            signer,
            transport,
        })
    }
}

fn presigner(
    bucket: Option<String>,
    client: Option<aws_sdk_s3::Client>,
) -> Result<PresignedUrlIssuer, Error> {
    let bucket = bucket
        .filter(|bucket| !bucket.trim().is_empty())
        .ok_or_else(|| error::config_invalid("bucket name is required"))?;
    let client = client.ok_or_else(|| error::config_invalid("an S3 client is required"))?;
    Ok(PresignedUrlIssuer::new(client, bucket))
}
