/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::config::Region;

use crate::config::Builder;
use crate::error::{self, Error};
use crate::Config;

/// Bucket holding the snapshots
pub(crate) const ENV_BUCKET: &str = "SNAPSHOT_BUCKET";
/// Directory for local staging copies
pub(crate) const ENV_BACKUP_PATH: &str = "SNAPSHOT_BACKUP_PATH";
/// Optional endpoint of an S3 compatible store
pub(crate) const ENV_ENDPOINT_URL: &str = "SNAPSHOT_ENDPOINT_URL";
/// Optional signed URL lifetime in seconds
pub(crate) const ENV_URL_TTL_SECS: &str = "SNAPSHOT_URL_TTL_SECS";

/// Region used for signing when the environment does not provide one
const FALLBACK_REGION: &str = "auto";

/// Load snapshot store [`Config`] from the environment.
///
/// Bucket, staging path, endpoint and URL lifetime come from `SNAPSHOT_*` variables unless
/// overridden on the loader. Credentials and region come from the standard AWS provider chain.
#[derive(Default, Debug)]
pub struct ConfigLoader {
    bucket: Option<String>,
    backup_path: Option<PathBuf>,
    endpoint_url: Option<String>,
    url_ttl: Option<Duration>,
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl ConfigLoader {
    /// Bucket holding the snapshots
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Directory the local staging copy of each snapshot is written to
    pub fn backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    /// Endpoint of an S3 compatible store. Enables path style addressing.
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Lifetime of each signed URL. Default is 900 seconds.
    pub fn url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = Some(ttl);
        self
    }

    /// Load the configuration
    ///
    /// If fields have been overridden during loader construction, the override values will be
    /// used. Otherwise they are read from the environment. Missing bucket, staging path or
    /// credentials fail with [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid).
    pub async fn load(self) -> Result<Config, Error> {
        let bucket = self
            .bucket
            .or_else(|| env_var(ENV_BUCKET))
            .ok_or_else(|| error::config_invalid(format!("missing env var: {ENV_BUCKET}")))?;
        let backup_path = self
            .backup_path
            .or_else(|| env_var(ENV_BACKUP_PATH).map(PathBuf::from))
            .ok_or_else(|| error::config_invalid(format!("missing env var: {ENV_BACKUP_PATH}")))?;
        let endpoint_url = self.endpoint_url.or_else(|| env_var(ENV_ENDPOINT_URL));
        let url_ttl = match self.url_ttl {
            Some(ttl) => Some(ttl),
            None => env_var(ENV_URL_TTL_SECS)
                .map(|secs| {
                    secs.parse::<u64>().map(Duration::from_secs).map_err(|err| {
                        error::config_invalid(format!("invalid {ENV_URL_TTL_SECS}: {err}"))
                    })
                })
                .transpose()?,
        };

        let shared_config = aws_config::from_env().load().await;
        // resolve once up front so missing credentials surface here rather than on first use
        let credentials = shared_config
            .credentials_provider()
            .ok_or_else(|| error::config_invalid("no credentials provider configured"))?;
        credentials
            .provide_credentials()
            .await
            .map_err(error::config_invalid)?;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&shared_config);
        if shared_config.region().is_none() {
            s3_config = s3_config.region(Region::from_static(FALLBACK_REGION));
        }
        if let Some(endpoint_url) = &endpoint_url {
            s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(s3_config.build());

        tracing::debug!(
            %bucket,
            backup_path = %backup_path.display(),
            endpoint_url = endpoint_url.as_deref().unwrap_or("default"),
            "loaded snapshot store configuration"
        );

        let mut builder = Builder::default()
            .bucket(bucket)
            .backup_path(backup_path)
            .client(client);
        if let Some(ttl) = url_ttl {
            builder = builder.url_ttl(ttl);
        }
        builder.build()
    }
}
