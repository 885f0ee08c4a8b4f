/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;

use crate::error::{self, Error};
use crate::types::{Action, ObjectName, SignedUrl};

/// Content type bound into write signatures; uploads must send the same header.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Issues time limited URLs granting a single verb against a single object.
#[async_trait]
pub trait SignUrl: fmt::Debug + Send + Sync {
    /// Sign a URL for `action` against `object`, valid for `ttl`.
    ///
    /// Fails with [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) when the signing
    /// configuration cannot produce a URL at all, or
    /// [`AuthFailed`](crate::error::ErrorKind::AuthFailed) when signing itself fails.
    async fn issue(
        &self,
        object: &ObjectName,
        action: Action,
        ttl: Duration,
    ) -> Result<SignedUrl, Error>;
}

/// [`SignUrl`] implementation backed by the Amazon S3 SDK presigner.
///
/// Works with any S3 compatible store the client is configured for, including stores
/// reached through a custom endpoint URL.
#[derive(Debug, Clone)]
pub struct PresignedUrlIssuer {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl PresignedUrlIssuer {
    /// Create an issuer signing URLs for objects in `bucket`.
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// The bucket URLs are issued for
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl SignUrl for PresignedUrlIssuer {
    async fn issue(
        &self,
        object: &ObjectName,
        action: Action,
        ttl: Duration,
    ) -> Result<SignedUrl, Error> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(error::config_invalid)?;

        let presigned = match action {
            Action::Read => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(object.as_str())
                .presigned(presigning)
                .await
                .map_err(error::auth_failed)?,
            Action::Write => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(object.as_str())
                .content_type(JSON_CONTENT_TYPE)
                .presigned(presigning)
                .await
                .map_err(error::auth_failed)?,
        };

        tracing::debug!(
            bucket = %self.bucket,
            %object,
            %action,
            ttl_secs = ttl.as_secs(),
            "issued signed URL"
        );

        Ok(SignedUrl::new(presigned.uri(), action, ttl))
    }
}
