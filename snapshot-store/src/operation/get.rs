/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};
use tracing::Instrument;

use crate::error::{self, Error, ErrorKind};
use crate::middleware::retry::FetchPolicy;
use crate::operation::OperationContext;
use crate::types::{Action, ObjectName};

/// Request/input type for a single read attempt.
#[derive(Debug, Clone)]
pub(crate) struct FetchRequest {
    pub(crate) ctx: OperationContext,
    pub(crate) object: ObjectName,
    /// 1-based attempt number, advanced by the retry policy before each retry
    pub(crate) attempt: u32,
}

/// handler (service fn) for a single read attempt
async fn fetch_attempt_handler(request: FetchRequest) -> Result<Option<Bytes>, Error> {
    let attempt = request.attempt;
    fetch_attempt(request)
        .instrument(tracing::debug_span!("fetch-attempt", attempt))
        .await
}

async fn fetch_attempt(request: FetchRequest) -> Result<Option<Bytes>, Error> {
    let ctx = request.ctx;
    // a fresh URL per attempt, a late retry must never run into an expired one
    let url = ctx
        .signer()
        .issue(&request.object, Action::Read, ctx.config().url_ttl())
        .await?;

    match ctx.transport().get(&url).await {
        Ok(body) => {
            // an error page served with 200 (proxy, captive portal) is transient, not a snapshot
            if let Err(err) = serde_json::from_slice::<serde::de::IgnoredAny>(&body) {
                return Err(error::transport_failed(
                    Some(200),
                    format!("response body is not JSON: {err}"),
                ));
            }
            tracing::debug!(bytes = body.len(), "fetched snapshot");
            Ok(Some(body))
        }
        Err(err) if err.kind() == &ErrorKind::NotFound => {
            tracing::debug!("snapshot does not exist");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Create a new tower::Service reading one object, retrying transient failures
pub(super) fn fetch_service(
) -> impl Service<FetchRequest, Response = Option<Bytes>, Error = Error, Future: Send> + Clone + Send
{
    ServiceBuilder::new()
        .retry(FetchPolicy::default())
        .service(service_fn(fetch_attempt_handler))
}

/// Fetch the raw snapshot stored under `object`.
///
/// Returns `Ok(None)` when the object does not exist.
pub(crate) async fn fetch(
    ctx: OperationContext,
    object: ObjectName,
) -> Result<Option<Bytes>, Error> {
    let span = tracing::debug_span!("fetch-snapshot", %object);
    let request = FetchRequest {
        ctx,
        object,
        attempt: 1,
    };
    fetch_service().oneshot(request).instrument(span).await
}
