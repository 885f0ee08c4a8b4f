/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;
use tracing::Instrument;

use crate::error::Error;
use crate::operation::OperationContext;
use crate::signer::JSON_CONTENT_TYPE;
use crate::types::{Action, ObjectName};

/// Store an already serialized snapshot under `object`.
///
/// The payload is staged to `<backup_path>/<object>` first, then uploaded with exactly one PUT.
/// Failures are not retried.
pub(crate) async fn store(
    ctx: OperationContext,
    object: ObjectName,
    payload: Bytes,
) -> Result<(), Error> {
    let span = tracing::debug_span!("store-snapshot", %object);
    store_inner(ctx, object, payload).instrument(span).await
}

async fn store_inner(ctx: OperationContext, object: ObjectName, payload: Bytes) -> Result<(), Error> {
    let staging_path = ctx.config().backup_path().join(object.as_str());
    tokio::fs::write(&staging_path, &payload).await?;
    tracing::debug!(path = %staging_path.display(), "wrote staging copy");

    let url = ctx
        .signer()
        .issue(&object, Action::Write, ctx.config().url_ttl())
        .await?;

    let len = payload.len();
    ctx.transport()
        .put(&url, payload, JSON_CONTENT_TYPE)
        .await
        .inspect_err(|err| tracing::warn!("snapshot upload failed: {err}"))?;

    tracing::info!(bytes = len, "uploaded snapshot");
    Ok(())
}
