/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::mem;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{self, Error};
use crate::operation::get::FetchRequest;

/// Maximum number of read attempts, including the first one
pub(crate) const MAX_ATTEMPTS: u32 = 5;

/// Delay before the second attempt; doubles for every attempt after that
pub(crate) const BASE_DELAY: Duration = Duration::from_millis(5000);

/// Delay to wait after failed attempt number `attempt` (1-based): `base * 2^(attempt - 1)`.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// A `tower::retry::Policy` implementation for retrying snapshot reads.
///
/// Only [`TransportFailed`](crate::error::ErrorKind::TransportFailed) errors are retried.
/// There is no jitter, the delays form the exact sequence given by [`backoff_delay`].
#[derive(Debug, Clone)]
pub(crate) struct FetchPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }
}

impl tower::retry::Policy<FetchRequest, Option<Bytes>, Error> for FetchPolicy {
    type Future = tokio::time::Sleep;

    fn retry(
        &mut self,
        req: &mut FetchRequest,
        result: &mut Result<Option<Bytes>, Error>,
    ) -> Option<Self::Future> {
        let retryable = match result {
            Ok(_) => return None,
            Err(err) => err.kind().is_retryable(),
        };
        if !retryable {
            return None;
        }

        let attempt = req.attempt;
        if attempt >= self.max_attempts {
            if let Err(last) = mem::replace(result, Ok(None)) {
                tracing::warn!(object = %req.object, attempt, "read attempts exhausted: {last}");
                *result = Err(error::retries_exhausted(attempt, last));
            }
            return None;
        }

        let delay = backoff_delay(self.base_delay, attempt);
        if let Err(err) = result {
            tracing::warn!(
                object = %req.object,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "read attempt failed, backing off: {err}"
            );
        }
        req.attempt += 1;
        Some(tokio::time::sleep(delay))
    }

    fn clone_request(&mut self, req: &FetchRequest) -> Option<FetchRequest> {
        Some(req.clone())
    }
}
