/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::http::Transport;
use crate::signer::SignUrl;

/// Read a snapshot, retrying transient failures
pub(crate) mod get;

/// Write a snapshot in a single attempt
pub(crate) mod set;

/// Container for the shared state a single operation needs.
#[derive(Debug, Clone)]
pub(crate) struct OperationContext {
    handle: Arc<crate::client::Handle>,
}

impl OperationContext {
    pub(crate) fn new(handle: Arc<crate::client::Handle>) -> Self {
        Self { handle }
    }

    pub(crate) fn config(&self) -> &crate::Config {
        &self.handle.config
    }

    /// The signed URL issuer
    pub(crate) fn signer(&self) -> &dyn SignUrl {
        self.handle.config.signer()
    }

    /// The transport used for transfers
    pub(crate) fn transport(&self) -> &dyn Transport {
        self.handle.config.transport()
    }
}
