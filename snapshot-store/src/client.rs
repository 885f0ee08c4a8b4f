/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::operation::{get, set, OperationContext};
use crate::types::ObjectName;
use crate::Config;

/// Snapshot store client.
///
/// Cheap to clone; clones share the same immutable configuration. Operations on different
/// keys are fully independent of each other.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) handle: Arc<Handle>,
}

/// Whatever is needed to carry out operations
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) config: crate::Config,
}

impl Client {
    /// Creates a new client from a snapshot store config.
    pub fn new(config: Config) -> Client {
        let handle = Arc::new(Handle { config });
        Client { handle }
    }

    /// Returns the client's configuration
    pub fn config(&self) -> &Config {
        &self.handle.config
    }

    fn context(&self) -> OperationContext {
        OperationContext::new(self.handle.clone())
    }

    /// Persist `data` as the snapshot for `key`, replacing any previous one.
    ///
    /// The JSON payload is written to the local staging directory and uploaded through a
    /// single signed `PUT`. Upload failures are returned as is, without retrying.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(client: &snapshot_store::Client) -> Result<(), snapshot_store::error::Error> {
    /// client.set("flags-v1", &serde_json::json!({ "flags": [] })).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set<T>(&self, key: &str, data: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let payload = Bytes::from(serde_json::to_vec(data)?);
        set::store(self.context(), ObjectName::from_key(key), payload).await
    }

    /// Restore the snapshot for `key`.
    ///
    /// Returns `Ok(None)` if no snapshot was ever stored. Transient transfer failures are
    /// retried with exponential backoff (5s, 10s, 20s, 40s); once every attempt has failed a
    /// [`RetriesExhausted`](crate::error::ErrorKind::RetriesExhausted) error is returned.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let object = ObjectName::from_key(key);
        let body = get::fetch(self.context(), object.clone()).await?;
        let snapshot = body
            .map(|body| serde_json::from_slice(&body))
            .transpose()
            .inspect_err(|err| tracing::warn!(%object, "snapshot is not valid JSON: {err}"))?;
        Ok(snapshot)
    }
}

/// Backup provider interface consumed by the feature-flag runtime.
#[async_trait]
pub trait StorageProvider<T>: Send + Sync {
    /// Persist `data` under `key`
    async fn set(&self, key: &str, data: T) -> Result<(), Error>;

    /// Restore the data stored under `key`, `None` when nothing was stored
    async fn get(&self, key: &str) -> Result<Option<T>, Error>;
}

#[async_trait]
impl<T> StorageProvider<T> for Client
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn set(&self, key: &str, data: T) -> Result<(), Error> {
        Client::set(self, key, &data).await
    }

    async fn get(&self, key: &str) -> Result<Option<T>, Error> {
        Client::get(self, key).await
    }
}
