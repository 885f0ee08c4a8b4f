/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use bytes::Bytes;
use snapshot_store::error::{self, Error};
use snapshot_store::http::Transport;
use snapshot_store::signer::SignUrl;
use snapshot_store::types::{Action, ObjectName, SignedUrl};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const MOCK_URL_PREFIX: &str = "mock://bucket/";

/// A signed URL request seen by [`MockSigner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub object: String,
    pub action: Action,
    pub ttl: Duration,
}

/// Issues unique `mock://` URLs and records every request.
#[derive(Debug, Clone, Default)]
pub struct MockSigner {
    issued: Arc<Mutex<Vec<Issued>>>,
    seq: Arc<AtomicUsize>,
    fail_with_auth: bool,
    fail_after: Option<usize>,
}

impl MockSigner {
    /// A signer whose every request fails with an auth error
    pub fn failing() -> Self {
        Self {
            fail_with_auth: true,
            ..Default::default()
        }
    }

    /// A signer that issues `n` URLs, then fails every request with an auth error
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Default::default()
        }
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignUrl for MockSigner {
    async fn issue(
        &self,
        object: &ObjectName,
        action: Action,
        ttl: Duration,
    ) -> Result<SignedUrl, Error> {
        let exhausted = self
            .fail_after
            .is_some_and(|n| self.issued.lock().unwrap().len() >= n);
        if self.fail_with_auth || exhausted {
            return Err(Error::new(
                error::ErrorKind::AuthFailed,
                "signing key rejected",
            ));
        }
        self.issued.lock().unwrap().push(Issued {
            object: object.to_string(),
            action,
            ttl,
        });
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        Ok(SignedUrl::new(
            format!("{MOCK_URL_PREFIX}{object}?action={action}&seq={seq}"),
            action,
            ttl,
        ))
    }
}

/// A transfer seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub object: String,
    pub url: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Bytes>,
    get_failures: HashMap<String, VecDeque<Option<u16>>>,
    put_failures: VecDeque<u16>,
    calls: Vec<Call>,
}

/// In-memory object store reached through signed URLs.
///
/// GET failures can be scripted per object; a scripted `None` simulates a network error.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

fn object_of(url: &SignedUrl) -> String {
    let rest = url.as_str().trim_start_matches(MOCK_URL_PREFIX);
    rest.split('?').next().unwrap_or_default().to_string()
}

impl MockTransport {
    /// Make the next GETs of `object` fail with the given statuses, in order.
    pub fn fail_gets(&self, object: &ObjectName, statuses: impl IntoIterator<Item = Option<u16>>) {
        self.state
            .lock()
            .unwrap()
            .get_failures
            .entry(object.to_string())
            .or_default()
            .extend(statuses);
    }

    /// Make every GET of `object` fail with `status`.
    pub fn always_fail_gets(&self, object: &ObjectName, status: u16) {
        self.fail_gets(object, std::iter::repeat(Some(status)).take(64));
    }

    /// Make the next PUT fail with `status`.
    pub fn fail_next_put(&self, status: u16) {
        self.state.lock().unwrap().put_failures.push_back(status);
    }

    /// Seed the store with raw object content
    pub fn insert(&self, object: &ObjectName, body: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(object.to_string(), body.into());
    }

    pub fn object(&self, object: &ObjectName) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(object.as_str()).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// GETs made against `object`
    pub fn gets_of(&self, object: &ObjectName) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "GET" && call.object == object.as_str())
            .collect()
    }

    /// Time elapsed between consecutive calls
    pub fn gaps(calls: &[Call]) -> Vec<Duration> {
        calls
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn put(&self, url: &SignedUrl, body: Bytes, content_type: &str) -> Result<(), Error> {
        assert_eq!(Action::Write, url.action(), "PUT with a {} URL", url.action());
        assert_eq!("application/json", content_type);
        let object = object_of(url);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method: "PUT",
            object: object.clone(),
            url: url.as_str().to_string(),
            at: Instant::now(),
        });
        if let Some(status) = state.put_failures.pop_front() {
            return Err(error::transport_failed(Some(status), "scripted PUT failure"));
        }
        state.objects.insert(object, body);
        Ok(())
    }

    async fn get(&self, url: &SignedUrl) -> Result<Bytes, Error> {
        assert_eq!(Action::Read, url.action(), "GET with a {} URL", url.action());
        let object = object_of(url);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method: "GET",
            object: object.clone(),
            url: url.as_str().to_string(),
            at: Instant::now(),
        });
        if let Some(failure) = state
            .get_failures
            .get_mut(&object)
            .and_then(VecDeque::pop_front)
        {
            return Err(match failure {
                Some(status) => error::transport_failed(Some(status), "scripted GET failure"),
                None => error::transport_failed(None, "connection reset by peer"),
            });
        }
        match state.objects.get(&object) {
            Some(body) => Ok(body.clone()),
            None => Err(error::not_found(format!("{object} does not exist"))),
        }
    }
}

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client over fresh mocks, staging into `backup_dir`.
pub fn mock_client(
    backup_dir: &tempfile::TempDir,
) -> (snapshot_store::Client, MockSigner, MockTransport) {
    let signer = MockSigner::default();
    let transport = MockTransport::default();
    let config = snapshot_store::Config::builder()
        .backup_path(backup_dir.path())
        .signer(signer.clone())
        .transport(transport.clone())
        .build()
        .unwrap();
    (snapshot_store::Client::new(config), signer, transport)
}
