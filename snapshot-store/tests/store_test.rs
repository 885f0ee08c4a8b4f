/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::error::Error as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snapshot_store::error::{Error, ErrorKind};
use snapshot_store::types::{Action, ObjectName};
use snapshot_store::StorageProvider;
use test_common::{init_tracing, mock_client, MockSigner, MockTransport};
use tokio::time::Instant;

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test(start_paused = true)]
async fn test_set_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (client, signer, transport) = mock_client(&dir);

    client.set("flags-v1", &json!({ "flags": [] })).await.unwrap();
    let restored: Option<Value> = client.get("flags-v1").await.unwrap();

    assert_eq!(Some(json!({ "flags": [] })), restored);

    let object = ObjectName::from_key("flags-v1");
    let puts: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|call| call.method == "PUT")
        .collect();
    assert_eq!(1, puts.len());
    assert_eq!(object.as_str(), puts[0].object);
    assert_eq!(1, transport.gets_of(&object).len());

    let issued = signer.issued();
    assert_eq!(2, issued.len());
    assert_eq!(Action::Write, issued[0].action);
    assert_eq!(Action::Read, issued[1].action);
    assert!(issued.iter().all(|i| i.ttl == Duration::from_secs(900)));
    assert!(issued.iter().all(|i| i.object == "unleash-backup-flags-v1.json"));
}

#[tokio::test(start_paused = true)]
async fn test_set_writes_staging_copy() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);

    client
        .set("team/prod", &json!({ "flags": [{ "name": "beta", "enabled": true }] }))
        .await
        .unwrap();

    let object = ObjectName::from_key("team/prod");
    let staged = std::fs::read(dir.path().join(object.as_str())).unwrap();
    assert_eq!(
        json!({ "flags": [{ "name": "beta", "enabled": true }] }),
        serde_json::from_slice::<Value>(&staged).unwrap()
    );
    assert_eq!(Some(bytes::Bytes::from(staged)), transport.object(&object));
}

#[tokio::test(start_paused = true)]
async fn test_get_missing_key_is_absent_after_one_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let (client, signer, transport) = mock_client(&dir);

    let start = Instant::now();
    let restored: Option<Value> = client.get("missing-key").await.unwrap();

    assert_eq!(None, restored);
    assert_eq!(Duration::ZERO, start.elapsed());
    assert_eq!(
        1,
        transport.gets_of(&ObjectName::from_key("missing-key")).len()
    );
    assert_eq!(1, signer.issued().len());
}

#[tokio::test(start_paused = true)]
async fn test_get_persistent_server_error_exhausts_retries() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (client, signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, r#"{"flags":[]}"#);
    transport.always_fail_gets(&object, 500);

    let err = client.get::<Value>("flags-v1").await.unwrap_err();

    assert_eq!(&ErrorKind::RetriesExhausted { attempts: 5 }, err.kind());
    let last = err
        .source()
        .and_then(|source| source.downcast_ref::<Error>())
        .unwrap();
    assert!(matches!(last.kind(), ErrorKind::TransportFailed(f) if f.status() == Some(500)));

    let gets = transport.gets_of(&object);
    assert_eq!(5, gets.len());
    assert_eq!(secs(&[5, 10, 20, 40]), MockTransport::gaps(&gets));

    // a fresh URL for every attempt
    let mut urls: Vec<_> = gets.iter().map(|call| call.url.clone()).collect();
    urls.dedup();
    assert_eq!(5, urls.len());
    assert_eq!(5, signer.issued().len());
}

#[tokio::test(start_paused = true)]
async fn test_get_recovers_on_third_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    client.set("flags-v1", &json!({ "flags": [] })).await.unwrap();

    let object = ObjectName::from_key("flags-v1");
    transport.fail_gets(&object, [Some(500), Some(500)]);

    let start = Instant::now();
    let restored: Option<Value> = client.get("flags-v1").await.unwrap();

    assert_eq!(Some(json!({ "flags": [] })), restored);
    assert_eq!(Duration::from_secs(15), start.elapsed());
    let gets = transport.gets_of(&object);
    assert_eq!(3, gets.len());
    assert_eq!(secs(&[5, 10]), MockTransport::gaps(&gets));
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, r#"{"flags":["a"]}"#);
    transport.fail_gets(&object, [None, Some(503), None, Some(429)]);

    let restored: Option<Value> = client.get("flags-v1").await.unwrap();

    assert_eq!(Some(json!({ "flags": ["a"] })), restored);
    let gets = transport.gets_of(&object);
    assert_eq!(5, gets.len());
    assert_eq!(secs(&[5, 10, 20, 40]), MockTransport::gaps(&gets));
}

#[tokio::test(start_paused = true)]
async fn test_not_found_after_transient_failure_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.fail_gets(&object, [Some(502)]);

    let restored: Option<Value> = client.get("flags-v1").await.unwrap();

    assert_eq!(None, restored);
    assert_eq!(2, transport.gets_of(&object).len());
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::default();
    let config = snapshot_store::Config::builder()
        .backup_path(dir.path())
        .signer(MockSigner::failing())
        .transport(transport.clone())
        .build()
        .unwrap();
    let client = snapshot_store::Client::new(config);

    let start = Instant::now();
    let err = client.get::<Value>("flags-v1").await.unwrap_err();

    assert_eq!(&ErrorKind::AuthFailed, err.kind());
    assert_eq!(Duration::ZERO, start.elapsed());
    assert!(transport.calls().is_empty());

    let err = client.set("flags-v1", &json!({})).await.unwrap_err();
    assert_eq!(&ErrorKind::AuthFailed, err.kind());
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_put_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let (client, signer, transport) = mock_client(&dir);
    transport.fail_next_put(503);

    let start = Instant::now();
    let err = client.set("flags-v1", &json!({ "flags": [] })).await.unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::TransportFailed(f) if f.status() == Some(503)));
    assert_eq!(Duration::ZERO, start.elapsed());
    assert_eq!(1, transport.calls().len());
    assert_eq!(1, signer.issued().len());

    let object = ObjectName::from_key("flags-v1");
    assert_eq!(None, transport.object(&object));
    // staging happens before the upload
    assert!(dir.path().join(object.as_str()).exists());
}

#[tokio::test(start_paused = true)]
async fn test_missing_staging_dir_fails_set_before_upload() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::default();
    let config = snapshot_store::Config::builder()
        .backup_path(dir.path().join("does-not-exist"))
        .signer(MockSigner::default())
        .transport(transport.clone())
        .build()
        .unwrap();
    let client = snapshot_store::Client::new(config);

    let err = client.set("flags-v1", &json!({})).await.unwrap_err();

    assert_eq!(&ErrorKind::IOError, err.kind());
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_non_json_body_is_retried_until_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, "<html><body>502 Bad Gateway</body></html>");

    let err = client.get::<Value>("flags-v1").await.unwrap_err();

    assert_eq!(&ErrorKind::RetriesExhausted { attempts: 5 }, err.kind());
    let last = err
        .source()
        .and_then(|source| source.downcast_ref::<Error>())
        .unwrap();
    assert!(matches!(last.kind(), ErrorKind::TransportFailed(f) if f.status() == Some(200)));
    let gets = transport.gets_of(&object);
    assert_eq!(secs(&[5, 10, 20, 40]), MockTransport::gaps(&gets));
}

#[tokio::test(start_paused = true)]
async fn test_non_json_body_recovers_once_snapshot_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, "<Error>not json</Error>");

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.get::<Value>("flags-v1").await }
    });
    // attempts one and two see the error page
    tokio::time::sleep(Duration::from_secs(6)).await;
    transport.insert(&object, r#"{"flags":[]}"#);

    assert_eq!(Some(json!({ "flags": [] })), task.await.unwrap().unwrap());
    let gets = transport.gets_of(&object);
    assert_eq!(3, gets.len());
    assert_eq!(secs(&[5, 10]), MockTransport::gaps(&gets));
}

#[tokio::test(start_paused = true)]
async fn test_json_of_the_wrong_shape_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, r#"{"flags":[]}"#);

    let start = Instant::now();
    let err = client.get::<BackupState>("flags-v1").await.unwrap_err();

    assert_eq!(&ErrorKind::SerializationFailed, err.kind());
    assert_eq!(Duration::ZERO, start.elapsed());
    assert_eq!(1, transport.gets_of(&object).len());
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_on_later_attempt_ends_retries() {
    let dir = tempfile::tempdir().unwrap();
    let signer = MockSigner::failing_after(2);
    let transport = MockTransport::default();
    let config = snapshot_store::Config::builder()
        .backup_path(dir.path())
        .signer(signer.clone())
        .transport(transport.clone())
        .build()
        .unwrap();
    let client = snapshot_store::Client::new(config);
    let object = ObjectName::from_key("flags-v1");
    transport.insert(&object, r#"{"flags":[]}"#);
    transport.always_fail_gets(&object, 500);

    let start = Instant::now();
    let err = client.get::<Value>("flags-v1").await.unwrap_err();

    assert_eq!(&ErrorKind::AuthFailed, err.kind());
    // two failed GETs, then the third attempt fails to sign after the 10s delay
    assert_eq!(Duration::from_secs(15), start.elapsed());
    assert_eq!(2, transport.gets_of(&object).len());
    assert_eq!(2, signer.issued().len());
}

#[tokio::test(start_paused = true)]
async fn test_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, _transport) = mock_client(&dir);

    client.set("flags-v1", &json!({ "version": 1 })).await.unwrap();
    client.set("flags-v1", &json!({ "version": 2 })).await.unwrap();

    let restored: Option<Value> = client.get("flags-v1").await.unwrap();
    assert_eq!(Some(json!({ "version": 2 })), restored);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_gets_back_off_independently() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);

    let flaky = ObjectName::from_key("flaky");
    let healthy = ObjectName::from_key("healthy");
    let broken = ObjectName::from_key("broken");
    transport.insert(&flaky, r#"{"flags":["flaky"]}"#);
    transport.insert(&healthy, r#"{"flags":["healthy"]}"#);
    transport.insert(&broken, r#"{"flags":["broken"]}"#);
    transport.fail_gets(&flaky, [Some(500), Some(500)]);
    transport.always_fail_gets(&broken, 503);

    let start = Instant::now();
    let (flaky_res, healthy_res, broken_res) = futures_util::future::join3(
        client.get::<Value>("flaky"),
        client.get::<Value>("healthy"),
        client.get::<Value>("broken"),
    )
    .await;

    assert_eq!(Some(json!({ "flags": ["flaky"] })), flaky_res.unwrap());
    assert_eq!(Some(json!({ "flags": ["healthy"] })), healthy_res.unwrap());
    assert_eq!(
        &ErrorKind::RetriesExhausted { attempts: 5 },
        broken_res.unwrap_err().kind()
    );

    let healthy_gets = transport.gets_of(&healthy);
    assert_eq!(1, healthy_gets.len());
    assert_eq!(start, healthy_gets[0].at);

    let flaky_gets = transport.gets_of(&flaky);
    assert_eq!(secs(&[5, 10]), MockTransport::gaps(&flaky_gets));

    let broken_gets = transport.gets_of(&broken);
    assert_eq!(secs(&[5, 10, 20, 40]), MockTransport::gaps(&broken_gets));
}

#[tokio::test(start_paused = true)]
async fn test_spawned_gets_make_progress_during_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let slow = ObjectName::from_key("slow");
    transport.insert(&slow, r#"{"flags":[]}"#);
    transport.fail_gets(&slow, [Some(500), Some(500), Some(500)]);
    client.set("fast", &json!({ "flags": ["fast"] })).await.unwrap();

    let slow_task = tokio::spawn({
        let client = client.clone();
        async move { client.get::<Value>("slow").await }
    });
    // let the slow read fail once and start backing off
    tokio::time::sleep(Duration::from_secs(1)).await;

    let fast: Option<Value> = client.get("fast").await.unwrap();
    assert_eq!(Some(json!({ "flags": ["fast"] })), fast);
    assert!(!slow_task.is_finished());

    assert_eq!(Some(json!({ "flags": [] })), slow_task.await.unwrap().unwrap());
    assert_eq!(4, transport.gets_of(&slow).len());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureToggle {
    name: String,
    enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BackupState {
    features: Vec<FeatureToggle>,
}

#[tokio::test(start_paused = true)]
async fn test_storage_provider_interface() {
    let dir = tempfile::tempdir().unwrap();
    let (client, _signer, transport) = mock_client(&dir);
    let provider: &dyn StorageProvider<BackupState> = &client;

    let state = BackupState {
        features: vec![FeatureToggle {
            name: "new-checkout".to_string(),
            enabled: true,
        }],
    };
    provider.set("default", state.clone()).await.unwrap();
    assert_eq!(Some(state), provider.get("default").await.unwrap());
    assert_eq!(None, provider.get("other").await.unwrap());

    // structural, not byte-for-byte, equality
    let object = ObjectName::from_key("pretty");
    transport.insert(
        &object,
        "{\n  \"features\": [\n    { \"enabled\": false, \"name\": \"dark-mode\" }\n  ]\n}\n",
    );
    assert_eq!(
        Some(BackupState {
            features: vec![FeatureToggle {
                name: "dark-mode".to_string(),
                enabled: false,
            }],
        }),
        provider.get("pretty").await.unwrap()
    );
}
