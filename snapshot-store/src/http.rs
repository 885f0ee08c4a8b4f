/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};

use crate::error::{self, Error};
use crate::types::{Action, SignedUrl};

/// Longest response body kept in a transport error message
const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Performs a single HTTP transfer against a signed URL.
///
/// Implementations make exactly one attempt and classify the outcome: a missing object on
/// `get` is [`NotFound`](crate::error::ErrorKind::NotFound), every other failure is
/// [`TransportFailed`](crate::error::ErrorKind::TransportFailed).
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Upload `body` to a [`Action::Write`] URL. Any 2xx status is success.
    async fn put(&self, url: &SignedUrl, body: Bytes, content_type: &str) -> Result<(), Error>;

    /// Download the object behind a [`Action::Read`] URL.
    async fn get(&self, url: &SignedUrl) -> Result<Bytes, Error>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport using an explicit `reqwest` client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send the one request `url` grants, with the verb its action was signed for.
    async fn send(
        &self,
        url: &SignedUrl,
        expected: Action,
        body: Option<(Bytes, &str)>,
    ) -> Result<reqwest::Response, Error> {
        require_action(url, expected)?;
        let method =
            Method::from_bytes(url.action().method().as_bytes()).map_err(error::invalid_input)?;

        let mut request = self.client.request(method, url.as_str());
        if let Some((body, content_type)) = body {
            request = request.header(CONTENT_TYPE, content_type).body(body);
        }
        request
            .send()
            .await
            .map_err(|err| error::transport_failed(None, err.to_string()))
    }
}

fn require_action(url: &SignedUrl, expected: Action) -> Result<(), Error> {
    if url.action() != expected {
        return Err(error::invalid_input(format!(
            "URL was signed for {} but is being used for {}",
            url.action(),
            expected
        )));
    }
    Ok(())
}

async fn failure_message(resp: reqwest::Response) -> String {
    let mut text = resp.text().await.unwrap_or_default();
    if text.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[async_trait]
impl Transport for HttpTransport {
    async fn put(&self, url: &SignedUrl, body: Bytes, content_type: &str) -> Result<(), Error> {
        let resp = self
            .send(url, Action::Write, Some((body, content_type)))
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = failure_message(resp).await;
        Err(error::transport_failed(Some(status.as_u16()), message))
    }

    async fn get(&self, url: &SignedUrl) -> Result<Bytes, Error> {
        let resp = self.send(url, Action::Read, None).await?;

        match resp.status() {
            StatusCode::OK => resp
                .bytes()
                .await
                .map_err(|err| error::transport_failed(Some(200), err.to_string())),
            StatusCode::NOT_FOUND => Err(error::not_found(failure_message(resp).await)),
            status => {
                let message = failure_message(resp).await;
                Err(error::transport_failed(Some(status.as_u16()), message))
            }
        }
    }
}
