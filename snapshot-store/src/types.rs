/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::time::{Duration, SystemTime};

const OBJECT_NAME_PREFIX: &str = "unleash-backup-";
const OBJECT_NAME_SUFFIX: &str = ".json";

/// Restrict `key` to characters that are safe in an object name and a local file name.
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept, everything else becomes `_`. Applying it
/// to its own output is a no-op.
pub fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// Name of the remote object (and local staging file) holding the snapshot for a backup key.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    /// Derive the object name for a caller supplied backup key.
    pub fn from_key(key: &str) -> Self {
        ObjectName(format!(
            "{OBJECT_NAME_PREFIX}{}{OBJECT_NAME_SUFFIX}",
            sanitize(key)
        ))
    }

    /// The object name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The single HTTP verb a signed URL grants.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Action {
    /// Download the object (`GET`)
    Read,
    /// Replace the object (`PUT`)
    Write,
}

impl Action {
    /// HTTP method granted by this action
    pub fn method(&self) -> &'static str {
        match self {
            Action::Read => "GET",
            Action::Write => "PUT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => f.write_str("read"),
            Action::Write => f.write_str("write"),
        }
    }
}

/// A time limited capability URL bound to one [`Action`] against one object.
///
/// The action is fixed at issuance, there is no way to re-target an existing URL.
#[derive(Clone)]
pub struct SignedUrl {
    url: String,
    action: Action,
    expires_at: SystemTime,
}

impl SignedUrl {
    /// Wrap a URL that was signed for `action` and stays valid for `ttl` from now.
    ///
    /// Intended for [`SignUrl`](crate::signer::SignUrl) implementations.
    pub fn new(url: impl Into<String>, action: Action, ttl: Duration) -> Self {
        SignedUrl {
            url: url.into(),
            action,
            expires_at: SystemTime::now() + ttl,
        }
    }

    /// The full URL, including its signature
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The action this URL was signed for
    pub fn action(&self) -> Action {
        self.action
    }

    /// Instant after which the storage provider rejects the URL
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether the URL is past its expiry
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

// the query string carries the signature
impl fmt::Debug for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.url.split('?').next().unwrap_or_default();
        f.debug_struct("SignedUrl")
            .field("url", &format_args!("{base}?<redacted>"))
            .field("action", &self.action)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
