/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: The source chain carries the underlying cause (HTTP response text, SDK error, etc).
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of snapshot store errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Required configuration (bucket, credentials, staging path) is missing or invalid
    ConfigInvalid,

    /// Signing a URL failed
    AuthFailed,

    /// An HTTP transfer failed with something other than "not found"
    TransportFailed(TransportFailed),

    /// The object does not exist
    NotFound,

    /// Every read attempt failed with a retryable error
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Operation input validation issues (e.g. a read URL handed to a write)
    InputInvalid,

    /// The snapshot could not be encoded to or decoded from JSON
    SerializationFailed,

    /// I/O errors
    IOError,
}

/// Stores information about a failed HTTP transfer
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportFailed {
    status: Option<u16>,
    message: String,
}

impl TransportFailed {
    /// The HTTP status returned, `None` when no response was received
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Response text or a description of the network failure
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ErrorKind {
    /// Whether a read attempt that failed with this kind may be tried again.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransportFailed(_))
    }
}

impl Error {
    /// Creates a new snapshot store [`Error`] from a known kind of error as well as an arbitrary
    /// error source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::AuthFailed => write!(f, "failed to sign URL"),
            ErrorKind::TransportFailed(failed) => match failed.status {
                Some(status) => write!(f, "transfer failed with status {status}"),
                None => write!(f, "transfer failed before a response was received"),
            },
            ErrorKind::NotFound => write!(f, "object not found"),
            ErrorKind::RetriesExhausted { attempts } => {
                write!(f, "giving up after {attempts} attempts")
            }
            ErrorKind::InputInvalid => write!(f, "invalid input"),
            ErrorKind::SerializationFailed => write!(f, "snapshot serialization failed"),
            ErrorKind::IOError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::SerializationFailed, value)
    }
}

pub(crate) fn config_invalid<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ConfigInvalid, err)
}

pub(crate) fn auth_failed<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::AuthFailed, err)
}

pub(crate) fn invalid_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InputInvalid, err)
}

/// An HTTP-level failure. `status` is `None` when the request never got a response.
pub fn transport_failed(status: Option<u16>, message: impl Into<String>) -> Error {
    let message = message.into();
    Error::new(
        ErrorKind::TransportFailed(TransportFailed {
            status,
            message: message.clone(),
        }),
        message,
    )
}

/// The requested object does not exist.
pub fn not_found<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::NotFound, err)
}

pub(crate) fn retries_exhausted(attempts: u32, last: Error) -> Error {
    Error::new(ErrorKind::RetriesExhausted { attempts }, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(transport_failed(Some(500), "boom").kind().is_retryable());
        assert!(transport_failed(None, "connection reset").kind().is_retryable());
        assert!(!not_found("gone").kind().is_retryable());
        assert!(!auth_failed("no key").kind().is_retryable());
        assert!(!config_invalid("no bucket").kind().is_retryable());
    }

    #[test]
    fn retries_exhausted_keeps_last_error_as_source() {
        let err = retries_exhausted(5, transport_failed(Some(503), "slow down"));
        assert_eq!(&ErrorKind::RetriesExhausted { attempts: 5 }, err.kind());
        let source = err
            .source()
            .and_then(|s| s.downcast_ref::<Error>())
            .expect("source is the last attempt error");
        match source.kind() {
            ErrorKind::TransportFailed(failed) => {
                assert_eq!(Some(503), failed.status());
                assert_eq!("slow down", failed.message());
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
