// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A composite error type for errors that can occur while interacting with Twitter.
//!
//! Any action that crosses the network to call Twitter has many places where it can go wrong.
//! Whether it's a bad network connection, a revoked authorization token, a deleted tweet, or
//! anything in between, those errors are all represented in the (rather sprawling) `Error` enum.
//! Any errors direct from Twitter are represented as an `ApiError` wrapped in one of three
//! variants, depending on what kind of failure Twitter reported:
//!
//! * `Error::RateLimit` for a `429 Too Many Requests`. `ApiError::retry_after` holds the value
//!   Twitter gave for when it's safe to try again.
//! * `Error::Auth` for a `401 Unauthorized`, or for any response whose message mentions "Bad
//!   Authentication data" (Twitter sends that with a `400` for revoked or mistyped app keys).
//! * `Error::Api` for every other response with a status above `304 Not Modified`.
//!
//! The remaining variants are either local mistakes (asking for header information before any
//! call was made, naming an endpoint that doesn't exist, leaving out a parameter an endpoint path
//! needs) or failures bubbled up from the libraries this crate uses to talk to the network.

use std::fmt;

use hyper::StatusCode;

/// Convenient alias to a Result containing a local Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure information returned by Twitter for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The message Twitter gave, or a generic message if the response carried none.
    pub message: String,
    /// The numeric HTTP status of the response.
    pub status_code: u16,
    /// For rate-limit errors, the value Twitter sent for when the request can be retried.
    pub retry_after: Option<String>,
}

impl ApiError {
    /// Returns the canonical reason phrase for this error's status code, if there is one.
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status_code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "API returned a {} ({}), {}",
            self.status_code,
            self.reason(),
            self.message
        )
    }
}

/// Represents an error that can occur during a web call or while processing its response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Twitter reported a failure that was neither an authentication problem nor a rate limit.
    #[error("{0}")]
    Api(ApiError),
    /// Twitter rejected the credentials used to sign the request.
    #[error("{0}")]
    Auth(ApiError),
    /// The rate limit for the requested endpoint has been reached.
    #[error("{0}")]
    RateLimit(ApiError),
    /// The response from Twitter could not be decoded. The enclosed string describes what went
    /// wrong, and the second field contains the response body, if there was one.
    #[error("Invalid response received: {0} ({1:?})")]
    InvalidResponse(&'static str, Option<String>),
    /// An endpoint path template needed a parameter that wasn't given.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    /// The logical operation name isn't in the endpoint catalog.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
    /// The HTTP method name isn't one the client knows how to send.
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),
    /// A parameter had a value type that can't be sent to Twitter, and the client was configured
    /// to reject those rather than drop them.
    #[error("Unsupported value for parameter: {0}")]
    UnsupportedParameter(String),
    /// Header information was requested before any call completed.
    #[error("This function must be called after an API call. It delivers header information.")]
    NoCallYet,
    /// A cursor was requested for an endpoint without pagination metadata.
    #[error("Unable to create a cursor for endpoint {0}")]
    NotPaginated(&'static str),
    /// A cursor stopped advancing between pages. The enclosed value is the pagination value that
    /// was seen twice.
    #[error("Cursor stopped advancing at {0}")]
    CursorStalled(String),
    /// An operation was attempted with credentials that don't support it.
    #[error("Wrong authentication mode: {0}")]
    WrongAuthMode(&'static str),
    /// The configured timeout elapsed before the request completed.
    #[error("Request timed out")]
    Timeout,
    /// The client configuration can't be used as given.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// An error was experienced while processing the network request.
    #[error("Network error: {0}")]
    NetError(#[from] hyper::Error),
    /// A request couldn't be assembled from the given parts.
    #[error("Error building request: {0}")]
    HttpError(#[from] hyper::http::Error),
    /// The TLS connector couldn't be created.
    #[error("TLS error: {0}")]
    TlsError(#[from] native_tls::Error),
    /// An error occurred while loading a JSON value.
    #[error("JSON error: {0}")]
    JSON(#[from] serde_json::Error),
    /// A URL couldn't be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    /// An error occurred while reading a file parameter.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    /// Returns the HTTP status Twitter attached to this error, if it came from Twitter.
    pub fn status_code(&self) -> Option<u16> {
        self.api_error().map(|e| e.status_code)
    }

    /// Returns the retry hint Twitter attached to a rate-limit error.
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Error::RateLimit(e) => e.retry_after.as_deref(),
            _ => None,
        }
    }

    /// Returns the Twitter-side failure details, if this error came from Twitter.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) | Error::Auth(e) | Error::RateLimit(e) => Some(e),
            _ => None,
        }
    }
}
