// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Infrastructure types related to packaging call information alongside responses from Twitter.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use hyper::{Body, Request, StatusCode};
use serde_json::Value;

use crate::error::{ApiError, Error, Result};
use crate::transport::Transport;

use super::Headers;

const X_RATE_LIMIT_LIMIT: &str = "X-Rate-Limit-Limit";
const X_RATE_LIMIT_REMAINING: &str = "X-Rate-Limit-Remaining";
const X_RATE_LIMIT_RESET: &str = "X-Rate-Limit-Reset";
const RETRY_AFTER: &str = "Retry-After";

const GENERIC_ERROR: &str = "An error occurred processing your request.";

/// Everything known about one finished exchange with Twitter.
///
/// A `CallRecord` is created for every response the client receives, successful or not, and is
/// attached to the `Response` handed back to the caller. The client also keeps a copy of the most
/// recent one, which is what `Twython::last_call_header` reads.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// The logical operation name for catalog calls, or the request URL for direct calls.
    pub api_call: String,
    /// The error message Twitter gave, if the call failed.
    pub api_error: Option<String>,
    /// The response headers.
    pub headers: Headers,
    /// The numeric HTTP status of the response.
    pub status_code: u16,
    /// The full URL that was requested.
    pub url: String,
    /// The raw response body.
    pub content: String,
}

impl CallRecord {
    /// Returns the named response header as text, if it was present and printable.
    ///
    /// Header names are matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The rate limit ceiling for the given request, if Twitter sent one.
    pub fn rate_limit(&self) -> Option<i32> {
        self.header(X_RATE_LIMIT_LIMIT).and_then(|v| v.parse().ok())
    }

    /// The number of requests left for the current 15-minute window.
    pub fn rate_limit_remaining(&self) -> Option<i32> {
        self.header(X_RATE_LIMIT_REMAINING).and_then(|v| v.parse().ok())
    }

    /// The time at which the rate window resets.
    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        self.header(X_RATE_LIMIT_RESET)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

/// A helper struct to wrap response data with the record of the call that produced it.
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// Headers, status and raw body of the exchange.
    pub record: CallRecord,
    /// The decoded response from the request.
    pub response: T,
}

impl<T> Response<T> {
    ///Convert a `Response<T>` to a `Response<U>` by running its contained response through the
    ///given function. This preserves its call record.
    ///
    ///Note that this is not a member function, so as to not conflict with potential methods on the
    ///contained `T`.
    pub fn map<F, U>(src: Response<T>, fun: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            record: src.record,
            response: fun(src.response),
        }
    }

    ///Convert a `Response<T>` into a `Response<U>` by running its contained response through the
    ///given fallible function. This preserves its call record.
    pub fn try_map<F, U>(src: Response<T>, fun: F) -> Result<Response<U>>
    where
        F: FnOnce(T) -> Result<U>,
    {
        Ok(Response {
            record: src.record,
            response: fun(src.response)?,
        })
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.response
    }
}

/// Type alias for futures that resolve to a `Response` or an `Error`.
pub type FutureResponse<T> = Pin<Box<dyn Future<Output = Result<Response<T>>> + Send + 'static>>;

/// Sends the given request, waits for the full body, and records the exchange.
///
/// Transport failures and an elapsed `timeout` come back as errors here. Failure statuses from
/// Twitter do not; those are sorted by `check_status` once the caller has stored the record.
pub(crate) async fn raw_request(
    transport: &dyn Transport,
    request: Request<Body>,
    timeout: Option<Duration>,
    api_call: String,
) -> Result<CallRecord> {
    let url = request.uri().to_string();
    tracing::debug!(method = %request.method(), %url, %api_call, "sending request");

    let exchange = async {
        let response = transport.send(request).await?;
        let (parts, body) = response.into_parts();
        let body = hyper::body::to_bytes(body).await?;
        Ok::<_, Error>((parts, body))
    };

    let (parts, body) = match timeout {
        Some(duration) => tokio::time::timeout(duration, exchange)
            .await
            .map_err(|_| Error::Timeout)??,
        None => exchange.await?,
    };

    tracing::debug!(status = parts.status.as_u16(), %url, "received response");

    Ok(CallRecord {
        api_call,
        api_error: None,
        headers: parts.headers,
        status_code: parts.status.as_u16(),
        url,
        content: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Pulls a human-readable message out of an error body.
///
/// Twitter's error bodies look like `{"errors": [{"code": 34, "message": "..."}]}`. If the first
/// entry has no message, the raw `errors` value is used; if there's no `errors` field at all, a
/// generic message is.
fn error_message(content: &str) -> String {
    let errors = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(mut body)) => body.remove("errors"),
        _ => None,
    };

    match errors {
        Some(Value::Array(list)) => match list.first() {
            Some(first) => match first.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => Value::Array(list.clone()).to_string(),
            },
            None => GENERIC_ERROR.to_string(),
        },
        Some(Value::String(message)) => message,
        Some(Value::Null) | None => GENERIC_ERROR.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Sorts a failure status into the matching error kind.
///
/// Any status above `304 Not Modified` is a failure. The message is stored back into
/// `record.api_error`.
pub(crate) fn check_status(record: &mut CallRecord) -> Result<()> {
    if record.status_code <= StatusCode::NOT_MODIFIED.as_u16() {
        return Ok(());
    }

    let message = error_message(&record.content);
    record.api_error = Some(message.clone());

    let status_code = record.status_code;
    tracing::warn!(status = status_code, url = %record.url, %message, "Twitter returned an error");

    if status_code == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        let retry_after = record
            .header(RETRY_AFTER)
            .or_else(|| record.header(X_RATE_LIMIT_RESET))
            .map(str::to_string);
        return Err(Error::RateLimit(ApiError {
            message,
            status_code,
            retry_after,
        }));
    }

    let err = ApiError {
        message,
        status_code,
        retry_after: None,
    };

    if status_code == StatusCode::UNAUTHORIZED.as_u16()
        || err.message.contains("Bad Authentication data")
    {
        Err(Error::Auth(err))
    } else {
        Err(Error::Api(err))
    }
}

/// Decodes the body of a successful call.
///
/// `204 No Content` and empty bodies decode to `Value::Null`. Any other body that isn't JSON is an
/// `InvalidResponse` error carrying the raw text.
pub(crate) fn decode_json(record: &CallRecord) -> Result<Value> {
    if record.status_code == StatusCode::NO_CONTENT.as_u16() || record.content.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&record.content).map_err(|_| {
        Error::InvalidResponse(
            "Response was not valid JSON. Unable to decode.",
            Some(record.content.clone()),
        )
    })
}
