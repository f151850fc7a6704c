// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Access to the Streaming API.
//!
//! A `Streamer` holds a long-lived connection open to one of Twitter's streaming endpoints and
//! hands each message to a `StreamHandler` as it arrives. Messages are newline-delimited JSON;
//! blank lines are keep-alives and are skipped.
//!
//! The connection is kept up until a handler calls `StreamControl::disconnect`. When Twitter
//! closes the stream or answers with an error status, the `Streamer` reconnects after
//! `StreamConfig::retry_in`. When the connection stalls for longer than `StreamConfig::timeout`,
//! it reconnects with an exponential backoff starting at `retry_in`, and gives up with
//! `Error::Timeout` once `StreamConfig::retry_count` reconnects have timed out in a row.
//!
//! ```rust,no_run
//! use twython::stream::{StreamConfig, StreamControl, StreamHandler, Streamer};
//! use twython::{ClientConfig, KeyPair, ParamList, Token, Twython};
//!
//! struct Printer;
//!
//! impl StreamHandler for Printer {
//!     fn on_success(&mut self, data: &serde_json::Value, _control: &StreamControl) -> bool {
//!         if let Some(text) = data.get("text").and_then(|t| t.as_str()) {
//!             println!("{}", text);
//!         }
//!         true
//!     }
//! }
//!
//! # async fn demo() -> twython::error::Result<()> {
//! let con_token = KeyPair::new("consumer key", "consumer secret");
//! let access_token = KeyPair::new("access token key", "access token secret");
//! let client = Twython::new(Token::Access { consumer: con_token, access: access_token })?;
//!
//! let streamer = Streamer::new(&client, StreamConfig::default());
//! streamer
//!     .statuses_filter(ParamList::new().add_param("track", "rustlang"), &mut Printer)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::HttpBody;
use hyper::{Body, Method, Request, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::raw::RequestBuilder;
use crate::client::Twython;
use crate::common::{normalize, Headers, ParamList};
use crate::error::{Error, Result};
use crate::links;

/// The longest a `Streamer` will wait between reconnects after timeouts.
const MAX_BACKOFF: Duration = Duration::from_secs(320);

/// Message given to `StreamHandler::on_error` for lines that aren't JSON.
const UNDECODABLE_LINE: &[u8] = b"Unable to decode response, not valid JSON.";

/// Connection settings for a `Streamer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// How long to wait for the connection, or for the next chunk of data on it, before treating
    /// it as stalled. Defaults to 300 seconds.
    pub timeout: Duration,
    /// How many times in a row to reconnect after a timeout before giving up. `None`, the
    /// default, keeps trying forever.
    pub retry_count: Option<u32>,
    /// How long to wait before reconnecting. Defaults to 10 seconds.
    pub retry_in: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            timeout: Duration::from_secs(300),
            retry_count: None,
            retry_in: Duration::from_secs(10),
        }
    }
}

impl StreamConfig {
    /// Sets the stall timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        StreamConfig { timeout, ..self }
    }

    /// Sets how many consecutive timeouts are retried.
    pub fn retry_count(self, retry_count: u32) -> Self {
        StreamConfig {
            retry_count: Some(retry_count),
            ..self
        }
    }

    /// Sets the reconnect delay.
    pub fn retry_in(self, retry_in: Duration) -> Self {
        StreamConfig { retry_in, ..self }
    }

    /// The delay before the given consecutive reconnect after a timeout, counting from 1.
    fn timeout_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_in
            .checked_mul(factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

const IDLE: u8 = 0;
const CONNECTED: u8 = 1;
const STOPPED: u8 = 2;

/// Handle for stopping a running stream.
///
/// Every `StreamHandler` callback receives one, and `Streamer::control` hands out clones for use
/// from other tasks. Stopping is final: a `disconnect` made before the stream starts keeps it from
/// starting at all, and a stopped `Streamer` won't stream again.
#[derive(Debug, Clone)]
pub struct StreamControl {
    state: Arc<AtomicU8>,
}

impl StreamControl {
    fn new() -> StreamControl {
        StreamControl {
            state: Arc::new(AtomicU8::new(IDLE)),
        }
    }

    /// Marks the stream as running, unless it was already stopped.
    fn connect(&self) -> bool {
        match self
            .state
            .compare_exchange(IDLE, CONNECTED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(state) => state == CONNECTED,
        }
    }

    /// Stops the stream. The `Streamer` returns once the current message has been handled.
    pub fn disconnect(&self) {
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    /// Returns whether the stream is running and hasn't been told to stop.
    pub fn is_connected(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CONNECTED
    }
}

/// Callbacks for the messages and failures of a stream.
///
/// Only `on_success` is required. The other methods log and carry on by default.
pub trait StreamHandler {
    /// Called with each message received. Return `true` to also pass the message to the
    /// matching `on_delete`/`on_limit`/`on_disconnect`/`on_warning` method.
    fn on_success(&mut self, data: &Value, control: &StreamControl) -> bool;

    /// Called with the `delete` field of status deletion notices.
    fn on_delete(&mut self, _data: &Value, _control: &StreamControl) {}

    /// Called with the `limit` field of notices that messages were held back by the rate limit.
    fn on_limit(&mut self, _data: &Value, _control: &StreamControl) {}

    /// Called with the `disconnect` field Twitter sends before closing the stream.
    fn on_disconnect(&mut self, _data: &Value, _control: &StreamControl) {}

    /// Called with the `warning` field of stall warnings.
    fn on_warning(&mut self, _data: &Value, _control: &StreamControl) {}

    /// Called when Twitter answers with an error status, or sends a line that isn't JSON.
    fn on_error(
        &mut self,
        status: StatusCode,
        body: &[u8],
        _headers: &Headers,
        _control: &StreamControl,
    ) {
        warn!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(body),
            "stream error"
        );
    }

    /// Called when the connection stalls past the configured timeout.
    fn on_timeout(&mut self, _control: &StreamControl) {
        warn!("stream timed out");
    }
}

/// A client for Twitter's streaming endpoints.
///
/// A `Streamer` shares its credentials, headers and transport with the `Twython` client it was
/// created from.
#[derive(Debug, Clone)]
pub struct Streamer {
    client: Twython,
    config: StreamConfig,
    control: StreamControl,
}

impl Streamer {
    /// Creates a `Streamer` with the credentials and transport of the given client.
    pub fn new(client: &Twython, config: StreamConfig) -> Streamer {
        Streamer {
            client: client.clone(),
            config,
            control: StreamControl::new(),
        }
    }

    /// Returns the connection settings of this `Streamer`.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns a handle that can stop this `Streamer` from elsewhere.
    pub fn control(&self) -> StreamControl {
        self.control.clone()
    }

    /// Stops the running stream, or keeps the next one from starting.
    pub fn disconnect(&self) {
        self.control.disconnect();
    }

    /// Streams public statuses that match the given `track`, `follow` or `locations` filters.
    pub async fn statuses_filter<H: StreamHandler>(
        &self,
        params: ParamList,
        handler: &mut H,
    ) -> Result<()> {
        let url = self.stream_url(links::stream::STREAM_HOST, links::stream::FILTER);
        self.stream(&url, Method::POST, params, handler).await
    }

    /// Streams a small random sample of all public statuses.
    pub async fn statuses_sample<H: StreamHandler>(
        &self,
        params: ParamList,
        handler: &mut H,
    ) -> Result<()> {
        let url = self.stream_url(links::stream::STREAM_HOST, links::stream::SAMPLE);
        self.stream(&url, Method::GET, params, handler).await
    }

    /// Streams all public statuses. Requires special access from Twitter.
    pub async fn statuses_firehose<H: StreamHandler>(
        &self,
        params: ParamList,
        handler: &mut H,
    ) -> Result<()> {
        let url = self.stream_url(links::stream::STREAM_HOST, links::stream::FIREHOSE);
        self.stream(&url, Method::GET, params, handler).await
    }

    /// Streams messages for the authenticated user.
    pub async fn user<H: StreamHandler>(&self, params: ParamList, handler: &mut H) -> Result<()> {
        let url = self.stream_url(links::stream::USER_HOST, links::stream::USER);
        self.stream(&url, Method::GET, params, handler).await
    }

    /// Streams messages for a set of users, given in the `follow` parameter.
    pub async fn site<H: StreamHandler>(&self, params: ParamList, handler: &mut H) -> Result<()> {
        let url = self.stream_url(links::stream::SITE_HOST, links::stream::SITE);
        self.stream(&url, Method::GET, params, handler).await
    }

    /// Streams from the given URL, reconnecting as needed until a handler disconnects.
    ///
    /// GET parameters are sent in the query string, and anything else sends them as a form body.
    /// The `Streamer` is stopped once this returns, whether or not it ended in an error.
    pub async fn stream<H: StreamHandler>(
        &self,
        url: &str,
        method: Method,
        params: ParamList,
        handler: &mut H,
    ) -> Result<()> {
        if !self.control.connect() {
            debug!(url, "stream was stopped before it started");
            return Ok(());
        }
        info!(url, "opening stream");

        let result = self.run(url, &method, params, handler).await;
        self.control.disconnect();
        result
    }

    async fn run<H: StreamHandler>(
        &self,
        url: &str,
        method: &Method,
        params: ParamList,
        handler: &mut H,
    ) -> Result<()> {
        let control = &self.control;
        let (params, _) = normalize(params);
        let mut timeouts = 0u32;

        while control.is_connected() {
            let request = self.build_request(url, method, &params)?;
            let response =
                match tokio::time::timeout(self.config.timeout, self.client.transport().send(request))
                    .await
                {
                    Ok(response) => response?,
                    Err(_) => {
                        timeouts += 1;
                        self.after_timeout(timeouts, handler).await?;
                        continue;
                    }
                };

            let (parts, mut body) = response.into_parts();

            if parts.status != StatusCode::OK {
                let content = hyper::body::to_bytes(body).await?;
                handler.on_error(parts.status, &content, &parts.headers, control);
                if control.is_connected() {
                    warn!(status = parts.status.as_u16(), "stream refused, reconnecting");
                    tokio::time::sleep(self.config.retry_in).await;
                }
                continue;
            }

            timeouts = 0;
            debug!(url, "stream connected");

            let mut buf = Vec::new();
            while control.is_connected() {
                let chunk = match tokio::time::timeout(self.config.timeout, body.data()).await {
                    Ok(Some(chunk)) => chunk?,
                    Ok(None) => {
                        if !buf.is_empty() && control.is_connected() {
                            let line = std::mem::take(&mut buf);
                            handle_line(&line, parts.status, &parts.headers, handler, control);
                        }
                        info!(url, "stream closed by remote");
                        break;
                    }
                    Err(_) => {
                        timeouts += 1;
                        self.after_timeout(timeouts, handler).await?;
                        break;
                    }
                };

                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    if !control.is_connected() {
                        break;
                    }
                    let line = buf.drain(..=pos).collect::<Vec<u8>>();
                    handle_line(&line, parts.status, &parts.headers, handler, control);
                }
            }
        }

        info!(url, "stream disconnected");
        Ok(())
    }

    fn stream_url(&self, host: &str, path: &str) -> String {
        format!("{}/{}/{}", host, self.client.config().api_version, path)
    }

    fn build_request(&self, url: &str, method: &Method, params: &ParamList) -> Result<Request<Body>> {
        let request = RequestBuilder::new(method.clone(), url);
        let request = if *method == Method::GET {
            request.with_query_params(params)
        } else {
            request.with_body_params(params)
        };
        request.request_token(&self.client.config().token, self.client.headers())
    }

    /// Reports a timeout to the handler, then waits out the backoff for the given attempt.
    async fn after_timeout<H: StreamHandler>(&self, attempt: u32, handler: &mut H) -> Result<()> {
        handler.on_timeout(&self.control);

        if let Some(max) = self.config.retry_count {
            if attempt > max {
                warn!(attempts = attempt, "stream timed out too many times, giving up");
                self.control.disconnect();
                return Err(Error::Timeout);
            }
        }

        if self.control.is_connected() {
            let delay = self.config.timeout_backoff(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "stream timed out, reconnecting");
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }
}

fn handle_line<H: StreamHandler>(
    line: &[u8],
    status: StatusCode,
    headers: &Headers,
    handler: &mut H,
    control: &StreamControl,
) {
    let line = match line.iter().rposition(|b| !b.is_ascii_whitespace()) {
        Some(end) => &line[..=end],
        None => return,
    };

    let data = match serde_json::from_slice::<Value>(line) {
        Ok(data) => data,
        Err(_) => {
            handler.on_error(status, UNDECODABLE_LINE, headers, control);
            return;
        }
    };

    if handler.on_success(&data, control) {
        if let Some(delete) = data.get("delete") {
            handler.on_delete(delete, control);
        } else if let Some(limit) = data.get("limit") {
            handler.on_limit(limit, control);
        } else if let Some(disconnect) = data.get("disconnect") {
            handler.on_disconnect(disconnect, control);
        } else if let Some(warning) = data.get("warning") {
            handler.on_warning(warning, control);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{KeyPair, Token};
    use crate::common::tests::{canned, StubTransport};
    use crate::config::ClientConfig;
    use crate::transport::{Transport, TransportFuture};

    #[derive(Default)]
    struct Collector {
        messages: Vec<Value>,
        deletes: Vec<Value>,
        limits: Vec<Value>,
        errors: Vec<(u16, String)>,
        timeouts: u32,
        stop_on: Option<&'static str>,
        stop_on_timeout: bool,
    }

    impl StreamHandler for Collector {
        fn on_success(&mut self, data: &Value, control: &StreamControl) -> bool {
            self.messages.push(data.clone());
            if self.stop_on.is_some() && data["text"].as_str() == self.stop_on {
                control.disconnect();
            }
            true
        }

        fn on_delete(&mut self, data: &Value, _control: &StreamControl) {
            self.deletes.push(data.clone());
        }

        fn on_limit(&mut self, data: &Value, _control: &StreamControl) {
            self.limits.push(data.clone());
        }

        fn on_error(&mut self, status: StatusCode, body: &[u8], _: &Headers, _: &StreamControl) {
            self.errors
                .push((status.as_u16(), String::from_utf8_lossy(body).into_owned()));
        }

        fn on_timeout(&mut self, control: &StreamControl) {
            self.timeouts += 1;
            if self.stop_on_timeout {
                control.disconnect();
            }
        }
    }

    fn client(transport: Arc<dyn Transport>) -> Twython {
        let token = Token::Access {
            consumer: KeyPair::new("ck", "cs"),
            access: KeyPair::new("ak", "as"),
        };
        Twython::with_transport(ClientConfig::new().credentials(token), transport).unwrap()
    }

    fn quick() -> StreamConfig {
        StreamConfig::default()
            .timeout(Duration::from_millis(50))
            .retry_in(Duration::from_millis(5))
    }

    struct HangingTransport;

    impl Transport for HangingTransport {
        fn send(&self, _request: Request<Body>) -> TransportFuture {
            Box::pin(futures::future::pending::<Result<hyper::Response<Body>>>())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _request: Request<Body>) -> TransportFuture {
            Box::pin(futures::future::ready::<Result<hyper::Response<Body>>>(Err(
                Error::Config("no network".to_string()),
            )))
        }
    }

    #[tokio::test]
    async fn dispatches_lines() {
        let body = "{\"text\":\"one\"}\r\n\r\n\
                    {\"delete\":{\"status\":{\"id\":1,\"user_id\":2}}}\r\n\
                    {\"limit\":{\"track\":12}}\n\
                    not json\r\n\
                    {\"text\":\"last\"}\r\n\
                    {\"text\":\"unread\"}\r\n";
        let stub = StubTransport::new(vec![canned(200, body)]);
        let streamer = Streamer::new(&client(stub.clone()), quick());

        let mut handler = Collector {
            stop_on: Some("last"),
            ..Collector::default()
        };
        streamer
            .statuses_filter(ParamList::new().add_param("track", "rust"), &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.messages.len(), 4);
        assert_eq!(handler.messages[0]["text"], "one");
        assert_eq!(handler.deletes, vec![serde_json::json!({"status": {"id": 1, "user_id": 2}})]);
        assert_eq!(handler.limits, vec![serde_json::json!({"track": 12})]);
        assert_eq!(
            handler.errors,
            vec![(200, "Unable to decode response, not valid JSON.".to_string())]
        );
        assert!(!streamer.control().is_connected());

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].uri, "https://stream.twitter.com/1.1/statuses/filter.json");
        assert_eq!(requests[0].body_str(), "track=rust");
        assert!(requests[0].headers.contains_key(hyper::header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn sample_sends_query() {
        let stub = StubTransport::new(vec![canned(200, "{\"text\":\"bye\"}\n")]);
        let streamer = Streamer::new(&client(stub.clone()), quick());
        let mut handler = Collector {
            stop_on: Some("bye"),
            ..Collector::default()
        };

        streamer
            .statuses_sample(ParamList::new().add_param("stall_warnings", true), &mut handler)
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(
            requests[0].uri,
            "https://stream.twitter.com/1.1/statuses/sample.json?stall_warnings=true"
        );
    }

    #[tokio::test]
    async fn reconnects_after_error_status() {
        let stub = StubTransport::new(vec![
            canned(420, "Enhance Your Calm"),
            canned(200, "{\"text\":\"hello\"}\r\n"),
        ]);
        let streamer = Streamer::new(&client(stub.clone()), quick());
        let mut handler = Collector {
            stop_on: Some("hello"),
            ..Collector::default()
        };

        streamer
            .user(ParamList::new(), &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.errors, vec![(420, "Enhance Your Calm".to_string())]);
        assert_eq!(handler.messages.len(), 1);
        assert_eq!(stub.requests().len(), 2);
        assert_eq!(
            stub.requests()[0].uri,
            "https://userstream.twitter.com/1.1/user.json"
        );
    }

    #[tokio::test]
    async fn reconnects_after_remote_close() {
        let stub = StubTransport::new(vec![
            canned(200, "{\"text\":\"first\"}\r\n"),
            canned(200, "{\"text\":\"second\"}"),
        ]);
        let streamer = Streamer::new(&client(stub.clone()), quick());
        let mut handler = Collector {
            stop_on: Some("second"),
            ..Collector::default()
        };

        streamer
            .statuses_firehose(ParamList::new(), &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.messages.len(), 2);
        assert_eq!(stub.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_count() {
        let streamer = Streamer::new(
            &client(Arc::new(HangingTransport)),
            StreamConfig::default().retry_count(2),
        );
        let mut handler = Collector::default();
        let start = tokio::time::Instant::now();

        let err = streamer
            .site(ParamList::new().add_param("follow", 12u64), &mut handler)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout));
        assert_eq!(handler.timeouts, 3);
        assert!(!streamer.control().is_connected());

        // three 300s timeouts, with 10s and then 20s of backoff between them
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(930), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(931), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_can_stop_on_timeout() {
        let streamer = Streamer::new(&client(Arc::new(HangingTransport)), StreamConfig::default());
        let mut handler = Collector {
            stop_on_timeout: true,
            ..Collector::default()
        };
        let start = tokio::time::Instant::now();

        streamer
            .statuses_sample(ParamList::new(), &mut handler)
            .await
            .unwrap();

        assert_eq!(handler.timeouts, 1);
        assert!(start.elapsed() < Duration::from_secs(301));
    }

    #[tokio::test]
    async fn disconnect_before_start() {
        let stub = StubTransport::new(vec![]);
        let streamer = Streamer::new(&client(stub.clone()), quick());
        let control = streamer.control();
        assert!(!control.is_connected());

        control.disconnect();
        streamer
            .statuses_sample(ParamList::new(), &mut Collector::default())
            .await
            .unwrap();

        assert!(stub.requests().is_empty());
        assert!(!control.is_connected());
    }

    #[tokio::test]
    async fn transport_error_stops_the_streamer() {
        let streamer = Streamer::new(&client(Arc::new(FailingTransport)), quick());

        let err = streamer
            .statuses_sample(ParamList::new(), &mut Collector::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(!streamer.control().is_connected());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = StreamConfig::default();
        assert_eq!(config.timeout_backoff(1), Duration::from_secs(10));
        assert_eq!(config.timeout_backoff(2), Duration::from_secs(20));
        assert_eq!(config.timeout_backoff(4), Duration::from_secs(80));
        assert_eq!(config.timeout_backoff(6), MAX_BACKOFF);
        assert_eq!(config.timeout_backoff(40), MAX_BACKOFF);
    }
}
