// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `Twython` client and its request dispatcher.
//!
//! There are two ways to call Twitter with a `Twython` client:
//!
//! * By logical operation, with `call`: pick an `Endpoint` from the catalog and hand over its
//!   parameters. The catalog knows the path and HTTP method.
//! * Directly, with `get`, `post`, `delete` and `request`: name the path relative to the API root
//!   (like `statuses/home_timeline`) or give a complete URL, and pick the method yourself.
//!
//! Either way, parameters go through `normalize`, are sent as a query string for GET and DELETE
//! and as a form or multipart body otherwise, and the response is sorted into success or one of
//! the error kinds in `error`. Every response that comes back, success or failure, is described
//! by a `CallRecord`. Successful calls return theirs inside the `Response`, and the client also
//! keeps the latest one for `last_call_header`.
//!
//! ```rust,no_run
//! # async fn demo() -> twython::error::Result<()> {
//! use twython::{Endpoint, ParamList, Token, Twython};
//!
//! let client = Twython::new(Token::Bearer("bearer token".to_string()))?;
//! let tweets = client
//!     .call(Endpoint::Search, ParamList::new().add_param("q", "rustlang"))
//!     .await?;
//!
//! for status in tweets["statuses"].as_array().into_iter().flatten() {
//!     println!("{}", status["text"]);
//! }
//! println!("{:?} calls left", tweets.record.rate_limit_remaining());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use hyper::{Body, Method, Request};
use serde_json::Value;

use crate::auth::raw::RequestBuilder;
use crate::auth::Token;
use crate::common::*;
use crate::config::ClientConfig;
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{HyperTransport, Transport};

/// A client for the Twitter REST API.
///
/// Cloning a `Twython` is cheap: clones share the same configuration, connection pool, and
/// last-call slot.
///
/// # Concurrent use
///
/// All methods take `&self`, and a single client can serve any number of calls at once. The
/// last-call slot read by `last_call_header` always holds the record of whichever call *finished*
/// most recently, which with concurrent calls is not necessarily the one you just awaited. Read
/// `Response::record` when you need the headers of a specific call.
#[derive(Clone)]
pub struct Twython {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    headers: Headers,
    transport: Arc<dyn Transport>,
    last_call: Mutex<Option<CallRecord>>,
}

impl std::fmt::Debug for Twython {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Twython")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Twython {
    /// Creates a client with the given credentials and the default configuration.
    pub fn new(token: Token) -> Result<Twython> {
        Twython::with_config(ClientConfig::new().credentials(token))
    }

    /// Creates a client with the given configuration and the default `HyperTransport`.
    pub fn with_config(config: ClientConfig) -> Result<Twython> {
        let transport = HyperTransport::new(&config)?;
        Twython::with_transport(config, Arc::new(transport))
    }

    /// Creates a client that sends its requests through the given `Transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Twython> {
        let headers = config.request_headers()?;
        Ok(Twython {
            inner: Arc::new(ClientInner {
                config,
                headers,
                transport,
                last_call: Mutex::new(None),
            }),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Calls the given catalog operation.
    ///
    /// Placeholders in the operation's path are filled from `params` and removed from them; the
    /// rest are sent with the request.
    pub async fn call(&self, endpoint: Endpoint, mut params: ParamList) -> Result<Response<Value>> {
        let desc = endpoint.descriptor();
        let path = desc.resolve_path(&mut params)?;
        let url = self.endpoint_url(&path, None);
        self.dispatch(url, desc.method.as_method(), params, desc.name.to_string())
            .await
    }

    /// Calls the catalog operation with the given logical name, taking its parameters from a JSON
    /// object.
    ///
    /// Parameter values JSON can express but Twitter can't accept are handled according to the
    /// client's `ParamPolicy`.
    pub async fn call_json(&self, name: &str, params: &Value) -> Result<Response<Value>> {
        let endpoint = name.parse::<Endpoint>()?;
        let params = ParamList::from_json(params, self.config().param_policy)?;
        self.call(endpoint, params).await
    }

    /// Sends a GET request to the given endpoint.
    ///
    /// `endpoint` is either a path relative to the API root, like `statuses/home_timeline`, or a
    /// complete URL. `version` overrides the configured API version for relative paths.
    pub async fn get(
        &self,
        endpoint: &str,
        params: ParamList,
        version: Option<&str>,
    ) -> Result<Response<Value>> {
        self.request(endpoint, "GET", params, version).await
    }

    /// Sends a POST request to the given endpoint. See `get` for how `endpoint` is resolved.
    pub async fn post(
        &self,
        endpoint: &str,
        params: ParamList,
        version: Option<&str>,
    ) -> Result<Response<Value>> {
        self.request(endpoint, "POST", params, version).await
    }

    /// Sends a DELETE request to the given endpoint. See `get` for how `endpoint` is resolved.
    pub async fn delete(
        &self,
        endpoint: &str,
        params: ParamList,
        version: Option<&str>,
    ) -> Result<Response<Value>> {
        self.request(endpoint, "DELETE", params, version).await
    }

    /// Sends a request with the given method to the given endpoint.
    ///
    /// The method name is matched case-insensitively against GET, POST, DELETE and PUT; anything
    /// else fails with `Error::InvalidMethod` without sending anything.
    pub async fn request(
        &self,
        endpoint: &str,
        method: &str,
        params: ParamList,
        version: Option<&str>,
    ) -> Result<Response<Value>> {
        let method = parse_method(method)?;
        let url = self.endpoint_url(endpoint, version);
        self.dispatch(url.clone(), method, params, url).await
    }

    /// Sends a POST request with the given value serialized as a JSON body.
    ///
    /// The body is sent as-is, without going through `normalize`, and is not part of the OAuth
    /// signature.
    pub async fn post_json<B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        version: Option<&str>,
    ) -> Result<Response<Value>> {
        let url = self.endpoint_url(endpoint, version);
        let request = RequestBuilder::new(Method::POST, &url)
            .with_body_json(body)?
            .request_token(&self.config().token, self.headers())?;
        let record = self.execute(request, url.clone()).await?;
        let response = decode_json(&record)?;
        Ok(Response { record, response })
    }

    /// Returns the named header from the most recent response the client received.
    ///
    /// Fails with `Error::NoCallYet` before any response has been received. Header names are
    /// matched case-insensitively.
    pub fn last_call_header(&self, name: &str) -> Result<Option<String>> {
        let slot = self
            .inner
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(record) => Ok(record.header(name).map(str::to_string)),
            None => Err(Error::NoCallYet),
        }
    }

    /// Returns the record of the most recent response the client received, if any.
    pub fn last_call(&self) -> Option<CallRecord> {
        self.inner
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Builds the full URL for the given endpoint, without sending anything.
    pub fn endpoint_url(&self, endpoint: &str, version: Option<&str>) -> String {
        if endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with("http://") {
            tracing::warn!(url = %endpoint, "using a plain-HTTP URL; Twitter only serves the API over TLS");
            endpoint.to_string()
        } else {
            let version = version.unwrap_or(&self.config().api_version);
            format!(
                "{}/{}/{}.json",
                self.config().base_url,
                version,
                endpoint.trim_start_matches('/')
            )
        }
    }

    async fn dispatch(
        &self,
        url: String,
        method: Method,
        params: ParamList,
        api_call: String,
    ) -> Result<Response<Value>> {
        let (params, files) = normalize(params);

        let mut request = RequestBuilder::new(method.clone(), &url);
        request = if method == Method::GET || method == Method::DELETE {
            request.with_query_params(&params)
        } else if !files.is_empty() {
            request.with_multipart(&params, &files)
        } else {
            request.with_body_params(&params)
        };
        let request = request.request_token(&self.config().token, self.headers())?;

        let record = self.execute(request, api_call).await?;
        let response = decode_json(&record)?;
        Ok(Response { record, response })
    }

    /// Sends a finished request, records the response in the last-call slot, and sorts failure
    /// statuses into errors.
    pub(crate) async fn execute(&self, request: Request<Body>, api_call: String) -> Result<CallRecord> {
        let mut record = raw_request(
            self.transport().as_ref(),
            request,
            self.config().timeout,
            api_call,
        )
        .await?;
        let status = check_status(&mut record);
        self.store(record.clone());
        status.map(|()| record)
    }

    fn store(&self, record: CallRecord) {
        let mut slot = self
            .inner
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(record);
    }
}

/// Builds `url?key=value&...` from the given parameters, encoded the same way a GET request would
/// encode them. Files are left out.
pub fn construct_api_url(url: &str, params: ParamList) -> String {
    let (params, _) = normalize(params);
    if params.is_empty() {
        url.to_string()
    } else {
        format!("{}?{}", url, params.to_urlencoded())
    }
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "DELETE" => Ok(Method::DELETE),
        "PUT" => Ok(Method::PUT),
        _ => Err(Error::InvalidMethod(method.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::KeyPair;
    use crate::common::tests::{canned, StubTransport};
    use hyper::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

    fn client(stub: &Arc<StubTransport>) -> Twython {
        let config = ClientConfig::new().credentials(Token::Access {
            consumer: KeyPair::new("ckey", "csecret"),
            access: KeyPair::new("akey", "asecret"),
        });
        Twython::with_transport(config, stub.clone()).unwrap()
    }

    #[tokio::test]
    async fn get_with_params() {
        let stub = StubTransport::new(vec![canned(200, r#"[{"id":1}]"#)
            .header("x-rate-limit-remaining", "14")]);
        let client = client(&stub);

        let params = ParamList::new()
            .add_param("screen_name", "rustlang")
            .add_param("include_rts", false)
            .add_param("count", 5);
        let resp = client
            .get("statuses/user_timeline", params, None)
            .await
            .unwrap();

        assert_eq!(resp[0]["id"], 1);
        assert_eq!(resp.record.rate_limit_remaining(), Some(14));
        assert_eq!(resp.record.api_call, "https://api.twitter.com/1.1/statuses/user_timeline.json");

        let requests = stub.requests();
        assert_eq!(requests[0].method, Method::GET);
        let mut query = requests[0].query();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("count".to_string(), "5".to_string()),
                ("include_rts".to_string(), "false".to_string()),
                ("screen_name".to_string(), "rustlang".to_string()),
            ]
        );
        assert!(requests[0].body.is_empty());
        assert!(requests[0].headers[AUTHORIZATION]
            .to_str()
            .unwrap()
            .starts_with("OAuth "));
        assert!(requests[0].headers[USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("Twython-rs v"));
    }

    #[tokio::test]
    async fn post_sends_form_body() {
        let stub = StubTransport::new(vec![canned(200, r#"{"id":2}"#)]);
        let client = client(&stub);

        client
            .post(
                "statuses/update",
                ParamList::new().add_param("status", "hello world!"),
                None,
            )
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].uri, "https://api.twitter.com/1.1/statuses/update.json");
        assert_eq!(requests[0].body_str(), "status=hello%20world%21");
        assert_eq!(
            requests[0].headers[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
    }

    #[tokio::test]
    async fn files_force_multipart() {
        let stub = StubTransport::new(vec![canned(200, r#"{"media_id_string":"7"}"#)]);
        let client = client(&stub);

        let params = ParamList::new()
            .add_param("media_category", "tweet_image")
            .add_param("media", FileParam::new("cat.png", b"\x89PNG".to_vec()));
        client.call(Endpoint::UploadMedia, params).await.unwrap();

        let requests = stub.requests();
        assert_eq!(requests[0].uri, "https://upload.twitter.com/1.1/media/upload.json");
        let content = requests[0].headers[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content.starts_with("multipart/form-data; boundary="));
        let body = requests[0].body_str();
        assert!(body.contains("name=\"media_category\"\r\n\r\ntweet_image\r\n"));
        assert!(body.contains("name=\"media\"; filename=\"cat.png\""));
    }

    #[tokio::test]
    async fn absolute_urls_are_verbatim() {
        let stub = StubTransport::new(vec![canned(200, "{}"), canned(200, "{}")]);
        let client = client(&stub);

        client
            .get("https://api.twitter.com/2/tweets", ParamList::new(), Some("1.1"))
            .await
            .unwrap();
        client
            .get("help/tos", ParamList::new(), Some("2"))
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests[0].uri, "https://api.twitter.com/2/tweets");
        assert_eq!(requests[1].uri, "https://api.twitter.com/2/help/tos.json");
    }

    #[tokio::test]
    async fn catalog_call_fills_placeholders() {
        let stub = StubTransport::new(vec![canned(200, r#"{"id_str":"210462857140252672"}"#)]);
        let client = client(&stub);

        let resp = client
            .call(
                Endpoint::ShowStatus,
                ParamList::new()
                    .add_param("id", 210462857140252672u64)
                    .add_param("trim_user", true),
            )
            .await
            .unwrap();

        assert_eq!(resp["id_str"], "210462857140252672");
        assert_eq!(resp.record.api_call, "show_status");
        let requests = stub.requests();
        assert_eq!(
            requests[0].uri,
            "https://api.twitter.com/1.1/statuses/show/210462857140252672.json?trim_user=true"
        );
    }

    #[tokio::test]
    async fn missing_placeholder_sends_nothing() {
        let stub = StubTransport::new(vec![]);
        let client = client(&stub);

        let err = client
            .call(Endpoint::DestroyStatus, ParamList::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref name) if name == "id"));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn call_by_name_from_json() {
        let stub = StubTransport::new(vec![canned(200, "[]")]);
        let client = client(&stub);

        client
            .call_json(
                "get_home_timeline",
                &serde_json::json!({"count": 10, "exclude_replies": true, "bogus": null}),
            )
            .await
            .unwrap();

        let mut query = stub.requests()[0].query();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("count".to_string(), "10".to_string()),
                ("exclude_replies".to_string(), "true".to_string()),
            ]
        );

        let err = client.call_json("no_such_call", &Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEndpoint(_)));
    }

    #[tokio::test]
    async fn invalid_method() {
        let stub = StubTransport::new(vec![]);
        let client = client(&stub);

        let err = client
            .request("help/tos", "PATCH", ParamList::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn method_names_are_case_insensitive() {
        let stub = StubTransport::new(vec![canned(204, "")]);
        let client = client(&stub);

        let resp = client
            .request("saved_searches/destroy/1", "delete", ParamList::new(), None)
            .await
            .unwrap();
        assert_eq!(resp.response, Value::Null);
        assert_eq!(stub.requests()[0].method, Method::DELETE);
    }

    #[tokio::test]
    async fn last_call_header_tracks_latest_call() {
        let stub = StubTransport::new(vec![
            canned(200, "{}").header("x-rate-limit-remaining", "10"),
            canned(404, r#"{"errors":[{"code":34,"message":"Sorry, that page does not exist."}]}"#)
                .header("x-rate-limit-remaining", "9"),
        ]);
        let client = client(&stub);

        assert!(matches!(
            client.last_call_header("x-rate-limit-remaining"),
            Err(Error::NoCallYet)
        ));

        client.get("help/tos", ParamList::new(), None).await.unwrap();
        assert_eq!(
            client.last_call_header("X-Rate-Limit-Remaining").unwrap().as_deref(),
            Some("10")
        );

        let err = client
            .get("statuses/show/1", ParamList::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(
            client.last_call_header("x-rate-limit-remaining").unwrap().as_deref(),
            Some("9")
        );
        assert_eq!(client.last_call_header("x-nope").unwrap(), None);

        let last = client.last_call().unwrap();
        assert_eq!(last.status_code, 404);
        assert_eq!(last.api_error.as_deref(), Some("Sorry, that page does not exist."));
    }

    #[tokio::test]
    async fn rate_limit_error() {
        let stub = StubTransport::new(vec![canned(
            429,
            r#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#,
        )
        .header("retry-after", "60")]);
        let client = client(&stub);

        let err = client
            .get("search/tweets", ParamList::new().add_param("q", "x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimit(_)));
        assert_eq!(err.retry_after(), Some("60"));
    }

    #[tokio::test]
    async fn malformed_success_body() {
        let stub = StubTransport::new(vec![canned(200, "<html>")]);
        let client = client(&stub);

        let err = client.get("help/tos", ParamList::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_, _)));
        assert_eq!(client.last_call().unwrap().content, "<html>");
    }

    #[tokio::test]
    async fn post_json_body() {
        let stub = StubTransport::new(vec![canned(200, "{}")]);
        let client = client(&stub);

        let body = serde_json::json!({"media_id": "1", "alt_text": {"text": "a cat"}});
        client
            .post_json("https://upload.twitter.com/1.1/media/metadata/create.json", &body, None)
            .await
            .unwrap();

        let requests = stub.requests();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent, body);
        assert!(requests[0].headers[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
    }

    #[tokio::test]
    async fn unauthenticated_client() {
        let stub = StubTransport::new(vec![canned(200, "{}")]);
        let client = Twython::with_transport(ClientConfig::new(), stub.clone()).unwrap();

        client.get("help/tos", ParamList::new(), None).await.unwrap();
        assert!(stub.requests()[0].headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn construct_url() {
        let url = construct_api_url(
            "https://api.twitter.com/1.1/search/tweets.json",
            ParamList::new()
                .add_param("q", "#twitter")
                .add_param("result_type", "recent")
                .add_param("include_entities", true),
        );
        assert_eq!(
            url,
            "https://api.twitter.com/1.1/search/tweets.json?include_entities=true&q=%23twitter&result_type=recent"
        );
        assert_eq!(construct_api_url("https://x.test/a", ParamList::new()), "https://x.test/a");
    }
}
