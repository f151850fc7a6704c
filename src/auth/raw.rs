// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Internal mechanisms for the `auth` module.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac, NewMac};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request};
use rand::{self, Rng};
use sha1::Sha1;

use crate::common::*;
use crate::error::Result;

use super::{KeyPair, Token};

pub(crate) struct RequestBuilder<'a> {
    base_uri: &'a str,
    method: Method,
    params: Option<ParamList>,
    /// The query string that came with the URL, sent ahead of any query parameters added later.
    url_query: Option<&'a str>,
    query: Option<String>,
    body: Option<(Body, Cow<'static, str>)>,
    addon: OAuthAddOn,
}

impl<'a> RequestBuilder<'a> {
    /// Starts a request to the given URL. A query string already on the URL is kept on the request
    /// and included in its OAuth signature.
    pub fn new(method: Method, uri: &'a str) -> Self {
        let uri = uri.split('#').next().unwrap_or(uri);
        let (base_uri, url_query) = match uri.split_once('?') {
            Some((base, query)) if !query.is_empty() => (base, Some(query)),
            Some((base, _)) => (base, None),
            None => (uri, None),
        };
        let params = url_query.map(|query| {
            let mut params = ParamList::new();
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params.add_param_ref(key.into_owned(), value.into_owned());
            }
            params
        });

        RequestBuilder {
            base_uri,
            method,
            params,
            url_query,
            query: None,
            body: None,
            addon: OAuthAddOn::None,
        }
    }

    fn signed_params(&self, params: &ParamList) -> ParamList {
        match self.params.clone() {
            Some(mut my_params) => {
                my_params.combine(params.clone());
                my_params
            }
            None => params.clone(),
        }
    }

    pub fn with_query_params(self, params: &ParamList) -> Self {
        if params.is_empty() {
            return self;
        }
        RequestBuilder {
            query: Some(params.to_urlencoded()),
            params: Some(self.signed_params(params)),
            ..self
        }
    }

    pub fn with_body_params(self, params: &ParamList) -> Self {
        RequestBuilder {
            body: Some((
                Body::from(params.to_urlencoded()),
                Cow::Borrowed("application/x-www-form-urlencoded"),
            )),
            params: Some(self.signed_params(params)),
            ..self
        }
    }

    /// Builds a `multipart/form-data` body out of the given text parameters and files.
    ///
    /// Multipart parameters are not part of the OAuth signature.
    pub fn with_multipart(self, params: &ParamList, files: &[(String, FileParam)]) -> Self {
        let mut rng = rand::thread_rng();
        let boundary = format!(
            "twython-{}",
            std::iter::repeat(())
                .map(|()| char::from(rng.sample(rand::distributions::Alphanumeric)))
                .take(24)
                .collect::<String>()
        );

        let mut body = Vec::new();
        for (key, value) in params.encoded_pairs() {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary,
                    disposition_value(key),
                    value
                )
                .as_bytes(),
            );
        }
        for (key, file) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    boundary,
                    disposition_value(key),
                    disposition_value(&file.filename),
                    file.content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(&file.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let content = format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, boundary);
        self.with_body(body, content)
    }

    pub fn with_body_json(self, body: impl serde::Serialize) -> Result<Self> {
        let body = serde_json::to_string(&body)?;
        Ok(self.with_body(body, "application/json; charset=UTF-8"))
    }

    pub fn with_body(self, body: impl Into<Body>, content: impl Into<Cow<'static, str>>) -> Self {
        RequestBuilder {
            body: Some((body.into(), content.into())),
            ..self
        }
    }

    pub fn oauth_callback(self, callback: impl Into<String>) -> Self {
        RequestBuilder {
            addon: OAuthAddOn::Callback(callback.into()),
            ..self
        }
    }

    pub fn oauth_verifier(self, verifier: impl Into<String>) -> Self {
        RequestBuilder {
            addon: OAuthAddOn::Verifier(verifier.into()),
            ..self
        }
    }

    pub fn request_keys(
        self,
        consumer_key: &KeyPair,
        token: Option<&KeyPair>,
        headers: &Headers,
    ) -> Result<Request<Body>> {
        let oauth = OAuthParams::from_keys(consumer_key.clone(), token.cloned())
            .with_addon(self.addon.clone())
            .sign_request(self.method.clone(), self.base_uri, self.params.as_ref())?;
        self.request_authorization(Some(oauth.to_string()), headers)
    }

    pub fn request_token(self, token: &Token, headers: &Headers) -> Result<Request<Body>> {
        match token {
            Token::None => self.request_authorization(None, headers),
            Token::App(consumer) => self.request_keys(consumer, None, headers),
            Token::Access { consumer, access } => self.request_keys(consumer, Some(access), headers),
            Token::Bearer(bearer) => {
                self.request_authorization(Some(format!("Bearer {}", bearer)), headers)
            }
        }
    }

    pub fn request_consumer_bearer(
        self,
        consumer_key: &KeyPair,
        headers: &Headers,
    ) -> Result<Request<Body>> {
        self.request_authorization(Some(bearer_request(consumer_key)), headers)
    }

    fn request_authorization(
        self,
        authorization: Option<String>,
        headers: &Headers,
    ) -> Result<Request<Body>> {
        let query = match (self.url_query, self.query) {
            (Some(url_query), Some(query)) => Some(format!("{}&{}", url_query, query)),
            (Some(url_query), None) => Some(url_query.to_string()),
            (None, query) => query,
        };
        let full_url = match query {
            Some(query) => format!("{}?{}", self.base_uri, query),
            None => self.base_uri.to_string(),
        };
        let mut request = Request::builder().method(self.method).uri(full_url);

        if let Some(request_headers) = request.headers_mut() {
            request_headers.extend(headers.clone());
        }
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let request = if let Some((body, content)) = self.body {
            request
                .header(CONTENT_TYPE, &*content)
                .body(body)?
        } else {
            request.body(Body::empty())?
        };

        Ok(request)
    }
}

/// OAuth header set used to create an OAuth signature.
#[derive(Clone, Debug)]
struct OAuthParams {
    /// The consumer key that represents the app making the API request.
    consumer_key: KeyPair,
    /// The token that represents the user authorizing the request (or the access request
    /// representing a user authorizing the app).
    token: Option<KeyPair>,
    /// A random token representing the request itself. Used to de-duplicate requests on Twitter's
    /// end.
    nonce: String,
    /// A Unix timestamp for when the request was created.
    timestamp: u64,
    /// A callback or verifier parameter, if necessary.
    addon: OAuthAddOn,
}

impl OAuthParams {
    /// Creates a new `OAuthParams` header with the given keys and a fresh `timestamp` and `nonce`.
    /// The `token` is optional for app-only requests and for when you're generating a request
    /// token; otherwise it should be the request token (for when you're generating an access
    /// token) or an access token (for when you're requesting a regular API function).
    fn from_keys(consumer_key: KeyPair, token: Option<KeyPair>) -> OAuthParams {
        let timestamp = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(dur) => dur,
            Err(err) => err.duration(),
        }
        .as_secs();
        let mut rng = rand::thread_rng();
        let nonce = std::iter::repeat(())
            .map(|()| char::from(rng.sample(rand::distributions::Alphanumeric)))
            .take(32)
            .collect::<String>();
        OAuthParams {
            consumer_key,
            token,
            nonce,
            timestamp,
            addon: OAuthAddOn::None,
        }
    }

    /// Adds the given callback or verifier to this `OAuthParams` header.
    fn with_addon(self, addon: OAuthAddOn) -> OAuthParams {
        OAuthParams { addon, ..self }
    }

    /// Uses the parameters in this `OAuthParams` instance to generate a signature for the given
    /// request, returning it as a `SignedHeader`.
    fn sign_request(
        self,
        method: Method,
        uri: &str,
        params: Option<&ParamList>,
    ) -> Result<SignedHeader> {
        let query_string = {
            let sig_params = params
                .cloned()
                .unwrap_or_default()
                .add_param("oauth_consumer_key", self.consumer_key.key.clone())
                .add_param("oauth_nonce", self.nonce.clone())
                .add_param("oauth_signature_method", "HMAC-SHA1")
                .add_param("oauth_timestamp", self.timestamp.to_string())
                .add_param("oauth_version", "1.0")
                .add_opt_param("oauth_token", self.token.clone().map(|k| k.key))
                .add_opt_param("oauth_callback", self.addon.as_callback().map(|s| s.to_string()))
                .add_opt_param("oauth_verifier", self.addon.as_verifier().map(|s| s.to_string()));

            let mut query = sig_params
                .encoded_pairs()
                .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(&v)))
                .collect::<Vec<_>>();
            query.sort();

            query.join("&")
        };

        let base_str = format!(
            "{}&{}&{}",
            percent_encode(method.as_str()),
            percent_encode(uri),
            percent_encode(&query_string)
        );
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer_key.secret),
            percent_encode(self.token.as_ref().map_or("", |t| t.secret.as_ref()))
        );

        // HMAC accepts keys of any length, so this never fails in practice
        let mut digest = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|_| crate::error::Error::Config("invalid OAuth signing key".to_string()))?;
        digest.update(base_str.as_bytes());

        let mut params: BTreeMap<&'static str, Cow<'static, str>> = BTreeMap::new();
        params.insert("oauth_signature_method", "HMAC-SHA1".into());
        params.insert("oauth_version", "1.0".into());

        params.insert("oauth_consumer_key", self.consumer_key.key);
        if let Some(token) = self.token {
            params.insert("oauth_token", token.key);
        }

        params.insert("oauth_nonce", self.nonce.into());
        params.insert("oauth_timestamp", self.timestamp.to_string().into());

        match self.addon {
            OAuthAddOn::Callback(c) => {
                params.insert("oauth_callback", c.into());
            }
            OAuthAddOn::Verifier(v) => {
                params.insert("oauth_verifier", v.into());
            }
            OAuthAddOn::None => (),
        }

        params.insert(
            "oauth_signature",
            base64::encode(&digest.finalize().into_bytes()).into(),
        );

        Ok(SignedHeader { params })
    }
}

/// Represents an "addon" to an OAuth header.
#[derive(Clone, Debug)]
enum OAuthAddOn {
    /// An `oauth_callback` parameter, used when generating a request token.
    Callback(String),
    /// An `oauth_verifier` parameter, used when generating an access token.
    Verifier(String),
    /// Neither an `oauth_callback` nor an `oauth_verifier` parameter are present in this header.
    /// This is the default used when signing a regular API request.
    None,
}

impl OAuthAddOn {
    /// Returns the `oauth_callback` parameter, if present.
    fn as_callback(&self) -> Option<&str> {
        match self {
            OAuthAddOn::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the `oauth_verifier` parameter, if present.
    fn as_verifier(&self) -> Option<&str> {
        match self {
            OAuthAddOn::Verifier(v) => Some(v),
            _ => None,
        }
    }
}

/// A set of `OAuthParams` parameters combined with a request signature, ready to be attached to a
/// request.
struct SignedHeader {
    /// The OAuth parameters used to create the signature.
    params: BTreeMap<&'static str, Cow<'static, str>>,
}

/// The `Display` impl for `SignedHeader` formats it as an `Authorization` header for an HTTP
/// request.
impl fmt::Display for SignedHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // authorization scheme
        write!(f, "OAuth ")?;

        // authorization data

        let mut first = true;
        for (k, v) in &self.params {
            if first {
                first = false;
            } else {
                write!(f, ", ")?;
            }

            write!(f, "{}=\"{}\"", k, percent_encode(v))?;
        }

        Ok(())
    }
}

/// Escapes a field or file name for a quoted `Content-Disposition` parameter, percent-encoding
/// `"`, CR and LF as RFC 7578 describes.
fn disposition_value(value: &str) -> Cow<'_, str> {
    if !value.contains(&['"', '\r', '\n'][..]) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Creates a basic `Authorization` header based on the given consumer token.
///
/// The authorization created by this function can only be used with requests to generate or
/// invalidate a bearer token. Using this authorization with any other endpoint will result in an
/// invalid request.
fn bearer_request(con_token: &KeyPair) -> String {
    let text = format!("{}:{}", con_token.key, con_token.secret);
    format!("Basic {}", base64::encode(&text))
}
