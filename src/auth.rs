// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Types and functions to authenticate with Twitter.
//!
//! Twitter accepts three kinds of credentials, and a `Twython` client signs its requests with
//! whichever kind its `Token` holds:
//!
//! * **User authentication** (`Token::Access`): an app's consumer key pair plus an access key pair
//!   for the user that authorized it. Requests are signed with OAuth 1.0a.
//! * **App-only OAuth 1** (`Token::App`): just the consumer key pair. This is what you use to start
//!   the "sign in with Twitter" flow below.
//! * **Bearer tokens** (`Token::Bearer`): an OAuth 2 token representing the app itself, obtained
//!   with `obtain_access_token`. These give access to the public parts of the API with
//!   app-level rate limits.
//!
//! A `Token::None` client sends requests without an `Authorization` header at all.
//!
//! # The OAuth 1 PIN/callback flow
//!
//! 1. With a client holding `Token::App`, call `get_authentication_tokens`. Send the user to the
//!    `auth_url` in the result, and keep the request token it carries.
//! 2. Twitter sends the user back to your callback URL (or shows them a PIN) along with a
//!    verifier.
//! 3. Build a client with `Token::Access`, using the request token from step 1 as the access
//!    pair, and call `get_authorized_tokens` with the verifier. The key pair in the result is the
//!    user's real access token.
//!
//! ```rust,no_run
//! # async fn flow() -> twython::error::Result<()> {
//! use twython::{ClientConfig, KeyPair, Token, Twython};
//!
//! let consumer = KeyPair::new("consumer key", "consumer secret");
//! let client = Twython::with_config(ClientConfig::new().credentials(Token::App(consumer.clone())))?;
//! let auth = client.get_authentication_tokens(Some("https://example.com/callback"), false, None).await?;
//!
//! // send the user to auth.auth_url, receive the verifier...
//! let verifier = "123456";
//!
//! let client = Twython::with_config(ClientConfig::new().credentials(Token::Access {
//!     consumer,
//!     access: auth.request_token(),
//! }))?;
//! let authorized = client.get_authorized_tokens(verifier).await?;
//! let access = authorized.access_token();
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::collections::HashMap;

use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Twython;
use crate::common::*;
use crate::error::{ApiError, Error, Result};
use crate::links;

pub(crate) mod raw;

use raw::RequestBuilder;

/// A key/secret pair representing an OAuth token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyPair {
    /// A key used to identify an application or user.
    pub key: Cow<'static, str>,
    /// A private key used to sign messages from an application or user.
    pub secret: Cow<'static, str>,
}

impl KeyPair {
    /// Creates a KeyPair with the given key and secret.
    ///
    /// This can be called with either `&'static str` (a string literal) or `String` for either
    /// parameter.
    pub fn new<K, S>(key: K, secret: S) -> KeyPair
    where
        K: Into<Cow<'static, str>>,
        S: Into<Cow<'static, str>>,
    {
        KeyPair {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// The credentials a client signs its requests with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum Token {
    /// No credentials. Requests are sent without an `Authorization` header.
    None,
    /// An app's consumer key pair, used alone to sign OAuth 1 requests.
    App(KeyPair),
    /// An OAuth 1 access token, with the consumer key pair of the app it was issued to.
    Access {
        /// The "consumer" token, representing the application.
        consumer: KeyPair,
        /// The "access" token, representing the user that authorized the application. During the
        /// sign-in flow this holds the request token instead.
        access: KeyPair,
    },
    /// An OAuth 2 bearer token, representing the application itself.
    Bearer(String),
}

impl Default for Token {
    fn default() -> Token {
        Token::None
    }
}

impl Token {
    /// Picks the credential mode from whichever pieces are present.
    ///
    /// A consumer key and secret give `App`; adding an access token and secret gives `Access`.
    /// Without a complete consumer pair the result is `None`.
    pub fn from_parts(
        consumer_key: Option<String>,
        consumer_secret: Option<String>,
        access_token: Option<String>,
        access_token_secret: Option<String>,
    ) -> Token {
        match (consumer_key, consumer_secret) {
            (Some(ck), Some(cs)) => {
                let consumer = KeyPair::new(ck, cs);
                match (access_token, access_token_secret) {
                    (Some(at), Some(ats)) => Token::Access {
                        consumer,
                        access: KeyPair::new(at, ats),
                    },
                    _ => Token::App(consumer),
                }
            }
            _ => Token::None,
        }
    }

    /// Returns the consumer key pair, for the modes that carry one.
    pub fn consumer(&self) -> Option<&KeyPair> {
        match self {
            Token::App(consumer) | Token::Access { consumer, .. } => Some(consumer),
            Token::None | Token::Bearer(_) => None,
        }
    }
}

/// The result of starting the OAuth 1 sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationTokens {
    /// The request token key.
    pub oauth_token: String,
    /// The request token secret.
    pub oauth_token_secret: String,
    /// Whether Twitter accepted the callback URL given with the request.
    pub oauth_callback_confirmed: bool,
    /// The URL to send the user to so they can authorize the app.
    pub auth_url: String,
}

impl AuthenticationTokens {
    /// Returns the request token as a `KeyPair`, for use with `get_authorized_tokens`.
    pub fn request_token(&self) -> KeyPair {
        KeyPair::new(self.oauth_token.clone(), self.oauth_token_secret.clone())
    }
}

/// The result of finishing the OAuth 1 sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedTokens {
    /// The access token key.
    pub oauth_token: String,
    /// The access token secret.
    pub oauth_token_secret: String,
    /// The ID of the user that authorized the app.
    pub user_id: Option<u64>,
    /// The screen name of the user that authorized the app.
    pub screen_name: Option<String>,
}

impl AuthorizedTokens {
    /// Returns the access token as a `KeyPair`.
    pub fn access_token(&self) -> KeyPair {
        KeyPair::new(self.oauth_token.clone(), self.oauth_token_secret.clone())
    }
}

fn form_pairs(content: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(content.trim().as_bytes())
        .into_owned()
        .collect()
}

/// Token endpoints answer with a `200`; anything else that got past `check_status` is still a
/// failure for them.
fn require_ok(record: &CallRecord) -> Result<()> {
    if record.status_code == StatusCode::OK.as_u16() {
        return Ok(());
    }
    Err(Error::Api(ApiError {
        message: if record.content.is_empty() {
            "Unexpected response from the token endpoint".to_string()
        } else {
            record.content.clone()
        },
        status_code: record.status_code,
        retry_after: None,
    }))
}

impl Twython {
    fn oauth_url(&self, path: &str) -> String {
        format!("{}/{}", self.config().base_url, path)
    }

    /// Starts the OAuth 1 sign-in flow.
    ///
    /// This requests a request token from Twitter, signed with the client's consumer key pair,
    /// and assembles the URL the user should visit to authorize the app. If `callback_url` is
    /// given, Twitter will send the user there afterward; otherwise Twitter shows them a PIN. If
    /// `force_login` is set, the user is asked to sign in even if they already are, and
    /// `screen_name` pre-fills the sign-in form.
    ///
    /// Fails with `Error::WrongAuthMode` if the client has no consumer key pair.
    pub async fn get_authentication_tokens(
        &self,
        callback_url: Option<&str>,
        force_login: bool,
        screen_name: Option<&str>,
    ) -> Result<AuthenticationTokens> {
        let consumer = self
            .config()
            .token
            .consumer()
            .ok_or(Error::WrongAuthMode("OAuth 1 consumer credentials are required"))?;

        let url = self.oauth_url(links::auth::REQUEST_TOKEN);
        let mut request = RequestBuilder::new(Method::POST, &url);
        if let Some(callback) = callback_url {
            request = request.oauth_callback(callback);
        }
        let request = request.request_keys(consumer, None, self.headers())?;

        let record = self.execute(request, url.clone()).await?;
        require_ok(&record)?;

        let mut tokens = form_pairs(&record.content);
        let (oauth_token, oauth_token_secret) = match (
            tokens.remove("oauth_token"),
            tokens.remove("oauth_token_secret"),
        ) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                return Err(Error::InvalidResponse(
                    "Unable to decode request tokens.",
                    Some(record.content),
                ))
            }
        };
        let oauth_callback_confirmed =
            tokens.get("oauth_callback_confirmed").map(String::as_str) == Some("true");

        let mut auth_url = url::Url::parse(&self.oauth_url(self.config().auth_endpoint.path()))?;
        {
            let mut query = auth_url.query_pairs_mut();
            query.append_pair("oauth_token", &oauth_token);
            if force_login {
                query.append_pair("force_login", "true");
            }
            if let Some(screen_name) = screen_name {
                query.append_pair("screen_name", screen_name);
            }
            if let (Some(callback), false) = (callback_url, oauth_callback_confirmed) {
                query.append_pair("oauth_callback", callback);
            }
        }

        Ok(AuthenticationTokens {
            oauth_token,
            oauth_token_secret,
            oauth_callback_confirmed,
            auth_url: auth_url.into(),
        })
    }

    /// Finishes the OAuth 1 sign-in flow by trading the verifier for an access token.
    ///
    /// The client must hold `Token::Access` with the request token from
    /// `get_authentication_tokens` in the `access` slot; otherwise this fails with
    /// `Error::WrongAuthMode`.
    pub async fn get_authorized_tokens(&self, verifier: &str) -> Result<AuthorizedTokens> {
        let (consumer, request_token) = match &self.config().token {
            Token::Access { consumer, access } => (consumer, access),
            _ => {
                return Err(Error::WrongAuthMode(
                    "the request token must be set as the client's access token",
                ))
            }
        };

        let url = self.oauth_url(links::auth::ACCESS_TOKEN);
        let request = RequestBuilder::new(Method::POST, &url)
            .oauth_verifier(verifier)
            .request_keys(consumer, Some(request_token), self.headers())?;

        let record = self.execute(request, url.clone()).await?;
        require_ok(&record)?;

        let mut tokens = form_pairs(&record.content);
        match (
            tokens.remove("oauth_token"),
            tokens.remove("oauth_token_secret"),
        ) {
            (Some(oauth_token), Some(oauth_token_secret)) => Ok(AuthorizedTokens {
                oauth_token,
                oauth_token_secret,
                user_id: tokens.get("user_id").and_then(|id| id.parse().ok()),
                screen_name: tokens.remove("screen_name"),
            }),
            _ => Err(Error::InvalidResponse(
                "Unable to decode authorized tokens.",
                Some(record.content),
            )),
        }
    }

    /// Obtains an OAuth 2 bearer token for the client's consumer key pair.
    ///
    /// The returned token can be used with `Token::Bearer` to build an app-only client.
    pub async fn obtain_access_token(&self) -> Result<String> {
        let consumer = self
            .config()
            .token
            .consumer()
            .ok_or(Error::WrongAuthMode("a consumer key pair is required for OAuth 2"))?;

        let url = self.oauth_url(links::auth::BEARER_TOKEN);
        let request = RequestBuilder::new(Method::POST, &url)
            .with_body_params(&ParamList::new().add_param("grant_type", "client_credentials"))
            .request_consumer_bearer(consumer, self.headers())?;

        let record = self.execute(request, url.clone()).await?;
        let body = decode_json(&record)?;
        access_token_field(&body, &record)
    }

    /// Invalidates the given OAuth 2 bearer token, returning the token Twitter reports as
    /// invalidated.
    pub async fn invalidate_token(&self, bearer: &str) -> Result<String> {
        let consumer = self
            .config()
            .token
            .consumer()
            .ok_or(Error::WrongAuthMode("a consumer key pair is required for OAuth 2"))?;

        let url = self.oauth_url(links::auth::INVALIDATE_BEARER);
        let request = RequestBuilder::new(Method::POST, &url)
            .with_body_params(&ParamList::new().add_param("access_token", bearer.to_string()))
            .request_consumer_bearer(consumer, self.headers())?;

        let record = self.execute(request, url.clone()).await?;
        let body = decode_json(&record)?;
        access_token_field(&body, &record)
    }
}

fn access_token_field(body: &Value, record: &CallRecord) -> Result<String> {
    body.get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidResponse("Unable to obtain OAuth 2 access token.", Some(record.content.clone()))
        })
}
