// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A library for interacting with Twitter.
//!
//! twython is a thin client for Twitter's REST API. Rather than modelling every endpoint with its
//! own function and response type, it keeps a catalog of endpoints (`Endpoint`) and a single
//! dispatcher (`Twython`) that turns an endpoint and a bag of parameters into a signed request,
//! then hands back the decoded JSON. Any URL Twitter serves can also be called directly with
//! `Twython::get`, `Twython::post` and friends, so endpoints that aren't in the catalog yet are
//! still reachable.
//!
//! To start using this library, you're going to need a Consumer Key and Consumer Secret from
//! Twitter, for your app. To make calls on behalf of a user you'll also need an access token; the
//! OAuth helpers in the `auth` module walk through obtaining one. With those in hand, build a
//! client:
//!
//! ```rust,no_run
//! use twython::{Endpoint, KeyPair, ParamList, Token, Twython};
//!
//! # async fn demo() -> twython::error::Result<()> {
//! let con_token = KeyPair::new("consumer key", "consumer secret");
//! let access_token = KeyPair::new("access token key", "access token secret");
//! let client = Twython::new(Token::Access {
//!     consumer: con_token,
//!     access: access_token,
//! })?;
//!
//! let params = ParamList::new()
//!     .add_param("screen_name", "rustlang")
//!     .add_param("count", 10);
//! let timeline = client.call(Endpoint::GetUserTimeline, params).await?;
//!
//! for tweet in timeline.as_array().into_iter().flatten() {
//!     println!("{}", tweet["text"]);
//! }
//!
//! println!("{:?} calls left", timeline.record.rate_limit_remaining());
//! # Ok(())
//! # }
//! ```
//!
//! ## Parameters
//!
//! Parameters are gathered in a `ParamList`, which takes strings, numbers, booleans, lists and
//! files. Booleans are sent as `true`/`false`, lists are joined with commas, and any file turns a
//! POST into a multipart upload. Path placeholders like `{{id}}` in an endpoint's path are filled
//! from the parameter of the same name.
//!
//! ## Responses and errors
//!
//! Every call returns a `Response`, which dereferences to the decoded JSON and carries the
//! `CallRecord` of the HTTP exchange: status, headers and rate-limit information. The client also
//! keeps the record of its latest call, available through `Twython::last_call_header`.
//!
//! Failures come back as an `error::Error`. Twitter's own error responses are sorted into
//! `Error::Api`, `Error::Auth` and `Error::RateLimit`, each holding the message Twitter sent.
//!
//! ## Paging
//!
//! Endpoints that page through their results with `cursor`, `max_id`/`since_id` or search
//! metadata can be walked with `Twython::cursor`, which returns a `CursorIter` that loads pages as
//! it goes.
//!
//! ## Other modules
//!
//! - `tweet`: a typed `Tweet` and `html_for_tweet`, which renders a tweet's text with its links,
//!   mentions and hashtags as anchors.
//! - `stream`: a client for Twitter's streaming endpoints.
//! - `transport`: the `Transport` trait requests go through, for swapping out the network layer.

#![warn(missing_docs)]

pub mod auth;
mod client;
mod common;
mod config;
pub mod cursor;
pub mod endpoints;
pub mod entities;
pub mod error;
mod links;
pub mod stream;
pub mod transport;
pub mod tweet;

pub use crate::auth::{AuthenticationTokens, AuthorizedTokens, KeyPair, Token};
pub use crate::client::{construct_api_url, Twython};
pub use crate::common::{
    codepoints_to_bytes, normalize, percent_encode, CallRecord, FileList, FileParam,
    FutureResponse, Headers, Param, ParamList, ParamPolicy, Response,
};
pub use crate::config::{AuthEndpoint, ClientConfig};
pub use crate::cursor::{CursorIter, IdStrategy};
pub use crate::endpoints::{Endpoint, EndpointDescriptor, HttpMethod, IterMode, IterSpec};
pub use crate::transport::{HyperTransport, Transport, TransportFuture};
pub use crate::tweet::{html_for_tweet, html_for_tweet_json, HtmlOptions, Tweet};
