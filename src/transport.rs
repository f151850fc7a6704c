// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The seam between the client and the network.
//!
//! Every request the client makes, including the long-lived streaming connections, goes through a
//! `Transport`. The default is `HyperTransport`, a `hyper` client over `native-tls`. Supplying your
//! own implementation lets you route requests through a proxy, record them, or answer them from a
//! fixture without touching the network.

use std::future::Future;
use std::pin::Pin;

use hyper::client::HttpConnector;
use hyper::{Body, Request, Response};
use hyper_tls::HttpsConnector;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Type alias for the future returned by `Transport::send`.
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send + 'static>>;

/// Something that can carry a request to Twitter and bring back the response.
///
/// The returned response's body may still be streaming; the client reads it to the end for REST
/// calls and line-by-line for streaming calls.
pub trait Transport: Send + Sync {
    /// Sends the given request.
    fn send(&self, request: Request<Body>) -> TransportFuture;
}

/// The default `Transport`, backed by a pooled `hyper` client.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: hyper::Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperTransport {
    /// Creates a transport honoring the TLS settings in the given configuration.
    ///
    /// This transport has no proxy support, so a configuration with proxies set is refused with
    /// `Error::Config`. Supply your own `Transport` to use them.
    pub fn new(config: &ClientConfig) -> Result<HyperTransport> {
        if !config.proxies.is_empty() {
            return Err(Error::Config(
                "proxies are not supported by HyperTransport; supply a custom Transport".to_string(),
            ));
        }

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));

        Ok(HyperTransport {
            client: hyper::Client::builder().build(https),
        })
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request<Body>) -> TransportFuture {
        let response = self.client.request(request);
        Box::pin(async move { Ok(response.await?) })
    }
}
