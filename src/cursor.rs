// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Walking through paginated results.
//!
//! The main entry point of this module is `CursorIter`, which you get from `Twython::cursor` for
//! any catalog operation with pagination metadata. It's a `Stream` of the individual items
//! (tweets, user IDs, users, lists...) across every page, loading the next page whenever the
//! items of the current one run out.
//!
//! How the next page is found depends on the operation:
//!
//! * **Cursor mode** (follower lists, list members, blocks...): each page carries a
//!   `next_cursor_str`, sent back as the `cursor` parameter. A cursor of `"0"` means the page just
//!   loaded was the last one.
//! * **ID mode** (timelines, favorites, list timelines): the next page is selected with the IDs of
//!   the items just seen. By default the cursor moves forward in time, asking for tweets newer
//!   than the newest one seen (`since_id`); `IdStrategy::MaxId` walks backward instead.
//! * **Search**: the `search_metadata.next_results` query string of each page becomes the
//!   parameters for the next one.
//!
//! Iteration stops at the first empty page. If a page hands back the same pagination value as the
//! page before it, the stream reports `Error::CursorStalled` once and then ends rather than
//! fetching the same page forever.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Future, Stream};
use serde_json::Value;

use crate::client::Twython;
use crate::common::*;
use crate::endpoints::{Endpoint, IterMode, IterSpec};
use crate::error::{Error, Result};

/// Which way an ID-mode cursor moves through a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// Ask for items newer than the newest one seen, with `since_id = max(ids) + 1`.
    SinceId,
    /// Ask for items older than the oldest one seen, with `max_id = min(ids) - 1`.
    MaxId,
}

impl Default for IdStrategy {
    fn default() -> IdStrategy {
        IdStrategy::SinceId
    }
}

/// A `Stream` over the items of a paginated operation.
///
/// `CursorIter` loads one page at a time, yielding its items one by one before loading the next.
///
/// ```rust,no_run
/// # async fn demo() -> twython::error::Result<()> {
/// use futures::StreamExt;
/// use twython::{Endpoint, ParamList, Token, Twython};
///
/// let client = Twython::new(Token::Bearer("bearer token".to_string()))?;
/// let mut followers = client
///     .cursor(Endpoint::GetFollowersIds, ParamList::new().add_param("screen_name", "rustlang"))?
///     .max_pages(5);
///
/// while let Some(id) = followers.next().await {
///     println!("{}", id?);
/// }
/// # Ok(())
/// # }
/// ```
///
/// If loading a page fails, the error is yielded and the stream ends after it. Items of a page
/// that arrived but couldn't be paged past (say, tweets without IDs) are still yielded before
/// that error. A stalled cursor (see the module docs) ends the same way.
///
/// You can also step through pages yourself with `next_page`, which gives back all the items of a
/// page at once.
#[must_use = "cursor iterators are lazy and do nothing unless consumed"]
pub struct CursorIter {
    client: Twython,
    endpoint: Endpoint,
    spec: IterSpec,
    params: ParamList,
    strategy: IdStrategy,
    max_pages: Option<usize>,
    pages_loaded: usize,
    last_marker: Option<String>,
    finished: bool,
    pending_error: Option<Error>,
    loader: Option<FutureResponse<Value>>,
    buffer: VecDeque<Value>,
}

impl Twython {
    /// Creates a `CursorIter` over the results of the given catalog operation.
    ///
    /// Fails with `Error::NotPaginated` if the operation has no pagination metadata.
    pub fn cursor(&self, endpoint: Endpoint, params: ParamList) -> Result<CursorIter> {
        let spec = endpoint
            .descriptor()
            .iter
            .ok_or_else(|| Error::NotPaginated(endpoint.name()))?;

        Ok(CursorIter {
            client: self.clone(),
            endpoint,
            spec,
            params,
            strategy: IdStrategy::default(),
            max_pages: None,
            pages_loaded: 0,
            last_marker: None,
            finished: false,
            pending_error: None,
            loader: None,
            buffer: VecDeque::new(),
        })
    }
}

impl CursorIter {
    /// Sets which way an ID-mode cursor walks. Has no effect for cursor-mode or search operations.
    pub fn strategy(self, strategy: IdStrategy) -> CursorIter {
        CursorIter { strategy, ..self }
    }

    /// Stops the cursor after loading the given number of pages.
    pub fn max_pages(self, max_pages: usize) -> CursorIter {
        CursorIter {
            max_pages: Some(max_pages),
            ..self
        }
    }

    /// The parameters the next page will be requested with.
    pub fn params(&self) -> &ParamList {
        &self.params
    }

    /// The number of pages loaded so far.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// Loads the next page and returns all of its items, or `None` once the cursor has finished.
    ///
    /// Items already loaded by the `Stream` implementation but not yet yielded are returned first,
    /// as their own "page".
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.out_of_pages() {
            return Ok(None);
        }

        self.loader = None;
        match self.client.call(self.endpoint, self.params.clone()).await {
            Ok(page) => self.absorb(page.response),
            Err(err) => self.fail(err),
        }

        let items: Vec<Value> = self.buffer.drain(..).collect();
        if items.is_empty() {
            if let Some(err) = self.pending_error.take() {
                return Err(err);
            }
            if self.finished {
                return Ok(None);
            }
        }
        Ok(Some(items))
    }

    fn out_of_pages(&mut self) -> bool {
        if let Some(max) = self.max_pages {
            if self.pages_loaded >= max {
                self.finished = true;
            }
        }
        self.finished
    }

    /// Ends the cursor, leaving `err` to be reported once the buffered items run out.
    fn fail(&mut self, err: Error) {
        tracing::debug!(endpoint = %self.endpoint, pages = self.pages_loaded, error = %err, "cursor stopped on an error");
        self.finished = true;
        self.pending_error = Some(err);
    }

    fn load(&self) -> FutureResponse<Value> {
        let client = self.client.clone();
        let endpoint = self.endpoint;
        let params = self.params.clone();
        Box::pin(async move { client.call(endpoint, params).await })
    }

    /// Takes in a freshly-loaded page: buffers its items and works out how to ask for the next
    /// one. A page that can't be paged past ends the cursor.
    fn absorb(&mut self, page: Value) {
        self.pages_loaded += 1;

        let items = match self.spec.key {
            Some(key) => page.get(key).cloned().unwrap_or(Value::Null),
            None => page.clone(),
        };
        let items = match items {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return self.fail(Error::InvalidResponse(
                    "paginated response did not contain a list of items",
                    Some(other.to_string()),
                ));
            }
        };

        if items.is_empty() {
            tracing::debug!(endpoint = %self.endpoint, pages = self.pages_loaded, "cursor reached an empty page");
            self.finished = true;
            return;
        }

        let marker = match self.spec.mode {
            IterMode::Cursor => Ok(self.next_cursor(&page)),
            IterMode::Id => match self.spec.metadata {
                Some(metadata) => Ok(self.next_results(&page, metadata)),
                None => self.next_id(&items),
            },
        };
        self.buffer.extend(items);

        let marker = match marker {
            Ok(marker) => marker,
            Err(err) => return self.fail(err),
        };

        if let Some(marker) = marker {
            if self.last_marker.as_ref() == Some(&marker) {
                tracing::warn!(endpoint = %self.endpoint, %marker, "cursor stopped advancing");
                self.finished = true;
                self.pending_error = Some(Error::CursorStalled(marker));
            } else {
                self.last_marker = Some(marker);
            }
        }
    }

    fn next_cursor(&mut self, page: &Value) -> Option<String> {
        let next = ["next_cursor_str", "next_cursor"]
            .iter()
            .filter_map(|field| page.get(*field))
            .find_map(|cursor| match cursor {
                Value::String(cursor) => Some(cursor.clone()),
                Value::Number(cursor) => Some(cursor.to_string()),
                _ => None,
            });

        match next {
            Some(cursor) if cursor != "0" => {
                self.params.add_param_ref("cursor", cursor.clone());
                Some(cursor)
            }
            _ => {
                self.finished = true;
                None
            }
        }
    }

    fn next_results(&mut self, page: &Value, metadata: &str) -> Option<String> {
        let next = page
            .get(metadata)
            .and_then(|meta| meta.get("next_results"))
            .and_then(Value::as_str);

        match next {
            Some(query) => {
                let mut params = ParamList::new();
                for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
                    params.add_param_ref(key.into_owned(), value.into_owned());
                }
                self.params = params;
                Some(query.to_string())
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn next_id(&mut self, items: &[Value]) -> Result<Option<String>> {
        let ids: Vec<u64> = items
            .iter()
            .filter_map(|item| {
                item.get("id_str")
                    .and_then(Value::as_str)
                    .and_then(|id| id.parse().ok())
                    .or_else(|| item.get("id").and_then(Value::as_u64))
            })
            .collect();

        let (name, marker) = match self.strategy {
            IdStrategy::SinceId => match ids.iter().max() {
                Some(max) => match max.checked_add(1) {
                    Some(next) => ("since_id", next),
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                },
                None => return Err(missing_ids()),
            },
            IdStrategy::MaxId => match ids.iter().min() {
                Some(0) => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(min) => ("max_id", min - 1),
                None => return Err(missing_ids()),
            },
        };

        self.params.add_param_ref(name, marker);
        Ok(Some(marker.to_string()))
    }
}

fn missing_ids() -> Error {
    Error::InvalidResponse("paginated items did not carry an id", None)
}

impl Stream for CursorIter {
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if let Some(loader) = this.loader.as_mut() {
                match loader.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(page)) => {
                        this.loader = None;
                        this.absorb(page.response);
                        continue;
                    }
                    Poll::Ready(Err(err)) => {
                        this.loader = None;
                        this.fail(err);
                        continue;
                    }
                }
            }

            if let Some(err) = this.pending_error.take() {
                return Poll::Ready(Some(Err(err)));
            }

            if this.out_of_pages() {
                return Poll::Ready(None);
            }

            this.loader = Some(this.load());
        }
    }
}
