// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Structs for working with tweets, and rendering them as HTML.
//!
//! The REST calls in this crate hand back raw JSON, since Twitter's payloads vary a lot between
//! endpoints and API settings. `Tweet` is the typed view of a tweet that the HTML renderer works
//! from; it holds the fields needed to lay out a tweet's text and is lenient about everything
//! else, so it can be loaded from timelines, search results, stream messages, and the
//! "compatibility" payloads that wrap long tweets in an `extended_tweet` field.
//!
//! ## Types
//!
//! - `Tweet`: a single tweet, with its entities, and the retweeted or quoted tweet if there is one.
//! - `TweetUser`: the slice of the author's profile carried along with a tweet.
//! - `ExtendedTweet`: the full text and entities of a long tweet, as sent in compatibility mode.
//! - `HtmlOptions`: settings for `html_for_tweet`.
//!
//! ## Functions
//!
//! - `html_for_tweet`/`html_for_tweet_json`: render a tweet's text as HTML, with its links,
//!   mentions, hashtags and symbols turned into anchors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::TweetEntities;

mod html;

pub use self::html::{html_for_tweet, html_for_tweet_json, HtmlOptions};

///Represents a single status update.
///
///Only the fields used to render and identify a tweet are kept. Every field is optional or has a
///default, since Twitter leaves fields out depending on the endpoint and on parameters like
///`trim_user` and `tweet_mode`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Tweet {
    ///Numeric ID for this tweet.
    pub id: Option<u64>,
    ///Numeric ID for this tweet, as a string. Prefer this over `id` when talking to environments
    ///that can't represent 64-bit integers.
    pub id_str: Option<String>,
    ///UTC timestamp from when the tweet was posted.
    #[serde(deserialize_with = "deserialize_datetime", skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    ///The text of the tweet, in the legacy "compatibility" mode. Long tweets are truncated here.
    pub text: Option<String>,
    ///The full text of the tweet, when loaded with `tweet_mode=extended`.
    pub full_text: Option<String>,
    ///The codepoint offsets between which the "displayable" tweet text is. Text before the range
    ///holds reply mentions, and text after it holds attachment links.
    pub display_text_range: Option<(usize, usize)>,
    ///Link, hashtag, and user mention information extracted from the tweet text.
    pub entities: TweetEntities,
    ///For long tweets loaded in compatibility mode, the full text and entities.
    pub extended_tweet: Option<ExtendedTweet>,
    ///Indicates whether `text` was cut short.
    pub truncated: bool,
    ///If the tweet is a reply, contains the ID of the tweet that was replied to.
    pub in_reply_to_status_id: Option<u64>,
    ///If the tweet is a reply, contains the ID of the user that was replied to.
    pub in_reply_to_user_id: Option<u64>,
    ///If the tweet is a reply, contains the screen name of the user that was replied to.
    pub in_reply_to_screen_name: Option<String>,
    ///Indicates whether this tweet quotes another.
    pub is_quote_status: bool,
    ///If this tweet is quoting another by link, contains the ID of the quoted tweet.
    pub quoted_status_id: Option<u64>,
    ///If this tweet is quoting another by link, contains the quoted tweet.
    pub quoted_status: Option<Box<Tweet>>,
    ///If this tweet is a retweet, then this field contains the original status information.
    pub retweeted_status: Option<Box<Tweet>>,
    ///The user who posted this tweet.
    pub user: Option<TweetUser>,
    ///The machine-detected language of the text, or "und" if no language could be detected.
    pub lang: Option<String>,
}

///The parts of a user's profile that are carried along with each of their tweets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TweetUser {
    ///Numeric ID for this user.
    pub id: Option<u64>,
    ///The name the user has set for themselves, like "Twitter API".
    pub name: String,
    ///The handle the user is known by, without the leading @.
    pub screen_name: String,
}

///The full contents of a long tweet, as wrapped by compatibility-mode payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtendedTweet {
    ///The full text of the tweet.
    pub full_text: String,
    ///The codepoint offsets between which the "displayable" tweet text is.
    pub display_text_range: Option<(usize, usize)>,
    ///Entities extracted from `full_text`.
    pub entities: TweetEntities,
}

impl Tweet {
    ///Returns the tweet's ID as a string, from `id_str` or `id`.
    pub fn id_string(&self) -> Option<String> {
        self.id_str
            .clone()
            .or_else(|| self.id.map(|id| id.to_string()))
    }

    ///Returns whether this tweet is a reply to another tweet or user.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_status_id.is_some()
            || self.in_reply_to_user_id.is_some()
            || self.in_reply_to_screen_name.is_some()
    }

    ///Returns the most complete text available, along with its display range and entities.
    ///
    ///Compatibility payloads are unwrapped here, so a long tweet's `extended_tweet` is preferred
    ///over its truncated `text`.
    pub fn full_parts(&self) -> (&str, Option<(usize, usize)>, &TweetEntities) {
        match &self.extended_tweet {
            Some(ext) => (&ext.full_text, ext.display_text_range, &ext.entities),
            None => (
                self.full_text
                    .as_deref()
                    .or_else(|| self.text.as_deref())
                    .unwrap_or(""),
                self.display_text_range,
                &self.entities,
            ),
        }
    }
}

fn deserialize_datetime<'de, D>(ser: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(ser)?;
    match s {
        Some(s) => DateTime::parse_from_str(&s, "%a %b %d %T %z %Y")
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
