// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Data structures containing extracted URL, mention, tag, and media information.
//!
//! These structures are meant to be received in an API call to describe the data they accompany.
//! For example, a `UrlEntity` describes a hyperlink in a tweet text, and a `HashtagEntity`
//! describes a hashtag or stock symbol extracted from a tweet.
//!
//! For more information on the data in these structures, see Twitter's documentation for
//! [Entities][] and [Entities in Objects][obj].
//!
//! [Entities]: https://dev.twitter.com/overview/api/entities
//! [obj]: https://dev.twitter.com/overview/api/entities-in-twitter-objects
//!
//! ## Entity Ranges
//!
//! Entities that refer to elements within a text have a `range` field that contains the text span
//! that is being referenced. The numbers in question are *codepoint* offsets, exactly as Twitter
//! sends them, so they can't be used to slice the text directly. Run them through
//! `codepoints_to_bytes` first:
//!
//! ```rust
//! # use twython::entities::HashtagEntity;
//! use twython::codepoints_to_bytes;
//!
//! let text = "café #rust";
//! let entity = HashtagEntity { range: (5, 10), text: "rust".to_string() };
//!
//! let mut range = entity.range;
//! codepoints_to_bytes(&mut range, text);
//! assert_eq!(&text[range.0..range.1], "#rust");
//! ```
//!
//! ### Shortened, Display, and Expanded URLs
//!
//! URL and Media entities contain references to a URL within their parent text. However, due to
//! the nature of how Twitter handles URLs in tweets and user bios, each entity struct has three
//! URLs within it:
//!
//! - `url`: This is the `t.co` shortened URL as returned directly from twitter. This is what
//!   contributes to character count in tweets and user bios.
//! - `expanded_url`: This is the original URL the user entered in their tweet. While it is given
//!   to API client, Twitter recommends still sending users to the shortened link, for analytics
//!   purposes. Twitter Web uses this field to supply hover-text for where the URL resolves to.
//! - `display_url`: This is a truncated version of `expanded_url`, meant to be displayed inline
//!   with the parent text. This is useful to show users where the link resolves to, without
//!   potentially filling up a lot of space with the fullly expanded URL.
//!
//! Older payloads sometimes leave out `display_url` or `expanded_url`, so both are optional here.

use serde::{Deserialize, Serialize};

///Represents a hashtag or symbol extracted from another piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HashtagEntity {
    ///The codepoint offsets where the hashtag is located. The first index is the location of the #
    ///or $ character; the second is the location of the first character following the hashtag.
    #[serde(rename = "indices")]
    pub range: (usize, usize),
    ///The text of the hashtag, without the leading # or $ character.
    pub text: String,
}

///Represents a piece of media attached to a tweet.
///
///The information in this struct is subtly different depending on what media is being referenced,
///and which entity container is holding this instance. For videos and GIFs, the `media_url` and
///`media_url_https` fields each link to a thumbnail image of the media.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MediaEntity {
    ///A shortened URL to display to clients.
    pub display_url: Option<String>,
    ///An expanded version of `display_url`; links to the media display page.
    pub expanded_url: Option<String>,
    ///A numeric ID for the media.
    pub id: Option<u64>,
    ///The codepoint offsets where the media URL is located. The first index is the location of the
    ///first character of the URL; the second is the location of the first character following the
    ///URL.
    #[serde(rename = "indices")]
    pub range: (usize, usize),
    ///A URL pointing directly to the media file. Uses HTTPS as the protocol.
    pub media_url_https: Option<String>,
    ///The type of media being represented: `photo`, `video` or `animated_gif`.
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    ///The t.co link from the original text.
    pub url: String,
}

///Represents a link extracted from another piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UrlEntity {
    ///A truncated URL meant to be displayed inline with the text.
    pub display_url: Option<String>,
    ///The URL that the t.co URL resolves to.
    ///
    ///Meant to be used as hover-text when a user mouses over a link.
    pub expanded_url: Option<String>,
    ///The codepoint offsets in the companion text where the URL was extracted from.
    #[serde(rename = "indices")]
    pub range: (usize, usize),
    ///The t.co URL extracted from the companion text.
    pub url: String,
}

///Represents a user mention extracted from another piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MentionEntity {
    ///Numeric user ID for the user mentioned.
    pub id: Option<u64>,
    ///The codepoint offsets where the user mention is located in the original text. The first
    ///index is the location of the @ symbol; the second is the location of the first character
    ///following the user screen name.
    #[serde(rename = "indices")]
    pub range: (usize, usize),
    ///Display name of the user mentioned.
    pub name: Option<String>,
    ///Screen name of the user mentioned.
    pub screen_name: String,
}

/// Container for the entities extracted from a tweet's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TweetEntities {
    /// Hashtags, like `#rust`.
    pub hashtags: Vec<HashtagEntity>,
    /// Cashtags, like `$TWTR`.
    pub symbols: Vec<HashtagEntity>,
    /// Links.
    pub urls: Vec<UrlEntity>,
    /// Mentions of other users.
    pub user_mentions: Vec<MentionEntity>,
    /// Attached media. Twitter only lists the first attachment here, with a link covering the
    /// whole set.
    pub media: Vec<MediaEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_entities() {
        let entities: TweetEntities = serde_json::from_str(
            r#"{
                "hashtags": [{"indices": [0, 5], "text": "rust"}],
                "urls": [{"indices": [6, 29], "url": "https://t.co/abc"}],
                "user_mentions": [{"indices": [30, 36], "screen_name": "jack", "id": 12}]
            }"#,
        )
        .unwrap();

        assert_eq!(entities.hashtags[0].range, (0, 5));
        assert_eq!(entities.urls[0].display_url, None);
        assert_eq!(entities.user_mentions[0].id, Some(12));
        assert!(entities.symbols.is_empty());
        assert!(entities.media.is_empty());
    }
}
