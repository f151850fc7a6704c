// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rendering a tweet's text as HTML.
//!
//! Twitter sends tweet text as plain text alongside lists of entities, each naming the codepoint
//! range it covers. The renderer walks the text once, replacing each entity's range with an anchor
//! and copying everything between entities verbatim. The text is split into three parts first:
//!
//! - the *prefix*, which holds the `@mentions` a reply starts with,
//! - the *display* text, which is what the author typed,
//! - the *suffix*, which holds the links Twitter appends for attached media or quoted tweets.
//!
//! The prefix and suffix are wrapped in their own `<span>` so they can be styled or hidden.
//!
//! Text and entity fields are inserted as-is. Twitter already sends tweet text HTML-escaped (`&`
//! arrives as `&amp;`), and the renderer doesn't escape it a second time.

use serde_json::Value;

use crate::common::codepoints_to_bytes;
use crate::entities::TweetEntities;
use crate::error::Result;
use crate::links;

use super::Tweet;

/// Settings for `html_for_tweet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Label links with their shortened `display_url`, when one is present. Defaults to `true`.
    pub use_display_url: bool,
    /// Label links with their full `expanded_url`. Takes precedence over `use_display_url`.
    /// Defaults to `false`.
    pub use_expanded_url: bool,
    /// Append the quoted tweet, if there is one, as a `<blockquote>`. Defaults to `false`.
    pub expand_quoted_status: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        HtmlOptions {
            use_display_url: true,
            use_expanded_url: false,
            expand_quoted_status: false,
        }
    }
}

/// Renders the given tweet's text as HTML.
///
/// Retweets render as the tweet they retweet. Long tweets loaded in compatibility mode render from
/// their `extended_tweet` contents.
///
/// ```rust
/// use twython::tweet::{html_for_tweet, HtmlOptions, Tweet};
///
/// let tweet: Tweet = serde_json::from_str(r##"{
///     "text": "hello #rust",
///     "entities": {"hashtags": [{"indices": [6, 11], "text": "rust"}]}
/// }"##).unwrap();
///
/// assert_eq!(
///     html_for_tweet(&tweet, &HtmlOptions::default()),
///     "hello <a href=\"https://twitter.com/search?q=%23rust\" class=\"twython-hashtag\">#rust</a>",
/// );
/// ```
pub fn html_for_tweet(tweet: &Tweet, opts: &HtmlOptions) -> String {
    let tweet = tweet.retweeted_status.as_deref().unwrap_or(tweet);
    let (text, display_range, entities) = tweet.full_parts();

    let splices = collect_splices(entities, opts);
    let char_count = text.chars().count();

    let (display_start, display_end) = match display_range {
        Some((start, end)) => {
            let end = end.min(char_count);
            (start.min(end), end)
        }
        None if tweet.is_reply() => (reply_prefix_len(text, entities), char_count),
        None => (0, char_count),
    };

    let mut html = String::with_capacity(text.len() * 2);

    let prefix = splice(text, 0, display_start, &splices);
    if !prefix.is_empty() {
        html.push_str("<span class=\"twython-tweet-prefix\">");
        html.push_str(&prefix);
        html.push_str("</span>");
    }

    html.push_str(&splice(text, display_start, display_end, &splices));

    let suffix = splice(text, display_end, char_count, &splices);
    if !suffix.is_empty() {
        html.push_str("<span class=\"twython-tweet-suffix\">");
        html.push_str(&suffix);
        html.push_str("</span>");
    }

    if opts.expand_quoted_status {
        if let Some(quoted) = tweet.quoted_status.as_deref() {
            html.push_str(&quote_block(quoted, opts));
        }
    }

    html
}

/// Renders the given tweet JSON as HTML.
///
/// Returns an error if the value doesn't have the shape of a tweet, for example if its entity
/// lists hold something other than entities. Missing fields are fine.
pub fn html_for_tweet_json(tweet: &Value, opts: &HtmlOptions) -> Result<String> {
    let tweet: Tweet = serde_json::from_value(tweet.clone())?;
    Ok(html_for_tweet(&tweet, opts))
}

/// An entity's codepoint range, and the markup that replaces it.
#[derive(Debug)]
struct Splice {
    range: (usize, usize),
    markup: String,
}

fn collect_splices(entities: &TweetEntities, opts: &HtmlOptions) -> Vec<Splice> {
    let mut splices = Vec::new();

    for mention in &entities.user_mentions {
        splices.push(Splice {
            range: mention.range,
            markup: format!(
                "<a href=\"{}/{}\" class=\"twython-mention\">@{}</a>",
                links::web::PROFILE,
                mention.screen_name,
                mention.screen_name
            ),
        });
    }

    for tag in &entities.hashtags {
        splices.push(Splice {
            range: tag.range,
            markup: format!(
                "<a href=\"{}{}\" class=\"twython-hashtag\">#{}</a>",
                links::web::HASHTAG_SEARCH,
                tag.text,
                tag.text
            ),
        });
    }

    for symbol in &entities.symbols {
        splices.push(Splice {
            range: symbol.range,
            markup: format!(
                "<a href=\"{}{}\" class=\"twython-symbol\">${}</a>",
                links::web::SYMBOL_SEARCH,
                symbol.text,
                symbol.text
            ),
        });
    }

    for url in &entities.urls {
        let label = link_label(
            &url.url,
            url.display_url.as_deref(),
            url.expanded_url.as_deref(),
            opts,
        );
        splices.push(Splice {
            range: url.range,
            markup: format!("<a href=\"{}\" class=\"twython-url\">{}</a>", url.url, label),
        });
    }

    //every media entity in a tweet shares the one link, so only the first gets an anchor
    if let Some(media) = entities.media.first() {
        let label = link_label(
            &media.url,
            media.display_url.as_deref(),
            media.expanded_url.as_deref(),
            opts,
        );
        splices.push(Splice {
            range: media.range,
            markup: format!(
                "<a href=\"{}\" class=\"twython-media\">{}</a>",
                media.url, label
            ),
        });
    }

    splices.sort_by_key(|s| s.range.0);
    splices
}

fn link_label<'a>(
    url: &'a str,
    display_url: Option<&'a str>,
    expanded_url: Option<&'a str>,
    opts: &HtmlOptions,
) -> &'a str {
    if opts.use_expanded_url {
        if let Some(expanded) = expanded_url {
            return expanded;
        }
    }

    if opts.use_display_url {
        if let Some(display) = display_url {
            return display;
        }
    }

    url
}

/// Copies the codepoint range `[from, to)` of `text`, replacing the entities that start inside it.
///
/// Entities that run past `to` or overlap an entity already placed are left as plain text.
fn splice(text: &str, from: usize, to: usize, splices: &[Splice]) -> String {
    let mut bounds = (from, to);
    codepoints_to_bytes(&mut bounds, text);

    let mut out = String::new();
    let mut cursor = bounds.0;

    for s in splices {
        let (start, end) = s.range;
        if start < from || start >= to || end > to || end < start {
            continue;
        }

        let mut range = s.range;
        codepoints_to_bytes(&mut range, text);
        if range.0 < cursor {
            continue;
        }

        out.push_str(&text[cursor..range.0]);
        out.push_str(&s.markup);
        cursor = range.1;
    }

    out.push_str(&text[cursor..bounds.1]);
    out
}

/// Measures the run of `@mentions` a reply opens with, for tweets that don't carry a
/// `display_text_range`.
fn reply_prefix_len(text: &str, entities: &TweetEntities) -> usize {
    let mut mentions = entities
        .user_mentions
        .iter()
        .map(|m| m.range)
        .collect::<Vec<_>>();
    mentions.sort();

    let chars = text.chars().collect::<Vec<_>>();
    let mut pos = 0;

    for (start, end) in mentions {
        if start != pos || end > chars.len() {
            break;
        }

        pos = end;
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
    }

    pos
}

fn quote_block(quoted: &Tweet, opts: &HtmlOptions) -> String {
    let inner_opts = HtmlOptions {
        expand_quoted_status: false,
        ..*opts
    };
    let body = html_for_tweet(quoted, &inner_opts);

    let (name, screen_name) = match &quoted.user {
        Some(user) => (user.name.as_str(), user.screen_name.as_str()),
        None => ("", ""),
    };
    let id = quoted.id_string().unwrap_or_default();

    format!(
        "<blockquote class=\"twython-quote\">{body}<cite><a href=\"{profile}/{sn}/status/{id}\">\
         <span class=\"twython-quote-user-name\">{name}</span>\
         <span class=\"twython-quote-user-screenname\">@{sn}</span></a></cite></blockquote>",
        body = body,
        profile = links::web::PROFILE,
        sn = screen_name,
        id = id,
        name = name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::tests::load_file;

    fn load_tweet(path: &str) -> Tweet {
        serde_json::from_str(&load_file(path)).unwrap()
    }

    fn render(path: &str, opts: &HtmlOptions) -> String {
        html_for_tweet(&load_tweet(path), opts)
    }

    #[test]
    fn basic_entities() {
        let html = render("sample_payloads/sample-basic.json", &HtmlOptions::default());

        assert_eq!(
            html,
            "Reading <a href=\"https://t.co/Z1h6fHkJ9z\" class=\"twython-url\">docs.rs/twython</a> \
             with <a href=\"https://twitter.com/twitterapi\" class=\"twython-mention\">@twitterapi</a> \
             <a href=\"https://twitter.com/search?q=%23rustlang\" class=\"twython-hashtag\">#rustlang</a>"
        );
    }

    #[test]
    fn expanded_url_label() {
        let opts = HtmlOptions {
            use_expanded_url: true,
            ..HtmlOptions::default()
        };
        let html = render("sample_payloads/sample-basic.json", &opts);

        assert!(html.contains(
            "<a href=\"https://t.co/Z1h6fHkJ9z\" class=\"twython-url\">https://docs.rs/twython</a>"
        ));
    }

    #[test]
    fn raw_url_label() {
        let opts = HtmlOptions {
            use_display_url: false,
            ..HtmlOptions::default()
        };
        let html = render("sample_payloads/sample-basic.json", &opts);

        assert!(html.contains(
            "<a href=\"https://t.co/Z1h6fHkJ9z\" class=\"twython-url\">https://t.co/Z1h6fHkJ9z</a>"
        ));
    }

    #[test]
    fn reply_prefix_from_display_range() {
        let html = render("sample_payloads/sample-reply.json", &HtmlOptions::default());

        assert_eq!(
            html,
            "<span class=\"twython-tweet-prefix\">\
             <a href=\"https://twitter.com/twitterapi\" class=\"twython-mention\">@twitterapi</a> \
             </span>thanks for the docs!"
        );
    }

    #[test]
    fn reply_prefix_without_display_range() {
        let mut tweet = load_tweet("sample_payloads/sample-reply.json");
        tweet.display_text_range = None;

        let html = html_for_tweet(&tweet, &HtmlOptions::default());
        assert!(html.starts_with("<span class=\"twython-tweet-prefix\"><a href"));
        assert!(html.ends_with("</span>thanks for the docs!"));
        assert_eq!(html.matches("twython-mention").count(), 1);
    }

    #[test]
    fn leading_mention_in_non_reply_stays_inline() {
        let mut tweet = load_tweet("sample_payloads/sample-reply.json");
        tweet.display_text_range = None;
        tweet.in_reply_to_status_id = None;
        tweet.in_reply_to_user_id = None;
        tweet.in_reply_to_screen_name = None;

        let html = html_for_tweet(&tweet, &HtmlOptions::default());
        assert!(!html.contains("twython-tweet-prefix"));
        assert!(html.starts_with("<a href=\"https://twitter.com/twitterapi\""));
    }

    #[test]
    fn media_suffix() {
        let html = render(
            "sample_payloads/sample-extended-onepic.json",
            &HtmlOptions::default(),
        );

        assert!(html.ends_with(
            "<span class=\"twython-tweet-suffix\">\
             <a href=\"https://t.co/EJtJLPL3ui\" class=\"twython-media\">pic.twitter.com/EJtJLPL3ui</a>\
             </span>"
        ));
        assert!(!html.contains("twython-tweet-prefix"));
        assert_eq!(html.matches("twython-media").count(), 1);
    }

    #[test]
    fn compat_mode_uses_extended_tweet() {
        let html = render(
            "sample_payloads/sample-compat-extended.json",
            &HtmlOptions::default(),
        );

        assert!(!html.contains('\u{2026}'));
        assert!(html.contains("class=\"twython-tweet-suffix\""));
        assert!(html.contains("class=\"twython-media\""));
        assert!(html.contains("class=\"twython-hashtag\">#rustlang</a>"));
    }

    #[test]
    fn symbols() {
        let html = render("sample_payloads/sample-symbols.json", &HtmlOptions::default());

        assert_eq!(
            html,
            "watching <a href=\"https://twitter.com/search?q=%24TWTR\" class=\"twython-symbol\">$TWTR</a> \
             and <a href=\"https://twitter.com/search?q=%24AAPL\" class=\"twython-symbol\">$AAPL</a> today"
        );
    }

    #[test]
    fn duplicate_urls_render_twice() {
        let html = render(
            "sample_payloads/sample-duplicate-url.json",
            &HtmlOptions::default(),
        );

        let anchor = "<a href=\"https://t.co/aaaaaaaaaa\" class=\"twython-url\">example.com</a>";
        assert_eq!(html, format!("{} and again {}", anchor, anchor));
    }

    #[test]
    fn unicode_offsets() {
        let html = render("sample_payloads/sample-unicode.json", &HtmlOptions::default());

        assert_eq!(
            html,
            "caf\u{e9} \u{1f980} <a href=\"https://twitter.com/search?q=%23rust\" class=\"twython-hashtag\">#rust</a> \
             <a href=\"https://twitter.com/ferris\" class=\"twython-mention\">@ferris</a>"
        );
    }

    #[test]
    fn quoted_status() {
        let opts = HtmlOptions {
            expand_quoted_status: true,
            ..HtmlOptions::default()
        };
        let html = render("sample_payloads/sample-quote.json", &opts);

        assert!(html.starts_with(
            "this is great<span class=\"twython-tweet-suffix\"> <a href=\"https://t.co/qqqqqqqqqq\""
        ));
        assert!(html.ends_with(
            "<blockquote class=\"twython-quote\">shipping a new release today<cite>\
             <a href=\"https://twitter.com/twitterapi/status/1000000000000000001\">\
             <span class=\"twython-quote-user-name\">Twitter API</span>\
             <span class=\"twython-quote-user-screenname\">@twitterapi</span></a></cite></blockquote>"
        ));

        let plain = render("sample_payloads/sample-quote.json", &HtmlOptions::default());
        assert!(!plain.contains("blockquote"));
    }

    #[test]
    fn retweet_collapses() {
        let outer = load_tweet("sample_payloads/sample-retweet.json");
        let inner = outer.retweeted_status.as_deref().unwrap().clone();
        let opts = HtmlOptions::default();

        assert_eq!(html_for_tweet(&outer, &opts), html_for_tweet(&inner, &opts));
        assert!(!html_for_tweet(&outer, &opts).starts_with("RT "));
    }

    #[test]
    fn empty_entities() {
        let tweet = serde_json::json!({ "text": "nothing to see here", "entities": {} });
        let html = html_for_tweet_json(&tweet, &HtmlOptions::default()).unwrap();
        assert_eq!(html, "nothing to see here");

        let bare = serde_json::json!({ "text": "no entities at all" });
        let html = html_for_tweet_json(&bare, &HtmlOptions::default()).unwrap();
        assert_eq!(html, "no entities at all");
    }

    #[test]
    fn malformed_json() {
        let tweet = serde_json::json!({ "text": "hi", "entities": { "hashtags": "nope" } });
        assert!(html_for_tweet_json(&tweet, &HtmlOptions::default()).is_err());
    }
}
