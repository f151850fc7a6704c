// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The catalog of Twitter REST operations.
//!
//! Every named operation the client knows about is a variant of `Endpoint`. Each one carries an
//! `EndpointDescriptor`: the operation's logical name, its path template relative to
//! `{base}/{version}/` (without the `.json` suffix), the HTTP method it's called with, and, for
//! the operations that return pages of results, how to walk from one page to the next.
//!
//! Path templates can contain placeholders like `statuses/show/{{id}}`. When an operation is
//! called, each placeholder is filled from the parameter of the same name, which is then removed
//! from the parameters sent with the request.
//!
//! ```rust
//! use twython::{Endpoint, ParamList};
//!
//! let endpoint: Endpoint = "show_status".parse().unwrap();
//! assert_eq!(endpoint, Endpoint::ShowStatus);
//!
//! let mut params = ParamList::new().add_param("id", 20u64);
//! let path = endpoint.descriptor().resolve_path(&mut params).unwrap();
//! assert_eq!(path, "statuses/show/20");
//! assert!(params.is_empty());
//! ```

use std::fmt;
use std::str::FromStr;

use hyper::Method;
use regex::{Captures, Regex};

use crate::common::*;
use crate::error::{Error, Result};

/// The HTTP method a catalog operation is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`, with parameters in the query string.
    Get,
    /// `POST`, with parameters in a form body (or a multipart body when files are attached).
    Post,
    /// `DELETE`, with parameters in the query string.
    Delete,
}

impl HttpMethod {
    /// Returns the matching `hyper::Method`.
    pub fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// How the pages of a paginated operation are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterMode {
    /// Pages are selected by tweet ID, with `since_id` or `max_id`.
    Id,
    /// Each page names the next one with an opaque `next_cursor` value.
    Cursor,
}

/// Pagination metadata for a catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterSpec {
    /// How pages are linked.
    pub mode: IterMode,
    /// The field of the response holding the page's items, if the response isn't itself a list.
    pub key: Option<&'static str>,
    /// The field of the response holding pagination metadata, if the operation has one.
    pub metadata: Option<&'static str>,
}

/// Static description of one catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// The logical operation name, like `get_home_timeline`.
    pub name: &'static str,
    /// The path template, relative to `{base}/{version}/` and without `.json`. Templates starting
    /// with `https://` are complete URLs.
    pub path: &'static str,
    /// The HTTP method used to call this operation.
    pub method: HttpMethod,
    /// Pagination metadata, for operations that return pages of results.
    pub iter: Option<IterSpec>,
}

const fn get(name: &'static str, path: &'static str) -> EndpointDescriptor {
    EndpointDescriptor {
        name,
        path,
        method: HttpMethod::Get,
        iter: None,
    }
}

const fn post(name: &'static str, path: &'static str) -> EndpointDescriptor {
    EndpointDescriptor {
        name,
        path,
        method: HttpMethod::Post,
        iter: None,
    }
}

const fn delete(name: &'static str, path: &'static str) -> EndpointDescriptor {
    EndpointDescriptor {
        name,
        path,
        method: HttpMethod::Delete,
        iter: None,
    }
}

const fn by_id(desc: EndpointDescriptor, key: Option<&'static str>) -> EndpointDescriptor {
    EndpointDescriptor {
        iter: Some(IterSpec {
            mode: IterMode::Id,
            key,
            metadata: None,
        }),
        ..desc
    }
}

const fn by_cursor(desc: EndpointDescriptor, key: &'static str) -> EndpointDescriptor {
    EndpointDescriptor {
        iter: Some(IterSpec {
            mode: IterMode::Cursor,
            key: Some(key),
            metadata: None,
        }),
        ..desc
    }
}

const fn with_metadata(
    desc: EndpointDescriptor,
    key: &'static str,
    metadata: &'static str,
) -> EndpointDescriptor {
    EndpointDescriptor {
        iter: Some(IterSpec {
            mode: IterMode::Id,
            key: Some(key),
            metadata: Some(metadata),
        }),
        ..desc
    }
}

impl EndpointDescriptor {
    /// Returns the names of the placeholders in this operation's path template.
    pub fn placeholders(&self) -> Vec<&'static str> {
        PLACEHOLDER
            .captures_iter(self.path)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Fills in the path template from `params`, removing each parameter that was used.
    ///
    /// Fails with `Error::MissingParameter` if a placeholder has no matching parameter (or the
    /// parameter is a file). `params` is left untouched in that case.
    pub fn resolve_path(&self, params: &mut ParamList) -> Result<String> {
        for name in self.placeholders() {
            match params.get(name) {
                Some(value) if !value.is_file() => (),
                _ => return Err(Error::MissingParameter(name.to_string())),
            }
        }

        let path = PLACEHOLDER.replace_all(self.path, |caps: &Captures| {
            let value = params.get(&caps[1]).and_then(Param::encode).unwrap_or_default();
            percent_encode(&value).to_string()
        });
        let path = path.into_owned();

        for name in self.placeholders() {
            params.remove(name);
        }

        Ok(path)
    }
}

lazy_static::lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{(\w+)\}\}").unwrap();
}

macro_rules! catalog {
    ($($(#[$attr:meta])* $variant:ident => $desc:expr;)*) => {
        /// A named Twitter REST operation.
        ///
        /// See the module documentation for how operations are described and called.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Endpoint {
            $($(#[$attr])* $variant,)*
        }

        impl Endpoint {
            /// Every operation in the catalog.
            pub fn all() -> &'static [Endpoint] {
                &[$(Endpoint::$variant,)*]
            }

            /// The static description of this operation.
            pub fn descriptor(self) -> &'static EndpointDescriptor {
                match self {
                    $(Endpoint::$variant => {
                        static DESC: EndpointDescriptor = $desc;
                        &DESC
                    })*
                }
            }
        }
    };
}

catalog! {
    // Timelines
    GetMentionsTimeline => by_id(get("get_mentions_timeline", "statuses/mentions_timeline"), None);
    GetUserTimeline => by_id(get("get_user_timeline", "statuses/user_timeline"), None);
    GetHomeTimeline => by_id(get("get_home_timeline", "statuses/home_timeline"), None);
    RetweetedOfMe => by_id(get("retweeted_of_me", "statuses/retweets_of_me"), None);

    // Tweets
    GetRetweets => get("get_retweets", "statuses/retweets/{{id}}");
    ShowStatus => get("show_status", "statuses/show/{{id}}");
    LookupStatus => post("lookup_status", "statuses/lookup");
    DestroyStatus => post("destroy_status", "statuses/destroy/{{id}}");
    UpdateStatus => post("update_status", "statuses/update");
    Retweet => post("retweet", "statuses/retweet/{{id}}");
    Unretweet => post("unretweet", "statuses/unretweet/{{id}}");
    UpdateStatusWithMedia => post("update_status_with_media", "statuses/update_with_media");
    UploadMedia => post("upload_media", "https://upload.twitter.com/1.1/media/upload.json");
    GetMediaStatus => get("get_media_status", "https://upload.twitter.com/1.1/media/upload.json");
    GetOembedTweet => get("get_oembed_tweet", "statuses/oembed");
    GetRetweetersIds => by_cursor(get("get_retweeters_ids", "statuses/retweeters/ids"), "ids");

    // Search
    Search => with_metadata(get("search", "search/tweets"), "statuses", "search_metadata");

    // Direct Messages
    GetDirectMessages => by_cursor(get("get_direct_messages", "direct_messages/events/list"), "events");
    GetDirectMessage => get("get_direct_message", "direct_messages/events/show");
    DestroyDirectMessage => delete("destroy_direct_message", "direct_messages/events/destroy");

    // Friends & Followers
    GetUserIdsOfBlockedRetweets => get("get_user_ids_of_blocked_retweets", "friendships/no_retweets/ids");
    GetFriendsIds => by_cursor(get("get_friends_ids", "friends/ids"), "ids");
    GetFollowersIds => by_cursor(get("get_followers_ids", "followers/ids"), "ids");
    LookupFriendships => get("lookup_friendships", "friendships/lookup");
    GetIncomingFriendshipIds => by_cursor(get("get_incoming_friendship_ids", "friendships/incoming"), "ids");
    GetOutgoingFriendshipIds => by_cursor(get("get_outgoing_friendship_ids", "friendships/outgoing"), "ids");
    CreateFriendship => post("create_friendship", "friendships/create");
    DestroyFriendship => post("destroy_friendship", "friendships/destroy");
    UpdateFriendship => post("update_friendship", "friendships/update");
    ShowFriendship => get("show_friendship", "friendships/show");
    GetFriendsList => by_cursor(get("get_friends_list", "friends/list"), "users");
    GetFollowersList => by_cursor(get("get_followers_list", "followers/list"), "users");

    // Users
    GetAccountSettings => get("get_account_settings", "account/settings");
    VerifyCredentials => get("verify_credentials", "account/verify_credentials");
    UpdateAccountSettings => post("update_account_settings", "account/settings");
    UpdateDeliveryService => post("update_delivery_service", "account/update_delivery_device");
    UpdateProfile => post("update_profile", "account/update_profile");
    UpdateProfileBackgroundImage => post("update_profile_background_image", "account/update_profile_background_image");
    UpdateProfileImage => post("update_profile_image", "account/update_profile_image");
    UpdateProfileBannerImage => post("update_profile_banner_image", "account/update_profile_banner");
    RemoveProfileBanner => post("remove_profile_banner", "account/remove_profile_banner");
    ListBlocks => by_cursor(get("list_blocks", "blocks/list"), "users");
    ListBlockIds => by_cursor(get("list_block_ids", "blocks/ids"), "ids");
    CreateBlock => post("create_block", "blocks/create");
    DestroyBlock => post("destroy_block", "blocks/destroy");
    LookupUser => get("lookup_user", "users/lookup");
    ShowUser => get("show_user", "users/show");
    SearchUsers => get("search_users", "users/search");
    GetProfileBannerSizes => get("get_profile_banner_sizes", "users/profile_banner");
    ListMutes => by_cursor(get("list_mutes", "mutes/users/list"), "users");
    ListMuteIds => by_cursor(get("list_mute_ids", "mutes/users/ids"), "ids");
    CreateMute => post("create_mute", "mutes/users/create");
    DestroyMute => post("destroy_mute", "mutes/users/destroy");

    // Suggested Users
    GetUserSuggestionsBySlug => get("get_user_suggestions_by_slug", "users/suggestions/{{slug}}");
    GetUserSuggestions => get("get_user_suggestions", "users/suggestions");
    GetUserSuggestionsStatusesBySlug => get("get_user_suggestions_statuses_by_slug", "users/suggestions/{{slug}}/members");

    // Favorites
    GetFavorites => by_id(get("get_favorites", "favorites/list"), None);
    DestroyFavorite => post("destroy_favorite", "favorites/destroy");
    CreateFavorite => post("create_favorite", "favorites/create");

    // Lists
    ShowLists => get("show_lists", "lists/list");
    GetListStatuses => by_id(get("get_list_statuses", "lists/statuses"), None);
    DeleteListMember => post("delete_list_member", "lists/members/destroy");
    GetListMemberships => by_cursor(get("get_list_memberships", "lists/memberships"), "lists");
    GetListSubscribers => by_cursor(get("get_list_subscribers", "lists/subscribers"), "users");
    SubscribeToList => post("subscribe_to_list", "lists/subscribers/create");
    IsListSubscriber => get("is_list_subscriber", "lists/subscribers/show");
    UnsubscribeFromList => post("unsubscribe_from_list", "lists/subscribers/destroy");
    CreateListMembers => post("create_list_members", "lists/members/create_all");
    IsListMember => get("is_list_member", "lists/members/show");
    GetListMembers => by_cursor(get("get_list_members", "lists/members"), "users");
    AddListMember => post("add_list_member", "lists/members/create");
    DeleteList => post("delete_list", "lists/destroy");
    UpdateList => post("update_list", "lists/update");
    CreateList => post("create_list", "lists/create");
    GetSpecificList => get("get_specific_list", "lists/show");
    GetListSubscriptions => by_cursor(get("get_list_subscriptions", "lists/subscriptions"), "lists");
    DeleteListMembers => post("delete_list_members", "lists/members/destroy_all");
    ShowOwnedLists => by_cursor(get("show_owned_lists", "lists/ownerships"), "lists");

    // Saved Searches
    GetSavedSearches => get("get_saved_searches", "saved_searches/list");
    ShowSavedSearch => get("show_saved_search", "saved_searches/show/{{id}}");
    CreateSavedSearch => post("create_saved_search", "saved_searches/create");
    DestroySavedSearch => post("destroy_saved_search", "saved_searches/destroy/{{id}}");

    // Places & Geo
    GetGeoInfo => get("get_geo_info", "geo/id/{{place_id}}");
    ReverseGeocode => get("reverse_geocode", "geo/reverse_geocode");
    SearchGeo => get("search_geo", "geo/search");
    GetSimilarPlaces => get("get_similar_places", "geo/similar_places");

    // Trends
    GetPlaceTrends => get("get_place_trends", "trends/place");
    GetAvailableTrends => get("get_available_trends", "trends/available");
    GetClosestTrends => get("get_closest_trends", "trends/closest");

    // Spam Reporting
    ReportSpam => post("report_spam", "users/report_spam");

    // Help & Application
    GetTwitterConfiguration => get("get_twitter_configuration", "help/configuration");
    GetSupportedLanguages => get("get_supported_languages", "help/languages");
    GetPrivacyPolicy => get("get_privacy_policy", "help/privacy");
    GetTos => get("get_tos", "help/tos");
    GetApplicationRateLimitStatus => get("get_application_rate_limit_status", "application/rate_limit_status");
}

impl Endpoint {
    /// The logical operation name, like `get_home_timeline`.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(name: &str) -> Result<Endpoint> {
        Endpoint::all()
            .iter()
            .copied()
            .find(|e| e.name() == name)
            .ok_or_else(|| Error::UnknownEndpoint(name.to_string()))
    }
}
