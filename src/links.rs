// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixed hosts and paths used outside the endpoint catalog.

pub const API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_API_VERSION: &str = "1.1";

pub mod auth {
    pub const REQUEST_TOKEN: &str = "oauth/request_token";
    pub const ACCESS_TOKEN: &str = "oauth/access_token";
    pub const AUTHORIZE: &str = "oauth/authorize";
    pub const AUTHENTICATE: &str = "oauth/authenticate";
    pub const BEARER_TOKEN: &str = "oauth2/token";
    pub const INVALIDATE_BEARER: &str = "oauth2/invalidate_token";
}

pub mod stream {
    pub const STREAM_HOST: &str = "https://stream.twitter.com";
    pub const USER_HOST: &str = "https://userstream.twitter.com";
    pub const SITE_HOST: &str = "https://sitestream.twitter.com";

    pub const FILTER: &str = "statuses/filter.json";
    pub const SAMPLE: &str = "statuses/sample.json";
    pub const FIREHOSE: &str = "statuses/firehose.json";
    pub const USER: &str = "user.json";
    pub const SITE: &str = "site.json";
}

pub mod web {
    pub const PROFILE: &str = "https://twitter.com";
    pub const HASHTAG_SEARCH: &str = "https://twitter.com/search?q=%23";
    pub const SYMBOL_SEARCH: &str = "https://twitter.com/search?q=%24";
}
