// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Set of structs and methods that act as a sort of internal prelude.
//!
//! The elements available in this module and its children are fairly basic building blocks that
//! the other modules all import to make available as a common language. A lot of infrastructure
//! code goes in here.
//!
//! # Module contents
//!
//! ## Type Aliases
//!
//! * `hyper::header::HeaderMap<hyper::header::HeaderValue>` (re-exported as the alias `Headers`)
//!
//! ## `ParamList` and `Param`
//!
//! `ParamList` is the collection of keyword arguments to a given web call. Each value is a
//! `Param`, which keeps track of what kind of value the caller handed in (text, number, boolean,
//! list, or file) so that every web call encodes them the same way: booleans as the literal
//! strings `true`/`false`, lists joined with commas, and files pulled out into a multipart body.
//!
//! `normalize` is the step every dispatched call runs its parameters through. It splits file
//! values away from the rest and turns booleans into their text form. Lists are left alone until
//! the parameters are actually encoded, so that a normalized `ParamList` can be normalized again
//! without changing.
//!
//! `ParamList::from_json` is there for callers that assemble keyword arguments dynamically. JSON
//! has more value shapes than Twitter accepts (`null`, nested objects, lists of lists), and the
//! `ParamPolicy` given to it decides whether those are dropped or rejected.
//!
//! ## Miscellaneous functions
//!
//! `codepoints_to_bytes` is a convenience function for when Twitter returns text ranges in terms
//! of codepoint offsets rather than byte offsets. It takes the pair of numbers from twitter and
//! the string it refers to, and returns a pair that can be used directly to slice the given
//! string.
//!
//! `percent_encode` applies Twitter's flavor of percent-encoding, which is used both for the
//! request parameters and for the OAuth signature.
//!
//! ## `Response`
//!
//! In its own module, `Response` is a public structure that pairs the decoded output of a call
//! with the `CallRecord` describing the exchange (headers, status, URL, raw body). The module also
//! contains the functions that all web calls go through: the ones that load a web call, record
//! it, and sort failed responses into the right kind of error.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use hyper::header::{HeaderMap, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, PercentEncode};
use serde_json::Value;

mod response;

pub use crate::common::response::*;
use crate::error::{Error, Result};

// n.b. this type alias is re-exported at the crate root - these docs are public!
/// A set of headers returned with a response.
pub type Headers = HeaderMap<HeaderValue>;

/// A single value given as a parameter to a Twitter API call.
///
/// Most of the time you won't need to name this type directly: anything that can be a parameter
/// implements `Into<Param>`, so you can hand string slices, numbers, booleans, and `Vec`s of any of
/// those straight to `ParamList::add_param`.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A text value, sent as-is.
    Text(Cow<'static, str>),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer. Tweet and user IDs generally land here.
    UInt(u64),
    /// A floating-point number, like a latitude or longitude.
    Float(f64),
    /// A boolean flag. Sent as the literal text `true` or `false`.
    Bool(bool),
    /// A list of values. Sent as a single comma-separated string.
    List(Vec<String>),
    /// A file to upload. Files are never put in a query string; they force a POST body to be sent
    /// as `multipart/form-data`.
    File(FileParam),
}

impl Param {
    /// Renders this value the way it will be sent to Twitter, or `None` for files.
    pub fn encode(&self) -> Option<Cow<'_, str>> {
        match self {
            Param::Text(text) => Some(Cow::Borrowed(text.as_ref())),
            Param::Int(num) => Some(Cow::Owned(num.to_string())),
            Param::UInt(num) => Some(Cow::Owned(num.to_string())),
            Param::Float(num) => Some(Cow::Owned(num.to_string())),
            Param::Bool(true) => Some(Cow::Borrowed("true")),
            Param::Bool(false) => Some(Cow::Borrowed("false")),
            Param::List(items) => Some(Cow::Owned(items.join(","))),
            Param::File(_) => None,
        }
    }

    /// Returns whether this value is a file to upload.
    pub fn is_file(&self) -> bool {
        matches!(self, Param::File(_))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.encode() {
            Some(text) => f.write_str(&text),
            None => write!(f, "<file>"),
        }
    }
}

impl From<&'static str> for Param {
    fn from(src: &'static str) -> Param {
        Param::Text(Cow::Borrowed(src))
    }
}

impl From<String> for Param {
    fn from(src: String) -> Param {
        Param::Text(Cow::Owned(src))
    }
}

impl From<Cow<'static, str>> for Param {
    fn from(src: Cow<'static, str>) -> Param {
        Param::Text(src)
    }
}

impl From<bool> for Param {
    fn from(src: bool) -> Param {
        Param::Bool(src)
    }
}

impl From<i32> for Param {
    fn from(src: i32) -> Param {
        Param::Int(src.into())
    }
}

impl From<i64> for Param {
    fn from(src: i64) -> Param {
        Param::Int(src)
    }
}

impl From<u32> for Param {
    fn from(src: u32) -> Param {
        Param::UInt(src.into())
    }
}

impl From<u64> for Param {
    fn from(src: u64) -> Param {
        Param::UInt(src)
    }
}

impl From<f64> for Param {
    fn from(src: f64) -> Param {
        Param::Float(src)
    }
}

impl<T: ToString> From<Vec<T>> for Param {
    fn from(src: Vec<T>) -> Param {
        Param::List(src.iter().map(|item| item.to_string()).collect())
    }
}

impl<T: ToString> From<&[T]> for Param {
    fn from(src: &[T]) -> Param {
        Param::List(src.iter().map(|item| item.to_string()).collect())
    }
}

impl From<FileParam> for Param {
    fn from(src: FileParam) -> Param {
        Param::File(src)
    }
}

/// The contents of a file to upload alongside a request.
#[derive(Clone, PartialEq)]
pub struct FileParam {
    /// The file name reported to Twitter in the multipart body.
    pub filename: String,
    /// The content type reported for this part. Defaults to `application/octet-stream`.
    pub content_type: mime::Mime,
    /// The file contents.
    pub data: Vec<u8>,
}

impl FileParam {
    /// Wraps the given bytes as a file with the given name.
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> FileParam {
        FileParam {
            filename: filename.into(),
            content_type: mime::APPLICATION_OCTET_STREAM,
            data: data.into(),
        }
    }

    /// Reads the given stream to its end and wraps the contents as a file with the given name.
    pub fn from_reader(filename: impl Into<String>, mut reader: impl Read) -> Result<FileParam> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(FileParam::new(filename, data))
    }

    /// Sets the content type reported for this file.
    pub fn content_type(self, content_type: mime::Mime) -> FileParam {
        FileParam {
            content_type,
            ..self
        }
    }
}

impl fmt::Debug for FileParam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileParam")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// What to do with a keyword argument whose value can't be sent to Twitter.
///
/// This only comes up for parameters assembled from JSON with `ParamList::from_json`, since the
/// `Param` type can't hold anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPolicy {
    /// Leave the parameter out of the request. This is the default.
    Drop,
    /// Fail with `Error::UnsupportedParameter`.
    Reject,
}

impl Default for ParamPolicy {
    fn default() -> ParamPolicy {
        ParamPolicy::Drop
    }
}

// n.b. this type is re-exported at the crate root - these docs are public!
/// Represents a list of parameters to a Twitter API call.
///
/// This type is a wrapper around a `BTreeMap<Cow<'static, str>, Param>` to collect a set of
/// keyword arguments. These are then used to assemble and sign a Twitter API request. Keys are
/// kept in sorted order, so the query strings this crate generates are deterministic.
///
/// Most of the functions to add parameters follow a builder pattern, so that you can assemble a
/// `ParamList` in a single statement:
///
/// ```
/// use twython::ParamList;
///
/// let params = ParamList::new()
///     .add_param("q", "rustlang")
///     .add_param("include_entities", true)
///     .add_param("geocode", vec!["37.78", "-122.4", "1mi"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, derive_more::Deref, derive_more::DerefMut, derive_more::From)]
pub struct ParamList(BTreeMap<Cow<'static, str>, Param>);

impl ParamList {
    /// Creates a new, empty `ParamList`.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds the `tweet_mode=extended` parameter to this `ParamList`. Not including this parameter
    /// will cause tweets to be loaded with legacy parameters, and a potentially-truncated `text`
    /// if the tweet is longer than 140 characters.
    pub fn extended_tweets(self) -> Self {
        self.add_param("tweet_mode", "extended")
    }

    /// Adds the given key/value parameter to this `ParamList`.
    pub fn add_param(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Param>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Adds the given key/value parameter to this `ParamList` only if the given value is `Some`.
    pub fn add_opt_param(
        self,
        key: impl Into<Cow<'static, str>>,
        value: Option<impl Into<Param>>,
    ) -> Self {
        match value {
            Some(val) => self.add_param(key, val),
            None => self,
        }
    }

    /// Adds the given key/value to this `ParamList` by mutating it in place, rather than consuming
    /// it as in `add_param`.
    pub fn add_param_ref(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Param>) {
        self.0.insert(key.into(), value.into());
    }

    /// Merge the parameters from the given `ParamList` into this one.
    pub(crate) fn combine(&mut self, other: ParamList) {
        self.0.extend(other.0);
    }

    /// Loads a set of keyword arguments from a JSON object.
    ///
    /// Strings, numbers and booleans become the matching `Param`, and arrays of those become a
    /// `Param::List`. Anything else (`null`, objects, arrays holding either of those or other
    /// arrays) is handled according to `policy`.
    pub fn from_json(input: &Value, policy: ParamPolicy) -> Result<ParamList> {
        let object = match input {
            Value::Object(object) => object,
            Value::Null => return Ok(ParamList::new()),
            _ => return Err(Error::UnsupportedParameter("<root>".to_string())),
        };

        let mut params = ParamList::new();
        for (key, value) in object {
            match json_param(value) {
                Some(param) => params.add_param_ref(key.clone(), param),
                None if policy == ParamPolicy::Reject => {
                    return Err(Error::UnsupportedParameter(key.clone()));
                }
                None => tracing::debug!(param = %key, "dropping parameter with unsupported value"),
            }
        }

        Ok(params)
    }

    /// Returns an iterator over the encoded key/value pairs in this `ParamList`, skipping files.
    pub fn encoded_pairs(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.encode().map(|v| (k.as_ref(), v)))
    }

    /// Renders this `ParamList` as an `application/x-www-form-urlencoded` string.
    ///
    /// The key/value pairs are printed as `key1=value1&key2=value2`, with all keys and values
    /// being percent-encoded according to Twitter's requirements. Files are left out.
    pub fn to_urlencoded(&self) -> String {
        self.encoded_pairs()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_param(value: &Value) -> Option<Param> {
    match value {
        Value::String(s) => Some(Param::from(s.clone())),
        Value::Bool(b) => Some(Param::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Param::Int(i))
            } else if let Some(u) = n.as_u64() {
                Some(Param::UInt(u))
            } else {
                n.as_f64().map(Param::Float)
            }
        }
        Value::Array(items) => items
            .iter()
            .map(json_scalar)
            .collect::<Option<Vec<_>>>()
            .map(Param::List),
        Value::Null | Value::Object(_) => None,
    }
}

/// The files split out of a `ParamList` by `normalize`, keyed by parameter name.
pub type FileList = Vec<(String, FileParam)>;

/// Splits the given parameters into the values sent as text and the files sent as upload parts.
///
/// Boolean values are turned into the text `true` or `false` here. Everything else passes
/// through unchanged and is converted to text when the request is encoded. Running the returned
/// `ParamList` through `normalize` again gives back the same `ParamList` and no files.
pub fn normalize(params: ParamList) -> (ParamList, FileList) {
    let mut out = ParamList::new();
    let mut files = Vec::new();

    for (key, value) in params.0 {
        match value {
            Param::File(file) => files.push((key.into_owned(), file)),
            Param::Bool(b) => out.add_param_ref(key, if b { "true" } else { "false" }),
            other => out.add_param_ref(key, other),
        }
    }

    (out, files)
}

/// Converts a pair of codepoint offsets into byte offsets into `text`.
///
/// Offsets past the end of the text are clamped to `text.len()`.
pub fn codepoints_to_bytes(&mut (ref mut start, ref mut end): &mut (usize, usize), text: &str) {
    let to_byte = |cp: usize| {
        text.char_indices()
            .nth(cp)
            .map(|(by_offset, _)| by_offset)
            .unwrap_or_else(|| text.len())
    };
    *start = to_byte(*start);
    *end = to_byte(*end);
}

/// Percent-encodes the given string based on the Twitter API specification.
///
/// Twitter bases its encoding scheme on RFC 3986, Section 2.1. They describe the process in full
/// [in their documentation][twitter-percent], but the process can be summarized by saying that
/// every *byte* that is not an ASCII number or letter, or the ASCII characters `-`, `.`, `_`, or
/// `~` must be replaced with a percent sign (`%`) and the byte value in hexadecimal.
///
/// [twitter-percent]: https://developer.twitter.com/en/docs/basics/authentication/oauth-1-0a/percent-encoding-parameters
pub fn percent_encode(src: &str) -> PercentEncode {
    lazy_static::lazy_static! {
        static ref ENCODER: AsciiSet = percent_encoding::NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');
    }
    utf8_percent_encode(src, &*ENCODER)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs::File;
    use std::io::Read;
    use std::sync::{Arc, Mutex};

    use hyper::{Body, Method, Request};

    use crate::transport::{Transport, TransportFuture};

    pub(crate) fn load_file(path: &str) -> String {
        let mut file = File::open(path).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    /// A request captured by `StubTransport`.
    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub method: Method,
        pub uri: String,
        pub headers: Headers,
        pub body: Vec<u8>,
    }

    impl RecordedRequest {
        pub fn body_str(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }

        pub fn query(&self) -> Vec<(String, String)> {
            let url = url::Url::parse(&self.uri).unwrap();
            url.query_pairs().into_owned().collect()
        }
    }

    pub(crate) struct CannedResponse {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    pub(crate) fn canned(status: u16, body: &str) -> CannedResponse {
        CannedResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    impl CannedResponse {
        pub fn header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.push((name, value.to_string()));
            self
        }
    }

    /// Transport that replays canned responses in order and records what was sent.
    #[derive(Default)]
    pub(crate) struct StubTransport {
        responses: Mutex<VecDeque<CannedResponse>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl StubTransport {
        pub fn new(responses: Vec<CannedResponse>) -> Arc<StubTransport> {
            Arc::new(StubTransport {
                responses: Mutex::new(responses.into()),
                requests: Arc::new(Mutex::new(Vec::new())),
            })
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: Request<Body>) -> TransportFuture {
            let canned = self.responses.lock().unwrap().pop_front();
            let requests = self.requests.clone();
            Box::pin(async move {
                let (parts, body) = request.into_parts();
                let body = hyper::body::to_bytes(body).await?.to_vec();
                requests.lock().unwrap().push(RecordedRequest {
                    method: parts.method,
                    uri: parts.uri.to_string(),
                    headers: parts.headers,
                    body,
                });

                let canned = canned.expect("StubTransport ran out of canned responses");
                let mut builder = hyper::Response::builder().status(canned.status);
                for (name, value) in canned.headers {
                    builder = builder.header(name, value);
                }
                Ok(builder.body(Body::from(canned.body))?)
            })
        }
    }

    #[test]
    fn test_codepoints_to_bytes() {
        let unicode = "frônt Iñtërnâtiônàližætiøn ënd";
        // suppose we want to slice out the middle word.
        // 30 codepoints of which we want the middle 20;
        let mut range = (6, 26);
        codepoints_to_bytes(&mut range, unicode);
        assert_eq!(&unicode[range.0..range.1], "Iñtërnâtiônàližætiøn");

        let mut range = (6, 30);
        codepoints_to_bytes(&mut range, unicode);
        assert_eq!(&unicode[range.0..range.1], "Iñtërnâtiônàližætiøn ënd");

        let mut range = (31, 40);
        codepoints_to_bytes(&mut range, unicode);
        assert_eq!(range, (unicode.len(), unicode.len()));
    }

    #[test]
    fn booleans_encode_lowercase() {
        let params = ParamList::new()
            .add_param("include_entities", true)
            .add_param("trim_user", false);
        let (params, files) = normalize(params);

        assert!(files.is_empty());
        assert_eq!(params.to_urlencoded(), "include_entities=true&trim_user=false");
    }

    #[test]
    fn lists_join_with_commas() {
        let params = ParamList::new()
            .add_param("screen_name", vec!["a", "b", "c"])
            .add_param("geocode", vec![37.78, -122.4]);

        assert_eq!(params["screen_name"].encode().unwrap(), "a,b,c");
        assert_eq!(params["geocode"].encode().unwrap(), "37.78,-122.4");
        assert_eq!(
            params.to_urlencoded(),
            "geocode=37.78%2C-122.4&screen_name=a%2Cb%2Cc"
        );
    }

    #[test]
    fn normalize_splits_files() {
        let params = ParamList::new()
            .add_param("status", "hello")
            .add_param("media", FileParam::new("cat.png", vec![1u8, 2, 3]));
        let (params, files) = normalize(params);

        assert_eq!(params.len(), 1);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "media");
        assert_eq!(files[0].1.data, vec![1u8, 2, 3]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let params = ParamList::new()
            .add_param("q", "rust")
            .add_param("count", 20)
            .add_param("lat", 37.78)
            .add_param("include_rts", true)
            .add_param("ids", vec![1u64, 2, 3])
            .add_param("image", FileParam::new("a.gif", b"GIF89a".to_vec()));

        let (once, _) = normalize(params);
        let (twice, files) = normalize(once.clone());

        assert_eq!(once, twice);
        assert!(files.is_empty());
    }

    #[test]
    fn from_json_drops_unsupported() {
        let input = serde_json::json!({
            "q": "rust",
            "count": 10,
            "include_entities": true,
            "geocode": [37.78, -122.4, "1mi"],
            "nothing": null,
            "nested": {"a": 1},
            "deep": [[1, 2]],
        });

        let params = ParamList::from_json(&input, ParamPolicy::Drop).unwrap();

        assert_eq!(params.len(), 4);
        assert_eq!(params["geocode"].encode().unwrap(), "37.78,-122.4,1mi");
        assert_eq!(params["count"], Param::Int(10));
        assert!(params.get("nothing").is_none());
        assert!(params.get("nested").is_none());
    }

    #[test]
    fn from_json_rejects_unsupported() {
        let input = serde_json::json!({ "q": "rust", "nested": {"a": 1} });

        match ParamList::from_json(&input, ParamPolicy::Reject) {
            Err(Error::UnsupportedParameter(name)) => assert_eq!(name, "nested"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn percent_encoding_matches_twitter() {
        assert_eq!(
            percent_encode("Ladies + Gentlemen").to_string(),
            "Ladies%20%2B%20Gentlemen"
        );
        assert_eq!(percent_encode("An encoded string!").to_string(), "An%20encoded%20string%21");
        assert_eq!(percent_encode("a-b.c_d~e").to_string(), "a-b.c_d~e");
    }
}
