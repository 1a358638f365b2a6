//! Request and response values carried through the pipeline.
//!
//! Both messages carry a mutable [`Parameters`] bag next to their wire
//! fields. Subscribers use it to attach cross-cutting metadata (elapsed
//! time, retry counters, the response's back-reference to its request)
//! without touching the wire representation.
//!
//! # Identity
//!
//! Every [`Request`] is assigned a [`RequestId`] when it is constructed.
//! Cloning and the `with_*` builders keep that identity, so a request that
//! has been started, stopped or retried is still the same logical request.
//! Subscribers pair requests and responses by identity, never by their
//! position in a batch.
//!
//! # Example
//!
//! ```
//! use courier_core::message::{HttpMethod, Request, Response};
//!
//! let request = Request::new(HttpMethod::Get, "https://example.com/todos")
//!     .with_header("Accept", "application/json");
//! let id = request.id();
//!
//! let response = Response::new(200, "[]").with_request(request);
//! assert_eq!(response.request().map(|r| r.id()), Some(id));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Response parameter holding the back-reference to the originating request.
pub const REQUEST_PARAMETER: &str = "request";

/// Request parameter holding the elapsed time in seconds once a timer stopped.
pub const TIMER_PARAMETER: &str = "timer";

/// Request parameter tagging a started timer (Unix seconds at start).
pub const TIMER_START_PARAMETER: &str = "timer_start";

/// Request parameter counting how many times the request was retried.
pub const RETRY_COUNT_PARAMETER: &str = "retry_count";

/// Request parameter that disables cache lookups and stores for a request.
pub const CACHE_BYPASS_PARAMETER: &str = "cache_bypass";

/// Response parameter marking a response that was served from the cache.
pub const CACHE_HIT_PARAMETER: &str = "cache_hit";

/// Stable identity of a logical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP method of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// The method as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether the method is safe (does not modify server state).
    #[must_use]
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored in a message's parameter bag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Free-form text
    Text(String),
    /// A request, used for the response back-reference
    Request(Box<Request>),
}

impl Parameter {
    /// Read a boolean parameter.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Read an integer parameter.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Read a numeric parameter as `f64` (integers are widened).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Read a text parameter.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Read a request parameter.
    #[must_use]
    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(request) => Some(request),
            _ => None,
        }
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Request> for Parameter {
    fn from(value: Request) -> Self {
        Self::Request(Box::new(value))
    }
}

/// Unordered key/value metadata carried alongside a message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters(HashMap<String, Parameter>);

impl Parameters {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Look up a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.0.get(name)
    }

    /// Whether a parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Parameter>) {
        self.0.insert(name.into(), value.into());
    }

    /// Remove a parameter, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.0.remove(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the parameters in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// An outgoing HTTP request with a stable identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    method: HttpMethod,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    parameters: Parameters,
}

impl Request {
    /// Create a request with a fresh identity.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            parameters: Parameters::new(),
        }
    }

    /// Identity of the request.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Parameter bag.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Look up a parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Return the same logical request with a parameter set.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Return the same logical request with a parameter removed.
    #[must_use]
    pub fn without_parameter(mut self, name: &str) -> Self {
        self.parameters.remove(name);
        self
    }

    /// Elapsed time recorded by a stopped timer.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.parameter(TIMER_PARAMETER)
            .and_then(Parameter::as_float)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Number of retries already performed for this request.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.parameter(RETRY_COUNT_PARAMETER)
            .and_then(Parameter::as_integer)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0)
    }

    /// Whether the request asks to skip the cache.
    #[must_use]
    pub fn bypasses_cache(&self) -> bool {
        self.parameter(CACHE_BYPASS_PARAMETER)
            .and_then(Parameter::as_bool)
            .unwrap_or(false)
    }
}

/// A received HTTP response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    parameters: Parameters,
}

impl Response {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            parameters: Parameters::new(),
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parameter bag.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Look up a parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Return the response with a parameter set.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Return the response with a parameter removed.
    #[must_use]
    pub fn without_parameter(mut self, name: &str) -> Self {
        self.parameters.remove(name);
        self
    }

    /// Return the response with its back-reference pointing at `request`.
    #[must_use]
    pub fn with_request(self, request: Request) -> Self {
        self.with_parameter(REQUEST_PARAMETER, request)
    }

    /// The request that produced this response, if recorded.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.parameter(REQUEST_PARAMETER).and_then(Parameter::as_request)
    }

    /// Whether the response was served from the cache.
    #[must_use]
    pub fn is_cache_hit(&self) -> bool {
        self.parameter(CACHE_HIT_PARAMETER)
            .and_then(Parameter::as_bool)
            .unwrap_or(false)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
