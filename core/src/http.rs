//! HTTP request and response described as plain data.
//!
//! # Design
//! `PinboardClient::build_*` methods produce an `HttpRequest` without touching
//! the network, and `PinboardClient::parse_*` methods consume an
//! `HttpResponse`. A `Transport` executes the round-trip in between. Keeping
//! both ends as owned data lets tests feed synthetic responses straight into
//! the parsers.
//!
//! The remote API is read entirely through GET, so the request carries no
//! method or body.

/// A GET request with its fully resolved URL (query string included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// The endpoint path relative to the base URL, e.g. `posts/recent`.
    pub endpoint: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// A response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}
