//! Domain entities returned by and sent to the API.
//!
//! # Design
//! Entities are plain data. A `Bookmark` decoded by a client remembers that
//! client's `ClientId` so callers holding several clients can tell where it
//! came from, but it never holds a reference to the client itself: the
//! `save`/`delete` shortcuts take the client explicitly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PinboardError;

/// URL schemes the service accepts for bookmarks.
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "javascript", "mailto", "ftp", "file"];

/// Length of a note id in lowercase hex digits.
pub const NOTE_ID_LEN: usize = 20;

/// Short fingerprint of the credentials a client was built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    pub(crate) fn from_credentials(user: &str, secret: &str) -> Self {
        let hash = blake3::hash(format!("{user}:{secret}").as_bytes());
        ClientId(hash.to_hex()[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Defaults to the time of saving on the server when unset.
    pub timestamp: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// `None` lets the server apply the account default.
    pub is_public: Option<bool>,
    pub is_unread: Option<bool>,

    // Read-only; never sent on save.
    pub hash: Option<String>,
    pub meta: Option<String>,
    pub others: Option<u64>,

    #[serde(skip)]
    origin: Option<ClientId>,
}

impl Bookmark {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    pub fn unread(mut self, is_unread: bool) -> Self {
        self.is_unread = Some(is_unread);
        self
    }

    /// The client that decoded this bookmark, if any.
    pub fn origin(&self) -> Option<&ClientId> {
        self.origin.as_ref()
    }

    pub(crate) fn set_origin(&mut self, origin: ClientId) {
        self.origin = Some(origin);
    }

    /// Checks the fields the service requires before a save.
    pub fn validate(&self) -> Result<(), PinboardError> {
        if self.url.trim().is_empty() {
            return Err(PinboardError::invalid_argument("URL is required"));
        }
        if self.title.trim().is_empty() {
            return Err(PinboardError::invalid_argument("Title is required"));
        }
        if !has_allowed_scheme(&self.url) {
            return Err(PinboardError::invalid_argument(format!(
                "Invalid URL: {}",
                self.url
            )));
        }
        Ok(())
    }
}

/// `true` when the URL starts with one of `ALLOWED_URL_SCHEMES` followed by
/// a colon, ignoring case.
pub fn has_allowed_scheme(url: &str) -> bool {
    url.split_once(':').is_some_and(|(scheme, _)| {
        ALLOWED_URL_SCHEMES
            .iter()
            .any(|allowed| scheme.eq_ignore_ascii_case(allowed))
    })
}

/// Anything that identifies a bookmark by URL.
pub trait AsUrl {
    fn as_url(&self) -> &str;
}

impl AsUrl for str {
    fn as_url(&self) -> &str {
        self
    }
}

impl AsUrl for String {
    fn as_url(&self) -> &str {
        self
    }
}

impl AsUrl for Bookmark {
    fn as_url(&self) -> &str {
        &self.url
    }
}

/// A tag and how many bookmarks carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub count: Option<u64>,
}

impl Tag {
    pub fn new(name: &str, count: Option<u64>) -> Self {
        Self {
            name: name.trim().to_string(),
            count,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A calendar day (`YYYY-MM-DD`) and how many bookmarks were saved on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDate {
    pub date: String,
    pub count: Option<u64>,
}

impl PostDate {
    pub fn new(date: &str, count: Option<u64>) -> Self {
        Self {
            date: date.trim().to_string(),
            count,
        }
    }
}

impl fmt::Display for PostDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.date)
    }
}

/// A note. `text` is only filled when a single note is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: String,
    pub title: String,
    pub hash: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub length: Option<u64>,
    pub text: Option<String>,
}

impl Note {
    pub(crate) fn new(id: String, title: String) -> Self {
        Self {
            id,
            title,
            hash: None,
            created_at: None,
            updated_at: None,
            length: None,
            text: None,
        }
    }

    /// Server-assigned, 20 lowercase hex digits.
    pub fn id(&self) -> &str {
        &self.id
    }
}

pub fn is_valid_note_id(id: &str) -> bool {
    id.len() == NOTE_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Outcome of a write call: success iff the server answered `done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: String,
}

impl Status {
    pub const DONE: &'static str = "done";

    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::DONE
    }
}

/// Tag suggestions for a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTags {
    pub popular: Vec<String>,
    pub recommended: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_url_and_title() {
        let err = Bookmark::new("", "Title").validate().unwrap_err();
        assert!(matches!(err, PinboardError::InvalidArgument(_)));
        let err = Bookmark::new("https://example.com", "  ").validate().unwrap_err();
        assert!(matches!(err, PinboardError::InvalidArgument(_)));
    }

    #[test]
    fn validate_checks_scheme() {
        assert!(Bookmark::new("gopher://x", "Gopher").validate().is_err());
        assert!(Bookmark::new("example.com", "No scheme").validate().is_err());
        for url in [
            "http://a",
            "HTTPS://a",
            "javascript:alert(1)",
            "mailto:me@example.com",
            "ftp://a",
            "file:///etc/hosts",
        ] {
            assert!(Bookmark::new(url, "ok").validate().is_ok(), "{url}");
        }
    }

    #[test]
    fn note_id_shape() {
        assert!(is_valid_note_id("0123456789abcdef0123"));
        assert!(!is_valid_note_id("0123456789abcdef012"));
        assert!(!is_valid_note_id("zzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_valid_note_id("0123456789ABCDEF0123"));
    }

    #[test]
    fn status_success_only_for_done() {
        assert!(Status::new("done").is_success());
        assert!(!Status::new("something went wrong").is_success());
        assert!(!Status::new("Done").is_success());
    }

    #[test]
    fn client_id_is_stable_and_short() {
        let a = ClientId::from_credentials("maciej", "hunter2");
        let b = ClientId::from_credentials("maciej", "hunter2");
        let c = ClientId::from_credentials("maciej", "hunter3");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 8);
    }

    #[test]
    fn tag_and_date_display_trimmed_name() {
        assert_eq!(Tag::new(" rust ", Some(3)).to_string(), "rust");
        assert_eq!(PostDate::new("2011-03-24 ", None).to_string(), "2011-03-24");
    }
}
