//! Parameter normalisation: tag lists, timestamps and the query string.
//!
//! # Design
//! Call arguments arrive in whatever shape is convenient for the caller (a
//! tag list or a space-separated string, an epoch or a date string). This
//! module turns them into the exact strings the remote service expects and
//! collects them, in insertion order, into `Params`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::PinboardError;

/// Characters left unescaped in query keys and values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const REMOTE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const REMOTE_DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Split every input on whitespace, drop empty tokens and join with single
/// spaces. Idempotent.
pub fn normalize_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for tag in tags {
        for token in tag.as_ref().split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(token);
        }
    }
    out
}

/// A normalised, space-separated tag string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(String);

impl Tags {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|t| !t.is_empty())
    }
}

impl std::fmt::Display for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tags {
    fn from(value: &str) -> Self {
        Tags(normalize_tags([value]))
    }
}

impl From<String> for Tags {
    fn from(value: String) -> Self {
        Tags(normalize_tags([value]))
    }
}

impl From<&String> for Tags {
    fn from(value: &String) -> Self {
        Tags(normalize_tags([value]))
    }
}

impl From<Vec<String>> for Tags {
    fn from(value: Vec<String>) -> Self {
        Tags(normalize_tags(value))
    }
}

impl From<&[String]> for Tags {
    fn from(value: &[String]) -> Self {
        Tags(normalize_tags(value))
    }
}

impl From<Vec<&str>> for Tags {
    fn from(value: Vec<&str>) -> Self {
        Tags(normalize_tags(value))
    }
}

impl From<&[&str]> for Tags {
    fn from(value: &[&str]) -> Self {
        Tags(normalize_tags(value))
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(value: [&str; N]) -> Self {
        Tags(normalize_tags(value))
    }
}

/// A point in time as accepted by the date arguments of the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum When {
    /// Seconds since the Unix epoch.
    Epoch(i64),
    /// An epoch in decimal digits, or a free-form date/time string.
    Text(String),
    At(DateTime<Utc>),
}

impl From<i64> for When {
    fn from(value: i64) -> Self {
        When::Epoch(value)
    }
}

impl From<&str> for When {
    fn from(value: &str) -> Self {
        When::Text(value.to_string())
    }
}

impl From<String> for When {
    fn from(value: String) -> Self {
        When::Text(value)
    }
}

impl From<DateTime<Utc>> for When {
    fn from(value: DateTime<Utc>) -> Self {
        When::At(value)
    }
}

impl When {
    /// Resolve to a UTC instant.
    pub fn resolve(&self) -> Result<DateTime<Utc>, PinboardError> {
        match self {
            When::Epoch(secs) => from_epoch(*secs),
            When::Text(text) => parse_time(text),
            When::At(at) => Ok(*at),
        }
    }
}

fn from_epoch(secs: i64) -> Result<DateTime<Utc>, PinboardError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| PinboardError::invalid_argument(format!("epoch {secs} is out of range")))
}

/// Parse an epoch string or a free-form date/time string. Strings without an
/// offset are taken as UTC; month names are matched in English only.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>, PinboardError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PinboardError::invalid_argument("empty date"));
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        let secs = text
            .parse::<i64>()
            .map_err(|_| PinboardError::invalid_argument(format!("epoch {text} is out of range")))?;
        return from_epoch(secs);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }
    }

    Err(PinboardError::invalid_argument(format!(
        "cannot parse {text:?} as a date"
    )))
}

/// Render as the wire datetime format `YYYY-MM-DDTHH:MM:SSZ` (UTC).
pub fn to_remote_datetime(value: impl Into<When>) -> Result<String, PinboardError> {
    let at = value.into().resolve()?;
    Ok(at.format(REMOTE_DATETIME_FORMAT).to_string())
}

/// Render as the wire date format `YYYY-MM-DD` (UTC). A string that already
/// has that shape passes through untouched.
pub fn to_remote_date(value: impl Into<When>) -> Result<String, PinboardError> {
    let value = value.into();
    if let When::Text(text) = &value {
        let text = text.trim();
        if is_plain_date(text) {
            return Ok(text.to_string());
        }
    }
    let at = value.resolve()?;
    Ok(at.format(REMOTE_DATE_FORMAT).to_string())
}

fn is_plain_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Query parameters in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    pub fn push_opt(&mut self, key: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Adds `tag` unless the filter is absent or normalises to nothing.
    pub fn push_tags(&mut self, key: &str, tags: Option<&Tags>) -> &mut Self {
        if let Some(tags) = tags.filter(|t| !t.is_empty()) {
            self.push(key, tags.as_str());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Percent-encoded `key=value&...`, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_VALUE),
                    utf8_percent_encode(v, QUERY_VALUE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// `yes`/`no` as used by the API for boolean flags.
pub(crate) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
