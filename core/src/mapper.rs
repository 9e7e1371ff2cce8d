//! Mapping decoded documents onto domain entities.
//!
//! The XML and JSON formats disagree on absent flags. XML omits `shared` for
//! public bookmarks and `toread` for read ones, so absence maps to public and
//! read. JSON always spells both out and is read literally: only `"yes"` is
//! true, and absence is false.

use chrono::{DateTime, Utc};

use crate::decode::{Document, Record, ResponseFormat};
use crate::error::PinboardError;
use crate::params::parse_time;
use crate::types::{Bookmark, ClientId, Note, PostDate, Status, SuggestedTags, Tag};

/// Bookmarks from `posts/recent`, `posts/all` and `posts/get`. Entries
/// without a URL are skipped.
pub fn bookmarks(doc: &Document, origin: &ClientId) -> Result<Vec<Bookmark>, PinboardError> {
    let mut out = Vec::new();
    for record in doc.records("post", "posts") {
        match bookmark(&record)? {
            Some(mut bookmark) => {
                bookmark.set_origin(origin.clone());
                out.push(bookmark);
            }
            None => tracing::trace!(?record, "Skipping bookmark without href"),
        }
    }
    Ok(out)
}

fn bookmark(record: &Record) -> Result<Option<Bookmark>, PinboardError> {
    let Some(url) = record.get("href").filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    let tags_field = match record.format() {
        ResponseFormat::Xml => "tag",
        ResponseFormat::Json => "tags",
    };

    let mut bookmark = Bookmark::new(url, record.get("description").unwrap_or_default());
    bookmark.description = record.get("extended").map(str::to_string);
    bookmark.timestamp = record.get("time").map(server_time).transpose()?;
    bookmark.tags = record
        .get(tags_field)
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    bookmark.hash = record.get("hash").map(str::to_string);
    bookmark.meta = record.get("meta").map(str::to_string);
    bookmark.others = record.get("others").map(|o| number(o, "others")).transpose()?;

    let (is_public, is_unread) = match record.format() {
        ResponseFormat::Xml => (
            record.get("shared").map_or(true, |s| s == "yes"),
            record.get("toread").map_or(false, |s| s == "yes"),
        ),
        ResponseFormat::Json => (
            record.get("shared") == Some("yes"),
            record.get("toread") == Some("yes"),
        ),
    };
    bookmark.is_public = Some(is_public);
    bookmark.is_unread = Some(is_unread);

    Ok(Some(bookmark))
}

/// `tags/get`.
pub fn tags(doc: &Document) -> Result<Vec<Tag>, PinboardError> {
    Ok(doc
        .counts("tag", "tag", None)?
        .into_iter()
        .map(|(name, count)| Tag::new(&name, Some(count)))
        .collect())
}

/// `posts/dates`.
pub fn dates(doc: &Document) -> Result<Vec<PostDate>, PinboardError> {
    Ok(doc
        .counts("date", "date", Some("dates"))?
        .into_iter()
        .map(|(date, count)| PostDate::new(&date, Some(count)))
        .collect())
}

/// `notes/list`.
pub fn notes(doc: &Document) -> Result<Vec<Note>, PinboardError> {
    doc.records("note", "notes").iter().map(note).collect()
}

/// `notes/<id>`: the body is a single note rather than a listing. An empty
/// answer yields `None`.
pub fn single_note(doc: &Document) -> Result<Option<Note>, PinboardError> {
    let listed = notes(doc)?;
    if !listed.is_empty() {
        return Ok(listed.into_iter().next());
    }
    match doc.root_record() {
        Some(record) if record.has("id") => note(&record).map(Some),
        _ => Ok(None),
    }
}

fn note(record: &Record) -> Result<Note, PinboardError> {
    let id = record
        .get("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PinboardError::malformed("note without id"))?;
    let mut note = Note::new(id.to_string(), record.get("title").unwrap_or_default().to_string());
    note.hash = record.get("hash").map(str::to_string);
    note.created_at = record.get("created_at").map(server_time).transpose()?;
    note.updated_at = record.get("updated_at").map(server_time).transpose()?;
    note.length = record.get("length").map(|l| number(l, "length")).transpose()?;
    note.text = record.get("text").map(str::to_string);
    Ok(note)
}

/// `posts/suggest`.
pub fn suggested(doc: &Document) -> SuggestedTags {
    SuggestedTags {
        popular: doc.string_list("popular"),
        recommended: doc.string_list("recommended"),
    }
}

/// Result code of a write call. A body with no code at all maps to an
/// empty, unsuccessful status.
pub fn status(doc: &Document) -> Status {
    Status::new(doc.result_code().unwrap_or_default())
}

/// `posts/update`.
pub fn update_time(doc: &Document) -> Result<DateTime<Utc>, PinboardError> {
    let raw = doc
        .scalar("time", "update_time")
        .ok_or_else(|| PinboardError::malformed("update time missing"))?;
    server_time(&raw)
}

/// `user/secret` and `user/api_token`.
pub fn token(doc: &Document) -> Option<String> {
    doc.result_text()
}

fn server_time(raw: &str) -> Result<DateTime<Utc>, PinboardError> {
    parse_time(raw).map_err(|_| PinboardError::malformed(format!("unparsable time {raw:?}")))
}

fn number(raw: &str, field: &str) -> Result<u64, PinboardError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| PinboardError::malformed(format!("{field} {raw:?} is not a number")))
}
