//! Request builders, response parsers and the operation catalog of the
//! Pinboard API.
//!
//! # Design
//! Every endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Both halves are pure, so they can be driven from test vectors or by a
//! caller that does its own I/O. The high-level methods (`get_recent`,
//! `save`, ...) compose `build_*`, the `Transport` and `parse_*`: one GET per
//! call, no retries.
//!
//! Argument validation happens in `build_*`, so an invalid argument is
//! reported before the transport is touched.
//!
//! `PinboardClient` is `Send` but not `Sync`: the last status lives in a
//! `RefCell`. Wrap it in a `Mutex` to share it between threads.

use std::cell::RefCell;

use chrono::{DateTime, Utc};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::{AuthMode, ClientConfig, Credentials};
use crate::decode::{Document, ResponseFormat};
use crate::error::PinboardError;
use crate::http::{HttpRequest, HttpResponse};
use crate::mapper;
use crate::params::{normalize_tags, to_remote_date, to_remote_datetime, yes_no, Params, Tags, When};
use crate::transport::{check_status, Transport, UreqTransport};
use crate::types::{is_valid_note_id, AsUrl, Bookmark, ClientId, Note, PostDate, Status, SuggestedTags, Tag};

/// Largest `count` accepted by `posts/recent`.
pub const RECENT_COUNT_MAX: u32 = 100;

/// `count` used by `get_recent` when the caller has no preference.
pub const DEFAULT_RECENT_COUNT: u32 = 15;

/// Arguments of `posts/all`. Unset fields are left to the server.
#[derive(Debug, Clone, Default)]
pub struct AllPostsQuery {
    /// Maximum number of results; `Some(0)` is treated as unset.
    pub count: Option<u32>,
    /// Offset into the result list; `0` is treated as unset.
    pub offset: Option<u32>,
    pub tags: Option<Tags>,
    pub from: Option<When>,
    pub to: Option<When>,
}

/// Arguments of `posts/get`.
#[derive(Debug, Clone, Default)]
pub struct PostsQuery {
    pub url: Option<String>,
    pub tags: Option<Tags>,
    pub date: Option<When>,
}

type LogSink = Box<dyn Fn(&str) + Send>;

/// Client for the Pinboard v1 API.
pub struct PinboardClient<T: Transport = UreqTransport> {
    credentials: Credentials,
    config: ClientConfig,
    auth_mode: AuthMode,
    id: ClientId,
    transport: T,
    last_status: RefCell<Option<String>>,
    log_sink: Option<LogSink>,
}

impl PinboardClient<UreqTransport> {
    /// A client with the default configuration and the ureq transport.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_config(credentials, ClientConfig::default())
    }

    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(credentials, config, transport)
    }
}

impl<T: Transport> PinboardClient<T> {
    pub fn with_transport(credentials: Credentials, config: ClientConfig, transport: T) -> Self {
        let auth_mode = credentials.auth_mode();
        let id = ClientId::from_credentials(credentials.user(), credentials.secret());
        tracing::debug!(user = %credentials.user(), ?auth_mode, format = ?config.format, "Created Pinboard client");
        Self {
            credentials,
            config,
            auth_mode,
            id,
            transport,
            last_status: RefCell::new(None),
            log_sink: None,
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn format(&self) -> ResponseFormat {
        self.config.format
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw result code of the most recent status-returning call.
    pub fn last_status(&self) -> Option<String> {
        self.last_status.borrow().clone()
    }

    /// Report every fully resolved request URL to `sink` before it is sent.
    pub fn enable_logging<F>(&mut self, sink: F)
    where
        F: Fn(&str) + Send + 'static,
    {
        self.log_sink = Some(Box::new(sink));
    }

    pub fn disable_logging(&mut self) {
        self.log_sink = None;
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Resolve `endpoint` and `params` into a request, adding the format and
    /// authentication parameters and the fixed headers.
    fn request(&self, endpoint: &str, mut params: Params) -> HttpRequest {
        if self.config.format == ResponseFormat::Json {
            params.push("format", "json");
        }

        let mut headers = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        match self.auth_mode {
            AuthMode::Token => {
                params.push("auth_token", self.credentials.secret());
            }
            AuthMode::Basic => {
                let pair = format!("{}:{}", self.credentials.user(), self.credentials.secret());
                headers.push((
                    "Authorization".to_string(),
                    format!("Basic {}", BASE64.encode(pair)),
                ));
            }
        }

        let mut url = self.config.endpoint_url(endpoint);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.to_query_string());
        }

        HttpRequest {
            endpoint: endpoint.to_string(),
            url,
            headers,
        }
    }

    pub fn build_update_time(&self) -> HttpRequest {
        self.request("posts/update", Params::new())
    }

    /// `None` asks for `DEFAULT_RECENT_COUNT` bookmarks.
    pub fn build_recent(&self, count: Option<u32>, tags: Option<&Tags>) -> Result<HttpRequest, PinboardError> {
        let count = count.unwrap_or(DEFAULT_RECENT_COUNT);
        if count > RECENT_COUNT_MAX {
            return Err(PinboardError::invalid_argument(format!(
                "Maximum permitted count is {RECENT_COUNT_MAX}"
            )));
        }
        let mut params = Params::new();
        params.push("count", count.to_string()).push_tags("tag", tags);
        Ok(self.request("posts/recent", params))
    }

    pub fn build_all(&self, query: &AllPostsQuery) -> Result<HttpRequest, PinboardError> {
        let mut params = Params::new();
        params
            .push_opt("results", query.count.filter(|c| *c > 0).map(|c| c.to_string()))
            .push_opt("start", query.offset.filter(|o| *o > 0).map(|o| o.to_string()))
            .push_tags("tag", query.tags.as_ref())
            .push_opt("fromdt", query.from.clone().map(to_remote_datetime).transpose()?)
            .push_opt("todt", query.to.clone().map(to_remote_datetime).transpose()?);
        Ok(self.request("posts/all", params))
    }

    pub fn build_get(&self, query: &PostsQuery) -> Result<HttpRequest, PinboardError> {
        let mut params = Params::new();
        params
            .push_opt("url", query.url.clone())
            .push_tags("tag", query.tags.as_ref())
            .push_opt("dt", query.date.clone().map(to_remote_date).transpose()?);
        Ok(self.request("posts/get", params))
    }

    /// Validates the bookmark before building the request. Server-only
    /// fields are never sent.
    pub fn build_save(&self, bookmark: &Bookmark, replace: bool) -> Result<HttpRequest, PinboardError> {
        bookmark.validate()?;
        let mut params = Params::new();
        params
            .push("url", bookmark.url.as_str())
            .push("description", bookmark.title.as_str())
            .push_opt("extended", bookmark.description.clone())
            .push("tags", normalize_tags(&bookmark.tags))
            .push("replace", yes_no(replace))
            .push_opt("dt", bookmark.timestamp.map(to_remote_datetime).transpose()?)
            .push_opt("shared", bookmark.is_public.map(yes_no))
            .push_opt("toread", bookmark.is_unread.map(yes_no));
        Ok(self.request("posts/add", params))
    }

    pub fn build_delete(&self, url: &str) -> HttpRequest {
        let mut params = Params::new();
        params.push("url", url);
        self.request("posts/delete", params)
    }

    pub fn build_dates(&self, tags: Option<&Tags>) -> HttpRequest {
        let mut params = Params::new();
        params.push_tags("tag", tags);
        self.request("posts/dates", params)
    }

    pub fn build_suggest(&self, url: &str) -> HttpRequest {
        let mut params = Params::new();
        params.push("url", url);
        self.request("posts/suggest", params)
    }

    pub fn build_tags(&self) -> HttpRequest {
        self.request("tags/get", Params::new())
    }

    pub fn build_rename_tag(&self, old: &str, new: &str) -> HttpRequest {
        let mut params = Params::new();
        params.push("old", old).push("new", new);
        self.request("tags/rename", params)
    }

    pub fn build_delete_tag(&self, tag: &str) -> HttpRequest {
        let mut params = Params::new();
        params.push("tag", tag);
        self.request("tags/delete", params)
    }

    pub fn build_rss_token(&self) -> HttpRequest {
        self.request("user/secret", Params::new())
    }

    pub fn build_api_token(&self) -> HttpRequest {
        self.request("user/api_token", Params::new())
    }

    pub fn build_notes(&self) -> HttpRequest {
        self.request("notes/list", Params::new())
    }

    pub fn build_note(&self, id: &str) -> Result<HttpRequest, PinboardError> {
        if !is_valid_note_id(id) {
            return Err(PinboardError::invalid_argument(format!("Invalid note id: {id:?}")));
        }
        Ok(self.request(&format!("notes/{id}"), Params::new()))
    }

    pub fn build_dump(&self) -> HttpRequest {
        self.request("posts/all", Params::new())
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    fn decode(&self, response: &HttpResponse) -> Result<Document, PinboardError> {
        check_status(response)?;
        self.config.format.decode(&response.body)
    }

    pub fn parse_update_time(&self, response: HttpResponse) -> Result<DateTime<Utc>, PinboardError> {
        mapper::update_time(&self.decode(&response)?)
    }

    pub fn parse_bookmarks(&self, response: HttpResponse) -> Result<Vec<Bookmark>, PinboardError> {
        mapper::bookmarks(&self.decode(&response)?, &self.id)
    }

    /// Records the raw code as the last status whatever its value.
    pub fn parse_status(&self, response: HttpResponse) -> Result<Status, PinboardError> {
        let status = mapper::status(&self.decode(&response)?);
        *self.last_status.borrow_mut() = Some(status.code.clone());
        if !status.is_success() {
            tracing::debug!(code = %status.code, "Write call was not accepted");
        }
        Ok(status)
    }

    pub fn parse_tags(&self, response: HttpResponse) -> Result<Vec<Tag>, PinboardError> {
        mapper::tags(&self.decode(&response)?)
    }

    pub fn parse_dates(&self, response: HttpResponse) -> Result<Vec<PostDate>, PinboardError> {
        mapper::dates(&self.decode(&response)?)
    }

    pub fn parse_suggested(&self, response: HttpResponse) -> Result<SuggestedTags, PinboardError> {
        Ok(mapper::suggested(&self.decode(&response)?))
    }

    pub fn parse_token(&self, response: HttpResponse) -> Result<Option<String>, PinboardError> {
        Ok(mapper::token(&self.decode(&response)?))
    }

    pub fn parse_notes(&self, response: HttpResponse) -> Result<Vec<Note>, PinboardError> {
        mapper::notes(&self.decode(&response)?)
    }

    pub fn parse_note(&self, response: HttpResponse) -> Result<Option<Note>, PinboardError> {
        mapper::single_note(&self.decode(&response)?)
    }

    /// The body unmodified, for bulk export.
    pub fn parse_raw(&self, response: HttpResponse) -> Result<String, PinboardError> {
        check_status(&response)?;
        Ok(response.body)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, PinboardError> {
        if let Some(sink) = &self.log_sink {
            sink(&request.url);
        }
        tracing::debug!(endpoint = %request.endpoint, url = %redact_token(&request.url), "Sending request");

        let response = self.transport.execute(request)?;

        if response.status == 200 {
            tracing::debug!(endpoint = %request.endpoint, status = response.status, "Received response");
        } else {
            tracing::warn!(endpoint = %request.endpoint, status = response.status, "Request was not successful");
        }
        Ok(response)
    }

    /// Time of the most recent change to any bookmark. Cheap; poll this
    /// before `get_all`.
    pub fn get_updated_time(&self) -> Result<DateTime<Utc>, PinboardError> {
        let request = self.build_update_time();
        self.parse_update_time(self.send(&request)?)
    }

    /// Up to `count` (at most `RECENT_COUNT_MAX`, `DEFAULT_RECENT_COUNT`
    /// when unset) most recent bookmarks.
    pub fn get_recent(&self, count: Option<u32>, tags: Option<Tags>) -> Result<Vec<Bookmark>, PinboardError> {
        let request = self.build_recent(count, tags.as_ref())?;
        self.parse_bookmarks(self.send(&request)?)
    }

    pub fn get_all(&self, query: &AllPostsQuery) -> Result<Vec<Bookmark>, PinboardError> {
        let request = self.build_all(query)?;
        self.parse_bookmarks(self.send(&request)?)
    }

    pub fn get(&self, query: &PostsQuery) -> Result<Vec<Bookmark>, PinboardError> {
        let request = self.build_get(query)?;
        self.parse_bookmarks(self.send(&request)?)
    }

    pub fn search_by_url(&self, url: &str) -> Result<Vec<Bookmark>, PinboardError> {
        self.get(&PostsQuery {
            url: Some(url.to_string()),
            ..PostsQuery::default()
        })
    }

    pub fn search_by_tag(&self, tags: impl Into<Tags>) -> Result<Vec<Bookmark>, PinboardError> {
        self.get_all(&AllPostsQuery {
            tags: Some(tags.into()),
            ..AllPostsQuery::default()
        })
    }

    pub fn search_by_date(&self, date: impl Into<When>) -> Result<Vec<Bookmark>, PinboardError> {
        self.get(&PostsQuery {
            date: Some(date.into()),
            ..PostsQuery::default()
        })
    }

    pub fn search_by_interval(
        &self,
        from: impl Into<When>,
        to: impl Into<When>,
    ) -> Result<Vec<Bookmark>, PinboardError> {
        self.get_all(&AllPostsQuery {
            from: Some(from.into()),
            to: Some(to.into()),
            ..AllPostsQuery::default()
        })
    }

    /// Add or edit a bookmark. With `replace == false` the server refuses to
    /// overwrite an existing bookmark for the same URL.
    pub fn save(&self, bookmark: &Bookmark, replace: bool) -> Result<Status, PinboardError> {
        let request = self.build_save(bookmark, replace)?;
        self.parse_status(self.send(&request)?)
    }

    pub fn delete<U: AsUrl + ?Sized>(&self, target: &U) -> Result<Status, PinboardError> {
        let request = self.build_delete(target.as_url());
        self.parse_status(self.send(&request)?)
    }

    pub fn get_dates(&self, tags: Option<Tags>) -> Result<Vec<PostDate>, PinboardError> {
        let request = self.build_dates(tags.as_ref());
        self.parse_dates(self.send(&request)?)
    }

    pub fn get_suggested_tags<U: AsUrl + ?Sized>(&self, target: &U) -> Result<SuggestedTags, PinboardError> {
        let request = self.build_suggest(target.as_url());
        self.parse_suggested(self.send(&request)?)
    }

    pub fn get_tags(&self) -> Result<Vec<Tag>, PinboardError> {
        let request = self.build_tags();
        self.parse_tags(self.send(&request)?)
    }

    pub fn rename_tag(&self, old: &str, new: &str) -> Result<Status, PinboardError> {
        let request = self.build_rename_tag(old, new);
        self.parse_status(self.send(&request)?)
    }

    pub fn delete_tag(&self, tag: &str) -> Result<Status, PinboardError> {
        let request = self.build_delete_tag(tag);
        self.parse_status(self.send(&request)?)
    }

    pub fn get_rss_token(&self) -> Result<Option<String>, PinboardError> {
        let request = self.build_rss_token();
        self.parse_token(self.send(&request)?)
    }

    pub fn get_api_token(&self) -> Result<Option<String>, PinboardError> {
        let request = self.build_api_token();
        self.parse_token(self.send(&request)?)
    }

    /// All notes, without their text.
    pub fn get_notes(&self) -> Result<Vec<Note>, PinboardError> {
        let request = self.build_notes();
        self.parse_notes(self.send(&request)?)
    }

    pub fn get_note(&self, id: &str) -> Result<Option<Note>, PinboardError> {
        let request = self.build_note(id)?;
        self.parse_note(self.send(&request)?)
    }

    /// Every bookmark as the raw response body, suitable for re-import.
    pub fn dump(&self) -> Result<String, PinboardError> {
        let request = self.build_dump();
        self.parse_raw(self.send(&request)?)
    }
}

impl Bookmark {
    /// Save through `client`, replacing any existing bookmark for the URL.
    pub fn save<T: Transport>(&self, client: &PinboardClient<T>) -> Result<Status, PinboardError> {
        client.save(self, true)
    }

    pub fn delete<T: Transport>(&self, client: &PinboardClient<T>) -> Result<Status, PinboardError> {
        client.delete(self)
    }

    /// Whether `client` is the one that decoded this bookmark.
    pub fn belongs_to<T: Transport>(&self, client: &PinboardClient<T>) -> bool {
        self.origin() == Some(client.id())
    }
}

/// The URL with the `auth_token` value masked.
fn redact_token(url: &str) -> String {
    let Some(start) = url.find("auth_token=").map(|i| i + "auth_token=".len()) else {
        return url.to_string();
    };
    let end = url[start..].find('&').map_or(url.len(), |i| start + i);
    format!("{}***{}", &url[..start], &url[end..])
}
