//! In-memory emulation of the Pinboard v1 API.
//!
//! Serves every endpoint the client uses under `/v1/`, answering in JSON when
//! the request carries `format=json` and in XML otherwise. Requests must
//! authenticate with HTTP Basic credentials or an `auth_token` parameter.
//! An optional request budget makes the server answer 429 once exhausted.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const POST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const NOTE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Account settings of the emulated service.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub user: String,
    pub password: String,
    /// Full API token, `user:HEX`.
    pub token: String,
    pub rss_secret: String,
    /// Requests answered before every further request gets 429.
    pub request_budget: Option<usize>,
    pub notes: Vec<Note>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            user: "maciej".to_string(),
            password: "hunter2".to_string(),
            token: "maciej:ABCDEF0123456789ABCD".to_string(),
            rss_secret: "6ee7b1c0aee4bd31a7b8".to_string(),
            request_budget: None,
            notes: vec![Note::new("Groceries", "milk\neggs\n")],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Post {
    pub href: String,
    pub description: String,
    pub extended: String,
    pub tags: Vec<String>,
    pub time: DateTime<Utc>,
    pub shared: bool,
    pub toread: bool,
    pub hash: String,
    pub meta: String,
}

#[derive(Clone, Debug)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub text: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: &str, text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: hex_id(20),
            title: title.to_string(),
            text: text.to_string(),
            hash: hex_id(20),
            created_at: now,
            updated_at: now,
        }
    }
}

fn hex_id(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

pub struct Account {
    config: MockConfig,
    posts: Vec<Post>,
    notes: Vec<Note>,
    requests: usize,
    updated: DateTime<Utc>,
}

pub type Db = Arc<RwLock<Account>>;

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let account = Account {
        notes: config.notes.clone(),
        config,
        posts: Vec::new(),
        requests: 0,
        updated: Utc::now(),
    };
    let db: Db = Arc::new(RwLock::new(account));
    Router::new()
        .route("/v1/{*endpoint}", get(dispatch))
        .with_state(db)
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

/// Both renderings of one answer; the dispatcher picks by `format`.
struct Payload {
    json: Value,
    xml: String,
}

fn result_payload(code: &str) -> Payload {
    Payload {
        json: json!({ "result_code": code }),
        xml: format!(r#"<result code="{}" />"#, escape(code)),
    }
}

fn text_payload(text: &str) -> Payload {
    Payload {
        json: json!({ "result": text }),
        xml: format!("<result>{}</result>", escape(text)),
    }
}

async fn dispatch(
    State(db): State<Db>,
    Path(endpoint): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut account = db.write().await;

    if !account.authenticated(&params, &headers) {
        tracing::debug!(%endpoint, "Rejecting unauthenticated request");
        return (StatusCode::UNAUTHORIZED, "401 Forbidden").into_response();
    }

    account.requests += 1;
    if let Some(budget) = account.config.request_budget {
        if account.requests > budget {
            tracing::debug!(%endpoint, "Request budget exhausted");
            return (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
        }
    }

    let payload = match endpoint.as_str() {
        "posts/update" => account.update_time(),
        "posts/recent" => account.recent(&params),
        "posts/all" => account.all(&params),
        "posts/get" => account.get(&params),
        "posts/add" => account.add(&params),
        "posts/delete" => account.delete(&params),
        "posts/dates" => account.dates(&params),
        "posts/suggest" => account.suggest(&params),
        "tags/get" => account.tags(),
        "tags/rename" => account.rename_tag(&params),
        "tags/delete" => account.delete_tag(&params),
        "user/secret" => text_payload(&account.config.rss_secret),
        "user/api_token" => {
            let hex = account.config.token.rsplit(':').next().unwrap_or_default().to_string();
            text_payload(&hex)
        }
        "notes/list" => account.notes(),
        other => match other.strip_prefix("notes/") {
            Some(id) => account.note(id),
            None => return StatusCode::NOT_FOUND.into_response(),
        },
    };
    tracing::debug!(%endpoint, "Answered request");

    if params.get("format").map(String::as_str) == Some("json") {
        Json(payload.json).into_response()
    } else {
        (
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n{}", payload.xml),
        )
            .into_response()
    }
}

impl Account {
    fn authenticated(&self, params: &HashMap<String, String>, headers: &HeaderMap) -> bool {
        if let Some(token) = params.get("auth_token") {
            return *token == self.config.token;
        }
        let expected = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", self.config.user, self.config.password))
        );
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    fn update_time(&self) -> Payload {
        let time = self.updated.format(POST_TIME_FORMAT).to_string();
        Payload {
            json: json!({ "update_time": time }),
            xml: format!(r#"<update time="{time}" />"#),
        }
    }

    fn filtered<'a>(&'a self, params: &'a HashMap<String, String>) -> impl Iterator<Item = &'a Post> {
        let wanted: Vec<&str> = params
            .get("tag")
            .map(|t| t.split_whitespace().collect())
            .unwrap_or_default();
        self.posts
            .iter()
            .filter(move |p| wanted.iter().all(|w| p.tags.iter().any(|t| t.as_str() == *w)))
    }

    fn recent(&self, params: &HashMap<String, String>) -> Payload {
        let count = params
            .get("count")
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(15)
            .min(100);
        let posts: Vec<&Post> = self.filtered(params).take(count).collect();
        self.post_list(&posts, true)
    }

    fn all(&self, params: &HashMap<String, String>) -> Payload {
        let start = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
        let results = params
            .get("results")
            .and_then(|s| s.parse().ok())
            .unwrap_or(usize::MAX);
        let from = params.get("fromdt").and_then(|d| parse_post_time(d));
        let to = params.get("todt").and_then(|d| parse_post_time(d));
        let posts: Vec<&Post> = self
            .filtered(params)
            .filter(|p| from.map_or(true, |f| p.time >= f))
            .filter(|p| to.map_or(true, |t| p.time <= t))
            .skip(start)
            .take(results)
            .collect();
        self.post_list(&posts, false)
    }

    fn get(&self, params: &HashMap<String, String>) -> Payload {
        let url = params.get("url");
        let day = params
            .get("dt")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .or_else(|| match url {
                Some(_) => None,
                None => self.posts.first().map(|p| p.time.date_naive()),
            });
        let posts: Vec<&Post> = self
            .filtered(params)
            .filter(|p| url.map_or(true, |u| &p.href == u))
            .filter(|p| day.map_or(true, |d| p.time.date_naive() == d))
            .collect();
        self.post_list(&posts, true)
    }

    /// `posts/all` answers a bare JSON array; the other listings wrap it.
    fn post_list(&self, posts: &[&Post], wrapped: bool) -> Payload {
        let items: Vec<Value> = posts.iter().map(|p| post_json(p)).collect();
        let json = if wrapped {
            let date = posts
                .first()
                .map(|p| p.time.format(POST_TIME_FORMAT).to_string())
                .unwrap_or_default();
            json!({ "date": date, "user": self.config.user, "posts": items })
        } else {
            Value::Array(items)
        };
        let xml = format!(
            r#"<posts user="{}">{}</posts>"#,
            escape(&self.config.user),
            posts.iter().map(|p| post_xml(p)).collect::<String>()
        );
        Payload { json, xml }
    }

    fn add(&mut self, params: &HashMap<String, String>) -> Payload {
        let (Some(url), Some(title)) = (params.get("url"), params.get("description")) else {
            return result_payload("missing url or description");
        };
        let replace = params.get("replace").map_or(true, |r| r == "yes");
        let existing = self.posts.iter().position(|p| &p.href == url);
        if existing.is_some() && !replace {
            return result_payload("item already exists");
        }
        let time = match params.get("dt") {
            Some(dt) => match parse_post_time(dt) {
                Some(time) => time,
                None => return result_payload("invalid dt"),
            },
            None => Utc::now(),
        };
        let post = Post {
            href: url.clone(),
            description: title.clone(),
            extended: params.get("extended").cloned().unwrap_or_default(),
            tags: params
                .get("tags")
                .map(|t| t.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            time,
            shared: params.get("shared").map_or(true, |s| s == "yes"),
            toread: params.get("toread").is_some_and(|s| s == "yes"),
            hash: hex_id(32),
            meta: hex_id(32),
        };
        if let Some(index) = existing {
            self.posts.remove(index);
        }
        let at = self
            .posts
            .iter()
            .position(|p| p.time <= post.time)
            .unwrap_or(self.posts.len());
        self.posts.insert(at, post);
        self.updated = Utc::now();
        result_payload("done")
    }

    fn delete(&mut self, params: &HashMap<String, String>) -> Payload {
        let Some(url) = params.get("url") else {
            return result_payload("missing url");
        };
        match self.posts.iter().position(|p| &p.href == url) {
            Some(index) => {
                self.posts.remove(index);
                self.updated = Utc::now();
                result_payload("done")
            }
            None => result_payload("item not found"),
        }
    }

    fn dates(&self, params: &HashMap<String, String>) -> Payload {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for post in self.filtered(params) {
            let day = post.time.format("%Y-%m-%d").to_string();
            match counts.iter_mut().find(|(d, _)| *d == day) {
                Some((_, n)) => *n += 1,
                None => counts.push((day, 1)),
            }
        }
        let tag = params.get("tag").cloned().unwrap_or_default();
        let dates: Map<String, Value> = counts
            .iter()
            .map(|(d, n)| (d.clone(), Value::String(n.to_string())))
            .collect();
        Payload {
            json: json!({ "user": self.config.user, "tag": tag, "dates": dates }),
            xml: format!(
                r#"<dates user="{}" tag="{}">{}</dates>"#,
                escape(&self.config.user),
                escape(&tag),
                counts
                    .iter()
                    .map(|(d, n)| format!(r#"<date count="{n}" date="{d}" />"#))
                    .collect::<String>()
            ),
        }
    }

    fn tag_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for tag in self.posts.iter().flat_map(|p| &p.tags) {
            match counts.iter_mut().find(|(t, _)| t == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag.clone(), 1)),
            }
        }
        counts
    }

    fn suggest(&self, params: &HashMap<String, String>) -> Payload {
        let popular: Vec<String> = params
            .get("url")
            .and_then(|u| self.posts.iter().find(|p| &p.href == u))
            .map(|p| p.tags.clone())
            .unwrap_or_default();
        let mut ranked = self.tag_counts();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let recommended: Vec<String> = ranked.into_iter().take(3).map(|(t, _)| t).collect();

        let element = |name: &str, values: &[String]| {
            values
                .iter()
                .map(|v| format!("<{name}>{}</{name}>", escape(v)))
                .collect::<String>()
        };
        Payload {
            json: json!([{ "popular": popular }, { "recommended": recommended }]),
            xml: format!(
                "<suggested>{}{}</suggested>",
                element("popular", &popular),
                element("recommended", &recommended)
            ),
        }
    }

    fn tags(&self) -> Payload {
        let counts = self.tag_counts();
        let json: Map<String, Value> = counts
            .iter()
            .map(|(t, n)| (t.clone(), Value::from(*n)))
            .collect();
        Payload {
            json: Value::Object(json),
            xml: format!(
                "<tags>{}</tags>",
                counts
                    .iter()
                    .map(|(t, n)| format!(r#"<tag count="{n}" tag="{}" />"#, escape(t)))
                    .collect::<String>()
            ),
        }
    }

    fn rename_tag(&mut self, params: &HashMap<String, String>) -> Payload {
        let (Some(old), Some(new)) = (params.get("old"), params.get("new")) else {
            return text_payload("missing old or new");
        };
        for post in &mut self.posts {
            for tag in post.tags.iter_mut().filter(|t| t.as_str() == old.as_str()) {
                *tag = new.clone();
            }
        }
        self.updated = Utc::now();
        text_payload("done")
    }

    fn delete_tag(&mut self, params: &HashMap<String, String>) -> Payload {
        let Some(victim) = params.get("tag") else {
            return text_payload("missing tag");
        };
        for post in &mut self.posts {
            post.tags.retain(|t| t != victim);
        }
        self.updated = Utc::now();
        text_payload("done")
    }

    fn notes(&self) -> Payload {
        let items: Vec<Value> = self.notes.iter().map(|n| note_json(n, false)).collect();
        Payload {
            json: json!({ "count": items.len(), "notes": items }),
            xml: format!(
                "<notes>{}</notes>",
                self.notes.iter().map(|n| note_xml(n, false)).collect::<String>()
            ),
        }
    }

    fn note(&self, id: &str) -> Payload {
        match self.notes.iter().find(|n| n.id == id) {
            Some(note) => Payload {
                json: note_json(note, true),
                xml: note_xml(note, true),
            },
            None => Payload {
                json: json!({}),
                xml: "<note />".to_string(),
            },
        }
    }
}

fn parse_post_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn post_json(post: &Post) -> Value {
    json!({
        "href": post.href,
        "description": post.description,
        "extended": post.extended,
        "meta": post.meta,
        "hash": post.hash,
        "time": post.time.format(POST_TIME_FORMAT).to_string(),
        "shared": yes_no(post.shared),
        "toread": yes_no(post.toread),
        "tags": post.tags.join(" "),
    })
}

/// Like the real service, omits `shared` for public and `toread` for read
/// bookmarks.
fn post_xml(post: &Post) -> String {
    let mut xml = format!(
        r#"<post href="{}" time="{}" description="{}" extended="{}" tag="{}" hash="{}" meta="{}""#,
        escape(&post.href),
        post.time.format(POST_TIME_FORMAT),
        escape(&post.description),
        escape(&post.extended),
        escape(&post.tags.join(" ")),
        post.hash,
        post.meta,
    );
    if !post.shared {
        xml.push_str(r#" shared="no""#);
    }
    if post.toread {
        xml.push_str(r#" toread="yes""#);
    }
    xml.push_str(" />");
    xml
}

fn note_json(note: &Note, with_text: bool) -> Value {
    let mut value = json!({
        "id": note.id,
        "hash": note.hash,
        "title": note.title,
        "length": note.text.len().to_string(),
        "created_at": note.created_at.format(NOTE_TIME_FORMAT).to_string(),
        "updated_at": note.updated_at.format(NOTE_TIME_FORMAT).to_string(),
    });
    if with_text {
        value["text"] = Value::String(note.text.clone());
    }
    value
}

fn note_xml(note: &Note, with_text: bool) -> String {
    let text = if with_text {
        format!("<text>{}</text>", escape(&note.text))
    } else {
        String::new()
    };
    format!(
        r#"<note id="{}"><title>{}</title><hash>{}</hash><created_at>{}</created_at><updated_at>{}</updated_at><length>{}</length>{text}</note>"#,
        note.id,
        escape(&note.title),
        note.hash,
        note.created_at.format(NOTE_TIME_FORMAT),
        note.updated_at.format(NOTE_TIME_FORMAT),
        note.text.len(),
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
