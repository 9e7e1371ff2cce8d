//! End-to-end tests against the in-memory mock service.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation over real HTTP with the default ureq transport, in both response
//! formats and both authentication modes.

use std::net::SocketAddr;

use chrono::Utc;
use pinboard_core::{
    AllPostsQuery, AuthMode, Bookmark, ClientConfig, Credentials, PinboardClient, PinboardError,
    ResponseFormat,
};
use pinboard_mock::MockConfig;

const USER: &str = "maciej";
const PASSWORD: &str = "hunter2";
const TOKEN: &str = "maciej:ABCDEF0123456789ABCD";

/// Start a mock server on a random port and return its address.
fn spawn_server(config: MockConfig) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            pinboard_mock::run_with(listener, config).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr, secret: &str, format: ResponseFormat) -> PinboardClient {
    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}/v1/"))
        .with_format(format);
    PinboardClient::with_config(Credentials::new(USER, secret), config)
}

#[test]
fn json_token_lifecycle() {
    let addr = spawn_server(MockConfig::default());
    let client = client(addr, TOKEN, ResponseFormat::Json);
    assert_eq!(client.auth_mode(), AuthMode::Token);

    // Step 1: nothing saved yet.
    client.get_updated_time().unwrap();
    assert!(client.get_recent(None, None).unwrap().is_empty());

    // Step 2: save two bookmarks.
    let rust = Bookmark::new("https://www.rust-lang.org/", "Rust")
        .with_description("A language empowering everyone")
        .with_tags(["rust", "lang"])
        .unread(true);
    assert!(client.save(&rust, true).unwrap().is_success());
    let docs = Bookmark::new("https://docs.rs/", "Docs.rs")
        .with_tags(["rust docs"])
        .public(false);
    assert!(client.save(&docs, true).unwrap().is_success());
    assert_eq!(client.last_status().as_deref(), Some("done"));

    // Step 3: saving again without replace is refused but not an error.
    let status = client.save(&rust, false).unwrap();
    assert!(!status.is_success());
    assert_eq!(client.last_status().as_deref(), Some("item already exists"));

    // Step 4: list everything.
    let all = client.get_all(&AllPostsQuery::default()).unwrap();
    assert_eq!(all.len(), 2);
    let saved = all.iter().find(|b| b.url == rust.url).unwrap();
    assert_eq!(saved.title, "Rust");
    assert_eq!(saved.description.as_deref(), Some("A language empowering everyone"));
    assert_eq!(saved.tags, vec!["rust", "lang"]);
    assert_eq!(saved.is_public, Some(true));
    assert_eq!(saved.is_unread, Some(true));
    assert!(saved.hash.is_some());
    assert!(saved.belongs_to(&client));
    let private = all.iter().find(|b| b.url == docs.url).unwrap();
    assert_eq!(private.is_public, Some(false));
    assert_eq!(private.is_unread, Some(false));

    // Step 5: paging and filters.
    let page = client
        .get_all(&AllPostsQuery {
            count: Some(1),
            offset: Some(1),
            ..AllPostsQuery::default()
        })
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(client.search_by_tag("docs").unwrap().len(), 1);
    assert_eq!(client.search_by_tag(vec!["rust", "lang"]).unwrap().len(), 1);
    assert_eq!(client.search_by_url(&rust.url).unwrap()[0].title, "Rust");
    let today = Utc::now().format("%Y-%m-%d").to_string();
    assert_eq!(client.search_by_date(today.as_str()).unwrap().len(), 2);
    let from = Utc::now() - chrono::Duration::hours(1);
    let to = Utc::now() + chrono::Duration::hours(1);
    assert_eq!(client.search_by_interval(from, to).unwrap().len(), 2);

    // Step 6: tags, dates, suggestions.
    let tags = client.get_tags().unwrap();
    let rust_tag = tags.iter().find(|t| t.name == "rust").unwrap();
    assert_eq!(rust_tag.count, Some(2));
    let dates = client.get_dates(None).unwrap();
    assert_eq!(dates.len(), 1);
    assert_eq!(dates[0].date, today);
    assert_eq!(dates[0].count, Some(2));
    let suggested = client.get_suggested_tags(&rust).unwrap();
    assert_eq!(suggested.popular, vec!["rust", "lang"]);
    assert!(suggested.recommended.contains(&"rust".to_string()));

    // Step 7: tag maintenance.
    assert!(client.rename_tag("lang", "language").unwrap().is_success());
    assert_eq!(client.search_by_tag("language").unwrap().len(), 1);
    assert!(client.delete_tag("docs").unwrap().is_success());
    assert!(client.search_by_tag("docs").unwrap().is_empty());

    // Step 8: user secrets.
    assert_eq!(client.get_api_token().unwrap().as_deref(), Some("ABCDEF0123456789ABCD"));
    assert!(client.get_rss_token().unwrap().is_some());

    // Step 9: notes.
    let notes = client.get_notes().unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].text.is_none());
    let note = client.get_note(notes[0].id()).unwrap().unwrap();
    assert_eq!(note.title, "Groceries");
    assert_eq!(note.text.as_deref(), Some("milk\neggs\n"));
    assert!(client.get_note("0000000000000000ffff").unwrap().is_none());

    // Step 10: raw dump.
    let dump = client.dump().unwrap();
    assert!(dump.contains("https://www.rust-lang.org/"));

    // Step 11: delete through the bookmark shortcut, then by url.
    assert!(saved.delete(&client).unwrap().is_success());
    assert!(client.delete(docs.url.as_str()).unwrap().is_success());
    assert!(!client.delete(docs.url.as_str()).unwrap().is_success());
    assert_eq!(client.last_status().as_deref(), Some("item not found"));
    assert!(client.get_all(&AllPostsQuery::default()).unwrap().is_empty());
}

#[test]
fn xml_basic_lifecycle() {
    let addr = spawn_server(MockConfig::default());
    let client = client(addr, PASSWORD, ResponseFormat::Xml);
    assert_eq!(client.auth_mode(), AuthMode::Basic);

    let bookmark = Bookmark::new("https://example.com/a?b=c&d=e", "Ampersands & <angles>")
        .with_tags(["  xml ", "escaping"]);
    assert!(bookmark.save(&client).unwrap().is_success());

    let recent = client.get_recent(Some(5), Some("xml".into())).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].url, bookmark.url);
    assert_eq!(recent[0].title, "Ampersands & <angles>");
    assert_eq!(recent[0].tags, vec!["xml", "escaping"]);
    // The XML answer omits `shared` and `toread` for public, read bookmarks.
    assert_eq!(recent[0].is_public, Some(true));
    assert_eq!(recent[0].is_unread, Some(false));

    let tags = client.get_tags().unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(client.get_dates(Some("escaping".into())).unwrap()[0].count, Some(1));
    assert!(client.get_rss_token().unwrap().is_some());

    let notes = client.get_notes().unwrap();
    let note = client.get_note(notes[0].id()).unwrap().unwrap();
    assert_eq!(note.text.as_deref(), Some("milk\neggs\n"));
    assert_eq!(note.length, Some(10));

    assert!(client.dump().unwrap().starts_with("<?xml"));
    assert!(client.delete(&bookmark).unwrap().is_success());
}

#[test]
fn wrong_password_is_authentication_failure() {
    let addr = spawn_server(MockConfig::default());
    let client = client(addr, "not-the-password", ResponseFormat::Json);
    let err = client.get_tags().unwrap_err();
    assert!(matches!(err, PinboardError::AuthenticationFailure));
}

#[test]
fn exhausted_budget_is_too_many_requests() {
    let addr = spawn_server(MockConfig {
        request_budget: Some(2),
        ..MockConfig::default()
    });
    let client = client(addr, TOKEN, ResponseFormat::Json);
    client.get_tags().unwrap();
    client.get_tags().unwrap();
    let err = client.get_tags().unwrap_err();
    assert!(matches!(err, PinboardError::TooManyRequests));
}

#[test]
fn unknown_endpoint_is_invalid_response() {
    let addr = spawn_server(MockConfig::default());
    // A base URL outside /v1/ makes every endpoint 404.
    let config = ClientConfig::default().with_base_url(format!("http://{addr}/v2/"));
    let client = PinboardClient::with_config(Credentials::new(USER, TOKEN), config);
    let err = client.get_tags().unwrap_err();
    assert!(matches!(err, PinboardError::InvalidResponse { status: 404, .. }));
}
