//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Parse results are compared as serialized JSON
//! so that fields the vectors leave out are checked as absent.

use pinboard_core::{
    AllPostsQuery, Bookmark, ClientConfig, Credentials, ErrorKind, HttpRequest, HttpResponse,
    PinboardClient, PinboardError, PostsQuery, ResponseFormat, Tags, When,
};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000/v1/";
const TOKEN: &str = "maciej:ABCDEF0123456789ABCD";

fn client(case: &Value) -> PinboardClient {
    let format: ResponseFormat = case["format"].as_str().unwrap().parse().unwrap();
    let secret = case["secret"].as_str().unwrap_or(TOKEN);
    let config = ClientConfig::default().with_base_url(BASE_URL).with_format(format);
    PinboardClient::with_config(Credentials::new("maciej", secret), config)
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse::new(sim["status"].as_u64().unwrap() as u16, sim["body"].as_str().unwrap())
}

fn tags(input: &Value) -> Option<Tags> {
    input.get("tags").and_then(Value::as_str).map(Tags::from)
}

/// Dates in vectors are either epoch seconds or free text.
fn when(value: Option<&Value>) -> Option<When> {
    match value? {
        Value::Number(n) => Some(When::Epoch(n.as_i64().unwrap())),
        Value::String(s) => Some(When::from(s.as_str())),
        other => panic!("unsupported date value: {other}"),
    }
}

fn count(input: &Value, key: &str) -> Option<u32> {
    input.get(key).and_then(Value::as_u64).map(|c| c as u32)
}

fn check_request(name: &str, req: &HttpRequest, case: &Value) {
    let expected = &case["expected_request"];
    assert_eq!(
        req.url,
        format!("{BASE_URL}{}", expected["url"].as_str().unwrap()),
        "{name}: url"
    );
    if let Some(auth) = expected.get("authorization") {
        assert_eq!(req.header("Authorization"), auth.as_str(), "{name}: authorization");
    }
    assert!(req.header("User-Agent").is_some(), "{name}: user agent");
}

fn bookmarks_query(
    c: &PinboardClient,
    operation: &str,
    input: &Value,
) -> Result<HttpRequest, PinboardError> {
    match operation {
        "recent" => c.build_recent(count(input, "count"), tags(input).as_ref()),
        "all" => c.build_all(&AllPostsQuery {
            count: count(input, "count"),
            offset: count(input, "offset"),
            tags: tags(input),
            from: when(input.get("from")),
            to: when(input.get("to")),
        }),
        "get" => c.build_get(&PostsQuery {
            url: input.get("url").and_then(Value::as_str).map(str::to_string),
            tags: tags(input),
            date: when(input.get("date")),
        }),
        other => panic!("unknown bookmark operation: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Bookmark listings
// ---------------------------------------------------------------------------

#[test]
fn bookmark_test_vectors() {
    let raw = include_str!("../../test-vectors/bookmarks.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let c = client(case);

        // Verify build
        let req = bookmarks_query(&c, case["operation"].as_str().unwrap(), &case["input"]).unwrap();
        check_request(name, &req, case);

        // Verify parse
        let bookmarks = c.parse_bookmarks(simulated(case)).unwrap();
        assert!(bookmarks.iter().all(|b| b.belongs_to(&c)), "{name}: origin");
        let expected: Vec<Bookmark> = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(
            serde_json::to_value(&bookmarks).unwrap(),
            serde_json::to_value(&expected).unwrap(),
            "{name}: parsed result"
        );
    }
}

// ---------------------------------------------------------------------------
// Write calls
// ---------------------------------------------------------------------------

#[test]
fn status_test_vectors() {
    let raw = include_str!("../../test-vectors/statuses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let c = client(case);

        // Verify build
        let req = match case["operation"].as_str().unwrap() {
            "save" => {
                let bookmark: Bookmark = serde_json::from_value(input["bookmark"].clone()).unwrap();
                c.build_save(&bookmark, input["replace"].as_bool().unwrap()).unwrap()
            }
            "delete" => c.build_delete(input["url"].as_str().unwrap()),
            "rename_tag" => c.build_rename_tag(
                input["old"].as_str().unwrap(),
                input["new"].as_str().unwrap(),
            ),
            "delete_tag" => c.build_delete_tag(input["tag"].as_str().unwrap()),
            other => panic!("{name}: unknown operation: {other}"),
        };
        check_request(name, &req, case);

        // Verify parse
        let status = c.parse_status(simulated(case)).unwrap();
        let code = case["expected_code"].as_str().unwrap();
        assert_eq!(status.code, code, "{name}: code");
        assert_eq!(
            status.is_success(),
            case["expected_success"].as_bool().unwrap(),
            "{name}: success"
        );
        assert_eq!(c.last_status().as_deref(), Some(code), "{name}: last status");
    }
}

// ---------------------------------------------------------------------------
// Tags, dates, suggestions, notes, tokens
// ---------------------------------------------------------------------------

#[test]
fn listing_test_vectors() {
    let raw = include_str!("../../test-vectors/listings.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let c = client(case);
        let response = simulated(case);

        let (req, result) = match case["operation"].as_str().unwrap() {
            "tags" => (c.build_tags(), to_value(c.parse_tags(response))),
            "dates" => (c.build_dates(tags(input).as_ref()), to_value(c.parse_dates(response))),
            "suggest" => (
                c.build_suggest(input["url"].as_str().unwrap()),
                to_value(c.parse_suggested(response)),
            ),
            "notes" => (c.build_notes(), to_value(c.parse_notes(response))),
            "note" => (
                c.build_note(input["id"].as_str().unwrap()).unwrap(),
                to_value(c.parse_note(response)),
            ),
            "rss_token" => (c.build_rss_token(), to_value(c.parse_token(response))),
            "api_token" => (c.build_api_token(), to_value(c.parse_token(response))),
            "update_time" => (c.build_update_time(), to_value(c.parse_update_time(response))),
            other => panic!("{name}: unknown operation: {other}"),
        };
        check_request(name, &req, case);
        assert_eq!(result, case["expected_result"], "{name}: parsed result");
    }
}

fn to_value<T: serde::Serialize>(result: Result<T, PinboardError>) -> Value {
    serde_json::to_value(result.unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let c = client(case);

        // Build failures never produce a request to answer.
        let built = match case["operation"].as_str().unwrap() {
            "tags" => Ok(c.build_tags()),
            "note" => c.build_note(input["id"].as_str().unwrap()),
            operation => bookmarks_query(&c, operation, input),
        };

        let err = match built {
            Err(err) => {
                assert!(case.get("simulated_response").is_none(), "{name}: build should succeed");
                err
            }
            Ok(_) => {
                let response = simulated(case);
                match case["operation"].as_str().unwrap() {
                    "tags" => c.parse_tags(response).map(|_| ()),
                    _ => c.parse_bookmarks(response).map(|_| ()),
                }
                .unwrap_err()
            }
        };

        let kind = match case["expected_error"].as_str().unwrap() {
            "InvalidArgument" => ErrorKind::InvalidArgument,
            "AuthenticationFailure" => ErrorKind::AuthenticationFailure,
            "TooManyRequests" => ErrorKind::TooManyRequests,
            "InvalidResponse" => ErrorKind::InvalidResponse,
            other => panic!("{name}: unknown expected_error: {other}"),
        };
        assert_eq!(err.kind(), kind, "{name}: {err}");

        if let Some(expected_status) = case.get("expected_status") {
            match err {
                PinboardError::InvalidResponse { status, .. } => {
                    assert_eq!(u64::from(status), expected_status.as_u64().unwrap(), "{name}: status")
                }
                other => panic!("{name}: expected InvalidResponse, got {other:?}"),
            }
        }
    }
}
