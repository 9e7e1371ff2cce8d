//! Synchronous client for the Pinboard bookmarking API.
//!
//! # Overview
//! Builds authenticated GET requests, executes them through a `Transport`,
//! and maps XML or JSON responses onto `Bookmark`, `Tag`, `PostDate`, `Note`
//! and `Status` values.
//!
//! # Design
//! - Each endpoint is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_*` (consumes an `HttpResponse`); both are pure. The high-level
//!   methods on `PinboardClient` join them with one transport call.
//! - The response format (JSON or the legacy XML) is fixed per client. The
//!   decoder hides it behind `Document`, so the mapper is written once.
//! - The auth mode (Basic or `auth_token`) is derived from the shape of the
//!   secret when the client is built.
//! - Entities are plain data; no global registry links them to clients.
//!
//! ```no_run
//! use pinboard_core::{Credentials, PinboardClient};
//!
//! let client = PinboardClient::new(Credentials::new("maciej", "maciej:ABCDEF0123456789ABCD"));
//! for bookmark in client.get_recent(Some(10), Some("rust".into()))? {
//!     println!("{} {}", bookmark.url, bookmark.title);
//! }
//! # Ok::<(), pinboard_core::PinboardError>(())
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod mapper;
pub mod params;
pub mod transport;
pub mod types;

pub use client::{AllPostsQuery, PinboardClient, PostsQuery, DEFAULT_RECENT_COUNT, RECENT_COUNT_MAX};
pub use config::{AuthMode, ClientConfig, Credentials};
pub use decode::{Document, ResponseFormat};
pub use error::{ErrorKind, PinboardError};
pub use http::{HttpRequest, HttpResponse};
pub use params::{normalize_tags, to_remote_date, to_remote_datetime, Tags, When};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{AsUrl, Bookmark, ClientId, Note, PostDate, Status, SuggestedTags, Tag};
