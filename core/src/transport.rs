//! Executing requests and classifying their outcome.
//!
//! # Design
//! `Transport` is the seam between the pure request/response layer and the
//! network. The default `UreqTransport` keeps one `ureq::Agent` for the
//! lifetime of a client so connections are reused between calls. Tests swap
//! in a transport that answers from memory.
//!
//! A transport reports HTTP statuses as data, never as errors. Turning a
//! status into a `PinboardError` is `check_status`'s job. The one exception
//! is a 200 whose body is not UTF-8: the transport cannot hand it over as
//! text, so it fails with the status attached and the error converts to
//! `InvalidResponse`.

use std::fmt;

use crate::config::ClientConfig;
use crate::error::PinboardError;
use crate::http::{HttpRequest, HttpResponse};

/// Largest body read into memory. `posts/all` on a big account is the
/// largest response the service produces.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// A failed exchange. Without a status no response line was received;
/// with one, the response arrived but its body could not be taken as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: Option<String>,
    status: Option<u16>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: (!message.is_empty()).then_some(message),
            status: None,
        }
    }

    /// A failure with nothing more specific to say.
    pub fn unknown() -> Self {
        Self {
            message: None,
            status: None,
        }
    }

    /// A response with `status` arrived but its body was unusable.
    pub fn undecodable_body(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("unknown connection error"))
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for PinboardError {
    fn from(err: TransportError) -> Self {
        match err.status {
            Some(status) => PinboardError::InvalidResponse {
                status,
                message: err.to_string(),
            },
            None => PinboardError::ConnectionError(err.to_string()),
        }
    }
}

/// Performs one GET per call. No retries.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking HTTPS transport backed by `ureq`.
///
/// Follows at most one redirect and decodes gzip transparently. A further
/// redirect is returned as the response, so its 3xx status reaches
/// `check_status`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout))
            .timeout_global(Some(config.request_timeout))
            .max_redirects(1)
            .max_redirects_will_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.get(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .call()
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| TransportError::new(e.to_string()))?;

        // Only a 200 body is decoded; other statuses keep their
        // classification whatever the body holds.
        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(err) if status == 200 => {
                return Err(TransportError::undecodable_body(
                    status,
                    format!("response body is not valid UTF-8: {err}"),
                ));
            }
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map the status of a response to the appropriate `PinboardError`.
pub fn check_status(response: &HttpResponse) -> Result<(), PinboardError> {
    match response.status {
        200 => Ok(()),
        401 => Err(PinboardError::AuthenticationFailure),
        429 => Err(PinboardError::TooManyRequests),
        status => Err(PinboardError::InvalidResponse {
            status,
            message: format!("server responded with HTTP status code {status}"),
        }),
    }
}
