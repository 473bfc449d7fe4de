//! Server-Sent Events transport.
//!
//! Opens a streaming `GET` with reqwest and feeds the body through an
//! [`EventParser`]. Events named `message` or listed in
//! [`SseOptions::events`] are delivered as [`Frame::Event`]; the rest are
//! dropped.
//!
//! The stream ending is reported as an error: the session's retry policy
//! owns reconnection, and the next request carries `Last-Event-ID`.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result, TransportError};
use crate::protocol::{Frame, ServerEvent};
use crate::session::TransportKind;

use super::link::{Link, LinkCommand, Remote};
use super::{EventSourceKind, OpenRequest, Transport};

// ============================================================================
// Submodules
// ============================================================================

/// Incremental event-stream parser.
pub mod parser;

pub use parser::EventParser;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for receiving response headers.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "last-event-id";

// ============================================================================
// SseOptions
// ============================================================================

/// Event-stream transport options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseOptions {
    /// Named events delivered in addition to `message`.
    pub events: Vec<String>,
    /// Timeout for receiving the response headers.
    pub connect_timeout: Duration,
}

impl SseOptions {
    /// Creates options that deliver only `message` events.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Adds a named event to deliver.
    #[inline]
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Adds several named events to deliver.
    #[must_use]
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events.extend(events.into_iter().map(Into::into));
        self
    }

    /// Sets the response timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns `true` if events of this type are delivered.
    #[must_use]
    pub fn accepts(&self, event: &str) -> bool {
        event == ServerEvent::MESSAGE || self.events.iter().any(|name| name == event)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty event name or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.events.iter().any(String::is_empty) {
            return Err(Error::config(
                "Event names cannot be empty. \
                 Example: SseOptions::new().with_event(\"update\")",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config(
                "Connect timeout must be greater than zero. \
                 Example: SseOptions::new().with_connect_timeout(Duration::from_secs(10))",
            ));
        }
        Ok(())
    }
}

impl Default for SseOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SseTransport
// ============================================================================

/// Event-stream transport over reqwest.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    options: SseOptions,
}

impl SseTransport {
    /// Creates a transport with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_options(SseOptions::new())
    }

    /// Creates a transport with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid options, or [`Error::Http`] if
    /// the HTTP client cannot be initialized.
    pub fn with_options(options: SseOptions) -> Result<Self> {
        options.validate()?;
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;
        Ok(Self { client, options })
    }

    /// Creates a transport that reuses an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid options.
    pub fn with_client(client: Client, options: SseOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { client, options })
    }

    /// Returns the transport options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SseOptions {
        &self.options
    }
}

impl Transport for SseTransport {
    type Kind = EventSourceKind;

    fn open(&self, request: OpenRequest) -> Link {
        let (link, remote) = Link::pair(TransportKind::EventSource);
        tokio::spawn(run_driver(
            self.client.clone(),
            self.options.clone(),
            request,
            remote,
        ));
        link
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Sends the request and pumps the event stream for one link.
async fn run_driver(client: Client, options: SseOptions, request: OpenRequest, mut remote: Remote) {
    let endpoint = request.endpoint.clone();

    let headers = match build_headers(&request) {
        Ok(headers) => headers,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Invalid event-stream request");
            remote.failed(e);
            return;
        }
    };

    debug!(endpoint = %endpoint, last_event_id = ?request.last_event_id, "Event stream requested");

    let send = timeout(
        options.connect_timeout,
        client.get(endpoint.clone()).headers(headers).send(),
    );
    tokio::pin!(send);

    let response = loop {
        tokio::select! {
            result = &mut send => match result {
                Ok(Ok(response)) => break response,
                Ok(Err(e)) => {
                    debug!(endpoint = %endpoint, error = %e, "Event-stream request failed");
                    remote.failed(TransportError::connect(e.to_string()));
                    return;
                }
                Err(_) => {
                    remote.failed(TransportError::connect(format!(
                        "no response after {}ms",
                        options.connect_timeout.as_millis()
                    )));
                    return;
                }
            },

            command = remote.next_command() => match command {
                Some(LinkCommand::Send(_)) => trace!("Event streams are receive-only"),
                Some(LinkCommand::Close) | None => {
                    debug!(endpoint = %endpoint, "Event stream abandoned before open");
                    return;
                }
            },
        }
    };

    if let Err(e) = check_response(response.status(), response.headers()) {
        warn!(endpoint = %endpoint, error = %e, "Event stream rejected");
        remote.failed(e);
        return;
    }

    if !remote.opened() {
        debug!(endpoint = %endpoint, "Session detached before event stream opened");
        return;
    }
    info!(endpoint = %endpoint, "Event stream connected");

    let body = response.bytes_stream();
    tokio::pin!(body);
    let mut parser = EventParser::new();

    loop {
        tokio::select! {
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&bytes) {
                            if !deliver(&remote, &options, event) {
                                return;
                            }
                        }
                    }

                    Some(Err(e)) => {
                        warn!(endpoint = %endpoint, error = %e, "Event stream error");
                        remote.failed(TransportError::stream(e.to_string()));
                        break;
                    }

                    None => {
                        for event in parser.finish() {
                            deliver(&remote, &options, event);
                        }
                        debug!(endpoint = %endpoint, "Event stream ended");
                        remote.failed(TransportError::stream("event stream ended"));
                        break;
                    }
                }
            }

            command = remote.next_command() => {
                match command {
                    Some(LinkCommand::Send(_)) => trace!("Event streams are receive-only"),
                    Some(LinkCommand::Close) | None => {
                        debug!(endpoint = %endpoint, "Event stream closed locally");
                        remote.closed(None);
                        break;
                    }
                }
            }
        }
    }

    trace!(endpoint = %endpoint, "Event-stream driver terminated");
}

/// Forwards an event if its type is accepted. Returns `false` once the
/// session stopped listening.
fn deliver(remote: &Remote, options: &SseOptions, event: ServerEvent) -> bool {
    if !options.accepts(&event.event) {
        trace!(event = %event.event, "Dropping unsubscribed event");
        return !remote.is_detached();
    }
    remote.message(Frame::Event(event))
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the request headers.
fn build_headers(request: &OpenRequest) -> std::result::Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    if let Some(id) = request.last_event_id.as_deref().filter(|id| !id.is_empty()) {
        let value = HeaderValue::from_str(id).map_err(|e| {
            TransportError::protocol(format!("invalid last event id '{id}': {e}"))
        })?;
        headers.insert(HeaderName::from_static(LAST_EVENT_ID), value);
    }

    for (name, value) in &request.options.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::protocol(format!("invalid header name '{name}': {e}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::protocol(format!("invalid value for header '{name}': {e}"))
        })?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

/// Checks the status and content type of the response.
fn check_response(
    status: reqwest::StatusCode,
    headers: &HeaderMap,
) -> std::result::Result<(), TransportError> {
    if !status.is_success() {
        return Err(TransportError::connect(format!(
            "unexpected status {status}"
        )));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case(EVENT_STREAM) {
        return Err(TransportError::protocol(format!(
            "unexpected content type '{content_type}'"
        )));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use url::Url;

    use crate::error::TransportErrorKind;
    use crate::transport::TransportOptions;

    fn request(last_event_id: Option<&str>, options: TransportOptions) -> OpenRequest {
        OpenRequest {
            endpoint: Url::parse("http://127.0.0.1:9002/events").expect("valid url"),
            options,
            last_event_id: last_event_id.map(str::to_owned),
        }
    }

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_options_accepts() {
        let options = SseOptions::new().with_event("update");
        assert!(options.accepts("message"));
        assert!(options.accepts("update"));
        assert!(!options.accepts("delete"));

        let options = options.with_events(["delete", "insert"]);
        assert!(options.accepts("delete"));
        assert_eq!(options.events.len(), 3);
    }

    #[test]
    fn test_options_validate() {
        assert!(SseOptions::default().validate().is_ok());
        assert!(
            SseOptions::new()
                .with_event("")
                .validate()
                .unwrap_err()
                .is_config_error()
        );
        assert!(
            SseOptions::new()
                .with_connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_build_headers_defaults() {
        let headers = build_headers(&request(None, TransportOptions::new()))
            .expect("headers should build");
        assert_eq!(headers.get(ACCEPT), Some(&HeaderValue::from_static(EVENT_STREAM)));
        assert_eq!(
            headers.get(CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-cache"))
        );
        assert!(headers.get(LAST_EVENT_ID).is_none());
    }

    #[test]
    fn test_build_headers_last_event_id() {
        let headers = build_headers(&request(Some("42"), TransportOptions::new()))
            .expect("headers should build");
        assert_eq!(headers.get(LAST_EVENT_ID), Some(&HeaderValue::from_static("42")));

        let headers = build_headers(&request(Some(""), TransportOptions::new()))
            .expect("headers should build");
        assert!(headers.get(LAST_EVENT_ID).is_none());
    }

    #[test]
    fn test_build_headers_custom() {
        let options = TransportOptions::new().with_header("Authorization", "Bearer t");
        let headers = build_headers(&request(None, options)).expect("headers should build");
        assert_eq!(
            headers.get("authorization"),
            Some(&HeaderValue::from_static("Bearer t"))
        );

        let options = TransportOptions::new().with_header("bad header", "x");
        let err = build_headers(&request(None, options)).unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Protocol);
    }

    #[test]
    fn test_check_response() {
        let ok = reqwest::StatusCode::OK;
        assert!(check_response(ok, &content_type("text/event-stream")).is_ok());
        assert!(check_response(ok, &content_type("text/event-stream; charset=utf-8")).is_ok());

        let err = check_response(ok, &content_type("application/json")).unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Protocol);

        let err = check_response(ok, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Protocol);

        let err = check_response(
            reqwest::StatusCode::NOT_FOUND,
            &content_type("text/event-stream"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Connect);
        assert!(err.message().contains("404"));
    }

    #[test]
    fn test_deliver_filters_events() {
        let (link, remote) = Link::pair(TransportKind::EventSource);
        let (_handle, mut events) = link.into_parts();
        let options = SseOptions::new().with_event("update");

        assert!(deliver(&remote, &options, ServerEvent::message("a")));
        assert!(deliver(&remote, &options, ServerEvent::message("b").with_event("other")));
        assert!(deliver(&remote, &options, ServerEvent::message("c").with_event("update")));

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_transport_defaults() {
        let transport = SseTransport::new().expect("client should build");
        assert_eq!(transport.options(), &SseOptions::default());
        assert!(SseTransport::with_options(SseOptions::new().with_event("")).is_err());
    }
}
