//! WebSocket transport.
//!
//! Each opened link spawns a driver task that performs the handshake and
//! then runs an event loop over the socket and the link's command channel.
//!
//! # Event Loop
//!
//! - Incoming text and binary frames become [`LinkEvent::Message`]
//! - A close frame from the server becomes [`LinkEvent::Close`]
//! - Handshake and socket failures become [`LinkEvent::Error`]
//! - [`LinkCommand::Send`] writes a frame
//! - [`LinkCommand::Close`] starts the close handshake
//!
//! Ping and pong control frames are answered by tungstenite.
//!
//! [`LinkEvent::Message`]: super::LinkEvent::Message
//! [`LinkEvent::Close`]: super::LinkEvent::Close
//! [`LinkEvent::Error`]: super::LinkEvent::Error

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as ClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::protocol::{CloseInfo, Frame};
use crate::session::TransportKind;

use super::link::{Link, LinkCommand, Remote};
use super::{OpenRequest, Transport, WebSocketKind};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the opening handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    /// Creates a transport with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    type Kind = WebSocketKind;

    fn open(&self, request: OpenRequest) -> Link {
        let (link, remote) = Link::pair(TransportKind::WebSocket);
        tokio::spawn(run_driver(request, remote, self.connect_timeout));
        link
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Connects and runs the event loop for one link.
async fn run_driver(request: OpenRequest, mut remote: Remote, connect_timeout: Duration) {
    let endpoint = request.endpoint.clone();

    let client_request = match build_request(&request) {
        Ok(client_request) => client_request,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Invalid WebSocket request");
            remote.failed(e);
            return;
        }
    };

    debug!(endpoint = %endpoint, "WebSocket handshake started");

    let handshake = timeout(connect_timeout, connect_async(client_request));
    tokio::pin!(handshake);

    let stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok(Ok((stream, _response))) => break stream,
                Ok(Err(e)) => {
                    debug!(endpoint = %endpoint, error = %e, "WebSocket handshake failed");
                    remote.failed(TransportError::connect(e.to_string()));
                    return;
                }
                Err(_) => {
                    remote.failed(TransportError::connect(format!(
                        "handshake timed out after {}ms",
                        connect_timeout.as_millis()
                    )));
                    return;
                }
            },

            command = remote.next_command() => match command {
                Some(LinkCommand::Send(_)) => trace!("Dropping frame queued before open"),
                Some(LinkCommand::Close) | None => {
                    debug!(endpoint = %endpoint, "WebSocket abandoned before open");
                    return;
                }
            },
        }
    };

    if !remote.opened() {
        debug!(endpoint = %endpoint, "Session detached during handshake");
        return;
    }
    info!(endpoint = %endpoint, "WebSocket connected");

    let (mut ws_write, mut ws_read) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        remote.message(Frame::Text(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        remote.message(Frame::Binary(data));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let info = frame.map(|frame| {
                            CloseInfo::new(u16::from(frame.code), frame.reason.as_str())
                        });
                        debug!(endpoint = %endpoint, ?info, "WebSocket closed by remote");
                        // Flushes the queued close reply
                        if let Err(e) = ws_write.flush().await {
                            trace!(error = %e, "Close reply not flushed");
                        }
                        remote.closed(info);
                        break;
                    }

                    Some(Err(e)) => {
                        if closing {
                            remote.closed(None);
                        } else {
                            warn!(endpoint = %endpoint, error = %e, "WebSocket error");
                            remote.failed(TransportError::stream(e.to_string()));
                        }
                        break;
                    }

                    None => {
                        if closing {
                            remote.closed(None);
                        } else {
                            remote.failed(TransportError::stream(
                                "connection ended without close frame",
                            ));
                        }
                        break;
                    }

                    // Ping, Pong and raw frames
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the session
            command = remote.next_command() => {
                match command {
                    Some(LinkCommand::Send(frame)) => {
                        if let Err(e) = ws_write.send(to_message(frame)).await {
                            warn!(endpoint = %endpoint, error = %e, "Failed to send frame");
                            remote.failed(TransportError::send(e.to_string()));
                            break;
                        }
                    }

                    Some(LinkCommand::Close) => {
                        if !closing {
                            closing = true;
                            debug!(endpoint = %endpoint, "Close handshake started");
                            if let Err(e) = ws_write.close().await {
                                debug!(error = %e, "Close frame not sent");
                            }
                        }
                    }

                    None => {
                        debug!(endpoint = %endpoint, "Link dropped");
                        break;
                    }
                }
            }
        }
    }

    trace!(endpoint = %endpoint, "WebSocket driver terminated");
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the handshake request with subprotocols and extra headers.
fn build_request(request: &OpenRequest) -> Result<ClientRequest, TransportError> {
    let mut client_request = request
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::protocol(e.to_string()))?;

    let headers = client_request.headers_mut();

    if !request.options.protocols.is_empty() {
        let protocols = request.options.protocols.join(", ");
        let value = HeaderValue::from_str(&protocols).map_err(|e| {
            TransportError::protocol(format!("invalid subprotocol '{protocols}': {e}"))
        })?;
        headers.insert(SEC_WEBSOCKET_PROTOCOL, value);
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

    Ok(client_request)
}

/// Converts an outgoing frame to a WebSocket message.
fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Event(event) => Message::Text(event.data.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
