//! WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! Parsing works on the request head already split into lines, so it can be
//! driven by any reader. Reading the lines off a socket lives in
//! [`crate::server::upgrade`].

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version the server speaks.
pub const WS_VERSION: &str = "13";

/// Response sent to requests that fail validation.
pub const BAD_REQUEST_RESPONSE: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wspoll::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Validate that a header value does not contain CR or LF characters.
///
/// # Errors
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Extract the resource path from the request line.
///
/// The path is the token between the first `/` and the next space, without
/// its leading `/`: `GET /chat HTTP/1.1` yields `chat`.
fn resource_path(request_line: &str) -> String {
    let Some(start) = request_line.find('/') else {
        return String::new();
    };
    let token = &request_line[start + 1..];
    let end = token.find(' ').unwrap_or(token.len());
    token[..end].to_string()
}

/// Parsed Upgrade request.
///
/// Header names are kept exactly as received; a repeated header keeps its
/// last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Requested resource, without the leading `/`.
    pub path: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// Parse the request head from its lines (line terminators removed).
    ///
    /// Lines without a `:` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadHandshake`] if there is no request line.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let (request_line, header_lines) = lines
            .split_first()
            .ok_or_else(|| Error::BadHandshake("Empty request".into()))?;

        let mut headers = HashMap::new();
        for line in header_lines {
            if let Some((name, value)) = line.as_ref().split_once(':') {
                headers.insert(name.to_string(), value.trim().to_string());
            }
        }

        Ok(Self {
            path: resource_path(request_line.as_ref()),
            headers,
        })
    }

    /// Look up a header by its exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The Sec-WebSocket-Key value, if present.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.header("Sec-WebSocket-Key")
    }

    /// The raw Cookie header, if present.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.header("Cookie")
    }

    /// The first subprotocol the client asked for, if any.
    #[must_use]
    pub fn subprotocol(&self) -> Option<&str> {
        self.header("Sec-WebSocket-Protocol")
            .and_then(|protocols| protocols.split(',').next())
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Check the headers the server insists on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadHandshake`] if:
    /// - `Connection` is not exactly `Upgrade`
    /// - `Sec-WebSocket-Version` is not `13`
    /// - `Sec-WebSocket-Key` is missing or empty
    pub fn validate(&self) -> Result<()> {
        match self.header("Connection") {
            Some("Upgrade") => {}
            other => {
                return Err(Error::BadHandshake(format!(
                    "Invalid Connection header: {:?}",
                    other
                )));
            }
        }

        match self.header("Sec-WebSocket-Version") {
            Some(WS_VERSION) => {}
            other => {
                return Err(Error::BadHandshake(format!(
                    "Unsupported WebSocket version: {:?} (expected 13)",
                    other
                )));
            }
        }

        match self.key() {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(Error::BadHandshake(
                "Missing Sec-WebSocket-Key header".into(),
            )),
        }
    }
}

/// The 101 Switching Protocols response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The subprotocol echoed back to the client.
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Build the response for a validated request.
    pub fn from_request(req: &HandshakeRequest) -> Self {
        Self {
            accept: compute_accept_key(req.key().unwrap_or_default()),
            protocol: req.subprotocol().map(str::to_string),
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if the protocol contains CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: WebSocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());

        if let Some(ref proto) = self.protocol {
            validate_header_value("Sec-WebSocket-Protocol", proto)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {}\r\n", proto).as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}
