//! Server side of the opening handshake over a bounded socket.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::codec::WsSocket;
use crate::config::{Config, Limits};
use crate::connection::{Connection, PeerInfo};
use crate::error::{Error, Result};
use crate::protocol::handshake::BAD_REQUEST_RESPONSE;
use crate::protocol::{HandshakeRequest, HandshakeResponse};

/// Read an Upgrade request from `socket`, answer it and wrap the socket in
/// an open [`Connection`].
///
/// Invalid requests get a `400 Bad Request` before the socket is closed. On
/// any failure the socket is closed and nothing is registered.
///
/// # Errors
///
/// - `Error::HandshakeReadTimeout` if the request head does not arrive in time
/// - `Error::BadHandshake` if the request is malformed or not an Upgrade
/// - `Error::HandshakeTooLarge` if the request head exceeds the limit
/// - `Error::HandshakeWriteError` if the 101 response cannot be written
/// - `Error::ConnectionClosed` if the peer hangs up mid-request
pub async fn upgrade<T>(mut socket: WsSocket<T>, address: SocketAddr, config: &Config) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let lines = match read_request_head(&mut socket, &config.limits).await {
        Ok(lines) => lines,
        Err(e @ (Error::BadHandshake(_) | Error::HandshakeTooLarge { .. })) => {
            return Err(reject(socket, address, e).await);
        }
        Err(e) => {
            debug!(%address, error = %e, "handshake read failed");
            socket.close().await;
            return Err(e);
        }
    };

    let request = match HandshakeRequest::from_lines(&lines).and_then(|req| {
        req.validate()?;
        Ok(req)
    }) {
        Ok(request) => request,
        Err(e) => return Err(reject(socket, address, e).await),
    };

    let mut response = Vec::new();
    if let Err(e) = HandshakeResponse::from_request(&request).write(&mut response) {
        return Err(reject(socket, address, e).await);
    }

    if let Err(e) = socket.write_all(&response).await {
        warn!(%address, error = %e, "failed to write handshake response");
        socket.close().await;
        return Err(Error::HandshakeWriteError(e.to_string()));
    }

    let info = PeerInfo {
        address,
        cookie: request.cookie().map(str::to_owned),
        subprotocol: request.subprotocol().map(str::to_owned),
        path: request.path,
    };
    debug!(%address, path = %info.path, "handshake complete");
    Ok(Connection::new(socket, info, config))
}

/// Read header lines up to the blank line that ends the request head.
async fn read_request_head<T>(socket: &mut WsSocket<T>, limits: &Limits) -> Result<Vec<String>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Vec::new();
    let mut consumed = 0usize;

    loop {
        let allowance = limits.max_handshake_size.saturating_sub(consumed);
        let line = socket.read_line(allowance).await.map_err(|e| match e {
            Error::ReadTimeout { .. } => Error::HandshakeReadTimeout,
            other => other,
        })?;

        consumed += line.len() + 2;
        limits.check_handshake_size(consumed)?;

        if line.is_empty() {
            return Ok(lines);
        }
        let line = String::from_utf8(line.to_vec())
            .map_err(|_| Error::BadHandshake("Request head is not valid UTF-8".into()))?;
        lines.push(line);
    }
}

async fn reject<T>(mut socket: WsSocket<T>, address: SocketAddr, err: Error) -> Error
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    warn!(%address, error = %err, "rejecting handshake");
    if let Err(e) = socket.write_all(BAD_REQUEST_RESPONSE).await {
        debug!(%address, error = %e, "400 response not delivered");
    }
    socket.close().await;
    match err {
        Error::HandshakeTooLarge { .. } | Error::BadHandshake(_) => err,
        other => Error::BadHandshake(other.to_string()),
    }
}
