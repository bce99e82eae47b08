//! Raw WebSocket client for driving the server over loopback.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use wspoll::protocol::{Frame, OpCode};

pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const MASK: [u8; 4] = [0xa1, 0xb2, 0xc3, 0xd4];
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    /// Connect and send a valid Upgrade request for `path`, plus any extra
    /// header lines. The response is not read.
    pub async fn connect(addr: SocketAddr, path: &str, extra: &[&str]) -> Self {
        let mut request = format!(
            "GET /{path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {SAMPLE_KEY}\r\n\
             Sec-WebSocket-Version: 13\r\n"
        );
        for line in extra {
            request.push_str(line);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");
        Self::connect_raw(addr, request.as_bytes()).await
    }

    /// Connect and send arbitrary bytes.
    pub async fn connect_raw(addr: SocketAddr, bytes: &[u8]) -> Self {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream.write_all(bytes).await.expect("write request");
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Read the HTTP response head, up to and including the blank line.
    pub async fn read_response(&mut self) -> String {
        loop {
            if let Some(end) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buf.drain(..end + 4).collect();
                return String::from_utf8(head).expect("utf-8 response");
            }
            assert!(self.fill().await > 0, "connection closed before response");
        }
    }

    /// Read until the server closes the connection.
    pub async fn read_to_close(&mut self) -> Vec<u8> {
        while self.fill().await > 0 {}
        std::mem::take(&mut self.buf)
    }

    pub async fn send_frame(&mut self, frame: &Frame) {
        self.send_raw(&masked(frame)).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.send_frame(&Frame::text(text)).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write frame");
    }

    /// Read the next frame sent by the server, or `None` on close.
    pub async fn read_frame(&mut self) -> Option<Frame> {
        loop {
            if let Ok((frame, consumed)) = Frame::parse(&self.buf) {
                self.buf.drain(..consumed);
                return Some(frame);
            }
            if self.fill().await == 0 {
                return None;
            }
        }
    }

    /// Read frames until one with `opcode` arrives.
    pub async fn expect_frame(&mut self, opcode: OpCode) -> Frame {
        loop {
            let frame = self.read_frame().await.expect("connection closed");
            if frame.opcode == opcode {
                return frame;
            }
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.stream.local_addr().expect("local addr")
    }

    async fn fill(&mut self) -> usize {
        let mut chunk = [0u8; 8192];
        let n = timeout(READ_TIMEOUT, self.stream.read(&mut chunk))
            .await
            .expect("server did not respond in time")
            .unwrap_or(0);
        self.buf.extend_from_slice(&chunk[..n]);
        n
    }
}

pub fn masked(frame: &Frame) -> Vec<u8> {
    let mut buf = vec![0u8; frame.wire_size(true)];
    let n = frame.write(&mut buf, Some(MASK)).expect("encode frame");
    buf.truncate(n);
    buf
}
