//! Shared helpers for the integration tests.
//!
//! `TestClient` speaks raw WebSocket over loopback TCP so the server is
//! exercised byte for byte. The driver helpers poll a `Server` the way a host
//! program would.

#![allow(dead_code)]

mod client;
mod server;

pub use client::{TestClient, masked};
pub use server::{accept_n, read_until, start_server, test_config};
