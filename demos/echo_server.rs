//! Echo server driven by a simple poll loop.
//!
//! ```text
//! cargo run --example echo_server -- 9000
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;
use wspoll::{CloseCode, Config, Server};

const TICK: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> wspoll::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let port = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(9000u16);

    let server = Server::bind(("0.0.0.0", port), Config::default()).await?;
    let mut server = server.with_observer(|address: SocketAddr, code: CloseCode| {
        info!(%address, %code, "client left");
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = serve_once(&mut server) => result?,
        }
    }

    server.shutdown().await;
    Ok(())
}

async fn serve_once(server: &mut Server) -> wspoll::Result<()> {
    for peer in server.accept().await? {
        let greeting = format!("welcome to /{}", peer.path);
        server.send_to(&peer.address, greeting).await;
    }

    for address in server.clients() {
        let Some(messages) = server.read_from(&address).await else {
            continue;
        };
        for message in messages {
            if message.is_text() {
                server.send_to(&address, message.payload()).await;
            } else {
                server.send_binary_to(&address, message.payload()).await;
            }
        }
    }

    sleep(TICK).await;
    Ok(())
}
