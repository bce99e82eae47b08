//! Driver helpers: poll a `Server` until something happens.

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use tokio::time::sleep;
use wspoll::{Config, Message, PeerInfo, RetryPolicy, Server};

const TICK: Duration = Duration::from_millis(10);
const MAX_TICKS: usize = 500;

static INIT_LOGGING: Once = Once::new();

/// Route the crate's tracing output through the test writer.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

/// Config with short read budgets so failing tests fail fast.
pub fn test_config() -> Config {
    Config::default().with_retry(RetryPolicy::new(100, Duration::from_millis(10), 16))
}

pub async fn start_server(config: Config) -> (Server, SocketAddr) {
    init_logging();
    let server = Server::bind("127.0.0.1:0", config)
        .await
        .expect("bind loopback");
    let addr = server.local_addr().expect("local addr");
    (server, addr)
}

/// Call `accept` until `n` clients have been upgraded.
pub async fn accept_n(server: &mut Server, n: usize) -> Vec<PeerInfo> {
    let mut accepted = Vec::new();
    for _ in 0..MAX_TICKS {
        accepted.extend(server.accept().await.expect("accept"));
        if accepted.len() >= n {
            return accepted;
        }
        sleep(TICK).await;
    }
    panic!("only {} of {} clients accepted", accepted.len(), n);
}

/// Call `read_from` until it yields at least one message or reports the
/// client gone.
pub async fn read_until(server: &mut Server, address: &SocketAddr) -> Option<Vec<Message>> {
    for _ in 0..MAX_TICKS {
        match server.read_from(address).await {
            Some(messages) if messages.is_empty() => sleep(TICK).await,
            other => return other,
        }
    }
    panic!("no messages from {address}");
}
