//! Small network helpers shared by connectors and the health prober.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Whether `host:port` accepts a TCP connection within `limit`.
pub async fn tcp_ping(host: &str, port: u16, limit: Duration) -> bool {
    matches!(
        timeout(limit, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn ping_succeeds_against_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(tcp_ping("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn ping_fails_fast_on_closed_port() {
        // Bind then drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!tcp_ping("127.0.0.1", port, Duration::from_millis(500)).await);
    }
}
