//! Linelog client implementation

use crate::config::ClientConfig;
use crate::{LinelogError, Result};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// Client for one request/response exchange with a Linelog server
pub struct LogClient {
    config: ClientConfig,
    stream: TcpStream,
}

impl LogClient {
    /// Connect to the server at `address`
    pub async fn connect(address: &str) -> Result<Self> {
        let config = ClientConfig {
            server_address: address.to_string(),
            ..Default::default()
        };

        Self::with_config(config).await
    }

    /// Connect using a custom configuration
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let connect_future = TcpStream::connect(&config.server_address);
        let stream = timeout(Duration::from_secs(config.timeout_seconds), connect_future)
            .await
            .map_err(|_| LinelogError::Connection("Connection timeout".to_string()))?
            .map_err(|e| LinelogError::Connection(format!("Failed to connect: {}", e)))?;

        Ok(Self { config, stream })
    }

    /// Send `frame` and return the server's reply.
    ///
    /// The write side is closed after sending, so a frame without a trailing
    /// newline is still delivered. The reply ends when the server closes.
    pub async fn exchange(self, frame: &[u8]) -> Result<Bytes> {
        let limit = Duration::from_secs(self.config.timeout_seconds);
        let mut stream = self.stream;

        let exchange = async {
            stream.write_all(frame).await?;
            stream.flush().await?;
            stream.shutdown().await?;

            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await?;
            Ok::<_, std::io::Error>(reply)
        };

        let reply = timeout(limit, exchange)
            .await
            .map_err(|_| LinelogError::Connection("Exchange timeout".to_string()))?
            .map_err(|e| LinelogError::Connection(format!("Exchange failed: {}", e)))?;

        Ok(Bytes::from(reply))
    }

    /// Send a single line, appending the newline if it is missing
    pub async fn send_line(self, line: &str) -> Result<Bytes> {
        if line.ends_with('\n') {
            self.exchange(line.as_bytes()).await
        } else {
            self.exchange(format!("{}\n", line).as_bytes()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_exchange_half_closes_and_reads_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            stream.write_all(b"log contents\n").await.unwrap();
            received
        });

        let client = LogClient::connect(&addr).await.unwrap();
        let reply = client.exchange(b"no newline").await.unwrap();

        assert_eq!(&reply[..], b"log contents\n");
        assert_eq!(server.await.unwrap(), b"no newline");
    }

    #[tokio::test]
    async fn test_send_line_adds_newline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let reply = LogClient::connect(&addr).await.unwrap().send_line("hi").await.unwrap();
        assert!(reply.is_empty());
        assert_eq!(server.await.unwrap(), b"hi\n");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = LogClient::connect(&addr).await;
        assert!(matches!(result, Err(LinelogError::Connection(_))));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let config = ClientConfig {
            server_address: String::new(),
            timeout_seconds: 1,
        };
        assert!(matches!(
            LogClient::with_config(config).await,
            Err(LinelogError::Config(_))
        ));
    }
}
