//! Connection management.

use crate::error::ClientError;
use devobj_protocol::{encode_line, parse_status_line, LineDecoder, Status, PUBLICATION_PREFIX};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Default read buffer size (4 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Default maximum length of a line received from the device.
pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024;

/// Publications kept while waiting for a response; older ones are dropped.
const MAX_QUEUED_PUBLICATIONS: usize = 256;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Longest accepted response or publication line.
    pub max_line_len: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }
}

/// A parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Text after the status line, empty when there is none.
    pub payload: String,
    /// The complete line as received.
    pub line: String,
}

impl Response {
    /// Parses a response line.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let (status, payload) = parse_status_line(line)?;
        Ok(Self {
            status,
            payload: payload.to_string(),
            line: line.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the payload, or the device status as an error.
    pub fn into_result(self) -> Result<String, ClientError> {
        if self.status.is_success() {
            Ok(self.payload)
        } else {
            Err(ClientError::Device {
                status: self.status,
                payload: self.payload,
            })
        }
    }
}

/// A connection to a devobj server.
///
/// Publications that arrive while a request is outstanding are queued and
/// handed out by [`Connection::next_publication`].
pub struct Connection {
    config: ConnectionConfig,
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    decoder: LineDecoder,
    publications: VecDeque<String>,
    read_buf: Vec<u8>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let decoder = LineDecoder::new(config.max_line_len);
        Self {
            config,
            reader: None,
            writer: None,
            decoder,
            publications: VecDeque::new(),
            read_buf: vec![0u8; DEFAULT_READ_BUFFER_SIZE],
        }
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        let (reader, writer) = stream.into_split();
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.decoder.clear();
        self.publications.clear();

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Sends a request line and waits for its response.
    pub async fn request(&mut self, line: &str) -> Result<Response, ClientError> {
        if line.contains('\n') {
            return Err(ClientError::InvalidRequest(
                "request must be a single line".to_string(),
            ));
        }

        let encoded = encode_line(line);
        {
            let writer = self.writer.as_mut().ok_or(ClientError::NotConnected)?;
            writer.write_all(&encoded).await?;
        }
        tracing::debug!("Sent request ({} bytes): {}", encoded.len(), line);

        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, async {
            loop {
                let line = self.read_line().await?;
                if line.starts_with(PUBLICATION_PREFIX) {
                    self.queue_publication(line);
                    continue;
                }
                return Response::parse(&line);
            }
        })
        .await;

        // Without request ids a late reply would be taken for the next
        // request's, so a timed out connection is unusable.
        let response = match response {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!("Request timed out, dropping connection: {}", line);
                self.disconnect();
                return Err(ClientError::Timeout);
            }
        };

        tracing::debug!("Response: {}", response.status);
        Ok(response)
    }

    /// Returns the next publication, waiting up to `timeout` for one.
    ///
    /// `None` waits indefinitely.
    pub async fn next_publication(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<String, ClientError> {
        if let Some(publication) = self.publications.pop_front() {
            return Ok(publication);
        }

        let wait = async {
            loop {
                let line = self.read_line().await?;
                if line.starts_with(PUBLICATION_PREFIX) {
                    return Ok(line);
                }
                tracing::warn!("Unsolicited response: {}", line);
            }
        };

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => wait.await,
        }
    }

    /// Number of publications received but not yet handed out.
    pub fn pending_publications(&self) -> usize {
        self.publications.len()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
        self.publications.clear();
        Ok(())
    }

    fn disconnect(&mut self) {
        self.reader = None;
        self.writer = None;
        self.decoder.clear();
    }

    fn queue_publication(&mut self, line: String) {
        if self.publications.len() >= MAX_QUEUED_PUBLICATIONS {
            tracing::warn!("Publication queue full, dropping oldest");
            self.publications.pop_front();
        }
        self.publications.push_back(line);
    }

    async fn read_line(&mut self) -> Result<String, ClientError> {
        loop {
            if let Some(line) = self.decoder.decode_line()? {
                if line.is_empty() {
                    continue;
                }
                return Ok(line);
            }

            let reader = self.reader.as_mut().ok_or(ClientError::NotConnected)?;
            let n = reader.read(&mut self.read_buf).await?;
            if n == 0 {
                tracing::debug!("Connection closed by server");
                self.disconnect();
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    /// Accepts one connection and answers every line with the scripted
    /// replies, in order.
    async fn scripted(replies: Vec<&'static str>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut replies = replies.into_iter();
            while let Ok(Some(_)) = lines.next_line().await {
                match replies.next() {
                    Some(reply) => write.write_all(reply.as_bytes()).await.unwrap(),
                    None => break,
                }
            }
        });
        addr
    }

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::new("127.0.0.1:7402".parse().unwrap());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_line_len, DEFAULT_MAX_LINE_LEN);
    }

    #[test]
    fn test_response_parse() {
        let response = Response::parse(":0 Success. [1, 2]").unwrap();
        assert!(response.is_success());
        assert_eq!(response.payload, "[1, 2]");
        assert_eq!(response.into_result().unwrap(), "[1, 2]");

        let response = Response::parse(":32.").unwrap();
        assert_eq!(response.status, Status::UnknownObject);
        let err = response.into_result().unwrap_err();
        assert_eq!(err.status(), Some(Status::UnknownObject));

        assert!(matches!(
            Response::parse("garbage"),
            Err(ClientError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_request_not_connected() {
        let mut conn = Connection::new(ConnectionConfig::new("127.0.0.1:1".parse().unwrap()));
        assert!(matches!(
            conn.request("!list").await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_multiline_request_rejected() {
        let addr = scripted(vec![]).await;
        let mut conn = Connection::new(ConnectionConfig::new(addr));
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.request("!list\n!list").await,
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_publications_are_queued() {
        let addr = scripted(vec!["# {\"a\":1}\n# {\"a\":2}\n:0 Success. 5\n"]).await;
        let mut conn = Connection::new(ConnectionConfig::new(addr));
        conn.connect().await.unwrap();

        let response = conn.request("!read \"b\"").await.unwrap();
        assert_eq!(response.payload, "5");
        assert_eq!(conn.pending_publications(), 2);

        let first = conn.next_publication(None).await.unwrap();
        assert_eq!(first, "# {\"a\":1}");
        let second = conn.next_publication(None).await.unwrap();
        assert_eq!(second, "# {\"a\":2}");
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let addr = scripted(vec![]).await;
        let mut conn = Connection::new(ConnectionConfig::new(addr));
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.request("!list").await,
            Err(ClientError::ConnectionClosed)
        ));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config = ConnectionConfig::new(addr).with_request_timeout(Duration::from_millis(50));
        let mut conn = Connection::new(config);
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.request("!list").await,
            Err(ClientError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_late_reply_is_not_taken_for_next_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                tokio::time::sleep(Duration::from_millis(200)).await;
                if write.write_all(b":0 Success. 1\n").await.is_err() {
                    break;
                }
            }
        });

        let config = ConnectionConfig::new(addr).with_request_timeout(Duration::from_millis(50));
        let mut conn = Connection::new(config);
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.request("!read \"a\"").await,
            Err(ClientError::Timeout)
        ));
        assert!(!conn.is_connected());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(
            conn.request("!read \"b\"").await,
            Err(ClientError::NotConnected)
        ));
    }
}
