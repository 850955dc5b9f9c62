//! Client for the clamd virus scanning daemon.
//!
//! Speaks the NUL-terminated `z` command dialect over a fresh connection per
//! call. Files are streamed with `INSTREAM`: each chunk is framed by a 4-byte
//! big-endian length, and a zero length ends the stream.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use docvault_core::{AppError, Config};
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const PING_COMMAND: &[u8] = b"zPING\0";
const INSTREAM_COMMAND: &[u8] = b"zINSTREAM\0";
const END_OF_STREAM: [u8; 4] = [0, 0, 0, 0];

const CLEAN_REPLY: &str = "stream: OK";
const STREAM_PREFIX: &str = "stream:";
const FOUND_SUFFIX: &str = "FOUND";
const ERROR_SUFFIX: &str = "ERROR";

pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// A bidirectional byte stream to the daemon.
pub trait ScanConnection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ScanConnection for T {}

/// Opens connections to the daemon.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self) -> io::Result<Box<dyn ScanConnection>>;
}

/// TCP connections bounded by a connect timeout.
pub struct TcpConnectionProvider {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnectionProvider {
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            connect_timeout,
        }
    }
}

#[async_trait]
impl ConnectionProvider for TcpConnectionProvider {
    async fn connect(&self) -> io::Result<Box<dyn ScanConnection>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Connecting to {} timed out", self.address),
                )
            })??;
        Ok(Box::new(stream))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    /// Signature name when the daemon reported a match
    pub signature: Option<String>,
    /// Reply as received, trimmed
    pub reply: String,
}

fn trim_reply(reply: &str) -> &str {
    reply.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

/// Interpret a daemon reply.
pub fn classify(reply: &str) -> ScanOutcome {
    let reply = trim_reply(reply);

    let status = if reply.is_empty() {
        ScanStatus::Error
    } else if reply == CLEAN_REPLY {
        ScanStatus::Passed
    } else if reply.ends_with(ERROR_SUFFIX) {
        ScanStatus::Error
    } else {
        ScanStatus::Failed
    };

    let signature = reply.strip_suffix(FOUND_SUFFIX).map(|rest| {
        rest.strip_prefix(STREAM_PREFIX)
            .unwrap_or(rest)
            .trim()
            .to_string()
    });

    ScanOutcome {
        status,
        signature,
        reply: reply.to_string(),
    }
}

#[derive(Clone)]
pub struct VirusScanClient {
    provider: Arc<dyn ConnectionProvider>,
    read_timeout: Duration,
    chunk_size: usize,
}

impl VirusScanClient {
    pub fn new(provider: Arc<dyn ConnectionProvider>, read_timeout: Duration) -> Self {
        Self {
            provider,
            read_timeout,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// TCP client for the daemon named in the configuration.
    pub fn from_config(config: &Config) -> Self {
        let provider = TcpConnectionProvider::new(
            config.clamav_host(),
            config.clamav_port(),
            config.clamav_connect_timeout(),
        );
        Self::new(Arc::new(provider), config.clamav_read_timeout())
            .with_chunk_size(config.clamav_chunk_size())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn timed<T, F>(&self, step: &str, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match tokio::time::timeout(self.read_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppError::Transport(format!("Scanner {} failed: {}", step, e))),
            Err(_) => Err(AppError::Transport(format!(
                "Scanner {} timed out after {}ms",
                step,
                self.read_timeout.as_millis()
            ))),
        }
    }

    async fn connect(&self) -> Result<Box<dyn ScanConnection>, AppError> {
        self.provider
            .connect()
            .await
            .map_err(|e| AppError::Transport(format!("Scanner connection failed: {}", e)))
    }

    async fn exchange_ping(&self) -> Result<String, AppError> {
        let mut connection = self.connect().await?;
        self.timed("write", connection.write_all(PING_COMMAND)).await?;
        self.timed("flush", connection.flush()).await?;

        let mut reply = Vec::new();
        self.timed("read", connection.read_to_end(&mut reply)).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Whether the daemon answers `PONG`. Never fails.
    pub async fn ping(&self) -> bool {
        match self.exchange_ping().await {
            Ok(reply) => {
                let alive = trim_reply(&reply).eq_ignore_ascii_case("PONG");
                if !alive {
                    tracing::warn!(reply = %trim_reply(&reply), "Unexpected scanner ping reply");
                }
                alive
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scanner ping failed");
                false
            }
        }
    }

    /// Stream `reader` to the daemon and classify its verdict.
    pub async fn scan<R>(&self, mut reader: R) -> Result<ScanOutcome, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start = Instant::now();
        let mut connection = self.connect().await?;
        self.timed("write", connection.write_all(INSTREAM_COMMAND))
            .await?;

        let mut chunk = vec![0u8; self.chunk_size];
        let mut peer = vec![0u8; 1024];
        let mut streamed: u64 = 0;

        loop {
            // The daemon only speaks mid-stream to abort, e.g. on a size limit
            if let Some(result) = connection.read(&mut peer).now_or_never() {
                let n = result.map_err(|e| {
                    AppError::Transport(format!("Scanner connection failed: {}", e))
                })?;
                if n > 0 {
                    let message = String::from_utf8_lossy(&peer[..n]);
                    let message = trim_reply(&message);
                    tracing::error!(reply = %message, "Scanner aborted the stream");
                    return Err(AppError::Transport(format!(
                        "Scanner interrupted the stream: {}",
                        message
                    )));
                }
            }

            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| AppError::Transport(format!("Reading scan input failed: {}", e)))?;
            if n == 0 {
                break;
            }

            let length = u32::try_from(n)
                .map_err(|_| AppError::Internal("Scan chunk exceeds 4 GiB".to_string()))?;
            self.timed("write", connection.write_all(&length.to_be_bytes()))
                .await?;
            self.timed("write", connection.write_all(&chunk[..n]))
                .await?;
            streamed += n as u64;
        }

        self.timed("write", connection.write_all(&END_OF_STREAM))
            .await?;
        self.timed("flush", connection.flush()).await?;

        let mut reply = Vec::new();
        self.timed("read", connection.read_to_end(&mut reply))
            .await?;
        let outcome = classify(&String::from_utf8_lossy(&reply));

        tracing::info!(
            status = ?outcome.status,
            bytes = streamed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Scan completed"
        );

        Ok(outcome)
    }

    /// Scan and turn anything but a clean verdict into `VirusDetected`.
    ///
    /// A daemon-side `ERROR` rejects the file the same way a match does; the
    /// reply stands in for the signature when none was reported.
    pub async fn scan_and_fail<R>(&self, reader: R) -> Result<(), AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let outcome = self.scan(reader).await?;
        if outcome.status == ScanStatus::Passed {
            return Ok(());
        }

        let signature = outcome
            .signature
            .unwrap_or_else(|| outcome.reply.clone());
        match outcome.status {
            ScanStatus::Error => {
                tracing::error!(reply = %outcome.reply, "Scanner reported an error, rejecting file")
            }
            _ => tracing::warn!(signature = %signature, "Virus detected"),
        }
        Err(AppError::VirusDetected { signature })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{duplex, DuplexStream};

    /// Hands out pre-built in-memory connections, one per call.
    pub(crate) struct DuplexProvider {
        connections: Mutex<Vec<DuplexStream>>,
    }

    impl DuplexProvider {
        pub(crate) fn new(connections: Vec<DuplexStream>) -> Self {
            Self {
                connections: Mutex::new(connections),
            }
        }
    }

    #[async_trait]
    impl ConnectionProvider for DuplexProvider {
        async fn connect(&self) -> io::Result<Box<dyn ScanConnection>> {
            match self.connections.lock().unwrap().pop() {
                Some(stream) => Ok(Box::new(stream)),
                None => Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "no connection available",
                )),
            }
        }
    }

    /// Reads one INSTREAM session and replies. Returns the payload received.
    pub(crate) async fn fake_daemon(mut server: DuplexStream, reply: &'static str) -> Vec<u8> {
        let mut command = [0u8; 10];
        server.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, INSTREAM_COMMAND);

        let mut payload = Vec::new();
        loop {
            let mut length = [0u8; 4];
            server.read_exact(&mut length).await.unwrap();
            let length = u32::from_be_bytes(length) as usize;
            if length == 0 {
                break;
            }
            let mut chunk = vec![0u8; length];
            server.read_exact(&mut chunk).await.unwrap();
            payload.extend_from_slice(&chunk);
        }

        server.write_all(reply.as_bytes()).await.unwrap();
        payload
    }

    /// Client wired to a daemon that answers every scan with `reply`.
    pub(crate) fn scanning_client(reply: &'static str, scans: usize) -> VirusScanClient {
        let mut clients = Vec::new();
        for _ in 0..scans {
            let (client, server) = duplex(64 * 1024);
            tokio::spawn(fake_daemon(server, reply));
            clients.push(client);
        }
        VirusScanClient::new(
            Arc::new(DuplexProvider::new(clients)),
            Duration::from_secs(5),
        )
    }

    fn client_with(connections: Vec<DuplexStream>) -> VirusScanClient {
        VirusScanClient::new(
            Arc::new(DuplexProvider::new(connections)),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_classify_clean() {
        let outcome = classify("stream: OK\0");
        assert_eq!(outcome.status, ScanStatus::Passed);
        assert_eq!(outcome.signature, None);
    }

    #[test]
    fn test_classify_found() {
        let outcome = classify("stream: Eicar-Test-Signature FOUND");
        assert_eq!(outcome.status, ScanStatus::Failed);
        assert_eq!(outcome.signature.as_deref(), Some("Eicar-Test-Signature"));
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(classify("").status, ScanStatus::Error);
        assert_eq!(classify("  \n").status, ScanStatus::Error);
        assert_eq!(classify("foo ERROR").status, ScanStatus::Error);
        assert_eq!(
            classify("INSTREAM size limit exceeded. ERROR").status,
            ScanStatus::Error
        );
    }

    #[test]
    fn test_classify_unknown_reply_fails_without_signature() {
        let outcome = classify("something odd");
        assert_eq!(outcome.status, ScanStatus::Failed);
        assert_eq!(outcome.signature, None);
    }

    #[tokio::test]
    async fn test_scan_frames_chunks() {
        let (client, server) = duplex(64 * 1024);
        let daemon = tokio::spawn(fake_daemon(server, "stream: OK\0"));
        let scanner = client_with(vec![client]).with_chunk_size(4);

        let outcome = scanner.scan(&b"hello world"[..]).await.unwrap();

        assert_eq!(outcome.status, ScanStatus::Passed);
        assert_eq!(daemon.await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_scan_and_fail_reports_signature() {
        let scanner = scanning_client("stream: Eicar-Test-Signature FOUND\0", 1);
        let err = scanner.scan_and_fail(&b"X5O!P%@AP"[..]).await.unwrap_err();
        match err {
            AppError::VirusDetected { signature } => {
                assert_eq!(signature, "Eicar-Test-Signature")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scan_and_fail_rejects_daemon_error() {
        let scanner = scanning_client("stream: Can't allocate memory ERROR\0", 1);
        let err = scanner.scan_and_fail(&b"data"[..]).await.unwrap_err();
        match err {
            AppError::VirusDetected { signature } => {
                assert_eq!(signature, "stream: Can't allocate memory ERROR")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scan_and_fail_rejects_unrecognised_reply() {
        let scanner = scanning_client("something odd\0", 1);
        let err = scanner.scan_and_fail(&b"data"[..]).await.unwrap_err();
        assert!(matches!(err, AppError::VirusDetected { .. }));
    }

    #[tokio::test]
    async fn test_unsolicited_reply_is_transport_error() {
        let (client, mut server) = duplex(64 * 1024);
        server
            .write_all(b"INSTREAM size limit exceeded. ERROR\0")
            .await
            .unwrap();
        let scanner = client_with(vec![client]);

        let err = scanner.scan(&b"data"[..]).await.unwrap_err();
        match err {
            AppError::Transport(message) => assert!(message.contains("size limit")),
            other => panic!("unexpected error: {other:?}"),
        }
        drop(server);
    }

    #[tokio::test]
    async fn test_silent_daemon_times_out() {
        let (client, mut server) = duplex(64 * 1024);
        // Drain input so writes succeed, but never reply
        tokio::spawn(async move {
            let mut sink = Vec::new();
            let _ = server.read_to_end(&mut sink).await;
        });
        let scanner = client_with(vec![client]);

        let err = scanner.scan(&b"data"[..]).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let scanner = client_with(Vec::new());
        let err = scanner.scan(&b"data"[..]).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    async fn ping_with_reply(reply: &'static [u8]) -> bool {
        let (client, mut server) = duplex(1024);
        tokio::spawn(async move {
            let mut command = [0u8; 6];
            server.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, PING_COMMAND);
            server.write_all(reply).await.unwrap();
        });
        client_with(vec![client]).ping().await
    }

    #[tokio::test]
    async fn test_ping() {
        assert!(ping_with_reply(b"PONG\0").await);
        assert!(ping_with_reply(b"  pong \n").await);
        assert!(!ping_with_reply(b"PANG\0").await);
        assert!(!ping_with_reply(b"").await);
    }

    #[tokio::test]
    async fn test_ping_without_daemon_is_false() {
        assert!(!client_with(Vec::new()).ping().await);
    }
}
