//! Connection management.

use crate::error::ClientError;
use linekv_protocol::{Command, Decoder, Encoder, Reply, DEFAULT_PORT};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Socket strategy, chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// One socket reused across calls.
    #[default]
    Persistent,
    /// A fresh socket per call: open, authenticate, send, read, close.
    /// Trades latency for statelessness.
    Ephemeral,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server hostname or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Password for the AUTH handshake (optional).
    pub password: Option<String>,
    /// Socket strategy.
    pub mode: ConnectionMode,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline applied to each socket read while awaiting a reply.
    pub read_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            mode: ConnectionMode::Persistent,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// A connection to one server endpoint.
///
/// Strictly sequential: one command is written, then its reply is decoded
/// in full before the next command may be sent.
pub struct Connection {
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    decoder: Decoder,
    authenticated: bool,
    selected_database: u32,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: None,
            decoder: Decoder::new(),
            authenticated: false,
            selected_database: 0,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server and runs the AUTH handshake if a password is
    /// configured. A failure here is fatal: the server's literal error text
    /// is surfaced and the connection stays unusable.
    ///
    /// In ephemeral mode this is a no-op; each call opens its own socket.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.config.mode == ConnectionMode::Ephemeral {
            tracing::debug!("ephemeral mode, deferring socket open to first call");
            return Ok(());
        }

        let mut stream = self.open_stream().await?;
        self.decoder.clear();
        self.authenticated = false;
        self.selected_database = 0;

        if let Some(password) = self.config.password.clone() {
            authenticate(&mut stream, &mut self.decoder, &password, &self.config).await?;
            self.authenticated = true;
        }

        self.stream = Some(stream);
        Ok(())
    }

    /// Returns whether a socket is currently open (persistent mode).
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns whether the AUTH handshake succeeded on the current socket.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Currently selected database index. Only changes after a successful
    /// SELECT acknowledgment.
    pub fn selected_database(&self) -> u32 {
        self.selected_database
    }

    pub(crate) fn set_selected_database(&mut self, id: u32) {
        self.selected_database = id;
    }

    /// Sends one command and reads its complete reply.
    ///
    /// The full command buffer is flushed before reading. The read side is
    /// driven by the protocol: bulk replies read exactly the declared
    /// length, line replies read to the terminator, so the loop ends when
    /// the reply is structurally complete rather than when the socket
    /// reports no unread bytes.
    pub async fn send(&mut self, command: &Command) -> Result<Reply, ClientError> {
        let encoded = Encoder::encode_command(command)?;
        tracing::debug!(verb = command.verb(), bytes = encoded.len(), "sending command");

        match self.config.mode {
            ConnectionMode::Persistent => {
                let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
                let result = match stream.write_all(&encoded).await {
                    Ok(()) => read_reply(stream, &mut self.decoder, &self.config).await,
                    Err(e) => Err(ClientError::Io(e)),
                };
                // Any failure mid-exchange leaves the stream and decoder
                // desynchronized: the reply was never consumed in full.
                // Drop the socket so the next call reports NotConnected
                // instead of pairing a command with leftover bytes.
                if result.is_err() {
                    self.stream = None;
                    self.decoder.clear();
                    self.authenticated = false;
                }
                result
            }
            ConnectionMode::Ephemeral => {
                let mut stream = self.open_ephemeral().await?;
                let mut decoder = Decoder::new();
                stream.write_all(&encoded).await.map_err(ClientError::Io)?;
                let reply = read_reply(&mut stream, &mut decoder, &self.config).await?;
                let _ = stream.shutdown().await;
                Ok(reply)
            }
        }
    }

    /// Closes the connection: best-effort QUIT, then socket shutdown.
    /// Teardown errors are swallowed.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("closing connection");
            if let Ok(quit) = Command::new("QUIT").encode() {
                let _ = stream.write_all(&quit).await;
            }
            let _ = stream.shutdown().await;
        }
        self.decoder.clear();
        self.authenticated = false;
    }

    async fn open_stream(&self) -> Result<TcpStream, ClientError> {
        let addr = self.config.addr();
        tracing::debug!("connecting to {}", addr);

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::Io)?;

        stream.set_nodelay(true).ok();
        Ok(stream)
    }

    /// Opens and authenticates a per-call socket. The AUTH handshake is
    /// re-run on every call in ephemeral mode.
    async fn open_ephemeral(&self) -> Result<TcpStream, ClientError> {
        let mut stream = self.open_stream().await?;
        if let Some(password) = &self.config.password {
            let mut decoder = Decoder::new();
            authenticate(&mut stream, &mut decoder, password, &self.config).await?;
        }
        Ok(stream)
    }
}

async fn authenticate(
    stream: &mut TcpStream,
    decoder: &mut Decoder,
    password: &str,
    config: &ConnectionConfig,
) -> Result<(), ClientError> {
    tracing::debug!("authenticating");
    let auth = Command::new("AUTH").arg(password).encode()?;
    stream.write_all(&auth).await.map_err(ClientError::Io)?;

    match read_reply(stream, decoder, config).await? {
        Reply::Status(_) => Ok(()),
        reply => Err(ClientError::Auth(
            reply
                .error_text()
                .unwrap_or_else(|| "unexpected reply to AUTH".to_string()),
        )),
    }
}

async fn read_reply(
    stream: &mut TcpStream,
    decoder: &mut Decoder,
    config: &ConnectionConfig,
) -> Result<Reply, ClientError> {
    let mut buf = vec![0u8; config.read_buffer_size];

    loop {
        if let Some(reply) = decoder.decode_reply()? {
            tracing::debug!(kind = reply.kind(), "reply decoded");
            return Ok(reply);
        }

        let n = tokio::time::timeout(config.read_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::Io)?;

        if n == 0 {
            tracing::debug!("connection closed mid-reply");
            return Err(ClientError::ConnectionClosed);
        }
        decoder.extend(&buf[..n]);
    }
}
