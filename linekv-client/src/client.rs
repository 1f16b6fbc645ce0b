//! High-level client API.
//!
//! Each method is a thin, typed call-site over the protocol core: build a
//! [`Command`], send it, narrow the [`Reply`]. Server-side rejections come
//! back as [`ClientError::Command`] with the error-code prefix stripped;
//! they do not poison the connection.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bytes::Bytes;
use linekv_protocol::{Command, Reply};
use serde::Serialize;
use serde_json::Value;

/// Client for a line-oriented key-value store.
///
/// Methods take `&mut self`: one command is in flight at a time by
/// construction.
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Connection::new(config),
        }
    }

    /// Connects to the server (and authenticates, if configured).
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client holds an open socket.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Currently selected database index.
    pub fn current_database(&self) -> u32 {
        self.conn.selected_database()
    }

    /// Issues QUIT and closes the socket. Teardown errors are swallowed.
    pub async fn close(&mut self) {
        self.conn.close().await;
    }

    /// Sends an arbitrary command and returns the raw reply. Server error
    /// replies are returned as `Reply::Error`, not as `Err`.
    pub async fn raw_command(&mut self, command: Command) -> Result<Reply, ClientError> {
        self.conn.send(&command).await
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn request(&mut self, command: Command) -> Result<Reply, ClientError> {
        let reply = self.conn.send(&command).await?;
        match reply {
            Reply::Error(_) => Err(ClientError::Command(
                reply.error_text().unwrap_or_default(),
            )),
            other => Ok(other),
        }
    }

    async fn request_status(&mut self, command: Command) -> Result<(), ClientError> {
        match self.request(command).await? {
            Reply::Status(_) => Ok(()),
            other => Err(unexpected("status", &other)),
        }
    }

    async fn request_integer(&mut self, command: Command) -> Result<i64, ClientError> {
        match self.request(command).await? {
            Reply::Integer(n) => Ok(n),
            other => Err(unexpected("integer", &other)),
        }
    }

    async fn request_bool(&mut self, command: Command) -> Result<bool, ClientError> {
        Ok(self.request_integer(command).await? != 0)
    }

    async fn request_bulk(&mut self, command: Command) -> Result<Option<Bytes>, ClientError> {
        match self.request(command).await? {
            Reply::Bulk(payload) => Ok(payload),
            other => Err(unexpected("bulk", &other)),
        }
    }

    async fn request_array(&mut self, command: Command) -> Result<Vec<Reply>, ClientError> {
        match self.request(command).await? {
            Reply::Array(items) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }

    // =========================================================================
    // Key-space operations
    // =========================================================================

    /// Deletes a key. Returns the number of keys removed.
    pub async fn del(&mut self, key: &str) -> Result<i64, ClientError> {
        self.request_integer(Command::new("DEL").arg(key)).await
    }

    /// Sets a relative expiry in seconds. False when the key is missing or
    /// already volatile.
    pub async fn expire(&mut self, key: &str, seconds: i64) -> Result<bool, ClientError> {
        self.request_bool(Command::new("EXPIRE").arg(key).arg(seconds))
            .await
    }

    /// Sets an absolute expiry as a unix timestamp.
    pub async fn expire_at(&mut self, key: &str, timestamp: i64) -> Result<bool, ClientError> {
        self.request_bool(Command::new("EXPIREAT").arg(key).arg(timestamp))
            .await
    }

    /// Remaining time to live of a key, in seconds.
    pub async fn ttl(&mut self, key: &str) -> Result<i64, ClientError> {
        self.request_integer(Command::new("TTL").arg(key)).await
    }

    pub async fn exists(&mut self, key: &str) -> Result<bool, ClientError> {
        self.request_bool(Command::new("EXISTS").arg(key)).await
    }

    /// Renames a key, clobbering any existing destination.
    pub async fn rename(&mut self, old_key: &str, new_key: &str) -> Result<(), ClientError> {
        self.request_status(Command::new("RENAME").arg(old_key).arg(new_key))
            .await
    }

    /// Renames a key, refusing to clobber an existing destination.
    pub async fn safe_rename(&mut self, old_key: &str, new_key: &str) -> Result<(), ClientError> {
        if self.exists(new_key).await? {
            return Err(ClientError::Command(format!(
                "destination key {new_key} already exists"
            )));
        }
        self.rename(old_key, new_key).await
    }

    /// Number of keys in the selected database.
    pub async fn dbsize(&mut self) -> Result<i64, ClientError> {
        self.request_integer(Command::new("DBSIZE")).await
    }

    /// Removes every key from the selected database.
    pub async fn flushdb(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("FLUSHDB")).await
    }

    /// Removes every key from every database.
    pub async fn flushall(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("FLUSHALL")).await
    }

    /// Selects a database by index. The tracked database only changes on a
    /// successful acknowledgment.
    pub async fn select(&mut self, id: u32) -> Result<(), ClientError> {
        self.request_status(Command::new("SELECT").arg(id)).await?;
        self.conn.set_selected_database(id);
        Ok(())
    }

    /// Moves a key from the selected database to another. False when the
    /// key is missing here or already present there.
    pub async fn move_key(&mut self, key: &str, db: u32) -> Result<bool, ClientError> {
        self.request_bool(Command::new("MOVE").arg(key).arg(db))
            .await
    }

    /// Keys matching a glob pattern.
    ///
    /// Newer servers return a multi-bulk reply; the predecessor protocol
    /// returned a single space-separated bulk. Both are handled.
    pub async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, ClientError> {
        match self.request(Command::new("KEYS").arg(pattern)).await? {
            Reply::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Reply::Bulk(Some(bytes)) => utf8(bytes),
                    Reply::Bulk(None) => Ok(String::new()),
                    other => Err(unexpected("bulk", &other)),
                })
                .collect(),
            Reply::Bulk(Some(bytes)) => Ok(utf8(bytes)?
                .split_whitespace()
                .map(str::to_string)
                .collect()),
            Reply::Bulk(None) => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }

    // =========================================================================
    // String operations
    // =========================================================================

    /// Stores a raw string value.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<(), ClientError> {
        self.set_bytes(key, value.as_bytes().to_vec()).await
    }

    /// Stores a raw byte value.
    pub async fn set_bytes(
        &mut self,
        key: &str,
        value: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.request_status(Command::new("SET").arg(key).payload(value.into()))
            .await
    }

    /// Fetches a value as UTF-8. `None` is the absent sentinel for a key
    /// that was never set, distinct from `Some("")`.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>, ClientError> {
        self.get_bytes(key).await?.map(utf8).transpose()
    }

    /// Fetches a raw byte value.
    pub async fn get_bytes(&mut self, key: &str) -> Result<Option<Bytes>, ClientError> {
        self.request_bulk(Command::new("GET").arg(key)).await
    }

    /// Stores a value serialized as JSON.
    pub async fn sset<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ClientError> {
        let data = serde_json::to_vec(value)?;
        self.set_bytes(key, data).await
    }

    /// Fetches a JSON-serialized value.
    ///
    /// Bytes that do not parse as JSON are returned as a raw string value
    /// rather than an error, so keys written with [`set`](Client::set) can
    /// still be read through this path.
    pub async fn sget(&mut self, key: &str) -> Result<Option<Value>, ClientError> {
        Ok(self.get_bytes(key).await?.map(deserialize_or_raw))
    }

    /// Fetches several keys at once. The result is aligned with the input
    /// order; missing keys yield `None`.
    pub async fn mget(&mut self, keys: &[&str]) -> Result<Vec<Option<String>>, ClientError> {
        let mut command = Command::new("MGET");
        for key in keys {
            command = command.arg(key);
        }
        self.request_array(command)
            .await?
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(Some(bytes)) => utf8(bytes).map(Some),
                Reply::Bulk(None) => Ok(None),
                other => Err(unexpected("bulk", &other)),
            })
            .collect()
    }

    /// [`mget`](Client::mget) over JSON-serialized values, with the same
    /// raw-string fallback as [`sget`](Client::sget).
    pub async fn smget(&mut self, keys: &[&str]) -> Result<Vec<Option<Value>>, ClientError> {
        let mut command = Command::new("MGET");
        for key in keys {
            command = command.arg(key);
        }
        self.request_array(command)
            .await?
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(Some(bytes)) => Ok(Some(deserialize_or_raw(bytes))),
                Reply::Bulk(None) => Ok(None),
                other => Err(unexpected("bulk", &other)),
            })
            .collect()
    }

    /// Atomically sets a key and returns its previous value.
    pub async fn getset(&mut self, key: &str, value: &str) -> Result<Option<String>, ClientError> {
        let old = self
            .request_bulk(
                Command::new("GETSET")
                    .arg(key)
                    .payload(value.as_bytes().to_vec()),
            )
            .await?;
        old.map(utf8).transpose()
    }

    /// [`getset`](Client::getset) over a JSON-serialized value.
    pub async fn sgetset<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<Option<Value>, ClientError> {
        let data = serde_json::to_vec(value)?;
        let old = self
            .request_bulk(Command::new("GETSET").arg(key).payload(data))
            .await?;
        Ok(old.map(deserialize_or_raw))
    }

    /// Increments a key by one. Rejected by the server when the current
    /// value is not numeric.
    pub async fn incr(&mut self, key: &str) -> Result<i64, ClientError> {
        self.request_integer(Command::new("INCR").arg(key)).await
    }

    pub async fn incr_by(&mut self, key: &str, amount: i64) -> Result<i64, ClientError> {
        self.request_integer(Command::new("INCRBY").arg(key).arg(amount))
            .await
    }

    pub async fn decr(&mut self, key: &str) -> Result<i64, ClientError> {
        self.request_integer(Command::new("DECR").arg(key)).await
    }

    pub async fn decr_by(&mut self, key: &str, amount: i64) -> Result<i64, ClientError> {
        self.request_integer(Command::new("DECRBY").arg(key).arg(amount))
            .await
    }

    /// Appends to a string value. Returns the new length.
    pub async fn append(&mut self, key: &str, value: &str) -> Result<i64, ClientError> {
        self.request_integer(
            Command::new("APPEND")
                .arg(key)
                .payload(value.as_bytes().to_vec()),
        )
        .await
    }

    /// Substring by inclusive byte range.
    pub async fn substr(
        &mut self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Option<String>, ClientError> {
        let bytes = self
            .request_bulk(Command::new("SUBSTR").arg(key).arg(start).arg(end))
            .await?;
        bytes.map(utf8).transpose()
    }

    // =========================================================================
    // Persistence and session operations
    // =========================================================================

    /// Synchronous snapshot to disk.
    pub async fn save(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("SAVE")).await
    }

    /// Background snapshot to disk.
    pub async fn bgsave(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("BGSAVE")).await
    }

    /// Unix timestamp of the last successful save.
    pub async fn lastsave(&mut self) -> Result<i64, ClientError> {
        self.request_integer(Command::new("LASTSAVE")).await
    }

    /// Opens a transaction block.
    pub async fn multi(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("MULTI")).await
    }

    /// Executes the queued transaction. Returns one reply per queued
    /// command.
    pub async fn exec(&mut self) -> Result<Vec<Reply>, ClientError> {
        self.request_array(Command::new("EXEC")).await
    }

    /// Discards the queued transaction.
    pub async fn discard(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("DISCARD")).await
    }

    /// Marks a key for optimistic locking across MULTI/EXEC.
    pub async fn watch(&mut self, key: &str) -> Result<(), ClientError> {
        self.request_status(Command::new("WATCH").arg(key)).await
    }

    pub async fn unwatch(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("UNWATCH")).await
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        self.request_status(Command::new("PING")).await
    }
}

fn unexpected(expected: &'static str, got: &Reply) -> ClientError {
    ClientError::UnexpectedReply {
        expected,
        got: got.kind(),
    }
}

fn utf8(bytes: Bytes) -> Result<String, ClientError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ClientError::Protocol(linekv_protocol::ProtocolError::InvalidUtf8))
}

/// JSON-deserializes stored bytes, falling back to a raw string value when
/// they were not written through the serialized path.
fn deserialize_or_raw(bytes: Bytes) -> Value {
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
