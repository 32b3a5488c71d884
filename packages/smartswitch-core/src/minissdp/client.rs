//! Blocking client for the minissdpd Unix socket.
//!
//! One client owns at most one connection. The protocol has no request IDs or
//! multiplexing, so every method takes `&mut self`; callers that share a client
//! must serialize access themselves. No read or write deadlines are applied.

use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::wire::{decode_records, encode_string, ServiceRecord, WireError};
use crate::protocol_constants::DEFAULT_SOCKET_PATH;

/// Request type: services matching a type string.
pub const REQUEST_BY_TYPE: u8 = 1;
/// Request type: services matching a USN string.
pub const REQUEST_BY_USN: u8 = 2;
/// Request type: every registered service.
pub const REQUEST_ALL: u8 = 3;
/// Request type: register a new service.
pub const REQUEST_REGISTER: u8 = 4;

/// Errors that can occur while talking to minissdpd.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// `connect` was called on a client that is already connected.
    #[error("attempted connect of an open client")]
    AlreadyConnected,

    /// A request was issued without a connection.
    #[error("client is not connected")]
    NotConnected,

    /// The socket could not be opened.
    #[error("could not connect to minissdpd at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing a request failed.
    #[error("could not send request: {0}")]
    Write(#[source] io::Error),

    /// Encoding a request or decoding a response failed.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Convenient Result alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Client for a running minissdpd instance.
#[derive(Debug)]
pub struct DaemonClient {
    socket_path: PathBuf,
    conn: Option<UnixStream>,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

impl DaemonClient {
    /// Creates a disconnected client for the socket at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            conn: None,
        }
    }

    /// Path of the daemon socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns true while a connection is held.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Opens the connection to the daemon.
    ///
    /// # Errors
    ///
    /// [`DaemonError::AlreadyConnected`] if a connection is already open; call
    /// [`close`](Self::close) first to reconnect.
    pub fn connect(&mut self) -> DaemonResult<()> {
        if self.conn.is_some() {
            return Err(DaemonError::AlreadyConnected);
        }

        let stream =
            UnixStream::connect(&self.socket_path).map_err(|source| DaemonError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        log::debug!("[Minissdp] Connected to {}", self.socket_path.display());
        self.conn = Some(stream);
        Ok(())
    }

    /// Closes the connection. Closing a disconnected client is a no-op.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::debug!("[Minissdp] Closing {}", self.socket_path.display());
            drop(conn);
        }
    }

    /// Registers `record` for advertisement by the daemon.
    ///
    /// The daemon sends no acknowledgement for registrations.
    pub fn register_service(&mut self, record: &ServiceRecord) -> DaemonResult<()> {
        let mut request = vec![REQUEST_REGISTER];
        record.encode_to(&mut request)?;

        log::debug!(
            "[Minissdp] Registering {} at {}",
            record.usn(),
            record.location()
        );
        self.send(&request)
    }

    /// Returns every service the daemon currently advertises.
    pub fn query_all(&mut self) -> DaemonResult<Vec<ServiceRecord>> {
        // The trailing `1, 0` is padding the daemon expects after the type byte.
        self.send(&[REQUEST_ALL, 1, 0])?;
        self.read_records()
    }

    /// Returns the services whose USN matches `usn`.
    pub fn query_by_usn(&mut self, usn: &str) -> DaemonResult<Vec<ServiceRecord>> {
        self.query(REQUEST_BY_USN, usn)
    }

    /// Returns the services whose type matches `service_type`.
    pub fn query_by_type(&mut self, service_type: &str) -> DaemonResult<Vec<ServiceRecord>> {
        self.query(REQUEST_BY_TYPE, service_type)
    }

    fn query(&mut self, request_type: u8, value: &str) -> DaemonResult<Vec<ServiceRecord>> {
        let mut request = vec![request_type];
        encode_string(value, &mut request)?;
        self.send(&request)?;
        self.read_records()
    }

    fn send(&mut self, request: &[u8]) -> DaemonResult<()> {
        let conn = self.conn.as_mut().ok_or(DaemonError::NotConnected)?;
        conn.write_all(request).map_err(DaemonError::Write)
    }

    fn read_records(&mut self) -> DaemonResult<Vec<ServiceRecord>> {
        let conn = self.conn.as_mut().ok_or(DaemonError::NotConnected)?;
        let records = decode_records(conn)?;
        log::debug!("[Minissdp] Daemon returned {} service(s)", records.len());
        Ok(records)
    }
}
