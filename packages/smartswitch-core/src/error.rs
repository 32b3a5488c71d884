//! Centralized error taxonomy for the SmartSwitch core library.
//!
//! Each module defines its own `thiserror` enum. This module classifies them
//! into a small set of [`ErrorKind`]s and gives every variant a stable,
//! machine-readable code via [`ErrorCode`].

use std::fmt;

use crate::advertise::AdvertiseError;
use crate::api::ServerError;
use crate::context::NetworkError;
use crate::controller::ControllerError;
use crate::minissdp::{DaemonError, WireError};
use crate::switch::SwitchError;

/// Broad classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid settings (no switch, no location, no socket path).
    Configuration,
    /// The daemon socket could not be reached or used.
    Connection,
    /// Malformed or truncated wire data.
    Protocol,
    /// No advertisable address could be determined.
    NetworkResolution,
    /// The controlled device reported a failure.
    Capability,
    /// The HTTP listener could not be bound or served.
    Listener,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::NetworkResolution => "network_resolution",
            Self::Capability => "capability",
            Self::Listener => "listener",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns the broad class of the error.
    fn kind(&self) -> ErrorKind;
}

impl ErrorCode for WireError {
    fn code(&self) -> &'static str {
        match self {
            Self::LengthTooLarge(_) => "length_too_large",
            Self::LengthOverflow => "length_overflow",
            Self::Read(_) => "read_failed",
            Self::ShortRead(_) => "short_read",
            Self::InvalidUtf8 => "invalid_utf8",
        }
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

impl ErrorCode for DaemonError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already_connected",
            Self::NotConnected => "not_connected",
            Self::Connect { .. } => "daemon_connect_failed",
            Self::Write(_) => "daemon_write_failed",
            Self::Wire(e) => e.code(),
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Wire(e) => e.kind(),
            _ => ErrorKind::Connection,
        }
    }
}

impl ErrorCode for NetworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::InterfaceList(_) => "interface_list_failed",
            Self::InterfaceNotFound(_) => "interface_not_found",
            Self::NoIpv4Address(_) => "no_ipv4_address",
        }
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::NetworkResolution
    }
}

impl ErrorCode for SwitchError {
    fn code(&self) -> &'static str {
        "switch_failed"
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Capability
    }
}

impl ErrorCode for AdvertiseError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoLocation => "no_location",
            Self::NoSocket => "no_socket",
            Self::Daemon(e) => e.code(),
            Self::Task(_) => "advertise_task_failed",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoLocation | Self::NoSocket => ErrorKind::Configuration,
            Self::Daemon(e) => e.kind(),
            Self::Task(_) => ErrorKind::Connection,
        }
    }
}

impl ErrorCode for ServerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Bind(_) => "bind_failed",
            Self::Serve(_) => "serve_failed",
            Self::Task(_) => "server_task_failed",
        }
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Listener
    }
}

impl ErrorCode for ControllerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidState { .. } => "invalid_state",
            Self::Network(e) => e.code(),
            Self::Server(e) => e.code(),
            Self::Advertise(e) => e.code(),
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::InvalidState { .. } => ErrorKind::Configuration,
            Self::Network(e) => e.kind(),
            Self::Server(e) => e.kind(),
            Self::Advertise(e) => e.kind(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::controller::ControllerResult;
pub use crate::minissdp::{DaemonResult, WireResult};
pub use crate::switch::SwitchResult;
