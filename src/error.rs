//! Error types for the MaxDB thin client.

use std::io;
use std::panic::Location;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for MaxDB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for MaxDB thin client operations.
///
/// Every variant maps to a stable message key (see [`Error::key`]); the
/// variant fields are the arguments of that message.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection timed out during TCP connect.
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}': {message}")]
    DnsResolutionFailed { hostname: String, message: String },

    /// TLS setup or handshake failed.
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// The RTE layer answered with a non-zero return code.
    #[error("Communication error: RTE return code {code}")]
    Communication { code: i32 },

    /// The server does not know the requested database.
    #[error("Unknown database: {name}")]
    UnknownDatabase { name: String },

    /// A packet, segment or part does not have the structure it claims.
    #[error("Protocol framing error: {message} [{hex}]")]
    ProtocolFraming { message: String, hex: String },

    /// Buffer too small.
    #[error("Buffer too small: need {needed} bytes, have {available} filed at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },

    /// Malformed or out-of-range VDN number.
    #[error("Invalid VDN number: {message} [{hex}]")]
    NumericConversion { message: String, hex: String },

    /// The server challenge could not be parsed.
    #[error("Wrong server challenge [{hex}]")]
    WrongServerChallenge { hex: String },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// SQL error reported by the server.
    #[error("[{code}] ({sql_state}) {message}")]
    Server {
        code: i32,
        sql_state: String,
        message: String,
        error_pos: i32,
    },

    /// Acquisition from a pool timed out.
    #[error("Connection pool '{key}' exhausted after waiting {timeout:?}")]
    PoolExhausted { key: String, timeout: Duration },

    /// No pool entry exists for the key.
    #[error("Connection pool '{key}' not found")]
    ResourceNotFound { key: String },

    /// Parse id of the wrong shape.
    #[error("Invalid parse id: {hex}")]
    InvalidParseId { hex: String },

    /// The session lost packet synchronization (for example after cancel).
    #[error("Session is desynchronized and must be reopened")]
    Desynchronized,

    /// Type conversion error.
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Invalid connect string.
    #[error("Invalid connect string: {message}")]
    InvalidConnectString { message: String },

    /// A value was bound to a LONG parameter. Long input needs PUTVAL
    /// streaming, which this client does not send; long columns can still
    /// be read.
    #[error("Input of {value} for {data_type} parameters is not supported")]
    LongInputUnsupported { data_type: String, value: String },
}

impl Error {
    /// Create a framing error carrying a hex dump of the offending bytes.
    pub fn framing(message: impl Into<String>, bytes: &[u8]) -> Self {
        Self::ProtocolFraming {
            message: message.into(),
            hex: crate::protocol::crypto::bytes_to_hex_upper(bytes),
        }
    }

    /// Create a VDN conversion error for the given raw number bytes.
    pub fn numeric(message: impl Into<String>, bytes: &[u8]) -> Self {
        Self::NumericConversion {
            message: message.into(),
            hex: crate::protocol::crypto::bytes_to_hex_upper(bytes),
        }
    }

    /// Create a server challenge error for the given part payload.
    pub fn wrong_challenge(bytes: &[u8]) -> Self {
        Self::WrongServerChallenge {
            hex: crate::protocol::crypto::bytes_to_hex_upper(bytes),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create an invalid connect string error.
    pub fn connect_string(message: impl Into<String>) -> Self {
        Self::InvalidConnectString {
            message: message.into(),
        }
    }

    /// Stable message key of this error.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            Self::DnsResolutionFailed { .. } => "HOST_CONNECT_FAILED",
            Self::Tls { .. } => "SSL_ERROR",
            Self::Communication { .. } => "COMMUNICATION_ERROR",
            Self::UnknownDatabase { .. } => "SERVER_DB_UNKNOWN",
            Self::ProtocolFraming { .. } => "PROTOCOL_FRAMING",
            Self::BufferTooSmall { .. } => "BUFFER_TOO_SMALL",
            Self::NumericConversion { .. } => "CONVERSION_VDN_NUMBER",
            Self::WrongServerChallenge { .. } => "CONNECTION_WRONG_SERVER_CHALLENGE",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::Server { .. } => "SQL_ERROR",
            Self::PoolExhausted { .. } => "POOL_EXHAUSTED",
            Self::ResourceNotFound { .. } => "POOL_NOT_FOUND",
            Self::InvalidParseId { .. } => "INVALID_PARSE_ID",
            Self::Desynchronized => "SESSION_DESYNCHRONIZED",
            Self::TypeConversion { .. } => "CONVERSION_ERROR",
            Self::InvalidConnectString { .. } => "INVALID_CONNECT_STRING",
            Self::LongInputUnsupported { .. } => "LONG_INPUT_UNSUPPORTED",
        }
    }

    /// Whether the session that produced this error can no longer be used.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::Tls { .. }
                | Self::Communication { .. }
                | Self::ProtocolFraming { .. }
                | Self::BufferTooSmall { .. }
                | Self::WrongServerChallenge { .. }
                | Self::AuthenticationFailed { .. }
                | Self::Desynchronized
        )
    }
}
