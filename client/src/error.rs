//! Error types for the Alex client.

use std::{io, net::SocketAddr};

use alex_common::FrameError;
use thiserror::Error;

/// Everything that can end a connection attempt or a running session
#[derive(Debug, Error)]
pub enum ClientError {
    /// Certificates, keys or settings are missing or unusable
    #[error("configuration error: {0:#}")]
    Configuration(anyhow::Error),

    /// The server name did not resolve to an address
    #[error("unable to resolve {host}: {source}")]
    Resolution {
        host:   String,
        #[source]
        source: io::Error,
    },

    /// The TCP connection could not be opened
    #[error("error connecting to {addr}: {source}")]
    Connect {
        addr:   SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A setup step did not finish in time
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// The TLS handshake failed
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The peer's certificate does not carry the expected name
    #[error("peer certificate names {presented:?} do not match expected {expected:?}")]
    Verification {
        expected:  String,
        presented: Vec<String>,
    },

    /// Reading from an established session failed
    #[error("error reading from server: {0}")]
    Read(#[source] io::Error),

    /// Writing to an established session failed
    #[error("error writing to server: {0}")]
    Write(#[source] io::Error),

    /// The peer sent something the configured policy refuses
    #[error("protocol violation: {0}")]
    Protocol(#[from] FrameError),

    /// A reader or writer task panicked or was aborted
    #[error("I/O task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ClientError {
    /// Whether the error only means the session ended underneath a task
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Write(_))
    }
}

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
