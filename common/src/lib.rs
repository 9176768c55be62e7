//! Alex Common Library
//!
//! Shared pieces of the Alex command channel used by both the operator console
//! and the robot endpoint:
//!
//! - Fixed-size frame definitions and their codec
//! - Re-assembly of frames from a byte stream
//! - Certificate locations and PEM loading for mutual TLS
//!
//! # Wire protocol
//!
//! Four frame kinds share one stream, each identified by its first byte:
//! error/acknowledgement (0), status telemetry (1), text message (2) and
//! command (3). See [`frame`] for the exact layouts.

/// Certificate locations and endpoint defaults
pub mod config;

/// Frame definitions and codec
pub mod frame;

/// Stream re-assembly
pub mod frame_buffer;

/// PEM loading and crypto provider selection
pub mod tls;

// Re-export commonly used types for convenience
pub use config::{CertPaths, DEFAULT_PORT, DEFAULT_ROBOT_NAME};
pub use frame::{Command, CommandCode, Frame, FrameError, FrameKind, ResponseCode, StatusReport};
pub use frame_buffer::FrameBuffer;
