//! Alex Operator Client Library
//!
//! This crate connects an operator console to the Alex robot over mutually
//! authenticated TLS and runs a full-duplex command channel on the session:
//! a writer task sends [`Command`] frames taken from a [`CommandSource`] while
//! a reader task hands every received frame to a [`FrameHandler`].
//!
//! # Example
//!
//! ```no_run
//! use alex_client::{ChannelHandler, ChannelSource, Client, Command, CommandCode, ConnectionConfig};
//!
//! # async fn run() -> alex_client::Result<()> {
//! let config = ConnectionConfig::new("192.168.43.124", 5000)
//!     .with_expected_peer_name("alex.robot.local");
//!
//! let (handler, mut frames) = ChannelHandler::channel();
//! let (commands, source) = ChannelSource::channel(8);
//! let client = Client::start(config, Some(handler), Some(source));
//!
//! commands.send(Command::bare(CommandCode::GetStats)).await.ok();
//! if let Some(frame) = frames.recv().await {
//!     println!("Robot replied: {frame:?}");
//! }
//!
//! // Dropping the last sender ends the session
//! drop(commands);
//! client.wait().await
//! # }
//! ```

mod client;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod session;
pub mod source;
pub mod verifier;

pub use client::Client;
pub use config::{ClientIdentity, ConnectionConfig, UnknownTagPolicy};
pub use control::ControlState;
pub use dispatch::{dispatch, ChannelHandler, ConsoleHandler, FrameHandler};
pub use error::{ClientError, Result};
pub use session::{Session, SessionFactory};
pub use source::{ChannelSource, CommandSource, ConsoleSource, TurnParameters};
pub use verifier::PeerIdentity;
// Re-export the wire types so callers need not depend on alex-common directly
pub use alex_common::{Command, CommandCode, Frame, ResponseCode, StatusReport};
