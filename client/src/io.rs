//! The reader and writer tasks that share one session.
//!
//! Each task owns one half of the split session and a clone of the
//! [`ControlState`]. A task ends when shutdown is requested elsewhere, or when
//! its own direction fails, in which case it requests shutdown itself. Both
//! hand their half back so the supervisor can close the session once.

use alex_common::{frame::MAX_FRAME_LEN, Frame, FrameBuffer, FrameError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    config::UnknownTagPolicy,
    control::ControlState,
    dispatch::{dispatch, FrameHandler},
    error::{ClientError, Result},
    source::CommandSource,
};

/// Bytes requested from the transport per read
const READ_CHUNK: usize = MAX_FRAME_LEN;

/// Receives frames and hands them to a [`FrameHandler`]
pub struct Reader<R, H> {
    io:           R,
    handler:      H,
    control:      ControlState,
    frames:       FrameBuffer,
    unknown_tags: UnknownTagPolicy,
}

impl<R, H> Reader<R, H>
where
    R: AsyncRead + Unpin,
    H: FrameHandler,
{
    pub fn new(io: R, handler: H, control: ControlState, unknown_tags: UnknownTagPolicy) -> Self {
        Self {
            io,
            handler,
            control,
            frames: FrameBuffer::new(),
            unknown_tags,
        }
    }

    /// Read until shutdown, peer close or failure; returns the read half
    pub async fn run(mut self) -> (R, Result<()>) {
        let result = self.read_loop().await;
        tracing::info!("Exiting network listener");
        (self.io, result)
    }

    async fn read_loop(&mut self) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.control.wait() => return Ok(()),
                read = self.io.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => {
                    tracing::info!("Server closed connection");
                    self.control.request_shutdown();
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("Error reading from server: {}", e);
                    self.control.request_shutdown();
                    return Err(ClientError::Read(e));
                }
            };
            tracing::debug!("Read {} bytes from server", n);

            self.frames.extend(&buf[..n]);
            self.drain_frames()?;
        }
    }

    fn drain_frames(&mut self) -> Result<()> {
        while let Some(next) = self.frames.next_frame() {
            match next {
                Ok(frame) => {
                    tracing::debug!("Dispatching {} frame", frame.kind());
                    dispatch(&mut self.handler, &frame);
                }
                Err(FrameError::UnknownTag(tag)) if self.unknown_tags == UnknownTagPolicy::Drop => {
                    tracing::debug!("Dropping byte with unknown frame tag {}", tag);
                }
                Err(FrameError::UnknownTag(tag)) => {
                    tracing::error!("Rejecting unknown frame tag {}", tag);
                    self.control.request_shutdown();
                    return Err(FrameError::UnknownTag(tag).into());
                }
                Err(e) => {
                    tracing::warn!("Discarding malformed frame: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Sends commands taken from a [`CommandSource`]
pub struct Writer<W, S> {
    io:      W,
    source:  S,
    control: ControlState,
}

impl<W, S> Writer<W, S>
where
    W: AsyncWrite + Unpin,
    S: CommandSource,
{
    pub fn new(io: W, source: S, control: ControlState) -> Self {
        Self {
            io,
            source,
            control,
        }
    }

    /// Write until shutdown, end of commands or failure; returns the write half
    pub async fn run(mut self) -> (W, Result<()>) {
        let result = self.write_loop().await;
        tracing::info!("Exiting command writer");
        (self.io, result)
    }

    async fn write_loop(&mut self) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.control.wait() => return Ok(()),
                next = self.source.next_command() => next,
            };

            let Some(command) = next else {
                tracing::info!("No more commands, ending session");
                self.control.request_shutdown();
                return Ok(());
            };

            let bytes = command.encode();
            tracing::info!("SENDING {} BYTES DATA", bytes.len());
            tracing::debug!("Command {:?}", command);

            if let Err(e) = self.send(&bytes).await {
                tracing::error!("Error writing to server: {}", e);
                self.control.request_shutdown();
                return Err(ClientError::Write(e));
            }
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await
    }
}
