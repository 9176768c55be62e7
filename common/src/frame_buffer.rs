//! Re-assembly of frames from a byte stream.
//!
//! Transport reads may split a frame across several calls or deliver several
//! frames at once. The first buffered byte decides the frame kind and hence how
//! many bytes must be present before the frame is decoded; partial frames are
//! never handed out.

use crate::frame::{Frame, FrameError, FrameKind, MAX_FRAME_LEN};

/// Accumulates received bytes and yields complete frames in arrival order
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(2 * MAX_FRAME_LEN),
        }
    }

    /// Append bytes from a transport read
    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as frames
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Take the next complete frame, if one is buffered.
    ///
    /// Returns `None` when more bytes are needed. An unknown tag byte is consumed
    /// and reported as [`FrameError::UnknownTag`] so the caller can decide whether
    /// to skip it; the following byte is then treated as a new tag. A complete
    /// frame whose body fails to decode is consumed and its error returned.
    pub fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        let tag = *self.pending.first()?;

        let Some(kind) = FrameKind::from_tag(tag) else {
            self.pending.drain(..1);
            return Some(Err(FrameError::UnknownTag(tag)));
        };

        let len = kind.wire_len();
        if self.pending.len() < len {
            return None;
        }

        let decoded = Frame::decode(&self.pending[..len]);
        self.pending.drain(..len);
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Command, CommandCode, ResponseCode, StatusReport, STATUS_FRAME_LEN};

    fn sample_status() -> StatusReport {
        StatusReport {
            left_forward_ticks: 120,
            right_forward_ticks: 118,
            forward_distance: 60,
            colour: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_split_across_three_reads() {
        let bytes = Frame::Status(sample_status()).encode();
        assert_eq!(bytes.len(), STATUS_FRAME_LEN);

        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for chunk in [&bytes[..10], &bytes[10..30], &bytes[30..45]] {
            buffer.extend(chunk);
            while let Some(frame) = buffer.next_frame() {
                frames.push(frame.unwrap());
            }
        }

        assert_eq!(frames, vec![Frame::Status(sample_status())]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_partial_frame_is_held_back() {
        let bytes = Frame::Status(sample_status()).encode();
        let mut buffer = FrameBuffer::new();

        buffer.extend(&bytes[..44]);
        assert!(buffer.next_frame().is_none());
        assert_eq!(buffer.pending(), 44);

        buffer.extend(&bytes[44..]);
        assert_eq!(
            buffer.next_frame().unwrap().unwrap(),
            Frame::Status(sample_status())
        );
    }

    #[test]
    fn test_several_frames_in_one_read() {
        let mut bytes = Frame::Error(ResponseCode::Ok).encode();
        bytes.extend(Frame::Message("Stopped".to_string()).encode());
        bytes.extend(Frame::Command(Command::new(CommandCode::TurnLeft, 90, 40)).encode());

        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);

        assert_eq!(
            buffer.next_frame().unwrap().unwrap(),
            Frame::Error(ResponseCode::Ok)
        );
        assert_eq!(
            buffer.next_frame().unwrap().unwrap(),
            Frame::Message("Stopped".to_string())
        );
        assert_eq!(
            buffer.next_frame().unwrap().unwrap(),
            Frame::Command(Command::new(CommandCode::TurnLeft, 90, 40))
        );
        assert!(buffer.next_frame().is_none());
    }

    #[test]
    fn test_unknown_tag_consumes_one_byte() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&[0x7f]);
        buffer.extend(&Frame::Error(ResponseCode::BadPacket).encode());

        assert_eq!(buffer.next_frame(), Some(Err(FrameError::UnknownTag(0x7f))));
        assert_eq!(
            buffer.next_frame(),
            Some(Ok(Frame::Error(ResponseCode::BadPacket)))
        );
        assert!(buffer.next_frame().is_none());
    }
}
