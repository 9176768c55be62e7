//! Fixed-size frames exchanged between the operator console and the robot.
//!
//! Every frame starts with a one-byte tag that selects its kind, and every kind
//! has a fixed wire size known to both ends. Integers are little-endian.
//!
//! | Kind    | Tag | Layout                         | Size |
//! |---------|-----|--------------------------------|------|
//! | Error   | 0   | tag, response code             | 2    |
//! | Status  | 1   | tag, 11 x i32                  | 45   |
//! | Message | 2   | tag, NUL-padded text           | 128  |
//! | Command | 3   | tag, command code, 2 x i32     | 10   |

use std::fmt;

use thiserror::Error;

/// Tag of an error/acknowledgement frame
pub const ERROR_TAG: u8 = 0;
/// Tag of a status telemetry frame
pub const STATUS_TAG: u8 = 1;
/// Tag of a free-text message frame
pub const MESSAGE_TAG: u8 = 2;
/// Tag of a movement/control command frame
pub const COMMAND_TAG: u8 = 3;

/// Wire size of an error frame
pub const ERROR_FRAME_LEN: usize = 2;
/// Wire size of a status frame
pub const STATUS_FRAME_LEN: usize = 1 + STATUS_FIELDS * 4;
/// Wire size of a message frame
pub const MESSAGE_FRAME_LEN: usize = 128;
/// Wire size of a command frame
pub const COMMAND_FRAME_LEN: usize = 10;

/// Longest message text that fits in a frame (one byte is kept for the NUL)
pub const MAX_MESSAGE_LEN: usize = MESSAGE_FRAME_LEN - 2;

/// Largest frame of any kind
pub const MAX_FRAME_LEN: usize = MESSAGE_FRAME_LEN;

const STATUS_FIELDS: usize = 11;

/// Errors produced while decoding frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The first byte does not name a known frame kind
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),

    /// The buffer does not hold exactly one frame of the given kind
    #[error("{kind} frame must be {expected} bytes, got {actual}")]
    Length {
        /// Kind selected by the tag byte
        kind:     FrameKind,
        /// Wire size of that kind
        expected: usize,
        /// Bytes supplied
        actual:   usize,
    },

    /// A command frame carried a code outside the command set
    #[error("unknown command code {0:#04x}")]
    UnknownCommand(u8),

    /// Nothing to decode
    #[error("empty frame")]
    Empty,
}

/// The four frame kinds, discriminated by the tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Error,
    Status,
    Message,
    Command,
}

impl FrameKind {
    /// Look up the kind named by a tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            ERROR_TAG => Some(Self::Error),
            STATUS_TAG => Some(Self::Status),
            MESSAGE_TAG => Some(Self::Message),
            COMMAND_TAG => Some(Self::Command),
            _ => None,
        }
    }

    /// Fixed number of bytes a frame of this kind occupies on the wire
    pub fn wire_len(self) -> usize {
        match self {
            Self::Error => ERROR_FRAME_LEN,
            Self::Status => STATUS_FRAME_LEN,
            Self::Message => MESSAGE_FRAME_LEN,
            Self::Command => COMMAND_FRAME_LEN,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Status => "status",
            Self::Message => "message",
            Self::Command => "command",
        };
        f.write_str(name)
    }
}

/// Response code carried by an error frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ok,
    BadPacket,
    BadChecksum,
    BadCommand,
    BadResponse,
    /// Any other byte, kept so it can still be reported
    Unknown(u8),
}

impl ResponseCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Ok,
            2 => Self::BadPacket,
            3 => Self::BadChecksum,
            4 => Self::BadCommand,
            5 => Self::BadResponse,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::BadPacket => 2,
            Self::BadChecksum => 3,
            Self::BadCommand => 4,
            Self::BadResponse => 5,
            Self::Unknown(byte) => byte,
        }
    }
}

/// Command understood by the robot.
///
/// Codes are transmitted as lowercase ASCII; either case is accepted on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Forward,
    Reverse,
    TurnLeft,
    TurnRight,
    /// Stop and sense the colour under the robot
    Stop,
    ClearStats,
    GetStats,
}

impl CommandCode {
    /// Map an ASCII command letter (either case) to a command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte.to_ascii_lowercase() {
            b'f' => Some(Self::Forward),
            b'b' => Some(Self::Reverse),
            b'l' => Some(Self::TurnLeft),
            b'r' => Some(Self::TurnRight),
            b's' => Some(Self::Stop),
            b'c' => Some(Self::ClearStats),
            b'g' => Some(Self::GetStats),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Forward => b'f',
            Self::Reverse => b'b',
            Self::TurnLeft => b'l',
            Self::TurnRight => b'r',
            Self::Stop => b's',
            Self::ClearStats => b'c',
            Self::GetStats => b'g',
        }
    }

    /// Whether the command moves the robot and therefore takes parameters
    pub fn is_movement(self) -> bool {
        matches!(
            self,
            Self::Forward | Self::Reverse | Self::TurnLeft | Self::TurnRight
        )
    }
}

/// A command with its two parameters.
///
/// For forward/reverse the parameters are distance (cm) and power (%); for turns
/// they are angle (degrees) and power (%). Other commands send zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code:   CommandCode,
    pub params: [i32; 2],
}

impl Command {
    pub fn new(code: CommandCode, first: i32, second: i32) -> Self {
        Self {
            code,
            params: [first, second],
        }
    }

    /// A command that carries no parameters
    pub fn bare(code: CommandCode) -> Self {
        Self::new(code, 0, 0)
    }

    pub fn encode(&self) -> [u8; COMMAND_FRAME_LEN] {
        let mut buf = [0u8; COMMAND_FRAME_LEN];
        buf[0] = COMMAND_TAG;
        buf[1] = self.code.as_byte();
        buf[2..6].copy_from_slice(&self.params[0].to_le_bytes());
        buf[6..10].copy_from_slice(&self.params[1].to_le_bytes());
        buf
    }
}

/// Odometry and sensing counters reported by the robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub left_forward_ticks:        i32,
    pub right_forward_ticks:       i32,
    pub left_reverse_ticks:        i32,
    pub right_reverse_ticks:       i32,
    pub left_forward_ticks_turns:  i32,
    pub right_forward_ticks_turns: i32,
    pub left_reverse_ticks_turns:  i32,
    pub right_reverse_ticks_turns: i32,
    pub forward_distance:          i32,
    pub reverse_distance:          i32,
    /// Last sensed colour: 1 = red, 2 = green
    pub colour:                    i32,
}

impl StatusReport {
    fn to_fields(self) -> [i32; STATUS_FIELDS] {
        [
            self.left_forward_ticks,
            self.right_forward_ticks,
            self.left_reverse_ticks,
            self.right_reverse_ticks,
            self.left_forward_ticks_turns,
            self.right_forward_ticks_turns,
            self.left_reverse_ticks_turns,
            self.right_reverse_ticks_turns,
            self.forward_distance,
            self.reverse_distance,
            self.colour,
        ]
    }

    fn from_fields(f: [i32; STATUS_FIELDS]) -> Self {
        Self {
            left_forward_ticks:        f[0],
            right_forward_ticks:       f[1],
            left_reverse_ticks:        f[2],
            right_reverse_ticks:       f[3],
            left_forward_ticks_turns:  f[4],
            right_forward_ticks_turns: f[5],
            left_reverse_ticks_turns:  f[6],
            right_reverse_ticks_turns: f[7],
            forward_distance:          f[8],
            reverse_distance:          f[9],
            colour:                    f[10],
        }
    }
}

/// One unit of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Error(ResponseCode),
    Status(StatusReport),
    Message(String),
    Command(Command),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Error(_) => FrameKind::Error,
            Self::Status(_) => FrameKind::Status,
            Self::Message(_) => FrameKind::Message,
            Self::Command(_) => FrameKind::Command,
        }
    }

    /// Serialize into exactly `self.kind().wire_len()` bytes.
    ///
    /// Message text longer than [`MAX_MESSAGE_LEN`] bytes is truncated at a
    /// character boundary.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Error(code) => vec![ERROR_TAG, code.as_byte()],
            Self::Status(report) => {
                let mut buf = Vec::with_capacity(STATUS_FRAME_LEN);
                buf.push(STATUS_TAG);
                for field in report.to_fields() {
                    buf.extend_from_slice(&field.to_le_bytes());
                }
                buf
            }
            Self::Message(text) => {
                let mut buf = vec![0u8; MESSAGE_FRAME_LEN];
                buf[0] = MESSAGE_TAG;
                let mut end = text.len().min(MAX_MESSAGE_LEN);
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                buf[1..1 + end].copy_from_slice(&text.as_bytes()[..end]);
                buf
            }
            Self::Command(command) => command.encode().to_vec(),
        }
    }

    /// Decode a buffer holding exactly one frame
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let tag = *buf.first().ok_or(FrameError::Empty)?;
        let kind = FrameKind::from_tag(tag).ok_or(FrameError::UnknownTag(tag))?;
        if buf.len() != kind.wire_len() {
            return Err(FrameError::Length {
                kind,
                expected: kind.wire_len(),
                actual: buf.len(),
            });
        }

        let frame = match kind {
            FrameKind::Error => Self::Error(ResponseCode::from_byte(buf[1])),
            FrameKind::Status => {
                let mut fields = [0i32; STATUS_FIELDS];
                for (field, chunk) in fields.iter_mut().zip(buf[1..].chunks_exact(4)) {
                    *field = read_i32(chunk);
                }
                Self::Status(StatusReport::from_fields(fields))
            }
            FrameKind::Message => {
                let payload = &buf[1..];
                let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                Self::Message(String::from_utf8_lossy(&payload[..end]).into_owned())
            }
            FrameKind::Command => {
                let code =
                    CommandCode::from_byte(buf[1]).ok_or(FrameError::UnknownCommand(buf[1]))?;
                Self::Command(Command::new(code, read_i32(&buf[2..6]), read_i32(&buf[6..10])))
            }
        };
        Ok(frame)
    }
}

fn read_i32(chunk: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(chunk);
    i32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_command_layout() {
        let command = Command::new(CommandCode::Forward, 50, 75);
        let bytes = command.encode();

        assert_eq!(bytes.len(), COMMAND_FRAME_LEN);
        assert_eq!(bytes[0], COMMAND_TAG);
        assert_eq!(bytes[1], b'f');
        assert_eq!(&bytes[2..6], &50i32.to_le_bytes());
        assert_eq!(&bytes[6..10], &75i32.to_le_bytes());

        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, Frame::Command(command));
    }

    #[test]
    fn test_command_params_survive_extremes() {
        for code in [
            CommandCode::Forward,
            CommandCode::Reverse,
            CommandCode::TurnLeft,
            CommandCode::TurnRight,
            CommandCode::Stop,
            CommandCode::ClearStats,
            CommandCode::GetStats,
        ] {
            let command = Command::new(code, i32::MIN, i32::MAX);
            let frame = Frame::Command(command);
            assert_eq!(Frame::decode(&frame.encode()).unwrap(), frame);
        }
    }

    #[test]
    fn test_uppercase_command_code_decodes() {
        let mut bytes = Command::new(CommandCode::Reverse, 10, 20).encode();
        bytes[1] = b'B';
        assert_eq!(
            Frame::decode(&bytes).unwrap(),
            Frame::Command(Command::new(CommandCode::Reverse, 10, 20))
        );
    }

    #[test]
    fn test_unknown_command_code() {
        let mut bytes = Command::bare(CommandCode::Stop).encode();
        bytes[1] = b'q';
        assert_eq!(Frame::decode(&bytes), Err(FrameError::UnknownCommand(b'q')));
    }

    #[test]
    fn test_status_is_lossless() {
        let report = StatusReport {
            left_forward_ticks:        1,
            right_forward_ticks:       -2,
            left_reverse_ticks:        i32::MAX,
            right_reverse_ticks:       i32::MIN,
            left_forward_ticks_turns:  5,
            right_forward_ticks_turns: 6,
            left_reverse_ticks_turns:  -7,
            right_reverse_ticks_turns: 8,
            forward_distance:          900,
            reverse_distance:          -1000,
            colour:                    2,
        };
        let bytes = Frame::Status(report).encode();

        assert_eq!(bytes.len(), 45);
        assert_eq!(bytes[0], STATUS_TAG);
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Status(report));
    }

    #[test]
    fn test_error_frame_codes() {
        assert_eq!(Frame::Error(ResponseCode::BadChecksum).encode(), vec![0, 3]);
        assert_eq!(
            Frame::decode(&[ERROR_TAG, 4]).unwrap(),
            Frame::Error(ResponseCode::BadCommand)
        );
        assert_eq!(
            Frame::decode(&[ERROR_TAG, 1]).unwrap(),
            Frame::Error(ResponseCode::Unknown(1))
        );
    }

    #[test]
    fn test_message_stops_at_nul() {
        let mut bytes = Frame::Message("hello".to_string()).encode();
        assert_eq!(bytes.len(), MESSAGE_FRAME_LEN);
        bytes[10] = b'x';

        assert_eq!(
            Frame::decode(&bytes).unwrap(),
            Frame::Message("hello".to_string())
        );
    }

    #[test]
    fn test_long_message_is_truncated_on_char_boundary() {
        let text = "é".repeat(100);
        let bytes = Frame::Message(text).encode();

        let Frame::Message(decoded) = Frame::decode(&bytes).unwrap() else {
            panic!("expected message frame");
        };
        assert!(decoded.len() <= MAX_MESSAGE_LEN);
        assert!(decoded.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_decode_rejects_wrong_length_and_tag() {
        assert_eq!(
            Frame::decode(&[STATUS_TAG, 0, 0]),
            Err(FrameError::Length {
                kind:     FrameKind::Status,
                expected: STATUS_FRAME_LEN,
                actual:   3,
            })
        );
        assert_eq!(Frame::decode(&[9, 0]), Err(FrameError::UnknownTag(9)));
        assert_eq!(Frame::decode(&[]), Err(FrameError::Empty));
    }
}
