//! Routing of received frames to their handlers.

use std::io::Write;

use alex_common::{Command, Frame, ResponseCode, StatusReport};
use tokio::sync::mpsc;

/// Receives decoded frames from the reader task.
///
/// Each frame kind has its own method; [`dispatch`] calls exactly one of them
/// per frame, chosen by the frame's tag.
pub trait FrameHandler: Send + 'static {
    fn on_error(&mut self, code: ResponseCode);

    fn on_status(&mut self, status: &StatusReport);

    fn on_message(&mut self, text: &str);

    /// The robot does not send commands; kept for protocol completeness.
    fn on_command(&mut self, _command: &Command) {}
}

/// Hand a frame to the handler method for its kind
pub fn dispatch<H: FrameHandler + ?Sized>(handler: &mut H, frame: &Frame) {
    match frame {
        Frame::Error(code) => handler.on_error(*code),
        Frame::Status(status) => handler.on_status(status),
        Frame::Message(text) => handler.on_message(text),
        Frame::Command(command) => handler.on_command(command),
    }
}

/// Placeholder for clients started without a reader
impl FrameHandler for () {
    fn on_error(&mut self, _code: ResponseCode) {}

    fn on_status(&mut self, _status: &StatusReport) {}

    fn on_message(&mut self, _text: &str) {}
}

/// Prints frames for a human operator
pub struct ConsoleHandler<W> {
    out: W,
}

impl ConsoleHandler<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> ConsoleHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(text).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write to console: {}", e);
        }
    }
}

impl<W: Write + Send + 'static> FrameHandler for ConsoleHandler<W> {
    fn on_error(&mut self, code: ResponseCode) {
        let text = match code {
            ResponseCode::Ok => "Command / Status OK",
            ResponseCode::BadPacket => "BAD MAGIC NUMBER FROM ARDUINO",
            ResponseCode::BadChecksum => "BAD CHECKSUM FROM ARDUINO",
            ResponseCode::BadCommand => "PI SENT BAD COMMAND TO ARDUINO",
            ResponseCode::BadResponse => "PI GOT BAD RESPONSE FROM ARDUINO",
            ResponseCode::Unknown(_) => "PI IS CONFUSED!",
        };
        self.print(format_args!("{text}\n"));
    }

    fn on_status(&mut self, s: &StatusReport) {
        self.print(format_args!(
            "\n ------- ALEX STATUS REPORT ------- \n\n\
             Left Forward Ticks:\t\t{}\n\
             Right Forward Ticks:\t\t{}\n\
             Left Reverse Ticks:\t\t{}\n\
             Right Reverse Ticks:\t\t{}\n\
             Left Forward Ticks Turns:\t{}\n\
             Right Forward Ticks Turns:\t{}\n\
             Left Reverse Ticks Turns:\t{}\n\
             Right Reverse Ticks Turns:\t{}\n\
             Forward Distance:\t\t{}\n\
             Reverse Distance:\t\t{}\n\
             Detected colour (1 = RED, 2 = GREEN): \t{}\n\
             \n---------------------------------------\n\n",
            s.left_forward_ticks,
            s.right_forward_ticks,
            s.left_reverse_ticks,
            s.right_reverse_ticks,
            s.left_forward_ticks_turns,
            s.right_forward_ticks_turns,
            s.left_reverse_ticks_turns,
            s.right_reverse_ticks_turns,
            s.forward_distance,
            s.reverse_distance,
            s.colour,
        ));
    }

    fn on_message(&mut self, text: &str) {
        self.print(format_args!("MESSAGE FROM ALEX: {text}\n"));
    }
}

/// Forwards frames to application code over a channel
pub struct ChannelHandler {
    frames: mpsc::UnboundedSender<Frame>,
}

impl ChannelHandler {
    pub fn new(frames: mpsc::UnboundedSender<Frame>) -> Self {
        Self { frames }
    }

    /// Create a handler together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn forward(&mut self, frame: Frame) {
        if self.frames.send(frame).is_err() {
            tracing::debug!("Frame receiver dropped, discarding frame");
        }
    }
}

impl FrameHandler for ChannelHandler {
    fn on_error(&mut self, code: ResponseCode) {
        self.forward(Frame::Error(code));
    }

    fn on_status(&mut self, status: &StatusReport) {
        self.forward(Frame::Status(*status));
    }

    fn on_message(&mut self, text: &str) {
        self.forward(Frame::Message(text.to_string()));
    }

    fn on_command(&mut self, command: &Command) {
        self.forward(Frame::Command(*command));
    }
}
