//! Simulated robot controller state.

use alex_common::{Command, CommandCode, Frame, FrameError, ResponseCode, StatusReport};

/// Encoder ticks per centimetre travelled
pub const TICKS_PER_CM: i32 = 4;

/// Encoder ticks per degree turned on the spot
pub const TICKS_PER_DEGREE: i32 = 2;

const RED: i32 = 1;
const GREEN: i32 = 2;

/// Odometry counters and colour sensor of a simulated robot
#[derive(Debug, Default)]
pub struct Robot {
    status:       StatusReport,
    /// Number of colour readings taken; selects the next colour
    sensed_count: u32,
}

impl Robot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusReport {
        self.status
    }

    /// Reply frames for one received frame, in the order they are sent
    pub fn handle(&mut self, frame: &Frame) -> Vec<Frame> {
        match frame {
            Frame::Command(command) => self.execute(command),
            other => {
                tracing::warn!("Unexpected {} frame from client", other.kind());
                vec![Frame::Error(ResponseCode::BadPacket)]
            }
        }
    }

    /// Reply for bytes that did not decode into a frame
    pub fn reject(&self, error: &FrameError) -> Frame {
        tracing::warn!("Rejecting client data: {}", error);
        match error {
            FrameError::UnknownCommand(_) => Frame::Error(ResponseCode::BadCommand),
            _ => Frame::Error(ResponseCode::BadPacket),
        }
    }

    fn execute(&mut self, command: &Command) -> Vec<Frame> {
        let [amount, power] = command.params;
        let s = &mut self.status;

        match command.code {
            CommandCode::Forward
            | CommandCode::Reverse
            | CommandCode::TurnLeft
            | CommandCode::TurnRight
                if !(0..=100).contains(&power) =>
            {
                tracing::warn!("Power {} out of range for {:?}", power, command.code);
                return vec![Frame::Error(ResponseCode::BadCommand)];
            }
            CommandCode::Forward => {
                let ticks = amount.saturating_mul(TICKS_PER_CM);
                s.forward_distance = s.forward_distance.wrapping_add(amount);
                s.left_forward_ticks = s.left_forward_ticks.wrapping_add(ticks);
                s.right_forward_ticks = s.right_forward_ticks.wrapping_add(ticks);
                tracing::info!("Forward {} cm at {}%", amount, power);
            }
            CommandCode::Reverse => {
                let ticks = amount.saturating_mul(TICKS_PER_CM);
                s.reverse_distance = s.reverse_distance.wrapping_add(amount);
                s.left_reverse_ticks = s.left_reverse_ticks.wrapping_add(ticks);
                s.right_reverse_ticks = s.right_reverse_ticks.wrapping_add(ticks);
                tracing::info!("Reverse {} cm at {}%", amount, power);
            }
            // Turning on the spot drives the wheels in opposite directions
            CommandCode::TurnLeft => {
                let ticks = amount.saturating_mul(TICKS_PER_DEGREE);
                s.left_reverse_ticks_turns = s.left_reverse_ticks_turns.wrapping_add(ticks);
                s.right_forward_ticks_turns = s.right_forward_ticks_turns.wrapping_add(ticks);
                tracing::info!("Left {} degrees at {}%", amount, power);
            }
            CommandCode::TurnRight => {
                let ticks = amount.saturating_mul(TICKS_PER_DEGREE);
                s.left_forward_ticks_turns = s.left_forward_ticks_turns.wrapping_add(ticks);
                s.right_reverse_ticks_turns = s.right_reverse_ticks_turns.wrapping_add(ticks);
                tracing::info!("Right {} degrees at {}%", amount, power);
            }
            CommandCode::Stop => {
                let (colour, name) = self.sense_colour();
                self.status.colour = colour;
                tracing::info!("Stopped, sensed {}", name);
                return vec![
                    Frame::Error(ResponseCode::Ok),
                    Frame::Message(format!("Colour is {name}")),
                ];
            }
            CommandCode::ClearStats => {
                self.status = StatusReport::default();
                tracing::info!("Counters cleared");
            }
            CommandCode::GetStats => return vec![Frame::Status(self.status)],
        }

        vec![Frame::Error(ResponseCode::Ok)]
    }

    fn sense_colour(&mut self) -> (i32, &'static str) {
        self.sensed_count += 1;
        if self.sensed_count % 2 == 1 {
            (RED, "RED")
        } else {
            (GREEN, "GREEN")
        }
    }
}
