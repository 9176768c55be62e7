//! Where outbound commands come from.

use std::{future::Future, io::Write};

use alex_common::{Command, CommandCode};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin},
    sync::mpsc,
};

/// Produces the commands the writer task sends.
///
/// Returning `None` ends the session: the operator quit, input ran out, or the
/// application is done.
pub trait CommandSource: Send + 'static {
    fn next_command(&mut self) -> impl Future<Output = Option<Command>> + Send;
}

/// Placeholder for clients started without a writer
impl CommandSource for () {
    async fn next_command(&mut self) -> Option<Command> {
        None
    }
}

/// Parameters used for turn commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnParameters {
    /// Ask the operator for angle and power on every turn
    #[default]
    Prompt,
    /// Always turn by this angle at this power
    Fixed { angle: i32, power: i32 },
}

/// Reads single-letter commands from an interactive console
pub struct ConsoleSource<R, W> {
    input:  R,
    prompt: W,
    turns:  TurnParameters,
    line:   Vec<u8>,
}

/// One read from the console
enum Input {
    Line(String),
    /// The line was not valid UTF-8
    Garbled,
    End,
}

impl ConsoleSource<BufReader<Stdin>, std::io::Stdout> {
    /// Console on the process's stdin and stdout
    pub fn stdio(turns: TurnParameters) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout(), turns)
    }
}

impl<R, W> ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(input: R, prompt: W, turns: TurnParameters) -> Self {
        Self {
            input,
            prompt,
            turns,
            line: Vec::new(),
        }
    }

    pub fn into_prompt(self) -> W {
        self.prompt
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = self
            .prompt
            .write_all(text.as_bytes())
            .and_then(|_| self.prompt.flush())
        {
            tracing::warn!("Failed to write to console: {}", e);
        }
    }

    /// Next trimmed input line. Only end of input or a failing console ends
    /// the source; undecodable bytes are reported as [`Input::Garbled`].
    async fn read_line(&mut self) -> Input {
        self.line.clear();
        match self.input.read_until(b'\n', &mut self.line).await {
            Ok(0) => Input::End,
            Ok(_) => match std::str::from_utf8(&self.line) {
                Ok(text) => Input::Line(text.trim().to_string()),
                Err(_) => Input::Garbled,
            },
            Err(e) => {
                tracing::error!("Failed to read console input: {}", e);
                Input::End
            }
        }
    }

    /// Ask for the two parameters of a movement command.
    ///
    /// `Ok(None)` means input ended; `Err(())` means the line did not hold two
    /// integers.
    async fn read_params(&mut self) -> Result<Option<[i32; 2]>, ()> {
        self.say(
            "Enter distance/angle in cm/degrees (e.g. 50) and power in % (e.g. 75) separated by space.\n\
             E.g. 50 75 means go at 50 cm at 75% power for forward/backward, or 50 degrees left or right turn at 75% power\n",
        );
        match self.read_line().await {
            Input::Line(line) => parse_params(&line).map(Some).ok_or(()),
            Input::Garbled => Err(()),
            Input::End => Ok(None),
        }
    }
}

fn parse_params(line: &str) -> Option<[i32; 2]> {
    let mut fields = line.split_whitespace().map(str::parse::<i32>);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(first)), Some(Ok(second)), None) => Some([first, second]),
        _ => None,
    }
}

impl<R, W> CommandSource for ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write + Send + 'static,
{
    async fn next_command(&mut self) -> Option<Command> {
        loop {
            self.say(
                "Command (f=forward, b=reverse, l=turn left, r=turn right, s=stop & sense colour, \
                 c=clear stats, g=get stats, q=exit)\n",
            );
            let line = match self.read_line().await {
                Input::Line(line) => line,
                Input::Garbled => {
                    self.say("BAD COMMAND\n");
                    continue;
                }
                Input::End => return None,
            };
            let mut chars = line.chars();
            let (Some(letter), None) = (chars.next(), chars.next()) else {
                if !line.is_empty() {
                    self.say("BAD COMMAND\n");
                }
                continue;
            };

            if letter.eq_ignore_ascii_case(&'q') {
                return None;
            }

            let Some(code) = u8::try_from(letter).ok().and_then(CommandCode::from_byte) else {
                self.say("BAD COMMAND\n");
                continue;
            };

            let params = match (code, self.turns) {
                (CommandCode::TurnLeft | CommandCode::TurnRight, TurnParameters::Fixed { angle, power }) => {
                    [angle, power]
                }
                (code, _) if code.is_movement() => match self.read_params().await {
                    Ok(Some(params)) => params,
                    Ok(None) => return None,
                    Err(()) => {
                        self.say("BAD COMMAND\n");
                        continue;
                    }
                },
                _ => [0, 0],
            };

            return Some(Command::new(code, params[0], params[1]));
        }
    }
}

/// Takes commands from application code over a channel
pub struct ChannelSource {
    commands: mpsc::Receiver<Command>,
}

impl ChannelSource {
    pub fn new(commands: mpsc::Receiver<Command>) -> Self {
        Self { commands }
    }

    /// Create a source together with its sending end; dropping every sender
    /// ends the session
    pub fn channel(capacity: usize) -> (mpsc::Sender<Command>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl CommandSource for ChannelSource {
    async fn next_command(&mut self) -> Option<Command> {
        self.commands.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &'static str, turns: TurnParameters) -> ConsoleSource<&'static [u8], Vec<u8>> {
        ConsoleSource::new(input.as_bytes(), Vec::new(), turns)
    }

    #[tokio::test]
    async fn test_forward_reads_parameters() {
        let mut source = console("f\n50 75\n", TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::new(CommandCode::Forward, 50, 75))
        );
        assert_eq!(source.next_command().await, None);
    }

    #[tokio::test]
    async fn test_uppercase_letters_are_accepted() {
        let mut source = console("B\n10 20\nG\n", TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::new(CommandCode::Reverse, 10, 20))
        );
        assert_eq!(
            source.next_command().await,
            Some(Command::bare(CommandCode::GetStats))
        );
    }

    #[tokio::test]
    async fn test_bad_command_is_reported_and_skipped() {
        let mut source = console("x\nforward\n\ns\n", TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::bare(CommandCode::Stop))
        );
        let prompt = String::from_utf8(source.into_prompt()).unwrap();
        assert_eq!(prompt.matches("BAD COMMAND").count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_reported_and_skipped() {
        // A bad command line, then a bad parameter line
        let input: &'static [u8] = b"\xff\xfe\nf\n\xc3\ng\n";
        let mut source = ConsoleSource::new(input, Vec::new(), TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::bare(CommandCode::GetStats))
        );
        let prompt = String::from_utf8(source.into_prompt()).unwrap();
        assert_eq!(prompt.matches("BAD COMMAND").count(), 2);
    }

    #[tokio::test]
    async fn test_bad_parameters_send_nothing() {
        let mut source = console("f\nfifty\nc\n", TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::bare(CommandCode::ClearStats))
        );
    }

    #[tokio::test]
    async fn test_turns_use_fixed_parameters_when_configured() {
        let mut source = console("l\nR\n", TurnParameters::Fixed { angle: 20, power: 100 });

        assert_eq!(
            source.next_command().await,
            Some(Command::new(CommandCode::TurnLeft, 20, 100))
        );
        assert_eq!(
            source.next_command().await,
            Some(Command::new(CommandCode::TurnRight, 20, 100))
        );
    }

    #[tokio::test]
    async fn test_turns_prompt_by_default() {
        let mut source = console("r\n90 60\n", TurnParameters::Prompt);

        assert_eq!(
            source.next_command().await,
            Some(Command::new(CommandCode::TurnRight, 90, 60))
        );
    }

    #[tokio::test]
    async fn test_quit_ends_the_source() {
        let mut source = console("q\ng\n", TurnParameters::Prompt);
        assert_eq!(source.next_command().await, None);
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(Command::bare(CommandCode::GetStats)).await.unwrap();
        drop(tx);

        assert_eq!(
            source.next_command().await,
            Some(Command::bare(CommandCode::GetStats))
        );
        assert_eq!(source.next_command().await, None);
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params("50 75"), Some([50, 75]));
        assert_eq!(parse_params("  -5\t100 "), Some([-5, 100]));
        assert_eq!(parse_params("50"), None);
        assert_eq!(parse_params("1 2 3"), None);
    }
}
