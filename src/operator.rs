//! Operator-facing channels: the colored step log and text prompts.

use std::fmt;
use std::io::{self, BufRead, Write};

/// Colors understood by the host log window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Regular information.
    Blue,
    /// Sub-step announcement.
    Cyan,
    /// Success.
    Green,
    /// Warning or debug override.
    Yellow,
    /// Failure.
    Red,
    /// Identifiers worth noticing.
    Purple,
}

impl Color {
    /// Lowercase name, as the host expects it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Cyan => "cyan",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Red => "red",
            Color::Purple => "purple",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for operator log lines.
pub trait StepLog {
    /// Show one line.
    fn log(&mut self, message: &str, color: Color);
}

impl<F: FnMut(&str, Color)> StepLog for F {
    fn log(&mut self, message: &str, color: Color) {
        self(message, color)
    }
}

/// Operator text input.
pub trait Prompt {
    /// Ask for a line of text; `None` means the operator cancelled.
    fn request_input(&mut self, title: &str, message: &str) -> Option<String>;
}

/// Prompt on a terminal.
///
/// An empty line is an answer (press Enter to continue); end of input or the
/// word `cancel` cancels.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process terminal.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    /// Prompt on arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for ConsolePrompt<R, W> {
    fn request_input(&mut self, title: &str, message: &str) -> Option<String> {
        // A broken terminal is treated like a cancel
        writeln!(self.output, "== {} ==", title).ok()?;
        write!(self.output, "{} ", message).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let answer = line.trim();
                if answer.eq_ignore_ascii_case("cancel") {
                    None
                } else {
                    Some(answer.to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_log() {
        let mut lines = Vec::new();
        {
            let mut log = |m: &str, c: Color| lines.push(format!("{}: {}", c, m));
            log.log("Port COM3 opened", Color::Blue);
        }
        assert_eq!(lines, ["blue: Port COM3 opened"]);
    }

    #[test]
    fn test_console_answers() {
        let input = b"T:\\SW\\app.hex\n\ncancel\n" as &[u8];
        let mut output = Vec::new();
        let mut prompt = ConsolePrompt::new(input, &mut output);

        assert_eq!(
            prompt.request_input("Soft", "Path?").as_deref(),
            Some("T:\\SW\\app.hex")
        );
        assert_eq!(prompt.request_input("Retry", "Enter to continue").as_deref(), Some(""));
        assert_eq!(prompt.request_input("Retry", "Enter to continue"), None);
        assert_eq!(prompt.request_input("Retry", "Enter to continue"), None);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("== Soft =="));
    }
}
