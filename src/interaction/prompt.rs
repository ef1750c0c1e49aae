//! Terminal presentation of questions.
//!
//! Input is read on a dedicated thread and handed over a channel, so a
//! question left pending when the session stops is abandoned instead of
//! holding the scheduler until the user presses Enter.

use crate::core::StopSignal;
use crossbeam_channel::{never, select, unbounded, Receiver};
use std::io::{BufRead, Write};
use std::thread;

/// Errors talking to the user. Treated as a declined question.
#[derive(Debug)]
pub enum PromptError {
    Io(std::io::Error),
    /// The session stopped while waiting for the user
    Cancelled,
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptError::Io(e) => write!(f, "Prompt IO error: {e}"),
            PromptError::Cancelled => write!(f, "Prompt cancelled by session stop"),
        }
    }
}

impl std::error::Error for PromptError {}

impl From<std::io::Error> for PromptError {
    fn from(e: std::io::Error) -> Self {
        PromptError::Io(e)
    }
}

/// Presentation collaborator for one question/answer cycle.
pub trait Prompter: Send {
    /// Show the question and return whether the user accepts to answer.
    fn ask(&mut self, question: &str) -> Result<bool, PromptError>;

    /// Collect a typed answer; `None` when the user leaves it empty.
    fn read_answer(&mut self) -> Result<Option<String>, PromptError>;

    /// Show a status message such as "Speak now".
    fn notify(&mut self, message: &str);

    /// Abandon any wait for the user once `stop` is cancelled.
    fn set_stop_signal(&mut self, _stop: StopSignal) {}
}

/// Line-oriented prompter over an input line stream and a writer.
pub struct ConsolePrompter<W> {
    /// Closed on end of input
    lines: Receiver<String>,
    output: W,
    stop: Option<StopSignal>,
}

impl ConsolePrompter<std::io::Stdout> {
    /// Prompter bound to the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<W: Write> ConsolePrompter<W> {
    /// Prompter reading `input` on a background thread.
    pub fn new<R: BufRead + Send + 'static>(input: R, output: W) -> Self {
        Self::from_lines(spawn_line_reader(input), output)
    }

    /// Prompter over an existing stream of input lines.
    pub fn from_lines(lines: Receiver<String>, output: W) -> Self {
        Self {
            lines,
            output,
            stop: None,
        }
    }

    /// Wait for one line; `None` on end of input.
    fn read_line(&mut self) -> Result<Option<String>, PromptError> {
        let unstoppable = never();
        let stop = match &self.stop {
            Some(stop) if stop.is_cancelled() => return Err(PromptError::Cancelled),
            Some(stop) => stop.receiver(),
            None => &unstoppable,
        };
        select! {
            recv(self.lines) -> line => Ok(line.ok().map(|l| l.trim().to_string())),
            recv(stop) -> _ => Err(PromptError::Cancelled),
        }
    }
}

fn spawn_line_reader<R: BufRead + Send + 'static>(input: R) -> Receiver<String> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "console input failed");
                        break;
                    }
                }
            }
        });
    // Without a reader the channel is already closed: every read sees end of input.
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "could not spawn console reader");
    }
    rx
}

impl<W: Write + Send> Prompter for ConsolePrompter<W> {
    fn ask(&mut self, question: &str) -> Result<bool, PromptError> {
        writeln!(self.output)?;
        writeln!(self.output, "CTA: {question}")?;
        write!(self.output, "Answer now? [y/N] ")?;
        self.output.flush()?;

        let reply = self.read_line()?.unwrap_or_default().to_lowercase();
        Ok(matches!(reply.as_str(), "y" | "yes"))
    }

    fn read_answer(&mut self) -> Result<Option<String>, PromptError> {
        write!(self.output, "Your answer: ")?;
        self.output.flush()?;
        Ok(self.read_line()?.filter(|a| !a.is_empty()))
    }

    fn notify(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
        let _ = self.output.flush();
    }

    fn set_stop_signal(&mut self, stop: StopSignal) {
        self.stop = Some(stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn prompter(input: &str) -> ConsolePrompter<Vec<u8>> {
        ConsolePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_accept_and_decline() {
        let mut p = prompter("y\nno\nYES\n");
        assert!(p.ask("Why this file?").unwrap());
        assert!(!p.ask("Why this file?").unwrap());
        assert!(p.ask("Why this file?").unwrap());

        let shown = String::from_utf8(p.output.clone()).unwrap();
        assert!(shown.contains("CTA: Why this file?"));
    }

    #[test]
    fn test_end_of_input_declines() {
        let mut p = prompter("");
        assert!(!p.ask("Anything?").unwrap());
    }

    #[test]
    fn test_read_answer() {
        let mut p = prompter("  it looked newest  \n\n");
        assert_eq!(p.read_answer().unwrap(), Some("it looked newest".to_string()));
        assert_eq!(p.read_answer().unwrap(), None);
        assert_eq!(p.read_answer().unwrap(), None);
    }

    #[test]
    fn test_stop_abandons_pending_question() {
        let (_keyboard, lines) = unbounded::<String>();
        let mut p = ConsolePrompter::from_lines(lines, Vec::new());
        let stop = StopSignal::new();
        p.set_stop_signal(stop.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stop.cancel();
        });

        let started = Instant::now();
        assert!(matches!(p.ask("Still there?"), Err(PromptError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();

        // Once stopped, no further wait happens.
        assert!(matches!(p.read_answer(), Err(PromptError::Cancelled)));
    }
}
