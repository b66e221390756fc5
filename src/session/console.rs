//! Line-oriented terminal access
//!
//! The session talks to the user only through [`Console`]. [`StdConsole`] is the
//! real terminal; [`ScriptedConsole`] replays canned input and records a
//! transcript, which is how session flows are tested.

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{CafeError, Result};

/// Reads lines from and writes lines to the user
pub trait Console {
    /// Print a line to standard output
    fn say(&mut self, text: &str) -> Result<()>;

    /// Print a line to standard error
    fn complain(&mut self, text: &str) -> Result<()>;

    /// Print `label` without a newline and read one line (without its terminator)
    ///
    /// # Errors
    /// * `InputClosed` at end of input
    fn prompt(&mut self, label: &str) -> Result<String>;

    /// Like [`Console::prompt`], without echoing the input where possible
    fn prompt_secret(&mut self, label: &str) -> Result<String>;
}

/// Console over the process's stdin/stdout/stderr
pub struct StdConsole {
    stdin: io::Stdin,
}

impl StdConsole {
    #[must_use]
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(io::stdout().lock(), "{text}").map_err(terminal_error)
    }

    fn complain(&mut self, text: &str) -> Result<()> {
        writeln!(io::stderr().lock(), "{text}").map_err(terminal_error)
    }

    fn prompt(&mut self, label: &str) -> Result<String> {
        {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{label}").map_err(terminal_error)?;
            stdout.flush().map_err(terminal_error)?;
        }

        let mut line = String::new();
        let read = self.stdin.lock().read_line(&mut line).map_err(terminal_error)?;
        if read == 0 {
            return Err(CafeError::InputClosed);
        }

        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    fn prompt_secret(&mut self, label: &str) -> Result<String> {
        if !self.stdin.is_terminal() {
            return self.prompt(label);
        }

        dialoguer::Password::new()
            .with_prompt(label.trim().trim_end_matches(':'))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| CafeError::terminal(e.to_string()))
    }
}

fn terminal_error(err: io::Error) -> CafeError {
    CafeError::terminal(err.to_string())
}

/// Console that replays scripted input and records everything shown
///
/// Prompts and the answers given to them are echoed into the transcript the way
/// they would appear on a terminal. Secret answers are not echoed.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    transcript: String,
    errors: String,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            transcript: String::new(),
            errors: String::new(),
        }
    }

    /// Everything written to standard output, including echoed input
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Everything written to standard error
    #[must_use]
    pub fn errors(&self) -> &str {
        &self.errors
    }

    /// Number of scripted lines not yet consumed
    #[must_use]
    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }

    fn next_input(&mut self, label: &str) -> Result<String> {
        self.transcript.push_str(label);
        match self.inputs.pop_front() {
            Some(input) => Ok(input),
            None => {
                self.transcript.push('\n');
                Err(CafeError::InputClosed)
            }
        }
    }
}

impl Console for ScriptedConsole {
    fn say(&mut self, text: &str) -> Result<()> {
        self.transcript.push_str(text);
        self.transcript.push('\n');
        Ok(())
    }

    fn complain(&mut self, text: &str) -> Result<()> {
        self.errors.push_str(text);
        self.errors.push('\n');
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> Result<String> {
        let input = self.next_input(label)?;
        self.transcript.push_str(&input);
        self.transcript.push('\n');
        Ok(input)
    }

    fn prompt_secret(&mut self, label: &str) -> Result<String> {
        let input = self.next_input(label)?;
        self.transcript.push('\n');
        Ok(input)
    }
}
