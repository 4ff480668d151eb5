//! Confirmation before destructive batches
//!
//! The gate only reports an outcome. Deciding whether a declined or failed
//! confirmation ends the process is left to the caller.

use std::io::{self, BufRead, Write};

/// Outcome of a confirmation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
    /// The answer could not be obtained or understood
    Failed(String),
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Blocking yes/no gate
pub trait ConfirmationGate {
    fn confirm(&mut self, message: &str) -> Confirmation;
}

/// Gate that approves without asking (`--yes`)
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&mut self, message: &str) -> Confirmation {
        tracing::info!("{} [auto-confirmed]", message);
        Confirmation::Confirmed
    }
}

/// Prompt on a line-oriented reader/writer pair
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr, read answers from stdin
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ConfirmationGate for TerminalPrompt<R, W> {
    fn confirm(&mut self, message: &str) -> Confirmation {
        if let Err(e) = write!(self.output, "{} [Y/n] ", message).and_then(|_| self.output.flush())
        {
            return Confirmation::Failed(format!("cannot write prompt: {}", e));
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Confirmation::Failed("input closed before an answer was given".to_string()),
            Ok(_) => match parse_answer(&line) {
                Some(true) => Confirmation::Confirmed,
                Some(false) => Confirmation::Declined,
                None => Confirmation::Failed(format!("unrecognized answer `{}`", line.trim())),
            },
            Err(e) => Confirmation::Failed(format!("cannot read answer: {}", e)),
        }
    }
}

/// `Some(true)` for yes or blank, `Some(false)` for no, `None` otherwise
pub fn parse_answer(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" | "yep" | "ok" => Some(true),
        "n" | "no" | "nope" => Some(false),
        _ => None,
    }
}
