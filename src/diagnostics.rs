//! The shared diagnostic sink.
//!
//! Every stage of the pipeline reports its failures here instead of aborting:
//! the scanner keeps scanning past a bad character, the parser synchronizes
//! and keeps parsing, the resolver keeps resolving.  The embedding CLI reads
//! [`Reporter::had_error`] / [`Reporter::had_runtime_error`] afterwards to
//! decide whether to continue the pipeline and which exit code to use — the
//! core never terminates the process itself.

use log::{info, warn};

use crate::error::FenError;
use crate::token::{Token, TokenType};

/// Collects diagnostics and tracks whether any static or runtime error has
/// been seen.  Messages go to stderr in the classic `[line N] Error ...`
/// shape.
#[derive(Debug, Default)]
pub struct Reporter {
    /// Set by any lexical, syntactic, or resolution error.
    pub had_error: bool,

    /// Set by the first runtime error.
    pub had_runtime_error: bool,

    /// The rendered message of the most recent runtime error.
    pub last_runtime_error: Option<String>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a static error with no token context (scanner errors).
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report a static error anchored at a token.
    pub fn token_error(&mut self, token: &Token, message: &str) {
        if token.token_type == TokenType::EOF {
            self.report(token.line, " at end", message);
        } else {
            let location: String = format!(" at '{}'", token.lexeme);
            self.report(token.line, &location, message);
        }
    }

    /// Report an already-constructed static error ([`FenError::Lex`],
    /// [`FenError::Parse`], [`FenError::Resolve`]).
    pub fn emit(&mut self, err: &FenError) {
        info!("Reporting static error: {}", err);

        eprintln!("{}", err);
        self.had_error = true;
    }

    /// Report a runtime error.  Unlike static errors this flips the runtime
    /// flag, which the CLI maps to a different exit code.
    pub fn runtime_error(&mut self, err: &FenError) {
        info!("Reporting runtime error: {}", err);

        eprintln!("{}", err);
        self.last_runtime_error = Some(err.to_string());
        self.had_runtime_error = true;
    }

    /// Emit a non-fatal diagnostic (e.g. an unused local).  Does not set any
    /// error flag.
    pub fn warning(&mut self, line: usize, message: &str) {
        warn!("[line {}] Warning: {}", line, message);

        eprintln!("[line {}] Warning: {}", line, message);
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        eprintln!("[line {}] Error{}: {}", line, location, message);
        self.had_error = true;
    }

    /// Clear the static-error flag.  The REPL calls this between lines so one
    /// typo does not poison the whole session.
    pub fn reset(&mut self) {
        self.had_error = false;
    }
}
