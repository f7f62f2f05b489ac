//! Module `scanner` implements a one-pass, streaming UTF-8 lexer for the Fen
//! language.
//!
//! It transforms a source string into a `Vec<Token>`, skipping whitespace and
//! comments, and emitting exactly one `EOF` token at the end.  The scanner
//! never fails fatally: unexpected characters and unterminated strings or
//! block comments are reported through the shared [`Reporter`] and skipped,
//! so one bad byte still yields diagnostics for the rest of the file.
//!
//! # Core Phases
//!
//! 1. **Initialization** — `start`, `curr`, and `line` counters are set;
//!    `pending` holds the next token kind.
//! 2. **Primitive Helpers** — `advance()`, `peek()`, `peek_next()`, and
//!    `match_byte()` provide fast, inlined access to the byte stream.
//! 3. **Lexing Loop** (`scan_tokens`) — reset `start` and `pending`, call
//!    `scan_token()`, and materialize a [`Token`] whenever a lexeme was
//!    recognized.
//! 4. **Token Recognition** (`scan_token`) — punctuators, two-character
//!    operators, `//` line comments (skipped in bulk via `memchr`), `/* */`
//!    block comments (nestable, counter-based), string literals (multi-line
//!    allowed), numeric literals, and identifiers resolved against a
//!    perfect-hash `KEYWORDS` map.
//!
//! Line numbers advance on every newline — including newlines inside strings
//! and block comments — so downstream diagnostics always name the line of the
//! offending token.

use crate::diagnostics::Reporter;
use crate::error::FenError;
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile-time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "break"  => TokenType::BREAK,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "fun"    => TokenType::FUN,
    "for"    => TokenType::FOR,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "print"  => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

/// A single-pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.
pub struct Scanner<'a> {
    src: &'a str,               // entire source (possibly memory-mapped)
    bytes: &'a [u8],            // byte view of `src`
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1-based line counter (\n increments)
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    /// Scan the whole input.  The returned sequence is always terminated by a
    /// single `EOF` token; lexical errors go to `reporter` and scanning
    /// continues.
    pub fn scan_tokens(mut self, reporter: &mut Reporter) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();

        while !self.is_at_end() {
            self.start = self.curr;
            self.pending = None;

            self.scan_token(reporter);

            if let Some(tt) = self.pending.take() {
                let lexeme: &str = &self.src[self.start..self.curr];
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                tokens.push(Token::new(tt, lexeme, self.line));
            }
            // Otherwise it was whitespace / comment / error → continue loop.
        }

        tokens.push(Token::new(TokenType::EOF, "", self.line));

        info!("Scanned {} token(s)", tokens.len());

        tokens
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    /// Return the length of the input in bytes.
    #[inline(always)]
    const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Are we at (or past) the end of input?
    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  Callers always guard with
    /// [`Scanner::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` if past
    /// EOF to avoid branching at call-site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes[self.curr]
        }
    }

    /// Peek one byte beyond [`Scanner::peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.bytes[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    /// Returns `true` on success so callers can branch inline without an else.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`.  If the lexeme produces
    /// an actual token the kind is stored in `self.pending`.  Whitespace and
    /// comments are skipped by returning with `pending = None`.
    fn scan_token(&mut self, reporter: &mut Reporter) {
        let b = self.advance();

        match b {
            // ── single-character punctuators ──────────────────────────────
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b'{' => self.pending = Some(TokenType::LEFT_BRACE),
            b'}' => self.pending = Some(TokenType::RIGHT_BRACE),
            b',' => self.pending = Some(TokenType::COMMA),
            b'.' => self.pending = Some(TokenType::DOT),
            b'-' => self.pending = Some(TokenType::MINUS),
            b'+' => self.pending = Some(TokenType::PLUS),
            b';' => self.pending = Some(TokenType::SEMICOLON),
            b'*' => self.pending = Some(TokenType::STAR),
            b'?' => self.pending = Some(TokenType::QUESTION),
            b':' => self.pending = Some(TokenType::COLON),

            // ── two-character operators (!=, ==, <=, >=) ─────────────────
            b'!' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };

                self.pending = Some(tt);
            }

            b'=' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };

                self.pending = Some(tt);
            }

            b'<' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };

                self.pending = Some(tt);
            }

            b'>' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };

                self.pending = Some(tt);
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => {}

            b'\n' => {
                self.line += 1; // track for diagnostics
            }

            // ── comments (// … or /* … */) and division ──────────────────
            b'/' => {
                if self.match_byte(b'/') {
                    // Fast-forward to next newline using `memchr`.  The
                    // newline itself is left for the main loop so the line
                    // counter stays in one place.
                    if let Some(pos) = memchr(b'\n', &self.bytes[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }
                } else if self.match_byte(b'*') {
                    self.block_comment(reporter);
                } else {
                    self.pending = Some(TokenType::SLASH);
                }
            }

            // ── string literal " … " ─────────────────────────────────────
            b'"' => {
                self.lex_string(reporter);
            }

            // ── number literal (digit-leading) ───────────────────────────
            b'0'..=b'9' => {
                self.lex_number();
            }

            // ── identifiers / keywords (alpha or underscore-leading) ─────
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.lex_identifier();
            }

            // ── unexpected character ─────────────────────────────────────
            _ => {
                reporter.emit(&FenError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        }
    }

    /// Skip a `/* … */` block comment.  Comments nest to arbitrary depth; the
    /// opening `/*` has already been consumed.
    fn block_comment(&mut self, reporter: &mut Reporter) {
        let mut depth: usize = 1;

        while depth > 0 && !self.is_at_end() {
            if self.peek() == b'/' && self.peek_next() == b'*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if depth > 0 {
            reporter.emit(&FenError::lex(self.line, "Unterminated block comment."));
        }
    }

    /// Lex a double-quoted string literal.
    ///
    /// * `self.start` still points at the opening `"`.
    /// * When we return, `self.curr` points **past** the closing `"`.
    fn lex_string(&mut self, reporter: &mut Reporter) {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1; // multi-line strings are allowed
            }
        }

        if self.is_at_end() {
            reporter.emit(&FenError::lex(self.line, "Unterminated string."));
            return;
        }

        self.advance(); // consume closing quote

        // Slice excluding the surrounding quotes.
        let value: &str = &self.src[self.start + 1..self.curr - 1];

        self.pending = Some(TokenType::STRING(value.to_owned()));
    }

    /// Lex a numeric literal (`123`, `3.14`).  Fractions are optional.
    fn lex_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Optional fractional part.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let s: &str = &self.src[self.start..self.curr];
        let n: f64 = s.parse::<f64>().unwrap_or(0.0); // parse never fails (checked digits)
        self.pending = Some(TokenType::NUMBER(n));
    }

    /// Lex an identifier and decide if it is a **keyword** or a generic
    /// `IDENTIFIER` token.
    fn lex_identifier(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let s: &str = &self.src[self.start..self.curr];

        let tt: TokenType = KEYWORDS.get(s).cloned().unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}
