//! Core lexer implementation.
//!
//! Scans preprocessed C99 source byte by byte. Constant spellings are kept
//! verbatim in the token text; numeric evaluation happens during semantic
//! analysis, but the lexical validity of suffixes and digit sets is
//! checked here.

use crate::token::*;

/// A lexical error.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}] {}", self.span.start, self.span.end, self.message)
    }
}

/// Result of tokenizing a source text.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Translation phases 1–3: splice line continuations, then replace each
/// comment with a single space. String and character literals are opaque
/// to comment stripping.
pub fn preprocess(source: &str) -> String {
    // Phase 2: a backslash immediately followed by a newline joins the
    // physical lines with no intervening byte.
    let mut spliced = Vec::with_capacity(source.len());
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
            i += 2;
        } else if bytes[i] == b'\\' && i + 2 < bytes.len() && &bytes[i + 1..i + 3] == b"\r\n" {
            i += 3;
        } else {
            spliced.push(bytes[i]);
            i += 1;
        }
    }

    // Phase 3: comments become one space each.
    let mut out = Vec::with_capacity(spliced.len());
    let bytes = &spliced;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                out.push(bytes[i]);
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        out.push(bytes[i]);
                        i += 1;
                    }
                    out.push(bytes[i]);
                    i += 1;
                }
                if i < bytes.len() {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                out.push(b' ');
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                out.push(b' ');
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Punctuators, longest first for maximal munch (6.4.6). Digraphs and the
/// preprocessor-only punctuators are not part of the supported subset.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "[", "]", "(", ")", "{", "}", ".", "&", "*", "+",
    "-", "~", "!", "/", "%", "<", ">", "^", "|", "?", ":", ";", "=", ",",
];

/// The C99 lexer. Construct with already-preprocessed text (see
/// [`preprocess`]).
pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source, returning tokens and errors.
    pub fn tokenize(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                tokens.push(Token::new(
                    TokenKind::Eof,
                    "",
                    Span::new(self.pos as u32, self.pos as u32),
                ));
                break;
            }
            if let Some(token) = self.lex_token() {
                tokens.push(token);
            }
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // === Character navigation ===

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.pos]
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        if self.pos + offset >= self.source.len() {
            0
        } else {
            self.source[self.pos + offset]
        }
    }

    fn advance(&mut self) -> u8 {
        let ch = self.source[self.pos];
        self.pos += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn text(&self, start: usize) -> &str {
        std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("")
    }

    fn error(&mut self, message: impl Into<String>, start: usize) {
        self.errors.push(LexError::new(
            message,
            Span::new(start as u32, self.pos as u32),
        ));
    }

    // === Token scanning ===

    fn lex_token(&mut self) -> Option<Token> {
        let start = self.pos;
        let c = self.peek();

        if c.is_ascii_alphabetic() || c == b'_' {
            return Some(self.lex_identifier());
        }
        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_ascii_digit()) {
            return self.lex_number();
        }
        if c == b'\'' {
            return self.lex_char_constant();
        }
        if c == b'"' {
            return self.lex_string_literal();
        }

        for punct in PUNCTUATORS {
            if self.source[self.pos..].starts_with(punct.as_bytes()) {
                self.pos += punct.len();
                return Some(Token::new(
                    TokenKind::Punctuator,
                    *punct,
                    Span::new(start as u32, self.pos as u32),
                ));
            }
        }

        self.advance();
        self.error(format!("unexpected character `{}`", c as char), start);
        None
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = self.text(start).to_string();
        let kind = if is_keyword(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, Span::new(start as u32, self.pos as u32))
    }

    fn lex_number(&mut self) -> Option<Token> {
        let start = self.pos;

        if self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X') {
            return self.lex_hex_number(start);
        }

        // Decimal or octal. Scan digits, then decide integer vs floating.
        let mut is_float = false;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek(), b'e' | b'E') {
            is_float = true;
            self.advance();
            if matches!(self.peek(), b'+' | b'-') {
                self.advance();
            }
            if !self.peek().is_ascii_digit() {
                self.error("exponent has no digits", start);
                return None;
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let digits_end = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let suffix = std::str::from_utf8(&self.source[digits_end..self.pos])
            .unwrap_or("")
            .to_string();

        if is_float {
            if !valid_float_suffix(&suffix) {
                self.error(format!("invalid floating constant suffix `{}`", suffix), start);
                return None;
            }
            let span = Span::new(start as u32, self.pos as u32);
            let text = self.text(start).to_string();
            return Some(Token::new(TokenKind::FloatConstant, text, span));
        }

        let digits = &self.source[start..digits_end];
        if digits.first() == Some(&b'0') && digits.iter().any(|&d| d == b'8' || d == b'9') {
            self.error("invalid digit in octal constant", start);
            return None;
        }
        if !valid_int_suffix(&suffix) {
            self.error(format!("invalid integer constant suffix `{}`", suffix), start);
            return None;
        }
        let span = Span::new(start as u32, self.pos as u32);
        let text = self.text(start).to_string();
        Some(Token::new(TokenKind::IntConstant, text, span))
    }

    fn lex_hex_number(&mut self, start: usize) -> Option<Token> {
        self.advance(); // 0
        self.advance(); // x
        let mut saw_digits = false;
        let mut is_float = false;

        while self.peek().is_ascii_hexdigit() {
            saw_digits = true;
            self.advance();
        }
        if self.peek() == b'.' {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                saw_digits = true;
                self.advance();
            }
        }
        if !saw_digits {
            self.error("hexadecimal constant has no digits", start);
            return None;
        }
        if matches!(self.peek(), b'p' | b'P') {
            is_float = true;
            self.advance();
            if matches!(self.peek(), b'+' | b'-') {
                self.advance();
            }
            if !self.peek().is_ascii_digit() {
                self.error("hexadecimal exponent has no digits", start);
                return None;
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        } else if is_float {
            // 6.4.4.2: a hexadecimal floating constant requires an exponent.
            self.error("hexadecimal floating constant requires an exponent", start);
            return None;
        }

        let digits_end = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let suffix = std::str::from_utf8(&self.source[digits_end..self.pos])
            .unwrap_or("")
            .to_string();

        let (kind, ok) = if is_float {
            (TokenKind::FloatConstant, valid_float_suffix(&suffix))
        } else {
            (TokenKind::IntConstant, valid_int_suffix(&suffix))
        };
        if !ok {
            self.error(format!("invalid constant suffix `{}`", suffix), start);
            return None;
        }
        let span = Span::new(start as u32, self.pos as u32);
        let text = self.text(start).to_string();
        Some(Token::new(kind, text, span))
    }

    fn lex_char_constant(&mut self) -> Option<Token> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut closed = false;
        while !self.is_at_end() {
            match self.peek() {
                b'\'' => {
                    self.advance();
                    closed = true;
                    break;
                }
                b'\n' => break,
                b'\\' => {
                    self.advance();
                    if !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        if !closed {
            self.error("unterminated character constant", start);
            return None;
        }
        let text = self.text(start).to_string();
        if text.len() == 2 {
            self.error("empty character constant", start);
            return None;
        }
        Some(Token::new(
            TokenKind::CharConstant,
            text,
            Span::new(start as u32, self.pos as u32),
        ))
    }

    fn lex_string_literal(&mut self) -> Option<Token> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut closed = false;
        while !self.is_at_end() {
            match self.peek() {
                b'"' => {
                    self.advance();
                    closed = true;
                    break;
                }
                b'\n' => break,
                b'\\' => {
                    self.advance();
                    if !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        if !closed {
            self.error("unterminated string literal", start);
            return None;
        }
        let text = self.text(start).to_string();
        Some(Token::new(
            TokenKind::StringLiteral,
            text,
            Span::new(start as u32, self.pos as u32),
        ))
    }
}

/// Integer suffixes (6.4.4.1): any order of one `u`/`U` and one `l`/`L`
/// or `ll`/`LL`; a long-long suffix may not mix case.
fn valid_int_suffix(suffix: &str) -> bool {
    if suffix.contains("lL") || suffix.contains("Ll") {
        return false;
    }
    matches!(
        suffix.to_ascii_lowercase().as_str(),
        "" | "u" | "l" | "ll" | "ul" | "ull" | "lu" | "llu"
    )
}

/// Floating suffixes (6.4.4.2).
fn valid_float_suffix(suffix: &str) -> bool {
    matches!(suffix, "" | "f" | "F" | "l" | "L")
}

/// Evaluate a character constant's spelling to its `int` value (6.4.4.4).
pub fn char_constant_value(text: &str) -> Result<i64, String> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| "malformed character constant".to_string())?;
    let bytes = inner.as_bytes();
    if bytes.is_empty() {
        return Err("empty character constant".to_string());
    }
    if bytes[0] != b'\\' {
        if bytes.len() != 1 {
            return Err("multi-character constant".to_string());
        }
        return Ok(bytes[0] as i64);
    }
    let rest = &inner[1..];
    let value = match rest.as_bytes().first() {
        Some(b'n') => b'\n' as i64,
        Some(b't') => b'\t' as i64,
        Some(b'r') => b'\r' as i64,
        Some(b'a') => 0x07,
        Some(b'b') => 0x08,
        Some(b'f') => 0x0c,
        Some(b'v') => 0x0b,
        Some(b'0'..=b'7') => i64::from_str_radix(rest, 8)
            .map_err(|_| format!("invalid octal escape `\\{}`", rest))?,
        Some(b'x') => i64::from_str_radix(&rest[1..], 16)
            .map_err(|_| format!("invalid hex escape `\\{}`", rest))?,
        Some(b'\\') => b'\\' as i64,
        Some(b'\'') => b'\'' as i64,
        Some(b'"') => b'"' as i64,
        Some(b'?') => b'?' as i64,
        _ => return Err(format!("unknown escape `\\{}`", rest)),
    };
    // Single-letter escapes must not trail extra characters.
    if !matches!(rest.as_bytes().first(), Some(b'0'..=b'7') | Some(b'x')) && rest.len() != 1 {
        return Err("multi-character constant".to_string());
    }
    Ok(value)
}
