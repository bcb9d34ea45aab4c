//! Token definitions.

/// Byte range in the preprocessed source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier that is not a keyword.
    Identifier,
    /// One of the C99 keywords.
    Keyword,
    /// Integer constant: decimal, octal, or hexadecimal, with any valid
    /// suffix combination (6.4.4.1).
    IntConstant,
    /// Floating constant, decimal or hexadecimal (6.4.4.2).
    FloatConstant,
    /// Character constant; has type `int` (6.4.4.4).
    CharConstant,
    StringLiteral,
    Punctuator,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The token's spelling, exactly as written.
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }
}

/// The C99 keyword set (6.4.1). All of these are reserved even when the
/// construct they introduce is rejected later in the pipeline.
pub const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex", "_Imaginary",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}
