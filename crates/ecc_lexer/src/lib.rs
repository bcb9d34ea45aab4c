//! ecc lexer — C99 tokenizer.
//!
//! Performs translation phases 1–3 for the supported language subset:
//! line continuations (`\` followed by a newline) are spliced, `//` and
//! `/* */` comments become a single space, and the result is tokenized
//! into identifiers, keywords, constants, string literals, and
//! punctuators. All spans index the preprocessed text.
//!
//! Keywords are reserved words and never lex as identifiers, so constructs
//! the rest of the compiler rejects (`switch`, `sizeof`, ...) still parse
//! into recognizable shapes.

mod lexer;
mod token;


pub use lexer::{char_constant_value, preprocess, Lexer, LexError, LexResult};
pub use token::{Span, Token, TokenKind};
