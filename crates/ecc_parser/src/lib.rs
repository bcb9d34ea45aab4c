//! ecc parser — grammar-table driven Earley parsing for C99.
//!
//! The C99 phrase-structure grammar ships as a rule table in the format of
//! the standard's Annex A (see `c99.grammar`); a generic Earley recognizer
//! runs it over the token stream and one derivation is extracted from the
//! chart. Ambiguity is legal in the grammar and resolved deterministically
//! at extraction time.
//!
//! The "lexer hack" is deliberately not performed: user-defined type names
//! are not recognized, so the `typedef-name` production of the appendix is
//! not part of the shipped table.

pub mod earley;
pub mod grammar;
pub mod tree;

#[cfg(test)]
mod tests;

use std::sync::OnceLock;

use ecc_lexer::{preprocess, Lexer, Span, TokenKind};

pub use ecc_lexer::Token;
pub use grammar::{Grammar, GrammarError};
pub use tree::{PChild, PNode, PNodeId, ParseTree};

/// The C99 phrase-structure grammar (ISO/IEC 9899:1999 Annex A.2).
pub const C99_GRAMMAR: &str = include_str!("c99.grammar");

const START_SYMBOL: &str = "translation-unit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    LexError,
    SyntaxError,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}] {}", self.span.start, self.span.end, self.message)
    }
}

/// A successful parse: the tree, the tokens it indexes, and the
/// preprocessed source its spans index.
#[derive(Debug)]
pub struct Parse {
    pub tree: ParseTree,
    pub tokens: Vec<Token>,
    pub source: String,
}

fn c99_grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Grammar::load(C99_GRAMMAR).expect("embedded C99 grammar must load")
    })
}

/// Parse a C99 translation unit.
pub fn parse(source: &str) -> Result<Parse, ParseError> {
    let preprocessed = preprocess(source);
    let lexed = Lexer::new(&preprocessed).tokenize();
    if let Some(err) = lexed.errors.first() {
        return Err(ParseError {
            kind: ParseErrorKind::LexError,
            message: err.message.clone(),
            span: err.span,
        });
    }

    let grammar = c99_grammar();
    let start = grammar
        .lookup(START_SYMBOL)
        .expect("grammar defines translation-unit");

    // Strip the EOF marker; the recognizer works over real tokens only.
    let tokens: Vec<Token> = lexed
        .tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .collect();
    if tokens.is_empty() {
        return Err(ParseError {
            kind: ParseErrorKind::SyntaxError,
            message: "empty translation unit".into(),
            span: Span::new(0, 0),
        });
    }

    match earley::recognize(grammar, start, &tokens) {
        Ok(chart) => {
            let tree = tree::extract_tree(grammar, &chart, &tokens, start)
                .expect("recognized input must yield a derivation");
            Ok(Parse {
                tree,
                tokens,
                source: preprocessed,
            })
        }
        Err(furthest) => {
            let (message, span) = if furthest >= tokens.len() {
                (
                    "unexpected end of input".to_string(),
                    tokens.last().map(|t| t.span).unwrap_or(Span::new(0, 0)),
                )
            } else {
                (
                    format!("unexpected token `{}`", tokens[furthest].text),
                    tokens[furthest].span,
                )
            };
            Err(ParseError {
                kind: ParseErrorKind::SyntaxError,
                message,
                span,
            })
        }
    }
}
