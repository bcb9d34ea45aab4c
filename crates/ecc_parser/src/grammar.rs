//! Grammar rule-table loader.
//!
//! Accepts the textual format of the C99 standard's Annex A so the grammar
//! can be copied from the appendix:
//!
//! ```text
//! # comment
//! (6.8.4) selection-statement:
//!     if ( expression ) statement
//!     if ( expression ) statement else statement
//!
//! (6.5.3) unary-operator: one of
//!     & * + - ~ !
//! ```
//!
//! A non-terminal header is `name:`, optionally prefixed by a `(section)`
//! tag; its alternatives are listed indented beneath it, one per line. A
//! symbol followed by `opt` is optional. `one of` headers list one
//! single-symbol alternative per whitespace-separated item; `none of`
//! headers introduce a character-class production matching any
//! single-character token not listed. Symbols that have a rule of their own
//! are non-terminals; `identifier`, `constant`, and `string-literal` match
//! the corresponding lexical classes; everything else is a literal.

use std::collections::HashMap;

use ecc_lexer::{Token, TokenKind};

/// Index of a non-terminal in the grammar.
pub type NtId = u32;

/// Lexical terminal classes produced by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexClass {
    Identifier,
    Constant,
    StringLiteral,
}

/// One grammar symbol on the right-hand side of a production.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Nt(NtId),
    /// Matches a token spelled exactly like this.
    Literal(String),
    Class(LexClass),
    /// Matches any single-character token not in the set.
    NoneOf(Vec<String>),
}

impl Symbol {
    /// Terminal match against one token.
    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Symbol::Nt(_) => false,
            Symbol::Literal(text) => token.kind != TokenKind::Eof && token.text == *text,
            Symbol::Class(LexClass::Identifier) => token.kind == TokenKind::Identifier,
            Symbol::Class(LexClass::Constant) => matches!(
                token.kind,
                TokenKind::IntConstant | TokenKind::FloatConstant | TokenKind::CharConstant
            ),
            Symbol::Class(LexClass::StringLiteral) => token.kind == TokenKind::StringLiteral,
            Symbol::NoneOf(set) => {
                token.kind != TokenKind::Eof
                    && token.text.chars().count() == 1
                    && !set.contains(&token.text)
            }
        }
    }
}

/// One alternative of a production, after `opt` expansion.
#[derive(Debug, Clone)]
pub struct Alternative {
    /// Index of the alternative as written in the rule table. Expansions
    /// of the same written line share it; the all-symbols-present
    /// expansion comes first.
    pub source_index: u32,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct NonTerminal {
    pub name: String,
    pub alts: Vec<Alternative>,
}

/// A compiled grammar: numbered non-terminals with expanded alternatives.
#[derive(Debug)]
pub struct Grammar {
    pub nonterminals: Vec<NonTerminal>,
    names: HashMap<String, NtId>,
    /// Non-terminals that can derive the empty string.
    nullable: Vec<bool>,
}

/// Error in the rule table itself.
#[derive(Debug, Clone)]
pub struct GrammarError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grammar line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RuleMode {
    Plain,
    OneOf,
    NoneOf,
}

struct RawRule {
    name: String,
    mode: RuleMode,
    /// Each entry is one alternative line, as (symbol, optional) pairs.
    lines: Vec<Vec<(String, bool)>>,
    header_line: usize,
}

impl Grammar {
    /// Load a rule table from text.
    pub fn load(text: &str) -> Result<Grammar, GrammarError> {
        let raw = parse_raw_rules(text)?;
        compile(raw)
    }

    pub fn lookup(&self, name: &str) -> Option<NtId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, id: NtId) -> &str {
        &self.nonterminals[id as usize].name
    }

    pub fn is_nullable(&self, id: NtId) -> bool {
        self.nullable[id as usize]
    }
}

fn parse_raw_rules(text: &str) -> Result<Vec<RawRule>, GrammarError> {
    let mut rules: Vec<RawRule> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            // Header: `(section) name:` or `name:`, optionally followed by
            // `one of` / `none of`.
            let mut rest = trimmed;
            if rest.starts_with('(') {
                match rest.find(')') {
                    Some(close) => rest = rest[close + 1..].trim_start(),
                    None => {
                        return Err(GrammarError {
                            message: "unclosed section tag".into(),
                            line: lineno,
                        })
                    }
                }
            }
            let colon = rest.find(':').ok_or(GrammarError {
                message: format!("expected `name:` header, got `{}`", trimmed),
                line: lineno,
            })?;
            let name = rest[..colon].trim().to_string();
            if name.is_empty() {
                return Err(GrammarError {
                    message: "empty rule name".into(),
                    line: lineno,
                });
            }
            let mode = match rest[colon + 1..].trim() {
                "" => RuleMode::Plain,
                "one of" => RuleMode::OneOf,
                "none of" => RuleMode::NoneOf,
                other => {
                    return Err(GrammarError {
                        message: format!("unexpected text after rule header: `{}`", other),
                        line: lineno,
                    })
                }
            };
            rules.push(RawRule {
                name,
                mode,
                lines: Vec::new(),
                header_line: lineno,
            });
        } else {
            let rule = rules.last_mut().ok_or(GrammarError {
                message: "alternative before any rule header".into(),
                line: lineno,
            })?;
            let mut symbols: Vec<(String, bool)> = Vec::new();
            for word in trimmed.split_whitespace() {
                if word == "opt" {
                    match symbols.last_mut() {
                        Some(last) => last.1 = true,
                        None => {
                            return Err(GrammarError {
                                message: "`opt` with no preceding symbol".into(),
                                line: lineno,
                            })
                        }
                    }
                } else {
                    symbols.push((word.to_string(), false));
                }
            }
            rule.lines.push(symbols);
        }
    }

    for rule in &rules {
        if rule.lines.is_empty() {
            return Err(GrammarError {
                message: format!("rule `{}` has no alternatives", rule.name),
                line: rule.header_line,
            });
        }
    }
    Ok(rules)
}

fn compile(raw: Vec<RawRule>) -> Result<Grammar, GrammarError> {
    let mut names: HashMap<String, NtId> = HashMap::new();
    for rule in &raw {
        if names
            .insert(rule.name.clone(), names.len() as NtId)
            .is_some()
        {
            return Err(GrammarError {
                message: format!("rule `{}` defined twice", rule.name),
                line: rule.header_line,
            });
        }
    }

    let resolve = |word: &str| -> Symbol {
        if let Some(&id) = names.get(word) {
            return Symbol::Nt(id);
        }
        match word {
            "identifier" => Symbol::Class(LexClass::Identifier),
            "constant" => Symbol::Class(LexClass::Constant),
            "string-literal" => Symbol::Class(LexClass::StringLiteral),
            _ => Symbol::Literal(word.to_string()),
        }
    };

    let mut nonterminals = Vec::with_capacity(raw.len());
    for rule in &raw {
        let mut alts: Vec<Alternative> = Vec::new();
        match rule.mode {
            RuleMode::Plain => {
                for (source_index, line) in rule.lines.iter().enumerate() {
                    expand_opts(source_index as u32, line, &resolve, &mut alts);
                }
            }
            RuleMode::OneOf => {
                let mut source_index = 0;
                for line in &rule.lines {
                    for (word, _) in line {
                        alts.push(Alternative {
                            source_index,
                            symbols: vec![resolve(word)],
                        });
                        source_index += 1;
                    }
                }
            }
            RuleMode::NoneOf => {
                let set = rule
                    .lines
                    .iter()
                    .flatten()
                    .map(|(word, _)| word.clone())
                    .collect();
                alts.push(Alternative {
                    source_index: 0,
                    symbols: vec![Symbol::NoneOf(set)],
                });
            }
        }
        nonterminals.push(NonTerminal {
            name: rule.name.clone(),
            alts,
        });
    }

    let nullable = compute_nullable(&nonterminals);
    Ok(Grammar {
        nonterminals,
        names,
        nullable,
    })
}

/// Expand `opt` markers into plain alternatives: all-present first, then
/// progressively dropping optional symbols.
fn expand_opts(
    source_index: u32,
    line: &[(String, bool)],
    resolve: &dyn Fn(&str) -> Symbol,
    alts: &mut Vec<Alternative>,
) {
    let opt_positions: Vec<usize> = line
        .iter()
        .enumerate()
        .filter(|(_, (_, opt))| *opt)
        .map(|(i, _)| i)
        .collect();

    let combos = 1usize << opt_positions.len();
    for dropped in 0..combos {
        let mut symbols = Vec::new();
        for (i, (word, _)) in line.iter().enumerate() {
            let opt_slot = opt_positions.iter().position(|&p| p == i);
            if let Some(slot) = opt_slot {
                if dropped & (1 << slot) != 0 {
                    continue;
                }
            }
            symbols.push(resolve(word));
        }
        alts.push(Alternative {
            source_index,
            symbols,
        });
    }
}

fn compute_nullable(nonterminals: &[NonTerminal]) -> Vec<bool> {
    let mut nullable = vec![false; nonterminals.len()];
    loop {
        let mut changed = false;
        for (id, nt) in nonterminals.iter().enumerate() {
            if nullable[id] {
                continue;
            }
            let derives_empty = nt.alts.iter().any(|alt| {
                alt.symbols.iter().all(|sym| match sym {
                    Symbol::Nt(b) => nullable[*b as usize],
                    _ => false,
                })
            });
            if derives_empty {
                nullable[id] = true;
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}
