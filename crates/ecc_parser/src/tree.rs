//! Derivation extraction — one concrete parse tree from the Earley chart.
//!
//! Ambiguity is resolved deterministically: alternatives are tried in the
//! order the rule table lists them (with the all-optional-symbols-present
//! expansion first), and non-terminal spans are tried shortest first
//! (leftmost split). Listing `if ( expression ) statement` before the
//! `else` form therefore gives the standard dangling-`else` binding: the
//! `else`-less outer parse is preferred, which forces the `else` onto the
//! nearest inner `if`.

use std::collections::{HashMap, HashSet};

use ecc_lexer::{Span, Token};

use crate::earley::Chart;
use crate::grammar::{Grammar, NtId, Symbol};

/// Reference to a node in the parse tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PNodeId(pub u32);

/// A child of a parse node: either a sub-derivation or a matched token,
/// identified by its index in the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PChild {
    Node(PNodeId),
    Token(u32),
}

/// One node of the concrete parse tree: a non-terminal, the index of the
/// rule-table alternative that derived it, and its children.
#[derive(Debug, Clone)]
pub struct PNode {
    pub rule: String,
    pub alt: u32,
    pub span: Span,
    pub children: Vec<PChild>,
}

/// Arena-allocated concrete parse tree.
#[derive(Debug)]
pub struct ParseTree {
    nodes: Vec<PNode>,
    pub root: PNodeId,
}

impl ParseTree {
    pub fn node(&self, id: PNodeId) -> &PNode {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child sub-nodes of `id`, skipping tokens.
    pub fn child_nodes<'a>(&'a self, id: PNodeId) -> impl Iterator<Item = PNodeId> + 'a {
        self.node(id).children.iter().filter_map(|c| match c {
            PChild::Node(n) => Some(*n),
            PChild::Token(_) => None,
        })
    }
}

/// Build one derivation of `start` over the whole token range.
/// `recognize` must have succeeded with the same grammar and tokens.
pub fn extract_tree(
    grammar: &Grammar,
    chart: &Chart,
    tokens: &[Token],
    start: NtId,
) -> Option<ParseTree> {
    let mut builder = TreeBuilder {
        grammar,
        chart,
        tokens,
        nodes: Vec::new(),
        memo: HashMap::new(),
        seq_memo: HashMap::new(),
        in_progress: HashSet::new(),
    };
    let root = builder.build(start, 0, chart.token_count)?;
    Some(ParseTree {
        nodes: builder.nodes,
        root,
    })
}

struct TreeBuilder<'a> {
    grammar: &'a Grammar,
    chart: &'a Chart,
    tokens: &'a [Token],
    nodes: Vec<PNode>,
    memo: HashMap<(NtId, usize, usize), Option<PNodeId>>,
    seq_memo: HashMap<(NtId, u32, u32, usize, usize), Option<Vec<PChild>>>,
    /// Cycle guard. The C99 grammar has no same-span derivation cycles
    /// (unit chains are acyclic and no production is empty), so a guarded
    /// re-entry can only happen on a path that has no derivation anyway.
    in_progress: HashSet<(NtId, usize, usize)>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, nt: NtId, start: usize, end: usize) -> Option<PNodeId> {
        let key = (nt, start, end);
        if let Some(&cached) = self.memo.get(&key) {
            return cached;
        }
        if !self.chart.derives(nt, start, end) || !self.in_progress.insert(key) {
            return None;
        }

        let mut result = None;
        let alt_count = self.grammar.nonterminals[nt as usize].alts.len();
        for alt in 0..alt_count {
            if let Some(children) = self.match_seq(nt, alt as u32, 0, start, end) {
                let span = self.span_of(&children, start);
                let alt_index = self.grammar.nonterminals[nt as usize].alts[alt].source_index;
                let id = PNodeId(self.nodes.len() as u32);
                self.nodes.push(PNode {
                    rule: self.grammar.name(nt).to_string(),
                    alt: alt_index,
                    span,
                    children,
                });
                result = Some(id);
                break;
            }
        }

        self.in_progress.remove(&key);
        self.memo.insert(key, result);
        result
    }

    /// Match symbols `sym_idx..` of `nt`'s alternative `alt` against
    /// `tokens[pos..end]`.
    fn match_seq(
        &mut self,
        nt: NtId,
        alt: u32,
        sym_idx: u32,
        pos: usize,
        end: usize,
    ) -> Option<Vec<PChild>> {
        let key = (nt, alt, sym_idx, pos, end);
        if let Some(cached) = self.seq_memo.get(&key) {
            return cached.clone();
        }

        let symbols = &self.grammar.nonterminals[nt as usize].alts[alt as usize].symbols;
        let result = if (sym_idx as usize) == symbols.len() {
            (pos == end).then(Vec::new)
        } else {
            match symbols[sym_idx as usize].clone() {
                Symbol::Nt(b) => {
                    let candidate_ends: Vec<usize> = self
                        .chart
                        .ends(b, pos)
                        .iter()
                        .copied()
                        .filter(|&e| e <= end)
                        .collect();
                    let mut found = None;
                    for e in candidate_ends {
                        if let Some(node) = self.build(b, pos, e) {
                            if let Some(rest) = self.match_seq(nt, alt, sym_idx + 1, e, end) {
                                let mut children = vec![PChild::Node(node)];
                                children.extend(rest);
                                found = Some(children);
                                break;
                            }
                        }
                    }
                    found
                }
                terminal => {
                    if pos < end && terminal.matches(&self.tokens[pos]) {
                        self.match_seq(nt, alt, sym_idx + 1, pos + 1, end)
                            .map(|rest| {
                                let mut children = vec![PChild::Token(pos as u32)];
                                children.extend(rest);
                                children
                            })
                    } else {
                        None
                    }
                }
            }
        };

        self.seq_memo.insert(key, result.clone());
        result
    }

    fn span_of(&self, children: &[PChild], fallback_pos: usize) -> Span {
        let mut span: Option<Span> = None;
        for child in children {
            let child_span = match child {
                PChild::Token(t) => self.tokens[*t as usize].span,
                PChild::Node(n) => self.nodes[n.0 as usize].span,
            };
            span = Some(match span {
                None => child_span,
                Some(s) => Span::new(s.start.min(child_span.start), s.end.max(child_span.end)),
            });
        }
        span.unwrap_or_else(|| {
            let at = self
                .tokens
                .get(fallback_pos)
                .map(|t| t.span.start)
                .unwrap_or(0);
            Span::new(at, at)
        })
    }
}
