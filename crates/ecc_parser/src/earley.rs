//! Earley recognizer.
//!
//! Standard Earley with predict/scan/complete over a token stream.
//! Ambiguous grammars are accepted; the recognizer only records which
//! non-terminals derive which token ranges (the completion chart), and
//! derivation extraction picks one tree from the chart afterwards.

use std::collections::{HashMap, HashSet};

use ecc_lexer::Token;

use crate::grammar::{Grammar, NtId, Symbol};

/// Chart of completed derivations: which non-terminal spans which token
/// range.
#[derive(Debug)]
pub struct Chart {
    /// (nt, start) → sorted, deduplicated list of end positions.
    ends: HashMap<(NtId, usize), Vec<usize>>,
    /// Number of tokens recognized over.
    pub token_count: usize,
}

impl Chart {
    /// All `end` positions such that `nt` derives `tokens[start..end]`.
    pub fn ends(&self, nt: NtId, start: usize) -> &[usize] {
        self.ends
            .get(&(nt, start))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn derives(&self, nt: NtId, start: usize, end: usize) -> bool {
        self.ends(nt, start).contains(&end)
    }
}

/// An Earley item: alternative `alt` of `nt`, with `dot` symbols matched,
/// started at token `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    nt: NtId,
    alt: u32,
    dot: u32,
    origin: u32,
}

/// Recognize `tokens` (no EOF entry) as one `start`. On failure returns
/// the index of the furthest token the recognizer got past, for error
/// reporting.
pub fn recognize(grammar: &Grammar, start: NtId, tokens: &[Token]) -> Result<Chart, usize> {
    let n = tokens.len();
    let mut sets: Vec<Vec<Item>> = vec![Vec::new(); n + 1];
    let mut seen: Vec<HashSet<Item>> = vec![HashSet::new(); n + 1];
    let mut ends: HashMap<(NtId, usize), Vec<usize>> = HashMap::new();

    let mut add = |sets: &mut Vec<Vec<Item>>, seen: &mut Vec<HashSet<Item>>, at: usize, item: Item| {
        if seen[at].insert(item) {
            sets[at].push(item);
        }
    };

    for (alt, _) in grammar.nonterminals[start as usize].alts.iter().enumerate() {
        add(
            &mut sets,
            &mut seen,
            0,
            Item {
                nt: start,
                alt: alt as u32,
                dot: 0,
                origin: 0,
            },
        );
    }

    for i in 0..=n {
        let mut idx = 0;
        while idx < sets[i].len() {
            let item = sets[i][idx];
            idx += 1;

            let symbols = &grammar.nonterminals[item.nt as usize].alts[item.alt as usize].symbols;
            if (item.dot as usize) < symbols.len() {
                match &symbols[item.dot as usize] {
                    Symbol::Nt(b) => {
                        let b = *b;
                        for (alt, _) in grammar.nonterminals[b as usize].alts.iter().enumerate() {
                            add(
                                &mut sets,
                                &mut seen,
                                i,
                                Item {
                                    nt: b,
                                    alt: alt as u32,
                                    dot: 0,
                                    origin: i as u32,
                                },
                            );
                        }
                        // Aycock–Horspool: a nullable non-terminal may be
                        // skipped over directly at prediction time.
                        if grammar.is_nullable(b) {
                            add(
                                &mut sets,
                                &mut seen,
                                i,
                                Item {
                                    dot: item.dot + 1,
                                    ..item
                                },
                            );
                        }
                    }
                    terminal => {
                        if i < n && terminal.matches(&tokens[i]) {
                            add(
                                &mut sets,
                                &mut seen,
                                i + 1,
                                Item {
                                    dot: item.dot + 1,
                                    ..item
                                },
                            );
                        }
                    }
                }
            } else {
                // Completion.
                let origin = item.origin as usize;
                let entry = ends.entry((item.nt, origin)).or_default();
                if !entry.contains(&i) {
                    entry.push(i);
                }
                let mut j = 0;
                while j < sets[origin].len() {
                    let waiting = sets[origin][j];
                    j += 1;
                    let wsyms =
                        &grammar.nonterminals[waiting.nt as usize].alts[waiting.alt as usize].symbols;
                    if (waiting.dot as usize) < wsyms.len()
                        && wsyms[waiting.dot as usize] == Symbol::Nt(item.nt)
                    {
                        add(
                            &mut sets,
                            &mut seen,
                            i,
                            Item {
                                dot: waiting.dot + 1,
                                ..waiting
                            },
                        );
                    }
                }
            }
        }
    }

    for entry in ends.values_mut() {
        entry.sort_unstable();
    }

    let chart = Chart {
        ends,
        token_count: n,
    };
    if chart.derives(start, 0, n) {
        Ok(chart)
    } else {
        let furthest = sets
            .iter()
            .enumerate()
            .rev()
            .find(|(_, set)| !set.is_empty())
            .map(|(i, _)| i)
            .unwrap_or(0);
        Err(furthest)
    }
}
