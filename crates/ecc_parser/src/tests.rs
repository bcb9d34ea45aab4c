use crate::grammar::{Grammar, LexClass, Symbol};
use crate::tree::PChild;
use crate::*;

// === Rule-table loader ===

#[test]
fn loads_plain_rules_with_sections_and_comments() {
    let g = Grammar::load(
        "# a comment\n\
         (6.8) stmt:\n\
         \tword ;\n\
         \n\
         word:\n\
         \tidentifier\n",
    )
    .unwrap();
    let stmt = g.lookup("stmt").unwrap();
    let alts = &g.nonterminals[stmt as usize].alts;
    assert_eq!(alts.len(), 1);
    assert_eq!(alts[0].symbols.len(), 2);
    assert!(matches!(alts[0].symbols[0], Symbol::Nt(_)));
    assert_eq!(alts[0].symbols[1], Symbol::Literal(";".into()));
}

#[test]
fn opt_expands_with_all_present_first() {
    let g = Grammar::load("list:\n    { item opt }\nitem:\n    identifier\n").unwrap();
    let list = g.lookup("list").unwrap();
    let alts = &g.nonterminals[list as usize].alts;
    assert_eq!(alts.len(), 2);
    assert_eq!(alts[0].symbols.len(), 3);
    assert_eq!(alts[1].symbols.len(), 2);
    assert_eq!(alts[0].source_index, alts[1].source_index);
}

#[test]
fn one_of_lists_each_item_as_an_alternative() {
    let g = Grammar::load("op: one of\n    + - *\n").unwrap();
    let op = g.lookup("op").unwrap();
    let alts = &g.nonterminals[op as usize].alts;
    assert_eq!(alts.len(), 3);
    assert!(alts
        .iter()
        .all(|a| a.symbols.len() == 1 && matches!(a.symbols[0], Symbol::Literal(_))));
}

#[test]
fn none_of_builds_a_character_class() {
    let g = Grammar::load("other: none of\n    + - *\n").unwrap();
    let other = g.lookup("other").unwrap();
    let alts = &g.nonterminals[other as usize].alts;
    assert_eq!(alts.len(), 1);
    assert!(matches!(alts[0].symbols[0], Symbol::NoneOf(_)));
}

#[test]
fn lexical_classes_resolve() {
    let g = Grammar::load("primary:\n    identifier\n    constant\n    string-literal\n").unwrap();
    let primary = g.lookup("primary").unwrap();
    let alts = &g.nonterminals[primary as usize].alts;
    assert_eq!(alts[0].symbols[0], Symbol::Class(LexClass::Identifier));
    assert_eq!(alts[1].symbols[0], Symbol::Class(LexClass::Constant));
    assert_eq!(alts[2].symbols[0], Symbol::Class(LexClass::StringLiteral));
}

#[test]
fn malformed_tables_are_rejected() {
    assert!(Grammar::load("    orphan alternative\n").is_err());
    assert!(Grammar::load("no-colon\n").is_err());
    assert!(Grammar::load("empty:\n").is_err());
    assert!(Grammar::load("a:\n    x\na:\n    y\n").is_err());
}

#[test]
fn ambiguous_grammars_are_accepted_with_one_derivation() {
    // `s → s s | x` derives "x x x" two ways; recognition must accept it
    // and extraction must pick one derivation deterministically.
    let g = Grammar::load("s:\n    s s\n    x\n").unwrap();
    let s = g.lookup("s").unwrap();
    let pre = ecc_lexer::preprocess("x x x");
    let tokens: Vec<Token> = ecc_lexer::Lexer::new(&pre)
        .tokenize()
        .tokens
        .into_iter()
        .filter(|t| t.kind != ecc_lexer::TokenKind::Eof)
        .collect();

    let chart = earley::recognize(&g, s, &tokens).expect("ambiguous input must parse");
    let first = tree::extract_tree(&g, &chart, &tokens, s).unwrap();

    let chart = earley::recognize(&g, s, &tokens).unwrap();
    let second = tree::extract_tree(&g, &chart, &tokens, s).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(
        first.node(first.root).children.len(),
        second.node(second.root).children.len()
    );
}

// === End-to-end parses ===

fn parse_ok(src: &str) -> Parse {
    match parse(src) {
        Ok(p) => p,
        Err(e) => panic!("parse of {:?} failed: {}", src, e),
    }
}

#[test]
fn parses_a_minimal_function() {
    let p = parse_ok("int f(int a) { return a; }");
    assert_eq!(p.tree.node(p.tree.root).rule, "translation-unit");
}

#[test]
fn parses_the_whole_feature_surface() {
    parse_ok(
        "float f2pow2(int a) { return 2.0f * (a * a); }\n\
         int ffib(int a) { if (a == 0) return 0; else if (a == 1) return 1; \
         else return ffib(a-1) + ffib(a-2); }\n",
    );
    parse_ok("int f(int a, int b) { int s = 0; for (int i = 0; i < a; i += 1) { s += b; } return s; }");
    parse_ok("int f(int a) { while (a > 0) { a = a - 1; } do { a++; } while (a < 10); return a; }");
    parse_ok("int f(int a) { struct { float f; int i1, i2; int arr[10]; } s; s.arr[1] = 1; return s.arr[1]; }");
    parse_ok("int f(int a, int b) { int c[a][b]; c[1][2] = b; return c[1][2]; }");
    parse_ok("void empty() { }");
    parse_ok("int f(int a) { return a ? 1 : 2; }");
    parse_ok("int fforward(unsigned int, int b);");
}

#[test]
fn parses_unsupported_constructs_for_later_rejection() {
    // These must parse; semantic analysis rejects them.
    parse_ok("int f(int a) { switch (a) { case 1: return 0; default: return 1; } }");
    parse_ok("int f(int *p) { return *p; }");
    parse_ok("int f(int a) { return sizeof a; }");
    parse_ok("int f(int a, ...);");
    parse_ok("int f(int a) { goto end; end: return a; }");
}

#[test]
fn dangling_else_binds_to_nearest_if() {
    let p = parse_ok("int f(int a, int b) { if (a == 2) if (b == 1) b = 0; else b = 1; return b; }");

    // Find the outermost selection-statement and check its shape: the
    // `else` must belong to the inner `if`, so the outer node has the
    // else-less alternative (no `else` token among its children).
    let mut outer = None;
    for id in 0..p.tree.len() {
        let node = p.tree.node(tree::PNodeId(id as u32));
        if node.rule == "selection-statement" {
            outer = Some(id);
        }
    }
    // Nodes are created bottom-up, so the last selection-statement is the
    // outer one.
    let outer = p.tree.node(tree::PNodeId(outer.unwrap() as u32));
    let has_else = outer.children.iter().any(|c| match c {
        PChild::Token(t) => p.tokens[*t as usize].text == "else",
        PChild::Node(_) => false,
    });
    assert!(!has_else, "outer if must not own the else");
}

#[test]
fn syntax_error_reports_the_offending_token() {
    let err = parse("int f( { }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::SyntaxError);

    let err = parse("int f(int a) { return a; ").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::SyntaxError);
    assert!(err.message.contains("end of input") || err.message.contains("unexpected"));
}

#[test]
fn lex_error_surfaces_as_parse_error() {
    let err = parse("int f() { return 09; }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::LexError);
}

#[test]
fn empty_source_is_a_syntax_error() {
    let err = parse("").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::SyntaxError);
}
