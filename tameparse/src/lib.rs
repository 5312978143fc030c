//!# tameparse
//!
//! `tameparse` is the core pipeline of a parser generator: it consumes a declarative
//! language description (a lexical grammar plus a context-free grammar, optionally with
//! operator precedence, guard predicates and weak keywords) and produces the tables for a
//! deterministic bottom-up LALR(1) parser, either as in-memory structures or serialised in
//! a binary format a language-neutral runtime can consume.
//!
//! ## Usage
//!
//! ```rust
//! use tameparse::compile::*;
//! use tameparse::diag::ConsoleSink;
//! use tameparse::lr::{Associativity, BuilderOptions};
//! use tameparse::runtime::{Parser, Token};
//!
//! // A tiny expression language: identifiers, '+', left associative
//! let definition = LanguageDefinition {
//!     name: "expr".to_string(),
//!     lexer_blocks: vec![LexerBlock {
//!         kind: LexerBlockKind::Symbols,
//!         definitions: vec![
//!             LexemeDefinition::regex("id", "[a-z]+"),
//!             LexemeDefinition::literal("+", "+"),
//!         ],
//!     }],
//!     grammar: GrammarBlock {
//!         definitions: vec![NonterminalDefinition {
//!             name: "expr".to_string(),
//!             productions: vec![
//!                 vec![
//!                     EbnfItem::Nonterminal("expr".to_string()),
//!                     EbnfItem::Terminal("+".to_string()),
//!                     EbnfItem::Nonterminal("expr".to_string()),
//!                 ],
//!                 vec![EbnfItem::Terminal("id".to_string())],
//!             ],
//!         }],
//!     },
//!     precedence: vec![PrecedenceLevel {
//!         associativity: Associativity::Left,
//!         terminals: vec!["+".to_string()],
//!     }],
//!     parser: ParserBlock {
//!         start_symbols: vec!["expr".to_string()],
//!     },
//! };
//!
//! let mut sink = ConsoleSink::new();
//! let compiled = compile(&definition, &mut sink, &BuilderOptions::default()).unwrap();
//! assert_eq!(sink.exit_code(), 0);
//!
//! // Scan and parse "a+b"
//! let tokens: Vec<Token> = compiled
//!     .lexer
//!     .scan("a+b")
//!     .map(|lexeme| Token::new(lexeme.symbol.unwrap(), lexeme.text))
//!     .collect();
//! let tree = Parser::new(&compiled.tables).parse(&tokens).unwrap();
//! assert_eq!(tree.children().len(), 3);
//! ```
//!
//! ## Pipeline
//!
//! The stages, in the order [compile::compile] runs them:
//!
//! * [symbols]: symbol sets over codepoint ranges, partitioned into disjoint atoms, with
//!   a compact symbol-to-atom translator
//! * [regex] and [parser]: the restricted regex dialect and its parser; expressions
//!   compile into NDFA fragments by Thompson construction
//! * [nfa] and [dfa]: the NDFA arena, `to_ndfa_with_unique_symbols`, and subset
//!   construction into dense transition tables
//! * [lexer]: combines every token pattern into one automaton, resolves accept
//!   priorities (eager first, then definition order) and scans input with longest-match
//!   semantics
//! * [grammar]: terminal dictionary (with symbol splitting), rules, EBNF desugaring and
//!   the FIRST/FOLLOW fixpoints
//! * [lr]: LR(0) collection, LALR(1) lookahead propagation, action assembly, the
//!   precedence/weak-symbol/guard rewriters and conflict resolution
//! * [output]: the back-end contract, the endian-aware binary table encoder and a
//!   minimal reader
//! * [runtime]: a reference table-driven parser (shift/reduce/goto/accept, guard
//!   sub-parsers, weak-terminal demotion)
//! * [diag]: the severity taxonomy and diagnostic sink every stage reports through
//!
//! The generator is single-threaded and synchronous; a compiled grammar, lexer or table
//! set is immutable and can be shared freely afterwards.

pub mod compile;
pub mod dfa;
pub mod diag;
pub mod grammar;
pub mod lexer;
pub mod lr;
pub mod nfa;
pub mod output;
pub mod parser;
pub mod regex;
pub mod runtime;
pub mod symbols;
