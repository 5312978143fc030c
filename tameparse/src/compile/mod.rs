//! # Language compiler
//! Drives the whole generator pipeline for one language definition: the surface syntax
//! parser (out of tree) hands this module an AST of lexer blocks, grammar blocks,
//! precedence levels and a parser block, and `compile` runs it through terminal
//! collection, lexer compilation, EBNF rewriting, LALR construction, the rewriter
//! pipeline and conflict resolution. All problems are reported through the supplied
//! [DiagnosticSink]; compilation continues past recoverable errors so a definition's
//! problems surface in one run, and the compiled artifacts are returned only when no
//! error was reported.

use crate::diag::{Diagnostic, DiagnosticSink, Severity};
use crate::grammar::{Grammar, Item, TerminalDictionary};
use crate::lexer::{Lexer, LexerBuilder};
use crate::lr::{
    apply_rewriters, build_parser, resolve_conflicts, ActionRewriter, Associativity,
    BuilderOptions, GuardRewriter, ParserTables, PrecedenceRewriter, PrecedenceTable,
    WeakSymbolRewriter,
};
use crate::regex::{Regex, RegexTree};
use crate::symbols::SymbolSet;

/// What kind of lexemes a lexer block defines
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LexerBlockKind {
    /// Ordinary lexer symbols
    Symbols,
    /// Keywords (literal patterns that outrank symbols defined later)
    Keywords,
    /// Weak keywords: usable as identifiers wherever the keyword itself isn't expected
    WeakKeywords,
    /// Symbols consumed and discarded between tokens (whitespace, comments)
    Ignore,
}

/// A lexeme pattern: a regular expression or a literal string
#[derive(Clone, Debug)]
pub enum LexemePattern {
    Regex(String),
    Literal(String),
}

/// One lexeme definition inside a lexer block
#[derive(Clone, Debug)]
pub struct LexemeDefinition {
    pub name: String,
    pub pattern: LexemePattern,
    pub case_insensitive: bool,
}

impl LexemeDefinition {
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        LexemeDefinition {
            name: name.into(),
            pattern: LexemePattern::Regex(pattern.into()),
            case_insensitive: false,
        }
    }

    pub fn literal(name: impl Into<String>, text: impl Into<String>) -> Self {
        LexemeDefinition {
            name: name.into(),
            pattern: LexemePattern::Literal(text.into()),
            case_insensitive: false,
        }
    }
}

/// A named lexer block
#[derive(Clone, Debug)]
pub struct LexerBlock {
    pub kind: LexerBlockKind,
    pub definitions: Vec<LexemeDefinition>,
}

/// An EBNF production item as it appears in the source AST
#[derive(Clone, Debug)]
pub enum EbnfItem {
    /// A terminal, by lexer-symbol name
    Terminal(String),
    /// A nonterminal, by name
    Nonterminal(String),
    Optional(Box<EbnfItem>),
    Repeat0(Box<EbnfItem>),
    Repeat1(Box<EbnfItem>),
    /// A parenthesised group of alternatives
    Group(Vec<Vec<EbnfItem>>),
    /// A lookahead guard over the given items
    Guard {
        items: Vec<EbnfItem>,
        priority: i32,
        can_clash: bool,
    },
}

/// A nonterminal definition: its name and EBNF productions
#[derive(Clone, Debug)]
pub struct NonterminalDefinition {
    pub name: String,
    pub productions: Vec<Vec<EbnfItem>>,
}

/// A grammar block: a list of nonterminal definitions
#[derive(Clone, Debug, Default)]
pub struct GrammarBlock {
    pub definitions: Vec<NonterminalDefinition>,
}

/// One operator-precedence level (levels are listed weakest first)
#[derive(Clone, Debug)]
pub struct PrecedenceLevel {
    pub associativity: Associativity,
    pub terminals: Vec<String>,
}

/// The parser block: which nonterminals the generated parser can start from
#[derive(Clone, Debug, Default)]
pub struct ParserBlock {
    pub start_symbols: Vec<String>,
}

/// The source AST handed to the core by the surface syntax parser
#[derive(Clone, Debug)]
pub struct LanguageDefinition {
    pub name: String,
    pub lexer_blocks: Vec<LexerBlock>,
    pub grammar: GrammarBlock,
    pub precedence: Vec<PrecedenceLevel>,
    pub parser: ParserBlock,
}

/// The artifacts of a successful compilation
#[derive(Debug)]
pub struct CompiledOutput {
    pub lexer: Lexer,
    pub tables: ParserTables,
    pub grammar: Grammar,
    pub terminals: TerminalDictionary,
    /// Terminals the parser driver should consume and discard
    pub ignored: Vec<u32>,
}

/// Wraps the caller's sink to remember whether anything at `Error` or above was seen
struct TrackingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    errored: bool,
}

impl DiagnosticSink for TrackingSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) -> bool {
        if diagnostic.severity >= Severity::Error {
            self.errored = true;
        }
        self.inner.report(diagnostic)
    }
}

/// Compiles a language definition. Recoverable problems are reported and compilation
/// continues to surface as many of them as possible; `None` is returned if anything at
/// `Error` severity or above was reported.
pub fn compile(
    definition: &LanguageDefinition,
    sink: &mut dyn DiagnosticSink,
    options: &BuilderOptions,
) -> Option<CompiledOutput> {
    let mut sink = TrackingSink {
        inner: sink,
        errored: false,
    };

    // Terminal collection: lexer blocks in order, names unique across blocks
    let mut terminals = TerminalDictionary::new();
    let mut patterns: Vec<(u32, Regex, bool)> = Vec::new(); // (symbol, regex, weak)
    let mut ignored: Vec<u32> = Vec::new();

    for block in &definition.lexer_blocks {
        for lexeme in &block.definitions {
            if terminals.id_of(&lexeme.name).is_some() {
                if !sink.report(Diagnostic::new(
                    Severity::Error,
                    "DUPLICATE_LEXER_SYMBOL",
                    format!("Lexer symbol '{}' is defined more than once", lexeme.name),
                )) {
                    return None;
                }
                continue;
            }
            let symbol = terminals.add_named(&lexeme.name);

            let regex = match &lexeme.pattern {
                LexemePattern::Literal(text) => Some(literal_regex(text)),
                LexemePattern::Regex(pattern) => match crate::parser::regex(pattern) {
                    Ok(regex) => Some(regex),
                    Err(_) => {
                        if !sink.report(Diagnostic::new(
                            Severity::Error,
                            "MALFORMED_REGEX",
                            format!(
                                "Pattern for lexer symbol '{}' is not a valid regular expression",
                                lexeme.name
                            ),
                        )) {
                            return None;
                        }
                        None
                    }
                },
            };
            let Some(mut regex) = regex else { continue };
            if lexeme.case_insensitive {
                regex = regex.case_insensitive();
            }

            patterns.push((symbol, regex, block.kind == LexerBlockKind::WeakKeywords));
            if block.kind == LexerBlockKind::Ignore {
                ignored.push(symbol);
            }
        }
    }

    // Grammar conversion. Terminals named in productions but defined in no lexer block
    // become implicit keywords (with a warning), so they must be collected before the
    // lexer is compiled.
    let mut grammar = Grammar::new();
    for nt_definition in &definition.grammar.definitions {
        grammar.add_nonterminal(&nt_definition.name);
    }

    let mut implicit: Vec<(u32, String)> = Vec::new();
    for nt_definition in &definition.grammar.definitions {
        let nonterminal = grammar
            .nonterminal_id(&nt_definition.name)
            .expect("all definitions were pre-registered");
        for production in &nt_definition.productions {
            let mut items = Vec::with_capacity(production.len());
            let mut valid = true;
            for ebnf in production {
                match convert_item(ebnf, &mut grammar, &mut terminals, &mut implicit, &mut sink) {
                    Some(item) => items.push(item),
                    None => valid = false,
                }
            }
            if valid {
                grammar.add_rule(nonterminal, items);
            }
        }
    }
    for (symbol, name) in &implicit {
        if !sink.report(Diagnostic::new(
            Severity::Warning,
            "IMPLICIT_KEYWORD",
            format!("Terminal '{name}' has no lexer definition; treating it as a keyword"),
        )) {
            return None;
        }
        patterns.push((*symbol, literal_regex(name), false));
    }

    // Lexer compilation
    let mut builder = LexerBuilder::new();
    for (symbol, regex, weak) in patterns {
        if weak {
            builder.add_weak_pattern(regex, symbol);
        } else {
            builder.add_pattern(regex, symbol);
        }
    }
    let lexer = match builder.compile() {
        Ok(lexer) => lexer,
        Err(error) => {
            sink.report(Diagnostic::new(
                Severity::Error,
                "LEXER_LIMITS",
                error.to_string(),
            ));
            return None;
        }
    };

    // Start symbols
    for start in &definition.parser.start_symbols {
        match grammar.nonterminal_id(start) {
            Some(nonterminal) => grammar.add_start(nonterminal),
            None => {
                if !sink.report(Diagnostic::new(
                    Severity::Error,
                    "UNKNOWN_START_SYMBOL",
                    format!("Start symbol '{start}' is not a defined nonterminal"),
                )) {
                    return None;
                }
            }
        }
    }
    if grammar.starts().is_empty() {
        sink.report(Diagnostic::new(
            Severity::Fatal,
            "NO_START_SYMBOL",
            "The parser block defines no usable start symbol",
        ));
        return None;
    }

    unused_warnings(&grammar, &terminals, &ignored, &mut sink);

    // Table construction and the rewriter pipeline
    grammar.rewrite_ebnf(&terminals);
    let mut tables = build_parser(&mut grammar, &mut terminals);

    let mut precedence = PrecedenceTable::new();
    for level in &definition.precedence {
        let mut symbols = Vec::with_capacity(level.terminals.len());
        for name in &level.terminals {
            match terminals.id_of(name) {
                Some(symbol) => symbols.push(symbol),
                None => {
                    if !sink.report(Diagnostic::new(
                        Severity::Error,
                        "UNKNOWN_PRECEDENCE_SYMBOL",
                        format!("Precedence level names unknown terminal '{name}'"),
                    )) {
                        return None;
                    }
                }
            }
        }
        precedence.add_level(level.associativity, &symbols);
    }

    let precedence_rewriter = PrecedenceRewriter::new(precedence);
    let weak_rewriter = WeakSymbolRewriter::new(lexer.weak_to_strong().to_vec());
    let guard_rewriter = GuardRewriter::new();
    apply_rewriters(
        &[
            &precedence_rewriter as &dyn ActionRewriter,
            &weak_rewriter,
            &guard_rewriter,
        ],
        &grammar,
        &mut tables,
    );

    if !resolve_conflicts(&mut tables, &grammar, &terminals, &mut sink, options) {
        return None;
    }

    if sink.errored {
        return None;
    }
    Some(CompiledOutput {
        lexer,
        tables,
        grammar,
        terminals,
        ignored,
    })
}

fn convert_item(
    ebnf: &EbnfItem,
    grammar: &mut Grammar,
    terminals: &mut TerminalDictionary,
    implicit: &mut Vec<(u32, String)>,
    sink: &mut TrackingSink<'_>,
) -> Option<Item> {
    match ebnf {
        EbnfItem::Terminal(name) => {
            let symbol = terminals.id_of(name).unwrap_or_else(|| {
                let symbol = terminals.add_named(name);
                implicit.push((symbol, name.clone()));
                symbol
            });
            Some(Item::Terminal(symbol))
        }
        EbnfItem::Nonterminal(name) => match grammar.nonterminal_id(name) {
            Some(nonterminal) => Some(Item::Nonterminal(nonterminal)),
            None => {
                sink.report(Diagnostic::new(
                    Severity::Error,
                    "UNKNOWN_NONTERMINAL",
                    format!("Nonterminal '{name}' is used but never defined"),
                ));
                None
            }
        },
        EbnfItem::Optional(inner) => Some(Item::Optional(Box::new(convert_item(
            inner, grammar, terminals, implicit, sink,
        )?))),
        EbnfItem::Repeat0(inner) => Some(Item::Repeat0(Box::new(convert_item(
            inner, grammar, terminals, implicit, sink,
        )?))),
        EbnfItem::Repeat1(inner) => Some(Item::Repeat1(Box::new(convert_item(
            inner, grammar, terminals, implicit, sink,
        )?))),
        EbnfItem::Group(branches) => {
            let mut converted = Vec::with_capacity(branches.len());
            for branch in branches {
                let mut items = Vec::with_capacity(branch.len());
                for item in branch {
                    items.push(convert_item(item, grammar, terminals, implicit, sink)?);
                }
                converted.push(items);
            }
            Some(Item::Alternative(converted))
        }
        EbnfItem::Guard {
            items,
            priority,
            can_clash,
        } => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                converted.push(convert_item(item, grammar, terminals, implicit, sink)?);
            }
            let guard = grammar.add_guard(converted, *priority);
            if *can_clash {
                if let Item::Guard { rule, .. } = guard {
                    grammar.set_can_clash(rule);
                }
            }
            Some(guard)
        }
    }
}

/// Builds a regex matching a literal string
fn literal_regex(text: &str) -> Regex {
    Regex {
        tree: RegexTree::Sequence(
            text.chars()
                .map(|c| RegexTree::Class(SymbolSet::single(c as u32)))
                .collect(),
        ),
    }
}

/// Warnings for terminals and nonterminals that nothing uses
fn unused_warnings(
    grammar: &Grammar,
    terminals: &TerminalDictionary,
    ignored: &[u32],
    sink: &mut TrackingSink<'_>,
) {
    let mut used_terminals: Vec<bool> = vec![false; terminals.count()];
    let mut used_nonterminals: Vec<bool> = vec![false; grammar.nonterminal_count()];
    for &start in grammar.starts() {
        used_nonterminals[start as usize] = true;
    }
    for rule in grammar.rules() {
        mark_used(grammar, &rule.items, &mut used_terminals, &mut used_nonterminals);
    }
    for &symbol in ignored {
        used_terminals[symbol as usize] = true;
    }

    for (id, name) in terminals.iter() {
        if let Some(name) = name {
            if !used_terminals[id as usize] {
                sink.report(Diagnostic::new(
                    Severity::Warning,
                    "UNUSED_TERMINAL",
                    format!("Terminal '{name}' is never used by the grammar"),
                ));
            }
        }
    }
    for nt in 0..grammar.nonterminal_count() as u32 {
        if !used_nonterminals[nt as usize] {
            let name = grammar.name_of(nt).unwrap_or("?");
            sink.report(Diagnostic::new(
                Severity::Warning,
                "UNUSED_NONTERMINAL",
                format!("Nonterminal '{name}' is never used by the grammar"),
            ));
        }
    }
}

fn mark_used(
    grammar: &Grammar,
    items: &[Item],
    used_terminals: &mut [bool],
    used_nonterminals: &mut [bool],
) {
    for item in items {
        match item {
            Item::Terminal(symbol) => used_terminals[*symbol as usize] = true,
            Item::Nonterminal(nt) => used_nonterminals[*nt as usize] = true,
            // A guard keeps its defining nonterminal (and everything below it) alive
            Item::Guard { rule, .. } => {
                used_nonterminals[grammar.rule(*rule).nonterminal as usize] = true;
            }
            Item::Optional(inner) | Item::Repeat0(inner) | Item::Repeat1(inner) => mark_used(
                grammar,
                std::slice::from_ref(inner),
                used_terminals,
                used_nonterminals,
            ),
            Item::Alternative(branches) => {
                for branch in branches {
                    mark_used(grammar, branch, used_terminals, used_nonterminals);
                }
            }
            Item::Parenthesised(inner) => {
                mark_used(grammar, inner, used_terminals, used_nonterminals)
            }
            _ => {}
        }
    }
}
