//! # Lexer compiler
//! Turns a collection of `(regex, symbol, flags)` definitions into a compact scanning
//! table. All the patterns are compiled into one NDFA sharing a single initial state, the
//! transition sets are partitioned into disjoint atoms, the subset construction produces a
//! DFA, and accept conflicts are resolved by priority: eager accepts first, then the lowest
//! symbol id (i.e. the pattern defined first). The result is a dense
//! `state_count × atom_count` transition table, a parallel accept column and the
//! symbol-to-atom translator.
//!
//! Two flags alter how a pattern's accepts behave:
//! * **eager**: matching terminates as soon as the accept is reached, instead of greedily
//!   looking for a longer match;
//! * **weak**: the symbol is recorded as a weak terminal. Weak terminals do not influence
//!   table construction, but every DFA state that accepts a weak symbol while also
//!   accepting a strong one contributes a `weak → strong` equivalence, which the parser
//!   uses to demote unexpected weak symbols (see
//!   [WeakSymbolRewriter](crate::lr::WeakSymbolRewriter)).
//!
//! ## Example
//! ```
//! use tameparse::lexer::LexerBuilder;
//! use tameparse::parser;
//!
//! let mut builder = LexerBuilder::new();
//! builder.add_weak_pattern(parser::regex("if").unwrap(), 0);
//! builder.add_pattern(parser::regex("[a-z]+").unwrap(), 1);
//! builder.add_pattern(parser::regex(" +").unwrap(), 2);
//! let lexer = builder.compile().unwrap();
//!
//! let symbols: Vec<_> = lexer.scan("if iffy").map(|lexeme| lexeme.symbol).collect();
//! assert_eq!(symbols, vec![Some(0), Some(2), Some(1)]);
//! // "if" is a subword of the identifier pattern, so it can be demoted
//! assert_eq!(lexer.weak_to_strong(), &[(0, 1)]);
//! ```

use crate::dfa::Dfa;
use crate::nfa::{AcceptAction, Ndfa};
use crate::regex::Regex;
use crate::symbols::SymbolTranslator;
use thiserror::Error;

/// The binary table format stores lexer state ids in 16 bits, with `0xffff` reserved for
/// rejection
pub const MAX_LEXER_STATES: usize = 65534;
/// Atom ids share a 32-bit word with the target state in the binary format
pub const MAX_ATOMS: usize = 65535;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexerError {
    #[error("Too many lexer states: {0} (at most {MAX_LEXER_STATES} are supported)")]
    TooManyStates(usize),
    #[error("Too many symbol partitions: {0} (at most {MAX_ATOMS} are supported)")]
    TooManyAtoms(usize),
}

#[derive(Debug, Clone)]
struct LexerEntry {
    regex: Regex,
    symbol: u32,
    eager: bool,
    weak: bool,
}

/// Collects token definitions and compiles them into a [Lexer]
#[derive(Debug, Clone, Default)]
pub struct LexerBuilder {
    entries: Vec<LexerEntry>,
}

impl LexerBuilder {
    pub fn new() -> Self {
        LexerBuilder::default()
    }

    /// Adds a pattern accepting with the given symbol
    pub fn add_pattern(&mut self, regex: Regex, symbol: u32) {
        self.entries.push(LexerEntry {
            regex,
            symbol,
            eager: false,
            weak: false,
        });
    }

    /// Adds a pattern whose accept is eager: the scanner stops at the first match rather
    /// than looking for a longer one
    pub fn add_eager_pattern(&mut self, regex: Regex, symbol: u32) {
        self.entries.push(LexerEntry {
            regex,
            symbol,
            eager: true,
            weak: false,
        });
    }

    /// Adds a pattern for a weak terminal (typically a keyword that is also matched by an
    /// identifier pattern)
    pub fn add_weak_pattern(&mut self, regex: Regex, symbol: u32) {
        self.entries.push(LexerEntry {
            regex,
            symbol,
            eager: false,
            weak: true,
        });
    }

    /// The number of patterns added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no patterns have been added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compiles the collected patterns: combined NDFA, symbol partitioning, subset
    /// construction, accept resolution
    pub fn compile(self) -> Result<Lexer, LexerError> {
        let mut ndfa = Ndfa::new();
        for entry in &self.entries {
            // One accepting tail per pattern, reached from the shared initial state
            let start = ndfa.add_state();
            ndfa.add_epsilon(0, start);
            let end = entry.regex.compile(&mut ndfa, start);
            ndfa.mark_accept(
                end,
                AcceptAction {
                    symbol: entry.symbol,
                    eager: entry.eager,
                },
            );
        }

        let (unique, partition) = ndfa.to_ndfa_with_unique_symbols();
        let dfa = unique.to_dfa(&[0]);

        if dfa.state_count() > MAX_LEXER_STATES {
            return Err(LexerError::TooManyStates(dfa.state_count()));
        }
        if partition.atom_count() > MAX_ATOMS {
            return Err(LexerError::TooManyAtoms(partition.atom_count()));
        }

        let mut weak_symbols: Vec<u32> = self
            .entries
            .iter()
            .filter(|entry| entry.weak)
            .map(|entry| entry.symbol)
            .collect();
        weak_symbols.sort_unstable();
        weak_symbols.dedup();

        // Resolve accept conflicts: eager beats greedy, then the lowest symbol id wins
        let mut accepts: Vec<Option<AcceptAction>> = Vec::with_capacity(dfa.state_count());
        let mut weak_to_strong: Vec<(u32, u32)> = Vec::new();
        for state in 0..dfa.state_count() {
            let actions = dfa.accept_actions(state);
            let best = actions
                .iter()
                .min_by_key(|action| (!action.eager, action.symbol))
                .copied();
            accepts.push(best);

            // A state accepting a weak symbol alongside a strong one tells us the weak
            // terminal's pattern is a subword of the strong terminal's
            if let Some(winner) = best {
                if weak_symbols.binary_search(&winner.symbol).is_ok() {
                    if let Some(strong) = actions
                        .iter()
                        .filter(|action| weak_symbols.binary_search(&action.symbol).is_err())
                        .min_by_key(|action| (!action.eager, action.symbol))
                    {
                        weak_to_strong.push((winner.symbol, strong.symbol));
                    }
                }
            }
        }
        weak_to_strong.sort_unstable();
        weak_to_strong.dedup();

        Ok(Lexer {
            translator: partition.translator(),
            dfa,
            accepts,
            weak_symbols,
            weak_to_strong,
        })
    }
}

/// A compiled lexer: transition table, accept column and symbol translator
#[derive(Debug, Clone)]
pub struct Lexer {
    translator: SymbolTranslator,
    dfa: Dfa,
    accepts: Vec<Option<AcceptAction>>,
    weak_symbols: Vec<u32>,
    weak_to_strong: Vec<(u32, u32)>,
}

impl Lexer {
    /// The number of DFA states
    pub fn state_count(&self) -> usize {
        self.dfa.state_count()
    }

    /// The number of atoms (transition table columns)
    pub fn atom_count(&self) -> usize {
        self.dfa.atom_count()
    }

    /// The dense transition row of a state (`-1` rejects)
    pub fn row(&self, state: usize) -> &[i32] {
        self.dfa.row(state)
    }

    /// The resolved accept action of a state, if it is accepting
    pub fn accept(&self, state: usize) -> Option<AcceptAction> {
        self.accepts[state]
    }

    /// The symbol-to-atom translator of this lexer
    pub fn translator(&self) -> &SymbolTranslator {
        &self.translator
    }

    /// The initial scanning state
    pub fn initial_state(&self) -> usize {
        self.dfa.initial_states()[0]
    }

    /// The symbols that were marked weak, in ascending order
    pub fn weak_symbols(&self) -> &[u32] {
        &self.weak_symbols
    }

    /// `(weak, strong)` pairs: weak terminals whose pattern is a subword of a strong
    /// terminal's pattern, with the strong terminal they can be demoted to
    pub fn weak_to_strong(&self) -> &[(u32, u32)] {
        &self.weak_to_strong
    }

    /// Creates a scanner over the given input
    pub fn scan<'a>(&'a self, input: &'a str) -> Scanner<'a> {
        Scanner {
            lexer: self,
            input,
            pos: 0,
        }
    }
}

/// A token produced by the scanner. `symbol` is `None` for an invalid lexeme: input that no
/// pattern matches advances exactly one symbol and is reported rather than looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub symbol: Option<u32>,
    pub text: &'a str,
    pub offset: usize,
}

/// Iterator over the lexemes of an input string, longest match first with eager cut-off
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    lexer: &'a Lexer,
    input: &'a str,
    pos: usize,
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Lexeme<'a>;

    fn next(&mut self) -> Option<Lexeme<'a>> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let mut state = self.lexer.initial_state();
        // End offset (relative to pos) and symbol of the last accept seen
        let mut last_accept: Option<(usize, u32)> = None;

        for (offset, c) in rest.char_indices() {
            let next = self
                .lexer
                .translator
                .lookup(c as u32)
                .and_then(|atom| self.lexer.dfa.next(state, atom));
            let Some(next) = next else { break };
            state = next;

            if let Some(action) = self.lexer.accepts[state] {
                last_accept = Some((offset + c.len_utf8(), action.symbol));
                if action.eager {
                    break;
                }
            }
        }

        let lexeme = match last_accept {
            Some((len, symbol)) => Lexeme {
                symbol: Some(symbol),
                text: &rest[..len],
                offset: self.pos,
            },
            None => {
                // Unrecognised input: emit an invalid lexeme of exactly one symbol
                let len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                Lexeme {
                    symbol: None,
                    text: &rest[..len],
                    offset: self.pos,
                }
            }
        };
        self.pos += lexeme.text.len();
        Some(lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn lexer(patterns: &[(&str, u32)]) -> Lexer {
        let mut builder = LexerBuilder::new();
        for &(pattern, symbol) in patterns {
            builder.add_pattern(parser::regex(pattern).unwrap(), symbol);
        }
        builder.compile().unwrap()
    }

    #[test]
    fn longest_match_wins() {
        let lexer = lexer(&[("=", 0), ("==", 1)]);
        let lexemes: Vec<_> = lexer.scan("===").collect();
        assert_eq!(lexemes[0].symbol, Some(1));
        assert_eq!(lexemes[1].symbol, Some(0));
    }

    #[test]
    fn lowest_symbol_id_breaks_accept_ties() {
        let mut builder = LexerBuilder::new();
        builder.add_pattern(parser::regex("abc").unwrap(), 7);
        builder.add_pattern(parser::regex("a(bc)?").unwrap(), 3);
        let lexer = builder.compile().unwrap();
        let lexemes: Vec<_> = lexer.scan("abc").collect();
        assert_eq!(lexemes, vec![Lexeme { symbol: Some(3), text: "abc", offset: 0 }]);
    }

    #[test]
    fn eager_accept_stops_matching() {
        let mut builder = LexerBuilder::new();
        builder.add_eager_pattern(parser::regex("a").unwrap(), 0);
        builder.add_pattern(parser::regex("aa").unwrap(), 1);
        let lexer = builder.compile().unwrap();
        let lexemes: Vec<_> = lexer.scan("aa").collect();
        // Without the eager flag this would match "aa" in one lexeme
        assert_eq!(
            lexemes.iter().map(|l| l.symbol).collect::<Vec<_>>(),
            vec![Some(0), Some(0)]
        );
    }

    #[test]
    fn invalid_input_advances_one_symbol() {
        let lexer = lexer(&[("a*", 0)]);
        let lexemes: Vec<_> = lexer.scan("ba").collect();
        assert_eq!(lexemes[0].symbol, None);
        assert_eq!(lexemes[0].text, "b");
        assert_eq!(lexemes[1], Lexeme { symbol: Some(0), text: "a", offset: 1 });
    }

    #[test]
    fn empty_match_never_produces_a_lexeme() {
        // "a*" accepts the empty string, but scanning must always make progress
        let lexer = lexer(&[("a*", 0)]);
        let lexemes: Vec<_> = lexer.scan("b").collect();
        assert_eq!(lexemes.len(), 1);
        assert_eq!(lexemes[0].symbol, None);
    }
}
