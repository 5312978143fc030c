//! # Regular expressions
//! The restricted regex dialect the lexer is described in. An expression is parsed (see
//! [crate::parser::regex]) into a [Regex] tree and compiled into NDFA fragments using the
//! Thompson construction; the dialect supports literal characters, `.`, character classes
//! with ranges and negation, alternation, grouping, the `?`/`+`/`*` quantifiers and the
//! escape sequences `\n \r \t \e \a \f`, octal `\NNN`, hex `\xNN`, unicode `\uNNNN` and
//! long octal `\oNNNNNN`. There are no backreferences, anchors or lookaround: every
//! expression denotes a regular language over symbol ranges, which is what keeps the
//! NDFA → DFA pipeline applicable.
//!
//! ## Example
//! ```
//! use tameparse::parser;
//! use tameparse::nfa::AcceptAction;
//!
//! let regex = parser::regex("[a-z_][a-z0-9_]*").unwrap();
//! let ndfa = regex.to_ndfa(AcceptAction::new(0));
//! let (unique, _partition) = ndfa.to_ndfa_with_unique_symbols();
//! let dfa = unique.to_dfa(&[0]);
//! assert!(dfa.state_count() >= 2);
//! ```

use crate::nfa::{AcceptAction, Ndfa};
use crate::symbols::{SymbolRange, SymbolSet};

/// A parsed regular expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub tree: RegexTree,
}

/// The syntax tree of a regular expression. `x+` is desugared to `x x*` at parse time, so
/// the tree only has the zero-or-more repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexTree {
    /// Subexpressions matched one after another
    Sequence(Vec<RegexTree>),
    /// Alternatives separated by `|`
    Alt(Vec<RegexTree>),
    /// Zero or more repetitions (`*`)
    Repeat(Box<RegexTree>),
    /// Zero or one occurrence (`?`)
    Optional(Box<RegexTree>),
    /// A single symbol drawn from a set: a literal character, an escape, a character
    /// class or `.`
    Class(SymbolSet),
}

impl Regex {
    /// Compiles this expression into a fresh NDFA rooted at state 0, accepting with the
    /// supplied action. Useful on its own for testing a single expression; a full lexer
    /// merges many expressions into one NDFA instead (see
    /// [LexerBuilder](crate::lexer::LexerBuilder)).
    pub fn to_ndfa(&self, action: AcceptAction) -> Ndfa {
        let mut ndfa = Ndfa::new();
        let end = self.compile(&mut ndfa, 0);
        ndfa.mark_accept(end, action);
        ndfa
    }

    /// Compiles this expression into NDFA fragments starting at `from`, returning the
    /// final state of the fragment
    pub fn compile(&self, ndfa: &mut Ndfa, from: usize) -> usize {
        compile_tree(&self.tree, ndfa, from)
    }

    /// Rewrites the expression so that every letter also matches its opposite case.
    /// Applied at parse time when a pattern is marked case-insensitive.
    pub fn case_insensitive(self) -> Regex {
        Regex {
            tree: fold_tree(self.tree),
        }
    }
}

fn compile_tree(tree: &RegexTree, ndfa: &mut Ndfa, from: usize) -> usize {
    match tree {
        RegexTree::Sequence(items) => {
            let mut current = from;
            for item in items {
                current = compile_tree(item, ndfa, current);
            }
            current
        }
        RegexTree::Alt(alternatives) => {
            let join = ndfa.add_state();
            for alternative in alternatives {
                let end = compile_tree(alternative, ndfa, from);
                ndfa.add_epsilon(end, join);
            }
            join
        }
        RegexTree::Repeat(inner) => {
            // A dedicated entry state isolates the loop: repeating must not re-enable
            // sibling alternatives that share `from`
            let entry = ndfa.add_state();
            let exit = ndfa.add_state();
            ndfa.add_epsilon(from, entry);
            let end = compile_tree(inner, ndfa, entry);
            ndfa.add_epsilon(end, entry);
            ndfa.add_epsilon(entry, exit);
            exit
        }
        RegexTree::Optional(inner) => {
            let end = compile_tree(inner, ndfa, from);
            ndfa.add_epsilon(from, end);
            end
        }
        RegexTree::Class(set) => {
            let target = ndfa.add_state();
            ndfa.add_transition(from, set.clone(), target);
            target
        }
    }
}

fn fold_tree(tree: RegexTree) -> RegexTree {
    match tree {
        RegexTree::Sequence(items) => {
            RegexTree::Sequence(items.into_iter().map(fold_tree).collect())
        }
        RegexTree::Alt(items) => RegexTree::Alt(items.into_iter().map(fold_tree).collect()),
        RegexTree::Repeat(inner) => RegexTree::Repeat(Box::new(fold_tree(*inner))),
        RegexTree::Optional(inner) => RegexTree::Optional(Box::new(fold_tree(*inner))),
        RegexTree::Class(set) => RegexTree::Class(fold_case(&set)),
    }
}

/// Extends a symbol set with the opposite case of any ASCII letters it contains
fn fold_case(set: &SymbolSet) -> SymbolSet {
    let lower = set.intersect(&SymbolSet::range('a' as u32, 'z' as u32 + 1));
    let upper = set.intersect(&SymbolSet::range('A' as u32, 'Z' as u32 + 1));

    let mut result = set.clone();
    for range in lower.ranges() {
        result = result.union(&SymbolSet::from(SymbolRange::new(range.lo - 32, range.hi - 32)));
    }
    for range in upper.ranges() {
        result = result.union(&SymbolSet::from(SymbolRange::new(range.lo + 32, range.hi + 32)));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(ndfa: &Ndfa, input: &str) -> bool {
        let (unique, partition) = ndfa.to_ndfa_with_unique_symbols();
        let translator = partition.translator();
        let dfa = unique.to_dfa(&[0]);
        let mut state = 0;
        for c in input.chars() {
            let Some(atom) = translator.lookup(c as u32) else {
                return false;
            };
            match dfa.next(state, atom) {
                Some(next) => state = next,
                None => return false,
            }
        }
        dfa.accept_actions(state).iter().any(|a| a.symbol == 0)
    }

    #[test]
    fn repeat_does_not_leak_into_sibling_alternatives() {
        // (a|b*)c: "bac" must be rejected even though 'a' shares the alternation start
        let regex = crate::parser::regex("(a|b*)c").unwrap();
        let ndfa = regex.to_ndfa(AcceptAction::new(0));
        assert!(accepts(&ndfa, "ac"));
        assert!(accepts(&ndfa, "bbbc"));
        assert!(accepts(&ndfa, "c"));
        assert!(!accepts(&ndfa, "bac"));
    }

    #[test]
    fn case_folding_extends_classes() {
        let regex = crate::parser::regex("if").unwrap().case_insensitive();
        let ndfa = regex.to_ndfa(AcceptAction::new(0));
        assert!(accepts(&ndfa, "if"));
        assert!(accepts(&ndfa, "IF"));
        assert!(accepts(&ndfa, "If"));
        assert!(!accepts(&ndfa, "io"));
    }
}
