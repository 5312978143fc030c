//! # Parser runtime
//! A table-driven state machine over [ParserTables]: the reference consumer of the
//! generator's output, equivalent to the language-neutral runtime that reads the binary
//! tables. It keeps a stack of `(state, semantic value)` pairs and every step is decided
//! by the `(state, symbol)` cell: `Shift` pushes the lookahead, `Reduce` pops `len(rule)`
//! entries and follows the goto on the rule's nonterminal, `Accept` terminates, `Guard`
//! runs the guard's sub-parser against the unconsumed lookahead (on success the parser
//! advances over the guard item through the goto on the guard's defining nonterminal,
//! consuming no input), and `Divert` replaces the lookahead with the equivalent strong
//! terminal recorded by the weak-symbol rewriter and retries.
//!
//! The semantic values are [ParseTree] nodes, which is all the generator's own test
//! harness needs; a real back-end would substitute its AST types.

use crate::grammar::{NonterminalId, RuleId};
use crate::lr::{ActionKind, GuardInfo, ParserTables};
use thiserror::Error;

/// One input token for the parser: a terminal symbol and the matched text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: u32,
    pub text: String,
}

impl Token {
    pub fn new(symbol: u32, text: impl Into<String>) -> Self {
        Token {
            symbol,
            text: text.into(),
        }
    }
}

/// The semantic value built by the reference runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree {
    /// A shifted token
    Terminal { symbol: u32, text: String },
    /// A matched guard predicate (consumes no input)
    Guard { symbol: u32 },
    /// A reduction: the rule applied and the popped children in grammar order
    Reduction {
        rule: RuleId,
        nonterminal: NonterminalId,
        children: Vec<ParseTree>,
    },
}

impl ParseTree {
    /// The children of a reduction node, or an empty slice
    pub fn children(&self) -> &[ParseTree] {
        match self {
            ParseTree::Reduction { children, .. } => children,
            _ => &[],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unexpected symbol {symbol} at token {position}")]
    UnexpectedSymbol { symbol: u32, position: usize },
    #[error("No goto for nonterminal {nonterminal} in state {state}")]
    MissingGoto {
        nonterminal: NonterminalId,
        state: usize,
    },
}

/// A parser over a set of generated tables
#[derive(Debug, Clone, Copy)]
pub struct Parser<'t> {
    tables: &'t ParserTables,
}

impl<'t> Parser<'t> {
    pub fn new(tables: &'t ParserTables) -> Self {
        Parser { tables }
    }

    /// Parses the tokens from the first start nonterminal
    pub fn parse(&self, tokens: &[Token]) -> Result<ParseTree, ParseError> {
        self.parse_start(0, tokens)
    }

    /// Parses the tokens from the start nonterminal with the given index
    pub fn parse_start(
        &self,
        start_index: usize,
        tokens: &[Token],
    ) -> Result<ParseTree, ParseError> {
        let mut stack: Vec<(usize, Option<ParseTree>)> =
            vec![(self.tables.start_states[start_index], None)];
        let mut pos = 0;
        // A demoted replacement for the current token's symbol, set by Divert actions
        let mut divert: Option<u32> = None;

        loop {
            let state = stack.last().expect("stack is never empty").0;
            let token_symbol = tokens
                .get(pos)
                .map(|token| token.symbol)
                .unwrap_or(self.tables.end_of_input);
            let lookahead = divert.unwrap_or(token_symbol);

            let mut matched_guard: Option<GuardInfo> = None;
            let mut chosen = None;
            for action in self.tables.actions_for(state, lookahead) {
                if action.kind == ActionKind::Guard {
                    let guard = self
                        .tables
                        .guard_by_initial_state(action.next)
                        .expect("guard action references a known guard");
                    if self.guard_matches(guard, &tokens[pos..]) {
                        matched_guard = Some(*guard);
                        break;
                    }
                    // Guard did not match: fall through to the next action
                } else {
                    chosen = Some(*action);
                    break;
                }
            }

            if let Some(guard) = matched_guard {
                // The guard consumed nothing: advance over its item through the goto
                // on its defining nonterminal
                let nonterminal = self.tables.rules[guard.rule].nonterminal;
                let target = self.tables.goto(state, nonterminal).ok_or(
                    ParseError::MissingGoto {
                        nonterminal,
                        state,
                    },
                )?;
                stack.push((
                    target,
                    Some(ParseTree::Guard {
                        symbol: guard.symbol,
                    }),
                ));
                continue;
            }

            let Some(action) = chosen else {
                return Err(ParseError::UnexpectedSymbol {
                    symbol: lookahead,
                    position: pos,
                });
            };

            match action.kind {
                ActionKind::Shift => {
                    let tree = tokens.get(pos).map(|token| ParseTree::Terminal {
                        symbol: lookahead,
                        text: token.text.clone(),
                    });
                    stack.push((action.next, tree));
                    pos += 1;
                    divert = None;
                }
                ActionKind::Reduce | ActionKind::WeakReduce => {
                    let rule = action.next;
                    let info = self.tables.rules[rule];
                    let mut children = Vec::with_capacity(info.len);
                    for _ in 0..info.len {
                        let (_, value) = stack.pop().expect("reduce pops what was pushed");
                        if let Some(value) = value {
                            children.push(value);
                        }
                    }
                    children.reverse();

                    let state = stack.last().expect("stack is never empty").0;
                    let target = self.tables.goto(state, info.nonterminal).ok_or(
                        ParseError::MissingGoto {
                            nonterminal: info.nonterminal,
                            state,
                        },
                    )?;
                    stack.push((
                        target,
                        Some(ParseTree::Reduction {
                            rule,
                            nonterminal: info.nonterminal,
                            children,
                        }),
                    ));
                }
                ActionKind::Accept => {
                    let (_, value) = stack.pop().expect("accept follows a goto");
                    return Ok(value.expect("the start symbol has a semantic value"));
                }
                ActionKind::Divert => {
                    divert = Some(action.next as u32);
                }
                ActionKind::Goto | ActionKind::Guard => {
                    unreachable!("not a terminal action")
                }
            }
        }
    }

    /// Runs a guard's sub-parser against the unconsumed lookahead. The guard matches when
    /// the sub-parser reaches its ending state; a lookahead symbol with no action falls
    /// back to the end-of-guard reductions before failing.
    fn guard_matches(&self, guard: &GuardInfo, lookahead: &[Token]) -> bool {
        let mut stack: Vec<usize> = vec![guard.initial_state];
        let mut pos = 0;
        let mut divert: Option<u32> = None;

        loop {
            let state = *stack.last().expect("stack is never empty");
            if state == guard.ending_state {
                return true;
            }

            let token_symbol = lookahead
                .get(pos)
                .map(|token| token.symbol)
                .unwrap_or(self.tables.end_of_input);
            let symbol = divert.unwrap_or(token_symbol);

            let mut matched_guard: Option<GuardInfo> = None;
            let mut chosen = None;
            for action in self.tables.actions_for(state, symbol) {
                if action.kind == ActionKind::Guard {
                    let nested = self
                        .tables
                        .guard_by_initial_state(action.next)
                        .expect("guard action references a known guard");
                    if self.guard_matches(nested, &lookahead[pos..]) {
                        matched_guard = Some(*nested);
                        break;
                    }
                } else {
                    chosen = Some(*action);
                    break;
                }
            }

            if let Some(nested) = matched_guard {
                let nonterminal = self.tables.rules[nested.rule].nonterminal;
                match self.tables.goto(state, nonterminal) {
                    Some(target) => {
                        stack.push(target);
                        continue;
                    }
                    None => return false,
                }
            }

            // The buffered lookahead ran past what the guard needs: try the
            // end-of-guard reductions
            let action = chosen.or_else(|| {
                self.tables
                    .actions_for(state, self.tables.end_of_guard)
                    .find(|action| {
                        matches!(action.kind, ActionKind::Reduce | ActionKind::WeakReduce)
                    })
                    .copied()
            });

            let Some(action) = action else { return false };

            match action.kind {
                ActionKind::Shift => {
                    stack.push(action.next);
                    pos += 1;
                    divert = None;
                }
                ActionKind::Reduce | ActionKind::WeakReduce => {
                    let info = self.tables.rules[action.next];
                    stack.truncate(stack.len() - info.len);
                    let state = *stack.last().expect("stack is never empty");
                    match self.tables.goto(state, info.nonterminal) {
                        Some(target) => stack.push(target),
                        None => return false,
                    }
                }
                ActionKind::Divert => {
                    divert = Some(action.next as u32);
                }
                ActionKind::Accept => return true,
                ActionKind::Goto | ActionKind::Guard => {
                    unreachable!("not a terminal action")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, Item, TerminalDictionary};
    use crate::lr::builder::{build_parser, resolve_conflicts, BuilderOptions};
    use crate::diag::ConsoleSink;

    #[test]
    fn parses_a_simple_expression() {
        // E -> E '+' T | T ; T -> 'id'
        let mut terminals = TerminalDictionary::new();
        let plus = terminals.add_named("+");
        let id = terminals.add_named("id");
        let mut grammar = Grammar::new();
        let e = grammar.add_nonterminal("E");
        let t = grammar.add_nonterminal("T");
        grammar.add_rule(
            e,
            vec![
                Item::Nonterminal(e),
                Item::Terminal(plus),
                Item::Nonterminal(t),
            ],
        );
        grammar.add_rule(e, vec![Item::Nonterminal(t)]);
        grammar.add_rule(t, vec![Item::Terminal(id)]);
        grammar.add_start(e);

        let mut tables = build_parser(&mut grammar, &mut terminals);
        let mut sink = ConsoleSink::new();
        assert!(resolve_conflicts(
            &mut tables,
            &grammar,
            &terminals,
            &mut sink,
            &BuilderOptions::default()
        ));

        let parser = Parser::new(&tables);
        let tokens = [
            Token::new(id, "a"),
            Token::new(plus, "+"),
            Token::new(id, "b"),
        ];
        let tree = parser.parse(&tokens).unwrap();
        let ParseTree::Reduction { rule, children, .. } = &tree else {
            panic!("expected a reduction at the top");
        };
        assert_eq!(*rule, 0, "top reduction is E -> E + T");
        assert_eq!(children.len(), 3);

        // A missing operand is a parse error, not a panic
        let bad = [Token::new(id, "a"), Token::new(plus, "+")];
        assert!(matches!(
            parser.parse(&bad),
            Err(ParseError::UnexpectedSymbol { .. })
        ));
    }
}
