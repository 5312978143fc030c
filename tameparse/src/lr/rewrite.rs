//! Action-table rewriters: a pipeline of passes applied between action assembly and
//! serialisation. Each pass is a pure transformation of the tables given the grammar; the
//! pipeline re-sorts the tables after every pass so downstream passes (and the conflict
//! resolution) can rely on the sorted-by-symbol invariant.

use crate::grammar::{Grammar, Item, RuleId};
use crate::lr::action::{Action, ActionKind, ParserTables};
use crate::lr::builder::sort_tables;
use crate::lr::conflict::{Conflict, ConflictKind};
use std::collections::BTreeMap;

/// One pass over the assembled tables
pub trait ActionRewriter {
    fn rewrite(&self, grammar: &Grammar, tables: &mut ParserTables);
}

/// Applies the rewriters in order
pub fn apply_rewriters(
    rewriters: &[&dyn ActionRewriter],
    grammar: &Grammar,
    tables: &mut ParserTables,
) {
    for rewriter in rewriters {
        rewriter.rewrite(grammar, tables);
        sort_tables(tables);
    }
}

/// Operator associativity, used to break shift/reduce ties between equal precedences
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
    Nonassoc,
}

/// Precedence and associativity assignments for terminals, plus per-rule overrides.
/// Levels added later are higher precedence, matching the usual "declare weakest first"
/// convention of precedence blocks.
#[derive(Clone, Debug, Default)]
pub struct PrecedenceTable {
    terminals: BTreeMap<u32, (u32, Associativity)>,
    rule_overrides: BTreeMap<RuleId, u32>,
    next_level: u32,
}

impl PrecedenceTable {
    pub fn new() -> Self {
        PrecedenceTable::default()
    }

    /// Adds one precedence level containing the given terminals. Returns the level's
    /// precedence value.
    pub fn add_level(&mut self, associativity: Associativity, symbols: &[u32]) -> u32 {
        self.next_level += 1;
        for &symbol in symbols {
            self.terminals.insert(symbol, (self.next_level, associativity));
        }
        self.next_level
    }

    /// Overrides the precedence of a rule (instead of deriving it from its rightmost
    /// terminal)
    pub fn set_rule_precedence(&mut self, rule: RuleId, precedence: u32) {
        self.rule_overrides.insert(rule, precedence);
    }

    /// The precedence and associativity of a terminal, if assigned
    pub fn of_symbol(&self, symbol: u32) -> Option<(u32, Associativity)> {
        self.terminals.get(&symbol).copied()
    }

    /// The precedence of a rule: the explicit override if set, otherwise the precedence
    /// of the rightmost terminal in the rule body
    pub fn of_rule(&self, grammar: &Grammar, rule: RuleId) -> Option<u32> {
        if let Some(&precedence) = self.rule_overrides.get(&rule) {
            return Some(precedence);
        }
        grammar
            .rule(rule)
            .items
            .iter()
            .rev()
            .find_map(|item| match item {
                Item::Terminal(symbol) => self.terminals.get(symbol).map(|&(level, _)| level),
                _ => None,
            })
    }
}

/// Resolves shift/reduce conflicts using operator precedence: higher precedence wins;
/// equal precedence resolves by the symbol's associativity (left → reduce, right → shift,
/// nonassociative → neither, turning the input into a runtime error). Reduce/reduce
/// conflicts are never resolved by precedence.
#[derive(Clone, Debug)]
pub struct PrecedenceRewriter {
    table: PrecedenceTable,
}

impl PrecedenceRewriter {
    pub fn new(table: PrecedenceTable) -> Self {
        PrecedenceRewriter { table }
    }

    pub fn table(&self) -> &PrecedenceTable {
        &self.table
    }
}

impl ActionRewriter for PrecedenceRewriter {
    fn rewrite(&self, grammar: &Grammar, tables: &mut ParserTables) {
        for state in 0..tables.state_count() {
            let actions = &mut tables.terminal_actions[state];

            let mut remove: Vec<Action> = Vec::new();
            let mut index = 0;
            while index < actions.len() {
                let symbol = actions[index].symbol;
                let cell_end = actions[index..]
                    .iter()
                    .position(|action| action.symbol != symbol)
                    .map(|len| index + len)
                    .unwrap_or(actions.len());
                let cell = &actions[index..cell_end];

                let shift = cell.iter().find(|a| a.kind == ActionKind::Shift).copied();
                let reduces: Vec<Action> = cell
                    .iter()
                    .filter(|a| a.kind == ActionKind::Reduce)
                    .copied()
                    .collect();

                // Precedence only ever arbitrates a plain shift/reduce pair
                if let (Some(shift), [reduce]) = (shift, reduces.as_slice()) {
                    if let Some((symbol_prec, associativity)) = self.table.of_symbol(symbol) {
                        if let Some(rule_prec) = self.table.of_rule(grammar, reduce.next) {
                            if rule_prec > symbol_prec {
                                remove.push(shift);
                            } else if rule_prec < symbol_prec {
                                remove.push(*reduce);
                            } else {
                                match associativity {
                                    Associativity::Left => remove.push(shift),
                                    Associativity::Right => remove.push(*reduce),
                                    // Sequences like `a < b < c` are errors: drop both
                                    // actions so the runtime rejects the input
                                    Associativity::Nonassoc => {
                                        remove.push(shift);
                                        remove.push(*reduce);
                                    }
                                }
                            }
                        }
                    }
                }
                index = cell_end;
            }

            actions.retain(|action| !remove.contains(action));
        }
    }
}

/// Extends the tables for weak terminals: wherever a state shifts a strong terminal and
/// has no action for its weak counterpart, the weak terminal borrows the shift; wherever a
/// state acts on the weak terminal only, the strong terminal borrows the action (as a
/// [WeakReduce](ActionKind::WeakReduce) when it is a reduction). Every other state gets a
/// [Divert](ActionKind::Divert) entry on the weak terminal, so demotion to the strong
/// equivalent is decided by the `(state, symbol)` cell like any other dispatch. The
/// `(weak, strong)` pairs are also recorded in the tables for the binary output.
#[derive(Clone, Debug)]
pub struct WeakSymbolRewriter {
    pairs: Vec<(u32, u32)>,
}

impl WeakSymbolRewriter {
    /// Creates a rewriter from `(weak, strong)` terminal pairs, typically those reported
    /// by [Lexer::weak_to_strong](crate::lexer::Lexer::weak_to_strong)
    pub fn new(pairs: Vec<(u32, u32)>) -> Self {
        WeakSymbolRewriter { pairs }
    }
}

impl ActionRewriter for WeakSymbolRewriter {
    fn rewrite(&self, _grammar: &Grammar, tables: &mut ParserTables) {
        for state in 0..tables.state_count() {
            for &(weak, strong) in &self.pairs {
                let weak_action = tables.terminal_actions[state]
                    .iter()
                    .find(|a| a.symbol == weak && a.kind != ActionKind::Guard)
                    .copied();
                let strong_action = tables.terminal_actions[state]
                    .iter()
                    .find(|a| a.symbol == strong && a.kind != ActionKind::Guard)
                    .copied();

                match (weak_action, strong_action) {
                    (None, Some(action)) if action.kind == ActionKind::Shift => {
                        tables.terminal_actions[state]
                            .push(Action::new(weak, ActionKind::Shift, action.next));
                    }
                    (Some(action), None) => match action.kind {
                        ActionKind::Shift => {
                            tables.terminal_actions[state]
                                .push(Action::new(strong, ActionKind::Shift, action.next));
                        }
                        ActionKind::Reduce => {
                            tables.terminal_actions[state].push(Action::new(
                                strong,
                                ActionKind::WeakReduce,
                                action.next,
                            ));
                        }
                        _ => {}
                    },
                    // No shift to borrow: a Divert entry demotes the weak terminal
                    // in this state
                    (None, _) => {
                        tables.terminal_actions[state].push(Action::new(
                            weak,
                            ActionKind::Divert,
                            strong as usize,
                        ));
                    }
                    _ => {}
                }
            }
        }

        for &pair in &self.pairs {
            if !tables.weak_to_strong.contains(&pair) {
                tables.weak_to_strong.push(pair);
            }
        }
        tables.weak_to_strong.sort_unstable();
    }
}

/// Installs the [Guard](ActionKind::Guard) actions: for every terminal in a guard's
/// INITIAL set, each state that can accept the guard gets a guard action pointing at the
/// sub-parser's initial state, tried before whatever ordinary action the terminal has.
/// The states that can accept a guard are those with a goto on its defining nonterminal
/// (that is how a matched guard advances), except the sub-parser's own initial state,
/// whose goto is the accept path. Guards whose INITIAL sets intersect in one state clash
/// unless both are `can_clash`; clashing guards with equal priority are a conflict either
/// way.
#[derive(Clone, Debug, Default)]
pub struct GuardRewriter;

impl GuardRewriter {
    pub fn new() -> Self {
        GuardRewriter
    }
}

impl ActionRewriter for GuardRewriter {
    fn rewrite(&self, grammar: &Grammar, tables: &mut ParserTables) {
        let guards = tables.guards.clone();
        let mut conflicts: Vec<Conflict> = Vec::new();

        for state in 0..tables.state_count() {
            for guard in &guards {
                let guarded_nt = tables.rules[guard.rule].nonterminal;
                if state == guard.initial_state || tables.goto(state, guarded_nt).is_none() {
                    continue;
                }

                for item in grammar.initial_of_guard(guard.rule) {
                    let Item::Terminal(symbol) = item else { continue };
                    let new_action = Action::new(symbol, ActionKind::Guard, guard.initial_state);
                    if tables.terminal_actions[state].contains(&new_action) {
                        continue;
                    }

                    // Another guard already claimed this lookahead symbol here?
                    let existing = tables.terminal_actions[state]
                        .iter()
                        .find(|a| a.symbol == symbol && a.kind == ActionKind::Guard)
                        .copied();
                    if let Some(existing) = existing {
                        let other = tables
                            .guard_by_initial_state(existing.next)
                            .expect("guard actions always reference a known guard");
                        let kind = if !grammar.can_clash(guard.rule)
                            || !grammar.can_clash(other.rule)
                        {
                            Some(ConflictKind::GuardClash)
                        } else if other.priority == guard.priority {
                            Some(ConflictKind::GuardPriority)
                        } else {
                            None
                        };
                        if let Some(kind) = kind {
                            conflicts.push(Conflict {
                                state,
                                symbol,
                                kind,
                                first: existing,
                                second: new_action,
                            });
                            continue;
                        }
                    }

                    tables.terminal_actions[state].push(new_action);
                }
            }
        }

        tables.conflicts.extend(conflicts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::ConsoleSink;
    use crate::grammar::TerminalDictionary;
    use crate::lr::builder::{build_parser, resolve_conflicts, BuilderOptions};

    /// E -> E '+' E | 'id', ambiguous without precedence
    fn ambiguous_expression() -> (Grammar, TerminalDictionary, u32) {
        let mut terminals = TerminalDictionary::new();
        let plus = terminals.add_named("+");
        let id = terminals.add_named("id");
        let mut grammar = Grammar::new();
        let e = grammar.add_nonterminal("E");
        grammar.add_rule(
            e,
            vec![
                Item::Nonterminal(e),
                Item::Terminal(plus),
                Item::Nonterminal(e),
            ],
        );
        grammar.add_rule(e, vec![Item::Terminal(id)]);
        grammar.add_start(e);
        (grammar, terminals, plus)
    }

    /// The state holding both a shift and a reduce on the given symbol
    fn conflict_state(tables: &ParserTables, symbol: u32) -> usize {
        (0..tables.state_count())
            .find(|&state| {
                let cell = &tables.terminal_actions[state];
                cell.iter()
                    .any(|a| a.symbol == symbol && a.kind == ActionKind::Shift)
                    && cell
                        .iter()
                        .any(|a| a.symbol == symbol && a.kind == ActionKind::Reduce)
            })
            .expect("the ambiguous grammar has a shift/reduce state")
    }

    #[test]
    fn left_associativity_prefers_reduce() {
        let (mut grammar, mut terminals, plus) = ambiguous_expression();
        let mut tables = build_parser(&mut grammar, &mut terminals);
        let state = conflict_state(&tables, plus);

        let mut precedence = PrecedenceTable::new();
        precedence.add_level(Associativity::Left, &[plus]);
        apply_rewriters(
            &[&PrecedenceRewriter::new(precedence) as &dyn ActionRewriter],
            &grammar,
            &mut tables,
        );

        let cell: Vec<ActionKind> = tables.terminal_actions[state]
            .iter()
            .filter(|a| a.symbol == plus)
            .map(|a| a.kind)
            .collect();
        assert_eq!(cell, vec![ActionKind::Reduce]);

        let mut sink = ConsoleSink::new();
        assert!(resolve_conflicts(
            &mut tables,
            &grammar,
            &terminals,
            &mut sink,
            &BuilderOptions::default()
        ));
        assert!(sink.records().is_empty(), "{:?}", sink.records());
    }

    #[test]
    fn right_associativity_prefers_shift() {
        let (mut grammar, mut terminals, plus) = ambiguous_expression();
        let mut tables = build_parser(&mut grammar, &mut terminals);
        let state = conflict_state(&tables, plus);

        let mut precedence = PrecedenceTable::new();
        precedence.add_level(Associativity::Right, &[plus]);
        apply_rewriters(
            &[&PrecedenceRewriter::new(precedence) as &dyn ActionRewriter],
            &grammar,
            &mut tables,
        );

        let cell: Vec<ActionKind> = tables.terminal_actions[state]
            .iter()
            .filter(|a| a.symbol == plus)
            .map(|a| a.kind)
            .collect();
        assert_eq!(cell, vec![ActionKind::Shift]);
    }

    #[test]
    fn nonassoc_removes_both_actions() {
        let (mut grammar, mut terminals, plus) = ambiguous_expression();
        let mut tables = build_parser(&mut grammar, &mut terminals);
        let state = conflict_state(&tables, plus);

        let mut precedence = PrecedenceTable::new();
        precedence.add_level(Associativity::Nonassoc, &[plus]);
        apply_rewriters(
            &[&PrecedenceRewriter::new(precedence) as &dyn ActionRewriter],
            &grammar,
            &mut tables,
        );

        // `id + id + id` can no longer be parsed: the conflicted state has no action
        // at all on '+'
        assert!(tables.terminal_actions[state]
            .iter()
            .all(|a| a.symbol != plus));

        let mut sink = ConsoleSink::new();
        assert!(resolve_conflicts(
            &mut tables,
            &grammar,
            &terminals,
            &mut sink,
            &BuilderOptions::default()
        ));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn higher_rule_precedence_reduces() {
        // E -> E '*' E | E '+' E | 'id': on lookahead '+' after E '*' E, the rule with
        // '*' has higher precedence than '+', so it reduces
        let mut terminals = TerminalDictionary::new();
        let star = terminals.add_named("*");
        let plus = terminals.add_named("+");
        let id = terminals.add_named("id");
        let mut grammar = Grammar::new();
        let e = grammar.add_nonterminal("E");
        let mul_rule = grammar.add_rule(
            e,
            vec![
                Item::Nonterminal(e),
                Item::Terminal(star),
                Item::Nonterminal(e),
            ],
        );
        grammar.add_rule(
            e,
            vec![
                Item::Nonterminal(e),
                Item::Terminal(plus),
                Item::Nonterminal(e),
            ],
        );
        grammar.add_rule(e, vec![Item::Terminal(id)]);
        grammar.add_start(e);

        let mut tables = build_parser(&mut grammar, &mut terminals);
        let mut precedence = PrecedenceTable::new();
        precedence.add_level(Associativity::Left, &[plus]);
        precedence.add_level(Associativity::Left, &[star]);
        apply_rewriters(
            &[&PrecedenceRewriter::new(precedence.clone()) as &dyn ActionRewriter],
            &grammar,
            &mut tables,
        );
        assert_eq!(precedence.of_rule(&grammar, mul_rule), Some(2));

        let mut sink = ConsoleSink::new();
        assert!(resolve_conflicts(
            &mut tables,
            &grammar,
            &terminals,
            &mut sink,
            &BuilderOptions::default()
        ));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn weak_rewriter_borrows_strong_shifts() {
        // S -> 'id' 'id', with a weak keyword 'if' that the lexer can demote to 'id'
        let mut terminals = TerminalDictionary::new();
        let kw_if = terminals.add_named("if");
        let id = terminals.add_named("identifier");
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        grammar.add_rule(s, vec![Item::Terminal(id), Item::Terminal(id)]);
        grammar.add_start(s);

        let mut tables = build_parser(&mut grammar, &mut terminals);
        apply_rewriters(
            &[&WeakSymbolRewriter::new(vec![(kw_if, id)]) as &dyn ActionRewriter],
            &grammar,
            &mut tables,
        );

        // Every state that shifts the identifier now also shifts the weak keyword,
        // to the same target; every other state carries a Divert entry, so demotion
        // is decided by the cell like any other dispatch
        for state in 0..tables.state_count() {
            let strong = tables.terminal_actions[state]
                .iter()
                .find(|a| a.symbol == id && a.kind == ActionKind::Shift);
            let weak = tables.terminal_actions[state]
                .iter()
                .find(|a| a.symbol == kw_if)
                .expect("every state has an action on the weak terminal");
            match strong {
                Some(strong) => {
                    assert_eq!(weak.kind, ActionKind::Shift);
                    assert_eq!(weak.next, strong.next);
                }
                None => {
                    assert_eq!(weak.kind, ActionKind::Divert);
                    assert_eq!(weak.next, id as usize);
                }
            }
        }
        assert_eq!(tables.weak_to_strong, vec![(kw_if, id)]);
    }
}
