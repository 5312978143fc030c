//! The LALR(1) builder: LR(0) collection, lookahead computation, action assembly and the
//! final conflict resolution.
//!
//! The builder augments the grammar it is given: every start nonterminal `S` gets a rule
//! `S' → S` (accepting on end-of-input), and every guard rule `g` gets a rule
//! `guard-accept#g → lhs(g) ⊣` whose pre-⊣ state is the guard sub-parser's *ending state*:
//! reaching it means the buffered lookahead matched the guard. The guard sub-parsers share
//! the main state machine; their initial states are created right after the start states,
//! so state ids stay in BFS discovery order and the whole construction is deterministic.

use crate::diag::DiagnosticSink;
use crate::diag::Severity;
use crate::grammar::{Grammar, Item, ItemSet, RuleId, TerminalDictionary};
use crate::lr::action::{Action, ActionKind, GuardInfo, ParserTables, ReduceRule};
use crate::lr::conflict::{Conflict, ConflictKind};
use crate::lr::{LalrMachine, Lr0Item};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Options controlling how conflicts are reported
#[derive(Copy, Clone, Debug, Default)]
pub struct BuilderOptions {
    /// Demote reduce/reduce conflicts to warnings (keeping the lowest-numbered rule)
    pub allow_reduce_conflicts: bool,
    /// Demote all remaining conflicts to warnings
    pub permit_conflicts: bool,
}

/// Builds the LALR(1) parser tables for the grammar's start nonterminals.
///
/// The grammar is augmented in place (start and guard-accept rules are added) and the
/// end-of-input and end-of-guard terminals are registered in the dictionary under the
/// names `$` and `%`. The returned tables may still contain conflicted cells: run the
/// rewriter pipeline and then [resolve_conflicts] before serialising them.
pub fn build_parser(grammar: &mut Grammar, terminals: &mut TerminalDictionary) -> ParserTables {
    let end_of_input = terminals.add_named("$");
    let end_of_guard = terminals.add_named("%");

    // Every distinct guard rule referenced anywhere in the grammar gets a sub-parser
    let mut guard_rules: BTreeMap<RuleId, i32> = BTreeMap::new();
    for rule in grammar.rules() {
        for item in &rule.items {
            if let Item::Guard { rule, priority } = item {
                guard_rules.entry(*rule).or_insert(*priority);
            }
        }
    }

    // Augment the start nonterminals
    let mut start_aug_rules: Vec<RuleId> = Vec::new();
    for start in grammar.starts().to_vec() {
        let base = grammar
            .name_of(start)
            .map(str::to_string)
            .unwrap_or_else(|| format!("nt{start}"));
        let aug_nt = grammar.add_nonterminal(&format!("{base}'"));
        start_aug_rules.push(grammar.add_rule(aug_nt, vec![Item::Nonterminal(start)]));
    }

    // Augment the guard rules with an end-of-guard marker
    let mut guard_info: Vec<(RuleId, i32, u32, RuleId)> = Vec::new();
    for (&guard_rule, &priority) in &guard_rules {
        guard_info.push((guard_rule, priority, 0, 0));
    }
    for entry in &mut guard_info {
        let guard_rule = entry.0;
        entry.2 = terminals.add_named(&format!("[=> guard#{guard_rule}]"));
        let guarded_nt = grammar.rule(guard_rule).nonterminal;
        let aug_nt = grammar.add_nonterminal(&format!("guard-accept#{guard_rule}"));
        entry.3 = grammar.add_rule(
            aug_nt,
            vec![Item::Nonterminal(guarded_nt), Item::EndOfGuard],
        );
    }

    // Phase 1: canonical LR(0) collection, states interned by kernel, BFS discovery order
    let mut machine = LalrMachine::new();
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut start_states: Vec<usize> = Vec::new();
    let mut guard_initial: Vec<usize> = Vec::new();

    for &rule in &start_aug_rules {
        let (id, new) = machine.add_state(vec![Lr0Item::new(rule, 0)]);
        if new {
            queue.push_back(id);
        }
        start_states.push(id);
    }
    for &(_, _, _, aug_rule) in &guard_info {
        let (id, new) = machine.add_state(vec![Lr0Item::new(aug_rule, 0)]);
        if new {
            queue.push_back(id);
        }
        guard_initial.push(id);
    }

    while let Some(id) = queue.pop_front() {
        let closure = lr0_closure(grammar, machine.state(id).kernel());

        let mut targets: BTreeMap<Item, Vec<Lr0Item>> = BTreeMap::new();
        for item in &closure {
            if let Some(next) = grammar.rule(item.rule).items.get(item.dot) {
                targets.entry(next.clone()).or_default().push(item.advanced());
            }
        }
        for (item, kernel) in targets {
            let (target, new) = machine.add_state(kernel);
            if new {
                queue.push_back(target);
            }
            machine.add_transition(id, item, target);
        }
    }

    // Phase 2: LALR(1) lookaheads. The augmented rules start with end-of-input; a closure
    // over the marker lookahead separates spontaneous lookaheads from propagation links.
    let eoi_set = ItemSet::from([Item::EndOfInput]);
    for &state in start_states.iter().chain(&guard_initial) {
        machine.add_lookahead(state, 0, &eoi_set);
    }

    let mut links: BTreeSet<((usize, usize), (usize, usize))> = BTreeSet::new();
    for state_id in 0..machine.state_count() {
        for kernel_index in 0..machine.state(state_id).kernel().len() {
            let kernel_item = machine.state(state_id).kernel()[kernel_index];
            let closure = lr1_closure(grammar, &[(kernel_item, None)]);

            for (item, lookahead) in closure {
                let Some(next) = grammar.rule(item.rule).items.get(item.dot) else {
                    continue;
                };
                let target = *machine
                    .transitions(state_id)
                    .get(next)
                    .expect("transition exists for every in-closure next item");
                let target_index = machine
                    .state(target)
                    .find(item.advanced())
                    .expect("advanced item is a kernel item of the GOTO state");
                match lookahead {
                    Some(symbol) => {
                        machine.add_lookahead(target, target_index, &ItemSet::from([symbol]));
                    }
                    None => {
                        links.insert(((state_id, kernel_index), (target, target_index)));
                    }
                }
            }
        }
    }

    let links: Vec<_> = links.into_iter().collect();
    let mut changed = true;
    while changed {
        changed = false;
        for &((from_state, from_index), (to_state, to_index)) in &links {
            let lookahead = machine.state(from_state).lookahead(from_index).clone();
            if machine.add_lookahead(to_state, to_index, &lookahead) {
                changed = true;
            }
        }
    }

    // Phase 3: action assembly
    let guard_symbols: BTreeMap<RuleId, u32> = guard_info
        .iter()
        .map(|&(rule, _, symbol, _)| (rule, symbol))
        .collect();
    let guard_aug_rules: BTreeSet<RuleId> =
        guard_info.iter().map(|&(_, _, _, aug)| aug).collect();
    let start_rule_set: BTreeSet<RuleId> = start_aug_rules.iter().copied().collect();

    let symbol_for = |item: &Item| -> Option<u32> {
        match item {
            Item::Terminal(t) => Some(*t),
            Item::EndOfInput => Some(end_of_input),
            Item::EndOfGuard => Some(end_of_guard),
            Item::Guard { rule, .. } => guard_symbols.get(rule).copied(),
            _ => None,
        }
    };

    let mut terminal_actions: Vec<Vec<Action>> = vec![Vec::new(); machine.state_count()];
    let mut nonterminal_actions: Vec<Vec<Action>> = vec![Vec::new(); machine.state_count()];

    for state_id in 0..machine.state_count() {
        for (item, &target) in machine.transitions(state_id) {
            match item {
                Item::Nonterminal(nt) => {
                    nonterminal_actions[state_id].push(Action::new(*nt, ActionKind::Goto, target));
                }
                Item::Guard { rule, .. } => {
                    // A matched guard advances over its item through the goto table,
                    // keyed by the guard's defining nonterminal; the terminal tables
                    // never carry the synthetic guard symbol
                    let guarded_nt = grammar.rule(*rule).nonterminal;
                    if nonterminal_actions[state_id]
                        .iter()
                        .all(|action| action.symbol != guarded_nt)
                    {
                        nonterminal_actions[state_id]
                            .push(Action::new(guarded_nt, ActionKind::Goto, target));
                    }
                }
                other => {
                    if let Some(symbol) = symbol_for(other) {
                        push_unique(
                            &mut terminal_actions[state_id],
                            Action::new(symbol, ActionKind::Shift, target),
                        );
                    }
                }
            }
        }

        // Reduce actions come from completed items; their lookaheads are derived by
        // closing the kernel items over their real lookahead sets
        let mut seed: Vec<(Lr0Item, Option<Item>)> = Vec::new();
        for (kernel_index, &kernel_item) in machine.state(state_id).kernel().iter().enumerate() {
            for lookahead in machine.state(state_id).lookahead(kernel_index) {
                seed.push((kernel_item, Some(lookahead.clone())));
            }
        }
        for (item, lookahead) in lr1_closure(grammar, &seed) {
            let rule = grammar.rule(item.rule);
            if item.dot < rule.items.len() || guard_aug_rules.contains(&item.rule) {
                continue;
            }
            let Some(symbol) = lookahead.as_ref().and_then(&symbol_for) else {
                continue;
            };
            let action = if start_rule_set.contains(&item.rule) {
                if symbol != end_of_input {
                    continue;
                }
                Action::new(end_of_input, ActionKind::Accept, 0)
            } else {
                Action::new(symbol, ActionKind::Reduce, item.rule)
            };
            push_unique(&mut terminal_actions[state_id], action);
        }
    }

    // Guard ending states: the state whose kernel holds `guard-accept#g → lhs(g) · ⊣`
    let guards: Vec<GuardInfo> = guard_info
        .iter()
        .enumerate()
        .map(|(index, &(rule, priority, symbol, aug_rule))| {
            let after_lhs = Lr0Item::new(aug_rule, 1);
            let ending_state = (0..machine.state_count())
                .find(|&state| machine.state(state).find(after_lhs).is_some())
                .expect("guard-accept rule always has a post-goto state");
            GuardInfo {
                rule,
                priority,
                symbol,
                initial_state: guard_initial[index],
                ending_state,
            }
        })
        .collect();

    let rules: Vec<ReduceRule> = grammar
        .rules()
        .iter()
        .map(|rule| ReduceRule {
            nonterminal: rule.nonterminal,
            len: rule.items.len(),
        })
        .collect();

    let mut tables = ParserTables {
        terminal_actions,
        nonterminal_actions,
        rules,
        guards,
        weak_to_strong: Vec::new(),
        end_of_input,
        end_of_guard,
        start_states,
        conflicts: Vec::new(),
    };
    sort_tables(&mut tables);
    tables
}

fn push_unique(actions: &mut Vec<Action>, action: Action) {
    if !actions.contains(&action) {
        actions.push(action);
    }
}

/// Sorts every state's action lists: by symbol, guard actions before ordinary ones
/// (highest priority first), then by kind and target for stability
pub(crate) fn sort_tables(tables: &mut ParserTables) {
    let guard_priority: BTreeMap<usize, i32> = tables
        .guards
        .iter()
        .map(|guard| (guard.initial_state, guard.priority))
        .collect();
    for actions in &mut tables.terminal_actions {
        actions.sort_by_key(|action| {
            let (guard_rank, priority) = if action.kind == ActionKind::Guard {
                (0, -guard_priority.get(&action.next).copied().unwrap_or(0))
            } else {
                (1, 0)
            };
            (action.symbol, guard_rank, priority, action.kind, action.next)
        });
    }
    for actions in &mut tables.nonterminal_actions {
        actions.sort();
    }
}

/// Enforces the one-action-per-symbol invariant, reporting whatever conflicts survived the
/// rewriter pipeline. Returns false if the sink asked to stop.
pub fn resolve_conflicts(
    tables: &mut ParserTables,
    grammar: &Grammar,
    terminals: &TerminalDictionary,
    sink: &mut dyn DiagnosticSink,
    options: &BuilderOptions,
) -> bool {
    // Guard clashes recorded by the rewriters
    for conflict in std::mem::take(&mut tables.conflicts) {
        let severity = if options.permit_conflicts {
            Severity::Warning
        } else {
            Severity::Error
        };
        if !sink.report(conflict.to_diagnostic(severity, grammar, terminals)) {
            return false;
        }
    }

    for state in 0..tables.state_count() {
        let actions = std::mem::take(&mut tables.terminal_actions[state]);
        let mut resolved: Vec<Action> = Vec::with_capacity(actions.len());

        let mut index = 0;
        while index < actions.len() {
            let symbol = actions[index].symbol;
            let mut cell: Vec<Action> = Vec::new();
            while index < actions.len() && actions[index].symbol == symbol {
                cell.push(actions[index]);
                index += 1;
            }

            // Guard actions coexist with one ordinary action: the runtime tries them in
            // order and falls through
            let (guards, mut ordinary): (Vec<Action>, Vec<Action>) = cell
                .into_iter()
                .partition(|action| action.kind == ActionKind::Guard);
            resolved.extend(guards);

            while ordinary.len() > 1 {
                let conflict = Conflict::classify(ordinary[0], ordinary[1], state, symbol);
                let severity = match conflict.kind {
                    ConflictKind::ReduceReduce if options.allow_reduce_conflicts => {
                        Severity::Warning
                    }
                    _ if options.permit_conflicts => Severity::Warning,
                    _ => Severity::Error,
                };
                if !sink.report(conflict.to_diagnostic(severity, grammar, terminals)) {
                    return false;
                }
                // Keep the shift for shift/reduce, the lowest-numbered rule otherwise
                let drop_index = match conflict.kind {
                    ConflictKind::ReduceReduce => {
                        if ordinary[0].next <= ordinary[1].next {
                            1
                        } else {
                            0
                        }
                    }
                    _ => {
                        if ordinary[0].kind == ActionKind::Reduce {
                            0
                        } else {
                            1
                        }
                    }
                };
                ordinary.remove(drop_index);
            }
            resolved.extend(ordinary);
        }

        tables.terminal_actions[state] = resolved;
    }
    true
}

fn lr0_closure(grammar: &Grammar, kernel: &[Lr0Item]) -> BTreeSet<Lr0Item> {
    let mut closure: BTreeSet<Lr0Item> = kernel.iter().copied().collect();
    let mut pending: Vec<Lr0Item> = closure.iter().copied().collect();
    while let Some(item) = pending.pop() {
        if let Some(Item::Nonterminal(nt)) = grammar.rule(item.rule).items.get(item.dot) {
            for &sub_rule in grammar.rules_for(*nt) {
                let sub_item = Lr0Item::new(sub_rule, 0);
                if closure.insert(sub_item) {
                    pending.push(sub_item);
                }
            }
        }
    }
    closure
}

/// LR(1) closure over `(item, lookahead)` pairs. `None` is the propagation marker `#`:
/// it stands for "whatever lookahead the seed kernel item turns out to have".
fn lr1_closure(
    grammar: &Grammar,
    seed: &[(Lr0Item, Option<Item>)],
) -> BTreeSet<(Lr0Item, Option<Item>)> {
    let mut closure: BTreeSet<(Lr0Item, Option<Item>)> = seed.iter().cloned().collect();
    let mut pending: Vec<(Lr0Item, Option<Item>)> = closure.iter().cloned().collect();

    while let Some((item, lookahead)) = pending.pop() {
        let rule = grammar.rule(item.rule);
        let Some(Item::Nonterminal(nt)) = rule.items.get(item.dot) else {
            continue;
        };

        let beta = &rule.items[item.dot + 1..];
        let mut first = grammar.first_of_sequence(beta);
        let nullable = first.remove(&Item::Empty);

        let mut lookaheads: Vec<Option<Item>> = first.into_iter().map(Some).collect();
        if nullable {
            lookaheads.push(lookahead.clone());
        }

        for &sub_rule in grammar.rules_for(*nt) {
            for new_lookahead in &lookaheads {
                let entry = (Lr0Item::new(sub_rule, 0), new_lookahead.clone());
                if closure.insert(entry.clone()) {
                    pending.push(entry);
                }
            }
        }
    }
    closure
}
