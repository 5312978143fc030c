//! Parser action tables: the per-state sorted action lists the runtime is driven by, plus
//! the side tables (reduce rule lengths, guard states, weak-terminal equivalences) that the
//! binary encoder serialises alongside them.

use crate::grammar::{NonterminalId, RuleId};

/// What an action entry instructs the runtime to do
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionKind {
    /// Push the lookahead and move to `next`
    Shift,
    /// Pop `len(rule)` entries and consult the goto table; `next` is the rule
    Reduce,
    /// As `Reduce`, but introduced for a weak terminal standing in for a strong one
    WeakReduce,
    /// Nonterminal transition after a reduction; `next` is the target state
    Goto,
    /// Run the guard sub-parser whose initial state is `next` against the lookahead;
    /// on success, take the goto on the guard's defining nonterminal without consuming
    /// any input
    Guard,
    /// Parsing finished successfully
    Accept,
    /// Replace the lookahead with the equivalent strong terminal `next`
    Divert,
}

impl ActionKind {
    /// The code this kind is stored under in the binary tables (`kind << 24`)
    pub fn code(self) -> u8 {
        match self {
            ActionKind::Shift => 0,
            ActionKind::Reduce => 1,
            ActionKind::WeakReduce => 2,
            ActionKind::Goto => 3,
            ActionKind::Guard => 4,
            ActionKind::Accept => 5,
            ActionKind::Divert => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ActionKind::Shift,
            1 => ActionKind::Reduce,
            2 => ActionKind::WeakReduce,
            3 => ActionKind::Goto,
            4 => ActionKind::Guard,
            5 => ActionKind::Accept,
            6 => ActionKind::Divert,
            _ => return None,
        })
    }
}

/// One entry of a state's action list
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Action {
    /// The terminal (or nonterminal, for gotos) this action applies to
    pub symbol: u32,
    pub kind: ActionKind,
    /// Target state, rule id or strong symbol, depending on the kind
    pub next: usize,
}

impl Action {
    pub fn new(symbol: u32, kind: ActionKind, next: usize) -> Self {
        Action { symbol, kind, next }
    }
}

/// Reduce metadata for one rule: the nonterminal to goto after reducing, and how many
/// stack entries the rule pops
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReduceRule {
    pub nonterminal: NonterminalId,
    pub len: usize,
}

/// A compiled guard: its defining rule, priority, the terminal id naming it, and the
/// states of its sub-parser
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GuardInfo {
    pub rule: RuleId,
    pub priority: i32,
    /// The terminal identifying this guard in diagnostics, the guards table and parse
    /// trees; never produced by the lexer
    pub symbol: u32,
    /// Initial state of the guard's sub-parser
    pub initial_state: usize,
    /// The sub-parser state whose entry means the guard has matched
    pub ending_state: usize,
}

/// The assembled parser tables: for each state a sorted list of terminal actions and a
/// sorted list of nonterminal (goto) actions, plus the side tables the runtime needs.
///
/// Straight out of [build_parser](crate::lr::builder::build_parser) a cell may still hold
/// several candidate actions for one symbol; the rewriter pipeline and the final conflict
/// resolution reduce every cell to a single action (guard actions excepted: a guard tries
/// its predicate and falls through to the action after it, so a symbol may carry several
/// guard entries followed by one ordinary action).
#[derive(Clone, Debug, Default)]
pub struct ParserTables {
    pub terminal_actions: Vec<Vec<Action>>,
    pub nonterminal_actions: Vec<Vec<Action>>,
    /// Reduce metadata, indexed by rule id
    pub rules: Vec<ReduceRule>,
    /// Compiled guards, in ascending guard-rule order
    pub guards: Vec<GuardInfo>,
    /// `(weak, strong)` pairs for runtime demotion of unexpected weak terminals
    pub weak_to_strong: Vec<(u32, u32)>,
    /// Terminal id reported at the end of the token stream
    pub end_of_input: u32,
    /// Terminal id marking the end of a guard's lookahead
    pub end_of_guard: u32,
    /// Initial state for each start nonterminal, in declaration order
    pub start_states: Vec<usize>,
    /// Conflicts recorded by the rewriters (guard clashes); shift/reduce and
    /// reduce/reduce conflicts are derived from the cells during final resolution
    pub conflicts: Vec<crate::lr::conflict::Conflict>,
}

impl ParserTables {
    /// The number of parser states
    pub fn state_count(&self) -> usize {
        self.terminal_actions.len()
    }

    /// The terminal actions of a state that apply to the given symbol, in trial order
    /// (guards first, highest priority first)
    pub fn actions_for(&self, state: usize, symbol: u32) -> impl Iterator<Item = &Action> {
        self.terminal_actions[state]
            .iter()
            .filter(move |action| action.symbol == symbol)
    }

    /// The goto target of a state on the given nonterminal
    pub fn goto(&self, state: usize, nonterminal: NonterminalId) -> Option<usize> {
        self.nonterminal_actions[state]
            .iter()
            .find(|action| action.kind == ActionKind::Goto && action.symbol == nonterminal)
            .map(|action| action.next)
    }

    /// The guard whose sub-parser starts at the given state
    pub fn guard_by_initial_state(&self, initial_state: usize) -> Option<&GuardInfo> {
        self.guards
            .iter()
            .find(|guard| guard.initial_state == initial_state)
    }

    /// The strong terminal an unexpected weak terminal can be demoted to
    pub fn strong_for(&self, weak: u32) -> Option<u32> {
        self.weak_to_strong
            .iter()
            .find(|(w, _)| *w == weak)
            .map(|&(_, strong)| strong)
    }
}
