//! # LALR(1) table construction
//! Builds a deterministic bottom-up parser from a [Grammar](crate::grammar::Grammar), in
//! three phases (see [builder::build_parser]):
//!
//! 1. the canonical LR(0) collection, with states interned by kernel and ids assigned in
//!    BFS discovery order from the start states,
//! 2. efficient LALR(1) lookahead computation (the Knuth–DeRemer scheme: spontaneous
//!    lookaheads are generated by a closure over a marker lookahead, propagation links are
//!    iterated to a fixed point), and
//! 3. action assembly: shifts from terminal-labelled transitions, reduces from completed
//!    items and their lookahead sets, gotos from nonterminal-labelled transitions, accepts
//!    for the augmented start rules.
//!
//! The assembled [ParserTables](action::ParserTables) then pass through the
//! [rewriter pipeline](rewrite): operator precedence resolves shift/reduce conflicts, weak
//! terminals borrow their strong equivalent's actions (or get a `Divert` entry where there
//! is nothing to borrow), and the guards get their lookahead-predicate actions. Whatever
//! conflicts survive the pipeline are reported through the diagnostic sink.
//!
//! Everything here iterates sets in ascending id order, so a given grammar always
//! produces the same tables, byte for byte.

pub mod action;
pub mod builder;
pub mod conflict;
pub mod rewrite;

pub use action::{Action, ActionKind, GuardInfo, ParserTables, ReduceRule};
pub use builder::{build_parser, resolve_conflicts, BuilderOptions};
pub use conflict::{Conflict, ConflictKind};
pub use rewrite::{
    apply_rewriters, ActionRewriter, Associativity, GuardRewriter, PrecedenceRewriter,
    PrecedenceTable, WeakSymbolRewriter,
};

use crate::grammar::{ItemSet, RuleId};
use std::collections::{BTreeMap, HashMap};

/// An LR(0) item: a rule and a dot position within its body
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lr0Item {
    pub rule: RuleId,
    pub dot: usize,
}

impl Lr0Item {
    pub fn new(rule: RuleId, dot: usize) -> Self {
        Lr0Item { rule, dot }
    }

    /// The same item with the dot advanced one position
    pub fn advanced(self) -> Self {
        Lr0Item {
            rule: self.rule,
            dot: self.dot + 1,
        }
    }
}

/// A state of the LALR machine: an ordered kernel of LR(0) items plus the (mutable while
/// building) lookahead set of each kernel item. The closure is derived on demand and never
/// stored.
#[derive(Clone, Debug)]
pub struct LalrState {
    kernel: Vec<Lr0Item>,
    lookaheads: Vec<ItemSet>,
}

impl LalrState {
    /// The kernel items, sorted
    pub fn kernel(&self) -> &[Lr0Item] {
        &self.kernel
    }

    /// The lookahead set of the kernel item at the given index
    pub fn lookahead(&self, kernel_index: usize) -> &ItemSet {
        &self.lookaheads[kernel_index]
    }

    /// The index of an item within the kernel, if it is a kernel item
    pub fn find(&self, item: Lr0Item) -> Option<usize> {
        self.kernel.binary_search(&item).ok()
    }
}

/// The LALR state machine: states interned by kernel, plus the transition relation.
/// Two states are equal iff their kernels are equal as sets of LR(0) items.
#[derive(Clone, Debug, Default)]
pub struct LalrMachine {
    states: Vec<LalrState>,
    ids: HashMap<Vec<Lr0Item>, usize>,
    transitions: Vec<BTreeMap<crate::grammar::Item, usize>>,
}

impl LalrMachine {
    pub fn new() -> Self {
        LalrMachine::default()
    }

    /// Adds a state with the given kernel, or returns the id of the existing state with an
    /// equal kernel. The boolean is true if the state is new.
    pub fn add_state(&mut self, mut kernel: Vec<Lr0Item>) -> (usize, bool) {
        kernel.sort_unstable();
        kernel.dedup();
        if let Some(&id) = self.ids.get(&kernel) {
            return (id, false);
        }
        let id = self.states.len();
        self.ids.insert(kernel.clone(), id);
        let lookaheads = vec![ItemSet::new(); kernel.len()];
        self.states.push(LalrState { kernel, lookaheads });
        self.transitions.push(BTreeMap::new());
        (id, true)
    }

    /// Adds a transition from `state` on `item` to `target`
    pub fn add_transition(&mut self, state: usize, item: crate::grammar::Item, target: usize) {
        self.transitions[state].insert(item, target);
    }

    /// The transition relation of a state, keyed by the item shifted over
    pub fn transitions(&self, state: usize) -> &BTreeMap<crate::grammar::Item, usize> {
        &self.transitions[state]
    }

    /// The number of states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The state with the given id
    pub fn state(&self, id: usize) -> &LalrState {
        &self.states[id]
    }

    /// Adds lookahead items to a kernel item, returning whether anything was new.
    /// The ε item is never stored in a lookahead set.
    pub fn add_lookahead(&mut self, state: usize, kernel_index: usize, items: &ItemSet) -> bool {
        let target = &mut self.states[state].lookaheads[kernel_index];
        let mut changed = false;
        for item in items {
            if matches!(item, crate::grammar::Item::Empty) {
                continue;
            }
            if target.insert(item.clone()) {
                changed = true;
            }
        }
        changed
    }
}
