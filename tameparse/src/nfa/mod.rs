//! # Nondeterministic finite automaton
//! The [Ndfa] is the mutable intermediate representation every lexer is built through:
//! regular expressions are compiled into NDFA fragments, the fragments for all the tokens of a
//! language are merged under a single initial state, and the result is made deterministic in two
//! steps:
//!
//! 1. [`Ndfa::to_ndfa_with_unique_symbols`] partitions the (overlapping) symbol sets used by the
//!    transitions into disjoint [atoms](crate::symbols::Partition) and rewrites every transition
//!    into one transition per atom, and
//! 2. [`Ndfa::to_dfa`] runs the subset construction, producing a dense [Dfa](crate::dfa::Dfa)
//!    transition table.
//!
//! States are kept in an arena and referred to by dense `usize` ids; transitions store target
//! ids, never references, so fragments can be wired up freely while the automaton grows.
//! Unlike the automata of a typical regex engine, a state may carry any number of
//! [accept actions](AcceptAction), which is what makes a single NDFA able to describe the whole
//! token set of a language, and an accept action may be *eager*, which stops the scanner from
//! looking for a longer match.

use crate::dfa::Dfa;
use crate::symbols::{Partition, SymbolSet};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// An accepting action attached to an NDFA or DFA state: the symbol the lexer reports when
/// this state matches, and whether the match is eager (terminate immediately) or greedy
/// (keep scanning for a longer match).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AcceptAction {
    pub symbol: u32,
    pub eager: bool,
}

impl AcceptAction {
    /// Creates a standard (greedy) accept action for the specified symbol
    pub fn new(symbol: u32) -> Self {
        AcceptAction { symbol, eager: false }
    }

    /// Creates an eager accept action for the specified symbol
    pub fn eager(symbol: u32) -> Self {
        AcceptAction { symbol, eager: true }
    }
}

#[derive(Clone, Debug, Default)]
struct NdfaState {
    /// `(set index, target state)` pairs in insertion order
    transitions: Vec<(usize, usize)>,
    epsilon: Vec<usize>,
}

/// A nondeterministic finite automaton over symbol sets.
///
/// Transitions are keyed by the original [SymbolSet] supplied at construction time
/// (deduplicated structurally); partitioning into disjoint atoms is deferred until
/// compilation. State 0 always exists and is the conventional initial state.
#[derive(Clone, Debug, Default)]
pub struct Ndfa {
    states: Vec<NdfaState>,
    /// Deduplicated transition sets; transitions store indexes into this table
    sets: Vec<SymbolSet>,
    set_ids: HashMap<SymbolSet, usize>,
    accepts: BTreeMap<usize, Vec<AcceptAction>>,
}

impl Ndfa {
    /// Creates a new NDFA containing only the initial state 0
    pub fn new() -> Self {
        Ndfa {
            states: vec![NdfaState::default()],
            ..Ndfa::default()
        }
    }

    /// Adds a new state with no transitions and returns its id
    pub fn add_state(&mut self) -> usize {
        self.states.push(NdfaState::default());
        self.states.len() - 1
    }

    /// The number of states in this automaton
    pub fn count_states(&self) -> usize {
        self.states.len()
    }

    /// The deduplicated transition sets of this automaton, indexed by set id
    pub fn sets(&self) -> &[SymbolSet] {
        &self.sets
    }

    fn set_id(&mut self, set: SymbolSet) -> usize {
        if let Some(&id) = self.set_ids.get(&set) {
            return id;
        }
        let id = self.sets.len();
        self.sets.push(set.clone());
        self.set_ids.insert(set, id);
        id
    }

    /// Adds a transition on the given symbol set. Empty sets are ignored.
    pub fn add_transition(&mut self, from: usize, set: SymbolSet, to: usize) {
        debug_assert!(from < self.states.len() && to < self.states.len());
        if set.is_empty() {
            return;
        }
        let set = self.set_id(set);
        self.states[from].transitions.push((set, to));
    }

    /// Adds an ε transition
    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        debug_assert!(from < self.states.len() && to < self.states.len());
        self.states[from].epsilon.push(to);
    }

    /// Marks the given state as accepting with the supplied action. A state may carry
    /// several actions; conflicts are resolved when the lexer is compiled.
    pub fn mark_accept(&mut self, state: usize, action: AcceptAction) {
        self.accepts.entry(state).or_default().push(action);
    }

    /// The accept actions attached to the given state
    pub fn accept_actions(&self, state: usize) -> &[AcceptAction] {
        self.accepts.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `(set id, target)` transitions of the given state
    pub fn transitions(&self, state: usize) -> &[(usize, usize)] {
        &self.states[state].transitions
    }

    /// The ε targets of the given state
    pub fn epsilon_transitions(&self, state: usize) -> &[usize] {
        &self.states[state].epsilon
    }

    /// Computes the ε-closure of a set of states
    pub fn epsilon_closure(&self, states: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut closure: BTreeSet<usize> = BTreeSet::new();
        let mut pending: Vec<usize> = Vec::new();
        for state in states {
            if closure.insert(state) {
                pending.push(state);
            }
        }
        while let Some(state) = pending.pop() {
            for &target in &self.states[state].epsilon {
                if closure.insert(target) {
                    pending.push(target);
                }
            }
        }
        closure
    }

    /// Creates an equivalent NDFA whose transition sets are pairwise disjoint: the sets of
    /// this automaton are partitioned into atoms and every transition is rewritten into one
    /// transition per member atom. In the returned automaton the set id of a transition *is*
    /// the atom id of the returned partition.
    pub fn to_ndfa_with_unique_symbols(&self) -> (Ndfa, Partition) {
        let partition = Partition::new(&self.sets);

        let mut remapped = Ndfa {
            states: Vec::with_capacity(self.states.len()),
            sets: partition.atoms().to_vec(),
            set_ids: partition
                .atoms()
                .iter()
                .enumerate()
                .map(|(id, set)| (set.clone(), id))
                .collect(),
            accepts: self.accepts.clone(),
        };

        for state in &self.states {
            let mut transitions = Vec::new();
            for &(set, target) in &state.transitions {
                for &atom in partition.members(set) {
                    transitions.push((atom, target));
                }
            }
            remapped.states.push(NdfaState {
                transitions,
                epsilon: state.epsilon.clone(),
            });
        }

        (remapped, partition)
    }

    /// Runs the subset construction, producing a DFA with one dense transition row per
    /// distinct reachable subset of NDFA states.
    ///
    /// This automaton must already have unique symbols (see
    /// [`Ndfa::to_ndfa_with_unique_symbols`]): set ids are treated as atom ids. The supplied
    /// initial states become DFA states `0..k-1` in order (duplicates share the first id).
    /// ε-closure is computed once per subset, and the accept actions of every member state
    /// are merged into the resulting DFA state.
    pub fn to_dfa(&self, initial_states: &[usize]) -> Dfa {
        let atom_count = self.sets.len();

        let mut subset_ids: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut dfa_initial: Vec<usize> = Vec::with_capacity(initial_states.len());
        let mut rows: Vec<Vec<i32>> = Vec::new();
        let mut accepts: Vec<Vec<AcceptAction>> = Vec::new();
        let mut queue: VecDeque<(usize, Vec<usize>)> = VecDeque::new();

        let mut intern = |subset: Vec<usize>,
                          rows: &mut Vec<Vec<i32>>,
                          accepts: &mut Vec<Vec<AcceptAction>>,
                          queue: &mut VecDeque<(usize, Vec<usize>)>| {
            if let Some(&id) = subset_ids.get(&subset) {
                return id;
            }
            let id = rows.len();
            rows.push(vec![-1; atom_count]);

            // Merge the accept actions of all member states, keeping definition order
            let mut merged: Vec<AcceptAction> = Vec::new();
            for &state in &subset {
                merged.extend_from_slice(self.accept_actions(state));
            }
            merged.sort();
            merged.dedup();
            accepts.push(merged);

            subset_ids.insert(subset.clone(), id);
            queue.push_back((id, subset));
            id
        };

        for &initial in initial_states {
            let closure: Vec<usize> = self.epsilon_closure([initial]).into_iter().collect();
            let id = intern(closure, &mut rows, &mut accepts, &mut queue);
            dfa_initial.push(id);
        }

        while let Some((id, subset)) = queue.pop_front() {
            // Group the targets reachable from this subset by atom
            let mut targets: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
            for &state in &subset {
                for &(atom, target) in &self.states[state].transitions {
                    targets.entry(atom).or_default().insert(target);
                }
            }

            for (atom, target_set) in targets {
                let closure: Vec<usize> =
                    self.epsilon_closure(target_set).into_iter().collect();
                let target = intern(closure, &mut rows, &mut accepts, &mut queue);
                rows[id][atom] = target as i32;
            }
        }

        Dfa::from_parts(atom_count, rows, accepts, dfa_initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_sets_are_deduplicated() {
        let mut ndfa = Ndfa::new();
        let a = ndfa.add_state();
        let b = ndfa.add_state();
        ndfa.add_transition(0, SymbolSet::single(97), a);
        ndfa.add_transition(a, SymbolSet::single(97), b);
        assert_eq!(ndfa.sets().len(), 1);
    }

    #[test]
    fn epsilon_closure_is_transitive() {
        let mut ndfa = Ndfa::new();
        let a = ndfa.add_state();
        let b = ndfa.add_state();
        let c = ndfa.add_state();
        ndfa.add_epsilon(0, a);
        ndfa.add_epsilon(a, b);
        ndfa.add_epsilon(b, c);
        let closure = ndfa.epsilon_closure([0]);
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), vec![0, a, b, c]);
    }

    #[test]
    fn subset_construction_merges_accepts() {
        // Two alternatives "a" and "a" with different symbols: the DFA state after 'a'
        // carries both accept actions
        let mut ndfa = Ndfa::new();
        let end1 = ndfa.add_state();
        let end2 = ndfa.add_state();
        ndfa.add_transition(0, SymbolSet::single(97), end1);
        ndfa.add_transition(0, SymbolSet::single(97), end2);
        ndfa.mark_accept(end1, AcceptAction::new(1));
        ndfa.mark_accept(end2, AcceptAction::new(2));

        let (unique, _) = ndfa.to_ndfa_with_unique_symbols();
        let dfa = unique.to_dfa(&[0]);
        assert_eq!(dfa.state_count(), 2);
        let after_a = dfa.next(0, 0).unwrap();
        assert_eq!(dfa.accept_actions(after_a).len(), 2);
    }

    #[test]
    fn overlapping_sets_become_disjoint_atoms() {
        let mut ndfa = Ndfa::new();
        let a = ndfa.add_state();
        let b = ndfa.add_state();
        // [a-z] and [m] overlap
        ndfa.add_transition(0, SymbolSet::range(97, 123), a);
        ndfa.add_transition(0, SymbolSet::single(109), b);

        let (unique, partition) = ndfa.to_ndfa_with_unique_symbols();
        // [a-z] minus 'm' shares one atom (same membership), 'm' gets its own
        assert_eq!(partition.atom_count(), 2);
        // The [a-z] transition is rewritten into one transition per member atom
        assert_eq!(unique.transitions(0).len(), 3);
    }
}
