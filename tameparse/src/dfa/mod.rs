//! # Deterministic finite automaton
//! The compiled form of an [Ndfa](crate::nfa::Ndfa): a dense `state_count × atom_count`
//! transition table where `-1` denotes rejection, plus the merged accept actions for each
//! state. Lexer states tend to be well-populated, so dense rows beat a sparse encoding here;
//! the binary table writer re-sparsifies rows on output where that pays off.
//!
//! A DFA on its own maps *atoms* to states; pairing it with the
//! [SymbolTranslator](crate::symbols::SymbolTranslator) of the partition it was built from
//! turns it into a scanner over real input symbols (see [Lexer](crate::lexer::Lexer)).

use crate::nfa::AcceptAction;

/// A compiled deterministic automaton with dense transition rows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dfa {
    atom_count: usize,
    /// Row-major `state_count × atom_count` table; `-1` rejects
    table: Vec<i32>,
    /// Accept actions per state, merged from the member NDFA states
    accepts: Vec<Vec<AcceptAction>>,
    /// Ids of the states the supplied initial NDFA states mapped to, in order
    initial_states: Vec<usize>,
}

impl Dfa {
    pub(crate) fn from_parts(
        atom_count: usize,
        rows: Vec<Vec<i32>>,
        accepts: Vec<Vec<AcceptAction>>,
        initial_states: Vec<usize>,
    ) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == atom_count));
        debug_assert_eq!(rows.len(), accepts.len());
        let table = rows.into_iter().flatten().collect();
        Dfa {
            atom_count,
            table,
            accepts,
            initial_states,
        }
    }

    /// The number of states in this DFA
    pub fn state_count(&self) -> usize {
        self.accepts.len()
    }

    /// The number of atoms (columns) in the transition table
    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// The state reached from `state` on `atom`, or `None` if the input is rejected
    pub fn next(&self, state: usize, atom: usize) -> Option<usize> {
        match self.table[state * self.atom_count + atom] {
            -1 => None,
            target => Some(target as usize),
        }
    }

    /// The dense transition row for the specified state
    pub fn row(&self, state: usize) -> &[i32] {
        &self.table[state * self.atom_count..(state + 1) * self.atom_count]
    }

    /// The accept actions attached to the specified state. If any of them is eager the
    /// state is an eager state.
    pub fn accept_actions(&self, state: usize) -> &[AcceptAction] {
        &self.accepts[state]
    }

    /// Checks whether the specified state carries an eager accept
    pub fn is_eager(&self, state: usize) -> bool {
        self.accepts[state].iter().any(|action| action.eager)
    }

    /// The DFA states the initial NDFA states were mapped to, in the order they were
    /// supplied to the subset construction
    pub fn initial_states(&self) -> &[usize] {
        &self.initial_states
    }
}
