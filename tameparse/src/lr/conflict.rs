//! Conflict records: when two actions compete for the same `(state, symbol)` cell, the
//! builder keeps both and records a conflict. The precedence rewriter may resolve
//! shift/reduce conflicts; whatever survives the pipeline is reported through the
//! diagnostic sink with both actions and their source rules.

use crate::diag::{Diagnostic, Severity};
use crate::grammar::{Grammar, TerminalDictionary};
use crate::lr::action::{Action, ActionKind};

/// The species of a parser conflict
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
    /// Two guards in one state share a lookahead symbol without both being `can_clash`
    GuardClash,
    /// Two clashing guards have equal priority, so no winner can be picked
    GuardPriority,
}

/// A conflict between two actions in one state on one symbol
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub state: usize,
    pub symbol: u32,
    pub kind: ConflictKind,
    pub first: Action,
    pub second: Action,
}

impl Conflict {
    pub(crate) fn classify(first: Action, second: Action, state: usize, symbol: u32) -> Self {
        let kind = match (first.kind, second.kind) {
            (ActionKind::Reduce, ActionKind::Reduce) => ConflictKind::ReduceReduce,
            _ => ConflictKind::ShiftReduce,
        };
        Conflict {
            state,
            symbol,
            kind,
            first,
            second,
        }
    }

    fn describe_action(
        action: &Action,
        grammar: &Grammar,
        terminals: &TerminalDictionary,
    ) -> String {
        match action.kind {
            ActionKind::Shift => format!("shift to state {}", action.next),
            ActionKind::Reduce | ActionKind::WeakReduce => {
                let rule = grammar.rule(action.next);
                format!(
                    "reduce {} → {} (rule {})",
                    grammar.name_of(rule.nonterminal).unwrap_or("?"),
                    grammar.describe_sequence(&rule.items, terminals),
                    action.next
                )
            }
            ActionKind::Guard => format!("guard check from state {}", action.next),
            ActionKind::Accept => "accept".to_string(),
            ActionKind::Goto => format!("goto state {}", action.next),
            ActionKind::Divert => format!("divert to symbol {}", action.next),
        }
    }

    /// Renders this conflict as a diagnostic at the given severity
    pub fn to_diagnostic(
        &self,
        severity: Severity,
        grammar: &Grammar,
        terminals: &TerminalDictionary,
    ) -> Diagnostic {
        let symbol = terminals
            .name_of(self.symbol)
            .map(str::to_string)
            .unwrap_or_else(|| format!("symbol {}", self.symbol));
        let (code, noun) = match self.kind {
            ConflictKind::ShiftReduce => ("CONFLICT_SHIFT_REDUCE", "shift/reduce conflict"),
            ConflictKind::ReduceReduce => ("CONFLICT_REDUCE_REDUCE", "reduce/reduce conflict"),
            ConflictKind::GuardClash => ("CONFLICT_GUARD_CLASH", "guard clash"),
            ConflictKind::GuardPriority => ("CONFLICT_GUARD_PRIORITY", "guard priority tie"),
        };
        Diagnostic::new(
            severity,
            code,
            format!(
                "{noun} in state {} on {symbol}: {} vs {}",
                self.state,
                Self::describe_action(&self.first, grammar, terminals),
                Self::describe_action(&self.second, grammar, terminals),
            ),
        )
    }
}
