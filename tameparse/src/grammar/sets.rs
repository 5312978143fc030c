//! FIRST/FOLLOW computation: least fixed points over the rule arena, cached on the
//! grammar and invalidated by any mutation.

use crate::grammar::{Grammar, Item, ItemSet, NonterminalId, RuleId};
use std::collections::{BTreeMap, BTreeSet};

type SetMap = BTreeMap<NonterminalId, ItemSet>;

impl Grammar {
    /// The FIRST set of a nonterminal: every item that can begin one of its derivations.
    /// Contains [Item::Empty] iff the nonterminal is nullable.
    pub fn first(&self, nonterminal: NonterminalId) -> ItemSet {
        self.ensure_first();
        self.first_cache
            .borrow()
            .as_ref()
            .expect("first cache was just computed")
            .get(&nonterminal)
            .cloned()
            .unwrap_or_default()
    }

    /// The FIRST set of an arbitrary item sequence, with ε propagated through nullable
    /// prefixes
    pub fn first_of_sequence(&self, items: &[Item]) -> ItemSet {
        self.ensure_first();
        let cache = self.first_cache.borrow();
        first_of_seq(items, cache.as_ref().expect("first cache was just computed"))
    }

    /// The FIRST set of a rule's body
    pub fn first_for_rule(&self, rule: RuleId) -> ItemSet {
        let items = self.rule(rule).items.clone();
        self.first_of_sequence(&items)
    }

    /// The FOLLOW set of a nonterminal. Never contains [Item::Empty]; contains
    /// [Item::EndOfInput] for every start nonterminal.
    pub fn follow(&self, nonterminal: NonterminalId) -> ItemSet {
        self.ensure_follow();
        self.follow_cache
            .borrow()
            .as_ref()
            .expect("follow cache was just computed")
            .get(&nonterminal)
            .cloned()
            .unwrap_or_default()
    }

    /// The INITIAL set of a guard: the symbols that can begin a lookahead matching the
    /// guard's rule. Unlike FIRST (which is the guard item itself), INITIAL expands the
    /// guard's rule, recursively flattening any nested guards.
    pub fn initial_of_guard(&self, rule: RuleId) -> ItemSet {
        let mut result = self.first_for_rule(rule);
        let mut seen: BTreeSet<RuleId> = BTreeSet::from([rule]);
        let mut pending: Vec<RuleId> = result
            .iter()
            .filter_map(|item| match item {
                Item::Guard { rule, .. } => Some(*rule),
                _ => None,
            })
            .collect();

        while let Some(guard_rule) = pending.pop() {
            if !seen.insert(guard_rule) {
                continue;
            }
            for item in self.first_for_rule(guard_rule) {
                if let Item::Guard { rule, .. } = item {
                    pending.push(rule);
                }
                result.insert(item);
            }
        }
        result
    }

    fn ensure_first(&self) {
        if self.first_cache.borrow().is_some() {
            return;
        }
        let computed = self.compute_first();
        *self.first_cache.borrow_mut() = Some(computed);
    }

    fn ensure_follow(&self) {
        if self.follow_cache.borrow().is_some() {
            return;
        }
        self.ensure_first();
        let computed = {
            let first = self.first_cache.borrow();
            self.compute_follow(first.as_ref().expect("first cache was just computed"))
        };
        *self.follow_cache.borrow_mut() = Some(computed);
    }

    fn compute_first(&self) -> SetMap {
        let mut sets: SetMap = (0..self.next_nonterminal)
            .map(|nt| (nt, ItemSet::new()))
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for rule in &self.rules {
                let first = first_of_seq(&rule.items, &sets);
                let target = sets.entry(rule.nonterminal).or_default();
                for item in first {
                    if target.insert(item) {
                        changed = true;
                    }
                }
            }
        }
        sets
    }

    fn compute_follow(&self, first: &SetMap) -> SetMap {
        let mut sets: SetMap = (0..self.next_nonterminal)
            .map(|nt| (nt, ItemSet::new()))
            .collect();
        for &start in &self.starts {
            sets.entry(start).or_default().insert(Item::EndOfInput);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for rule in &self.rules {
                for (idx, item) in rule.items.iter().enumerate() {
                    let Item::Nonterminal(nt) = item else { continue };

                    let beta = &rule.items[idx + 1..];
                    let mut beta_first = first_of_seq(beta, first);
                    let nullable = beta_first.remove(&Item::Empty);

                    let target = sets.entry(*nt).or_default();
                    for follow_item in beta_first {
                        if target.insert(follow_item) {
                            changed = true;
                        }
                    }

                    if nullable {
                        // β can vanish, so whatever follows the rule's nonterminal
                        // follows this one too
                        let inherited = sets
                            .get(&rule.nonterminal)
                            .cloned()
                            .unwrap_or_default();
                        let target = sets.entry(*nt).or_default();
                        for follow_item in inherited {
                            if target.insert(follow_item) {
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
        sets
    }
}

fn first_of_item(item: &Item, sets: &SetMap) -> ItemSet {
    match item {
        Item::Terminal(_) | Item::EndOfInput | Item::EndOfGuard | Item::Empty => {
            ItemSet::from([item.clone()])
        }
        // FIRST of a guard is the guard item itself; INITIAL expands it
        Item::Guard { .. } => ItemSet::from([item.clone()]),
        Item::Nonterminal(nt) => sets.get(nt).cloned().unwrap_or_default(),
        Item::Optional(inner) | Item::Repeat0(inner) => {
            let mut first = first_of_item(inner, sets);
            first.insert(Item::Empty);
            first
        }
        Item::Repeat1(inner) => first_of_item(inner, sets),
        Item::Alternative(branches) => {
            let mut first = ItemSet::new();
            for branch in branches {
                first.extend(first_of_seq(branch, sets));
            }
            first
        }
        Item::Parenthesised(items) => first_of_seq(items, sets),
    }
}

fn first_of_seq(items: &[Item], sets: &SetMap) -> ItemSet {
    let mut result = ItemSet::new();
    for item in items {
        let mut first = first_of_item(item, sets);
        let nullable = first.remove(&Item::Empty);
        result.extend(first);
        if !nullable {
            return result;
        }
    }
    // Every prefix item was nullable (or the sequence is empty)
    result.insert(Item::Empty);
    result
}
