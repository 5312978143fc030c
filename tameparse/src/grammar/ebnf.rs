//! EBNF desugaring: every `X?`, `X*`, `X+`, group and inline alternation is replaced by a
//! fresh nonterminal with equivalent plain rules, so the LALR builder only sees terminals,
//! nonterminals, guards and ε.
//!
//! The fresh nonterminals are named after the construct they replace (`(expr)*`,
//! `('+'|'-')`, ...), and a construct appearing twice reuses the nonterminal minted for its
//! first occurrence. Together with the encounter-order id assignment this makes the rewrite
//! deterministic: compiling the same definition twice produces identical grammars, which
//! the binary output relies on.
//!
//! Repetition expands left-recursively (`N → N X | ε` rather than `N → X N | ε`) so the
//! parse stack stays bounded while a long list is consumed.

use crate::grammar::{Grammar, Item, TerminalDictionary};

impl Grammar {
    /// Rewrites every rule of this grammar so that no EBNF sugar remains. The terminal
    /// dictionary is only used to render names for the fresh nonterminals.
    pub fn rewrite_ebnf(&mut self, terminals: &TerminalDictionary) {
        // Rules added by the rewrite itself are built from already-rewritten items,
        // so only the rules that exist now need processing
        let original_rules = self.rules().len();
        for rule_id in 0..original_rules {
            if !self.rule(rule_id).items.iter().any(Item::is_sugar) {
                continue;
            }
            let items = std::mem::take(&mut self.rules[rule_id].items);
            let rewritten = self.rewrite_items(items, terminals);
            self.rules[rule_id].items = rewritten;
        }
        self.invalidate_caches();
    }

    fn rewrite_items(&mut self, items: Vec<Item>, terminals: &TerminalDictionary) -> Vec<Item> {
        items
            .into_iter()
            .map(|item| self.rewrite_item(item, terminals))
            .collect()
    }

    fn rewrite_item(&mut self, item: Item, terminals: &TerminalDictionary) -> Item {
        match item {
            Item::Optional(inner) => {
                let inner = self.rewrite_item(*inner, terminals);
                let name = format!("({})?", self.describe(&inner, terminals));
                if let Some(existing) = self.nonterminal_id(&name) {
                    return Item::Nonterminal(existing);
                }
                let nt = self.add_nonterminal(&name);
                self.add_rule(nt, vec![inner]);
                self.add_rule(nt, vec![]);
                Item::Nonterminal(nt)
            }
            Item::Repeat0(inner) => {
                let inner = self.rewrite_item(*inner, terminals);
                let name = format!("({})*", self.describe(&inner, terminals));
                if let Some(existing) = self.nonterminal_id(&name) {
                    return Item::Nonterminal(existing);
                }
                let nt = self.add_nonterminal(&name);
                self.add_rule(nt, vec![Item::Nonterminal(nt), inner]);
                self.add_rule(nt, vec![]);
                Item::Nonterminal(nt)
            }
            Item::Repeat1(inner) => {
                let inner = self.rewrite_item(*inner, terminals);
                let name = format!("({})+", self.describe(&inner, terminals));
                if let Some(existing) = self.nonterminal_id(&name) {
                    return Item::Nonterminal(existing);
                }
                let nt = self.add_nonterminal(&name);
                self.add_rule(nt, vec![Item::Nonterminal(nt), inner.clone()]);
                self.add_rule(nt, vec![inner]);
                Item::Nonterminal(nt)
            }
            Item::Alternative(branches) => {
                let branches: Vec<Vec<Item>> = branches
                    .into_iter()
                    .map(|branch| self.rewrite_items(branch, terminals))
                    .collect();
                let rendered: Vec<String> = branches
                    .iter()
                    .map(|branch| self.describe_sequence(branch, terminals))
                    .collect();
                let name = format!("({})", rendered.join("|"));
                if let Some(existing) = self.nonterminal_id(&name) {
                    return Item::Nonterminal(existing);
                }
                let nt = self.add_nonterminal(&name);
                for branch in branches {
                    self.add_rule(nt, branch);
                }
                Item::Nonterminal(nt)
            }
            Item::Parenthesised(items) => {
                let items = self.rewrite_items(items, terminals);
                let name = format!("({})", self.describe_sequence(&items, terminals));
                if let Some(existing) = self.nonterminal_id(&name) {
                    return Item::Nonterminal(existing);
                }
                let nt = self.add_nonterminal(&name);
                self.add_rule(nt, items);
                Item::Nonterminal(nt)
            }
            plain => plain,
        }
    }

    /// Renders an item for use in generated nonterminal names and diagnostics
    pub fn describe(&self, item: &Item, terminals: &TerminalDictionary) -> String {
        match item {
            Item::Terminal(t) => terminals
                .name_of(*t)
                .map(str::to_string)
                .unwrap_or_else(|| format!("'{t}'")),
            Item::Nonterminal(nt) => self
                .name_of(*nt)
                .map(str::to_string)
                .unwrap_or_else(|| format!("<{nt}>")),
            Item::Empty => "ε".to_string(),
            Item::EndOfInput => "$".to_string(),
            Item::EndOfGuard => "%".to_string(),
            Item::Guard { rule, .. } => format!("[=> guard#{rule}]"),
            Item::Optional(inner) => format!("({})?", self.describe(inner, terminals)),
            Item::Repeat0(inner) => format!("({})*", self.describe(inner, terminals)),
            Item::Repeat1(inner) => format!("({})+", self.describe(inner, terminals)),
            Item::Alternative(branches) => {
                let rendered: Vec<String> = branches
                    .iter()
                    .map(|branch| self.describe_sequence(branch, terminals))
                    .collect();
                format!("({})", rendered.join("|"))
            }
            Item::Parenthesised(items) => {
                format!("({})", self.describe_sequence(items, terminals))
            }
        }
    }

    /// Renders a sequence of items, space separated
    pub fn describe_sequence(&self, items: &[Item], terminals: &TerminalDictionary) -> String {
        let rendered: Vec<String> = items
            .iter()
            .map(|item| self.describe(item, terminals))
            .collect();
        rendered.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ItemSet;

    fn terminals() -> TerminalDictionary {
        let mut dict = TerminalDictionary::new();
        dict.add_named("x");
        dict.add_named("y");
        dict
    }

    #[test]
    fn optional_expands_to_two_rules() {
        let terminals = terminals();
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        grammar.add_rule(s, vec![Item::Optional(Box::new(Item::Terminal(0)))]);
        grammar.rewrite_ebnf(&terminals);

        let fresh = grammar.nonterminal_id("(x)?").unwrap();
        assert_eq!(grammar.rule(0).items, vec![Item::Nonterminal(fresh)]);
        let bodies: Vec<_> = grammar
            .rules_for(fresh)
            .iter()
            .map(|&id| grammar.rule(id).items.clone())
            .collect();
        assert_eq!(bodies, vec![vec![Item::Terminal(0)], vec![]]);
    }

    #[test]
    fn repetition_is_left_recursive() {
        let terminals = terminals();
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        grammar.add_rule(s, vec![Item::Repeat0(Box::new(Item::Terminal(0)))]);
        grammar.rewrite_ebnf(&terminals);

        let fresh = grammar.nonterminal_id("(x)*").unwrap();
        let bodies: Vec<_> = grammar
            .rules_for(fresh)
            .iter()
            .map(|&id| grammar.rule(id).items.clone())
            .collect();
        assert_eq!(
            bodies,
            vec![
                vec![Item::Nonterminal(fresh), Item::Terminal(0)],
                vec![]
            ]
        );
        // The rewritten grammar derives ε, x, xx, ... with a nullable fresh nonterminal
        assert!(grammar.first(fresh).contains(&Item::Empty));
    }

    #[test]
    fn repeated_constructs_share_a_nonterminal() {
        let terminals = terminals();
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        let t = grammar.add_nonterminal("T");
        grammar.add_rule(s, vec![Item::Repeat1(Box::new(Item::Terminal(1)))]);
        grammar.add_rule(t, vec![Item::Repeat1(Box::new(Item::Terminal(1)))]);
        let nonterminals_before = grammar.nonterminal_count();
        grammar.rewrite_ebnf(&terminals);

        // One fresh nonterminal serves both occurrences of (y)+
        assert_eq!(grammar.nonterminal_count(), nonterminals_before + 1);
        assert_eq!(grammar.rule(0).items, grammar.rule(1).items);
    }

    #[test]
    fn alternation_expands_each_branch() {
        let terminals = terminals();
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        grammar.add_rule(
            s,
            vec![Item::Alternative(vec![
                vec![Item::Terminal(0)],
                vec![Item::Terminal(1), Item::Terminal(0)],
            ])],
        );
        grammar.rewrite_ebnf(&terminals);

        let fresh = grammar.nonterminal_id("(x|y x)").unwrap();
        assert_eq!(grammar.rules_for(fresh).len(), 2);
        assert_eq!(
            grammar.first(fresh),
            ItemSet::from([Item::Terminal(0), Item::Terminal(1)])
        );
    }

    #[test]
    fn rewriting_twice_is_stable() {
        let terminals = terminals();
        let mut grammar = Grammar::new();
        let s = grammar.add_nonterminal("S");
        grammar.add_rule(
            s,
            vec![
                Item::Repeat0(Box::new(Item::Terminal(0))),
                Item::Optional(Box::new(Item::Terminal(1))),
            ],
        );
        grammar.rewrite_ebnf(&terminals);
        let rules: Vec<_> = grammar.rules().to_vec();
        grammar.rewrite_ebnf(&terminals);
        assert_eq!(grammar.rules(), rules.as_slice());
    }
}
