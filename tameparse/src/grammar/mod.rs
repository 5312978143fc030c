//! # Grammar model
//! A context-free grammar over the terminals of a [TerminalDictionary]. Rules and guard
//! predicates live in a grammar-owned arena and reference each other by dense integer ids,
//! which keeps the inherently cyclic structure (guards contain rules which contain guards)
//! in plain owned data.
//!
//! Rule bodies are sequences of [Item]s. Before [EBNF rewriting](Grammar::rewrite_ebnf) a
//! body may contain the sugar variants (`X?`, `X*`, `X+`, grouping and alternation); the
//! rewrite replaces each sugar item by a fresh nonterminal with equivalent plain rules, so
//! the LALR builder only ever sees terminals, nonterminals and guards.
//!
//! FIRST and FOLLOW sets are computed as least fixed points and cached; any mutation of the
//! grammar invalidates the caches. Once table construction starts the grammar is no longer
//! mutated and the caches stay warm.

pub mod ebnf;
mod sets;
mod terminals;

pub use terminals::TerminalDictionary;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a rule within its grammar's arena
pub type RuleId = usize;
/// Identifier of a nonterminal
pub type NonterminalId = u32;
/// An ordered set of grammar items, used for FIRST/FOLLOW sets and lookaheads
pub type ItemSet = BTreeSet<Item>;

/// One element of a rule body.
///
/// The `Optional`, `Repeat0`, `Repeat1`, `Alternative` and `Parenthesised` variants are
/// EBNF sugar and only appear before [Grammar::rewrite_ebnf]; everything downstream of the
/// rewrite works with the first six variants only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Item {
    /// A terminal symbol from the terminal dictionary
    Terminal(u32),
    /// A nonterminal
    Nonterminal(NonterminalId),
    /// The empty string; appears in FIRST sets to mark nullability, never in rule bodies
    Empty,
    /// The end of the input stream
    EndOfInput,
    /// The end of a guard's lookahead; only appears in guard sub-parser rules
    EndOfGuard,
    /// A context-free lookahead predicate: the input ahead must match the referenced rule.
    /// Higher priority wins when several guards in one state can match.
    Guard { rule: RuleId, priority: i32 },
    /// `X?` (sugar)
    Optional(Box<Item>),
    /// `X*` (sugar)
    Repeat0(Box<Item>),
    /// `X+` (sugar)
    Repeat1(Box<Item>),
    /// `(α | β | …)` (sugar)
    Alternative(Vec<Vec<Item>>),
    /// `(α)` (sugar)
    Parenthesised(Vec<Item>),
}

impl Item {
    /// Checks whether this item is EBNF sugar that must be removed by the rewrite before
    /// table construction
    pub fn is_sugar(&self) -> bool {
        matches!(
            self,
            Item::Optional(_)
                | Item::Repeat0(_)
                | Item::Repeat1(_)
                | Item::Alternative(_)
                | Item::Parenthesised(_)
        )
    }

    /// Checks whether this item matches the given terminal symbol
    pub fn matches(&self, symbol: u32) -> bool {
        matches!(self, Item::Terminal(s) if *s == symbol)
    }
}

/// A production rule: a nonterminal and the ordered items it expands to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub nonterminal: NonterminalId,
    pub items: Vec<Item>,
    pub id: RuleId,
}

/// A context-free grammar: an arena of rules, rule lists per nonterminal, the
/// nonterminal name map and the FIRST/FOLLOW caches
#[derive(Debug, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
    rules_for: BTreeMap<NonterminalId, Vec<RuleId>>,
    names: BTreeMap<String, NonterminalId>,
    names_by_id: BTreeMap<NonterminalId, String>,
    next_nonterminal: NonterminalId,
    starts: Vec<NonterminalId>,
    can_clash: BTreeSet<RuleId>,
    pub(crate) first_cache: RefCell<Option<BTreeMap<NonterminalId, ItemSet>>>,
    pub(crate) follow_cache: RefCell<Option<BTreeMap<NonterminalId, ItemSet>>>,
}

impl Clone for Grammar {
    fn clone(&self) -> Self {
        Grammar {
            rules: self.rules.clone(),
            rules_for: self.rules_for.clone(),
            names: self.names.clone(),
            names_by_id: self.names_by_id.clone(),
            next_nonterminal: self.next_nonterminal,
            starts: self.starts.clone(),
            can_clash: self.can_clash.clone(),
            first_cache: RefCell::new(None),
            follow_cache: RefCell::new(None),
        }
    }
}

impl Grammar {
    pub fn new() -> Self {
        Grammar::default()
    }

    /// Adds a nonterminal with the given name, or returns the existing id if the name is
    /// already defined
    pub fn add_nonterminal(&mut self, name: &str) -> NonterminalId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = self.next_nonterminal;
        self.next_nonterminal += 1;
        self.names.insert(name.to_string(), id);
        self.names_by_id.insert(id, name.to_string());
        id
    }

    /// The id of a nonterminal, if the name is defined
    pub fn nonterminal_id(&self, name: &str) -> Option<NonterminalId> {
        self.names.get(name).copied()
    }

    /// The name of a nonterminal
    pub fn name_of(&self, nonterminal: NonterminalId) -> Option<&str> {
        self.names_by_id.get(&nonterminal).map(String::as_str)
    }

    /// The number of nonterminals defined so far
    pub fn nonterminal_count(&self) -> usize {
        self.next_nonterminal as usize
    }

    /// Adds a rule for the given nonterminal. Rule ids are dense and stable: the first
    /// rule added gets id 0, and ids never change afterwards.
    pub fn add_rule(&mut self, nonterminal: NonterminalId, items: Vec<Item>) -> RuleId {
        let id = self.rules.len();
        self.rules.push(Rule {
            nonterminal,
            items,
            id,
        });
        self.rules_for.entry(nonterminal).or_default().push(id);
        self.invalidate_caches();
        id
    }

    /// Defines a guard predicate: a fresh nonterminal with a single rule matching `items`,
    /// returned as a [Item::Guard] that can be placed in other rule bodies
    pub fn add_guard(&mut self, items: Vec<Item>, priority: i32) -> Item {
        let name = format!("guard#{}", self.rules.len());
        let nonterminal = self.add_nonterminal(&name);
        let rule = self.add_rule(nonterminal, items);
        Item::Guard { rule, priority }
    }

    /// Allows the guard defined by the given rule to share lookahead symbols with other
    /// guards in the same state without raising a clash error
    pub fn set_can_clash(&mut self, rule: RuleId) {
        self.can_clash.insert(rule);
    }

    /// Checks whether the guard defined by the given rule is marked `can_clash`
    pub fn can_clash(&self, rule: RuleId) -> bool {
        self.can_clash.contains(&rule)
    }

    /// The rule with the specified id
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    /// All rules, in id order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The ids of the rules defining the given nonterminal
    pub fn rules_for(&self, nonterminal: NonterminalId) -> &[RuleId] {
        self.rules_for
            .get(&nonterminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Marks a nonterminal as a start symbol. `EndOfInput` is added to the FOLLOW set of
    /// every start nonterminal.
    pub fn add_start(&mut self, nonterminal: NonterminalId) {
        if !self.starts.contains(&nonterminal) {
            self.starts.push(nonterminal);
            self.invalidate_caches();
        }
    }

    /// The start nonterminals, in the order they were added
    pub fn starts(&self) -> &[NonterminalId] {
        &self.starts
    }

    pub(crate) fn invalidate_caches(&mut self) {
        *self.first_cache.borrow_mut() = None;
        *self.follow_cache.borrow_mut() = None;
    }
}
