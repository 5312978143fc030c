//! # Binary table encoder
//! Serialises a compiled language into the offset-table file format consumed by the
//! language-neutral runtime. The unit of the format is a 32-bit word; every offset is a
//! word offset from the start of the file, and the file is written in the byte order
//! chosen at generation time (the runtime detects the order from the format word and
//! rejects mismatched files).
//!
//! File layout:
//!
//! * **Header** (16 words): format indicator `0x54506172`, format version `0x100`, string
//!   id of the language name, generator version word (`major<<16 | minor<<8 | revision`),
//!   string id of the generator version string, and 11 reserved words (`0xffffffff`).
//! * **Offset table** (16 words at word 16): strings, symbol map, lexer state machine,
//!   lexer accepting states, terminal actions, nonterminal actions, guard ending states,
//!   rule symbol counts, weak-to-strong, rule definitions, terminal names, nonterminal
//!   names, and 4 reserved slots. Each table is preceded by a format-indicator marker
//!   word (so a reader can tell when an offset is wrong); the stored offsets point past
//!   the marker.
//! * Per-state tables (lexer transitions, terminal/nonterminal actions) are an array of
//!   `state_count + 1` word offsets followed by the concatenated entries, so a state's
//!   entry count is the difference of adjacent offsets. Action entries are two words,
//!   `(kind<<24) | next` then `symbol`; lexer entries are one word, `(atom<<16) | next`,
//!   with `0xffff` denoting rejection. The symbol map is `(lo, hi, atom)` range triples.
//! * **Strings** are written last: a count, per-string word offsets, then each string as
//!   a length prefix (in UTF-16 code units) followed by two units per word, first unit in
//!   the high half.
//!
//! The end-of-input and end-of-guard terminals are the dictionary entries named `$` and
//! `%`; they appear in the terminal-names table like any other terminal.

use crate::output::{CompiledLanguage, OutputStage, VERSION, VERSION_STRING};
use std::collections::HashMap;

/// Format indicator word (`TPar`)
pub const FORMAT_INDICATOR: u32 = 0x5450_6172;
/// Current format version
pub const FORMAT_VERSION: u32 = 0x100;
/// "No value" filler word
pub const NO_VALUE: u32 = 0xffff_ffff;

/// Offset-table slots, in file order
pub mod table {
    pub const STRINGS: usize = 0;
    pub const SYMBOL_MAP: usize = 1;
    pub const LEXER: usize = 2;
    pub const LEXER_ACCEPTING: usize = 3;
    pub const TERMINAL_ACTIONS: usize = 4;
    pub const NONTERMINAL_ACTIONS: usize = 5;
    pub const GUARD_ENDINGS: usize = 6;
    pub const RULE_SYMBOL_COUNTS: usize = 7;
    pub const WEAK_TO_STRONG: usize = 8;
    pub const RULE_DEFINITIONS: usize = 9;
    pub const TERMINAL_NAMES: usize = 10;
    pub const NONTERMINAL_NAMES: usize = 11;
    pub const COUNT: usize = 16;
}

/// Byte order of an emitted file
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Options for the binary back-end
#[derive(Clone, Debug)]
pub struct BinaryOptions {
    pub endianness: Endianness,
    pub language_name: String,
}

impl Default for BinaryOptions {
    fn default() -> Self {
        BinaryOptions {
            endianness: Endianness::Little,
            language_name: String::new(),
        }
    }
}

/// The binary back-end: an [OutputStage] that accumulates the table file in memory
pub struct BinaryWriter {
    options: BinaryOptions,
    buffer: Vec<u8>,
    strings: Vec<String>,
    string_ids: HashMap<String, u32>,
}

impl BinaryWriter {
    pub fn new(options: BinaryOptions) -> Self {
        BinaryWriter {
            options,
            buffer: Vec::new(),
            strings: Vec::new(),
            string_ids: HashMap::new(),
        }
    }

    /// Serialises a compiled language in one call
    pub fn write(options: BinaryOptions, language: &CompiledLanguage<'_>) -> Vec<u8> {
        let mut writer = BinaryWriter::new(options);
        crate::output::emit(&mut writer, language);
        writer.finish()
    }

    /// The finished file image
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    /// The current position, in words
    fn word_pos(&self) -> u32 {
        (self.buffer.len() / 4) as u32
    }

    fn write_word(&mut self, value: u32) {
        let bytes = match self.options.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        self.buffer.extend_from_slice(&bytes);
    }

    fn patch_word(&mut self, word_offset: u32, value: u32) {
        let at = word_offset as usize * 4;
        let bytes = match self.options.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        self.buffer[at..at + 4].copy_from_slice(&bytes);
    }

    /// Interns a string, returning its id in the string table
    fn get_string(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(value) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.string_ids.insert(value.to_string(), id);
        id
    }

    /// Writes the marker word for the table in the given offset slot and patches the
    /// slot to point past it
    fn start_table(&mut self, slot: usize) {
        self.write_word(FORMAT_INDICATOR);
        let pos = self.word_pos();
        self.patch_word(16 + slot as u32, pos);
    }

    /// Writes a per-state offset array (`count + 1` entries) for states whose entry
    /// sizes in words are given, returning nothing; entries follow separately
    fn write_state_offsets(&mut self, entry_words: &[u32]) {
        let mut offset = self.word_pos() + entry_words.len() as u32 + 1;
        for &words in entry_words {
            self.write_word(offset);
            offset += words;
        }
        self.write_word(offset);
    }
}

impl OutputStage for BinaryWriter {
    fn emit_header(&mut self, _language: &CompiledLanguage<'_>) {
        let name_id = self.get_string(&self.options.language_name.clone());
        let version_id = self.get_string(VERSION_STRING);

        self.write_word(FORMAT_INDICATOR);
        self.write_word(FORMAT_VERSION);
        self.write_word(name_id);
        self.write_word((VERSION.0 << 16) | (VERSION.1 << 8) | VERSION.2);
        self.write_word(version_id);
        for _ in 0..11 {
            self.write_word(NO_VALUE);
        }

        // Blank offset table, patched as each table is written
        for slot in 0..table::COUNT {
            let reserved = slot >= table::NONTERMINAL_NAMES + 1;
            self.write_word(if reserved { NO_VALUE } else { 0 });
        }
    }

    fn emit_lexer(&mut self, language: &CompiledLanguage<'_>) {
        let lexer = language.lexer;

        // Symbol map: the translator's (lo, hi, atom) triples in ascending range order
        self.start_table(table::SYMBOL_MAP);
        let entries = lexer.translator().entries();
        self.write_word(entries.len() as u32);
        for &(range, atom) in entries {
            self.write_word(range.lo);
            self.write_word(range.hi);
            self.write_word(atom as u32);
        }

        // Transition rows, sparse: only populated cells are written
        self.start_table(table::LEXER);
        let rows: Vec<Vec<(usize, i32)>> = (0..lexer.state_count())
            .map(|state| {
                lexer
                    .row(state)
                    .iter()
                    .enumerate()
                    .filter(|&(_, &target)| target >= 0)
                    .map(|(atom, &target)| (atom, target))
                    .collect()
            })
            .collect();
        let sizes: Vec<u32> = rows.iter().map(|row| row.len() as u32).collect();
        self.write_state_offsets(&sizes);
        for row in &rows {
            for &(atom, target) in row {
                debug_assert!(atom <= 0xffff && target <= 0xfffe);
                self.write_word(((atom as u32) << 16) | (target as u32 & 0xffff));
            }
        }

        // Accepting states column
        self.start_table(table::LEXER_ACCEPTING);
        for state in 0..lexer.state_count() {
            match lexer.accept(state) {
                Some(action) => self.write_word(action.symbol),
                None => self.write_word(NO_VALUE),
            }
        }
    }

    fn emit_parser(&mut self, language: &CompiledLanguage<'_>) {
        let tables = language.tables;

        self.start_table(table::TERMINAL_ACTIONS);
        let sizes: Vec<u32> = tables
            .terminal_actions
            .iter()
            .map(|actions| actions.len() as u32 * 2)
            .collect();
        self.write_state_offsets(&sizes);
        for actions in &tables.terminal_actions {
            for action in actions {
                self.write_word(((action.kind.code() as u32) << 24) | action.next as u32);
                self.write_word(action.symbol);
            }
        }

        self.start_table(table::NONTERMINAL_ACTIONS);
        let sizes: Vec<u32> = tables
            .nonterminal_actions
            .iter()
            .map(|actions| actions.len() as u32 * 2)
            .collect();
        self.write_state_offsets(&sizes);
        for actions in &tables.nonterminal_actions {
            for action in actions {
                self.write_word(((action.kind.code() as u32) << 24) | action.next as u32);
                self.write_word(action.symbol);
            }
        }

        self.start_table(table::GUARD_ENDINGS);
        self.write_word(tables.guards.len() as u32);
        for guard in &tables.guards {
            self.write_word(guard.symbol);
            self.write_word(guard.initial_state as u32);
            self.write_word(guard.ending_state as u32);
        }

        self.start_table(table::RULE_SYMBOL_COUNTS);
        self.write_word(tables.rules.len() as u32);
        for rule in &tables.rules {
            debug_assert!(rule.nonterminal <= 0xffff && rule.len <= 0xffff);
            self.write_word((rule.nonterminal << 16) | rule.len as u32);
        }

        self.start_table(table::WEAK_TO_STRONG);
        self.write_word(tables.weak_to_strong.len() as u32);
        for &(weak, strong) in &tables.weak_to_strong {
            self.write_word((weak << 16) | strong);
        }

        // Rule definitions: terminals as positive ids, nonterminals as -1 - id
        self.start_table(table::RULE_DEFINITIONS);
        let grammar = language.grammar;
        self.write_word(grammar.rules().len() as u32);
        {
            let mut offset =
                self.word_pos() + grammar.rules().len() as u32 + 1;
            for rule in grammar.rules() {
                self.write_word(offset);
                offset += 2 + rule.items.len() as u32;
            }
            self.write_word(offset);
        }
        for rule in grammar.rules() {
            self.write_word(rule.nonterminal);
            self.write_word(rule.items.len() as u32);
            for item in &rule.items {
                use crate::grammar::Item;
                let encoded: i32 = match item {
                    Item::Terminal(symbol) => *symbol as i32,
                    Item::Nonterminal(nt) => -1 - *nt as i32,
                    // A guard is reported as its defining nonterminal
                    Item::Guard { rule, .. } => -1 - grammar.rule(*rule).nonterminal as i32,
                    _ => -1,
                };
                self.write_word(encoded as u32);
            }
        }

        self.start_table(table::TERMINAL_NAMES);
        let terminals = language.terminals;
        self.write_word(terminals.count() as u32);
        let name_ids: Vec<u32> = terminals
            .iter()
            .map(|(id, _)| match terminals.name_of(id) {
                Some(name) => name.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .iter()
            .map(|name| {
                if name.is_empty() {
                    NO_VALUE
                } else {
                    self.get_string(name)
                }
            })
            .collect();
        for id in name_ids {
            self.write_word(id);
        }

        self.start_table(table::NONTERMINAL_NAMES);
        self.write_word(grammar.nonterminal_count() as u32);
        let nt_ids: Vec<u32> = (0..grammar.nonterminal_count() as u32)
            .map(|nt| grammar.name_of(nt).unwrap_or_default().to_string())
            .collect::<Vec<_>>()
            .iter()
            .map(|name| self.get_string(name))
            .collect();
        for id in nt_ids {
            self.write_word(id);
        }
    }

    fn emit_strings(&mut self, _language: &CompiledLanguage<'_>) {
        self.start_table(table::STRINGS);
        let strings = self.strings.clone();
        self.write_word(strings.len() as u32);

        let mut offset = self.word_pos() + strings.len() as u32;
        for string in &strings {
            self.write_word(offset);
            let units = string.encode_utf16().count() as u32;
            offset += 1 + (units + 1) / 2;
        }
        for string in &strings {
            let units: Vec<u16> = string.encode_utf16().collect();
            self.write_word(units.len() as u32);
            for pair in units.chunks(2) {
                let first = pair[0] as u32;
                let second = pair.get(1).copied().unwrap_or(0) as u32;
                self.write_word((first << 16) | second);
            }
        }
    }
}
