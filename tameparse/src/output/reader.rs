//! # Binary table reader
//! A minimal reader over the [binary table format](crate::output::binary): it only ever
//! consults the offset table and the per-table layouts, which is exactly the access
//! pattern of the language-neutral runtime. Used here to verify that everything written
//! can be recovered byte for byte, and that files of either endianness are readable.

use crate::lr::{Action, ActionKind};
use crate::output::binary::{table, FORMAT_INDICATOR, FORMAT_VERSION, NO_VALUE};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableReadError {
    #[error("File too short to hold a table header")]
    TooShort,
    #[error("Bad format indicator {0:#x}")]
    BadFormat(u32),
    #[error("Unsupported format version {0:#x}")]
    BadVersion(u32),
    #[error("Table {0} has a corrupt offset (marker missing)")]
    BadTableMarker(usize),
    #[error("Unknown action kind {0}")]
    BadActionKind(u32),
}

/// A parsed view over a binary table file
#[derive(Clone, Copy, Debug)]
pub struct TableFile<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> TableFile<'a> {
    /// Opens a table file, detecting its byte order from the format word
    pub fn new(data: &'a [u8]) -> Result<Self, TableReadError> {
        if data.len() < 32 * 4 {
            return Err(TableReadError::TooShort);
        }
        let le = u32::from_le_bytes(data[0..4].try_into().expect("4 bytes"));
        let file = if le == FORMAT_INDICATOR {
            TableFile {
                data,
                big_endian: false,
            }
        } else {
            let be = u32::from_be_bytes(data[0..4].try_into().expect("4 bytes"));
            if be != FORMAT_INDICATOR {
                return Err(TableReadError::BadFormat(le));
            }
            TableFile {
                data,
                big_endian: true,
            }
        };
        let version = file.word(1);
        if version != FORMAT_VERSION {
            return Err(TableReadError::BadVersion(version));
        }
        Ok(file)
    }

    /// The word at the given word offset
    pub fn word(&self, offset: u32) -> u32 {
        let at = offset as usize * 4;
        let bytes: [u8; 4] = self.data[at..at + 4].try_into().expect("4 bytes");
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    /// The start of the table in the given offset slot, verifying its marker word
    pub fn table_start(&self, slot: usize) -> Result<u32, TableReadError> {
        let offset = self.word(16 + slot as u32);
        if offset == 0 || self.word(offset - 1) != FORMAT_INDICATOR {
            return Err(TableReadError::BadTableMarker(slot));
        }
        Ok(offset)
    }

    /// The string with the given id
    pub fn string(&self, id: u32) -> Result<String, TableReadError> {
        let start = self.table_start(table::STRINGS)?;
        let offset = self.word(start + 1 + id);
        let units = self.word(offset);
        let mut decoded: Vec<u16> = Vec::with_capacity(units as usize);
        for index in 0..units {
            let word = self.word(offset + 1 + index / 2);
            let unit = if index % 2 == 0 {
                (word >> 16) as u16
            } else {
                (word & 0xffff) as u16
            };
            decoded.push(unit);
        }
        Ok(String::from_utf16_lossy(&decoded))
    }

    /// The language name recorded in the header
    pub fn language_name(&self) -> Result<String, TableReadError> {
        self.string(self.word(2))
    }

    /// The generator version word from the header
    pub fn generator_version(&self) -> u32 {
        self.word(3)
    }

    /// The `(lo, hi, atom)` triples of the symbol map
    pub fn symbol_map(&self) -> Result<Vec<(u32, u32, u32)>, TableReadError> {
        let start = self.table_start(table::SYMBOL_MAP)?;
        let count = self.word(start);
        Ok((0..count)
            .map(|index| {
                let at = start + 1 + index * 3;
                (self.word(at), self.word(at + 1), self.word(at + 2))
            })
            .collect())
    }

    /// The atom for a codepoint, per the symbol map (`None` when outside every atom)
    pub fn atom_for(&self, codepoint: u32) -> Result<Option<u32>, TableReadError> {
        Ok(self
            .symbol_map()?
            .into_iter()
            .find(|&(lo, hi, _)| lo <= codepoint && codepoint < hi)
            .map(|(_, _, atom)| atom))
    }

    fn state_count(&self, slot: usize) -> Result<u32, TableReadError> {
        let start = self.table_start(slot)?;
        // offsets[0] points past the offset array itself
        Ok(self.word(start) - start - 1)
    }

    /// The number of lexer states
    pub fn lexer_state_count(&self) -> Result<u32, TableReadError> {
        self.state_count(table::LEXER)
    }

    /// The populated `(atom, target)` transitions of a lexer state
    pub fn lexer_transitions(&self, state: u32) -> Result<Vec<(u32, u32)>, TableReadError> {
        let start = self.table_start(table::LEXER)?;
        let from = self.word(start + state);
        let to = self.word(start + state + 1);
        Ok((from..to)
            .map(|at| {
                let entry = self.word(at);
                (entry >> 16, entry & 0xffff)
            })
            .collect())
    }

    /// The accept symbol of a lexer state, if it accepts
    pub fn lexer_accept(&self, state: u32) -> Result<Option<u32>, TableReadError> {
        let start = self.table_start(table::LEXER_ACCEPTING)?;
        let value = self.word(start + state);
        Ok((value != NO_VALUE).then_some(value))
    }

    /// The number of parser states
    pub fn parser_state_count(&self) -> Result<u32, TableReadError> {
        self.state_count(table::TERMINAL_ACTIONS)
    }

    fn actions(&self, slot: usize, state: u32) -> Result<Vec<Action>, TableReadError> {
        let start = self.table_start(slot)?;
        let from = self.word(start + state);
        let to = self.word(start + state + 1);
        let mut actions = Vec::with_capacity(((to - from) / 2) as usize);
        for at in (from..to).step_by(2) {
            let first = self.word(at);
            let kind = ActionKind::from_code((first >> 24) as u8)
                .ok_or(TableReadError::BadActionKind(first >> 24))?;
            actions.push(Action {
                kind,
                next: (first & 0x00ff_ffff) as usize,
                symbol: self.word(at + 1),
            });
        }
        Ok(actions)
    }

    /// The terminal actions of a parser state, in table order
    pub fn terminal_actions(&self, state: u32) -> Result<Vec<Action>, TableReadError> {
        self.actions(table::TERMINAL_ACTIONS, state)
    }

    /// The nonterminal actions of a parser state, in table order
    pub fn nonterminal_actions(&self, state: u32) -> Result<Vec<Action>, TableReadError> {
        self.actions(table::NONTERMINAL_ACTIONS, state)
    }

    /// The `(symbol, initial_state, ending_state)` triple of every guard
    pub fn guards(&self) -> Result<Vec<(u32, u32, u32)>, TableReadError> {
        let start = self.table_start(table::GUARD_ENDINGS)?;
        let count = self.word(start);
        Ok((0..count)
            .map(|index| {
                let at = start + 1 + index * 3;
                (self.word(at), self.word(at + 1), self.word(at + 2))
            })
            .collect())
    }

    /// The `(nonterminal, length)` pair of every reduce rule
    pub fn rule_counts(&self) -> Result<Vec<(u32, u32)>, TableReadError> {
        let start = self.table_start(table::RULE_SYMBOL_COUNTS)?;
        let count = self.word(start);
        Ok((0..count)
            .map(|index| {
                let entry = self.word(start + 1 + index);
                (entry >> 16, entry & 0xffff)
            })
            .collect())
    }

    /// The `(weak, strong)` terminal equivalences
    pub fn weak_to_strong(&self) -> Result<Vec<(u32, u32)>, TableReadError> {
        let start = self.table_start(table::WEAK_TO_STRONG)?;
        let count = self.word(start);
        Ok((0..count)
            .map(|index| {
                let entry = self.word(start + 1 + index);
                (entry >> 16, entry & 0xffff)
            })
            .collect())
    }

    /// A rule definition: the nonterminal and the item list (terminals are non-negative,
    /// nonterminals are `-1 - id`)
    pub fn rule_definition(&self, rule: u32) -> Result<(u32, Vec<i32>), TableReadError> {
        let start = self.table_start(table::RULE_DEFINITIONS)?;
        let at = self.word(start + 1 + rule);
        let nonterminal = self.word(at);
        let count = self.word(at + 1);
        let items = (0..count).map(|index| self.word(at + 2 + index) as i32).collect();
        Ok((nonterminal, items))
    }

    /// The names of all terminals, by id (`None` for anonymous terminals)
    pub fn terminal_names(&self) -> Result<Vec<Option<String>>, TableReadError> {
        let start = self.table_start(table::TERMINAL_NAMES)?;
        let count = self.word(start);
        (0..count)
            .map(|index| {
                let id = self.word(start + 1 + index);
                if id == NO_VALUE {
                    Ok(None)
                } else {
                    self.string(id).map(Some)
                }
            })
            .collect()
    }

    /// The names of all nonterminals, by id
    pub fn nonterminal_names(&self) -> Result<Vec<String>, TableReadError> {
        let start = self.table_start(table::NONTERMINAL_NAMES)?;
        let count = self.word(start);
        (0..count)
            .map(|index| self.string(self.word(start + 1 + index)))
            .collect()
    }
}
