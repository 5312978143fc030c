//! # Output stages
//! The contract through which back-ends consume a compiled language. A back-end receives
//! the finished artifacts (lexer tables, parser tables, grammar and terminal dictionary)
//! through the four [OutputStage] capabilities, always invoked in the same order:
//! header, lexer, parser, strings. The only back-end provided here is the
//! [binary table encoder](binary::BinaryWriter); source-code emitters for particular
//! target languages implement the same trait out of tree.

pub mod binary;
pub mod reader;

pub use binary::{BinaryOptions, BinaryWriter, Endianness};
pub use reader::{TableFile, TableReadError};

use crate::grammar::{Grammar, TerminalDictionary};
use crate::lexer::Lexer;
use crate::lr::ParserTables;

/// Generator version, encoded into emitted tables as `major<<16 | minor<<8 | revision`
pub const VERSION: (u32, u32, u32) = (0, 1, 0);
/// Human-readable generator version string
pub const VERSION_STRING: &str = "tameparse 0.1.0";

/// Everything a back-end needs to emit a compiled language
#[derive(Copy, Clone)]
pub struct CompiledLanguage<'a> {
    pub lexer: &'a Lexer,
    pub tables: &'a ParserTables,
    pub grammar: &'a Grammar,
    pub terminals: &'a TerminalDictionary,
}

/// A back-end for the generator: consumes the compiled artifacts capability by capability
pub trait OutputStage {
    /// Emits the leading metadata (language name, generator version)
    fn emit_header(&mut self, language: &CompiledLanguage<'_>);
    /// Emits the lexer tables: symbol map, transitions, accepting states
    fn emit_lexer(&mut self, language: &CompiledLanguage<'_>);
    /// Emits the parser tables: actions, guards, rule metadata, weak equivalences
    fn emit_parser(&mut self, language: &CompiledLanguage<'_>);
    /// Emits the accumulated string data (always last)
    fn emit_strings(&mut self, language: &CompiledLanguage<'_>);
}

/// Drives an output stage through the standard emission order
pub fn emit(stage: &mut dyn OutputStage, language: &CompiledLanguage<'_>) {
    stage.emit_header(language);
    stage.emit_lexer(language);
    stage.emit_parser(language);
    stage.emit_strings(language);
}
