//! # Regex parser
//! This module contains the parser for the regular expression dialect used by lexer
//! definitions (see [crate::regex] for the syntax). The whole input must parse; trailing
//! garbage is an error rather than a shorter match, since a lexer definition with a typo
//! should fail loudly at generation time.

mod regex;

use crate::regex::Regex;
use nom::{combinator::all_consuming, error::Error, Finish};

/// Parses a regular expression. The whole string must be parsable, otherwise this function
/// errors. Every successfully parsed expression can be compiled to an NDFA.
pub fn regex(input: &str) -> Result<Regex, Error<&str>> {
    all_consuming(regex::full_regex)(input)
        .finish()
        .map(|(_, regex)| regex)
}

/// Parses a regular expression in case-insensitive mode: every letter is expanded into a
/// class containing both cases, as if the pattern had been written that way.
pub fn regex_case_insensitive(input: &str) -> Result<Regex, Error<&str>> {
    regex(input).map(Regex::case_insensitive)
}
