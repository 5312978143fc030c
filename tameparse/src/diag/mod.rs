//! # Diagnostics
//! Every stage of the generator reports problems through a [DiagnosticSink] that is passed
//! in by reference; nothing in the pipeline writes to a global stream or panics on user
//! input. A sink decides whether compilation may continue after each record, and the
//! conventional [ConsoleSink] keeps an append-only list of records and continues for
//! anything below [Severity::Fatal].
//!
//! Severities form a ladder: `Info` and `Detail` are informational, `Warning` flags
//! suspicious input, `Error` prevents output from being produced, `Fatal` stops the
//! pipeline immediately, and `Bug` marks an internal invariant violation (the generator
//! malfunctioned, not the input). A process embedding the generator exits with the code of
//! the highest severity reported.

use std::fmt;

/// How serious a diagnostic is. The ordering is meaningful: later variants are worse.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Information about the compilation
    Info,
    /// Detail attached to the previous warning or error
    Detail,
    /// Something that looks wrong but does not prevent output
    Warning,
    /// Prevents output from being produced; compilation continues to find more errors
    Error,
    /// Stops the pipeline immediately
    Fatal,
    /// An internal invariant violation; always stops the pipeline
    Bug,
}

impl Severity {
    /// The process exit code conventionally used for this severity
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Info | Severity::Detail => 0,
            Severity::Warning => 3,
            Severity::Error => 4,
            Severity::Fatal => 5,
            Severity::Bug => 6,
        }
    }
}

/// A position within a source file
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// One diagnostic record: severity, a stable identifying code, an optional source
/// location and a human-readable message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub file: Option<String>,
    pub position: Option<Position>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            code,
            file: None,
            position: None,
            message: message.into(),
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, position: Position) -> Self {
        self.file = Some(file.into());
        self.position = Some(position);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, &self.position) {
            (Some(file), Some(pos)) => write!(
                f,
                "{file}:{}:{}: {:?} [{}] {}",
                pos.line, pos.column, self.severity, self.code, self.message
            ),
            _ => write!(f, "{:?} [{}] {}", self.severity, self.code, self.message),
        }
    }
}

/// Receives diagnostic records from the generator stages. `report` returns whether
/// compilation may continue.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic) -> bool;
}

/// A sink that collects all records in order and refuses to continue on `Fatal` or `Bug`
#[derive(Debug, Default)]
pub struct ConsoleSink {
    records: Vec<Diagnostic>,
    worst: Option<Severity>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink::default()
    }

    /// All records reported so far, in order
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// The most severe severity reported so far
    pub fn worst(&self) -> Option<Severity> {
        self.worst
    }

    /// Checks whether anything at `Error` severity or above was reported
    pub fn has_errors(&self) -> bool {
        self.worst.map_or(false, |severity| severity >= Severity::Error)
    }

    /// The exit code for the compilation: that of the highest severity reported, or 0
    pub fn exit_code(&self) -> i32 {
        self.worst.map_or(0, Severity::exit_code)
    }
}

impl DiagnosticSink for ConsoleSink {
    fn report(&mut self, diagnostic: Diagnostic) -> bool {
        let severity = diagnostic.severity;
        self.worst = Some(self.worst.map_or(severity, |worst| worst.max(severity)));
        self.records.push(diagnostic);
        severity < Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_tracks_the_worst_severity()  {
        let mut sink = ConsoleSink::new();
        assert_eq!(sink.exit_code(), 0);
        assert!(sink.report(Diagnostic::new(Severity::Warning, "W1", "suspicious")));
        assert_eq!(sink.exit_code(), 3);
        assert!(sink.report(Diagnostic::new(Severity::Error, "E1", "broken")));
        assert!(sink.report(Diagnostic::new(Severity::Info, "I1", "note")));
        assert_eq!(sink.exit_code(), 4);
        assert!(sink.has_errors());
    }

    #[test]
    fn fatal_stops_compilation() {
        let mut sink = ConsoleSink::new();
        assert!(!sink.report(Diagnostic::new(Severity::Fatal, "F1", "cannot continue")));
        assert_eq!(sink.exit_code(), 5);
        assert!(!sink.report(Diagnostic::new(Severity::Bug, "B1", "invariant violated")));
        assert_eq!(sink.exit_code(), 6);
    }
}
