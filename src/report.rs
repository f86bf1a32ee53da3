//! Error/warning reporting
//!
//! Every failure a session sees is appended to an [`ErrorSink`] as an
//! [`ErrorRecord`]. Warnings are recoverable and processing continues;
//! errors additionally put the session into its terminal state.

use std::fmt;

use crate::error::{ErrorCode, FnfError};

/// Severity of a reported condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// One reported condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub severity: Severity,
    /// Operation that raised the condition (e.g. "read_next")
    pub function_name: &'static str,
    /// Byte offset in the stream, where known
    pub offset: u64,
    /// Records processed by the session when the condition was raised
    pub record_count: u64,
    pub message: String,
}

impl ErrorRecord {
    pub fn from_error(
        err: &FnfError,
        severity: Severity,
        function_name: &'static str,
        offset: u64,
        record_count: u64,
    ) -> Self {
        Self {
            code: err.code(),
            severity,
            function_name,
            offset,
            record_count,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} in {} (offset {}, record {}): {}",
            self.severity, self.code, self.function_name, self.offset, self.record_count, self.message
        )
    }
}

/// Receiver of reported conditions
pub trait ErrorSink {
    fn report(&mut self, record: ErrorRecord);
}

/// In-memory sink, queryable after the fact
#[derive(Debug, Clone, Default)]
pub struct ErrorList {
    records: Vec<ErrorRecord>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(|r| r.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(|r| r.severity == Severity::Error)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl ErrorSink for ErrorList {
    fn report(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }
}
