//! Per-stream session state
//!
//! One session per open stream: its descriptor registry, running record
//! count, reported conditions, optional schema, and whether an
//! unrecoverable error has made it terminal.

use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use crate::config::{FnfConfig, ValidationConfig};
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::registry::DescriptorRegistry;
use crate::report::{ErrorList, ErrorRecord, ErrorSink, Severity};
use crate::schema::Schema;
use crate::validator;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// An unrecoverable error occurred; no further calls are served
    Terminated,
}

pub struct Session {
    registry: DescriptorRegistry,
    errors: ErrorList,
    /// Host sink receiving every record as it is reported
    sink: Option<Box<dyn ErrorSink + Send>>,
    state: SessionState,
    record_count: u64,
    schema: Option<Arc<Schema>>,
    validation: ValidationConfig,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("errors", &self.errors)
            .field("state", &self.state)
            .field("record_count", &self.record_count)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: &FnfConfig) -> Self {
        Self {
            registry: DescriptorRegistry::new(config.registry.base_id),
            errors: ErrorList::new(),
            sink: None,
            state: SessionState::Open,
            record_count: 0,
            schema: None,
            validation: config.validation.clone(),
        }
    }

    /// Forward reported conditions to `sink` as well as the session's own list
    pub fn set_error_sink(&mut self, sink: Box<dyn ErrorSink + Send>) {
        self.sink = Some(sink);
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DescriptorRegistry {
        &mut self.registry
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn count_record(&mut self) {
        self.record_count += 1;
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    pub fn set_schema(&mut self, schema: Arc<Schema>) {
        self.schema = Some(schema);
    }

    /// Fail fast once terminal
    pub fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Terminated => Err(FnfError::SessionTerminated),
        }
    }

    /// Record a recoverable condition and continue
    pub fn warn(&mut self, function_name: &'static str, offset: u64, err: &FnfError) {
        warn!(function = function_name, offset, code = %err.code(), "{}", err);
        let record = ErrorRecord::from_error(err, Severity::Warning, function_name, offset, self.record_count);
        self.report(record);
    }

    /// Record an unrecoverable condition, terminate the session and hand the error back
    pub fn fail(&mut self, function_name: &'static str, offset: u64, err: FnfError) -> FnfError {
        if matches!(err, FnfError::SessionTerminated) {
            return err;
        }
        error!(function = function_name, offset, code = %err.code(), "{}", err);
        let record = ErrorRecord::from_error(&err, Severity::Error, function_name, offset, self.record_count);
        self.report(record);
        self.state = SessionState::Terminated;
        err
    }

    fn report(&mut self, record: ErrorRecord) {
        if let Some(sink) = self.sink.as_mut() {
            sink.report(record.clone());
        }
        self.errors.report(record);
    }

    /// Check a record against the loaded schema, if any.
    ///
    /// In non-strict mode violations are reported as warnings and the
    /// record is accepted.
    pub fn validate(&mut self, function_name: &'static str, offset: u64, record: &FnfData) -> Result<()> {
        if !self.validation.enabled {
            return Ok(());
        }
        let Some(schema) = self.schema.as_deref() else {
            return Ok(());
        };
        match validator::validate(record, schema) {
            Ok(()) => Ok(()),
            Err(err) => self.schema_violation(function_name, offset, err),
        }
    }

    /// A record disagrees with the schema: an error in strict mode, a warning otherwise
    pub fn schema_violation(&mut self, function_name: &'static str, offset: u64, err: FnfError) -> Result<()> {
        if self.validation.enabled && self.validation.strict {
            return Err(err);
        }
        self.warn(function_name, offset, &err);
        Ok(())
    }
}
