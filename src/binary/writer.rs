//! Binary stream writer

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::FnfConfig;
use crate::data::IpdrData;
use crate::document::{now_millis, DocEnd, DocHeader};
use crate::error::{FnfError, Result};
use crate::record::{FnfData, RecordDescriptor};
use crate::registry::reserved_fields;
use crate::report::{ErrorList, ErrorSink};
use crate::schema::Schema;
use crate::session::Session;
use crate::stream::StreamElement;

use super::codec;
use super::wire::WireWriter;

/// Writes a header, then descriptor and record elements, then the end-of-document element.
///
/// A descriptor element is emitted the first time each record shape is
/// written; later records of that shape carry only its id.
pub struct BinaryWriter<W: Write> {
    wire: WireWriter<W>,
    session: Session,
    header: DocHeader,
    header_written: bool,
    doc_end: Option<DocEnd>,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W, config: &FnfConfig) -> Self {
        Self {
            wire: WireWriter::new(inner),
            session: Session::new(config),
            header: config.doc_header(),
            header_written: false,
            doc_end: None,
        }
    }

    /// Validate every record against `schema` before writing it
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.session.set_schema(schema);
        self
    }

    /// Also deliver every reported condition to `sink`
    pub fn with_error_sink(mut self, sink: impl ErrorSink + Send + 'static) -> Self {
        self.session.set_error_sink(Box::new(sink));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn errors(&self) -> &ErrorList {
        self.session.errors()
    }

    pub fn is_writable(&self) -> bool {
        self.session.is_open() && self.doc_end.is_none()
    }

    pub fn record_count(&self) -> u64 {
        self.session.record_count()
    }

    /// Write the document header. Called implicitly with the configured
    /// header if the first record arrives before it.
    pub fn write_header(&mut self, header: DocHeader) -> Result<()> {
        self.session.ensure_open()?;
        if self.header_written {
            if header != self.header {
                let offset = self.wire.offset();
                self.session
                    .warn("write_header", offset, &FnfError::HeaderAlreadyWritten(header.doc_id));
            }
            return Ok(());
        }
        self.header = header;
        let offset = self.wire.offset();
        if let Err(e) = codec::write_header(&mut self.wire, &self.header) {
            return Err(self.session.fail("write_header", offset, e));
        }
        self.header_written = true;
        debug!(doc_id = %self.header.doc_id, version = %self.header.version, "wrote binary header");
        Ok(())
    }

    pub fn header(&self) -> &DocHeader {
        &self.header
    }

    /// Write one record, preceded by any descriptor elements its shape needs
    pub fn write_record(&mut self, record: &FnfData) -> Result<()> {
        self.session.ensure_open()?;
        if self.doc_end.is_some() {
            return Err(FnfError::SessionTerminated);
        }
        if !self.header_written {
            self.write_header(self.header.clone())?;
        }

        let offset = self.wire.offset();
        match self.encode_record(record, offset) {
            Ok(()) => {
                self.session.count_record();
                Ok(())
            }
            Err(e) => Err(self.session.fail("write_record", offset, e)),
        }
    }

    fn encode_record(&mut self, record: &FnfData, offset: u64) -> Result<()> {
        record.check_alignment()?;
        self.session.validate("write_record", offset, record)?;
        let descriptor_id = self.register(record)?;
        trace!(descriptor_id, type_name = record.type_name(), "writing record");
        codec::write_record(&mut self.wire, descriptor_id, record, self.session.registry())
    }

    /// Register the record's shape, nested structures first, emitting a
    /// descriptor element for every shape seen for the first time
    fn register(&mut self, record: &FnfData) -> Result<u32> {
        for value in record.values() {
            self.register_nested(value)?;
        }

        let registration = self
            .session
            .registry_mut()
            .register_if_absent(record.type_name(), record.descriptors())?;
        if registration.newly_registered {
            let offset = self.wire.offset();
            for field in reserved_fields(record.type_name(), record.descriptors()) {
                self.session
                    .warn("write_record", offset, &FnfError::ReservedCharacter(field));
            }
            let descriptor = RecordDescriptor::new(
                registration.descriptor_id,
                record.type_name(),
                record.descriptors().to_vec(),
            );
            codec::write_element(
                &mut self.wire,
                &StreamElement::RecordDescriptor(descriptor),
                self.session.registry(),
            )?;
        }
        Ok(registration.descriptor_id)
    }

    fn register_nested(&mut self, value: &IpdrData) -> Result<()> {
        match value {
            IpdrData::Structure(nested) => self.register(nested).map(|_| ()),
            IpdrData::Array(items) => items.iter().try_for_each(|item| self.register_nested(item)),
            _ => Ok(()),
        }
    }

    /// Write the end-of-document element with the running record count
    pub fn write_doc_end(&mut self) -> Result<DocEnd> {
        if let Some(end) = self.doc_end {
            return Ok(end);
        }
        self.session.ensure_open()?;
        if !self.header_written {
            self.write_header(self.header.clone())?;
        }

        let end = DocEnd {
            count: self.session.record_count(),
            end_time: now_millis(),
        };
        let offset = self.wire.offset();
        if let Err(e) = codec::write_element(&mut self.wire, &StreamElement::DocEnd(end), self.session.registry()) {
            return Err(self.session.fail("write_doc_end", offset, e));
        }
        self.doc_end = Some(end);
        debug!(count = end.count, "wrote end of document");
        Ok(end)
    }

    /// End the document if needed, flush and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.write_doc_end()?;
        self.wire.flush()?;
        Ok(self.wire.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{AttributeDescriptor, PrimitiveType};

    fn session_record(bytes_in: u64) -> FnfData {
        FnfData::new("Session")
            .with(AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong).mandatory(), bytes_in)
            .unwrap()
    }

    #[test]
    fn test_descriptor_written_once() {
        let mut writer = BinaryWriter::new(Vec::new(), &FnfConfig::default());
        writer.write_record(&session_record(12345)).unwrap();
        writer.write_record(&session_record(67890)).unwrap();
        assert_eq!(writer.session().registry().len(), 1);
        assert_eq!(writer.record_count(), 2);

        let end = writer.write_doc_end().unwrap();
        assert_eq!(end.count, 2);
        assert!(!writer.is_writable());
    }

    #[test]
    fn test_rejected_shape_terminates() {
        let mut writer = BinaryWriter::new(Vec::new(), &FnfConfig::default());
        let bad = FnfData::from_parts(
            "Session",
            vec![AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong)],
            vec![IpdrData::String("oops".into())],
        );
        assert!(bad.is_err());

        let dup = FnfData::new("Dup")
            .with(AttributeDescriptor::new("x", PrimitiveType::Int), 1i32)
            .unwrap()
            .with(AttributeDescriptor::new("x", PrimitiveType::Int), 2i32)
            .unwrap();
        let err = writer.write_record(&dup).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateAttributeName);
        assert!(!writer.is_writable());
        assert!(matches!(
            writer.write_record(&session_record(1)),
            Err(FnfError::SessionTerminated)
        ));
        assert!(writer.errors().has_errors());
    }

    #[test]
    fn test_reserved_characters_warn() {
        let mut writer = BinaryWriter::new(Vec::new(), &FnfConfig::default());
        let record = FnfData::new("Cost")
            .with(
                AttributeDescriptor::new("amount", PrimitiveType::Double).with_description("in $"),
                1.5f64,
            )
            .unwrap();
        writer.write_record(&record).unwrap();
        let warning = writer.errors().warnings().next().unwrap();
        assert_eq!(warning.code, ErrorCode::ReservedCharacter);
        assert!(writer.is_writable());
    }

    #[test]
    fn test_second_header_warns() {
        let config = FnfConfig::default();
        let mut writer = BinaryWriter::new(Vec::new(), &config);
        let first = config.doc_header();
        writer.write_header(first.clone()).unwrap();

        writer.write_header(first.clone()).unwrap();
        assert!(writer.errors().is_empty());

        writer.write_header(config.doc_header()).unwrap();
        let warning = writer.errors().warnings().next().unwrap();
        assert_eq!(warning.code, ErrorCode::HeaderAlreadyWritten);
        assert_eq!(writer.header(), &first);
        assert!(writer.is_writable());
    }
}
