//! Binary stream reader

use std::io::Read;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::FnfConfig;
use crate::document::{DocEnd, DocHeader};
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::report::{ErrorList, ErrorSink};
use crate::schema::Schema;
use crate::session::Session;
use crate::stream::StreamElement;

use super::codec;
use super::wire::WireReader;

/// Reads a binary stream element by element.
///
/// Descriptor elements are installed into the session registry as they
/// arrive; records referencing an id never installed fail closed and
/// terminate the session.
pub struct BinaryReader<R: Read> {
    wire: WireReader<R>,
    session: Session,
    version_major: u32,
    header: Option<DocHeader>,
    doc_end: Option<DocEnd>,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R, config: &FnfConfig) -> Self {
        Self {
            wire: WireReader::new(inner),
            session: Session::new(config),
            version_major: config.binary.version_major,
            header: None,
            doc_end: None,
        }
    }

    /// Validate every decoded record against `schema`
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

    /// False once the end of the document was read or the session terminated
    pub fn is_readable(&self) -> bool {
        self.session.is_open() && self.doc_end.is_none()
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.wire.offset()
    }

    /// Read the document header; later calls return the cached header
    pub fn read_header(&mut self) -> Result<&DocHeader> {
        if self.header.is_none() {
            self.session.ensure_open()?;
            let header = match self.decode_header() {
                Ok(header) => header,
                Err(e) => {
                    let offset = self.wire.offset();
                    return Err(self.session.fail("read_header", offset, e));
                }
            };
            debug!(doc_id = %header.doc_id, version = %header.version, "read binary header");
            self.header = Some(header);
        }
        self.header.as_ref().ok_or(FnfError::NullInput("document header"))
    }

    fn decode_header(&mut self) -> Result<DocHeader> {
        let header = codec::read_header(&mut self.wire)?;
        if header.version.major != self.version_major {
            return Err(FnfError::UnsupportedVersion {
                major: header.version.major,
                minor: header.version.minor,
            });
        }
        Ok(header)
    }

    /// End-of-document metadata, once it has been read
    pub fn doc_end(&self) -> Option<&DocEnd> {
        self.doc_end.as_ref()
    }

    /// Read the next raw element. Descriptors are installed, records are
    /// validated and counted, and the end-of-document count is checked.
    pub fn read_element(&mut self) -> Result<StreamElement> {
        if let Some(end) = self.doc_end {
            return Ok(StreamElement::DocEnd(end));
        }
        self.read_header()?;
        self.session.ensure_open()?;

        let offset = self.wire.offset();
        match self.decode_element(offset) {
            Ok(element) => Ok(element),
            Err(e) => Err(self.session.fail("read_element", offset, e)),
        }
    }

    fn decode_element(&mut self, offset: u64) -> Result<StreamElement> {
        let element = codec::read_element(&mut self.wire, self.session.registry())?;
        match &element {
            StreamElement::RecordDescriptor(descriptor) => {
                trace!(descriptor_id = descriptor.descriptor_id, type_name = %descriptor.type_name, "descriptor");
                self.session.registry_mut().install(descriptor)?;
            }
            StreamElement::Record { descriptor_id, record } => {
                trace!(descriptor_id, type_name = record.type_name(), "record");
                self.session.validate("read_element", offset, record)?;
                self.session.count_record();
            }
            StreamElement::DocEnd(end) => {
                let actual = self.session.record_count();
                if end.count != actual {
                    self.session.warn(
                        "read_element",
                        offset,
                        &FnfError::CountMismatch {
                            declared: end.count,
                            actual,
                        },
                    );
                }
                debug!(count = end.count, "read end of document");
                self.doc_end = Some(*end);
            }
        }
        Ok(element)
    }

    /// Next record, skipping over descriptor elements; `None` at the end of the document
    pub fn read_next(&mut self) -> Result<Option<FnfData>> {
        loop {
            match self.read_element()? {
                StreamElement::RecordDescriptor(_) => continue,
                StreamElement::Record { record, .. } => return Ok(Some(record)),
                StreamElement::DocEnd(_) => return Ok(None),
            }
        }
    }

    /// Read every remaining record
    pub fn read_all(&mut self) -> Result<Vec<FnfData>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn into_inner(self) -> R {
        self.wire.into_inner()
    }
}

impl<R: Read> Iterator for BinaryReader<R> {
    type Item = Result<FnfData>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_readable() {
            return None;
        }
        self.read_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryWriter;
    use crate::error::ErrorCode;
    use crate::types::{AttributeDescriptor, PrimitiveType};
    use std::io::Cursor;

    fn session_record(bytes_in: u64) -> FnfData {
        FnfData::new("Session")
            .with(AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong).mandatory(), bytes_in)
            .unwrap()
    }

    fn encode(records: &[FnfData], config: &FnfConfig) -> Vec<u8> {
        let mut writer = BinaryWriter::new(Vec::new(), config);
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_read_elements_in_order() {
        let config = FnfConfig::default();
        let bytes = encode(&[session_record(12345), session_record(67890)], &config);
        let mut reader = BinaryReader::new(Cursor::new(bytes), &config);

        assert!(matches!(reader.read_element().unwrap(), StreamElement::RecordDescriptor(d) if d.descriptor_id == 1));
        assert!(matches!(reader.read_element().unwrap(), StreamElement::Record { descriptor_id: 1, .. }));
        assert!(matches!(reader.read_element().unwrap(), StreamElement::Record { descriptor_id: 1, .. }));
        assert!(matches!(reader.read_element().unwrap(), StreamElement::DocEnd(end) if end.count == 2));
        assert!(!reader.is_readable());
        assert!(reader.errors().is_empty());
    }

    #[test]
    fn test_iterator_yields_records() {
        let config = FnfConfig::default();
        let bytes = encode(&[session_record(1), session_record(2), session_record(3)], &config);
        let reader = BinaryReader::new(Cursor::new(bytes), &config);
        let values: Vec<u64> = reader
            .map(|r| match r.unwrap().get("bytesIn") {
                Some(crate::data::IpdrData::UnsignedLong(v)) => *v,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_other_major_version_rejected() {
        let mut config = FnfConfig::default();
        config.binary.version_major = 4;
        let bytes = encode(&[session_record(1)], &config);

        let mut reader = BinaryReader::new(Cursor::new(bytes), &FnfConfig::default());
        let err = reader.read_next().unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedVersion);
        assert!(!reader.is_readable());
    }

    #[test]
    fn test_truncated_stream_is_eof() {
        let config = FnfConfig::default();
        let mut bytes = encode(&[session_record(1)], &config);
        bytes.truncate(bytes.len() - 20);
        let mut reader = BinaryReader::new(Cursor::new(bytes), &config);
        assert!(reader.read_next().unwrap().is_some());
        let err = reader.read_next().unwrap_err();
        assert_eq!(err.code(), ErrorCode::EofEncountered);
        assert!(matches!(reader.read_next(), Err(FnfError::SessionTerminated)));
    }

    #[test]
    fn test_truncated_header_reports_offset() {
        let config = FnfConfig::default();
        let mut bytes = encode(&[session_record(1)], &config);
        bytes.truncate(10);

        let mut reader = BinaryReader::new(Cursor::new(bytes), &config);
        assert_eq!(reader.read_header().unwrap_err().code(), ErrorCode::EofEncountered);
        let record = &reader.errors().records()[0];
        assert_eq!(record.function_name, "read_header");
        assert_eq!(record.offset, 10);
    }
}
