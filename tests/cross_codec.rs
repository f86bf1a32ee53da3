//! Cross-codec tests
//!
//! The same records written through both encodings must read back the
//! same, and both sessions must share the same terminal-state behavior.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use ipdr_fnf::{
    AttributeDescriptor, BinaryReader, BinaryWriter, ErrorCode, ErrorRecord, ErrorSink, FnfConfig, FnfData,
    FnfError, IpdrData, PrimitiveType, Schema, Severity, XmlReader, XmlWriter,
};

fn session_schema() -> Arc<Schema> {
    Arc::new(Schema::from_toml_str(include_str!("fixtures/session_schema.toml")).unwrap())
}

fn records() -> Vec<FnfData> {
    let schema = session_schema();
    let attrs = schema.descriptor_for("Session").unwrap().to_vec();
    vec![
        FnfData::new("Session")
            .with(attrs[0].clone(), 12345u64)
            .unwrap()
            .with(attrs[2].clone(), "alice")
            .unwrap(),
        FnfData::new("Session")
            .with(attrs[0].clone(), 67890u64)
            .unwrap()
            .with(attrs[1].clone(), 3_232_235_777u32)
            .unwrap()
            .with(attrs[3].clone(), IpdrData::Array(vec![53u16.into(), 443u16.into()]))
            .unwrap(),
    ]
}

fn via_binary(records: &[FnfData], config: &FnfConfig) -> Vec<FnfData> {
    let mut writer = BinaryWriter::new(Vec::new(), config);
    for record in records {
        writer.write_record(record).unwrap();
    }
    let mut reader = BinaryReader::new(Cursor::new(writer.finish().unwrap()), config);
    reader.read_all().unwrap()
}

fn via_xml(records: &[FnfData], config: &FnfConfig, schema: Option<Arc<Schema>>) -> Vec<FnfData> {
    let mut writer = XmlWriter::new(Vec::new(), config);
    for record in records {
        writer.write_record(record).unwrap();
    }
    let reader = XmlReader::new(Cursor::new(writer.finish().unwrap()), config);
    let mut reader = match schema {
        Some(schema) => reader.with_schema(schema),
        None => reader,
    };
    reader.read_all().unwrap()
}

/// Attribute names with the text form of each leaf
fn as_text(record: &FnfData) -> Vec<(String, String)> {
    record
        .iter()
        .map(|(descriptor, value)| (descriptor.name.clone(), value.to_string()))
        .collect()
}

// =============================================================================
// Equivalence Tests
// =============================================================================

#[test]
fn test_codecs_agree_with_schema() {
    let config = FnfConfig::default();
    let input = records();
    let binary = via_binary(&input, &config);
    let xml = via_xml(&input, &config, Some(session_schema()));
    assert_eq!(binary, input);
    assert_eq!(xml, binary);
}

#[test]
fn test_codecs_agree_on_text_without_schema() {
    let config = FnfConfig::default();
    let input = records();
    let binary = via_binary(&input, &config);
    let xml = via_xml(&input, &config, None);

    assert_eq!(xml.len(), binary.len());
    for (from_xml, from_binary) in xml.iter().zip(&binary) {
        assert_eq!(from_xml.type_name(), from_binary.type_name());
        assert_eq!(as_text(from_xml), as_text(from_binary));
    }
}

#[test]
fn test_binary_to_xml_conversion() {
    let config = FnfConfig::default();
    let mut writer = BinaryWriter::new(Vec::new(), &config);
    for record in records() {
        writer.write_record(&record).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut reader = BinaryReader::new(Cursor::new(bytes), &config);
    let header = reader.read_header().unwrap().clone();
    let mut xml_writer = XmlWriter::new(Vec::new(), &config);
    xml_writer.write_header(header.clone()).unwrap();
    for record in reader.by_ref() {
        xml_writer.write_record(&record.unwrap()).unwrap();
    }
    let xml = xml_writer.finish().unwrap();

    let mut xml_reader = XmlReader::new(Cursor::new(xml), &config).with_schema(session_schema());
    assert_eq!(xml_reader.read_header().unwrap(), &header);
    assert_eq!(xml_reader.read_all().unwrap(), records());
    assert_eq!(
        xml_reader.doc_end().unwrap().count,
        reader.doc_end().unwrap().count
    );
}

// =============================================================================
// Terminal State Tests
// =============================================================================

#[test]
fn test_both_writers_terminate_on_schema_violation() {
    let config = FnfConfig::default();
    let bad = FnfData::new("Session")
        .with(AttributeDescriptor::new("bytesIn", PrimitiveType::String), "12345")
        .unwrap();

    let mut binary = BinaryWriter::new(Vec::new(), &config).with_schema(session_schema());
    let mut xml = XmlWriter::new(Vec::new(), &config).with_schema(session_schema());

    let binary_err = binary.write_record(&bad).unwrap_err();
    let xml_err = xml.write_record(&bad).unwrap_err();
    assert_eq!(binary_err.code(), ErrorCode::MismatchInputWithSchemaDatatype);
    assert_eq!(xml_err.code(), binary_err.code());

    let good = &records()[0];
    assert!(matches!(binary.write_record(good), Err(FnfError::SessionTerminated)));
    assert!(matches!(xml.write_record(good), Err(FnfError::SessionTerminated)));
    assert!(matches!(binary.write_doc_end(), Err(FnfError::SessionTerminated)));
    assert!(matches!(xml.write_doc_end(), Err(FnfError::SessionTerminated)));
    assert_eq!(binary.errors().len(), 1);
    assert_eq!(xml.errors().len(), 1);
}

// =============================================================================
// Error Sink Tests
// =============================================================================

/// Host-side sink sharing its records with the test
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<ErrorRecord>>>);

impl SharedSink {
    fn taken(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ErrorSink for SharedSink {
    fn report(&mut self, record: ErrorRecord) {
        self.0.lock().unwrap().push(record);
    }
}

#[test]
fn test_custom_sink_receives_writer_errors() {
    let config = FnfConfig::default();
    let bad = FnfData::new("Session")
        .with(AttributeDescriptor::new("bytesIn", PrimitiveType::String), "12345")
        .unwrap();
    let sink = SharedSink::default();

    let mut binary = BinaryWriter::new(Vec::new(), &config)
        .with_schema(session_schema())
        .with_error_sink(sink.clone());
    binary.write_record(&records()[0]).unwrap();
    binary.write_record(&bad).unwrap_err();

    let reported = sink.taken();
    assert_eq!(reported.len(), 1);
    let record = &reported[0];
    assert_eq!(record.code, ErrorCode::MismatchInputWithSchemaDatatype);
    assert_eq!(record.severity, Severity::Error);
    assert_eq!(record.function_name, "write_record");
    assert!(record.offset > 0);
    assert_eq!(record.record_count, 1);
    assert!(!record.message.is_empty());
    assert_eq!(binary.errors().records(), reported.as_slice());

    let mut xml = XmlWriter::new(Vec::new(), &config)
        .with_schema(session_schema())
        .with_error_sink(sink.clone());
    xml.write_record(&bad).unwrap_err();
    assert_eq!(sink.taken()[0].code, ErrorCode::MismatchInputWithSchemaDatatype);
}

#[test]
fn test_custom_sink_receives_reader_warnings() {
    let config = FnfConfig::default();
    let sink = SharedSink::default();

    let mut writer = BinaryWriter::new(Vec::new(), &config);
    writer.write_record(&records()[0]).unwrap();
    let bytes = writer.finish().unwrap();
    let mut binary = BinaryReader::new(Cursor::new(bytes), &config).with_error_sink(sink.clone());
    binary.read_all().unwrap();
    assert!(sink.taken().is_empty());

    let doc = include_str!("fixtures/sessions.xml").replace("count=\"2\"", "count=\"5\"");
    let mut xml = XmlReader::new(Cursor::new(doc.into_bytes()), &config).with_error_sink(sink.clone());
    assert_eq!(xml.read_all().unwrap().len(), 2);

    let reported = sink.taken();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].code, ErrorCode::CountMismatch);
    assert_eq!(reported[0].severity, Severity::Warning);
    assert_eq!(reported[0].record_count, 2);
}
