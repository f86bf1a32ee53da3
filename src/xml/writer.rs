//! XML document writer

use std::io::Write;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, trace, warn};

use crate::binary::wire::WireWriter;
use crate::config::{FnfConfig, RecordElement};
use crate::data::IpdrData;
use crate::document::{format_time, now_millis, DocEnd, DocHeader};
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::report::{ErrorList, ErrorSink};
use crate::schema::Schema;
use crate::session::Session;

use super::{DOC_END_ELEMENT, ROOT_ELEMENT, TYPED_RECORD_ELEMENT, XSI_NAMESPACE};

pub struct XmlWriter<W: Write> {
    writer: Writer<WireWriter<W>>,
    session: Session,
    header: DocHeader,
    record_element: RecordElement,
    header_written: bool,
    doc_end: Option<DocEnd>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(inner: W, config: &FnfConfig) -> Self {
        let sink = WireWriter::new(inner);
        let writer = if config.xml.indent > 0 {
            Writer::new_with_indent(sink, b' ', config.xml.indent)
        } else {
            Writer::new(sink)
        };
        Self {
            writer,
            session: Session::new(config),
            header: config.doc_header(),
            record_element: config.xml.record_element,
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

    fn offset(&self) -> u64 {
        self.writer.get_ref().offset()
    }

    /// Write the XML declaration and open the root element
    pub fn write_header(&mut self, header: DocHeader) -> Result<()> {
        self.session.ensure_open()?;
        if self.header_written {
            if header != self.header {
                let offset = self.offset();
                self.session
                    .warn("write_header", offset, &FnfError::HeaderAlreadyWritten(header.doc_id));
            }
            return Ok(());
        }
        self.header = header;
        if let Err(e) = self.encode_header() {
            return Err(self.session.fail("write_header", 0, e));
        }
        self.header_written = true;
        debug!(doc_id = %self.header.doc_id, "wrote xml header");
        Ok(())
    }

    fn encode_header(&mut self) -> Result<()> {
        let header = &self.header;
        let doc_id = header.doc_id.to_string();
        let creation_time = format_time(&header.creation_time);
        let version = header.version.to_string();
        let prefixed: Vec<(String, &str)> = header
            .other_namespaces
            .iter()
            .filter(|ns| {
                let reserved = ns.prefix == "xsi";
                if reserved {
                    warn!(uri = %ns.uri, "skipping namespace bound to the reserved xsi prefix");
                }
                !reserved
            })
            .map(|ns| (format!("xmlns:{}", ns.prefix), ns.uri.as_str()))
            .collect();
        let paired = header
            .schema_locations
            .iter()
            .filter_map(|loc| loc.namespace.as_ref().map(|ns| format!("{} {}", ns, loc.uri)))
            .collect::<Vec<_>>()
            .join(" ");
        let bare = header
            .schema_locations
            .iter()
            .filter(|loc| loc.namespace.is_none())
            .map(|loc| loc.uri.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute(("xmlns", header.default_namespace.as_str()));
        root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        for (key, uri) in &prefixed {
            root.push_attribute((key.as_str(), *uri));
        }
        if !paired.is_empty() {
            root.push_attribute(("xsi:schemaLocation", paired.as_str()));
        }
        if !bare.is_empty() {
            root.push_attribute(("xsi:noNamespaceSchemaLocation", bare.as_str()));
        }
        root.push_attribute(("docId", doc_id.as_str()));
        root.push_attribute(("creationTime", creation_time.as_str()));
        root.push_attribute(("IPDRRecorderInfo", header.recorder_info.as_str()));
        root.push_attribute(("version", version.as_str()));

        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.writer.write_event(Event::Start(root))?;
        Ok(())
    }

    /// Write one record element
    pub fn write_record(&mut self, record: &FnfData) -> Result<()> {
        self.session.ensure_open()?;
        if self.doc_end.is_some() {
            return Err(FnfError::SessionTerminated);
        }
        if !self.header_written {
            self.write_header(self.header.clone())?;
        }

        let offset = self.offset();
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
        trace!(type_name = record.type_name(), "writing record");

        let element = match self.record_element {
            RecordElement::Named => record.type_name(),
            RecordElement::Typed => TYPED_RECORD_ELEMENT,
        };
        let mut start = BytesStart::new(element);
        if self.record_element == RecordElement::Typed {
            start.push_attribute(("xsi:type", record.type_name()));
        }
        self.writer.write_event(Event::Start(start))?;
        for (descriptor, value) in record.iter() {
            write_attribute(&mut self.writer, &descriptor.name, value)?;
        }
        self.writer.write_event(Event::End(BytesEnd::new(element)))?;
        Ok(())
    }

    /// Write the end-of-document element and close the root
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
        let offset = self.offset();
        if let Err(e) = self.encode_doc_end(&end) {
            return Err(self.session.fail("write_doc_end", offset, e));
        }
        self.doc_end = Some(end);
        debug!(count = end.count, "wrote end of document");
        Ok(end)
    }

    fn encode_doc_end(&mut self, end: &DocEnd) -> Result<()> {
        let count = end.count.to_string();
        let end_time = format_time(&end.end_time);
        let mut element = BytesStart::new(DOC_END_ELEMENT);
        element.push_attribute(("count", count.as_str()));
        element.push_attribute(("endTime", end_time.as_str()));
        self.writer.write_event(Event::Empty(element))?;
        self.writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
        Ok(())
    }

    /// End the document if needed, flush and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.write_doc_end()?;
        let mut sink = self.writer.into_inner();
        sink.flush()?;
        Ok(sink.into_inner())
    }
}

/// Arrays repeat the element; structures nest their attributes.
fn write_attribute<W: Write>(writer: &mut Writer<W>, name: &str, value: &IpdrData) -> Result<()> {
    match value {
        IpdrData::Array(items) => {
            for item in items {
                write_attribute(writer, name, item)?;
            }
        }
        IpdrData::Structure(nested) => {
            let mut start = BytesStart::new(name);
            if nested.type_name() != name {
                start.push_attribute(("xsi:type", nested.type_name()));
            }
            writer.write_event(Event::Start(start))?;
            for (descriptor, value) in nested.iter() {
                write_attribute(writer, &descriptor.name, value)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        leaf => {
            let text = leaf.to_text().unwrap_or_default();
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeDescriptor, PrimitiveType};

    fn session_record() -> FnfData {
        FnfData::new("Session")
            .with(AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong), 12345u64)
            .unwrap()
            .with(AttributeDescriptor::new("user", PrimitiveType::String), "a<b")
            .unwrap()
    }

    fn compact() -> FnfConfig {
        let mut config = FnfConfig::default();
        config.xml.indent = 0;
        config
    }

    #[test]
    fn test_named_record_element() {
        let mut writer = XmlWriter::new(Vec::new(), &compact());
        writer.write_record(&session_record()).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Session><bytesIn>12345</bytesIn><user>a&lt;b</user></Session>"));
        assert!(xml.contains("<IPDRDoc.End count=\"1\""));
        assert!(xml.ends_with("</IPDRDoc>"));
    }

    #[test]
    fn test_typed_record_element_and_arrays() {
        let mut config = compact();
        config.xml.record_element = RecordElement::Typed;
        let record = FnfData::new("Trace")
            .with(
                AttributeDescriptor::new("hop", crate::types::AttributeType::array_of(PrimitiveType::Int.into())),
                IpdrData::Array(vec![1i32.into(), 2i32.into()]),
            )
            .unwrap();

        let mut writer = XmlWriter::new(Vec::new(), &config);
        writer.write_record(&record).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(xml.contains("<IPDR xsi:type=\"Trace\"><hop>1</hop><hop>2</hop></IPDR>"));
    }

    #[test]
    fn test_no_writes_after_doc_end() {
        let mut writer = XmlWriter::new(Vec::new(), &compact());
        writer.write_doc_end().unwrap();
        assert!(!writer.is_writable());
        assert!(writer.write_record(&session_record()).is_err());
    }

    #[test]
    fn test_xsi_prefix_not_redeclared() {
        let config = compact();
        let header = config
            .doc_header()
            .with_namespace("xsi", "http://example.com/not-xsi")
            .with_namespace("cable", "http://example.com/cable");

        let mut writer = XmlWriter::new(Vec::new(), &config);
        writer.write_header(header).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert_eq!(xml.matches("xmlns:xsi=").count(), 1);
        assert!(!xml.contains("not-xsi"));
        assert!(xml.contains("xmlns:cable=\"http://example.com/cable\""));
    }

    #[test]
    fn test_second_header_warns() {
        let config = compact();
        let mut writer = XmlWriter::new(Vec::new(), &config);
        writer.write_record(&session_record()).unwrap();

        let late = config.doc_header();
        let late_id = late.doc_id;
        writer.write_header(late).unwrap();
        assert!(writer.is_writable());
        let warning = writer.errors().warnings().next().unwrap();
        assert_eq!(warning.code, crate::error::ErrorCode::HeaderAlreadyWritten);
        assert_ne!(writer.header.doc_id, late_id);
    }
}
