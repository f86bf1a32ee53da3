//! XML document reader

use std::io::BufRead;
use std::mem;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use uuid::Uuid;

use crate::config::FnfConfig;
use crate::document::{from_millis, parse_time, DocEnd, DocHeader, DocVersion, Namespace, SchemaLocation};
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::report::{ErrorList, ErrorSink};
use crate::schema::Schema;
use crate::session::Session;

use super::coerce::coerce;
use super::state::{Markup, ParseState, StateMachine, Transition};
use super::{DOC_END_ELEMENT, ROOT_ELEMENT};

type Attributes = Vec<(String, String)>;

/// Pull reader over an XML document.
///
/// Namespace prefixes on element names are ignored. Records may be
/// written as `<typeName>` or as `<IPDR xsi:type="typeName">`.
pub struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    session: Session,
    machine: StateMachine,
    version: DocVersion,
    header: Option<DocHeader>,
    doc_end_attributes: Attributes,
    doc_end: Option<DocEnd>,
    finished: bool,
}

impl<R: BufRead> XmlReader<R> {
    pub fn new(inner: R, config: &FnfConfig) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);
        Self {
            reader,
            buf: Vec::new(),
            session: Session::new(config),
            machine: StateMachine::new(),
            version: config.doc_version(),
            header: None,
            doc_end_attributes: Vec::new(),
            doc_end: None,
            finished: false,
        }
    }

    /// Type leaves and validate records against `schema`
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

    pub fn state(&self) -> ParseState {
        self.machine.state()
    }

    pub fn is_readable(&self) -> bool {
        self.session.is_open() && !self.finished
    }

    /// Read up to and including the root element
    pub fn read_header(&mut self) -> Result<&DocHeader> {
        while self.header.is_none() {
            self.session.ensure_open()?;
            let offset = self.reader.buffer_position() as u64;
            match self.step() {
                Ok(Some(_)) => {}
                Ok(None) => return Err(self.session.fail("read_header", offset, FnfError::Eof)),
                Err(e) => return Err(self.session.fail("read_header", offset, e)),
            }
        }
        self.header.as_ref().ok_or(FnfError::NullInput("document header"))
    }

    /// End-of-document metadata, once it has been read
    pub fn doc_end(&self) -> Option<&DocEnd> {
        self.doc_end.as_ref()
    }

    /// Next record; `None` at the end of the document
    pub fn read_next(&mut self) -> Result<Option<FnfData>> {
        if self.finished {
            return Ok(None);
        }
        self.session.ensure_open()?;

        loop {
            let offset = self.reader.buffer_position() as u64;
            let transition = match self.step() {
                Ok(Some(transition)) => transition,
                Ok(None) => return Err(self.session.fail("read_next", offset, FnfError::Eof)),
                Err(e) => return Err(self.session.fail("read_next", offset, e)),
            };
            match transition {
                Transition::Continue => continue,
                Transition::Record(record) => return self.accept(record, offset).map(Some),
                Transition::DocEnd => {
                    self.finish_doc_end(offset)?;
                    return Ok(None);
                }
                Transition::Closed => {
                    self.session.warn(
                        "read_next",
                        offset,
                        &FnfError::xml_structure(offset as usize, "document closed without IPDRDoc.End"),
                    );
                    self.finished = true;
                    return Ok(None);
                }
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

    /// Pull one event and feed it to the state machine; `None` at end of input
    fn step(&mut self) -> Result<Option<Transition>> {
        let mut buf = mem::take(&mut self.buf);
        buf.clear();
        let result = self.step_with(&mut buf);
        self.buf = buf;
        result
    }

    fn step_with(&mut self, buf: &mut Vec<u8>) -> Result<Option<Transition>> {
        let offset = self.reader.buffer_position();
        let markup = match self.reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = utf8(e.local_name().as_ref(), offset)?;
                let attributes = attributes_of(&e, offset)?;
                if self.machine.state() == ParseState::Prolog {
                    if name != ROOT_ELEMENT {
                        return Err(FnfError::xml_structure(
                            offset,
                            format!("expected {} root, found '{}'", ROOT_ELEMENT, name),
                        ));
                    }
                    let header = self.parse_header(&attributes, offset as u64)?;
                    debug!(doc_id = %header.doc_id, version = %header.version, "read xml header");
                    self.header = Some(header);
                } else if name == DOC_END_ELEMENT && self.machine.state() == ParseState::InDocument {
                    self.doc_end_attributes = attributes.clone();
                }
                let xsi_type = attributes
                    .iter()
                    .find(|(key, _)| local_part(key) == "type" && key.contains(':'))
                    .map(|(_, value)| local_part(value).to_string());
                Markup::Start { name, xsi_type }
            }
            Event::End(e) => Markup::End {
                name: utf8(e.local_name().as_ref(), offset)?,
            },
            Event::Text(t) => Markup::Text(t.unescape()?.into_owned()),
            Event::CData(c) => Markup::Text(String::from_utf8(c.into_inner().into_owned())?),
            Event::Eof => return Ok(None),
            _ => return Ok(Some(Transition::Continue)),
        };
        self.machine.feed(markup, offset).map(Some)
    }

    fn parse_header(&mut self, attributes: &Attributes, offset: u64) -> Result<DocHeader> {
        let mut header = DocHeader {
            version: self.version,
            doc_id: Uuid::nil(),
            creation_time: from_millis(0)?,
            recorder_info: String::new(),
            default_namespace: String::new(),
            other_namespaces: Vec::new(),
            schema_locations: Vec::new(),
        };
        let mut has_creation_time = false;

        for (key, value) in attributes {
            match key.as_str() {
                "xmlns" => header.default_namespace = value.clone(),
                "xmlns:xsi" => {}
                "docId" => match Uuid::parse_str(value.trim()) {
                    Ok(id) => header.doc_id = id,
                    Err(e) => self.session.warn("read_header", offset, &FnfError::from(e)),
                },
                "creationTime" => {
                    header.creation_time = parse_time(value)?;
                    has_creation_time = true;
                }
                "IPDRRecorderInfo" => header.recorder_info = value.clone(),
                "version" => match value.parse::<DocVersion>() {
                    Ok(version) => header.version = version,
                    Err(e) => self.session.warn("read_header", offset, &e),
                },
                k if k.starts_with("xmlns:") => header.other_namespaces.push(Namespace {
                    prefix: k["xmlns:".len()..].to_string(),
                    uri: value.clone(),
                }),
                k if local_part(k) == "schemaLocation" => {
                    let tokens: Vec<&str> = value.split_whitespace().collect();
                    for pair in tokens.chunks(2) {
                        match pair {
                            [namespace, uri] => header.schema_locations.push(SchemaLocation {
                                namespace: Some(namespace.to_string()),
                                uri: uri.to_string(),
                            }),
                            _ => self.session.warn(
                                "read_header",
                                offset,
                                &FnfError::InvalidValue {
                                    expected: "namespace/location pair".to_string(),
                                    text: value.clone(),
                                },
                            ),
                        }
                    }
                }
                k if local_part(k) == "noNamespaceSchemaLocation" => {
                    for uri in value.split_whitespace() {
                        header.schema_locations.push(SchemaLocation {
                            namespace: None,
                            uri: uri.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        if !has_creation_time {
            self.session
                .warn("read_header", offset, &FnfError::NullInput("creationTime"));
        }
        Ok(header)
    }

    fn accept(&mut self, record: FnfData, offset: u64) -> Result<FnfData> {
        let typed = self.session.schema().map(|schema| coerce(&record, schema));
        let record = match typed {
            None => record,
            Some(Ok(typed)) => typed,
            Some(Err(e)) => match self.session.schema_violation("read_next", offset, e) {
                Ok(()) => record,
                Err(e) => return Err(self.session.fail("read_next", offset, e)),
            },
        };
        if let Err(e) = self.session.validate("read_next", offset, &record) {
            return Err(self.session.fail("read_next", offset, e));
        }
        self.session.count_record();
        Ok(record)
    }

    fn finish_doc_end(&mut self, offset: u64) -> Result<()> {
        let attributes = mem::take(&mut self.doc_end_attributes);
        let end = match parse_doc_end(&attributes, offset as usize) {
            Ok(end) => end,
            Err(e) => return Err(self.session.fail("read_next", offset, e)),
        };
        let actual = self.session.record_count();
        if end.count != actual {
            self.session.warn(
                "read_next",
                offset,
                &FnfError::CountMismatch {
                    declared: end.count,
                    actual,
                },
            );
        }
        debug!(count = end.count, "read end of document");
        self.doc_end = Some(end);
        self.finished = true;
        Ok(())
    }
}

impl<R: BufRead> Iterator for XmlReader<R> {
    type Item = Result<FnfData>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_readable() {
            return None;
        }
        self.read_next().transpose()
    }
}

fn parse_doc_end(attributes: &Attributes, offset: usize) -> Result<DocEnd> {
    let find = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .ok_or_else(|| FnfError::xml_structure(offset, format!("{} lacks '{}'", DOC_END_ELEMENT, name)))
    };
    let count_text = find("count")?;
    let count = count_text.trim().parse::<u64>().map_err(|_| FnfError::InvalidValue {
        expected: "count".to_string(),
        text: count_text.to_string(),
    })?;
    Ok(DocEnd {
        count,
        end_time: parse_time(find("endTime")?)?,
    })
}

fn attributes_of(e: &BytesStart<'_>, offset: usize) -> Result<Attributes> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = utf8(attr.key.as_ref(), offset)?;
            let value = attr.unescape_value()?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn utf8(bytes: &[u8], offset: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| FnfError::xml_structure(offset, e.to_string()))
}

/// Part after the namespace prefix, if any
fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
