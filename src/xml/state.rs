//! Parse state of the XML reader
//!
//! Markup events drive an explicit state enum. Records under
//! construction live on a frame stack: the bottom frame is the record,
//! each frame above it a structure attribute still open.

use std::mem;

use tracing::trace;

use crate::data::IpdrData;
use crate::error::{FnfError, Result};
use crate::record::{FnfData, MAX_NESTING};
use crate::types::{AttributeDescriptor, AttributeType, PrimitiveType};

use super::DOC_END_ELEMENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Before the root element
    Prolog,
    /// Inside the root, between records
    InDocument,
    /// Inside a record, between attributes
    InRecord,
    /// Inside an attribute element whose content is not known yet
    InLeafAttribute,
    /// Inside a structure attribute, between its children
    InComplexAttribute,
    InDocEnd,
    AfterDocEnd,
    /// Root closed
    Done,
}

/// Markup with namespace prefixes removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Start { name: String, xsi_type: Option<String> },
    End { name: String },
    Text(String),
}

#[derive(Debug, PartialEq)]
pub enum Transition {
    Continue,
    Record(FnfData),
    /// The end-of-document element closed
    DocEnd,
    /// The root closed without an end-of-document element
    Closed,
}

#[derive(Debug)]
struct Frame {
    /// Element name; the attribute name for structure frames
    name: String,
    type_name: String,
    descriptors: Vec<AttributeDescriptor>,
    values: Vec<IpdrData>,
}

impl Frame {
    fn new(name: String, type_name: String) -> Self {
        Self {
            name,
            type_name,
            descriptors: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a value. A repeat of the previous attribute name extends
    /// it into an array.
    fn append(&mut self, name: String, value: IpdrData, offset: usize) -> Result<()> {
        let value_type = type_of(&value);
        if let (Some(descriptor), Some(slot)) = (self.descriptors.last_mut(), self.values.last_mut()) {
            if descriptor.name == name {
                let element = match &descriptor.attr_type {
                    AttributeType::Array(element) => element.as_ref().clone(),
                    single => single.clone(),
                };
                if element != value_type {
                    return Err(FnfError::xml_structure(
                        offset,
                        format!("repeated element '{}' changes type from {} to {}", name, element, value_type),
                    ));
                }
                if let IpdrData::Array(items) = slot {
                    items.push(value);
                } else {
                    let first = mem::replace(slot, IpdrData::Array(Vec::new()));
                    *slot = IpdrData::Array(vec![first, value]);
                    *descriptor = AttributeDescriptor::new(name, AttributeType::array_of(element));
                }
                return Ok(());
            }
        }
        self.descriptors.push(AttributeDescriptor::new(name, value_type));
        self.values.push(value);
        Ok(())
    }

    fn into_record(self) -> Result<FnfData> {
        FnfData::from_parts(self.type_name, self.descriptors, self.values)
    }
}

fn type_of(value: &IpdrData) -> AttributeType {
    match value {
        IpdrData::Structure(record) => AttributeType::Structure(record.type_name().to_string()),
        other => other
            .primitive_type()
            .map(AttributeType::Primitive)
            .unwrap_or(AttributeType::Primitive(PrimitiveType::String)),
    }
}

#[derive(Debug)]
struct Leaf {
    name: String,
    xsi_type: Option<String>,
    text: String,
}

#[derive(Debug)]
pub struct StateMachine {
    state: ParseState,
    frames: Vec<Frame>,
    leaf: Option<Leaf>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ParseState::Prolog,
            frames: Vec::new(),
            leaf: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Nesting depth of open records and structures
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn feed(&mut self, markup: Markup, offset: usize) -> Result<Transition> {
        use ParseState::*;

        let transition = match (self.state, markup) {
            (_, Markup::Text(text)) => return self.text(text, offset),

            (Prolog, Markup::Start { .. }) => self.goto(InDocument),

            (InDocument, Markup::Start { name, .. }) if name == DOC_END_ELEMENT => self.goto(InDocEnd),
            (InDocument, Markup::Start { name, xsi_type }) => {
                let type_name = xsi_type.unwrap_or_else(|| name.clone());
                self.frames.push(Frame::new(name, type_name));
                self.goto(InRecord)
            }
            (InDocument, Markup::End { .. }) => {
                self.state = Done;
                Transition::Closed
            }

            (InRecord | InComplexAttribute, Markup::Start { name, xsi_type }) => {
                self.leaf = Some(Leaf {
                    name,
                    xsi_type,
                    text: String::new(),
                });
                self.goto(InLeafAttribute)
            }

            // A child element turns the open leaf into a structure
            (InLeafAttribute, Markup::Start { name, xsi_type }) => {
                let parent = self.take_leaf(offset)?;
                if !parent.text.trim().is_empty() {
                    return Err(FnfError::xml_structure(
                        offset,
                        format!("element '{}' mixes text and child elements", parent.name),
                    ));
                }
                if self.frames.len() > MAX_NESTING {
                    return Err(FnfError::NestingTooDeep { limit: MAX_NESTING });
                }
                let type_name = parent.xsi_type.unwrap_or_else(|| parent.name.clone());
                self.frames.push(Frame::new(parent.name, type_name));
                self.leaf = Some(Leaf {
                    name,
                    xsi_type,
                    text: String::new(),
                });
                Transition::Continue
            }
            (InLeafAttribute, Markup::End { .. }) => {
                let leaf = self.take_leaf(offset)?;
                let text = leaf.text.trim_end().to_string();
                self.top(offset)?.append(leaf.name, IpdrData::String(text), offset)?;
                self.goto(self.nested_state())
            }

            (InComplexAttribute, Markup::End { .. }) => {
                let frame = self.pop(offset)?;
                let name = frame.name.clone();
                let nested = frame.into_record()?;
                self.top(offset)?.append(name, nested.into(), offset)?;
                self.goto(self.nested_state())
            }
            (InRecord, Markup::End { .. }) => {
                let record = self.pop(offset)?.into_record()?;
                trace!(type_name = record.type_name(), attributes = record.len(), "record closed");
                self.state = InDocument;
                Transition::Record(record)
            }

            (InDocEnd, Markup::End { .. }) => {
                self.state = AfterDocEnd;
                Transition::DocEnd
            }
            (AfterDocEnd, Markup::End { .. }) => {
                self.state = Done;
                Transition::Continue
            }

            (state, Markup::Start { name, .. }) => {
                return Err(FnfError::xml_structure(
                    offset,
                    format!("unexpected element '{}' in state {:?}", name, state),
                ))
            }
            (state, Markup::End { name }) => {
                return Err(FnfError::xml_structure(
                    offset,
                    format!("unexpected end of '{}' in state {:?}", name, state),
                ))
            }
        };
        Ok(transition)
    }

    fn text(&mut self, text: String, offset: usize) -> Result<Transition> {
        match (self.state, self.leaf.as_mut()) {
            (ParseState::InLeafAttribute, Some(leaf)) => {
                if leaf.text.is_empty() {
                    leaf.text.push_str(text.trim_start());
                } else {
                    leaf.text.push_str(&text);
                }
                Ok(Transition::Continue)
            }
            _ if text.trim().is_empty() => Ok(Transition::Continue),
            (state, _) => Err(FnfError::xml_structure(
                offset,
                format!("unexpected text '{}' in state {:?}", text.trim(), state),
            )),
        }
    }

    fn goto(&mut self, state: ParseState) -> Transition {
        trace!(from = ?self.state, to = ?state, "xml state");
        self.state = state;
        Transition::Continue
    }

    fn nested_state(&self) -> ParseState {
        match self.frames.len() {
            0 => ParseState::InDocument,
            1 => ParseState::InRecord,
            _ => ParseState::InComplexAttribute,
        }
    }

    fn take_leaf(&mut self, offset: usize) -> Result<Leaf> {
        self.leaf
            .take()
            .ok_or_else(|| FnfError::xml_structure(offset, "no open attribute element"))
    }

    fn top(&mut self, offset: usize) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| FnfError::xml_structure(offset, "attribute outside a record"))
    }

    fn pop(&mut self, offset: usize) -> Result<Frame> {
        self.frames
            .pop()
            .ok_or_else(|| FnfError::xml_structure(offset, "no open record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Markup {
        Markup::Start {
            name: name.to_string(),
            xsi_type: None,
        }
    }

    fn end(name: &str) -> Markup {
        Markup::End { name: name.to_string() }
    }

    fn text(t: &str) -> Markup {
        Markup::Text(t.to_string())
    }

    fn run(machine: &mut StateMachine, events: Vec<Markup>) -> Vec<Transition> {
        events
            .into_iter()
            .map(|m| machine.feed(m, 0).unwrap())
            .filter(|t| *t != Transition::Continue)
            .collect()
    }

    #[test]
    fn test_flat_record() {
        let mut machine = StateMachine::new();
        let out = run(
            &mut machine,
            vec![
                start("IPDRDoc"),
                text("\n  "),
                start("Session"),
                start("bytesIn"),
                text("  12345\n"),
                end("bytesIn"),
                start("user"),
                end("user"),
                end("Session"),
            ],
        );
        let Transition::Record(record) = &out[0] else {
            panic!("expected a record, got {:?}", out);
        };
        assert_eq!(record.type_name(), "Session");
        assert_eq!(record.get("bytesIn"), Some(&IpdrData::String("12345".into())));
        assert_eq!(record.get("user"), Some(&IpdrData::String(String::new())));
        assert_eq!(machine.state(), ParseState::InDocument);
    }

    #[test]
    fn test_repeated_siblings_become_array() {
        let mut machine = StateMachine::new();
        let out = run(
            &mut machine,
            vec![
                start("IPDRDoc"),
                start("Trace"),
                start("hop"),
                text("a"),
                end("hop"),
                start("hop"),
                text("b"),
                end("hop"),
                start("hop"),
                text("c"),
                end("hop"),
                end("Trace"),
            ],
        );
        let Transition::Record(record) = &out[0] else {
            panic!("expected a record");
        };
        assert_eq!(record.len(), 1);
        assert_eq!(record.descriptors()[0].attr_type.to_string(), "array<string>");
        assert_eq!(
            record.get("hop"),
            Some(&IpdrData::Array(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn test_nested_structure() {
        let mut machine = StateMachine::new();
        let out = run(
            &mut machine,
            vec![
                start("IPDRDoc"),
                start("Call"),
                Markup::Start {
                    name: "caller".into(),
                    xsi_type: Some("Party".into()),
                },
                text("\n    "),
                start("number"),
                text("555"),
                end("number"),
                end("caller"),
                start("duration"),
                text("60"),
                end("duration"),
                end("Call"),
            ],
        );
        let Transition::Record(record) = &out[0] else {
            panic!("expected a record");
        };
        let Some(IpdrData::Structure(caller)) = record.get("caller") else {
            panic!("caller is not a structure");
        };
        assert_eq!(caller.type_name(), "Party");
        assert_eq!(caller.get("number"), Some(&IpdrData::String("555".into())));
        assert_eq!(record.get("duration"), Some(&IpdrData::String("60".into())));
    }

    #[test]
    fn test_doc_end_and_close() {
        let mut machine = StateMachine::new();
        let out = run(
            &mut machine,
            vec![start("IPDRDoc"), start(DOC_END_ELEMENT), end(DOC_END_ELEMENT), end("IPDRDoc")],
        );
        assert_eq!(out, vec![Transition::DocEnd]);
        assert_eq!(machine.state(), ParseState::Done);
    }

    #[test]
    fn test_mixed_content_rejected() {
        let mut machine = StateMachine::new();
        for m in [start("IPDRDoc"), start("Session"), start("a"), text("x")] {
            machine.feed(m, 0).unwrap();
        }
        let err = machine.feed(start("b"), 40).unwrap_err();
        assert!(matches!(err, FnfError::XmlStructure { offset: 40, .. }));
    }

    #[test]
    fn test_text_between_records_rejected() {
        let mut machine = StateMachine::new();
        machine.feed(start("IPDRDoc"), 0).unwrap();
        assert!(machine.feed(text("stray"), 9).is_err());
    }

    #[test]
    fn test_pretty_printed_leaf_trimmed() {
        let mut machine = StateMachine::new();
        let out = run(
            &mut machine,
            vec![
                start("IPDRDoc"),
                start("Session"),
                start("user"),
                text("\n      alice smith\n    "),
                end("user"),
                end("Session"),
            ],
        );
        let Transition::Record(record) = &out[0] else {
            panic!("expected a record, got {:?}", out);
        };
        assert_eq!(record.get("user"), Some(&IpdrData::String("alice smith".into())));
    }

    #[test]
    fn test_nesting_limit() {
        let mut machine = StateMachine::new();
        machine.feed(start("IPDRDoc"), 0).unwrap();
        machine.feed(start("Node"), 0).unwrap();
        for _ in 0..=MAX_NESTING {
            machine.feed(start("child"), 0).unwrap();
        }
        assert_eq!(machine.depth(), MAX_NESTING + 1);
        let err = machine.feed(start("child"), 0).unwrap_err();
        assert!(matches!(err, FnfError::NestingTooDeep { limit: MAX_NESTING }));
    }
}
