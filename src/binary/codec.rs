//! Payload encoders and decoders for the binary stream
//!
//! Header layout:
//! ```text
//! versionMajor u32 | versionMinor u32 | creationTime i64 (ms) | recorderInfo string
//! docId [16]u8 | defaultNamespace string
//! otherNamespaces u32 count, (prefix string, uri string)*
//! schemaLocations u32 count, (namespace string, uri string)*   empty namespace = bare
//! ```
//! Element payloads follow their discriminator:
//! ```text
//! RecordDescriptor: id u32 | typeName string | u32 count, (name string, tag u32, description string, derived string)*
//! Record:           id u32 | u32 count, value*
//! DocEnd:           count u64 | endTime i64 (ms)
//! ```

use std::io::{Read, Write};

use uuid::Uuid;

use crate::data::IpdrData;
use crate::document::{from_millis, to_millis, DocEnd, DocHeader, DocVersion, Namespace, SchemaLocation};
use crate::error::{FnfError, Result};
use crate::record::{FnfData, RecordDescriptor, MAX_NESTING};
use crate::registry::DescriptorRegistry;
use crate::stream::{Discriminator, StreamElement};
use crate::types::{AttributeDescriptor, AttributeType, PrimitiveType};

use super::wire::{WireReader, WireWriter};

pub fn write_header<W: Write>(w: &mut WireWriter<W>, header: &DocHeader) -> Result<()> {
    w.put_u32(header.version.major)?;
    w.put_u32(header.version.minor)?;
    w.put_i64(to_millis(&header.creation_time))?;
    w.put_string(&header.recorder_info)?;
    w.put_fixed(header.doc_id.as_bytes())?;
    w.put_string(&header.default_namespace)?;

    w.put_len(header.other_namespaces.len())?;
    for ns in &header.other_namespaces {
        w.put_string(&ns.prefix)?;
        w.put_string(&ns.uri)?;
    }

    w.put_len(header.schema_locations.len())?;
    for loc in &header.schema_locations {
        w.put_string(loc.namespace.as_deref().unwrap_or(""))?;
        w.put_string(&loc.uri)?;
    }
    Ok(())
}

pub fn read_header<R: Read>(r: &mut WireReader<R>) -> Result<DocHeader> {
    let version = DocVersion::new(r.u32()?, r.u32()?);
    let creation_time = from_millis(r.i64()?)?;
    let recorder_info = r.string()?;
    let doc_id = Uuid::from_bytes(r.fixed::<16>()?);
    let default_namespace = r.string()?;

    let count = r.len()?;
    let mut other_namespaces = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        other_namespaces.push(Namespace {
            prefix: r.string()?,
            uri: r.string()?,
        });
    }

    let count = r.len()?;
    let mut schema_locations = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let namespace = r.string()?;
        schema_locations.push(SchemaLocation {
            namespace: (!namespace.is_empty()).then_some(namespace),
            uri: r.string()?,
        });
    }

    Ok(DocHeader {
        version,
        doc_id,
        creation_time,
        recorder_info,
        default_namespace,
        other_namespaces,
        schema_locations,
    })
}

/// Write one element, discriminator included
pub fn write_element<W: Write>(
    w: &mut WireWriter<W>,
    element: &StreamElement,
    registry: &DescriptorRegistry,
) -> Result<()> {
    w.put_u32(element.discriminator().into())?;
    match element {
        StreamElement::RecordDescriptor(descriptor) => write_descriptor(w, descriptor),
        StreamElement::Record { descriptor_id, record } => write_record_payload(w, *descriptor_id, record, registry),
        StreamElement::DocEnd(end) => {
            w.put_u64(end.count)?;
            w.put_i64(to_millis(&end.end_time))
        }
    }
}

/// Write a record element without building a [`StreamElement`] around it
pub fn write_record<W: Write>(
    w: &mut WireWriter<W>,
    descriptor_id: u32,
    record: &FnfData,
    registry: &DescriptorRegistry,
) -> Result<()> {
    w.put_u32(Discriminator::Record.into())?;
    write_record_payload(w, descriptor_id, record, registry)
}

fn write_record_payload<W: Write>(
    w: &mut WireWriter<W>,
    descriptor_id: u32,
    record: &FnfData,
    registry: &DescriptorRegistry,
) -> Result<()> {
    w.put_u32(descriptor_id)?;
    write_values(w, record, registry)
}

/// Read one element. Records are resolved against `registry` but
/// descriptors are not installed; that is the caller's decision.
pub fn read_element<R: Read>(r: &mut WireReader<R>, registry: &DescriptorRegistry) -> Result<StreamElement> {
    let discriminator = Discriminator::from_wire(r.u32()?)?;
    match discriminator {
        Discriminator::RecordDescriptor => Ok(StreamElement::RecordDescriptor(read_descriptor(r)?)),
        Discriminator::Record => {
            let descriptor_id = r.u32()?;
            let record = read_values(r, descriptor_id, registry, 0)?;
            Ok(StreamElement::Record { descriptor_id, record })
        }
        Discriminator::DocEnd => Ok(StreamElement::DocEnd(DocEnd {
            count: r.u64()?,
            end_time: from_millis(r.i64()?)?,
        })),
    }
}

fn write_descriptor<W: Write>(w: &mut WireWriter<W>, descriptor: &RecordDescriptor) -> Result<()> {
    w.put_u32(descriptor.descriptor_id)?;
    w.put_string(&descriptor.type_name)?;
    w.put_len(descriptor.attributes.len())?;
    for attr in &descriptor.attributes {
        w.put_string(&attr.name)?;
        w.put_u32(attr.wire_tag())?;
        w.put_string(&attr.description)?;
        w.put_string(&attr.derived_type)?;
    }
    Ok(())
}

fn read_descriptor<R: Read>(r: &mut WireReader<R>) -> Result<RecordDescriptor> {
    let descriptor_id = r.u32()?;
    let type_name = r.string()?;
    let count = r.len()?;
    let mut attributes = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let name = r.string()?;
        let tag = r.u32()?;
        let description = r.string()?;
        let derived = r.string()?;
        attributes.push(AttributeDescriptor::from_wire(name, tag, description, derived)?);
    }
    Ok(RecordDescriptor::new(descriptor_id, type_name, attributes))
}

/// Value count followed by the values of a record or nested structure
fn write_values<W: Write>(w: &mut WireWriter<W>, record: &FnfData, registry: &DescriptorRegistry) -> Result<()> {
    w.put_len(record.len())?;
    for value in record.values() {
        write_value(w, value, registry)?;
    }
    Ok(())
}

fn write_value<W: Write>(w: &mut WireWriter<W>, value: &IpdrData, registry: &DescriptorRegistry) -> Result<()> {
    match value {
        IpdrData::Int(v) => w.put_i32(*v),
        IpdrData::UnsignedInt(v) => w.put_u32(*v),
        IpdrData::Long(v) => w.put_i64(*v),
        IpdrData::UnsignedLong(v) => w.put_u64(*v),
        IpdrData::Float(v) => w.put_f32(*v),
        IpdrData::Double(v) => w.put_f64(*v),
        IpdrData::HexBinary(v) => w.put_bytes(v),
        IpdrData::String(v) => w.put_string(v),
        IpdrData::Boolean(v) => w.put_bool(*v),
        IpdrData::Byte(v) => w.put_i8(*v),
        IpdrData::UnsignedByte(v) => w.put_u8(*v),
        IpdrData::Short(v) => w.put_i16(*v),
        IpdrData::UnsignedShort(v) => w.put_u16(*v),
        IpdrData::Array(items) => {
            w.put_len(items.len())?;
            items.iter().try_for_each(|item| write_value(w, item, registry))
        }
        IpdrData::Structure(nested) => {
            let id = registry
                .lookup(nested.type_name(), nested.descriptors())
                .ok_or_else(|| FnfError::NonPrimitiveDataType(format!(
                    "structure {} has no registered descriptor",
                    nested.type_name()
                )))?;
            w.put_u32(id)?;
            write_values(w, nested, registry)
        }
    }
}

fn read_values<R: Read>(
    r: &mut WireReader<R>,
    descriptor_id: u32,
    registry: &DescriptorRegistry,
    depth: usize,
) -> Result<FnfData> {
    if depth > MAX_NESTING {
        return Err(FnfError::NestingTooDeep { limit: MAX_NESTING });
    }
    let descriptor = registry.resolve(descriptor_id)?;
    let count = r.len()?;
    if count != descriptor.attributes.len() {
        return Err(FnfError::MismatchDescriptorDataArray {
            descriptors: descriptor.attributes.len(),
            values: count,
        });
    }
    let values = descriptor
        .attributes
        .iter()
        .map(|attr| read_value(r, &attr.attr_type, registry, depth))
        .collect::<Result<Vec<_>>>()?;
    descriptor.bind(values)
}

fn read_value<R: Read>(
    r: &mut WireReader<R>,
    attr_type: &AttributeType,
    registry: &DescriptorRegistry,
    depth: usize,
) -> Result<IpdrData> {
    match attr_type {
        AttributeType::Primitive(p) => read_primitive(r, *p),
        AttributeType::Array(element) => {
            let count = r.len()?;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(read_value(r, element, registry, depth)?);
            }
            Ok(IpdrData::Array(items))
        }
        AttributeType::Structure(type_name) => {
            let nested_id = r.u32()?;
            let nested = read_values(r, nested_id, registry, depth + 1)?;
            if nested.type_name() != type_name {
                return Err(FnfError::ValueTypeMismatch {
                    attribute: type_name.clone(),
                    expected: attr_type.to_string(),
                    found: format!("struct<{}>", nested.type_name()),
                });
            }
            Ok(nested.into())
        }
    }
}

fn read_primitive<R: Read>(r: &mut WireReader<R>, p: PrimitiveType) -> Result<IpdrData> {
    let value = match p {
        PrimitiveType::Int => IpdrData::Int(r.i32()?),
        PrimitiveType::UnsignedInt => IpdrData::UnsignedInt(r.u32()?),
        PrimitiveType::Long => IpdrData::Long(r.i64()?),
        PrimitiveType::UnsignedLong => IpdrData::UnsignedLong(r.u64()?),
        PrimitiveType::Float => IpdrData::Float(r.f32()?),
        PrimitiveType::Double => IpdrData::Double(r.f64()?),
        PrimitiveType::HexBinary => IpdrData::HexBinary(r.bytes()?),
        PrimitiveType::String => IpdrData::String(r.string()?),
        PrimitiveType::Boolean => IpdrData::Boolean(r.bool()?),
        PrimitiveType::Byte => IpdrData::Byte(r.i8()?),
        PrimitiveType::UnsignedByte => IpdrData::UnsignedByte(r.u8()?),
        PrimitiveType::Short => IpdrData::Short(r.i16()?),
        PrimitiveType::UnsignedShort => IpdrData::UnsignedShort(r.u16()?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session(registry: &mut DescriptorRegistry) -> (u32, FnfData) {
        let attrs = vec![
            AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong).mandatory(),
            AttributeDescriptor::new("user", PrimitiveType::String),
        ];
        let id = registry.register_if_absent("Session", &attrs).unwrap().descriptor_id;
        let record = FnfData::from_parts("Session", attrs, vec![12345u64.into(), "alice".into()]).unwrap();
        (id, record)
    }

    #[test]
    fn test_header_round_trip() {
        let header = DocHeader::new(DocVersion::new(3, 5), "probe-7")
            .with_namespace("cable", "http://example.com/cable")
            .with_schema_location(None, "session.xsd")
            .with_schema_location(Some("http://example.com/cable".into()), "cable.xsd");

        let mut w = WireWriter::new(Vec::new());
        write_header(&mut w, &header).unwrap();
        let mut r = WireReader::new(Cursor::new(w.into_inner()));
        assert_eq!(read_header(&mut r).unwrap(), header);
    }

    #[test]
    fn test_record_payload_layout() {
        let mut registry = DescriptorRegistry::default();
        let (descriptor_id, record) = session(&mut registry);

        let mut w = WireWriter::new(Vec::new());
        write_element(&mut w, &StreamElement::Record { descriptor_id, record }, &registry).unwrap();
        let bytes = w.into_inner();

        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 2]);
        assert_eq!(&bytes[12..20], &12345u64.to_be_bytes());
    }

    #[test]
    fn test_descriptor_and_record_decode() {
        let mut registry = DescriptorRegistry::default();
        let (descriptor_id, record) = session(&mut registry);
        let descriptor = registry.resolve(descriptor_id).unwrap();

        let mut w = WireWriter::new(Vec::new());
        write_element(&mut w, &StreamElement::RecordDescriptor(descriptor.clone()), &registry).unwrap();
        write_element(&mut w, &StreamElement::Record { descriptor_id, record: record.clone() }, &registry)
            .unwrap();

        let mut peer = DescriptorRegistry::default();
        let mut r = WireReader::new(Cursor::new(w.into_inner()));
        match read_element(&mut r, &peer).unwrap() {
            StreamElement::RecordDescriptor(d) => {
                assert_eq!(d, descriptor);
                peer.install(&d).unwrap();
            }
            other => panic!("unexpected element {:?}", other),
        }
        match read_element(&mut r, &peer).unwrap() {
            StreamElement::Record { record: decoded, .. } => assert_eq!(decoded, record),
            other => panic!("unexpected element {:?}", other),
        }
    }

    #[test]
    fn test_unknown_descriptor_id() {
        let mut w = WireWriter::new(Vec::new());
        w.put_u32(2).unwrap();
        w.put_u32(42).unwrap();
        w.put_u32(0).unwrap();
        let mut r = WireReader::new(Cursor::new(w.into_inner()));
        let err = read_element(&mut r, &DescriptorRegistry::default()).unwrap_err();
        assert!(matches!(err, FnfError::NoSuchDescriptor(42)));
    }

    #[test]
    fn test_value_count_mismatch() {
        let mut registry = DescriptorRegistry::default();
        let (id, _) = session(&mut registry);
        let mut w = WireWriter::new(Vec::new());
        w.put_u32(2).unwrap();
        w.put_u32(id).unwrap();
        w.put_u32(3).unwrap();
        let mut r = WireReader::new(Cursor::new(w.into_inner()));
        let err = read_element(&mut r, &registry).unwrap_err();
        assert!(matches!(
            err,
            FnfError::MismatchDescriptorDataArray { descriptors: 2, values: 3 }
        ));
    }

    #[test]
    fn test_invalid_discriminator() {
        let mut r = WireReader::new(Cursor::new(vec![0, 0, 0, 7]));
        let err = read_element(&mut r, &DescriptorRegistry::default()).unwrap_err();
        assert!(matches!(err, FnfError::InvalidDiscriminator(7)));
    }
}
