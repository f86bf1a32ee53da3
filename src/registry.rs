//! Descriptor Registry
//!
//! Per-session, append-only cache between a record shape's canonical
//! signature and its descriptor id, in both directions.
//!
//! ## Signature grammar
//!
//! ```text
//! typeName '^' ( attributeName '*' attributeType '*' description '*' derivedType '$' )*
//! ```
//!
//! `attributeType` is the decimal wire tag (type id plus flags). Field
//! values are not escaped: a name or description containing `^`, `*` or
//! `$` produces a signature that cannot be parsed back. Such fields are
//! reported by [`reserved_fields`] so callers can warn about them.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{FnfError, Result};
use crate::record::RecordDescriptor;
use crate::types::AttributeDescriptor;

pub const TYPE_SEPARATOR: char = '^';
pub const FIELD_SEPARATOR: char = '*';
pub const ATTRIBUTE_TERMINATOR: char = '$';

const RESERVED: [char; 3] = [TYPE_SEPARATOR, FIELD_SEPARATOR, ATTRIBUTE_TERMINATOR];

/// Build the canonical signature of a record shape
pub fn signature(type_name: &str, attributes: &[AttributeDescriptor]) -> String {
    let mut sig = String::with_capacity(type_name.len() + 1 + attributes.len() * 24);
    sig.push_str(type_name);
    sig.push(TYPE_SEPARATOR);
    for attr in attributes {
        sig.push_str(&attr.name);
        sig.push(FIELD_SEPARATOR);
        sig.push_str(&attr.wire_tag().to_string());
        sig.push(FIELD_SEPARATOR);
        sig.push_str(&attr.description);
        sig.push(FIELD_SEPARATOR);
        sig.push_str(&attr.derived_type);
        sig.push(ATTRIBUTE_TERMINATOR);
    }
    sig
}

/// Parse a canonical signature back into a type name and attributes
pub fn parse_signature(sig: &str) -> Result<(String, Vec<AttributeDescriptor>)> {
    let (type_name, body) = sig
        .split_once(TYPE_SEPARATOR)
        .ok_or_else(|| FnfError::InvalidSignature(format!("missing '{}' in {}", TYPE_SEPARATOR, sig)))?;

    if !body.is_empty() && !body.ends_with(ATTRIBUTE_TERMINATOR) {
        return Err(FnfError::InvalidSignature(format!(
            "unterminated attribute group in {}",
            sig
        )));
    }

    let mut attributes = Vec::new();
    for group in body.split(ATTRIBUTE_TERMINATOR).filter(|g| !g.is_empty()) {
        let fields: Vec<&str> = group.split(FIELD_SEPARATOR).collect();
        let [name, tag, description, derived] = fields.as_slice() else {
            return Err(FnfError::InvalidSignature(format!(
                "attribute group '{}' has {} fields",
                group,
                fields.len()
            )));
        };
        let tag: u32 = tag
            .parse()
            .map_err(|_| FnfError::InvalidSignature(format!("bad type tag '{}'", tag)))?;
        attributes.push(AttributeDescriptor::from_wire(
            name.to_string(),
            tag,
            description.to_string(),
            derived.to_string(),
        )?);
    }

    Ok((type_name.to_string(), attributes))
}

/// Fields of a record shape that contain signature delimiters
pub fn reserved_fields(type_name: &str, attributes: &[AttributeDescriptor]) -> Vec<String> {
    let mut fields = Vec::new();
    if type_name.contains(RESERVED) {
        fields.push(format!("type name '{}'", type_name));
    }
    for attr in attributes {
        if attr.name.contains(RESERVED) {
            fields.push(format!("attribute name '{}'", attr.name));
        }
        if attr.description.contains(RESERVED) {
            fields.push(format!("description of '{}'", attr.name));
        }
        if attr.derived_type.contains(RESERVED) {
            fields.push(format!("derived type of '{}'", attr.name));
        }
    }
    fields
}

/// Outcome of [`DescriptorRegistry::register_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub descriptor_id: u32,
    /// True when this call allocated the id; the writer must emit a descriptor element
    pub newly_registered: bool,
}

/// The per-session descriptor cache
#[derive(Debug, Clone)]
pub struct DescriptorRegistry {
    /// First id handed out
    base_id: u32,
    /// Next id to allocate
    next_id: u32,
    /// Write side: signature -> id
    by_signature: HashMap<String, u32>,
    /// Read side: id -> signature
    by_id: HashMap<u32, String>,
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DescriptorRegistry {
    /// Open an empty registry allocating ids from `base_id`
    pub fn new(base_id: u32) -> Self {
        Self {
            base_id,
            next_id: base_id,
            by_signature: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn base_id(&self) -> u32 {
        self.base_id
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Id of an already registered shape
    pub fn lookup(&self, type_name: &str, attributes: &[AttributeDescriptor]) -> Option<u32> {
        self.by_signature.get(&signature(type_name, attributes)).copied()
    }

    /// Return the id of this shape, allocating the next one if it is new
    pub fn register_if_absent(
        &mut self,
        type_name: &str,
        attributes: &[AttributeDescriptor],
    ) -> Result<Registration> {
        check_shape(type_name, attributes)?;

        let sig = signature(type_name, attributes);
        if let Some(&descriptor_id) = self.by_signature.get(&sig) {
            return Ok(Registration {
                descriptor_id,
                newly_registered: false,
            });
        }

        let descriptor_id = self.next_id;
        self.next_id = descriptor_id.checked_add(1).ok_or(FnfError::ResourceExhausted {
            requested: descriptor_id as usize + 1,
            limit: u32::MAX as usize,
        })?;

        debug!(descriptor_id, type_name, attributes = attributes.len(), "registered descriptor");
        self.by_id.insert(descriptor_id, sig.clone());
        self.by_signature.insert(sig, descriptor_id);

        Ok(Registration {
            descriptor_id,
            newly_registered: true,
        })
    }

    /// Install a descriptor whose id was assigned by the peer (read side).
    ///
    /// Returns false when the identical descriptor was already installed.
    pub fn install(&mut self, descriptor: &RecordDescriptor) -> Result<bool> {
        check_shape(&descriptor.type_name, &descriptor.attributes)?;

        let sig = signature(&descriptor.type_name, &descriptor.attributes);
        let id = descriptor.descriptor_id;
        if let Some(existing) = self.by_id.get(&id) {
            if *existing == sig {
                return Ok(false);
            }
            return Err(FnfError::DescriptorIdConflict { id });
        }

        debug!(descriptor_id = id, type_name = %descriptor.type_name, "installed descriptor");
        self.by_signature.entry(sig.clone()).or_insert(id);
        self.by_id.insert(id, sig);
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
        Ok(true)
    }

    /// Materialize the descriptor registered under `descriptor_id`
    pub fn resolve(&self, descriptor_id: u32) -> Result<RecordDescriptor> {
        let sig = self
            .by_id
            .get(&descriptor_id)
            .ok_or(FnfError::NoSuchDescriptor(descriptor_id))?;
        let (type_name, attributes) = parse_signature(sig)?;
        Ok(RecordDescriptor::new(descriptor_id, type_name, attributes))
    }

    /// Signature stored for an id
    pub fn signature_of(&self, descriptor_id: u32) -> Option<&str> {
        self.by_id.get(&descriptor_id).map(String::as_str)
    }
}

fn check_shape(type_name: &str, attributes: &[AttributeDescriptor]) -> Result<()> {
    if type_name.is_empty() {
        return Err(FnfError::NullInput("record type name"));
    }
    for (i, attr) in attributes.iter().enumerate() {
        if attr.name.is_empty() {
            return Err(FnfError::NullInput("attribute name"));
        }
        attr.attr_type.validate()?;
        if attributes[..i].iter().any(|prev| prev.name == attr.name) {
            return Err(FnfError::DuplicateAttributeName {
                type_name: type_name.to_string(),
                attribute: attr.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeType, PrimitiveType};

    fn session_attrs() -> Vec<AttributeDescriptor> {
        vec![AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong).mandatory()]
    }

    #[test]
    fn test_signature_grammar() {
        let attrs = vec![
            AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong)
                .mandatory()
                .with_description("octets received"),
            AttributeDescriptor::new("srcIp", PrimitiveType::UnsignedInt)
                .mandatory()
                .with_derived("ipV4Addr"),
        ];
        assert_eq!(
            signature("Session", &attrs),
            "Session^bytesIn*36*octets received*unsignedLong$srcIp*34**ipV4Addr$"
        );
        assert_eq!(signature("Empty", &[]), "Empty^");
    }

    #[test]
    fn test_signature_round_trip() {
        let attrs = vec![
            AttributeDescriptor::new("hops", AttributeType::array_of(AttributeType::Structure("Hop".into()))),
            AttributeDescriptor::new("tag", PrimitiveType::HexBinary).with_derived("UUID"),
        ];
        let (type_name, back) = parse_signature(&signature("Trace", &attrs)).unwrap();
        assert_eq!(type_name, "Trace");
        assert_eq!(back, attrs);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(parse_signature("NoCaret"), Err(FnfError::InvalidSignature(_))));
        assert!(matches!(parse_signature("T^a*36*x"), Err(FnfError::InvalidSignature(_))));
        assert!(matches!(parse_signature("T^a*36$"), Err(FnfError::InvalidSignature(_))));
        assert!(matches!(parse_signature("T^a*zz**$"), Err(FnfError::InvalidSignature(_))));
    }

    #[test]
    fn test_register_reuses_existing_id() {
        let mut registry = DescriptorRegistry::new(1);
        let first = registry.register_if_absent("Session", &session_attrs()).unwrap();
        assert_eq!(first, Registration { descriptor_id: 1, newly_registered: true });

        let again = registry.register_if_absent("Session", &session_attrs()).unwrap();
        assert_eq!(again, Registration { descriptor_id: 1, newly_registered: false });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_monotonic_from_base() {
        let mut registry = DescriptorRegistry::new(100);
        let ids: Vec<u32> = ["A", "B", "C"]
            .iter()
            .map(|t| registry.register_if_absent(t, &session_attrs()).unwrap().descriptor_id)
            .collect();
        assert_eq!(ids, vec![100, 101, 102]);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut registry = DescriptorRegistry::default();
        let attrs = vec![
            AttributeDescriptor::new("x", PrimitiveType::Int),
            AttributeDescriptor::new("x", PrimitiveType::Int),
        ];
        let err = registry.register_if_absent("Dup", &attrs).unwrap_err();
        assert!(matches!(err, FnfError::DuplicateAttributeName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_unknown_id() {
        let registry = DescriptorRegistry::default();
        assert!(matches!(registry.resolve(7), Err(FnfError::NoSuchDescriptor(7))));
    }

    #[test]
    fn test_install_and_conflict() {
        let mut registry = DescriptorRegistry::default();
        let descriptor = RecordDescriptor::new(5, "Session", session_attrs());
        assert!(registry.install(&descriptor).unwrap());
        assert!(!registry.install(&descriptor).unwrap());
        assert_eq!(registry.resolve(5).unwrap(), descriptor);

        let other = RecordDescriptor::new(5, "Other", session_attrs());
        assert!(matches!(
            registry.install(&other),
            Err(FnfError::DescriptorIdConflict { id: 5 })
        ));

        // Local allocation continues past peer-assigned ids
        let next = registry.register_if_absent("Fresh", &session_attrs()).unwrap();
        assert_eq!(next.descriptor_id, 6);
    }

    #[test]
    fn test_reserved_fields_reported() {
        let attrs = vec![AttributeDescriptor::new("a*b", PrimitiveType::Int).with_description("cost $")];
        let fields = reserved_fields("T", &attrs);
        assert_eq!(fields.len(), 2);
    }
}
