//! Attribute type system
//!
//! Primitive type ids follow the XDR-style numbering used on the binary
//! wire. Arrays and structures are the v3.5 extension: an array sets
//! [`ARRAY_FLAG`] over its element id, a structure uses
//! [`STRUCTURE_TYPE_ID`] and names its nested record type through the
//! attribute's derived type.

use std::fmt;

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{FnfError, Result};

/// Type id of a nested structure attribute.
pub const STRUCTURE_TYPE_ID: u32 = 0x31;
/// Wire tag bit marking an array of the element type in the low bits.
pub const ARRAY_FLAG: u32 = 0x0001_0000;
/// Wire tag bit marking an optional attribute.
pub const OPTIONAL_FLAG: u32 = 0x0002_0000;

/// Primitive value types
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum PrimitiveType {
    Int = 0x21,
    UnsignedInt = 0x22,
    Long = 0x23,
    UnsignedLong = 0x24,
    Float = 0x25,
    Double = 0x26,
    HexBinary = 0x27,
    String = 0x28,
    Boolean = 0x29,
    Byte = 0x2A,
    UnsignedByte = 0x2B,
    Short = 0x2C,
    UnsignedShort = 0x2D,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 13] = [
        PrimitiveType::Int,
        PrimitiveType::UnsignedInt,
        PrimitiveType::Long,
        PrimitiveType::UnsignedLong,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::HexBinary,
        PrimitiveType::String,
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::UnsignedByte,
        PrimitiveType::Short,
        PrimitiveType::UnsignedShort,
    ];

    pub fn type_id(self) -> u32 {
        self as u32
    }

    /// Schema (XSD) name of the type
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Int => "int",
            PrimitiveType::UnsignedInt => "unsignedInt",
            PrimitiveType::Long => "long",
            PrimitiveType::UnsignedLong => "unsignedLong",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::HexBinary => "hexBinary",
            PrimitiveType::String => "string",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::UnsignedByte => "unsignedByte",
            PrimitiveType::Short => "short",
            PrimitiveType::UnsignedShort => "unsignedShort",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Base primitive of a derived type name (e.g. `ipV4Addr` is carried as `unsignedInt`).
    pub fn for_derived(name: &str) -> Option<Self> {
        match name {
            "dateTime" | "ipV4Addr" => Some(PrimitiveType::UnsignedInt),
            "dateTimeMsec" => Some(PrimitiveType::UnsignedLong),
            "dateTimeUsec" | "macAddress" => Some(PrimitiveType::Long),
            "ipV6Addr" | "ipAddr" | "UUID" => Some(PrimitiveType::HexBinary),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Primitive(PrimitiveType),
    /// Nested record of the named type
    Structure(String),
    /// Homogeneous sequence; the element is never itself an array
    Array(Box<AttributeType>),
}

impl AttributeType {
    pub fn array_of(element: AttributeType) -> Self {
        AttributeType::Array(Box::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, AttributeType::Primitive(_))
    }

    /// Wire type id, without the optional flag
    pub fn type_id(&self) -> u32 {
        match self {
            AttributeType::Primitive(p) => p.type_id(),
            AttributeType::Structure(_) => STRUCTURE_TYPE_ID,
            AttributeType::Array(element) => ARRAY_FLAG | element.type_id(),
        }
    }

    /// Rebuild a type from its wire id. `derived` names the nested type of structures.
    pub fn from_type_id(id: u32, derived: &str) -> Result<Self> {
        if id & ARRAY_FLAG != 0 {
            let element = Self::from_type_id(id & !ARRAY_FLAG, derived)?;
            return Ok(AttributeType::array_of(element));
        }
        if id == STRUCTURE_TYPE_ID {
            if derived.is_empty() {
                return Err(FnfError::NonPrimitiveDataType(
                    "structure without a nested type name".to_string(),
                ));
            }
            return Ok(AttributeType::Structure(derived.to_string()));
        }
        PrimitiveType::try_from(id)
            .map(AttributeType::Primitive)
            .map_err(|_| FnfError::NonPrimitiveDataType(format!("type id 0x{:x}", id)))
    }

    /// Reject shapes the wire cannot carry
    pub fn validate(&self) -> Result<()> {
        match self {
            AttributeType::Primitive(_) => Ok(()),
            AttributeType::Structure(name) if name.is_empty() => Err(FnfError::NonPrimitiveDataType(
                "structure without a nested type name".to_string(),
            )),
            AttributeType::Structure(_) => Ok(()),
            AttributeType::Array(element) => match element.as_ref() {
                AttributeType::Array(_) => Err(FnfError::NonPrimitiveDataType(format!(
                    "nested array {}",
                    self
                ))),
                other => other.validate(),
            },
        }
    }

    /// Parse a schema type name: primitive, derived, `array<T>` or `struct<Name>`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix("array<").and_then(|s| s.strip_suffix('>')) {
            let ty = AttributeType::array_of(Self::parse(inner)?);
            ty.validate()?;
            return Ok(ty);
        }
        if let Some(inner) = text.strip_prefix("struct<").and_then(|s| s.strip_suffix('>')) {
            let ty = AttributeType::Structure(inner.trim().to_string());
            ty.validate()?;
            return Ok(ty);
        }
        PrimitiveType::from_name(text)
            .or_else(|| PrimitiveType::for_derived(text))
            .map(AttributeType::Primitive)
            .ok_or_else(|| FnfError::NonPrimitiveDataType(text.to_string()))
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Primitive(p) => f.write_str(p.name()),
            AttributeType::Structure(name) => write!(f, "struct<{}>", name),
            AttributeType::Array(element) => write!(f, "array<{}>", element),
        }
    }
}

impl From<PrimitiveType> for AttributeType {
    fn from(p: PrimitiveType) -> Self {
        AttributeType::Primitive(p)
    }
}

/// Whether an attribute must be present in every record of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optionality {
    #[default]
    Optional,
    Mandatory,
}

/// Name, type and provenance of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor {
    pub name: String,
    pub attr_type: AttributeType,
    pub optionality: Optionality,
    /// Source type name before mapping to the wire type
    pub derived_type: String,
    pub description: String,
}

impl AttributeDescriptor {
    /// Create a descriptor whose derived type defaults to the declared type
    pub fn new(name: impl Into<String>, attr_type: impl Into<AttributeType>) -> Self {
        let attr_type = attr_type.into();
        let derived_type = default_derived(&attr_type);
        Self {
            name: name.into(),
            attr_type,
            optionality: Optionality::default(),
            derived_type,
            description: String::new(),
        }
    }

    pub fn with_derived(mut self, derived_type: impl Into<String>) -> Self {
        self.derived_type = derived_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.optionality = Optionality::Mandatory;
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.optionality == Optionality::Mandatory
    }

    /// Type id plus the optional flag, as written on the wire
    pub fn wire_tag(&self) -> u32 {
        match self.optionality {
            Optionality::Optional => self.attr_type.type_id() | OPTIONAL_FLAG,
            Optionality::Mandatory => self.attr_type.type_id(),
        }
    }

    /// Rebuild a descriptor from its wire fields
    pub fn from_wire(name: String, tag: u32, description: String, derived_type: String) -> Result<Self> {
        let optionality = if tag & OPTIONAL_FLAG != 0 {
            Optionality::Optional
        } else {
            Optionality::Mandatory
        };
        let attr_type = AttributeType::from_type_id(tag & !OPTIONAL_FLAG, &derived_type)?;
        attr_type.validate()?;
        let derived_type = if derived_type.is_empty() {
            default_derived(&attr_type)
        } else {
            derived_type
        };
        Ok(Self {
            name,
            attr_type,
            optionality,
            derived_type,
            description,
        })
    }
}

fn default_derived(attr_type: &AttributeType) -> String {
    match attr_type {
        AttributeType::Structure(name) => name.clone(),
        AttributeType::Array(element) => default_derived(element),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_round_trip() {
        let ty = AttributeType::array_of(AttributeType::Structure("Hop".to_string()));
        assert_eq!(ty.type_id(), ARRAY_FLAG | STRUCTURE_TYPE_ID);
        assert_eq!(AttributeType::from_type_id(ty.type_id(), "Hop").unwrap(), ty);
    }

    #[test]
    fn test_unknown_type_id_rejected() {
        let err = AttributeType::from_type_id(0x99, "").unwrap_err();
        assert!(matches!(err, FnfError::NonPrimitiveDataType(_)));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            AttributeType::parse("unsignedLong").unwrap(),
            AttributeType::Primitive(PrimitiveType::UnsignedLong)
        );
        assert_eq!(
            AttributeType::parse("ipV4Addr").unwrap(),
            AttributeType::Primitive(PrimitiveType::UnsignedInt)
        );
        assert_eq!(
            AttributeType::parse("array<string>").unwrap().to_string(),
            "array<string>"
        );
        assert!(AttributeType::parse("array<array<int>>").is_err());
        assert!(AttributeType::parse("varchar").is_err());
    }

    #[test]
    fn test_descriptor_defaults_and_wire_tag() {
        let attr = AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong);
        assert_eq!(attr.derived_type, "unsignedLong");
        assert_eq!(attr.wire_tag(), 0x24 | OPTIONAL_FLAG);

        let attr = attr.mandatory();
        let back = AttributeDescriptor::from_wire(
            "bytesIn".to_string(),
            attr.wire_tag(),
            String::new(),
            String::new(),
        )
        .unwrap();
        assert_eq!(back, attr);
    }
}
