//! Typed attribute values

use std::fmt;

use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::types::{AttributeType, PrimitiveType};

/// One attribute value. Exactly one payload per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum IpdrData {
    Int(i32),
    UnsignedInt(u32),
    Long(i64),
    UnsignedLong(u64),
    Float(f32),
    Double(f64),
    HexBinary(Vec<u8>),
    String(String),
    Boolean(bool),
    Byte(i8),
    UnsignedByte(u8),
    Short(i16),
    UnsignedShort(u16),
    Array(Vec<IpdrData>),
    Structure(Box<FnfData>),
}

impl IpdrData {
    /// Primitive tag of the payload, `None` for arrays and structures
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        let p = match self {
            IpdrData::Int(_) => PrimitiveType::Int,
            IpdrData::UnsignedInt(_) => PrimitiveType::UnsignedInt,
            IpdrData::Long(_) => PrimitiveType::Long,
            IpdrData::UnsignedLong(_) => PrimitiveType::UnsignedLong,
            IpdrData::Float(_) => PrimitiveType::Float,
            IpdrData::Double(_) => PrimitiveType::Double,
            IpdrData::HexBinary(_) => PrimitiveType::HexBinary,
            IpdrData::String(_) => PrimitiveType::String,
            IpdrData::Boolean(_) => PrimitiveType::Boolean,
            IpdrData::Byte(_) => PrimitiveType::Byte,
            IpdrData::UnsignedByte(_) => PrimitiveType::UnsignedByte,
            IpdrData::Short(_) => PrimitiveType::Short,
            IpdrData::UnsignedShort(_) => PrimitiveType::UnsignedShort,
            IpdrData::Array(_) | IpdrData::Structure(_) => return None,
        };
        Some(p)
    }

    /// Whether this value can be carried under the given declared type
    pub fn matches(&self, attr_type: &AttributeType) -> bool {
        match (self, attr_type) {
            (IpdrData::Array(items), AttributeType::Array(element)) => {
                items.iter().all(|item| item.matches(element))
            }
            (IpdrData::Structure(record), AttributeType::Structure(name)) => record.type_name() == name,
            (value, AttributeType::Primitive(p)) => value.primitive_type() == Some(*p),
            _ => false,
        }
    }

    /// Short type label for diagnostics
    pub fn kind(&self) -> String {
        match self {
            IpdrData::Array(_) => "array".to_string(),
            IpdrData::Structure(record) => format!("struct<{}>", record.type_name()),
            other => other
                .primitive_type()
                .map(|p| p.name().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IpdrData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text form of a primitive value, `None` for arrays and structures
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            IpdrData::Int(v) => v.to_string(),
            IpdrData::UnsignedInt(v) => v.to_string(),
            IpdrData::Long(v) => v.to_string(),
            IpdrData::UnsignedLong(v) => v.to_string(),
            IpdrData::Float(v) => v.to_string(),
            IpdrData::Double(v) => v.to_string(),
            IpdrData::HexBinary(v) => hex::encode(v),
            IpdrData::String(v) => v.clone(),
            IpdrData::Boolean(v) => v.to_string(),
            IpdrData::Byte(v) => v.to_string(),
            IpdrData::UnsignedByte(v) => v.to_string(),
            IpdrData::Short(v) => v.to_string(),
            IpdrData::UnsignedShort(v) => v.to_string(),
            IpdrData::Array(_) | IpdrData::Structure(_) => return None,
        };
        Some(text)
    }

    /// Parse the text form of a primitive value
    pub fn parse_as(p: PrimitiveType, text: &str) -> Result<Self> {
        let invalid = || FnfError::InvalidValue {
            expected: p.name().to_string(),
            text: text.to_string(),
        };
        let t = text.trim();
        let value = match p {
            PrimitiveType::Int => IpdrData::Int(t.parse().map_err(|_| invalid())?),
            PrimitiveType::UnsignedInt => IpdrData::UnsignedInt(t.parse().map_err(|_| invalid())?),
            PrimitiveType::Long => IpdrData::Long(t.parse().map_err(|_| invalid())?),
            PrimitiveType::UnsignedLong => IpdrData::UnsignedLong(t.parse().map_err(|_| invalid())?),
            PrimitiveType::Float => IpdrData::Float(t.parse().map_err(|_| invalid())?),
            PrimitiveType::Double => IpdrData::Double(t.parse().map_err(|_| invalid())?),
            PrimitiveType::HexBinary => IpdrData::HexBinary(hex::decode(t).map_err(|_| invalid())?),
            PrimitiveType::String => IpdrData::String(text.to_string()),
            PrimitiveType::Boolean => match t {
                "true" | "1" => IpdrData::Boolean(true),
                "false" | "0" => IpdrData::Boolean(false),
                _ => return Err(invalid()),
            },
            PrimitiveType::Byte => IpdrData::Byte(t.parse().map_err(|_| invalid())?),
            PrimitiveType::UnsignedByte => IpdrData::UnsignedByte(t.parse().map_err(|_| invalid())?),
            PrimitiveType::Short => IpdrData::Short(t.parse().map_err(|_| invalid())?),
            PrimitiveType::UnsignedShort => IpdrData::UnsignedShort(t.parse().map_err(|_| invalid())?),
        };
        Ok(value)
    }
}

impl fmt::Display for IpdrData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpdrData::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            IpdrData::Structure(record) => write!(f, "{}", record),
            other => f.write_str(&other.to_text().unwrap_or_default()),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for IpdrData {
                fn from(v: $ty) -> Self {
                    IpdrData::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    i32 => Int,
    u32 => UnsignedInt,
    i64 => Long,
    u64 => UnsignedLong,
    f32 => Float,
    f64 => Double,
    Vec<u8> => HexBinary,
    String => String,
    bool => Boolean,
    i8 => Byte,
    u8 => UnsignedByte,
    i16 => Short,
    u16 => UnsignedShort,
}

impl From<&str> for IpdrData {
    fn from(v: &str) -> Self {
        IpdrData::String(v.to_string())
    }
}

impl From<FnfData> for IpdrData {
    fn from(v: FnfData) -> Self {
        IpdrData::Structure(Box::new(v))
    }
}
