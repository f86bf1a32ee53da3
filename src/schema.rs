//! Record schemas
//!
//! A schema lists, per record type name, the attributes a record of that
//! type may carry, in order, with their declared types and optionality.
//! Schemas are loaded independently of the stream (JSON or TOML) and are
//! optional for a session.
//!
//! ## Example (schema.toml)
//! ```toml
//! namespace = "http://example.com/session"
//!
//! [[types]]
//! name = "Session"
//!
//! [[types.attributes]]
//! name = "bytesIn"
//! type = "unsignedLong"
//! optionality = "mandatory"
//!
//! [[types.attributes]]
//! name = "srcIp"
//! type = "ipV4Addr"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FnfError, Result};
use crate::types::{AttributeDescriptor, AttributeType, Optionality, PrimitiveType};

/// Serialized schema document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub types: Vec<RecordTypeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordTypeDef {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    /// Primitive, derived, `array<T>` or `struct<Name>`
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optionality: Optionality,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Ordered attribute definitions of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub type_name: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl RecordSchema {
    /// Schema position of an attribute
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Record schemas keyed by type name
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub namespace: Option<String>,
    types: HashMap<String, RecordSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a record type
    pub fn add_type(&mut self, type_name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Result<()> {
        let type_name = type_name.into();
        for (i, attr) in attributes.iter().enumerate() {
            attr.attr_type.validate()?;
            if attributes[..i].iter().any(|prev| prev.name == attr.name) {
                return Err(FnfError::DuplicateAttributeName {
                    type_name,
                    attribute: attr.name.clone(),
                });
            }
        }
        self.types.insert(
            type_name.clone(),
            RecordSchema {
                type_name,
                attributes,
            },
        );
        Ok(())
    }

    /// Builder-style [`add_type`](Self::add_type)
    pub fn with_type(mut self, type_name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Result<Self> {
        self.add_type(type_name, attributes)?;
        Ok(self)
    }

    pub fn record_type(&self, type_name: &str) -> Option<&RecordSchema> {
        self.types.get(type_name)
    }

    /// Attribute descriptors for writing records of this type
    pub fn descriptor_for(&self, type_name: &str) -> Option<&[AttributeDescriptor]> {
        self.types.get(type_name).map(|t| t.attributes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_file_def(def: SchemaFile) -> Result<Self> {
        let mut schema = Schema {
            namespace: def.namespace,
            types: HashMap::new(),
        };
        for ty in def.types {
            let attributes = ty
                .attributes
                .iter()
                .map(attribute_from_def)
                .collect::<Result<Vec<_>>>()?;
            schema.add_type(ty.name, attributes)?;
        }
        Ok(schema)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_file_def(serde_json::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_file_def(toml::from_str(content)?)
    }

    /// Load a schema file; `.toml` files are TOML, anything else JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}

fn attribute_from_def(def: &AttributeDef) -> Result<AttributeDescriptor> {
    let attr_type = AttributeType::parse(&def.type_name)?;
    let mut attr = AttributeDescriptor::new(def.name.clone(), attr_type)
        .with_description(def.description.clone());
    if PrimitiveType::for_derived(def.type_name.trim()).is_some() {
        attr = attr.with_derived(def.type_name.trim());
    }
    attr.optionality = def.optionality;
    Ok(attr)
}
