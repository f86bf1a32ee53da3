//! FNF records and record descriptors

use std::fmt;

use crate::data::IpdrData;
use crate::error::{FnfError, Result};
use crate::types::AttributeDescriptor;

/// Deepest structure nesting a decoder accepts below the record itself
pub const MAX_NESTING: usize = 64;

/// Schema of one record shape, bound to a session-unique id.
///
/// Owned by the [`DescriptorRegistry`](crate::registry::DescriptorRegistry)
/// that registered it; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub descriptor_id: u32,
    pub type_name: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl RecordDescriptor {
    pub fn new(descriptor_id: u32, type_name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            descriptor_id,
            type_name: type_name.into(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Zip decoded positional values with this descriptor's attributes
    pub fn bind(&self, values: Vec<IpdrData>) -> Result<FnfData> {
        FnfData::from_parts(self.type_name.clone(), self.attributes.clone(), values)
    }
}

/// A typed record: attribute descriptors and values, positionally aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct FnfData {
    type_name: String,
    descriptors: Vec<AttributeDescriptor>,
    values: Vec<IpdrData>,
}

impl FnfData {
    /// Create an empty record of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            descriptors: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a record from separate halves, checking alignment
    pub fn from_parts(
        type_name: impl Into<String>,
        descriptors: Vec<AttributeDescriptor>,
        values: Vec<IpdrData>,
    ) -> Result<Self> {
        let record = Self {
            type_name: type_name.into(),
            descriptors,
            values,
        };
        record.check_alignment()?;
        Ok(record)
    }

    /// Append one attribute/value pair
    pub fn push(&mut self, descriptor: AttributeDescriptor, value: impl Into<IpdrData>) -> Result<()> {
        let value = value.into();
        check_value(&descriptor, &value)?;
        self.descriptors.push(descriptor);
        self.values.push(value);
        Ok(())
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, descriptor: AttributeDescriptor, value: impl Into<IpdrData>) -> Result<Self> {
        self.push(descriptor, value)?;
        Ok(self)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn values(&self) -> &[IpdrData] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeDescriptor, &IpdrData)> {
        self.descriptors.iter().zip(self.values.iter())
    }

    /// Value of the first attribute with this name
    pub fn get(&self, name: &str) -> Option<&IpdrData> {
        self.iter().find(|(d, _)| d.name == name).map(|(_, v)| v)
    }

    pub fn into_parts(self) -> (String, Vec<AttributeDescriptor>, Vec<IpdrData>) {
        (self.type_name, self.descriptors, self.values)
    }

    /// Verify both halves have the same length and every value matches its descriptor
    pub fn check_alignment(&self) -> Result<()> {
        if self.descriptors.len() != self.values.len() {
            return Err(FnfError::MismatchDescriptorDataArray {
                descriptors: self.descriptors.len(),
                values: self.values.len(),
            });
        }
        for (descriptor, value) in self.iter() {
            check_value(descriptor, value)?;
        }
        Ok(())
    }
}

fn check_value(descriptor: &AttributeDescriptor, value: &IpdrData) -> Result<()> {
    if value.matches(&descriptor.attr_type) {
        Ok(())
    } else {
        Err(FnfError::ValueTypeMismatch {
            attribute: descriptor.name.clone(),
            expected: descriptor.attr_type.to_string(),
            found: value.kind(),
        })
    }
}

impl fmt::Display for FnfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.type_name)?;
        for (i, (descriptor, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {}={}", descriptor.name, value)?;
        }
        f.write_str(" }")
    }
}
