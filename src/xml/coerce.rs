//! Schema-driven typing of records read from XML
//!
//! XML leaves arrive as strings. When a schema declares the record's type,
//! each declared leaf is parsed into its primitive, a single occurrence of
//! an array attribute becomes a one-element array, and structures take the
//! declared nested type name. Undeclared attributes are left as read for
//! the validator to report.

use crate::data::IpdrData;
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::schema::Schema;
use crate::types::AttributeType;

/// Type the values of `record` according to `schema`
pub fn coerce(record: &FnfData, schema: &Schema) -> Result<FnfData> {
    let Some(record_schema) = schema.record_type(record.type_name()) else {
        return Ok(record.clone());
    };

    let mut descriptors = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    for (descriptor, value) in record.iter() {
        match record_schema.attribute(&descriptor.name) {
            Some(declared) => {
                let typed = coerce_value(value.clone(), &declared.attr_type, record.type_name(), &declared.name, schema)?;
                if typed.matches(&declared.attr_type) {
                    descriptors.push(declared.clone());
                } else {
                    descriptors.push(descriptor.clone());
                }
                values.push(typed);
            }
            None => {
                descriptors.push(descriptor.clone());
                values.push(value.clone());
            }
        }
    }
    FnfData::from_parts(record.type_name(), descriptors, values)
}

fn coerce_value(
    value: IpdrData,
    declared: &AttributeType,
    type_name: &str,
    attribute: &str,
    schema: &Schema,
) -> Result<IpdrData> {
    match (declared, value) {
        (AttributeType::Primitive(p), IpdrData::String(text)) => {
            IpdrData::parse_as(*p, &text).map_err(|_| FnfError::SchemaTypeMismatch {
                type_name: type_name.to_string(),
                attribute: attribute.to_string(),
                expected: p.name().to_string(),
                found: format!("'{}'", text),
            })
        }
        (AttributeType::Array(element), IpdrData::Array(items)) => items
            .into_iter()
            .map(|item| coerce_value(item, element, type_name, attribute, schema))
            .collect::<Result<Vec<_>>>()
            .map(IpdrData::Array),
        (AttributeType::Array(element), single) => {
            let typed = coerce_value(single, element, type_name, attribute, schema)?;
            if typed.matches(element) {
                Ok(IpdrData::Array(vec![typed]))
            } else {
                Ok(typed)
            }
        }
        (AttributeType::Structure(nested_type), IpdrData::Structure(nested)) => {
            let (_, descriptors, values) = nested.into_parts();
            let renamed = FnfData::from_parts(nested_type.clone(), descriptors, values)?;
            Ok(coerce(&renamed, schema)?.into())
        }
        (_, other) => Ok(other),
    }
}
