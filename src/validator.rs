//! Schema Validator
//!
//! Cross-checks a decoded record against an independently loaded schema:
//! every attribute must be declared, carry the declared type and appear in
//! schema order, and every mandatory attribute must be present. Nested
//! structures are checked against their own type's schema.

use crate::data::IpdrData;
use crate::error::{FnfError, Result};
use crate::record::FnfData;
use crate::schema::Schema;

/// Validate one record; the first violation found is returned
pub fn validate(record: &FnfData, schema: &Schema) -> Result<()> {
    let type_name = record.type_name();
    let record_schema = schema
        .record_type(type_name)
        .ok_or_else(|| FnfError::NoSuchTypeInSchema(type_name.to_string()))?;

    let mut last_position: Option<usize> = None;
    for (attr, value) in record.iter() {
        let position = record_schema
            .position(&attr.name)
            .ok_or_else(|| FnfError::NoSuchAttributeInSchema {
                type_name: type_name.to_string(),
                attribute: attr.name.clone(),
            })?;

        let declared = &record_schema.attributes[position];
        if attr.attr_type != declared.attr_type || !value.matches(&declared.attr_type) {
            return Err(FnfError::SchemaTypeMismatch {
                type_name: type_name.to_string(),
                attribute: attr.name.clone(),
                expected: declared.attr_type.to_string(),
                found: attr.attr_type.to_string(),
            });
        }

        if last_position.is_some_and(|last| position <= last) {
            return Err(FnfError::InvalidOrder {
                type_name: type_name.to_string(),
                attribute: attr.name.clone(),
            });
        }
        last_position = Some(position);

        validate_nested(value, schema)?;
    }

    if let Some(missing) = record_schema
        .attributes
        .iter()
        .find(|declared| declared.is_mandatory() && record.get(&declared.name).is_none())
    {
        return Err(FnfError::MandatoryAttrNotFound {
            type_name: type_name.to_string(),
            attribute: missing.name.clone(),
        });
    }

    Ok(())
}

fn validate_nested(value: &IpdrData, schema: &Schema) -> Result<()> {
    match value {
        IpdrData::Structure(nested) => validate(nested, schema),
        IpdrData::Array(items) => items.iter().try_for_each(|item| validate_nested(item, schema)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{AttributeDescriptor, AttributeType, PrimitiveType};

    fn bytes_in() -> AttributeDescriptor {
        AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong).mandatory()
    }

    fn user() -> AttributeDescriptor {
        AttributeDescriptor::new("user", PrimitiveType::String)
    }

    fn schema() -> Schema {
        Schema::new()
            .with_type("Session", vec![bytes_in(), user()])
            .unwrap()
            .with_type("Hop", vec![AttributeDescriptor::new("addr", PrimitiveType::String).mandatory()])
            .unwrap()
            .with_type(
                "Trace",
                vec![AttributeDescriptor::new(
                    "hops",
                    AttributeType::array_of(AttributeType::Structure("Hop".into())),
                )],
            )
            .unwrap()
    }

    fn code_of(record: &FnfData) -> ErrorCode {
        validate(record, &schema()).unwrap_err().code()
    }

    #[test]
    fn test_valid_record() {
        let record = FnfData::new("Session")
            .with(bytes_in(), 12345u64)
            .unwrap()
            .with(user(), "alice")
            .unwrap();
        assert!(validate(&record, &schema()).is_ok());
    }

    #[test]
    fn test_optional_attribute_may_be_absent() {
        let record = FnfData::new("Session").with(bytes_in(), 1u64).unwrap();
        assert!(validate(&record, &schema()).is_ok());
    }

    #[test]
    fn test_mandatory_missing() {
        let record = FnfData::new("Session").with(user(), "alice").unwrap();
        assert_eq!(code_of(&record), ErrorCode::MandatoryAttrNotFound);
    }

    #[test]
    fn test_out_of_order() {
        let record = FnfData::new("Session")
            .with(user(), "alice")
            .unwrap()
            .with(bytes_in(), 1u64)
            .unwrap();
        assert_eq!(code_of(&record), ErrorCode::InvalidOrder);
    }

    #[test]
    fn test_type_mismatch() {
        let record = FnfData::new("Session")
            .with(AttributeDescriptor::new("bytesIn", PrimitiveType::String), "12345")
            .unwrap();
        assert_eq!(code_of(&record), ErrorCode::MismatchInputWithSchemaDatatype);
    }

    #[test]
    fn test_undeclared_attribute_and_type() {
        let record = FnfData::new("Session")
            .with(bytes_in(), 1u64)
            .unwrap()
            .with(AttributeDescriptor::new("extra", PrimitiveType::Int), 3i32)
            .unwrap();
        assert_eq!(code_of(&record), ErrorCode::NoSuchAttributeInSchema);
        assert_eq!(code_of(&FnfData::new("Unknown")), ErrorCode::NoSuchTypeInSchema);
    }

    #[test]
    fn test_nested_structures_checked() {
        let hop = FnfData::new("Hop");
        let trace = FnfData::new("Trace")
            .with(
                AttributeDescriptor::new("hops", AttributeType::array_of(AttributeType::Structure("Hop".into()))),
                IpdrData::Array(vec![hop.into()]),
            )
            .unwrap();
        assert_eq!(code_of(&trace), ErrorCode::MandatoryAttrNotFound);
    }
}
