//! Error types for the FNF record codec

use std::fmt;

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, FnfError>;

/// Stable error codes reported to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NullInputParameter,
    MemoryAllocationFailed,
    NonPrimitiveDataType,
    MismatchDescriptorDataArray,
    NoSuchDescriptor,
    DuplicateAttributeName,
    InvalidDiscriminator,
    MandatoryAttrNotFound,
    InvalidOrder,
    MismatchInputWithSchemaDatatype,
    NoSuchAttributeInSchema,
    NoSuchTypeInSchema,
    EofEncountered,
    ParsingError,
    InvalidSignature,
    DescriptorIdConflict,
    UnsupportedVersion,
    InvalidValue,
    InvalidTimestamp,
    ReservedCharacter,
    CountMismatch,
    HeaderAlreadyWritten,
    SessionTerminated,
    IoError,
    ConfigError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NullInputParameter => "NullInputParameter",
            ErrorCode::MemoryAllocationFailed => "MemoryAllocationFailed",
            ErrorCode::NonPrimitiveDataType => "NonPrimitiveDataType",
            ErrorCode::MismatchDescriptorDataArray => "MismatchDescriptorDataArray",
            ErrorCode::NoSuchDescriptor => "NoSuchDescriptor",
            ErrorCode::DuplicateAttributeName => "DuplicateAttributeName",
            ErrorCode::InvalidDiscriminator => "InvalidDiscriminator",
            ErrorCode::MandatoryAttrNotFound => "MandatoryAttrNotFound",
            ErrorCode::InvalidOrder => "InvalidOrder",
            ErrorCode::MismatchInputWithSchemaDatatype => "MismatchInputWithSchemaDatatype",
            ErrorCode::NoSuchAttributeInSchema => "NoSuchAttributeInSchema",
            ErrorCode::NoSuchTypeInSchema => "NoSuchTypeInSchema",
            ErrorCode::EofEncountered => "EOFEncountered",
            ErrorCode::ParsingError => "ParsingError",
            ErrorCode::InvalidSignature => "InvalidSignature",
            ErrorCode::DescriptorIdConflict => "DescriptorIdConflict",
            ErrorCode::UnsupportedVersion => "UnsupportedVersion",
            ErrorCode::InvalidValue => "InvalidValue",
            ErrorCode::InvalidTimestamp => "InvalidTimestamp",
            ErrorCode::ReservedCharacter => "ReservedCharacter",
            ErrorCode::CountMismatch => "CountMismatch",
            ErrorCode::HeaderAlreadyWritten => "HeaderAlreadyWritten",
            ErrorCode::SessionTerminated => "SessionTerminated",
            ErrorCode::IoError => "IoError",
            ErrorCode::ConfigError => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec errors
#[derive(Error, Debug)]
pub enum FnfError {
    #[error("Missing input: {0}")]
    NullInput(&'static str),

    #[error("Length {requested} exceeds limit {limit}")]
    ResourceExhausted { requested: usize, limit: usize },

    #[error("Structures nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("Not a primitive data type: {0}")]
    NonPrimitiveDataType(String),

    #[error("Descriptor/data mismatch: {descriptors} descriptors, {values} values")]
    MismatchDescriptorDataArray { descriptors: usize, values: usize },

    #[error("Value for attribute '{attribute}' is {found}, descriptor says {expected}")]
    ValueTypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("No such descriptor: {0}")]
    NoSuchDescriptor(u32),

    #[error("Duplicate attribute '{attribute}' in type {type_name}")]
    DuplicateAttributeName { type_name: String, attribute: String },

    #[error("Invalid stream element discriminator: {0}")]
    InvalidDiscriminator(u32),

    #[error("Mandatory attribute '{attribute}' of {type_name} not found")]
    MandatoryAttrNotFound { type_name: String, attribute: String },

    #[error("Attribute '{attribute}' of {type_name} is out of schema order")]
    InvalidOrder { type_name: String, attribute: String },

    #[error("Attribute '{attribute}' of {type_name} is {found}, schema declares {expected}")]
    SchemaTypeMismatch {
        type_name: String,
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("Attribute '{attribute}' not declared for {type_name} in schema")]
    NoSuchAttributeInSchema { type_name: String, attribute: String },

    #[error("Type {0} not declared in schema")]
    NoSuchTypeInSchema(String),

    #[error("Unexpected end of stream")]
    Eof,

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML structure error at byte {offset}: {message}")]
    XmlStructure { offset: usize, message: String },

    #[error("Invalid descriptor signature: {0}")]
    InvalidSignature(String),

    #[error("Descriptor id {id} already bound to a different type signature")]
    DescriptorIdConflict { id: u32 },

    #[error("Unsupported stream version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("Invalid {expected} value: '{text}'")]
    InvalidValue { expected: String, text: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Reserved signature character in {0}")]
    ReservedCharacter(String),

    #[error("Document end declares {declared} records, {actual} were read")]
    CountMismatch { declared: u64, actual: u64 },

    #[error("Header for document {0} ignored: a header was already written")]
    HeaderAlreadyWritten(uuid::Uuid),

    #[error("Session is terminated after an unrecoverable error")]
    SessionTerminated,

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl From<std::io::Error> for FnfError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FnfError::Eof,
            _ => FnfError::Io(e),
        }
    }
}

impl FnfError {
    /// Code reported to the error sink for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            FnfError::NullInput(_) => ErrorCode::NullInputParameter,
            FnfError::ResourceExhausted { .. } | FnfError::NestingTooDeep { .. } => {
                ErrorCode::MemoryAllocationFailed
            }
            FnfError::NonPrimitiveDataType(_) => ErrorCode::NonPrimitiveDataType,
            FnfError::MismatchDescriptorDataArray { .. } | FnfError::ValueTypeMismatch { .. } => {
                ErrorCode::MismatchDescriptorDataArray
            }
            FnfError::NoSuchDescriptor(_) => ErrorCode::NoSuchDescriptor,
            FnfError::DuplicateAttributeName { .. } => ErrorCode::DuplicateAttributeName,
            FnfError::InvalidDiscriminator(_) => ErrorCode::InvalidDiscriminator,
            FnfError::MandatoryAttrNotFound { .. } => ErrorCode::MandatoryAttrNotFound,
            FnfError::InvalidOrder { .. } => ErrorCode::InvalidOrder,
            FnfError::SchemaTypeMismatch { .. } => ErrorCode::MismatchInputWithSchemaDatatype,
            FnfError::NoSuchAttributeInSchema { .. } => ErrorCode::NoSuchAttributeInSchema,
            FnfError::NoSuchTypeInSchema(_) => ErrorCode::NoSuchTypeInSchema,
            FnfError::Eof => ErrorCode::EofEncountered,
            FnfError::Xml(_) | FnfError::XmlStructure { .. } => ErrorCode::ParsingError,
            FnfError::Json(_) | FnfError::Toml(_) => ErrorCode::ParsingError,
            FnfError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            FnfError::DescriptorIdConflict { .. } => ErrorCode::DescriptorIdConflict,
            FnfError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            FnfError::InvalidValue { .. } | FnfError::Utf8(_) | FnfError::Uuid(_) => {
                ErrorCode::InvalidValue
            }
            FnfError::InvalidTimestamp(_) => ErrorCode::InvalidTimestamp,
            FnfError::ReservedCharacter(_) => ErrorCode::ReservedCharacter,
            FnfError::CountMismatch { .. } => ErrorCode::CountMismatch,
            FnfError::HeaderAlreadyWritten(_) => ErrorCode::HeaderAlreadyWritten,
            FnfError::SessionTerminated => ErrorCode::SessionTerminated,
            FnfError::Io(_) => ErrorCode::IoError,
            FnfError::Config(_) => ErrorCode::ConfigError,
        }
    }

    pub(crate) fn xml_structure(offset: usize, message: impl Into<String>) -> Self {
        FnfError::XmlStructure {
            offset,
            message: message.into(),
        }
    }
}
