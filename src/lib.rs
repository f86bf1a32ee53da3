//! IPDR Flexible Named Field records
//!
//! A record-interchange library for self-describing, strongly typed
//! records, with two encodings of the same data model.
//!
//! ## Features
//!
//! - **Descriptor caching**: each distinct record shape is described once per
//!   stream and referenced by a small integer id afterwards
//! - **Binary codec**: compact big-endian stream of discriminated elements
//! - **XML codec**: human-readable documents, read with an explicit state machine
//! - **Schema validation**: optional cross-check of records against declared types
//! - **Error reporting**: every condition is recorded with a severity; an
//!   unrecoverable one terminates the session
//!
//! ## Architecture
//!
//! ```text
//! types / data / record      data model (attribute types, values, records)
//! registry                   signature <-> descriptor id, per session
//! stream                     element envelope (descriptor, record, doc end)
//! binary/                    wire primitives, element codec, reader, writer
//! xml/                       state machine, schema coercion, reader, writer
//! schema / validator         record schemas and the validator
//! session / report / error   per-stream state and the error taxonomy
//! ```
//!
//! ## Example
//!
//! ```
//! use ipdr_fnf::{AttributeDescriptor, BinaryReader, BinaryWriter, FnfConfig, FnfData, PrimitiveType};
//!
//! let config = FnfConfig::default();
//! let record = FnfData::new("Session")
//!     .with(AttributeDescriptor::new("bytesIn", PrimitiveType::UnsignedLong), 12345u64)?;
//!
//! let mut writer = BinaryWriter::new(Vec::new(), &config);
//! writer.write_record(&record)?;
//! let bytes = writer.finish()?;
//!
//! let mut reader = BinaryReader::new(bytes.as_slice(), &config);
//! assert_eq!(reader.read_next()?, Some(record));
//! # Ok::<(), ipdr_fnf::FnfError>(())
//! ```

pub mod binary;
pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod record;
pub mod registry;
pub mod report;
pub mod schema;
pub mod session;
pub mod stream;
pub mod types;
pub mod validator;
pub mod xml;

pub use binary::{BinaryReader, BinaryWriter};
pub use config::FnfConfig;
pub use data::IpdrData;
pub use document::{DocEnd, DocHeader, DocVersion};
pub use error::{ErrorCode, FnfError, Result};
pub use record::{FnfData, RecordDescriptor};
pub use registry::DescriptorRegistry;
pub use report::{ErrorList, ErrorRecord, ErrorSink, Severity};
pub use schema::Schema;
pub use session::{Session, SessionState};
pub use stream::{Discriminator, StreamElement};
pub use types::{AttributeDescriptor, AttributeType, Optionality, PrimitiveType};
pub use xml::{XmlReader, XmlWriter};
