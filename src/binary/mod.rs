//! Binary FNF codec
//!
//! A compact, descriptor-cached encoding: the header, then a sequence of
//! discriminated elements. All integers are big-endian.

pub mod codec;
pub mod reader;
pub mod wire;
pub mod writer;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
