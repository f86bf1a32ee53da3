//! Stream-element envelope
//!
//! After the document header a binary stream is a sequence of elements,
//! each introduced by a u32 discriminator that selects how the payload is
//! read.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::document::DocEnd;
use crate::error::FnfError;
use crate::record::{FnfData, RecordDescriptor};

/// Tag preceding every element of a binary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Discriminator {
    RecordDescriptor = 1,
    Record = 2,
    DocEnd = 3,
}

impl Discriminator {
    /// Decode a discriminator, rejecting unknown values
    pub fn from_wire(value: u32) -> Result<Self, FnfError> {
        Self::try_from(value).map_err(|_| FnfError::InvalidDiscriminator(value))
    }
}

/// One decoded element
#[derive(Debug, Clone, PartialEq)]
pub enum StreamElement {
    /// Binds a type signature to an id for the rest of the session
    RecordDescriptor(RecordDescriptor),
    /// A record, already bound to the descriptor it references
    Record { descriptor_id: u32, record: FnfData },
    DocEnd(DocEnd),
}

impl StreamElement {
    pub fn discriminator(&self) -> Discriminator {
        match self {
            StreamElement::RecordDescriptor(_) => Discriminator::RecordDescriptor,
            StreamElement::Record { .. } => Discriminator::Record,
            StreamElement::DocEnd(_) => Discriminator::DocEnd,
        }
    }
}
