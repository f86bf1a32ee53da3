//! XML FNF codec
//!
//! Document layout:
//! ```xml
//! <IPDRDoc xmlns="..." docId="..." creationTime="..." IPDRRecorderInfo="..." version="3.5">
//!   <Session>
//!     <bytesIn>12345</bytesIn>
//!     <user>alice</user>
//!   </Session>
//!   <IPDRDoc.End count="1" endTime="..."/>
//! </IPDRDoc>
//! ```
//! Arrays are repeated sibling elements; structures are nested elements.
//! Without a schema every leaf reads back as a string.

mod coerce;
pub mod reader;
pub mod state;
pub mod writer;

pub use coerce::coerce;
pub use reader::XmlReader;
pub use writer::XmlWriter;

pub const ROOT_ELEMENT: &str = "IPDRDoc";
pub const DOC_END_ELEMENT: &str = "IPDRDoc.End";
/// Record element used with `xsi:type` naming
pub const TYPED_RECORD_ELEMENT: &str = "IPDR";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
