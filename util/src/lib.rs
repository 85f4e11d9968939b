pub mod error;
pub mod soap;
pub mod xml;

pub use error::{DecodeError, EncodeError};
pub use soap::{Envelope, Fault, OperationBody};
pub use xml::{Params, ToXml, Value};
