use soapcall_util::{DecodeError, EncodeError};
use soapcall_wsdl::error::Error as WsdlError;
use thiserror::Error;

use crate::transport::TransportError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid WSDL source {url}: {reason}")]
    InvalidWsdlUrl { url: String, reason: String },

    #[error("Unable to parse WSDL from {url}")]
    Parse {
        url: String,
        #[source]
        source: WsdlError,
    },

    #[error("WSDL from {url} declares no service address")]
    NoEndpoint { url: String },

    #[error("Request body for operation {operation:?} is empty")]
    EmptyBody { operation: String },

    #[error("Unable to encode request for operation {operation:?}")]
    Encode {
        operation: String,
        #[source]
        source: EncodeError,
    },

    #[error("HTTP exchange with {url} failed for operation {operation:?}")]
    Transport {
        operation: String,
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Unable to decode response")]
    Decode(#[from] DecodeError),
}
