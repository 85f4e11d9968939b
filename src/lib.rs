//! A blocking SOAP client driven by WSDL documents.
//!
//! A [`Client`] is built from a WSDL source. On first use it loads the
//! document, picks the first address of the first port of the first service,
//! wraps the operation and its parameters in a SOAP 1.1 envelope and posts
//! it. The response comes back as a [`CallResult`] that can be projected
//! onto any `serde` type.
//!
//! ```no_run
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct CapitalCityResponse {
//!     #[serde(rename = "CapitalCityResult")]
//!     city: String,
//! }
//!
//! # fn main() -> soapcall::Result<()> {
//! let client = soapcall::Client::new(
//!     "http://webservices.oorsprong.org/websamples.countryinfo/CountryInfoService.wso?WSDL",
//! );
//!
//! let result = client.call("CapitalCity", [("sCountryISOCode", "GB")])?;
//! let response: CapitalCityResponse = result.unmarshal()?;
//! assert_eq!(response.city, "London");
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod request;
mod response;

pub mod transport;

pub use client::{Client, WsdlSource};
pub use error::{Error, Result};
pub use request::{Operation, SoapRequest};
pub use response::CallResult;
pub use transport::{Transport, TransportError};

pub use soapcall_util::{DecodeError, EncodeError, Fault, Params, Value};
pub use soapcall_wsdl::{self as wsdl, Definition, ServiceEndpoint};
