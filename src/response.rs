use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use soapcall_util::{soap, Fault};
use std::borrow::Cow;

use crate::error::Result;

/// The raw outcome of a call.
///
/// A non-success status is still a result: SOAP servers report faults with
/// a 500 and a well-formed body, so interpreting the status is left to the
/// caller, for example through [`CallResult::fault`].
#[derive(Debug, Clone)]
pub struct CallResult {
    status: StatusCode,
    body: Bytes,
}

impl CallResult {
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// The body as text, decoded with the encoding its XML declaration names.
    pub fn text(&self) -> Result<Cow<'_, str>> {
        Ok(soap::decode_text(&self.body)?)
    }

    /// The content of `soap:Body`, or the whole document if the server did
    /// not answer with an envelope.
    pub fn payload(&self) -> Result<String> {
        Ok(soap::body_payload(&self.text()?)?.to_owned())
    }

    /// Projects the payload onto `T`, matching elements to fields by name.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(soap::decode(&self.text()?)?)
    }

    pub fn fault(&self) -> Result<Option<Fault>> {
        Ok(soap::fault(&self.text()?)?)
    }
}
