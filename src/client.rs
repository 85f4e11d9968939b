use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};
use serde::Serialize;
use soapcall_util::{Envelope, OperationBody, Params};
use soapcall_wsdl::{self as wsdl, error::Error as WsdlError, Definition, ServiceEndpoint};
use std::{fmt, path::PathBuf, sync::OnceLock};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{Error, Result},
    request::{Operation, SoapRequest},
    response::CallResult,
    transport::{HttpRequest, Transport},
};

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const SOAP_ACTION: &str = "SOAPAction";
const INLINE_SOURCE: &str = "<inline document>";

/// Where the WSDL document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsdlSource {
    /// An `http`, `https` or `file` URL, or a filesystem path.
    Url(String),
    /// The document itself.
    Document(Bytes),
}

impl WsdlSource {
    pub fn document<B: Into<Bytes>>(document: B) -> Self {
        WsdlSource::Document(document.into())
    }
}

impl From<&str> for WsdlSource {
    fn from(url: &str) -> Self {
        WsdlSource::Url(url.to_owned())
    }
}

impl From<String> for WsdlSource {
    fn from(url: String) -> Self {
        WsdlSource::Url(url)
    }
}

impl From<Url> for WsdlSource {
    fn from(url: Url) -> Self {
        WsdlSource::Url(url.into())
    }
}

impl fmt::Display for WsdlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WsdlSource::Url(url) => f.write_str(url),
            WsdlSource::Document(..) => f.write_str(INLINE_SOURCE),
        }
    }
}

/// A validated WSDL source.
enum Origin<'a> {
    Http(Url),
    File(PathBuf),
    Inline(&'a Bytes),
}

/// A parsed document and the URL it was fetched from, if it was fetched.
#[derive(Debug)]
struct Loaded {
    definition: Definition,
    retrieval_url: Option<Url>,
}

/// A SOAP client bound to one WSDL document.
///
/// The document is fetched and parsed on first use and kept until the source
/// is replaced with [`Client::set_wsdl_source`]. Calls only read that cache,
/// so a client whose transport is `Sync` can be shared between threads;
/// changing its configuration takes `&mut self` and therefore has to be
/// synchronised by the owner.
///
/// ```no_run
/// use serde::Deserialize;
/// use std::collections::HashMap;
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct NumberToWordsResponse {
///     #[serde(rename = "NumberToWordsResult")]
///     result: String,
/// }
///
/// # fn main() -> Result<(), soapcall::Error> {
/// let client = soapcall::Client::new(
///     "https://www.dataaccess.com/webservicesserver/numberconversion.wso?WSDL",
/// );
///
/// let params = HashMap::from([("ubiNum", "23")]);
/// let response: NumberToWordsResponse = client.call("NumberToWords", params)?.unmarshal()?;
/// println!("{}", response.result);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<T = reqwest::blocking::Client> {
    source: WsdlSource,
    loaded: OnceLock<Loaded>,
    use_definition_url: bool,
    header_params: Params,
    transport: T,
}

impl Client {
    pub fn new<S: Into<WsdlSource>>(source: S) -> Self {
        Self::with_transport(source, reqwest::blocking::Client::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport<S: Into<WsdlSource>>(source: S, transport: T) -> Self {
        Self {
            source: source.into(),
            loaded: OnceLock::new(),
            use_definition_url: false,
            header_params: Params::new(),
            transport,
        }
    }

    pub fn with_use_definition_url(mut self, use_definition_url: bool) -> Self {
        self.use_definition_url = use_definition_url;
        self
    }

    pub fn with_header_params<P: Into<Params>>(mut self, params: P) -> Self {
        self.header_params = params.into();
        self
    }

    pub fn wsdl_source(&self) -> &WsdlSource {
        &self.source
    }

    /// Replaces the WSDL source and drops the cached document.
    pub fn set_wsdl_source<S: Into<WsdlSource>>(&mut self, source: S) {
        self.source = source.into();
        self.loaded = OnceLock::new();
    }

    pub fn use_definition_url(&self) -> bool {
        self.use_definition_url
    }

    /// When set, the address declared in the WSDL is called as is. When
    /// unset, only its path is kept and the scheme, host and port come from
    /// the URL the WSDL was retrieved from.
    pub fn set_use_definition_url(&mut self, use_definition_url: bool) {
        self.use_definition_url = use_definition_url;
    }

    pub fn header_params(&self) -> &Params {
        &self.header_params
    }

    /// Parameters written into `soap:Header` on every call.
    pub fn set_header_params<P: Into<Params>>(&mut self, params: P) {
        self.header_params = params.into();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the WSDL document, loading it if needed.
    pub fn definition(&self) -> Result<&Definition> {
        Ok(&self.load()?.definition)
    }

    /// Resolves the endpoint calls are sent to, without calling it.
    pub fn endpoint(&self) -> Result<ServiceEndpoint> {
        self.resolve_endpoint(self.load()?)
    }

    pub fn call<P: Into<Params>>(&self, operation: &str, params: P) -> Result<CallResult> {
        self.call_operation(&Operation::new(operation, params))
    }

    /// Calls `operation` with the fields of a serializable value as
    /// parameters.
    pub fn call_with<P: Serialize + ?Sized>(&self, operation: &str, params: &P) -> Result<CallResult> {
        let params = Params::from_serialize(params).map_err(|source| Error::Encode {
            operation: operation.to_owned(),
            source,
        })?;

        self.call(operation, params)
    }

    pub fn call_by_struct<R: SoapRequest + ?Sized>(&self, request: &R) -> Result<CallResult> {
        self.call_operation(&request.build_operation())
    }

    pub fn call_operation(&self, operation: &Operation) -> Result<CallResult> {
        if operation.name.trim().is_empty() {
            return Err(Error::EmptyBody {
                operation: operation.name.clone(),
            });
        }

        let loaded = self.load()?;
        let definition = &loaded.definition;
        let endpoint = self.resolve_endpoint(loaded)?;

        let body = Envelope::new(OperationBody {
            name: &operation.name,
            namespace: definition.target_namespace.as_deref(),
            params: &operation.params,
        })
        .with_header(self.header_params.clone())
        .to_request()
        .map_err(|source| Error::Encode {
            operation: operation.name.clone(),
            source,
        })?;

        if body.is_empty() {
            return Err(Error::EmptyBody {
                operation: operation.name.clone(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));

        if let Some(action) = soap_action(definition, &operation.name) {
            match (
                HeaderName::from_bytes(SOAP_ACTION.as_bytes()),
                HeaderValue::from_str(&format!("\"{}\"", action)),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(%action, "SOAPAction is not a valid header value, omitting it"),
            }
        }

        debug!(
            operation = %operation.name,
            %endpoint,
            bytes = body.len(),
            "sending SOAP request"
        );

        let response = self
            .transport
            .send(HttpRequest {
                method: Method::POST,
                url: endpoint.url().clone(),
                headers,
                body: Bytes::from(body),
            })
            .map_err(|source| Error::Transport {
                operation: operation.name.clone(),
                url: endpoint.to_string(),
                source,
            })?;

        debug!(
            operation = %operation.name,
            status = %response.status,
            bytes = response.body.len(),
            "received SOAP response"
        );

        if !response.status.is_success() {
            warn!(
                operation = %operation.name,
                status = %response.status,
                "SOAP endpoint answered with a non-success status"
            );
        }

        Ok(CallResult::new(response.status, response.body))
    }

    fn invalid_source(&self, reason: impl ToString) -> Error {
        Error::InvalidWsdlUrl {
            url: self.source.to_string(),
            reason: reason.to_string(),
        }
    }

    fn origin(&self) -> Result<Origin<'_>> {
        let source = match &self.source {
            WsdlSource::Document(document) => return Ok(Origin::Inline(document)),
            WsdlSource::Url(source) => source,
        };

        let url = wsdl::source_url(source).map_err(|err| self.invalid_source(err))?;

        match url.scheme() {
            "http" | "https" => Ok(Origin::Http(url)),
            "file" => url
                .to_file_path()
                .map(Origin::File)
                .map_err(|()| self.invalid_source("not a local file path")),
            other => Err(self.invalid_source(format!("unsupported URL scheme {}", other))),
        }
    }

    /// Returns the cached document, validating and loading the source on
    /// first use only.
    fn load(&self) -> Result<&Loaded> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let (definition, retrieval_url) = match self.origin()? {
            Origin::Inline(document) => {
                let definition = wsdl::parse(document).map_err(|source| Error::Parse {
                    url: INLINE_SOURCE.to_owned(),
                    source,
                })?;
                (definition, None)
            }

            Origin::File(path) => {
                let definition = wsdl::parse_file(path).map_err(|source| match source {
                    WsdlError::FileOpenError(err) => self.invalid_source(err),
                    source => Error::Parse {
                        url: self.source.to_string(),
                        source,
                    },
                })?;
                (definition, None)
            }

            Origin::Http(url) => {
                let document = self.fetch(&url)?;
                let definition = wsdl::parse(&document).map_err(|source| Error::Parse {
                    url: url.to_string(),
                    source,
                })?;
                (definition, Some(url))
            }
        };

        debug!(
            source = %self.source,
            addresses = definition.addresses().count(),
            "loaded WSDL definition"
        );

        Ok(self.loaded.get_or_init(|| Loaded {
            definition,
            retrieval_url,
        }))
    }

    fn fetch(&self, url: &Url) -> Result<Bytes> {
        debug!(%url, "fetching WSDL");

        let response = self
            .transport
            .send(HttpRequest {
                method: Method::GET,
                url: url.clone(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
            .map_err(|err| self.invalid_source(err))?;

        if !response.status.is_success() {
            return Err(self.invalid_source(format!("server answered {}", response.status)));
        }

        Ok(response.body)
    }

    fn resolve_endpoint(&self, loaded: &Loaded) -> Result<ServiceEndpoint> {
        wsdl::resolve(
            loaded.retrieval_url.as_ref(),
            &loaded.definition,
            self.use_definition_url,
        )
        .map_err(|err| match err {
            WsdlError::NoEndpoint => Error::NoEndpoint {
                url: self.source.to_string(),
            },
            WsdlError::InvalidUrl { url, reason } => Error::InvalidWsdlUrl {
                url,
                reason: reason.to_owned(),
            },
            other => self.invalid_source(other),
        })
    }
}

/// The binding's `soapAction` for `operation`, even when empty, or the
/// conventional `<targetNamespace>/<operation>` when the binding declares
/// none.
fn soap_action(definition: &Definition, operation: &str) -> Option<String> {
    if let Some(action) = definition.soap_action(operation) {
        return Some(action.to_owned());
    }

    definition
        .target_namespace
        .as_deref()
        .map(|namespace| format!("{}/{}", namespace.trim_end_matches('/'), operation))
}
