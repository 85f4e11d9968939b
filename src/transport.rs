//! The HTTP side of a call.
//!
//! The client only needs something that can send a request and hand back the
//! status and the full body. [`reqwest::blocking::Client`] is the default;
//! timeouts, proxies and TLS settings are configured on it before it is
//! passed to [`Client::with_transport`](crate::Client::with_transport).

use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode};
use std::{rc::Rc, sync::Arc};
use thiserror::Error;
use url::Url;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The exchange failed before a response was obtained.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(#[source] BoxError);

impl TransportError {
    pub fn new<E: Into<BoxError>>(error: E) -> Self {
        Self(error.into())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::new(error)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

pub trait Transport {
    /// Performs one blocking exchange. Any status code is a response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl Transport for reqwest::blocking::Client {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body.to_vec())
            .send()?;

        let status = response.status();
        let body = response.bytes()?;

        Ok(HttpResponse { status, body })
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
