use std::fmt;
use tracing::debug;
use url::Url;

use super::{error::Error, types::Definition};

/// The URL a SOAP request is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint(Url);

impl ServiceEndpoint {
    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Decides which URL to call for `definition`.
///
/// The first address of the first port of the first service is the candidate.
/// With `use_definition_url` it is returned as declared. Otherwise its path is
/// grafted onto the scheme, host and port of `source`, the URL the document
/// was retrieved from, which is what callers behind proxies or port mappings
/// can actually reach.
///
/// `source` is `None` for documents that were not retrieved over HTTP; the
/// declared address is then the only option and must be absolute.
pub fn resolve(
    source: Option<&Url>,
    definition: &Definition,
    use_definition_url: bool,
) -> Result<ServiceEndpoint, Error> {
    let address = definition.first_address().ok_or(Error::NoEndpoint)?;

    let source = match source {
        Some(source) => source,
        None => {
            let url = Url::parse(&address.location).map_err(|_| Error::InvalidUrl {
                url: address.location.clone(),
                reason: "service address is not an absolute URL",
            })?;

            return Ok(ServiceEndpoint(url));
        }
    };

    let declared = source.join(&address.location).map_err(|_| Error::InvalidUrl {
        url: address.location.clone(),
        reason: "service address cannot be resolved",
    })?;

    let endpoint = if use_definition_url {
        declared
    } else {
        if source.host_str().is_none() {
            return Err(Error::InvalidUrl {
                url: source.to_string(),
                reason: "WSDL URL has no host",
            });
        }

        let mut endpoint = source.clone();
        endpoint.set_path(declared.path());
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        endpoint
    };

    debug!(%endpoint, use_definition_url, "resolved service endpoint");
    Ok(ServiceEndpoint(endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Port, Service};

    fn definition(locations: &[&str]) -> Definition {
        Definition {
            services: vec![Service {
                name: Some("Service".into()),
                ports: vec![Port {
                    addresses: locations
                        .iter()
                        .map(|location| Address {
                            location: (*location).to_owned(),
                        })
                        .collect(),
                    ..Default::default()
                }],
            }],
            ..Default::default()
        }
    }

    fn source() -> Url {
        Url::parse("https://b.example:4330/svc?wsdl").unwrap()
    }

    #[test]
    fn definition_url_is_used_verbatim() {
        let endpoint = resolve(
            Some(&source()),
            &definition(&["http://a.example/svc"]),
            true,
        )
        .unwrap();

        assert_eq!(endpoint.as_str(), "http://a.example/svc");
    }

    #[test]
    fn source_host_replaces_definition_host() {
        let endpoint = resolve(
            Some(&source()),
            &definition(&["http://a.example/svc"]),
            false,
        )
        .unwrap();

        assert_eq!(endpoint.as_str(), "https://b.example:4330/svc");
    }

    #[test]
    fn first_address_wins() {
        let endpoint = resolve(
            Some(&source()),
            &definition(&["http://a.example/first", "http://a.example/second"]),
            true,
        )
        .unwrap();

        assert_eq!(endpoint.url().path(), "/first");
    }

    #[test]
    fn relative_address_is_joined_to_source() {
        let endpoint = resolve(Some(&source()), &definition(&["/other/svc"]), true).unwrap();
        assert_eq!(endpoint.as_str(), "https://b.example:4330/other/svc");
    }

    #[test]
    fn empty_definition_has_no_endpoint() {
        for definition in [Definition::default(), definition(&[])] {
            assert!(matches!(
                resolve(Some(&source()), &definition, false),
                Err(Error::NoEndpoint)
            ));
        }
    }

    #[test]
    fn literal_documents_use_the_declared_address() {
        let absolute = definition(&["http://a.example/svc"]);

        for flag in [true, false] {
            let endpoint = resolve(None, &absolute, flag).unwrap();
            assert_eq!(endpoint.as_str(), "http://a.example/svc");
        }

        assert!(matches!(
            resolve(None, &definition(&["/svc"]), false),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn source_without_host_cannot_be_rebased() {
        let source = Url::parse("file:///srv/service.wsdl").unwrap();
        let result = resolve(Some(&source), &definition(&["http://a.example/svc"]), false);
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }
}
