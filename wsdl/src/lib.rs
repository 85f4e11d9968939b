use std::{fs::File, io::BufReader, path::Path};
use url::Url;

mod parser;

pub mod endpoint;
pub mod error;
pub mod types;

pub use endpoint::{resolve, ServiceEndpoint};
pub use types::Definition;

/// Parses a WSDL document held in memory.
pub fn parse<B: AsRef<[u8]>>(document: B) -> Result<Definition, error::Error> {
    parser::parse(document.as_ref())
}

/// Parses a WSDL document stored on disk.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Definition, error::Error> {
    let file = File::open(path).map_err(error::Error::FileOpenError)?;
    parser::parse(BufReader::new(file))
}

/// Turns a WSDL source into a URL, treating anything that is not an absolute
/// URL as a filesystem path.
pub fn source_url<S: AsRef<str>>(source: S) -> Result<Url, error::Error> {
    match Url::parse(source.as_ref()) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::from_file_path(
            Path::new(source.as_ref())
                .canonicalize()
                .map_err(|err| error::Error::PathConversionError(Some(err)))?,
        )
        .map_err(|()| error::Error::PathConversionError(None)),
        Err(err) => Err(err.into()),
    }
}
