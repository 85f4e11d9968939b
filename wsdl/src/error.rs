use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path")]
    PathConversionError(Option<std::io::Error>),

    #[error("Unable to open file")]
    FileOpenError(std::io::Error),

    #[error("Error parsing XML input")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("No service address declared in the document")]
    NoEndpoint,

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },
}
