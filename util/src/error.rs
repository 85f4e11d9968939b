use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Unable to write XML output")]
    Io(#[from] std::io::Error),

    #[error("Unable to write XML output")]
    Xml(#[from] quick_xml::Error),

    #[error("Unable to serialize parameters")]
    Serialize(#[from] serde_json::Error),

    #[error("{0:?} is not a valid element name")]
    InvalidName(String),

    #[error("Parameters must serialize to a struct or a map")]
    NotAStruct,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Response is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Response is not well-formed XML")]
    Xml(#[from] quick_xml::Error),

    #[error("Response ends inside an open element")]
    UnexpectedEof,

    #[error("Response has no root element")]
    EmptyDocument,

    #[error("Response has content outside its root element")]
    TrailingContent,

    #[error("SOAP envelope has no Body")]
    MissingBody,

    #[error("Unable to map response onto the target type")]
    Deserialize(#[from] quick_xml::de::DeError),
}
