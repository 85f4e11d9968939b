use super::{
    error::{DecodeError, EncodeError},
    xml::{
        check_name,
        events::{BytesStart, Event},
        Params, Reader, ToXml, Writer,
    },
};

use serde::{de::DeserializeOwned, Deserialize};
use std::{borrow::Cow, io::Write};

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const SOAP_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

#[derive(Debug)]
pub struct Envelope<T> {
    header: Params,
    body: T,
}

/// The single element a request carries inside `soap:Body`.
#[derive(Debug, Clone, Copy)]
pub struct OperationBody<'a> {
    pub name: &'a str,
    pub namespace: Option<&'a str>,
    pub params: &'a Params,
}

/// A SOAP 1.1 fault reported in place of a response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Fault {
    #[serde(rename = "faultcode")]
    pub code: String,
    #[serde(rename = "faultstring")]
    pub string: String,
    #[serde(rename = "faultactor")]
    pub actor: Option<String>,
}

impl<T> Envelope<T> {
    pub fn new(body: T) -> Self {
        Self {
            header: Params::new(),
            body,
        }
    }

    pub fn with_header(mut self, header: Params) -> Self {
        self.header = header;
        self
    }
}

impl<T: ToXml> Envelope<T> {
    pub fn to_request(&self) -> Result<Vec<u8>, EncodeError> {
        let mut writer = Writer::new(Vec::new());
        self.to_xml(&mut writer)?;
        Ok(writer.into_inner())
    }
}

impl<T: ToXml> ToXml for Envelope<T> {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let envelope = BytesStart::new("soap:Envelope").with_attributes([
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xmlns:xsd", XSD_NAMESPACE),
            ("xmlns:soap", SOAP_ENVELOPE_NAMESPACE),
        ]);
        let body = BytesStart::new("soap:Body");

        writer.write_event(Event::Start(envelope.borrow()))?;

        if !self.header.is_empty() {
            let header = BytesStart::new("soap:Header");
            writer.write_event(Event::Start(header.borrow()))?;
            self.header.to_xml(writer)?;
            writer.write_event(Event::End(header.to_end()))?;
        }

        writer.write_event(Event::Start(body.borrow()))?;
        self.body.to_xml(writer)?;
        writer.write_event(Event::End(body.to_end()))?;
        writer.write_event(Event::End(envelope.to_end()))?;

        Ok(())
    }
}

impl ToXml for OperationBody<'_> {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        check_name(self.name)?;

        let mut operation = BytesStart::new(self.name);
        if let Some(namespace) = self.namespace {
            operation.push_attribute(("xmlns", namespace));
        }

        writer.write_event(Event::Start(operation.borrow()))?;
        self.params.to_xml(writer)?;
        writer.write_event(Event::End(operation.to_end()))?;

        Ok(())
    }
}

/// Encodes a complete request envelope for `operation`.
pub fn encode(
    operation: &str,
    namespace: Option<&str>,
    params: &Params,
) -> Result<Vec<u8>, EncodeError> {
    Envelope::new(OperationBody {
        name: operation,
        namespace,
        params,
    })
    .to_request()
}

/// Decodes a response body to text using the encoding named by its XML
/// declaration. Bodies without a declaration or byte order mark are UTF-8.
pub fn decode_text(body: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    let mut reader = Reader::from_reader(body);
    let mut buffer = Vec::new();

    // Reading the declaration switches the decoder to its encoding. Bodies
    // that are not XML at all are read as UTF-8.
    if reader.read_event_into(&mut buffer).is_err() {
        return Ok(Cow::Borrowed(std::str::from_utf8(body)?));
    }

    Ok(reader
        .decoder()
        .decode(body)
        .map_err(quick_xml::Error::Encoding)?)
}

/// Fails unless `document` has exactly one root element and every element is
/// closed.
pub fn check_well_formed(document: &str) -> Result<(), DecodeError> {
    let mut reader = Reader::from_str(document);
    let mut open = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(..) => {
                if open == 0 {
                    roots += 1;
                }
                open += 1;
            }

            Event::End(..) => open = open.checked_sub(1).ok_or(DecodeError::TrailingContent)?,

            Event::Empty(..) if open == 0 => roots += 1,

            Event::Text(text) if open == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(DecodeError::TrailingContent);
                }
            }

            Event::Eof => break,

            _ => (),
        }
    }

    match (open, roots) {
        (0, 1) => Ok(()),
        (0, 0) => Err(DecodeError::EmptyDocument),
        (0, _) => Err(DecodeError::TrailingContent),
        _ => Err(DecodeError::UnexpectedEof),
    }
}

/// Returns the content of `soap:Body`, or the whole document when it is not
/// a SOAP envelope.
pub fn body_payload(document: &str) -> Result<&str, DecodeError> {
    check_well_formed(document)?;

    let mut reader = Reader::from_str(document);
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                match (depth, start.local_name().as_ref()) {
                    (0, b"Envelope") => (),
                    (0, _) => return Ok(document.trim()),
                    (1, b"Body") => {
                        let span = reader.read_to_end(start.name())?;
                        return Ok(document[span.start as usize..span.end as usize].trim());
                    }
                    _ => (),
                }

                depth += 1;
            }

            Event::Empty(start) => match (depth, start.local_name().as_ref()) {
                (0, b"Envelope") => return Err(DecodeError::MissingBody),
                (0, _) => return Ok(document.trim()),
                (1, b"Body") => return Ok(""),
                _ => (),
            },

            Event::End(..) => depth = depth.saturating_sub(1),

            Event::Eof => return Err(DecodeError::MissingBody),

            _ => (),
        }
    }
}

/// Name of the first element in `payload`, without its prefix.
fn first_element(payload: &str) -> Result<Option<String>, DecodeError> {
    let mut reader = Reader::from_str(payload);

    loop {
        match reader.read_event()? {
            Event::Start(start) | Event::Empty(start) => {
                let name = std::str::from_utf8(start.local_name().as_ref())?.to_owned();
                return Ok(Some(name));
            }

            Event::Eof => return Ok(None),

            _ => (),
        }
    }
}

/// Projects the response payload onto `T`.
///
/// Elements are matched to fields by local name; unknown elements are
/// skipped. Types deriving `Default` and marked `#[serde(default)]` keep
/// their default for fields that have no matching element.
pub fn decode<T: DeserializeOwned>(document: &str) -> Result<T, DecodeError> {
    let payload = body_payload(document)?;

    if payload.is_empty() {
        return Err(DecodeError::EmptyDocument);
    }

    Ok(quick_xml::de::from_str(payload)?)
}

/// Extracts the fault carried by the response, if any.
pub fn fault(document: &str) -> Result<Option<Fault>, DecodeError> {
    let payload = body_payload(document)?;

    match first_element(payload)?.as_deref() {
        Some("Fault") => Ok(Some(quick_xml::de::from_str(payload)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct CheckVatResponse {
        #[serde(rename = "countryCode")]
        country_code: String,
        #[serde(rename = "vatNumber")]
        vat_number: String,
        valid: String,
        name: String,
    }

    const CHECK_VAT_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Header/>
  <env:Body>
    <ns2:checkVatResponse xmlns:ns2="urn:ec.europa.eu:taxud:vies:services:checkVat:types">
      <ns2:countryCode>IE</ns2:countryCode>
      <ns2:vatNumber>6388047V</ns2:vatNumber>
      <ns2:requestDate>2024-01-01+01:00</ns2:requestDate>
      <ns2:valid>true</ns2:valid>
      <ns2:address><ns2:line>1 Main St</ns2:line></ns2:address>
    </ns2:checkVatResponse>
  </env:Body>
</env:Envelope>"#;

    fn encode_check_vat() -> String {
        let params = Params::from([("countryCode", "IE"), ("vatNumber", "6388047V")]);
        let bytes = encode("checkVat", Some("urn:example"), &params).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn envelope_has_fixed_shape() {
        assert_eq!(
            encode_check_vat(),
            concat!(
                r#"<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
                r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
                r#"xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<soap:Body><checkVat xmlns="urn:example">"#,
                r#"<countryCode>IE</countryCode><vatNumber>6388047V</vatNumber>"#,
                r#"</checkVat></soap:Body></soap:Envelope>"#,
            )
        );
    }

    #[test]
    fn operation_without_namespace_has_no_attributes() {
        let bytes = encode("Ping", None, &Params::new()).unwrap();
        let document = String::from_utf8(bytes).unwrap();
        assert!(document.contains("<soap:Body><Ping></Ping></soap:Body>"));
    }

    #[test]
    fn header_is_written_only_when_present() {
        let params = Params::new();
        let body = OperationBody {
            name: "Ping",
            namespace: None,
            params: &params,
        };

        let plain = String::from_utf8(Envelope::new(body).to_request().unwrap()).unwrap();
        assert!(!plain.contains("soap:Header"));

        let header = Params::new().with("token", "secret");
        let with_header = Envelope::new(body).with_header(header);
        let document = String::from_utf8(with_header.to_request().unwrap()).unwrap();
        assert!(document.contains(
            "<soap:Header><token>secret</token></soap:Header><soap:Body>"
        ));
    }

    #[test]
    fn encoded_envelope_is_well_formed() {
        let document = encode_check_vat();
        check_well_formed(&document).unwrap();
        assert!(body_payload(&document).unwrap().starts_with("<checkVat"));
    }

    #[test]
    fn decode_projects_body_payload() {
        let response: CheckVatResponse = decode(CHECK_VAT_RESPONSE).unwrap();

        assert_eq!(
            response,
            CheckVatResponse {
                country_code: "IE".into(),
                vat_number: "6388047V".into(),
                valid: "true".into(),
                name: String::new(),
            }
        );
    }

    #[test]
    fn decode_accepts_bare_documents() {
        let document = "<checkVatResponse><valid>false</valid><extra/></checkVatResponse>";
        let response: CheckVatResponse = decode(document).unwrap();
        assert_eq!(response.valid, "false");
        assert_eq!(response.country_code, "");
    }

    #[test]
    fn decode_rejects_malformed_xml() {
        for document in [
            "",
            "   ",
            "<a><b></a>",
            "<a>",
            "<a/><b/>",
            "<soap:Envelope><soap:Header/></soap:Envelope>",
        ] {
            assert!(
                decode::<CheckVatResponse>(document).is_err(),
                "{document:?} decoded"
            );
        }
    }

    #[test]
    fn empty_body_has_empty_payload() {
        let document = r#"<s:Envelope xmlns:s="urn:s"><s:Body/></s:Envelope>"#;
        assert_eq!(body_payload(document).unwrap(), "");
        assert!(matches!(
            decode::<CheckVatResponse>(document),
            Err(DecodeError::EmptyDocument)
        ));
    }

    #[test]
    fn text_follows_declared_encoding() {
        let body: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
            <checkVatResponse><name>Caf\xe9 cr\xe8me</name></checkVatResponse>";

        let text = decode_text(body).unwrap();
        assert!(text.contains("<name>Caf\u{e9} cr\u{e8}me</name>"));

        let response: CheckVatResponse = decode(&text).unwrap();
        assert_eq!(response.name, "Caf\u{e9} cr\u{e8}me");

        assert_eq!(decode_text(b"<a>plain</a>").unwrap(), "<a>plain</a>");
        assert_eq!(
            decode_text("<a>caf\u{e9}</a>".as_bytes()).unwrap(),
            "<a>caf\u{e9}</a>"
        );
    }

    #[test]
    fn whitespace_and_line_endings_round_trip() {
        use std::collections::HashMap;

        let params = Params::from([
            ("crlf", "line1\r\nline2"),
            ("padded", " padded "),
            ("tabbed", "\ta\tb"),
        ]);
        let document = String::from_utf8(encode("Op", None, &params).unwrap()).unwrap();

        let decoded: HashMap<String, String> = decode(&document).unwrap();
        assert_eq!(decoded["crlf"], "line1\r\nline2");
        assert_eq!(decoded["padded"], " padded ");
        assert_eq!(decoded["tabbed"], "\ta\tb");
    }

    #[test]
    fn faults_are_recognised() {
        let document = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>INVALID_INPUT</faultstring>
      <detail><reason>bad country</reason></detail>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

        assert_eq!(
            fault(document).unwrap(),
            Some(Fault {
                code: "soap:Server".into(),
                string: "INVALID_INPUT".into(),
                actor: None,
            })
        );

        assert_eq!(fault(CHECK_VAT_RESPONSE).unwrap(), None);
    }
}
