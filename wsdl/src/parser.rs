use quick_xml::{
    escape::unescape,
    events::{attributes::Attributes, BytesRef, BytesStart, BytesText, Event},
    Reader,
};
use std::io::BufRead;
use tracing::{debug, trace};

use super::{
    error,
    types::{
        Address, Binding, BindingOperation, Definition, Operation, Port, PortType, Service,
    },
};

fn get_attributes<B: BufRead, const N: usize>(
    reader: &Reader<B>,
    attributes: Attributes<'_>,
    names: [&'static str; N],
) -> Result<[Option<String>; N], error::Error> {
    const INIT: Option<String> = None;
    let mut result = [INIT; N];

    for attribute in attributes {
        let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
        let key = reader
            .decoder()
            .decode(attribute.key.as_ref())
            .map_err(quick_xml::Error::Encoding)?;

        // Namespace declarations share the local name of whatever they bind
        if split_namespaced_name(&key).0 == Some("xmlns") {
            continue;
        }

        let (_, local_name) = split_namespaced_name(&key);

        for (index, name) in names.iter().enumerate() {
            if local_name == *name {
                result[index] =
                    Some(attribute.decode_and_unescape_value(reader.decoder())?.into_owned());
                break;
            }
        }
    }

    Ok(result)
}

fn split_namespaced_name(prefixed_name: &str) -> (Option<&str>, &str) {
    match prefixed_name.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, prefixed_name),
    }
}

/// Strips the prefix from a qualified reference such as `tns:CalculatorSoap`.
fn local_reference(reference: String) -> String {
    match split_namespaced_name(&reference) {
        (Some(_), name) => name.to_owned(),
        (None, _) => reference,
    }
}

#[derive(Debug)]
enum ParseState {
    Definitions,

    PortType {
        name: Option<String>,
        operations: Vec<Operation>,
    },
    Operation {
        name: String,
        documentation: Option<String>,
    },
    Documentation(Option<String>),

    Binding {
        name: Option<String>,
        ty: Option<String>,
        operations: Vec<BindingOperation>,
    },
    BindingOperation {
        name: String,
        action: Option<String>,
    },
    OperationAction {
        action: Option<String>,
    },

    Service {
        name: Option<String>,
        ports: Vec<Port>,
    },
    Port {
        name: Option<String>,
        binding: Option<String>,
        addresses: Vec<Address>,
    },
    Address {
        location: String,
    },

    Other(String),
}

impl ParseState {
    fn element(&self) -> &str {
        match self {
            ParseState::Definitions => "definitions",
            ParseState::PortType { .. } => "portType",
            ParseState::Operation { .. } | ParseState::BindingOperation { .. } => "operation",
            ParseState::Documentation(..) => "documentation",
            ParseState::Binding { .. } => "binding",
            ParseState::OperationAction { .. } => "soap:operation",
            ParseState::Service { .. } => "service",
            ParseState::Port { .. } => "port",
            ParseState::Address { .. } => "address",
            ParseState::Other(name) => name,
        }
    }
}

#[derive(Default)]
struct Parser {
    definition: Definition,
}

impl Parser {
    fn parse<B: BufRead>(mut self, mut reader: Reader<B>) -> Result<Definition, error::Error> {
        let mut stack = Vec::new();
        let mut buffer = Vec::new();

        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(start) => self.handle_start(&mut stack, &reader, start)?,
                Event::End(..) => self.handle_end(&mut stack),

                Event::Empty(start) => {
                    self.handle_start(&mut stack, &reader, start)?;
                    self.handle_end(&mut stack);
                }

                Event::Text(text) => self.handle_text(&mut stack, text)?,
                Event::GeneralRef(reference) => self.handle_reference(&mut stack, reference)?,

                Event::Eof => break,

                event => trace!(?event, "ignoring event"),
            }

            buffer.clear();
        }

        if let Some(state) = stack.last() {
            return Err(error::Error::UnexpectedEof(state.element().to_owned()));
        }

        Ok(self.definition)
    }

    fn handle_start<B: BufRead>(
        &mut self,
        stack: &mut Vec<ParseState>,
        reader: &Reader<B>,
        start: BytesStart<'_>,
    ) -> Result<(), error::Error> {
        let local_name = reader
            .decoder()
            .decode(start.local_name().as_ref())
            .map_err(quick_xml::Error::Encoding)?
            .into_owned();

        let state = stack.pop();
        let mut new_state = ParseState::Other(local_name.clone());

        match state {
            None => match local_name.as_str() {
                "definitions" => {
                    let [namespace] =
                        get_attributes(reader, start.attributes(), ["targetNamespace"])?;

                    self.definition.target_namespace = namespace;
                    new_state = ParseState::Definitions
                }

                _ => debug!(root = %local_name, "document root is not a WSDL definitions element"),
            },

            Some(ParseState::Definitions) => match local_name.as_str() {
                "portType" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::PortType {
                        name,
                        operations: Vec::new(),
                    };
                }

                "binding" => {
                    let [name, ty] = get_attributes(reader, start.attributes(), ["name", "type"])?;

                    new_state = ParseState::Binding {
                        name,
                        ty: ty.map(local_reference),
                        operations: Vec::new(),
                    };
                }

                "service" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::Service {
                        name,
                        ports: Vec::new(),
                    };
                }

                _ => trace!(element = %local_name, "skipping element inside definitions"),
            },

            Some(ParseState::PortType { .. }) => {
                if local_name == "operation" {
                    if let [Some(name)] = get_attributes(reader, start.attributes(), ["name"])? {
                        new_state = ParseState::Operation {
                            name,
                            documentation: None,
                        };
                    }
                }
            }

            Some(ParseState::Operation { .. }) => {
                if local_name == "documentation" {
                    new_state = ParseState::Documentation(None);
                }
            }

            Some(ParseState::Binding { .. }) => {
                if local_name == "operation" {
                    if let [Some(name)] = get_attributes(reader, start.attributes(), ["name"])? {
                        new_state = ParseState::BindingOperation { name, action: None };
                    }
                }
            }

            Some(ParseState::BindingOperation { .. }) => {
                if local_name == "operation" {
                    let [action] = get_attributes(reader, start.attributes(), ["soapAction"])?;
                    new_state = ParseState::OperationAction { action };
                }
            }

            Some(ParseState::Service { .. }) => {
                if local_name == "port" {
                    let [name, binding] =
                        get_attributes(reader, start.attributes(), ["name", "binding"])?;

                    new_state = ParseState::Port {
                        name,
                        binding: binding.map(local_reference),
                        addresses: Vec::new(),
                    };
                }
            }

            Some(ParseState::Port { .. }) => {
                if local_name == "address" {
                    match get_attributes(reader, start.attributes(), ["location"])? {
                        [Some(location)] => new_state = ParseState::Address { location },
                        [None] => debug!("ignoring address without a location"),
                    }
                }
            }

            Some(ref other) => {
                trace!(element = %local_name, parent = other.element(), "skipping element");
            }
        }

        stack.extend(state);
        stack.push(new_state);

        Ok(())
    }

    fn handle_end(&mut self, stack: &mut Vec<ParseState>) {
        let finished_state = stack.pop();
        let mut next_state = stack.pop();

        match finished_state {
            Some(ParseState::PortType { name, operations }) => {
                self.definition
                    .port_types
                    .push(PortType { name, operations })
            }

            Some(ParseState::Operation {
                name,
                documentation,
            }) => {
                if let Some(ParseState::PortType {
                    ref mut operations, ..
                }) = next_state
                {
                    operations.push(Operation {
                        name,
                        documentation,
                    })
                }
            }

            Some(ParseState::Documentation(docs)) => {
                if let Some(ParseState::Operation {
                    ref mut documentation,
                    ..
                }) = next_state
                {
                    *documentation = docs
                        .map(|docs| docs.trim().to_owned())
                        .filter(|docs| !docs.is_empty());
                }
            }

            Some(ParseState::Binding {
                name,
                ty,
                operations,
            }) => self.definition.bindings.push(Binding {
                name,
                ty,
                operations,
            }),

            Some(ParseState::BindingOperation { name, action }) => {
                if let Some(ParseState::Binding {
                    ref mut operations, ..
                }) = next_state
                {
                    operations.push(BindingOperation { name, action })
                }
            }

            Some(ParseState::OperationAction { action: found }) => {
                if let Some(ParseState::BindingOperation { ref mut action, .. }) = next_state {
                    *action = found;
                }
            }

            Some(ParseState::Service { name, ports }) => {
                self.definition.services.push(Service { name, ports })
            }

            Some(ParseState::Port {
                name,
                binding,
                addresses,
            }) => {
                if let Some(ParseState::Service { ref mut ports, .. }) = next_state {
                    ports.push(Port {
                        name,
                        binding,
                        addresses,
                    })
                }
            }

            Some(ParseState::Address { location }) => {
                if let Some(ParseState::Port {
                    ref mut addresses, ..
                }) = next_state
                {
                    addresses.push(Address { location })
                }
            }

            _ => (),
        }

        stack.extend(next_state);
    }

    fn handle_text(
        &mut self,
        stack: &mut [ParseState],
        text: BytesText<'_>,
    ) -> Result<(), error::Error> {
        if let Some(ParseState::Documentation(docs)) = stack.last_mut() {
            let text = text.decode().map_err(quick_xml::Error::Encoding)?;
            docs.get_or_insert_with(String::new).push_str(&text);
        }

        Ok(())
    }

    fn handle_reference(
        &mut self,
        stack: &mut [ParseState],
        reference: BytesRef<'_>,
    ) -> Result<(), error::Error> {
        if let Some(ParseState::Documentation(docs)) = stack.last_mut() {
            let name = reference.decode().map_err(quick_xml::Error::Encoding)?;
            let escaped = format!("&{};", name);
            let text = unescape(&escaped).map_err(quick_xml::Error::Escape)?;
            docs.get_or_insert_with(String::new).push_str(&text);
        }

        Ok(())
    }
}

pub fn parse<B: BufRead>(reader: B) -> Result<Definition, error::Error> {
    let definition = Parser::default().parse(Reader::from_reader(reader))?;

    debug!(
        services = definition.services.len(),
        addresses = definition.addresses().count(),
        "parsed WSDL definition"
    );

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALCULATOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wsdl:definitions xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:tns="http://tempuri.org/"
    xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
    targetNamespace="http://tempuri.org/">
  <wsdl:types>
    <s:schema elementFormDefault="qualified" targetNamespace="http://tempuri.org/"
        xmlns:s="http://www.w3.org/2001/XMLSchema">
      <s:element name="Add">
        <s:complexType>
          <s:sequence>
            <s:element minOccurs="1" maxOccurs="1" name="intA" type="s:int" />
          </s:sequence>
        </s:complexType>
      </s:element>
    </s:schema>
  </wsdl:types>
  <wsdl:message name="AddSoapIn">
    <wsdl:part name="parameters" element="tns:Add" />
  </wsdl:message>
  <wsdl:portType name="CalculatorSoap">
    <wsdl:operation name="Add">
      <wsdl:documentation>Adds two integers. This is a test WebService. &#169;DNE Online</wsdl:documentation>
      <wsdl:input message="tns:AddSoapIn" />
    </wsdl:operation>
    <wsdl:operation name="Subtract">
      <wsdl:input message="tns:SubtractSoapIn" />
    </wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="CalculatorSoap" type="tns:CalculatorSoap">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http" />
    <wsdl:operation name="Add">
      <soap:operation soapAction="http://tempuri.org/Add" style="document" />
      <wsdl:input><soap:body use="literal" /></wsdl:input>
    </wsdl:operation>
    <wsdl:operation name="Subtract">
      <soap:operation soapAction="" style="document" />
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="Calculator">
    <wsdl:port name="CalculatorSoap" binding="tns:CalculatorSoap">
      <soap:address location="http://www.dneonline.com/calculator.asmx" />
    </wsdl:port>
    <wsdl:port name="CalculatorSoap12" binding="tns:CalculatorSoap12">
      <soap12:address xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
          location="http://www.dneonline.com/calculator12.asmx" />
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#;

    #[test]
    fn parses_services_ports_and_addresses_in_order() {
        let definition = parse(CALCULATOR.as_bytes()).unwrap();

        assert_eq!(
            definition.target_namespace.as_deref(),
            Some("http://tempuri.org/")
        );
        assert_eq!(definition.services.len(), 1);

        let service = &definition.services[0];
        assert_eq!(service.name.as_deref(), Some("Calculator"));
        assert_eq!(service.ports.len(), 2);
        assert_eq!(service.ports[0].binding.as_deref(), Some("CalculatorSoap"));
        assert_eq!(
            service.ports[1].addresses[0].location,
            "http://www.dneonline.com/calculator12.asmx"
        );

        assert_eq!(
            definition.first_address().map(|address| address.location.as_str()),
            Some("http://www.dneonline.com/calculator.asmx")
        );
    }

    #[test]
    fn parses_port_types_and_binding_actions() {
        let definition = parse(CALCULATOR.as_bytes()).unwrap();

        let operations = definition.operations();
        let names: Vec<_> = operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, ["Add", "Subtract"]);
        assert_eq!(
            operations[0].documentation.as_deref(),
            Some("Adds two integers. This is a test WebService. \u{a9}DNE Online")
        );
        assert_eq!(operations[1].documentation, None);

        assert_eq!(definition.bindings[0].ty.as_deref(), Some("CalculatorSoap"));
        assert_eq!(definition.soap_action("Add"), Some("http://tempuri.org/Add"));
        assert_eq!(definition.soap_action("Subtract"), Some(""));
        assert_eq!(definition.soap_action("Multiply"), None);
    }

    #[test]
    fn documentation_keeps_spaces_around_references() {
        let xml = r#"<definitions><portType name="Cartoons">
            <operation name="Chase">
              <documentation>
                Tom &amp; Jerry &lt;3 &#169; 1940
              </documentation>
            </operation>
            <operation name="Rest"><documentation>   </documentation></operation>
        </portType></definitions>"#;

        let operations = parse(xml.as_bytes()).unwrap().operations();
        assert_eq!(
            operations[0].documentation.as_deref(),
            Some("Tom & Jerry <3 \u{a9} 1940")
        );
        assert_eq!(operations[1].documentation, None);
    }

    #[test]
    fn binding_operation_without_soap_operation_has_no_action() {
        let xml = r#"<definitions><binding name="B">
            <operation name="Bare"><input/></operation>
        </binding></definitions>"#;

        let definition = parse(xml.as_bytes()).unwrap();
        assert_eq!(definition.bindings[0].operations[0].name, "Bare");
        assert_eq!(definition.soap_action("Bare"), None);
    }

    #[test]
    fn declared_encoding_is_honoured() {
        let xml: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
            <definitions><portType name=\"Caf\xe9\">\
            <operation name=\"Order\"><documentation>cr\xe8me br\xfbl\xe9e</documentation></operation>\
            </portType></definitions>";

        let definition = parse(xml).unwrap();
        assert_eq!(definition.port_types[0].name.as_deref(), Some("Caf\u{e9}"));
        assert_eq!(
            definition.operations()[0].documentation.as_deref(),
            Some("cr\u{e8}me br\u{fb}l\u{e9}e")
        );
    }

    #[test]
    fn empty_input_yields_empty_definition() {
        let definition = parse(&b""[..]).unwrap();
        assert_eq!(definition, Definition::default());
        assert!(definition.first_address().is_none());
    }

    #[test]
    fn missing_nesting_yields_no_addresses() {
        let xml = r#"<definitions targetNamespace="urn:x">
            <service name="Lonely"><documentation>no ports</documentation></service>
            <address location="http://misplaced.example/" />
        </definitions>"#;

        let definition = parse(xml.as_bytes()).unwrap();
        assert_eq!(definition.services.len(), 1);
        assert_eq!(definition.addresses().count(), 0);
    }

    #[test]
    fn unknown_root_is_tolerated() {
        let xml = r#"<html><body><service><port><address location="http://x/"/></port></service></body></html>"#;
        let definition = parse(xml.as_bytes()).unwrap();
        assert!(definition.services.is_empty());
    }

    #[test]
    fn address_without_location_is_skipped() {
        let xml = r#"<definitions><service><port>
            <address />
            <address location="http://second.example/svc" />
        </port></service></definitions>"#;

        let definition = parse(xml.as_bytes()).unwrap();
        assert_eq!(
            definition.first_address().unwrap().location,
            "http://second.example/svc"
        );
    }

    #[test]
    fn unclosed_document_is_an_error() {
        let xml = r#"<definitions><service name="Calculator"><port>"#;
        assert!(parse(xml.as_bytes()).is_err());
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        let xml = r#"<definitions><service></port></definitions>"#;
        assert!(matches!(
            parse(xml.as_bytes()),
            Err(error::Error::XmlParseError(..))
        ));
    }
}
