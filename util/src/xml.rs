use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};

pub use quick_xml::{events, Reader, Writer};
use quick_xml::escape::escape;

use crate::error::EncodeError;
use events::{BytesEnd, BytesStart, BytesText, Event};

pub trait ToXml {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError>;
}

/// A parameter value.
///
/// `List` items are written as repeated elements sharing the parameter's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    List(Vec<Value>),
    Struct(Params),
}

/// Named parameter values, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, keeping the position of an existing entry.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds parameters from any serializable struct or map.
    ///
    /// Field names, after serde renames, become element names and keep their
    /// declaration order. `None` fields are left out; numbers and booleans are
    /// written as their textual form.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(fields) => Ok(Self::from_json_fields(fields)),
            _ => Err(EncodeError::NotAStruct),
        }
    }

    fn from_json_fields(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(
            fields
                .into_iter()
                .filter_map(|(name, value)| Some((name, Value::from_json(value)?)))
                .collect(),
        )
    }
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(value) => Some(Value::Text(value.to_string())),
            serde_json::Value::Number(value) => Some(Value::Text(value.to_string())),
            serde_json::Value::String(value) => Some(Value::Text(value)),
            serde_json::Value::Array(items) => Some(Value::List(
                items.into_iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(fields) => {
                Some(Value::Struct(Params::from_json_fields(fields)))
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<Params> for Value {
    fn from(value: Params) -> Self {
        Value::Struct(value)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for Params {
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

pub fn check_name(name: &str) -> Result<(), EncodeError> {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if is_name_start(first) && chars.all(is_name_char) => Ok(()),
        _ => Err(EncodeError::InvalidName(name.to_owned())),
    }
}

/// Escapes `text` for element content. Carriage returns are written as
/// character references, a literal `\r\n` reads back as `\n`.
fn escape_text(text: &str) -> BytesText<'_> {
    let escaped = escape(text);

    if escaped.contains('\r') {
        BytesText::from_escaped(escaped.replace('\r', "&#13;"))
    } else {
        BytesText::from_escaped(escaped)
    }
}

/// Writes `value` as an element called `name`.
pub fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &Value,
) -> Result<(), EncodeError> {
    check_name(name)?;

    match value {
        Value::Text(text) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(escape_text(text)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }

        Value::List(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
        }

        Value::Struct(fields) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            fields.to_xml(writer)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }

    Ok(())
}

impl ToXml for Params {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        for (name, value) in self.iter() {
            write_element(writer, name, value)?;
        }

        Ok(())
    }
}
