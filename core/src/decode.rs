//! Response decoding for the two wire formats.
//!
//! # Design
//! The service answers either in XML (attribute-based, the legacy default) or
//! in JSON (`format=json`). `ResponseFormat::decode` turns a body into a
//! `Document`, a tagged variant over the two parse trees. The accessors on
//! `Document` hide the difference between the trees and hand the mapper
//! format-neutral `Record`s, string pairs and lists, so each entity is mapped
//! in exactly one place.
//!
//! A `Record` remembers which format it came from because the two formats
//! disagree on defaults for absent flags (see `mapper`).

use std::str::FromStr;

use serde_json::Value;

use crate::error::PinboardError;

/// Wire format requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl FromStr for ResponseFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "xml" => Ok(ResponseFormat::Xml),
            _ => Err(()),
        }
    }
}

impl ResponseFormat {
    pub fn decode(self, body: &str) -> Result<Document, PinboardError> {
        match self {
            ResponseFormat::Json => {
                let value: Value = serde_json::from_str(body)
                    .map_err(|e| PinboardError::malformed(format!("malformed JSON: {e}")))?;
                if !value.is_object() && !value.is_array() {
                    return Err(PinboardError::malformed(
                        "JSON response is neither an object nor an array",
                    ));
                }
                Ok(Document::Json(value))
            }
            ResponseFormat::Xml => {
                let doc = roxmltree::Document::parse(body)
                    .map_err(|e| PinboardError::malformed(format!("malformed XML: {e}")))?;
                Ok(Document::Xml(XmlElement::from_node(doc.root_element())))
            }
        }
    }
}

/// An owned XML element: name, attributes in document order, concatenated
/// direct text, and child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        let text = node
            .children()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect::<String>();
        let children = node
            .children()
            .filter(|n| n.is_element())
            .map(XmlElement::from_node)
            .collect();
        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            text,
            children,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attributes first, then each leaf child element as `name => text`.
    fn to_record(&self) -> Record {
        let mut fields = self.attributes.clone();
        for child in self.children.iter().filter(|c| c.children.is_empty()) {
            fields.push((child.name.clone(), child.text.clone()));
        }
        Record {
            format: ResponseFormat::Xml,
            fields,
        }
    }
}

/// A flat, ordered set of string fields decoded from one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    format: ResponseFormat,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn from_json(object: &serde_json::Map<String, Value>) -> Self {
        let fields = object
            .iter()
            .filter_map(|(k, v)| json_scalar(v).map(|s| (k.clone(), s)))
            .collect();
        Record {
            format: ResponseFormat::Json,
            fields,
        }
    }
}

/// Strings as-is, numbers and booleans in their JSON spelling. Null,
/// arrays and objects have no scalar form.
fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Json(Value),
    Xml(XmlElement),
}

impl Document {
    /// Repeated entries. XML: children of the root named `element`. JSON:
    /// the top-level array, or the array under `json_field` of the
    /// top-level object. Non-object JSON items are dropped.
    pub fn records(&self, element: &str, json_field: &str) -> Vec<Record> {
        match self {
            Document::Xml(root) => root.children_named(element).map(XmlElement::to_record).collect(),
            Document::Json(value) => {
                let items = match value {
                    Value::Array(items) => Some(items),
                    Value::Object(map) => map.get(json_field).and_then(Value::as_array),
                    _ => None,
                };
                items
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_object)
                    .map(Record::from_json)
                    .collect()
            }
        }
    }

    /// The whole document as a single entry: the root element in XML, the
    /// top-level object in JSON.
    pub fn root_record(&self) -> Option<Record> {
        match self {
            Document::Xml(root) => Some(root.to_record()),
            Document::Json(value) => value.as_object().map(Record::from_json),
        }
    }

    /// Name to count pairs in document order. XML: root children named
    /// `element` with the name in attribute `name_attr` and a `count`
    /// attribute. JSON: keys and values of the object under `json_field`,
    /// or of the top-level object when `json_field` is `None`.
    pub fn counts(
        &self,
        element: &str,
        name_attr: &str,
        json_field: Option<&str>,
    ) -> Result<Vec<(String, u64)>, PinboardError> {
        match self {
            Document::Xml(root) => root
                .children_named(element)
                .map(|e| {
                    let name = e.attribute(name_attr).unwrap_or_default().to_string();
                    let count = parse_count(e.attribute("count").unwrap_or("0"))?;
                    Ok::<_, PinboardError>((name, count))
                })
                .collect(),
            Document::Json(value) => {
                let object = match json_field {
                    Some(field) => value.get(field),
                    None => Some(value),
                };
                let Some(object) = object else {
                    return Ok(Vec::new());
                };
                let Some(map) = object.as_object() else {
                    // The service answers an empty mapping as `[]`.
                    if object.as_array().is_some_and(|a| a.is_empty()) {
                        return Ok(Vec::new());
                    }
                    return Err(PinboardError::malformed(format!(
                        "expected an object of counts, got {object}"
                    )));
                };
                map.iter()
                    .map(|(name, count)| {
                        let count = json_scalar(count).ok_or_else(|| {
                            PinboardError::malformed(format!("count for {name:?} is not a number"))
                        })?;
                        Ok::<_, PinboardError>((name.clone(), parse_count(&count)?))
                    })
                    .collect()
            }
        }
    }

    /// A single scalar from the top level: XML root attribute `xml_attr`,
    /// JSON top-level field `json_field`.
    pub fn scalar(&self, xml_attr: &str, json_field: &str) -> Option<String> {
        match self {
            Document::Xml(root) => root.attribute(xml_attr).map(str::to_string),
            Document::Json(value) => value.get(json_field).and_then(json_scalar),
        }
    }

    /// The result code of a write call. XML: the root `code` attribute, else
    /// the root text. JSON: `result_code`, else `result`.
    pub fn result_code(&self) -> Option<String> {
        match self {
            Document::Xml(root) => Some(
                root.attribute("code")
                    .map(str::to_string)
                    .unwrap_or_else(|| root.text.trim().to_string()),
            ),
            Document::Json(value) => value
                .get("result_code")
                .or_else(|| value.get("result"))
                .and_then(json_scalar),
        }
    }

    /// The bare result text: XML root text, JSON `result`.
    pub fn result_text(&self) -> Option<String> {
        let text = match self {
            Document::Xml(root) => Some(root.text.trim().to_string()),
            Document::Json(value) => value.get("result").and_then(json_scalar),
        };
        text.filter(|t| !t.is_empty())
    }

    /// Text values under a name. XML: text of each root child named `name`.
    /// JSON: the array under `name` in the top-level object, or in any
    /// object of a top-level array.
    pub fn string_list(&self, name: &str) -> Vec<String> {
        match self {
            Document::Xml(root) => root
                .children_named(name)
                .map(|e| e.text.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Document::Json(value) => {
                let holders: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                holders
                    .into_iter()
                    .filter_map(|h| h.get(name))
                    .filter_map(Value::as_array)
                    .flatten()
                    .filter_map(json_scalar)
                    .collect()
            }
        }
    }
}

fn parse_count(raw: &str) -> Result<u64, PinboardError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| PinboardError::malformed(format!("count {raw:?} is not a number")))
}
