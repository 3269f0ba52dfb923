use regex::Regex;
use serde_json::{Number, Value};

use crate::datapackage::SchemaField;
use crate::error::OppError;

/// Declared value type of a schema field. Anything that is not numeric
/// passes through as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Integer,
    Any,
}

impl ValueType {
    fn from_schema(field_type: Option<&str>) -> Self {
        match field_type {
            Some("number") => ValueType::Number,
            Some("integer") => ValueType::Integer,
            _ => ValueType::Any,
        }
    }
}

/// A decoded cell value. `List` only appears for delimited fields and for
/// many-to-one mapped slots; it preserves encounter order, nulls included.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Integer(value) => Value::Number((*value).into()),
            FieldValue::Number(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(value) => Value::String(value.clone()),
            FieldValue::List(values) => {
                Value::Array(values.iter().map(FieldValue::to_json).collect())
            }
        }
    }
}

/// How to decode one source field and where its value lands in the store.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field_name: String,
    pub rdf_type: String,
    pub store_field: String,
    pub value_type: ValueType,
    pub missing_values: Vec<String>,
    pub delimiter: Option<String>,
    pub pattern: Option<Regex>,
}

impl FieldDescriptor {
    /// Combine a schema field with its ontology store mapping. Patterns
    /// must be anchored by the schema author and carry exactly one
    /// capturing group.
    pub fn from_schema(field: &SchemaField, store_field: &str) -> Result<Self, OppError> {
        let rdf_type = field.rdf_type.clone().ok_or_else(|| {
            OppError::InvalidDescriptor {
                field: field.name.clone(),
                detail: "missing rdfType".to_string(),
            }
        })?;
        let pattern = match field.constraints.as_ref().and_then(|c| c.pattern.as_deref()) {
            Some(source) => {
                let regex = Regex::new(source).map_err(|err| OppError::InvalidDescriptor {
                    field: field.name.clone(),
                    detail: err.to_string(),
                })?;
                if regex.captures_len() != 2 {
                    return Err(OppError::InvalidDescriptor {
                        field: field.name.clone(),
                        detail: "pattern must have exactly one capturing group".to_string(),
                    });
                }
                Some(regex)
            }
            None => None,
        };
        Ok(Self {
            field_name: field.name.clone(),
            rdf_type,
            store_field: store_field.to_string(),
            value_type: ValueType::from_schema(field.field_type.as_deref()),
            missing_values: field
                .missing_values
                .clone()
                .unwrap_or_else(|| vec![String::new()]),
            delimiter: field.delimiter.clone(),
            pattern,
        })
    }

    fn is_missing(&self, raw: &str) -> bool {
        raw.is_empty() || self.missing_values.iter().any(|marker| marker == raw)
    }
}

/// Decode one raw cell. Pure: for a well-formed descriptor the only error
/// is a numeric conversion failure, which must abort the row rather than
/// default silently.
pub fn decode(raw: &str, descriptor: &FieldDescriptor) -> Result<FieldValue, OppError> {
    if descriptor.is_missing(raw) {
        return Ok(FieldValue::Null);
    }
    if let Some(delimiter) = &descriptor.delimiter {
        let pieces = raw
            .split(delimiter.as_str())
            .map(|piece| decode_piece(piece, descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(FieldValue::List(pieces));
    }
    decode_piece(raw, descriptor)
}

fn decode_piece(raw: &str, descriptor: &FieldDescriptor) -> Result<FieldValue, OppError> {
    if descriptor.is_missing(raw) {
        return Ok(FieldValue::Null);
    }
    if let Some(pattern) = &descriptor.pattern {
        return match pattern.captures(raw).and_then(|captures| captures.get(1)) {
            Some(group) => convert(group.as_str(), descriptor.value_type),
            None => Ok(FieldValue::Null),
        };
    }
    convert(raw, descriptor.value_type)
}

fn convert(raw: &str, value_type: ValueType) -> Result<FieldValue, OppError> {
    match value_type {
        ValueType::Number => raw
            .parse::<f64>()
            .map(FieldValue::Number)
            .map_err(|_| OppError::ValueConversion {
                value: raw.to_string(),
                expected: "number".to_string(),
            }),
        ValueType::Integer => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| OppError::ValueConversion {
                value: raw.to_string(),
                expected: "integer".to_string(),
            }),
        ValueType::Any => Ok(FieldValue::Text(raw.to_string())),
    }
}
