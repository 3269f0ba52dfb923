use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Guid;

/// One protein or peptide record in the store. Static descriptive fields
/// live in `fields` keyed by their store field name; per-row evidence
/// accumulates in `spectral_count`, in ingestion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDocument {
    pub guid: Guid,
    #[serde(rename = "_dataset")]
    pub dataset: Guid,
    #[serde(rename = "spectralCount", default)]
    pub spectral_count: Vec<ObservationRecord>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EntityDocument {
    pub fn new(guid: Guid, dataset: Guid) -> Self {
        Self {
            guid,
            dataset,
            spectral_count: Vec::new(),
            fields: Map::new(),
        }
    }
}

/// One source row's contribution to an entity's evidence sequence.
/// Append-only: the linker and rollup never rewrite these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cruise: Option<CruiseRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_size: Option<FilterSize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cruise reference on an observation; the URI comes from the data
/// package's deployment registry when the label is known there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruiseRef {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    pub label: String,
}

/// One document per ingested submission: descriptive metadata, the cruise
/// registry, and rollup statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetDocument {
    pub guid: Guid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "opp:shortName", skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Contributor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cruises: Vec<CruiseEntry>,
    #[serde(rename = "depth_stats", skip_serializing_if = "Option::is_none")]
    pub depth_stats: Option<DepthStats>,
    #[serde(rename = "filterSize", default, skip_serializing_if = "Vec::is_empty")]
    pub filter_size: Vec<FilterSizeBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruiseEntry {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "station", default, skip_serializing_if = "Vec::is_empty")]
    pub stations: Vec<StationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationEntry {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthStats {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSizeBucket {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// Look a dotted path up in a JSON document, e.g. `ncbiTaxon.id`.
pub fn value_at<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Insert a value at a dotted path, creating intermediate objects.
/// Existing non-object values along the path are replaced.
pub fn insert_at(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Some(next) = slot.as_object_mut() else {
            return;
        };
        current = next;
    }
}

/// True when a dotted path already holds a value in the field map.
pub fn path_is_set(fields: &Map<String, Value>, path: &str) -> bool {
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(first) => first,
        None => return false,
    };
    let mut current = match fields.get(first) {
        Some(value) => value,
        None => return false,
    };
    for segment in segments {
        current = match current.as_object().and_then(|obj| obj.get(segment)) {
            Some(value) => value,
            None => return false,
        };
    }
    !current.is_null()
}

/// True when the value at `path` equals `expected`, either directly or as
/// a member of an array slot. Numbers compare through their display form.
pub fn field_matches(doc: &Value, path: &str, expected: &str) -> bool {
    match value_at(doc, path) {
        Some(Value::String(text)) => text == expected,
        Some(Value::Number(number)) => number.to_string() == expected,
        Some(Value::Array(items)) => items.iter().any(|item| match item {
            Value::String(text) => text == expected,
            Value::Number(number) => number.to_string() == expected,
            _ => false,
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn insert_and_read_nested_path() {
        let mut fields = Map::new();
        insert_at(&mut fields, "ncbiTaxon.id", json!(1148));
        insert_at(&mut fields, "ncbiTaxon.name", json!("Synechocystis"));
        let doc = Value::Object(fields.clone());
        assert_eq!(value_at(&doc, "ncbiTaxon.id"), Some(&json!(1148)));
        assert!(path_is_set(&fields, "ncbiTaxon.name"));
        assert!(!path_is_set(&fields, "ncbiTaxon.rank"));
    }

    #[test]
    fn field_matches_scalar_and_array() {
        let doc = json!({"proteinId": "P1", "identifiedProteins": ["P1", "P2"]});
        assert!(field_matches(&doc, "proteinId", "P1"));
        assert!(field_matches(&doc, "identifiedProteins", "P2"));
        assert!(!field_matches(&doc, "identifiedProteins", "P3"));
    }

    #[test]
    fn entity_document_round_trips_flattened_fields() {
        let mut doc = EntityDocument::new(Guid::default(), Guid::default());
        doc.fields.insert("proteinId".to_string(), json!("P1"));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["proteinId"], json!("P1"));
        let back: EntityDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back.fields.get("proteinId"), Some(&json!("P1")));
    }
}
