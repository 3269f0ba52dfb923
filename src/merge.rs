use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use tracing::{debug, info};

use crate::datapackage::{KeyedRow, TabularReader};
use crate::decode::FieldValue;
use crate::document::{
    self, Coordinate, CruiseEntry, CruiseRef, EntityDocument, FilterSize, ObservationRecord,
};
use crate::domain::{self, EntityKind, Guid};
use crate::error::OppError;
use crate::mapper::RowMapper;
use crate::store::DocumentStore;

pub const OBSERVATION_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const OBSERVATION_PREFIX: &str = "spectralCount.";
const FILTER_MINIMUM_FIELD: &str = "filterSize.minimum";
const FILTER_MAXIMUM_FIELD: &str = "filterSize.maximum";

/// Row-index window over a table, 1-based and inclusive on both ends.
/// Rows outside the window are skipped before decoding, which lets a
/// caller resume a failed pass from the last reported row index.
#[derive(Debug, Clone, Copy)]
pub struct RowWindow {
    pub start: usize,
    pub stop: Option<usize>,
}

impl RowWindow {
    pub fn new(start: usize, stop: Option<usize>) -> Self {
        Self { start, stop }
    }

    pub fn all() -> Self {
        Self {
            start: 0,
            stop: None,
        }
    }
}

impl Default for RowWindow {
    fn default() -> Self {
        Self::all()
    }
}

/// Merges observation rows into entity documents: deterministic identity,
/// get-or-create, first-writer-wins static fields and an append-only
/// observation sequence, persisted with a full-document write per row.
pub struct EntityMerger<'a, S: DocumentStore> {
    store: &'a S,
    dataset: Guid,
    cruises: BTreeMap<String, CruiseEntry>,
}

impl<'a, S: DocumentStore> EntityMerger<'a, S> {
    pub fn new(store: &'a S, dataset: Guid, cruises: BTreeMap<String, CruiseEntry>) -> Self {
        Self {
            store,
            dataset,
            cruises,
        }
    }

    /// Drive one table through the merge. Returns the number of rows
    /// merged. A row that fails decoding aborts the pass with the failing
    /// row index and raw content; rows merged before the failure stand.
    pub fn ingest_table(
        &self,
        kind: EntityKind,
        reader: TabularReader,
        mapper: &RowMapper,
        window: RowWindow,
    ) -> Result<usize, OppError> {
        if window.start > 0 {
            info!(start = window.start, "skipping rows before window start");
        }
        let mut merged = 0usize;
        let mut row_count = 0usize;
        for row in reader {
            let row = row?;
            row_count += 1;
            if row_count < window.start {
                debug!(row = row_count, "skipping row");
                continue;
            }
            if let Some(stop) = window.stop {
                if row_count > stop {
                    info!(row = row_count, "stopping at window end");
                    break;
                }
            }
            debug!(row = row_count, "reading row");
            self.merge_row(kind, &row, mapper).map_err(|err| match err {
                OppError::ValueConversion { .. } | OppError::MissingKeyField(_) => {
                    OppError::TypeConversion {
                        row: row_count,
                        raw: format_row(&row),
                        detail: err.to_string(),
                    }
                }
                other => other,
            })?;
            merged += 1;
        }
        Ok(merged)
    }

    fn merge_row(
        &self,
        kind: EntityKind,
        row: &KeyedRow,
        mapper: &RowMapper,
    ) -> Result<Guid, OppError> {
        let mapped = mapper.map_row(row)?;
        let (statics, observation_fields) = split_row(mapped);
        let natural_key = natural_key(kind, &statics)?;
        let observation = build_observation(observation_fields, &self.cruises)?;
        self.upsert_observation(kind, &natural_key, &statics, observation)
    }

    /// The per-row merge contract: resolve identity, fetch or create the
    /// entity document, fill absent static fields, append the observation
    /// and write the whole document back.
    pub fn upsert_observation(
        &self,
        kind: EntityKind,
        natural_key: &str,
        statics: &BTreeMap<String, FieldValue>,
        observation: ObservationRecord,
    ) -> Result<Guid, OppError> {
        let guid = domain::entity_guid(&self.dataset, kind, natural_key);
        let collection = kind.into();

        let mut entity = match self.store.get(collection, &guid)? {
            Some(doc) => serde_json::from_value(doc)
                .map_err(|err| OppError::Store(format!("entity {guid}: {err}")))?,
            None => EntityDocument::new(guid.clone(), self.dataset.clone()),
        };

        for (path, value) in statics {
            if value.is_null() || document::path_is_set(&entity.fields, path) {
                continue;
            }
            document::insert_at(&mut entity.fields, path, value.to_json());
        }
        entity.spectral_count.push(observation);

        let doc = serde_json::to_value(&entity)
            .map_err(|err| OppError::Store(format!("entity {guid}: {err}")))?;
        self.store.upsert(collection, &guid, &doc)?;
        Ok(guid)
    }
}

/// Split a mapped row into static entity fields and observation fields.
/// Filter-size bounds belong to the observation even though their store
/// paths are not under the observation prefix.
fn split_row(
    mapped: BTreeMap<String, FieldValue>,
) -> (BTreeMap<String, FieldValue>, BTreeMap<String, FieldValue>) {
    let mut statics = BTreeMap::new();
    let mut observation = BTreeMap::new();
    for (path, value) in mapped {
        if let Some(rest) = path.strip_prefix(OBSERVATION_PREFIX) {
            observation.insert(rest.to_string(), value);
        } else if path == FILTER_MINIMUM_FIELD || path == FILTER_MAXIMUM_FIELD {
            observation.insert(path, value);
        } else {
            statics.insert(path, value);
        }
    }
    (statics, observation)
}

fn natural_key(
    kind: EntityKind,
    statics: &BTreeMap<String, FieldValue>,
) -> Result<String, OppError> {
    let text = |field: &str| -> Result<String, OppError> {
        statics
            .get(field)
            .and_then(text_value)
            .ok_or_else(|| OppError::MissingKeyField(field.to_string()))
    };
    match kind {
        EntityKind::Protein => text("proteinId"),
        EntityKind::Peptide => {
            let sample = text("sampleName")?;
            let protein = text("proteinId")?;
            let sequence = text("peptideSequence")?;
            Ok(format!("{sample}:{protein}:{sequence}"))
        }
    }
}

fn build_observation(
    mut fields: BTreeMap<String, FieldValue>,
    cruises: &BTreeMap<String, CruiseEntry>,
) -> Result<ObservationRecord, OppError> {
    let mut observation = ObservationRecord::default();

    observation.sample_id = fields.remove("sampleId").as_ref().and_then(text_value);
    observation.count = fields
        .remove("count")
        .filter(|value| !value.is_null())
        .map(|value| value.to_json());
    observation.station = fields.remove("station").as_ref().and_then(text_value);
    observation.depth = fields.remove("depth").and_then(|value| value.as_f64());

    if let Some(label) = fields.remove("cruise").as_ref().and_then(text_value) {
        let uri = cruises.get(&label).and_then(|cruise| cruise.uri.clone());
        observation.cruise = Some(CruiseRef { value: label, uri });
    }

    let date_time = fields.remove("dateTime");
    let date = fields.remove("date");
    let time = fields.remove("time");
    observation.date_time = resolve_timestamp(
        date_time.as_ref().and_then(text_value).as_deref(),
        date.as_ref().and_then(text_value).as_deref(),
        time.as_ref().and_then(text_value).as_deref(),
    )?;

    let lat = fields.remove("coordinate.lat").and_then(|v| v.as_f64());
    let lon = fields.remove("coordinate.lon").and_then(|v| v.as_f64());
    if let (Some(lat), Some(lon)) = (lat, lon) {
        observation.coordinate = Some(Coordinate { lat, lon });
    }

    let minimum = fields.remove(FILTER_MINIMUM_FIELD).and_then(|v| v.as_f64());
    let maximum = fields.remove(FILTER_MAXIMUM_FIELD).and_then(|v| v.as_f64());
    observation.filter_size = filter_size(minimum, maximum);

    for (path, value) in fields {
        if value.is_null() {
            continue;
        }
        document::insert_at(&mut observation.extra, &path, value.to_json());
    }
    Ok(observation)
}

/// Filter-size label: both bounds joined, a lone bound alone, nothing when
/// neither bound is present.
fn filter_size(minimum: Option<f64>, maximum: Option<f64>) -> Option<FilterSize> {
    let label = match (minimum, maximum) {
        (Some(min), Some(max)) => format!("{min} - {max}"),
        (Some(min), None) => min.to_string(),
        (None, Some(max)) => max.to_string(),
        (None, None) => return None,
    };
    Some(FilterSize {
        minimum,
        maximum,
        label,
    })
}

/// Prefer an explicit combined date-time; otherwise combine a separate
/// date and time, defaulting a missing time-of-day to midnight.
fn resolve_timestamp(
    date_time: Option<&str>,
    date: Option<&str>,
    time: Option<&str>,
) -> Result<Option<String>, OppError> {
    let combined = match (date_time, date) {
        (Some(text), _) => text.to_string(),
        (None, Some(date)) => format!("{date}T{}", time.unwrap_or("00:00:00")),
        (None, None) => return Ok(None),
    };
    let parsed = parse_date_time(&combined).ok_or_else(|| OppError::ValueConversion {
        value: combined,
        expected: "date-time".to_string(),
    })?;
    Ok(Some(
        parsed.format(OBSERVATION_DATE_TIME_FORMAT).to_string(),
    ))
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    None
}

fn text_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(text) => Some(text.clone()),
        FieldValue::Integer(number) => Some(number.to_string()),
        FieldValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn format_row(row: &KeyedRow) -> String {
    row.iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
