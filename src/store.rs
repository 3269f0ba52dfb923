use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use crate::document::{
    self, Coordinate, DepthStats, EntityDocument, FilterSizeBucket, ObservationRecord,
};
use crate::domain::{EntityKind, Guid};
use crate::error::OppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Dataset,
    Protein,
    Peptide,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Dataset => "dataset",
            Collection::Protein => "protein",
            Collection::Peptide => "peptide",
        }
    }
}

impl From<EntityKind> for Collection {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Protein => Collection::Protein,
            EntityKind::Peptide => Collection::Peptide,
        }
    }
}

/// Aggregation requests the rollup needs from a store backend.
#[derive(Debug, Clone)]
pub enum AggregationQuery {
    /// Min/max of the observation-level depth across a dataset.
    ObservationDepthRange { dataset: Guid },
    /// Distinct observation filter-size labels with their bounds.
    FilterSizeBuckets { dataset: Guid },
    /// Distinct cruises and, per cruise, distinct station labels.
    CruiseStations { dataset: Guid },
    /// One representative coordinate for a cruise/station pair.
    StationCoordinate {
        dataset: Guid,
        cruise: String,
        station: String,
    },
}

#[derive(Debug, Clone)]
pub enum AggregationResult {
    DepthRange(Option<DepthStats>),
    FilterSizes(Vec<FilterSizeBucket>),
    CruiseStations(Vec<CruiseStations>),
    Coordinate(Option<Coordinate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CruiseStations {
    pub cruise: String,
    pub stations: Vec<String>,
}

/// Document store boundary: get-by-id, full-document upsert, dataset
/// scans, field lookups and the aggregation queries above. Implementations
/// must make a write visible to every subsequent read.
pub trait DocumentStore: Send + Sync {
    fn initialize(&self) -> Result<(), OppError>;

    fn get(&self, collection: Collection, id: &Guid) -> Result<Option<Value>, OppError>;

    fn upsert(&self, collection: Collection, id: &Guid, doc: &Value) -> Result<(), OppError>;

    /// All documents of a dataset, in a stable order.
    fn scan(&self, collection: Collection, dataset: &Guid) -> Result<Vec<(Guid, Value)>, OppError>;

    /// Documents whose field at `path` equals (or, for array slots,
    /// contains) `value`.
    fn find_by_field(
        &self,
        collection: Collection,
        dataset: &Guid,
        path: &str,
        value: &str,
    ) -> Result<Vec<(Guid, Value)>, OppError>;

    fn run_aggregation(
        &self,
        collection: Collection,
        query: &AggregationQuery,
    ) -> Result<AggregationResult, OppError>;
}

/// Filesystem-backed store: one JSON document per file under
/// `<root>/<collection>/<guid>.json`, written atomically. Aggregations are
/// computed by scanning the dataset's documents.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self, OppError> {
        let cwd = std::env::current_dir().map_err(|err| OppError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd.join(".opp-store"))
            .map_err(|_| OppError::Filesystem("invalid store path".to_string()))?;
        Ok(Self { root })
    }

    pub fn open(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn document_path(&self, collection: Collection, id: &Guid) -> Utf8PathBuf {
        self.root
            .join(collection.as_str())
            .join(format!("{id}.json"))
    }

    fn read_document(path: &Utf8Path) -> Result<Value, OppError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| OppError::Store(format!("read {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| OppError::Store(format!("parse {path}: {err}")))
    }

    fn entities(&self, collection: Collection, dataset: &Guid) -> Result<Vec<EntityDocument>, OppError> {
        self.scan(collection, dataset)?
            .into_iter()
            .map(|(_, doc)| {
                serde_json::from_value(doc).map_err(|err| OppError::Store(err.to_string()))
            })
            .collect()
    }
}

impl DocumentStore for FileStore {
    fn initialize(&self) -> Result<(), OppError> {
        for collection in [Collection::Dataset, Collection::Protein, Collection::Peptide] {
            fs::create_dir_all(self.root.join(collection.as_str()).as_std_path())
                .map_err(|err| OppError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    fn get(&self, collection: Collection, id: &Guid) -> Result<Option<Value>, OppError> {
        let path = self.document_path(collection, id);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        Self::read_document(&path).map(Some)
    }

    fn upsert(&self, collection: Collection, id: &Guid, doc: &Value) -> Result<(), OppError> {
        let path = self.document_path(collection, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| OppError::Filesystem(err.to_string()))?;
        }
        let content = serde_json::to_vec_pretty(doc)
            .map_err(|err| OppError::Store(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| OppError::Store(format!("write {path}: {err}")))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| OppError::Store(format!("write {path}: {err}")))?;
        Ok(())
    }

    fn scan(&self, collection: Collection, dataset: &Guid) -> Result<Vec<(Guid, Value)>, OppError> {
        let dir = self.root.join(collection.as_str());
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| OppError::Store(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| OppError::Store(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|_| OppError::Store("non-UTF8 store path".to_string()))?;
            if path.extension() == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let doc = Self::read_document(&path)?;
            let matches = match collection {
                Collection::Dataset => document::field_matches(&doc, "guid", dataset.as_str()),
                _ => document::field_matches(&doc, "_dataset", dataset.as_str()),
            };
            if !matches {
                continue;
            }
            let guid = document::value_at(&doc, "guid")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| OppError::Store(format!("document without guid: {path}")))?;
            documents.push((Guid::from(guid), doc));
        }
        Ok(documents)
    }

    fn find_by_field(
        &self,
        collection: Collection,
        dataset: &Guid,
        path: &str,
        value: &str,
    ) -> Result<Vec<(Guid, Value)>, OppError> {
        Ok(self
            .scan(collection, dataset)?
            .into_iter()
            .filter(|(_, doc)| document::field_matches(doc, path, value))
            .collect())
    }

    fn run_aggregation(
        &self,
        collection: Collection,
        query: &AggregationQuery,
    ) -> Result<AggregationResult, OppError> {
        match query {
            AggregationQuery::ObservationDepthRange { dataset } => {
                let mut range: Option<DepthStats> = None;
                for entity in self.entities(collection, dataset)? {
                    for depth in entity.spectral_count.iter().filter_map(|obs| obs.depth) {
                        range = Some(match range {
                            None => DepthStats {
                                min: depth,
                                max: depth,
                            },
                            Some(stats) => DepthStats {
                                min: stats.min.min(depth),
                                max: stats.max.max(depth),
                            },
                        });
                    }
                }
                Ok(AggregationResult::DepthRange(range))
            }
            AggregationQuery::FilterSizeBuckets { dataset } => {
                let mut buckets: BTreeMap<String, FilterSizeBucket> = BTreeMap::new();
                for entity in self.entities(collection, dataset)? {
                    for filter in entity
                        .spectral_count
                        .iter()
                        .filter_map(|obs| obs.filter_size.as_ref())
                    {
                        buckets
                            .entry(filter.label.clone())
                            .or_insert_with(|| FilterSizeBucket {
                                label: filter.label.clone(),
                                minimum: filter.minimum,
                                maximum: filter.maximum,
                            });
                    }
                }
                Ok(AggregationResult::FilterSizes(
                    buckets.into_values().collect(),
                ))
            }
            AggregationQuery::CruiseStations { dataset } => {
                let mut cruises: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
                for entity in self.entities(collection, dataset)? {
                    for obs in &entity.spectral_count {
                        let Some(cruise) = obs.cruise.as_ref() else {
                            continue;
                        };
                        let stations = cruises.entry(cruise.value.clone()).or_default();
                        if let Some(station) = &obs.station {
                            stations.insert(station.clone());
                        }
                    }
                }
                Ok(AggregationResult::CruiseStations(
                    cruises
                        .into_iter()
                        .map(|(cruise, stations)| CruiseStations {
                            cruise,
                            stations: stations.into_iter().collect(),
                        })
                        .collect(),
                ))
            }
            AggregationQuery::StationCoordinate {
                dataset,
                cruise,
                station,
            } => {
                for entity in self.entities(collection, dataset)? {
                    if let Some(coordinate) = find_station_coordinate(
                        &entity.spectral_count,
                        cruise,
                        station,
                    ) {
                        return Ok(AggregationResult::Coordinate(Some(coordinate)));
                    }
                }
                Ok(AggregationResult::Coordinate(None))
            }
        }
    }
}

fn find_station_coordinate(
    observations: &[ObservationRecord],
    cruise: &str,
    station: &str,
) -> Option<Coordinate> {
    observations.iter().find_map(|obs| {
        let matches = obs.cruise.as_ref().is_some_and(|c| c.value == cruise)
            && obs.station.as_deref() == Some(station);
        if matches { obs.coordinate } else { None }
    })
}
