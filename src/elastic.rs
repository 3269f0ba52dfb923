use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::document::{Coordinate, DepthStats, FilterSizeBucket};
use crate::domain::Guid;
use crate::error::OppError;
use crate::store::{
    AggregationQuery, AggregationResult, Collection, CruiseStations, DocumentStore,
};

const PAGE_SIZE: usize = 500;

/// Document store backed by an Elasticsearch-compatible REST API. One
/// index holds all three collections, discriminated by a `docType` field.
/// Requests are sent once and failures surface immediately; resuming is
/// the caller's decision, via the ingest row window.
#[derive(Debug, Clone)]
pub struct ElasticStore {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticStore {
    pub fn new(base_url: &str, index: &str) -> Result<Self, OppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("opp-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OppError::Store(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| OppError::Store(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    fn doc_url(&self, id: &Guid) -> String {
        format!("{}/_doc/{id}", self.index_url())
    }

    fn search(&self, body: Value) -> Result<Value, OppError> {
        let url = format!("{}/_search", self.index_url());
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|err| OppError::Store(err.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response));
        }
        response
            .json()
            .map_err(|err| OppError::Store(err.to_string()))
    }

    fn collection_query(&self, collection: Collection, dataset: &Guid) -> Value {
        let mut must = vec![json!({"term": {"docType": collection.as_str()}})];
        match collection {
            Collection::Dataset => must.push(json!({"term": {"guid": dataset.as_str()}})),
            _ => must.push(json!({"term": {"_dataset": dataset.as_str()}})),
        }
        json!({"bool": {"must": must}})
    }

    fn search_documents(&self, query: Value) -> Result<Vec<(Guid, Value)>, OppError> {
        let mut documents = Vec::new();
        let mut from = 0usize;
        loop {
            let body = json!({
                "from": from,
                "size": PAGE_SIZE,
                "sort": [{"guid": "asc"}],
                "query": &query,
            });
            let response = self.search(body)?;
            let hits = response
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let page = hits.len();
            for hit in hits {
                let Some(source) = hit.get("_source").cloned() else {
                    continue;
                };
                let guid = source
                    .get("guid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| OppError::Store("hit without guid".to_string()))?;
                documents.push((Guid::from(guid), source));
            }
            if page < PAGE_SIZE {
                return Ok(documents);
            }
            from += PAGE_SIZE;
        }
    }
}

impl DocumentStore for ElasticStore {
    /// Drop and recreate the index with the portal mapping. A missing
    /// index on delete is not an error.
    fn initialize(&self) -> Result<(), OppError> {
        let response = self
            .client
            .delete(self.index_url())
            .send()
            .map_err(|err| OppError::Store(err.to_string()))?;
        match response.status().as_u16() {
            404 => debug!(index = %self.index, "index did not exist"),
            status if (200..300).contains(&status) => {
                info!(index = %self.index, "deleted index");
            }
            _ => return Err(status_error(response)),
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&index_mapping())
            .send()
            .map_err(|err| OppError::Store(err.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response));
        }
        info!(index = %self.index, "created index");
        Ok(())
    }

    fn get(&self, _collection: Collection, id: &Guid) -> Result<Option<Value>, OppError> {
        let response = self
            .client
            .get(self.doc_url(id))
            .send()
            .map_err(|err| OppError::Store(err.to_string()))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response));
        }
        let body: Value = response
            .json()
            .map_err(|err| OppError::Store(err.to_string()))?;
        Ok(body.get("_source").cloned())
    }

    /// Full-document write. `refresh=true` keeps the linker and rollup
    /// passes read-your-writes consistent without an explicit barrier.
    fn upsert(&self, collection: Collection, id: &Guid, doc: &Value) -> Result<(), OppError> {
        let mut body = doc.clone();
        if let Some(fields) = body.as_object_mut() {
            fields.insert("docType".to_string(), json!(collection.as_str()));
        }
        let url = format!("{}?refresh=true", self.doc_url(id));
        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .map_err(|err| OppError::Store(err.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response));
        }
        Ok(())
    }

    fn scan(&self, collection: Collection, dataset: &Guid) -> Result<Vec<(Guid, Value)>, OppError> {
        self.search_documents(self.collection_query(collection, dataset))
    }

    fn find_by_field(
        &self,
        collection: Collection,
        dataset: &Guid,
        path: &str,
        value: &str,
    ) -> Result<Vec<(Guid, Value)>, OppError> {
        let mut term = serde_json::Map::new();
        term.insert(path.to_string(), json!(value));
        let mut query = self.collection_query(collection, dataset);
        if let Some(must) = query
            .pointer_mut("/bool/must")
            .and_then(Value::as_array_mut)
        {
            must.push(json!({"term": term}));
        }
        self.search_documents(query)
    }

    fn run_aggregation(
        &self,
        collection: Collection,
        query: &AggregationQuery,
    ) -> Result<AggregationResult, OppError> {
        match query {
            AggregationQuery::ObservationDepthRange { dataset } => {
                let body = json!({
                    "size": 0,
                    "query": self.collection_query(collection, dataset),
                    "aggs": {
                        "depth": {
                            "nested": {"path": "spectralCount"},
                            "aggs": {
                                "minimum": {"min": {"field": "spectralCount.depth"}},
                                "maximum": {"max": {"field": "spectralCount.depth"}}
                            }
                        }
                    }
                });
                let response = self.search(body)?;
                let min = response
                    .pointer("/aggregations/depth/minimum/value")
                    .and_then(Value::as_f64);
                let max = response
                    .pointer("/aggregations/depth/maximum/value")
                    .and_then(Value::as_f64);
                let range = match (min, max) {
                    (Some(min), Some(max)) => Some(DepthStats { min, max }),
                    _ => None,
                };
                Ok(AggregationResult::DepthRange(range))
            }
            AggregationQuery::FilterSizeBuckets { dataset } => {
                let body = json!({
                    "size": 0,
                    "query": self.collection_query(collection, dataset),
                    "aggs": {
                        "filters": {
                            "nested": {"path": "spectralCount"},
                            "aggs": {
                                "filter_size": {
                                    "terms": {"field": "spectralCount.filterSize.label"},
                                    "aggs": {
                                        "minimum": {"min": {"field": "spectralCount.filterSize.minimum"}},
                                        "maximum": {"max": {"field": "spectralCount.filterSize.maximum"}}
                                    }
                                }
                            }
                        }
                    }
                });
                let response = self.search(body)?;
                let buckets = response
                    .pointer("/aggregations/filters/filter_size/buckets")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut sizes = Vec::new();
                for bucket in buckets {
                    let Some(label) = bucket_key(&bucket) else {
                        continue;
                    };
                    sizes.push(FilterSizeBucket {
                        label,
                        minimum: bucket.pointer("/minimum/value").and_then(Value::as_f64),
                        maximum: bucket.pointer("/maximum/value").and_then(Value::as_f64),
                    });
                }
                Ok(AggregationResult::FilterSizes(sizes))
            }
            AggregationQuery::CruiseStations { dataset } => {
                let body = json!({
                    "size": 0,
                    "query": self.collection_query(collection, dataset),
                    "aggs": {
                        "data": {
                            "nested": {"path": "spectralCount"},
                            "aggs": {
                                "cruises": {
                                    "terms": {"field": "spectralCount.cruise.value"},
                                    "aggs": {
                                        "stations": {"terms": {"field": "spectralCount.station"}}
                                    }
                                }
                            }
                        }
                    }
                });
                let response = self.search(body)?;
                let buckets = response
                    .pointer("/aggregations/data/cruises/buckets")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut cruises = Vec::new();
                for bucket in buckets {
                    let Some(cruise) = bucket_key(&bucket) else {
                        continue;
                    };
                    let stations = bucket
                        .pointer("/stations/buckets")
                        .and_then(Value::as_array)
                        .map(|stations| {
                            stations.iter().filter_map(bucket_key).collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    cruises.push(CruiseStations { cruise, stations });
                }
                Ok(AggregationResult::CruiseStations(cruises))
            }
            AggregationQuery::StationCoordinate {
                dataset,
                cruise,
                station,
            } => {
                let body = json!({
                    "size": 1,
                    "_source": ["spectralCount.coordinate", "spectralCount.station", "spectralCount.cruise"],
                    "query": {
                        "bool": {
                            "must": [
                                {"term": {"docType": collection.as_str()}},
                                {"term": {"_dataset": dataset.as_str()}},
                                {
                                    "nested": {
                                        "path": "spectralCount",
                                        "query": {
                                            "bool": {
                                                "must": [
                                                    {"term": {"spectralCount.cruise.value": cruise}},
                                                    {"term": {"spectralCount.station": station}}
                                                ]
                                            }
                                        }
                                    }
                                }
                            ]
                        }
                    }
                });
                let response = self.search(body)?;
                let observations = response
                    .pointer("/hits/hits/0/_source/spectralCount")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let coordinate = observations.iter().find_map(|obs| {
                    let matches = obs
                        .pointer("/station")
                        .and_then(Value::as_str)
                        .is_some_and(|label| label == station)
                        && obs
                            .pointer("/cruise/value")
                            .and_then(Value::as_str)
                            .is_some_and(|label| label == cruise);
                    if !matches {
                        return None;
                    }
                    let lat = obs.pointer("/coordinate/lat").and_then(Value::as_f64)?;
                    let lon = obs.pointer("/coordinate/lon").and_then(Value::as_f64)?;
                    Some(Coordinate { lat, lon })
                });
                Ok(AggregationResult::Coordinate(coordinate))
            }
        }
    }
}

fn bucket_key(bucket: &Value) -> Option<String> {
    match bucket.get("key") {
        Some(Value::String(key)) => Some(key.clone()),
        Some(Value::Number(key)) => Some(key.to_string()),
        _ => None,
    }
}

fn status_error(response: reqwest::blocking::Response) -> OppError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "store request failed".to_string());
    OppError::StoreStatus { status, message }
}

/// Index mapping for the portal documents: keyword identity fields plus
/// the nested observation records the rollup aggregates over. Everything
/// else maps dynamically.
fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "docType": {"type": "keyword"},
                "_dataset": {"type": "keyword"},
                "guid": {"type": "keyword"},
                "proteinId": {"type": "keyword"},
                "sampleName": {"type": "keyword"},
                "peptideSequence": {"type": "keyword"},
                "identifiedProteins": {"type": "keyword"},
                "uniprotId": {"type": "keyword"},
                "productName": {"type": "text"},
                "fullSequence": {"type": "text"},
                "spectralCount": {
                    "type": "nested",
                    "properties": {
                        "sampleId": {"type": "keyword"},
                        "count": {"type": "double"},
                        "station": {"type": "keyword"},
                        "depth": {"type": "double"},
                        "dateTime": {"type": "date", "format": "yyyy-MM-dd'T'HH:mm:ss"},
                        "cruise": {
                            "properties": {
                                "value": {"type": "keyword"},
                                "uri": {"type": "keyword"}
                            }
                        },
                        "coordinate": {
                            "properties": {
                                "lat": {"type": "double"},
                                "lon": {"type": "double"}
                            }
                        },
                        "filterSize": {
                            "properties": {
                                "label": {"type": "keyword"},
                                "minimum": {"type": "double"},
                                "maximum": {"type": "double"}
                            }
                        }
                    }
                }
            }
        }
    })
}
