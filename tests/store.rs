mod common;

use serde_json::json;

use opp_ingest::domain::{Guid, stable_guid};
use opp_ingest::store::{
    AggregationQuery, AggregationResult, Collection, DocumentStore, FileStore,
};

use common::utf8;

fn open_store() -> (tempfile::TempDir, FileStore) {
    let temp = tempfile::tempdir().unwrap();
    let store = FileStore::open(utf8(temp.path()).join("store"));
    store.initialize().unwrap();
    (temp, store)
}

fn protein(dataset: &Guid, key: &str, observations: serde_json::Value) -> (Guid, serde_json::Value) {
    let guid = stable_guid(&format!("{dataset}:{key}"));
    let doc = json!({
        "guid": guid.as_str(),
        "_dataset": dataset.as_str(),
        "proteinId": key,
        "spectralCount": observations,
    });
    (guid, doc)
}

#[test]
fn upsert_then_get_round_trips() {
    let (_temp, store) = open_store();
    let dataset = stable_guid("dataset-a");
    let (guid, doc) = protein(&dataset, "P1", json!([]));

    assert!(store.get(Collection::Protein, &guid).unwrap().is_none());
    store.upsert(Collection::Protein, &guid, &doc).unwrap();
    let read = store.get(Collection::Protein, &guid).unwrap().unwrap();
    assert_eq!(read, doc);

    // Upsert replaces the whole document.
    let mut updated = doc.clone();
    updated["fullSequence"] = json!("MSSH");
    store.upsert(Collection::Protein, &guid, &updated).unwrap();
    let read = store.get(Collection::Protein, &guid).unwrap().unwrap();
    assert_eq!(read["fullSequence"], "MSSH");
}

#[test]
fn scan_filters_by_dataset() {
    let (_temp, store) = open_store();
    let dataset_a = stable_guid("dataset-a");
    let dataset_b = stable_guid("dataset-b");
    for (dataset, key) in [(&dataset_a, "P1"), (&dataset_a, "P2"), (&dataset_b, "P3")] {
        let (guid, doc) = protein(dataset, key, json!([]));
        store.upsert(Collection::Protein, &guid, &doc).unwrap();
    }

    let docs = store.scan(Collection::Protein, &dataset_a).unwrap();
    assert_eq!(docs.len(), 2);
    assert!(
        docs.iter()
            .all(|(_, doc)| doc["_dataset"] == dataset_a.as_str())
    );
}

#[test]
fn find_by_field_matches_scalars_and_arrays() {
    let (_temp, store) = open_store();
    let dataset = stable_guid("dataset-a");

    let peptide = json!({
        "guid": "pep-1",
        "_dataset": dataset.as_str(),
        "peptideSequence": "AAGK",
        "identifiedProteins": ["P1", "P2"],
    });
    store
        .upsert(Collection::Peptide, &Guid::from("pep-1".to_string()), &peptide)
        .unwrap();

    let hits = store
        .find_by_field(Collection::Peptide, &dataset, "identifiedProteins", "P2")
        .unwrap();
    assert_eq!(hits.len(), 1);
    let hits = store
        .find_by_field(Collection::Peptide, &dataset, "peptideSequence", "AAGK")
        .unwrap();
    assert_eq!(hits.len(), 1);
    let hits = store
        .find_by_field(Collection::Peptide, &dataset, "identifiedProteins", "P9")
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn aggregations_cover_depth_filters_cruises_and_coordinates() {
    let (_temp, store) = open_store();
    let dataset = stable_guid("dataset-a");

    let (guid, doc) = protein(
        &dataset,
        "P1",
        json!([
            {
                "depth": 20.0,
                "station": "ST1",
                "cruise": {"value": "AE1819"},
                "coordinate": {"lat": 31.66, "lon": -64.16},
                "filterSize": {"minimum": 0.2, "maximum": 3.0, "label": "0.2 - 3"}
            },
            {
                "depth": 150.0,
                "station": "ST2",
                "cruise": {"value": "AE1819"}
            }
        ]),
    );
    store.upsert(Collection::Protein, &guid, &doc).unwrap();

    let result = store
        .run_aggregation(
            Collection::Protein,
            &AggregationQuery::ObservationDepthRange {
                dataset: dataset.clone(),
            },
        )
        .unwrap();
    let AggregationResult::DepthRange(Some(depth)) = result else {
        panic!("expected a depth range");
    };
    assert_eq!(depth.min, 20.0);
    assert_eq!(depth.max, 150.0);

    let result = store
        .run_aggregation(
            Collection::Protein,
            &AggregationQuery::FilterSizeBuckets {
                dataset: dataset.clone(),
            },
        )
        .unwrap();
    let AggregationResult::FilterSizes(buckets) = result else {
        panic!("expected filter buckets");
    };
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].label, "0.2 - 3");

    let result = store
        .run_aggregation(
            Collection::Protein,
            &AggregationQuery::CruiseStations {
                dataset: dataset.clone(),
            },
        )
        .unwrap();
    let AggregationResult::CruiseStations(cruises) = result else {
        panic!("expected cruise stations");
    };
    assert_eq!(cruises.len(), 1);
    assert_eq!(cruises[0].cruise, "AE1819");
    assert_eq!(cruises[0].stations, vec!["ST1", "ST2"]);

    let result = store
        .run_aggregation(
            Collection::Protein,
            &AggregationQuery::StationCoordinate {
                dataset: dataset.clone(),
                cruise: "AE1819".to_string(),
                station: "ST1".to_string(),
            },
        )
        .unwrap();
    let AggregationResult::Coordinate(Some(coordinate)) = result else {
        panic!("expected a coordinate");
    };
    assert_eq!(coordinate.lat, 31.66);

    // ST2 never carries a coordinate.
    let result = store
        .run_aggregation(
            Collection::Protein,
            &AggregationQuery::StationCoordinate {
                dataset,
                cruise: "AE1819".to_string(),
                station: "ST2".to_string(),
            },
        )
        .unwrap();
    assert!(matches!(result, AggregationResult::Coordinate(None)));
}
