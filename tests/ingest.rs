mod common;

use assert_matches::assert_matches;
use serde_json::Value;

use opp_ingest::app::App;
use opp_ingest::config::IngestOptions;
use opp_ingest::datapackage::DataPackage;
use opp_ingest::domain::{EntityKind, entity_guid};
use opp_ingest::error::OppError;
use opp_ingest::merge::RowWindow;
use opp_ingest::ontology::OntologyCatalog;
use opp_ingest::store::{Collection, DocumentStore, FileStore};

use common::{
    protein_only_options, store_in, utf8, write_package, write_protein_rows,
};

fn setup(rows: &[&str]) -> (tempfile::TempDir, App<FileStore>, DataPackage) {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path());
    let package_path = write_package(&dir, false, false);
    write_protein_rows(&dir, rows);
    let store = store_in(&dir);
    store.initialize().unwrap();
    let package = DataPackage::load(&package_path).unwrap();
    let app = App::new(store, OntologyCatalog::builtin());
    (temp, app, package)
}

#[test]
fn repeated_natural_key_accumulates_observations() {
    let (_temp, app, package) = setup(&[
        "S1\tP1\tNitrogenase\t52.3\tAE1819\tST1\t20\t2018-07-20\t06:30:00\t31.66\t-64.16\t0.2\t3\t12",
        "S2\tP1\tSomething else\t99.9\tAE1819\tST2\t55\t2018-07-21\t\t31.70\t-64.20\t0.2\t3\t7",
        "S3\tP1\t\t\tAE1819\tST1\t150\t2018-07-22\t18:00:00\t31.66\t-64.16\t0.2\t3\t3",
    ]);

    let report = app.ingest(&package, &protein_only_options()).unwrap();
    assert_eq!(report.protein_rows, 3);

    let guid = entity_guid(&package.dataset_guid(), EntityKind::Protein, "P1");
    let doc = app
        .store()
        .get(Collection::Protein, &guid)
        .unwrap()
        .expect("protein document");

    let observations = doc["spectralCount"].as_array().unwrap();
    assert_eq!(observations.len(), 3);
    // Input order is preserved.
    assert_eq!(observations[0]["sampleId"], "S1");
    assert_eq!(observations[1]["sampleId"], "S2");
    assert_eq!(observations[2]["sampleId"], "S3");
    // Static fields keep the first writer's values.
    assert_eq!(doc["productName"], "Nitrogenase");
    assert_eq!(doc["molecularWeight"], 52.3);
    // Derived observation sub-objects.
    assert_eq!(observations[0]["dateTime"], "2018-07-20T06:30:00");
    assert_eq!(observations[1]["dateTime"], "2018-07-21T00:00:00");
    assert_eq!(observations[0]["filterSize"]["label"], "0.2 - 3");
    assert_eq!(observations[0]["coordinate"]["lat"], 31.66);
    assert_eq!(
        observations[0]["cruise"],
        serde_json::json!({"value": "AE1819", "uri": "http://ocean-data.org/deployment/AE1819"})
    );
}

#[test]
fn row_window_merges_only_selected_rows() {
    let (_temp, app, package) = setup(&[
        "S1\tP1\t\t\tAE1819\tST1\t10\t2018-07-20\t\t\t\t\t\t1",
        "S2\tP2\t\t\tAE1819\tST1\t20\t2018-07-20\t\t\t\t\t\t2",
        "S3\tP3\t\t\tAE1819\tST1\t30\t2018-07-20\t\t\t\t\t\t3",
        "S4\tP4\t\t\tAE1819\tST1\t40\t2018-07-20\t\t\t\t\t\t4",
        "S5\tP5\t\t\tAE1819\tST1\t50\t2018-07-20\t\t\t\t\t\t5",
    ]);

    let options = IngestOptions {
        protein_window: RowWindow::new(2, Some(4)),
        ..protein_only_options()
    };
    let report = app.ingest(&package, &options).unwrap();
    assert_eq!(report.protein_rows, 3);

    let dataset = package.dataset_guid();
    for (key, expected) in [
        ("P1", false),
        ("P2", true),
        ("P3", true),
        ("P4", true),
        ("P5", false),
    ] {
        let guid = entity_guid(&dataset, EntityKind::Protein, key);
        let present = app
            .store()
            .get(Collection::Protein, &guid)
            .unwrap()
            .is_some();
        assert_eq!(present, expected, "{key}");
    }
}

#[test]
fn conversion_failure_identifies_row_and_keeps_prior_merges() {
    let (_temp, app, package) = setup(&[
        "S1\tP1\t\t\tAE1819\tST1\t10\t2018-07-20\t\t\t\t\t\t1",
        "S2\tP2\t\t\tAE1819\tST1\t20\t2018-07-20\t\t\t\t\t\t2",
        "S3\tP3\t\t\tAE1819\tST1\tvery deep\t2018-07-20\t\t\t\t\t\t3",
        "S4\tP4\t\t\tAE1819\tST1\t40\t2018-07-20\t\t\t\t\t\t4",
        "S5\tP5\t\t\tAE1819\tST1\t50\t2018-07-20\t\t\t\t\t\t5",
    ]);

    let err = app.ingest(&package, &protein_only_options()).unwrap_err();
    assert_matches!(err, OppError::TypeConversion { row: 3, .. });
    if let OppError::TypeConversion { raw, .. } = &err {
        assert!(raw.contains("very deep"));
    }

    let dataset = package.dataset_guid();
    for (key, expected) in [("P1", true), ("P2", true), ("P3", false), ("P4", false)] {
        let guid = entity_guid(&dataset, EntityKind::Protein, key);
        let present = app
            .store()
            .get(Collection::Protein, &guid)
            .unwrap()
            .is_some();
        assert_eq!(present, expected, "{key}");
    }
}

#[test]
fn static_fields_fill_in_when_earlier_rows_left_them_absent() {
    let (_temp, app, package) = setup(&[
        "S1\tP1\t\t\tAE1819\tST1\t10\t2018-07-20\t\t\t\t\t\t1",
        "S2\tP1\tLate product name\t47.1\tAE1819\tST2\t20\t2018-07-21\t\t\t\t\t\t2",
    ]);

    app.ingest(&package, &protein_only_options()).unwrap();

    let guid = entity_guid(&package.dataset_guid(), EntityKind::Protein, "P1");
    let doc = app
        .store()
        .get(Collection::Protein, &guid)
        .unwrap()
        .unwrap();
    // The first row left these null, so the second row may fill them.
    assert_eq!(doc["productName"], "Late product name");
    assert_eq!(doc["molecularWeight"], 47.1);
    assert_eq!(doc["spectralCount"].as_array().unwrap().len(), 2);
}

#[test]
fn unknown_ontology_version_aborts_before_ingest() {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path());
    let package_path = write_package(&dir, false, false);
    write_protein_rows(&dir, &[]);

    // Rewrite the descriptor with a version the catalog does not know.
    let descriptor = std::fs::read_to_string(package_path.as_std_path()).unwrap();
    let mut descriptor: Value = serde_json::from_str(&descriptor).unwrap();
    descriptor["ontology-version"] = Value::String("v9.9".to_string());
    std::fs::write(
        package_path.as_std_path(),
        serde_json::to_string(&descriptor).unwrap(),
    )
    .unwrap();

    let store = store_in(&dir);
    store.initialize().unwrap();
    let package = DataPackage::load(&package_path).unwrap();
    let app = App::new(store, OntologyCatalog::builtin());
    let err = app.ingest(&package, &protein_only_options()).unwrap_err();
    assert_matches!(err, OppError::UnknownOntologyVersion(_));
}
