#![allow(dead_code)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};

use opp_ingest::config::IngestOptions;
use opp_ingest::store::FileStore;

pub const TERM: &str = "http://ocean-data.org/schema/v1.0/#";
pub const DATA_TYPE: &str = "http://ocean-data.org/schema/data-type/v1.0/";

pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

pub fn store_in(dir: &Utf8Path) -> FileStore {
    FileStore::open(dir.join("store"))
}

fn field(name: &str, field_type: &str, term: &str) -> Value {
    json!({
        "name": name,
        "type": field_type,
        "rdfType": format!("{TERM}{term}"),
        "missingValues": ["", "NA"]
    })
}

fn protein_resource() -> Value {
    json!({
        "profile": "tabular-data-resource",
        "name": "proteins",
        "path": "proteins.tsv",
        "odo-dt:dataType": {"@id": format!("{DATA_TYPE}ProteinSpectralCounts")},
        "schema": {"fields": [
            field("sample_id", "string", "SampleIdentifier"),
            field("protein_id", "string", "ProteinIdentifier"),
            field("product_name", "string", "ProductName"),
            field("molecular_weight", "number", "MolecularWeight"),
            field("cruise_id", "string", "CruiseIdentifier"),
            field("station", "string", "StationIdentifier"),
            field("depth_m", "number", "DepthMeters"),
            field("date", "string", "ObservationDate"),
            field("time", "string", "ObservationTime"),
            field("lat", "number", "LatitudeDecimalDegrees"),
            field("lon", "number", "LongitudeDecimalDegrees"),
            field("filter_min", "number", "FilterSizeMinimum"),
            field("filter_max", "number", "FilterSizeMaximum"),
            field("spectral_count", "integer", "SpectralCount"),
        ]}
    })
}

fn peptide_resource() -> Value {
    let mut identified = field("identified_proteins", "string", "IdentifiedProteins");
    identified["opp:fieldValueDelimiter"] = json!(";");
    json!({
        "profile": "tabular-data-resource",
        "name": "peptides",
        "path": "peptides.tsv",
        "odo-dt:dataType": {"@id": format!("{DATA_TYPE}PeptideSpectralCounts")},
        "schema": {"fields": [
            field("sample_name", "string", "SampleName"),
            field("protein_id", "string", "ProteinIdentifier"),
            field("peptide_sequence", "string", "PeptideSequence"),
            identified,
            field("cruise_id", "string", "CruiseIdentifier"),
            field("station", "string", "StationIdentifier"),
            field("depth_m", "number", "DepthMeters"),
            field("spectral_count", "integer", "SpectralCount"),
        ]}
    })
}

fn fasta_resource() -> Value {
    json!({
        "profile": "data-resource",
        "name": "fasta",
        "path": "proteins.fasta",
        "format": "fasta",
        "odo-dt:dataType": {"@id": format!("{DATA_TYPE}FASTA-ProteinIdentifications")}
    })
}

/// Write a datapackage.json into `dir` describing the fixture resources.
pub fn write_package(dir: &Utf8Path, with_peptides: bool, with_fasta: bool) -> Utf8PathBuf {
    let mut resources = vec![protein_resource()];
    if with_fasta {
        resources.push(fasta_resource());
    }
    if with_peptides {
        resources.push(peptide_resource());
    }
    let descriptor = json!({
        "name": "bats_chisholm_2018_v1_0",
        "title": "BATS Chisholm 2018",
        "opp:shortName": "BATS-2018",
        "version": "1.0",
        "ontology-version": "v1.0",
        "odo:hasDeployment": [
            {"name": "AE1819", "uri": "http://ocean-data.org/deployment/AE1819"}
        ],
        "contributors": [
            {"title": "M. Saito", "role": "author"},
            {"role": "publisher"}
        ],
        "keywords": ["proteomics", "ocean"],
        "resources": resources
    });
    let path = dir.join("datapackage.json");
    fs::write(
        path.as_std_path(),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
    path
}

pub const PROTEIN_HEADER: &str = "sample_id\tprotein_id\tproduct_name\tmolecular_weight\tcruise_id\tstation\tdepth_m\tdate\ttime\tlat\tlon\tfilter_min\tfilter_max\tspectral_count";

pub fn write_protein_rows(dir: &Utf8Path, rows: &[&str]) {
    let mut table = String::from(PROTEIN_HEADER);
    for row in rows {
        table.push('\n');
        table.push_str(row);
    }
    table.push('\n');
    fs::write(dir.join("proteins.tsv").as_std_path(), table).unwrap();
}

pub const PEPTIDE_HEADER: &str = "sample_name\tprotein_id\tpeptide_sequence\tidentified_proteins\tcruise_id\tstation\tdepth_m\tspectral_count";

pub fn write_peptide_rows(dir: &Utf8Path, rows: &[&str]) {
    let mut table = String::from(PEPTIDE_HEADER);
    for row in rows {
        table.push('\n');
        table.push_str(row);
    }
    table.push('\n');
    fs::write(dir.join("peptides.tsv").as_std_path(), table).unwrap();
}

pub fn write_fasta(dir: &Utf8Path, content: &str) {
    fs::write(dir.join("proteins.fasta").as_std_path(), content).unwrap();
}

pub fn protein_only_options() -> IngestOptions {
    IngestOptions {
        load_dataset_metadata: true,
        load_proteins: true,
        ..IngestOptions::default()
    }
}

pub fn all_stage_options() -> IngestOptions {
    IngestOptions {
        load_dataset_metadata: true,
        load_proteins: true,
        calculate_dataset_stats: true,
        load_fasta: true,
        load_peptides: true,
        link_peptides: true,
        ..IngestOptions::default()
    }
}
