use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::ResourceType;
use crate::error::OppError;

/// Versioned mapping between the ontology and the document store: which
/// data-file-type URI tags each resource kind, and where each ontology
/// term lands in a store document. Loaded once and passed into the engine;
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyCatalog {
    latest: String,
    versions: BTreeMap<String, VersionMappings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMappings {
    /// Resource type name -> data-file-type URI.
    #[serde(rename = "dataFileTypes")]
    data_file_types: BTreeMap<String, String>,
    /// Resource type name -> (rdfType -> store field path).
    mappings: BTreeMap<String, BTreeMap<String, String>>,
}

impl OntologyCatalog {
    pub fn from_file(path: &Utf8Path) -> Result<Self, OppError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| OppError::Filesystem(format!("read ontology catalog {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| OppError::ConfigParse(err.to_string()))
    }

    pub fn latest_version(&self) -> &str {
        &self.latest
    }

    pub fn contains_version(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }

    fn version(&self, version: &str) -> Result<&VersionMappings, OppError> {
        self.versions
            .get(version)
            .ok_or_else(|| OppError::UnknownOntologyVersion(version.to_string()))
    }

    /// The URI that tags a resource of the given type in a data package.
    pub fn data_file_type(
        &self,
        version: &str,
        resource_type: ResourceType,
    ) -> Result<&str, OppError> {
        self.version(version)?
            .data_file_types
            .get(resource_type.as_str())
            .map(String::as_str)
            .ok_or_else(|| {
                OppError::Configuration(format!(
                    "ontology {version} has no data file type for {resource_type}"
                ))
            })
    }

    /// rdfType -> store field path table for one resource type.
    pub fn store_fields(
        &self,
        version: &str,
        resource_type: ResourceType,
    ) -> Result<&BTreeMap<String, String>, OppError> {
        self.version(version)?
            .mappings
            .get(resource_type.as_str())
            .ok_or_else(|| {
                OppError::Configuration(format!(
                    "ontology {version} has no field mappings for {resource_type}"
                ))
            })
    }

    /// The catalog shipped with the crate: ontology v1.0.
    pub fn builtin() -> Self {
        let data_uri = "http://ocean-data.org/schema/data-type/v1.0/";
        let term_uri = "http://ocean-data.org/schema/v1.0/#";

        let mut data_file_types = BTreeMap::new();
        data_file_types.insert(
            "protein".to_string(),
            format!("{data_uri}ProteinSpectralCounts"),
        );
        data_file_types.insert(
            "peptide".to_string(),
            format!("{data_uri}PeptideSpectralCounts"),
        );
        data_file_types.insert(
            "fasta".to_string(),
            format!("{data_uri}FASTA-ProteinIdentifications"),
        );

        let observation_terms: [(&str, &str); 10] = [
            ("SampleIdentifier", "spectralCount.sampleId"),
            ("SpectralCount", "spectralCount.count"),
            ("CruiseIdentifier", "spectralCount.cruise"),
            ("StationIdentifier", "spectralCount.station"),
            ("DepthMeters", "spectralCount.depth"),
            ("ObservationDateTime", "spectralCount.dateTime"),
            ("ObservationDate", "spectralCount.date"),
            ("ObservationTime", "spectralCount.time"),
            ("LatitudeDecimalDegrees", "spectralCount.coordinate.lat"),
            ("LongitudeDecimalDegrees", "spectralCount.coordinate.lon"),
        ];
        let filter_terms: [(&str, &str); 2] = [
            ("FilterSizeMinimum", "filterSize.minimum"),
            ("FilterSizeMaximum", "filterSize.maximum"),
        ];

        let mut protein = BTreeMap::new();
        for (term, field) in [
            ("ProteinIdentifier", "proteinId"),
            ("ProductName", "productName"),
            ("MolecularWeight", "molecularWeight"),
            ("EnzymeCommissionIdentifier", "enzymeCommId"),
            ("UniprotIdentifier", "uniprotId"),
            ("OtherIdentifiedProteins", "otherIdentifiedProteins"),
            ("NcbiTaxonIdentifier", "ncbiTaxon.id"),
            ("NcbiTaxonName", "ncbiTaxon.name"),
            ("KeggIdentifier", "kegg.id"),
            ("KeggDescription", "kegg.description"),
            ("KeggPathway", "kegg.pathway"),
            ("PFamsIdentifier", "pfams.id"),
            ("PFamsName", "pfams.name"),
        ] {
            protein.insert(format!("{term_uri}{term}"), field.to_string());
        }
        for (term, field) in observation_terms.iter().chain(filter_terms.iter()) {
            protein.insert(format!("{term_uri}{term}"), field.to_string());
        }

        let mut peptide = BTreeMap::new();
        for (term, field) in [
            ("SampleName", "sampleName"),
            ("ProteinIdentifier", "proteinId"),
            ("PeptideSequence", "peptideSequence"),
            ("IdentifiedProteins", "identifiedProteins"),
            ("OtherProteinIdentifiers", "otherProteinIds"),
        ] {
            peptide.insert(format!("{term_uri}{term}"), field.to_string());
        }
        for (term, field) in observation_terms.iter().chain(filter_terms.iter()) {
            peptide.insert(format!("{term_uri}{term}"), field.to_string());
        }

        let mut mappings = BTreeMap::new();
        mappings.insert("protein".to_string(), protein);
        mappings.insert("peptide".to_string(), peptide);

        let mut versions = BTreeMap::new();
        versions.insert(
            "v1.0".to_string(),
            VersionMappings {
                data_file_types,
                mappings,
            },
        );

        Self {
            latest: "v1.0".to_string(),
            versions,
        }
    }
}
