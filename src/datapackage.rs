use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::document::CruiseEntry;
use crate::domain::{self, Guid, ResourceType};
use crate::error::OppError;
use crate::ontology::OntologyCatalog;

/// Parsed data-package descriptor. Structural validation beyond what the
/// ingest needs happens upstream, in the packaging tool.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "opp:shortName", default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "ontology-version", default)]
    pub ontology_version: Option<String>,
    #[serde(default)]
    pub contributors: Vec<ContributorDescriptor>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "odo:hasDeployment", default)]
    pub deployments: Vec<DeploymentDescriptor>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributorDescriptor {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentDescriptor {
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(rename = "odo-dt:dataType", default)]
    pub data_type: Option<DataTypeRef>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataTypeRef {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<SchemaField>,
}

/// One field of a tabular resource schema: the ontology term tag plus the
/// decoding hints the Field Value Decoder consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(rename = "rdfType", default)]
    pub rdf_type: Option<String>,
    #[serde(rename = "missingValues", default)]
    pub missing_values: Option<Vec<String>>,
    #[serde(rename = "opp:fieldValueDelimiter", default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub constraints: Option<FieldConstraints>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldConstraints {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataPackage {
    descriptor: PackageDescriptor,
    base_dir: Utf8PathBuf,
}

impl DataPackage {
    pub fn load(path: &Utf8Path) -> Result<Self, OppError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| OppError::DataPackage(format!("read {path}: {err}")))?;
        let descriptor: PackageDescriptor = serde_json::from_str(&content)
            .map_err(|err| OppError::DataPackage(format!("parse {path}: {err}")))?;
        if descriptor.name.trim().is_empty() {
            return Err(OppError::Configuration(
                "data package name is required".to_string(),
            ));
        }
        let base_dir = path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Ok(Self {
            descriptor,
            base_dir,
        })
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    pub fn dataset_guid(&self) -> Guid {
        domain::dataset_guid(&self.descriptor.name, self.descriptor.version.as_deref())
    }

    /// The ontology version the data provider declared, or the catalog's
    /// latest when the descriptor is silent.
    pub fn ontology_version<'a>(&'a self, catalog: &'a OntologyCatalog) -> &'a str {
        self.descriptor
            .ontology_version
            .as_deref()
            .unwrap_or_else(|| catalog.latest_version())
    }

    /// Cruise registry declared in the descriptor: label -> entry with URI
    /// and an empty station list (stations are resolved by the rollup).
    pub fn cruises(&self) -> BTreeMap<String, CruiseEntry> {
        self.descriptor
            .deployments
            .iter()
            .map(|deployment| {
                (
                    deployment.name.clone(),
                    CruiseEntry {
                        label: deployment.name.clone(),
                        uri: deployment.uri.clone(),
                        stations: Vec::new(),
                    },
                )
            })
            .collect()
    }

    /// Find the resource tagged with the data-file-type URI of the given
    /// resource type. Absent resources are not an error; stages skip them.
    pub fn find_resource(
        &self,
        resource_type: ResourceType,
        catalog: &OntologyCatalog,
        ontology_version: &str,
    ) -> Result<Option<&ResourceDescriptor>, OppError> {
        let wanted = catalog.data_file_type(ontology_version, resource_type)?;
        Ok(self.descriptor.resources.iter().find(|resource| {
            resource
                .data_type
                .as_ref()
                .is_some_and(|data_type| data_type.id == wanted)
        }))
    }

    pub fn resource_path(&self, resource: &ResourceDescriptor) -> Utf8PathBuf {
        self.base_dir.join(&resource.path)
    }
}

/// One keyed table row: (field name, raw cell text) pairs in column order.
pub type KeyedRow = Vec<(String, String)>;

/// Streaming reader over one tabular resource. The delimiter follows the
/// file extension: `.csv` is comma separated, everything else tab.
pub struct TabularReader {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<fs::File>,
}

impl TabularReader {
    pub fn open(path: &Utf8Path) -> Result<Self, OppError> {
        let delimiter = match path.extension() {
            Some("csv") => b',',
            _ => b'\t',
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| OppError::TableRead(format!("open {path}: {err}")))?;
        let headers = reader
            .headers()
            .map_err(|err| OppError::TableRead(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }
}

impl Iterator for TabularReader {
    type Item = Result<KeyedRow, OppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(OppError::TableRead(err.to_string()))),
        };
        let row = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        Some(Ok(row))
    }
}
