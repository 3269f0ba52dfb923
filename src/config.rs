use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::OppError;
use crate::merge::RowWindow;

/// Raw JSON shape of an ingest job config (`opp-ingest.json`). Stage keys
/// follow the submission tooling's kebab-case names; every stage defaults
/// to off so a config lists exactly what it wants run.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub datapackage: Option<String>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub ontology: Option<String>,
    #[serde(default)]
    pub ingest: Option<StagesConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    File {
        #[serde(default)]
        root: Option<String>,
    },
    Elastic {
        url: String,
        #[serde(default)]
        index: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StagesConfig {
    #[serde(default)]
    pub load_dataset_metadata: bool,
    #[serde(default)]
    pub load_protein_data: bool,
    #[serde(default)]
    pub protein_load_row_start: Option<usize>,
    #[serde(default)]
    pub protein_load_row_stop: Option<usize>,
    #[serde(default)]
    pub calculate_dataset_metadata_stats: bool,
    #[serde(default)]
    pub load_fasta: bool,
    #[serde(default)]
    pub load_peptide_data: bool,
    #[serde(default)]
    pub peptide_load_row_start: Option<usize>,
    #[serde(default)]
    pub peptide_load_row_stop: Option<usize>,
    #[serde(default)]
    pub add_peptides_to_proteins: bool,
}

/// Validated job config handed to the application.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub datapackage: Utf8PathBuf,
    pub store: StoreConfig,
    pub ontology: Option<Utf8PathBuf>,
    pub options: IngestOptions,
}

/// Which stages to run, in ingest order, plus the table row windows.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub load_dataset_metadata: bool,
    pub load_proteins: bool,
    pub protein_window: RowWindow,
    pub calculate_dataset_stats: bool,
    pub load_fasta: bool,
    pub load_peptides: bool,
    pub peptide_window: RowWindow,
    pub link_peptides: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, OppError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("opp-ingest.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(OppError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| OppError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| OppError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, OppError> {
        let datapackage = config
            .datapackage
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| {
                OppError::Configuration("the config does not name a datapackage".to_string())
            })?;

        let stages = config.ingest.unwrap_or_default();
        let options = IngestOptions {
            load_dataset_metadata: stages.load_dataset_metadata,
            load_proteins: stages.load_protein_data,
            protein_window: RowWindow::new(
                stages.protein_load_row_start.unwrap_or(0),
                stages.protein_load_row_stop,
            ),
            calculate_dataset_stats: stages.calculate_dataset_metadata_stats,
            load_fasta: stages.load_fasta,
            load_peptides: stages.load_peptide_data,
            peptide_window: RowWindow::new(
                stages.peptide_load_row_start.unwrap_or(0),
                stages.peptide_load_row_stop,
            ),
            link_peptides: stages.add_peptides_to_proteins,
        };

        Ok(ResolvedConfig {
            datapackage: Utf8PathBuf::from(datapackage),
            store: config.store.unwrap_or(StoreConfig::File { root: None }),
            ontology: config.ontology.map(Utf8PathBuf::from),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_full_config() {
        let config: Config = serde_json::from_str(
            r#"{
              "datapackage": "pkg/datapackage.json",
              "store": {"kind": "elastic", "url": "http://localhost:9200", "index": "protein-portal"},
              "ingest": {
                "load-dataset-metadata": true,
                "load-protein-data": true,
                "protein-load-row-start": 10,
                "calculate-dataset-metadata-stats": true
              }
            }"#,
        )
        .unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.datapackage, Utf8PathBuf::from("pkg/datapackage.json"));
        assert_matches!(resolved.store, StoreConfig::Elastic { .. });
        assert!(resolved.options.load_dataset_metadata);
        assert!(resolved.options.load_proteins);
        assert_eq!(resolved.options.protein_window.start, 10);
        assert_eq!(resolved.options.protein_window.stop, None);
        assert!(!resolved.options.load_peptides);
        assert!(!resolved.options.link_peptides);
    }

    #[test]
    fn config_without_datapackage_is_rejected() {
        let config: Config = serde_json::from_str(r#"{"ingest": {}}"#).unwrap();
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, OppError::Configuration(_));
    }
}
