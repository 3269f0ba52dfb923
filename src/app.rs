use serde::Serialize;
use tracing::{info, warn};

use crate::config::IngestOptions;
use crate::datapackage::{DataPackage, TabularReader};
use crate::document::{Contributor, DatasetDocument};
use crate::domain::{EntityKind, Guid, ResourceType};
use crate::error::OppError;
use crate::fasta;
use crate::linker;
use crate::mapper::RowMapper;
use crate::merge::{EntityMerger, RowWindow};
use crate::ontology::OntologyCatalog;
use crate::rollup;
use crate::store::{Collection, DocumentStore};

/// What one ingest run did, per stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub dataset: Guid,
    pub metadata_loaded: bool,
    pub protein_rows: usize,
    pub stats_updated: bool,
    pub sequences_attached: usize,
    pub peptide_rows: usize,
    pub proteins_linked: usize,
}

/// Stage orchestrator: wires the decoder, mapper, merge engine, linker and
/// rollup against one document store, in dependency order.
pub struct App<S: DocumentStore> {
    store: S,
    catalog: OntologyCatalog,
}

impl<S: DocumentStore> App<S> {
    pub fn new(store: S, catalog: OntologyCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the enabled stages over one data package. The ontology version
    /// is validated up front; an unknown version aborts before any write.
    pub fn ingest(
        &self,
        package: &DataPackage,
        options: &IngestOptions,
    ) -> Result<IngestReport, OppError> {
        let version = package.ontology_version(&self.catalog).to_string();
        if !self.catalog.contains_version(&version) {
            return Err(OppError::UnknownOntologyVersion(version));
        }

        let dataset_id = package.dataset_guid();
        info!(dataset = %dataset_id, ontology = %version, "starting ingest");

        let mut report = IngestReport {
            dataset: dataset_id.clone(),
            ..IngestReport::default()
        };

        if options.load_dataset_metadata {
            info!("loading dataset metadata");
            self.load_dataset_metadata(package, &dataset_id)?;
            report.metadata_loaded = true;
        }

        if options.load_proteins {
            info!(window = ?options.protein_window, "loading proteins");
            report.protein_rows = self.load_table(
                package,
                &version,
                &dataset_id,
                ResourceType::Protein,
                EntityKind::Protein,
                options.protein_window,
            )?;
        }

        if options.calculate_dataset_stats {
            info!("updating dataset sample stats");
            rollup::update_dataset_stats(&self.store, &dataset_id)?;
            report.stats_updated = true;
        }

        if options.load_fasta {
            info!("loading protein FASTA");
            report.sequences_attached = self.load_fasta(package, &version, &dataset_id)?;
        }

        if options.load_peptides {
            info!(window = ?options.peptide_window, "loading peptides");
            report.peptide_rows = self.load_table(
                package,
                &version,
                &dataset_id,
                ResourceType::Peptide,
                EntityKind::Peptide,
                options.peptide_window,
            )?;
        }

        if options.link_peptides {
            info!("adding peptides to proteins");
            report.proteins_linked = linker::link_peptides(&self.store, &dataset_id)?;
        }

        info!(dataset = %dataset_id, "ingest finished");
        Ok(report)
    }

    /// Build or refresh the dataset document from the package descriptor.
    /// Descriptive fields are re-applied on every run; the cruise registry
    /// is seeded only when the document is first created, and statistics
    /// from earlier rollups are preserved.
    fn load_dataset_metadata(
        &self,
        package: &DataPackage,
        dataset_id: &Guid,
    ) -> Result<(), OppError> {
        let mut dataset = match self.store.get(Collection::Dataset, dataset_id)? {
            Some(doc) => serde_json::from_value(doc)
                .map_err(|err| OppError::Store(format!("dataset {dataset_id}: {err}")))?,
            None => {
                let mut dataset = DatasetDocument {
                    guid: dataset_id.clone(),
                    ..DatasetDocument::default()
                };
                dataset.cruises = package.cruises().into_values().collect();
                dataset
            }
        };

        let descriptor = package.descriptor();
        dataset.name = descriptor
            .title
            .clone()
            .or_else(|| Some(descriptor.name.clone()));
        dataset.short_name = descriptor.short_name.clone();
        dataset.description = descriptor.description.clone();
        dataset.homepage = descriptor.homepage.clone();
        dataset.version = descriptor.version.clone();
        dataset.contributors = descriptor
            .contributors
            .iter()
            .filter_map(|contributor| {
                let name = contributor.title.clone()?;
                Some(Contributor {
                    name,
                    role: contributor.role.clone(),
                    orcid: contributor.orcid.clone(),
                    uri: contributor.uri.clone(),
                })
            })
            .collect();
        dataset.keywords = descriptor.keywords.clone();

        let doc = serde_json::to_value(&dataset)
            .map_err(|err| OppError::Store(format!("dataset {dataset_id}: {err}")))?;
        self.store.upsert(Collection::Dataset, dataset_id, &doc)
    }

    fn load_table(
        &self,
        package: &DataPackage,
        version: &str,
        dataset_id: &Guid,
        resource_type: ResourceType,
        kind: EntityKind,
        window: RowWindow,
    ) -> Result<usize, OppError> {
        let Some(resource) = package.find_resource(resource_type, &self.catalog, version)? else {
            warn!(%resource_type, "data package has no such resource; skipping");
            return Ok(0);
        };
        let schema = resource.schema.as_ref().ok_or_else(|| {
            OppError::DataPackage(format!("{resource_type} resource has no schema"))
        })?;
        let store_fields = self.catalog.store_fields(version, resource_type)?;
        let mapper = RowMapper::new(schema, store_fields)?;
        if mapper.is_empty() {
            warn!(%resource_type, "no schema field carries a mapped ontology term");
        }
        let reader = TabularReader::open(&package.resource_path(resource))?;
        let merger = EntityMerger::new(&self.store, dataset_id.clone(), package.cruises());
        merger.ingest_table(kind, reader, &mapper, window)
    }

    fn load_fasta(
        &self,
        package: &DataPackage,
        version: &str,
        dataset_id: &Guid,
    ) -> Result<usize, OppError> {
        let Some(resource) = package.find_resource(ResourceType::Fasta, &self.catalog, version)?
        else {
            warn!("data package has no FASTA resource; skipping");
            return Ok(0);
        };
        fasta::attach_sequences(&self.store, dataset_id, &package.resource_path(resource))
    }
}
