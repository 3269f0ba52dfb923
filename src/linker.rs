use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::document;
use crate::domain::Guid;
use crate::error::OppError;
use crate::store::{Collection, DocumentStore};

/// Attach peptide evidence to proteins: for every protein in the dataset,
/// collect the distinct peptide sequences whose `identifiedProteins`
/// reference the protein's natural key, and replace the protein's
/// `peptideSequence` field with that set. Full reconciliation over the
/// indexed documents, so re-running with unchanged peptide data is a
/// no-op. Returns the number of proteins updated.
pub fn link_peptides<S: DocumentStore>(store: &S, dataset: &Guid) -> Result<usize, OppError> {
    let mut linked = 0usize;
    for (guid, mut doc) in store.scan(Collection::Protein, dataset)? {
        let Some(protein_id) = document::value_at(&doc, "proteinId")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            warn!(%guid, "protein document without a proteinId; skipping");
            continue;
        };

        let mut sequences: Vec<String> = Vec::new();
        for (_, peptide) in
            store.find_by_field(Collection::Peptide, dataset, "identifiedProteins", &protein_id)?
        {
            let Some(sequence) = document::value_at(&peptide, "peptideSequence")
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !sequences.iter().any(|existing| existing == sequence) {
                sequences.push(sequence.to_string());
            }
        }
        if sequences.is_empty() {
            continue;
        }

        debug!(protein = %protein_id, peptides = sequences.len(), "linking peptides");
        if let Some(fields) = doc.as_object_mut() {
            fields.insert("peptideSequence".to_string(), json!(sequences));
        }
        store.upsert(Collection::Protein, &guid, &doc)?;
        linked += 1;
    }
    Ok(linked)
}
