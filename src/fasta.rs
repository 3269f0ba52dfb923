use std::fs::File;

use bio::io::fasta;
use camino::Utf8Path;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::Guid;
use crate::error::OppError;
use crate::store::{Collection, DocumentStore};

/// Attach full sequences to already-ingested proteins. Each FASTA record
/// is matched by natural key; a record with no matching protein is logged
/// and skipped. This is a single-field patch, independent of the
/// observation-accumulation path. Returns the number of records attached.
pub fn attach_sequences<S: DocumentStore>(
    store: &S,
    dataset: &Guid,
    path: &Utf8Path,
) -> Result<usize, OppError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| OppError::Filesystem(format!("open {path}: {err}")))?;
    let reader = fasta::Reader::new(file);

    let mut attached = 0usize;
    for record in reader.records() {
        let record = record.map_err(|err| OppError::FastaRead(err.to_string()))?;
        let sequence = String::from_utf8_lossy(record.seq()).to_string();

        let matches = store.find_by_field(Collection::Protein, dataset, "proteinId", record.id())?;
        if matches.is_empty() {
            warn!(id = record.id(), "no protein document for FASTA record");
            continue;
        }
        for (guid, mut doc) in matches {
            debug!(id = record.id(), %guid, "attaching full sequence");
            if let Some(fields) = doc.as_object_mut() {
                fields.insert("fullSequence".to_string(), json!(sequence));
            }
            store.upsert(Collection::Protein, &guid, &doc)?;
        }
        attached += 1;
    }
    Ok(attached)
}
