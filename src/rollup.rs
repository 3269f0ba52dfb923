use tracing::{debug, info};

use crate::document::{CruiseEntry, DatasetDocument, StationEntry};
use crate::domain::Guid;
use crate::error::OppError;
use crate::store::{AggregationQuery, AggregationResult, Collection, DocumentStore};

/// Recompute dataset-wide statistics from the indexed protein documents
/// and merge them into the dataset document. Depth range and filter-size
/// buckets are replaced wholesale; the cruise table is merged cruise by
/// cruise, and a station coordinate resolved on an earlier run is kept
/// verbatim and never re-queried.
pub fn update_dataset_stats<S: DocumentStore>(
    store: &S,
    dataset_id: &Guid,
) -> Result<DatasetDocument, OppError> {
    let existing = store.get(Collection::Dataset, dataset_id)?.ok_or_else(|| {
        OppError::Store(format!(
            "dataset document {dataset_id} not found; load dataset metadata first"
        ))
    })?;
    let mut dataset: DatasetDocument = serde_json::from_value(existing)
        .map_err(|err| OppError::Store(format!("dataset {dataset_id}: {err}")))?;

    let depth = store.run_aggregation(
        Collection::Protein,
        &AggregationQuery::ObservationDepthRange {
            dataset: dataset_id.clone(),
        },
    )?;
    if let AggregationResult::DepthRange(Some(stats)) = depth {
        info!(min = stats.min, max = stats.max, "depth stats");
        dataset.depth_stats = Some(stats);
    }

    let filters = store.run_aggregation(
        Collection::Protein,
        &AggregationQuery::FilterSizeBuckets {
            dataset: dataset_id.clone(),
        },
    )?;
    if let AggregationResult::FilterSizes(buckets) = filters {
        if !buckets.is_empty() {
            info!(buckets = buckets.len(), "filter size stats");
            dataset.filter_size = buckets;
        }
    }

    let cruises = store.run_aggregation(
        Collection::Protein,
        &AggregationQuery::CruiseStations {
            dataset: dataset_id.clone(),
        },
    )?;
    if let AggregationResult::CruiseStations(observed) = cruises {
        for cruise_stations in observed {
            let index = match dataset
                .cruises
                .iter()
                .position(|entry| entry.label == cruise_stations.cruise)
            {
                Some(index) => index,
                None => {
                    dataset.cruises.push(CruiseEntry {
                        label: cruise_stations.cruise.clone(),
                        uri: None,
                        stations: Vec::new(),
                    });
                    dataset.cruises.len() - 1
                }
            };
            let entry = &mut dataset.cruises[index];

            for station in cruise_stations.stations {
                if entry.stations.iter().any(|existing| existing.label == station) {
                    debug!(
                        cruise = %cruise_stations.cruise,
                        station = %station,
                        "station already resolved"
                    );
                    continue;
                }
                let coordinate = store.run_aggregation(
                    Collection::Protein,
                    &AggregationQuery::StationCoordinate {
                        dataset: dataset_id.clone(),
                        cruise: cruise_stations.cruise.clone(),
                        station: station.clone(),
                    },
                )?;
                if let AggregationResult::Coordinate(Some(coordinate)) = coordinate {
                    debug!(cruise = %cruise_stations.cruise, station = %station, "resolved station");
                    entry.stations.push(StationEntry {
                        label: station,
                        latitude: coordinate.lat,
                        longitude: coordinate.lon,
                    });
                }
            }
        }
    }

    let doc = serde_json::to_value(&dataset)
        .map_err(|err| OppError::Store(format!("dataset {dataset_id}: {err}")))?;
    store.upsert(Collection::Dataset, dataset_id, &doc)?;
    Ok(dataset)
}
