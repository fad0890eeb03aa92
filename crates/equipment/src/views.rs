//! JSON shapes handed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateSnapshot, Averages, Dataset, DatasetId, MeasurementRecord, TypeCount};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadReceipt {
    pub status: String,
    pub id: DatasetId,
}

impl UploadReceipt {
    pub fn success(id: DatasetId) -> Self {
        Self { status: "success".to_string(), id }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawRecordView {
    pub dataset: DatasetId,
    pub position: usize, // 0-based row in the uploaded file
    #[serde(flatten)]
    pub record: MeasurementRecord,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SummaryView {
    pub dataset: String,
    pub total_count: u64,
    pub averages: Averages,
    pub distribution: Vec<TypeCount>,
    pub raw_data: Vec<RawRecordView>,
}

impl SummaryView {
    pub fn new(dataset: &Dataset, snapshot: &AggregateSnapshot, records: &[MeasurementRecord], raw_limit: usize) -> Self {
        Self {
            dataset: dataset.name.clone(),
            total_count: snapshot.count,
            averages: snapshot.averages,
            distribution: snapshot.distribution_sorted(),
            raw_data: records
                .iter()
                .take(raw_limit)
                .enumerate()
                .map(|(position, r)| RawRecordView { dataset: dataset.id, position, record: r.clone() })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: DatasetId,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub total_count: u64,
    pub averages: Averages,
}

impl HistoryEntry {
    pub fn new(dataset: &Dataset, snapshot: &AggregateSnapshot) -> Self {
        Self {
            id: dataset.id,
            name: dataset.name.clone(),
            uploaded_at: dataset.created_at,
            total_count: snapshot.count,
            averages: snapshot.averages,
        }
    }
}
