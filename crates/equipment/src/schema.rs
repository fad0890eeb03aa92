use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DatasetId = i64;
pub type Hash32 = [u8; 32];

/// Upper bound on committed datasets kept by the store.
pub const MAX_DATASETS: usize = 5;

/// Raw records returned alongside a summary.
pub const SUMMARY_RAW_LIMIT: usize = 50;

/// Sample rows printed in a report.
pub const REPORT_SAMPLE_LIMIT: usize = 20;

pub const FALLBACK_DATASET_NAME: &str = "dataset.csv";
pub const MAX_NAME_CHARS: usize = 255;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    #[serde(rename = "uploaded_at")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "hex", rename = "source_hash_hex")]
    pub source_hash: Hash32, // BLAKE3(raw upload)
}

/// One row of an uploaded file, after validation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeasurementRecord {
    pub name: String,
    pub eq_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

pub fn source_hash(bytes: &[u8]) -> Hash32 {
    blake3::hash(bytes).into()
}

/// Turns an uploaded file name into a dataset name.
///
/// Browsers occasionally send the client-side path, so only the last component
/// is kept.
pub fn dataset_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() {
        return FALLBACK_DATASET_NAME.to_string();
    }
    base.chars().take(MAX_NAME_CHARS).collect()
}
