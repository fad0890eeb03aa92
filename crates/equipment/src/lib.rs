//! Equipment measurement datasets
//!
//! Parses uploaded CSV measurements, keeps a bounded window of recent datasets,
//! aggregates them and renders PDF reports.

pub mod aggregate;
pub mod error;
pub mod parser;
pub mod report;
pub mod retention;
pub mod schema;
pub mod service;
pub mod store;
pub mod views;

pub use aggregate::{aggregate, AggregateSnapshot, Averages, TypeCount};
pub use error::{Error, ParseError, Result, StoreError, StoreResult};
pub use parser::{parse_records, REQUIRED_COLUMNS};
pub use report::{report_file_name, ReportArtifact, ReportDocument, ReportSection, NO_DATA};
pub use retention::{RetentionPolicy, RetentionSlot};
pub use schema::*;
pub use service::DatasetService;
pub use store::{DatasetStore, InMemoryStore};
pub use views::{HistoryEntry, RawRecordView, SummaryView, UploadReceipt};
