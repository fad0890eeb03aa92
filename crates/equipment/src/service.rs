use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    aggregate, dataset_name, parse_records, report_file_name, AggregateSnapshot, Dataset, DatasetId,
    DatasetStore, Error, HistoryEntry, MeasurementRecord, ReportArtifact, ReportDocument, Result,
    RetentionPolicy, StoreError, SummaryView, SUMMARY_RAW_LIMIT,
};

/// Ingest, summary, history and report operations over one store.
#[derive(Clone)]
pub struct DatasetService {
    store: Arc<dyn DatasetStore>,
    policy: RetentionPolicy,
}

impl DatasetService {
    pub fn new(store: Arc<dyn DatasetStore>) -> Self {
        Self::with_policy(store, RetentionPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn DatasetStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// Parses and stores an upload as one unit.
    ///
    /// On any failure the shell created for the upload is removed again and
    /// the store is left as it was.
    pub async fn ingest(&self, file_name: &str, bytes: &[u8]) -> Result<DatasetId> {
        let name = dataset_name(file_name);

        // 1) shell + raw content
        let shell = self.store.create_pending(&name, bytes).await?;

        // 2) parse what was stored
        let records = match self.store.source(shell.id).await {
            Ok(Some(source)) => parse_records(&source).map_err(Error::from),
            Ok(None) => Err(StoreError::NotPending(shell.id).into()),
            Err(e) => Err(e.into()),
        };

        // 3) retention + records, or roll back
        let outcome = match records {
            Ok(records) => self
                .store
                .commit(shell.id, &records, self.policy)
                .await
                .map(|evicted| (records.len(), evicted))
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((count, evicted)) => {
                info!(dataset_id = shell.id, name = %name, records = count, "ingest: committed");
                for old in evicted {
                    info!(dataset_id = old, "retention: evicted dataset");
                }
                Ok(shell.id)
            }
            Err(e) => {
                warn!(dataset_id = shell.id, name = %name, error = %e, "ingest: rolled back");
                if let Err(cleanup) = self.store.discard(shell.id).await {
                    warn!(dataset_id = shell.id, error = %cleanup, "ingest: failed to discard shell");
                }
                Err(e)
            }
        }
    }

    async fn load(&self, id: DatasetId) -> Result<(Dataset, Vec<MeasurementRecord>)> {
        let dataset = self.store.dataset(id).await?.ok_or(Error::NotFound(id))?;
        let records = self.store.records(id, None).await?;
        Ok((dataset, records))
    }

    /// Aggregate statistics for one committed dataset.
    pub async fn summarize(&self, id: DatasetId) -> Result<(Dataset, AggregateSnapshot)> {
        let (dataset, records) = self.load(id).await?;
        Ok((dataset, aggregate(&records)))
    }

    pub async fn summary(&self, id: DatasetId) -> Result<SummaryView> {
        let (dataset, records) = self.load(id).await?;
        let snapshot = aggregate(&records);
        Ok(SummaryView::new(&dataset, &snapshot, &records, SUMMARY_RAW_LIMIT))
    }

    /// Retained datasets, most recent first.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let datasets = self.store.recent(self.policy.capacity()).await?;

        let mut out = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let records = self.store.records(dataset.id, None).await?;
            out.push(HistoryEntry::new(&dataset, &aggregate(&records)));
        }
        Ok(out)
    }

    /// Structured report for one dataset, before it is turned into PDF.
    pub async fn report_document(&self, id: DatasetId, generated_at: DateTime<Utc>) -> Result<(Dataset, ReportDocument)> {
        let (dataset, records) = self.load(id).await?;
        let snapshot = aggregate(&records);
        let document = ReportDocument::build(&dataset, &snapshot, &records, generated_at);
        Ok((dataset, document))
    }

    pub async fn report(&self, id: DatasetId, generated_at: DateTime<Utc>) -> Result<ReportArtifact> {
        let (dataset, document) = self.report_document(id, generated_at).await?;
        let bytes = document.to_pdf()?;

        info!(dataset_id = id, bytes = bytes.len(), "report: rendered");
        Ok(ReportArtifact {
            file_name: report_file_name(&dataset.name, generated_at),
            bytes,
        })
    }
}
