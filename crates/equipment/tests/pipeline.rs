use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use equipment::{
    Dataset, DatasetId, DatasetService, DatasetStore, Error, InMemoryStore, MeasurementRecord, ParseError,
    RetentionPolicy, StoreError, StoreResult, MAX_DATASETS, NO_DATA, SUMMARY_RAW_LIMIT,
};

const HEADER: &str = "Equipment Name,Type,Flowrate,Pressure,Temperature\n";

fn csv(rows: &[(&str, &str, f64, f64, f64)]) -> Vec<u8> {
    let mut out = HEADER.to_string();
    for (name, eq_type, f, p, t) in rows {
        out.push_str(&format!("{name},{eq_type},{f},{p},{t}\n"));
    }
    out.into_bytes()
}

fn small_csv() -> Vec<u8> {
    csv(&[("P-1", "Pump", 1.0, 2.0, 3.0), ("P-2", "Pump", 3.0, 4.0, 5.0)])
}

fn service() -> (InMemoryStore, DatasetService) {
    let store = InMemoryStore::new();
    let svc = DatasetService::new(Arc::new(store.clone()));
    (store, svc)
}

async fn committed_ids(store: &InMemoryStore) -> Vec<DatasetId> {
    let mut ids: Vec<_> = store.recent(100).await.unwrap().into_iter().map(|d| d.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn retention_keeps_the_newest_five() {
    let (store, svc) = service();

    let mut ids = vec![];
    for i in 0..=MAX_DATASETS {
        ids.push(svc.ingest(&format!("batch-{i}.csv"), &small_csv()).await.unwrap());
    }

    let survivors = committed_ids(&store).await;
    assert_eq!(survivors.len(), MAX_DATASETS);
    assert!(!survivors.contains(&ids[0]));
    assert_eq!(survivors, ids[1..].to_vec());

    // records of the evicted dataset are gone with it
    assert!(store.records(ids[0], None).await.unwrap().is_empty());
    assert!(store.source(ids[0]).await.unwrap().is_none());
    assert!(matches!(svc.summary(ids[0]).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn non_numeric_cell_leaves_no_trace() {
    let (store, svc) = service();
    svc.ingest("good.csv", &small_csv()).await.unwrap();
    let before = committed_ids(&store).await;

    let bad = format!("{HEADER}P-1,Pump,1,2,3\nP-2,Pump,fast,4,5\n");
    let err = svc.ingest("bad.csv", bad.as_bytes()).await.unwrap_err();

    assert!(matches!(err, Error::Ingest(ParseError::Row { row: 2, .. })));
    assert_eq!(err.code(), "row_parse_error");
    assert_eq!(committed_ids(&store).await, before);
    assert_eq!(store.len_including_pending().unwrap(), before.len());
}

#[tokio::test]
async fn row_of_empty_fields_leaves_no_trace() {
    let (store, svc) = service();
    svc.ingest("good.csv", &small_csv()).await.unwrap();
    let before = committed_ids(&store).await;

    let holes = format!("{HEADER}P-1,Pump,1,2,3\n,,,,\nP-2,Pump,3,4,5\n");
    let err = svc.ingest("holes.csv", holes.as_bytes()).await.unwrap_err();

    assert!(matches!(err, Error::Ingest(ParseError::Row { row: 2, .. })));
    assert_eq!(committed_ids(&store).await, before);
    assert_eq!(store.len_including_pending().unwrap(), before.len());
}

#[tokio::test]
async fn schema_error_leaves_no_trace() {
    let (store, svc) = service();
    let err = svc.ingest("bad.csv", b"Equipment Name,Type\nP,Pump\n").await.unwrap_err();

    assert_eq!(err.code(), "schema_error");
    assert_eq!(store.len_including_pending().unwrap(), 0);
}

#[tokio::test]
async fn failed_ingest_at_capacity_evicts_nothing() {
    let (store, svc) = service();
    for i in 0..MAX_DATASETS {
        svc.ingest(&format!("{i}.csv"), &small_csv()).await.unwrap();
    }
    let before = committed_ids(&store).await;

    svc.ingest("bad.csv", format!("{HEADER}X,Pump,1,,3\n").as_bytes()).await.unwrap_err();
    assert_eq!(committed_ids(&store).await, before);
}

#[tokio::test]
async fn summary_averages_two_records() {
    let (_, svc) = service();
    let id = svc.ingest("pair.csv", &small_csv()).await.unwrap();

    let summary = svc.summary(id).await.unwrap();
    assert_eq!(summary.dataset, "pair.csv");
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.averages.flowrate, Some(2.0));
    assert_eq!(summary.averages.pressure, Some(3.0));
    assert_eq!(summary.averages.temperature, Some(4.0));
}

#[tokio::test]
async fn empty_dataset_is_summarized_not_rejected() {
    let (_, svc) = service();
    let id = svc.ingest("empty.csv", HEADER.as_bytes()).await.unwrap();

    let summary = svc.summary(id).await.unwrap();
    assert_eq!(summary.total_count, 0);
    assert_eq!(summary.averages.flowrate, None);
    assert_eq!(summary.averages.pressure, None);
    assert_eq!(summary.averages.temperature, None);
    assert!(summary.distribution.is_empty());

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json["averages"]["avg_flow"].is_null());

    let (_, doc) = svc.report_document(id, Utc::now()).await.unwrap();
    assert_eq!(doc.summary().rows[1][1], NO_DATA);
    let artifact = svc.report(id, Utc::now()).await.unwrap();
    assert!(artifact.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn distribution_ignores_input_order() {
    let (_, svc) = service();
    let a = svc
        .ingest("a.csv", &csv(&[("1", "Pump", 0.0, 0.0, 0.0), ("2", "Pump", 0.0, 0.0, 0.0), ("3", "Valve", 0.0, 0.0, 0.0)]))
        .await
        .unwrap();
    let b = svc
        .ingest("b.csv", &csv(&[("3", "Valve", 0.0, 0.0, 0.0), ("1", "Pump", 0.0, 0.0, 0.0), ("2", "Pump", 0.0, 0.0, 0.0)]))
        .await
        .unwrap();

    for id in [a, b] {
        let (_, snapshot) = svc.summarize(id).await.unwrap();
        assert_eq!(snapshot.distribution.len(), 2);
        assert_eq!(snapshot.distribution["Pump"], 2);
        assert_eq!(snapshot.distribution["Valve"], 1);
    }
}

#[tokio::test]
async fn summary_and_report_share_averages() {
    let (_, svc) = service();
    let rows: Vec<_> = (0..37)
        .map(|i| {
            let v = i as f64 * 0.1 + 1.0 / 3.0;
            (format!("E{i}"), v, v * 7.3, v + 100.01)
        })
        .collect();
    let borrowed: Vec<_> = rows.iter().map(|(n, f, p, t)| (n.as_str(), "Pump", *f, *p, *t)).collect();
    let id = svc.ingest("mix.csv", &csv(&borrowed)).await.unwrap();

    let summary = svc.summary(id).await.unwrap();
    let (_, doc) = svc.report_document(id, Utc::now()).await.unwrap();
    let (_, snapshot) = svc.summarize(id).await.unwrap();

    let bits = |v: Option<f64>| v.map(f64::to_bits);
    for averages in [doc.averages(), snapshot.averages] {
        assert_eq!(bits(averages.flowrate), bits(summary.averages.flowrate));
        assert_eq!(bits(averages.pressure), bits(summary.averages.pressure));
        assert_eq!(bits(averages.temperature), bits(summary.averages.temperature));
    }
}

#[tokio::test]
async fn previews_follow_file_order() {
    let (_, svc) = service();
    let names = ["Zeta", "Alpha", "Mike", "Bravo"];
    let rows: Vec<_> = names.iter().enumerate().map(|(i, n)| (*n, "Pump", 10.0 - i as f64, 1.0, 1.0)).collect();
    let id = svc.ingest("order.csv", &csv(&rows)).await.unwrap();

    let (_, doc) = svc.report_document(id, Utc::now()).await.unwrap();
    let sample: Vec<_> = doc.sample().rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(sample, names);

    let summary = svc.summary(id).await.unwrap();
    let raw: Vec<_> = summary.raw_data.iter().map(|r| r.record.name.as_str()).collect();
    assert_eq!(raw, names);
    assert_eq!(summary.raw_data[2].position, 2);
}

#[tokio::test]
async fn summary_raw_data_is_bounded() {
    let (_, svc) = service();
    let rows: Vec<_> = (0..75).map(|_| ("E", "Pump", 1.0, 1.0, 1.0)).collect();
    let id = svc.ingest("big.csv", &csv(&rows)).await.unwrap();

    let summary = svc.summary(id).await.unwrap();
    assert_eq!(summary.total_count, 75);
    assert_eq!(summary.raw_data.len(), SUMMARY_RAW_LIMIT);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let (_, svc) = service();
    svc.ingest("a.csv", &small_csv()).await.unwrap();

    assert!(matches!(svc.summary(9999).await, Err(Error::NotFound(9999))));
    assert!(matches!(svc.summarize(9999).await, Err(Error::NotFound(9999))));
    let err = svc.report(9999, Utc::now()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(9999)));
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn history_is_newest_first_with_stats() {
    let (_, svc) = service();
    let mut ids = vec![];
    for i in 0..7 {
        ids.push(svc.ingest(&format!("h{i}.csv"), &small_csv()).await.unwrap());
    }

    let history = svc.history().await.unwrap();
    let listed: Vec<_> = history.iter().map(|h| h.id).collect();
    let mut expected = ids[2..].to_vec();
    expected.reverse();
    assert_eq!(listed, expected);
    assert!(history.iter().all(|h| h.total_count == 2 && h.averages.flowrate == Some(2.0)));
    assert_eq!(history[0].name, "h6.csv");
}

#[tokio::test]
async fn report_artifact_names_dataset_and_date() {
    let (_, svc) = service();
    let id = svc.ingest("C:\\data\\plant.csv", &small_csv()).await.unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 9, 10, 0, 0).unwrap();

    let artifact = svc.report(id, at).await.unwrap();
    assert_eq!(artifact.file_name, "report_plant.csv_20250109.pdf");
    assert!(artifact.bytes.starts_with(b"%PDF"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingests_respect_capacity() {
    let (store, svc) = service();

    let mut handles = vec![];
    for i in 0..24 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move { svc.ingest(&format!("c{i}.csv"), &small_csv()).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(committed_ids(&store).await.len(), MAX_DATASETS);
    assert_eq!(store.len_including_pending().unwrap(), MAX_DATASETS);
}

#[tokio::test]
async fn custom_policy_capacity() {
    let store = InMemoryStore::new();
    let svc = DatasetService::with_policy(Arc::new(store.clone()), RetentionPolicy::new(2));
    for i in 0..4 {
        svc.ingest(&format!("{i}.csv"), &small_csv()).await.unwrap();
    }
    assert_eq!(svc.history().await.unwrap().len(), 2);
    assert_eq!(committed_ids(&store).await.len(), 2);
}

/// Store whose commits always fail, to exercise rollback of the shell.
struct BrokenCommit(InMemoryStore);

#[async_trait]
impl DatasetStore for BrokenCommit {
    async fn create_pending(&self, name: &str, source: &[u8]) -> StoreResult<Dataset> {
        self.0.create_pending(name, source).await
    }
    async fn source(&self, id: DatasetId) -> StoreResult<Option<Vec<u8>>> {
        self.0.source(id).await
    }
    async fn commit(&self, _: DatasetId, _: &[MeasurementRecord], _: RetentionPolicy) -> StoreResult<Vec<DatasetId>> {
        Err(StoreError::Backend("disk full".into()))
    }
    async fn discard(&self, id: DatasetId) -> StoreResult<bool> {
        self.0.discard(id).await
    }
    async fn dataset(&self, id: DatasetId) -> StoreResult<Option<Dataset>> {
        self.0.dataset(id).await
    }
    async fn records(&self, id: DatasetId, limit: Option<usize>) -> StoreResult<Vec<MeasurementRecord>> {
        self.0.records(id, limit).await
    }
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Dataset>> {
        self.0.recent(limit).await
    }
    async fn purge_pending(&self) -> StoreResult<u64> {
        self.0.purge_pending().await
    }
}

#[tokio::test]
async fn store_failure_on_commit_rolls_back_shell() {
    let inner = InMemoryStore::new();
    let svc = DatasetService::new(Arc::new(BrokenCommit(inner.clone())));

    let err = svc.ingest("a.csv", &small_csv()).await.unwrap_err();
    assert_eq!(err.code(), "store_error");
    assert_eq!(inner.len_including_pending().unwrap(), 0);
}
