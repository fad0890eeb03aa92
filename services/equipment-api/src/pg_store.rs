use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equipment::{
    source_hash, Dataset, DatasetId, DatasetStore, MeasurementRecord, RetentionPolicy, RetentionSlot,
    StoreError, StoreResult,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Advisory lock key serializing "count, evict, commit" across connections.
const RETENTION_LOCK_KEY: i64 = 0x6571_7569_705f_7265; // "equip_re"

/// Keeps each INSERT well under the 65535 bind parameter limit.
const INSERT_CHUNK: usize = 5_000;

/// Shells younger than this may still belong to an ingest in flight.
const STALE_PENDING_SECS: i64 = 3_600;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(sqlx::FromRow)]
struct DatasetRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    source_hash: Vec<u8>,
}

impl TryFrom<DatasetRow> for Dataset {
    type Error = StoreError;

    fn try_from(r: DatasetRow) -> StoreResult<Self> {
        let source_hash = r
            .source_hash
            .try_into()
            .map_err(|_| StoreError::Backend(format!("dataset {}: corrupt source hash", r.id)))?;
        Ok(Dataset {
            id: r.id,
            name: r.name,
            created_at: r.created_at,
            source_hash,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EquipmentRow {
    name: String,
    eq_type: String,
    flowrate: f64,
    pressure: f64,
    temperature: f64,
}

impl From<EquipmentRow> for MeasurementRecord {
    fn from(r: EquipmentRow) -> Self {
        MeasurementRecord {
            name: r.name,
            eq_type: r.eq_type,
            flowrate: r.flowrate,
            pressure: r.pressure,
            temperature: r.temperature,
        }
    }
}

/// PostgreSQL-backed dataset store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn create_pending(&self, name: &str, source: &[u8]) -> StoreResult<Dataset> {
        let hash = source_hash(source);
        let row: DatasetRow = sqlx::query_as(
            r#"
            INSERT INTO datasets (name, source, source_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, created_at, source_hash
            "#,
        )
        .bind(name)
        .bind(source)
        .bind(&hash[..])
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        row.try_into()
    }

    async fn source(&self, id: DatasetId) -> StoreResult<Option<Vec<u8>>> {
        sqlx::query_scalar("SELECT source FROM datasets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn commit(
        &self,
        id: DatasetId,
        records: &[MeasurementRecord],
        policy: RetentionPolicy,
    ) -> StoreResult<Vec<DatasetId>> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // 1) one committer at a time; released with the transaction
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RETENTION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        // 2) flip the candidate; anything else means it was discarded or already committed
        let flipped = sqlx::query("UPDATE datasets SET committed = TRUE WHERE id = $1 AND NOT committed")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if flipped.rows_affected() != 1 {
            return Err(StoreError::NotPending(id));
        }

        // 3) retention over the others
        let slots: Vec<(i64, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, created_at FROM datasets WHERE committed AND id <> $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(backend)?;
        let slots: Vec<RetentionSlot> = slots
            .into_iter()
            .map(|(id, created_at)| RetentionSlot { id, created_at })
            .collect();

        let evicted = policy.admit(&slots);
        if !evicted.is_empty() {
            // equipment rows go with ON DELETE CASCADE
            sqlx::query("DELETE FROM datasets WHERE id = ANY($1)")
                .bind(&evicted[..])
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        // 4) records, in file order
        for (chunk_no, chunk) in records.chunks(INSERT_CHUNK).enumerate() {
            let offset = chunk_no * INSERT_CHUNK;
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO equipment (dataset_id, position, name, eq_type, flowrate, pressure, temperature) ",
            );
            qb.push_values(chunk.iter().enumerate(), |mut b, (i, r)| {
                b.push_bind(id)
                    .push_bind((offset + i) as i32)
                    .push_bind(&r.name)
                    .push_bind(&r.eq_type)
                    .push_bind(r.flowrate)
                    .push_bind(r.pressure)
                    .push_bind(r.temperature);
            });
            qb.build().execute(&mut *tx).await.map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(evicted)
    }

    async fn discard(&self, id: DatasetId) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM datasets WHERE id = $1 AND NOT committed")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(res.rows_affected() > 0)
    }

    async fn dataset(&self, id: DatasetId) -> StoreResult<Option<Dataset>> {
        let row: Option<DatasetRow> = sqlx::query_as(
            "SELECT id, name, created_at, source_hash FROM datasets WHERE id = $1 AND committed",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Dataset::try_from).transpose()
    }

    async fn records(&self, id: DatasetId, limit: Option<usize>) -> StoreResult<Vec<MeasurementRecord>> {
        // LIMIT NULL is no limit
        let rows: Vec<EquipmentRow> = sqlx::query_as(
            r#"
            SELECT e.name, e.eq_type, e.flowrate, e.pressure, e.temperature
            FROM equipment e
            JOIN datasets d ON d.id = e.dataset_id
            WHERE e.dataset_id = $1 AND d.committed
            ORDER BY e.position ASC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(MeasurementRecord::from).collect())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Dataset>> {
        let rows: Vec<DatasetRow> = sqlx::query_as(
            r#"
            SELECT id, name, created_at, source_hash
            FROM datasets
            WHERE committed
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Dataset::try_from).collect()
    }

    async fn purge_pending(&self) -> StoreResult<u64> {
        let res = sqlx::query(
            "DELETE FROM datasets WHERE NOT committed AND created_at < NOW() - ($1 * INTERVAL '1 second')",
        )
        .bind(STALE_PENDING_SECS)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(res.rows_affected())
    }
}
