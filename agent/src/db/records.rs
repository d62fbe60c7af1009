//! SQLite-backed [`LocalStore`] over the `offline_records` table.

use async_trait::async_trait;
use outbox_engine::{EntityType, Error, IndexQuery, LocalStore, OfflineRecord};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{run_migrations, Pool};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub id: String,
    pub record_type: String,
    pub payload: String,
    pub enqueued_at: i64,
    pub synced: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub dead_lettered: bool,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            id: row.try_get("id")?,
            record_type: row.try_get("record_type")?,
            payload: row.try_get("payload")?,
            enqueued_at: row.try_get("enqueued_at")?,
            synced: row.try_get("synced")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            dead_lettered: row.try_get("dead_lettered")?,
        })
    }
}

impl StoredRecord {
    /// Convert a database row to an engine record.
    pub fn to_record(&self) -> Result<OfflineRecord, Error> {
        let entity_type: EntityType = self
            .record_type
            .parse()
            .map_err(|_| Error::StorageRead(format!("row {} has unknown type", self.id)))?;
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| Error::StorageRead(format!("row {} payload: {}", self.id, e)))?;

        Ok(OfflineRecord {
            id: self.id.clone(),
            entity_type,
            payload,
            enqueued_at: self.enqueued_at.max(0) as u64,
            synced: self.synced,
            attempts: self.attempts.clamp(0, u32::MAX as i64) as u32,
            last_error: self.last_error.clone(),
            dead_lettered: self.dead_lettered,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, record_type, payload, enqueued_at, synced, attempts, last_error, dead_lettered
    FROM offline_records
"#;

/// Durable outbox store on SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn fetch(&self, sql: &str, query: Option<IndexQuery>) -> Result<Vec<OfflineRecord>, Error> {
        let mut q = sqlx::query_as::<_, StoredRecord>(sql);
        q = match query {
            Some(IndexQuery::Type(t)) => q.bind(t.as_str()),
            Some(IndexQuery::Synced(s)) => q.bind(s),
            Some(IndexQuery::DeadLettered) | None => q,
        };
        q.fetch_all(&self.pool)
            .await
            .map_err(read_error)?
            .iter()
            .map(StoredRecord::to_record)
            .collect()
    }
}

fn index_clause(query: IndexQuery) -> &'static str {
    match query {
        IndexQuery::Type(_) => "WHERE record_type = ?",
        IndexQuery::Synced(_) => "WHERE synced = ?",
        IndexQuery::DeadLettered => "WHERE synced = 0 AND dead_lettered = 1",
    }
}

fn read_error(e: sqlx::Error) -> Error {
    Error::StorageRead(e.to_string())
}

fn write_error(e: sqlx::Error) -> Error {
    Error::StorageWrite(e.to_string())
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn open(&self) -> Result<(), Error> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| Error::StorageInit(e.to_string()))
    }

    async fn put(&self, record: &OfflineRecord) -> Result<(), Error> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| Error::StorageWrite(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO offline_records (
                id, record_type, payload, enqueued_at, synced,
                attempts, last_error, dead_lettered
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                synced = excluded.synced,
                attempts = excluded.attempts,
                last_error = excluded.last_error,
                dead_lettered = excluded.dead_lettered
            "#,
        )
        .bind(&record.id)
        .bind(record.entity_type.as_str())
        .bind(payload)
        .bind(record.enqueued_at as i64)
        .bind(record.synced)
        .bind(record.attempts as i64)
        .bind(&record.last_error)
        .bind(record.dead_lettered)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<OfflineRecord>, Error> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        sqlx::query_as::<_, StoredRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?
            .map(|row| row.to_record())
            .transpose()
    }

    async fn get_all(&self) -> Result<Vec<OfflineRecord>, Error> {
        self.fetch(SELECT_COLUMNS, None).await
    }

    async fn get_by_index(&self, query: IndexQuery) -> Result<Vec<OfflineRecord>, Error> {
        let sql = format!("{SELECT_COLUMNS} {}", index_clause(query));
        self.fetch(&sql, Some(query)).await
    }

    async fn count_by_index(&self, query: IndexQuery) -> Result<usize, Error> {
        let sql = format!("SELECT COUNT(*) FROM offline_records {}", index_clause(query));
        let q = sqlx::query_scalar::<_, i64>(&sql);
        let q = match query {
            IndexQuery::Type(t) => q.bind(t.as_str()),
            IndexQuery::Synced(s) => q.bind(s),
            IndexQuery::DeadLettered => q,
        };
        let count = q.fetch_one(&self.pool).await.map_err(read_error)?;
        Ok(count.max(0) as usize)
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM offline_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        sqlx::query("DELETE FROM offline_records")
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }
}
