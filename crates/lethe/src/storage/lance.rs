use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMicrosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::Mutex;

use crate::error::{LetheError, Result};
use crate::memory::types::{ForgettingStage, MemoryRecord, StageUpdate, TransitionLogEntry};
use crate::storage::filter::escape_sql;
use crate::storage::{LifecycleStore, RecordFilter, sort_oldest_first};

pub const RECORDS_TABLE: &str = "memory_lifecycle";
pub const LOG_TABLE: &str = "forgetting_log";

/// LanceDB-backed lifecycle store.
///
/// Every record write is a single LanceDB update (one commit), and writers are
/// serialized through `write_lock` so concurrent access bumps and stage
/// updates cannot race on the same row.
pub struct LanceLifecycleStore {
    connection: Connection,
    records_table: Option<Table>,
    log_table: Option<Table>,
    write_lock: Mutex<()>,
}

impl LanceLifecycleStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| LetheError::Storage("Invalid path encoding".to_string()))?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            records_table: None,
            log_table: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Connect and open both tables, creating whichever is missing
    pub async fn open_or_create(path: &Path) -> Result<Self> {
        let mut store = Self::connect(path).await?;

        if store.table_exists(RECORDS_TABLE).await? {
            tracing::debug!("Opening existing {RECORDS_TABLE} table");
            store.open_records_table().await?;
        } else {
            tracing::info!("Creating {RECORDS_TABLE} table");
            store.create_records_table().await?;
        }

        if store.table_exists(LOG_TABLE).await? {
            tracing::debug!("Opening existing {LOG_TABLE} table");
            store.open_log_table().await?;
        } else {
            tracing::info!("Creating {LOG_TABLE} table");
            store.create_log_table().await?;
        }

        Ok(store)
    }

    fn records_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("memory_id", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, true),
            Field::new("importance_score", DataType::Float32, false),
            Field::new("emotional_score", DataType::Float32, false),
            Field::new("access_count", DataType::Int32, false),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new(
                "last_accessed",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("compression_ratio", DataType::Float32, false),
            Field::new("forgetting_stage", DataType::Utf8, false),
        ]))
    }

    fn log_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("memory_id", DataType::Utf8, false),
            Field::new("old_stage", DataType::Utf8, false),
            Field::new("new_stage", DataType::Utf8, false),
            Field::new("reason", DataType::Utf8, false),
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
        ]))
    }

    pub async fn create_records_table(&mut self) -> Result<()> {
        let schema = Self::records_schema();
        let batch = Self::records_to_batch(&[], schema.clone())?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let table = self
            .connection
            .create_table(RECORDS_TABLE, Box::new(batches))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to create records table: {e}")))?;

        self.records_table = Some(table);
        Ok(())
    }

    pub async fn create_log_table(&mut self) -> Result<()> {
        let schema = Self::log_schema();
        let batch = Self::log_entries_to_batch(&[], schema.clone())?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let table = self
            .connection
            .create_table(LOG_TABLE, Box::new(batches))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to create log table: {e}")))?;

        self.log_table = Some(table);
        Ok(())
    }

    pub async fn open_records_table(&mut self) -> Result<()> {
        let table = self
            .connection
            .open_table(RECORDS_TABLE)
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to open records table: {e}")))?;

        self.records_table = Some(table);
        Ok(())
    }

    pub async fn open_log_table(&mut self) -> Result<()> {
        let table = self
            .connection
            .open_table(LOG_TABLE)
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to open log table: {e}")))?;

        self.log_table = Some(table);
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to list tables: {e}")))?;

        Ok(names.contains(&name.to_string()))
    }

    fn records(&self) -> Result<&Table> {
        self.records_table
            .as_ref()
            .ok_or_else(|| LetheError::Storage("Records table not initialized".to_string()))
    }

    fn log(&self) -> Result<&Table> {
        self.log_table
            .as_ref()
            .ok_or_else(|| LetheError::Storage("Log table not initialized".to_string()))
    }

    /// Convert lifecycle records to an Arrow RecordBatch
    fn records_to_batch(records: &[MemoryRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
        let memory_ids: Vec<&str> = records.iter().map(|r| r.memory_id.as_str()).collect();
        let user_ids: Vec<&str> = records.iter().map(|r| r.user_id.as_str()).collect();
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let hashes: Vec<Option<&str>> = records.iter().map(|r| r.content_hash.as_deref()).collect();
        let importance: Vec<f32> = records.iter().map(|r| r.importance_score).collect();
        let emotional: Vec<f32> = records.iter().map(|r| r.emotional_score).collect();
        let access_counts: Vec<i32> = records
            .iter()
            .map(|r| i32::try_from(r.access_count).unwrap_or(i32::MAX))
            .collect();
        let created_at: Vec<i64> = records
            .iter()
            .map(|r| r.created_at.timestamp_micros())
            .collect();
        let last_accessed: Vec<i64> = records
            .iter()
            .map(|r| r.last_accessed.timestamp_micros())
            .collect();
        let ratios: Vec<f32> = records.iter().map(|r| r.compression_ratio).collect();
        let stages: Vec<&str> = records
            .iter()
            .map(|r| r.forgetting_stage.as_str())
            .collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(memory_ids)),
                Arc::new(StringArray::from(user_ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(Float32Array::from(importance)),
                Arc::new(Float32Array::from(emotional)),
                Arc::new(Int32Array::from(access_counts)),
                Arc::new(TimestampMicrosecondArray::from(created_at).with_timezone("UTC")),
                Arc::new(TimestampMicrosecondArray::from(last_accessed).with_timezone("UTC")),
                Arc::new(Float32Array::from(ratios)),
                Arc::new(StringArray::from(stages)),
            ],
        )
        .map_err(|e| LetheError::Storage(format!("Failed to create RecordBatch: {e}")))
    }

    /// Convert one Arrow row back to a lifecycle record
    fn batch_to_record(batch: &RecordBatch, row: usize) -> Result<MemoryRecord> {
        let memory_id = string_column(batch, "memory_id")?;
        let user_id = string_column(batch, "user_id")?;
        let content = string_column(batch, "content")?;
        let content_hash = string_column(batch, "content_hash")?;
        let importance = float_column(batch, "importance_score")?;
        let emotional = float_column(batch, "emotional_score")?;
        let access_count = typed_column::<Int32Array>(batch, "access_count")?;
        let created_at = typed_column::<TimestampMicrosecondArray>(batch, "created_at")?;
        let last_accessed = typed_column::<TimestampMicrosecondArray>(batch, "last_accessed")?;
        let ratio = float_column(batch, "compression_ratio")?;
        let stage = string_column(batch, "forgetting_stage")?;

        let content_hash = if content_hash.is_null(row) {
            None
        } else {
            Some(content_hash.value(row).to_string())
        };

        let access_count = u32::try_from(access_count.value(row)).map_err(|_| {
            LetheError::Storage(format!(
                "Negative access count for memory {}",
                memory_id.value(row)
            ))
        })?;

        Ok(MemoryRecord {
            memory_id: memory_id.value(row).to_string(),
            user_id: user_id.value(row).to_string(),
            content: content.value(row).to_string(),
            content_hash,
            importance_score: importance.value(row),
            emotional_score: emotional.value(row),
            access_count,
            created_at: micros_to_datetime(created_at.value(row), "created_at")?,
            last_accessed: micros_to_datetime(last_accessed.value(row), "last_accessed")?,
            compression_ratio: ratio.value(row),
            forgetting_stage: stage.value(row).parse()?,
        })
    }

    fn log_entries_to_batch(
        entries: &[TransitionLogEntry],
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let memory_ids: Vec<&str> = entries.iter().map(|e| e.memory_id.as_str()).collect();
        let old_stages: Vec<&str> = entries.iter().map(|e| e.old_stage.as_str()).collect();
        let new_stages: Vec<&str> = entries.iter().map(|e| e.new_stage.as_str()).collect();
        let reasons: Vec<&str> = entries.iter().map(|e| e.reason.as_str()).collect();
        let timestamps: Vec<i64> = entries
            .iter()
            .map(|e| e.timestamp.timestamp_micros())
            .collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(memory_ids)),
                Arc::new(StringArray::from(old_stages)),
                Arc::new(StringArray::from(new_stages)),
                Arc::new(StringArray::from(reasons)),
                Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
            ],
        )
        .map_err(|e| LetheError::Storage(format!("Failed to create log RecordBatch: {e}")))
    }

    fn batch_to_log_entry(batch: &RecordBatch, row: usize) -> Result<TransitionLogEntry> {
        let memory_id = string_column(batch, "memory_id")?;
        let old_stage = string_column(batch, "old_stage")?;
        let new_stage = string_column(batch, "new_stage")?;
        let reason = string_column(batch, "reason")?;
        let timestamp = typed_column::<TimestampMicrosecondArray>(batch, "timestamp")?;

        Ok(TransitionLogEntry {
            memory_id: memory_id.value(row).to_string(),
            old_stage: old_stage.value(row).parse()?,
            new_stage: new_stage.value(row).parse()?,
            reason: reason.value(row).to_string(),
            timestamp: micros_to_datetime(timestamp.value(row), "timestamp")?,
        })
    }

    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<MemoryRecord>> {
        let table = self.records()?;

        let mut query = table.query();
        if let Some(sql_filter) = filter.to_sql_clause() {
            query = query.only_if(sql_filter);
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to query records: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to collect query results: {e}")))?;

        let mut records = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                records.push(Self::batch_to_record(batch, row)?);
            }
        }

        sort_oldest_first(&mut records);
        Ok(records)
    }

    /// Records matching `filter`, oldest first
    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<MemoryRecord>> {
        self.query_records(filter).await
    }

    async fn find(&self, memory_id: &str) -> Result<Option<MemoryRecord>> {
        let table = self.records()?;

        let stream = table
            .query()
            .only_if(format!("memory_id = '{}'", escape_sql(memory_id)))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to query memory: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to collect query results: {e}")))?;

        match batches.iter().find(|batch| batch.num_rows() > 0) {
            Some(batch) => Ok(Some(Self::batch_to_record(batch, 0)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LifecycleStore for LanceLifecycleStore {
    async fn insert(&self, record: &MemoryRecord) -> Result<()> {
        let table = self.records()?;
        let _guard = self.write_lock.lock().await;

        if self.find(&record.memory_id).await?.is_some() {
            return Err(LetheError::Storage(format!(
                "Memory already exists: {}",
                record.memory_id
            )));
        }

        let schema = Self::records_schema();
        let batch = Self::records_to_batch(std::slice::from_ref(record), schema.clone())?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to insert memory: {e}")))?;

        Ok(())
    }

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord> {
        self.find(memory_id)
            .await?
            .ok_or_else(|| LetheError::NotFound(memory_id.to_string()))
    }

    async fn upsert_stage(&self, memory_id: &str, update: &StageUpdate) -> Result<()> {
        let table = self.records()?;
        let _guard = self.write_lock.lock().await;

        let mut builder = table
            .update()
            .only_if(format!("memory_id = '{}'", escape_sql(memory_id)))
            .column("forgetting_stage", format!("'{}'", update.stage.as_str()))
            .column(
                "last_accessed",
                format!("{}", update.last_accessed.timestamp_micros()),
            );

        if let Some(content) = &update.content {
            builder = builder.column("content", format!("'{}'", escape_sql(content)));
        }
        if let Some(ratio) = update.compression_ratio {
            builder = builder.column("compression_ratio", format!("{}", ratio.clamp(0.0, 1.0)));
        }

        let result = builder
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to update stage: {e}")))?;

        if result.rows_updated == 0 {
            return Err(LetheError::NotFound(memory_id.to_string()));
        }
        Ok(())
    }

    async fn append_log(
        &self,
        memory_id: &str,
        old_stage: ForgettingStage,
        new_stage: ForgettingStage,
        reason: &str,
    ) -> Result<()> {
        let table = self.log()?;
        let _guard = self.write_lock.lock().await;

        let entry = TransitionLogEntry::new(memory_id, old_stage, new_stage, reason);
        let schema = Self::log_schema();
        let batch = Self::log_entries_to_batch(&[entry], schema.clone())?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to append log entry: {e}")))?;

        Ok(())
    }

    async fn list_active_memories(&self, user_id: &str) -> Result<Vec<String>> {
        let records = self.query_records(&RecordFilter::active_for(user_id)).await?;
        Ok(records.into_iter().map(|r| r.memory_id).collect())
    }

    async fn increment_access(&self, memory_id: &str) -> Result<()> {
        let table = self.records()?;
        let _guard = self.write_lock.lock().await;

        let now = Utc::now().timestamp_micros();

        let result = table
            .update()
            .only_if(format!("memory_id = '{}'", escape_sql(memory_id)))
            .column("access_count", "access_count + 1")
            .column("last_accessed", format!("{now}"))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to update access: {e}")))?;

        if result.rows_updated == 0 {
            return Err(LetheError::NotFound(memory_id.to_string()));
        }
        Ok(())
    }

    async fn transition_log(&self, memory_id: &str) -> Result<Vec<TransitionLogEntry>> {
        let table = self.log()?;

        let stream = table
            .query()
            .only_if(format!("memory_id = '{}'", escape_sql(memory_id)))
            .execute()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to query log: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| LetheError::Storage(format!("Failed to collect log entries: {e}")))?;

        let mut entries = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                entries.push(Self::batch_to_log_entry(batch, row)?);
            }
        }

        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn list_user_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        self.query_records(&RecordFilter::new().with_user(user_id))
            .await
    }
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<T>())
        .ok_or_else(|| LetheError::Storage(format!("Failed to get {name} column")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column::<StringArray>(batch, name)
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    typed_column::<Float32Array>(batch, name)
}

fn micros_to_datetime(micros: i64, name: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_micros(micros)
        .single()
        .ok_or_else(|| LetheError::Storage(format!("Failed to parse {name} timestamp")))
}
