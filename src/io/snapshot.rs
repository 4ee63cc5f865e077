//! Parquet storage for captured snapshot contents
//!
//! Each snapshot's file contents live in one Parquet file. Content rows are written
//! in batches as capture proceeds, so the writer never holds more than one batch.
//! A final metadata row carries the snapshot id, creation time and row count.

use arrow_array::{
    Array, ArrayRef, BooleanArray, Int64Array, RecordBatch, StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One captured file as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub path: String,
    /// Encoded `StoredContent`
    pub stored: String,
    pub size_bytes: u64,
    /// `None` for files written before the envelope flag was recorded
    pub enveloped: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub snapshot_id: String,
    pub created_at: i64,
    pub file_count: u64,
}

/// Return the Arrow schema shared by content writers and readers.
#[must_use]
pub fn content_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("path", DataType::Utf8, true),
        Field::new("content", DataType::Utf8, true),
        Field::new("size_bytes", DataType::UInt64, true),
        Field::new("enveloped", DataType::Boolean, true),
        Field::new("meta_snapshot_id", DataType::Utf8, true),
        Field::new("meta_created_at", DataType::Int64, true),
        Field::new("meta_file_count", DataType::UInt64, true),
    ]))
}

/// Streaming writer; call `write_batch` per capture batch, then `finish`.
pub struct SnapshotContentWriter {
    writer: Option<ArrowWriter<File>>,
    schema: Arc<Schema>,
    snapshot_id: String,
    created_at: i64,
    row_count: u64,
    output_path: PathBuf,
}

impl SnapshotContentWriter {
    pub fn try_new<P: AsRef<Path>>(path: P, snapshot_id: &str, created_at: i64) -> Result<Self> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path_ref)?;
        let schema = content_schema();
        let props = WriterProperties::builder().build();
        let writer =
            ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(Error::other)?;

        Ok(Self {
            writer: Some(writer),
            schema,
            snapshot_id: snapshot_id.to_string(),
            created_at,
            row_count: 0,
            output_path: path_ref.to_path_buf(),
        })
    }

    pub fn write_batch(&mut self, records: &[ContentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch = create_content_batch(&self.schema, records)?;
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::other(format!(
                "content writer for {} already closed",
                self.output_path.display()
            ))
        })?;
        writer.write(&batch).map_err(Error::other)?;
        self.row_count += records.len() as u64;
        Ok(())
    }

    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Write the metadata row and close the file
    pub fn finish(mut self) -> Result<ContentMeta> {
        let mut writer = self.writer.take().ok_or_else(|| {
            Error::other(format!(
                "content writer for {} already closed",
                self.output_path.display()
            ))
        })?;

        let meta = ContentMeta {
            snapshot_id: self.snapshot_id.clone(),
            created_at: self.created_at,
            file_count: self.row_count,
        };
        let metadata_batch = create_metadata_batch(&self.schema, &meta)?;
        writer.write(&metadata_batch).map_err(Error::other)?;
        writer.close().map_err(Error::other)?;

        Ok(meta)
    }

    /// Close and delete a partially written file
    pub fn abandon(mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.close();
        }
        if let Err(e) = std::fs::remove_file(&self.output_path) {
            log::warn!(
                "Failed to remove partial content file {}: {e}",
                self.output_path.display()
            );
        }
    }
}

/// Read every content row and the metadata row from a snapshot content file.
pub fn read_snapshot_contents(path: &Path) -> Result<(ContentMeta, Vec<ContentRecord>)> {
    let file = File::open(path)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut reader = builder
        .build()
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut records = Vec::new();
    let mut meta: Option<ContentMeta> = None;

    for batch_result in &mut reader {
        let batch = batch_result.map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

        for row_idx in 0..batch.num_rows() {
            if meta.is_none()
                && let Some(snapshot_id) = get_string_value(&batch, "meta_snapshot_id", row_idx)?
            {
                meta = Some(ContentMeta {
                    snapshot_id,
                    created_at: get_i64_value(&batch, "meta_created_at", row_idx)?.unwrap_or(0),
                    file_count: get_u64_value(&batch, "meta_file_count", row_idx)?.unwrap_or(0),
                });
                continue;
            }

            if let Some(path) = get_string_value(&batch, "path", row_idx)?
                && !path.is_empty()
            {
                records.push(extract_record(&batch, row_idx, path)?);
            }
        }
    }

    let meta = meta.ok_or_else(|| Error::new(ErrorKind::InvalidData, "No metadata found"))?;

    Ok((meta, records))
}

fn create_content_batch(schema: &Arc<Schema>, records: &[ContentRecord]) -> Result<RecordBatch> {
    let len = records.len();

    let paths: ArrayRef = Arc::new(StringArray::from(
        records
            .iter()
            .map(|r| Some(r.path.as_str()))
            .collect::<Vec<_>>(),
    ));
    let contents: ArrayRef = Arc::new(StringArray::from(
        records
            .iter()
            .map(|r| Some(r.stored.as_str()))
            .collect::<Vec<_>>(),
    ));
    let sizes: ArrayRef = Arc::new(UInt64Array::from(
        records
            .iter()
            .map(|r| Some(r.size_bytes))
            .collect::<Vec<_>>(),
    ));
    let enveloped: ArrayRef = Arc::new(BooleanArray::from(
        records.iter().map(|r| r.enveloped).collect::<Vec<_>>(),
    ));

    let meta_ids: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>; len]));
    let meta_created: ArrayRef = Arc::new(Int64Array::from(vec![None::<i64>; len]));
    let meta_counts: ArrayRef = Arc::new(UInt64Array::from(vec![None::<u64>; len]));

    RecordBatch::try_new(
        schema.clone(),
        vec![
            paths,
            contents,
            sizes,
            enveloped,
            meta_ids,
            meta_created,
            meta_counts,
        ],
    )
    .map_err(Error::other)
}

fn create_metadata_batch(schema: &Arc<Schema>, meta: &ContentMeta) -> Result<RecordBatch> {
    let paths: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>; 1]));
    let contents: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>; 1]));
    let sizes: ArrayRef = Arc::new(UInt64Array::from(vec![None::<u64>; 1]));
    let enveloped: ArrayRef = Arc::new(BooleanArray::from(vec![None::<bool>; 1]));

    let meta_ids: ArrayRef = Arc::new(StringArray::from(vec![Some(meta.snapshot_id.as_str())]));
    let meta_created: ArrayRef = Arc::new(Int64Array::from(vec![Some(meta.created_at)]));
    let meta_counts: ArrayRef = Arc::new(UInt64Array::from(vec![Some(meta.file_count)]));

    RecordBatch::try_new(
        schema.clone(),
        vec![
            paths,
            contents,
            sizes,
            enveloped,
            meta_ids,
            meta_created,
            meta_counts,
        ],
    )
    .map_err(Error::other)
}

fn extract_record(batch: &RecordBatch, row: usize, path: String) -> Result<ContentRecord> {
    let stored = get_string_value(batch, "content", row)?
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, format!("Missing content: {path}")))?;
    let size_bytes = get_u64_value(batch, "size_bytes", row)?.unwrap_or(stored.len() as u64);
    let enveloped = get_bool_value(batch, "enveloped", row)?;

    Ok(ContentRecord {
        path,
        stored,
        size_bytes,
        enveloped,
    })
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, col_name: &str) -> Result<&'a T> {
    let col = batch.column_by_name(col_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Missing column: {col_name}"),
        )
    })?;

    col.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Invalid type for: {col_name}"),
        )
    })
}

fn get_string_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<String>> {
    let array = column::<StringArray>(batch, col_name)?;
    Ok((!array.is_null(row)).then(|| array.value(row).to_string()))
}

fn get_u64_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<u64>> {
    let array = column::<UInt64Array>(batch, col_name)?;
    Ok((!array.is_null(row)).then(|| array.value(row)))
}

fn get_i64_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<i64>> {
    let array = column::<Int64Array>(batch, col_name)?;
    Ok((!array.is_null(row)).then(|| array.value(row)))
}

fn get_bool_value(batch: &RecordBatch, col_name: &str, row: usize) -> Result<Option<bool>> {
    // Older content files carry no envelope column at all
    if batch.column_by_name(col_name).is_none() {
        return Ok(None);
    }
    let array = column::<BooleanArray>(batch, col_name)?;
    Ok((!array.is_null(row)).then(|| array.value(row)))
}
