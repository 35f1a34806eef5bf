//! Saves decoded tables to disk in the _parquet_ file format.

use std::{fs::File, path::Path};

use arrow::record_batch::RecordBatch;
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use tracing::info;

use crate::{Error, Result};

/// Writes `batches` to `file_path`. All batches must share the first batch's schema.
pub fn save_batches(batches: &[RecordBatch], file_path: &Path) -> Result<()> {
    let first = batches
        .first()
        .ok_or_else(|| Error::decode("no tables to write"))?;
    let schema = first.schema();

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();

    let file = File::create(file_path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let mut rows = 0;
    for batch in batches {
        if batch.schema() != schema {
            return Err(Error::decode(format!(
                "table schema differs from the first table written to {}",
                file_path.display()
            )));
        }
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;

    info!(path = %file_path.display(), rows, "wrote parquet file");
    Ok(())
}

pub fn save_batch(batch: &RecordBatch, file_path: &Path) -> Result<()> {
    save_batches(std::slice::from_ref(batch), file_path)
}

// -- Tests -------------------------------------------------------------------
