//! Sample bounds of a channel, from the index records of its first and last
//! data files.
//!
//! Every data file holds `rf_data_index`, rows of `[sample_index, row]`, and
//! `rf_data`, one row per sample. Only the first index row of each file is
//! used: the last file is taken to be one contiguous run from its first row.

use crate::container::{self, Container, ContainerOpener};
use crate::error::{AttributeFailure, Error, Result};
use crate::layout::{self, DATA_DATASET, INDEX_DATASET};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inclusive range of sample indices, counted from the channel's epoch
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub start_index: u64,
    pub end_index: u64,
}

impl Bounds {
    /// None when the count doesn't fit a `u64`, that is for bounds spanning
    /// every index
    pub fn sample_count(&self) -> Option<u64> {
        self.end_index.checked_sub(self.start_index)?.checked_add(1)
    }

    pub fn contains(&self, index: u64) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }
}

/// First row of a file's `rf_data_index`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct IndexRecord {
    pub sample_index: u64,
    pub row: u64,
}

fn dataset_failed(
    path: &Path,
    dataset: &'static str,
    source: impl Into<AttributeFailure>,
) -> Error {
    Error::DatasetReadFailed {
        path: path.to_path_buf(),
        dataset,
        source: source.into(),
    }
}

fn open_data_file(path: &Path, opener: &dyn ContainerOpener) -> Result<Box<dyn Container>> {
    let container = opener.open(path).map_err(|source| Error::ContainerOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let size = container.size().map_err(|source| Error::ContainerOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    if size == 0 {
        return Err(Error::EmptyContainer(path.to_path_buf()));
    }
    Ok(container)
}

fn read_index_record(path: &Path, container: &dyn Container) -> Result<IndexRecord> {
    let dataset = container
        .dataset(INDEX_DATASET)
        .map_err(|e| dataset_failed(path, INDEX_DATASET, e))?;
    let raw = dataset
        .read_raw()
        .map_err(|e| dataset_failed(path, INDEX_DATASET, e))?;
    let values = container::decode_u64_values(dataset.element(), &raw)
        .map_err(|e| dataset_failed(path, INDEX_DATASET, e))?;

    match values.as_slice() {
        [sample_index, row, ..] => Ok(IndexRecord {
            sample_index: *sample_index,
            row: *row,
        }),
        _ => Err(Error::MalformedIndex {
            path: path.to_path_buf(),
            dataset: INDEX_DATASET,
            reason: format!("expected at least 2 values, found {}", values.len()),
        }),
    }
}

fn read_row_count(path: &Path, container: &dyn Container) -> Result<u64> {
    let dataset = container
        .dataset(DATA_DATASET)
        .map_err(|e| dataset_failed(path, DATA_DATASET, e))?;
    let shape = dataset
        .shape()
        .map_err(|e| dataset_failed(path, DATA_DATASET, e))?;
    shape.first().copied().ok_or_else(|| Error::MalformedIndex {
        path: path.to_path_buf(),
        dataset: DATA_DATASET,
        reason: "dataset has rank 0".to_string(),
    })
}

/// Opens `path`, reads its index record and, for the last file, the row count
/// of its data. The container is closed on return.
fn read_file(
    path: &Path,
    opener: &dyn ContainerOpener,
    with_rows: bool,
) -> Result<(IndexRecord, Option<u64>)> {
    let container = open_data_file(path, opener)?;
    let record = read_index_record(path, container.as_ref())?;
    let rows = if with_rows {
        Some(read_row_count(path, container.as_ref())?)
    } else {
        None
    };
    debug!("Read {:?} rows={:?} from {}", record, rows, path.display());
    Ok((record, rows))
}

fn end_index(path: &Path, record: IndexRecord, rows: u64) -> Result<u64> {
    let past_offset = record
        .row
        .checked_add(1)
        .and_then(|first| rows.checked_sub(first));
    past_offset
        .and_then(|extra| record.sample_index.checked_add(extra))
        .ok_or_else(|| Error::MalformedIndex {
            path: path.to_path_buf(),
            dataset: INDEX_DATASET,
            reason: format!(
                "row offset {} lies outside the {} rows of {}",
                record.row, rows, DATA_DATASET
            ),
        })
}

/// Bounds covered by `files`, which must be in time order. Properties files in
/// the list are skipped.
pub fn resolve(
    channel_name: &str,
    files: &[PathBuf],
    opener: &dyn ContainerOpener,
) -> Result<Bounds> {
    let data_files: Vec<&PathBuf> = files
        .iter()
        .filter(|path| {
            path.file_name()
                .map(|n| !layout::is_properties_file_name(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();

    let (Some(first), Some(last)) = (data_files.first(), data_files.last()) else {
        return Err(Error::NoDataFiles(channel_name.to_string()));
    };

    let (last_record, rows) = read_file(last, opener, true)?;
    let rows = rows.unwrap_or_default();
    let start_index = if first == last {
        last_record.sample_index
    } else {
        read_file(first, opener, false)?.0.sample_index
    };
    let end_index = end_index(last, last_record, rows)?;

    if end_index < start_index {
        return Err(Error::MalformedIndex {
            path: last.to_path_buf(),
            dataset: INDEX_DATASET,
            reason: format!(
                "ends at sample {} before the channel starts at {}",
                end_index, start_index
            ),
        });
    }
    Ok(Bounds {
        start_index,
        end_index,
    })
}
