//! Listing of a channel's data files.
//!
//! Time buckets are named by their zero-padded start time and file names carry
//! a monotonic start time too, so sorting the full paths as strings puts the
//! files in time order.

use crate::catalog::MetadataChannels;
use crate::error::{Error, Result};
use crate::layout;
use crate::properties::ChannelMetadata;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn read_dir_failed(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |source| Error::DirectoryOpenFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Absolute paths of every data file under the time buckets of `channel_dir`,
/// sorted. A directory without any channel marker yields no files.
pub fn channel_files(
    channel_dir: &Path,
    metadata_channels: MetadataChannels,
) -> Result<Vec<PathBuf>> {
    let accept_metadata_only = metadata_channels == MetadataChannels::Enumerate;
    if !layout::has_channel_marker(channel_dir, accept_metadata_only) {
        debug!("{} holds no channel marker", channel_dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(channel_dir).map_err(read_dir_failed(channel_dir))? {
        let entry = entry.map_err(read_dir_failed(channel_dir))?;
        let is_bucket = entry
            .file_name()
            .to_str()
            .is_some_and(layout::is_time_bucket_name);
        if !is_bucket {
            continue;
        }
        let bucket = entry.path();
        if !bucket.is_dir() {
            debug!("Skipping {}, not a directory", bucket.display());
            continue;
        }
        collect_data_files(&bucket, &mut files)?;
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

fn collect_data_files(bucket: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(bucket).map_err(read_dir_failed(bucket))? {
        let entry = entry.map_err(read_dir_failed(bucket))?;
        let name = entry.file_name();
        if !layout::is_data_file_name(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn millis_of_sample(metadata: &ChannelMetadata, index: u64) -> Option<u64> {
    metadata
        .sample_time(index)?
        .checked_mul_int(1000)?
        .checked_to_num::<u64>()
}

/// Keeps the files whose time span `[start, start + file_cadence)` overlaps the
/// times of `start_sample..=end_sample`. Files without a parsable start time
/// in their name are kept, and nothing is pruned when the times can't be
/// computed.
pub fn files_in_range(
    files: Vec<PathBuf>,
    metadata: &ChannelMetadata,
    start_sample: u64,
    end_sample: u64,
) -> Vec<PathBuf> {
    if start_sample > end_sample {
        return Vec::new();
    }
    let (Some(start_ms), Some(end_ms)) = (
        millis_of_sample(metadata, start_sample),
        millis_of_sample(metadata, end_sample),
    ) else {
        return files;
    };
    let cadence = metadata.file_cadence_millisecs.max(1);

    files
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match layout::data_file_start_millis(&name) {
                Some(file_ms) => file_ms <= end_ms && file_ms.saturating_add(cadence) > start_ms,
                None => true,
            }
        })
        .collect()
}
