//! The read catalog: one scan of a top-level directory, one entry per channel.
//!
//! A catalog is built completely before it is returned and never changes
//! afterwards, so it can be shared across threads for reading.

use crate::bounds::{self, Bounds};
use crate::container::ContainerOpener;
use crate::enumerate;
use crate::error::{Error, Result};
use crate::layout::{self, DirKind};
use crate::properties::{self, ChannelMetadata};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessMode {
    Local,
    RemoteFile,
    Http,
    Ftp,
}

impl AccessMode {
    /// Guessed from the scheme the path starts with, local when there is none
    pub fn of_path(path: &str) -> AccessMode {
        if path.starts_with("file://") {
            AccessMode::RemoteFile
        } else if path.starts_with("http://") || path.starts_with("https://") {
            AccessMode::Http
        } else if path.starts_with("ftp://") {
            AccessMode::Ftp
        } else {
            AccessMode::Local
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessMode::Local => "local",
            AccessMode::RemoteFile => "file",
            AccessMode::Http => "http",
            AccessMode::Ftp => "ftp",
        };
        f.write_str(name)
    }
}

/// Whether metadata-only (dmd) markers make a directory enumerable as a channel
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetadataChannels {
    #[default]
    Enumerate,
    Ignore,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatalogOptions {
    /// Byte count handed to the container backend for its I/O cache
    pub cache_size_hint: u64,
    pub metadata_channels: MetadataChannels,
}

impl CatalogOptions {
    pub fn with_cache_size_hint(mut self, bytes: u64) -> CatalogOptions {
        self.cache_size_hint = bytes;
        self
    }

    pub fn with_metadata_channels(mut self, policy: MetadataChannels) -> CatalogOptions {
        self.metadata_channels = policy;
        self
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ChannelCatalogEntry {
    /// Base name of the channel directory, lossily converted when it is not
    /// UTF-8
    pub channel_name: String,
    pub metadata: ChannelMetadata,
}

pub struct ReadCatalog {
    top_level_directory: PathBuf,
    access_mode: AccessMode,
    options: CatalogOptions,
    channels: Vec<ChannelCatalogEntry>,
    opener: Arc<dyn ContainerOpener>,
}

impl fmt::Debug for ReadCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadCatalog")
            .field("top_level_directory", &self.top_level_directory)
            .field("access_mode", &self.access_mode)
            .field("options", &self.options)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl ReadCatalog {
    /// Scans `directory` for channel directories and reads each channel's
    /// properties. Fails as a whole if any channel's properties cannot be read.
    pub fn open(
        directory: &str,
        options: CatalogOptions,
        opener: Arc<dyn ContainerOpener>,
    ) -> Result<ReadCatalog> {
        if directory.len() <= 1 {
            return Err(Error::MalformedDirectory(directory.to_string()));
        }
        let access_mode = AccessMode::of_path(directory);
        if access_mode != AccessMode::Local {
            return Err(Error::UnsupportedAccessMode(access_mode));
        }

        let top_level_directory =
            fs::canonicalize(directory).map_err(|source| Error::DirectoryOpenFailed {
                path: PathBuf::from(directory),
                source,
            })?;
        if let DirKind::Channel(_) = layout::classify(&top_level_directory) {
            return Err(Error::NotATopLevelDirectory(top_level_directory));
        }

        let entries =
            fs::read_dir(&top_level_directory).map_err(|source| Error::DirectoryOpenFailed {
                path: top_level_directory.clone(),
                source,
            })?;

        let mut channels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::DirectoryOpenFailed {
                path: top_level_directory.clone(),
                source,
            })?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if fs::canonicalize(&path).is_err() {
                debug!("Skipping {}, it does not resolve", path.display());
                continue;
            }
            match layout::classify(&path) {
                DirKind::Channel(_) => {
                    let metadata =
                        properties::parse(&path, options.cache_size_hint, opener.as_ref())?;
                    debug!("Found channel {}", name);
                    channels.push(ChannelCatalogEntry {
                        channel_name: name,
                        metadata,
                    });
                }
                kind => debug!("Skipping {} ({:?})", path.display(), kind),
            }
        }

        info!(
            "Opened {} with {} channels",
            top_level_directory.display(),
            channels.len()
        );
        Ok(ReadCatalog {
            top_level_directory,
            access_mode,
            options,
            channels,
            opener,
        })
    }

    pub fn top_level_directory(&self) -> &Path {
        &self.top_level_directory
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn cache_size_hint(&self) -> u64 {
        self.options.cache_size_hint
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// Entries in directory-scan order
    pub fn entries(&self) -> &[ChannelCatalogEntry] {
        &self.channels
    }

    /// Channel names in directory-scan order, which is not sorted
    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| c.channel_name.clone())
            .collect()
    }

    pub fn sorted_channel_names(&self) -> Vec<String> {
        let mut names = self.channel_names();
        names.sort();
        names
    }

    pub fn channel(&self, channel_name: &str) -> Result<&ChannelCatalogEntry> {
        self.channels
            .iter()
            .find(|c| c.channel_name == channel_name)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))
    }

    pub fn metadata(&self, channel_name: &str) -> Result<&ChannelMetadata> {
        Ok(&self.channel(channel_name)?.metadata)
    }

    pub fn channel_dir(&self, channel_name: &str) -> Result<&Path> {
        Ok(self.metadata(channel_name)?.channel_dir())
    }

    /// Absolute paths of the channel's data files in time order
    pub fn channel_files(&self, channel_name: &str) -> Result<Vec<PathBuf>> {
        let dir = self.channel_dir(channel_name)?;
        enumerate::channel_files(dir, self.options.metadata_channels)
    }

    /// The channel's data files that may hold samples in
    /// `start_sample..=end_sample`, in time order
    pub fn channel_files_in_range(
        &self,
        channel_name: &str,
        start_sample: u64,
        end_sample: u64,
    ) -> Result<Vec<PathBuf>> {
        let metadata = self.metadata(channel_name)?;
        let files = self.channel_files(channel_name)?;
        Ok(enumerate::files_in_range(
            files,
            metadata,
            start_sample,
            end_sample,
        ))
    }

    pub fn bounds(&self, channel_name: &str) -> Result<Bounds> {
        let files = self.channel_files(channel_name)?;
        bounds::resolve(channel_name, &files, self.opener.as_ref())
    }

    /// Releases the catalog and everything it owns
    pub fn close(self) {
        debug!("Closing {}", self.top_level_directory.display());
    }
}
