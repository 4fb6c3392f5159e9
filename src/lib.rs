//! # digital-rf-read
//! This library indexes Digital RF directories: it finds the channels below a top-level directory, reads each
//! channel's properties file, lists the channel's data files in time order and resolves the range of sample
//! indices they cover.
//! Both the current `drf_properties.h5` and the legacy `metadata.h5` properties files are supported.
//! Reading the samples themselves is left to the caller, who gets the data file paths and bounds from here.
//!
//! ## Containers
//! Properties and data files are HDF5 containers. The catalog only talks to them through the
//! [`container::ContainerOpener`] trait, so the same code runs against the real files (with the `hdf5` feature)
//! or against the in-memory [`container::memory::MemoryStore`].
//!
//! ## Examples
//!
//! ### Bounds of every channel
//!
//! ```no_run
//! # #[cfg(feature = "hdf5")]
//! # fn main() -> digital_rf_read::Result<()> {
//! let catalog = digital_rf_read::open_catalog("/data/drf", 0)?;
//! for name in catalog.sorted_channel_names() {
//!     let bounds = catalog.bounds(&name)?;
//!     let meta = catalog.metadata(&name)?;
//!     println!(
//!         "{}: samples {}..={} at {} Hz",
//!         name, bounds.start_index, bounds.end_index, meta.sample_rate
//!     );
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "hdf5"))]
//! # fn main() {}
//! ```
//!
//! ### Testing without HDF5
//!
//! Build a [`container::memory::MemoryStore`] keyed by the absolute paths of the files in a directory tree and
//! hand it to [`open_catalog_with`]. The store counts open handles, so a test can check every handle was released.
//!
pub mod bounds;
pub mod catalog;
pub mod container;
mod enumerate;
pub mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5_container;
pub mod layout;
pub mod properties;
pub mod rate;
pub mod version;

pub use bounds::Bounds;
pub use catalog::{AccessMode, CatalogOptions, ChannelCatalogEntry, MetadataChannels, ReadCatalog};
pub use error::{Error, ErrorKind, Result};
pub use properties::ChannelMetadata;
pub use rate::SampleRate;
pub use version::{DIGITAL_RF_VERSION, FormatVersion, MIN_SUPPORTED_VERSION};

use container::ContainerOpener;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens the top-level directory `path` with the HDF5 backend
#[cfg(feature = "hdf5")]
pub fn open_catalog(path: &str, cache_size_hint: u64) -> Result<ReadCatalog> {
    let options = CatalogOptions::default().with_cache_size_hint(cache_size_hint);
    let opener = Arc::new(hdf5_container::Hdf5Opener::new(cache_size_hint));
    ReadCatalog::open(path, options, opener)
}

pub fn open_catalog_with(
    path: &str,
    options: CatalogOptions,
    opener: Arc<dyn ContainerOpener>,
) -> Result<ReadCatalog> {
    ReadCatalog::open(path, options, opener)
}

/// In directory-scan order
pub fn list_channel_names(catalog: &ReadCatalog) -> Vec<String> {
    catalog.channel_names()
}

pub fn list_channel_files(catalog: &ReadCatalog, channel_name: &str) -> Result<Vec<PathBuf>> {
    catalog.channel_files(channel_name)
}

pub fn list_channel_files_in_range(
    catalog: &ReadCatalog,
    channel_name: &str,
    start_sample: u64,
    end_sample: u64,
) -> Result<Vec<PathBuf>> {
    catalog.channel_files_in_range(channel_name, start_sample, end_sample)
}

pub fn get_bounds(catalog: &ReadCatalog, channel_name: &str) -> Result<Bounds> {
    catalog.bounds(channel_name)
}

pub fn get_channel_metadata(catalog: &ReadCatalog, channel_name: &str) -> Result<ChannelMetadata> {
    catalog.metadata(channel_name).cloned()
}

pub fn close_catalog(catalog: ReadCatalog) {
    catalog.close()
}
