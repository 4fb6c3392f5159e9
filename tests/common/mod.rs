#![allow(dead_code)]

use digital_rf_read::container::ContainerOpener;
use digital_rf_read::container::memory::{MemoryContainer, MemoryStore};
use digital_rf_read::layout::{DATA_DATASET, INDEX_DATASET, PROPERTIES_FILE};
use digital_rf_read::{CatalogOptions, ReadCatalog, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

pub fn properties(version: &str) -> MemoryContainer {
    MemoryContainer::new()
        .with_str("digital_rf_version", version)
        .with_str("epoch", "1970-01-01T00:00:00Z")
        .with_i64("file_cadence_millisecs", 1000)
        .with_i64("subdir_cadence_secs", 3600)
        .with_i64("is_complex", 1)
        .with_i64("is_continuous", 1)
        .with_i64("num_subchannels", 1)
}

pub fn rational_properties(numerator: u64, denominator: u64) -> MemoryContainer {
    properties("2.6.0")
        .with_u64("sample_rate_numerator", numerator)
        .with_u64("sample_rate_denominator", denominator)
}

pub fn legacy_properties(samples_per_second: u64) -> MemoryContainer {
    properties("2.0").with_u64("samples_per_second", samples_per_second)
}

/// A data file whose first index record is `[sample_index, row]`
pub fn data_file(sample_index: u64, row: u64, rows: u64) -> MemoryContainer {
    MemoryContainer::new()
        .with_u64_dataset(INDEX_DATASET, &[1, 2], &[sample_index, row])
        .with_shaped_dataset(DATA_DATASET, &[rows, 2])
}

/// A directory tree on disk, with empty placeholder files whose contents are
/// registered in a memory store under the same canonical paths
pub struct TreeBuilder {
    top: TempDir,
    pub root: PathBuf,
    store: MemoryStore,
}

impl TreeBuilder {
    pub fn new() -> TreeBuilder {
        let top = tempdir().unwrap();
        let root = fs::canonicalize(top.path()).unwrap();
        TreeBuilder {
            top,
            root,
            store: MemoryStore::new(),
        }
    }

    pub fn file(mut self, relative: impl AsRef<Path>, container: MemoryContainer) -> TreeBuilder {
        let path = self.root.join(relative);
        self.empty_file(&path);
        self.store.insert(path, container);
        self
    }

    /// On disk only, nothing to read inside
    pub fn touch(self, relative: impl AsRef<Path>) -> TreeBuilder {
        let path = self.root.join(relative);
        self.empty_file(&path);
        self
    }

    pub fn dir(self, relative: &str) -> TreeBuilder {
        fs::create_dir_all(self.root.join(relative)).unwrap();
        self
    }

    pub fn channel(self, name: impl AsRef<Path>, props: MemoryContainer) -> TreeBuilder {
        let path = name.as_ref().join(PROPERTIES_FILE);
        self.file(path, props)
    }

    fn empty_file(&self, path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    pub fn build(self) -> Tree {
        Tree {
            _top: self.top,
            root: self.root,
            store: Arc::new(self.store),
        }
    }
}

pub struct Tree {
    _top: TempDir,
    pub root: PathBuf,
    pub store: Arc<MemoryStore>,
}

impl Tree {
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn root_str(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    pub fn open(&self) -> Result<ReadCatalog> {
        self.open_with(CatalogOptions::default())
    }

    pub fn open_with(&self, options: CatalogOptions) -> Result<ReadCatalog> {
        let opener: Arc<dyn ContainerOpener> = self.store.clone();
        digital_rf_read::open_catalog_with(&self.root_str(), options, opener)
    }
}
