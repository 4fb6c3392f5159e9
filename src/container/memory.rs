//! In-memory container backend. Containers are registered under absolute paths
//! and handed out on open; the store keeps count of the handles still alive.

use super::{Attribute, Container, ContainerError, ContainerOpener, Dataset, ElementType};
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, PartialEq, Debug)]
pub struct MemoryDataset {
    pub shape: Vec<u64>,
    pub element: ElementType,
    pub raw: Vec<u8>,
}

#[derive(Clone, PartialEq, Debug)]
enum StoredAttribute {
    Readable(Attribute),
    /// Listed by name, but reading its value fails
    Unreadable(String),
}

impl StoredAttribute {
    fn name(&self) -> &str {
        match self {
            StoredAttribute::Readable(attr) => &attr.name,
            StoredAttribute::Unreadable(name) => name,
        }
    }

    fn stored_bytes(&self) -> usize {
        match self {
            StoredAttribute::Readable(attr) => attr.name.len() + attr.raw.len(),
            StoredAttribute::Unreadable(name) => name.len(),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct MemoryContainer {
    attributes: Vec<StoredAttribute>,
    datasets: Vec<(String, MemoryDataset)>,
    size: Option<u64>,
}

impl MemoryContainer {
    pub fn new() -> MemoryContainer {
        MemoryContainer::default()
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> MemoryContainer {
        self.attributes.push(StoredAttribute::Readable(attribute));
        self
    }

    /// An attribute whose value the backend fails to read, like a type it
    /// can't convert
    pub fn with_unreadable(mut self, name: &str) -> MemoryContainer {
        self.attributes
            .push(StoredAttribute::Unreadable(name.to_string()));
        self
    }

    pub fn with_str(self, name: &str, value: &str) -> MemoryContainer {
        self.with_attribute(Attribute::new(
            name,
            ElementType::Str,
            value.as_bytes().to_vec(),
        ))
    }

    pub fn with_i64(self, name: &str, value: i64) -> MemoryContainer {
        let mut raw = Vec::with_capacity(8);
        raw.write_i64::<LittleEndian>(value).ok();
        self.with_attribute(Attribute::new(
            name,
            ElementType::Int {
                width: 8,
                signed: true,
            },
            raw,
        ))
    }

    pub fn with_u64(self, name: &str, value: u64) -> MemoryContainer {
        let mut raw = Vec::with_capacity(8);
        raw.write_u64::<LittleEndian>(value).ok();
        self.with_attribute(Attribute::new(
            name,
            ElementType::Int {
                width: 8,
                signed: false,
            },
            raw,
        ))
    }

    pub fn with_f64(self, name: &str, value: f64) -> MemoryContainer {
        let mut raw = Vec::with_capacity(8);
        raw.write_f64::<LittleEndian>(value).ok();
        self.with_attribute(Attribute::new(name, ElementType::Float { width: 8 }, raw))
    }

    pub fn with_dataset(mut self, name: &str, dataset: MemoryDataset) -> MemoryContainer {
        self.datasets.push((name.to_string(), dataset));
        self
    }

    /// A dataset of unsigned 64-bit integers
    pub fn with_u64_dataset(self, name: &str, shape: &[u64], values: &[u64]) -> MemoryContainer {
        let mut raw = Vec::with_capacity(values.len() * 8);
        for value in values {
            raw.write_u64::<LittleEndian>(*value).ok();
        }
        self.with_dataset(
            name,
            MemoryDataset {
                shape: shape.to_vec(),
                element: ElementType::Int {
                    width: 8,
                    signed: false,
                },
                raw,
            },
        )
    }

    /// A dataset whose contents are never read, only its shape
    pub fn with_shaped_dataset(self, name: &str, shape: &[u64]) -> MemoryContainer {
        self.with_dataset(
            name,
            MemoryDataset {
                shape: shape.to_vec(),
                element: ElementType::Int {
                    width: 2,
                    signed: true,
                },
                raw: Vec::new(),
            },
        )
    }

    /// Overrides the reported file size, which otherwise sums the stored bytes
    pub fn with_size(mut self, size: u64) -> MemoryContainer {
        self.size = Some(size);
        self
    }

    fn stored_bytes(&self) -> u64 {
        let attrs: usize = self
            .attributes
            .iter()
            .map(StoredAttribute::stored_bytes)
            .sum();
        let datasets: usize = self
            .datasets
            .iter()
            .map(|(name, d)| name.len() + d.raw.len() + d.shape.len() * 8)
            .sum();
        (attrs + datasets) as u64
    }
}

impl Dataset for &MemoryDataset {
    fn shape(&self) -> Result<Vec<u64>, ContainerError> {
        Ok(self.shape.clone())
    }

    fn element(&self) -> ElementType {
        self.element
    }

    fn read_raw(&self) -> Result<Vec<u8>, ContainerError> {
        Ok(self.raw.clone())
    }
}

struct MemoryHandle {
    container: Arc<MemoryContainer>,
    live: Arc<AtomicUsize>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryHandle {
    fn stored(&self, index: usize) -> Result<&StoredAttribute, ContainerError> {
        self.container
            .attributes
            .get(index)
            .ok_or(ContainerError::AttributeIndex(index))
    }
}

impl Container for MemoryHandle {
    fn size(&self) -> Result<u64, ContainerError> {
        Ok(self
            .container
            .size
            .unwrap_or_else(|| self.container.stored_bytes()))
    }

    fn attribute_count(&self) -> Result<usize, ContainerError> {
        Ok(self.container.attributes.len())
    }

    fn attribute_name(&self, index: usize) -> Result<String, ContainerError> {
        self.stored(index).map(|a| a.name().to_string())
    }

    fn attribute(&self, index: usize) -> Result<Attribute, ContainerError> {
        match self.stored(index)? {
            StoredAttribute::Readable(attr) => Ok(attr.clone()),
            StoredAttribute::Unreadable(name) => Err(ContainerError::Backend(format!(
                "unable to read the value of {}",
                name
            ))),
        }
    }

    fn dataset<'a>(&'a self, name: &str) -> Result<Box<dyn Dataset + 'a>, ContainerError> {
        let name = name.trim_start_matches("./").trim_start_matches('/');
        self.container
            .datasets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| Box::new(d) as Box<dyn Dataset + 'a>)
            .ok_or_else(|| ContainerError::MissingDataset(name.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    containers: HashMap<PathBuf, Arc<MemoryContainer>>,
    live: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, container: MemoryContainer) {
        self.containers.insert(path.into(), Arc::new(container));
    }

    /// Handles opened and not yet dropped
    pub fn open_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total successful opens since the store was created
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ContainerOpener for MemoryStore {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, ContainerError> {
        let container = self
            .containers
            .get(path)
            .ok_or_else(|| ContainerError::NotFound(path.to_path_buf()))?;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle {
            container: Arc::clone(container),
            live: Arc::clone(&self.live),
        }))
    }
}
