//! HDF5 backend for the container traits, on top of the `hdf5` crate.
//!
//! Numeric values are converted by the library to 64-bit on read and handed
//! on as little-endian bytes, so every integer reaches the decoders as width 8.

use crate::container::{Attribute, Container, ContainerError, ContainerOpener, Dataset, ElementType};
use hdf5::types::{FixedAscii, FixedUnicode, FloatSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use std::path::Path;

/// Hash table slots of the raw-data chunk cache
const CHUNK_CACHE_SLOTS: usize = 521;
const CHUNK_CACHE_W0: f64 = 0.75;
/// Longest fixed-length string attribute we read
const MAX_FIXED_STRING: usize = 1024;

fn backend(e: hdf5::Error) -> ContainerError {
    ContainerError::Backend(e.to_string())
}

fn element_of(descriptor: &TypeDescriptor) -> ElementType {
    match descriptor {
        TypeDescriptor::Integer(_) => ElementType::Int {
            width: 8,
            signed: true,
        },
        TypeDescriptor::Unsigned(_) => ElementType::Int {
            width: 8,
            signed: false,
        },
        TypeDescriptor::Float(size) => match size {
            FloatSize::U4 => ElementType::Float { width: 4 },
            _ => ElementType::Float { width: 8 },
        },
        TypeDescriptor::Boolean => ElementType::Bool,
        TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_)
        | TypeDescriptor::VarLenAscii
        | TypeDescriptor::VarLenUnicode => ElementType::Str,
        other => ElementType::Opaque {
            width: other.size(),
        },
    }
}

fn read_string(
    attr: &hdf5::Attribute,
    descriptor: &TypeDescriptor,
) -> Result<Vec<u8>, ContainerError> {
    let text = match descriptor {
        TypeDescriptor::VarLenUnicode => attr
            .read_scalar::<VarLenUnicode>()
            .map_err(backend)?
            .to_string(),
        TypeDescriptor::VarLenAscii => attr
            .read_scalar::<VarLenAscii>()
            .map_err(backend)?
            .to_string(),
        TypeDescriptor::FixedAscii(_) => attr
            .read_scalar::<FixedAscii<MAX_FIXED_STRING>>()
            .map_err(backend)?
            .to_string(),
        _ => attr
            .read_scalar::<FixedUnicode<MAX_FIXED_STRING>>()
            .map_err(backend)?
            .to_string(),
    };
    Ok(text.into_bytes())
}

fn read_value(
    attr: &hdf5::Attribute,
    element: ElementType,
    descriptor: &TypeDescriptor,
) -> Result<Vec<u8>, ContainerError> {
    let raw = match element {
        ElementType::Int { signed: true, .. } => attr
            .read_raw::<i64>()
            .map_err(backend)?
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
        ElementType::Int { signed: false, .. } => attr
            .read_raw::<u64>()
            .map_err(backend)?
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
        ElementType::Float { width: 4 } => attr
            .read_raw::<f32>()
            .map_err(backend)?
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
        ElementType::Float { .. } => attr
            .read_raw::<f64>()
            .map_err(backend)?
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
        ElementType::Bool => attr
            .read_raw::<bool>()
            .map_err(backend)?
            .iter()
            .map(|v| u8::from(*v))
            .collect(),
        ElementType::Str => read_string(attr, descriptor)?,
        ElementType::Opaque { .. } => Vec::new(),
    };
    Ok(raw)
}

pub struct Hdf5Dataset {
    dataset: hdf5::Dataset,
    element: ElementType,
}

impl Dataset for Hdf5Dataset {
    fn shape(&self) -> Result<Vec<u64>, ContainerError> {
        Ok(self.dataset.shape().into_iter().map(|d| d as u64).collect())
    }

    fn element(&self) -> ElementType {
        self.element
    }

    fn read_raw(&self) -> Result<Vec<u8>, ContainerError> {
        match self.element {
            ElementType::Int { signed: false, .. } => Ok(self
                .dataset
                .read_raw::<u64>()
                .map_err(backend)?
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect()),
            ElementType::Int { signed: true, .. } => Ok(self
                .dataset
                .read_raw::<i64>()
                .map_err(backend)?
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect()),
            other => Err(ContainerError::Invalid(format!(
                "reading {:?} datasets is not supported",
                other
            ))),
        }
    }
}

pub struct Hdf5File {
    file: hdf5::File,
    attribute_names: Vec<String>,
}

impl Container for Hdf5File {
    fn size(&self) -> Result<u64, ContainerError> {
        Ok(self.file.size())
    }

    fn attribute_count(&self) -> Result<usize, ContainerError> {
        Ok(self.attribute_names.len())
    }

    fn attribute_name(&self, index: usize) -> Result<String, ContainerError> {
        self.attribute_names
            .get(index)
            .cloned()
            .ok_or(ContainerError::AttributeIndex(index))
    }

    fn attribute(&self, index: usize) -> Result<Attribute, ContainerError> {
        let name = self
            .attribute_names
            .get(index)
            .ok_or(ContainerError::AttributeIndex(index))?;
        let attr = self.file.attr(name).map_err(backend)?;
        let descriptor = attr
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(backend)?;
        let element = element_of(&descriptor);
        let raw = read_value(&attr, element, &descriptor)?;
        Ok(Attribute::new(name.clone(), element, raw))
    }

    fn dataset<'a>(&'a self, name: &str) -> Result<Box<dyn Dataset + 'a>, ContainerError> {
        if !self.file.link_exists(name) {
            return Err(ContainerError::MissingDataset(name.to_string()));
        }
        let dataset = self.file.dataset(name).map_err(backend)?;
        let element = dataset
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map(|d| element_of(&d))
            .map_err(backend)?;
        Ok(Box::new(Hdf5Dataset { dataset, element }))
    }
}

/// Opens files read-only, with a chunk cache of `cache_size_hint` bytes when
/// the hint is not zero
#[derive(Copy, Clone, Debug, Default)]
pub struct Hdf5Opener {
    cache_size_hint: u64,
}

impl Hdf5Opener {
    pub fn new(cache_size_hint: u64) -> Hdf5Opener {
        Hdf5Opener { cache_size_hint }
    }
}

impl ContainerOpener for Hdf5Opener {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, ContainerError> {
        if !path.is_file() {
            return Err(ContainerError::NotFound(path.to_path_buf()));
        }
        let mut builder = hdf5::File::with_options();
        if self.cache_size_hint > 0 {
            let nbytes = usize::try_from(self.cache_size_hint).unwrap_or(usize::MAX);
            builder.with_fapl(|p| p.chunk_cache(CHUNK_CACHE_SLOTS, nbytes, CHUNK_CACHE_W0));
        }
        let file = builder
            .open(path)
            .map_err(|e| ContainerError::Invalid(e.to_string()))?;
        let attribute_names = file.attr_names().map_err(backend)?;
        Ok(Box::new(Hdf5File {
            file,
            attribute_names,
        }))
    }
}
