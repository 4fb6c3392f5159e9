//! The narrow surface we need from the binary container format (HDF5 on disk).
//! A backend opens a file read-only, exposes the root attributes by index and
//! hands out datasets by name. Every handle releases its resources on drop.
//!
//! Raw values always travel as little-endian bytes, whatever the backend.

use byteorder::{ByteOrder, LittleEndian};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod memory;

/// Errors reported by a container backend
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Container {0} does not exist")]
    NotFound(PathBuf),
    #[error("Not a valid container: {0}")]
    Invalid(String),
    #[error("No attribute at index {0}")]
    AttributeIndex(usize),
    #[error("No dataset named {0}")]
    MissingDataset(String),
    #[error("Container I/O error")]
    Io(#[from] std::io::Error),
    #[error("Container backend error: {0}")]
    Backend(String),
}

/// Errors while turning the raw bytes of an attribute into a value
#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Expected a {expected} value, found {found:?}")]
    WrongType {
        expected: &'static str,
        found: ElementType,
    },
    #[error("Value holds {0} bytes, too few for its element type")]
    Truncated(usize),
    #[error("Negative value {0} where an unsigned one is required")]
    Negative(i64),
    #[error("Element width of {0} bytes is not supported")]
    UnsupportedWidth(usize),
    #[error("String was not UTF-8 encoded, likely corrupt file")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Declared type of the elements of an attribute or dataset
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ElementType {
    Int { width: usize, signed: bool },
    Float { width: usize },
    Bool,
    Str,
    /// Compound, array or reference types, which carry no value we read
    Opaque { width: usize },
}

impl ElementType {
    fn width(&self) -> Option<usize> {
        match *self {
            ElementType::Int { width, .. } | ElementType::Float { width } => Some(width),
            ElementType::Bool => Some(1),
            ElementType::Str | ElementType::Opaque { .. } => None,
        }
    }
}

/// A root-group attribute, as stored: name, declared type and raw value.
/// Array-valued attributes carry all their elements, decoders read the first.
#[derive(Clone, PartialEq, Debug)]
pub struct Attribute {
    pub name: String,
    pub element: ElementType,
    pub raw: Vec<u8>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, element: ElementType, raw: Vec<u8>) -> Attribute {
        Attribute {
            name: name.into(),
            element,
            raw,
        }
    }

    fn first_element(&self) -> Result<&[u8], DecodeError> {
        let width = self.element.width().unwrap_or(self.raw.len());
        if width == 0 || width > 8 {
            return Err(DecodeError::UnsupportedWidth(width));
        }
        self.raw
            .get(..width)
            .ok_or(DecodeError::Truncated(self.raw.len()))
    }

    pub fn decode_i64(&self) -> Result<i64, DecodeError> {
        match self.element {
            ElementType::Int { signed: true, .. } => {
                let bytes = self.first_element()?;
                Ok(LittleEndian::read_int(bytes, bytes.len()))
            }
            ElementType::Int { signed: false, .. } => {
                let bytes = self.first_element()?;
                let value = LittleEndian::read_uint(bytes, bytes.len());
                i64::try_from(value).map_err(|_| DecodeError::WrongType {
                    expected: "signed integer",
                    found: self.element,
                })
            }
            ElementType::Bool => Ok(i64::from(self.first_element()?[0] != 0)),
            found => Err(DecodeError::WrongType {
                expected: "integer",
                found,
            }),
        }
    }

    pub fn decode_u64(&self) -> Result<u64, DecodeError> {
        match self.element {
            ElementType::Int { signed: false, .. } => {
                let bytes = self.first_element()?;
                Ok(LittleEndian::read_uint(bytes, bytes.len()))
            }
            _ => {
                let value = self.decode_i64()?;
                u64::try_from(value).map_err(|_| DecodeError::Negative(value))
            }
        }
    }

    /// Integers widen to f64, which is how the legacy `samples_per_second` may be stored
    pub fn decode_f64(&self) -> Result<f64, DecodeError> {
        match self.element {
            ElementType::Float { width: 8 } => Ok(LittleEndian::read_f64(self.first_element()?)),
            ElementType::Float { width: 4 } => {
                Ok(f64::from(LittleEndian::read_f32(self.first_element()?)))
            }
            ElementType::Float { width } => Err(DecodeError::UnsupportedWidth(width)),
            ElementType::Int { signed: false, .. } => Ok(self.decode_u64()? as f64),
            ElementType::Int { signed: true, .. } | ElementType::Bool => {
                Ok(self.decode_i64()? as f64)
            }
            ElementType::Str | ElementType::Opaque { .. } => Err(DecodeError::WrongType {
                expected: "numeric",
                found: self.element,
            }),
        }
    }

    pub fn decode_bool(&self) -> Result<bool, DecodeError> {
        Ok(self.decode_i64()? != 0)
    }

    /// Fixed-length strings come NUL padded, the padding is dropped
    pub fn decode_string(&self) -> Result<String, DecodeError> {
        if self.element != ElementType::Str {
            return Err(DecodeError::WrongType {
                expected: "string",
                found: self.element,
            });
        }
        let end = self
            .raw
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.raw.len());
        Ok(String::from_utf8(self.raw[..end].to_vec())?)
    }
}

/// Decodes the raw contents of an unsigned integer dataset
pub fn decode_u64_values(element: ElementType, raw: &[u8]) -> Result<Vec<u64>, DecodeError> {
    let width = match element {
        ElementType::Int { width, .. } if (1..=8).contains(&width) => width,
        ElementType::Int { width, .. } => return Err(DecodeError::UnsupportedWidth(width)),
        found => {
            return Err(DecodeError::WrongType {
                expected: "unsigned integer",
                found,
            });
        }
    };
    if raw.len() % width != 0 {
        return Err(DecodeError::Truncated(raw.len()));
    }
    raw.chunks_exact(width)
        .map(|chunk| match element {
            ElementType::Int { signed: true, .. } => {
                let value = LittleEndian::read_int(chunk, width);
                u64::try_from(value).map_err(|_| DecodeError::Negative(value))
            }
            _ => Ok(LittleEndian::read_uint(chunk, width)),
        })
        .collect()
}

pub trait Dataset {
    /// Extent of every dimension, slowest varying first
    fn shape(&self) -> Result<Vec<u64>, ContainerError>;
    fn element(&self) -> ElementType;
    /// Full contents as little-endian bytes
    fn read_raw(&self) -> Result<Vec<u8>, ContainerError>;
}

pub trait Container {
    /// Total size of the file in bytes
    fn size(&self) -> Result<u64, ContainerError>;
    fn attribute_count(&self) -> Result<usize, ContainerError>;
    /// Name of the attribute at `index`, without reading its value
    fn attribute_name(&self, index: usize) -> Result<String, ContainerError>;
    fn attribute(&self, index: usize) -> Result<Attribute, ContainerError>;
    fn dataset<'a>(&'a self, name: &str) -> Result<Box<dyn Dataset + 'a>, ContainerError>;
}

/// Opens containers read-only. Shared by every channel of a catalog, hence
/// `Send + Sync`.
pub trait ContainerOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, ContainerError>;
}
