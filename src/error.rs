//! Error type shared by every operation of the catalog.
//!
//! Every variant carries the path, attribute or version it is about, so the
//! message is actionable on its own. [`Error::kind`] sorts them into broad
//! classes for callers that only need to branch on the class.

use crate::catalog::AccessMode;
use crate::container::{ContainerError, DecodeError};
use crate::version::VersionBound;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// Malformed arguments
    InvalidInput,
    /// Channel, file or properties absent
    NotFound,
    /// Access modes other than local
    UnsupportedMode,
    /// Version out of range, missing or malformed attributes and datasets
    Format,
    /// Filesystem or container I/O failure
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed input directory '{0}'")]
    MalformedDirectory(String),

    #[error("Access mode {0} not implemented")]
    UnsupportedAccessMode(AccessMode),

    #[error(
        "{} is a channel directory, but a top-level directory containing channel directories is required",
        .0.display()
    )]
    NotATopLevelDirectory(PathBuf),

    #[error("Problem opening directory {}", .path.display())]
    DirectoryOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Properties file not found in {}", .0.display())]
    PropertiesNotFound(PathBuf),

    #[error("Problem opening file {}", .path.display())]
    ContainerOpenFailed {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    #[error("No data found in file {}", .0.display())]
    EmptyContainer(PathBuf),

    #[error("Problem reading attribute {name} in {}", .path.display())]
    AttributeReadFailed {
        path: PathBuf,
        name: String,
        #[source]
        source: AttributeFailure,
    },

    #[error("{}", unsupported_version_message(.version, .bound))]
    UnsupportedVersion {
        path: PathBuf,
        version: String,
        bound: VersionBound,
    },

    #[error("Missing attribute {name} in {}", .path.display())]
    MissingAttribute { path: PathBuf, name: &'static str },

    #[error("Attribute {name} in {} is invalid: {reason}", .path.display())]
    InvalidAttribute {
        path: PathBuf,
        name: &'static str,
        reason: String,
    },

    #[error("No channel found named {0}")]
    ChannelNotFound(String),

    #[error("No data files found for channel {0}")]
    NoDataFiles(String),

    #[error("Unable to read dataset {dataset} in {}", .path.display())]
    DatasetReadFailed {
        path: PathBuf,
        dataset: &'static str,
        #[source]
        source: AttributeFailure,
    },

    #[error("Malformed {dataset} in {}: {reason}", .path.display())]
    MalformedIndex {
        path: PathBuf,
        dataset: &'static str,
        reason: String,
    },
}

/// Why an attribute or dataset that exists could not be read
#[derive(Error, Debug)]
pub enum AttributeFailure {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

fn unsupported_version_message(version: &str, bound: &VersionBound) -> String {
    match bound {
        VersionBound::Minimum => format!(
            "The Digital RF files being read are version {}, which is less than the required version ({})",
            version,
            bound.text()
        ),
        VersionBound::Maximum => format!(
            "The Digital RF files being read are version {}, which is higher than the maximum supported version ({}) for this package",
            version,
            bound.text()
        ),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedDirectory(_) | Error::NotATopLevelDirectory(_) => {
                ErrorKind::InvalidInput
            }
            Error::UnsupportedAccessMode(_) => ErrorKind::UnsupportedMode,
            Error::PropertiesNotFound(_) | Error::ChannelNotFound(_) | Error::NoDataFiles(_) => {
                ErrorKind::NotFound
            }
            Error::DirectoryOpenFailed { .. } | Error::ContainerOpenFailed { .. } => ErrorKind::Io,
            Error::AttributeReadFailed { source, .. } | Error::DatasetReadFailed { source, .. } => {
                match source {
                    AttributeFailure::Container(_) => ErrorKind::Io,
                    AttributeFailure::Decode(_) => ErrorKind::Format,
                }
            }
            Error::EmptyContainer(_)
            | Error::UnsupportedVersion { .. }
            | Error::MissingAttribute { .. }
            | Error::InvalidAttribute { .. }
            | Error::MalformedIndex { .. } => ErrorKind::Format,
        }
    }
}
