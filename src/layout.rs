//! Names and lexical patterns of a Digital RF directory tree, and the
//! classification of directories as channels.
//!
//! ```text
//! top_level/
//!   channel_a/
//!     drf_properties.h5
//!     2020-01-01T00-00-00/
//!       rf@1577836800.000.h5
//!       rf@1577836801.000.h5
//! ```

use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

pub const PROPERTIES_FILE: &str = "drf_properties.h5";
pub const LEGACY_PROPERTIES_FILE: &str = "metadata.h5";
pub const DRF_METADATA_FILE: &str = "drf_metadata.h5";
pub const DMD_PROPERTIES_FILE: &str = "dmd_properties.h5";
pub const DMD_METADATA_FILE: &str = "dmd_metadata.h5";

pub const DATA_FILE_MARKER: &str = "rf@";
pub const CONTAINER_EXTENSION: &str = ".h5";

pub const INDEX_DATASET: &str = "rf_data_index";
pub const DATA_DATASET: &str = "rf_data";

static TIME_BUCKET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}-[0-9]{2}-[0-9]{2}$")
        .expect("Invalid time bucket regex")
});

static DATA_FILE_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rf@([0-9]+)\.([0-9]{3})\.h5$").expect("Invalid data file regex")
});

/// Which properties file marks a channel directory
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PropertiesFile {
    Current,
    Legacy,
}

impl PropertiesFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            PropertiesFile::Current => PROPERTIES_FILE,
            PropertiesFile::Legacy => LEGACY_PROPERTIES_FILE,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DirKind {
    Channel(PropertiesFile),
    /// Listed fine, no properties file in it
    Plain,
    /// Could not be listed at all (missing, not a directory, no permission)
    Unreadable,
}

impl DirKind {
    pub fn is_channel(&self) -> bool {
        matches!(self, DirKind::Channel(_))
    }
}

/// Names of the immediate entries of `dir`. Names that are not valid UTF-8
/// cannot match any of our patterns and are converted lossily.
pub fn entry_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// The properties file in `dir`, the current name winning over the legacy one.
/// Found by listing rather than by stat.
pub fn find_properties_file(dir: &Path) -> io::Result<Option<PropertiesFile>> {
    let names = entry_names(dir)?;
    let has = |wanted: &str| names.iter().any(|n| n == wanted);

    Ok(if has(PROPERTIES_FILE) {
        Some(PropertiesFile::Current)
    } else if has(LEGACY_PROPERTIES_FILE) {
        Some(PropertiesFile::Legacy)
    } else {
        None
    })
}

pub fn classify(dir: &Path) -> DirKind {
    match find_properties_file(dir) {
        Ok(Some(file)) => DirKind::Channel(file),
        Ok(None) => DirKind::Plain,
        Err(_) => DirKind::Unreadable,
    }
}

pub fn is_channel_dir(dir: &Path) -> bool {
    classify(dir).is_channel()
}

/// Whether `dir` holds a marker of a channel whose files can be enumerated.
/// The drf names always count, the dmd names only with `accept_metadata_only`.
pub fn has_channel_marker(dir: &Path, accept_metadata_only: bool) -> bool {
    let Ok(names) = entry_names(dir) else {
        return false;
    };
    let has = |wanted: &str| names.iter().any(|n| n == wanted);

    has(PROPERTIES_FILE)
        || has(LEGACY_PROPERTIES_FILE)
        || has(DRF_METADATA_FILE)
        || (accept_metadata_only && (has(DMD_PROPERTIES_FILE) || has(DMD_METADATA_FILE)))
}

/// `YYYY-MM-DDTHH-MM-SS`, nothing before or after
pub fn is_time_bucket_name(name: &str) -> bool {
    TIME_BUCKET_REGEX.is_match(name)
}

pub fn is_data_file_name(name: &str) -> bool {
    name.contains(DATA_FILE_MARKER) && name.ends_with(CONTAINER_EXTENSION)
}

pub fn is_properties_file_name(name: &str) -> bool {
    [
        PROPERTIES_FILE,
        LEGACY_PROPERTIES_FILE,
        DRF_METADATA_FILE,
        DMD_PROPERTIES_FILE,
        DMD_METADATA_FILE,
    ]
    .contains(&name)
}

/// Start time of a data file in milliseconds since the UNIX epoch, taken from
/// its `rf@<secs>.<millis>.h5` name
pub fn data_file_start_millis(name: &str) -> Option<u64> {
    let caps = DATA_FILE_TIME_REGEX.captures(name)?;
    let secs: u64 = caps.get(1)?.as_str().parse().ok()?;
    let millis: u64 = caps.get(2)?.as_str().parse().ok()?;
    secs.checked_mul(1000)?.checked_add(millis)
}
