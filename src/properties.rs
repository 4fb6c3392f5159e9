//! Parsing of a channel's properties file into [`ChannelMetadata`].
//!
//! The root attributes are visited in whatever order the container reports
//! them. Each name maps onto a [`PropertyAttribute`]; names we don't know are
//! skipped without reading their value, so newer files still read.

use crate::catalog::AccessMode;
use crate::container::{Attribute, ContainerOpener, ElementType};
use crate::error::{AttributeFailure, Error, Result};
use crate::layout;
use crate::rate::SampleRate;
use crate::version::FormatVersion;
use fixed::types::U64F64;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata of one channel, as read from its properties file
#[derive(PartialEq, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelMetadata {
    pub access_mode: AccessMode,
    /// Absolute, canonical
    pub top_level_dir: PathBuf,
    /// Directory name, lossily converted when it is not UTF-8
    pub channel_name: String,
    /// The channel directory as found on disk
    pub channel_path: PathBuf,
    /// Dotted `major.minor.patch`, within the supported range
    pub format_version: String,
    pub epoch: String,
    pub time_description: String,
    /// Whether each sample is a complex pair
    pub is_complex: bool,
    pub is_continuous: bool,
    pub num_subchannels: u64,
    pub sample_rate_numerator: u64,
    pub sample_rate_denominator: u64,
    /// Samples per second, materialized from the rational rate
    pub sample_rate: f64,
    /// Seconds spanned by one time-bucket subdirectory
    pub subdir_cadence_secs: u64,
    /// Milliseconds spanned by one data file
    pub file_cadence_millisecs: u64,
    /// Passed through to the container backend, not interpreted here
    pub cache_size_hint: u64,
}

impl ChannelMetadata {
    pub fn rate(&self) -> SampleRate {
        SampleRate::new(self.sample_rate_numerator, self.sample_rate_denominator)
    }

    pub fn version(&self) -> Option<FormatVersion> {
        FormatVersion::parse(&self.format_version)
    }

    pub fn channel_dir(&self) -> &Path {
        &self.channel_path
    }

    /// Seconds since the epoch of sample `index`
    pub fn sample_time(&self, index: u64) -> Option<U64F64> {
        self.rate().sample_to_seconds(index)
    }
}

/// Root attributes we understand
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PropertyAttribute {
    TimeDescription,
    Version,
    Epoch,
    FileCadenceMillisecs,
    IsComplex,
    IsContinuous,
    NumSubchannels,
    SampleRateNumerator,
    SampleRateDenominator,
    /// Legacy scalar rate, replaced by the numerator/denominator pair
    SamplesPerSecond,
    SubdirCadenceSecs,
    Unknown,
}

impl PropertyAttribute {
    pub fn from_name(name: &str) -> PropertyAttribute {
        match name {
            "digital_rf_time_description" | "time_description" => {
                PropertyAttribute::TimeDescription
            }
            "digital_rf_version" | "version" => PropertyAttribute::Version,
            "epoch" => PropertyAttribute::Epoch,
            "file_cadence_millisecs" => PropertyAttribute::FileCadenceMillisecs,
            "is_complex" => PropertyAttribute::IsComplex,
            "is_continuous" => PropertyAttribute::IsContinuous,
            "num_subchannels" => PropertyAttribute::NumSubchannels,
            "sample_rate_numerator" => PropertyAttribute::SampleRateNumerator,
            "sample_rate_denominator" => PropertyAttribute::SampleRateDenominator,
            "samples_per_second" => PropertyAttribute::SamplesPerSecond,
            "subdir_cadence_secs" => PropertyAttribute::SubdirCadenceSecs,
            _ => PropertyAttribute::Unknown,
        }
    }

    /// Canonical on-disk name
    pub fn name(&self) -> &'static str {
        match self {
            PropertyAttribute::TimeDescription => "digital_rf_time_description",
            PropertyAttribute::Version => "digital_rf_version",
            PropertyAttribute::Epoch => "epoch",
            PropertyAttribute::FileCadenceMillisecs => "file_cadence_millisecs",
            PropertyAttribute::IsComplex => "is_complex",
            PropertyAttribute::IsContinuous => "is_continuous",
            PropertyAttribute::NumSubchannels => "num_subchannels",
            PropertyAttribute::SampleRateNumerator => "sample_rate_numerator",
            PropertyAttribute::SampleRateDenominator => "sample_rate_denominator",
            PropertyAttribute::SamplesPerSecond => "samples_per_second",
            PropertyAttribute::SubdirCadenceSecs => "subdir_cadence_secs",
            PropertyAttribute::Unknown => "",
        }
    }
}

/// The legacy rate as read: the scalar used for the fraction and the value
/// that becomes the materialized rate
#[derive(Copy, Clone, Debug)]
struct LegacyRate {
    scalar: u64,
    materialized: f64,
}

#[derive(Default)]
struct Fields {
    time_description: Option<String>,
    version: Option<String>,
    epoch: Option<String>,
    file_cadence_millisecs: Option<u64>,
    is_complex: Option<bool>,
    is_continuous: Option<bool>,
    num_subchannels: Option<u64>,
    numerator: Option<u64>,
    denominator: Option<u64>,
    legacy: Option<LegacyRate>,
    subdir_cadence_secs: Option<u64>,
}

fn read_failed(path: &Path, attr: &Attribute, source: impl Into<AttributeFailure>) -> Error {
    Error::AttributeReadFailed {
        path: path.to_path_buf(),
        name: attr.name.clone(),
        source: source.into(),
    }
}

fn decode_legacy_rate(path: &Path, attr: &Attribute) -> Result<LegacyRate> {
    match attr.element {
        ElementType::Float { .. } => {
            let value = attr.decode_f64().map_err(|e| read_failed(path, attr, e))?;
            Ok(LegacyRate {
                scalar: value as u64,
                materialized: value,
            })
        }
        _ => {
            let value = attr.decode_u64().map_err(|e| read_failed(path, attr, e))?;
            Ok(LegacyRate {
                scalar: value,
                materialized: value as f64,
            })
        }
    }
}

impl Fields {
    /// Stores one attribute. The version is checked right here so that an
    /// unsupported file stops before anything else is read.
    fn apply(&mut self, path: &Path, kind: PropertyAttribute, attr: &Attribute) -> Result<()> {
        let string = |a: &Attribute| a.decode_string().map_err(|e| read_failed(path, a, e));
        let unsigned = |a: &Attribute| a.decode_u64().map_err(|e| read_failed(path, a, e));
        let boolean = |a: &Attribute| a.decode_bool().map_err(|e| read_failed(path, a, e));

        match kind {
            PropertyAttribute::TimeDescription => self.time_description = Some(string(attr)?),
            PropertyAttribute::Version => {
                let text = string(attr)?;
                check_version(path, &text)?;
                self.version = Some(text);
            }
            PropertyAttribute::Epoch => self.epoch = Some(string(attr)?),
            PropertyAttribute::FileCadenceMillisecs => {
                self.file_cadence_millisecs = Some(unsigned(attr)?)
            }
            PropertyAttribute::IsComplex => self.is_complex = Some(boolean(attr)?),
            PropertyAttribute::IsContinuous => self.is_continuous = Some(boolean(attr)?),
            PropertyAttribute::NumSubchannels => self.num_subchannels = Some(unsigned(attr)?),
            PropertyAttribute::SampleRateNumerator => self.numerator = Some(unsigned(attr)?),
            PropertyAttribute::SampleRateDenominator => self.denominator = Some(unsigned(attr)?),
            PropertyAttribute::SamplesPerSecond => {
                self.legacy = Some(decode_legacy_rate(path, attr)?)
            }
            PropertyAttribute::SubdirCadenceSecs => {
                self.subdir_cadence_secs = Some(unsigned(attr)?)
            }
            PropertyAttribute::Unknown => {}
        }
        Ok(())
    }

    /// Numerator, denominator and materialized rate. A legacy scalar wins when
    /// both representations are present.
    fn rate(&self, path: &Path) -> Result<(SampleRate, f64)> {
        if let Some(legacy) = self.legacy {
            if self.numerator.is_some() || self.denominator.is_some() {
                warn!(
                    "{} holds both samples_per_second and sample_rate_numerator/denominator, using samples_per_second",
                    path.display()
                );
            }
            return Ok((
                SampleRate::from_legacy_scalar(legacy.scalar),
                legacy.materialized,
            ));
        }

        let (numerator, denominator) = match (self.numerator, self.denominator) {
            (Some(n), Some(d)) => (n, d),
            (None, None) => {
                warn!("{} holds no sample rate attribute", path.display());
                return Err(missing(path, PropertyAttribute::SampleRateNumerator));
            }
            (None, Some(_)) => return Err(missing(path, PropertyAttribute::SampleRateNumerator)),
            (Some(_), None) => return Err(missing(path, PropertyAttribute::SampleRateDenominator)),
        };
        if denominator == 0 {
            return Err(Error::InvalidAttribute {
                path: path.to_path_buf(),
                name: PropertyAttribute::SampleRateDenominator.name(),
                reason: "denominator is zero".to_string(),
            });
        }
        let rate = SampleRate::new(numerator, denominator);
        Ok((rate, rate.as_f64()))
    }
}

fn missing(path: &Path, attr: PropertyAttribute) -> Error {
    Error::MissingAttribute {
        path: path.to_path_buf(),
        name: attr.name(),
    }
}

fn check_version(path: &Path, text: &str) -> Result<()> {
    let version = FormatVersion::parse(text).ok_or_else(|| Error::InvalidAttribute {
        path: path.to_path_buf(),
        name: PropertyAttribute::Version.name(),
        reason: format!("'{}' is not a dotted version", text),
    })?;
    match version.violated_bound() {
        Some(bound) => Err(Error::UnsupportedVersion {
            path: path.to_path_buf(),
            version: text.to_string(),
            bound,
        }),
        None => Ok(()),
    }
}

/// Reads the properties file of `channel_dir`, preferring `drf_properties.h5`
/// over the legacy `metadata.h5`. The container is closed before returning,
/// on success and on error alike.
pub fn parse(
    channel_dir: &Path,
    cache_size_hint: u64,
    opener: &dyn ContainerOpener,
) -> Result<ChannelMetadata> {
    let file = layout::find_properties_file(channel_dir)
        .map_err(|source| Error::DirectoryOpenFailed {
            path: channel_dir.to_path_buf(),
            source,
        })?
        .ok_or_else(|| Error::PropertiesNotFound(channel_dir.to_path_buf()))?;
    let path = channel_dir.join(file.file_name());
    debug!("Reading properties from {}", path.display());

    let open_failed = |source| Error::ContainerOpenFailed {
        path: path.clone(),
        source,
    };
    let container = opener.open(&path).map_err(open_failed)?;
    if container.size().map_err(open_failed)? == 0 {
        return Err(Error::EmptyContainer(path));
    }

    let mut fields = Fields::default();
    let count = container.attribute_count().map_err(open_failed)?;
    for index in 0..count {
        let name = container
            .attribute_name(index)
            .map_err(|source| Error::AttributeReadFailed {
                path: path.clone(),
                name: format!("#{}", index),
                source: source.into(),
            })?;
        let kind = PropertyAttribute::from_name(&name);
        if kind == PropertyAttribute::Unknown {
            debug!("Ignoring attribute {} in {}", name, path.display());
            continue;
        }
        let attr = container
            .attribute(index)
            .map_err(|source| Error::AttributeReadFailed {
                path: path.clone(),
                name,
                source: source.into(),
            })?;
        fields.apply(&path, kind, &attr)?;
    }
    drop(container);

    let format_version = fields
        .version
        .clone()
        .ok_or_else(|| missing(&path, PropertyAttribute::Version))?;
    let (rate, sample_rate) = fields.rate(&path)?;
    let subdir_cadence_secs = fields
        .subdir_cadence_secs
        .ok_or_else(|| missing(&path, PropertyAttribute::SubdirCadenceSecs))?;
    let file_cadence_millisecs = fields
        .file_cadence_millisecs
        .ok_or_else(|| missing(&path, PropertyAttribute::FileCadenceMillisecs))?;
    let num_subchannels = fields.num_subchannels.unwrap_or(1);
    if num_subchannels == 0 {
        return Err(Error::InvalidAttribute {
            path,
            name: PropertyAttribute::NumSubchannels.name(),
            reason: "a channel has at least one subchannel".to_string(),
        });
    }

    let top_level_dir = channel_dir.parent().unwrap_or(channel_dir).to_path_buf();
    let channel_name = channel_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ChannelMetadata {
        access_mode: AccessMode::Local,
        top_level_dir,
        channel_name,
        channel_path: channel_dir.to_path_buf(),
        format_version,
        epoch: fields.epoch.unwrap_or_default(),
        time_description: fields.time_description.unwrap_or_default(),
        is_complex: fields.is_complex.unwrap_or(false),
        is_continuous: fields.is_continuous.unwrap_or(false),
        num_subchannels,
        sample_rate_numerator: rate.numerator,
        sample_rate_denominator: rate.denominator,
        sample_rate,
        subdir_cadence_secs,
        file_cadence_millisecs,
        cache_size_hint,
    })
}

#[cfg(test)]
mod properties_tests {
    use super::*;
    use crate::container::memory::{MemoryContainer, MemoryStore};
    use crate::error::ErrorKind;
    use std::fs::{self, File};
    use tempfile::{TempDir, tempdir};

    fn base() -> MemoryContainer {
        MemoryContainer::new()
            .with_str("digital_rf_version", "2.6.0")
            .with_str("epoch", "1970-01-01T00:00:00Z")
            .with_str("digital_rf_time_description", "All times in this format are in number of samples since the epoch in the epoch attribute.")
            .with_i64("file_cadence_millisecs", 1000)
            .with_i64("subdir_cadence_secs", 3600)
            .with_i64("is_complex", 1)
            .with_i64("is_continuous", 1)
            .with_i64("num_subchannels", 1)
    }

    /// A channel directory holding an (empty) properties file on disk, with the
    /// container registered in a store at the same path
    fn channel(file_name: &str, container: MemoryContainer) -> (TempDir, PathBuf, MemoryStore) {
        let top = tempdir().unwrap();
        let top_path = fs::canonicalize(top.path()).unwrap();
        let dir = top_path.join("ch0");
        fs::create_dir(&dir).unwrap();
        File::create(dir.join(file_name)).unwrap();
        let mut store = MemoryStore::new();
        store.insert(dir.join(file_name), container);
        (top, dir, store)
    }

    #[test]
    fn current_properties() {
        let props = base()
            .with_u64("sample_rate_numerator", 8_000_000)
            .with_u64("sample_rate_denominator", 1)
            .with_str("some_future_attribute", "ignored");
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let meta = parse(&dir, 4000, &store).unwrap();
        assert_eq!(meta.sample_rate, 8_000_000.0);
        assert_eq!(meta.rate(), SampleRate::new(8_000_000, 1));
        assert_eq!(meta.format_version, "2.6.0");
        assert_eq!(meta.epoch, "1970-01-01T00:00:00Z");
        assert!(meta.is_complex);
        assert!(meta.is_continuous);
        assert_eq!(meta.num_subchannels, 1);
        assert_eq!(meta.subdir_cadence_secs, 3600);
        assert_eq!(meta.file_cadence_millisecs, 1000);
        assert_eq!(meta.cache_size_hint, 4000);
        assert_eq!(meta.channel_name, "ch0");
        assert_eq!(meta.channel_dir(), dir.as_path());
        assert_eq!(meta.access_mode, AccessMode::Local);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn rational_rate() {
        let props = base()
            .with_u64("sample_rate_numerator", 100)
            .with_u64("sample_rate_denominator", 3);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let meta = parse(&dir, 0, &store).unwrap();
        assert_eq!(meta.sample_rate, 100.0 / 3.0);
        assert_eq!(meta.sample_time(100), Some(U64F64::from_num(3)));
    }

    #[test]
    fn legacy_properties() {
        let props = base().with_i64("samples_per_second", 1_000_000);
        let (_top, dir, store) = channel(layout::LEGACY_PROPERTIES_FILE, props);

        let meta = parse(&dir, 0, &store).unwrap();
        assert_eq!(meta.sample_rate, 1_000_000.0);
        assert_eq!(meta.sample_rate_numerator, 1_000_000);
        assert_eq!(meta.sample_rate_denominator, 1);
    }

    #[test]
    fn legacy_float_rate() {
        let props = base().with_f64("samples_per_second", 2_500_000.0);
        let (_top, dir, store) = channel(layout::LEGACY_PROPERTIES_FILE, props);

        let meta = parse(&dir, 0, &store).unwrap();
        assert_eq!(meta.sample_rate, 2_500_000.0);
        assert_eq!(meta.rate(), SampleRate::new(2_500_000, 1));
    }

    #[test]
    fn legacy_rate_wins_over_pair() {
        let props = base()
            .with_u64("sample_rate_numerator", 8_000_000)
            .with_u64("sample_rate_denominator", 1)
            .with_i64("samples_per_second", 1_000_000);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let meta = parse(&dir, 0, &store).unwrap();
        assert_eq!(meta.sample_rate, 1_000_000.0);
        assert_eq!(meta.sample_rate_numerator, 1_000_000);
    }

    #[test]
    fn current_file_preferred_over_legacy() {
        let (_top, dir, mut store) = channel(
            layout::PROPERTIES_FILE,
            base()
                .with_u64("sample_rate_numerator", 10)
                .with_u64("sample_rate_denominator", 1),
        );
        File::create(dir.join(layout::LEGACY_PROPERTIES_FILE)).unwrap();
        store.insert(
            dir.join(layout::LEGACY_PROPERTIES_FILE),
            base().with_i64("samples_per_second", 20),
        );

        assert_eq!(parse(&dir, 0, &store).unwrap().sample_rate, 10.0);
    }

    #[test]
    fn version_too_old() {
        let props = MemoryContainer::new()
            .with_str("digital_rf_version", "1.9")
            .with_str("epoch", "not a string type")
            .with_i64("sample_rate_numerator", 1);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let err = parse(&dir, 0, &store).unwrap_err();
        match &err {
            Error::UnsupportedVersion { version, bound, .. } => {
                assert_eq!(version, "1.9");
                assert_eq!(bound.text(), "2.0");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("2.0"));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn version_check_stops_parsing() {
        // The malformed attribute after the version is never looked at
        let props = MemoryContainer::new()
            .with_str("digital_rf_version", "3.0.0")
            .with_str("subdir_cadence_secs", "oops");
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn undecodable_attribute() {
        let props = base().with_str("sample_rate_numerator", "eight million");
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let err = parse(&dir, 0, &store).unwrap_err();
        match &err {
            Error::AttributeReadFailed { name, .. } => assert_eq!(name, "sample_rate_numerator"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn unknown_attributes_are_never_read() {
        let props = base()
            .with_unreadable("uuid_str")
            .with_u64("sample_rate_numerator", 10)
            .with_u64("sample_rate_denominator", 1);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let meta = parse(&dir, 0, &store).unwrap();
        assert_eq!(meta.sample_rate, 10.0);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn unreadable_known_attribute() {
        let props = base()
            .with_unreadable("sample_rate_numerator")
            .with_u64("sample_rate_denominator", 1);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);

        let err = parse(&dir, 0, &store).unwrap_err();
        match &err {
            Error::AttributeReadFailed { name, .. } => assert_eq!(name, "sample_rate_numerator"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn missing_and_invalid_rates() {
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, base());
        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::MissingAttribute {
                name: "sample_rate_numerator",
                ..
            })
        ));

        let props = base().with_u64("sample_rate_numerator", 10);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);
        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::MissingAttribute {
                name: "sample_rate_denominator",
                ..
            })
        ));

        let props = base()
            .with_u64("sample_rate_numerator", 10)
            .with_u64("sample_rate_denominator", 0);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);
        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn missing_version() {
        let props = MemoryContainer::new()
            .with_u64("sample_rate_numerator", 10)
            .with_u64("sample_rate_denominator", 1);
        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, props);
        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::MissingAttribute {
                name: "digital_rf_version",
                ..
            })
        ));
    }

    #[test]
    fn no_properties_file() {
        let top = tempdir().unwrap();
        let store = MemoryStore::new();
        let err = parse(top.path(), 0, &store).unwrap_err();
        assert!(matches!(err, Error::PropertiesNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unopenable_and_empty_containers() {
        let (_top, dir, _) = channel(layout::PROPERTIES_FILE, base());
        let empty_store = MemoryStore::new();
        assert!(matches!(
            parse(&dir, 0, &empty_store),
            Err(Error::ContainerOpenFailed { .. })
        ));

        let (_top, dir, store) = channel(layout::PROPERTIES_FILE, base().with_size(0));
        assert!(matches!(
            parse(&dir, 0, &store),
            Err(Error::EmptyContainer(_))
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn attribute_names() {
        assert_eq!(
            PropertyAttribute::from_name("digital_rf_version"),
            PropertyAttribute::Version
        );
        assert_eq!(
            PropertyAttribute::from_name("version"),
            PropertyAttribute::Version
        );
        assert_eq!(
            PropertyAttribute::from_name("time_description"),
            PropertyAttribute::TimeDescription
        );
        assert_eq!(
            PropertyAttribute::from_name("uuid_str"),
            PropertyAttribute::Unknown
        );
        assert_eq!(
            PropertyAttribute::SamplesPerSecond.name(),
            "samples_per_second"
        );
    }
}
