use std::fmt;

/// Format version written by this package, the newest we can read
pub const DIGITAL_RF_VERSION: &str = "2.6.11";
/// Oldest format version we can read
pub const MIN_SUPPORTED_VERSION: &str = "2.0";

/// A dotted `major.minor.patch` version. Missing components count as zero, and
/// each component stops at its first non-digit, so `2.6.0b1` reads as 2.6.0.
/// Compared component-wise, major first.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VersionBound {
    Minimum,
    Maximum,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> FormatVersion {
        FormatVersion {
            major,
            minor,
            patch,
        }
    }

    /// None if the major component holds no digits at all
    pub fn parse(text: &str) -> Option<FormatVersion> {
        let mut parts = text.trim().split('.').map(leading_number);
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(FormatVersion::new(major, minor, patch))
    }

    pub const fn minimum_supported() -> FormatVersion {
        MINIMUM
    }

    pub const fn maximum_supported() -> FormatVersion {
        MAXIMUM
    }

    /// Which supported bound `self` falls outside of, if any
    pub fn violated_bound(&self) -> Option<VersionBound> {
        if *self < FormatVersion::minimum_supported() {
            Some(VersionBound::Minimum)
        } else if *self > FormatVersion::maximum_supported() {
            Some(VersionBound::Maximum)
        } else {
            None
        }
    }
}

const MINIMUM: FormatVersion = parse_constant(MIN_SUPPORTED_VERSION);
const MAXIMUM: FormatVersion = parse_constant(DIGITAL_RF_VERSION);

/// `parse` for the well-formed version constants above, usable in const context
const fn parse_constant(text: &str) -> FormatVersion {
    let bytes = text.as_bytes();
    let mut parts = [0u32; 3];
    let mut part = 0;
    let mut i = 0;
    while i < bytes.len() && part < parts.len() {
        match bytes[i] {
            b'.' => part += 1,
            digit @ b'0'..=b'9' => parts[part] = parts[part] * 10 + (digit - b'0') as u32,
            _ => {}
        }
        i += 1;
    }
    FormatVersion::new(parts[0], parts[1], parts[2])
}

fn leading_number(part: &str) -> Option<u32> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl VersionBound {
    pub fn text(&self) -> &'static str {
        match self {
            VersionBound::Minimum => MIN_SUPPORTED_VERSION,
            VersionBound::Maximum => DIGITAL_RF_VERSION,
        }
    }
}

#[cfg(test)]
mod version_tests {
    use super::*;

    #[test]
    fn parse_dotted_versions() {
        assert_eq!(
            FormatVersion::parse("2.6.11"),
            Some(FormatVersion::new(2, 6, 11))
        );
        assert_eq!(
            FormatVersion::parse("2.0"),
            Some(FormatVersion::new(2, 0, 0))
        );
        assert_eq!(FormatVersion::parse("3"), Some(FormatVersion::new(3, 0, 0)));
        assert_eq!(
            FormatVersion::parse("2.6.0b1"),
            Some(FormatVersion::new(2, 6, 0))
        );
        assert_eq!(
            FormatVersion::parse(" 2.5.4 "),
            Some(FormatVersion::new(2, 5, 4))
        );
        assert_eq!(FormatVersion::parse("v2.0"), None);
        assert_eq!(FormatVersion::parse(""), None);
    }

    #[test]
    fn compare_numerically_not_lexically() {
        let a = FormatVersion::parse("2.10.0").unwrap();
        let b = FormatVersion::parse("2.9.9").unwrap();
        assert!(a > b);
        assert_eq!(FormatVersion::parse("2.0"), FormatVersion::parse("2.0.0"));
    }

    #[test]
    fn supported_range() {
        assert_eq!(
            FormatVersion::parse("1.9").unwrap().violated_bound(),
            Some(VersionBound::Minimum)
        );
        assert_eq!(FormatVersion::parse("2.0").unwrap().violated_bound(), None);
        assert_eq!(
            FormatVersion::parse(DIGITAL_RF_VERSION).unwrap().violated_bound(),
            None
        );
        assert_eq!(
            FormatVersion::parse("2.6.12").unwrap().violated_bound(),
            Some(VersionBound::Maximum)
        );
        assert_eq!(
            FormatVersion::parse("3.0").unwrap().violated_bound(),
            Some(VersionBound::Maximum)
        );
    }

    #[test]
    fn bounds_match_their_constants() {
        assert_eq!(
            FormatVersion::parse(MIN_SUPPORTED_VERSION),
            Some(FormatVersion::minimum_supported())
        );
        assert_eq!(
            FormatVersion::parse(DIGITAL_RF_VERSION),
            Some(FormatVersion::maximum_supported())
        );
        assert_eq!(VersionBound::Minimum.text(), "2.0");
        assert_eq!(
            FormatVersion::maximum_supported(),
            FormatVersion::new(2, 6, 11)
        );
        assert_eq!(parse_constant("10.20.30"), FormatVersion::new(10, 20, 30));
        assert_eq!(parse_constant("2.0"), FormatVersion::new(2, 0, 0));
    }
}
