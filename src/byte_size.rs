use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::shared_types::ByteCount;

const KB: ByteCount = 1000;
const KIB: ByteCount = 1024;

/// Unit suffixes accepted after the digits. Matching is exact and case-sensitive.
const UNITS: &[(&str, ByteCount)] = &[
    ("B", 1),
    ("KB", KB),
    ("K", KIB),
    ("KiB", KIB),
    ("MB", KB * KB),
    ("M", KIB * KIB),
    ("MiB", KIB * KIB),
    ("GB", KB * KB * KB),
    ("G", KIB * KIB * KIB),
    ("GiB", KIB * KIB * KIB),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseByteSizeError {
    #[error("Invalid format: expected digits followed by a unit, e.g. 10MiB")]
    InvalidFormat,
    #[error("Invalid unit '{0}' (expected one of B, KB, K, KiB, MB, M, MiB, GB, G, GiB)")]
    InvalidUnit(String),
    #[error("size does not fit in {} bits", ByteCount::BITS)]
    Overflow,
}

/// A count of bytes parsed from strings such as `"512K"` or `"10MiB"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ByteSize(ByteCount);

impl ByteSize {
    pub(crate) const fn new(bytes: ByteCount) -> Self {
        Self(bytes)
    }

    pub(crate) const fn bytes(self) -> ByteCount {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = ParseByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

fn unit_multiplier(unit: &str) -> Option<ByteCount> {
    UNITS
        .iter()
        .find(|(token, _)| *token == unit)
        .map(|&(_, multiplier)| multiplier)
}

/// Parses `<digits><unit>` into a byte count.
///
/// The digit run must come first and be non-empty; everything after it is the
/// unit token, so `"10 MB"` is rejected for its unit `" MB"`.
pub(crate) fn parse(input: &str) -> Result<ByteSize, ParseByteSizeError> {
    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(digits_end);
    if digits.is_empty() {
        return Err(ParseByteSizeError::InvalidFormat);
    }

    let multiplier =
        unit_multiplier(unit).ok_or_else(|| ParseByteSizeError::InvalidUnit(unit.to_owned()))?;
    // only overflow can fail here, the slice is all ASCII digits
    let magnitude: ByteCount = digits
        .parse()
        .map_err(|_| ParseByteSizeError::Overflow)?;

    magnitude
        .checked_mul(multiplier)
        .map(ByteSize)
        .ok_or(ParseByteSizeError::Overflow)
}
