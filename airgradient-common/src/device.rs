//! Device identifiers.

use std::fmt;

/// Prefix devices put in front of their serial in request paths.
pub const DEVICE_ID_PREFIX: &str = "airgradient:";

/// Identifier of a sensor, used as the `mac` label on every series.
///
/// Any string is accepted, including the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create an identifier from an already-stripped value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from the `{mac}` path segment.
    ///
    /// A leading `airgradient:` is removed once; the rest is kept verbatim.
    pub fn from_path_segment(segment: &str) -> Self {
        let id = segment.strip_prefix(DEVICE_ID_PREFIX).unwrap_or(segment);
        Self(id.to_string())
    }

    /// The label value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
