//! Method names: the keys of every score and path map.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A key in a [`PerFileResult`](super::PerFileResult) map.
///
/// `original`, `GT` and `mine` are reserved and never renamed; every other
/// key is the user-chosen name of a comparison folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodName {
    /// The source images the masks were produced from.
    Original,
    /// The ground-truth masks.
    Gt,
    /// The user's own result set.
    Mine,
    /// A named comparison folder.
    Comparison(String),
}

impl MethodName {
    pub const ORIGINAL: &'static str = "original";
    pub const GT: &'static str = "GT";
    pub const MINE: &'static str = "mine";

    /// Build a comparison key. Reserved spellings resolve to their reserved variant.
    pub fn comparison(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            MethodName::Original => Self::ORIGINAL,
            MethodName::Gt => Self::GT,
            MethodName::Mine => Self::MINE,
            MethodName::Comparison(name) => name,
        }
    }

    /// Whether this key belongs to the invariant base of every request.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, MethodName::Comparison(_))
    }

    /// Returns `true` if `name` would collide with a reserved key.
    pub fn is_reserved_name(name: &str) -> bool {
        matches!(name, Self::ORIGINAL | Self::GT | Self::MINE)
    }
}

impl From<String> for MethodName {
    fn from(name: String) -> Self {
        match name.as_str() {
            Self::ORIGINAL => MethodName::Original,
            Self::GT => MethodName::Gt,
            Self::MINE => MethodName::Mine,
            _ => MethodName::Comparison(name),
        }
    }
}

impl From<&str> for MethodName {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MethodName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MethodName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(MethodName::from)
    }
}
