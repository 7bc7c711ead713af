//! Path hashing and cache key derivation.
//!
//! Keys are derived from plaintext paths with a 32-bit rolling hash rendered
//! in base 36. The hash is not collision resistant; every lookup therefore
//! also compares the stored plaintext paths.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::CacheError;
use crate::constants::GT_INDEX_FILE;

const SEPARATOR: char = '_';
const EXTENSION: &str = ".json";
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash a string: `h = h * 31 + c` over UTF-16 code units with 32-bit
/// wrapping arithmetic, absolute value in base 36.
///
/// Stable across processes and platforms.
pub fn hash_str(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
}

/// Hash a filesystem path by its (lossy) string form.
pub fn hash_path(path: &Path) -> String {
    hash_str(&path.to_string_lossy())
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn is_hash(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Identity of one (GT folder, comparison folder) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lookup key into the GT index.
    pub gt_hash: String,
    pub comparison_hash: String,
}

impl CacheKey {
    pub fn derive(gt: &Path, comparison: &Path) -> Self {
        Self {
            gt_hash: hash_path(gt),
            comparison_hash: hash_path(comparison),
        }
    }

    /// File name of the entry document: `<gtHash>_<comparisonHash>.json`.
    pub fn file_name(&self) -> String {
        format!("{}{SEPARATOR}{}{EXTENSION}", self.gt_hash, self.comparison_hash)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    /// Parse an entry file name back into its key.
    fn from_str(file_name: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheError::InvalidKey(file_name.to_string());
        if file_name == GT_INDEX_FILE {
            return Err(invalid());
        }
        let stem = file_name.strip_suffix(EXTENSION).ok_or_else(invalid)?;
        let (gt_hash, comparison_hash) = stem.split_once(SEPARATOR).ok_or_else(invalid)?;
        if !is_hash(gt_hash) || !is_hash(comparison_hash) {
            return Err(invalid());
        }
        Ok(Self {
            gt_hash: gt_hash.to_string(),
            comparison_hash: comparison_hash.to_string(),
        })
    }
}
