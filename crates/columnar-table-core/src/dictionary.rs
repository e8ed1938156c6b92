//! Dictionary encoding for short-text columns.
//!
//! Low-cardinality text is stored as a lookup table of distinct strings plus
//! one fixed-width integer key per row. The key width is chosen once, from the
//! distinct-value count, and carried as data so both sides of the codec agree
//! without any type inspection:
//!
//! - up to 256 distinct values: 1-byte keys
//! - up to 65 536 distinct values: 2-byte keys
//! - up to 2^32 distinct values: 4-byte keys
//!
//! Keys are dense, start at 0, and are assigned in first-occurrence order, so
//! building a dictionary from the same values always yields the same bytes on
//! disk. Cardinality beyond the 4-byte key space is a hard format limit, not a
//! silent overflow.

use std::collections::HashMap;

use snafu::{Backtrace, prelude::*};

/// Errors produced while building a dictionary.
#[derive(Debug, Snafu)]
pub enum DictionaryError {
    /// The column's distinct-value count exceeds the widest key type.
    #[snafu(display(
        "column has {distinct} distinct values, more than the 4-byte key space can address"
    ))]
    UnsupportedCardinality {
        /// The distinct-value count that overflowed the key space.
        distinct: u64,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Fixed key width of a dictionary, chosen from cardinality at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    /// 1-byte keys, cardinality <= 256.
    One,
    /// 2-byte keys, cardinality <= 65 536.
    Two,
    /// 4-byte keys, cardinality <= 2^32.
    Four,
}

impl KeyWidth {
    /// Pick the narrowest width that can address `distinct` dense keys.
    ///
    /// # Errors
    /// Returns [`DictionaryError::UnsupportedCardinality`] when even 4-byte
    /// keys cannot address the value set.
    pub fn for_cardinality(distinct: usize) -> Result<KeyWidth, DictionaryError> {
        let distinct = distinct as u64;
        if distinct <= 1 << 8 {
            Ok(KeyWidth::One)
        } else if distinct <= 1 << 16 {
            Ok(KeyWidth::Two)
        } else if distinct <= u32::MAX as u64 {
            // The distinct count itself is framed as a u32, so the ceiling is
            // u32::MAX entries rather than the full 2^32 key space.
            Ok(KeyWidth::Four)
        } else {
            UnsupportedCardinalitySnafu { distinct }.fail()
        }
    }

    /// Size of one encoded key in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            KeyWidth::One => 1,
            KeyWidth::Two => 2,
            KeyWidth::Four => 4,
        }
    }
}

/// A string column reduced to distinct entries plus per-row keys.
///
/// `entries[k]` is the string for key `k`; `keys` holds one key per row in
/// row order. The mapping is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    width: KeyWidth,
    entries: Vec<String>,
    keys: Vec<u32>,
}

impl Dictionary {
    /// Build a dictionary over a sequence of row values.
    ///
    /// # Errors
    /// Returns [`DictionaryError::UnsupportedCardinality`] when the distinct
    /// count exceeds the 4-byte key space.
    pub fn build(values: &[String]) -> Result<Dictionary, DictionaryError> {
        let mut lookup: HashMap<&str, u32> = HashMap::new();
        let mut entries: Vec<String> = Vec::new();
        let mut keys: Vec<u32> = Vec::with_capacity(values.len());

        for value in values {
            let key = match lookup.get(value.as_str()) {
                Some(&key) => key,
                None => {
                    // Check the ceiling before assigning the next dense key.
                    if entries.len() >= u32::MAX as usize {
                        return UnsupportedCardinalitySnafu {
                            distinct: entries.len() as u64 + 1,
                        }
                        .fail();
                    }
                    let key = entries.len() as u32;
                    lookup.insert(value.as_str(), key);
                    entries.push(value.clone());
                    key
                }
            };
            keys.push(key);
        }

        let width = KeyWidth::for_cardinality(entries.len())?;
        Ok(Dictionary {
            width,
            entries,
            keys,
        })
    }

    /// The key width selected for this dictionary.
    pub fn width(&self) -> KeyWidth {
        self.width
    }

    /// Distinct strings in key order (`entries[k]` belongs to key `k`).
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Per-row keys in row order.
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// Reconstruct the original row values from the mapping.
    pub fn decode(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|&k| self.entries[k as usize].clone())
            .collect()
    }
}
