use std::collections::HashMap;

use crate::{
    LOCUS_MAGIC,
    error::{IndexError, QueryError, Result},
};

/// Strips a leading `chr` prefix from a chromosome label
///
/// The remainder is treated as an opaque label: `chrX`, `X` and `chrchrX`
/// normalize to `X`, `X` and `chrX` respectively.
#[must_use]
pub fn normalize_chrom(label: &str) -> &str {
    label.strip_prefix("chr").unwrap_or(label)
}

/// Combines a chromosome code and a position into a single sortable key
///
/// Positions must be below [`LOCUS_MAGIC`] or keys collide across chromosomes.
/// Out-of-range positions saturate instead of overflowing.
#[must_use]
pub fn encode_locus(chrom_code: u32, position: u64) -> u64 {
    (u64::from(chrom_code) * LOCUS_MAGIC).saturating_add(position)
}

/// Splits a locus code back into its chromosome code and position
#[must_use]
pub fn decode_locus(code: u64) -> (u32, u64) {
    ((code / LOCUS_MAGIC) as u32, code % LOCUS_MAGIC)
}

/// Mapping from normalized chromosome labels to small positive integer codes
///
/// Codes are handed out in first-seen order starting at 1. A map is grown
/// while an index is built and is read-only once the index is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromosomeCodeMap {
    codes: HashMap<String, u32>,

    /// Labels in code order (`labels[i]` has code `i + 1`)
    labels: Vec<String>,
}
impl ChromosomeCodeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a map from `(label, code)` pairs as stored in a sidecar
    ///
    /// The pairs must carry codes `1..=n` in order.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let mut map = Self::new();
        for (label, code) in pairs {
            let expected = map.labels.len() as u32 + 1;
            if code != expected {
                return Err(IndexError::InvalidMetadata(format!(
                    "chromosome '{label}' has code {code}, expected {expected}"
                ))
                .into());
            }
            if map.codes.insert(label.clone(), code).is_some() {
                return Err(IndexError::InvalidMetadata(format!(
                    "chromosome '{label}' is listed twice"
                ))
                .into());
            }
            map.labels.push(label);
        }
        Ok(map)
    }

    /// Returns the code of a chromosome, normalizing the label first
    #[must_use]
    pub fn get(&self, label: &str) -> Option<u32> {
        self.codes.get(normalize_chrom(label)).copied()
    }

    /// Returns the code of a chromosome, allocating the next one if unseen
    pub fn get_or_insert(&mut self, label: &str) -> u32 {
        let label = normalize_chrom(label);
        if let Some(&code) = self.codes.get(label) {
            return code;
        }
        let code = self.labels.len() as u32 + 1;
        self.codes.insert(label.to_string(), code);
        self.labels.push(label.to_string());
        code
    }

    /// Returns the label registered under `code`
    #[must_use]
    pub fn label(&self, code: u32) -> Option<&str> {
        let idx = (code as usize).checked_sub(1)?;
        self.labels.get(idx).map(String::as_str)
    }

    /// Encodes a locus at build time, allocating a chromosome code if needed
    pub fn encode_or_insert(&mut self, chrom: &str, position: u64) -> u64 {
        encode_locus(self.get_or_insert(chrom), position)
    }

    /// Encodes a locus at query time against the frozen map
    pub fn encode(&self, chrom: &str, position: u64) -> Result<u64> {
        match self.get(chrom) {
            Some(code) => Ok(encode_locus(code, position)),
            None => Err(QueryError::ChromosomeNotIndexed(chrom.to_string()).into()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates over `(label, code)` pairs in code order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx as u32 + 1))
    }
}
