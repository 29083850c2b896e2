//! Validated newtypes that cannot be constructed with invalid data.
//!
//! These wrap the handful of string/numeric values that cross the protocol
//! boundary (section names, entry keys, op names, stream batch sizes) so
//! the query engine never has to re-check them deep in a match arm.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A top-level section name as it appears in a request (`extract_sections`,
/// `iter_section`, ...). Unknown names are still valid — the closed
/// enumeration in spec section 3 only constrains the *known* sections the
/// query engine gives special treatment to; this type just rejects the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedSectionName {
    inner: String,
}

impl ValidatedSectionName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        ensure!(!name.is_empty(), "section name cannot be empty");
        ensure!(
            name.bytes().all(|b| b != b'\n' && b != b'\r'),
            "section name cannot contain line breaks"
        );
        Ok(Self { inner: name })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedSectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// An entry key (the integer id form a section is keyed by, kept as an
/// opaque string per spec section 3: "internal representation should
/// preserve them as opaque identifiers").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedEntryKey {
    inner: String,
}

impl ValidatedEntryKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        ensure!(!key.is_empty(), "entry key cannot be empty");
        Ok(Self { inner: key })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// The `op` field of a request, validated against the closed operation set
/// in spec section 4.5 before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpName {
    ExtractSections,
    IterSection,
    GetEntry,
    GetEntries,
    CountKeys,
    ContainsTokens,
    ContainsKv,
    GetCountrySummaries,
    GetDuplicateValues,
    GetEntryText,
    Multi,
    Close,
}

impl ValidatedOpName {
    pub fn parse(raw: &str) -> Result<OpName> {
        Ok(match raw {
            "extract_sections" => OpName::ExtractSections,
            "iter_section" => OpName::IterSection,
            "get_entry" => OpName::GetEntry,
            "get_entries" => OpName::GetEntries,
            "count_keys" => OpName::CountKeys,
            "contains_tokens" => OpName::ContainsTokens,
            "contains_kv" => OpName::ContainsKv,
            "get_country_summaries" => OpName::GetCountrySummaries,
            "get_duplicate_values" => OpName::GetDuplicateValues,
            "get_entry_text" => OpName::GetEntryText,
            "multi" => OpName::Multi,
            "close" => OpName::Close,
            other => anyhow::bail!("unknown op '{}'", other),
        })
    }
}

/// Namespace holder so `ValidatedOpName::parse` reads like the rest of this
/// module's `TypeName::new`/`parse` constructors without a matching value type.
pub struct ValidatedOpName;

/// A `batch_size` for `iter_section`: must be positive; the server batches
/// entries into `{entries: [...]}` frames when greater than 1, or emits
/// `{entry: ...}` frames one at a time when exactly 1 (spec section 4.5 #2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedBatchSize {
    inner: usize,
}

impl ValidatedBatchSize {
    pub const DEFAULT: usize = 1;

    pub fn new(size: usize) -> Result<Self> {
        ensure!(size > 0, "batch_size must be greater than zero");
        Ok(Self { inner: size })
    }

    pub fn get(&self) -> usize {
        self.inner
    }
}

impl Default for ValidatedBatchSize {
    fn default() -> Self {
        Self {
            inner: Self::DEFAULT,
        }
    }
}

/// The sentinel Stellaris uses for "null reference" (spec section 3).
pub const NULL_REF_SENTINEL: u32 = 4_294_967_295;

/// True if a raw reference-typed scalar denotes "no reference" — either the
/// bare identifier `none` or the sentinel integer, per the shared helper
/// called for in SPEC_FULL's supplement to the query engine.
pub fn is_null_ref(raw: &str) -> bool {
    raw == "none" || raw == "4294967295"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_name_rejects_empty() {
        assert!(ValidatedSectionName::new("country").is_ok());
        assert!(ValidatedSectionName::new("").is_err());
    }

    #[test]
    fn op_name_parses_known_ops() {
        assert_eq!(
            ValidatedOpName::parse("get_entry").unwrap(),
            OpName::GetEntry
        );
        assert!(ValidatedOpName::parse("frobnicate").is_err());
    }

    #[test]
    fn batch_size_rejects_zero() {
        assert!(ValidatedBatchSize::new(0).is_err());
        assert!(ValidatedBatchSize::new(50).is_ok());
    }

    #[test]
    fn null_ref_recognizes_both_forms() {
        assert!(is_null_ref("none"));
        assert!(is_null_ref("4294967295"));
        assert!(!is_null_ref("42"));
    }
}
