//! Section Index (spec section 4.6): O(1) lookups built once after parsing.
//!
//! Two tables: top-level section name -> subtree, and (for any section)
//! entry key -> that entry's value. Both are immutable after construction,
//! matching the session lifecycle invariant in spec section 3 ("the tree is
//! immutable after build").

use crate::value::Value;
use indexmap::IndexMap;

/// Built once from the parsed document root. `sections` preserves source
/// order (an `IndexMap` rather than a `HashMap`) so `iter_section` streams
/// entries in the order spec section 4.6 requires.
pub struct SectionIndex {
    sections: IndexMap<String, IndexMap<String, Value>>,
}

impl SectionIndex {
    /// Builds the index from the parsed document root. The root is always
    /// an object of `section_name = { entry_id = { ... }, ... }` or
    /// `section_name = <scalar>` assignments (e.g. `meta`'s fields are
    /// themselves scalars/objects, not keyed by integer id).
    pub fn build(root: &Value) -> Self {
        let mut sections = IndexMap::new();
        if let Some(entries) = root.as_object() {
            for entry in entries {
                let section_entries = sections
                    .entry(entry.key.clone())
                    .or_insert_with(IndexMap::new);
                if let Some(children) = entry.value.as_object() {
                    for child in children {
                        section_entries.insert(child.key.clone(), child.value.clone());
                    }
                } else {
                    // A section whose own value is a scalar (e.g. meta's
                    // top-level is itself the fields object, handled above;
                    // but guard the scalar case so build() never panics on
                    // an unusual save variant).
                    section_entries.insert(String::new(), entry.value.clone());
                }
            }
        }
        Self { sections }
    }

    /// The raw top-level value for a section, if the document had one under
    /// that exact name at the root (used by `extract_sections`, which needs
    /// the section's full subtree rather than the per-entry table).
    pub fn section_value<'a>(&self, root: &'a Value, name: &str) -> Option<&'a Value> {
        root.as_object()?.iter().find(|e| e.key == name).map(|e| &e.value)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|s| s.as_str())
    }

    /// O(1) lookup of one entry by key within a section.
    pub fn get_entry(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.get(key)
    }

    /// All entries of a section, in source order — backs `iter_section`.
    pub fn iter_entries(&self, section: &str) -> impl Iterator<Item = (&str, &Value)> {
        self.sections
            .get(section)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn entry_count(&self, section: &str) -> usize {
        self.sections.get(section).map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn builds_section_and_entry_tables() {
        let doc = parse_document("country={ 1={ name=\"A\" } 2={ name=\"B\" } }").unwrap();
        let idx = SectionIndex::build(&doc);
        assert!(idx.has_section("country"));
        assert_eq!(idx.entry_count("country"), 2);
        assert!(idx.get_entry("country", "1").is_some());
        assert!(idx.get_entry("country", "99").is_none());
    }

    #[test]
    fn unknown_section_has_zero_entries() {
        let doc = parse_document("country={ 1={ } }").unwrap();
        let idx = SectionIndex::build(&doc);
        assert!(!idx.has_section("galaxy"));
        assert_eq!(idx.entry_count("galaxy"), 0);
    }

    #[test]
    fn iter_entries_preserves_source_order() {
        let doc = parse_document("fleet={ 3={ } 1={ } 2={ } }").unwrap();
        let idx = SectionIndex::build(&doc);
        let keys: Vec<&str> = idx.iter_entries("fleet").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["3", "1", "2"]);
    }
}
