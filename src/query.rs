//! Query Engine (spec section 4.5): the twelve supported operations.
//!
//! Op surface grounded directly on `rust_bridge.py`'s method list
//! (`extract_sections`, `iter_section`, `get_entry`, `get_entries`,
//! `count_keys`, `contains_tokens`, `contains_kv`,
//! `get_country_summaries`, `get_duplicate_values`, `get_entry_text`,
//! `multi`, `close`). Fleet categorization for `get_country_summaries`
//! follows `stellaris_save_extractor/military.py`'s rule: `station=yes` or
//! `civilian=yes` skip the fleet; otherwise `military_power > 100` is
//! military, everything else civilian.

use crate::index::SectionIndex;
use crate::types::is_null_ref;
use crate::value::Value;
use serde_json::{json, Value as Json};
use std::collections::HashMap;

/// Owns the parsed tree, the section index, and the raw source text needed
/// by `get_entry_text`. Built once per session and immutable thereafter.
pub struct QueryEngine {
    root: Value,
    index: SectionIndex,
    meta_text: String,
    gamestate_text: String,
}

impl QueryEngine {
    pub fn new(root: Value, meta_text: String, gamestate_text: String) -> Self {
        let index = SectionIndex::build(&root);
        Self {
            root,
            index,
            meta_text,
            gamestate_text,
        }
    }

    /// `extract_sections {sections}` — unknown names map to an empty
    /// object, never an error.
    pub fn extract_sections(&self, sections: &[String]) -> Json {
        let mut out = serde_json::Map::new();
        for name in sections {
            let value = self
                .index
                .section_value(&self.root, name)
                .cloned()
                .unwrap_or_else(|| Value::Object(Vec::new()));
            out.insert(name.clone(), serde_json::to_value(&value).unwrap_or(Json::Null));
        }
        Json::Object(out)
    }

    /// `iter_section` backing iterator — the server owns framing and
    /// batching; this just hands back entries in source order.
    pub fn iter_section(&self, section: &str) -> impl Iterator<Item = (&str, &Value)> {
        self.index.iter_entries(section)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.index.has_section(section)
    }

    /// Raw `Value` for one entry, for callers (the signals builder) that
    /// need to walk the tree directly instead of through a JSON projection.
    pub fn get_entry_value(&self, section: &str, key: &str) -> Option<&Value> {
        self.index.get_entry(section, key)
    }

    /// The full subtree assigned to a top-level section name, if present.
    pub fn section_root(&self, name: &str) -> Option<&Value> {
        self.index.section_value(&self.root, name)
    }

    /// `get_entry {section, key}` — `found: false` when absent, never an
    /// error: an absent key is a normal outcome, not a malformed request.
    pub fn get_entry(&self, section: &str, key: &str) -> Json {
        match self.index.get_entry(section, key) {
            Some(value) => json!({ "found": true, "entry": value }),
            None => json!({ "found": false }),
        }
    }

    /// `get_entries {section, keys, fields?}` — missing keys are silently
    /// omitted; when `fields` is given, each result is a projection rather
    /// than the full subtree.
    pub fn get_entries(&self, section: &str, keys: &[String], fields: Option<&[String]>) -> Json {
        let mut results = Vec::new();
        for key in keys {
            let Some(value) = self.index.get_entry(section, key) else {
                continue;
            };
            let entry = match fields {
                Some(fields) => {
                    let mut projected = serde_json::Map::new();
                    projected.insert("key".to_string(), Json::String(key.clone()));
                    for field in fields {
                        if let Some(field_value) = value.get(field) {
                            projected.insert(
                                field.clone(),
                                serde_json::to_value(field_value).unwrap_or(Json::Null),
                            );
                        }
                    }
                    Json::Object(projected)
                }
                None => json!({ "key": key, "value": value }),
            };
            results.push(entry);
        }
        json!({ "entries": results })
    }

    /// `count_keys {keys}` — full-tree traversal counting occurrences of
    /// each named key anywhere in the document.
    pub fn count_keys(&self, keys: &[String]) -> Json {
        let mut counts: HashMap<&str, u64> = keys.iter().map(|k| (k.as_str(), 0)).collect();
        count_keys_recursive(&self.root, &mut counts);
        let counts: serde_json::Map<String, Json> = counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), Json::from(v)))
            .collect();
        json!({ "counts": counts })
    }

    /// `contains_tokens {tokens}` — plain multi-pattern substring scan over
    /// the raw source text. No aho-corasick-class crate appears anywhere in
    /// the retrieved corpus, so this is intentionally a direct
    /// `str::contains` scan rather than an invented dependency.
    pub fn contains_tokens(&self, tokens: &[String]) -> Json {
        let combined_len = self.meta_text.len() + self.gamestate_text.len();
        let haystack: String = if combined_len == 0 {
            String::new()
        } else {
            format!("{}{}", self.meta_text, self.gamestate_text)
        };
        let matches: serde_json::Map<String, Json> = tokens
            .iter()
            .map(|token| (token.clone(), Json::Bool(haystack.contains(token.as_str()))))
            .collect();
        json!({ "matches": matches })
    }

    /// `contains_kv {pairs}` — structural, whitespace-insensitive
    /// key=value existence check over the parsed tree (not the raw text).
    pub fn contains_kv(&self, pairs: &[(String, String)]) -> Json {
        let mut matches = serde_json::Map::new();
        for (key, value) in pairs {
            let found = tree_contains_kv(&self.root, key, value);
            matches.insert(format!("{key}={value}"), Json::Bool(found));
        }
        json!({ "matches": matches })
    }

    /// `get_country_summaries {fields}` — skips entries whose value is the
    /// sentinel `none` identifier.
    pub fn get_country_summaries(&self, fields: &[String]) -> Json {
        let mut countries = Vec::new();
        for (id, value) in self.index.iter_entries("country") {
            if value.is_none_identifier() {
                continue;
            }
            let mut entry = serde_json::Map::new();
            entry.insert("id".to_string(), Json::String(id.to_string()));
            for field in fields {
                if let Some(field_value) = value.get(field) {
                    entry.insert(field.clone(), serde_json::to_value(field_value).unwrap_or(Json::Null));
                }
            }
            countries.push(Json::Object(entry));
        }
        json!({ "countries": countries })
    }

    /// `get_duplicate_values {section, key, field}` — every occurrence of
    /// `field` inside `section[key]`, in source order.
    pub fn get_duplicate_values(&self, section: &str, key: &str, field: &str) -> Json {
        let values: Vec<Json> = self
            .index
            .get_entry(section, key)
            .map(|entry| {
                entry
                    .all_values_for_key(field)
                    .into_iter()
                    .map(|v| serde_json::to_value(v).unwrap_or(Json::Null))
                    .collect()
            })
            .unwrap_or_default();
        json!({ "values": values })
    }

    /// `get_entry_text {section, key}` — the raw substring spanning that
    /// entry's block in the original text. The parsed tree carries no byte
    /// spans (spec section 3 models values, not source ranges), so this
    /// re-scans the raw text with brace matching the way the Python
    /// original's own text-scanning routines do for composition queries.
    pub fn get_entry_text(&self, section: &str, key: &str) -> Json {
        for text in [&self.gamestate_text, &self.meta_text] {
            if let Some(span) = find_entry_span(text, section, key) {
                return json!({ "found": true, "text": span });
            }
        }
        json!({ "found": false })
    }
}

/// Dispatch surface for the session server (spec section 9): the server
/// holds sessions behind `dyn contracts::QueryEngine`, not the concrete
/// struct, so swapping in a test double never touches its call sites.
impl crate::contracts::QueryEngine for QueryEngine {
    fn get_entry(&self, section: &str, key: &str) -> Option<&Value> {
        self.get_entry_value(section, key)
    }

    fn iter_section(&self, section: &str) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.index.iter_entries(section))
    }

    fn has_section(&self, section: &str) -> bool {
        self.index.has_section(section)
    }
}

fn count_keys_recursive<'a>(value: &'a Value, counts: &mut HashMap<&'a str, u64>) {
    match value {
        Value::Object(entries) => {
            for entry in entries {
                if let Some(count) = counts.get_mut(entry.key.as_str()) {
                    *count += 1;
                }
                count_keys_recursive(&entry.value, counts);
            }
        }
        Value::List(items) => {
            for item in items {
                count_keys_recursive(item, counts);
            }
        }
        Value::Scalar(_) => {}
    }
}

fn tree_contains_kv(value: &Value, key: &str, expected: &str) -> bool {
    match value {
        Value::Object(entries) => entries.iter().any(|entry| {
            if entry.key == key {
                if let Some(scalar) = entry.value.as_scalar() {
                    if normalize_whitespace(&scalar.as_text()) == normalize_whitespace(expected) {
                        return true;
                    }
                }
            }
            tree_contains_kv(&entry.value, key, expected)
        }),
        Value::List(items) => items.iter().any(|item| tree_contains_kv(item, key, expected)),
        Value::Scalar(_) => false,
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds `section={ ... key={ ... } ... }`'s inner block text via brace
/// matching over raw bytes. Returns `None` if either the section or the
/// key is not found as a block-valued entry.
fn find_entry_span<'a>(text: &'a str, section: &str, key: &str) -> Option<&'a str> {
    let section_span = find_block_span(text, section)?;
    find_block_span(section_span, key)
}

fn find_block_span<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let needle_owned = format!("{name}=");
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(&needle_owned) {
        let match_start = search_from + rel;
        let after_name = match_start + needle_owned.len();
        let mut cursor = after_name;
        let bytes = text.as_bytes();
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if bytes.get(cursor) == Some(&b'{') {
            if let Some(end) = find_matching_brace(text, cursor) {
                return Some(&text[cursor..=end]);
            }
        }
        search_from = after_name;
    }
    None
}

fn find_matching_brace(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = open_idx;
    let mut in_string = false;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Reference check the server uses for `get_entry`'s sentinel-ambiguity
/// note: a `"none"` entry value and an actually-absent key both need
/// disambiguation by the caller, per spec section 4.5 #3.
pub fn entry_is_null_reference(value: &Value) -> bool {
    value
        .as_scalar()
        .map(|s| is_null_ref(&s.as_text()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    fn engine(gamestate: &str) -> QueryEngine {
        let root = parse_document(gamestate).unwrap();
        QueryEngine::new(root, String::new(), gamestate.to_string())
    }

    #[test]
    fn extract_sections_unknown_name_is_empty_object() {
        let qe = engine("country={ 1={ } }");
        let result = qe.extract_sections(&["galaxy".to_string()]);
        assert_eq!(result["galaxy"], json!({}));
    }

    #[test]
    fn get_entry_reports_found() {
        let qe = engine(r#"country={ 1={ name="Terran Federation" } }"#);
        let found = qe.get_entry("country", "1");
        assert_eq!(found["found"], json!(true));
        let missing = qe.get_entry("country", "99");
        assert_eq!(missing["found"], json!(false));
    }

    #[test]
    fn get_duplicate_values_returns_all_occurrences() {
        let qe = engine(
            r#"leaders={ 1={ traits="trait_resilient" traits="trait_resilient" traits="trait_carefree" } }"#,
        );
        let result = qe.get_duplicate_values("leaders", "1", "traits");
        assert_eq!(
            result["values"],
            json!(["trait_resilient", "trait_resilient", "trait_carefree"])
        );
    }

    #[test]
    fn count_keys_counts_nested_occurrences() {
        let qe = engine("a={ traits=1 b={ traits=2 } } c={ traits=3 }");
        let result = qe.count_keys(&["traits".to_string()]);
        assert_eq!(result["counts"]["traits"], json!(3));
    }

    #[test]
    fn contains_tokens_scans_raw_text() {
        let qe = engine(r#"country={ 1={ name="Terran Federation" } }"#);
        let result = qe.contains_tokens(&["Terran".to_string(), "Klingon".to_string()]);
        assert_eq!(result["matches"]["Terran"], json!(true));
        assert_eq!(result["matches"]["Klingon"], json!(false));
    }

    #[test]
    fn contains_kv_is_whitespace_insensitive() {
        let qe = engine("a={ station = yes }");
        let result = qe.contains_kv(&[("station".to_string(), "yes".to_string())]);
        assert_eq!(result["matches"]["station=yes"], json!(true));
    }

    #[test]
    fn country_summaries_skip_none_entries() {
        let qe = engine(r#"country={ 1={ name="Alpha" } 2=none }"#);
        let result = qe.get_country_summaries(&["name".to_string()]);
        let countries = result["countries"].as_array().unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0]["id"], json!("1"));
    }

    #[test]
    fn get_entry_text_returns_raw_block_span() {
        let qe = engine("country={ 1={ name=\"Alpha\" } }");
        let result = qe.get_entry_text("country", "1");
        assert_eq!(result["found"], json!(true));
        assert!(result["text"].as_str().unwrap().contains("name=\"Alpha\""));
    }

    #[test]
    fn get_entry_text_missing_entry_not_found() {
        let qe = engine("country={ 1={ } }");
        let result = qe.get_entry_text("country", "99");
        assert_eq!(result["found"], json!(false));
    }
}
