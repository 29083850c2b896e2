//! Signals Builder (spec section 4.9): assembles the **SnapshotSignals**
//! document from a query engine, one sub-extractor per closed-set topic.
//!
//! Each sub-extractor is grounded on the matching `_extract_*_signals`
//! function in `original_source/backend/core/signals.py` and is a pure
//! function of the query engine — same save, same sub-extractor output,
//! which is what lets a caller diff successive snapshots (spec section
//! 4.9's "exact field shapes are fixed... adding, removing, or renaming a
//! field is a `format_version` bump").

mod diplomacy;
mod economy;
mod galaxy;
mod geography;
mod leaders;
mod subjects;
mod wars;

use crate::query::QueryEngine;
use crate::types::is_null_ref;
use crate::value::Value;
use serde_json::{json, Value as Json};

/// Bumped whenever a sub-extractor's field set changes shape.
pub const FORMAT_VERSION: u32 = 1;

pub struct SignalsBuilder<'a> {
    engine: &'a QueryEngine,
}

impl<'a> SignalsBuilder<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self { engine }
    }

    /// Builds the full SnapshotSignals document (spec section 6.2).
    /// `generated_at` is passed in rather than read from the system clock so
    /// the builder itself stays a pure function of the query engine.
    pub fn build(&self, generated_at: chrono::DateTime<chrono::Utc>) -> Json {
        let player_id = self.player_id();

        json!({
            "format_version": FORMAT_VERSION,
            "generated_at": generated_at.to_rfc3339(),
            "player_id": player_id,
            "leaders": leaders::extract(self.engine, player_id),
            "wars": wars::extract(self.engine, player_id),
            "diplomacy": diplomacy::extract(self.engine, player_id),
            "technology": economy::extract_technology(self.engine, player_id),
            "megastructures": economy::extract_megastructures(self.engine),
            "crisis": economy::extract_crisis(self.engine, player_id),
            "fallen_empires": galaxy::extract_fallen_empires(self.engine),
            "policies": economy::extract_policies(self.engine, player_id),
            "edicts": economy::extract_edicts(self.engine, player_id),
            "galaxy_settings": galaxy::extract_galaxy_settings(self.engine),
            "systems": galaxy::extract_systems(self.engine, player_id),
            "ascension_perks": economy::extract_ascension_perks(self.engine, player_id),
            "lgate": galaxy::extract_lgate(self.engine),
            "menace": economy::extract_menace(self.engine, player_id),
            "great_khan": galaxy::extract_great_khan(self.engine),
            "galactic_community": diplomacy::extract_galactic_community(self.engine, player_id),
            "traditions": economy::extract_traditions(self.engine, player_id),
            "precursors": galaxy::extract_precursors(self.engine),
            "subjects": subjects::extract(self.engine, player_id),
            "geography": geography::extract(self.engine, player_id),
        })
    }

    /// Identifies the player by reading `player.country`, defaulting to `0`
    /// per spec section 4.9.
    fn player_id(&self) -> Option<i64> {
        let player_section = self.engine.extract_sections(&["player".to_string()]);
        let country = player_section
            .get("player")
            .and_then(|p| p.get("country"))
            .and_then(|c| c.as_i64());
        Some(country.unwrap_or(0))
    }
}

/// Shared helper: the player's own `country[player_id]` entry, or `None`
/// when the id doesn't resolve to a country (a save with no active game).
pub(crate) fn player_country_entry<'a>(engine: &'a QueryEngine, player_id: Option<i64>) -> Option<&'a Value> {
    let id = player_id?;
    engine.get_entry_value("country", &id.to_string())
}

/// Reads an integer-ish scalar out of a `Value`, treating the null-reference
/// sentinel (spec section 3 / `is_null_ref`) as absent.
pub(crate) fn scalar_ref_id(value: &Value) -> Option<i64> {
    let text = scalar_text(value)?;
    if is_null_ref(&text) {
        return None;
    }
    text.parse::<i64>().ok()
}

/// An integer scalar, whichever concrete `Scalar` variant it parsed as.
pub(crate) fn scalar_int(value: &Value) -> Option<i64> {
    match value.as_scalar()? {
        crate::value::Scalar::Integer(n) => Some(*n),
        crate::value::Scalar::Number(n) => Some(*n as i64),
        other => other.as_text().parse::<i64>().ok(),
    }
}

/// A float scalar, whichever concrete `Scalar` variant it parsed as.
pub(crate) fn scalar_float(value: &Value) -> Option<f64> {
    match value.as_scalar()? {
        crate::value::Scalar::Number(n) => Some(*n),
        crate::value::Scalar::Integer(n) => Some(*n as f64),
        other => other.as_text().parse::<f64>().ok(),
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    value.as_scalar().map(|s| s.as_text())
}

/// Stellaris booleans are the bare identifiers `yes`/`no`, already folded
/// into `Scalar::Bool` by the tokenizer; this also tolerates a stray
/// identifier form defensively.
pub(crate) fn scalar_bool(value: &Value) -> bool {
    match value.as_scalar() {
        Some(crate::value::Scalar::Bool(b)) => *b,
        Some(crate::value::Scalar::Identifier(s)) => s == "yes",
        _ => false,
    }
}

/// Every item of a `Value::List`, or the single item if the save collapsed
/// a would-be list to a lone object (Clausewitz's common one-element
/// shorthand — the parser keeps singletons as bare values, not 1-element
/// lists, per spec section 3).
pub(crate) fn as_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn build_has_fixed_top_level_shape() {
        let root = parse_document("player={ country=0 } country={ 0={ } }").unwrap();
        let engine = QueryEngine::new(root, String::new(), String::new());
        let builder = SignalsBuilder::new(&engine);
        let snapshot = builder.build(chrono::Utc::now());
        for field in [
            "format_version",
            "generated_at",
            "player_id",
            "leaders",
            "wars",
            "diplomacy",
            "technology",
            "megastructures",
            "crisis",
            "fallen_empires",
            "policies",
            "edicts",
            "galaxy_settings",
            "systems",
            "ascension_perks",
            "lgate",
            "menace",
            "great_khan",
            "galactic_community",
            "traditions",
            "precursors",
            "subjects",
            "geography",
        ] {
            assert!(snapshot.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn player_id_defaults_to_zero_when_section_missing() {
        let root = parse_document("country={ 0={ } }").unwrap();
        let engine = QueryEngine::new(root, String::new(), String::new());
        let builder = SignalsBuilder::new(&engine);
        assert_eq!(builder.player_id(), Some(0));
    }
}
