//! Diplomacy and Galactic Community sub-extractors.
//!
//! Grounded on `stellaris_save_extractor/diplomacy.py::get_diplomacy`'s
//! relation scan (`relations_manager.relation[*]` blocks keyed by `owner`/
//! `country`, boolean treaty flags) and on `signals.py::_extract_diplomacy_signals`'s
//! output shape. `galactic_community`'s raw field names aren't present in the
//! retrieved corpus (its own extractor lives outside the retrieved slice);
//! this reads the save's own `galactic_community` section and player
//! membership the same structural way the rest of this module does, and the
//! choice is recorded in DESIGN.md's Open Question decisions.

use super::{as_items, player_country_entry, scalar_bool, scalar_ref_id};
use crate::names::{resolve_name, NameContext};
use crate::query::QueryEngine;
use serde_json::{json, Map, Value as Json};

const TREATY_FLAGS: &[(&str, &str)] = &[
    ("defensive_pact", "defensive_pact"),
    ("non_aggression_pact", "non_aggression_pact"),
    ("commercial_pact", "commercial_pact"),
    ("migration_treaty", "migration_treaty"),
    ("sensor_link", "sensor_link"),
    ("research_agreement", "research_agreement"),
    ("embassy", "embassy"),
    ("truce", "truce"),
];

pub fn extract(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let mut allies = Vec::new();
    let mut rivals = Vec::new();
    let mut treaties: std::collections::BTreeMap<&str, std::collections::BTreeSet<i64>> =
        std::collections::BTreeMap::new();
    let mut empire_names: Map<String, Json> = Map::new();

    if let Some(country) = player_country_entry(engine, player_id) {
        if let Some(relations) = country.get("relations_manager").and_then(|m| m.get("relation")) {
            for relation in as_items(relations) {
                let Some(other_id) = relation.get("country").and_then(scalar_ref_id) else {
                    continue;
                };
                if Some(other_id) == player_id {
                    continue;
                }

                if relation.get("alliance").map(scalar_bool).unwrap_or(false) {
                    allies.push(other_id);
                }
                if relation.get("rival").map(scalar_bool).unwrap_or(false) {
                    rivals.push(other_id);
                }
                for (field, treaty_name) in TREATY_FLAGS {
                    if relation.get(field).map(scalar_bool).unwrap_or(false) {
                        treaties.entry(treaty_name).or_default().insert(other_id);
                    }
                }

                let name = resolve_name(
                    engine.get_entry_value("country", &other_id.to_string()).and_then(|c| c.get("name")),
                    &format!("Empire #{other_id}"),
                    NameContext::Country,
                );
                empire_names.insert(other_id.to_string(), Json::String(name.display));
            }
        }
    }

    allies.sort_unstable();
    allies.dedup();
    rivals.sort_unstable();
    rivals.dedup();

    let treaties_json: Map<String, Json> = treaties
        .into_iter()
        .map(|(name, ids)| (name.to_string(), json!(ids.into_iter().collect::<Vec<_>>())))
        .collect();

    json!({
        "allies": allies,
        "rivals": rivals,
        "treaties": treaties_json,
        "empire_names": empire_names,
    })
}

/// Grounded on the save's own `galactic_community` top-level section; see
/// module doc comment for the Open Question this resolves.
pub fn extract_galactic_community(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(community) = engine.section_root("galactic_community") else {
        return json!({
            "exists": false,
            "member": false,
            "council_member": false,
            "members_count": 0,
        });
    };

    let members = community.get("members");
    let member_ids: Vec<i64> = members
        .map(|m| as_items(m).into_iter().filter_map(scalar_ref_id).collect())
        .unwrap_or_default();
    let council_ids: Vec<i64> = community
        .get("council")
        .map(|c| as_items(c).into_iter().filter_map(scalar_ref_id).collect())
        .unwrap_or_default();

    let member = player_id.map(|pid| member_ids.contains(&pid)).unwrap_or(false);
    let council_member = player_id.map(|pid| council_ids.contains(&pid)).unwrap_or(false);

    json!({
        "exists": true,
        "member": member,
        "council_member": council_member,
        "members_count": member_ids.len(),
    })
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
    fn allies_and_treaties_collected_from_relations() {
        let qe = engine(
            r#"country={
                0={ relations_manager={ relation={ country=1 alliance=yes } relation={ country=2 defensive_pact=yes } } }
                1={ name="Humans" }
                2={ name="Lithoids" }
            }"#,
        );
        let result = extract(&qe, Some(0));
        assert_eq!(result["allies"], json!([1]));
        assert_eq!(result["treaties"]["defensive_pact"], json!([2]));
        assert_eq!(result["empire_names"]["1"], json!("Humans"));
    }

    #[test]
    fn no_player_country_yields_empty_diplomacy() {
        let qe = engine("country={ 0={ } }");
        let result = extract(&qe, Some(5));
        assert_eq!(result["allies"], json!([]));
        assert_eq!(result["treaties"], json!({}));
    }

    #[test]
    fn missing_galactic_community_section_reports_not_exists() {
        let qe = engine("country={ 0={ } }");
        let result = extract_galactic_community(&qe, Some(0));
        assert_eq!(result["exists"], json!(false));
    }
}
