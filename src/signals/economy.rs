//! Economy- and progression-scoped sub-extractors: technology,
//! megastructures, crisis status, policies, edicts, ascension perks,
//! menace/become-the-crisis, and tradition trees.
//!
//! Grounded on `backend/core/signals.py`'s `_extract_technology_signals`,
//! `_extract_megastructures_signals`, `_extract_policies_signals`,
//! `_extract_edicts_signals`, and `_extract_traditions_signals` output
//! shapes, `stellaris_save_extractor/endgame.py::get_crisis_status` (the
//! `CRISIS_TYPES` table) and `get_menace` (`ap_become_the_crisis` gate on
//! the player's `ascension_perks` list, then direct `menace`/`crisis_level`
//! fields on the player's own country block).

use super::{as_items, player_country_entry, scalar_float, scalar_int, scalar_text};
use crate::query::QueryEngine;
use serde_json::{json, Map, Value as Json};

const CRISIS_TYPES: &[(&str, &str)] = &[
    ("swarm", "prethoryn"),
    ("extradimensional", "unbidden"),
    ("extradimensional_2", "aberrant"),
    ("extradimensional_3", "vehement"),
    ("ai_empire_01", "contingency"),
];

pub fn extract_technology(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "player_id": player_id, "techs": [], "count": 0, "in_progress": [] });
    };

    let mut techs: Vec<String> = Vec::new();
    if let Some(tech_status) = country.get("tech_status") {
        if let Some(technology) = tech_status.get("technology") {
            techs = as_items(technology).into_iter().filter_map(scalar_text).collect();
        }
    }
    techs.sort();
    techs.dedup();

    let mut in_progress = Vec::new();
    if let Some(tech_status) = country.get("tech_status") {
        for category in ["physics", "society", "engineering"] {
            let Some(entry) = tech_status.get(category) else { continue };
            let Some(tech) = entry.get("technology").and_then(scalar_text) else { continue };
            let progress = entry.get("progress").and_then(scalar_float).unwrap_or(0.0);
            in_progress.push(json!({ "id": tech, "category": category, "progress": progress }));
        }
    }

    json!({
        "player_id": player_id,
        "techs": techs,
        "count": techs.len(),
        "in_progress": in_progress,
    })
}

/// Stage derived from the megastructure type's trailing `_N` suffix
/// (`_0`..`_5`), a `_site` suffix meaning stage 0, and no suffix at all
/// meaning the structure is complete (stage 5).
pub fn extract_megastructures(engine: &QueryEngine) -> Json {
    let mut megastructures = Vec::new();
    let mut by_type: Map<String, Json> = Map::new();

    for (id, value) in engine.iter_section("megastructures") {
        if value.is_none_identifier() {
            continue;
        }
        let Ok(structure_id) = id.parse::<i64>() else { continue };
        let structure_type = value.get("type").and_then(scalar_text).unwrap_or_default();
        let stage = megastructure_stage(&structure_type);
        let base_type = structure_type
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim_end_matches('_')
            .trim_end_matches("_site")
            .to_string();

        let count = by_type.entry(base_type.clone()).or_insert(json!(0));
        if let Some(n) = count.as_i64() {
            *count = json!(n + 1);
        }

        megastructures.push(json!({
            "id": structure_id,
            "type": structure_type,
            "stage": stage,
            "planet_id": value.get("planet").and_then(super::scalar_ref_id),
        }));
    }

    json!({ "megastructures": megastructures, "count": megastructures.len(), "by_type": by_type })
}

fn megastructure_stage(structure_type: &str) -> u8 {
    if structure_type.ends_with("_site") {
        return 0;
    }
    if let Some(idx) = structure_type.rfind('_') {
        if let Ok(n) = structure_type[idx + 1..].parse::<u8>() {
            return n;
        }
    }
    5
}

/// Grounded on `get_crisis_status`'s `CRISIS_TYPES` table, detected by
/// scanning country types for a crisis faction's distinctive type.
pub fn extract_crisis(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let mut active = false;
    let mut crisis_type = None;
    let mut crisis_countries = 0u32;

    for (_, value) in engine.iter_section("country") {
        if value.is_none_identifier() {
            continue;
        }
        let Some(country_type) = value.get("country_type").and_then(scalar_text) else { continue };
        if let Some((_, resolved)) = CRISIS_TYPES.iter().find(|(key, _)| country_type.contains(key)) {
            active = true;
            crisis_countries += 1;
            crisis_type.get_or_insert_with(|| resolved.to_string());
        }
    }

    let player_is_crisis_fighter = player_id
        .and_then(|pid| engine.get_entry_value("country", &pid.to_string()))
        .and_then(|c| c.get("crisis_fighter"))
        .map(super::scalar_bool)
        .unwrap_or(false);

    json!({
        "active": active,
        "type": crisis_type,
        "player_is_crisis_fighter": player_is_crisis_fighter,
        "crisis_countries": crisis_countries,
    })
}

pub fn extract_policies(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "player_id": player_id, "policies": {}, "count": 0 });
    };

    let mut policies: Map<String, Json> = Map::new();
    if let Some(active_policies) = country.get("active_policies") {
        for entry in as_items(active_policies) {
            let Some(policy) = entry.get("policy").and_then(scalar_text) else { continue };
            let selected = entry.get("selected").and_then(scalar_text);
            policies.insert(policy, json!(selected));
        }
    }

    let count = policies.len();
    json!({ "player_id": player_id, "policies": policies, "count": count })
}

pub fn extract_edicts(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "player_id": player_id, "edicts": [], "count": 0 });
    };

    let mut edicts: Vec<String> = Vec::new();
    if let Some(raw) = country.get("edicts") {
        for entry in as_items(raw) {
            if let Some(name) = entry.get("edict").and_then(scalar_text) {
                edicts.push(name);
            }
        }
    }
    edicts.sort();
    edicts.dedup();

    let count = edicts.len();
    json!({ "player_id": player_id, "edicts": edicts, "count": count })
}

/// Grounded on the `ap_become_the_crisis` gate in `get_menace`: the
/// `menace`/`crisis_level` fields only mean anything once that ascension
/// perk is present on the player's country block.
pub fn extract_menace(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "is_crisis": false, "menace": 0, "crisis_level": 0 });
    };

    let has_perk = country
        .get("ascension_perks")
        .map(|perks| as_items(perks).into_iter().filter_map(scalar_text).any(|p| p == "ap_become_the_crisis"))
        .unwrap_or(false);

    if !has_perk {
        return json!({ "is_crisis": false, "menace": 0, "crisis_level": 0 });
    }

    json!({
        "is_crisis": true,
        "menace": country.get("menace").and_then(scalar_float).unwrap_or(0.0),
        "crisis_level": country.get("crisis_level").and_then(scalar_int).unwrap_or(0),
    })
}

pub fn extract_ascension_perks(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "perks": [], "count": 0 });
    };

    let perks: Vec<String> = country
        .get("ascension_perks")
        .map(|perks| as_items(perks).into_iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    let count = perks.len();
    json!({ "perks": perks, "count": count })
}

/// Tradition trees aren't named directly on each pick; Stellaris prefixes
/// every tradition id with its tree (e.g. `tr_adaptability_1` belongs to
/// `adaptability`), which is what groups individual picks into `by_tree`.
pub fn extract_traditions(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(country) = player_country_entry(engine, player_id) else {
        return json!({ "finished_trees": [], "by_tree": {}, "total_traditions": 0 });
    };

    let picks: Vec<String> = country
        .get("traditions")
        .map(|t| as_items(t).into_iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    let finished_trees: Vec<String> = country
        .get("tradition_categories")
        .map(|t| as_items(t).into_iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    let mut by_tree: Map<String, Json> = Map::new();
    for tree in &finished_trees {
        by_tree.insert(tree.clone(), json!({ "finished": true }));
    }
    for pick in &picks {
        let tree = pick.trim_start_matches("tr_").split('_').next().unwrap_or(pick).to_string();
        by_tree.entry(tree).or_insert(json!({ "finished": false }));
    }

    let mut finished_sorted = finished_trees;
    finished_sorted.sort();
    finished_sorted.dedup();

    json!({
        "finished_trees": finished_sorted,
        "by_tree": by_tree,
        "total_traditions": picks.len(),
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
    fn researched_techs_deduped_and_sorted() {
        let qe = engine(
            r#"country={ 0={ tech_status={ technology={ tech_b tech_a } physics={ technology="tech_plasma" progress=0.5 } } } }"#,
        );
        let result = extract_technology(&qe, Some(0));
        assert_eq!(result["techs"], json!(["tech_a", "tech_b"]));
        assert_eq!(result["in_progress"][0]["id"], json!("tech_plasma"));
    }

    #[test]
    fn megastructure_stage_from_numeric_suffix() {
        let qe = engine(r#"megastructures={ 0={ type="dyson_sphere_3" } 1={ type="ring_world_site" } }"#);
        let result = extract_megastructures(&qe);
        assert_eq!(result["megastructures"][0]["stage"], json!(3));
        assert_eq!(result["megastructures"][1]["stage"], json!(0));
    }

    #[test]
    fn crisis_detected_via_country_type() {
        let qe = engine(r#"country={ 0={ country_type="ai_empire_01" } }"#);
        let result = extract_crisis(&qe, Some(1));
        assert_eq!(result["active"], json!(true));
        assert_eq!(result["type"], json!("contingency"));
    }

    #[test]
    fn menace_hidden_without_become_the_crisis_perk() {
        let qe = engine(r#"country={ 0={ menace=50 crisis_level=2 } }"#);
        let result = extract_menace(&qe, Some(0));
        assert_eq!(result["is_crisis"], json!(false));
    }

    #[test]
    fn menace_reported_once_perk_present() {
        let qe = engine(
            r#"country={ 0={ ascension_perks={ ap_become_the_crisis } menace=50 crisis_level=2 } }"#,
        );
        let result = extract_menace(&qe, Some(0));
        assert_eq!(result["is_crisis"], json!(true));
        assert_eq!(result["menace"], json!(50.0));
    }

    #[test]
    fn tradition_picks_grouped_by_tree_prefix() {
        let qe = engine(
            r#"country={ 0={ traditions={ tr_adaptability_1 tr_adaptability_2 } tradition_categories={ adaptability } } }"#,
        );
        let result = extract_traditions(&qe, Some(0));
        assert_eq!(result["total_traditions"], json!(2));
        assert_eq!(result["by_tree"]["adaptability"]["finished"], json!(true));
    }
}
