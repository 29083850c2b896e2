//! Wars sub-extractor, grounded on `military.py::get_wars` (participant and
//! exhaustion field names) with name resolution done through the proper
//! name resolver (spec section 4.4.1) instead of `military.py`'s own regex
//! fallback, since this crate already has a structural parse of the block.

use super::{as_items, scalar_float, scalar_ref_id};
use crate::names::{resolve_name, NameContext};
use crate::query::QueryEngine;
use crate::value::Value;
use serde_json::{json, Value as Json};

pub fn extract(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let mut wars = Vec::new();
    let mut player_at_war = false;

    for (id, value) in engine.iter_section("war") {
        if value.is_none_identifier() {
            continue;
        }
        let Ok(war_id) = id.parse::<i64>() else {
            continue;
        };

        let attackers = participant_ids(value.get("attackers"));
        let defenders = participant_ids(value.get("defenders"));

        let involves_player = player_id
            .map(|pid| attackers.contains(&pid) || defenders.contains(&pid))
            .unwrap_or(false);
        if involves_player {
            player_at_war = true;
        }

        let resolved = resolve_name(value.get("name"), &format!("War #{war_id}"), NameContext::Generic);

        let attacker_exhaustion = value
            .get("attacker_war_exhaustion")
            .and_then(scalar_float)
            .map(|f| (f * 100.0 * 10.0).round() / 10.0)
            .unwrap_or(0.0);
        let defender_exhaustion = value
            .get("defender_war_exhaustion")
            .and_then(scalar_float)
            .map(|f| (f * 100.0 * 10.0).round() / 10.0)
            .unwrap_or(0.0);

        let start_date = value.get("start_date").and_then(|v| v.as_scalar()).map(|s| s.as_text());

        wars.push(json!({
            "id": war_id,
            "name": resolved.display,
            "start_date": start_date,
            "attackers": attackers,
            "defenders": defenders,
            "attacker_exhaustion": attacker_exhaustion,
            "defender_exhaustion": defender_exhaustion,
        }));
    }

    json!({
        "player_at_war": player_at_war,
        "count": wars.len(),
        "wars": wars,
    })
}

/// `attackers`/`defenders` are a list of `{country=<id>, ...}` participant
/// blocks; collects the resolved country ids, skipping the null-reference
/// sentinel.
fn participant_ids(block: Option<&Value>) -> Vec<i64> {
    let Some(block) = block else { return Vec::new() };
    as_items(block)
        .into_iter()
        .filter_map(|item| item.get("country").and_then(scalar_ref_id))
        .collect()
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
    fn war_involving_player_is_reported() {
        let qe = engine(
            r#"war={ 0={ name="Ubaric-Ziiran War" start_date="2250.03.01" attacker_war_exhaustion=0.42 defender_war_exhaustion=0.1 attackers={ 0={ country=1 } } defenders={ 0={ country=2 } } } }"#,
        );
        let result = extract(&qe, Some(1));
        assert_eq!(result["player_at_war"], json!(true));
        let wars = result["wars"].as_array().unwrap();
        assert_eq!(wars.len(), 1);
        assert_eq!(wars[0]["name"], json!("Ubaric-Ziiran War"));
        assert_eq!(wars[0]["attacker_exhaustion"], json!(42.0));
        assert_eq!(wars[0]["attackers"], json!([1]));
    }

    #[test]
    fn war_not_involving_player_still_counted_but_flag_unset() {
        let qe = engine(
            r#"war={ 0={ name="Foreign War" attackers={ 0={ country=5 } } defenders={ 0={ country=6 } } } }"#,
        );
        let result = extract(&qe, Some(1));
        assert_eq!(result["player_at_war"], json!(false));
        assert_eq!(result["count"], json!(1));
    }

    #[test]
    fn unresolved_name_falls_back_to_war_id() {
        let qe = engine(r#"war={ 0={ attackers={ 0={ country=1 } } defenders={ 0={ country=2 } } } }"#);
        let result = extract(&qe, Some(1));
        assert_eq!(result["wars"][0]["name"], json!("War #0"));
    }
}
