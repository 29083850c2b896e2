//! Leaders sub-extractor, grounded on `signals.py::_extract_leader_signals`.
//!
//! Simplified to the fixed schema SPEC_FULL §4.9 documents: the original
//! also carries `name_key`/`death_date`/`date_added`/`recruitment_date` for
//! its own history-diffing needs, which aren't part of this crate's schema.

use super::{player_country_entry, scalar_int, scalar_ref_id, scalar_text};
use crate::names::{resolve_name, NameContext};
use crate::query::QueryEngine;
use serde_json::{json, Value as Json};

pub fn extract(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    // Primary ruler identification: country[player].ruler (a leader id).
    // Fallback to class == "official" only when that field is absent,
    // per spec section 4.9.
    let actual_ruler_id = player_country_entry(engine, player_id)
        .and_then(|country| country.get("ruler"))
        .and_then(scalar_ref_id);

    let mut leaders = Vec::new();
    let mut ruler_id = None;
    let mut ruler_name = None;

    for (id, value) in engine.iter_section("leaders") {
        if value.is_none_identifier() {
            continue;
        }
        let Ok(leader_id) = id.parse::<i64>() else {
            continue;
        };

        let class = value.get("class").and_then(scalar_text);
        let level = value.get("level").and_then(scalar_int);

        let is_ruler = match actual_ruler_id {
            Some(rid) => leader_id == rid,
            None => class.as_deref() == Some("official"),
        };

        let resolved = resolve_name(
            value.get("name"),
            &format!("Leader #{leader_id}"),
            NameContext::Generic,
        );

        if is_ruler {
            ruler_id = Some(leader_id);
            ruler_name = Some(resolved.display.clone());
        }

        leaders.push(json!({
            "id": leader_id,
            "class": class,
            "level": level,
            "name": resolved.display,
            "is_ruler": is_ruler,
        }));
    }

    json!({
        "count": leaders.len(),
        "leaders": leaders,
        "ruler_id": ruler_id,
        "ruler_name": ruler_name,
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
    fn ruler_identified_via_country_ruler_field() {
        let qe = engine(
            r#"country={ 0={ ruler=7 } } leaders={ 7={ class="official" level=3 name="Emperor Zeta" } 8={ class="admiral" level=1 } }"#,
        );
        let result = extract(&qe, Some(0));
        assert_eq!(result["ruler_id"], json!(7));
        assert_eq!(result["ruler_name"], json!("Emperor Zeta"));
        assert_eq!(result["count"], json!(2));
    }

    #[test]
    fn ruler_falls_back_to_official_class_when_field_absent() {
        let qe = engine(r#"country={ 0={ } } leaders={ 9={ class="official" level=2 } }"#);
        let result = extract(&qe, Some(0));
        assert_eq!(result["ruler_id"], json!(9));
    }

    #[test]
    fn none_leader_entries_are_skipped() {
        let qe = engine(r#"country={ 0={ } } leaders={ 1=none 2={ class="scientist" } }"#);
        let result = extract(&qe, Some(0));
        assert_eq!(result["count"], json!(1));
    }
}
