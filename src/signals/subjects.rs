//! Subjects sub-extractor, grounded on `signals.py::_extract_subjects_signals`'s
//! output shape. The overlord/subject relationship itself is read off each
//! country's own `overlord` reference field (the Clausewitz field this crate
//! already relies on elsewhere for ownership chains, e.g. fleet ownership in
//! `geography.rs`), since the raw extractor this was distilled from wasn't
//! present in the retrieved corpus.

use super::{player_country_entry, scalar_ref_id, scalar_text};
use crate::names::{resolve_name, NameContext};
use crate::query::QueryEngine;
use serde_json::{json, Map, Value as Json};

pub fn extract(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let mut as_overlord = Vec::new();
    let mut as_subject = Vec::new();
    let mut subject_details: Map<String, Json> = Map::new();
    let mut empire_names: Map<String, Json> = Map::new();

    if let Some(pid) = player_id {
        if let Some(country) = player_country_entry(engine, player_id) {
            if let Some(overlord_id) = country.get("overlord").and_then(scalar_ref_id) {
                as_subject.push(overlord_id);
                let name = resolve_name(
                    engine.get_entry_value("country", &overlord_id.to_string()).and_then(|c| c.get("name")),
                    &format!("Empire #{overlord_id}"),
                    NameContext::Country,
                );
                empire_names.insert(overlord_id.to_string(), Json::String(name.display));
            }
        }

        for (id, value) in engine.iter_section("country") {
            if value.is_none_identifier() {
                continue;
            }
            let Ok(country_id) = id.parse::<i64>() else { continue };
            if country_id == pid {
                continue;
            }
            let Some(overlord_id) = value.get("overlord").and_then(scalar_ref_id) else {
                continue;
            };
            if overlord_id != pid {
                continue;
            }

            as_overlord.push(country_id);

            let subject_type = value
                .get("subject_of")
                .and_then(|s| s.get("subject_type"))
                .and_then(scalar_text)
                .unwrap_or_else(|| "unknown".to_string());
            let loyalty = value
                .get("subject_of")
                .and_then(|s| s.get("loyalty"))
                .and_then(super::scalar_float)
                .unwrap_or(0.0);

            subject_details.insert(
                country_id.to_string(),
                json!({ "subject_type": subject_type, "loyalty": loyalty }),
            );

            let name = resolve_name(value.get("name"), &format!("Empire #{country_id}"), NameContext::Country);
            empire_names.insert(country_id.to_string(), Json::String(name.display));
        }
    }

    as_overlord.sort_unstable();
    as_subject.sort_unstable();

    json!({
        "as_overlord": as_overlord,
        "as_subject": as_subject,
        "subject_details": subject_details,
        "empire_names": empire_names,
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
    fn subject_empires_are_reported_as_overlord() {
        let qe = engine(
            r#"country={
                0={ name="Humans" }
                1={ name="Vassal Corp" overlord=0 subject_of={ subject_type="vassal" loyalty=0.8 } }
            }"#,
        );
        let result = extract(&qe, Some(0));
        assert_eq!(result["as_overlord"], json!([1]));
        assert_eq!(result["subject_details"]["1"]["subject_type"], json!("vassal"));
    }

    #[test]
    fn overlord_is_reported_as_subject() {
        let qe = engine(
            r#"country={ 0={ name="Vassal" overlord=1 } 1={ name="Hegemony" } }"#,
        );
        let result = extract(&qe, Some(0));
        assert_eq!(result["as_subject"], json!([1]));
    }

    #[test]
    fn unrelated_countries_are_not_reported() {
        let qe = engine(r#"country={ 0={ name="Humans" } 2={ name="Others" } }"#);
        let result = extract(&qe, Some(0));
        assert_eq!(result["as_overlord"], json!([]));
        assert_eq!(result["as_subject"], json!([]));
    }
}
