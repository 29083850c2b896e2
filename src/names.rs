//! Name Resolver (spec section 4.4): converts raw localization keys and
//! name-block templates into display strings. A pure function of its input
//! and context — same input, same context, same `ResolvedName` (spec
//! section 8's "name resolver purity" property).
//!
//! Rule order and the known-template table are grounded directly in the
//! game's own localization-key conventions (prefix families like `NAME_`,
//! `SPEC_`, `FALLEN_EMPIRE_`, and templates like `war_vs_adjectives`,
//! `%SEQ%`, `PLANET_NAME_FORMAT`).

use crate::value::{Scalar, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Missing,
    Literal,
    Template,
    LocalizationKey,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameContext {
    Generic,
    Planet,
    Country,
    Species,
    Fleet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedName {
    pub display: String,
    pub raw_key: Option<String>,
    pub source: NameSource,
    pub confidence: f64,
}

impl ResolvedName {
    fn missing(default: &str) -> Self {
        ResolvedName {
            display: default.to_string(),
            raw_key: None,
            source: NameSource::Missing,
            confidence: 0.0,
        }
    }
}

static TRAILING_DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\D)(\d+)$").unwrap());
static ORDINAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(\d+)(ST|ND|RD|TH)$").unwrap());

static ROMAN_NUMERALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"]
        .into_iter()
        .collect()
});

const KEY_PREFIXES: &[&str] = &[
    "NAME_",
    "SPEC_",
    "ADJ_",
    "PRESCRIPTED_",
    "EMPIRE_DESIGN_",
    "FALLEN_EMPIRE_",
    "AWAKENED_EMPIRE_",
    "shipclass_",
    "TRANS_",
];

fn is_key_shaped(raw: &str) -> bool {
    raw.contains('_')
        || KEY_PREFIXES.iter().any(|p| raw.starts_with(p))
        || (raw.chars().all(|c| c.is_ascii_alphabetic()) && raw.chars().all(|c| c.is_uppercase()) && raw.len() > 4)
}

/// Entry point: resolve `value` (a scalar literal/key, or a name block
/// object) into a `ResolvedName`.
pub fn resolve_name(value: Option<&Value>, default: &str, context: NameContext) -> ResolvedName {
    let Some(value) = value else {
        return ResolvedName::missing(default);
    };

    match value {
        Value::Scalar(Scalar::Identifier(s)) if s == "none" => ResolvedName::missing(default),
        Value::Object(_) => resolve_name_block(value, default, context),
        Value::Scalar(scalar) => {
            let raw = scalar.as_text();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return ResolvedName::missing(default);
            }
            if is_key_shaped(trimmed) {
                resolve_localization_key(trimmed)
            } else {
                ResolvedName {
                    display: trimmed.to_string(),
                    raw_key: None,
                    source: NameSource::Literal,
                    confidence: 1.0,
                }
            }
        }
        Value::List(_) => ResolvedName {
            display: default.to_string(),
            raw_key: None,
            source: NameSource::Fallback,
            confidence: 0.2,
        },
    }
}

fn variable_named<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value.as_object()?.iter().find(|e| e.key == name).map(|e| &e.value)
}

fn resolve_name_block(block: &Value, default: &str, context: NameContext) -> ResolvedName {
    let key = match block.get("key").and_then(|v| v.as_scalar()) {
        Some(scalar) => scalar.as_text(),
        None => return ResolvedName::missing(default),
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        return ResolvedName::missing(default);
    }
    let variables = block.get("variables").and_then(|v| v.as_list()).unwrap_or(&[]);

    // war_vs_adjectives: "{1}-{2} {3}", missing parts render as "?" (section 4.4.1).
    if key == "war_vs_adjectives" {
        let part = |n: &str| -> String {
            variables
                .iter()
                .find_map(|v| {
                    if variable_named(v, "key")?.as_scalar()?.as_text() == n {
                        Some(resolve_name(variable_named(v, "value"), "?", NameContext::Generic).display)
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| "?".to_string())
        };
        return ResolvedName {
            display: format!("{}-{} {}", part("1"), part("2"), part("3")),
            raw_key: Some(key),
            source: NameSource::Template,
            confidence: 0.95,
        };
    }

    // %SEQ% with variable `num` in fleet context -> "Fleet #{num}".
    if context == NameContext::Fleet && key == "%SEQ%" {
        for var in variables {
            if variable_named(var, "key").and_then(|v| v.as_scalar()).map(|s| s.as_text()) == Some("num".to_string())
            {
                if let Some(value) = variable_named(var, "value") {
                    if let Some(num) = value.get("key").and_then(|v| v.as_scalar()) {
                        let num = num.as_text();
                        if !num.trim().is_empty() {
                            return ResolvedName {
                                display: format!("Fleet #{}", num.trim()),
                                raw_key: Some(key),
                                source: NameSource::Template,
                                confidence: 0.95,
                            };
                        }
                    }
                }
            }
        }
        return ResolvedName {
            display: default.to_string(),
            raw_key: Some(key),
            source: NameSource::Template,
            confidence: 0.3,
        };
    }

    if context == NameContext::Planet {
        if let Some(resolved) = resolve_planet_template(&key, variables, default) {
            return resolved;
        }
        if let Some(tail) = key.split_once("_PLANET_").map(|(_, tail)| tail) {
            return ResolvedName {
                display: format_key_text(tail),
                raw_key: Some(key),
                source: NameSource::LocalizationKey,
                confidence: 0.8,
            };
        }
    }

    // Generic template resolution: extract concrete values from nested
    // variables and join them, resolving each recursively.
    let mut parts: Vec<String> = Vec::new();
    for var in variables {
        if let Some(value) = variable_named(var, "value") {
            for extracted in extract_concrete_values(value) {
                if !extracted.is_empty() && !extracted.starts_with('%') {
                    let resolved = resolve_name(
                        Some(&Value::Scalar(Scalar::Identifier(extracted))),
                        "",
                        NameContext::Generic,
                    );
                    parts.push(resolved.display);
                }
            }
        }
    }
    let parts: Vec<String> = parts.into_iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect();
    if !parts.is_empty() {
        return ResolvedName {
            display: parts.join(" "),
            raw_key: Some(key),
            source: NameSource::Template,
            confidence: 0.85,
        };
    }

    resolve_localization_key(&key)
}

fn resolve_planet_template(key: &str, variables: &[Value], default: &str) -> Option<ResolvedName> {
    if key == "PLANET_NAME_FORMAT" {
        let mut parent_name: Option<String> = None;
        let mut numeral: Option<String> = None;
        for var in variables {
            let var_key = variable_named(var, "key").and_then(|v| v.as_scalar()).map(|s| s.as_text());
            let value = variable_named(var, "value");
            match var_key.as_deref() {
                Some("PARENT") => {
                    if let Some(value) = value {
                        parent_name = Some(resolve_name(Some(value), "", NameContext::Planet).display);
                    }
                }
                Some("NUMERAL") => {
                    if let Some(numeral_key) = value.and_then(|v| v.get("key")).and_then(|v| v.as_scalar()) {
                        numeral = Some(numeral_key.as_text().trim().to_string());
                    }
                }
                _ => {}
            }
        }
        return Some(match (parent_name, numeral) {
            (Some(p), Some(n)) if !p.is_empty() && !n.is_empty() => ResolvedName {
                display: format!("{p} {n}"),
                raw_key: Some(key.to_string()),
                source: NameSource::Template,
                confidence: 0.95,
            },
            (Some(p), _) if !p.is_empty() => ResolvedName {
                display: p,
                raw_key: Some(key.to_string()),
                source: NameSource::Template,
                confidence: 0.8,
            },
            _ => ResolvedName {
                display: default.to_string(),
                raw_key: Some(key.to_string()),
                source: NameSource::Template,
                confidence: 0.3,
            },
        });
    }

    if let Some(colony_num) = key.strip_prefix("NEW_COLONY_NAME_") {
        let colony_num = colony_num.trim();
        for var in variables {
            if variable_named(var, "key").and_then(|v| v.as_scalar()).map(|s| s.as_text()) == Some("NAME".to_string())
            {
                if let Some(value) = variable_named(var, "value") {
                    let system = resolve_name(Some(value), "", NameContext::Planet).display;
                    if !system.is_empty() {
                        let display = if colony_num.is_empty() {
                            system
                        } else {
                            format!("{system} {colony_num}")
                        };
                        return Some(ResolvedName {
                            display,
                            raw_key: Some(key.to_string()),
                            source: NameSource::Template,
                            confidence: 0.95,
                        });
                    }
                }
            }
        }
        return Some(ResolvedName {
            display: format!("Colony {colony_num}").trim().to_string(),
            raw_key: Some(key.to_string()),
            source: NameSource::Template,
            confidence: 0.6,
        });
    }

    if key == "HABITAT_PLANET_NAME" {
        for var in variables {
            let var_key = variable_named(var, "key").and_then(|v| v.as_scalar()).map(|s| s.as_text()).unwrap_or_default();
            if var_key.contains("solar_system") || var_key == "NAME" {
                if let Some(value) = variable_named(var, "value") {
                    let system = resolve_name(Some(value), "", NameContext::Planet).display;
                    if !system.is_empty() {
                        return Some(ResolvedName {
                            display: format!("{system} Habitat"),
                            raw_key: Some(key.to_string()),
                            source: NameSource::Template,
                            confidence: 0.9,
                        });
                    }
                }
            }
        }
        return Some(ResolvedName {
            display: "Habitat".to_string(),
            raw_key: Some(key.to_string()),
            source: NameSource::Template,
            confidence: 0.6,
        });
    }

    None
}

/// Collects concrete string-ish values out of nested `{key, variables}`
/// structures, used by the generic template fallback.
fn extract_concrete_values(value: &Value) -> Vec<String> {
    match value {
        Value::Scalar(scalar) => vec![scalar.as_text()],
        Value::Object(_) => {
            let mut out = Vec::new();
            if let Some(key) = value.get("key").and_then(|v| v.as_scalar()) {
                let key = key.as_text();
                if !key.is_empty() && !key.starts_with('%') {
                    out.push(key);
                }
            }
            if let Some(variables) = value.get("variables").and_then(|v| v.as_list()) {
                for var in variables {
                    if let Some(value) = variable_named(var, "value") {
                        out.extend(extract_concrete_values(value));
                    }
                }
            }
            out
        }
        Value::List(_) => Vec::new(),
    }
}

fn resolve_localization_key(key: &str) -> ResolvedName {
    let key = key.trim();
    if key.is_empty() {
        return ResolvedName::missing("Unknown");
    }

    if let Some(suffix) = key.strip_prefix("AWAKENED_EMPIRE_") {
        return if suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty() {
            ResolvedName {
                display: format!("Awakened Empire {suffix}"),
                raw_key: Some(key.to_string()),
                source: NameSource::LocalizationKey,
                confidence: 0.9,
            }
        } else {
            ResolvedName {
                display: format!("Awakened Empire ({})", format_key_text(suffix)),
                raw_key: Some(key.to_string()),
                source: NameSource::LocalizationKey,
                confidence: 0.85,
            }
        };
    }

    if let Some(suffix) = key.strip_prefix("FALLEN_EMPIRE_") {
        return if suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty() {
            ResolvedName {
                display: format!("Fallen Empire {suffix}"),
                raw_key: Some(key.to_string()),
                source: NameSource::LocalizationKey,
                confidence: 0.9,
            }
        } else {
            ResolvedName {
                display: format!("Fallen Empire ({})", format_key_text(suffix)),
                raw_key: Some(key.to_string()),
                source: NameSource::LocalizationKey,
                confidence: 0.85,
            }
        };
    }

    if key.starts_with("TRANS_") {
        if key == "TRANS_FLEET" {
            return ResolvedName {
                display: "Transport Fleet".to_string(),
                raw_key: Some(key.to_string()),
                source: NameSource::LocalizationKey,
                confidence: 0.8,
            };
        }
        let suffix = &key["TRANS_".len()..];
        return ResolvedName {
            display: format_key_text(suffix),
            raw_key: Some(key.to_string()),
            source: NameSource::LocalizationKey,
            confidence: 0.6,
        };
    }

    if let Some(result) = key.strip_prefix("shipclass_") {
        let result = result.strip_suffix("_name").unwrap_or(result);
        return ResolvedName {
            display: format_key_text(result),
            raw_key: Some(key.to_string()),
            source: NameSource::LocalizationKey,
            confidence: 0.75,
        };
    }

    if key.ends_with("_FLEET") && key.len() > "_FLEET".len() {
        let base = &key[..key.len() - "_FLEET".len()];
        return ResolvedName {
            display: format!("{} Fleet", format_key_text(base)),
            raw_key: Some(key.to_string()),
            source: NameSource::LocalizationKey,
            confidence: 0.7,
        };
    }

    if let Some(result) = key.strip_prefix("EMPIRE_DESIGN_") {
        let result = TRAILING_DIGITS_RE.replace(result, "$1 $2");
        return ResolvedName {
            display: format_key_text(&result),
            raw_key: Some(key.to_string()),
            source: NameSource::LocalizationKey,
            confidence: 0.8,
        };
    }

    if let Some(result) = key.strip_prefix("NAME_") {
        return ResolvedName {
            display: result.replace('_', " "),
            raw_key: Some(key.to_string()),
            source: NameSource::LocalizationKey,
            confidence: 0.75,
        };
    }

    const GENERAL_PREFIXES: &[&str] = &[
        "PRESCRIPTED_species_name_",
        "PRESCRIPTED_adjective_",
        "PRESCRIPTED_",
        "SPEC_",
        "ADJ_",
        "EMPIRE_",
        "COUNTRY_",
        "CIV_",
    ];

    let mut result = key.to_string();
    for prefix in GENERAL_PREFIXES {
        if let Some(stripped) = result.strip_prefix(prefix) {
            result = stripped.to_string();
            break;
        }
    }
    if let Some(stripped) = result.strip_suffix("_name") {
        if !stripped.is_empty() {
            result = stripped.to_string();
        }
    }
    let result = TRAILING_DIGITS_RE.replace(&result, "$1 $2");

    ResolvedName {
        display: format_key_text(&result),
        raw_key: Some(key.to_string()),
        source: NameSource::LocalizationKey,
        confidence: 0.65,
    }
}

fn format_key_text(text: &str) -> String {
    let text = text.replace('_', " ");
    let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
    words.iter().map(|w| format_token(w)).collect::<Vec<_>>().join(" ")
}

fn format_token(token: &str) -> String {
    if token.is_empty() {
        return token.to_string();
    }
    if ROMAN_NUMERALS.contains(token) {
        return token.to_string();
    }
    if let Some(caps) = ORDINAL_RE.captures(token) {
        return format!("{}{}", &caps[1], caps[2].to_lowercase());
    }
    let is_alpha = token.chars().all(|c| c.is_ascii_alphabetic());
    if is_alpha && token.chars().all(|c| c.is_uppercase()) {
        return title_case(token);
    }
    if is_alpha && token.chars().all(|c| c.is_lowercase()) {
        return title_case(token);
    }
    token.to_string()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Entry;

    fn literal(s: &str) -> Value {
        Value::Scalar(Scalar::String(s.to_string()))
    }

    #[test]
    fn missing_renders_default() {
        let resolved = resolve_name(None, "Unknown", NameContext::Generic);
        assert_eq!(resolved.display, "Unknown");
        assert_eq!(resolved.source, NameSource::Missing);
    }

    #[test]
    fn literal_string_passes_through() {
        let resolved = resolve_name(Some(&literal("Earth")), "Unknown", NameContext::Planet);
        assert_eq!(resolved.display, "Earth");
        assert_eq!(resolved.source, NameSource::Literal);
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn name_key_prefix_stripped() {
        let resolved = resolve_name(Some(&literal("NAME_Earth")), "Unknown", NameContext::Planet);
        assert_eq!(resolved.display, "Earth");
    }

    #[test]
    fn fallen_empire_with_digit_suffix() {
        let resolved = resolve_name(Some(&literal("FALLEN_EMPIRE_3")), "Unknown", NameContext::Country);
        assert_eq!(resolved.display, "Fallen Empire 3");
    }

    #[test]
    fn fallen_empire_with_word_suffix() {
        let resolved = resolve_name(
            Some(&literal("FALLEN_EMPIRE_SPIRITUALIST")),
            "Unknown",
            NameContext::Country,
        );
        assert_eq!(resolved.display, "Fallen Empire (Spiritualist)");
    }

    #[test]
    fn shipclass_name_key() {
        let resolved = resolve_name(
            Some(&literal("shipclass_science_ship_name")),
            "Unknown",
            NameContext::Generic,
        );
        assert_eq!(resolved.display, "Science Ship");
    }

    #[test]
    fn trailing_digit_cluster_split() {
        let resolved = resolve_name(Some(&literal("humans1")), "Unknown", NameContext::Species);
        assert_eq!(resolved.display, "Humans 1");
    }

    #[test]
    fn ordinal_lowercased() {
        let resolved = resolve_name(Some(&literal("1ST_FLEET")), "Unknown", NameContext::Fleet);
        assert_eq!(resolved.display, "1st Fleet");
    }

    #[test]
    fn roman_numeral_preserved() {
        let text = format_key_text("SOL_III");
        assert_eq!(text, "Sol III");
    }

    #[test]
    fn war_vs_adjectives_template() {
        let block = Value::Object(vec![
            Entry {
                key: "key".into(),
                value: literal("war_vs_adjectives"),
            },
            Entry {
                key: "variables".into(),
                value: Value::List(vec![
                    Value::Object(vec![
                        Entry { key: "key".into(), value: literal("1") },
                        Entry {
                            key: "value".into(),
                            value: Value::Object(vec![Entry { key: "key".into(), value: literal("SPEC_Ubaric") }]),
                        },
                    ]),
                    Value::Object(vec![
                        Entry { key: "key".into(), value: literal("2") },
                        Entry {
                            key: "value".into(),
                            value: Value::Object(vec![Entry { key: "key".into(), value: literal("SPEC_Ziiran") }]),
                        },
                    ]),
                    Value::Object(vec![
                        Entry { key: "key".into(), value: literal("3") },
                        Entry {
                            key: "value".into(),
                            value: Value::Object(vec![Entry { key: "key".into(), value: literal("NAME_War") }]),
                        },
                    ]),
                ]),
            },
        ]);
        let resolved = resolve_name(Some(&block), "Unknown", NameContext::Generic);
        assert_eq!(resolved.display, "Ubaric-Ziiran War");
    }

    #[test]
    fn fleet_seq_template() {
        let block = Value::Object(vec![
            Entry { key: "key".into(), value: literal("%SEQ%") },
            Entry {
                key: "variables".into(),
                value: Value::List(vec![Value::Object(vec![
                    Entry { key: "key".into(), value: literal("num") },
                    Entry {
                        key: "value".into(),
                        value: Value::Object(vec![Entry { key: "key".into(), value: literal("1") }]),
                    },
                ])]),
            },
        ]);
        let resolved = resolve_name(Some(&block), "Unknown", NameContext::Fleet);
        assert_eq!(resolved.display, "Fleet #1");
    }

    #[test]
    fn purity_same_input_same_output() {
        let a = resolve_name(Some(&literal("NAME_Earth")), "Unknown", NameContext::Planet);
        let b = resolve_name(Some(&literal("NAME_Earth")), "Unknown", NameContext::Planet);
        assert_eq!(a, b);
    }
}
