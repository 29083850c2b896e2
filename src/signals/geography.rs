//! Strategic geography sub-extractor, grounded on
//! `stellaris_save_extractor/geography.py` in full: `_build_system_owner_map`
//! (starbase → station → fleet → owning country chain),
//! `get_strategic_geography` (border neighbors, chokepoints),
//! `_angle_to_compass` (8-point compass, game axis convention `+x=west,
//! +y=south`), and `_compute_centroid`/`_compute_empire_direction`.

use super::{as_items, scalar_float, scalar_ref_id};
use crate::names::{resolve_name, NameContext};
use crate::query::QueryEngine;
use serde_json::{json, Value as Json};
use std::collections::{BTreeMap, HashMap, HashSet};

const COMPASS: [&str; 8] =
    ["east", "northeast", "north", "northwest", "west", "southwest", "south", "southeast"];

const BORDER_NEIGHBOR_CAP: usize = 15;
const CHOKEPOINT_CAP: usize = 10;
const CHOKEPOINT_ENTRY_LIMIT: usize = 2;

pub fn extract(engine: &QueryEngine, player_id: Option<i64>) -> Json {
    let Some(pid) = player_id else {
        return json!({
            "border_neighbors": [],
            "chokepoints": [],
            "empire_centroid": null,
            "total_player_systems": 0,
        });
    };

    let owners = build_system_owner_map(engine);
    let (coords, adjacency) = build_system_graph(engine);

    let player_systems: HashSet<i64> =
        owners.iter().filter(|(_, owner)| **owner == pid).map(|(system, _)| *system).collect();

    let empire_centroid = compute_centroid(&player_systems, &coords);

    let mut border_counts: HashMap<i64, u32> = HashMap::new();
    for &system in &player_systems {
        let Some(neighbors) = adjacency.get(&system) else { continue };
        for neighbor in neighbors {
            if let Some(&owner) = owners.get(neighbor) {
                if owner != pid {
                    *border_counts.entry(owner).or_insert(0) += 1;
                }
            }
        }
    }

    let mut border_neighbors: Vec<(i64, u32)> = border_counts.into_iter().collect();
    border_neighbors.sort_by(|a, b| b.1.cmp(&a.1));
    border_neighbors.truncate(BORDER_NEIGHBOR_CAP);

    let border_neighbors_json: Vec<Json> = border_neighbors
        .into_iter()
        .map(|(empire_id, shared)| {
            let empire_systems: HashSet<i64> =
                owners.iter().filter(|(_, owner)| **owner == empire_id).map(|(system, _)| *system).collect();
            let direction = match (empire_centroid, compute_centroid(&empire_systems, &coords)) {
                (Some(mine), Some(theirs)) => {
                    Some(angle_to_compass(theirs.0 - mine.0, theirs.1 - mine.1))
                }
                _ => None,
            };
            let name = resolve_name(
                engine.get_entry_value("country", &empire_id.to_string()).and_then(|c| c.get("name")),
                &format!("Empire #{empire_id}"),
                NameContext::Country,
            );
            json!({
                "empire_name": name.display,
                "empire_id": empire_id,
                "direction": direction,
                "shared_border_systems": shared,
            })
        })
        .collect();

    // An enemy-owned system is a chokepoint source when it only reaches the
    // player's territory through a small number of distinct player systems.
    let mut enemy_entry_points: HashMap<i64, HashSet<i64>> = HashMap::new();
    for (&system, &owner) in owners.iter() {
        if owner == pid {
            continue;
        }
        let Some(neighbors) = adjacency.get(&system) else { continue };
        for neighbor in neighbors {
            if player_systems.contains(neighbor) {
                enemy_entry_points.entry(system).or_default().insert(*neighbor);
            }
        }
    }

    let mut chokepoint_sources: HashSet<i64> = HashSet::new();
    for entries in enemy_entry_points.values() {
        if entries.len() <= CHOKEPOINT_ENTRY_LIMIT {
            chokepoint_sources.extend(entries.iter().copied());
        }
    }

    let mut chokepoints: Vec<(i64, u32, u32)> = chokepoint_sources
        .into_iter()
        .map(|system| {
            let friendly_connections = adjacency
                .get(&system)
                .map(|neighbors| neighbors.iter().filter(|n| player_systems.contains(n)).count() as u32)
                .unwrap_or(0);
            let enemy_neighbors = adjacency
                .get(&system)
                .map(|neighbors| {
                    neighbors.iter().filter(|n| owners.get(n).map(|o| *o != pid).unwrap_or(false)).count() as u32
                })
                .unwrap_or(0);
            (system, friendly_connections, enemy_neighbors)
        })
        .collect();
    chokepoints.sort_by(|a, b| a.1.cmp(&b.1));
    chokepoints.truncate(CHOKEPOINT_CAP);

    let chokepoints_json: Vec<Json> = chokepoints
        .into_iter()
        .map(|(system, friendly, enemy)| {
            json!({
                "system_name": resolve_system_name(engine, system),
                "system_id": system,
                "friendly_connections": friendly,
                "enemy_neighbors": enemy,
            })
        })
        .collect();

    json!({
        "border_neighbors": border_neighbors_json,
        "chokepoints": chokepoints_json,
        "empire_centroid": empire_centroid.map(|(x, y)| json!({ "x": x, "y": y })),
        "total_player_systems": player_systems.len(),
    })
}

/// starbase → station ship id → fleet id → owning country, the same chain
/// `_build_system_owner_map` walks via `galactic_object.starbases`,
/// `starbase_mgr[id].station`, and each ship's `fleet` field.
fn build_system_owner_map(engine: &QueryEngine) -> HashMap<i64, i64> {
    let mut owners = HashMap::new();

    let fleet_owner: HashMap<i64, i64> = engine
        .iter_section("country")
        .flat_map(|(id, country)| {
            let owner: i64 = id.parse().ok()?;
            let fleets = country.get("fleets_manager")?.get("owned_fleets")?;
            Some(as_items(fleets).into_iter().filter_map(move |entry| {
                entry.get("fleet").and_then(scalar_ref_id).map(|fleet_id| (fleet_id, owner))
            }))
        })
        .flatten()
        .collect();

    let ship_fleet: HashMap<i64, i64> = engine
        .iter_section("ships")
        .filter_map(|(id, ship)| {
            let ship_id: i64 = id.parse().ok()?;
            let fleet_id = ship.get("fleet").and_then(scalar_ref_id)?;
            Some((ship_id, fleet_id))
        })
        .collect();

    let station_fleet: HashMap<i64, i64> = engine
        .iter_section("starbase_mgr")
        .filter_map(|(id, starbase)| {
            let starbase_id: i64 = id.parse().ok()?;
            let station_id = starbase.get("station").and_then(scalar_ref_id)?;
            let fleet_id = *ship_fleet.get(&station_id)?;
            Some((starbase_id, fleet_id))
        })
        .collect();

    for (id, system) in engine.iter_section("galactic_object") {
        if system.is_none_identifier() {
            continue;
        }
        let Ok(system_id) = id.parse::<i64>() else { continue };
        let Some(starbases) = system.get("starbases") else { continue };
        for starbase in as_items(starbases) {
            let Some(starbase_id) = scalar_ref_id(starbase) else { continue };
            let Some(&fleet_id) = station_fleet.get(&starbase_id) else { continue };
            let Some(&owner) = fleet_owner.get(&fleet_id) else { continue };
            owners.insert(system_id, owner);
        }
    }

    owners
}

fn build_system_graph(engine: &QueryEngine) -> (HashMap<i64, (f64, f64)>, HashMap<i64, Vec<i64>>) {
    let mut coords = HashMap::new();
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();

    for (id, system) in engine.iter_section("galactic_object") {
        if system.is_none_identifier() {
            continue;
        }
        let Ok(system_id) = id.parse::<i64>() else { continue };

        if let (Some(x), Some(y)) =
            (system.get("coordinate").and_then(|c| c.get("x")).and_then(scalar_float), system.get("coordinate").and_then(|c| c.get("y")).and_then(scalar_float))
        {
            coords.insert(system_id, (x, y));
        }

        if let Some(hyperlanes) = system.get("hyperlane") {
            let neighbors = as_items(hyperlanes)
                .into_iter()
                .filter_map(|lane| lane.get("to").and_then(scalar_ref_id))
                .collect();
            adjacency.insert(system_id, neighbors);
        }
    }

    (coords, adjacency)
}

fn compute_centroid(systems: &HashSet<i64>, coords: &HashMap<i64, (f64, f64)>) -> Option<(f64, f64)> {
    if systems.is_empty() {
        return None;
    }
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut n = 0usize;
    for system in systems {
        if let Some((x, y)) = coords.get(system) {
            sum_x += x;
            sum_y += y;
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    Some((sum_x / n as f64, sum_y / n as f64))
}

/// Game axis convention is `+x=west, +y=south`, so both axes are negated
/// before taking the angle; bins are 8-way, offset by half a bin (22.5°) so
/// due-east sits centered in its bucket rather than on its boundary.
fn angle_to_compass(dx: f64, dy: f64) -> &'static str {
    let angle = (-dy).atan2(-dx).to_degrees();
    let normalized = if angle < 0.0 { angle + 360.0 } else { angle };
    let index = (((normalized + 22.5) / 45.0) as usize) % 8;
    COMPASS[index]
}

fn resolve_system_name(engine: &QueryEngine, system_id: i64) -> String {
    let entry = engine.get_entry_value("galactic_object", &system_id.to_string());
    let resolved = resolve_name(
        entry.and_then(|s| s.get("name")),
        &format!("System #{system_id}"),
        NameContext::Generic,
    );
    resolved.display
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
    fn no_player_id_returns_empty_geography() {
        let qe = engine("galactic_object={ }");
        let result = extract(&qe, None);
        assert_eq!(result["total_player_systems"], json!(0));
    }

    #[test]
    fn player_owned_systems_counted_via_ownership_chain() {
        let qe = engine(
            r#"
            country={ 0={ fleets_manager={ owned_fleets={ 0={ fleet=1 } } } } }
            ships={ 10={ fleet=1 } }
            starbase_mgr={ 5={ station=10 owner=0 } }
            galactic_object={ 3={ coordinate={ x=1.0 y=2.0 } starbases={ 5 } } }
            "#,
        );
        let result = extract(&qe, Some(0));
        assert_eq!(result["total_player_systems"], json!(1));
        assert_eq!(result["empire_centroid"]["x"], json!(1.0));
    }

    #[test]
    fn compass_direction_uses_negated_axes() {
        // Target empire directly east in game-space (+x=west), so dx<0.
        assert_eq!(angle_to_compass(-10.0, 0.0), "east");
    }
}
