//! Power-transformer terminal resolution.
//!
//! A transformer with more than two neighbors is reduced to one node per
//! voltage side. Neighbors are grouped by the voltage of the line reachable
//! through them; the side matching the transformer's container voltage is
//! primary. Petersen coils always join the primary side.

use gnt_core::{ClassTag, Network, ObjectId};
use tracing::debug;

use super::contraction::absorb;
use super::{line_voltage, new_node, same_voltage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Secondary,
    Coil,
    Unknown,
}

/// Resolve every over-connected transformer; returns the number of nodes created.
pub fn resolve_transformers(network: &mut Network) -> usize {
    let mut created = 0;
    for transformer in network.ids_where(|c| c.is_transformer()) {
        let neighbors = network.distinct_neighbors(transformer);
        if neighbors.len() <= 2 {
            continue;
        }
        let primary_kv = primary_voltage(network, transformer);
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        let mut coils = Vec::new();
        for n in neighbors {
            match classify(network, transformer, n, primary_kv) {
                Side::Primary => primary.push(n),
                Side::Secondary => secondary.push(n),
                Side::Coil => coils.push(n),
                Side::Unknown => {}
            }
        }
        debug!(
            pass = "transformer",
            transformer = %network[transformer].external_id,
            primary = primary.len(),
            secondary = secondary.len(),
            coils = coils.len(),
            "transformer sides classified"
        );

        if !primary.is_empty() || !coils.is_empty() {
            primary.extend(coils);
            created += consolidate(network, transformer, &primary, "primary");
        }
        if !secondary.is_empty() {
            created += consolidate(network, transformer, &secondary, "secondary");
        }
    }
    created
}

fn primary_voltage(network: &Network, transformer: ObjectId) -> Option<f64> {
    let object = &network[transformer];
    object
        .container
        .and_then(|c| network[c].voltage_level)
        .or(object.voltage_level)
}

fn classify(network: &Network, transformer: ObjectId, neighbor: ObjectId, primary_kv: Option<f64>) -> Side {
    let class = network.class(neighbor);
    let touches_coil = class.is_connectivity()
        && network
            .neighbors(neighbor)
            .iter()
            .any(|n| network.class(*n) == ClassTag::PetersenCoil);
    if class == ClassTag::PetersenCoil || touches_coil {
        return Side::Coil;
    }

    let kv = if class.is_line_segment() {
        network[neighbor].voltage_level
    } else if class.is_connectivity() {
        line_voltage(network, neighbor, transformer)
    } else {
        None
    };
    match (kv, primary_kv) {
        (Some(kv), Some(primary)) if same_voltage(kv, primary) => Side::Primary,
        (Some(_), Some(_)) => Side::Secondary,
        _ => Side::Unknown,
    }
}

/// Fold `members` into one node on the transformer; returns 1 if the node was new.
fn consolidate(network: &mut Network, transformer: ObjectId, members: &[ObjectId], side: &str) -> usize {
    let existing = members
        .iter()
        .copied()
        .find(|m| network.class(*m).is_connectivity());
    let (hub, created) = match existing {
        Some(hub) => (hub, 0),
        None => {
            let object = &network[transformer];
            let name = format!("{}-{side}", object.external_id);
            let at = object.geometry.first().copied().into_iter().collect();
            let hub = new_node(network, name, at);
            network.link(transformer, hub);
            (hub, 1)
        }
    };
    for &member in members {
        if member == hub {
            continue;
        }
        if network.class(member).is_connectivity() {
            absorb(network, member, hub);
        } else {
            network.reroute(member, transformer, hub);
        }
    }
    created
}
