//! Stable connectivity-node identifiers.
//!
//! Each node takes its identifier from a terminal of its anchoring neighbor:
//! busbar before transformer before switching device before line segment, the
//! larger identifier winning within a class. The terminal is the one the
//! terminal pass bound to the node. Anchors without bound terminals fall back to
//! the node's position in their neighbor list plus one.

use gnt_core::{DiagnosticCode, DiagnosticIssue, Diagnostics, Mrid, Network, ObjectId, PADDING_KEY};
use serde::Serialize;
use tracing::debug;

use super::NODE_TAG;

/// Counts from the identifier pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierStats {
    pub assigned: usize,
    /// Nodes deleted because nothing was attached to them
    pub removed_empty: usize,
    /// Nodes deleted because no anchor terminal was found
    pub unanchored: usize,
}

pub fn assign_node_identifiers(network: &mut Network, diag: &mut Diagnostics) -> IdentifierStats {
    let mut stats = IdentifierStats::default();
    for node in network.ids_where(|c| c.is_connectivity()) {
        if network[node].properties.contains(PADDING_KEY) {
            continue;
        }
        let neighbors = network.distinct_neighbors(node);
        if neighbors.is_empty() {
            network.delete(node);
            stats.removed_empty += 1;
            continue;
        }

        match anchored_mrid(network, node, &neighbors) {
            Some(mrid) => {
                network.get_mut(node).mrid = Some(mrid);
                stats.assigned += 1;
            }
            None => {
                diag.add(
                    DiagnosticIssue::error(
                        DiagnosticCode::UnanchoredConnectivityNode,
                        "No anchoring terminal for connectivity node",
                    )
                    .with_object(&network[node])
                    .with_geometry(network[node].geometry.clone())
                    .with_context("neighbors", neighbors.len()),
                );
                network.delete(node);
                stats.unanchored += 1;
            }
        }
    }
    debug!(pass = "identifiers", ?stats, "node identifiers assigned");
    stats
}

fn anchored_mrid(network: &Network, node: ObjectId, neighbors: &[ObjectId]) -> Option<Mrid> {
    let anchor = neighbors
        .iter()
        .copied()
        .filter_map(|n| {
            let priority = network.class(n).anchor_priority()?;
            Some((priority, network[n].mrid, n))
        })
        .max_by_key(|(priority, mrid, _)| (*priority, *mrid))?
        .2;
    let object = &network[anchor];
    let terminal = match object.terminals.iter().find(|t| t.node == Some(node)) {
        Some(terminal) => terminal,
        None => {
            let position = object.neighbors.iter().position(|n| *n == node)?;
            object.terminal(u8::try_from(position + 1).ok()?)?
        }
    };
    Some(terminal.mrid?.derive(NODE_TAG))
}
