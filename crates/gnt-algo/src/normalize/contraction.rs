//! Connector contraction and node merging.

use gnt_core::{ClassTag, Network, ObjectId};
use tracing::debug;

/// Splice out degree-2 connectivity objects until none remain.
///
/// A sweep can expose new degree-2 connectors, so sweeps repeat until one
/// changes nothing. Returns the number of connectors deleted.
pub fn contract_connectors(network: &mut Network) -> usize {
    let mut contracted = 0;
    loop {
        let mut changed = false;
        for id in network.ids_where(|c| c.is_connectivity()) {
            if !network.is_deleted(id) && network.splice(id) {
                contracted += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    debug!(pass = "contraction", contracted, "connectors contracted");
    contracted
}

/// Turn every remaining connectivity edge into a connectivity node.
pub fn reclassify_edges(network: &mut Network) -> usize {
    let edges = network.ids_where(|c| c == ClassTag::ConnectivityEdge);
    for id in &edges {
        network.get_mut(*id).class = ClassTag::ConnectivityNode;
    }
    edges.len()
}

/// Merge connectivity nodes that are linked directly to another node.
pub fn merge_adjacent_nodes(network: &mut Network) -> usize {
    let mut merged = 0;
    for id in network.ids_where(|c| c.is_connectivity()) {
        if network.is_deleted(id) {
            continue;
        }
        loop {
            let other = network
                .distinct_neighbors(id)
                .into_iter()
                .find(|n| network.class(*n).is_connectivity());
            let Some(other) = other else {
                break;
            };
            absorb(network, other, id);
            merged += 1;
        }
    }
    merged
}

/// Collapse the nodes of single-terminal equipment into one.
pub fn merge_single_terminal_nodes(network: &mut Network) -> usize {
    let mut merged = 0;
    for id in network.ids_where(|c| c.is_single_terminal()) {
        let nodes: Vec<ObjectId> = network
            .distinct_neighbors(id)
            .into_iter()
            .filter(|n| network.class(*n).is_connectivity())
            .collect();
        if let Some((keep, rest)) = nodes.split_first() {
            for other in rest {
                absorb(network, *other, *keep);
                merged += 1;
            }
        }
    }
    if merged > 0 {
        debug!(pass = "single-terminal", merged, "equipment nodes merged");
    }
    merged
}

/// Move every link of `redundant` onto `keep` and delete it.
pub(crate) fn absorb(network: &mut Network, redundant: ObjectId, keep: ObjectId) {
    network.move_links(redundant, keep);
    network.delete(redundant);
}
