//! Busbar normalization: one canonical connectivity node per busbar section.

use gnt_core::{ClassTag, Network, ObjectId};
use tracing::debug;

use super::contraction::absorb;
use super::new_node;

/// Route direct busbar links through a single canonical node.
///
/// Neighbors whose class satisfies `reroute` are unlinked from the busbar and
/// linked to its node instead. The first node neighbor is canonical; further
/// nodes are merged into it. A busbar with direct links but no node gets one
/// at its first geometry point. Returns the number of links changed.
pub fn normalize_busbars(network: &mut Network, reroute: fn(ClassTag) -> bool) -> usize {
    let mut changed = 0;
    for busbar in network.ids_where(|c| c.is_busbar()) {
        let neighbors = network.distinct_neighbors(busbar);
        let (nodes, direct): (Vec<ObjectId>, Vec<ObjectId>) = neighbors
            .into_iter()
            .partition(|n| network.class(*n).is_connectivity());
        let direct: Vec<ObjectId> = direct
            .into_iter()
            .filter(|n| reroute(network.class(*n)))
            .collect();
        if direct.is_empty() && nodes.len() <= 1 {
            continue;
        }

        let hub = match nodes.first() {
            Some(hub) => *hub,
            None => {
                let object = &network[busbar];
                let name = format!("{}-cn", object.external_id);
                let at = object.geometry.first().copied().into_iter().collect();
                let hub = new_node(network, name, at);
                network.link(busbar, hub);
                hub
            }
        };
        for extra in nodes.iter().skip(1) {
            absorb(network, *extra, hub);
            changed += 1;
        }
        for other in direct {
            network.reroute(other, busbar, hub);
            changed += 1;
        }
        debug!(pass = "busbar", busbar = %network[busbar].external_id, hub = %hub, "busbar normalized");
    }
    changed
}
