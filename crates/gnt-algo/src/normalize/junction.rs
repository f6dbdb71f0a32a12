//! Junction insertion: every equipment-to-equipment link gets a node between.

use gnt_core::{Network, ObjectId, Point};

use super::busbar::normalize_busbars;
use super::{boundary_points, distance_or_inf, new_node};

/// Route busbar adjacencies through the busbar node, then splice a connectivity
/// node into each remaining direct equipment link.
///
/// Single-terminal equipment (a consumer fed through from one cable to the
/// next) gets one shared node for all of its links. A line linked twice to the
/// same equipment keeps both ends on the inserted node.
///
/// Returns the number of nodes inserted.
pub fn insert_junctions(network: &mut Network) -> usize {
    normalize_busbars(network, |c| c.is_conducting_equipment());

    let mut inserted = 0;
    for a in network.ids_where(|c| c.is_conducting_equipment()) {
        for b in network.distinct_neighbors(a) {
            if !network.class(b).is_conducting_equipment() {
                continue;
            }
            let ends = network.neighbors(a).iter().filter(|n| **n == b).count();
            let node = match shared_node(network, a).or_else(|| shared_node(network, b)) {
                Some(node) => node,
                None => {
                    let name = format!("{}-{}", network[a].external_id, network[b].external_id);
                    let at = junction_point(network, a, b).into_iter().collect();
                    inserted += 1;
                    new_node(network, name, at)
                }
            };
            network.unlink(a, b);
            for side in [a, b] {
                let links = if network.class(side).is_line_segment() { ends } else { 1 };
                if !network.is_linked(side, node) {
                    for _ in 0..links {
                        network.link(side, node);
                    }
                }
            }
        }
    }
    inserted
}

/// The node already serving single-terminal equipment, if it has one.
fn shared_node(network: &Network, eq: ObjectId) -> Option<ObjectId> {
    if !network.class(eq).is_single_terminal() {
        return None;
    }
    network
        .distinct_neighbors(eq)
        .into_iter()
        .find(|n| network.class(*n).is_connectivity())
}

/// Boundary point of `a` closest to any boundary point of `b`.
fn junction_point(network: &Network, a: ObjectId, b: ObjectId) -> Option<Point> {
    let ours = boundary_points(&network[a]);
    let theirs = boundary_points(&network[b]);
    if theirs.is_empty() {
        return ours.first().copied();
    }
    ours.into_iter()
        .min_by(|p, q| distance_or_inf(p, &theirs).total_cmp(&distance_or_inf(q, &theirs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnt_core::{ClassTag, IdentifiedObject};

    #[test]
    fn test_node_inserted_at_shared_end() {
        let mut net = Network::new();
        let line = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "line")
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
        );
        let fuse = net.add(
            IdentifiedObject::new(ClassTag::Fuse, "fuse").with_geometry(vec![Point::new(10.0, 0.1)]),
        );
        net.link(line, fuse);

        assert_eq!(insert_junctions(&mut net), 1);
        let [node] = net.neighbors(line)[..] else {
            panic!("line should have one neighbor");
        };
        assert_eq!(net.class(node), ClassTag::ConnectivityNode);
        assert_eq!(net[node].external_id, "line-fuse");
        assert_eq!(net[node].geometry, vec![Point::new(10.0, 0.0)]);
        assert_eq!(net.neighbors(fuse), &[node]);
    }

    #[test]
    fn test_fed_through_consumer_shares_one_node() {
        let mut net = Network::new();
        let load = net.add(
            IdentifiedObject::new(ClassTag::EnergyConsumer, "load").with_geometry(vec![Point::new(50.0, 0.0)]),
        );
        let c1 = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "c1")
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0)]),
        );
        let c2 = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "c2")
                .with_geometry(vec![Point::new(50.0, 0.0), Point::new(100.0, 0.0)]),
        );
        net.link(c1, load);
        net.link(load, c2);

        assert_eq!(insert_junctions(&mut net), 1);
        let [node] = net.neighbors(load)[..] else {
            panic!("consumer should have one node");
        };
        assert_eq!(net.distinct_neighbors(node), vec![load, c1, c2]);
        assert!(net.symmetry_violation().is_none());
    }

    #[test]
    fn test_line_looping_on_equipment_keeps_both_ends() {
        let mut net = Network::new();
        let brk = net.add(IdentifiedObject::new(ClassTag::Breaker, "brk"));
        let line = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "loop"));
        net.link(line, brk);
        net.link(line, brk);

        assert_eq!(insert_junctions(&mut net), 1);
        let node = net.neighbors(brk)[0];
        assert_eq!(net.neighbors(line), &[node, node]);
        assert_eq!(net.repeated_neighbor(line), Some(node));
        assert!(net.symmetry_violation().is_none());
    }

    #[test]
    fn test_busbar_links_use_busbar_node() {
        let mut net = Network::new();
        let bus = net.add(IdentifiedObject::new(ClassTag::BusbarSection, "bus"));
        let cn = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn"));
        let brk = net.add(IdentifiedObject::new(ClassTag::Breaker, "brk"));
        net.link(bus, cn);
        net.link(bus, brk);

        assert_eq!(insert_junctions(&mut net), 0);
        assert_eq!(net.neighbors(bus), &[cn]);
        assert!(net.is_linked(cn, brk));
    }
}
