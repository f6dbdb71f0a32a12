//! Deterministic terminal ordering and padding.
//!
//! Downstream consumers key deltas on the node bound to each terminal, so
//! terminal 1 and terminal 2 must come out the same on every run. The order is
//! decided from the surrounding graph only:
//!
//! - line segments map their geometric ends onto the candidate nodes by
//!   comparing distances to the geometry around each node;
//! - transformers put the higher-voltage side first;
//! - other equipment ranks each node by its strongest neighbor class, then by
//!   the largest neighbor identifier.
//!
//! Equipment whose order cannot be decided is deleted and reported.
//!
//! Missing terminals are padded with unlinked nodes. Most equipment pads to two
//! terminals. Two classes do not: busbars keep at most one terminal and are
//! never padded, and single-terminal classes (consumers, coils, shunt
//! compensators, machines) pad to exactly one, since a second terminal on them
//! could only ever hold padding.

use gnt_core::geometry::nearest_distance;
use gnt_core::{
    DiagnosticCode, DiagnosticIssue, Diagnostics, IdentifiedObject, Mrid, Network, ObjectId, Point,
    PropertyValue, Terminal, PADDING_KEY,
};
use serde::Serialize;
use tracing::{debug, warn};

use super::{boundary_points, line_voltage, new_node, same_voltage, terminal_tag, NODE_TAG};

// Distance differences below this are ties.
const DISTANCE_EPSILON: f64 = 1e-9;

/// Counts from the terminal pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalStats {
    /// Equipment whose terminals were bound
    pub assigned: usize,
    /// Padding nodes created
    pub padded: usize,
    /// Equipment deleted because its order was undecidable
    pub unresolved: usize,
    /// Equipment that had more nodes than terminals
    pub wrong_count: usize,
}

/// Bind every conducting equipment's nodes to numbered terminals.
pub fn assign_terminals(network: &mut Network, diag: &mut Diagnostics) -> TerminalStats {
    let mut stats = TerminalStats::default();
    for eq in network.ids_where(|c| c.is_conducting_equipment()) {
        let class = network.class(eq);
        let capacity = if class.is_busbar() || class.is_single_terminal() { 1 } else { 2 };
        let mut nodes: Vec<ObjectId> = network
            .distinct_neighbors(eq)
            .into_iter()
            .filter(|n| network.class(*n).is_connectivity())
            .collect();

        if nodes.len() > capacity {
            warn!(equipment = %network[eq].external_id, nodes = nodes.len(), "too many terminals");
            diag.add(
                DiagnosticIssue::error(
                    DiagnosticCode::WrongNumberOfTerminals,
                    format!("Expected at most {capacity} terminals, found {}", nodes.len()),
                )
                .with_object(&network[eq]),
            );
            for n in nodes.drain(..) {
                network.unlink(eq, n);
            }
            stats.wrong_count += 1;
        }

        let slots = match nodes[..] {
            [a, b] => {
                let keep = if class.is_line_segment() {
                    order_line(network, eq, a, b)
                } else {
                    order_equipment(network, eq, a, b)
                };
                match keep {
                    Some(true) => vec![Some(a), Some(b)],
                    Some(false) => vec![Some(b), Some(a)],
                    None => {
                        diag.add(
                            DiagnosticIssue::error(
                                DiagnosticCode::UnresolvableTerminalOrdering,
                                "Terminal order cannot be decided",
                            )
                            .with_object(&network[eq])
                            .with_geometry(network[eq].geometry.clone()),
                        );
                        network.delete(eq);
                        stats.unresolved += 1;
                        continue;
                    }
                }
            }
            [only] if capacity == 2 && class.is_line_segment() && binds_to_stop(network, eq, only) => {
                vec![None, Some(only)]
            }
            _ => {
                let mut slots: Vec<Option<ObjectId>> = nodes.iter().copied().map(Some).collect();
                slots.resize(capacity, None);
                slots
            }
        };

        // Busbars without a node get no terminal at all.
        if class.is_busbar() && slots.iter().all(Option::is_none) {
            continue;
        }
        stats.padded += bind(network, eq, &slots);
        stats.assigned += 1;
    }
    debug!(pass = "terminals", ?stats, "terminals assigned");
    stats
}

/// Whether node `a` belongs on terminal 1 of line `line`, with `b` on terminal 2.
fn order_line(network: &Network, line: ObjectId, a: ObjectId, b: ObjectId) -> Option<bool> {
    if let Some((start, stop)) = network[line].ends() {
        let first = [around(network, a, &[line]), around(network, b, &[line])];
        if let Some(keep) = compare_mapping(&start, &stop, &first) {
            return Some(keep);
        }
        let second = [
            second_ring(network, a, &[line, a, b]),
            second_ring(network, b, &[line, a, b]),
        ];
        if let Some(keep) = compare_mapping(&start, &stop, &second) {
            return Some(keep);
        }
    }

    // A dangling leaf takes the far end.
    let is_leaf = |n: ObjectId| network.distinct_neighbors(n).iter().all(|x| *x == line);
    match (is_leaf(a), is_leaf(b)) {
        (true, false) => Some(false),
        (false, true) | (true, true) => Some(true),
        (false, false) => None,
    }
}

/// Compare the start→a/stop→b mapping against the swapped one.
fn compare_mapping(start: &Point, stop: &Point, geometry: &[Vec<Point>; 2]) -> Option<bool> {
    let d = |p: &Point, g: &[Point]| nearest_distance(p, g).unwrap_or(0.0);
    let direct = d(start, &geometry[0]) + d(stop, &geometry[1]);
    let swapped = d(stop, &geometry[0]) + d(start, &geometry[1]);
    if (direct - swapped).abs() <= DISTANCE_EPSILON {
        None
    } else {
        Some(direct < swapped)
    }
}

/// Boundary geometry of the neighbors of `node`, skipping `exclude`.
fn around(network: &Network, node: ObjectId, exclude: &[ObjectId]) -> Vec<Point> {
    network
        .distinct_neighbors(node)
        .into_iter()
        .filter(|n| !exclude.contains(n))
        .flat_map(|n| boundary_points(&network[n]))
        .collect()
}

/// Boundary geometry one node further out from `node`.
fn second_ring(network: &Network, node: ObjectId, exclude: &[ObjectId]) -> Vec<Point> {
    let mut points = Vec::new();
    for n in network.distinct_neighbors(node) {
        if exclude.contains(&n) {
            continue;
        }
        let mut skip = exclude.to_vec();
        skip.push(n);
        points.extend(around(network, n, &skip));
    }
    points
}

/// A lone node sits on terminal 2 when its surroundings are closer to the line's stop.
fn binds_to_stop(network: &Network, line: ObjectId, node: ObjectId) -> bool {
    let Some((start, stop)) = network[line].ends() else {
        return false;
    };
    let geometry = around(network, node, &[line]);
    match (nearest_distance(&start, &geometry), nearest_distance(&stop, &geometry)) {
        (Some(ds), Some(de)) => de + DISTANCE_EPSILON < ds,
        _ => false,
    }
}

/// Whether node `a` belongs on terminal 1 of equipment `eq`, with `b` on terminal 2.
fn order_equipment(network: &Network, eq: ObjectId, a: ObjectId, b: ObjectId) -> Option<bool> {
    if network.class(eq).is_transformer() {
        if let (Some(va), Some(vb)) = (line_voltage(network, a, eq), line_voltage(network, b, eq)) {
            if !same_voltage(va, vb) {
                return Some(va > vb);
            }
        }
    }

    let (rank_a, rank_b) = (node_rank(network, a, eq), node_rank(network, b, eq));
    if rank_a != rank_b {
        return Some(rank_a > rank_b);
    }
    let (max_a, max_b) = (max_neighbor_mrid(network, a, eq), max_neighbor_mrid(network, b, eq));
    if max_a != max_b {
        return Some(max_a > max_b);
    }
    None
}

/// Strongest class rank among the node's other neighbors.
fn node_rank(network: &Network, node: ObjectId, except: ObjectId) -> u8 {
    network
        .distinct_neighbors(node)
        .into_iter()
        .filter(|n| *n != except)
        .map(|n| network.class(n).terminal_rank())
        .max()
        .unwrap_or(0)
}

fn max_neighbor_mrid(network: &Network, node: ObjectId, except: ObjectId) -> Option<Mrid> {
    network
        .distinct_neighbors(node)
        .into_iter()
        .filter(|n| *n != except)
        .filter_map(|n| network[n].mrid)
        .max()
}

/// Write terminals for `slots`, creating padding nodes for empty ones.
///
/// Reorders the equipment's neighbor list to match terminal order and returns
/// the number of padding nodes created.
fn bind(network: &mut Network, eq: ObjectId, slots: &[Option<ObjectId>]) -> usize {
    let mut padded = 0;
    let mut terminals = Vec::with_capacity(slots.len());
    for (i, slot) in slots.iter().enumerate() {
        let sequence = (i + 1) as u8;
        let object = &network[eq];
        let mrid = object.mrid.map(|m| m.derive(terminal_tag(sequence)));
        let point = end_point(object, sequence);
        let node = match slot {
            Some(node) => *node,
            None => {
                padded += 1;
                pad(network, eq, sequence, mrid, point)
            }
        };
        terminals.push(Terminal {
            sequence,
            mrid,
            node: Some(node),
            point: point.filter(|_| network.class(eq).is_line_segment()),
        });
    }

    let order: Vec<ObjectId> = slots.iter().flatten().copied().collect();
    let object = network.get_mut(eq);
    object.terminals = terminals;
    object
        .neighbors
        .sort_by_key(|n| order.iter().position(|o| o == n).unwrap_or(usize::MAX));
    padded
}

/// Geometric location of terminal `sequence`: a line end, or the equipment point.
fn end_point(object: &IdentifiedObject, sequence: u8) -> Option<Point> {
    match object.ends() {
        Some((start, stop)) if object.class.is_line_segment() => {
            Some(if sequence == 1 { start } else { stop })
        }
        _ => object.geometry.first().copied(),
    }
}

/// Create an unlinked node that only fills a terminal.
fn pad(
    network: &mut Network,
    eq: ObjectId,
    sequence: u8,
    terminal_mrid: Option<Mrid>,
    point: Option<Point>,
) -> ObjectId {
    let name = format!("{}-pad{sequence}", network[eq].external_id);
    let node = new_node(network, name, point.into_iter().collect());
    let object = network.get_mut(node);
    object.mrid = terminal_mrid.map(|m| m.derive(NODE_TAG));
    object.properties.insert(PADDING_KEY, PropertyValue::Object(eq));
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnt_core::ClassTag;

    fn obj(net: &mut Network, class: ClassTag, name: &str, mrid: u128) -> ObjectId {
        net.add(IdentifiedObject::new(class, name).with_mrid(Mrid::from_u128(mrid)))
    }

    fn node(net: &mut Network, name: &str) -> ObjectId {
        net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, name))
    }

    #[test]
    fn test_switch_busbar_side_is_terminal_one() {
        let mut net = Network::new();
        let sw = obj(&mut net, ClassTag::Disconnector, "sw", 1);
        let line_side = node(&mut net, "line-side");
        let bus_side = node(&mut net, "bus-side");
        let line = obj(&mut net, ClassTag::AcLineSegment, "line", 2);
        let bus = obj(&mut net, ClassTag::BusbarSection, "bus", 3);
        net.link(sw, line_side);
        net.link(sw, bus_side);
        net.link(line_side, line);
        net.link(bus_side, bus);

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert_eq!(stats.unresolved, 0);
        assert_eq!(net[sw].terminal(1).unwrap().node, Some(bus_side));
        assert_eq!(net[sw].terminal(2).unwrap().node, Some(line_side));
        assert_eq!(net.neighbors(sw), &[bus_side, line_side]);
        assert_eq!(
            net[sw].terminal(1).unwrap().mrid,
            Some(Mrid::from_u128(1).derive(terminal_tag(1)))
        );
    }

    #[test]
    fn test_rank_tie_broken_by_larger_identifier() {
        let mut net = Network::new();
        let brk = obj(&mut net, ClassTag::Breaker, "brk", 1);
        let a = node(&mut net, "a");
        let b = node(&mut net, "b");
        let low = obj(&mut net, ClassTag::AcLineSegment, "low", 10);
        let high = obj(&mut net, ClassTag::AcLineSegment, "high", 20);
        net.link(brk, a);
        net.link(brk, b);
        net.link(a, low);
        net.link(b, high);

        let mut diag = Diagnostics::new();
        assign_terminals(&mut net, &mut diag);
        assert_eq!(net[brk].terminal(1).unwrap().node, Some(b));
    }

    #[test]
    fn test_transformer_higher_voltage_first() {
        let mut net = Network::new();
        let t = obj(&mut net, ClassTag::PowerTransformer, "t", 1);
        let lv = node(&mut net, "lv");
        let hv = node(&mut net, "hv");
        let lv_line = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "l").with_voltage(0.4));
        let hv_line = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "h").with_voltage(22.0));
        net.link(t, lv);
        net.link(t, hv);
        net.link(lv, lv_line);
        net.link(hv, hv_line);

        let mut diag = Diagnostics::new();
        assign_terminals(&mut net, &mut diag);
        assert_eq!(net[t].terminal(1).unwrap().node, Some(hv));
    }

    #[test]
    fn test_line_ends_follow_neighbor_geometry() {
        let mut net = Network::new();
        let line = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "line")
                .with_mrid(Mrid::from_u128(5))
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
        );
        let far = node(&mut net, "far");
        let near = node(&mut net, "near");
        let f1 = net.add(
            IdentifiedObject::new(ClassTag::Fuse, "f1").with_geometry(vec![Point::new(10.0, 0.0)]),
        );
        let f2 = net.add(
            IdentifiedObject::new(ClassTag::Fuse, "f2").with_geometry(vec![Point::new(0.0, 0.0)]),
        );
        net.link(line, far);
        net.link(line, near);
        net.link(far, f1);
        net.link(near, f2);

        let mut diag = Diagnostics::new();
        assign_terminals(&mut net, &mut diag);
        let t1 = net[line].terminal(1).unwrap();
        assert_eq!(t1.node, Some(near));
        assert_eq!(t1.point, Some(Point::new(0.0, 0.0)));
        assert_eq!(net[line].terminal(2).unwrap().node, Some(far));
    }

    #[test]
    fn test_dangling_leaf_takes_terminal_two() {
        let mut net = Network::new();
        let line = obj(&mut net, ClassTag::AcLineSegment, "line", 5);
        let leaf = node(&mut net, "leaf");
        let joined = node(&mut net, "joined");
        let other = obj(&mut net, ClassTag::AcLineSegment, "other", 6);
        net.link(line, leaf);
        net.link(line, joined);
        net.link(joined, other);

        let mut diag = Diagnostics::new();
        assign_terminals(&mut net, &mut diag);
        assert_eq!(net[line].terminal(1).unwrap().node, Some(joined));
        assert_eq!(net[line].terminal(2).unwrap().node, Some(leaf));
    }

    #[test]
    fn test_lone_node_near_stop_binds_terminal_two() {
        let mut net = Network::new();
        let line = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "line")
                .with_mrid(Mrid::from_u128(5))
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
        );
        let cn = node(&mut net, "cn");
        let fuse = net.add(
            IdentifiedObject::new(ClassTag::Fuse, "fuse").with_geometry(vec![Point::new(10.0, 0.0)]),
        );
        net.link(line, cn);
        net.link(cn, fuse);

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert_eq!(net[line].terminal(2).unwrap().node, Some(cn));
        let pad = net[line].terminal(1).unwrap().node.unwrap();
        assert_eq!(net[pad].external_id, "line-pad1");
        assert_eq!(net[line].terminal(1).unwrap().point, Some(Point::new(0.0, 0.0)));
        // fuse pads its second terminal, the line its first
        assert_eq!(stats.padded, 2);
    }

    #[test]
    fn test_lone_node_near_start_binds_terminal_one() {
        let mut net = Network::new();
        let line = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "line")
                .with_mrid(Mrid::from_u128(5))
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
        );
        let cn = node(&mut net, "cn");
        let fuse = net.add(
            IdentifiedObject::new(ClassTag::Fuse, "fuse").with_geometry(vec![Point::new(0.0, 0.0)]),
        );
        net.link(line, cn);
        net.link(cn, fuse);

        let mut diag = Diagnostics::new();
        assign_terminals(&mut net, &mut diag);
        assert_eq!(net[line].terminal(1).unwrap().node, Some(cn));
        let pad = net[line].terminal(2).unwrap().node.unwrap();
        assert_eq!(net[pad].external_id, "line-pad2");
    }

    #[test]
    fn test_consumer_gets_a_single_terminal() {
        let mut net = Network::new();
        let load = obj(&mut net, ClassTag::EnergyConsumer, "load", 4);
        let cn = node(&mut net, "cn");
        net.link(load, cn);

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert_eq!(stats.padded, 0);
        assert_eq!(net[load].terminals.len(), 1);
        assert_eq!(net[load].terminal(1).unwrap().node, Some(cn));
    }

    #[test]
    fn test_undecidable_order_deletes_equipment() {
        let mut net = Network::new();
        let brk = obj(&mut net, ClassTag::Breaker, "brk", 1);
        let a = node(&mut net, "a");
        let b = node(&mut net, "b");
        let l1 = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "l1"));
        let l2 = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "l2"));
        net.link(brk, a);
        net.link(brk, b);
        net.link(a, l1);
        net.link(b, l2);

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert!(net.is_deleted(brk));
        assert_eq!(stats.unresolved, 1);
        assert_eq!(diag.count(DiagnosticCode::UnresolvableTerminalOrdering), 1);
    }

    #[test]
    fn test_missing_terminals_are_padded() {
        let mut net = Network::new();
        let fuse = obj(&mut net, ClassTag::Fuse, "fuse", 9);
        let a = node(&mut net, "a");
        net.link(fuse, a);

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert_eq!(stats.padded, 1);
        let pad = net[fuse].terminal(2).unwrap().node.unwrap();
        assert_eq!(net[pad].external_id, "fuse-pad2");
        assert!(net.neighbors(pad).is_empty());
        assert_eq!(net[pad].properties.get(PADDING_KEY), Some(&PropertyValue::Object(fuse)));
        assert_eq!(
            net[pad].mrid,
            Some(Mrid::from_u128(9).derive(terminal_tag(2)).derive(NODE_TAG))
        );
    }

    #[test]
    fn test_excess_nodes_are_cleared() {
        let mut net = Network::new();
        let brk = obj(&mut net, ClassTag::Breaker, "brk", 1);
        for name in ["a", "b", "c"] {
            let n = node(&mut net, name);
            net.link(brk, n);
        }

        let mut diag = Diagnostics::new();
        let stats = assign_terminals(&mut net, &mut diag);
        assert_eq!(stats.wrong_count, 1);
        assert_eq!(stats.padded, 2);
        assert!(net.neighbors(brk).is_empty());
        assert_eq!(net[brk].terminals.len(), 2);
        assert_eq!(diag.count(DiagnosticCode::WrongNumberOfTerminals), 1);
    }
}
