//! Connectivity normalization.
//!
//! Rewrites the raw ingestion graph into a standard topology: one connectivity node
//! per junction, busbars and transformers with clean terminals, deterministic
//! terminal order and stable node identifiers.
//!
//! # Passes
//!
//! Order matters; later passes rely on what earlier ones established.
//!
//! | # | Pass | Module |
//! |---|------|--------|
//! | 1 | Auxiliary-device detachment | [`auxiliary`] |
//! | 2 | Cartographic-connector contraction | [`contraction`] |
//! | 3 | Busbar normalization | [`busbar`] |
//! | 4 | Edge-to-node reclassification | [`contraction`] |
//! | 5 | Second contraction | [`contraction`] |
//! | 6 | Transformer terminal resolution | [`transformer`] |
//! | 7 | Adjacent-node and single-terminal merges | [`contraction`] |
//! | 7b | Junction insertion | [`junction`] |
//! | 8 | Self-loop removal | here |
//! | 9 | Terminal ordering and padding | [`terminals`] |
//! | 10 | Duplicate-neighbor removal | here |
//! | 11 | Stable node identifiers | [`identifiers`] |
//! | 12 | Transformer sanity checks | [`sanity`] |
//!
//! Every pass walks objects in handle order, so the result depends only on the
//! input graph.
//!
//! # Example
//!
//! ```
//! use gnt_algo::normalize::normalize;
//! use gnt_core::{ClassTag, Diagnostics, IdentifiedObject, Mrid, Network};
//!
//! let mut network = Network::new();
//! let x = network.add(IdentifiedObject::new(ClassTag::Breaker, "x").with_mrid(Mrid::from_u128(1)));
//! let c = network.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "c"));
//! let y = network.add(IdentifiedObject::new(ClassTag::Fuse, "y").with_mrid(Mrid::from_u128(2)));
//! network.link(x, c);
//! network.link(c, y);
//!
//! let mut diag = Diagnostics::new();
//! let report = normalize(&mut network, &mut diag).unwrap();
//! assert_eq!(report.connectors_contracted, 1);
//! ```

pub mod auxiliary;
pub mod busbar;
pub mod contraction;
pub mod identifiers;
pub mod junction;
pub mod sanity;
pub mod terminals;
pub mod transformer;

use gnt_core::geometry::nearest_distance;
use gnt_core::{
    ClassTag, DiagnosticCode, DiagnosticIssue, Diagnostics, IdentifiedObject, Network, ObjectId,
    Point, TopologyResult,
};
use serde::Serialize;
use tracing::{debug, info};

/// Tag mixed into a terminal identifier to derive its connectivity node's identifier.
pub const NODE_TAG: u64 = 0x434e_4f44_45;

/// Tag mixed into an equipment identifier to derive the identifier of terminal `sequence`.
pub fn terminal_tag(sequence: u8) -> u64 {
    0x5445_524d_0000 + sequence as u64
}

// Voltage levels closer than this are the same level.
const VOLTAGE_EPSILON: f64 = 1e-6;

/// Per-pass counts from one normalization run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub auxiliary_detached: usize,
    pub connectors_contracted: usize,
    pub busbar_links_rerouted: usize,
    pub edges_reclassified: usize,
    pub transformer_nodes_created: usize,
    pub nodes_merged: usize,
    pub junctions_inserted: usize,
    pub self_loops_removed: usize,
    pub terminals: terminals::TerminalStats,
    pub duplicate_links_removed: usize,
    pub identifiers: identifiers::IdentifierStats,
    pub sanity_issues: usize,
}

/// Run every normalization pass in order.
///
/// Fails only on structural corruption that no pass can repair.
pub fn normalize(network: &mut Network, diag: &mut Diagnostics) -> TopologyResult<NormalizeReport> {
    let mut report = NormalizeReport {
        auxiliary_detached: auxiliary::detach_auxiliary(network, diag),
        ..NormalizeReport::default()
    };
    report.connectors_contracted = contraction::contract_connectors(network);
    report.busbar_links_rerouted = busbar::normalize_busbars(network, |c| c.is_line_segment());
    report.edges_reclassified = contraction::reclassify_edges(network);
    report.connectors_contracted += contraction::contract_connectors(network);
    report.transformer_nodes_created = transformer::resolve_transformers(network);
    report.nodes_merged = contraction::merge_adjacent_nodes(network)
        + contraction::merge_single_terminal_nodes(network);
    report.junctions_inserted = junction::insert_junctions(network);
    debug!(?report, "topology rewritten");

    report.self_loops_removed = remove_self_loops(network, diag);
    report.terminals = terminals::assign_terminals(network, diag);
    report.duplicate_links_removed = remove_duplicate_links(network);
    report.identifiers = identifiers::assign_node_identifiers(network, diag);
    report.sanity_issues = sanity::check_transformers(network, diag)?;

    info!(
        live = network.len(),
        deleted = network.deleted_count(),
        contracted = report.connectors_contracted,
        self_loops = report.self_loops_removed,
        "normalization complete"
    );
    Ok(report)
}

/// Delete line segments whose ends both land on the same node.
///
/// A line lists one neighbor entry per connected end, so a loop shows up as the
/// same neighbor twice (or as two terminals bound to one node). A line with a
/// single entry has a free end and is kept.
pub fn remove_self_loops(network: &mut Network, diag: &mut Diagnostics) -> usize {
    let mut removed = 0;
    for line in network.ids_where(|c| c.is_line_segment()) {
        let Some(node) = network
            .repeated_neighbor(line)
            .or_else(|| looped_terminal(&network[line]))
        else {
            continue;
        };
        diag.add(
            DiagnosticIssue::error(DiagnosticCode::SelfLoop, "Both ends connect to the same node")
                .with_object(&network[line])
                .with_context("node", &network[node].external_id),
        );
        network.delete(line);
        removed += 1;
    }
    removed
}

fn looped_terminal(line: &IdentifiedObject) -> Option<ObjectId> {
    match (line.terminal(1)?.node, line.terminal(2)?.node) {
        (Some(a), Some(b)) if a == b => Some(a),
        _ => None,
    }
}

/// Collapse repeated neighbor entries on every object.
pub fn remove_duplicate_links(network: &mut Network) -> usize {
    network
        .ids()
        .into_iter()
        .filter(|id| network.dedup_neighbors(*id))
        .count()
}

/// Add a connectivity node that is not linked to anything yet.
pub(crate) fn new_node(
    network: &mut Network,
    external_id: String,
    geometry: Vec<Point>,
) -> ObjectId {
    network.add(IdentifiedObject::new(ClassTag::ConnectivityNode, external_id).with_geometry(geometry))
}

/// Points where other objects can attach: line ends, or the whole geometry otherwise.
pub(crate) fn boundary_points(object: &IdentifiedObject) -> Vec<Point> {
    match object.ends() {
        Some((start, stop)) if object.class.is_line_segment() => vec![start, stop],
        _ => object.geometry.clone(),
    }
}

pub(crate) fn same_voltage(a: f64, b: f64) -> bool {
    (a - b).abs() < VOLTAGE_EPSILON
}

/// Distance from `point` to the nearest of `candidates`, or infinity.
pub(crate) fn distance_or_inf(point: &Point, candidates: &[Point]) -> f64 {
    nearest_distance(point, candidates).unwrap_or(f64::INFINITY)
}

/// Highest voltage among line segments attached to `node`, ignoring `except`.
pub(crate) fn line_voltage(network: &Network, node: ObjectId, except: ObjectId) -> Option<f64> {
    network
        .distinct_neighbors(node)
        .into_iter()
        .filter(|n| *n != except && network.class(*n).is_line_segment())
        .filter_map(|n| network[n].voltage_level)
        .max_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnt_core::Terminal;

    #[test]
    fn test_self_loop_is_removed_from_container() {
        let mut net = Network::new();
        let bay = net.add(IdentifiedObject::new(ClassTag::Bay, "bay"));
        let node = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn"));
        let line = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "loop"));
        net.add_child(bay, line);
        net.link(line, node);
        net.link(line, node);

        let mut diag = Diagnostics::new();
        assert_eq!(remove_self_loops(&mut net, &mut diag), 1);
        assert!(net.is_deleted(line));
        assert!(net.children(bay).is_empty());
        assert!(net.neighbors(node).is_empty());
        assert_eq!(diag.count(DiagnosticCode::SelfLoop), 1);
    }

    #[test]
    fn test_line_with_one_free_end_is_kept() {
        let mut net = Network::new();
        let node = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn"));
        let line = net.add(IdentifiedObject::new(ClassTag::AcLineSegment, "stub"));
        let brk = net.add(IdentifiedObject::new(ClassTag::Breaker, "brk"));
        net.link(line, node);
        net.link(brk, node);

        let mut diag = Diagnostics::new();
        assert_eq!(remove_self_loops(&mut net, &mut diag), 0);
        assert!(!net.is_deleted(line));
        assert_eq!(diag.count(DiagnosticCode::SelfLoop), 0);
    }

    #[test]
    fn test_terminals_on_one_node_are_a_self_loop() {
        let mut net = Network::new();
        let node = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn"));
        let mut object = IdentifiedObject::new(ClassTag::AcLineSegment, "loop");
        object.terminals = vec![Terminal::new(1, Some(node)), Terminal::new(2, Some(node))];
        let line = net.add(object);
        net.link(line, node);

        let mut diag = Diagnostics::new();
        assert_eq!(remove_self_loops(&mut net, &mut diag), 1);
        assert!(net.is_deleted(line));
    }

    #[test]
    fn test_duplicate_links_collapse_symmetrically() {
        let mut net = Network::new();
        let a = net.add(IdentifiedObject::new(ClassTag::Breaker, "a"));
        let b = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "b"));
        net.link(a, b);
        net.link(a, b);
        assert_eq!(remove_duplicate_links(&mut net), 1);
        assert_eq!(net.neighbors(a), &[b]);
        assert_eq!(net.neighbors(b), &[a]);
    }

    #[test]
    fn test_terminal_tags_differ() {
        assert_ne!(terminal_tag(1), terminal_tag(2));
        assert_ne!(terminal_tag(1), NODE_TAG);
    }
}
