//! Topology validation that runs on the raw or normalized graph.
//!
//! The validator never mutates the network. Findings go to the diagnostics sink:
//!
//! - **Containment**: equipment that must sit in a container, and its distance to
//!   the container root
//! - **Voltage level**: presence on classes that carry one
//! - **Dangling ends**: line and cartographic-edge ends that lead nowhere, with a
//!   proximity-based reason for lines
//!
//! Proximity scans run in parallel; each end's reason only depends on read-only
//! candidate sets, so results are independent of scheduling.

use gnt_core::geometry::distance_to_polyline;
use gnt_core::{
    ClassTag, DanglingReason, DiagnosticCode, DiagnosticIssue, Diagnostics, IdentifiedObject,
    Network, ObjectId, Point, TopologyConfig, ValidationMode,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Counts from one validation run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub objects_checked: usize,
    pub containment_issues: usize,
    pub missing_voltage: usize,
    pub dangling_ends: usize,
}

/// One dangling end awaiting classification.
#[derive(Debug, Clone)]
struct DanglingEnd {
    object: ObjectId,
    /// Terminal number, or 1/2 for the geometry start/end before terminals exist
    end: u8,
    point: Point,
}

/// Geometry of a proximity candidate.
struct Candidate {
    object: ObjectId,
    geometry: Vec<Point>,
}

/// Validate a network and populate diagnostics with any issues found.
pub fn validate_topology(
    network: &Network,
    config: &TopologyConfig,
    diag: &mut Diagnostics,
) -> ValidationSummary {
    let mut summary = ValidationSummary::default();

    for (id, object) in network.iter() {
        summary.objects_checked += 1;
        summary.containment_issues += check_containment(network, id, object, config, diag);
        if object.class.requires_voltage_level() && object.voltage_level.is_none() {
            summary.missing_voltage += 1;
            diag.add_warning_for(
                DiagnosticCode::ComponentMissingVoltageLevel,
                "Voltage level is missing",
                object,
            );
        }
    }

    summary.dangling_ends = check_dangling(network, config, diag);

    info!(
        objects = summary.objects_checked,
        containment = summary.containment_issues,
        voltage = summary.missing_voltage,
        dangling = summary.dangling_ends,
        "validation complete"
    );
    summary
}

// =============================================================================
// Containment
// =============================================================================

fn needs_container(object: &IdentifiedObject) -> bool {
    object.class.requires_container()
        || (object.class.is_line_segment() && object.properties.get_bool("internal") == Some(true))
}

fn check_containment(
    network: &Network,
    id: ObjectId,
    object: &IdentifiedObject,
    config: &TopologyConfig,
    diag: &mut Diagnostics,
) -> usize {
    if !needs_container(object) {
        return 0;
    }
    if object.container.is_none() {
        diag.add_warning_for(
            DiagnosticCode::ComponentHasNoParent,
            "Equipment is not placed in any container",
            object,
        );
        return 1;
    }

    let Some(root) = network
        .root_container(id)
        .filter(|r| network.class(*r).is_root_container())
    else {
        diag.add_warning_for(
            DiagnosticCode::ComponentNoRootParent,
            "Container tree has no substation or enclosure at its root",
            object,
        );
        return 1;
    };

    let root_object = &network[root];
    let distance = object
        .geometry
        .first()
        .and_then(|p| distance_to_polyline(p, &root_object.geometry));
    match distance {
        Some(d) if d > config.parent_radius => {
            diag.add(
                DiagnosticIssue::warning(
                    DiagnosticCode::ComponentParentTooFar,
                    format!(
                        "{:.1} from {} {}, limit {:.1}",
                        d, root_object.class, root_object.external_id, config.parent_radius
                    ),
                )
                .with_object(object)
                .with_context("container", &root_object.external_id)
                .with_context("distance", format!("{d:.3}")),
            );
            1
        }
        _ => 0,
    }
}

// =============================================================================
// Dangling ends
// =============================================================================

/// Neighbor attached at a geometric line end: the one whose geometry touches the
/// end point, else the neighbor in list position.
fn end_neighbor(
    network: &Network,
    line: &IdentifiedObject,
    index: usize,
    point: &Point,
    tolerance: f64,
) -> Option<ObjectId> {
    line.neighbors
        .iter()
        .copied()
        .find(|n| distance_to_polyline(point, &network[*n].geometry).is_some_and(|d| d <= tolerance))
        .or_else(|| line.neighbors.get(index).copied())
}

/// Ends of a line as (end number, coordinate, attached neighbor).
///
/// Ordered terminals take precedence over raw geometry once they are assigned.
fn line_ends(
    network: &Network,
    line: &IdentifiedObject,
    tolerance: f64,
) -> Vec<(u8, Point, Option<ObjectId>)> {
    let Some((start, stop)) = line.ends() else {
        return Vec::new();
    };
    if !line.terminals.is_empty() {
        return line
            .terminals
            .iter()
            .map(|t| {
                let fallback = if t.sequence == 1 { start } else { stop };
                let node = t.node.filter(|n| !network.is_deleted(*n));
                (t.sequence, t.point.unwrap_or(fallback), node)
            })
            .collect();
    }
    [start, stop]
        .into_iter()
        .enumerate()
        .map(|(index, point)| {
            let neighbor = end_neighbor(network, line, index, &point, tolerance);
            (index as u8 + 1, point, neighbor)
        })
        .collect()
}

fn is_dangling(network: &Network, neighbor: Option<ObjectId>) -> bool {
    match neighbor {
        None => true,
        Some(n) => {
            !network.class(n).terminates_line() && network.distinct_neighbors(n).len() < 2
        }
    }
}

fn dangling_ends(network: &Network, class: ClassTag, tolerance: f64) -> Vec<DanglingEnd> {
    let mut ends = Vec::new();
    for (id, object) in network.iter().filter(|(_, o)| o.class == class) {
        for (end, point, neighbor) in line_ends(network, object, tolerance) {
            if is_dangling(network, neighbor) {
                ends.push(DanglingEnd {
                    object: id,
                    end,
                    point,
                });
            }
        }
    }
    ends
}

fn candidates(network: &Network, class: ClassTag) -> Vec<Candidate> {
    network
        .iter()
        .filter(|(_, o)| o.class == class && !o.geometry.is_empty())
        .map(|(object, o)| Candidate {
            object,
            geometry: o.geometry.clone(),
        })
        .collect()
}

fn any_within(candidates: &[Candidate], point: &Point, radius: f64, skip: ObjectId) -> bool {
    candidates.par_iter().any(|c| {
        c.object != skip
            && distance_to_polyline(point, &c.geometry).is_some_and(|d| d <= radius)
    })
}

fn check_dangling(network: &Network, config: &TopologyConfig, diag: &mut Diagnostics) -> usize {
    let tolerance = config.tolerance();
    let cable_ends = dangling_ends(network, ClassTag::AcLineSegment, tolerance);
    let edge_ends = dangling_ends(network, ClassTag::ConnectivityEdge, tolerance);
    debug!(lines = cable_ends.len(), edges = edge_ends.len(), "dangling ends found");

    let reasons: Vec<DanglingReason> = match config.validation_mode {
        ValidationMode::Fast => vec![DanglingReason::Unclassified; cable_ends.len()],
        ValidationMode::Slow => {
            let bays = candidates(network, ClassTag::Bay);
            let consumers = candidates(network, ClassTag::EnergyConsumer);
            let enclosures = candidates(network, ClassTag::Enclosure);
            let loose: Vec<Candidate> = cable_ends
                .iter()
                .map(|e| Candidate {
                    object: e.object,
                    geometry: vec![e.point],
                })
                .collect();
            let radii = &config.radii;
            cable_ends
                .par_iter()
                .map(|end| {
                    let p = &end.point;
                    if any_within(&bays, p, radii.bay, end.object) {
                        DanglingReason::NearBay
                    } else if any_within(&consumers, p, radii.consumer, end.object) {
                        DanglingReason::NearConsumer
                    } else if any_within(&loose, p, radii.dangling, end.object) {
                        DanglingReason::NearDanglingEnd
                    } else if any_within(&enclosures, p, radii.enclosure, end.object) {
                        DanglingReason::NearEnclosure
                    } else {
                        DanglingReason::Isolated
                    }
                })
                .collect()
        }
    };

    let mut reported = 0;
    for (end, reason) in cable_ends.iter().zip(reasons) {
        report(network, DiagnosticCode::DanglingLine, end, reason, diag);
        reported += 1;
    }

    for end in &edge_ends {
        let object = &network[end.object];
        let checks_disabled = network
            .container_of_class(end.object, ClassTag::Bay)
            .and_then(|bay| network[bay].properties.get_bool("connectivity_check"))
            == Some(false);
        if checks_disabled {
            continue;
        }
        let Some((start, stop)) = object.ends() else {
            continue;
        };
        let reason = if (start.x - stop.x).abs() <= tolerance {
            DanglingReason::VerticalEdge
        } else if end.end == 1 && start.y > stop.y {
            DanglingReason::TopDownEdge
        } else {
            DanglingReason::Isolated
        };
        report(network, DiagnosticCode::DanglingEdge, end, reason, diag);
        reported += 1;
    }
    reported
}

fn report(
    network: &Network,
    code: DiagnosticCode,
    end: &DanglingEnd,
    reason: DanglingReason,
    diag: &mut Diagnostics,
) {
    let object = &network[end.object];
    diag.add(
        DiagnosticIssue::warning(code, format!("End {} is not connected ({reason})", end.end))
            .with_geometry(vec![end.point])
            .with_object(object)
            .with_context("reason", reason)
            .with_context("end", end.end),
    );
}
