//! Drives the [`GraphBuilder`] from feature records.
//!
//! Records are consumed in a fixed order so that vertex and object handles only
//! depend on input order:
//!
//! 1. containers, then container-in-container pairing
//! 2. connectivity nodes
//! 3. point equipment
//! 4. line features (cables and cartographic edges)

use std::path::Path;

use gnt_core::{
    ClassTag, IdentifiedObject, Point, TopologyConfig, TopologyResult, NORMAL_OPEN_KEY,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::GraphBuilder;
use crate::features::{load_features, FeatureRecord};
use crate::vertex_index::VertexId;

/// Explicit terminal-to-node bindings, per end.
const TERMINAL_KEYS: [&str; 2] = ["terminal.1", "terminal.2"];
/// Vertex slot per line end.
const SLOT_KEYS: [&str; 2] = ["slot.1", "slot.2"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub containers: usize,
    pub point_objects: usize,
    pub edges: usize,
    /// Records rejected as duplicates or overlaps, or skipped for lack of geometry
    pub rejected: usize,
}

/// Ingest records into a builder.
pub fn ingest(builder: &mut GraphBuilder, records: &[FeatureRecord]) -> TopologyResult<IngestStats> {
    let mut stats = IngestStats::default();
    let ordered = |pred: fn(ClassTag) -> bool| {
        records
            .iter()
            .enumerate()
            .filter(move |(_, r)| pred(r.class))
    };

    let mut containers = Vec::new();
    for (ordinal, record) in ordered(|c| c.is_container()) {
        let attachment = builder.attach_to_new_vertex(record.to_object(ordinal))?;
        containers.push(attachment.object);
        stats.containers += 1;
    }
    for id in containers {
        builder.pair_container(id)?;
    }

    for (ordinal, record) in ordered(|c| c.is_connectivity() && !c.is_edge_class()) {
        ingest_node(builder, record.to_object(ordinal), &mut stats)?;
    }
    for (ordinal, record) in
        ordered(|c| !c.is_container() && !c.is_connectivity() && !c.is_edge_class())
    {
        ingest_equipment(builder, record.to_object(ordinal), &mut stats)?;
    }
    for (ordinal, record) in ordered(|c| c.is_edge_class()) {
        ingest_line(builder, record.to_object(ordinal), &mut stats)?;
    }

    info!(
        containers = stats.containers,
        objects = stats.point_objects,
        edges = stats.edges,
        rejected = stats.rejected,
        overlaps = builder.overlap_count(),
        "ingestion complete"
    );
    Ok(stats)
}

/// Load a feature file and build its raw connectivity graph.
pub fn ingest_file(path: impl AsRef<Path>, config: &TopologyConfig) -> TopologyResult<GraphBuilder> {
    let records = load_features(path.as_ref())?;
    info!(path = %path.as_ref().display(), records = records.len(), "loaded features");
    let mut builder = GraphBuilder::new(config);
    ingest(&mut builder, &records)?;
    Ok(builder)
}

fn ingest_node(
    builder: &mut GraphBuilder,
    node: IdentifiedObject,
    stats: &mut IngestStats,
) -> TopologyResult<()> {
    let name = node.external_id.clone();
    let existing = builder
        .vertex_index()
        .resolve_named(&name, 1)
        .or_else(|| node.geometry.first().and_then(|p| builder.vertex_index().resolve(p, 1)));

    let attachment = match existing {
        Some(v) => builder.attach_to_existing_vertex(node, v)?,
        None => builder.attach_to_new_vertex(node)?,
    };
    match attachment.vertex {
        Some(v) => {
            builder.bind_name(v, &name, 1);
            stats.point_objects += 1;
        }
        None => stats.rejected += 1,
    }
    Ok(())
}

fn ingest_equipment(
    builder: &mut GraphBuilder,
    mut equipment: IdentifiedObject,
    stats: &mut IngestStats,
) -> TopologyResult<()> {
    let bindings: Vec<Option<String>> = TERMINAL_KEYS
        .iter()
        .map(|k| equipment.properties.take(k).map(|v| v.to_text()))
        .collect();
    // The state stays on the switch; the second vertex only carries the open side.
    let open = equipment.class.is_switching_device()
        && equipment.properties.get_bool(NORMAL_OPEN_KEY).unwrap_or(false);
    let anchor = equipment.geometry.first().copied();

    // Busbars are polylines and always get a vertex of their own.
    let existing = match anchor {
        Some(p) if !equipment.class.is_busbar() => builder.vertex_index().resolve(&p, 1),
        _ => None,
    };
    let attachment = match existing {
        Some(v) => builder.attach_to_existing_vertex(equipment, v)?,
        None => builder.attach_to_new_vertex(equipment)?,
    };
    let Some(vertex) = attachment.vertex else {
        stats.rejected += 1;
        return Ok(());
    };
    stats.point_objects += 1;

    if open {
        if let Some(p) = anchor {
            let other_side = builder.placeholder_vertex(&p, 2);
            builder.link_vertices(vertex, other_side, false);
            debug!(object = %builder.network()[attachment.object].external_id, "open switch split");
        }
    }
    for name in bindings.into_iter().flatten() {
        let node = builder.named_vertex(&name, 1);
        builder.link_vertices(vertex, node, true);
    }
    Ok(())
}

fn ingest_line(
    builder: &mut GraphBuilder,
    mut line: IdentifiedObject,
    stats: &mut IngestStats,
) -> TopologyResult<()> {
    let bindings: Vec<Option<String>> = TERMINAL_KEYS
        .iter()
        .map(|k| line.properties.take(k).map(|v| v.to_text()))
        .collect();
    let slots: Vec<u8> = SLOT_KEYS
        .iter()
        .map(|k| {
            line.properties
                .take(k)
                .and_then(|v| v.as_f64())
                .map(|s| if s >= 2.0 { 2 } else { 1 })
                .unwrap_or(1)
        })
        .collect();
    let ends = [line.geometry.first().copied(), line.geometry.last().copied()];

    let start = end_vertex(builder, bindings[0].as_deref(), ends[0], slots[0]);
    let end = end_vertex(builder, bindings[1].as_deref(), ends[1], slots[1]);
    let (Some(a), Some(b)) = (start, end) else {
        warn!(line = %line.external_id, "line has no usable ends, skipped");
        stats.rejected += 1;
        return Ok(());
    };

    match builder.connect(a, b, line)? {
        Some(_) => stats.edges += 1,
        None => stats.rejected += 1,
    }
    Ok(())
}

fn end_vertex(
    builder: &mut GraphBuilder,
    binding: Option<&str>,
    point: Option<Point>,
    slot: u8,
) -> Option<VertexId> {
    if let Some(name) = binding {
        return Some(builder.named_vertex(name, slot));
    }
    let point = point?;
    Some(
        builder
            .resolve_point(&point, slot)
            .unwrap_or_else(|| builder.placeholder_vertex(&point, slot)),
    )
}
