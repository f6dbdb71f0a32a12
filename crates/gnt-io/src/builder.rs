//! Graph builder for ingesting features into a connectivity graph.
//!
//! The builder owns the [`Network`] arena together with the vertex graph and every
//! lookup index (external id, name, mrid, containers). Importers only call the
//! `attach_*`/`connect` operations; the indexes are never touched directly.
//!
//! A vertex holds at most one primary object. Cable ends that meet where no
//! equipment sits get a connectivity-node placeholder, which equipment attached
//! later at the same vertex replaces.
//!
//! # Example
//! ```
//! use gnt_core::{ClassTag, IdentifiedObject, Point, TopologyConfig};
//! use gnt_io::GraphBuilder;
//!
//! let mut builder = GraphBuilder::new(&TopologyConfig::default());
//! let a = builder.placeholder_vertex(&Point::new(0.0, 0.0), 1);
//! let b = builder.placeholder_vertex(&Point::new(10.0, 0.0), 1);
//! let cable = IdentifiedObject::new(ClassTag::AcLineSegment, "cable-1");
//! builder.connect(a, b, cable).unwrap();
//! assert_eq!(builder.shortest_path(a, b).len(), 3);
//! ```

use std::collections::HashMap;

use gnt_core::geometry::point_on_polyline;
use gnt_core::{
    normalize_identifier, ClassTag, DiagnosticCode, DiagnosticIssue, Diagnostics,
    IdentifiedObject, Mrid, Network, ObjectId, Point, PropertyValue, TopologyConfig,
    TopologyError, TopologyResult,
};
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::vertex_index::{VertexId, VertexIndex};

/// Property keys that declare an object's container; consumed on successful pairing.
pub const CONTAINER_KEYS: [&str; 5] = [
    "bay_id",
    "substation_id",
    "container_id",
    "container_type",
    "container_mrid",
];

/// Outcome of attaching an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub object: ObjectId,
    /// `None` for containers and rejected objects
    pub vertex: Option<VertexId>,
}

/// Owns the connectivity graph under construction and all of its indexes.
pub struct GraphBuilder {
    network: Network,
    index: VertexIndex,
    tolerance: f64,
    // Node index i is vertex i; edge weights carry the edge object when there is one.
    graph: UnGraph<(), Option<ObjectId>>,
    vertex_objects: Vec<Option<ObjectId>>,
    object_vertex: HashMap<ObjectId, VertexId>,
    edges: HashMap<(VertexId, VertexId), ObjectId>,
    by_external_id: HashMap<String, ObjectId>,
    by_name: HashMap<(ClassTag, String), ObjectId>,
    by_mrid: HashMap<Mrid, ObjectId>,
    bays: HashMap<String, ObjectId>,
    containers: HashMap<(ClassTag, String), ObjectId>,
    containers_by_mrid: HashMap<String, ObjectId>,
    busbars: Vec<ObjectId>,
    overlap_count: usize,
    diagnostics: Diagnostics,
}

impl GraphBuilder {
    pub fn new(config: &TopologyConfig) -> Self {
        Self {
            network: Network::new(),
            index: VertexIndex::from_config(config),
            tolerance: config.tolerance(),
            graph: UnGraph::new_undirected(),
            vertex_objects: Vec::new(),
            object_vertex: HashMap::new(),
            edges: HashMap::new(),
            by_external_id: HashMap::new(),
            by_name: HashMap::new(),
            by_mrid: HashMap::new(),
            bays: HashMap::new(),
            containers: HashMap::new(),
            containers_by_mrid: HashMap::new(),
            busbars: Vec::new(),
            overlap_count: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Split into the graph and the diagnostics gathered while building it.
    pub fn into_parts(self) -> (Network, Diagnostics) {
        (self.network, self.diagnostics)
    }

    pub fn vertex_index(&self) -> &VertexIndex {
        &self.index
    }

    pub fn overlap_count(&self) -> usize {
        self.overlap_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_objects.len()
    }

    /// Primary object at a vertex, skipping deleted ones.
    pub fn object_at(&self, vertex: VertexId) -> Option<ObjectId> {
        self.vertex_objects
            .get(vertex.value())
            .copied()
            .flatten()
            .filter(|id| !self.network.is_deleted(*id))
    }

    pub fn vertex_of(&self, object: ObjectId) -> Option<VertexId> {
        self.object_vertex.get(&object).copied()
    }

    /// Edge object recorded for a vertex pair (the first one when edges are parallel).
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<ObjectId> {
        self.edges.get(&edge_key(a, b)).copied()
    }

    pub fn lookup_external_id(&self, external_id: &str) -> Option<ObjectId> {
        self.by_external_id.get(external_id).copied()
    }

    pub fn lookup_name(&self, class: ClassTag, name: &str) -> Option<ObjectId> {
        self.by_name.get(&(class, name.to_string())).copied()
    }

    pub fn lookup_mrid(&self, mrid: &Mrid) -> Option<ObjectId> {
        self.by_mrid.get(mrid).copied()
    }

    // =========================================================================
    // Vertex resolution
    // =========================================================================

    /// Resolve a coordinate, falling back to a point-on-busbar test for slot 1.
    pub fn resolve_point(&self, point: &Point, slot: u8) -> Option<VertexId> {
        self.index.resolve(point, slot).or_else(|| {
            if slot != 1 {
                return None;
            }
            self.busbars
                .iter()
                .filter(|b| !self.network.is_deleted(**b))
                .find(|b| point_on_polyline(point, &self.network[**b].geometry, self.tolerance))
                .and_then(|b| self.vertex_of(*b))
        })
    }

    /// New vertex holding a fresh connectivity-node placeholder at `point`.
    pub fn placeholder_vertex(&mut self, point: &Point, slot: u8) -> VertexId {
        let placeholder = IdentifiedObject::new(
            ClassTag::ConnectivityNode,
            format!("cn-{}", self.vertex_objects.len()),
        )
        .with_geometry(vec![*point]);
        let id = self.network.add(placeholder);
        let vertex = self.push_vertex(Some(id));
        self.index.register(vertex, point, slot);
        vertex
    }

    /// Vertex for an external terminal identifier, created on first use.
    pub fn named_vertex(&mut self, name: &str, slot: u8) -> VertexId {
        if let Some(v) = self.index.resolve_named(name, slot) {
            return v;
        }
        let placeholder = IdentifiedObject::new(ClassTag::ConnectivityNode, name.to_string());
        let id = self.network.add(placeholder);
        self.by_external_id.entry(name.to_string()).or_insert(id);
        let vertex = self.push_vertex(Some(id));
        self.index.register_named(vertex, name, slot);
        vertex
    }

    /// Make an existing vertex answer to an external terminal identifier.
    pub fn bind_name(&mut self, vertex: VertexId, name: &str, slot: u8) {
        self.index.register_named(vertex, name, slot);
    }

    fn push_vertex(&mut self, object: Option<ObjectId>) -> VertexId {
        let vertex = VertexId::new(self.vertex_objects.len());
        let node = self.graph.add_node(());
        debug_assert_eq!(node.index(), vertex.value());
        self.vertex_objects.push(object);
        if let Some(id) = object {
            self.object_vertex.insert(id, vertex);
        }
        vertex
    }

    // =========================================================================
    // Attach operations
    // =========================================================================

    /// Attach an object at a new vertex.
    ///
    /// Containers are indexed for pairing and get no vertex. An object whose stable
    /// identifier was already seen is logged, soft-deleted and gets no vertex.
    pub fn attach_to_new_vertex(&mut self, object: IdentifiedObject) -> TopologyResult<Attachment> {
        if object.class.is_container() {
            let id = self.network.add(object);
            self.index_container(id);
            return Ok(Attachment { object: id, vertex: None });
        }
        if let Some(id) = self.reject_duplicate_mrid(&object) {
            return Ok(Attachment { object: id, vertex: None });
        }

        let id = self.network.add(object);
        self.index_object(id);
        self.pair_container(id)?;
        let vertex = self.push_vertex(Some(id));
        self.register_geometry(id, vertex);
        Ok(Attachment {
            object: id,
            vertex: Some(vertex),
        })
    }

    /// Attach an object at an existing vertex.
    ///
    /// Replaces a connectivity-node placeholder; any other occupant is an overlap
    /// conflict, in which case the occupant stays and the newcomer is rejected.
    pub fn attach_to_existing_vertex(
        &mut self,
        object: IdentifiedObject,
        vertex: VertexId,
    ) -> TopologyResult<Attachment> {
        if let Some(id) = self.reject_duplicate_mrid(&object) {
            return Ok(Attachment { object: id, vertex: None });
        }

        match self.object_at(vertex) {
            None => {
                let id = self.network.add(object);
                self.index_object(id);
                self.pair_container(id)?;
                self.vertex_objects[vertex.value()] = Some(id);
                self.object_vertex.insert(id, vertex);
                self.register_geometry(id, vertex);
                Ok(Attachment {
                    object: id,
                    vertex: Some(vertex),
                })
            }
            Some(current) if object.class.is_connectivity() => {
                // A second junction at an occupied vertex is the same junction.
                if !object.external_id.is_empty() {
                    self.by_external_id
                        .entry(object.external_id.clone())
                        .or_insert(current);
                }
                Ok(Attachment {
                    object: current,
                    vertex: Some(vertex),
                })
            }
            Some(current) if self.network.class(current) == ClassTag::ConnectivityNode => {
                let id = self.network.add(object);
                self.index_object(id);
                self.pair_container(id)?;
                self.network.move_links(current, id);
                self.network.delete(current);
                self.object_vertex.remove(&current);
                self.vertex_objects[vertex.value()] = Some(id);
                self.object_vertex.insert(id, vertex);
                self.register_geometry(id, vertex);
                Ok(Attachment {
                    object: id,
                    vertex: Some(vertex),
                })
            }
            Some(current) => {
                self.overlap_count += 1;
                let existing = &self.network[current];
                let issue = DiagnosticIssue::error(
                    DiagnosticCode::ComponentOverlayAnotherComponent,
                    format!(
                        "{} {} overlaps {} {}",
                        object.class, object.external_id, existing.class, existing.external_id
                    ),
                )
                .with_object(&object)
                .with_context("existing", &existing.external_id);
                tracing::warn!(object = %object.external_id, existing = %existing.external_id, "overlapping components");
                self.diagnostics.add(issue);
                let id = self.network.add(object);
                self.network.delete(id);
                Ok(Attachment { object: id, vertex: None })
            }
        }
    }

    /// Link two vertices through an edge object.
    ///
    /// Parallel edges are allowed; only the first is recorded under the vertex pair.
    pub fn connect(
        &mut self,
        a: VertexId,
        b: VertexId,
        edge: IdentifiedObject,
    ) -> TopologyResult<Option<ObjectId>> {
        if self.reject_duplicate_mrid(&edge).is_some() {
            return Ok(None);
        }
        let id = self.network.add(edge);
        self.index_object(id);
        self.pair_container(id)?;
        self.edges.entry(edge_key(a, b)).or_insert(id);
        self.graph.add_edge(node(a), node(b), Some(id));
        for v in [a, b] {
            if let Some(end) = self.object_at(v) {
                self.network.link(id, end);
            }
        }
        Ok(Some(id))
    }

    /// Link the primary objects of two vertices directly.
    ///
    /// `traversable` also adds an edge to the vertex graph used by path queries;
    /// open switching states are linked without one.
    pub fn link_vertices(&mut self, a: VertexId, b: VertexId, traversable: bool) {
        if let (Some(x), Some(y)) = (self.object_at(a), self.object_at(b)) {
            self.network.link(x, y);
        }
        if traversable {
            self.graph.add_edge(node(a), node(b), None);
        }
    }

    /// Unweighted shortest path as alternating vertex objects and edge objects.
    ///
    /// Deleted objects are left out; an unreachable target yields an empty path.
    pub fn shortest_path(&self, source: VertexId, target: VertexId) -> Vec<ObjectId> {
        if source.value() >= self.vertex_objects.len() || target.value() >= self.vertex_objects.len()
        {
            return Vec::new();
        }
        let Some((_, vertices)) = astar(
            &self.graph,
            node(source),
            |n| n == node(target),
            |_| 1usize,
            |_| 0,
        ) else {
            return Vec::new();
        };

        let mut path = Vec::new();
        let push = |id: Option<ObjectId>, path: &mut Vec<ObjectId>| {
            if let Some(id) = id.filter(|id| !self.network.is_deleted(*id)) {
                path.push(id);
            }
        };
        for (i, n) in vertices.iter().enumerate() {
            let v = VertexId::new(n.index());
            if i > 0 {
                let prev = VertexId::new(vertices[i - 1].index());
                push(self.edge_between(prev, v), &mut path);
            }
            push(self.vertex_objects[v.value()], &mut path);
        }
        path
    }

    // =========================================================================
    // Indexing and container pairing
    // =========================================================================

    fn reject_duplicate_mrid(&mut self, object: &IdentifiedObject) -> Option<ObjectId> {
        let mrid = object.mrid?;
        let existing = self.by_mrid.get(&mrid).copied()?;
        self.diagnostics.add(
            DiagnosticIssue::error(
                DiagnosticCode::DuplicateMrid,
                format!("Identifier {mrid} already used"),
            )
            .with_object(object)
            .with_context("existing", &self.network[existing].external_id),
        );
        let id = self.network.add(object.clone());
        self.network.delete(id);
        Some(id)
    }

    fn index_object(&mut self, id: ObjectId) {
        let object = &self.network[id];
        if !object.external_id.is_empty() {
            self.by_external_id
                .entry(object.external_id.clone())
                .or_insert(id);
        }
        if let Some(mrid) = object.mrid {
            self.by_mrid.entry(mrid).or_insert(id);
        }
        if object.class.is_name_indexed() {
            if let Some(name) = object.name.clone() {
                let key = (object.class, name);
                if let Some(&other) = self.by_name.get(&key) {
                    let issue = DiagnosticIssue::warning(
                        DiagnosticCode::DuplicateName,
                        format!("Name '{}' is already used by {}", key.1, self.network[other].external_id),
                    )
                    .with_object(&self.network[id]);
                    self.diagnostics.add(issue);
                } else {
                    self.by_name.insert(key, id);
                }
            }
        }
        if object.class.is_busbar() {
            self.busbars.push(id);
        }
    }

    fn index_container(&mut self, id: ObjectId) {
        self.index_object(id);
        let object = &self.network[id];
        let key = object.external_id.clone();
        if object.class == ClassTag::Bay {
            self.bays.entry(key.clone()).or_insert(id);
        }
        self.containers.entry((object.class, key)).or_insert(id);
        if let Some(mrid) = object.mrid {
            self.containers_by_mrid
                .entry(normalize_identifier(&mrid.to_string()))
                .or_insert(id);
        }
    }

    fn register_geometry(&mut self, id: ObjectId, vertex: VertexId) {
        let object = &self.network[id];
        let points: Vec<Point> = if object.class.is_busbar() {
            object.geometry.clone()
        } else {
            object.geometry.first().copied().into_iter().collect()
        };
        for p in &points {
            self.index.register(vertex, p, 1);
        }
    }

    /// Pair an object with its declared container.
    ///
    /// Lookup order: bay id, then `(type, id)`, then normalized mrid of any reference.
    /// On success the declarative keys are consumed. A container-type discriminator
    /// that names no container class is fatal.
    pub fn pair_container(&mut self, id: ObjectId) -> TopologyResult<bool> {
        let props = &self.network[id].properties;
        let text = |key: &str| props.get(key).map(PropertyValue::to_text);
        let bay_id = text("bay_id");
        let substation_id = text("substation_id");
        let container_id = text("container_id");
        let container_type = text("container_type");
        let container_mrid = text("container_mrid");

        if bay_id.is_none()
            && substation_id.is_none()
            && container_id.is_none()
            && container_mrid.is_none()
        {
            return Ok(false);
        }

        let mut found = bay_id.as_ref().and_then(|b| self.bays.get(b).copied());

        if found.is_none() {
            let typed = match (&container_type, &container_id) {
                (Some(t), Some(cid)) => {
                    let class = ClassTag::parse_container(t).ok_or_else(|| {
                        TopologyError::InvalidContainerType {
                            object: self.network[id].external_id.clone(),
                            container_type: t.clone(),
                        }
                    })?;
                    Some((class, cid.clone()))
                }
                _ => substation_id
                    .clone()
                    .map(|s| (ClassTag::Substation, s))
                    .or_else(|| container_id.clone().map(|c| (ClassTag::Substation, c))),
            };
            found = typed.and_then(|key| {
                self.containers.get(&key).copied().or_else(|| {
                    // Substation references may point at an enclosure.
                    (key.0 == ClassTag::Substation)
                        .then(|| self.containers.get(&(ClassTag::Enclosure, key.1.clone())).copied())
                        .flatten()
                })
            });
        }

        if found.is_none() {
            found = [&container_mrid, &container_id, &substation_id, &bay_id]
                .into_iter()
                .flatten()
                .find_map(|r| self.containers_by_mrid.get(&normalize_identifier(r)).copied());
        }

        let Some(container) = found.filter(|c| *c != id) else {
            let reference = [bay_id, substation_id, container_id, container_mrid]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            let issue = DiagnosticIssue::warning(
                DiagnosticCode::ComponentHasNoParent,
                format!("Declared container '{reference}' not found"),
            )
            .with_object(&self.network[id])
            .with_context("reference", reference);
            self.diagnostics.add(issue);
            return Ok(false);
        };

        let object = self.network.get_mut(id);
        for key in CONTAINER_KEYS {
            object.properties.take(key);
        }
        self.network.add_child(container, id);
        Ok(true)
    }
}

fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn node(v: VertexId) -> NodeIndex {
    NodeIndex::new(v.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(&TopologyConfig::default())
    }

    fn equipment(class: ClassTag, id: &str, x: f64, y: f64) -> IdentifiedObject {
        IdentifiedObject::new(class, id)
            .with_mrid(Mrid::from_external_id(id))
            .with_geometry(vec![Point::new(x, y)])
    }

    #[test]
    fn test_containers_get_no_vertex() {
        let mut b = builder();
        let sub = IdentifiedObject::new(ClassTag::Substation, "S1");
        let att = b.attach_to_new_vertex(sub).unwrap();
        assert!(att.vertex.is_none());
        assert_eq!(b.vertex_count(), 0);
        assert_eq!(b.lookup_external_id("S1"), Some(att.object));
    }

    #[test]
    fn test_duplicate_mrid_is_soft_deleted() {
        let mut b = builder();
        b.attach_to_new_vertex(equipment(ClassTag::Breaker, "B1", 0.0, 0.0))
            .unwrap();
        let dup = equipment(ClassTag::Breaker, "B1", 5.0, 0.0);
        let att = b.attach_to_new_vertex(dup).unwrap();
        assert!(att.vertex.is_none());
        assert!(b.network().is_deleted(att.object));
        assert_eq!(b.diagnostics().count(DiagnosticCode::DuplicateMrid), 1);
    }

    #[test]
    fn test_overlap_keeps_original() {
        let mut b = builder();
        let e2 = b
            .attach_to_new_vertex(equipment(ClassTag::Breaker, "E2", 0.0, 0.0))
            .unwrap();
        let vertex = e2.vertex.unwrap();
        let e1 = b
            .attach_to_existing_vertex(equipment(ClassTag::Disconnector, "E1", 0.0, 0.0), vertex)
            .unwrap();

        assert_eq!(b.overlap_count(), 1);
        assert_eq!(b.object_at(vertex), Some(e2.object));
        assert!(e1.vertex.is_none());
        let issue = b
            .diagnostics()
            .issues_by_code(DiagnosticCode::ComponentOverlayAnotherComponent)
            .next()
            .unwrap();
        assert_eq!(issue.object.as_ref().unwrap().external_id, "E1");
    }

    #[test]
    fn test_placeholder_replacement_keeps_links() {
        let mut b = builder();
        let p = Point::new(0.0, 0.0);
        let a = b.placeholder_vertex(&p, 1);
        let c = b.placeholder_vertex(&Point::new(10.0, 0.0), 1);
        let cable = b
            .connect(a, c, IdentifiedObject::new(ClassTag::AcLineSegment, "L1"))
            .unwrap()
            .unwrap();
        let placeholder = b.object_at(a).unwrap();

        let sw = b
            .attach_to_existing_vertex(equipment(ClassTag::Breaker, "SW", 0.0, 0.0), a)
            .unwrap();
        assert_eq!(b.object_at(a), Some(sw.object));
        assert!(b.network().is_deleted(placeholder));
        assert!(b.network().is_linked(sw.object, cable));
        assert_eq!(b.overlap_count(), 0);
        assert!(b.network().symmetry_violation().is_none());
    }

    #[test]
    fn test_parallel_edges_are_neighbor_linked() {
        let mut b = builder();
        let a = b.placeholder_vertex(&Point::new(0.0, 0.0), 1);
        let c = b.placeholder_vertex(&Point::new(5.0, 0.0), 1);
        let l1 = b
            .connect(a, c, IdentifiedObject::new(ClassTag::AcLineSegment, "L1"))
            .unwrap()
            .unwrap();
        let l2 = b
            .connect(c, a, IdentifiedObject::new(ClassTag::AcLineSegment, "L2"))
            .unwrap()
            .unwrap();
        assert_eq!(b.edge_between(c, a), Some(l1));
        let node_a = b.object_at(a).unwrap();
        assert_eq!(b.network().neighbors(node_a), &[l1, l2]);
    }

    #[test]
    fn test_shortest_path_alternates_vertices_and_edges() {
        let mut b = builder();
        let v0 = b.placeholder_vertex(&Point::new(0.0, 0.0), 1);
        let v1 = b.placeholder_vertex(&Point::new(1.0, 0.0), 1);
        let v2 = b.placeholder_vertex(&Point::new(2.0, 0.0), 1);
        let isolated = b.placeholder_vertex(&Point::new(9.0, 9.0), 1);
        let l1 = b
            .connect(v0, v1, IdentifiedObject::new(ClassTag::AcLineSegment, "L1"))
            .unwrap()
            .unwrap();
        let l2 = b
            .connect(v1, v2, IdentifiedObject::new(ClassTag::AcLineSegment, "L2"))
            .unwrap()
            .unwrap();
        b.connect(v0, v2, IdentifiedObject::new(ClassTag::AcLineSegment, "L3"))
            .unwrap();

        let path = b.shortest_path(v0, v1);
        assert_eq!(path, vec![b.object_at(v0).unwrap(), l1, b.object_at(v1).unwrap()]);
        assert_eq!(b.shortest_path(v0, v2).len(), 3);
        assert!(b.shortest_path(v0, isolated).is_empty());
        assert!(!b.shortest_path(v1, v2).is_empty());
        assert!(b.shortest_path(v1, v2).contains(&l2));
    }

    #[test]
    fn test_container_pairing_order_and_consumption() {
        let mut b = builder();
        let sub = b
            .attach_to_new_vertex(IdentifiedObject::new(ClassTag::Substation, "S1"))
            .unwrap()
            .object;
        let bay = b
            .attach_to_new_vertex(IdentifiedObject::new(ClassTag::Bay, "BAY1"))
            .unwrap()
            .object;

        let by_bay = equipment(ClassTag::Breaker, "B1", 0.0, 0.0)
            .with_property("bay_id", PropertyValue::Str("BAY1".into()))
            .with_property("substation_id", PropertyValue::Str("S1".into()));
        let att = b.attach_to_new_vertex(by_bay).unwrap();
        assert_eq!(b.network()[att.object].container, Some(bay));
        assert!(!b.network()[att.object].properties.contains("substation_id"));

        let typed = equipment(ClassTag::Breaker, "B2", 1.0, 0.0)
            .with_property("container_id", PropertyValue::Str("S1".into()))
            .with_property("container_type", PropertyValue::Str("substation".into()));
        let att = b.attach_to_new_vertex(typed).unwrap();
        assert_eq!(b.network()[att.object].container, Some(sub));
        assert!(b.network()[att.object].properties.is_empty());
    }

    #[test]
    fn test_container_pairing_by_normalized_mrid() {
        let mut b = builder();
        let mrid = Mrid::parse("0f0e0d0c-0b0a-0908-0706-050403020100").unwrap();
        let encl = b
            .attach_to_new_vertex(IdentifiedObject::new(ClassTag::Enclosure, "E1").with_mrid(mrid))
            .unwrap()
            .object;
        let fuse = equipment(ClassTag::Fuse, "F1", 0.0, 0.0).with_property(
            "container_mrid",
            PropertyValue::Str("{0F0E0D0C-0B0A-0908-0706-050403020100}".into()),
        );
        let att = b.attach_to_new_vertex(fuse).unwrap();
        assert_eq!(b.network()[att.object].container, Some(encl));
    }

    #[test]
    fn test_invalid_container_type_is_fatal() {
        let mut b = builder();
        let bad = equipment(ClassTag::Breaker, "B1", 0.0, 0.0)
            .with_property("container_id", PropertyValue::Str("X".into()))
            .with_property("container_type", PropertyValue::Str("Feeder".into()));
        let err = b.attach_to_new_vertex(bad).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidContainerType { .. }));
    }

    #[test]
    fn test_missing_container_is_reported_and_kept() {
        let mut b = builder();
        let orphan = equipment(ClassTag::Breaker, "B1", 0.0, 0.0)
            .with_property("bay_id", PropertyValue::Str("nowhere".into()));
        let att = b.attach_to_new_vertex(orphan).unwrap();
        assert!(att.vertex.is_some());
        assert!(b.network()[att.object].properties.contains("bay_id"));
        assert_eq!(b.diagnostics().count(DiagnosticCode::ComponentHasNoParent), 1);
    }

    #[test]
    fn test_duplicate_name_is_reported() {
        let mut b = builder();
        b.attach_to_new_vertex(
            equipment(ClassTag::EnergyConsumer, "C1", 0.0, 0.0).with_name("Farm"),
        )
        .unwrap();
        b.attach_to_new_vertex(
            equipment(ClassTag::EnergyConsumer, "C2", 9.0, 0.0).with_name("Farm"),
        )
        .unwrap();
        assert_eq!(b.diagnostics().count(DiagnosticCode::DuplicateName), 1);
        assert!(b.lookup_name(ClassTag::EnergyConsumer, "Farm").is_some());
    }

    #[test]
    fn test_busbar_segment_fallback() {
        let mut b = builder();
        let bus = IdentifiedObject::new(ClassTag::BusbarSection, "BB")
            .with_geometry(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        let att = b.attach_to_new_vertex(bus).unwrap();
        assert_eq!(b.resolve_point(&Point::new(10.0, 0.0), 1), att.vertex);
        assert_eq!(b.resolve_point(&Point::new(4.0, 0.0), 1), att.vertex);
        assert_eq!(b.resolve_point(&Point::new(4.0, 1.0), 1), None);
        assert_eq!(b.resolve_point(&Point::new(4.0, 0.0), 2), None);
    }
}
