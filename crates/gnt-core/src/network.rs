//! Object arena with tombstone deletion.
//!
//! [`Network`] owns every identified object. Relationships (neighbors, containment)
//! are stored as [`ObjectId`] handles and only mutated through the methods here,
//! which keep neighbor lists symmetric and container back-references consistent.
//!
//! Deleted objects keep their slot: handles stay valid for in-flight iteration,
//! but [`Network::ids`] and [`Network::iter`] skip them.

use std::ops::Index;

use crate::{ClassTag, IdentifiedObject, ObjectId};

// Containment trees deeper than this are treated as cyclic.
const MAX_CONTAINMENT_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct Network {
    objects: Vec<IdentifiedObject>,
    deleted: Vec<bool>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the arena and return its handle.
    pub fn add(&mut self, object: IdentifiedObject) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.objects.push(object);
        self.deleted.push(false);
        id
    }

    pub fn get(&self, id: ObjectId) -> &IdentifiedObject {
        &self.objects[id.value()]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut IdentifiedObject {
        &mut self.objects[id.value()]
    }

    pub fn class(&self, id: ObjectId) -> ClassTag {
        self.objects[id.value()].class
    }

    pub fn is_deleted(&self, id: ObjectId) -> bool {
        self.deleted[id.value()]
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.deleted.iter().filter(|d| !**d).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.iter().filter(|d| **d).count()
    }

    /// Snapshot of live handles in creation order.
    ///
    /// Returned as an owned vector so callers can mutate the network while walking it.
    pub fn ids(&self) -> Vec<ObjectId> {
        (0..self.objects.len())
            .filter(|i| !self.deleted[*i])
            .map(ObjectId::new)
            .collect()
    }

    /// Live handles whose class satisfies `pred`.
    pub fn ids_where(&self, pred: impl Fn(ClassTag) -> bool) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, o)| pred(o.class))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &IdentifiedObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.deleted[*i])
            .map(|(i, o)| (ObjectId::new(i), o))
    }

    /// Every object including deleted ones, with the deleted flag, for debugging output.
    pub fn iter_all(&self) -> impl Iterator<Item = (ObjectId, &IdentifiedObject, bool)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectId::new(i), o, self.deleted[i]))
    }

    // =========================================================================
    // Neighbor links
    // =========================================================================

    pub fn neighbors(&self, id: ObjectId) -> &[ObjectId] {
        &self.objects[id.value()].neighbors
    }

    /// Neighbors without duplicates or self references, in list order.
    pub fn distinct_neighbors(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut seen = Vec::new();
        for &n in self.neighbors(id) {
            if n != id && !seen.contains(&n) {
                seen.push(n);
            }
        }
        seen
    }

    pub fn is_linked(&self, a: ObjectId, b: ObjectId) -> bool {
        self.objects[a.value()].neighbors.contains(&b)
    }

    /// Add a symmetric link. Parallel links are kept; self links are ignored.
    pub fn link(&mut self, a: ObjectId, b: ObjectId) {
        if a == b {
            return;
        }
        self.objects[a.value()].neighbors.push(b);
        self.objects[b.value()].neighbors.push(a);
    }

    /// Add a symmetric link unless one already exists.
    pub fn link_once(&mut self, a: ObjectId, b: ObjectId) {
        if !self.is_linked(a, b) {
            self.link(a, b);
        }
    }

    /// Remove every link between `a` and `b`.
    pub fn unlink(&mut self, a: ObjectId, b: ObjectId) {
        self.objects[a.value()].neighbors.retain(|n| *n != b);
        self.objects[b.value()].neighbors.retain(|n| *n != a);
    }

    /// Move every link of `from` onto `to`, leaving `from` without neighbors.
    ///
    /// Parallel links collapse into one, except on line segments: a line keeps
    /// one entry per end, so a line whose two ends land on `from` and `to`
    /// ends up listing `to` twice and reads as a self-loop.
    pub fn move_links(&mut self, from: ObjectId, to: ObjectId) {
        for n in self.distinct_neighbors(from) {
            self.reroute(n, from, to);
        }
    }

    /// Move the links between `n` and `from` onto `to`, under the same
    /// parallel-link rule as [`Network::move_links`].
    pub fn reroute(&mut self, n: ObjectId, from: ObjectId, to: ObjectId) {
        let ends = self.neighbors(from).iter().filter(|x| **x == n).count();
        self.unlink(from, n);
        if n == to || ends == 0 {
            return;
        }
        if self.class(n).is_line_segment() {
            for _ in 0..ends {
                self.link(n, to);
            }
        } else {
            self.link_once(n, to);
        }
    }

    /// Replace a degree-2 connector by a direct link between its two neighbors.
    ///
    /// Returns false (and changes nothing) unless the connector has exactly two
    /// distinct non-self neighbors. A line segment already linked to the other
    /// side gets a second entry, one per end.
    pub fn splice(&mut self, connector: ObjectId) -> bool {
        let neighbors = self.distinct_neighbors(connector);
        let [a, b] = neighbors[..] else {
            return false;
        };
        if self.class(a).is_line_segment() || self.class(b).is_line_segment() {
            self.link(a, b);
        } else {
            self.link_once(a, b);
        }
        self.delete(connector);
        true
    }

    /// First node listed twice by `line`, meaning both of its ends land there.
    pub fn repeated_neighbor(&self, line: ObjectId) -> Option<ObjectId> {
        let neighbors = self.neighbors(line);
        neighbors
            .iter()
            .enumerate()
            .find(|(i, n)| neighbors[..*i].contains(n))
            .map(|(_, n)| *n)
    }

    /// Collapse duplicate entries in a neighbor list, keeping the other side in step.
    pub fn dedup_neighbors(&mut self, id: ObjectId) -> bool {
        let distinct = self.distinct_neighbors(id);
        if distinct.len() == self.neighbors(id).len() {
            return false;
        }
        for n in &distinct {
            let list = &mut self.objects[n.value()].neighbors;
            let mut kept = false;
            list.retain(|x| {
                if *x != id {
                    return true;
                }
                !std::mem::replace(&mut kept, true)
            });
        }
        self.objects[id.value()].neighbors = distinct;
        true
    }

    /// First pair that violates neighbor symmetry, if any.
    pub fn symmetry_violation(&self) -> Option<(ObjectId, ObjectId)> {
        for (a, object) in self.iter() {
            for &b in &object.neighbors {
                if self.is_deleted(b) {
                    return Some((a, b));
                }
                let forward = object.neighbors.iter().filter(|x| **x == b).count();
                let backward = self.neighbors(b).iter().filter(|x| **x == a).count();
                if forward != backward {
                    return Some((a, b));
                }
            }
        }
        None
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Soft-delete an object: drop its links and containment, keep the slot.
    pub fn delete(&mut self, id: ObjectId) {
        if self.deleted[id.value()] {
            return;
        }
        for n in std::mem::take(&mut self.objects[id.value()].neighbors) {
            self.objects[n.value()].neighbors.retain(|x| *x != id);
        }
        self.remove_from_container(id);
        for child in std::mem::take(&mut self.objects[id.value()].children) {
            self.objects[child.value()].container = None;
        }
        self.deleted[id.value()] = true;
    }

    // =========================================================================
    // Containment
    // =========================================================================

    /// Make `child` a member of `container`, detaching it from any previous owner.
    pub fn add_child(&mut self, container: ObjectId, child: ObjectId) {
        if container == child {
            return;
        }
        self.remove_from_container(child);
        self.objects[container.value()].children.push(child);
        self.objects[child.value()].container = Some(container);
    }

    pub fn remove_from_container(&mut self, child: ObjectId) {
        if let Some(container) = self.objects[child.value()].container.take() {
            self.objects[container.value()]
                .children
                .retain(|c| *c != child);
        }
    }

    /// Live children of a container.
    pub fn children(&self, container: ObjectId) -> Vec<ObjectId> {
        self.get(container)
            .children
            .iter()
            .copied()
            .filter(|c| !self.is_deleted(*c))
            .collect()
    }

    /// Topmost container above `id`, or `None` when it has no container.
    pub fn root_container(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = self.get(id).container?;
        for _ in 0..MAX_CONTAINMENT_DEPTH {
            match self.get(current).container {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
        None
    }

    /// Nearest enclosing container of the given class.
    pub fn container_of_class(&self, id: ObjectId, class: ClassTag) -> Option<ObjectId> {
        let mut current = self.get(id).container;
        for _ in 0..MAX_CONTAINMENT_DEPTH {
            let c = current?;
            if self.class(c) == class {
                return Some(c);
            }
            current = self.get(c).container;
        }
        None
    }
}

impl Index<ObjectId> for Network {
    type Output = IdentifiedObject;

    fn index(&self, id: ObjectId) -> &IdentifiedObject {
        self.get(id)
    }
}
