//! # gnt-core: Connectivity Graph Model
//!
//! Provides the object model shared by every stage of the GIS-to-topology pipeline.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as an **arena of identified objects** where:
//! - **Objects**: equipment, connectivity nodes and containers, addressed by [`ObjectId`]
//! - **Neighbors**: symmetric, undirected handle lists (parallel links allowed)
//! - **Containment**: a tree of handles (Bay ⊂ Substation/Enclosure) with back-references
//!
//! Handles instead of references keep the cyclic object graph free of ownership cycles
//! while every mutation stays O(1). Deletion is a tombstone: deleted objects remain
//! addressable but disappear from iteration and export.
//!
//! ## Quick Start
//!
//! ```rust
//! use gnt_core::*;
//!
//! let mut network = Network::new();
//! let cable = network.add(IdentifiedObject::new(ClassTag::AcLineSegment, "cable-1"));
//! let node = network.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn-1"));
//! network.link(cable, node);
//!
//! assert_eq!(network.neighbors(node), &[cable]);
//! ```
//!
//! ## Modules
//!
//! - [`network`] - Object arena with soft delete, neighbor and containment operations
//! - [`geometry`] - Tolerance-aware point and segment utilities
//! - [`diagnostics`] - Structured, append-only diagnostic sink
//! - [`config`] - Tolerances, proximity radii and validation switches
//! - [`graph_utils`] - Statistics, islands and DOT export over neighbor links
//! - [`snapshot`] - Serializable export view for downstream writers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod graph_utils;
pub mod network;
pub mod snapshot;

pub use config::{ProximityRadii, TopologyConfig, ValidationMode};
pub use diagnostics::{
    DanglingReason, DiagnosticCode, DiagnosticIssue, Diagnostics, ObjectRef, Severity,
};
pub use error::{TopologyError, TopologyResult};
pub use geometry::Point;
pub use graph_utils::*;
pub use network::Network;
pub use snapshot::{NetworkSnapshot, PsrTypeRepository, StaticPsrTypes};

/// Arena handle of an identified object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(usize);

impl ObjectId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ObjectId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable 128-bit identifier (CIM mRID).
///
/// Ordering compares the identifier as an unsigned big integer, which is what the
/// terminal-order tie-break relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mrid(Uuid);

// Namespace for identifiers derived from external ids.
const EXTERNAL_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93d7_4b08_a5e2_0c7d_19b3_e641);

const MIX_TAG: u128 = 0x9e37_79b9_7f4a_7c15_f39c_c060_5ced_c835;
const MIX_MUL_A: u128 = 0xd6e8_feb8_6659_fd93_2b3e_5f0a_4c17_8e49;
const MIX_MUL_B: u128 = 0xa076_1d64_78bd_642f_e703_7ed1_a0b4_28db;

impl Mrid {
    pub fn from_u128(value: u128) -> Self {
        Mrid(Uuid::from_u128(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Parse an identifier, accepting braces and either case (`{ABC-...}`).
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(&normalize_identifier(text)).ok().map(Mrid)
    }

    /// Deterministic identifier for objects whose source carries none.
    pub fn from_external_id(external_id: &str) -> Self {
        Mrid(Uuid::new_v5(&EXTERNAL_ID_NAMESPACE, external_id.as_bytes()))
    }

    /// Derive a new identifier from this one and a tag.
    ///
    /// Every step is a bijection on `u128`, so [`Mrid::underive`] recovers the source.
    pub fn derive(&self, tag: u64) -> Self {
        let mut x = self.as_u128() ^ MIX_TAG.wrapping_mul(tag as u128 + 1);
        x = x.wrapping_mul(MIX_MUL_A);
        x ^= x >> 67;
        x = x.wrapping_mul(MIX_MUL_B);
        Mrid::from_u128(x)
    }

    /// Inverse of [`Mrid::derive`] for the same tag.
    pub fn underive(&self, tag: u64) -> Self {
        let mut x = self.as_u128();
        x = x.wrapping_mul(mul_inverse(MIX_MUL_B));
        // A right shift of at least half the width is its own inverse under xor.
        x ^= x >> 67;
        x = x.wrapping_mul(mul_inverse(MIX_MUL_A));
        Mrid::from_u128(x ^ MIX_TAG.wrapping_mul(tag as u128 + 1))
    }
}

// Newton iteration for the inverse of an odd number modulo 2^128.
fn mul_inverse(odd: u128) -> u128 {
    let mut inv = odd;
    for _ in 0..7 {
        inv = inv.wrapping_mul(2u128.wrapping_sub(odd.wrapping_mul(inv)));
    }
    inv
}

impl fmt::Display for Mrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Property marking a connectivity node created only to fill an unconnected terminal.
/// Holds the owning equipment.
pub const PADDING_KEY: &str = "padding";
/// Property linking an auxiliary device to the equipment hosting it.
pub const HOST_EQUIPMENT_KEY: &str = "terminal.equipment";
/// Terminal number on the hosting equipment.
pub const HOST_TERMINAL_KEY: &str = "terminal.sequence";
/// Normal switching state of a switching device; `true` when it is open.
pub const NORMAL_OPEN_KEY: &str = "normal_open";

/// Strip braces and whitespace and lowercase an identifier for comparison.
pub fn normalize_identifier(text: &str) -> String {
    text.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_ascii_lowercase()
}

/// Closed taxonomy of network object classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassTag {
    AcLineSegment,
    BusbarSection,
    Breaker,
    Disconnector,
    LoadBreakSwitch,
    Fuse,
    Switch,
    PowerTransformer,
    EnergyConsumer,
    SynchronousMachine,
    AsynchronousMachine,
    PetersenCoil,
    LinearShuntCompensator,
    NetworkEquipment,
    FaultIndicator,
    CurrentTransformer,
    PotentialTransformer,
    ConnectivityNode,
    ConnectivityEdge,
    Substation,
    Enclosure,
    Bay,
}

impl ClassTag {
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Substation | Self::Enclosure | Self::Bay)
    }

    /// Containers that may sit at the top of the containment tree.
    pub fn is_root_container(&self) -> bool {
        matches!(self, Self::Substation | Self::Enclosure)
    }

    /// Connectivity nodes and cartographic connector edges.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::ConnectivityNode | Self::ConnectivityEdge)
    }

    pub fn is_line_segment(&self) -> bool {
        matches!(self, Self::AcLineSegment)
    }

    pub fn is_busbar(&self) -> bool {
        matches!(self, Self::BusbarSection)
    }

    pub fn is_transformer(&self) -> bool {
        matches!(self, Self::PowerTransformer)
    }

    /// Classes ingested as graph edges rather than vertex objects.
    pub fn is_edge_class(&self) -> bool {
        matches!(self, Self::AcLineSegment | Self::ConnectivityEdge)
    }

    pub fn is_switching_device(&self) -> bool {
        matches!(
            self,
            Self::Breaker | Self::Disconnector | Self::LoadBreakSwitch | Self::Fuse | Self::Switch
        )
    }

    /// Devices without terminals of their own, hosted on another device's terminal.
    pub fn is_auxiliary(&self) -> bool {
        matches!(
            self,
            Self::FaultIndicator | Self::CurrentTransformer | Self::PotentialTransformer
        )
    }

    pub fn is_rotating_machine(&self) -> bool {
        matches!(self, Self::SynchronousMachine | Self::AsynchronousMachine)
    }

    pub fn is_conducting_equipment(&self) -> bool {
        !(self.is_container() || self.is_connectivity() || self.is_auxiliary())
    }

    /// Classes whose names must be unique and are indexed by name.
    pub fn is_name_indexed(&self) -> bool {
        matches!(self, Self::Substation | Self::Enclosure | Self::EnergyConsumer)
            || self.is_rotating_machine()
    }

    /// Equipment whose connection points collapse into a single node.
    pub fn is_single_terminal(&self) -> bool {
        matches!(
            self,
            Self::EnergyConsumer | Self::PetersenCoil | Self::LinearShuntCompensator
        ) || self.is_rotating_machine()
    }

    /// Equipment that must be owned by a container.
    pub fn requires_container(&self) -> bool {
        self.is_switching_device()
            || self.is_rotating_machine()
            || matches!(
                self,
                Self::PowerTransformer
                    | Self::LinearShuntCompensator
                    | Self::BusbarSection
                    | Self::PetersenCoil
            )
    }

    pub fn requires_voltage_level(&self) -> bool {
        matches!(
            self,
            Self::BusbarSection | Self::Bay | Self::AcLineSegment | Self::Substation | Self::Enclosure
        )
    }

    /// Classes that legitimately end a line, so a single neighbor is not dangling.
    pub fn terminates_line(&self) -> bool {
        self.is_rotating_machine()
            || matches!(
                self,
                Self::EnergyConsumer
                    | Self::BusbarSection
                    | Self::PetersenCoil
                    | Self::LinearShuntCompensator
                    | Self::NetworkEquipment
            )
    }

    /// Strength of a neighbor when ranking terminal candidates.
    pub fn terminal_rank(&self) -> u8 {
        if self.is_busbar() {
            10
        } else if self.is_switching_device() {
            8
        } else if self.is_line_segment() {
            6
        } else {
            4
        }
    }

    /// Priority when choosing the equipment that anchors a node identifier.
    pub fn anchor_priority(&self) -> Option<u8> {
        if self.is_busbar() {
            Some(4)
        } else if self.is_transformer() {
            Some(3)
        } else if self.is_switching_device() {
            Some(2)
        } else if self.is_line_segment() {
            Some(1)
        } else {
            None
        }
    }

    /// Parse a container-type discriminator.
    pub fn parse_container(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "substation" => Some(Self::Substation),
            "enclosure" => Some(Self::Enclosure),
            "bay" => Some(Self::Bay),
            _ => None,
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Value stored in an object's property bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Mrid(Mrid),
    Object(ObjectId),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            PropertyValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            PropertyValue::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Text form used for identifier-like lookups.
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Str(s) => s.clone(),
            PropertyValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Mrid(m) => m.to_string(),
            PropertyValue::Object(id) => id.to_string(),
        }
    }
}

/// String-keyed property bag.
///
/// Declarative attributes that must be consumed exactly once are read with [`PropertyBag::take`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(PropertyValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(PropertyValue::as_f64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove and return a property.
    pub fn take(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }
}

/// A numbered connection point of conducting equipment.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    /// End number, 1 or 2
    pub sequence: u8,
    pub mrid: Option<Mrid>,
    /// Bound connectivity node
    pub node: Option<ObjectId>,
    /// Geometric end this terminal sits on (line segments only)
    pub point: Option<Point>,
}

impl Terminal {
    pub fn new(sequence: u8, node: Option<ObjectId>) -> Self {
        Self {
            sequence,
            mrid: None,
            node,
            point: None,
        }
    }
}

/// Any network entity: equipment, connectivity node or container.
#[derive(Debug, Clone)]
pub struct IdentifiedObject {
    pub class: ClassTag,
    pub mrid: Option<Mrid>,
    pub external_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Nominal voltage in kV
    pub voltage_level: Option<f64>,
    pub psr_type: Option<String>,
    pub geometry: Vec<Point>,
    pub properties: PropertyBag,
    /// Directly connected objects, symmetric by invariant
    pub neighbors: Vec<ObjectId>,
    /// Owning container (weak back-reference)
    pub container: Option<ObjectId>,
    /// Children, for containers only
    pub children: Vec<ObjectId>,
    /// Ordered terminals, for conducting equipment only
    pub terminals: Vec<Terminal>,
}

impl IdentifiedObject {
    pub fn new(class: ClassTag, external_id: impl Into<String>) -> Self {
        Self {
            class,
            mrid: None,
            external_id: external_id.into(),
            name: None,
            description: None,
            voltage_level: None,
            psr_type: None,
            geometry: Vec::new(),
            properties: PropertyBag::new(),
            neighbors: Vec::new(),
            container: None,
            children: Vec::new(),
            terminals: Vec::new(),
        }
    }

    pub fn with_mrid(mut self, mrid: Mrid) -> Self {
        self.mrid = Some(mrid);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_voltage(mut self, kv: f64) -> Self {
        self.voltage_level = Some(kv);
        self
    }

    pub fn with_geometry(mut self, geometry: Vec<Point>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Name when present, external id otherwise.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.external_id)
    }

    /// First and last geometry points.
    pub fn ends(&self) -> Option<(Point, Point)> {
        Some((*self.geometry.first()?, *self.geometry.last()?))
    }

    pub fn terminal(&self, sequence: u8) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.sequence == sequence)
    }
}
