//! Serializable export view handed to downstream writers.
//!
//! Every live object must carry a stable identifier by the time it is exported;
//! a missing one means normalization was skipped or corrupted and is fatal.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{TopologyError, TopologyResult};
use crate::{
    ClassTag, IdentifiedObject, Network, ObjectId, PropertyValue, TopologyConfig,
    HOST_EQUIPMENT_KEY, HOST_TERMINAL_KEY, NORMAL_OPEN_KEY,
};

/// Secondary classification lookup, keyed by class.
pub trait PsrTypeRepository {
    fn psr_type(&self, class: ClassTag) -> Option<String>;
}

/// Table-backed repository, usually filled from [`TopologyConfig::psr_types`].
#[derive(Debug, Clone, Default)]
pub struct StaticPsrTypes {
    by_class: BTreeMap<String, String>,
}

impl StaticPsrTypes {
    pub fn new(by_class: BTreeMap<String, String>) -> Self {
        Self { by_class }
    }

    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(config.psr_types.clone())
    }
}

impl PsrTypeRepository for StaticPsrTypes {
    fn psr_type(&self, class: ClassTag) -> Option<String> {
        self.by_class.get(&class.to_string()).cloned()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotTerminal {
    pub sequence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity_node: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotObject {
    pub mrid: Option<String>,
    pub class: ClassTag,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psr_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terminals: Vec<SnapshotTerminal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<String>,
    /// Hosting terminal of an auxiliary device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_terminal: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub normal_open: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub objects: Vec<SnapshotObject>,
    pub deleted_count: usize,
}

impl NetworkSnapshot {
    /// Build the export view of live objects.
    pub fn build(network: &Network, psr: &dyn PsrTypeRepository) -> TopologyResult<Self> {
        Self::build_with(network, psr, false)
    }

    /// Build the export view, optionally listing deleted objects for debugging.
    pub fn build_with(
        network: &Network,
        psr: &dyn PsrTypeRepository,
        include_deleted: bool,
    ) -> TopologyResult<Self> {
        let mrid_of = |id: ObjectId| {
            (!network.is_deleted(id))
                .then(|| network[id].mrid.map(|m| m.to_string()))
                .flatten()
        };
        let mut objects = Vec::new();
        for (id, object, deleted) in network.iter_all() {
            if deleted && !include_deleted {
                continue;
            }
            if !deleted && object.mrid.is_none() {
                return Err(TopologyError::MissingIdentifier {
                    object: format!("{} {} ({})", object.class, object.external_id, id),
                });
            }
            objects.push(SnapshotObject {
                mrid: object.mrid.map(|m| m.to_string()),
                class: object.class,
                external_id: object.external_id.clone(),
                name: object.name.clone(),
                psr_type: object
                    .psr_type
                    .clone()
                    .or_else(|| psr.psr_type(object.class)),
                voltage_level: object.voltage_level,
                container: object.container.and_then(mrid_of),
                terminals: object
                    .terminals
                    .iter()
                    .map(|t| SnapshotTerminal {
                        sequence: t.sequence,
                        mrid: t.mrid.map(|m| m.to_string()),
                        connectivity_node: t.node.and_then(mrid_of),
                    })
                    .collect(),
                neighbors: object.neighbors.iter().filter_map(|n| mrid_of(*n)).collect(),
                host_terminal: host_terminal(network, object),
                normal_open: object.class.is_switching_device()
                    && object.properties.get_bool(NORMAL_OPEN_KEY).unwrap_or(false),
                deleted,
            });
        }
        Ok(Self {
            objects,
            deleted_count: network.deleted_count(),
        })
    }
}

/// Terminal identifier of the equipment an auxiliary device was attached to.
fn host_terminal(network: &Network, object: &IdentifiedObject) -> Option<String> {
    let host = object
        .properties
        .get(HOST_EQUIPMENT_KEY)
        .and_then(PropertyValue::as_object)
        .filter(|h| !network.is_deleted(*h))?;
    let sequence = object.properties.get_f64(HOST_TERMINAL_KEY).unwrap_or(1.0) as u8;
    network[host]
        .terminal(sequence)
        .and_then(|t| t.mrid)
        .map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mrid, Terminal};

    #[test]
    fn test_snapshot_requires_identifiers() {
        let mut net = Network::new();
        net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "cn"));
        let err = NetworkSnapshot::build(&net, &StaticPsrTypes::default()).unwrap_err();
        assert!(matches!(err, TopologyError::MissingIdentifier { .. }));
    }

    #[test]
    fn test_snapshot_resolves_host_terminal() {
        let mut net = Network::new();
        let mut breaker =
            IdentifiedObject::new(ClassTag::Breaker, "brk").with_mrid(Mrid::from_u128(10));
        let mut terminal = Terminal::new(2, None);
        terminal.mrid = Some(Mrid::from_u128(11));
        breaker.terminals.push(terminal);
        let brk = net.add(breaker);
        net.add(
            IdentifiedObject::new(ClassTag::CurrentTransformer, "ct")
                .with_mrid(Mrid::from_u128(12))
                .with_property(HOST_EQUIPMENT_KEY, PropertyValue::Object(brk))
                .with_property(HOST_TERMINAL_KEY, PropertyValue::Number(2.0)),
        );

        let snapshot = NetworkSnapshot::build(&net, &StaticPsrTypes::default()).unwrap();
        assert_eq!(
            snapshot.objects[1].host_terminal,
            Some(Mrid::from_u128(11).to_string())
        );
        assert!(snapshot.objects[0].host_terminal.is_none());
    }

    #[test]
    fn test_snapshot_uses_psr_repository_and_hides_deleted() {
        let mut net = Network::new();
        let cable = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "c1").with_mrid(Mrid::from_u128(1)),
        );
        let gone = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "gone"));
        net.delete(gone);

        let mut table = BTreeMap::new();
        table.insert("AcLineSegment".to_string(), "Cable".to_string());
        let psr = StaticPsrTypes::new(table);

        let snapshot = NetworkSnapshot::build(&net, &psr).unwrap();
        assert_eq!(snapshot.objects.len(), 1);
        assert_eq!(snapshot.objects[0].psr_type.as_deref(), Some("Cable"));
        assert_eq!(snapshot.deleted_count, 1);
        assert_eq!(net[cable].external_id, "c1");

        let debug = NetworkSnapshot::build_with(&net, &psr, true).unwrap();
        assert_eq!(debug.objects.len(), 2);
        assert!(debug.objects[1].deleted);
    }
}
