//! Auxiliary-device detachment.
//!
//! Fault indicators and instrument transformers have no terminals of their own.
//! They are spliced out of the graph and recorded against a terminal of the
//! equipment they monitor: a switch in the same bay, else a nearby cable.

use gnt_core::{
    ClassTag, DiagnosticCode, Diagnostics, Network, ObjectId, PropertyValue, HOST_EQUIPMENT_KEY,
    HOST_TERMINAL_KEY,
};
use tracing::debug;

/// Detach every auxiliary device; returns how many were processed.
pub fn detach_auxiliary(network: &mut Network, diag: &mut Diagnostics) -> usize {
    let mut detached = 0;
    for id in network.ids_where(|c| c.is_auxiliary()) {
        let neighbors = network.distinct_neighbors(id);
        for n in &neighbors {
            network.unlink(id, *n);
        }
        if let Some((first, rest)) = neighbors.split_first() {
            for n in rest {
                network.link_once(*first, *n);
            }
        }
        detached += 1;

        let bay = network.container_of_class(id, ClassTag::Bay);
        let host = bay
            .and_then(|b| bay_switch(network, b))
            .or_else(|| nearby_cable(network, bay, &neighbors));

        let Some(host) = host else {
            let (code, message) = match bay {
                Some(_) => (
                    DiagnosticCode::AuxiliaryCannotFindSwitch,
                    "No switch or cable found in the bay",
                ),
                None if neighbors.is_empty() => (
                    DiagnosticCode::AuxiliaryCannotFindParent,
                    "Not placed in a bay and not connected",
                ),
                None => (
                    DiagnosticCode::AuxiliaryCannotFindCable,
                    "No cable found next to the device",
                ),
            };
            diag.add_warning_for(code, message, &network[id]);
            continue;
        };

        let sequence = host_terminal(network, id, host);
        debug!(device = %network[id].external_id, host = %network[host].external_id, sequence, "auxiliary device attached");
        let object = network.get_mut(id);
        object
            .properties
            .insert(HOST_EQUIPMENT_KEY, PropertyValue::Object(host));
        object
            .properties
            .insert(HOST_TERMINAL_KEY, PropertyValue::Number(sequence as f64));
    }
    detached
}

fn bay_switch(network: &Network, bay: ObjectId) -> Option<ObjectId> {
    network
        .children(bay)
        .into_iter()
        .filter(|c| network.class(*c).is_switching_device())
        .min()
}

/// A cable among the former neighbors, one node further, or anywhere in the bay.
fn nearby_cable(network: &Network, bay: Option<ObjectId>, neighbors: &[ObjectId]) -> Option<ObjectId> {
    let is_cable = |id: &ObjectId| network.class(*id).is_line_segment();
    neighbors
        .iter()
        .copied()
        .find(is_cable)
        .or_else(|| {
            neighbors
                .iter()
                .filter(|n| network.class(**n).is_connectivity())
                .flat_map(|n| network.distinct_neighbors(*n))
                .find(is_cable)
        })
        .or_else(|| {
            bay.and_then(|b| network.children(b).into_iter().filter(is_cable).min())
        })
}

/// Terminal of `host` closest to the device: the nearer line end, else terminal 1.
fn host_terminal(network: &Network, device: ObjectId, host: ObjectId) -> u8 {
    let host = &network[host];
    match (network[device].geometry.first(), host.ends()) {
        (Some(p), Some((start, stop))) if host.class.is_line_segment() => {
            if p.distance(&start) <= p.distance(&stop) {
                1
            } else {
                2
            }
        }
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnt_core::{IdentifiedObject, Point};

    #[test]
    fn test_indicator_is_spliced_and_hosted_on_bay_switch() {
        let mut net = Network::new();
        let bay = net.add(IdentifiedObject::new(ClassTag::Bay, "bay"));
        let brk = net.add(IdentifiedObject::new(ClassTag::Breaker, "brk"));
        let a = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "a"));
        let fi = net.add(IdentifiedObject::new(ClassTag::FaultIndicator, "fi"));
        let b = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "b"));
        net.add_child(bay, brk);
        net.add_child(bay, fi);
        net.link(a, fi);
        net.link(fi, b);

        let mut diag = Diagnostics::new();
        assert_eq!(detach_auxiliary(&mut net, &mut diag), 1);
        assert!(net.neighbors(fi).is_empty());
        assert!(net.is_linked(a, b));
        assert!(!net.is_deleted(fi));
        assert_eq!(
            net[fi].properties.get(HOST_EQUIPMENT_KEY),
            Some(&PropertyValue::Object(brk))
        );
        assert!(!diag.has_issues());
    }

    #[test]
    fn test_indicator_outside_bay_uses_cable_end() {
        let mut net = Network::new();
        let cable = net.add(
            IdentifiedObject::new(ClassTag::AcLineSegment, "cable")
                .with_geometry(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]),
        );
        let node = net.add(IdentifiedObject::new(ClassTag::ConnectivityNode, "n"));
        let ct = net.add(
            IdentifiedObject::new(ClassTag::CurrentTransformer, "ct")
                .with_geometry(vec![Point::new(99.0, 0.0)]),
        );
        net.link(cable, node);
        net.link(node, ct);

        let mut diag = Diagnostics::new();
        detach_auxiliary(&mut net, &mut diag);
        assert_eq!(
            net[ct].properties.get(HOST_EQUIPMENT_KEY),
            Some(&PropertyValue::Object(cable))
        );
        assert_eq!(net[ct].properties.get_f64(HOST_TERMINAL_KEY), Some(2.0));
    }

    #[test]
    fn test_unhosted_devices_are_reported() {
        let mut net = Network::new();
        net.add(IdentifiedObject::new(ClassTag::PotentialTransformer, "lonely"));
        let bay = net.add(IdentifiedObject::new(ClassTag::Bay, "bay"));
        let fi = net.add(IdentifiedObject::new(ClassTag::FaultIndicator, "fi"));
        net.add_child(bay, fi);

        let mut diag = Diagnostics::new();
        detach_auxiliary(&mut net, &mut diag);
        assert_eq!(diag.count(DiagnosticCode::AuxiliaryCannotFindParent), 1);
        assert_eq!(diag.count(DiagnosticCode::AuxiliaryCannotFindSwitch), 1);
    }
}
