//! Transformer sanity checks on the normalized graph.
//!
//! Nothing is changed here. Findings go to the diagnostic sink, except a
//! transformer linked to something other than a connectivity node, which means
//! the graph was corrupted upstream and aborts the run.

use gnt_core::{
    ClassTag, DiagnosticCode, DiagnosticIssue, Diagnostics, Network, ObjectId, TopologyError,
    TopologyResult,
};
use tracing::warn;

use super::same_voltage;

/// Check every transformer; returns the number of issues reported.
pub fn check_transformers(network: &Network, diag: &mut Diagnostics) -> TopologyResult<usize> {
    let mut issues = 0;
    for transformer in network.ids_where(|c| c.is_transformer()) {
        let object = &network[transformer];
        let nodes = network.distinct_neighbors(transformer);
        if let Some(bad) = nodes.iter().find(|n| !network.class(**n).is_connectivity()) {
            return Err(TopologyError::StructuralCorruption {
                object: object.external_id.clone(),
                reason: format!(
                    "neighbor {} is a {}, not a connectivity node",
                    network[*bad].external_id,
                    network.class(*bad)
                ),
            });
        }

        let mut report = |code: DiagnosticCode, message: String| {
            warn!(transformer = %object.external_id, ?code, "{message}");
            diag.add(DiagnosticIssue::error(code, message).with_object(object));
            issues += 1;
        };

        let attached: Vec<ObjectId> = nodes
            .iter()
            .flat_map(|n| network.distinct_neighbors(*n))
            .filter(|n| *n != transformer)
            .collect();
        let lines: Vec<ObjectId> = attached
            .iter()
            .copied()
            .filter(|n| network.class(*n).is_line_segment())
            .collect();
        let primary_kv = object
            .container
            .and_then(|c| network[c].voltage_level)
            .or(object.voltage_level);

        if lines.is_empty() {
            report(DiagnosticCode::TransformerNoConnection, "No cable connected".to_string());
        } else if let Some(kv) = primary_kv {
            let primary = lines
                .iter()
                .filter(|l| network[**l].voltage_level.is_some_and(|v| same_voltage(v, kv)))
                .count();
            if primary != 1 {
                report(
                    DiagnosticCode::TransformerWrongPrimaryVoltage,
                    format!("Expected one {kv} kV primary cable, found {primary}"),
                );
            }
        }

        if attached.iter().any(|n| network.class(*n).is_busbar()) {
            report(
                DiagnosticCode::TransformerCableToBusbarDirect,
                "Connected to a busbar without a bay in between".to_string(),
            );
        }

        match network.root_container(transformer) {
            None => report(DiagnosticCode::TransformerNoContainer, "Not inside a container".to_string()),
            Some(root) if network.class(root) == ClassTag::Substation => {
                if let Some(kv) = primary_kv {
                    if !has_busbar_at(network, root, kv) {
                        report(
                            DiagnosticCode::TransformerMissingPrimaryBusbar,
                            format!("Substation has no {kv} kV busbar"),
                        );
                    }
                }
            }
            Some(_) => {}
        }
    }
    Ok(issues)
}

/// Whether any busbar below `root` carries voltage `kv`.
fn has_busbar_at(network: &Network, root: ObjectId, kv: f64) -> bool {
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        for child in network.children(current) {
            let object = &network[child];
            if object.class.is_busbar() && object.voltage_level.is_some_and(|v| same_voltage(v, kv)) {
                return true;
            }
            stack.push(child);
        }
    }
    false
}
