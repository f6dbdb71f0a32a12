use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use anyhow::{anyhow, Result};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::{ClassTag, Network, ObjectId};

/// Summary statistics over the neighbor graph (counts, degree distribution, components).
#[derive(Debug)]
pub struct GraphStats {
    pub object_count: usize,
    pub link_count: usize,
    pub deleted_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub by_class: BTreeMap<ClassTag, usize>,
}

/// One connected island of the neighbor graph.
#[derive(Debug)]
pub struct IslandSummary {
    pub island_id: usize,
    pub object_count: usize,
}

/// Island membership of a single object.
#[derive(Debug)]
pub struct ObjectAssignment {
    pub object: ObjectId,
    pub label: String,
    pub island_id: usize,
}

#[derive(Debug)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<ObjectAssignment>,
}

/// Build a petgraph view of the live connectivity graph (containers excluded).
pub fn to_petgraph(network: &Network) -> (UnGraph<ObjectId, ()>, HashMap<ObjectId, NodeIndex>) {
    let mut graph = UnGraph::new_undirected();
    let mut index = HashMap::new();
    for (id, object) in network.iter() {
        if !object.class.is_container() {
            index.insert(id, graph.add_node(id));
        }
    }
    for (id, object) in network.iter() {
        let Some(&a) = index.get(&id) else { continue };
        for n in &object.neighbors {
            // Each undirected link appears in both lists; add it once.
            if *n > id {
                if let Some(&b) = index.get(n) {
                    graph.add_edge(a, b, ());
                }
            }
        }
    }
    (graph, index)
}

/// Calculates graph-level statistics such as degree distribution and component counts.
pub fn graph_stats(network: &Network) -> Result<GraphStats> {
    let (graph, _) = to_petgraph(network);
    let object_count = graph.node_count();
    let link_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors(n).count())
        .collect();
    let min_degree = *degrees.iter().min().unwrap_or(&0);
    let max_degree = *degrees.iter().max().unwrap_or(&0);
    let avg_degree = if object_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / object_count as f64
    };
    let mut by_class = BTreeMap::new();
    for (_, object) in network.iter() {
        *by_class.entry(object.class).or_insert(0) += 1;
    }
    Ok(GraphStats {
        object_count,
        link_count,
        deleted_count: network.deleted_count(),
        connected_components: connected_components(&graph),
        min_degree,
        avg_degree,
        max_degree,
        by_class,
    })
}

/// Labels connected components (breadth-first search) over neighbor links.
pub fn find_islands(network: &Network) -> Result<IslandAnalysis> {
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();
    let mut island_id = 0;
    for start in network.ids() {
        if network.class(start).is_container() || visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            members.push(id);
            for n in network.neighbors(id) {
                if !visited.contains(n) {
                    queue.push_back(*n);
                }
            }
        }
        islands.push(IslandSummary {
            island_id,
            object_count: members.len(),
        });
        for id in members {
            assignments.push(ObjectAssignment {
                object: id,
                label: network[id].label().to_string(),
                island_id,
            });
        }
        island_id += 1;
    }
    assignments.sort_by_key(|a| a.object);
    Ok(IslandAnalysis {
        islands,
        assignments,
    })
}

/// Export the topology to a DOT string (Graphviz) so external tools can visualize it.
pub fn export_graph(network: &Network, format: &str) -> Result<String> {
    match format.to_ascii_lowercase().as_str() {
        "graphviz" | "dot" => Ok(render_dot(network)),
        other => Err(anyhow!("unsupported graph export format '{other}'")),
    }
}

fn render_dot(network: &Network) -> String {
    let (graph, _) = to_petgraph(network);
    let mut buffer = String::new();
    buffer.push_str("graph gnt_network {\n");
    for node in graph.node_indices() {
        let object = &network[graph[node]];
        let label = sanitize_label(&format!("{} {}", object.class, object.label()));
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", graph[node].value(), label));
    }
    for edge in graph.edge_indices() {
        if let Some((a, b)) = graph.edge_endpoints(edge) {
            buffer.push_str(&format!("  n{} -- n{};\n", graph[a].value(), graph[b].value()));
        }
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}
