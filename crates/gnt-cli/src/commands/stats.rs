use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gnt_algo::normalize;
use gnt_core::graph_utils;
use gnt_io::ingest_file;

use super::load_config;

pub fn handle(
    input: &Path,
    config: Option<&Path>,
    normalized: bool,
    emit: bool,
    dot: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let builder = ingest_file(input, &config)
        .with_context(|| format!("ingesting {}", input.display()))?;
    let (mut network, mut diagnostics) = builder.into_parts();
    if normalized {
        normalize(&mut network, &mut diagnostics)?;
    }

    let stats = graph_utils::graph_stats(&network)?;
    println!("Graph statistics for {}:", input.display());
    println!("  Objects       : {}", stats.object_count);
    println!("  Links         : {}", stats.link_count);
    println!("  Deleted       : {}", stats.deleted_count);
    println!("  Components    : {}", stats.connected_components);
    println!(
        "  Degree [min/avg/max]: {}/{:.2}/{}",
        stats.min_degree, stats.avg_degree, stats.max_degree
    );
    for (class, count) in &stats.by_class {
        println!("  {:<24}: {count}", class.to_string());
    }

    let analysis = graph_utils::find_islands(&network)?;
    for summary in &analysis.islands {
        println!("Island {}: {} object(s)", summary.island_id, summary.object_count);
    }
    if emit {
        println!("\nObject → Island assignments:");
        for assignment in &analysis.assignments {
            println!(
                "  {:>6}: {:<24} -> island {}",
                assignment.object.to_string(),
                assignment.label,
                assignment.island_id
            );
        }
    }

    if let Some(path) = dot {
        let rendered = graph_utils::export_graph(&network, "dot")?;
        fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
        println!("Graph written to {}", path.display());
    }
    Ok(())
}
