use std::path::Path;

use anyhow::{Context, Result};
use gnt_io::{ingest_file, validate_topology};

use super::load_config;

pub fn handle(input: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let builder = ingest_file(input, &config)
        .with_context(|| format!("ingesting {}", input.display()))?;
    let (network, mut diagnostics) = builder.into_parts();
    let summary = validate_topology(&network, &config, &mut diagnostics);

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        return Ok(());
    }
    println!("Validated {} objects in {}", summary.objects_checked, input.display());
    println!("  Containment issues : {}", summary.containment_issues);
    println!("  Missing voltage    : {}", summary.missing_voltage);
    println!("  Dangling ends      : {}", summary.dangling_ends);
    for (code, count) in diagnostics.tally() {
        println!("  {:<34}: {count}", code.to_string());
    }
    print!("{diagnostics}");
    Ok(())
}
