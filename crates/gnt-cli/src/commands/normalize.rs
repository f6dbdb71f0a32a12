use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use gnt_algo::{normalize, NormalizeReport};
use gnt_core::{Diagnostics, NetworkSnapshot, StaticPsrTypes};
use gnt_io::{ingest_file, validate_topology, ValidationSummary};
use serde::Serialize;
use tracing::info;

use super::load_config;

#[derive(Serialize)]
struct NormalizeOutput<'a> {
    report: &'a NormalizeReport,
    validation: &'a ValidationSummary,
    diagnostics: &'a Diagnostics,
    snapshot: &'a NetworkSnapshot,
}

pub fn handle(
    input: &Path,
    config: Option<&Path>,
    out: Option<&Path>,
    include_deleted: bool,
) -> Result<()> {
    let start = Instant::now();
    let config = load_config(config)?;
    let builder = ingest_file(input, &config)
        .with_context(|| format!("ingesting {}", input.display()))?;
    let (mut network, mut diagnostics) = builder.into_parts();

    if config.precheck_connectivity {
        let mut precheck = Diagnostics::new();
        let summary = validate_topology(&network, &config, &mut precheck);
        info!(dangling = summary.dangling_ends, "raw graph checked");
        diagnostics.merge(precheck);
    }

    let report = normalize(&mut network, &mut diagnostics).context("normalizing topology")?;
    let validation = validate_topology(&network, &config, &mut diagnostics);
    let psr = StaticPsrTypes::from_config(&config);
    let snapshot = NetworkSnapshot::build_with(&network, &psr, include_deleted)?;

    let json = serde_json::to_string_pretty(&NormalizeOutput {
        report: &report,
        validation: &validation,
        diagnostics: &diagnostics,
        snapshot: &snapshot,
    })?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Normalized {} objects into {} ({})",
                snapshot.objects.len(),
                path.display(),
                diagnostics.summary()
            );
        }
        None => println!("{json}"),
    }
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        issues = diagnostics.issues.len(),
        "normalize finished"
    );
    Ok(())
}
