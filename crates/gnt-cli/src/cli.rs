use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gnt", author, version, about = "GIS network topology builder", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest features, normalize the topology and export it
    Normalize {
        /// Feature file (JSON array of feature records)
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Topology configuration (TOML)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Write the snapshot, report and diagnostics here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// List deleted objects in the snapshot
        #[arg(long)]
        include_deleted: bool,
    },
    /// Ingest features and validate the raw topology
    Validate {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Graph statistics and islands
    Stats {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Normalize before computing statistics
        #[arg(long)]
        normalized: bool,
        /// Print island membership for every object
        #[arg(long)]
        emit: bool,
        /// Write a Graphviz DOT export to this file
        #[arg(long, value_hint = ValueHint::FilePath)]
        dot: Option<PathBuf>,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn test_normalize_arguments() {
        let cli = Cli::try_parse_from([
            "gnt",
            "normalize",
            "features.json",
            "--config",
            "topology.toml",
            "-o",
            "out.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        match cli.command {
            Commands::Normalize { input, config, out, include_deleted } => {
                assert_eq!(input, PathBuf::from("features.json"));
                assert_eq!(config, Some(PathBuf::from("topology.toml")));
                assert_eq!(out, Some(PathBuf::from("out.json")));
                assert!(!include_deleted);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
