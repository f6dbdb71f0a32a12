//! # gnt-io: Feature Ingestion, Graph Building & Validation
//!
//! Turns loosely digitized GIS features into a raw connectivity graph and checks it.
//!
//! ## Design Philosophy
//!
//! **Single owner**: the [`GraphBuilder`] owns the object arena, the vertex graph and
//! every lookup index. Importers only call its attach/connect operations.
//!
//! **Error Recovery**: duplicates, overlaps and unresolved containers are reported
//! through [`gnt_core::Diagnostics`] and ingestion continues. Only an invalid
//! container-type reference aborts the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gnt_core::{Diagnostics, TopologyConfig};
//! use gnt_io::{ingest_file, validate_topology};
//!
//! fn main() -> gnt_core::TopologyResult<()> {
//!     let config = TopologyConfig::default();
//!     let builder = ingest_file("features.json", &config)?;
//!     let (network, mut diagnostics) = builder.into_parts();
//!     validate_topology(&network, &config, &mut diagnostics);
//!     println!("{}", diagnostics.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`vertex_index`] - Tolerance-aware coordinate and named-terminal lookup
//! - [`builder`] - Vertex graph, object indexes and container pairing
//! - [`features`] - Feature record types and JSON loading
//! - [`ingest`] - Record ordering and line/equipment attachment
//! - [`validator`] - Containment, voltage-level and dangling-end checks

pub mod builder;
pub mod features;
pub mod ingest;
pub mod validator;
pub mod vertex_index;

pub use builder::{Attachment, GraphBuilder};
pub use features::{load_features, parse_features, FeaturePoint, FeatureRecord};
pub use ingest::{ingest, ingest_file, IngestStats};
pub use validator::{validate_topology, ValidationSummary};
pub use vertex_index::{VertexId, VertexIndex};
