//! # gnt-algo: Connectivity Normalization
//!
//! Rewrites the raw graph produced by ingestion into a normalized topology that
//! downstream writers can export with stable identifiers.
//!
//! ## Normalizer
//!
//! [`normalize`] runs the passes of the [`normalize`](mod@normalize) module in a
//! fixed order and returns a [`NormalizeReport`] of per-pass counts:
//!
//! - auxiliary detachment, connector contraction and busbar normalization
//! - transformer side resolution and node merging
//! - deterministic terminal ordering with padding
//! - stable connectivity-node identifiers
//! - transformer sanity checks
//!
//! Recoverable findings go to the caller's [`gnt_core::Diagnostics`]; only
//! structural corruption is returned as an error.

pub mod normalize;

pub use normalize::{normalize, NormalizeReport};
