//! Structured diagnostics for ingestion, normalization and validation.
//!
//! Nearly every problem found while building the connectivity graph is recovered
//! locally and reported here instead of aborting the run. Each issue is keyed by:
//!
//! - Severity (Warning, Error)
//! - A closed [`DiagnosticCode`]
//! - The affected object, when there is one
//! - Optional geometry and a free-form context map
//!
//! The sink is append-only and serializes to JSON for reporting.
//!
//! # Example
//!
//! ```
//! use gnt_core::diagnostics::{DiagnosticCode, Diagnostics};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning(DiagnosticCode::DuplicateName, "Two consumers named 'Farm'");
//! diag.add_error(DiagnosticCode::SelfLoop, "Cable connects a node to itself");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::Point;
use crate::{ClassTag, IdentifiedObject};

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Repaired or left as-is; the graph is still usable
    Warning,
    /// The object was dropped or could not be repaired
    Error,
}

/// Closed set of diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticCode {
    DanglingLine,
    DanglingEdge,
    ComponentHasNoParent,
    ComponentParentTooFar,
    ComponentNoRootParent,
    ComponentMissingVoltageLevel,
    ComponentOverlayAnotherComponent,
    DuplicateName,
    DuplicateMrid,
    WrongNumberOfTerminals,
    UnresolvableTerminalOrdering,
    UnanchoredConnectivityNode,
    SelfLoop,
    TransformerNoConnection,
    TransformerWrongPrimaryVoltage,
    TransformerMissingPrimaryBusbar,
    TransformerCableToBusbarDirect,
    TransformerNoContainer,
    AuxiliaryCannotFindParent,
    AuxiliaryCannotFindCable,
    AuxiliaryCannotFindSwitch,
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why a line or edge end was classified as dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DanglingReason {
    NearBay,
    NearConsumer,
    NearDanglingEnd,
    NearEnclosure,
    Isolated,
    VerticalEdge,
    TopDownEdge,
    /// Fast validation mode skips the proximity scan
    Unclassified,
}

impl std::fmt::Display for DanglingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Reference to the object a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRef {
    pub class: ClassTag,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrid: Option<String>,
}

impl ObjectRef {
    pub fn of(object: &IdentifiedObject) -> Self {
        Self {
            class: object.class,
            external_id: object.external_id.clone(),
            mrid: object.mrid.map(|m| m.to_string()),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.class, self.external_id)
    }
}

/// A single diagnostic issue
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub code: DiagnosticCode,
    /// Human-readable description of the issue
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<Point>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            object: None,
            geometry: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Attach the affected object (and its geometry when none is set yet).
    pub fn with_object(mut self, object: &IdentifiedObject) -> Self {
        self.object = Some(ObjectRef::of(object));
        if self.geometry.is_empty() {
            self.geometry = object.geometry.clone();
        }
        self
    }

    pub fn with_geometry(mut self, geometry: Vec<Point>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.code, self.message)?;

        if let Some(object) = &self.object {
            write!(f, " ({})", object)?;
        }
        if let Some(point) = self.geometry.first() {
            write!(f, " at {}", point)?;
        }

        Ok(())
    }
}

/// Append-only collection of diagnostic issues
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw issue directly
    pub fn add(&mut self, issue: DiagnosticIssue) {
        tracing::debug!(code = %issue.code, "{}", issue);
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, code: DiagnosticCode, message: &str) {
        self.add(DiagnosticIssue::warning(code, message));
    }

    pub fn add_error(&mut self, code: DiagnosticCode, message: &str) {
        self.add(DiagnosticIssue::error(code, message));
    }

    /// Add a warning about a specific object
    pub fn add_warning_for(&mut self, code: DiagnosticCode, message: &str, object: &IdentifiedObject) {
        self.add(DiagnosticIssue::warning(code, message).with_object(object));
    }

    /// Add an error about a specific object
    pub fn add_error_for(&mut self, code: DiagnosticCode, message: &str, object: &IdentifiedObject) {
        self.add(DiagnosticIssue::error(code, message).with_object(object));
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Number of issues with the given code
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues_by_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    // =========================================================================
    // Utility Methods
    // =========================================================================

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// Issue counts per code, in code order
    pub fn tally(&self) -> BTreeMap<DiagnosticCode, usize> {
        let mut tally = BTreeMap::new();
        for issue in &self.issues {
            *tally.entry(issue.code).or_insert(0) += 1;
        }
        tally
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}
