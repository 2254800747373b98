//! Collected warnings and corrections from a pathway run.
//!
//! Fatal problems abort the run through [`PathwayError`](crate::PathwayError).
//! Everything else (negative funnel bounds that were clamped, undefined
//! S-curve entries, funnel corrections) is recorded here and also emitted
//! through `tracing`, so that a finished run can report what was adjusted.
//!
//! # Example
//!
//! ```
//! use tpa_core::diagnostics::{Diagnostics, Severity};
//! use tpa_core::ErrorKind;
//!
//! let mut diag = Diagnostics::new();
//! diag.warn(ErrorKind::BoundViolation, "funnel minimum raised to S-curve", "wind", 2030);
//! diag.correct(ErrorKind::BoundViolation, "upper bound lifted onto S-curve window", "wind", 2030);
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.correction_count(), 1);
//! assert_eq!(diag.for_technology("wind").count(), 2);
//! ```

use crate::error::ErrorKind;
use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual value that should be investigated; the run continued unchanged
    Warning,
    /// A bound was adjusted to keep the period solvable
    Correction,
}

/// A single diagnostic issue encountered during a run
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            technology: None,
            year: None,
        }
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Correction => "correction",
        };

        write!(f, "[{}:{}] {}", severity, self.kind, self.message)?;

        if let Some(technology) = &self.technology {
            write!(f, " ({})", technology)?;
        }
        if let Some(year) = self.year {
            write!(f, " in {}", year)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Record a warning for a technology in a given year and log it.
    pub fn warn(&mut self, kind: ErrorKind, message: &str, technology: &str, year: i32) {
        tracing::warn!(%kind, technology, year, "{}", message);
        self.issues.push(
            DiagnosticIssue::new(Severity::Warning, kind, message)
                .with_technology(technology)
                .with_year(year),
        );
    }

    /// Record a bound correction for a technology in a given year and log it.
    pub fn correct(&mut self, kind: ErrorKind, message: &str, technology: &str, year: i32) {
        tracing::warn!(%kind, technology, year, "correction: {}", message);
        self.issues.push(
            DiagnosticIssue::new(Severity::Correction, kind, message)
                .with_technology(technology)
                .with_year(year),
        );
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn correction_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Correction)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues attached to one technology
    pub fn for_technology<'a>(
        &'a self,
        technology: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues
            .iter()
            .filter(move |i| i.technology.as_deref() == Some(technology))
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let corrections = self.correction_count();

        match (warnings, corrections) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, c) => format!("{} correction{}", c, if c == 1 { "" } else { "s" }),
            (w, c) => format!(
                "{} warning{}, {} correction{}",
                w,
                if w == 1 { "" } else { "s" },
                c,
                if c == 1 { "" } else { "s" }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_pluralization() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.warn(ErrorKind::NumericAnomaly, "undefined value", "pv", 2030);
        assert_eq!(diag.summary(), "1 warning");

        diag.warn(ErrorKind::NumericAnomaly, "undefined value", "wind", 2030);
        diag.correct(ErrorKind::BoundViolation, "collapsed", "wind", 2035);
        assert_eq!(diag.summary(), "2 warnings, 1 correction");
    }

    #[test]
    fn test_issue_display() {
        let issue = DiagnosticIssue::new(Severity::Warning, ErrorKind::BoundViolation, "negative minimum")
            .with_technology("coal")
            .with_year(2040);
        assert_eq!(
            issue.to_string(),
            "[warning:bound-violation] negative minimum (coal) in 2040"
        );
    }

    #[test]
    fn test_serialization_skips_empty() {
        let diag = Diagnostics::new();
        let json = serde_json::to_string(&diag).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_merge() {
        let mut a = Diagnostics::new();
        a.warn(ErrorKind::NumericAnomaly, "x", "t", 2025);
        let mut b = Diagnostics::new();
        b.correct(ErrorKind::BoundViolation, "y", "t", 2030);
        a.merge(b);
        assert_eq!(a.issues.len(), 2);
        assert_eq!(a.for_technology("t").count(), 2);
    }
}
