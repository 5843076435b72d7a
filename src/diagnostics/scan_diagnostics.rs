//! Scan diagnostics for structured skip reasons and per-file errors.
//!
//! Every diagnostic sorts deterministically (path first, then kind) so the
//! end-of-run report is stable across runs and worker counts.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Reason why a file was not indexed.
///
/// Variant order mirrors the classification pipeline: global rules first,
/// then category rules, then filesystem problems found while reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Matched a global ignore pattern
    IgnoredGlobal,
    /// Larger than `ignore.max_file_size`
    Oversized,
    /// The file's category is disabled
    DisabledCategory,
    /// Matched a category exclude glob
    ExcludedByGlob,
    /// Category has include globs and none matched
    NotIncluded,
    /// Extension belongs to no enabled category
    UnknownExtension,
    /// Could not be read
    Unreadable,
}

impl SkipReason {
    /// Stable sort key; lower values are reported first.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::IgnoredGlobal => 0,
            SkipReason::Oversized => 1,
            SkipReason::DisabledCategory => 2,
            SkipReason::ExcludedByGlob => 3,
            SkipReason::NotIncluded => 4,
            SkipReason::UnknownExtension => 5,
            SkipReason::Unreadable => 6,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::IgnoredGlobal => "global ignore rule",
            SkipReason::Oversized => "exceeds max file size",
            SkipReason::DisabledCategory => "category disabled",
            SkipReason::ExcludedByGlob => "excluded by pattern",
            SkipReason::NotIncluded => "not matched by include patterns",
            SkipReason::UnknownExtension => "no category for extension",
            SkipReason::Unreadable => "unreadable",
        }
    }

    /// Whether the skip deserves a warning rather than silent accounting.
    ///
    /// Unreadable and oversized files are things a user probably wanted indexed.
    pub fn is_warning(&self) -> bool {
        matches!(self, SkipReason::Oversized | SkipReason::Unreadable)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for SkipReason {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SkipReason {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Stage in the pipeline where a per-file error occurred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStage {
    Read,
    Parse,
    /// Applying graph operations for the file
    Sync,
    Delete,
}

impl DiagnosticStage {
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Read => 0,
            DiagnosticStage::Parse => 1,
            DiagnosticStage::Sync => 2,
            DiagnosticStage::Delete => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Read => "reading file",
            DiagnosticStage::Parse => "parsing content",
            DiagnosticStage::Sync => "syncing graph",
            DiagnosticStage::Delete => "deleting from graph",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for DiagnosticStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A diagnostic event from a scan or a watcher re-index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanDiagnostic {
    Skipped { path: String, reason: SkipReason },
    Error {
        path: String,
        stage: DiagnosticStage,
        message: String,
    },
}

impl ScanDiagnostic {
    pub fn path(&self) -> &str {
        match self {
            ScanDiagnostic::Skipped { path, .. } => path,
            ScanDiagnostic::Error { path, .. } => path,
        }
    }

    /// Path, then Error before Skipped, then stage/reason.
    pub fn sort_key(&self) -> (&str, u8, u8) {
        match self {
            ScanDiagnostic::Error { path, stage, .. } => (path, 0, stage.sort_key()),
            ScanDiagnostic::Skipped { path, reason } => (path, 1, reason.sort_key()),
        }
    }

    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        ScanDiagnostic::Skipped {
            path: path.into(),
            reason,
        }
    }

    pub fn error(path: impl Into<String>, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        ScanDiagnostic::Error {
            path: path.into(),
            stage,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScanDiagnostic::Error { .. })
    }

    /// One-line form used in human output.
    ///
    /// - "SKIP notes/big.pdf: exceeds max file size"
    /// - "ERROR src/bad.py: parsing content: invalid UTF-8"
    pub fn format_line(&self) -> String {
        match self {
            ScanDiagnostic::Skipped { path, reason } => format!("SKIP {}: {}", path, reason),
            ScanDiagnostic::Error {
                path,
                stage,
                message,
            } => format!("ERROR {}: {}: {}", path, stage, message),
        }
    }
}

impl fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_line())
    }
}

impl PartialOrd for ScanDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScanDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_order_follows_pipeline() {
        assert!(SkipReason::IgnoredGlobal < SkipReason::Oversized);
        assert!(SkipReason::ExcludedByGlob < SkipReason::NotIncluded);
        assert!(SkipReason::UnknownExtension < SkipReason::Unreadable);
    }

    #[test]
    fn test_only_oversized_and_unreadable_warn() {
        assert!(SkipReason::Oversized.is_warning());
        assert!(SkipReason::Unreadable.is_warning());
        assert!(!SkipReason::IgnoredGlobal.is_warning());
        assert!(!SkipReason::UnknownExtension.is_warning());
    }

    #[test]
    fn test_format_lines() {
        let skip = ScanDiagnostic::skipped("vault/.git/HEAD", SkipReason::IgnoredGlobal);
        assert_eq!(skip.format_line(), "SKIP vault/.git/HEAD: global ignore rule");

        let err = ScanDiagnostic::error("src/bad.py", DiagnosticStage::Parse, "invalid UTF-8");
        assert_eq!(err.format_line(), "ERROR src/bad.py: parsing content: invalid UTF-8");
    }

    #[test]
    fn test_sorting_puts_errors_first_per_path() {
        let mut diagnostics = vec![
            ScanDiagnostic::skipped("b.md", SkipReason::Oversized),
            ScanDiagnostic::skipped("a.md", SkipReason::Unreadable),
            ScanDiagnostic::error("a.md", DiagnosticStage::Sync, "boom"),
        ];
        diagnostics.sort();
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[1].path(), "a.md");
        assert_eq!(diagnostics[2].path(), "b.md");
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let diag = ScanDiagnostic::skipped("x.bin", SkipReason::UnknownExtension);
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["kind"], "skipped");
        assert_eq!(json["reason"], "unknown_extension");
    }
}
