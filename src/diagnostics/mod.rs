//! Structured diagnostics for scan and watch operations.

pub mod scan_diagnostics;

pub use scan_diagnostics::{DiagnosticStage, ScanDiagnostic, SkipReason};
