//! Librarian-specific error codes
//!
//! Error codes follow the pattern: LIB-{CATEGORY}-{3-digit number}
//!
//! Categories (1-4 uppercase letters):
//! - CFG: Configuration errors (fatal at startup)
//! - CONN: Database connection and protocol errors
//! - PRS: Per-file parse errors
//! - QRY: Per-operation query errors
//! - FS: Filesystem errors
//! - HOOK: Outbound webhook errors
//!
//! Each error code is stable and should not be reused.

/// Configuration file missing, malformed, or semantically invalid
pub const LIB_CFG_001_INVALID_CONFIG: &str = "LIB-CFG-001";

/// Database unreachable or connection dropped
pub const LIB_CONN_001_UNREACHABLE: &str = "LIB-CONN-001";

/// Reply from the database did not follow the wire protocol
pub const LIB_CONN_002_PROTOCOL: &str = "LIB-CONN-002";

/// File content could not be parsed
pub const LIB_PRS_001_PARSE_FAILED: &str = "LIB-PRS-001";

/// Database rejected a query
pub const LIB_QRY_001_QUERY_FAILED: &str = "LIB-QRY-001";

/// File could not be read or watched
pub const LIB_FS_001_FILESYSTEM: &str = "LIB-FS-001";

/// Webhook call failed or returned a non-success status
pub const LIB_HOOK_001_WEBHOOK: &str = "LIB-HOOK-001";

/// Remediation hint for a code, shown after the error message.
pub fn remediation(code: &str) -> Option<&'static str> {
    let hint = match code {
        LIB_CFG_001_INVALID_CONFIG => {
            "fix the TOML file or the LIBRARIAN_* environment overrides"
        }
        LIB_CONN_001_UNREACHABLE => {
            "check database.address; use `scan --dump` for offline indexing"
        }
        LIB_CONN_002_PROTOCOL => "check that the address points at a graph-capable server",
        LIB_PRS_001_PARSE_FAILED => "the file is skipped and its prior graph state is kept",
        LIB_QRY_001_QUERY_FAILED => "remaining operations for that file are skipped",
        LIB_FS_001_FILESYSTEM => "check permissions on the source roots",
        LIB_HOOK_001_WEBHOOK => "check webhook.url and webhook.token",
        _ => return None,
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_codes() -> Vec<&'static str> {
        vec![
            LIB_CFG_001_INVALID_CONFIG,
            LIB_CONN_001_UNREACHABLE,
            LIB_CONN_002_PROTOCOL,
            LIB_PRS_001_PARSE_FAILED,
            LIB_QRY_001_QUERY_FAILED,
            LIB_FS_001_FILESYSTEM,
            LIB_HOOK_001_WEBHOOK,
        ]
    }

    #[test]
    fn test_error_codes_are_unique() {
        let mut unique = std::collections::HashSet::new();
        for code in all_codes() {
            assert!(unique.insert(code), "Duplicate error code detected: {}", code);
        }
    }

    #[test]
    fn test_error_code_format() {
        for code in all_codes() {
            let parts: Vec<&str> = code.split('-').collect();
            assert_eq!(parts.len(), 3, "Error code {} should have 3 parts", code);
            assert_eq!(parts[0], "LIB");
            assert!(parts[1].chars().all(|c| c.is_ascii_uppercase()));
            assert_eq!(parts[2].len(), 3);
            assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_every_code_has_remediation() {
        for code in all_codes() {
            assert!(remediation(code).is_some(), "no hint for {}", code);
        }
        assert_eq!(remediation("LIB-NOPE-001"), None);
    }
}
