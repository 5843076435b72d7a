//! Command output: human text or schema-versioned JSON.
//!
//! Every JSON response is wrapped in [`JsonResponse`] so consumers can check
//! `schema_version` before reading `data`. Human output goes to stdout as
//! plain lines; logs always go to stderr.

use serde::{Deserialize, Serialize};

/// Current JSON output schema version
pub const LIBRARIAN_JSON_SCHEMA_VERSION: &str = "1.0.0";

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    #[value(alias = "text")]
    Human,
    /// JSON output with schema versioning
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Wrapper for all JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub schema_version: String,
    /// Unique execution ID for this run
    pub execution_id: String,
    pub tool: String,
    /// RFC 3339, second precision
    pub timestamp: String,
    pub command: String,
    pub data: T,
}

impl<T> JsonResponse<T> {
    pub fn new(command: &str, data: T, execution_id: &str) -> Self {
        JsonResponse {
            schema_version: LIBRARIAN_JSON_SCHEMA_VERSION.to_string(),
            execution_id: execution_id.to_string(),
            tool: "librarian".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            command: command.to_string(),
            data,
        }
    }
}

/// Response for errors in JSON mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code, e.g. `LIB-CFG-001`
    pub error: String,
    pub message: String,
    pub exit_code: u8,
}

/// Timestamp plus process ID, hex encoded.
pub fn generate_execution_id() -> String {
    let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
    format!("{:x}-{:x}", timestamp, std::process::id())
}

/// Print a value as pretty JSON on stdout.
pub fn output_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

/// Print `data` in an envelope for `command`.
pub fn emit_json<T: Serialize>(command: &str, data: T) -> anyhow::Result<()> {
    output_json(&JsonResponse::new(command, data, &generate_execution_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStats;
    use crate::indexer::IndexerStats;

    #[test]
    fn test_execution_id_ends_with_process_id() {
        let id = generate_execution_id();
        let (stamp, pid) = id.split_once('-').unwrap();
        assert_eq!(u32::from_str_radix(pid, 16).unwrap(), std::process::id());
        assert!(u64::from_str_radix(stamp, 16).unwrap() > 0);
    }

    #[test]
    fn test_watch_stats_envelope() {
        let stats = IndexerStats {
            indexed: 3,
            deleted: 1,
            directories: 1,
            ..IndexerStats::default()
        };
        let value = serde_json::to_value(JsonResponse::new("watch", stats, "5f-1")).unwrap();

        assert_eq!(value["schema_version"], LIBRARIAN_JSON_SCHEMA_VERSION);
        assert_eq!(value["tool"], "librarian");
        assert_eq!(value["command"], "watch");
        assert_eq!(value["data"]["indexed"], 3);
        assert_eq!(value["data"]["directories"], 1);
        let stamp = value["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_stats_envelope_keeps_placeholders_apart() {
        let mut stats = GraphStats::default();
        stats.nodes.insert("Note".into(), 2);
        stats.placeholders = 1;
        let value = serde_json::to_value(JsonResponse::new("stats", stats, "5f-1")).unwrap();
        assert_eq!(value["data"]["nodes"]["Note"], 2);
        assert_eq!(value["data"]["placeholders"], 1);
    }

    #[test]
    fn test_error_response_fields() {
        let err = ErrorResponse {
            error: "LIB-CONN-001".into(),
            message: "connection refused".into(),
            exit_code: 3,
        };
        let value = serde_json::to_value(JsonResponse::new("stats", err, "5f-1")).unwrap();
        assert_eq!(value["data"]["error"], "LIB-CONN-001");
        assert_eq!(value["data"]["exit_code"], 3);
    }

    #[test]
    fn test_output_format_accepts_text_alias() {
        use clap::ValueEnum;
        assert_eq!(OutputFormat::from_str("json", true), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("text", true), Ok(OutputFormat::Human));
        assert!(OutputFormat::from_str("yaml", true).is_err());
        assert!(OutputFormat::Json.is_json());
    }
}
