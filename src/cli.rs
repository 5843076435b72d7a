//! Command-line surface.

use clap::{ArgAction, Parser, Subcommand};
use librarian::graph::export::ExportFormat;
use librarian::graph::report::DetailLevel;
use librarian::OutputFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "librarian",
    about = "Index a notes vault and codebases into a graph database"
)]
#[command(version, long_version = librarian::version::LONG_VERSION)]
pub struct Cli {
    /// Configuration file (default: $LIBRARIAN_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index every enabled source root, or a single directory
    Scan {
        /// Scan only this directory
        path: Option<PathBuf>,

        /// Write bulk-load commands to FILE instead of connecting ("-" for stdout)
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,

        /// Also save parsed metadata as JSON Lines
        #[arg(long, value_name = "FILE")]
        save_index: Option<PathBuf>,
    },

    /// Keep the graph in sync with filesystem changes
    Watch {
        /// Skip the baseline scan before watching
        #[arg(long)]
        no_initial_scan: bool,
    },

    /// Read-only graph queries
    Query {
        #[command(subcommand)]
        kind: QueryKind,
    },

    /// Node and edge counts per type
    Stats,

    /// Remove a file and everything it owns from the graph
    Delete { path: PathBuf },

    /// Write a diagram and report bundle for a path prefix
    Report {
        scope: String,
        output_dir: PathBuf,

        /// Glob to leave out (repeatable)
        #[arg(long, value_name = "PATTERN", action = ArgAction::Append)]
        exclude: Vec<String>,

        /// low, medium or high
        #[arg(long, default_value = "medium", value_parser = parse_detail)]
        detail: DetailLevel,
    },

    /// Export one artifact: json, dot or mermaid
    Export {
        #[arg(value_parser = parse_export_format)]
        format: ExportFormat,

        /// Path prefix (default: everything)
        scope: Option<String>,

        /// Write to FILE instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Sync a JSON Lines metadata index without scanning
    IngestExternalIndex {
        path: PathBuf,

        /// Write bulk-load commands to FILE instead of connecting
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Send a project to the configured analysis webhook
    Analyze { project: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Notes nothing links to
    Orphans,
    /// Notes linking to NAME
    Backlinks { name: String },
    /// Notes with exactly this tag
    Tags { tag: String },
    /// Function definitions named NAME
    Functions { name: String },
    /// Class definitions named NAME
    Classes { name: String },
    /// Linked, back-linked and tag-sharing notes
    Related { name: String },
}

fn parse_detail(s: &str) -> Result<DetailLevel, String> {
    DetailLevel::parse(s).ok_or_else(|| format!("unknown detail level '{}' (low, medium, high)", s))
}

fn parse_export_format(s: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(s).ok_or_else(|| format!("unknown export format '{}' (json, dot, mermaid)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_with_dump() {
        let cli = Cli::try_parse_from(["librarian", "scan", "vault", "--dump", "out.txt"]).unwrap();
        match cli.command {
            Command::Scan { path, dump, save_index } => {
                assert_eq!(path, Some(PathBuf::from("vault")));
                assert_eq!(dump, Some(PathBuf::from("out.txt")));
                assert!(save_index.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["librarian", "stats", "--output", "json", "-vv"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_query_requires_argument() {
        assert!(Cli::try_parse_from(["librarian", "query", "backlinks"]).is_err());
        let cli = Cli::try_parse_from(["librarian", "query", "tags", "project"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Query { kind: QueryKind::Tags { ref tag } } if tag == "project"
        ));
    }

    #[test]
    fn test_report_excludes_and_detail() {
        let cli = Cli::try_parse_from([
            "librarian", "report", "/w/app", "out", "--exclude", "tests/**", "--exclude",
            "*.md", "--detail", "high",
        ])
        .unwrap();
        match cli.command {
            Command::Report { exclude, detail, .. } => {
                assert_eq!(exclude, vec!["tests/**", "*.md"]);
                assert_eq!(detail, DetailLevel::High);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["librarian", "report", "s", "o", "--detail", "max"]).is_err());
    }

    #[test]
    fn test_export_format_alias() {
        let cli = Cli::try_parse_from(["librarian", "export", "mmd"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Export { format: ExportFormat::Mermaid, scope: None, .. }
        ));
    }
}
