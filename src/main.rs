//! Librarian CLI - keeps a graph database in sync with notes and code
//!
//! Usage: librarian <command> [arguments]

mod analyze_cmd;
mod cli;
mod common;
mod delete_cmd;
mod export_cmd;
mod ingest_cmd;
mod query_cmd;
mod report_cmd;
mod scan_cmd;
mod stats_cmd;
mod watch_cmd;

use clap::Parser;
use std::process::ExitCode;

use librarian::error::{exit_code_for, EXIT_OK};
use librarian::error_codes::remediation;
use librarian::output::{emit_json, ErrorResponse};
use librarian::{logging, LibrarianError};

use cli::{Cli, Command};

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    let output = cli.output;
    match cli.command {
        Command::Scan {
            path,
            dump,
            save_index,
        } => scan_cmd::run_scan(config, output, path, dump, save_index),
        Command::Watch { no_initial_scan } => watch_cmd::run_watch(config, output, no_initial_scan),
        Command::Query { kind } => query_cmd::run_query(config, output, kind),
        Command::Stats => stats_cmd::run_stats(config, output),
        Command::Delete { path } => delete_cmd::run_delete(config, output, path),
        Command::Report {
            scope,
            output_dir,
            exclude,
            detail,
        } => report_cmd::run_report(config, output, scope, output_dir, exclude, detail),
        Command::Export { format, scope, out } => export_cmd::run_export(config, format, scope, out),
        Command::IngestExternalIndex { path, dump } => ingest_cmd::run_ingest(config, output, path, dump),
        Command::Analyze { project } => analyze_cmd::run_analyze(config, output, project),
    }
}

fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LibrarianError>())
        .map(LibrarianError::code)
}

fn report_error(err: &anyhow::Error, json: bool, code: u8) {
    if json {
        let response = ErrorResponse {
            error: error_code(err).unwrap_or("LIB-FATAL").to_string(),
            message: format!("{:#}", err),
            exit_code: code,
        };
        if emit_json("error", response).is_ok() {
            return;
        }
    }
    eprintln!("Error: {:#}", err);
    if let Some(hint) = error_code(err).and_then(remediation) {
        eprintln!("hint: {}", hint);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let json = cli.output.is_json();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            let code = exit_code_for(&err);
            tracing::debug!(error = ?err, code, "command failed");
            report_error(&err, json, code);
            ExitCode::from(code)
        }
    }
}
