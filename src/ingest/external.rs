//! JSON Lines metadata index files.
//!
//! One [`FileMetadata`] per line. `scan --save-index` writes them and
//! `ingest-external-index` reads them, so other producers can feed the graph
//! without a filesystem scan.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::FileMetadata;
use crate::error::{LibrarianError, Result};

/// Write records in the given order, one JSON object per line.
pub fn save_index(path: &Path, records: &[FileMetadata]) -> Result<()> {
    let file = File::create(path).map_err(|e| LibrarianError::filesystem(path, e))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every record. Blank lines are ignored; a malformed line fails the load.
pub fn load_index(path: &Path) -> Result<Vec<FileMetadata>> {
    let file = File::open(path).map_err(|e| LibrarianError::filesystem(path, e))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| LibrarianError::filesystem(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FileMetadata = serde_json::from_str(&line).map_err(|e| {
            LibrarianError::parse(path, format!("line {}: {}", idx + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}
