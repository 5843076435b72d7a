//! Metadata extraction: file content to fixed-shape records.
//!
//! [`read_file`] is the single entry point used by full scans, the watcher and
//! tests. It reads, hashes and parses one file into a [`FileMetadata`] record
//! without touching the graph.

pub mod code;
pub mod detect;
pub mod external;
pub mod markdown;
pub mod tasks;

pub use code::Symbol;
pub use detect::{detect_language, Language};
pub use tasks::{Task, TaskStatus};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::{LibrarianError, Result};

/// Category a file is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Markdown,
    Code,
    /// Recognized but carries no extractable metadata
    Asset,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Markdown => "markdown",
            Category::Code => "code",
            Category::Asset => "asset",
        }
    }
}

/// Parsed metadata for one markdown file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub path: String,
    /// File stem; wikilinks resolve against it
    pub name: String,
    /// Seconds since the Unix epoch
    pub modified: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub embeds: Vec<String>,
    #[serde(default)]
    pub headings: [u32; 6],
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl NoteMetadata {
    pub fn heading_count(&self) -> u32 {
        self.headings.iter().sum()
    }
}

/// Parsed metadata for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub path: String,
    /// File name including extension
    pub name: String,
    pub language: Language,
    pub modified: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub functions: Vec<Symbol>,
    #[serde(default)]
    pub classes: Vec<Symbol>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// One record per indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileMetadata {
    Note(NoteMetadata),
    Code(CodeMetadata),
}

impl FileMetadata {
    pub fn path(&self) -> &str {
        match self {
            FileMetadata::Note(n) => &n.path,
            FileMetadata::Code(c) => &c.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileMetadata::Note(n) => &n.name,
            FileMetadata::Code(c) => &c.name,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            FileMetadata::Note(n) => &n.hash,
            FileMetadata::Code(c) => &c.hash,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        match self {
            FileMetadata::Note(n) => &n.tasks,
            FileMetadata::Code(c) => &c.tasks,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            FileMetadata::Note(_) => Category::Markdown,
            FileMetadata::Code(_) => Category::Code,
        }
    }
}

/// SHA-256 of file content, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Read and parse a classified file.
///
/// Assets have no record and return `Ok(None)`.
pub fn read_file(path: &Path, category: Category) -> Result<Option<FileMetadata>> {
    if category == Category::Asset {
        return Ok(None);
    }
    let meta = std::fs::metadata(path).map_err(|e| LibrarianError::filesystem(path, e))?;
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let bytes = std::fs::read(path).map_err(|e| LibrarianError::filesystem(path, e))?;
    parse_content(path, category, &bytes, modified).map(Some)
}

/// Parse file bytes that were already read.
///
/// Content must be UTF-8; anything else is a parse error for this file only.
pub fn parse_content(
    path: &Path,
    category: Category,
    bytes: &[u8],
    modified: i64,
) -> Result<FileMetadata> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| LibrarianError::parse(path, format!("invalid UTF-8: {}", e)))?;
    let path_str = path.to_string_lossy().into_owned();
    let hash = content_hash(bytes);

    match category {
        Category::Markdown => {
            let doc = markdown::parse_markdown(content);
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_str.clone());
            Ok(FileMetadata::Note(NoteMetadata {
                path: path_str,
                name,
                modified,
                hash,
                tags: doc.tags,
                links: doc.links,
                embeds: doc.embeds,
                headings: doc.headings,
                tasks: doc.tasks,
            }))
        }
        Category::Code => {
            let language = detect_language(path)
                .ok_or_else(|| LibrarianError::parse(path, "no language for extension"))?;
            let doc = code::parse_code(language, content);
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_str.clone());
            Ok(FileMetadata::Code(CodeMetadata {
                path: path_str,
                name,
                language,
                modified,
                hash,
                functions: doc.functions,
                classes: doc.classes,
                imports: doc.imports,
                tasks: doc.tasks,
            }))
        }
        Category::Asset => Err(LibrarianError::parse(path, "assets carry no metadata")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_note_record_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("First.md");
        fs::write(&path, "# First\n#todo [[Second]]\n").unwrap();

        let meta = read_file(&path, Category::Markdown).unwrap().unwrap();
        let FileMetadata::Note(note) = meta else {
            panic!("expected a note record");
        };
        assert_eq!(note.name, "First");
        assert_eq!(note.tags, vec!["todo"]);
        assert_eq!(note.links, vec!["Second"]);
        assert_eq!(note.heading_count(), 1);
        assert!(note.modified > 0);
        assert_eq!(note.hash.len(), 64);
    }

    #[test]
    fn test_code_record_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.js");
        fs::write(&path, "import x from 'lodash';\nfunction handleClick() {}\n").unwrap();

        let meta = read_file(&path, Category::Code).unwrap().unwrap();
        let FileMetadata::Code(code) = meta else {
            panic!("expected a code record");
        };
        assert_eq!(code.name, "app.js");
        assert_eq!(code.language, Language::JavaScript);
        assert_eq!(code.functions[0].name, "handleClick");
        assert_eq!(code.functions[0].line, 2);
        assert_eq!(code.imports, vec!["lodash"]);
    }

    #[test]
    fn test_non_utf8_is_parse_error() {
        let err = parse_content(Path::new("/v/bad.md"), Category::Markdown, &[0xff, 0xfe, 0x00], 0)
            .unwrap_err();
        assert!(matches!(err, LibrarianError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_filesystem_error() {
        let err = read_file(Path::new("/nonexistent/x.md"), Category::Markdown).unwrap_err();
        assert!(matches!(err, LibrarianError::Filesystem { .. }));
    }

    #[test]
    fn test_assets_have_no_record() {
        assert!(read_file(Path::new("/nonexistent/a.png"), Category::Asset)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_same_content_same_hash() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
