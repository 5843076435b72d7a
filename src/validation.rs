//! Path validation and normalization for roots and command arguments.
//!
//! Roots are canonicalized once at startup so that every path the scanner and
//! watcher produce is absolute and symlink-free; that form is the node identity
//! in the graph. Deleted files cannot be canonicalized, so [`absolutize`]
//! normalizes them lexically instead.

use std::path::{Component, Path, PathBuf};

/// Error types for path validation.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    /// Path cannot be canonicalized (doesn't exist or permission denied)
    #[error("cannot canonicalize path: {0}")]
    CannotCanonicalize(String),

    /// A source root must be a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Path is not under any configured source root
    #[error("path is outside every source root: {0}")]
    OutsideRoots(String),
}

/// Canonicalize a path using std::fs::canonicalize.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, PathValidationError> {
    std::fs::canonicalize(path)
        .map_err(|_| PathValidationError::CannotCanonicalize(path.to_string_lossy().to_string()))
}

/// Canonicalize a source root and check it is a directory.
pub fn canonicalize_root(path: &Path) -> Result<PathBuf, PathValidationError> {
    let canonical = canonicalize_path(path)?;
    if !canonical.is_dir() {
        return Err(PathValidationError::NotADirectory(
            canonical.to_string_lossy().to_string(),
        ));
    }
    Ok(canonical)
}

/// Make `path` absolute against `cwd` and fold `.` and `..` lexically.
///
/// Does not touch the filesystem.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a command-line path to its graph identity.
///
/// Existing paths are canonicalized; missing ones (already deleted) are
/// normalized lexically with their parent canonicalized when possible.
pub fn resolve_identity(path: &Path, cwd: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let absolute = absolutize(path, cwd);
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match std::fs::canonicalize(parent) {
            Ok(parent) => parent.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}

/// Require `path` to be under one of `roots`.
pub fn validate_within_roots(path: &Path, roots: &[PathBuf]) -> Result<(), PathValidationError> {
    if roots.iter().any(|root| path.starts_with(root)) {
        Ok(())
    } else {
        Err(PathValidationError::OutsideRoots(
            path.to_string_lossy().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_absolutize_folds_dots() {
        assert_eq!(
            absolutize(Path::new("notes/../a/./b.md"), Path::new("/vault")),
            PathBuf::from("/vault/a/b.md")
        );
        assert_eq!(
            absolutize(Path::new("/x/y/../z.md"), Path::new("/ignored")),
            PathBuf::from("/x/z.md")
        );
    }

    #[test]
    fn test_canonicalize_root_rejects_files_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.md");
        fs::write(&file, "x").unwrap();

        assert!(canonicalize_root(temp_dir.path()).is_ok());
        assert!(matches!(
            canonicalize_root(&file),
            Err(PathValidationError::NotADirectory(_))
        ));
        assert!(matches!(
            canonicalize_root(&temp_dir.path().join("missing")),
            Err(PathValidationError::CannotCanonicalize(_))
        ));
    }

    #[test]
    fn test_resolve_identity_for_deleted_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = canonicalize_root(temp_dir.path()).unwrap();
        let gone = temp_dir.path().join("gone.md");
        assert_eq!(resolve_identity(&gone, Path::new("/")), root.join("gone.md"));
    }

    #[test]
    fn test_validate_within_roots() {
        let roots = vec![PathBuf::from("/vault"), PathBuf::from("/src")];
        assert!(validate_within_roots(Path::new("/vault/a.md"), &roots).is_ok());
        assert!(matches!(
            validate_within_roots(Path::new("/etc/passwd"), &roots),
            Err(PathValidationError::OutsideRoots(_))
        ));
    }
}
