//! File classification for scans and watcher events.
//!
//! Precedence:
//! 1. Global ignore globs (always first)
//! 2. Extension lookup into a category (markdown, code, asset in that order)
//! 3. Category enabled flag
//! 4. Category exclude globs
//! 5. Category include globs (if any)
//!
//! Classification of a path is a pure function of the path and the config, so
//! a full scan and a watcher event always agree. The size limit is checked
//! separately because it needs file metadata.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{CategoryConfig, LibrarianConfig};
use crate::diagnostics::SkipReason;
use crate::error::{LibrarianError, Result};
use crate::ingest::{detect_language, Category};

struct CategoryRules {
    category: Category,
    enabled: bool,
    extensions: HashSet<String>,
    include: Option<GlobSet>,
    exclude: GlobSet,
}

/// Compiled filter state for one configuration.
pub struct FileFilter {
    /// Roots for matching root-relative globs
    roots: Vec<PathBuf>,
    ignore: GlobSet,
    max_file_size: u64,
    categories: Vec<CategoryRules>,
}

fn compile_globs(section: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LibrarianError::config(format!("{}: invalid glob '{}': {}", section, pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| LibrarianError::config(format!("{}: {}", section, e)))
}

impl CategoryRules {
    fn compile(category: Category, config: &CategoryConfig) -> Result<Self> {
        let section = format!("categories.{}", category.as_str());
        let include = if config.include.is_empty() {
            None
        } else {
            Some(compile_globs(&format!("{}.include", section), &config.include)?)
        };
        Ok(Self {
            category,
            enabled: config.enabled,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            include,
            exclude: compile_globs(&format!("{}.exclude", section), &config.exclude)?,
        })
    }
}

impl FileFilter {
    /// Compile all globs. Invalid patterns are configuration errors.
    pub fn new(config: &LibrarianConfig) -> Result<Self> {
        let roots = config
            .enabled_roots()
            .iter()
            .map(|r| std::fs::canonicalize(&r.path).unwrap_or_else(|_| r.path.clone()))
            .collect();
        let categories = [
            (Category::Markdown, &config.categories.markdown),
            (Category::Code, &config.categories.code),
            (Category::Asset, &config.categories.asset),
        ]
        .into_iter()
        .map(|(category, rules)| CategoryRules::compile(category, rules))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            roots,
            ignore: compile_globs("ignore.patterns", &config.ignore.patterns)?,
            max_file_size: config.ignore.max_file_size,
            categories,
        })
    }

    /// Absolute path plus its form relative to each containing root.
    fn candidates<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a Path> {
        std::iter::once(path).chain(
            self.roots
                .iter()
                .filter_map(move |root| path.strip_prefix(root).ok())
                .filter(|rel| !rel.as_os_str().is_empty()),
        )
    }

    fn matches(&self, set: &GlobSet, path: &Path) -> bool {
        self.candidates(path).any(|p| set.is_match(p))
    }

    /// Whether a global ignore pattern matches the path.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.matches(&self.ignore, path)
    }

    /// Whether everything inside a directory would be globally ignored.
    ///
    /// Lets the walker prune `.git` and friends instead of visiting each file.
    pub fn is_ignored_dir(&self, dir: &Path) -> bool {
        self.is_ignored(&dir.join("_"))
    }

    /// Classify a path into a category or a skip reason.
    pub fn classify(&self, path: &Path) -> std::result::Result<Category, SkipReason> {
        if self.is_ignored(path) {
            return Err(SkipReason::IgnoredGlobal);
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .ok_or(SkipReason::UnknownExtension)?;
        let rules = self
            .categories
            .iter()
            .find(|c| c.extensions.contains(&ext))
            .ok_or(SkipReason::UnknownExtension)?;
        if !rules.enabled {
            return Err(SkipReason::DisabledCategory);
        }
        if self.matches(&rules.exclude, path) {
            return Err(SkipReason::ExcludedByGlob);
        }
        if let Some(include) = &rules.include {
            if !self.matches(include, path) {
                return Err(SkipReason::NotIncluded);
            }
        }
        if rules.category == Category::Code && detect_language(path).is_none() {
            return Err(SkipReason::UnknownExtension);
        }
        Ok(rules.category)
    }

    /// Size check applied after classification.
    pub fn check_size(&self, size: u64) -> std::result::Result<(), SkipReason> {
        if size > self.max_file_size {
            Err(SkipReason::Oversized)
        } else {
            Ok(())
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}
