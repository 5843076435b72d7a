//! Configuration for Librarian.
//!
//! Loads a TOML file (see [`LibrarianConfig::resolve_path`] for lookup order),
//! then applies `LIBRARIAN_*` environment overrides. Every section has
//! defaults, so an empty or missing file yields a usable configuration that
//! indexes the current directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LibrarianError, Result};

/// Replaces all configured roots with a single root.
pub const ENV_SOURCE_PATH: &str = "LIBRARIAN_SOURCE_PATH";
pub const ENV_DB_ADDRESS: &str = "LIBRARIAN_DB_ADDRESS";
pub const ENV_GRAPH: &str = "LIBRARIAN_GRAPH";
/// Alternative to `--config`.
pub const ENV_CONFIG: &str = "LIBRARIAN_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibrarianConfig {
    pub sources: Vec<SourceRoot>,
    pub categories: CategoriesConfig,
    pub database: DatabaseConfig,
    pub watcher: WatchConfig,
    pub ignore: IgnoreConfig,
    pub projects: ProjectsConfig,
    pub scan: ScanConfig,
    pub webhook: Option<WebhookConfig>,
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceRoot {
                name: "default".to_string(),
                path: PathBuf::from("."),
                enabled: true,
                priority: 100,
            }],
            categories: CategoriesConfig::default(),
            database: DatabaseConfig::default(),
            watcher: WatchConfig::default(),
            ignore: IgnoreConfig::default(),
            projects: ProjectsConfig::default(),
            scan: ScanConfig::default(),
            webhook: None,
        }
    }
}

/// A named directory tree to index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRoot {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lower values are scanned first and win when roots overlap.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

/// Extension allow-list and include/exclude globs for one file category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryConfig {
    pub enabled: bool,
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    /// When non-empty, a path must match at least one of these.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoriesConfig {
    pub markdown: CategoryConfig,
    pub code: CategoryConfig,
    pub asset: CategoryConfig,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            markdown: CategoryConfig {
                extensions: strings(&["md", "markdown"]),
                ..CategoryConfig::default()
            },
            code: CategoryConfig {
                extensions: crate::ingest::detect::default_code_extensions(),
                exclude: strings(&[
                    "**/node_modules/**",
                    "**/target/**",
                    "**/dist/**",
                    "**/build/**",
                    "**/vendor/**",
                    "**/.venv/**",
                    "**/venv/**",
                    "**/__pycache__/**",
                ]),
                ..CategoryConfig::default()
            },
            asset: CategoryConfig {
                extensions: strings(&[
                    "png", "jpg", "jpeg", "gif", "svg", "webp", "pdf", "mp3", "mp4", "canvas",
                ]),
                ..CategoryConfig::default()
            },
        }
    }
}

/// Graph database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `host:port` of the graph server.
    pub address: String,
    /// Logical graph name passed with every query.
    pub graph: String,
    /// Commands between flushes of the dump stream.
    pub batch_size: usize,
    /// Upper bound on pooled connections; raised to the worker count if lower.
    pub pool_size: usize,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            graph: "librarian".to_string(),
            batch_size: 500,
            pool_size: 8,
            connect_timeout_ms: 3_000,
            io_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
    /// When false, `watch` only performs periodic rescans.
    pub realtime: bool,
    /// Full reconciliation rescan interval. Unset disables it.
    pub rescan_interval_secs: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            realtime: true,
            rescan_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Applied before any category rule.
    pub patterns: Vec<String>,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            patterns: strings(&[
                "**/.git/**",
                "**/.hg/**",
                "**/.svn/**",
                "**/.obsidian/**",
                "**/.trash/**",
                "**/.idea/**",
                "**/.vscode/**",
                "**/.DS_Store",
                "**/*.swp",
                "**/*~",
            ]),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectsConfig {
    /// Path prefixes whose immediate children are projects.
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Parse/sync worker count. 0 means one per CPU.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl LibrarianConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LibrarianError::config(e.to_string()))
    }

    /// Load configuration from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LibrarianError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Resolve, load, override from the process environment, and validate.
    ///
    /// An explicitly named file must exist; the default location may be absent.
    pub fn load_effective(explicit: Option<&Path>) -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match Self::resolve_path(explicit, &lookup) {
            (path, true) => Self::load(&path)?,
            (path, false) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Config path and whether it was named explicitly.
    ///
    /// Order: `--config`, `LIBRARIAN_CONFIG`, `<config dir>/librarian/config.toml`.
    pub fn resolve_path(
        explicit: Option<&Path>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path.to_path_buf(), true);
        }
        if let Some(path) = lookup(ENV_CONFIG).filter(|p| !p.is_empty()) {
            return (PathBuf::from(path), true);
        }
        (Self::default_path(), false)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("librarian")
            .join("config.toml")
    }

    /// Apply `LIBRARIAN_*` overrides using the given variable lookup.
    pub fn apply_env_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_SOURCE_PATH).filter(|p| !p.is_empty()) {
            self.sources = vec![SourceRoot {
                name: "env".to_string(),
                path: PathBuf::from(path),
                enabled: true,
                priority: 0,
            }];
        }
        if let Some(address) = lookup(ENV_DB_ADDRESS).filter(|a| !a.is_empty()) {
            self.database.address = address;
        }
        if let Some(graph) = lookup(ENV_GRAPH).filter(|g| !g.is_empty()) {
            self.database.graph = graph;
        }
    }

    /// Check invariants that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.database.graph.trim().is_empty() {
            return Err(LibrarianError::config("database.graph must not be empty"));
        }
        if self.database.graph.chars().any(char::is_whitespace) {
            return Err(LibrarianError::config(
                "database.graph must not contain whitespace",
            ));
        }
        if self.database.batch_size == 0 {
            return Err(LibrarianError::config("database.batch_size must be at least 1"));
        }
        if self.database.pool_size == 0 {
            return Err(LibrarianError::config("database.pool_size must be at least 1"));
        }
        if self.enabled_roots().is_empty() {
            return Err(LibrarianError::config("no enabled source roots configured"));
        }
        if let Some(hook) = &self.webhook {
            if !(hook.url.starts_with("http://") || hook.url.starts_with("https://")) {
                return Err(LibrarianError::config(format!(
                    "webhook.url must be http(s): {}",
                    hook.url
                )));
            }
        }
        // Compiling the filter surfaces bad globs as config errors.
        crate::scan::FileFilter::new(self)?;
        Ok(())
    }

    /// Enabled roots ordered by priority, then name.
    pub fn enabled_roots(&self) -> Vec<&SourceRoot> {
        let mut roots: Vec<&SourceRoot> = self.sources.iter().filter(|r| r.enabled).collect();
        roots.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        roots
    }

    /// Effective worker count for parsing and direct-mode sync.
    pub fn worker_count(&self) -> usize {
        if self.scan.workers > 0 {
            self.scan.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    /// Pool size never below the worker count, so full-parallel sync cannot starve.
    pub fn effective_pool_size(&self) -> usize {
        self.database.pool_size.max(self.worker_count())
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
