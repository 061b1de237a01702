//! Generation configuration.
//!
//! The library consumes an explicit [`EmbedConfig`] value — there is no
//! environment or network surface, and nothing is discovered at runtime.
//! The CLI can additionally load an optional `inlay.toml` ([`FileConfig`])
//! and fold it into an `EmbedConfig` plus a registration list; the library
//! itself never reads config files.
//!
//! ## Build Modes
//!
//! - [`BuildMode::Module`] (default): the generated unit lands at
//!   `<root>/<module>/<module>.rs`, gated behind a `bundle` cargo feature,
//!   and an importer file at `<root>/<importer>` declares the module once.
//! - [`BuildMode::SingleFile`]: everything goes into one file at
//!   `<root>/<name>`, gated for non-wasm targets. Single-file builds skip
//!   the staleness check and always regenerate.
//!
//! ## inlay.toml
//!
//! ```toml
//! # All keys are optional - defaults shown below
//! root = "."            # Generation root directory
//! module = "assets"     # Generated module name (module mode)
//! importer = "embed.rs" # Importer file created once at the root
//! # single_file = "bundle.rs"  # Switch to single-file mode
//!
//! # Paths to embed, relative to root. Directories recurse.
//! paths = ["site", "img/logo.png"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default generated module name.
pub const DEFAULT_MODULE: &str = "assets";

/// Default importer filename created at the root in module mode.
pub const DEFAULT_IMPORTER: &str = "embed.rs";

/// How the generated source unit is named and gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Generate `<root>/<module>/<module>.rs` behind a `bundle` feature.
    Module,
    /// Generate a single file at `<root>/<name>`, gated for non-wasm.
    SingleFile(String),
}

/// Static configuration consumed at generation time.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Directory registrations are resolved against and generated files
    /// are written under.
    pub root: PathBuf,
    /// Generated module name (module mode).
    pub module: String,
    /// Importer filename created once at the root (module mode).
    pub importer: String,
    pub mode: BuildMode,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            module: DEFAULT_MODULE.to_string(),
            importer: DEFAULT_IMPORTER.to_string(),
            mode: BuildMode::Module,
        }
    }
}

impl EmbedConfig {
    /// Path of the generated source unit.
    pub fn unit_path(&self) -> PathBuf {
        match &self.mode {
            BuildMode::Module => self
                .root
                .join(&self.module)
                .join(format!("{}.rs", self.module)),
            BuildMode::SingleFile(name) => self.root.join(name),
        }
    }

    /// Filename of the generated unit, used to exclude it from directory
    /// walks.
    pub fn unit_filename(&self) -> String {
        match &self.mode {
            BuildMode::Module => format!("{}.rs", self.module),
            BuildMode::SingleFile(name) => Path::new(name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone()),
        }
    }

    /// Directory the snapshot file lives in (next to the generated unit).
    pub fn snapshot_dir(&self) -> PathBuf {
        self.unit_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }
}

/// Optional `inlay.toml` consumed by the CLI.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub module: Option<String>,
    pub importer: Option<String>,
    pub single_file: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Load `inlay.toml` from `path`. Returns `Ok(None)` if the file does not
/// exist; parse failures are errors (a present-but-broken config should
/// never be silently ignored).
pub fn load_file_config(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(toml::from_str(&content)?))
}

/// Stock `inlay.toml` with every option documented, printed by
/// `inlay gen-config`.
pub fn stock_toml() -> &'static str {
    r#"# inlay configuration
# All keys are optional - defaults shown below.

# Generation root. Registered paths are resolved against it and the
# generated module is written under it.
root = "."

# Name of the generated module: produces <root>/assets/assets.rs behind
# the `bundle` cargo feature.
module = "assets"

# Importer file created once at the root, declaring the generated module.
importer = "embed.rs"

# Uncomment to generate one self-contained file instead of a module.
# Single-file builds always regenerate.
# single_file = "bundle.rs"

# Files and directories to embed, relative to root. Directories are
# walked recursively.
paths = [
    # "site",
    # "img/logo.png",
]
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // EmbedConfig paths
    // =========================================================================

    #[test]
    fn module_mode_unit_path() {
        let config = EmbedConfig::default();
        assert_eq!(config.unit_path(), Path::new("./assets/assets.rs"));
        assert_eq!(config.unit_filename(), "assets.rs");
    }

    #[test]
    fn single_file_unit_path() {
        let config = EmbedConfig {
            mode: BuildMode::SingleFile("bundle.rs".into()),
            ..Default::default()
        };
        assert_eq!(config.unit_path(), Path::new("./bundle.rs"));
        assert_eq!(config.unit_filename(), "bundle.rs");
    }

    #[test]
    fn snapshot_dir_is_next_to_unit() {
        let config = EmbedConfig {
            root: PathBuf::from("/tmp/project"),
            ..Default::default()
        };
        assert_eq!(config.snapshot_dir(), Path::new("/tmp/project/assets"));
    }

    // =========================================================================
    // inlay.toml loading
    // =========================================================================

    #[test]
    fn missing_config_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded = load_file_config(&tmp.path().join("inlay.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn config_file_parses() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inlay.toml");
        fs::write(&path, "module = \"gen\"\npaths = [\"site\"]\n").unwrap();

        let loaded = load_file_config(&path).unwrap().unwrap();
        assert_eq!(loaded.module.as_deref(), Some("gen"));
        assert_eq!(loaded.paths, vec!["site"]);
        assert!(loaded.root.is_none());
    }

    #[test]
    fn unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inlay.toml");
        fs::write(&path, "modul = \"typo\"\n").unwrap();
        assert!(matches!(
            load_file_config(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn broken_toml_is_error_not_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inlay.toml");
        fs::write(&path, "paths = [").unwrap();
        assert!(load_file_config(&path).is_err());
    }

    #[test]
    fn stock_toml_round_trips() {
        let parsed: FileConfig = toml::from_str(stock_toml()).unwrap();
        assert_eq!(parsed.module.as_deref(), Some("assets"));
        assert!(parsed.paths.is_empty());
        assert!(parsed.single_file.is_none());
    }
}
