//! The embedding registry and its lifecycle.
//!
//! An [`Embedder`] owns everything that used to be ambient state in
//! embedding tools: the pending registration list, the in-memory asset
//! map, and the has-run flag. Passing it by reference keeps tests
//! isolated and makes the single-threaded contract explicit — there is
//! no global registry to race on.
//!
//! # Lifecycle
//!
//! ```text
//! new(config)
//!   → register_file / register_bytes      (any number of times)
//!   → done()                              (once; Skip or Regenerate)
//!   → open()                              (any number of times)
//! ```
//!
//! [`Embedder::done`] runs the staleness check and, when needed, the
//! generator; either way it consumes the registrations. It is idempotent:
//! further calls return the first verdict without touching the
//! filesystem. [`Embedder::open`] calls it automatically if the caller
//! never did.
//!
//! The registration and generation APIs are not thread-safe; serialize
//! them externally (a `OnceLock` around `done` works well in concurrent
//! hosts). After a failed `done` the registry contents are undefined —
//! re-register before retrying.

use crate::cache::{self, Freshness, StaleError};
use crate::config::{BuildMode, EmbedConfig};
use crate::generate::{self, GenerateError};
use crate::vfs::{Table, Vfs, VfsError, VfsFile};
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("could not register {path}: {source}")]
    Registration {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Stale(#[from] StaleError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Vfs(#[from] VfsError),
}

/// What [`Embedder::done`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Prior generated output was current; nothing was written.
    Skipped,
    /// The generator ran and wrote this many records.
    Generated(usize),
}

/// Build context owning all pending embedding state.
#[derive(Debug, Default)]
pub struct Embedder {
    config: EmbedConfig,
    pending: Vec<String>,
    memory: BTreeMap<String, Vec<u8>>,
    freshness: Freshness,
    records: usize,
}

impl Embedder {
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            memory: BTreeMap::new(),
            freshness: Freshness::Unchecked,
            records: 0,
        }
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Register a file or directory for embedding, relative to the
    /// configured root. Directories are walked recursively at generation
    /// time. Fails immediately if the path cannot be opened.
    pub fn register_file(&mut self, path: impl Into<String>) -> Result<(), EmbedError> {
        let path = path.into();
        std::fs::metadata(self.config.root.join(&path)).map_err(|source| {
            EmbedError::Registration {
                path: path.clone(),
                source,
            }
        })?;
        self.pending.push(path);
        Ok(())
    }

    /// Register raw bytes under a virtual path. Always embedded; never
    /// part of the modification-time staleness comparison.
    pub fn register_bytes(&mut self, virtual_path: impl Into<String>, data: Vec<u8>) {
        self.memory.insert(virtual_path.into(), data);
    }

    /// Assess freshness without generating or consuming anything.
    pub fn check(&self) -> Result<Freshness, EmbedError> {
        if self.freshness != Freshness::Unchecked {
            return Ok(self.freshness);
        }
        if self.pending.is_empty() && self.memory.is_empty() {
            return Ok(Freshness::Skip);
        }
        match self.config.mode {
            BuildMode::SingleFile(_) => Ok(Freshness::Regenerate),
            BuildMode::Module => Ok(cache::assess(&self.config, &self.pending)?),
        }
    }

    /// Run the staleness check and regenerate if needed, consuming the
    /// registrations. Call after all registrations and before any
    /// [`open`](Self::open). Idempotent.
    pub fn done(&mut self) -> Result<Outcome, EmbedError> {
        match self.freshness {
            Freshness::Skip => return Ok(Outcome::Skipped),
            Freshness::Regenerate => return Ok(Outcome::Generated(self.records)),
            Freshness::Unchecked => {}
        }

        if self.pending.is_empty() && self.memory.is_empty() {
            self.freshness = Freshness::Skip;
            return Ok(Outcome::Skipped);
        }

        let verdict = match self.config.mode {
            // Single-file builds carry no snapshot and always regenerate.
            BuildMode::SingleFile(_) => Freshness::Regenerate,
            BuildMode::Module => {
                generate::scaffold(&self.config)?;
                cache::assess(&self.config, &self.pending)?
            }
        };

        if verdict == Freshness::Regenerate {
            self.records = generate::build(&self.config, &self.pending, &self.memory)?;
        }

        // Registrations are consumed whether or not generation ran.
        self.pending.clear();
        self.memory.clear();
        self.freshness = verdict;

        Ok(match verdict {
            Freshness::Regenerate => Outcome::Generated(self.records),
            _ => Outcome::Skipped,
        })
    }

    /// Open a previously embedded (or on-disk) file. Ensures [`done`]
    /// has run first, triggering generation if it hasn't.
    ///
    /// In a build that compiles the generated unit in, use
    /// [`Vfs`](crate::vfs::Vfs) with the populated table instead; this
    /// development-mode open resolves against the root and the working
    /// directory only.
    pub fn open(&mut self, name: &str) -> Result<VfsFile, EmbedError> {
        if self.freshness == Freshness::Unchecked {
            self.done()?;
        }
        let vfs = Vfs::new(self.config.root.clone(), Table::new());
        Ok(vfs.open(name)?)
    }

    /// Best-effort listing of `folder` on the real filesystem; relative
    /// paths resolve against the working directory.
    pub fn list(&self, folder: &str) -> Vec<String> {
        Vfs::new(self.config.root.clone(), Table::new()).list(folder)
    }
}
