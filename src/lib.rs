//! # Inlay
//!
//! Build-time asset embedding with a runtime virtual filesystem. Register
//! files, directories, or raw bytes during development; inlay minifies,
//! compresses, and bakes them into a generated Rust source unit your
//! release build compiles in. At runtime a single `open` call resolves a
//! path against the real filesystem first and the embedded table second,
//! so development builds see live files and release builds need none.
//!
//! # Architecture: Register → Assess → Generate → Resolve
//!
//! ```text
//! 1. Register   paths / bytes  →  pending list      (Embedder API)
//! 2. Assess     mtimes + snapshot → Skip / Regenerate
//! 3. Generate   asset → minify → gzip → escape → unit.rs + snapshot
//! 4. Resolve    open(name): disk → embedded table → cwd
//! ```
//!
//! The assess stage is what makes inlay cheap to leave in an ordinary dev
//! loop: when the generated unit is newer than every registered input and
//! the registration list matches the snapshot from the previous run, the
//! whole generation stage is skipped.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`registry`] | The [`Embedder`] build context — registration, lifecycle, dev-mode open |
//! | [`config`] | [`EmbedConfig`] paths and modes, plus `inlay.toml` loading |
//! | [`cache`] | Staleness assessment — mtime comparison and the registration snapshot |
//! | [`pipeline`] | Per-asset transform: minify by extension, then gzip |
//! | [`minify`] | Whitespace/comment minifiers for HTML, SVG, XML, CSS, JS, JSON |
//! | [`escape`] | Byte-string-literal escaping for the generated source |
//! | [`generate`] | Writes the generated unit, importer scaffolding, and snapshot |
//! | [`vfs`] | Runtime resolution: [`Vfs`], the embedded [`Table`], [`VfsFile`] |
//!
//! # Design Decisions
//!
//! ## Generated Source, Not a Binary Blob
//!
//! Assets are emitted as a `.rs` file of `table.insert(...)` calls with
//! byte-string literals, not an archive appended to the binary. The
//! compiler handles layout and deduplication, the output diffs readably
//! in version control, and no custom loader runs at startup. The unit is
//! feature-gated (`bundle`) so debug builds pay nothing for it.
//!
//! ## Disk Wins Over the Table
//!
//! [`Vfs::open`] checks the configured root on disk before the embedded
//! table. During development every edit is visible immediately without
//! regenerating; in release builds the disk paths simply miss and the
//! table serves everything.
//!
//! ## Deterministic Output
//!
//! Directory walks are sorted by file name and gzip headers carry no
//! timestamp, so regenerating from unchanged inputs produces a
//! byte-identical unit. Spurious diffs would otherwise defeat the
//! mtime-based staleness check for anything downstream of the unit.

pub mod cache;
pub mod config;
pub mod escape;
pub mod generate;
pub mod minify;
pub mod pipeline;
pub mod registry;
pub mod vfs;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::Freshness;
pub use config::{BuildMode, EmbedConfig};
pub use registry::{EmbedError, Embedder, Outcome};
pub use vfs::{FileInfo, Table, Vfs, VfsError, VfsFile};
