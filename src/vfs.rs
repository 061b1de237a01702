//! Runtime virtual filesystem.
//!
//! Unifies three sources behind one `open` call, tried in order:
//!
//! 1. The real filesystem under the configured root — so during
//!    development an edited file wins over whatever was embedded at the
//!    last generation.
//! 2. The compiled-in [`Table`] of embedded records, populated by the
//!    generated source unit's `insert` statements.
//! 3. The process's current working directory, as a last resort — but
//!    only after rejecting any name that contains a parent-directory
//!    segment, so a lookup can never be steered outside the tree.
//!
//! `list` is deliberately simpler: a best-effort listing of the real
//! filesystem only. Embedded records never appear in it.
//!
//! Disk-first ordering means a stale on-disk file can shadow an embedded
//! asset of the same relative path. That is the intended development
//! workflow; ship bundled binaries with a root that has no loose assets.
//!
//! Opening is read-only and safe to call from many threads; the table is
//! immutable after construction.

use crate::pipeline;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("{0}: no such file or embedded asset")]
    NotFound(String),
    #[error("path traversal rejected: {0}")]
    Traversal(String),
    #[error("could not open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not decompress embedded asset {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// One embedded record: metadata plus an optional gzip payload.
/// Directory markers carry no payload.
#[derive(Debug, Clone)]
pub struct Record {
    modtime_nanos: i64,
    mode: u32,
    data: Option<Cow<'static, [u8]>>,
}

impl Record {
    pub fn is_dir(&self) -> bool {
        self.data.is_none()
    }

    pub fn modtime_nanos(&self) -> i64 {
        self.modtime_nanos
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }
}

/// Lookup table from virtual path to embedded record, built once at
/// program start by the generated unit.
#[derive(Debug, Default)]
pub struct Table {
    records: BTreeMap<String, Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one embedded record. This is the call the generated
    /// source unit emits — one statement per record. `data` is the
    /// gzip-compressed payload, or `None` for a directory marker.
    pub fn insert(
        &mut self,
        path: &str,
        modtime_nanos: i64,
        mode: u32,
        data: Option<&'static [u8]>,
    ) {
        self.records.insert(
            path.to_string(),
            Record {
                modtime_nanos,
                mode,
                data: data.map(Cow::Borrowed),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&Record> {
        self.records.get(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Stat information for an opened file, uniform across disk and
/// embedded sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub len: u64,
    pub modtime_nanos: i64,
    pub mode: u32,
    pub is_dir: bool,
}

/// A readable, stat-able handle returned by [`Vfs::open`].
#[derive(Debug)]
pub enum VfsFile {
    Disk(fs::File),
    Embedded {
        info: FileInfo,
        cursor: Cursor<Vec<u8>>,
    },
}

impl VfsFile {
    pub fn info(&self) -> io::Result<FileInfo> {
        match self {
            VfsFile::Disk(file) => {
                let meta = file.metadata()?;
                Ok(FileInfo {
                    len: meta.len(),
                    modtime_nanos: modtime_nanos(&meta),
                    mode: mode_bits(&meta),
                    is_dir: meta.is_dir(),
                })
            }
            VfsFile::Embedded { info, .. } => Ok(*info),
        }
    }

    pub fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        Read::read_to_end(self, &mut buf)?;
        Ok(buf)
    }
}

impl Read for VfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            VfsFile::Disk(file) => file.read(buf),
            VfsFile::Embedded { cursor, .. } => cursor.read(buf),
        }
    }
}

impl Seek for VfsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            VfsFile::Disk(file) => file.seek(pos),
            VfsFile::Embedded { cursor, .. } => cursor.seek(pos),
        }
    }
}

/// The runtime filesystem: a root directory plus the compiled-in table.
#[derive(Debug)]
pub struct Vfs {
    root: PathBuf,
    table: Table,
}

impl Vfs {
    pub fn new(root: impl Into<PathBuf>, table: Table) -> Self {
        Self {
            root: root.into(),
            table,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Open `name`, consulting the root directory, then the embedded
    /// table, then the working directory. A leading `/` is stripped.
    /// Names containing a `..` segment never touch the disk and are
    /// rejected unless an embedded record matches.
    pub fn open(&self, name: &str) -> Result<VfsFile, VfsError> {
        let name = name.strip_prefix('/').unwrap_or(name);
        let escaping = has_parent_segment(name);

        // A name with a parent segment must never reach the disk, even
        // when the joined path happens to exist outside the root.
        if !escaping {
            if let Ok(file) = fs::File::open(self.root.join(name)) {
                return Ok(VfsFile::Disk(file));
            }
        }

        if let Some(record) = self.table.get(name) {
            return open_record(name, record);
        }

        if escaping {
            return Err(VfsError::Traversal(name.to_string()));
        }

        match fs::File::open(Path::new(".").join(name)) {
            Ok(file) => Ok(VfsFile::Disk(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(name.to_string()))
            }
            Err(source) => Err(VfsError::Io {
                path: name.to_string(),
                source,
            }),
        }
    }

    /// List the immediate children of `folder` on the real filesystem,
    /// each joined with `folder` and any leading `./` trimmed. The path
    /// is used as given, so relative folders resolve against the working
    /// directory, not the root. Best effort: any failure yields an empty
    /// list.
    pub fn list(&self, folder: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(folder) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| {
                let joined = format!("{}/{}", folder, e.file_name().to_string_lossy());
                joined
                    .strip_prefix("./")
                    .map(str::to_owned)
                    .unwrap_or(joined)
            })
            .collect()
    }
}

fn open_record(name: &str, record: &Record) -> Result<VfsFile, VfsError> {
    let contents = match &record.data {
        Some(gz) => pipeline::decompress(gz).map_err(|source| VfsError::Corrupt {
            path: name.to_string(),
            source,
        })?,
        None => Vec::new(),
    };
    Ok(VfsFile::Embedded {
        info: FileInfo {
            len: contents.len() as u64,
            modtime_nanos: record.modtime_nanos,
            mode: record.mode,
            is_dir: record.is_dir(),
        },
        cursor: Cursor::new(contents),
    })
}

/// Does `name` contain a `..` path segment?
fn has_parent_segment(name: &str) -> bool {
    Path::new(name)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Modification time as nanoseconds since the Unix epoch.
pub(crate) fn modtime_nanos(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d: Duration| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Unix permission/type bits where available, sensible defaults elsewhere.
#[cfg(unix)]
pub(crate) fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
pub(crate) fn mode_bits(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() { 0o755 } else { 0o644 }
}
