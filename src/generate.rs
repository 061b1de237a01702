//! Generated source unit emission.
//!
//! Turns the registration list into one Rust source file the host program
//! compiles in. For every embedded record the unit carries a single
//! statement:
//!
//! ```text
//! table.insert("site/index.html", 1700000000000000000, 420, Some(b"\x1f\x8b..."));
//! ```
//!
//! Directory markers use `None` for the payload. The whole file is one
//! `embed` function taking the runtime [`Table`](crate::vfs::Table),
//! gated so it only compiles into bundled builds:
//!
//! ```text
//! // Generated by inlay. Do not edit.
//! #[cfg(feature = "bundle")]
//! #[rustfmt::skip]
//! pub fn embed(table: &mut inlay::vfs::Table) {
//!     table.insert("site", 1700000000000000000, 16877, None);
//!     table.insert("site/index.html", 1700000000000000000, 420, Some(b"..."));
//! }
//! ```
//!
//! Generation is atomic-or-failed from the caller's point of view: any
//! I/O or pipeline error aborts with the offending path, and a partially
//! written unit is never recorded as valid because the snapshot is only
//! written after the unit is complete.
//!
//! Directory walks are sorted so output is deterministic; together with
//! fixed gzip headers this makes regeneration byte-identical when inputs
//! haven't changed.

use crate::cache::{self, Snapshot};
use crate::config::{BuildMode, EmbedConfig};
use crate::escape;
use crate::pipeline::{self, PipelineError};
use crate::vfs::{mode_bits, modtime_nanos};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("could not create {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("could not write snapshot: {0}")]
    Snapshot(#[source] io::Error),
    #[error("{0} exists and is not a directory")]
    NotADirectory(String),
}

/// Create the importer file and the module directory if needed.
/// Module mode only; single-file units need no scaffolding.
pub(crate) fn scaffold(config: &EmbedConfig) -> Result<(), GenerateError> {
    if config.mode != BuildMode::Module {
        return Ok(());
    }

    let importer = config.root.join(&config.importer);
    if !importer.exists() {
        let contents = format!(
            "#[cfg(feature = \"bundle\")]\npub mod {};\n",
            config.module
        );
        fs::write(&importer, contents).map_err(|source| GenerateError::Create {
            path: importer.display().to_string(),
            source,
        })?;
    }

    let dir = config.root.join(&config.module);
    match fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(GenerateError::NotADirectory(dir.display().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(&dir).map_err(|source| GenerateError::Create {
                path: dir.display().to_string(),
                source,
            })
        }
        Err(source) => Err(GenerateError::Read {
            path: dir.display().to_string(),
            source,
        }),
    }
}

/// Write the generated unit for the current registrations, then persist
/// the snapshot. Returns the number of records written.
pub(crate) fn build(
    config: &EmbedConfig,
    pending: &[String],
    memory: &BTreeMap<String, Vec<u8>>,
) -> Result<usize, GenerateError> {
    let unit = config.unit_path();
    if let Some(parent) = unit.parent() {
        fs::create_dir_all(parent).map_err(|source| GenerateError::Create {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let file = fs::File::create(&unit).map_err(|source| GenerateError::Create {
        path: unit.display().to_string(),
        source,
    })?;
    let mut w = BufWriter::new(file);
    let werr = |source| GenerateError::Write {
        path: unit.display().to_string(),
        source,
    };

    header(&mut w, config).map_err(werr)?;
    let mut count = 0;

    // In-memory assets first: no disk backing, so mtime is "now" and the
    // mode is a plain default.
    for (path, data) in memory {
        let payload = pipeline::transform(path, data)?;
        write_record(&mut w, path, now_nanos(), 0o644, Some(&payload)).map_err(werr)?;
        count += 1;
    }

    let skip = [config.unit_filename(), cache::SNAPSHOT_FILENAME.to_string()];
    for registration in pending {
        let full = config.root.join(registration);
        let meta = fs::metadata(&full).map_err(|source| GenerateError::Read {
            path: registration.clone(),
            source,
        })?;

        if meta.is_dir() {
            count += embed_tree(&mut w, config, registration, &full, &skip)?;
        } else {
            embed_file(&mut w, config, registration, &full, &meta)?;
            count += 1;
        }
    }

    writeln!(w, "}}").map_err(werr)?;
    w.flush().map_err(werr)?;

    Snapshot::new(pending)
        .save(&config.snapshot_dir())
        .map_err(GenerateError::Snapshot)?;

    Ok(count)
}

/// Recursively embed a registered directory: one marker statement per
/// directory (including the registration itself) and one data record per
/// file, skipping the generated unit and the snapshot.
fn embed_tree(
    w: &mut impl Write,
    config: &EmbedConfig,
    registration: &str,
    full: &Path,
    skip: &[String],
) -> Result<usize, GenerateError> {
    let mut count = 0;
    for entry in WalkDir::new(full).sort_by_file_name() {
        let entry = entry.map_err(|source| GenerateError::Walk {
            path: registration.to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy();
        if skip.iter().any(|s| s.as_str() == name.as_ref()) {
            continue;
        }

        let rel = entry.path().strip_prefix(full).unwrap_or(entry.path());
        let virtual_path = join_virtual(registration, rel);
        let meta = entry.metadata().map_err(|source| GenerateError::Walk {
            path: virtual_path.clone(),
            source,
        })?;

        if entry.file_type().is_dir() {
            write_record(w, &virtual_path, modtime_nanos(&meta), mode_bits(&meta), None)
                .map_err(|source| GenerateError::Write {
                    path: config.unit_path().display().to_string(),
                    source,
                })?;
        } else {
            embed_file(w, config, &virtual_path, entry.path(), &meta)?;
        }
        count += 1;
    }
    Ok(count)
}

/// Embed one regular file: read, transform, escape, emit.
fn embed_file(
    w: &mut impl Write,
    config: &EmbedConfig,
    virtual_path: &str,
    full: &Path,
    meta: &fs::Metadata,
) -> Result<(), GenerateError> {
    let data = fs::read(full).map_err(|source| GenerateError::Read {
        path: virtual_path.to_string(),
        source,
    })?;
    let payload = pipeline::transform(virtual_path, &data)?;
    write_record(
        w,
        virtual_path,
        modtime_nanos(meta),
        mode_bits(meta),
        Some(&payload),
    )
    .map_err(|source| GenerateError::Write {
        path: config.unit_path().display().to_string(),
        source,
    })
}

fn header(w: &mut impl Write, config: &EmbedConfig) -> io::Result<()> {
    writeln!(w, "// Generated by inlay. Do not edit.")?;
    match config.mode {
        BuildMode::Module => writeln!(w, "#[cfg(feature = \"bundle\")]")?,
        BuildMode::SingleFile(_) => writeln!(w, "#[cfg(not(target_family = \"wasm\"))]")?,
    }
    writeln!(w, "#[rustfmt::skip]")?;
    writeln!(w, "pub fn embed(table: &mut inlay::vfs::Table) {{")
}

fn write_record(
    w: &mut impl Write,
    path: &str,
    modtime_nanos: i64,
    mode: u32,
    payload: Option<&[u8]>,
) -> io::Result<()> {
    match payload {
        Some(bytes) => writeln!(
            w,
            "    table.insert({:?}, {}, {}, Some(b\"{}\"));",
            path,
            modtime_nanos,
            mode,
            escape::escape(bytes)
        ),
        None => writeln!(
            w,
            "    table.insert({:?}, {}, {}, None);",
            path, modtime_nanos, mode
        ),
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Join a registration path with a walk-relative path using `/`
/// separators. An empty relative path is the registration itself.
fn join_virtual(registration: &str, rel: &Path) -> String {
    let mut out = registration.trim_end_matches('/').to_string();
    for component in rel.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> EmbedConfig {
        EmbedConfig {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    fn insert_lines(unit: &Path) -> Vec<String> {
        fs::read_to_string(unit)
            .unwrap()
            .lines()
            .filter(|l| l.trim_start().starts_with("table.insert"))
            .map(str::to_string)
            .collect()
    }

    // =========================================================================
    // Records and markers
    // =========================================================================

    #[test]
    fn single_file_registration_emits_one_record() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("note.txt"), b"hello");

        let count = build(&config, &["note.txt".to_string()], &BTreeMap::new()).unwrap();
        assert_eq!(count, 1);

        let lines = insert_lines(&config.unit_path());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"note.txt\""));
        assert!(lines[0].contains("Some(b\""));
    }

    #[test]
    fn directory_tree_markers_and_files() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("site/index.html"), b"<p>Hi</p>");
        write_file(&tmp.path().join("site/sub/a.txt"), b"a");

        let count = build(&config, &["site".to_string()], &BTreeMap::new()).unwrap();
        // site (marker), site/index.html, site/sub (marker), site/sub/a.txt
        assert_eq!(count, 4);

        let lines = insert_lines(&config.unit_path());
        let markers: Vec<_> = lines.iter().filter(|l| l.ends_with("None);")).collect();
        assert_eq!(markers.len(), 2);
        assert!(markers.iter().any(|l| l.contains("\"site\"")));
        assert!(markers.iter().any(|l| l.contains("\"site/sub\"")));

        let data: Vec<_> = lines.iter().filter(|l| l.contains("Some(b\"")).collect();
        assert_eq!(data.len(), 2);
        assert!(data.iter().any(|l| l.contains("\"site/index.html\"")));
        assert!(data.iter().any(|l| l.contains("\"site/sub/a.txt\"")));
    }

    #[test]
    fn generated_unit_and_snapshot_excluded_from_walk() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("tree/keep.txt"), b"keep");
        write_file(&tmp.path().join("tree/assets.rs"), b"// old generated unit");
        write_file(
            &tmp.path().join(format!("tree/{}", cache::SNAPSHOT_FILENAME)),
            b"{}",
        );

        build(&config, &["tree".to_string()], &BTreeMap::new()).unwrap();
        let lines = insert_lines(&config.unit_path());
        assert!(lines.iter().any(|l| l.contains("keep.txt")));
        assert!(!lines.iter().any(|l| l.contains("assets.rs")));
        assert!(!lines.iter().any(|l| l.contains("snapshot")));
    }

    #[test]
    fn memory_assets_embedded_without_disk_backing() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let mut memory = BTreeMap::new();
        memory.insert("virtual/blob.bin".to_string(), vec![0u8, 1, 255]);

        let count = build(&config, &[], &memory).unwrap();
        assert_eq!(count, 1);

        let lines = insert_lines(&config.unit_path());
        assert!(lines[0].contains("\"virtual/blob.bin\""));
        assert!(lines[0].contains(", 420, Some(b\"")); // 0o644
    }

    // =========================================================================
    // Unit shape
    // =========================================================================

    #[test]
    fn module_mode_unit_is_feature_gated() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("a.txt"), b"x");
        build(&config, &["a.txt".to_string()], &BTreeMap::new()).unwrap();

        let content = fs::read_to_string(config.unit_path()).unwrap();
        assert!(content.starts_with("// Generated by inlay."));
        assert!(content.contains("#[cfg(feature = \"bundle\")]"));
        assert!(content.contains("pub fn embed(table: &mut inlay::vfs::Table) {"));
        assert!(content.trim_end().ends_with('}'));
    }

    #[test]
    fn single_file_mode_unit_is_wasm_gated() {
        let tmp = TempDir::new().unwrap();
        let config = EmbedConfig {
            root: tmp.path().to_path_buf(),
            mode: BuildMode::SingleFile("bundle.rs".into()),
            ..Default::default()
        };
        write_file(&tmp.path().join("a.txt"), b"x");
        build(&config, &["a.txt".to_string()], &BTreeMap::new()).unwrap();

        let content = fs::read_to_string(tmp.path().join("bundle.rs")).unwrap();
        assert!(content.contains("#[cfg(not(target_family = \"wasm\"))]"));
    }

    #[test]
    fn regeneration_is_byte_identical_for_unchanged_inputs() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("site/index.html"), b"<p>Hi</p>");
        write_file(&tmp.path().join("site/app.js"), b"let a = 1; // x\n");

        let pending = vec!["site".to_string()];
        build(&config, &pending, &BTreeMap::new()).unwrap();
        let first = fs::read(config.unit_path()).unwrap();
        build(&config, &pending, &BTreeMap::new()).unwrap();
        let second = fs::read(config.unit_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_written_after_generation() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("a.txt"), b"x");

        let pending = vec!["a.txt".to_string()];
        build(&config, &pending, &BTreeMap::new()).unwrap();

        let snapshot = Snapshot::load(&config.snapshot_dir()).unwrap();
        assert!(snapshot.matches(&pending));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn broken_minifier_input_aborts_generation() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("bad.json"), b"{nope");

        let err = build(&config, &["bad.json".to_string()], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, GenerateError::Pipeline(_)));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn missing_registration_aborts_generation() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let err = build(&config, &["gone.txt".to_string()], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, GenerateError::Read { .. }));
        assert!(err.to_string().contains("gone.txt"));
    }

    // =========================================================================
    // Scaffolding
    // =========================================================================

    #[test]
    fn scaffold_creates_importer_and_module_dir() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        scaffold(&config).unwrap();

        let importer = fs::read_to_string(tmp.path().join("embed.rs")).unwrap();
        assert!(importer.contains("pub mod assets;"));
        assert!(tmp.path().join("assets").is_dir());
    }

    #[test]
    fn scaffold_does_not_overwrite_importer() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("embed.rs"), b"// custom importer\n");

        scaffold(&config).unwrap();
        let importer = fs::read_to_string(tmp.path().join("embed.rs")).unwrap();
        assert_eq!(importer, "// custom importer\n");
    }

    #[test]
    fn scaffold_rejects_module_path_that_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        write_file(&tmp.path().join("assets"), b"not a dir");

        assert!(matches!(
            scaffold(&config),
            Err(GenerateError::NotADirectory(_))
        ));
    }

    #[test]
    fn scaffold_is_noop_in_single_file_mode() {
        let tmp = TempDir::new().unwrap();
        let config = EmbedConfig {
            root: tmp.path().to_path_buf(),
            mode: BuildMode::SingleFile("bundle.rs".into()),
            ..Default::default()
        };
        scaffold(&config).unwrap();
        assert!(!tmp.path().join("embed.rs").exists());
    }
}
