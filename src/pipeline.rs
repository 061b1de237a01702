//! Per-asset transformation pipeline.
//!
//! Every asset flows through the same two stages before it is escaped into
//! the generated source unit:
//!
//! ```text
//! bytes → minify (by extension, or pass-through) → gzip
//! ```
//!
//! The composition order is fixed. Minification happens first so the
//! compressor sees already-shrunk text; compression always runs, even for
//! binary assets, so the runtime can treat every embedded payload as a
//! gzip stream. Gzip headers are written with a zero mtime, which keeps
//! regeneration byte-identical when inputs haven't changed.
//!
//! A minifier failure aborts the transform — the pipeline never silently
//! embeds the unminified bytes, since a failing minifier almost always
//! means the asset itself is broken.

use crate::minify::{self, MinifyError};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not minify {path}: {source}")]
    Minify {
        path: String,
        #[source]
        source: MinifyError,
    },
    #[error("could not compress {path}: {source}")]
    Compress {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Transform one asset: minify by extension, then gzip.
///
/// `virtual_path` selects the minification strategy via its extension and
/// shows up in error messages; it is not otherwise interpreted.
pub fn transform(virtual_path: &str, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let ext = Path::new(virtual_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let minified = match minify::strategy_for(ext) {
        Some(f) => f(bytes).map_err(|source| PipelineError::Minify {
            path: virtual_path.to_string(),
            source,
        })?,
        None => bytes.to_vec(),
    };

    compress(&minified).map_err(|source| PipelineError::Compress {
        path: virtual_path.to_string(),
        source,
    })
}

/// Gzip `bytes` with the default compression level.
pub fn compress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Inverse of [`compress`]; used by the virtual filesystem to serve
/// embedded payloads.
pub fn decompress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
