//! Shared test utilities for the inlay test suite.
//!
//! Filesystem fixtures for staleness and generation tests: writing nested
//! files in one call and pushing a file's modification time around so
//! mtime comparisons do not depend on test timing.

use std::fs::{self, File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Set the modification time of an existing file.
///
/// Staleness tests need inputs that are definitively older or newer than
/// the generated unit; real clocks are too coarse for that.
pub fn set_mtime(path: &Path, t: SystemTime) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(t)).unwrap();
}
