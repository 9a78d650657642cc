//! Flat identifier lists: seed loading and result writing.
//!
//! Both files are newline-delimited, one id per line.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ClosureError, Result};

/// Read a seed file into a set of ids.
///
/// Lines are trimmed; blank lines are skipped; duplicates collapse.
pub fn load_seeds(path: &Path) -> Result<HashSet<String>> {
    let seed_err = |source: io::Error| ClosureError::SeedFile {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(seed_err)?;
    let mut ids = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(seed_err)?;
        let id = line.trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Write ids one per line.
///
/// The list goes to `<path>.tmp` first and is renamed into place once
/// flushed, so an interrupted write never leaves a truncated result.
pub fn write_ids<S: AsRef<str>>(path: &Path, ids: &[S]) -> Result<()> {
    let tmp = tmp_path(path);
    let out_err = |source: io::Error| ClosureError::Output {
        path: path.to_path_buf(),
        source,
    };

    {
        let file = File::create(&tmp).map_err(out_err)?;
        let mut writer = BufWriter::new(file);
        for id in ids {
            writer.write_all(id.as_ref().as_bytes()).map_err(out_err)?;
            writer.write_all(b"\n").map_err(out_err)?;
        }
        let file = writer.into_inner().map_err(|e| out_err(e.into_error()))?;
        file.sync_all().map_err(out_err)?;
    }

    fs::rename(&tmp, path).map_err(out_err)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
