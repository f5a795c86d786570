//! JSONL storage: one line per record.
//!
//! Users and edges share one file, tagged by `kind`.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::edge::Edge;
use crate::user::UserProfile;

/// One persisted line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreRecord {
    User(UserProfile),
    Edge(Edge),
}

/// Parse a ledger stream. Blank lines and `#` comments are skipped.
pub fn read_records(reader: impl BufRead) -> Result<Vec<StoreRecord>, JsonlError> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line_no = idx + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(JsonlError::Io(line_no, e.to_string()))),
            };
            let body = line.trim();
            if body.is_empty() || body.starts_with('#') {
                return None;
            }
            Some(
                serde_json::from_str::<StoreRecord>(body)
                    .map_err(|e| JsonlError::Parse(line_no, e.to_string())),
            )
        })
        .collect()
}

pub fn write_records(writer: &mut impl Write, records: &[StoreRecord]) -> Result<(), JsonlError> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)
            .map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Load a ledger file, refusing NUL bytes and invalid UTF-8 before parsing.
pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<StoreRecord>, JsonlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| path_io(path, e))?;
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: NUL byte in ledger file",
            path.display()
        )));
    }
    let text = std::str::from_utf8(&bytes).map_err(|e| {
        JsonlError::Corrupt(format!("{}: invalid UTF-8: {e}", path.display()))
    })?;
    read_records(text.as_bytes())
}

/// Replace the file at `path` with `records`.
///
/// Readers see either the previous contents or the new ones, never a prefix.
pub fn write_records_to_path(
    path: impl AsRef<Path>,
    records: &[StoreRecord],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| path_io(dir, e))?;
    }

    let staged = staging_path(path);
    if let Err(err) = stage(&staged, records) {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(path_io(path, e));
    }

    if let Some(dir) = dir {
        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| path_io(dir, e))?;
    }
    Ok(())
}

fn stage(staged: &Path, records: &[StoreRecord]) -> Result<(), JsonlError> {
    let file = File::create(staged).map_err(|e| path_io(staged, e))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, records)?;
    let file = writer
        .into_inner()
        .map_err(|e| path_io(staged, e.into_error()))?;
    file.sync_all().map_err(|e| path_io(staged, e))
}

fn staging_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(format!(".{}-{nanos}.partial", std::process::id()));
    PathBuf::from(name)
}

fn path_io(path: &Path, err: std::io::Error) -> JsonlError {
    JsonlError::Io(0, format!("{}: {err}", path.display()))
}

#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    /// Line 0 means the failure was not tied to a line.
    #[error("I/O error (line {0}): {1}")]
    Io(usize, String),

    #[error("line {0} is not a ledger record: {1}")]
    Parse(usize, String),

    #[error("cannot encode record: {0}")]
    Serialize(String),

    #[error("corrupt ledger file: {0}")]
    Corrupt(String),
}
