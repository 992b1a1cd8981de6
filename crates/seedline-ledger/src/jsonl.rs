//! JSONL storage: one record per line.
//!
//! Sentences come in as JSONL; unit and occurrence exports go out as JSONL.
//! Blank lines and `#` comments are skipped on read. Every write goes to a
//! temporary sibling first and is renamed into place after `fsync`, so a
//! reader never observes a half-written export.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Read records from a JSONL reader.
pub fn read_jsonl<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| JsonlError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row: T = serde_json::from_str(trimmed)
            .map_err(|e| JsonlError::Parse(line_no + 1, e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write records to a JSONL writer.
pub fn write_jsonl<T: Serialize>(writer: &mut impl Write, rows: &[T]) -> Result<(), JsonlError> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Render records as JSONL bytes.
pub fn render_jsonl<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, JsonlError> {
    let mut buf = Vec::new();
    write_jsonl(&mut buf, rows)?;
    Ok(buf)
}

/// Read records from a JSONL file path.
pub fn read_jsonl_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Vec<T>, JsonlError> {
    let path = path.as_ref();
    let bytes = read_checked_bytes(path)?;
    read_jsonl(BufReader::new(bytes.as_slice()))
}

/// Read a whole file, rejecting NUL bytes and invalid UTF-8.
pub fn read_checked_bytes(path: &Path) -> Result<Vec<u8>, JsonlError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    validate_substrate_bytes(path, &bytes)?;
    Ok(bytes)
}

/// Write records to a JSONL file path, atomically.
pub fn write_jsonl_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    rows: &[T],
) -> Result<(), JsonlError> {
    write_bytes_atomic(path, &render_jsonl(rows)?)
}

/// Write one pretty-printed JSON document, atomically.
pub fn write_json_to_path<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), JsonlError> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|e| JsonlError::Serialize(e.to_string()))?;
    bytes.push(b'\n');
    write_bytes_atomic(path, &bytes)
}

/// Replace `path` with `bytes`: stage a sibling, fsync it, rename it over
/// the target, then fsync the directory so the rename itself is durable.
pub fn write_bytes_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    }

    let staged = staging_path(path);
    if let Err(error) = stage(&staged, bytes) {
        let _ = fs::remove_file(&staged);
        return Err(error);
    }
    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(JsonlError::Io(
            0,
            format!("rename {} over {}: {e}", staged.display(), path.display()),
        ));
    }

    if let Some(dir) = dir {
        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| io_error(dir, e))?;
    }
    Ok(())
}

fn stage(staged: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    let mut writer = BufWriter::new(File::create(staged).map_err(|e| io_error(staged, e))?);
    writer.write_all(bytes).map_err(|e| io_error(staged, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_error(staged, e.into_error()))?;
    file.sync_all().map_err(|e| io_error(staged, e))
}

fn io_error(path: &Path, error: std::io::Error) -> JsonlError {
    JsonlError::Io(0, format!("{}: {error}", path.display()))
}

/// `<file>.tmp.<pid>.<nanos>` next to the target, so the rename stays on
/// one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(format!(".tmp.{}.{nanos}", std::process::id()));
    PathBuf::from(name)
}

/// Exports and inputs are text: a NUL byte or broken UTF-8 means the file
/// was truncated or overwritten by something else.
fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    let problem = if bytes.contains(&0) {
        "contains NUL byte(s)"
    } else if std::str::from_utf8(bytes).is_err() {
        "contains non-UTF-8 byte sequence(s)"
    } else {
        return Ok(());
    };
    Err(JsonlError::Corrupt(format!("{}: {problem}", path.display())))
}

#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted input: {0}")]
    Corrupt(String),
}
