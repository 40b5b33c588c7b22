//! Flat-table persistence.
//!
//! Tables are CSV files with a header row. Writers go through a temporary
//! sibling file that is renamed over the destination once every row is
//! flushed, so a failed stage never leaves a half-written table behind.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub const RAW_POSTS: &str = "raw_posts.csv";
pub const CLEANED_POSTS: &str = "cleaned_posts.csv";
pub const TREND_DATASET: &str = "trend_dataset.csv";
pub const COMMENTS_RAW: &str = "comments_raw.csv";
pub const COMMENT_SENTIMENT: &str = "reddit_comment_sentiment.csv";
pub const SUPERSPREADERS: &str = "superspreaders.csv";
pub const MODEL_METRICS: &str = "model_metrics.csv";
pub const MODEL_ARTIFACT: &str = "model.json";

fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Move `tmp` over `dest`. Where the platform refuses to rename over an
/// existing file, the content is copied instead.
fn replace_file(tmp: &Path, dest: &Path) -> Result<()> {
    if fs::rename(tmp, dest).is_ok() {
        return Ok(());
    }
    fs::copy(tmp, dest)?;
    fs::remove_file(tmp)?;
    Ok(())
}

/// Run `write` against a temporary sibling of `dest` and move the result
/// into place. On failure the temporary file is removed and `dest` is left
/// untouched.
fn write_atomically<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    ensure_parent(dest)?;
    let tmp = temp_path(dest);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    replace_file(&tmp, dest)
}

/// Write `rows` as a CSV table at `path`.
///
/// The header comes from the first record, so an empty slice yields an
/// empty file. Reading it back gives an empty table.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomically(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Read every row of the CSV table at `path`.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Serialize `value` as pretty JSON at `path`, atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomically(path, |tmp| {
        let mut writer = BufWriter::new(File::create(tmp)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        user: String,
        score: f64,
        note: Option<String>,
    }

    #[test]
    fn table_written_and_read_back_without_temp_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("table.csv");
        let rows = vec![
            Row { user: "alice".into(), score: 1.5, note: None },
            Row { user: "bob, jr".into(), score: -2.0, note: Some("quoted".into()) },
        ];
        write_table(&path, &rows).unwrap();

        let back: Vec<Row> = read_table(&path).unwrap();
        assert_eq!(back, rows);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn overwrites_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        write_table(&path, &[Row { user: "a".into(), score: 1.0, note: None }]).unwrap();
        write_table(&path, &[Row { user: "b".into(), score: 2.0, note: None }]).unwrap();
        let back: Vec<Row> = read_table(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].user, "b");
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();

        // JSON object keys must be strings
        let unserializable: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into_iter().collect();
        assert!(write_json(&path, &unserializable).is_err());

        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(!temp_path(&path).exists());
    }
}
