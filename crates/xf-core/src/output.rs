//! Output tree and file writers.
//!
//! The data directory (`--data-dir`, `XFETCH_DATA`, or the platform data
//! dir) holds three things: the usage ledger at its root, raw API payloads
//! under `raw/` as JSONL, and normalized rows under `clean/` as CSV.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use xf_common::{Error, QueryKey, Result};

use crate::normalize::PostRecord;

/// CSV column order for normalized rows. The serialized field names of
/// [`PostRecord`] in output order.
const CSV_COLUMNS: [&str; 15] = [
    "post_id",
    "created_at",
    "text",
    "lang",
    "author_id",
    "username",
    "author_followers",
    "retweets",
    "replies",
    "likes",
    "quotes",
    "conversation_id",
    "query_key",
    "fetched_at",
    "source_platform",
];

/// Resolved output directory layout.
pub struct DataDirs {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub clean: PathBuf,
}

impl DataDirs {
    /// Resolve the data root: explicit override, then `XFETCH_DATA`, then
    /// the platform data dir (`~/.local/share/xfetch` on Linux).
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self> {
        let root = if let Some(dir) = override_dir {
            dir.to_path_buf()
        } else if let Ok(dir) = std::env::var("XFETCH_DATA") {
            PathBuf::from(dir)
        } else {
            dirs::data_dir()
                .map(|d| d.join("xfetch"))
                .ok_or_else(|| Error::Config("could not resolve a data directory".to_string()))?
        };

        Ok(Self {
            raw: root.join("raw"),
            clean: root.join("clean"),
            root,
        })
    }

    /// Create the directory tree.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw)?;
        std::fs::create_dir_all(&self.clean)?;
        Ok(())
    }

    pub fn counts_jsonl_path(&self, key: &QueryKey, ts: DateTime<Utc>) -> PathBuf {
        self.raw
            .join(format!("counts_{}_{}.jsonl", key.as_str(), timestamp_tag(ts)))
    }

    pub fn fetch_jsonl_path(&self, key: &QueryKey, ts: DateTime<Utc>) -> PathBuf {
        self.raw
            .join(format!("fetch_{}_{}.jsonl", key.as_str(), timestamp_tag(ts)))
    }

    pub fn fetch_csv_path(&self, key: &QueryKey, ts: DateTime<Utc>) -> PathBuf {
        self.clean
            .join(format!("fetch_{}_{}.csv", key.as_str(), timestamp_tag(ts)))
    }
}

fn timestamp_tag(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d%H%M%S").to_string()
}

/// Write payloads as JSON Lines, one compact document per line.
pub fn save_jsonl(path: &Path, payloads: &[&Value]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for payload in payloads {
        serde_json::to_writer(&mut writer, payload)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write normalized rows as CSV with a header line.
///
/// Fields are quoted per RFC 4180 when they contain commas, quotes, or
/// newlines. `None` fields render empty.
pub fn write_clean_csv(path: &Path, rows: &[PostRecord]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", CSV_COLUMNS.join(","))?;

    for row in rows {
        let value = serde_json::to_value(row)?;
        let fields: Vec<String> = CSV_COLUMNS
            .iter()
            .map(|col| csv_field(value.get(*col).unwrap_or(&Value::Null)))
            .collect();
        writeln!(writer, "{}", fields.join(","))?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_field(value: &Value) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(text: &str) -> PostRecord {
        PostRecord {
            post_id: "1".to_string(),
            created_at: Some("2026-08-27T10:00:00Z".to_string()),
            text: text.to_string(),
            lang: Some("en".to_string()),
            author_id: Some("1001".to_string()),
            username: None,
            author_followers: Some(1540),
            retweets: Some(3),
            replies: None,
            likes: Some(12),
            quotes: Some(0),
            conversation_id: Some("1".to_string()),
            query_key: "spectacle_en".to_string(),
            fetched_at: "2026-08-27T10:01:00Z".to_string(),
            source_platform: "x".to_string(),
        }
    }

    #[test]
    fn resolve_prefers_override() {
        let dirs = DataDirs::resolve(Some(Path::new("/tmp/xf-test"))).unwrap();
        assert_eq!(dirs.root, Path::new("/tmp/xf-test"));
        assert_eq!(dirs.raw, Path::new("/tmp/xf-test/raw"));
        assert_eq!(dirs.clean, Path::new("/tmp/xf-test/clean"));
    }

    #[test]
    fn file_names_embed_key_and_timestamp() {
        let dirs = DataDirs::resolve(Some(Path::new("/data"))).unwrap();
        let ts = "2026-08-27T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let key = QueryKey::parse("spectacle_en").unwrap();

        assert_eq!(
            dirs.counts_jsonl_path(&key, ts),
            Path::new("/data/raw/counts_spectacle_en_20260827100000.jsonl")
        );
        assert_eq!(
            dirs.fetch_jsonl_path(&key, ts),
            Path::new("/data/raw/fetch_spectacle_en_20260827100000.jsonl")
        );
        assert_eq!(
            dirs.fetch_csv_path(&key, ts),
            Path::new("/data/clean/fetch_spectacle_en_20260827100000.csv")
        );
    }

    #[test]
    fn jsonl_is_one_document_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let a = json!({"a": 1});
        let b = json!({"b": [1, 2]});
        save_jsonl(&path, &[&a, &b]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(serde_json::from_str::<Value>(lines[0]).unwrap(), a);
        assert_eq!(serde_json::from_str::<Value>(lines[1]).unwrap(), b);
    }

    #[test]
    fn csv_header_and_quoting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_clean_csv(&path, &[record("hello, \"world\"\nbye")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));

        // Quoted field doubles inner quotes; the embedded newline splits
        // the row across two physical lines
        let row = lines.next().unwrap();
        assert!(row.contains("\"hello, \"\"world\"\""));
        // None fields render empty (username, replies)
        assert!(content.contains(",,1540"));
    }

    #[test]
    fn csv_empty_rows_still_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_clean_csv(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
