// CSV report writer
use crate::model::{ScoredPost, StorageError};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const HEADER: [&str; 8] = [
    "author",
    "author_url",
    "source_url",
    "timestamp_iso",
    "text",
    "best_label",
    "best_score",
    "mean_score",
];

/// Writes the ranked report to `<dir>/<query>_<hash>.csv` and returns the file path.
pub fn write_report(dir: &Path, query: &str, ranked: &[ScoredPost]) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.csv", file_stem(query)));

    let mut out = BufWriter::new(File::create(&path)?);
    writeln!(out, "{}", HEADER.join(","))?;
    for post in ranked {
        let record = [
            field(post.item.author.as_deref().unwrap_or("")),
            field(post.item.author_url.as_deref().unwrap_or("")),
            field(post.item.source_url.as_deref().unwrap_or("")),
            field(post.item.timestamp_iso.as_deref().unwrap_or("")),
            field(&post.item.text),
            field(&post.row.best_label),
            format!("{:.6}", post.row.best_score),
            format!("{:.6}", post.row.mean_score),
        ];
        writeln!(out, "{}", record.join(","))?;
    }
    out.flush()?;
    Ok(path)
}

/// Quotes a field when it holds a delimiter, quote or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Readable slug plus a hash of the raw query, so queries that slug alike
/// ("a b", "a_b") still get their own file.
fn file_stem(query: &str) -> String {
    let slug: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = if slug.is_empty() { "report".to_string() } else { slug };

    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    format!("{}_{:08x}", slug, hasher.finish() as u32)
}
