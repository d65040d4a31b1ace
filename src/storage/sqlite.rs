use crate::model::{RawItem, ReportStats, ScoredPost, StorageError};
use crate::normalizer::Fingerprint;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

/// One stored report line, as read back from the `posts` table.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub rank: usize,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub source_url: Option<String>,
    pub timestamp_iso: Option<String>,
    pub text: String,
    pub best_label: String,
    pub best_score: f64,
    pub mean_score: f64,
}

pub struct SqliteStorage {
    conn: Connection,
}

/// Stable identity of a post for the engagement ledger: its URL when known,
/// otherwise its text fingerprint.
pub fn post_key(item: &RawItem) -> String {
    match &item.source_url {
        Some(url) => url.clone(),
        None => match Fingerprint::of(&item.text) {
            Some(fp) => format!("text:{}", fp.as_str()),
            None => "text:".to_string(),
        },
    }
}

impl SqliteStorage {
    /// Opens the database and creates missing tables.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS posts (
                query TEXT NOT NULL,
                rank INTEGER NOT NULL,
                author TEXT,
                author_url TEXT,
                source_url TEXT,
                timestamp_iso TEXT,
                text TEXT NOT NULL,
                best_label TEXT NOT NULL,
                best_score REAL NOT NULL,
                mean_score REAL NOT NULL,
                discovered_at TEXT NOT NULL,
                PRIMARY KEY (query, rank)
            );

            CREATE TABLE IF NOT EXISTS notified (
                post_key TEXT PRIMARY KEY,
                notified_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS report_stats (
                query TEXT PRIMARY KEY,
                post_count INTEGER NOT NULL,
                mean_best_score REAL NOT NULL,
                top_label TEXT,
                last_updated TEXT NOT NULL
            );
            ",
        )?;

        // databases created before profile links were stored
        let has_author_url = conn
            .prepare("SELECT 1 FROM pragma_table_info('posts') WHERE name = 'author_url'")?
            .exists([])?;
        if !has_author_url {
            conn.execute("ALTER TABLE posts ADD COLUMN author_url TEXT", [])?;
        }

        Ok(Self { conn })
    }

    /// Replaces the stored report for `query` with `ranked`, in rank order.
    pub fn replace_report(&mut self, query: &str, ranked: &[ScoredPost]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM posts WHERE query = ?1", params![query])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO posts (
                    query, rank, author, author_url, source_url, timestamp_iso, text,
                    best_label, best_score, mean_score, discovered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for (rank, post) in ranked.iter().enumerate() {
                stmt.execute(params![
                    query,
                    rank + 1,
                    &post.item.author,
                    &post.item.author_url,
                    &post.item.source_url,
                    &post.item.timestamp_iso,
                    &post.item.text,
                    &post.row.best_label,
                    post.row.best_score,
                    post.row.mean_score,
                    post.item.discovered_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Reads back the stored report for `query`, best first.
    #[cfg(test)]
    pub fn load_report(&self, query: &str) -> Result<Vec<StoredPost>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT rank, author, author_url, source_url, timestamp_iso, text, best_label, best_score, mean_score
             FROM posts WHERE query = ?1 ORDER BY rank ASC",
        )?;

        let rows = stmt.query_map(params![query], |row| {
            Ok(StoredPost {
                rank: row.get(0)?,
                author: row.get(1)?,
                author_url: row.get(2)?,
                source_url: row.get(3)?,
                timestamp_iso: row.get(4)?,
                text: row.get(5)?,
                best_label: row.get(6)?,
                best_score: row.get(7)?,
                mean_score: row.get(8)?,
            })
        })?;

        let mut posts = Vec::new();
        for post in rows {
            posts.push(post?);
        }
        Ok(posts)
    }

    pub fn is_notified(&self, key: &str) -> Result<bool, StorageError> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM notified WHERE post_key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        Ok(rows.next()?.is_some())
    }

    pub fn mark_notified(&self, key: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO notified (post_key, notified_at) VALUES (?1, datetime('now'))",
            params![key],
        )?;
        Ok(())
    }

    pub fn get_stats(&self, query: &str) -> Result<Option<ReportStats>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT post_count, mean_best_score, top_label, last_updated FROM report_stats WHERE query = ?1",
        )?;

        let mut rows = stmt.query(params![query])?;
        if let Some(row) = rows.next()? {
            let post_count: usize = row.get(0)?;
            let mean_best_score: f64 = row.get(1)?;
            let top_label: Option<String> = row.get(2)?;
            let last_updated_str: String = row.get(3)?;
            let last_updated: DateTime<Utc> = last_updated_str.parse()?;

            Ok(Some(ReportStats {
                query: query.to_string(),
                post_count,
                mean_best_score,
                top_label,
                last_updated,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn update_stats(&self, stats: &ReportStats) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO report_stats (query, post_count, mean_best_score, top_label, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &stats.query,
                stats.post_count,
                stats.mean_best_score,
                &stats.top_label,
                stats.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
