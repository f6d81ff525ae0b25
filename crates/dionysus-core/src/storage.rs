use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DionysusError;
use crate::models::{DiaryEntry, Movie, MovieDetails, WatchlistEntry};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed storage for movies, the watchlist and the diary.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and apply the schema.
    pub fn open(path: &Path) -> Result<Self, DionysusError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DionysusError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    // ── Movies ──────────────────────────────────────────────────

    /// Insert or overwrite a movie row.
    ///
    /// A re-fetch replaces every column except `runtime`, which search results
    /// never carry and so is only replaced by a non-null value.
    pub fn upsert_movie(&self, details: &MovieDetails) -> Result<(), DionysusError> {
        upsert_movie_on(&self.conn, details)
    }

    /// Upsert a batch of movies in one transaction.
    pub fn upsert_movies(&mut self, movies: &[MovieDetails]) -> Result<(), DionysusError> {
        let tx = self.conn.transaction()?;
        for details in movies {
            upsert_movie_on(&tx, details)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a movie by its catalog ID.
    pub fn get_movie(&self, id: i64) -> Result<Option<MovieDetails>, DionysusError> {
        self.conn
            .query_row(
                "SELECT id, title, poster_url, backdrop_url, overview, release_date, runtime
                 FROM movies WHERE id = ?1",
                params![id],
                row_to_details,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete a movie. Its watchlist and diary entries go with it.
    pub fn delete_movie(&self, id: i64) -> Result<bool, DionysusError> {
        let n = self
            .conn
            .execute("DELETE FROM movies WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ── Watchlist ───────────────────────────────────────────────

    /// Add a movie to the watchlist. Returns `false` if it was already there,
    /// in which case the original `added_at` is kept.
    pub fn insert_watchlist_entry(
        &self,
        movie_id: i64,
        added_at: DateTime<Utc>,
    ) -> Result<bool, DionysusError> {
        let n = self.conn.execute(
            "INSERT INTO watchlist_entries (movie_id, added_at) VALUES (?1, ?2)
             ON CONFLICT(movie_id) DO NOTHING",
            params![movie_id, added_at.to_rfc3339()],
        )?;
        Ok(n > 0)
    }

    /// Remove a movie from the watchlist. Returns `false` if it was not there.
    pub fn delete_watchlist_entry(&self, movie_id: i64) -> Result<bool, DionysusError> {
        let n = self.conn.execute(
            "DELETE FROM watchlist_entries WHERE movie_id = ?1",
            params![movie_id],
        )?;
        Ok(n > 0)
    }

    /// All watchlist entries joined with their movie, newest first.
    pub fn watchlist_entries(&self) -> Result<Vec<WatchlistEntry>, DionysusError> {
        let mut stmt = self.conn.prepare(
            "SELECT w.movie_id, w.added_at, m.id, m.title, m.poster_url
             FROM watchlist_entries w
             JOIN movies m ON w.movie_id = m.id
             ORDER BY w.added_at DESC, w.movie_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let added_at: String = row.get(1)?;
                Ok(WatchlistEntry {
                    movie_id: row.get(0)?,
                    added_at: parse_datetime(&added_at),
                    movie: row_to_movie_at(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn watchlist_contains(&self, movie_id: i64) -> Result<bool, DionysusError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM watchlist_entries WHERE movie_id = ?1",
            params![movie_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ── Diary ───────────────────────────────────────────────────

    /// Log a watch of a movie on the given day, returning the entry ID.
    pub fn insert_diary_entry(
        &self,
        movie_id: i64,
        watched_on: NaiveDate,
    ) -> Result<i64, DionysusError> {
        self.conn.execute(
            "INSERT INTO diary_entries (movie_id, watched_on) VALUES (?1, ?2)",
            params![movie_id, watched_on.format(DATE_FORMAT).to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Delete a diary entry by its ID. Returns `false` if it did not exist.
    pub fn delete_diary_entry(&self, id: i64) -> Result<bool, DionysusError> {
        let n = self
            .conn
            .execute("DELETE FROM diary_entries WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// All diary entries joined with their movie, most recent watch first.
    pub fn diary_entries(&self) -> Result<Vec<DiaryEntry>, DionysusError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.movie_id, d.watched_on, m.id, m.title, m.poster_url
             FROM diary_entries d
             JOIN movies m ON d.movie_id = m.id
             ORDER BY d.watched_on DESC, d.id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let watched_on: String = row.get(2)?;
                Ok(DiaryEntry {
                    id: row.get(0)?,
                    movie_id: row.get(1)?,
                    watched_on: parse_date(&watched_on).unwrap_or_default(),
                    movie: row_to_movie_at(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ── Schema ──────────────────────────────────────────────────────

/// Apply the bundled schema, tracked with `PRAGMA user_version`.
fn apply_schema(conn: &Connection) -> Result<(), DionysusError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        tracing::debug!("Applying schema v1");
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

fn upsert_movie_on(conn: &Connection, details: &MovieDetails) -> Result<(), DionysusError> {
    conn.execute(
        "INSERT INTO movies (id, title, poster_url, backdrop_url, overview,
         release_date, runtime, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           poster_url = excluded.poster_url,
           backdrop_url = excluded.backdrop_url,
           overview = excluded.overview,
           release_date = excluded.release_date,
           runtime = COALESCE(excluded.runtime, movies.runtime),
           fetched_at = excluded.fetched_at",
        params![
            details.movie.id,
            details.movie.title,
            details.movie.poster_url,
            details.backdrop_url,
            details.overview,
            details.release_date.map(|d| d.format(DATE_FORMAT).to_string()),
            details.runtime,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Parse a datetime string from SQLite (either RFC 3339 or SQLite's `datetime('now')` format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    DateTime::default()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

// ── Row mapping helpers ─────────────────────────────────────────

fn row_to_movie_at(row: &rusqlite::Row<'_>, off: usize) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(off)?,
        title: row.get(off + 1)?,
        poster_url: row.get(off + 2)?,
    })
}

fn row_to_details(row: &rusqlite::Row<'_>) -> rusqlite::Result<MovieDetails> {
    let release_date: Option<String> = row.get(5)?;
    Ok(MovieDetails {
        movie: row_to_movie_at(row, 0)?,
        backdrop_url: row.get(3)?,
        overview: row.get(4)?,
        release_date: release_date.as_deref().and_then(parse_date),
        runtime: row.get(6)?,
    })
}
