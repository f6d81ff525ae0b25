use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{mpsc, oneshot};

use dionysus_core::error::DionysusError;
use dionysus_core::models::{DiaryEntry, MovieDetails, WatchlistEntry};
use dionysus_core::storage::Storage;

use crate::live::{Feed, LiveQuery, QueryStream, Subscribers, Table};

type Reply<T> = oneshot::Sender<Result<T, DionysusError>>;

/// Handle to the database actor thread, which owns the [`Storage`] and
/// serializes every read and write.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
    next_subscription: Arc<AtomicU64>,
}

pub(crate) enum DbCommand {
    GetMovie {
        movie_id: i64,
        reply: Reply<Option<MovieDetails>>,
    },
    UpsertMovies {
        movies: Vec<MovieDetails>,
        reply: Reply<()>,
    },
    DeleteMovie {
        movie_id: i64,
        reply: Reply<bool>,
    },
    InsertWatchlistEntry {
        movie_id: i64,
        added_at: DateTime<Utc>,
        reply: Reply<bool>,
    },
    DeleteWatchlistEntry {
        movie_id: i64,
        reply: Reply<bool>,
    },
    InsertDiaryEntry {
        movie_id: i64,
        watched_on: NaiveDate,
        reply: Reply<i64>,
    },
    DeleteDiaryEntry {
        entry_id: i64,
        reply: Reply<bool>,
    },
    Subscribe {
        id: u64,
        query: LiveQuery,
    },
    Unsubscribe {
        id: u64,
    },
    LiveQueryCount {
        reply: Reply<usize>,
    },
}

impl DbHandle {
    /// Open the database file and start the actor.
    pub fn open(path: &Path) -> Result<Self, DionysusError> {
        let storage = Storage::open(path).inspect_err(|e| {
            tracing::error!("Failed to open database {}: {e}", path.display());
        })?;
        Self::spawn(storage)
    }

    /// Start the actor on an in-memory database.
    pub fn open_memory() -> Result<Self, DionysusError> {
        Self::spawn(Storage::open_memory()?)
    }

    pub fn spawn(storage: Storage) -> Result<Self, DionysusError> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .inspect_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))?;

        Ok(Self {
            tx,
            next_subscription: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DbCommand,
    ) -> Result<T, DionysusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| DionysusError::ActorClosed)?;
        rx.await.unwrap_or(Err(DionysusError::ActorClosed))
    }

    fn subscribe<T: Clone + PartialEq>(
        &self,
        query: impl FnOnce(Feed<T>) -> LiveQuery,
    ) -> QueryStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        // If the actor is gone the query (and its sender) is dropped here,
        // which ends the stream.
        if self
            .tx
            .send(DbCommand::Subscribe {
                id,
                query: query(Feed::new(tx)),
            })
            .is_err()
        {
            tracing::warn!(id, "Subscribed to a closed database");
        }
        QueryStream::new(
            rx,
            SubscriptionGuard {
                id,
                tx: self.tx.clone(),
            },
        )
    }

    // ── Movies ──────────────────────────────────────────────────

    pub async fn get_movie(&self, movie_id: i64) -> Result<Option<MovieDetails>, DionysusError> {
        self.request(|reply| DbCommand::GetMovie { movie_id, reply })
            .await
    }

    pub async fn upsert_movies(&self, movies: Vec<MovieDetails>) -> Result<(), DionysusError> {
        self.request(|reply| DbCommand::UpsertMovies { movies, reply })
            .await
    }

    pub async fn delete_movie(&self, movie_id: i64) -> Result<bool, DionysusError> {
        self.request(|reply| DbCommand::DeleteMovie { movie_id, reply })
            .await
    }

    pub fn movie_stream(&self, movie_id: i64) -> QueryStream<Option<MovieDetails>> {
        self.subscribe(|feed| LiveQuery::Movie { movie_id, feed })
    }

    // ── Watchlist ───────────────────────────────────────────────

    pub async fn insert_watchlist_entry(
        &self,
        movie_id: i64,
        added_at: DateTime<Utc>,
    ) -> Result<bool, DionysusError> {
        self.request(|reply| DbCommand::InsertWatchlistEntry {
            movie_id,
            added_at,
            reply,
        })
        .await
    }

    pub async fn delete_watchlist_entry(&self, movie_id: i64) -> Result<bool, DionysusError> {
        self.request(|reply| DbCommand::DeleteWatchlistEntry { movie_id, reply })
            .await
    }

    pub fn watchlist_stream(&self) -> QueryStream<Vec<WatchlistEntry>> {
        self.subscribe(|feed| LiveQuery::Watchlist { feed })
    }

    pub fn watchlist_contains_stream(&self, movie_id: i64) -> QueryStream<bool> {
        self.subscribe(|feed| LiveQuery::WatchlistContains { movie_id, feed })
    }

    // ── Diary ───────────────────────────────────────────────────

    pub async fn insert_diary_entry(
        &self,
        movie_id: i64,
        watched_on: NaiveDate,
    ) -> Result<i64, DionysusError> {
        self.request(|reply| DbCommand::InsertDiaryEntry {
            movie_id,
            watched_on,
            reply,
        })
        .await
    }

    pub async fn delete_diary_entry(&self, entry_id: i64) -> Result<bool, DionysusError> {
        self.request(|reply| DbCommand::DeleteDiaryEntry { entry_id, reply })
            .await
    }

    pub fn diary_stream(&self) -> QueryStream<Vec<DiaryEntry>> {
        self.subscribe(|feed| LiveQuery::Diary { feed })
    }

    /// Number of live queries the actor is currently pushing to.
    pub async fn live_query_count(&self) -> Result<usize, DionysusError> {
        self.request(|reply| DbCommand::LiveQueryCount { reply })
            .await
    }
}

/// Unsubscribes its live query when dropped.
pub(crate) struct SubscriptionGuard {
    id: u64,
    tx: mpsc::UnboundedSender<DbCommand>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(DbCommand::Unsubscribe { id: self.id });
    }
}

/// Subscribers are refreshed before the write is acknowledged, so a caller
/// that awaited a write will find the new result already queued on its streams.
fn actor_loop(mut storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    let mut subscribers = Subscribers::default();

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::GetMovie { movie_id, reply } => {
                let _ = reply.send(storage.get_movie(movie_id));
            }
            DbCommand::UpsertMovies { movies, reply } => {
                let result = storage.upsert_movies(&movies);
                match &result {
                    Ok(()) if movies.is_empty() => {}
                    Ok(()) => subscribers.notify(&storage, &[Table::Movies]),
                    Err(e) => tracing::warn!("Failed to upsert {} movies: {e}", movies.len()),
                }
                let _ = reply.send(result);
            }
            DbCommand::DeleteMovie { movie_id, reply } => {
                let result = storage.delete_movie(movie_id);
                if let Ok(true) = result {
                    // Entries cascade with the movie.
                    subscribers.notify(&storage, Table::ALL);
                }
                let _ = reply.send(result);
            }
            DbCommand::InsertWatchlistEntry {
                movie_id,
                added_at,
                reply,
            } => {
                let result = storage.insert_watchlist_entry(movie_id, added_at);
                if let Ok(true) = result {
                    subscribers.notify(&storage, &[Table::Watchlist]);
                }
                let _ = reply.send(result);
            }
            DbCommand::DeleteWatchlistEntry { movie_id, reply } => {
                let result = storage.delete_watchlist_entry(movie_id);
                if let Ok(true) = result {
                    subscribers.notify(&storage, &[Table::Watchlist]);
                }
                let _ = reply.send(result);
            }
            DbCommand::InsertDiaryEntry {
                movie_id,
                watched_on,
                reply,
            } => {
                let result = storage.insert_diary_entry(movie_id, watched_on);
                if result.is_ok() {
                    subscribers.notify(&storage, &[Table::Diary]);
                }
                let _ = reply.send(result);
            }
            DbCommand::DeleteDiaryEntry { entry_id, reply } => {
                let result = storage.delete_diary_entry(entry_id);
                if let Ok(true) = result {
                    subscribers.notify(&storage, &[Table::Diary]);
                }
                let _ = reply.send(result);
            }
            DbCommand::Subscribe { id, query } => {
                subscribers.add(id, query, &storage);
            }
            DbCommand::Unsubscribe { id } => {
                subscribers.remove(id);
            }
            DbCommand::LiveQueryCount { reply } => {
                let _ = reply.send(Ok(subscribers.len()));
            }
        }
    }

    tracing::debug!("Database actor stopped");
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, StreamExt};

    use super::*;
    use crate::testing::{la_la_land_details, parasite_details};

    #[tokio::test]
    async fn test_stream_starts_with_current_result() {
        let db = DbHandle::open_memory().unwrap();
        let mut stream = db.watchlist_stream();
        assert!(stream.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_is_visible_once_acknowledged() {
        let db = DbHandle::open_memory().unwrap();
        let mut contains = db.watchlist_contains_stream(496243);
        assert!(!contains.next().await.unwrap().unwrap());

        db.upsert_movies(vec![parasite_details()]).await.unwrap();
        assert!(db.insert_watchlist_entry(496243, Utc::now()).await.unwrap());

        assert!(contains.next().await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_movie_refetch_updates_entry_snapshots() {
        let db = DbHandle::open_memory().unwrap();
        db.upsert_movies(vec![parasite_details(), la_la_land_details()])
            .await
            .unwrap();
        db.insert_diary_entry(313369, NaiveDate::from_ymd_opt(2024, 2, 14).unwrap())
            .await
            .unwrap();

        let mut diary = db.diary_stream();
        assert_eq!(diary.next().await.unwrap().unwrap()[0].movie.title, "La La Land");

        let mut renamed = la_la_land_details();
        renamed.movie.title = "La La Land (2016)".into();
        db.upsert_movies(vec![renamed]).await.unwrap();

        assert_eq!(
            diary.next().await.unwrap().unwrap()[0].movie.title,
            "La La Land (2016)"
        );
    }

    #[tokio::test]
    async fn test_writes_that_change_nothing_are_not_pushed() {
        let db = DbHandle::open_memory().unwrap();
        let mut diary = db.diary_stream();
        let mut movie = db.movie_stream(496243);
        assert!(diary.next().await.unwrap().unwrap().is_empty());
        assert!(movie.next().await.unwrap().unwrap().is_none());

        // An empty search result.
        db.upsert_movies(Vec::new()).await.unwrap();
        assert!(diary.next().now_or_never().is_none());
        assert!(movie.next().now_or_never().is_none());

        // A movie no diary entry references.
        db.upsert_movies(vec![parasite_details()]).await.unwrap();
        assert!(diary.next().now_or_never().is_none());
        assert!(movie.next().await.unwrap().unwrap().is_some());

        // The same row again.
        db.upsert_movies(vec![parasite_details()]).await.unwrap();
        assert!(movie.next().now_or_never().is_none());

        db.insert_diary_entry(496243, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(diary.next().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_reports_error() {
        let db = DbHandle::open_memory().unwrap();
        // No movie row: the foreign key rejects the entry.
        let err = db.insert_watchlist_entry(1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DionysusError::Storage(_)));
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let db = DbHandle::open_memory().unwrap();
        let stream = db.diary_stream();
        let other = db.movie_stream(496243);
        assert_eq!(db.live_query_count().await.unwrap(), 2);

        drop(stream);
        assert_eq!(db.live_query_count().await.unwrap(), 1);
        drop(other);
        assert_eq!(db.live_query_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open(&dir.path().join("dionysus.db")).unwrap();
        db.upsert_movies(vec![parasite_details()]).await.unwrap();
        let movie = db.get_movie(496243).await.unwrap().unwrap();
        assert_eq!(movie.movie.title, "Parasite");
    }
}
