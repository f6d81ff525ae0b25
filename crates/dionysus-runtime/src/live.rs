//! Live queries: result sets the database actor re-pushes after every write.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use dionysus_core::error::DionysusError;
use dionysus_core::models::{DiaryEntry, MovieDetails, WatchlistEntry};
use dionysus_core::storage::Storage;

use crate::db::SubscriptionGuard;

/// Tables a committed write may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Table {
    Movies,
    Watchlist,
    Diary,
}

impl Table {
    pub(crate) const ALL: &'static [Table] = &[Self::Movies, Self::Watchlist, Self::Diary];
}

/// The sending half of a live query. Remembers the last result it delivered
/// so an unchanged result is not pushed again.
pub(crate) struct Feed<T> {
    tx: mpsc::UnboundedSender<Result<T, DionysusError>>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> Feed<T> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Result<T, DionysusError>>) -> Self {
        Self { tx, last: None }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Deliver `result` unless it equals the last delivered value.
    /// Errors always go through and clear the remembered value.
    fn send(&mut self, result: Result<T, DionysusError>) -> bool {
        match result {
            Ok(value) if self.last.as_ref() == Some(&value) => true,
            Ok(value) => {
                self.last = Some(value.clone());
                self.tx.send(Ok(value)).is_ok()
            }
            Err(e) => {
                self.last = None;
                self.tx.send(Err(e)).is_ok()
            }
        }
    }
}

/// A subscribed query together with the feed its results are pushed to.
pub(crate) enum LiveQuery {
    Movie {
        movie_id: i64,
        feed: Feed<Option<MovieDetails>>,
    },
    Watchlist {
        feed: Feed<Vec<WatchlistEntry>>,
    },
    WatchlistContains {
        movie_id: i64,
        feed: Feed<bool>,
    },
    Diary {
        feed: Feed<Vec<DiaryEntry>>,
    },
}

impl LiveQuery {
    fn reads(&self, table: Table) -> bool {
        match self {
            Self::Movie { .. } => table == Table::Movies,
            // Entries carry a movie snapshot, so a movie re-fetch changes them too.
            Self::Watchlist { .. } => matches!(table, Table::Watchlist | Table::Movies),
            Self::WatchlistContains { .. } => table == Table::Watchlist,
            Self::Diary { .. } => matches!(table, Table::Diary | Table::Movies),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Self::Movie { feed, .. } => feed.is_closed(),
            Self::Watchlist { feed } => feed.is_closed(),
            Self::WatchlistContains { feed, .. } => feed.is_closed(),
            Self::Diary { feed } => feed.is_closed(),
        }
    }

    /// Re-run the query and push its result if it changed. Returns `false`
    /// once the subscriber has gone away.
    fn push(&mut self, storage: &Storage) -> bool {
        if self.is_closed() {
            return false;
        }
        match self {
            Self::Movie { movie_id, feed } => feed.send(storage.get_movie(*movie_id)),
            Self::Watchlist { feed } => feed.send(storage.watchlist_entries()),
            Self::WatchlistContains { movie_id, feed } => {
                feed.send(storage.watchlist_contains(*movie_id))
            }
            Self::Diary { feed } => feed.send(storage.diary_entries()),
        }
    }
}

/// The store-owned subscriber list.
#[derive(Default)]
pub(crate) struct Subscribers {
    live: BTreeMap<u64, LiveQuery>,
}

impl Subscribers {
    /// Register a query and push its current result straight away.
    pub(crate) fn add(&mut self, id: u64, mut query: LiveQuery, storage: &Storage) {
        if query.push(storage) {
            self.live.insert(id, query);
        }
    }

    pub(crate) fn remove(&mut self, id: u64) {
        if self.live.remove(&id).is_some() {
            tracing::trace!(id, "Live query unsubscribed");
        }
    }

    /// Re-push every query that reads one of `tables`, dropping dead subscribers.
    pub(crate) fn notify(&mut self, storage: &Storage, tables: &[Table]) {
        self.live.retain(|id, query| {
            if !tables.iter().any(|t| query.reads(*t)) {
                return true;
            }
            let alive = query.push(storage);
            if !alive {
                tracing::trace!(id, "Dropping closed live query");
            }
            alive
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

/// A query result stream. Yields the current result first, then a fresh
/// result after every write that could change it.
///
/// Store failures arrive as `Err` items; the stream keeps going after them.
/// Dropping the stream unsubscribes.
pub struct QueryStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T, DionysusError>>,
    _guard: SubscriptionGuard,
}

impl<T> QueryStream<T> {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Result<T, DionysusError>>,
        guard: SubscriptionGuard,
    ) -> Self {
        Self { rx, _guard: guard }
    }
}

impl<T> Stream for QueryStream<T> {
    type Item = Result<T, DionysusError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
