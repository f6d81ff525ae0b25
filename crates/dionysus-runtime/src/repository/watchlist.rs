use std::sync::Arc;

use chrono::Utc;

use dionysus_api::MovieCatalog;
use dionysus_core::error::DionysusError;
use dionysus_core::models::WatchlistEntry;

use super::materialize_movie;
use crate::db::DbHandle;
use crate::live::QueryStream;

pub struct WatchlistRepository<C> {
    db: DbHandle,
    catalog: Arc<C>,
}

impl<C> Clone for WatchlistRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<C: MovieCatalog> WatchlistRepository<C> {
    pub fn new(db: DbHandle, catalog: Arc<C>) -> Self {
        Self { db, catalog }
    }

    /// Watchlist entries, most recently added first.
    pub fn entries_stream(&self) -> QueryStream<Vec<WatchlistEntry>> {
        self.db.watchlist_stream()
    }

    pub fn contains_movie_stream(&self, movie_id: i64) -> QueryStream<bool> {
        self.db.watchlist_contains_stream(movie_id)
    }

    /// Add a movie to the watchlist, fetching it from the catalog if needed.
    ///
    /// Adding a movie that is already on the watchlist keeps the existing entry.
    pub async fn create_entry(&self, movie_id: i64) -> Result<(), DionysusError> {
        materialize_movie(&self.db, self.catalog.as_ref(), movie_id).await?;

        let added = self.db.insert_watchlist_entry(movie_id, Utc::now()).await?;
        if added {
            tracing::info!(movie_id, "Added to watchlist");
        } else {
            tracing::debug!(movie_id, "Already on watchlist");
        }
        Ok(())
    }

    pub async fn remove_entry(&self, movie_id: i64) -> Result<(), DionysusError> {
        if self.db.delete_watchlist_entry(movie_id).await? {
            tracing::info!(movie_id, "Removed from watchlist");
        }
        Ok(())
    }
}
