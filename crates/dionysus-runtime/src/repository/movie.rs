use std::sync::Arc;

use dionysus_api::MovieCatalog;
use dionysus_core::error::DionysusError;
use dionysus_core::models::{Movie, MovieDetails};

use super::{catalog_to_details, fetch_details};
use crate::db::DbHandle;
use crate::live::QueryStream;

/// Catalog search and locally cached movie details.
pub struct MovieRepository<C> {
    db: DbHandle,
    catalog: Arc<C>,
}

impl<C> Clone for MovieRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<C: MovieCatalog> MovieRepository<C> {
    pub fn new(db: DbHandle, catalog: Arc<C>) -> Self {
        Self { db, catalog }
    }

    /// The stored row for `movie_id`, or `None` while there is none.
    pub fn movie_stream(&self, movie_id: i64) -> QueryStream<Option<MovieDetails>> {
        self.db.movie_stream(movie_id)
    }

    /// Search the catalog and cache every result locally.
    ///
    /// Results keep the catalog's order. A blank query is rejected.
    pub async fn search_movies(&self, query: &str) -> Result<Vec<Movie>, DionysusError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DionysusError::InvalidArgument(
                "search query is empty".into(),
            ));
        }

        let found = self.catalog.search_movies(query).await.map_err(|e| {
            tracing::warn!(query, "Movie search failed: {e}");
            DionysusError::Catalog(e.to_string())
        })?;

        let details = found
            .into_iter()
            .map(catalog_to_details)
            .collect::<Result<Vec<_>, _>>()?;
        let movies = details.iter().map(|d| d.movie.clone()).collect();

        tracing::debug!(query, count = details.len(), "Caching search results");
        self.db.upsert_movies(details).await?;
        Ok(movies)
    }

    /// Re-fetch full details for a movie and store them.
    pub async fn refresh_movie(&self, movie_id: i64) -> Result<MovieDetails, DionysusError> {
        let details = fetch_details(self.catalog.as_ref(), movie_id).await?;
        self.db.upsert_movies(vec![details.clone()]).await?;
        Ok(details)
    }

    /// Forget a movie, along with its watchlist and diary entries.
    pub async fn delete_movie(&self, movie_id: i64) -> Result<bool, DionysusError> {
        self.db.delete_movie(movie_id).await
    }
}
