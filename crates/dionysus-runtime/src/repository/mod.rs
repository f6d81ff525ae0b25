//! Repositories mediating between the local store and the remote catalog.
//!
//! Reads are live [`QueryStream`](crate::live::QueryStream)s over the store.
//! Writes that need a movie row fetch it from the catalog first.

mod diary;
mod movie;
mod watchlist;

pub use diary::DiaryRepository;
pub use movie::MovieRepository;
pub use watchlist::WatchlistRepository;

use dionysus_api::{CatalogError, CatalogMovie, MovieCatalog};
use dionysus_core::error::DionysusError;
use dionysus_core::models::{Movie, MovieDetails};

use crate::db::DbHandle;

/// Make sure a row exists for `movie_id`, fetching it from the catalog when
/// it is missing locally.
///
/// This runs as its own store command. The entry insert that follows is a
/// separate command, so nothing ties the two together.
pub(crate) async fn materialize_movie<C: MovieCatalog>(
    db: &DbHandle,
    catalog: &C,
    movie_id: i64,
) -> Result<MovieDetails, DionysusError> {
    if let Some(details) = db.get_movie(movie_id).await? {
        return Ok(details);
    }

    tracing::debug!(movie_id, "Movie not stored locally, fetching from catalog");
    let details = fetch_details(catalog, movie_id).await?;
    db.upsert_movies(vec![details.clone()]).await?;
    Ok(details)
}

/// Fetch one movie from the catalog detail endpoint.
pub(crate) async fn fetch_details<C: MovieCatalog>(
    catalog: &C,
    movie_id: i64,
) -> Result<MovieDetails, DionysusError> {
    let service_id =
        u64::try_from(movie_id).map_err(|_| DionysusError::MovieNotFound(movie_id))?;

    match catalog.get_movie(service_id).await {
        Ok(found) => catalog_to_details(found),
        Err(CatalogError::NotFound { .. }) => Err(DionysusError::MovieNotFound(movie_id)),
        Err(e) => {
            tracing::warn!(movie_id, "Catalog lookup failed: {e}");
            Err(DionysusError::Catalog(e.to_string()))
        }
    }
}

pub(crate) fn catalog_to_details(found: CatalogMovie) -> Result<MovieDetails, DionysusError> {
    let id = i64::try_from(found.service_id).map_err(|_| {
        DionysusError::Catalog(format!("catalog id {} out of range", found.service_id))
    })?;

    Ok(MovieDetails {
        movie: Movie {
            id,
            title: found.title,
            poster_url: found.poster_url,
        },
        backdrop_url: found.backdrop_url,
        overview: found.overview,
        release_date: found.release_date,
        runtime: found.runtime,
    })
}
