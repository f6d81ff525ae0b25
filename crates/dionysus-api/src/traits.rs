//! Trait definitions for remote movie catalogs.
//!
//! The repositories only talk to a catalog through [`MovieCatalog`], so tests
//! can swap the TMDB client for a stub.

use std::future::Future;

use chrono::NaiveDate;

use crate::error::CatalogError;

/// A remote movie metadata service.
pub trait MovieCatalog: Send + Sync {
    /// Search for movies by title, in the service's relevance order.
    fn search_movies(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogMovie>, CatalogError>> + Send;

    /// Fetch full details for a single movie.
    fn get_movie(
        &self,
        movie_id: u64,
    ) -> impl Future<Output = Result<CatalogMovie, CatalogError>> + Send;
}

/// A movie as returned by any catalog, with image paths already resolved to URLs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatalogMovie {
    pub service_id: u64,
    pub title: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Only present on detail responses.
    pub runtime: Option<u32>,
}
