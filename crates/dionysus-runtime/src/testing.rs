//! Test doubles and fixtures shared by the runtime tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use dionysus_api::{CatalogError, CatalogMovie, MovieCatalog};
use dionysus_core::config::AppConfig;
use dionysus_core::models::{Movie, MovieDetails};

use crate::db::DbHandle;
use crate::AppContext;

/// In-memory catalog. Unknown ids are `NotFound`; search matches titles
/// case-insensitively.
#[derive(Default)]
pub struct StubCatalog {
    movies: Mutex<Vec<CatalogMovie>>,
    fail_search: AtomicBool,
    detail_calls: AtomicUsize,
    search_delays: Mutex<HashMap<String, Duration>>,
}

impl StubCatalog {
    pub fn with_movies(movies: impl IntoIterator<Item = CatalogMovie>) -> Self {
        let stub = Self::default();
        stub.movies.lock().unwrap().extend(movies);
        stub
    }

    pub fn fail_searches(&self) {
        self.fail_search.store(true, Ordering::SeqCst);
    }

    pub fn delay_search(&self, query: &str, delay: Duration) {
        self.search_delays
            .lock()
            .unwrap()
            .insert(query.to_string(), delay);
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

impl MovieCatalog for StubCatalog {
    fn search_movies(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogMovie>, CatalogError>> + Send {
        let needle = query.to_lowercase();
        let result = if self.fail_search.load(Ordering::SeqCst) {
            Err(CatalogError::Api {
                status: 503,
                message: "Service unavailable".into(),
            })
        } else {
            Ok(self
                .movies
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.title.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        };
        let delay = self.search_delays.lock().unwrap().get(query).copied();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn get_movie(
        &self,
        movie_id: u64,
    ) -> impl Future<Output = Result<CatalogMovie, CatalogError>> + Send {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .movies
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.service_id == movie_id)
            .cloned()
            .ok_or(CatalogError::NotFound { id: movie_id });
        async move { result }
    }
}

pub fn parasite() -> CatalogMovie {
    CatalogMovie {
        service_id: 496243,
        title: "Parasite".into(),
        poster_url: Some("https://image.tmdb.org/t/p/w500/7IiTTgloJzvGI1TAYymCfbfl3vT.jpg".into()),
        backdrop_url: None,
        overview: Some("All unemployed, Ki-taek's family takes peculiar interest in the wealthy and glamorous Parks.".into()),
        release_date: NaiveDate::from_ymd_opt(2019, 5, 30),
        runtime: Some(133),
    }
}

pub fn la_la_land() -> CatalogMovie {
    CatalogMovie {
        service_id: 313369,
        title: "La La Land".into(),
        poster_url: None,
        backdrop_url: None,
        overview: None,
        release_date: NaiveDate::from_ymd_opt(2016, 11, 29),
        runtime: Some(128),
    }
}

pub fn parasite_details() -> MovieDetails {
    MovieDetails {
        movie: Movie {
            id: 496243,
            title: "Parasite".into(),
            poster_url: None,
        },
        backdrop_url: None,
        overview: None,
        release_date: NaiveDate::from_ymd_opt(2019, 5, 30),
        runtime: Some(133),
    }
}

pub fn la_la_land_details() -> MovieDetails {
    MovieDetails::from_movie(Movie {
        id: 313369,
        title: "La La Land".into(),
        poster_url: None,
    })
}

/// Context over an in-memory database and a catalog holding both fixtures.
pub fn test_context() -> AppContext<StubCatalog> {
    context_with(StubCatalog::with_movies([parasite(), la_la_land()]))
}

pub fn context_with(catalog: StubCatalog) -> AppContext<StubCatalog> {
    AppContext::new(
        AppConfig::default(),
        DbHandle::open_memory().unwrap(),
        Arc::new(catalog),
    )
}
