use chrono::NaiveDate;
use serde::Deserialize;

use crate::traits::CatalogMovie;

// ── Response types ──────────────────────────────────────────────

/// `GET /search/movie` response page.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub page: u32,
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

/// A movie in a search result or a `GET /movie/{id}` response.
///
/// Search results omit `runtime`; unreleased titles send `release_date: ""`.
#[derive(Debug, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
}

/// Error body TMDB sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct TmdbStatus {
    pub status_code: i32,
    pub status_message: String,
}

// ── Image URLs ──────────────────────────────────────────────────

/// Turns TMDB image path fragments (`/abc.jpg`) into full URLs.
#[derive(Debug, Clone)]
pub struct ImageUrls {
    pub base_url: String,
    pub poster_size: String,
    pub backdrop_size: String,
}

impl ImageUrls {
    pub fn poster(&self, path: Option<&str>) -> Option<String> {
        self.compose(&self.poster_size, path)
    }

    pub fn backdrop(&self, path: Option<&str>) -> Option<String> {
        self.compose(&self.backdrop_size, path)
    }

    fn compose(&self, size: &str, path: Option<&str>) -> Option<String> {
        let path = path.map(str::trim).filter(|p| !p.is_empty())?;
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            Some(format!("{base}/{size}{path}"))
        } else {
            Some(format!("{base}/{size}/{path}"))
        }
    }
}

// ── Conversion ──────────────────────────────────────────────────

impl TmdbMovie {
    pub fn into_catalog_movie(self, images: &ImageUrls) -> CatalogMovie {
        CatalogMovie {
            service_id: self.id,
            poster_url: images.poster(self.poster_path.as_deref()),
            backdrop_url: images.backdrop(self.backdrop_path.as_deref()),
            title: self.title,
            overview: self.overview.filter(|o| !o.trim().is_empty()),
            release_date: self
                .release_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            runtime: self.runtime.filter(|&r| r > 0),
        }
    }
}
