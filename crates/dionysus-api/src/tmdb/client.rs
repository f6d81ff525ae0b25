use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use super::types::{ImageUrls, SearchResponse, TmdbMovie, TmdbStatus};
use crate::error::CatalogError;
use crate::traits::{CatalogMovie, MovieCatalog};

/// Connection settings for [`TmdbClient`].
#[derive(Debug, Clone)]
pub struct TmdbSettings {
    pub base_url: String,
    pub image_base_url: String,
    pub poster_size: String,
    pub backdrop_size: String,
    pub language: String,
    pub include_adult: bool,
    pub access_token: Option<String>,
}

/// TMDB v3 REST client.
pub struct TmdbClient {
    http: Client,
    base_url: Url,
    images: ImageUrls,
    language: String,
    include_adult: bool,
    access_token: Option<String>,
}

impl TmdbClient {
    pub fn new(settings: TmdbSettings) -> Result<Self, CatalogError> {
        Self::with_http(settings, Client::new())
    }

    /// Build on a caller-supplied HTTP client, e.g. one with its own proxy
    /// or timeout settings.
    pub fn with_http(settings: TmdbSettings, http: Client) -> Result<Self, CatalogError> {
        // `Url::join` drops the last path segment unless it ends in a slash.
        let mut base = settings.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| CatalogError::Config(format!("invalid base URL {base:?}: {e}")))?;

        Ok(Self {
            http,
            base_url,
            images: ImageUrls {
                base_url: settings.image_base_url,
                poster_size: settings.poster_size,
                backdrop_size: settings.backdrop_size,
            },
            language: settings.language,
            include_adult: settings.include_adult,
            access_token: settings.access_token.filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogError> {
        self.base_url
            .join(path)
            .map_err(|e| CatalogError::Config(e.to_string()))
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let req = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(&[("language", self.language.as_str())]);
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TmdbStatus>(&body)
                .map(|s| s.status_message)
                .unwrap_or(body);
            Err(CatalogError::Api { status, message })
        }
    }
}

impl MovieCatalog for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<Vec<CatalogMovie>, CatalogError> {
        let url = self.endpoint("search/movie")?;
        tracing::debug!(query, "Searching TMDB");

        let include_adult = if self.include_adult { "true" } else { "false" };
        let resp = self
            .get(url)
            .query(&[
                ("query", query),
                ("include_adult", include_adult),
                ("page", "1"),
            ])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|m| m.into_catalog_movie(&self.images))
            .collect())
    }

    async fn get_movie(&self, movie_id: u64) -> Result<CatalogMovie, CatalogError> {
        let url = self.endpoint(&format!("movie/{movie_id}"))?;
        tracing::debug!(movie_id, "Fetching TMDB movie details");

        let resp = self.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound { id: movie_id });
        }

        let resp = Self::check_response(resp).await?;
        let body: TmdbMovie = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(body.into_catalog_movie(&self.images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> TmdbSettings {
        TmdbSettings {
            base_url: base_url.into(),
            image_base_url: "https://image.tmdb.org/t/p".into(),
            poster_size: "w500".into(),
            backdrop_size: "w1280".into(),
            language: "en-US".into(),
            include_adult: false,
            access_token: Some(String::new()),
        }
    }

    #[test]
    fn test_endpoint_keeps_version_segment() {
        for base in ["https://api.themoviedb.org/3", "https://api.themoviedb.org/3/"] {
            let client = TmdbClient::new(settings(base)).unwrap();
            assert_eq!(
                client.endpoint("search/movie").unwrap().as_str(),
                "https://api.themoviedb.org/3/search/movie"
            );
            assert_eq!(
                client.endpoint("movie/496243").unwrap().as_str(),
                "https://api.themoviedb.org/3/movie/496243"
            );
        }
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let client = TmdbClient::new(settings("https://api.themoviedb.org/3")).unwrap();
        assert!(client.access_token.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = TmdbClient::new(settings("not a url")).err().unwrap();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        // Port 9 (discard) on localhost is closed in test environments. Skip
        // any proxy from the environment so the connection itself fails.
        let http = Client::builder().no_proxy().build().unwrap();
        let client = TmdbClient::with_http(settings("http://127.0.0.1:9/3"), http).unwrap();
        let err = client.search_movies("Parasite").await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)));
    }
}
