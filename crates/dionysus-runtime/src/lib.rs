mod db;
mod live;
pub mod logging;
pub mod repository;
pub mod viewmodel;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use dionysus_api::tmdb::{TmdbClient, TmdbSettings};
use dionysus_api::MovieCatalog;
use dionysus_core::config::{AppConfig, CatalogConfig};
use dionysus_core::error::DionysusError;

pub use db::DbHandle;
pub use live::QueryStream;
use repository::{DiaryRepository, MovieRepository, WatchlistRepository};

/// Everything the screens need, built once at startup and passed down.
pub struct AppContext<C> {
    config: AppConfig,
    db: DbHandle,
    catalog: Arc<C>,
}

impl<C: MovieCatalog> AppContext<C> {
    pub fn new(config: AppConfig, db: DbHandle, catalog: Arc<C>) -> Self {
        Self { config, db, catalog }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &DbHandle {
        &self.db
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    pub fn movies(&self) -> MovieRepository<C> {
        MovieRepository::new(self.db.clone(), Arc::clone(&self.catalog))
    }

    pub fn watchlist(&self) -> WatchlistRepository<C> {
        WatchlistRepository::new(self.db.clone(), Arc::clone(&self.catalog))
    }

    pub fn diary(&self) -> DiaryRepository<C> {
        DiaryRepository::new(self.db.clone(), Arc::clone(&self.catalog))
    }
}

impl AppContext<TmdbClient> {
    /// Load the user config and wire up the on-disk database and TMDB client.
    pub fn load() -> Result<Self, DionysusError> {
        Self::from_config(AppConfig::load()?)
    }

    pub fn from_config(config: AppConfig) -> Result<Self, DionysusError> {
        let db_path = config.ensure_db_path()?;
        let db = DbHandle::open(&db_path)?;

        if config.catalog.access_token.is_none() {
            tracing::warn!("No TMDB access token configured; catalog requests will be rejected");
        }
        let catalog = TmdbClient::new(tmdb_settings(&config.catalog))
            .map_err(|e| DionysusError::Config(e.to_string()))?;

        tracing::info!(db = %db_path.display(), "Dionysus context ready");
        Ok(Self::new(config, db, Arc::new(catalog)))
    }
}

fn tmdb_settings(config: &CatalogConfig) -> TmdbSettings {
    TmdbSettings {
        base_url: config.base_url.clone(),
        image_base_url: config.image_base_url.clone(),
        poster_size: config.poster_size.clone(),
        backdrop_size: config.backdrop_size.clone(),
        language: config.language.clone(),
        include_adult: config.include_adult,
        access_token: config.access_token.clone(),
    }
}
