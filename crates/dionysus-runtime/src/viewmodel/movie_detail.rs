use std::sync::Arc;

use chrono::DateTime;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dionysus_api::MovieCatalog;
use dionysus_core::error::DionysusError;
use dionysus_core::models::MovieDetails;

use super::async_state::{async_stream, Async};
use super::flow::{combine4, watch_stream, Scope, StateHolder, StateSubscription};
use super::message::UserMessage;
use crate::repository::{DiaryRepository, MovieRepository, WatchlistRepository};
use crate::AppContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovieDetailUiState {
    pub movie: Option<MovieDetails>,
    pub is_in_watchlist: bool,
    pub is_loading: bool,
    pub user_message: Option<UserMessage>,
}

/// State and actions for a single movie's detail screen.
pub struct MovieDetailViewModel<C> {
    movie_id: i64,
    movies: MovieRepository<C>,
    watchlist: WatchlistRepository<C>,
    diary: DiaryRepository<C>,
    user_message: Arc<watch::Sender<Option<UserMessage>>>,
    is_loading: Arc<watch::Sender<bool>>,
    ui_state: StateHolder<MovieDetailUiState>,
    scope: Scope,
}

impl<C: MovieCatalog + 'static> MovieDetailViewModel<C> {
    pub fn new(ctx: &AppContext<C>, movie_id: i64) -> Self {
        Self::with_repositories(ctx.movies(), ctx.watchlist(), ctx.diary(), movie_id)
    }

    pub fn with_repositories(
        movies: MovieRepository<C>,
        watchlist: WatchlistRepository<C>,
        diary: DiaryRepository<C>,
        movie_id: i64,
    ) -> Self {
        let (user_message, message_rx) = watch::channel(None);
        let (is_loading, loading_rx) = watch::channel(false);

        let upstream = {
            let movies = movies.clone();
            let watchlist = watchlist.clone();
            move || {
                let movie = async_stream(
                    movies.movie_stream(movie_id),
                    UserMessage::LoadingMovieError,
                    "movie details",
                    handle_movie,
                );
                let in_watchlist = async_stream(
                    watchlist.contains_movie_stream(movie_id),
                    UserMessage::LoadingMovieError,
                    "watchlist state",
                    Async::Success,
                );
                combine4(
                    watch_stream(message_rx.clone()),
                    watch_stream(loading_rx.clone()),
                    movie,
                    in_watchlist,
                    build_state,
                )
            }
        };
        let initial = MovieDetailUiState {
            is_loading: true,
            ..Default::default()
        };

        Self {
            movie_id,
            movies,
            watchlist,
            diary,
            user_message: Arc::new(user_message),
            is_loading: Arc::new(is_loading),
            ui_state: StateHolder::new(initial, upstream),
            scope: Scope::new(),
        }
    }

    pub fn movie_id(&self) -> i64 {
        self.movie_id
    }

    /// Observe the screen state. Collection stops when the last subscription
    /// is dropped.
    pub fn ui_state(&self) -> StateSubscription<MovieDetailUiState> {
        self.ui_state.subscribe()
    }

    pub fn current_state(&self) -> MovieDetailUiState {
        self.ui_state.value()
    }

    /// Add the movie to the watchlist, or remove it if it is already there.
    pub fn toggle_in_watchlist(&self) -> JoinHandle<()> {
        let in_watchlist = self.ui_state.value().is_in_watchlist;
        let watchlist = self.watchlist.clone();
        let user_message = Arc::clone(&self.user_message);
        let movie_id = self.movie_id;

        self.scope.launch(async move {
            let result = if in_watchlist {
                watchlist.remove_entry(movie_id).await
            } else {
                watchlist.create_entry(movie_id).await
            };
            if let Err(e) = result {
                tracing::warn!(movie_id, "Failed to update watchlist: {e}");
                user_message.send_replace(Some(UserMessage::for_error(
                    &e,
                    UserMessage::WatchlistUpdateFailed,
                )));
            }
        })
    }

    /// Log a watch on the UTC calendar day of `selected_date_millis`
    /// (milliseconds since the Unix epoch, as a date picker reports it).
    ///
    /// The detail screen's action for this is `addToWatchlist(timestampMillis)`,
    /// although it writes to the diary.
    #[doc(alias = "addToWatchlist")]
    pub fn add_to_diary(
        &self,
        selected_date_millis: Option<i64>,
    ) -> Result<JoinHandle<()>, DionysusError> {
        let millis = selected_date_millis
            .ok_or_else(|| DionysusError::InvalidArgument("no date selected".into()))?;
        let watched_on = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| {
                DionysusError::InvalidArgument(format!("timestamp {millis} is out of range"))
            })?
            .date_naive();

        let diary = self.diary.clone();
        let user_message = Arc::clone(&self.user_message);
        let movie_id = self.movie_id;

        Ok(self.scope.launch(async move {
            if let Err(e) = diary.create_entry(movie_id, watched_on).await {
                tracing::warn!(movie_id, "Failed to add diary entry: {e}");
                user_message.send_replace(Some(UserMessage::for_error(
                    &e,
                    UserMessage::DiaryUpdateFailed,
                )));
            }
        }))
    }

    pub fn snackbar_message_shown(&self) {
        self.user_message.send_replace(None);
    }

    /// Re-fetch the movie from the catalog, raising the loading flag meanwhile.
    pub fn refresh(&self) -> JoinHandle<()> {
        let movies = self.movies.clone();
        let user_message = Arc::clone(&self.user_message);
        let is_loading = Arc::clone(&self.is_loading);
        let movie_id = self.movie_id;

        is_loading.send_replace(true);
        self.scope.launch(async move {
            if let Err(e) = movies.refresh_movie(movie_id).await {
                tracing::warn!(movie_id, "Failed to refresh movie: {e}");
                user_message.send_replace(Some(UserMessage::for_error(
                    &e,
                    UserMessage::LoadingMovieError,
                )));
            }
            is_loading.send_replace(false);
        })
    }
}

fn handle_movie(movie: Option<MovieDetails>) -> Async<MovieDetails> {
    match movie {
        Some(movie) => Async::Success(movie),
        None => Async::Error(UserMessage::MovieNotFound),
    }
}

fn build_state(
    user_message: &Option<UserMessage>,
    is_loading: &bool,
    movie: &Async<MovieDetails>,
    in_watchlist: &Async<bool>,
) -> MovieDetailUiState {
    match movie {
        Async::Loading => MovieDetailUiState {
            is_loading: true,
            ..Default::default()
        },
        Async::Error(message) => MovieDetailUiState {
            user_message: Some(*message),
            ..Default::default()
        },
        Async::Success(movie) => MovieDetailUiState {
            movie: Some(movie.clone()),
            is_in_watchlist: matches!(in_watchlist, Async::Success(true)),
            is_loading: *is_loading,
            user_message: *user_message,
        },
    }
}
