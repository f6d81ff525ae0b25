use std::fmt;

use serde::Serialize;

use dionysus_core::error::{DionysusError, ErrorKind};

/// Messages a screen can show in its snackbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessage {
    MovieNotFound,
    LoadingMovieError,
    LoadingWatchlistError,
    LoadingDiaryError,
    WatchlistUpdateFailed,
    DiaryUpdateFailed,
    SearchFailed,
}

impl UserMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MovieNotFound => "Movie not found",
            Self::LoadingMovieError => "Error while loading movie",
            Self::LoadingWatchlistError => "Error while loading watchlist",
            Self::LoadingDiaryError => "Error while loading diary",
            Self::WatchlistUpdateFailed => "Could not update watchlist",
            Self::DiaryUpdateFailed => "Could not add diary entry",
            Self::SearchFailed => "Search failed",
        }
    }

    /// Pick the message for an action that failed with `err`.
    /// `fallback` is used unless the movie itself could not be found.
    pub fn for_error(err: &DionysusError, fallback: Self) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::MovieNotFound,
            ErrorKind::Transient | ErrorKind::InvalidArgument => fallback,
        }
    }
}

impl fmt::Display for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
