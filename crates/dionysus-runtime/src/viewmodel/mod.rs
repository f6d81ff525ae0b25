//! Presentation state for the movie detail, watchlist, diary and search screens.
//!
//! Each view-model owns a [`Scope`](flow::Scope) for the actions it launches
//! and a [`StateHolder`](flow::StateHolder) that only runs its live queries
//! while the screen is subscribed.

pub mod async_state;
pub mod flow;
pub mod message;

mod diary;
mod movie_detail;
mod search;
mod watchlist;

pub use async_state::Async;
pub use diary::{DiaryUiState, DiaryViewModel};
pub use message::UserMessage;
pub use movie_detail::{MovieDetailUiState, MovieDetailViewModel};
pub use search::{SearchUiState, SearchViewModel};
pub use watchlist::{WatchlistUiState, WatchlistViewModel};
