use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dionysus_api::MovieCatalog;
use dionysus_core::error::DionysusError;
use dionysus_core::models::Movie;

use super::flow::{watch_stream, Scope, StateHolder, StateSubscription};
use super::message::UserMessage;
use crate::repository::MovieRepository;
use crate::AppContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchUiState {
    pub query: String,
    pub results: Vec<Movie>,
    pub is_searching: bool,
    pub user_message: Option<UserMessage>,
}

pub struct SearchViewModel<C> {
    movies: MovieRepository<C>,
    state: Arc<watch::Sender<SearchUiState>>,
    /// Bumped on every search; a finished search only applies its results if
    /// no newer one has started since.
    generation: Arc<AtomicU64>,
    ui_state: StateHolder<SearchUiState>,
    scope: Scope,
}

impl<C: MovieCatalog + 'static> SearchViewModel<C> {
    pub fn new(ctx: &AppContext<C>) -> Self {
        Self::with_repository(ctx.movies())
    }

    pub fn with_repository(movies: MovieRepository<C>) -> Self {
        let (state, rx) = watch::channel(SearchUiState::default());
        Self {
            movies,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            ui_state: StateHolder::new(SearchUiState::default(), move || {
                watch_stream(rx.clone())
            }),
            scope: Scope::new(),
        }
    }

    pub fn ui_state(&self) -> StateSubscription<SearchUiState> {
        self.ui_state.subscribe()
    }

    pub fn current_state(&self) -> SearchUiState {
        self.state.borrow().clone()
    }

    /// Run a catalog search. Results of any search still in flight are
    /// discarded once they arrive.
    pub fn search(&self, query: &str) -> JoinHandle<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.to_string();
        self.state.send_modify(|s| {
            s.query = query.clone();
            s.is_searching = true;
            s.user_message = None;
        });

        let movies = self.movies.clone();
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.generation);

        self.scope.launch(async move {
            let result = movies.search_movies(&query).await;
            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!(query = %query, "Dropping stale search results");
                return;
            }

            state.send_modify(|s| {
                s.is_searching = false;
                match result {
                    Ok(results) => s.results = results,
                    Err(DionysusError::InvalidArgument(_)) => s.results.clear(),
                    Err(e) => {
                        tracing::warn!(query = %query, "Search failed: {e}");
                        s.user_message = Some(UserMessage::SearchFailed);
                    }
                }
            });
        })
    }

    pub fn snackbar_message_shown(&self) {
        self.state.send_modify(|s| s.user_message = None);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{context_with, la_la_land, parasite, test_context, StubCatalog};

    #[tokio::test]
    async fn test_search_populates_results() {
        let ctx = test_context();
        let vm = SearchViewModel::new(&ctx);
        let mut state = vm.ui_state();

        vm.search("Parasite").await.unwrap();
        let s = state.wait_for(|s| !s.results.is_empty()).await.unwrap();
        assert_eq!(s.query, "Parasite");
        assert!(!s.is_searching);
        assert_eq!(s.results[0].title, "Parasite");

        // The result is now cached locally.
        assert!(ctx.db().get_movie(496243).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_results_are_dropped() {
        let catalog = StubCatalog::with_movies([parasite(), la_la_land()]);
        catalog.delay_search("la la", Duration::from_millis(100));
        let ctx = context_with(catalog);
        let vm = SearchViewModel::new(&ctx);

        let slow = vm.search("la la");
        let fast = vm.search("Parasite");
        fast.await.unwrap();
        slow.await.unwrap();

        let s = vm.current_state();
        assert_eq!(s.query, "Parasite");
        let titles: Vec<&str> = s.results.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Parasite"]);
    }

    #[tokio::test]
    async fn test_failure_sets_message() {
        let catalog = StubCatalog::default();
        catalog.fail_searches();
        let vm = SearchViewModel::new(&context_with(catalog));

        vm.search("Parasite").await.unwrap();
        let s = vm.current_state();
        assert_eq!(s.user_message, Some(UserMessage::SearchFailed));
        assert!(!s.is_searching);

        vm.snackbar_message_shown();
        assert_eq!(vm.current_state().user_message, None);
    }

    #[tokio::test]
    async fn test_blank_query_clears_results() {
        let ctx = test_context();
        let vm = SearchViewModel::new(&ctx);
        vm.search("Parasite").await.unwrap();
        assert_eq!(vm.current_state().results.len(), 1);

        vm.search("  ").await.unwrap();
        let s = vm.current_state();
        assert!(s.results.is_empty());
        assert_eq!(s.user_message, None);
    }
}
