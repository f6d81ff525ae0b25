use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dionysus_api::MovieCatalog;
use dionysus_core::models::WatchlistEntry;

use super::async_state::{async_stream, Async};
use super::flow::{combine2, watch_stream, Scope, StateHolder, StateSubscription};
use super::message::UserMessage;
use crate::repository::WatchlistRepository;
use crate::AppContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatchlistUiState {
    pub items: Vec<WatchlistEntry>,
    pub is_loading: bool,
    pub user_message: Option<UserMessage>,
}

fn build_state(
    message: &Option<UserMessage>,
    items: &Async<Vec<WatchlistEntry>>,
) -> WatchlistUiState {
    match items {
        Async::Loading => WatchlistUiState {
            is_loading: true,
            ..Default::default()
        },
        Async::Error(e) => WatchlistUiState {
            user_message: Some(*e),
            ..Default::default()
        },
        Async::Success(items) => WatchlistUiState {
            items: items.clone(),
            is_loading: false,
            user_message: *message,
        },
    }
}

pub struct WatchlistViewModel<C> {
    watchlist: WatchlistRepository<C>,
    user_message: Arc<watch::Sender<Option<UserMessage>>>,
    ui_state: StateHolder<WatchlistUiState>,
    scope: Scope,
}

impl<C: MovieCatalog + 'static> WatchlistViewModel<C> {
    pub fn new(ctx: &AppContext<C>) -> Self {
        Self::with_repository(ctx.watchlist())
    }

    pub fn with_repository(watchlist: WatchlistRepository<C>) -> Self {
        let (user_message, message_rx) = watch::channel(None);

        let upstream = {
            let watchlist = watchlist.clone();
            move || {
                let items = async_stream(
                    watchlist.entries_stream(),
                    UserMessage::LoadingWatchlistError,
                    "watchlist",
                    Async::Success,
                );
                combine2(watch_stream(message_rx.clone()), items, build_state)
            }
        };
        let initial = WatchlistUiState {
            is_loading: true,
            ..Default::default()
        };

        Self {
            watchlist,
            user_message: Arc::new(user_message),
            ui_state: StateHolder::new(initial, upstream),
            scope: Scope::new(),
        }
    }

    pub fn ui_state(&self) -> StateSubscription<WatchlistUiState> {
        self.ui_state.subscribe()
    }

    pub fn current_state(&self) -> WatchlistUiState {
        self.ui_state.value()
    }

    pub fn remove(&self, movie_id: i64) -> JoinHandle<()> {
        let watchlist = self.watchlist.clone();
        let user_message = Arc::clone(&self.user_message);

        self.scope.launch(async move {
            if let Err(e) = watchlist.remove_entry(movie_id).await {
                tracing::warn!(movie_id, "Failed to remove watchlist entry: {e}");
                user_message.send_replace(Some(UserMessage::WatchlistUpdateFailed));
            }
        })
    }

    pub fn snackbar_message_shown(&self) {
        self.user_message.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    #[tokio::test]
    async fn test_items_follow_repository() {
        let ctx = test_context();
        let vm = WatchlistViewModel::new(&ctx);
        let mut state = vm.ui_state();

        let s = state.wait_for(|s| !s.is_loading).await.unwrap();
        assert!(s.items.is_empty());

        ctx.watchlist().create_entry(496243).await.unwrap();
        let s = state.wait_for(|s| s.items.len() == 1).await.unwrap();
        assert_eq!(s.items[0].movie.title, "Parasite");

        vm.remove(496243).await.unwrap();
        state.wait_for(|s| s.items.is_empty()).await.unwrap();
    }

    #[tokio::test]
    async fn test_state_kept_after_unsubscribe() {
        let ctx = test_context();
        ctx.watchlist().create_entry(313369).await.unwrap();

        let vm = WatchlistViewModel::new(&ctx);
        let mut state = vm.ui_state();
        state.wait_for(|s| s.items.len() == 1).await.unwrap();
        drop(state);

        assert_eq!(vm.current_state().items.len(), 1);
        assert!(!vm.ui_state.is_collecting());
    }
}
