use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dionysus_api::MovieCatalog;
use dionysus_core::models::DiaryEntry;

use super::async_state::{async_stream, Async};
use super::flow::{combine2, watch_stream, Scope, StateHolder, StateSubscription};
use super::message::UserMessage;
use crate::repository::DiaryRepository;
use crate::AppContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiaryUiState {
    pub entries: Vec<DiaryEntry>,
    pub is_loading: bool,
    pub user_message: Option<UserMessage>,
}

fn build_state(message: &Option<UserMessage>, entries: &Async<Vec<DiaryEntry>>) -> DiaryUiState {
    match entries {
        Async::Loading => DiaryUiState {
            is_loading: true,
            ..Default::default()
        },
        Async::Error(e) => DiaryUiState {
            user_message: Some(*e),
            ..Default::default()
        },
        Async::Success(entries) => DiaryUiState {
            entries: entries.clone(),
            is_loading: false,
            user_message: *message,
        },
    }
}

pub struct DiaryViewModel<C> {
    diary: DiaryRepository<C>,
    user_message: Arc<watch::Sender<Option<UserMessage>>>,
    ui_state: StateHolder<DiaryUiState>,
    scope: Scope,
}

impl<C: MovieCatalog + 'static> DiaryViewModel<C> {
    pub fn new(ctx: &AppContext<C>) -> Self {
        Self::with_repository(ctx.diary())
    }

    pub fn with_repository(diary: DiaryRepository<C>) -> Self {
        let (user_message, message_rx) = watch::channel(None);

        let upstream = {
            let diary = diary.clone();
            move || {
                let entries = async_stream(
                    diary.entries_stream(),
                    UserMessage::LoadingDiaryError,
                    "diary",
                    Async::Success,
                );
                combine2(watch_stream(message_rx.clone()), entries, build_state)
            }
        };
        let initial = DiaryUiState {
            is_loading: true,
            ..Default::default()
        };

        Self {
            diary,
            user_message: Arc::new(user_message),
            ui_state: StateHolder::new(initial, upstream),
            scope: Scope::new(),
        }
    }

    pub fn ui_state(&self) -> StateSubscription<DiaryUiState> {
        self.ui_state.subscribe()
    }

    pub fn current_state(&self) -> DiaryUiState {
        self.ui_state.value()
    }

    pub fn remove(&self, entry_id: i64) -> JoinHandle<()> {
        let diary = self.diary.clone();
        let user_message = Arc::clone(&self.user_message);

        self.scope.launch(async move {
            if let Err(e) = diary.remove_entry(entry_id).await {
                tracing::warn!(entry_id, "Failed to remove diary entry: {e}");
                user_message.send_replace(Some(UserMessage::DiaryUpdateFailed));
            }
        })
    }

    pub fn snackbar_message_shown(&self) {
        self.user_message.send_replace(None);
    }
}
