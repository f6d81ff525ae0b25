use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use dionysus_core::error::DionysusError;

use super::message::UserMessage;

/// A loading signal or the outcome of an async load.
#[derive(Debug, Clone, PartialEq)]
pub enum Async<T> {
    Loading,
    Error(UserMessage),
    Success(T),
}

impl<T> Async<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Map a store stream into [`Async`] values. Store errors are logged and
/// become `Error(on_error)`; the stream keeps going after them.
pub fn async_stream<T, U, S, F>(
    results: S,
    on_error: UserMessage,
    what: &'static str,
    mut handle: F,
) -> BoxStream<'static, Async<U>>
where
    S: Stream<Item = Result<T, DionysusError>> + Send + 'static,
    F: FnMut(T) -> Async<U> + Send + 'static,
    U: Send + 'static,
{
    results
        .map(move |result| match result {
            Ok(value) => handle(value),
            Err(e) => {
                tracing::error!("Issue getting {what}: {e}");
                Async::Error(on_error)
            }
        })
        .boxed()
}
