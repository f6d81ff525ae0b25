use thiserror::Error;

#[derive(Debug, Error)]
pub enum DionysusError {
    #[error("movie {0} not found")]
    MovieNotFound(i64),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database actor closed")]
    ActorClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when turning an error into a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested movie has no row locally or in the catalog.
    NotFound,
    /// Network, store or configuration failure. Nothing is retried.
    Transient,
    /// The caller passed a value the operation cannot accept.
    InvalidArgument,
}

impl DionysusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MovieNotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Storage(_)
            | Self::Catalog(_)
            | Self::Config(_)
            | Self::ActorClosed
            | Self::Io(_) => ErrorKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DionysusError::MovieNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            DionysusError::Catalog("timeout".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(DionysusError::ActorClosed.kind(), ErrorKind::Transient);
        assert_eq!(
            DionysusError::InvalidArgument("missing date".into()).kind(),
            ErrorKind::InvalidArgument
        );
    }
}
