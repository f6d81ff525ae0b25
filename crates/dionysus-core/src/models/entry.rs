use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Movie;

/// A movie the user intends to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub movie_id: i64,
    /// Snapshot of the movie row at read time.
    pub movie: Movie,
    pub added_at: DateTime<Utc>,
}

/// A record of having watched a movie on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: i64,
    pub movie_id: i64,
    pub movie: Movie,
    pub watched_on: NaiveDate,
}
