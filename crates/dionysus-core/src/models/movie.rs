use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A catalog title as shown in lists and grids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Catalog identifier, also the local primary key.
    pub id: i64,
    pub title: String,
    pub poster_url: Option<String>,
}

/// Everything stored locally about a movie, as shown on its detail screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub movie: Movie,
    pub backdrop_url: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Runtime in minutes. Only the detail endpoint reports it.
    pub runtime: Option<u32>,
}

impl MovieDetails {
    /// Details carrying nothing beyond the list-level fields.
    pub fn from_movie(movie: Movie) -> Self {
        Self {
            movie,
            backdrop_url: None,
            overview: None,
            release_date: None,
            runtime: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.movie.id
    }

    /// Release year, for "Title (2019)" style labels.
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.release_date.map(|d| d.year())
    }
}
