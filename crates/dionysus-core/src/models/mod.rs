mod entry;
mod movie;

pub use entry::{DiaryEntry, WatchlistEntry};
pub use movie::{Movie, MovieDetails};
