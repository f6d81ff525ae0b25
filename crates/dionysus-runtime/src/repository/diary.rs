use std::sync::Arc;

use chrono::NaiveDate;

use dionysus_api::MovieCatalog;
use dionysus_core::error::DionysusError;
use dionysus_core::models::DiaryEntry;

use super::materialize_movie;
use crate::db::DbHandle;
use crate::live::QueryStream;

pub struct DiaryRepository<C> {
    db: DbHandle,
    catalog: Arc<C>,
}

impl<C> Clone for DiaryRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<C: MovieCatalog> DiaryRepository<C> {
    pub fn new(db: DbHandle, catalog: Arc<C>) -> Self {
        Self { db, catalog }
    }

    /// Diary entries, most recent watch date first.
    pub fn entries_stream(&self) -> QueryStream<Vec<DiaryEntry>> {
        self.db.diary_stream()
    }

    /// Log a watch of `movie_id` on `watched_on`. Returns the new entry's ID.
    pub async fn create_entry(
        &self,
        movie_id: i64,
        watched_on: NaiveDate,
    ) -> Result<i64, DionysusError> {
        materialize_movie(&self.db, self.catalog.as_ref(), movie_id).await?;

        let id = self.db.insert_diary_entry(movie_id, watched_on).await?;
        tracing::info!(movie_id, entry_id = id, %watched_on, "Logged diary entry");
        Ok(id)
    }

    pub async fn remove_entry(&self, entry_id: i64) -> Result<(), DionysusError> {
        if !self.db.delete_diary_entry(entry_id).await? {
            tracing::debug!(entry_id, "Diary entry already gone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::testing::test_context;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_entries_most_recent_first() {
        let ctx = test_context();
        let repo = ctx.diary();
        let mut entries = repo.entries_stream();
        assert!(entries.next().await.unwrap().unwrap().is_empty());

        repo.create_entry(496243, date(2024, 1, 5)).await.unwrap();
        entries.next().await.unwrap().unwrap();
        repo.create_entry(313369, date(2024, 2, 14)).await.unwrap();

        let list = entries.next().await.unwrap().unwrap();
        let titles: Vec<&str> = list.iter().map(|e| e.movie.title.as_str()).collect();
        assert_eq!(titles, vec!["La La Land", "Parasite"]);
        assert_eq!(list[0].watched_on, date(2024, 2, 14));
    }

    #[tokio::test]
    async fn test_rewatch_logs_second_entry() {
        let ctx = test_context();
        let repo = ctx.diary();
        let first = repo.create_entry(496243, date(2023, 6, 1)).await.unwrap();
        let second = repo.create_entry(496243, date(2023, 6, 1)).await.unwrap();
        assert_ne!(first, second);

        let list = repo.entries_stream().next().await.unwrap().unwrap();
        // Same day: the later entry comes first.
        assert_eq!(list.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second, first]);
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let ctx = test_context();
        let repo = ctx.diary();
        let id = repo.create_entry(313369, date(2024, 2, 14)).await.unwrap();
        let mut entries = repo.entries_stream();
        assert_eq!(entries.next().await.unwrap().unwrap().len(), 1);

        repo.remove_entry(id).await.unwrap();
        assert!(entries.next().await.unwrap().unwrap().is_empty());

        // Removing again is not an error and does not touch the movie row.
        repo.remove_entry(id).await.unwrap();
        assert!(ctx.db().get_movie(313369).await.unwrap().is_some());
    }
}
