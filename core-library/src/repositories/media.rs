//! Media repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{MediaFormat, MediaId, MediaRecord, MediaStatus};
use crate::repositories::{SortOrder, MAX_BIND_IDS};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

/// Secondary indexes on the media table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaIndex {
    /// `updated_at >= value`
    UpdatedSince(i64),
    Format(MediaFormat),
    Status(MediaStatus),
}

/// Media repository interface
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert or replace one record
    ///
    /// # Errors
    /// `LibraryError::InvalidInput` if the record has no `updated_at`.
    async fn put(&self, record: &MediaRecord) -> Result<()>;

    /// Insert or replace many records in one transaction
    ///
    /// Every record is validated before anything is written.
    async fn bulk_put(&self, records: &[MediaRecord]) -> Result<()>;

    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>>;

    /// Look up many ids at once
    ///
    /// The result is position-aligned with `ids`; missing ids are `None`.
    async fn bulk_get(&self, ids: &[MediaId]) -> Result<Vec<Option<MediaRecord>>>;

    async fn query_by_index(
        &self,
        index: MediaIndex,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<MediaRecord>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MediaRepository
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validated(record: &MediaRecord) -> Result<(i64, String)> {
    let updated_at = record
        .validate()
        .map_err(|message| LibraryError::InvalidInput {
            field: "updated_at".to_string(),
            message,
        })?;
    let data = serde_json::to_string(record)?;
    Ok((updated_at, data))
}

const UPSERT_MEDIA: &str = r#"
    INSERT INTO media (id, updated_at, format, status, data)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        updated_at = excluded.updated_at,
        format = excluded.format,
        status = excluded.status,
        data = excluded.data
"#;

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn put(&self, record: &MediaRecord) -> Result<()> {
        let (updated_at, data) = validated(record)?;

        sqlx::query(UPSERT_MEDIA)
            .bind(record.id.0)
            .bind(updated_at)
            .bind(record.format.map(|f| f.as_str()))
            .bind(record.status.map(|s| s.as_str()))
            .bind(data)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn bulk_put(&self, records: &[MediaRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let prepared = records
            .iter()
            .map(|record| validated(record).map(|(updated_at, data)| (record, updated_at, data)))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for (record, updated_at, data) in prepared {
            sqlx::query(UPSERT_MEDIA)
                .bind(record.id.0)
                .bind(updated_at)
                .bind(record.format.map(|f| f.as_str()))
                .bind(record.status.map(|s| s.as_str()))
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "Upserted media records");
        Ok(())
    }

    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM media WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(LibraryError::from))
            .transpose()
    }

    async fn bulk_get(&self, ids: &[MediaId]) -> Result<Vec<Option<MediaRecord>>> {
        let mut found: HashMap<MediaId, MediaRecord> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT data FROM media WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.0);
            }
            separated.push_unseparated(")");

            let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&self.pool).await?;
            for (data,) in rows {
                let record: MediaRecord = serde_json::from_str(&data)?;
                found.insert(record.id, record);
            }
        }

        Ok(ids.iter().map(|id| found.get(id).cloned()).collect())
    }

    async fn query_by_index(
        &self,
        index: MediaIndex,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<MediaRecord>> {
        let direction = order.as_sql();
        let sql = match index {
            MediaIndex::UpdatedSince(_) => format!(
                "SELECT data FROM media WHERE updated_at >= ? ORDER BY updated_at {direction}, id {direction} LIMIT ?"
            ),
            MediaIndex::Format(_) => format!(
                "SELECT data FROM media WHERE format = ? ORDER BY id {direction} LIMIT ?"
            ),
            MediaIndex::Status(_) => format!(
                "SELECT data FROM media WHERE status = ? ORDER BY id {direction} LIMIT ?"
            ),
        };

        let query = sqlx::query_as::<_, (String,)>(&sql);
        let query = match index {
            MediaIndex::UpdatedSince(since) => query.bind(since),
            MediaIndex::Format(format) => query.bind(format.as_str()),
            MediaIndex::Status(status) => query.bind(status.as_str()),
        };

        let rows = query.bind(i64::from(limit)).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_str(&data).map_err(LibraryError::from))
            .collect()
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::MediaTitle;

    fn media(id: i64, updated_at: i64) -> MediaRecord {
        let mut record = MediaRecord::new(
            MediaId(id),
            updated_at,
            MediaTitle {
                romaji: Some(format!("Title {}", id)),
                ..Default::default()
            },
        );
        record.format = Some(MediaFormat::Tv);
        record.status = Some(MediaStatus::Releasing);
        record
    }

    async fn setup() -> SqliteMediaRepository {
        SqliteMediaRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let repo = setup().await;
        let record = media(1, 100);

        repo.put(&record).await.unwrap();

        assert_eq!(repo.get(MediaId(1)).await.unwrap(), Some(record));
        assert_eq!(repo.get(MediaId(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_rejects_missing_updated_at() {
        let repo = setup().await;
        let mut record = media(1, 100);
        record.updated_at = None;

        let result = repo.put(&record).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_put_is_all_or_nothing() {
        let repo = setup().await;
        let mut bad = media(3, 100);
        bad.updated_at = None;

        let result = repo.bulk_put(&[media(1, 100), media(2, 100), bad]).await;

        assert!(result.is_err());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_accepts_older_updated_at() {
        // Freshness gating happens upstream; storage overwrites unconditionally.
        let repo = setup().await;
        repo.put(&media(1, 100)).await.unwrap();
        repo.put(&media(1, 50)).await.unwrap();

        let stored = repo.get(MediaId(1)).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, Some(50));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_get_preserves_order() {
        let repo = setup().await;
        repo.bulk_put(&[media(1, 10), media(2, 20), media(3, 30)])
            .await
            .unwrap();

        let result = repo
            .bulk_get(&[MediaId(3), MediaId(99), MediaId(1), MediaId(3)])
            .await
            .unwrap();

        let ids: Vec<Option<MediaId>> = result.iter().map(|r| r.as_ref().map(|m| m.id)).collect();
        assert_eq!(
            ids,
            vec![Some(MediaId(3)), None, Some(MediaId(1)), Some(MediaId(3))]
        );
    }

    #[tokio::test]
    async fn test_query_by_index() {
        let repo = setup().await;
        let mut movie = media(4, 40);
        movie.format = Some(MediaFormat::Movie);
        repo.bulk_put(&[media(1, 10), media(2, 20), media(3, 30), movie])
            .await
            .unwrap();

        let recent = repo
            .query_by_index(MediaIndex::UpdatedSince(20), 2, SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(
            recent.iter().map(|m| m.id.0).collect::<Vec<_>>(),
            vec![4, 3]
        );

        let movies = repo
            .query_by_index(MediaIndex::Format(MediaFormat::Movie), 10, SortOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, MediaId(4));

        let releasing = repo
            .query_by_index(
                MediaIndex::Status(MediaStatus::Releasing),
                10,
                SortOrder::Ascending,
            )
            .await
            .unwrap();
        assert_eq!(releasing.len(), 4);
    }
}
