//! Consumption repository trait and implementation
//!
//! Every operation takes the owning `LoginId`. Two logins' lists never share
//! rows, even when both track the same media.

use crate::error::{LibraryError, Result};
use crate::models::{ConsumptionRecord, EntryId, LoginId, MediaId, MediaListStatus, PartialDate};
use crate::repositories::SortOrder;
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// Entries shown on the "currently watching" view by default
pub const DEFAULT_CURRENT_LIMIT: u32 = 20;

/// Secondary indexes on the consumption table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionIndex {
    MediaId(MediaId),
    Status(MediaListStatus),
    /// `updated_at >= value`
    UpdatedSince(i64),
}

/// Consumption repository interface
#[async_trait]
pub trait ConsumptionRepository: Send + Sync {
    async fn put(&self, login: LoginId, record: &ConsumptionRecord) -> Result<()>;

    /// Upsert many entries in one transaction
    async fn bulk_put(&self, login: LoginId, records: &[ConsumptionRecord]) -> Result<()>;

    async fn get(&self, login: LoginId, id: EntryId) -> Result<Option<ConsumptionRecord>>;

    /// Entries matching `index`, ordered by `updated_at` then entry id
    async fn query_by_index(
        &self,
        login: LoginId,
        index: ConsumptionIndex,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<ConsumptionRecord>>;

    /// `CURRENT` entries, most recently updated first
    async fn current_consumption(
        &self,
        login: LoginId,
        limit: u32,
    ) -> Result<Vec<ConsumptionRecord>>;

    /// Newest `updated_at` across the login's entries
    async fn max_updated_at(&self, login: LoginId) -> Result<Option<i64>>;

    async fn count(&self, login: LoginId) -> Result<i64>;
}

/// SQLite implementation of ConsumptionRepository
pub struct SqliteConsumptionRepository {
    pool: SqlitePool,
}

impl SqliteConsumptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConsumptionRow {
    id: i64,
    media_id: i64,
    status: Option<String>,
    progress: Option<i32>,
    repeat: Option<i32>,
    priority: Option<i32>,
    private: Option<bool>,
    hidden_from_status_lists: Option<bool>,
    started_year: Option<i32>,
    started_month: Option<i32>,
    started_day: Option<i32>,
    completed_year: Option<i32>,
    completed_month: Option<i32>,
    completed_day: Option<i32>,
    updated_at: i64,
}

fn date_from_columns(
    year: Option<i32>,
    month: Option<i32>,
    day: Option<i32>,
) -> Option<PartialDate> {
    let date = PartialDate::new(year, month, day);
    (!date.is_empty()).then_some(date)
}

impl TryFrom<ConsumptionRow> for ConsumptionRecord {
    type Error = LibraryError;

    fn try_from(row: ConsumptionRow) -> Result<Self> {
        let status = row
            .status
            .map(|value| value.parse::<MediaListStatus>())
            .transpose()
            .map_err(|e| LibraryError::InvalidInput {
                field: "status".to_string(),
                message: e.to_string(),
            })?;

        Ok(ConsumptionRecord {
            id: EntryId(row.id),
            media_id: MediaId(row.media_id),
            status,
            progress: row.progress,
            repeat: row.repeat,
            priority: row.priority,
            private: row.private,
            hidden_from_status_lists: row.hidden_from_status_lists,
            started_at: date_from_columns(row.started_year, row.started_month, row.started_day),
            completed_at: date_from_columns(
                row.completed_year,
                row.completed_month,
                row.completed_day,
            ),
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, media_id, status, progress, repeat, priority, private,
           hidden_from_status_lists, started_year, started_month, started_day,
           completed_year, completed_month, completed_day, updated_at
    FROM consumption
"#;

const UPSERT_CONSUMPTION: &str = r#"
    INSERT INTO consumption (
        login_id, id, media_id, status, progress, repeat, priority, private,
        hidden_from_status_lists, started_year, started_month, started_day,
        completed_year, completed_month, completed_day, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(login_id, id) DO UPDATE SET
        media_id = excluded.media_id,
        status = excluded.status,
        progress = excluded.progress,
        repeat = excluded.repeat,
        priority = excluded.priority,
        private = excluded.private,
        hidden_from_status_lists = excluded.hidden_from_status_lists,
        started_year = excluded.started_year,
        started_month = excluded.started_month,
        started_day = excluded.started_day,
        completed_year = excluded.completed_year,
        completed_month = excluded.completed_month,
        completed_day = excluded.completed_day,
        updated_at = excluded.updated_at
"#;

fn upsert_query(
    login: LoginId,
    record: &ConsumptionRecord,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    let started = record.started_at.unwrap_or_default();
    let completed = record.completed_at.unwrap_or_default();

    sqlx::query(UPSERT_CONSUMPTION)
        .bind(login.0)
        .bind(record.id.0)
        .bind(record.media_id.0)
        .bind(record.status.map(|s| s.as_str()))
        .bind(record.progress)
        .bind(record.repeat)
        .bind(record.priority)
        .bind(record.private)
        .bind(record.hidden_from_status_lists)
        .bind(started.year)
        .bind(started.month)
        .bind(started.day)
        .bind(completed.year)
        .bind(completed.month)
        .bind(completed.day)
        .bind(record.updated_at)
}

fn into_records(rows: Vec<ConsumptionRow>) -> Result<Vec<ConsumptionRecord>> {
    rows.into_iter().map(ConsumptionRecord::try_from).collect()
}

#[async_trait]
impl ConsumptionRepository for SqliteConsumptionRepository {
    async fn put(&self, login: LoginId, record: &ConsumptionRecord) -> Result<()> {
        upsert_query(login, record).execute(&self.pool).await?;
        Ok(())
    }

    async fn bulk_put(&self, login: LoginId, records: &[ConsumptionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            upsert_query(login, record).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(login_id = %login, count = records.len(), "Upserted consumption entries");
        Ok(())
    }

    async fn get(&self, login: LoginId, id: EntryId) -> Result<Option<ConsumptionRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE login_id = ? AND id = ?");
        let row = sqlx::query_as::<_, ConsumptionRow>(&sql)
            .bind(login.0)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ConsumptionRecord::try_from).transpose()
    }

    async fn query_by_index(
        &self,
        login: LoginId,
        index: ConsumptionIndex,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<ConsumptionRecord>> {
        let filter = match index {
            ConsumptionIndex::MediaId(_) => "media_id = ?",
            ConsumptionIndex::Status(_) => "status = ?",
            ConsumptionIndex::UpdatedSince(_) => "updated_at >= ?",
        };
        let direction = order.as_sql();
        let sql = format!(
            "{SELECT_COLUMNS} WHERE login_id = ? AND {filter} ORDER BY updated_at {direction}, id {direction} LIMIT ?"
        );

        let query = sqlx::query_as::<_, ConsumptionRow>(&sql).bind(login.0);
        let query = match index {
            ConsumptionIndex::MediaId(media_id) => query.bind(media_id.0),
            ConsumptionIndex::Status(status) => query.bind(status.as_str()),
            ConsumptionIndex::UpdatedSince(since) => query.bind(since),
        };

        let rows = query.bind(i64::from(limit)).fetch_all(&self.pool).await?;
        into_records(rows)
    }

    async fn current_consumption(
        &self,
        login: LoginId,
        limit: u32,
    ) -> Result<Vec<ConsumptionRecord>> {
        self.query_by_index(
            login,
            ConsumptionIndex::Status(MediaListStatus::Current),
            limit,
            SortOrder::Descending,
        )
        .await
    }

    async fn max_updated_at(&self, login: LoginId) -> Result<Option<i64>> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(updated_at) FROM consumption WHERE login_id = ?")
                .bind(login.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn count(&self, login: LoginId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM consumption WHERE login_id = ?")
                .bind(login.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    const ALICE: LoginId = LoginId(1);
    const BOB: LoginId = LoginId(2);

    fn entry(id: i64, media_id: i64, status: MediaListStatus, updated_at: i64) -> ConsumptionRecord {
        ConsumptionRecord {
            id: EntryId(id),
            media_id: MediaId(media_id),
            status: Some(status),
            progress: Some(3),
            repeat: Some(0),
            priority: Some(0),
            private: Some(false),
            hidden_from_status_lists: Some(false),
            started_at: Some(PartialDate::new(Some(2024), None, None)),
            completed_at: None,
            updated_at,
        }
    }

    async fn setup() -> SqliteConsumptionRepository {
        SqliteConsumptionRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_put_and_get_round_trips_partial_dates() {
        let repo = setup().await;
        let record = entry(10, 100, MediaListStatus::Current, 1_700_000_000);

        repo.put(ALICE, &record).await.unwrap();

        let stored = repo.get(ALICE, EntryId(10)).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(
            stored.started_at,
            Some(PartialDate::new(Some(2024), None, None))
        );
        assert_eq!(stored.completed_at, None);
    }

    #[tokio::test]
    async fn test_logins_are_isolated() {
        let repo = setup().await;
        repo.put(ALICE, &entry(10, 100, MediaListStatus::Current, 5))
            .await
            .unwrap();

        assert!(repo.get(BOB, EntryId(10)).await.unwrap().is_none());
        assert_eq!(repo.count(ALICE).await.unwrap(), 1);
        assert_eq!(repo.count(BOB).await.unwrap(), 0);
        assert_eq!(repo.max_updated_at(BOB).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bulk_put_upserts() {
        let repo = setup().await;
        repo.bulk_put(
            ALICE,
            &[
                entry(1, 100, MediaListStatus::Current, 10),
                entry(2, 200, MediaListStatus::Planning, 20),
            ],
        )
        .await
        .unwrap();

        let mut changed = entry(1, 100, MediaListStatus::Completed, 30);
        changed.progress = Some(12);
        repo.bulk_put(ALICE, &[changed.clone()]).await.unwrap();

        assert_eq!(repo.count(ALICE).await.unwrap(), 2);
        assert_eq!(repo.get(ALICE, EntryId(1)).await.unwrap(), Some(changed));
        assert_eq!(repo.max_updated_at(ALICE).await.unwrap(), Some(30));
    }

    #[tokio::test]
    async fn test_current_consumption_orders_by_updated_at() {
        let repo = setup().await;
        repo.bulk_put(
            ALICE,
            &[
                entry(1, 100, MediaListStatus::Current, 10),
                entry(2, 200, MediaListStatus::Current, 30),
                entry(3, 300, MediaListStatus::Planning, 40),
                entry(4, 400, MediaListStatus::Current, 20),
            ],
        )
        .await
        .unwrap();

        let current = repo
            .current_consumption(ALICE, DEFAULT_CURRENT_LIMIT)
            .await
            .unwrap();
        let ids: Vec<i64> = current.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 4, 1]);

        let limited = repo.current_consumption(ALICE, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_query_by_media_id() {
        let repo = setup().await;
        repo.bulk_put(
            ALICE,
            &[
                entry(1, 100, MediaListStatus::Current, 10),
                entry(2, 200, MediaListStatus::Current, 30),
            ],
        )
        .await
        .unwrap();

        let found = repo
            .query_by_index(
                ALICE,
                ConsumptionIndex::MediaId(MediaId(200)),
                10,
                SortOrder::Ascending,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, EntryId(2));

        let since = repo
            .query_by_index(ALICE, ConsumptionIndex::UpdatedSince(20), 10, SortOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(since.len(), 1);
    }
}
