//! Fetch gating
//!
//! Storage accepts any upsert, older or not. Callers that refresh media on
//! their own decide what is worth fetching here: only ids whose remote
//! `updatedAt` is ahead of the local copy.

use crate::Result;
use core_library::models::MediaId;
use core_library::repositories::MediaRepository;

/// Keep the `(id, remote updatedAt)` pairs whose local copy is missing or older
pub async fn select_stale(
    pairs: &[(MediaId, i64)],
    media: &dyn MediaRepository,
) -> Result<Vec<(MediaId, i64)>> {
    let ids: Vec<MediaId> = pairs.iter().map(|(id, _)| *id).collect();
    let local = media.bulk_get(&ids).await?;

    Ok(pairs
        .iter()
        .zip(local)
        .filter(|((_, remote_updated_at), local)| {
            local
                .as_ref()
                .and_then(|record| record.updated_at)
                .map_or(true, |local_updated_at| local_updated_at < *remote_updated_at)
        })
        .map(|(pair, _)| *pair)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::db::create_test_pool;
    use core_library::models::{MediaRecord, MediaTitle};
    use core_library::repositories::SqliteMediaRepository;

    #[tokio::test]
    async fn test_only_missing_or_older_records_are_stale() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteMediaRepository::new(pool);
        let title = MediaTitle {
            romaji: Some("x".to_string()),
            ..Default::default()
        };
        repo.bulk_put(&[
            MediaRecord::new(MediaId(1), 100, title.clone()),
            MediaRecord::new(MediaId(2), 100, title.clone()),
            MediaRecord::new(MediaId(3), 100, title),
        ])
        .await
        .unwrap();

        let stale = select_stale(
            &[
                (MediaId(1), 50),
                (MediaId(2), 100),
                (MediaId(3), 150),
                (MediaId(4), 1),
            ],
            &repo,
        )
        .await
        .unwrap();

        assert_eq!(stale, vec![(MediaId(3), 150), (MediaId(4), 1)]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteMediaRepository::new(pool);
        assert!(select_stale(&[], &repo).await.unwrap().is_empty());
    }
}
