//! Remote → local record mapping
//!
//! Wire types are full of optional fields; records handed to storage are not.
//! Everything that cannot be normalized is either skipped with a warning (a
//! list entry whose media is null) or rejected outright.

use crate::{Result, SyncError};
use core_library::models::{
    AiringEpisode, ConsumptionRecord, CoverImage, EntryId, MediaId, MediaRecord, MediaTitle,
    PartialDate,
};
use provider_anilist::types::{FuzzyDate, MediaListEntry, RemoteMedia};
use tracing::warn;

fn partial_date(date: Option<FuzzyDate>) -> Option<PartialDate> {
    date.map(PartialDate::from).filter(|d| !d.is_empty())
}

fn without_nulls(values: Option<Vec<Option<String>>>) -> Vec<String> {
    values.unwrap_or_default().into_iter().flatten().collect()
}

/// Map one list entry, or `Ok(None)` when its media reference is null
///
/// # Errors
///
/// `SyncError::MissingUpdatedAt` when the entry or its media has no
/// `updatedAt`.
pub fn consumption_record(entry: MediaListEntry) -> Result<Option<ConsumptionRecord>> {
    let Some(media) = entry.media else {
        warn!(entry_id = entry.id, "Media is missing on list entry; skipping");
        return Ok(None);
    };

    let updated_at = entry.updated_at.ok_or(SyncError::MissingUpdatedAt {
        what: "List entry",
        id: entry.id,
    })?;
    if media.updated_at.is_none() {
        return Err(SyncError::MissingUpdatedAt {
            what: "Media",
            id: media.id,
        });
    }

    Ok(Some(ConsumptionRecord {
        id: EntryId(entry.id),
        media_id: MediaId(media.id),
        status: entry.status,
        progress: entry.progress,
        repeat: entry.repeat,
        priority: entry.priority,
        private: entry.private,
        hidden_from_status_lists: entry.hidden_from_status_lists,
        started_at: partial_date(entry.started_at),
        completed_at: partial_date(entry.completed_at),
        updated_at,
    }))
}

/// Map one media node
///
/// The node's own `updatedAt` is the only freshness marker accepted for the
/// stored record.
///
/// # Errors
///
/// `SyncError::MissingTitle` when the node has no title block, and
/// `SyncError::MissingUpdatedAt` when the node has no `updatedAt`.
pub fn media_record(media: RemoteMedia) -> Result<MediaRecord> {
    let title = media.title.ok_or(SyncError::MissingTitle {
        media_id: MediaId(media.id),
    })?;
    let updated_at = media.updated_at.ok_or(SyncError::MissingUpdatedAt {
        what: "Media",
        id: media.id,
    })?;

    Ok(MediaRecord {
        id: MediaId(media.id),
        updated_at: Some(updated_at),
        site_url: media.site_url,
        format: media.format,
        status: media.status,
        title: MediaTitle {
            romaji: title.romaji,
            english: title.english,
            native: title.native,
        },
        synonyms: without_nulls(media.synonyms),
        description: media.description,
        cover_image: media.cover_image.map(|cover| CoverImage {
            color: cover.color,
            medium: cover.medium,
            large: cover.large,
        }),
        banner_image: media.banner_image,
        season: media.season,
        season_year: media.season_year,
        start_date: partial_date(media.start_date),
        end_date: partial_date(media.end_date),
        episodes: media.episodes,
        duration: media.duration,
        hashtag: media.hashtag,
        next_airing_episode: media.next_airing_episode.map(|airing| AiringEpisode {
            id: airing.id,
            airing_at: airing.airing_at,
            time_until_airing: airing.time_until_airing,
            episode: airing.episode,
        }),
        genres: without_nulls(media.genres),
        average_score: media.average_score,
        mean_score: media.mean_score,
        popularity: media.popularity,
        trending: media.trending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::{MediaFormat, MediaListStatus};
    use serde_json::json;

    fn entry(value: serde_json::Value) -> MediaListEntry {
        serde_json::from_value(value).unwrap()
    }

    fn media(value: serde_json::Value) -> RemoteMedia {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_consumption_record_mapping() {
        let record = consumption_record(entry(json!({
            "id": 11,
            "status": "COMPLETED",
            "media": { "id": 99, "updatedAt": 500 },
            "progress": 12,
            "repeat": 1,
            "priority": 0,
            "private": false,
            "hiddenFromStatusLists": false,
            "startedAt": { "year": 2023, "month": 4, "day": null },
            "completedAt": { "year": null, "month": null, "day": null },
            "updatedAt": 600
        })))
        .unwrap()
        .unwrap();

        assert_eq!(record.id, EntryId(11));
        assert_eq!(record.media_id, MediaId(99));
        assert_eq!(record.status, Some(MediaListStatus::Completed));
        assert_eq!(record.started_at, Some(PartialDate::new(Some(2023), Some(4), None)));
        assert_eq!(record.completed_at, None);
        assert_eq!(record.updated_at, 600);
    }

    #[test]
    fn test_null_media_is_skipped() {
        let record = consumption_record(entry(json!({
            "id": 1, "media": null, "updatedAt": 5
        })))
        .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_missing_updated_at_is_rejected() {
        let err = consumption_record(entry(json!({
            "id": 1, "media": { "id": 2, "updatedAt": 3 }, "updatedAt": null
        })))
        .unwrap_err();
        assert!(matches!(err, SyncError::MissingUpdatedAt { id: 1, .. }));

        let err = consumption_record(entry(json!({
            "id": 1, "media": { "id": 2, "updatedAt": null }, "updatedAt": 4
        })))
        .unwrap_err();
        assert!(matches!(err, SyncError::MissingUpdatedAt { id: 2, .. }));
    }

    #[test]
    fn test_media_record_mapping() {
        let record = media_record(
            media(json!({
                "id": 7,
                "updatedAt": 900,
                "format": "TV",
                "title": { "romaji": "Romaji", "english": null, "native": "Native" },
                "synonyms": ["A", null, "B"],
                "genres": null,
                "coverImage": { "color": "#fff", "medium": "m.png", "large": null },
                "nextAiringEpisode": { "id": 1, "airingAt": 2, "timeUntilAiring": 3, "episode": 4 }
            })),
        )
        .unwrap();

        assert_eq!(record.id, MediaId(7));
        assert_eq!(record.updated_at, Some(900));
        assert_eq!(record.format, Some(MediaFormat::Tv));
        assert_eq!(record.synonyms, vec!["A".to_string(), "B".to_string()]);
        assert!(record.genres.is_empty());
        assert_eq!(record.next_airing_episode.unwrap().episode, 4);
        assert_eq!(record.title.native.as_deref(), Some("Native"));
    }

    #[test]
    fn test_media_without_title_is_rejected() {
        let err = media_record(media(json!({ "id": 3, "updatedAt": 1, "title": null }))).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingTitle {
                media_id: MediaId(3)
            }
        ));
    }

    #[test]
    fn test_media_without_updated_at_is_rejected() {
        let err = media_record(media(json!({
            "id": 3,
            "updatedAt": null,
            "title": { "romaji": "x", "english": null, "native": null }
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingUpdatedAt { what: "Media", id: 3 }
        ));
    }
}
