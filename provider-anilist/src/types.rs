//! AniList API response types
//!
//! These mirror the GraphQL schema as delivered: nearly every field and list
//! element may be `null`. They are normalized into `core_library` records as
//! soon as they enter the engine and go no further.

use core_library::models::{
    MediaFormat, MediaListStatus, MediaSeason, MediaStatus, PartialDate, UserTitleLanguage,
};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use tracing::warn;

/// Decode an enum leniently: an unknown value is logged and becomes `None`
fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, "Ignoring unknown enum value from AniList");
            None
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

impl From<FuzzyDate> for PartialDate {
    fn from(date: FuzzyDate) -> Self {
        PartialDate::new(date.year, date.month, date.day)
    }
}

// =============================================================================
// Viewer
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerData {
    #[serde(rename = "Viewer")]
    pub viewer: Option<ViewerProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerProfile {
    pub id: i64,
    pub name: String,
    pub avatar: Option<UserAvatar>,
    pub options: Option<UserOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAvatar {
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOptions {
    #[serde(default, deserialize_with = "lenient_enum")]
    pub title_language: Option<UserTitleLanguage>,
}

// =============================================================================
// List Collection
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ListCollectionData {
    #[serde(rename = "Viewer")]
    pub viewer: Option<ViewerId>,
    #[serde(rename = "MediaListCollection")]
    pub collection: Option<MediaListCollection>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewerId {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListCollection {
    pub has_next_chunk: Option<bool>,
    pub lists: Option<Vec<Option<MediaListGroup>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaListGroup {
    pub name: Option<String>,
    pub entries: Option<Vec<Option<MediaListEntry>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListEntry {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub status: Option<MediaListStatus>,
    pub media: Option<MediaRef>,
    pub progress: Option<i32>,
    pub repeat: Option<i32>,
    pub priority: Option<i32>,
    pub private: Option<bool>,
    pub hidden_from_status_lists: Option<bool>,
    pub started_at: Option<FuzzyDate>,
    pub completed_at: Option<FuzzyDate>,
    pub updated_at: Option<i64>,
}

/// The slice of a media node carried on each list entry
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub id: i64,
    pub updated_at: Option<i64>,
}

// =============================================================================
// Bulk Media
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPageData {
    #[serde(rename = "Page")]
    pub page: Option<MediaPage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub page_info: Option<PageInfo>,
    pub media: Option<Vec<Option<RemoteMedia>>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedia {
    pub id: i64,
    pub updated_at: Option<i64>,
    pub site_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub format: Option<MediaFormat>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub status: Option<MediaStatus>,
    pub title: Option<RemoteTitle>,
    pub synonyms: Option<Vec<Option<String>>>,
    pub description: Option<String>,
    pub cover_image: Option<RemoteCoverImage>,
    pub banner_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub season: Option<MediaSeason>,
    pub season_year: Option<i32>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub episodes: Option<i32>,
    pub duration: Option<i32>,
    pub hashtag: Option<String>,
    pub next_airing_episode: Option<RemoteAiringEpisode>,
    pub genres: Option<Vec<Option<String>>>,
    pub average_score: Option<i32>,
    pub mean_score: Option<i32>,
    pub popularity: Option<i32>,
    pub trending: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCoverImage {
    pub color: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAiringEpisode {
    pub id: i64,
    pub airing_at: i64,
    pub time_until_airing: i64,
    pub episode: i32,
}

// =============================================================================
// Change Check
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LastUpdatedData {
    #[serde(rename = "MediaList")]
    pub media_list: Option<LastUpdatedEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdatedEntry {
    pub id: i64,
    pub updated_at: Option<i64>,
}
