//! Fixed GraphQL documents
//!
//! The engine never builds queries dynamically. Each document here pairs with
//! a response type in [`crate::types`].

use serde_json::{json, Value};

/// Signed-in user's profile
pub const VIEWER_QUERY: &str = r#"
query Viewer {
  Viewer {
    id
    name
    avatar { medium }
    options { titleLanguage }
  }
}
"#;

/// The whole anime list of a user in one response
///
/// `forceSingleCompletedList` folds per-format completed lists into one so
/// the collection is small enough to arrive unchunked.
pub const LIST_COLLECTION_QUERY: &str = r#"
query ListCollection($userId: Int!) {
  Viewer { id }
  MediaListCollection(userId: $userId, type: ANIME, forceSingleCompletedList: true) {
    hasNextChunk
    lists {
      name
      entries {
        id
        status
        media { id updatedAt }
        progress
        repeat
        priority
        private
        hiddenFromStatusLists
        startedAt { year month day }
        completedAt { year month day }
        updatedAt
      }
    }
  }
}
"#;

/// Full display data for a set of media ids
pub const MEDIA_PAGE_QUERY: &str = r#"
query MediaPage($ids: [Int], $perPage: Int) {
  Page(page: 0, perPage: $perPage) {
    pageInfo { hasNextPage }
    media(id_in: $ids) {
      id
      updatedAt
      siteUrl
      format
      status
      title { romaji english native }
      synonyms
      description
      coverImage { color medium large }
      bannerImage
      season
      seasonYear
      startDate { year month day }
      endDate { year month day }
      episodes
      duration
      hashtag
      nextAiringEpisode { id airingAt timeUntilAiring episode }
      genres
      averageScore
      meanScore
      popularity
      trending
    }
  }
}
"#;

/// Most recently updated entry on a user's list
pub const LAST_UPDATED_ENTRY_QUERY: &str = r#"
query LastUpdatedEntry($userId: Int!) {
  MediaList(userId: $userId, type: ANIME, sort: [UPDATED_TIME_DESC]) {
    id
    updatedAt
  }
}
"#;

pub fn user_variables(user_id: i64) -> Value {
    json!({ "userId": user_id })
}

/// `perPage` is twice the id count so a full page never paginates
pub fn media_page_variables(ids: &[i64]) -> Value {
    json!({ "ids": ids, "perPage": ids.len() * 2 })
}
