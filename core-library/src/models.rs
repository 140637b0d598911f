//! Domain models for the local replica
//!
//! Flat, non-null record shapes. Remote payloads are normalized into these
//! before they reach storage; nothing in here models the remote nesting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

remote_id!(
    /// Remote catalog id of a media item
    MediaId
);
remote_id!(
    /// Remote id of one entry on a user's list
    EntryId
);
remote_id!(
    /// Remote user id of a signed-in login
    LoginId
);

// =============================================================================
// Enumerations
// =============================================================================

/// Error returned when a stored or remote enum value is not recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Wire and storage representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// List bucket an entry is filed under
    MediaListStatus {
        Current => "CURRENT",
        Planning => "PLANNING",
        Completed => "COMPLETED",
        Dropped => "DROPPED",
        Paused => "PAUSED",
        Repeating => "REPEATING",
    }
);

wire_enum!(
    MediaFormat {
        Tv => "TV",
        TvShort => "TV_SHORT",
        Movie => "MOVIE",
        Special => "SPECIAL",
        Ova => "OVA",
        Ona => "ONA",
        Music => "MUSIC",
        Manga => "MANGA",
        Novel => "NOVEL",
        OneShot => "ONE_SHOT",
    }
);

wire_enum!(
    /// Release status of a media item
    MediaStatus {
        Finished => "FINISHED",
        Releasing => "RELEASING",
        NotYetReleased => "NOT_YET_RELEASED",
        Cancelled => "CANCELLED",
        Hiatus => "HIATUS",
    }
);

wire_enum!(
    MediaSeason {
        Winter => "WINTER",
        Spring => "SPRING",
        Summer => "SUMMER",
        Fall => "FALL",
    }
);

wire_enum!(
    /// A user's title language setting on the remote service
    UserTitleLanguage {
        Romaji => "ROMAJI",
        English => "ENGLISH",
        Native => "NATIVE",
        RomajiStylised => "ROMAJI_STYLISED",
        EnglishStylised => "ENGLISH_STYLISED",
        NativeStylised => "NATIVE_STYLISED",
    }
);

// =============================================================================
// Value Types
// =============================================================================

/// A calendar date where any component may be unknown
///
/// "Aired sometime in 2024" is `{ year: Some(2024), month: None, day: None }`.
/// Missing parts are never filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

impl PartialDate {
    pub fn new(year: Option<i32>, month: Option<i32>, day: Option<i32>) -> Self {
        Self { year, month, day }
    }

    /// All three components are unknown
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.year.is_some() && self.month.is_some() && self.day.is_some()
    }
}

/// Order in which title variants are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TitleLanguageOrder {
    EnglishFirst,
    /// Romaji, then English, then native. The remote site's own default.
    #[default]
    RomajiFirst,
    NativeFirst,
}

impl TitleLanguageOrder {
    pub fn from_preference(preference: Option<UserTitleLanguage>) -> Self {
        match preference {
            Some(UserTitleLanguage::English | UserTitleLanguage::EnglishStylised) => {
                Self::EnglishFirst
            }
            Some(UserTitleLanguage::Native | UserTitleLanguage::NativeStylised) => {
                Self::NativeFirst
            }
            Some(UserTitleLanguage::Romaji | UserTitleLanguage::RomajiStylised) | None => {
                Self::RomajiFirst
            }
        }
    }
}

/// Title variants of a media item
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl MediaTitle {
    /// First non-empty title in `order`
    pub fn preferred(&self, order: TitleLanguageOrder) -> Option<&str> {
        let candidates = match order {
            TitleLanguageOrder::EnglishFirst => [&self.english, &self.romaji, &self.native],
            TitleLanguageOrder::RomajiFirst => [&self.romaji, &self.english, &self.native],
            TitleLanguageOrder::NativeFirst => [&self.native, &self.romaji, &self.english],
        };

        candidates
            .into_iter()
            .filter_map(|title| title.as_deref())
            .find(|title| !title.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverImage {
    pub color: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

/// Next scheduled episode of a releasing media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringEpisode {
    pub id: i64,
    /// Unix seconds
    pub airing_at: i64,
    /// Seconds from when the record was fetched
    pub time_until_airing: i64,
    pub episode: i32,
}

// =============================================================================
// Domain Models
// =============================================================================

/// Local copy of a catalog entry
///
/// `updated_at` is the remote freshness marker. Storage refuses records
/// without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    /// Remote `updatedAt`, Unix seconds
    pub updated_at: Option<i64>,
    pub site_url: Option<String>,
    pub format: Option<MediaFormat>,
    pub status: Option<MediaStatus>,
    pub title: MediaTitle,
    pub synonyms: Vec<String>,
    pub description: Option<String>,
    pub cover_image: Option<CoverImage>,
    pub banner_image: Option<String>,
    pub season: Option<MediaSeason>,
    pub season_year: Option<i32>,
    pub start_date: Option<PartialDate>,
    pub end_date: Option<PartialDate>,
    pub episodes: Option<i32>,
    /// Minutes per episode
    pub duration: Option<i32>,
    pub hashtag: Option<String>,
    pub next_airing_episode: Option<AiringEpisode>,
    pub genres: Vec<String>,
    pub average_score: Option<i32>,
    pub mean_score: Option<i32>,
    pub popularity: Option<i32>,
    pub trending: Option<i32>,
}

impl MediaRecord {
    /// Record with only the id and freshness marker set
    pub fn new(id: MediaId, updated_at: i64, title: MediaTitle) -> Self {
        Self {
            id,
            updated_at: Some(updated_at),
            site_url: None,
            format: None,
            status: None,
            title,
            synonyms: Vec::new(),
            description: None,
            cover_image: None,
            banner_image: None,
            season: None,
            season_year: None,
            start_date: None,
            end_date: None,
            episodes: None,
            duration: None,
            hashtag: None,
            next_airing_episode: None,
            genres: Vec::new(),
            average_score: None,
            mean_score: None,
            popularity: None,
            trending: None,
        }
    }

    /// Validate record data before it is written
    pub fn validate(&self) -> Result<i64, String> {
        self.updated_at.ok_or_else(|| {
            format!(
                "Media {} has no updatedAt; refusing to store it without a freshness marker",
                self.id
            )
        })
    }
}

/// One entry of a login's consumption list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    pub id: EntryId,
    pub media_id: MediaId,
    pub status: Option<MediaListStatus>,
    /// Episodes watched
    pub progress: Option<i32>,
    /// Rewatch count
    pub repeat: Option<i32>,
    pub priority: Option<i32>,
    pub private: Option<bool>,
    pub hidden_from_status_lists: Option<bool>,
    pub started_at: Option<PartialDate>,
    pub completed_at: Option<PartialDate>,
    /// Remote `updatedAt`, Unix seconds
    pub updated_at: i64,
}

/// A login known to this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub id: LoginId,
    pub name: String,
    pub medium_avatar: Option<String>,
    /// Unix seconds of the last time this login was active
    pub last_used: i64,
}
