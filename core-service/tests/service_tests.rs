//! Façade tests against a scripted AniList
//!
//! Cover what the service adds on top of the sync engine: login
//! registration, the light change check, gated media refresh, the
//! process-boundary envelope and the current-list view.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{FixedClock, HttpClient, HttpRequest, HttpResponse, StaticCredentials};
use chrono::{TimeZone, Utc};
use core_library::models::{LoginId, MediaId, MediaRecord, MediaTitle, TitleLanguageOrder};
use core_library::repositories::{MediaRepository, SqliteMediaRepository};
use core_runtime::EngineConfig;
use core_service::{
    unwrap_action, ActionResult, CoreDependencies, CoreError, SyncFailureKind, UpNextService,
};
use futures::StreamExt;
use provider_anilist::RemoteError;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const LOGIN: LoginId = LoginId(77);

#[derive(Default)]
struct ScriptedAniList {
    viewer_id: Mutex<i64>,
    /// `updatedAt` of the newest remote entry; `None` answers with a 404
    last_updated: Mutex<Option<i64>>,
    media_updated_at: Mutex<i64>,
    rate_limit_media: Mutex<bool>,
    media_requests: Mutex<Vec<Vec<i64>>>,
}

impl ScriptedAniList {
    fn new() -> Self {
        let scripted = Self::default();
        *scripted.viewer_id.lock().unwrap() = LOGIN.0;
        *scripted.media_updated_at.lock().unwrap() = 500;
        scripted
    }

    fn media_requests(&self) -> Vec<Vec<i64>> {
        self.media_requests.lock().unwrap().clone()
    }

    fn ok(payload: Value) -> HttpResponse {
        HttpResponse::new(200, serde_json::to_vec(&payload).unwrap())
            .with_header("Content-Type", "application/json")
    }
}

#[async_trait]
impl HttpClient for ScriptedAniList {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        let query = body["query"].as_str().unwrap();

        if query.contains("MediaListCollection") {
            return Ok(Self::ok(json!({ "data": {
                "Viewer": { "id": LOGIN.0 },
                "MediaListCollection": { "hasNextChunk": false, "lists": [
                    { "name": "Watching", "entries": [
                        { "id": 1, "status": "CURRENT", "media": { "id": 10, "updatedAt": 500 },
                          "progress": 4, "updatedAt": 300 },
                        { "id": 2, "status": "PLANNING", "media": { "id": 11, "updatedAt": 500 },
                          "updatedAt": 200 },
                        { "id": 3, "status": "CURRENT", "media": { "id": 12, "updatedAt": 500 },
                          "updatedAt": 100 }
                    ] }
                ] }
            } })));
        }

        if query.contains("MediaList(") {
            return Ok(match *self.last_updated.lock().unwrap() {
                Some(updated_at) => Self::ok(json!({ "data": {
                    "MediaList": { "id": 1, "updatedAt": updated_at }
                } })),
                None => HttpResponse::new(
                    404,
                    serde_json::to_vec(&json!({
                        "errors": [{ "message": "Not Found.", "status": 404 }],
                        "data": { "MediaList": null }
                    }))
                    .unwrap(),
                )
                .with_reason("Not Found")
                .with_header("Content-Type", "application/json"),
            });
        }

        if query.contains("Page(") {
            let ids: Vec<i64> = body["variables"]["ids"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_i64().unwrap())
                .collect();
            self.media_requests.lock().unwrap().push(ids.clone());

            if *self.rate_limit_media.lock().unwrap() {
                return Ok(HttpResponse::new(429, "Too Many Requests")
                    .with_reason("Too Many Requests")
                    .with_header("Retry-After", "12"));
            }

            let updated_at = *self.media_updated_at.lock().unwrap();
            let media: Vec<Value> = ids
                .iter()
                .rev()
                .map(|id| json!({
                    "id": id,
                    "updatedAt": updated_at,
                    "title": { "romaji": format!("Romaji {}", id), "english": format!("English {}", id), "native": null }
                }))
                .collect();
            return Ok(Self::ok(json!({ "data": {
                "Page": { "pageInfo": { "hasNextPage": false }, "media": media }
            } })));
        }

        if query.contains("Viewer") {
            let viewer_id = *self.viewer_id.lock().unwrap();
            return Ok(Self::ok(json!({ "data": { "Viewer": {
                "id": viewer_id,
                "name": "Haruhi",
                "avatar": { "medium": "https://img.example/avatar.png" },
                "options": { "titleLanguage": "ENGLISH" }
            } } })));
        }

        panic!("unexpected query: {}", query);
    }
}

async fn service(scripted: Arc<ScriptedAniList>) -> UpNextService {
    let config = EngineConfig::builder()
        .requests_per_minute(600)
        .build()
        .unwrap();
    let credentials = Arc::new(StaticCredentials::new().with_token(LOGIN.0, "token"));
    let clock = Arc::new(FixedClock(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    let deps = CoreDependencies::new(scripted, credentials).with_clock(clock);
    UpNextService::new(config, deps).await.unwrap()
}

async fn sync(service: &UpNextService) {
    let mut stream = service.synchronize(LOGIN).unwrap();
    while let Some(update) = stream.next().await {
        update.unwrap();
    }
}

#[tokio::test]
async fn test_register_login_stores_profile() {
    let scripted = Arc::new(ScriptedAniList::new());
    let service = service(scripted).await;

    let registered = service.register_login(LOGIN).await.unwrap();
    assert_eq!(registered.login.name, "Haruhi");
    assert_eq!(registered.login.last_used, 1_700_000_000);
    assert_eq!(registered.title_order, TitleLanguageOrder::EnglishFirst);

    let recent = service.recent_logins(5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(
        recent[0].medium_avatar.as_deref(),
        Some("https://img.example/avatar.png")
    );
}

#[tokio::test]
async fn test_register_login_rejects_other_viewer() {
    let scripted = Arc::new(ScriptedAniList::new());
    *scripted.viewer_id.lock().unwrap() = 5;
    let service = service(scripted).await;

    let err = service.register_login(LOGIN).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::LoginMismatch {
            expected: 77,
            actual: 5
        }
    ));
    assert!(service.recent_logins(5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_needs_sync_follows_remote_changes() {
    let scripted = Arc::new(ScriptedAniList::new());
    let service = service(scripted.clone()).await;

    // Nothing local yet
    assert!(service.needs_sync(LOGIN).await.unwrap());

    sync(&service).await;

    *scripted.last_updated.lock().unwrap() = Some(300);
    assert!(!service.needs_sync(LOGIN).await.unwrap());

    *scripted.last_updated.lock().unwrap() = Some(301);
    assert!(service.needs_sync(LOGIN).await.unwrap());

    // Remote list emptied: reported as a 404
    *scripted.last_updated.lock().unwrap() = None;
    assert!(!service.needs_sync(LOGIN).await.unwrap());
}

#[tokio::test]
async fn test_current_consumption_joins_media() {
    let scripted = Arc::new(ScriptedAniList::new());
    let service = service(scripted).await;
    sync(&service).await;

    let current = service.current_consumption(LOGIN, None).await.unwrap();
    let ids: Vec<i64> = current.iter().map(|item| item.entry.id.0).collect();
    assert_eq!(ids, vec![1, 3]);

    let media = current[0].media.as_ref().unwrap();
    assert_eq!(
        media.title.preferred(TitleLanguageOrder::EnglishFirst),
        Some("English 10")
    );

    let limited = service.current_consumption(LOGIN, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_refresh_media_fetches_only_stale_ids() {
    let scripted = Arc::new(ScriptedAniList::new());
    let service = service(scripted.clone()).await;

    let repo = SqliteMediaRepository::new(service.pool().clone());
    let title = MediaTitle {
        romaji: Some("Local".to_string()),
        ..Default::default()
    };
    repo.bulk_put(&[
        MediaRecord::new(MediaId(1), 900, title.clone()),
        MediaRecord::new(MediaId(2), 100, title),
    ])
    .await
    .unwrap();

    *scripted.media_updated_at.lock().unwrap() = 950;
    let written = service
        .refresh_media(&[(MediaId(1), 900), (MediaId(2), 950), (MediaId(3), 950)])
        .await
        .unwrap();

    assert_eq!(written, 2);
    let requests = scripted.media_requests();
    assert_eq!(requests.len(), 1);
    let mut requested = requests[0].clone();
    requested.sort_unstable();
    assert_eq!(requested, vec![2, 3]);

    let untouched = service.local_media(MediaId(1)).await.unwrap().unwrap();
    assert_eq!(untouched.title.romaji.as_deref(), Some("Local"));
    let refreshed = service.local_media(MediaId(2)).await.unwrap().unwrap();
    assert_eq!(refreshed.updated_at, Some(950));

    // Everything is fresh now
    let written = service
        .refresh_media(&[(MediaId(2), 950), (MediaId(3), 950)])
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(scripted.media_requests().len(), 1);
}

#[tokio::test]
async fn test_batch_lookup_action_envelopes() {
    let scripted = Arc::new(ScriptedAniList::new());
    let service = service(scripted.clone()).await;

    let action = service
        .batch_lookup_action(&[MediaId(30), MediaId(31)])
        .await
        .unwrap();
    let records = unwrap_action(action).unwrap();
    assert_eq!(records[0].as_ref().unwrap().id, MediaId(30));
    assert_eq!(records[1].as_ref().unwrap().id, MediaId(31));

    *scripted.rate_limit_media.lock().unwrap() = true;
    let action = service.batch_lookup_action(&[MediaId(32)]).await.unwrap();
    assert!(matches!(action, ActionResult::Error(_)));

    let wire = serde_json::to_string(&action).unwrap();
    let received: ActionResult<Vec<Option<MediaRecord>>> = serde_json::from_str(&wire).unwrap();
    match unwrap_action(received).unwrap_err() {
        RemoteError::RateLimit(e) => assert_eq!(e.retry_after_seconds, 12),
        other => panic!("expected RateLimit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_sync_is_an_unexpected_failure() {
    let scripted = Arc::new(ScriptedAniList::new());
    *scripted.rate_limit_media.lock().unwrap() = true;
    let service = service(scripted).await;

    let mut stream = service.synchronize(LOGIN).unwrap();
    let mut failure = None;
    while let Some(update) = stream.next().await {
        if let Err(e) = update {
            failure = Some(e);
        }
    }

    let error = CoreError::from(failure.expect("sync should fail"));
    let kind = SyncFailureKind::of_core_error(&error);
    assert!(matches!(error.remote(), Some(RemoteError::RateLimit(_))));
    assert_eq!(kind, SyncFailureKind::Unexpected);
    assert!(!kind.user_message().contains("Retry-After"));
    assert!(!service.cancel_sync(LOGIN));
}
