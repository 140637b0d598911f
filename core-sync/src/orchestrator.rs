//! # Sync Orchestrator
//!
//! Full synchronization of one login's anime list and the media it references.
//!
//! ## Workflow
//!
//! 1. Fetch the whole list collection in one request
//! 2. Validate it: the viewer must be the requesting login and the
//!    collection must not be chunked
//! 3. Flatten and map every entry, then bulk-upsert the consumption records
//! 4. Collect the distinct `(mediaId, updatedAt)` pairs and split them into
//!    fixed-size chunks
//! 5. For each chunk, in order: fetch the media page, map, bulk-upsert and
//!    report progress
//!
//! Any error aborts the run. Every write is an upsert keyed by remote ids, so
//! starting over is always safe. Records of entries removed remotely are
//! never deleted.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncOrchestrator;
//! use futures::StreamExt;
//!
//! let mut stream = orchestrator.synchronize(login_id)?;
//! while let Some(update) = stream.next().await {
//!     let progress = update?;
//!     println!("{:.0}%", progress.fraction() * 100.0);
//! }
//! ```

use crate::flatten::ListEntries;
use crate::job::{SyncJobId, SyncProgress, SyncState, SyncSummary};
use crate::mapping::{consumption_record, media_record};
use crate::{Result, SyncError};
use chrono::Utc;
use core_library::models::{LoginId, MediaId};
use core_library::repositories::{
    ConsumptionRepository, MediaRepository, SqliteConsumptionRepository, SqliteMediaRepository,
};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::EngineConfig;
use futures::Stream;
use provider_anilist::types::{ListCollectionData, MediaListCollection};
use provider_anilist::AniListClient;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Progress Stream
// ============================================================================

/// Progress of one spawned sync run
///
/// Yields a [`SyncProgress`] after the list is persisted and after each media
/// chunk, and ends after the final `Ok` (state `Complete`) or a single `Err`.
/// Dropping the stream does not stop the run; use [`SyncStream::cancel`].
pub struct SyncStream {
    job_id: SyncJobId,
    login_id: LoginId,
    receiver: mpsc::UnboundedReceiver<Result<SyncProgress>>,
    cancellation: CancellationToken,
}

impl SyncStream {
    pub fn job_id(&self) -> SyncJobId {
        self.job_id
    }

    pub fn login_id(&self) -> LoginId {
        self.login_id
    }

    /// Stop before the next media chunk starts
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

impl Stream for SyncStream {
    type Item = Result<SyncProgress>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for SyncStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStream")
            .field("job_id", &self.job_id)
            .field("login_id", &self.login_id)
            .finish()
    }
}

/// Publishes progress to the run's stream and the event bus
struct ProgressReporter {
    job_id: SyncJobId,
    login_id: LoginId,
    sender: mpsc::UnboundedSender<Result<SyncProgress>>,
    event_bus: EventBus,
}

impl ProgressReporter {
    fn report(&self, progress: &SyncProgress) {
        debug!(
            state = %progress.state,
            media_done = progress.media_done,
            media_total = progress.media_total,
            "Sync progress"
        );

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Progress {
                job_id: self.job_id.to_string(),
                login_id: self.login_id.0,
                media_done: progress.media_done,
                media_total: progress.media_total,
                fraction: progress.fraction(),
                phase: progress.state.to_string(),
            }))
            .ok();

        // The caller may have dropped the stream; the run continues regardless.
        self.sender.send(Ok(progress.clone())).ok();
    }

    fn fail(&self, error: SyncError) {
        self.sender.send(Err(error)).ok();
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs full syncs, at most one at a time per login
#[derive(Clone)]
pub struct SyncOrchestrator {
    client: AniListClient,
    media: Arc<dyn MediaRepository>,
    consumption: Arc<dyn ConsumptionRepository>,
    event_bus: EventBus,
    chunk_size: usize,
    active_syncs: Arc<Mutex<HashMap<LoginId, CancellationToken>>>,
}

impl SyncOrchestrator {
    pub fn new(
        client: AniListClient,
        pool: SqlitePool,
        event_bus: EventBus,
        config: &EngineConfig,
    ) -> Self {
        Self::with_repositories(
            client,
            Arc::new(SqliteMediaRepository::new(pool.clone())),
            Arc::new(SqliteConsumptionRepository::new(pool)),
            event_bus,
            config.media_chunk_size,
        )
    }

    pub fn with_repositories(
        client: AniListClient,
        media: Arc<dyn MediaRepository>,
        consumption: Arc<dyn ConsumptionRepository>,
        event_bus: EventBus,
        chunk_size: usize,
    ) -> Self {
        Self {
            client,
            media,
            consumption,
            event_bus,
            chunk_size: chunk_size.max(1),
            active_syncs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn active_syncs(&self) -> MutexGuard<'_, HashMap<LoginId, CancellationToken>> {
        self.active_syncs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a full sync of `login` in the background
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `SyncError::SyncInProgress` if `login` is already syncing.
    #[instrument(skip(self), fields(login_id = %login))]
    pub fn synchronize(&self, login: LoginId) -> Result<SyncStream> {
        let cancellation = CancellationToken::new();
        {
            let mut active = self.active_syncs();
            if active.contains_key(&login) {
                return Err(SyncError::SyncInProgress(login));
            }
            active.insert(login, cancellation.clone());
        }

        let job_id = SyncJobId::new();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: job_id.to_string(),
                login_id: login.0,
            }))
            .ok();

        let reporter = ProgressReporter {
            job_id,
            login_id: login,
            sender,
            event_bus: self.event_bus.clone(),
        };
        let orchestrator = self.clone();
        let token = cancellation.clone();
        tokio::spawn(async move {
            orchestrator.run_to_end(reporter, token).await;
        });

        info!(job_id = %job_id, "Started sync");

        Ok(SyncStream {
            job_id,
            login_id: login,
            receiver,
            cancellation,
        })
    }

    /// Cancel the running sync of `login`; `false` if none is running
    pub fn cancel(&self, login: LoginId) -> bool {
        match self.active_syncs().get(&login) {
            Some(token) => {
                info!(login_id = %login, "Cancelling sync");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_syncing(&self, login: LoginId) -> bool {
        self.active_syncs().contains_key(&login)
    }

    async fn run_to_end(&self, reporter: ProgressReporter, cancellation: CancellationToken) {
        let job_id = reporter.job_id;
        let login = reporter.login_id;
        let mut progress = SyncProgress::new();

        let result = self
            .run(job_id, login, &mut progress, &reporter, &cancellation)
            .await;

        self.active_syncs().remove(&login);

        match result {
            Ok(summary) => {
                info!(
                    job_id = %job_id,
                    entries = summary.entries_synced,
                    skipped = summary.entries_skipped,
                    media = summary.media_synced,
                    duration_ms = summary.duration_ms(),
                    "Sync completed"
                );
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        job_id: job_id.to_string(),
                        login_id: login.0,
                        entries_synced: summary.entries_synced,
                        media_synced: summary.media_synced,
                        duration_ms: summary.duration_ms(),
                    }))
                    .ok();
            }
            Err(SyncError::Cancelled) => {
                progress.transition(SyncState::Cancelled).ok();
                warn!(job_id = %job_id, media_done = progress.media_done, "Sync cancelled");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                        job_id: job_id.to_string(),
                        login_id: login.0,
                        media_done: progress.media_done,
                    }))
                    .ok();
                reporter.fail(SyncError::Cancelled);
            }
            Err(e) => {
                progress.transition(SyncState::Failed).ok();
                error!(job_id = %job_id, error = %e, "Sync failed");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        job_id: job_id.to_string(),
                        login_id: login.0,
                        message: e.to_string(),
                        recoverable: e.is_recoverable(),
                    }))
                    .ok();
                reporter.fail(e);
            }
        }
    }

    #[instrument(skip(self, progress, reporter, cancellation), fields(job_id = %job_id, login_id = %login))]
    async fn run(
        &self,
        job_id: SyncJobId,
        login: LoginId,
        progress: &mut SyncProgress,
        reporter: &ProgressReporter,
        cancellation: &CancellationToken,
    ) -> Result<SyncSummary> {
        let started_at = Utc::now();

        // Phase 1: fetch and validate the list
        progress.transition(SyncState::FetchingList)?;
        check_cancelled(cancellation)?;
        info!("Phase 1: Fetching list collection");
        let data = self.client.fetch_list_collection(login).await?;

        progress.transition(SyncState::ValidatingList)?;
        let collection = validate_list(login, data)?;

        // Phase 2: map every entry before anything is written
        progress.transition(SyncState::PersistingConsumption)?;
        info!("Phase 2: Persisting consumption entries");
        let mut records = Vec::new();
        let mut skipped = 0u64;
        let mut media_pairs: Vec<(MediaId, i64)> = Vec::new();
        let mut media_positions: HashMap<MediaId, usize> = HashMap::new();

        for entry in ListEntries::new(collection)? {
            let entry = entry?;
            let media_ref = entry.media;

            let Some(record) = consumption_record(entry)? else {
                skipped += 1;
                continue;
            };
            records.push(record);

            if let Some((id, updated_at)) =
                media_ref.and_then(|m| m.updated_at.map(|at| (MediaId(m.id), at)))
            {
                match media_positions.get(&id) {
                    Some(&position) => media_pairs[position].1 = updated_at,
                    None => {
                        media_positions.insert(id, media_pairs.len());
                        media_pairs.push((id, updated_at));
                    }
                }
            }
        }

        self.consumption.bulk_put(login, &records).await?;
        progress.mark_list_done();
        info!(
            entries = records.len(),
            skipped,
            "Persisted consumption entries"
        );

        // Phase 3: media, one chunk at a time
        progress.transition(SyncState::ChunkingMedia)?;
        progress.set_media_total(media_pairs.len() as u64);
        reporter.report(progress);

        info!(
            media = media_pairs.len(),
            chunk_size = self.chunk_size,
            "Phase 3: Syncing media"
        );
        let mut media_synced = 0u64;
        for (index, chunk) in media_pairs.chunks(self.chunk_size).enumerate() {
            check_cancelled(cancellation)?;

            progress.transition(SyncState::FetchingMediaChunk)?;
            let ids: Vec<MediaId> = chunk.iter().map(|(id, _)| *id).collect();
            debug!(chunk = index, size = ids.len(), "Fetching media chunk");
            let nodes = self.client.fetch_media_page(&ids).await?;

            progress.transition(SyncState::PersistingMedia)?;
            let media = nodes
                .into_iter()
                .map(media_record)
                .collect::<Result<Vec<_>>>()?;

            self.media.bulk_put(&media).await?;
            media_synced += media.len() as u64;
            progress.advance_media(chunk.len() as u64);
            reporter.report(progress);
        }

        progress.transition(SyncState::Complete)?;
        reporter.report(progress);

        Ok(SyncSummary {
            job_id,
            login_id: login,
            entries_synced: records.len() as u64,
            entries_skipped: skipped,
            media_synced,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("client", &self.client)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<()> {
    if cancellation.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

/// Accept the list only if it is the requesting login's and arrived whole
fn validate_list(login: LoginId, data: ListCollectionData) -> Result<MediaListCollection> {
    let collection = data
        .collection
        .ok_or_else(|| SyncError::MalformedList("Expected to get a result".to_string()))?;

    let viewer = data.viewer.map(|viewer| viewer.id);
    if viewer != Some(login.0) {
        return Err(SyncError::WrongViewer {
            expected: login,
            actual: viewer,
        });
    }

    if collection.has_next_chunk.unwrap_or(false) {
        return Err(SyncError::Paginated);
    }

    Ok(collection)
}
