//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport,
//! credentials, clock) into the sync engine and exposes the operations a host
//! application calls. Desktop hosts typically enable the `desktop-shims`
//! feature, which supplies a reqwest-backed transport from `bridge-desktop`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_service::{CoreDependencies, UpNextService};
//! use core_runtime::EngineConfig;
//!
//! let service = UpNextService::new(EngineConfig::default(), deps).await?;
//! let mut progress = service.synchronize(login_id)?;
//! ```

pub mod boundary;
pub mod error;

pub use boundary::{unwrap_action, wrap_action, ActionResult, SyncFailureKind};
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{Clock, CredentialProvider, HttpClient, SystemClock};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::{
    ConsumptionRecord, Login, LoginId, MediaId, MediaRecord, TitleLanguageOrder,
};
use core_library::repositories::consumption::DEFAULT_CURRENT_LIMIT;
use core_library::repositories::{
    ConsumptionRepository, LoginRepository, MediaRepository, SqliteConsumptionRepository,
    SqliteLoginRepository, SqliteMediaRepository,
};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::EngineConfig;
use core_sync::{media_record, select_stale, SyncOrchestrator, SyncStream};
use provider_anilist::{AniListClient, MediaLookup, RateLimiter, RequestExecutor};
use sqlx::SqlitePool;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, info, instrument};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Dependencies backed by the desktop reqwest transport.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = bridge_desktop::ReqwestHttpClient::new()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Ok(Self::new(Arc::new(http), credentials))
    }
}

/// A list entry together with its media, when the media is stored locally
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionItem {
    pub entry: ConsumptionRecord,
    pub media: Option<MediaRecord>,
}

/// A login stored after its token was verified
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredLogin {
    pub login: Login,
    pub title_order: TitleLanguageOrder,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct UpNextService {
    config: EngineConfig,
    pool: SqlitePool,
    events: EventBus,
    client: AniListClient,
    lookup: Arc<MediaLookup>,
    orchestrator: SyncOrchestrator,
    media: Arc<dyn MediaRepository>,
    consumption: Arc<dyn ConsumptionRepository>,
    logins: Arc<dyn LoginRepository>,
    clock: Arc<dyn Clock>,
}

impl UpNextService {
    /// Validate `config`, open the database and build the engine.
    ///
    /// One [`RateLimiter`] is created here and shared by every request the
    /// service makes.
    pub async fn new(config: EngineConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let db_config = match &config.database_path {
            Some(path) => DatabaseConfig::new(path),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;
        let events = EventBus::new(config.event_buffer_size);

        let limiter = Arc::new(RateLimiter::from_config(&config));
        let executor = Arc::new(
            RequestExecutor::new(deps.http_client, limiter, &config)
                .with_event_bus(events.clone()),
        );
        let client = AniListClient::new(executor, deps.credentials);

        let media: Arc<dyn MediaRepository> = Arc::new(SqliteMediaRepository::new(pool.clone()));
        let consumption: Arc<dyn ConsumptionRepository> =
            Arc::new(SqliteConsumptionRepository::new(pool.clone()));
        let logins: Arc<dyn LoginRepository> = Arc::new(SqliteLoginRepository::new(pool.clone()));

        let orchestrator = SyncOrchestrator::with_repositories(
            client.clone(),
            Arc::clone(&media),
            Arc::clone(&consumption),
            events.clone(),
            config.media_chunk_size,
        );
        let lookup = Arc::new(MediaLookup::new(client.clone(), &config));

        info!(
            endpoint = %config.endpoint,
            requests_per_minute = config.requests_per_minute,
            in_memory = config.database_path.is_none(),
            "UpNext service initialized"
        );

        Ok(Self {
            config,
            pool,
            events,
            client,
            lookup,
            orchestrator,
            media,
            consumption,
            logins,
            clock: deps.clock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Start a full sync of `login`; progress arrives on the returned stream
    pub fn synchronize(&self, login: LoginId) -> Result<SyncStream> {
        Ok(self.orchestrator.synchronize(login)?)
    }

    pub fn cancel_sync(&self, login: LoginId) -> bool {
        self.orchestrator.cancel(login)
    }

    /// Whether the remote list changed since the last sync
    ///
    /// Compares the most recently updated remote entry with the newest local
    /// one. An empty local list always needs a sync.
    #[instrument(skip(self), fields(login_id = %login))]
    pub async fn needs_sync(&self, login: LoginId) -> Result<bool> {
        let local = self.consumption.max_updated_at(login).await?;
        let Some(local) = local else {
            return Ok(true);
        };

        let remote = self
            .client
            .fetch_last_updated_entry(login)
            .await?
            .and_then(|entry| entry.updated_at);

        let stale = remote.is_some_and(|remote| remote > local);
        debug!(local, ?remote, stale, "Checked list freshness");
        Ok(stale)
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Uncached bulk lookup, position-aligned with `ids`
    ///
    /// Shares the rate limiter with every other call of this service.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn batch_lookup(&self, ids: &[MediaId]) -> Result<Vec<Option<MediaRecord>>> {
        let nodes = self.lookup.batch_lookup(ids).await?;
        nodes
            .into_iter()
            .map(|node| {
                node.map(media_record)
                    .transpose()
                    .map_err(CoreError::from)
            })
            .collect()
    }

    /// [`Self::batch_lookup`] in its process-boundary envelope
    pub async fn batch_lookup_action(
        &self,
        ids: &[MediaId],
    ) -> Result<ActionResult<Vec<Option<MediaRecord>>>> {
        wrap_action(self.batch_lookup(ids).await)
    }

    /// Fetch and store the media whose remote `updatedAt` is ahead of ours
    ///
    /// Returns how many records were written.
    #[instrument(skip(self, pairs), fields(requested = pairs.len()))]
    pub async fn refresh_media(&self, pairs: &[(MediaId, i64)]) -> Result<usize> {
        let stale = select_stale(pairs, self.media.as_ref()).await?;
        if stale.is_empty() {
            debug!("All requested media are fresh");
            return Ok(0);
        }

        let nodes = self.lookup.get_many(&stale).await?;
        let records = nodes
            .into_iter()
            .flatten()
            .map(media_record)
            .collect::<core_sync::Result<Vec<_>>>()?;

        self.media.bulk_put(&records).await?;
        info!(stale = stale.len(), written = records.len(), "Refreshed media");
        Ok(records.len())
    }

    pub async fn local_media(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        Ok(self.media.get(id).await?)
    }

    // =========================================================================
    // Consumption
    // =========================================================================

    /// `CURRENT` entries, most recently updated first, with their media
    pub async fn current_consumption(
        &self,
        login: LoginId,
        limit: Option<u32>,
    ) -> Result<Vec<ConsumptionItem>> {
        let entries = self
            .consumption
            .current_consumption(login, limit.unwrap_or(DEFAULT_CURRENT_LIMIT))
            .await?;
        let ids: Vec<MediaId> = entries.iter().map(|entry| entry.media_id).collect();
        let media = self.media.bulk_get(&ids).await?;

        Ok(entries
            .into_iter()
            .zip(media)
            .map(|(entry, media)| ConsumptionItem { entry, media })
            .collect())
    }

    // =========================================================================
    // Logins
    // =========================================================================

    /// Verify `login`'s token against the viewer profile and store the login
    #[instrument(skip(self), fields(login_id = %login))]
    pub async fn register_login(&self, login: LoginId) -> Result<RegisteredLogin> {
        let viewer = self.client.fetch_viewer(login).await?;
        if viewer.id != login.0 {
            return Err(CoreError::LoginMismatch {
                expected: login.0,
                actual: viewer.id,
            });
        }

        let record = Login {
            id: login,
            name: viewer.name,
            medium_avatar: viewer.avatar.and_then(|avatar| avatar.medium),
            last_used: self.clock.unix_timestamp(),
        };
        self.logins.upsert(&record).await?;

        let title_order = TitleLanguageOrder::from_preference(
            viewer.options.and_then(|options| options.title_language),
        );
        info!(name = %record.name, "Registered login");

        Ok(RegisteredLogin {
            login: record,
            title_order,
        })
    }

    /// Mark `login` as just used
    pub async fn touch_login(&self, login: LoginId) -> Result<()> {
        Ok(self
            .logins
            .touch(login, self.clock.unix_timestamp())
            .await?)
    }

    pub async fn recent_logins(&self, limit: u32) -> Result<Vec<Login>> {
        Ok(self.logins.most_recent(limit).await?)
    }
}

impl std::fmt::Debug for UpNextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpNextService")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
