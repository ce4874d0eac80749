//! Phase-aware dual-write router
//!
//! The façade every client operation enters. Consults the phase
//! controller per operation, allocates ids against the primary-write
//! store, and mirrors writes to the shadow store when the phase mandates
//! it.
//!
//! Failure semantics: the primary write is the success contract. A shadow
//! write that fails or times out is a degraded success - logged, counted
//! as drift, reported in the response, never surfaced as a request
//! failure. Operators watch the drift counter via `status()` and
//! reconcile before advancing phases.

use crate::allocator::IdAllocator;
use crate::error::CoreError;
use crate::phase::{MigrationPhase, PhaseController, Side};
use chrono::Utc;
use cutover_store::{Record, RecordStore, SortKey};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Owner name applied when the caller supplies none.
pub const DEFAULT_OWNER: &str = "Anonymous";

/// Upper bound on how long a request waits for a shadow write.
const DEFAULT_SHADOW_TIMEOUT: Duration = Duration::from_secs(2);

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Owner substituted when absent or empty; applied centrally here,
    /// never per adapter
    pub default_owner: String,
    /// Bound on shadow-write latency; elapsing counts as a shadow failure
    pub shadow_timeout: Duration,
}

impl RouterConfig {
    /// Default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different default owner.
    #[inline]
    #[must_use]
    pub fn with_default_owner(mut self, owner: impl Into<String>) -> Self {
        self.default_owner = owner.into();
        self
    }

    /// With a different shadow-write timeout.
    #[inline]
    #[must_use]
    pub fn with_shadow_timeout(mut self, timeout: Duration) -> Self {
        self.shadow_timeout = timeout;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_owner: DEFAULT_OWNER.to_string(),
            shadow_timeout: DEFAULT_SHADOW_TIMEOUT,
        }
    }
}

/// Caller input for a new record. `id` and `created_at` are never
/// caller-supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRecord {
    /// Required, non-empty
    #[serde(default)]
    pub title: Option<String>,
    /// Required, empty string allowed
    #[serde(default)]
    pub content: Option<String>,
    /// Optional; defaults to the configured owner
    #[serde(default)]
    pub owner: Option<String>,
}

impl NewRecord {
    /// Input with the two required fields set.
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            owner: None,
        }
    }

    /// With an explicit owner.
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// What happened to the mirrored write, when the phase mandated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShadowOutcome {
    /// The phase routes writes to a single store
    NotRequired,
    /// The mirrored write landed
    Applied,
    /// The mirrored write failed or timed out; the stores have drifted
    Failed {
        /// Why the shadow store is now behind
        reason: String,
    },
}

impl ShadowOutcome {
    /// Whether this request succeeded in a degraded way.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a successful `add_record`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRecord {
    /// The record as persisted in the primary store
    pub record: Record,
    /// Shadow-write outcome
    pub shadow: ShadowOutcome,
}

/// Connectivity and count snapshot of one store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// Adapter name
    pub name: String,
    /// Whether the probe reached the store
    pub connected: bool,
    /// Live record count, when reachable
    pub count: Option<u64>,
}

/// Phase plus both stores' snapshots; the operator's drift dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Active migration phase
    pub phase: MigrationPhase,
    /// Source store snapshot
    pub source: StoreStatus,
    /// Target store snapshot
    pub target: StoreStatus,
    /// Cumulative shadow-write failures since process start
    pub shadow_write_failures: u64,
}

/// One row of the per-owner stats listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerCount {
    /// Owner name
    pub owner: String,
    /// Records owned
    pub count: u64,
}

/// The phase-aware façade over both stores.
#[derive(Debug)]
pub struct DualWriteRouter {
    source: Arc<dyn RecordStore>,
    target: Arc<dyn RecordStore>,
    phases: Arc<PhaseController>,
    source_ids: IdAllocator,
    target_ids: IdAllocator,
    config: RouterConfig,
    shadow_failures: AtomicU64,
}

impl DualWriteRouter {
    /// Build a router over explicit store handles (dependency injection;
    /// no ambient connections).
    #[must_use]
    pub fn new(
        source: Arc<dyn RecordStore>,
        target: Arc<dyn RecordStore>,
        phases: Arc<PhaseController>,
        config: RouterConfig,
    ) -> Self {
        Self {
            source,
            target,
            phases,
            source_ids: IdAllocator::new(),
            target_ids: IdAllocator::new(),
            config,
            shadow_failures: AtomicU64::new(0),
        }
    }

    /// The phase controller driving this router.
    #[inline]
    #[must_use]
    pub fn phases(&self) -> &Arc<PhaseController> {
        &self.phases
    }

    /// Cumulative shadow-write failures.
    #[inline]
    #[must_use]
    pub fn shadow_failure_count(&self) -> u64 {
        self.shadow_failures.load(Ordering::SeqCst)
    }

    fn store(&self, side: Side) -> &Arc<dyn RecordStore> {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    fn allocator(&self, side: Side) -> &IdAllocator {
        match side {
            Side::Source => &self.source_ids,
            Side::Target => &self.target_ids,
        }
    }

    /// All records from the phase's read store.
    pub async fn records(&self, sort: SortKey) -> Result<Vec<Record>, CoreError> {
        let plan = self.phases.route_plan();
        Ok(self.store(plan.read).list_all(sort).await?)
    }

    /// Validate, allocate an id, stamp the creation time, insert into the
    /// primary store, then mirror to the shadow store if the phase
    /// mandates one.
    pub async fn add_record(&self, input: NewRecord) -> Result<CreatedRecord, CoreError> {
        let plan = self.phases.route_plan();

        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if title.is_empty() {
            return Err(CoreError::Validation(
                "'title' is required and must be non-empty".to_string(),
            ));
        }
        let Some(content) = input.content else {
            return Err(CoreError::Validation("'content' is required".to_string()));
        };
        let owner = match input.owner {
            Some(owner) if !owner.trim().is_empty() => owner,
            _ => self.config.default_owner.clone(),
        };

        let primary = self.store(plan.primary_write);
        // The reservation guard stays held across the primary insert so a
        // concurrent allocation cannot observe the same max_id.
        let reservation = self
            .allocator(plan.primary_write)
            .reserve(primary.as_ref())
            .await?;
        let record = Record::new(reservation.id(), title, content, owner, Utc::now());
        primary.insert(record.clone()).await?;
        drop(reservation);

        let shadow = match plan.shadow_write {
            Some(side) => self.shadow_insert(side, &record).await,
            None => ShadowOutcome::NotRequired,
        };

        tracing::info!(
            record_id = record.id,
            primary = %primary.name(),
            degraded = shadow.is_degraded(),
            "record created"
        );
        Ok(CreatedRecord { record, shadow })
    }

    async fn shadow_insert(&self, side: Side, record: &Record) -> ShadowOutcome {
        let store = self.store(side);
        let attempt = tokio::time::timeout(self.config.shadow_timeout, store.insert(record.clone()));
        let reason = match attempt.await {
            Ok(Ok(())) => return ShadowOutcome::Applied,
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!(
                "shadow write timed out after {:?}",
                self.config.shadow_timeout
            ),
        };
        self.shadow_failures.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(
            store = %store.name(),
            record_id = record.id,
            %reason,
            "shadow write failed; stores have drifted until reconciled"
        );
        ShadowOutcome::Failed { reason }
    }

    /// Per-owner record counts from the phase's read store, ordered by
    /// count descending then owner ascending for stable output.
    pub async fn owner_stats(&self) -> Result<Vec<OwnerCount>, CoreError> {
        let plan = self.phases.route_plan();
        let counts = self.store(plan.read).count_by_owner().await?;
        let mut stats: Vec<OwnerCount> = counts
            .into_iter()
            .map(|(owner, count)| OwnerCount { owner, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.owner.cmp(&b.owner)));
        Ok(stats)
    }

    /// Phase plus independent probes of both stores. One store being
    /// unreachable never hides the other.
    pub async fn status(&self) -> StatusReport {
        let (source, target) = futures::join!(probe(&self.source), probe(&self.target));
        StatusReport {
            phase: self.phases.current_phase(),
            source,
            target,
            shadow_write_failures: self.shadow_failure_count(),
        }
    }
}

async fn probe(store: &Arc<dyn RecordStore>) -> StoreStatus {
    match store.count().await {
        Ok(count) => StoreStatus {
            name: store.name().to_string(),
            connected: true,
            count: Some(count),
        },
        Err(err) => {
            tracing::warn!(store = %store.name(), error = %err, "status probe failed");
            StoreStatus {
                name: store.name().to_string(),
                connected: false,
                count: None,
            }
        }
    }
}
