//! Per-project deduplication cache.
//!
//! The cache is advisory, not authoritative: it exists so the batch writer
//! can cheaply discard commits that are already mirrored. Correctness is
//! guaranteed by the per-write existence check in the writer, which is why
//! every failure path here degrades to "know less" instead of propagating.
//!
//! The cache is an explicit service object, constructed once at startup and
//! shared via `Arc`; there is no process-global state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::commit::{CommitRecord, legacy_fingerprint};
use crate::store::{FieldProbe, RecordFilter, RecordStore};

/// How long a fetched per-project state stays fresh.
pub const DEDUP_TTL: Duration = Duration::from_secs(300);

/// Maximum number of projects cached at once; the oldest entry is evicted
/// past this.
pub const MAX_CACHED_REPOS: usize = 64;

/// Safety limit on pages fetched during one scan. Hitting it marks the
/// state incomplete but does not block processing.
pub const MAX_DEDUP_PAGES: usize = 20;

/// Tuning knobs for the dedup cache.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Time-to-live for a fetched per-project state.
    pub ttl: Duration,
    /// Cap on cached projects.
    pub max_repos: usize,
    /// Cap on pages fetched per scan.
    pub max_pages: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl: DEDUP_TTL,
            max_repos: MAX_CACHED_REPOS,
            max_pages: MAX_DEDUP_PAGES,
        }
    }
}

/// What the store is known to contain for one project.
#[derive(Debug, Clone, Default)]
pub struct KnownState {
    /// Identifiers confirmed present in the store.
    pub identifiers: HashSet<String>,
    /// Legacy `message|timestamp` fingerprints for rows without an
    /// identifier.
    pub fingerprints: HashSet<String>,
    /// False when the scan was cut short (page limit or store failure), so
    /// duplicates may slip past the cache.
    pub complete: bool,
}

impl KnownState {
    /// Whether this commit is already known to be mirrored.
    #[must_use]
    pub fn contains(&self, commit: &CommitRecord) -> bool {
        self.identifiers.contains(&commit.identifier)
            || self.fingerprints.contains(&commit.fingerprint())
    }

    /// Total number of known entries.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.identifiers.len() + self.fingerprints.len()
    }
}

/// Resolved destination-schema capability for commit identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSupport {
    /// The identifier column exists (or was added successfully).
    Supported,
    /// The schema lacks the column and it could not be added; dedup runs on
    /// legacy fingerprints only.
    Unsupported,
    /// The probe failed; this call degrades to legacy behavior and the next
    /// call probes again.
    Unknown,
}

struct CacheEntry {
    state: Arc<KnownState>,
    fetched_at: Instant,
}

/// Per-project, TTL-bound index of already-mirrored commits.
pub struct DedupCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    support: Mutex<Option<IdentifierSupport>>,
    config: DedupConfig,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl DedupCache {
    /// Create a cache with the given tuning.
    pub fn new(config: DedupConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            support: Mutex::new(None),
            config,
        }
    }

    /// Resolve whether the destination schema carries the identifier column.
    ///
    /// The answer is detected once per process and cached: an absent column
    /// triggers one attempt to add it. A probe that fails outright is not
    /// cached, so a transient failure does not pin the pipeline to legacy
    /// dedup forever.
    pub async fn identifier_support(&self, store: &dyn RecordStore) -> IdentifierSupport {
        let mut guard = self.support.lock().await;
        if let Some(support) = *guard {
            return support;
        }

        let resolved = match store.probe_identifier_field().await {
            FieldProbe::Present => IdentifierSupport::Supported,
            FieldProbe::Absent => match store.add_identifier_field().await {
                Ok(()) => {
                    tracing::info!("Added identifier column to destination schema");
                    IdentifierSupport::Supported
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Destination schema lacks identifier column; using legacy fingerprints"
                    );
                    IdentifierSupport::Unsupported
                }
            },
            FieldProbe::Unknown => {
                tracing::warn!("Identifier column probe failed; degrading to legacy dedup");
                return IdentifierSupport::Unknown;
            }
        };

        *guard = Some(resolved);
        resolved
    }

    /// Get the known state for a project, fetching from the store on a miss
    /// or after TTL expiry.
    ///
    /// `force_legacy_scan` controls whether legacy fingerprints are
    /// collected on a refresh; skipping them saves scanning message bodies
    /// when every row carries an identifier.
    pub async fn known_state(
        &self,
        store: &dyn RecordStore,
        project: &str,
        force_legacy_scan: bool,
    ) -> Arc<KnownState> {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(project)
                && entry.fetched_at.elapsed() < self.config.ttl
            {
                return Arc::clone(&entry.state);
            }
        }

        self.refresh(store, project, force_legacy_scan).await
    }

    /// Re-fetch a project's state from the store unconditionally.
    ///
    /// Used for very large incoming batches where a stale cache would
    /// produce too many false negatives.
    pub async fn refresh(
        &self,
        store: &dyn RecordStore,
        project: &str,
        collect_fingerprints: bool,
    ) -> Arc<KnownState> {
        let state = Arc::new(self.scan(store, project, collect_fingerprints).await);

        let mut entries = self.entries.lock().await;
        entries.insert(
            project.to_string(),
            CacheEntry {
                state: Arc::clone(&state),
                fetched_at: Instant::now(),
            },
        );

        // Capacity eviction, oldest-fetched first.
        while entries.len() > self.config.max_repos {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.fetched_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(project = %key, "Evicting dedup cache entry");
                    entries.remove(&key);
                }
                None => break,
            }
        }

        state
    }

    /// Drop a project's cached state.
    pub async fn invalidate(&self, project: &str) {
        self.entries.lock().await.remove(project);
    }

    /// Record a successful write so subsequent batches in the same process
    /// see it without a refresh.
    pub async fn note_written(&self, project: &str, identifier: &str, fingerprint: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(project) {
            let state = Arc::make_mut(&mut entry.state);
            state.identifiers.insert(identifier.to_string());
            state.fingerprints.insert(fingerprint.to_string());
        }
    }

    async fn scan(
        &self,
        store: &dyn RecordStore,
        project: &str,
        collect_fingerprints: bool,
    ) -> KnownState {
        let mut state = KnownState {
            complete: true,
            ..KnownState::default()
        };
        let filter = RecordFilter::project(project);
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = match store.query_page(&filter, cursor.take()).await {
                Ok(page) => page,
                Err(e) => {
                    // Empty-but-valid: an unknown state only costs extra
                    // existence checks downstream, never correctness.
                    tracing::warn!(
                        project,
                        error = %e,
                        "Dedup scan failed; continuing with empty state"
                    );
                    return KnownState::default();
                }
            };
            pages += 1;

            for record in page.records {
                match record.identifier {
                    Some(id) => {
                        state.identifiers.insert(id);
                    }
                    None if collect_fingerprints => {
                        state
                            .fingerprints
                            .insert(legacy_fingerprint(&record.message, record.committed_at));
                    }
                    None => {}
                }
            }

            match page.next_cursor {
                Some(_) if pages >= self.config.max_pages => {
                    state.complete = false;
                    tracing::warn!(
                        project,
                        pages,
                        "Dedup scan hit page limit; duplicates are possible"
                    );
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            project,
            identifiers = state.identifiers.len(),
            fingerprints = state.fingerprints.len(),
            complete = state.complete,
            "Dedup state refreshed"
        );

        state
    }
}
