//! Schema catalog cache.
//!
//! Holds at most one schema snapshot at a time. The snapshot is fetched on
//! first use, reused until it expires or is explicitly refreshed, and the
//! fill path is serialized so that concurrent callers trigger a single
//! catalog read and all observe the same snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::db::{DatabaseClient, SchemaDescription};
use crate::error::{AskError, Result};

/// An immutable, versioned schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    /// Monotonic version, starting at 1 for the first fetch.
    pub version: u64,
    /// Structured description.
    pub description: SchemaDescription,
    /// Rendered text handed to the model.
    pub text: String,
    /// When the snapshot was fetched.
    pub fetched_at: Instant,
}

impl SchemaSnapshot {
    fn new(version: u64, description: SchemaDescription) -> Self {
        let text = description.format_for_llm();
        Self {
            version,
            description,
            text,
            fetched_at: Instant::now(),
        }
    }

    /// Returns true if the snapshot is older than `ttl`.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.fetched_at.elapsed() >= ttl)
    }
}

/// Cache expiry and fetch settings.
#[derive(Debug, Clone)]
pub struct CatalogPolicy {
    /// Schema namespace to describe.
    pub namespace: String,
    /// Snapshot lifetime; `None` keeps it until an explicit refresh.
    pub ttl: Option<Duration>,
    /// Deadline for one catalog read.
    pub fetch_timeout: Duration,
}

impl CatalogPolicy {
    /// Creates a policy with no expiry and a 10 second fetch deadline.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ttl: None,
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the snapshot lifetime.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the fetch deadline.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Single-slot schema snapshot cache.
pub struct SchemaCatalog {
    db: Arc<dyn DatabaseClient>,
    policy: CatalogPolicy,
    snapshot: RwLock<Option<Arc<SchemaSnapshot>>>,
    fill: Mutex<u64>,
}

impl SchemaCatalog {
    /// Creates an empty catalog reading from `db`.
    pub fn new(db: Arc<dyn DatabaseClient>, policy: CatalogPolicy) -> Self {
        Self {
            db,
            policy,
            snapshot: RwLock::new(None),
            fill: Mutex::new(0),
        }
    }

    /// Returns the namespace this catalog describes.
    pub fn namespace(&self) -> &str {
        &self.policy.namespace
    }

    /// Returns the current snapshot, fetching it first if absent or expired.
    pub async fn get(&self) -> Result<Arc<SchemaSnapshot>> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let mut version = self.fill.lock().await;

        // Another caller may have filled the slot while we waited.
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        self.fetch_into_slot(&mut version).await
    }

    /// Replaces the snapshot with a freshly fetched one.
    pub async fn refresh(&self) -> Result<Arc<SchemaSnapshot>> {
        let mut version = self.fill.lock().await;
        self.fetch_into_slot(&mut version).await
    }

    /// Returns the cached snapshot without fetching, even if expired.
    pub async fn cached(&self) -> Option<Arc<SchemaSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Drops the cached snapshot; the next `get` fetches again.
    pub async fn invalidate(&self) {
        let _guard = self.fill.lock().await;
        *self.snapshot.write().await = None;
    }

    async fn fresh_snapshot(&self) -> Option<Arc<SchemaSnapshot>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|snapshot| !snapshot.is_expired(self.policy.ttl))
            .cloned()
    }

    /// Fetches a snapshot and stores it. The caller holds the fill lock.
    async fn fetch_into_slot(&self, version: &mut u64) -> Result<Arc<SchemaSnapshot>> {
        let namespace = self.policy.namespace.as_str();
        debug!(namespace, "Fetching schema catalog");
        let start = Instant::now();

        let description = tokio::time::timeout(
            self.policy.fetch_timeout,
            self.db.introspect_schema(namespace),
        )
        .await
        .map_err(|_| {
            AskError::catalog(format!(
                "Schema catalog fetch timed out after {}ms",
                self.policy.fetch_timeout.as_millis()
            ))
        })?
        .map_err(|e| match e {
            AskError::CatalogUnavailable(_) => e,
            other => AskError::catalog(other.to_string()),
        })?;

        if description.is_empty() {
            warn!(namespace, "Schema catalog returned no tables");
        }

        *version += 1;
        let snapshot = Arc::new(SchemaSnapshot::new(*version, description));
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));

        info!(
            namespace,
            version = snapshot.version,
            tables = snapshot.description.tables.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Schema snapshot cached"
        );

        Ok(snapshot)
    }
}
