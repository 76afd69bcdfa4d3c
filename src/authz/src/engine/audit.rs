//! Audit recording for authorization decisions and grant changes
//!
//! The resolver hands entries to an [`AuditRecorder`], which only pushes them
//! onto a bounded in-memory queue. A single background task drains the queue
//! in batches into an [`AuditSink`]. A slow or failing sink never delays or
//! alters a decision:
//!
//! - when the queue is full, the configured [`OverflowPolicy`] drops an entry
//!   (counted in [`AuditStats::dropped`])
//! - sink failures are logged and counted in [`AuditStats::failed`]
//!
//! One consumer and a FIFO queue keep entries in insertion order, so per-user
//! chronological queries are exact.

use crate::error::{AuthzError, Result};
use crate::types::{ActionId, GrantId, ResourceId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Grant,
    Revoke,
    Check,
    Deny,
}

/// Immutable audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry ID
    pub id: String,

    /// User the entry is about (the requester for checks, the actor for grants)
    pub user_id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,

    /// Resource name as requested
    pub resource: String,

    /// Action name as requested
    pub action: String,

    /// Grant that matched, was created or was revoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_id: Option<GrantId>,

    pub operation: Operation,

    /// Whether access was granted (or the admin operation succeeded)
    pub result: bool,

    /// Reason code
    pub reason: String,

    /// Snapshot of the request environment
    #[serde(default)]
    pub request_context: serde_json::Value,

    /// BLAKE3 fingerprint of the request and environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_fingerprint: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        user_id: UserId,
        resource: impl Into<String>,
        action: impl Into<String>,
        operation: Operation,
        result: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            resource_id: None,
            action_id: None,
            resource: resource.into(),
            action: action.into(),
            permission_id: None,
            operation,
            result,
            reason: reason.into(),
            request_context: serde_json::Value::Null,
            context_fingerprint: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_target(mut self, resource_id: Option<ResourceId>, action_id: Option<ActionId>) -> Self {
        self.resource_id = resource_id;
        self.action_id = action_id;
        self
    }

    pub fn with_permission(mut self, permission_id: Option<GrantId>) -> Self {
        self.permission_id = permission_id;
        self
    }

    pub fn with_context(mut self, snapshot: serde_json::Value, fingerprint: String) -> Self {
        self.request_context = snapshot;
        self.context_fingerprint = Some(fingerprint);
        self
    }
}

/// Durable destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a batch in order
    async fn append(&self, entries: &[AuditLogEntry]) -> Result<()>;

    /// Entries for a user, most recent first
    async fn query(&self, user_id: UserId, limit: usize) -> Result<Vec<AuditLogEntry>>;
}

/// In-memory audit sink
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
    by_user: Arc<RwLock<HashMap<UserId, Vec<usize>>>>,
}

impl InMemoryAuditSink {
    /// Create a new in-memory audit sink
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            by_user: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total entries written
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, batch: &[AuditLogEntry]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut by_user = self.by_user.write().await;

        for entry in batch {
            by_user.entry(entry.user_id).or_default().push(entries.len());
            entries.push(entry.clone());
        }

        Ok(())
    }

    async fn query(&self, user_id: UserId, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        let by_user = self.by_user.read().await;

        Ok(by_user
            .get(&user_id)
            .map(|positions| {
                positions
                    .iter()
                    .rev()
                    .take(limit)
                    .filter_map(|&i| entries.get(i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// What to do with a new entry when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued entry to make room
    #[default]
    DropOldest,

    /// Discard the new entry
    DropNewest,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            "drop-newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(AuthzError::Config(format!(
                "unknown audit overflow policy '{}' (expected drop-oldest or drop-newest)",
                other
            ))),
        }
    }
}

/// Audit recorder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Maximum queued entries
    pub capacity: usize,

    /// Maximum entries handed to the sink at once
    pub batch_size: usize,

    pub overflow: OverflowPolicy,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 256,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Audit recorder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Entries accepted onto the queue
    pub enqueued: u64,

    /// Entries the sink accepted
    pub written: u64,

    /// Entries discarded on overflow or after shutdown
    pub dropped: u64,

    /// Entries lost to sink failures
    pub failed: u64,
}

impl AuditStats {
    /// Entries no longer pending
    pub fn settled(&self) -> u64 {
        self.written + self.dropped + self.failed
    }
}

struct Shared {
    queue: Mutex<VecDeque<AuditLogEntry>>,
    notify: Notify,
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
    closed: AtomicBool,
    submitted: AtomicU64,
    enqueued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    /// Count of submissions that reached a final state
    settled: watch::Sender<u64>,
}

impl Shared {
    fn close(&self) {
        let _queue = self.queue.lock();
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn settle(&self, n: u64) {
        if n > 0 {
            self.settled.send_modify(|count| *count += n);
        }
    }
}

/// Fire-and-forget audit recorder backed by a background consumer task
pub struct AuditRecorder {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditRecorder {
    /// Start the recorder. Must be called within a Tokio runtime.
    pub fn spawn(config: AuditConfig, sink: Arc<dyn AuditSink>) -> Self {
        let (settled, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(config.capacity.min(1024))),
            notify: Notify::new(),
            sink,
            config,
            closed: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            settled,
        });

        let worker = tokio::spawn(Self::run(Arc::clone(&shared)));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Start a recorder writing to a fresh in-memory sink
    pub fn in_memory(config: AuditConfig) -> Self {
        Self::spawn(config, Arc::new(InMemoryAuditSink::new()))
    }

    /// Queue an entry. Never blocks on the sink and never fails.
    pub fn record(&self, entry: AuditLogEntry) {
        let shared = &self.shared;
        shared.submitted.fetch_add(1, Ordering::SeqCst);

        // `closed` is only set under the queue lock, so an entry pushed here
        // is always seen by the consumer before it exits
        let evicted = {
            let mut queue = shared.queue.lock();
            if shared.closed.load(Ordering::SeqCst) {
                drop(queue);
                warn!(user_id = entry.user_id, "Audit recorder closed, dropping entry");
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                shared.settle(1);
                return;
            }

            if queue.len() < shared.config.capacity {
                queue.push_back(entry);
                Ok(())
            } else {
                match shared.config.overflow {
                    OverflowPolicy::DropOldest => {
                        queue.pop_front();
                        queue.push_back(entry);
                        Err(OverflowPolicy::DropOldest)
                    }
                    OverflowPolicy::DropNewest => Err(OverflowPolicy::DropNewest),
                }
            }
        };

        match evicted {
            Ok(()) => {
                shared.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(policy) => {
                if policy == OverflowPolicy::DropOldest {
                    shared.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                shared.settle(1);
                warn!(?policy, "Audit queue full, entry dropped");
            }
        }

        shared.notify.notify_one();
    }

    /// Wait until every entry recorded before this call has been written,
    /// dropped or failed
    pub async fn flush(&self) {
        let target = self.shared.submitted.load(Ordering::SeqCst);
        let mut settled = self.shared.settled.subscribe();
        // The sender lives as long as `shared`, so this cannot fail
        let _ = settled.wait_for(|count| *count >= target).await;
    }

    /// Entries for a user, most recent first
    pub async fn query(&self, user_id: UserId, limit: usize) -> Result<Vec<AuditLogEntry>> {
        self.shared.sink.query(user_id, limit).await
    }

    /// Current counters
    pub fn stats(&self) -> AuditStats {
        let shared = &self.shared;
        AuditStats {
            enqueued: shared.enqueued.load(Ordering::Relaxed),
            written: shared.written.load(Ordering::Relaxed),
            dropped: shared.dropped.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Entries waiting for the consumer
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Stop accepting entries, drain the queue and wait for the consumer
    pub async fn shutdown(&self) {
        self.shared.close();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Audit consumer task failed: {}", e);
            }
        }

        // Anything the consumer did not reach (it failed mid-run) is dropped
        let leftover = self.shared.queue.lock().drain(..).count() as u64;
        if leftover > 0 {
            warn!(entries = leftover, "Audit entries dropped at shutdown");
            self.shared.dropped.fetch_add(leftover, Ordering::Relaxed);
            self.shared.settle(leftover);
        }
    }

    async fn run(shared: Arc<Shared>) {
        debug!(
            capacity = shared.config.capacity,
            batch_size = shared.config.batch_size,
            "Audit consumer started"
        );

        loop {
            let (batch, closed): (Vec<AuditLogEntry>, bool) = {
                let mut queue = shared.queue.lock();
                let n = shared.config.batch_size.max(1).min(queue.len());
                (queue.drain(..n).collect(), shared.closed.load(Ordering::SeqCst))
            };

            if batch.is_empty() {
                if closed {
                    break;
                }
                shared.notify.notified().await;
                continue;
            }

            let n = batch.len() as u64;
            match shared.sink.append(&batch).await {
                Ok(()) => {
                    shared.written.fetch_add(n, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(entries = n, "Audit sink write failed: {}", e);
                    shared.failed.fetch_add(n, Ordering::Relaxed);
                }
            }
            shared.settle(n);
        }

        debug!("Audit consumer stopped");
    }
}

impl Drop for AuditRecorder {
    fn drop(&mut self) {
        // Let the consumer drain and exit on its own
        self.shared.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: UserId, reason: &str) -> AuditLogEntry {
        AuditLogEntry::new(user_id, "doc", "read", Operation::Check, true, reason)
    }

    #[tokio::test]
    async fn test_record_and_query_most_recent_first() {
        let recorder = AuditRecorder::in_memory(AuditConfig::default());

        recorder.record(entry(1, "first"));
        recorder.record(entry(2, "other-user"));
        recorder.record(entry(1, "second"));
        recorder.flush().await;

        let trail = recorder.query(1, 10).await.unwrap();
        let reasons: Vec<&str> = trail.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["second", "first"]);

        let limited = recorder.query(1, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].reason, "second");

        assert!(recorder.query(99, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_after_flush() {
        let recorder = AuditRecorder::in_memory(AuditConfig::default());
        for i in 0..5 {
            recorder.record(entry(i, "check"));
        }
        recorder.flush().await;

        let stats = recorder.stats();
        assert_eq!(stats.enqueued, 5);
        assert_eq!(stats.written, 5);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.settled(), 5);
        assert_eq!(recorder.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_without_entries_returns() {
        let recorder = AuditRecorder::in_memory(AuditConfig::default());
        recorder.flush().await;
        assert_eq!(recorder.stats(), AuditStats::default());
    }

    #[tokio::test]
    async fn test_record_after_shutdown_is_dropped() {
        let recorder = AuditRecorder::in_memory(AuditConfig::default());
        recorder.record(entry(1, "before"));
        recorder.shutdown().await;

        recorder.record(entry(1, "after"));
        recorder.flush().await;

        let stats = recorder.stats();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(recorder.query(1, 10).await.unwrap().len(), 1);
    }

    #[test]
    fn test_overflow_policy_parsing() {
        assert_eq!("drop-oldest".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::DropOldest);
        assert_eq!("drop-newest".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::DropNewest);
        assert!("block".parse::<OverflowPolicy>().is_err());
    }

    #[test]
    fn test_entry_serializes_operation_lowercase() {
        let json = serde_json::to_value(entry(3, "simple-grant-match")).unwrap();
        assert_eq!(json["operation"], "check");
        assert_eq!(json["user_id"], 3);
        assert!(json.get("permission_id").is_none());
    }
}
