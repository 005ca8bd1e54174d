//! In-memory stand-in for the remote control plane
//!
//! Every write is scheduled on a timeline and only becomes observable once
//! its visibility instant has passed, which is how the eventual consistency
//! of the real service is reproduced. Instants come from `tokio::time`, so
//! tests running with a paused clock see deterministic propagation.

use crate::kind::RemoteKind;
use crate::remote::{ControlPlane, Record, RemoteError};
use crate::tags::TagSet;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Versions of one value ordered by the instant they become visible.
/// `None` marks a deletion.
#[derive(Debug, Clone)]
struct Timeline<T> {
    versions: Vec<(Instant, Option<T>)>,
}

impl<T> Timeline<T> {
    fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    fn schedule(&mut self, at: Instant, value: Option<T>) {
        self.versions.push((at, value));
        self.versions.sort_by_key(|(at, _)| *at);
    }

    fn visible_at(&self, now: Instant) -> Option<&T> {
        self.versions
            .iter()
            .rev()
            .find(|(at, _)| *at <= now)
            .and_then(|(_, value)| value.as_ref())
    }

    fn latest(&self) -> Option<&T> {
        self.versions.last().and_then(|(_, value)| value.as_ref())
    }
}

#[derive(Default)]
pub struct InMemoryControlPlane {
    records: Mutex<HashMap<(RemoteKind, String), Timeline<Record>>>,
    tags: Mutex<HashMap<String, Timeline<TagSet>>>,
    failures: Mutex<VecDeque<RemoteError>>,
    get_calls: AtomicUsize,
    list_tags_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `record` the visible state of `id` once `delay` has elapsed.
    pub fn put_record(&self, kind: RemoteKind, id: &str, record: Record, delay: Duration) {
        trace!(%kind, id, ?delay, "scheduling remote record");
        lock(&self.records)
            .entry((kind, id.to_string()))
            .or_insert_with(Timeline::new)
            .schedule(Instant::now() + delay, Some(record));
    }

    /// Make `id` disappear once `delay` has elapsed.
    pub fn remove_record(&self, kind: RemoteKind, id: &str, delay: Duration) {
        trace!(%kind, id, ?delay, "scheduling remote record removal");
        lock(&self.records)
            .entry((kind, id.to_string()))
            .or_insert_with(Timeline::new)
            .schedule(Instant::now() + delay, None);
    }

    pub fn put_tags(&self, arn: &str, tags: TagSet, delay: Duration) {
        lock(&self.tags)
            .entry(arn.to_string())
            .or_insert_with(Timeline::new)
            .schedule(Instant::now() + delay, Some(tags));
    }

    pub fn remove_tags(&self, arn: &str, delay: Duration) {
        lock(&self.tags)
            .entry(arn.to_string())
            .or_insert_with(Timeline::new)
            .schedule(Instant::now() + delay, None);
    }

    /// The last scheduled record for `id`, visible or not
    pub fn scheduled_record(&self, kind: RemoteKind, id: &str) -> Option<Record> {
        lock(&self.records)
            .get(&(kind, id.to_string()))
            .and_then(Timeline::latest)
            .cloned()
    }

    /// The last scheduled tags for `arn`, visible or not
    pub fn scheduled_tags(&self, arn: &str) -> Option<TagSet> {
        lock(&self.tags)
            .get(arn)
            .and_then(Timeline::latest)
            .cloned()
    }

    /// Fail the next call with `error`. Queued errors are consumed in order.
    pub fn inject_failure(&self, error: RemoteError) {
        lock(&self.failures).push_back(error);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn list_tags_calls(&self) -> usize {
        self.list_tags_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<RemoteError> {
        lock(&self.failures).pop_front()
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn get_resource(&self, kind: RemoteKind, id: &str) -> Result<Record, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        lock(&self.records)
            .get(&(kind, id.to_string()))
            .and_then(|timeline| timeline.visible_at(Instant::now()))
            .cloned()
            .ok_or_else(|| RemoteError::not_found(kind.name(), id))
    }

    async fn list_tags_for_resource(&self, arn: &str) -> Result<TagSet, RemoteError> {
        self.list_tags_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        lock(&self.tags)
            .get(arn)
            .and_then(|timeline| timeline.visible_at(Instant::now()))
            .cloned()
            .ok_or_else(|| RemoteError::not_found("resource", arn))
    }
}
