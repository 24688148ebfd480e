//! The telemetry buffer: in-memory accumulation, flush policy, persistence.
//!
//! [`Telemetry`] owns the three pending collections and the persisted
//! device id. Record calls are synchronous with immediate in-memory
//! effect; delivery runs as an async task off the caller's critical path.
//! Once the combined pending total crosses the configured threshold, a
//! flush is scheduled fire-and-forget on the runtime captured at
//! construction.
//!
//! # Concurrency
//!
//! Pending state lives behind a `std::sync::Mutex` that is never held
//! across an await point. A flush snapshots the pending collections,
//! performs network I/O outside the lock, and then commits per-kind:
//! delivered counters are subtracted by name and delivered gauge/event
//! prefixes are drained, so a record call that lands while a flush is in
//! flight is never silently dropped when the flush clears that kind.
//! Flushes themselves serialize on an async mutex.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collector::Collector;
use crate::device::{DeviceIdentity, DeviceProvider};
use crate::error::{DeliveryError, Result};
use crate::metric::{Counter, Event, Gauge, StandardCounter, now_unix};
use crate::store::{StateStore, StateStoreExt};

/// Buffer policy configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Combined pending-record count (all three kinds) above which a
    /// flush is scheduled. Defaults to 2.
    pub max_pending_before_flush: usize,
    /// Grace period requested for a lifecycle-triggered flush. A flush
    /// still in flight when it expires is abandoned. Defaults to 25s.
    pub flush_grace: Duration,
}

impl TelemetryConfig {
    /// Creates a config with the default policy.
    pub fn new() -> Self {
        Self {
            max_pending_before_flush: 2,
            flush_grace: Duration::from_secs(25),
        }
    }

    /// Sets the combined pending threshold.
    #[must_use]
    pub fn with_max_pending_before_flush(mut self, max: usize) -> Self {
        self.max_pending_before_flush = max;
        self
    }

    /// Sets the lifecycle flush grace period.
    #[must_use]
    pub fn with_flush_grace(mut self, grace: Duration) -> Self {
        self.flush_grace = grace;
        self
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-kind outcome of one flush attempt.
///
/// `Ok(n)` means the collector confirmed `n` records (0 when nothing was
/// pending for that kind); `Err` means that kind was retained unchanged.
#[derive(Debug)]
pub struct FlushSummary {
    /// Outcome for the counters kind.
    pub counters: std::result::Result<usize, DeliveryError>,
    /// Outcome for the gauges kind.
    pub gauges: std::result::Result<usize, DeliveryError>,
    /// Outcome for the events kind.
    pub events: std::result::Result<usize, DeliveryError>,
}

impl FlushSummary {
    /// True when every kind was delivered (or had nothing pending).
    pub fn fully_delivered(&self) -> bool {
        self.counters.is_ok() && self.gauges.is_ok() && self.events.is_ok()
    }
}

#[derive(Debug, Default)]
struct Pending {
    counters: HashMap<String, Counter>,
    gauges: Vec<Gauge>,
    events: Vec<Event>,
}

impl Pending {
    fn total(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.events.len()
    }
}

struct Inner {
    config: TelemetryConfig,
    collector: Arc<dyn Collector>,
    store: Arc<dyn StateStore>,
    device: Arc<dyn DeviceProvider>,
    device_id: String,
    pending: Mutex<Pending>,
    /// Serializes whole-flush attempts; never guards the record path.
    flush_gate: tokio::sync::Mutex<()>,
    runtime: Handle,
}

/// Buffered telemetry recorder with best-effort delivery.
///
/// Cheap to clone: clones share the same pending state, so one handle can
/// be passed to whatever records metrics and another to whatever relays
/// lifecycle transitions.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Inner>,
}

impl Telemetry {
    /// Constructs a buffer, restoring state from `store` if present.
    ///
    /// Restores the device id and all three pending collections, or
    /// generates a fresh UUID device id and persists it immediately.
    /// Unconditionally records one `appLaunched` counter increment.
    ///
    /// # Errors
    ///
    /// Returns an error if a freshly generated device id cannot be
    /// persisted.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime: the runtime handle is
    /// captured here to schedule threshold-triggered flushes.
    pub fn new(
        config: TelemetryConfig,
        collector: Arc<dyn Collector>,
        store: Arc<dyn StateStore>,
        device: Arc<dyn DeviceProvider>,
    ) -> Result<Self> {
        let device_id = match store.device_id() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                store.set_device_id(&id)?;
                id
            }
        };

        let pending = Pending {
            counters: store.counters(),
            gauges: store.gauges(),
            events: store.events(),
        };
        info!(
            "initialising telemetry for device {device_id} ({} pending records restored)",
            pending.total()
        );

        let telemetry = Self {
            inner: Arc::new(Inner {
                config,
                collector,
                store,
                device,
                device_id,
                pending: Mutex::new(pending),
                flush_gate: tokio::sync::Mutex::new(()),
                runtime: Handle::current(),
            }),
        };

        telemetry.increment(StandardCounter::AppLaunched);
        Ok(telemetry)
    }

    /// Merges an increment into the pending counter for `name`.
    ///
    /// Repeated increments sum `count` and replace `updated_at` while
    /// preserving the original `created_at`. Triggers the flush-threshold
    /// check afterwards.
    pub fn record_counter(&self, name: &str, amount: i64) {
        debug!("incrementing counter {name} by {amount}");
        let now = now_unix();
        let total = {
            let mut pending = self.lock_pending();
            match pending.counters.entry(name.to_string()) {
                Entry::Occupied(mut entry) => entry.get_mut().merge(amount, now),
                Entry::Vacant(entry) => {
                    entry.insert(Counter::new(name, amount, now));
                }
            }
            pending.total()
        };
        self.flush_threshold_check(total);
    }

    /// Records a well-known counter with an increment of 1.
    pub fn increment(&self, counter: StandardCounter) {
        self.record_counter(counter.name(), 1);
    }

    /// Appends a gauge observation. Gauges never merge: every call adds
    /// an independent record, duplicates by name included.
    pub fn record_gauge(&self, name: &str, value: f32) {
        debug!("registering gauge {name} with value {value}");
        let total = {
            let mut pending = self.lock_pending();
            pending.gauges.push(Gauge::new(name, value, now_unix()));
            pending.total()
        };
        self.flush_threshold_check(total);
    }

    /// Appends an event record, optionally with string attributes.
    pub fn record_event(&self, name: &str, attributes: Option<HashMap<String, String>>) {
        debug!("registering event {name}");
        let total = {
            let mut pending = self.lock_pending();
            pending.events.push(Event::new(name, attributes, now_unix()));
            pending.total()
        };
        self.flush_threshold_check(total);
    }

    /// Schedules a fire-and-forget flush once the combined pending total
    /// exceeds the configured threshold. The caller never waits.
    fn flush_threshold_check(&self, total: usize) {
        if total > self.inner.config.max_pending_before_flush {
            debug!("{total} pending records over threshold, scheduling flush");
            let this = self.clone();
            self.inner.runtime.spawn(async move {
                this.flush().await;
            });
        }
    }

    /// Attempts to deliver all three pending kinds to the collector.
    ///
    /// The kinds are attempted independently — a failure in one does not
    /// block the others. Delivered kinds are cleared (minus any records
    /// that arrived while the flush was in flight); failed kinds are
    /// retained unchanged. Whatever remains is then persisted to the
    /// store for the next attempt or the next launch.
    pub async fn flush(&self) -> FlushSummary {
        let _gate = self.inner.flush_gate.lock().await;

        let device = self.device_identity();
        let (counters, gauges, events) = {
            let pending = self.lock_pending();
            (
                pending.counters.values().cloned().collect::<Vec<_>>(),
                pending.gauges.clone(),
                pending.events.clone(),
            )
        };
        info!(
            "flushing {} counters, {} gauges, {} events",
            counters.len(),
            gauges.len(),
            events.len()
        );

        let counters_outcome = self.inner.collector.send_counters(&counters, &device).await;
        if counters_outcome.is_ok() {
            self.commit_counters(&counters);
        }

        let gauges_outcome = self.inner.collector.send_gauges(&gauges, &device).await;
        if gauges_outcome.is_ok() {
            self.commit_gauges(gauges.len());
        }

        let events_outcome = self.inner.collector.send_events(&events, &device).await;
        if events_outcome.is_ok() {
            self.commit_events(events.len());
        }

        self.persist_pending();

        FlushSummary {
            counters: counters_outcome,
            gauges: gauges_outcome,
            events: events_outcome,
        }
    }

    /// Removes delivered counts from the pending counters.
    ///
    /// Increments that arrived for the same name while the flush was in
    /// flight survive as the remaining delta.
    fn commit_counters(&self, sent: &[Counter]) {
        let mut pending = self.lock_pending();
        for counter in sent {
            if let Entry::Occupied(mut entry) = pending.counters.entry(counter.name.clone()) {
                let remaining = entry.get().count - counter.count;
                if remaining <= 0 {
                    entry.remove();
                } else {
                    // A positive remainder consists solely of increments
                    // merged while the flush was in flight, so its
                    // timestamp window restarts at the mid-flight merge.
                    let kept = entry.get_mut();
                    kept.count = remaining;
                    kept.created_at = kept.updated_at;
                }
            }
        }
    }

    /// Drains the delivered prefix; appends made mid-flight stay queued.
    fn commit_gauges(&self, sent: usize) {
        let mut pending = self.lock_pending();
        let sent = sent.min(pending.gauges.len());
        pending.gauges.drain(..sent);
    }

    fn commit_events(&self, sent: usize) {
        let mut pending = self.lock_pending();
        let sent = sent.min(pending.events.len());
        pending.events.drain(..sent);
    }

    /// Writes the current pending collections to the store.
    ///
    /// Write failures are logged and swallowed: the in-memory state is
    /// still intact and will be re-persisted on the next trigger.
    pub(crate) fn persist_pending(&self) {
        let (counters, gauges, events) = {
            let pending = self.lock_pending();
            (
                pending.counters.clone(),
                pending.gauges.clone(),
                pending.events.clone(),
            )
        };
        debug!("persisting pending state");
        if let Err(e) = self.inner.store.set_counters(&counters) {
            warn!("failed to persist counters: {e}");
        }
        if let Err(e) = self.inner.store.set_gauges(&gauges) {
            warn!("failed to persist gauges: {e}");
        }
        if let Err(e) = self.inner.store.set_events(&events) {
            warn!("failed to persist events: {e}");
        }
    }

    /// The identity snapshot sent with every payload: the persisted
    /// device id plus fresh host metadata.
    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity::from_snapshot(self.inner.device_id.clone(), self.inner.device.snapshot())
    }

    /// Combined number of pending records across all three kinds.
    pub fn pending_len(&self) -> usize {
        self.lock_pending().total()
    }

    /// Snapshot of the pending counters, keyed by name.
    pub fn pending_counters(&self) -> HashMap<String, Counter> {
        self.lock_pending().counters.clone()
    }

    /// Snapshot of the pending gauges.
    pub fn pending_gauges(&self) -> Vec<Gauge> {
        self.lock_pending().gauges.clone()
    }

    /// Snapshot of the pending events.
    pub fn pending_events(&self) -> Vec<Event> {
        self.lock_pending().events.clone()
    }

    pub(crate) fn flush_grace(&self) -> Duration {
        self.inner.config.flush_grace
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.inner.pending.lock().expect("pending lock poisoned")
    }
}
