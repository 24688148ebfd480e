//! Lifecycle trigger: forced flushes on app suspend/terminate.
//!
//! Host environments deliver suspend/terminate notifications in
//! platform-specific ways; the buffer only depends on being told that a
//! transition happened, via [`LifecycleSignal`]. Because the OS may stop
//! the process shortly after the signal, the handler asks the host for a
//! bounded grace period through the [`ExecutionExtender`] capability,
//! flushes within it, persists whatever is left, and releases the grant.
//!
//! This is the only place a flush is forced unconditionally, independent
//! of the pending threshold.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::buffer::Telemetry;

/// An app-level transition reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The app is about to be suspended (lose foreground execution).
    WillSuspend,
    /// The app is about to be terminated.
    WillTerminate,
}

/// Opaque handle for a granted execution extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionToken(pub u64);

/// Host capability for running past normal suspension.
///
/// The grant is best-effort: the host may revoke it at any time, in which
/// case an in-flight flush is simply abandoned — per-kind deliveries
/// already confirmed stand, and un-sent pending data remains queued for
/// the next launch.
pub trait ExecutionExtender: Send + Sync {
    /// Requests up to `budget` of extra execution time.
    ///
    /// Returns `None` when the host grants nothing; the flush is still
    /// attempted, it just races normal suspension.
    fn request_extra_time(&self, budget: Duration) -> Option<ExtensionToken>;

    /// Returns a previously granted extension to the host.
    fn release(&self, token: ExtensionToken);
}

/// An [`ExecutionExtender`] for hosts without suspension semantics
/// (servers, CLIs, tests). Grants nothing and ignores releases.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtension;

impl ExecutionExtender for NoExtension {
    fn request_extra_time(&self, _budget: Duration) -> Option<ExtensionToken> {
        None
    }

    fn release(&self, _token: ExtensionToken) {}
}

impl Telemetry {
    /// Handles a lifecycle transition: forces a flush under the host
    /// grace period, then persists the pending state regardless of the
    /// flush outcome.
    ///
    /// A flush still in flight when the grace period expires is abandoned
    /// mid-way; nothing is rolled back.
    pub async fn handle_lifecycle(&self, signal: LifecycleSignal, extender: &dyn ExecutionExtender) {
        info!("lifecycle transition: {signal:?}");

        let grace = self.flush_grace();
        let token = extender.request_extra_time(grace);
        debug!("extra execution time granted: {}", token.is_some());

        if tokio::time::timeout(grace, self.flush()).await.is_err() {
            warn!("flush abandoned after {grace:?} grace period");
        }

        self.persist_pending();

        if let Some(token) = token {
            extender.release(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TelemetryConfig;
    use crate::collector::Collector;
    use crate::device::{DeviceIdentity, DeviceSnapshot, StaticDevice};
    use crate::error::DeliveryError;
    use crate::metric::{Counter, Event, Gauge};
    use crate::store::{MemoryStore, StateStore, StateStoreExt};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct OkCollector;

    #[async_trait]
    impl Collector for OkCollector {
        async fn send_counters(
            &self,
            counters: &[Counter],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            Ok(counters.len())
        }
        async fn send_gauges(
            &self,
            gauges: &[Gauge],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            Ok(gauges.len())
        }
        async fn send_events(
            &self,
            events: &[Event],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            Ok(events.len())
        }
    }

    /// Collector that never completes, to exercise grace-period expiry.
    struct StuckCollector;

    #[async_trait]
    impl Collector for StuckCollector {
        async fn send_counters(
            &self,
            _counters: &[Counter],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            std::future::pending().await
        }
        async fn send_gauges(
            &self,
            _gauges: &[Gauge],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            std::future::pending().await
        }
        async fn send_events(
            &self,
            _events: &[Event],
            _device: &DeviceIdentity,
        ) -> Result<usize, DeliveryError> {
            std::future::pending().await
        }
    }

    /// Extender that records request/release pairing.
    #[derive(Default)]
    struct CountingExtender {
        requests: AtomicUsize,
        released: Mutex<Vec<ExtensionToken>>,
    }

    impl ExecutionExtender for CountingExtender {
        fn request_extra_time(&self, _budget: Duration) -> Option<ExtensionToken> {
            let id = self.requests.fetch_add(1, Ordering::SeqCst) as u64;
            Some(ExtensionToken(id))
        }

        fn release(&self, token: ExtensionToken) {
            self.released.lock().unwrap().push(token);
        }
    }

    fn test_device() -> Arc<StaticDevice> {
        Arc::new(StaticDevice::new(DeviceSnapshot {
            model: "TestDevice1,1".to_string(),
            app_version: "1.0".to_string(),
            build_number: "123".to_string(),
            os_name: "TestOS".to_string(),
            os_version: "1.2".to_string(),
            os_version_string: "TestOS 1.2".to_string(),
        }))
    }

    fn quiet_config() -> TelemetryConfig {
        TelemetryConfig::new().with_max_pending_before_flush(100)
    }

    #[tokio::test]
    async fn lifecycle_flushes_and_releases_extension() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Telemetry::new(
            quiet_config(),
            Arc::new(OkCollector),
            Arc::clone(&store) as Arc<dyn StateStore>,
            test_device(),
        )
        .unwrap();
        telemetry.record_event("closing", None);

        let extender = CountingExtender::default();
        telemetry
            .handle_lifecycle(LifecycleSignal::WillTerminate, &extender)
            .await;

        assert_eq!(telemetry.pending_len(), 0);
        assert!(store.events().is_empty());
        assert_eq!(extender.requests.load(Ordering::SeqCst), 1);
        assert_eq!(extender.released.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_grace_abandons_flush_but_persists_pending() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Telemetry::new(
            quiet_config().with_flush_grace(Duration::from_millis(10)),
            Arc::new(StuckCollector),
            Arc::clone(&store) as Arc<dyn StateStore>,
            test_device(),
        )
        .unwrap();
        telemetry.record_gauge("battery", 0.4);

        let extender = CountingExtender::default();
        telemetry
            .handle_lifecycle(LifecycleSignal::WillSuspend, &extender)
            .await;

        // Nothing was delivered; everything is still queued and persisted.
        assert_eq!(telemetry.pending_len(), 2);
        assert_eq!(store.gauges().len(), 1);
        assert_eq!(store.counters().len(), 1);
        assert_eq!(extender.released.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_extension_host_still_flushes() {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Telemetry::new(
            quiet_config(),
            Arc::new(OkCollector),
            store,
            test_device(),
        )
        .unwrap();

        telemetry
            .handle_lifecycle(LifecycleSignal::WillSuspend, &NoExtension)
            .await;
        assert_eq!(telemetry.pending_len(), 0);
    }
}
