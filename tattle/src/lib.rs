//! # tattle
//!
//! Buffered application telemetry with best-effort HTTP delivery.
//!
//! tattle accumulates three metric primitives — counters, gauges, and
//! events — in memory, persists the pending state across process restarts
//! through a key-value store adapter, and flushes to a remote collector
//! over HTTP POST. Delivery is best-effort: there is no delivery
//! guarantee and no exactly-once semantics; data that fails to send stays
//! queued and is retried on the next trigger (pending-count threshold or
//! an app-lifecycle transition).
//!
//! ## Key Properties
//!
//! - Synchronous, non-blocking record calls; delivery runs as an async task
//! - Counters merge by name; gauges and events keep every observation
//! - Pending state survives restarts and tolerates corrupted local blobs
//! - Per-kind delivery: one failing kind never blocks the others
//! - Lifecycle-triggered flush under a host-granted grace period
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tattle::{
//!     CollectorConfig, DeviceSnapshot, FileStore, HttpCollector, LifecycleSignal,
//!     NoExtension, StaticDevice, Telemetry, TelemetryConfig,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> tattle::Result<()> {
//! let collector = HttpCollector::new(CollectorConfig::new(
//!     "https://stats.example.com",
//!     "MyApp",
//!     "shared-secret",
//! ))?;
//! let store = Arc::new(FileStore::open("./tattle_state.json"));
//! let device = Arc::new(StaticDevice::new(DeviceSnapshot {
//!     model: "MacBookPro18,3".into(),
//!     app_version: "1.0".into(),
//!     build_number: "123".into(),
//!     os_name: "macOS".into(),
//!     os_version: "14.2".into(),
//!     os_version_string: "Version 14.2 (Build 23C64)".into(),
//! }));
//!
//! let telemetry = Telemetry::new(
//!     TelemetryConfig::new(),
//!     Arc::new(collector),
//!     store,
//!     device,
//! )?;
//!
//! telemetry.record_counter("documentOpened", 1);
//! telemetry.record_gauge("batteryLevel", 0.82);
//! telemetry.record_event("buttonPressed", None);
//!
//! // On app shutdown:
//! telemetry
//!     .handle_lifecycle(LifecycleSignal::WillTerminate, &NoExtension)
//!     .await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`buffer`] — the telemetry buffer: record, flush policy, persistence
//! - [`collector`] — HTTP delivery client and the [`Collector`] seam
//! - [`metric`] — counter/gauge/event record types
//! - [`device`] — device identity snapshot and provider
//! - [`store`] — persistent key-value store adapter
//! - [`lifecycle`] — suspend/terminate signals and the grace-period capability
//! - [`error`] — error types

pub mod buffer;
pub mod collector;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod metric;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use buffer::{FlushSummary, Telemetry, TelemetryConfig};
pub use collector::{Collector, CollectorConfig, HttpCollector};
pub use device::{DeviceIdentity, DeviceProvider, DeviceSnapshot, StaticDevice};
pub use error::{DeliveryError, Result, StoreError, TattleError};
pub use lifecycle::{ExecutionExtender, ExtensionToken, LifecycleSignal, NoExtension};
pub use metric::{Counter, Event, Gauge, StandardCounter, UnixSeconds};
pub use store::{FileStore, MemoryStore, StateStore, StateStoreExt};
