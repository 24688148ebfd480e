//! Delivery client for pushing pending metrics to the remote collector.
//!
//! Each metric kind posts to its own sub-path of the configured endpoint
//! with a shared-secret `key` query parameter:
//!
//! ```text
//! POST {endpoint}/api/counters/{app_name}/?key={key}
//! POST {endpoint}/api/gauges/{app_name}/?key={key}
//! POST {endpoint}/api/events/{app_name}/?key={key}
//! ```
//!
//! Bodies are JSON: `{"<kind>": [...], "device": {...}}`. Delivery is
//! confirmed only by an exact HTTP 200; any other status, transport error,
//! or serialization failure means the caller must retain the pending
//! collection unchanged for a later attempt. There is no retry or backoff
//! here — retry is implicit in the retained data being re-sent on the next
//! flush trigger.
//!
//! The [`Collector`] trait is the seam the buffer depends on, so tests can
//! substitute an in-process double for the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::device::DeviceIdentity;
use crate::error::DeliveryError;
use crate::metric::{Counter, Event, Gauge};

/// Configuration for the remote collector endpoint.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Base endpoint URL (e.g. `https://stats.example.com`).
    pub endpoint: String,
    /// Application name, used as the final path segment.
    pub app_name: String,
    /// Shared secret sent as the `key` query parameter.
    pub key: String,
    /// HTTP timeout for each POST.
    pub timeout: Duration,
}

impl CollectorConfig {
    /// Creates a new config with the default 30s timeout.
    pub fn new(
        endpoint: impl Into<String>,
        app_name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_name: app_name.into(),
            key: key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport-independent delivery seam.
///
/// Each method is independently callable and independently failable:
/// `Ok(n)` means the collector confirmed receipt of `n` records (or the
/// input was empty and nothing was sent); `Err` means the pending
/// collection for that kind must be retained unchanged.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Delivers pending counters.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if encoding, transport, or the server
    /// response prevented confirmed delivery.
    async fn send_counters(
        &self,
        counters: &[Counter],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError>;

    /// Delivers pending gauges.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if encoding, transport, or the server
    /// response prevented confirmed delivery.
    async fn send_gauges(
        &self,
        gauges: &[Gauge],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError>;

    /// Delivers pending events.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if encoding, transport, or the server
    /// response prevented confirmed delivery.
    async fn send_events(
        &self,
        events: &[Event],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError>;
}

#[derive(Serialize)]
struct CountersPayload<'a> {
    counters: &'a [Counter],
    device: &'a DeviceIdentity,
}

#[derive(Serialize)]
struct GaugesPayload<'a> {
    gauges: &'a [Gauge],
    device: &'a DeviceIdentity,
}

#[derive(Serialize)]
struct EventsPayload<'a> {
    events: &'a [Event],
    device: &'a DeviceIdentity,
}

/// HTTP implementation of [`Collector`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    config: CollectorConfig,
    client: reqwest::Client,
}

impl HttpCollector {
    /// Creates a collector for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ClientCreate`] if the HTTP client cannot
    /// be constructed.
    pub fn new(config: CollectorConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeliveryError::ClientCreate { source: e })?;
        Ok(Self { config, client })
    }

    /// Builds the kind-specific POST URL (without the query string).
    fn kind_url(&self, kind: &str) -> String {
        format!(
            "{}/api/{}/{}/",
            self.config.endpoint.trim_end_matches('/'),
            kind,
            self.config.app_name
        )
    }

    async fn post_kind<T: Serialize>(
        &self,
        kind: &str,
        payload: &T,
        count: usize,
    ) -> Result<usize, DeliveryError> {
        info!("posting {count} {kind} to {}", self.config.endpoint);

        let body = serde_json::to_vec(payload).map_err(|e| DeliveryError::Encode { source: e })?;

        let response = self
            .client
            .post(self.kind_url(kind))
            .query(&[("key", self.config.key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport { source: e })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::OK {
            info!("{kind} delivered: {text}");
            Ok(count)
        } else {
            error!("{kind} not delivered ({}): {text}", status.as_u16());
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn send_counters(
        &self,
        counters: &[Counter],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError> {
        if counters.is_empty() {
            return Ok(0);
        }
        let payload = CountersPayload { counters, device };
        self.post_kind("counters", &payload, counters.len()).await
    }

    async fn send_gauges(
        &self,
        gauges: &[Gauge],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError> {
        if gauges.is_empty() {
            return Ok(0);
        }
        let payload = GaugesPayload { gauges, device };
        self.post_kind("gauges", &payload, gauges.len()).await
    }

    async fn send_events(
        &self,
        events: &[Event],
        device: &DeviceIdentity,
    ) -> Result<usize, DeliveryError> {
        if events.is_empty() {
            return Ok(0);
        }
        let payload = EventsPayload { events, device };
        self.post_kind("events", &payload, events.len()).await
    }
}
