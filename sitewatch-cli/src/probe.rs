//! Timed-download bandwidth probe.

use std::time::Duration;

use async_trait::async_trait;
use capture_engine::{Bandwidth, BandwidthProbe, ProbeError};
use futures::StreamExt;
use reqwest::Client;
use tokio::time::Instant;
use tracing::debug;

const MAX_PROBE_BYTES: usize = 8 * 1024 * 1024;
const MAX_PROBE_DURATION: Duration = Duration::from_secs(8);

/// Estimates download throughput by streaming a test object and timing
/// how long the bytes take to arrive. The download is capped in both
/// size and wall time so a fat pipe or a stalled server cannot drag the
/// capture loop.
pub struct HttpBandwidthProbe {
    client: Client,
    probe_url: String,
}

impl HttpBandwidthProbe {
    pub fn new(client: Client, probe_url: impl Into<String>) -> Self {
        Self {
            client,
            probe_url: probe_url.into(),
        }
    }
}

#[async_trait]
impl BandwidthProbe for HttpBandwidthProbe {
    async fn measure(&self) -> Result<Bandwidth, ProbeError> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.probe_url)
            .send()
            .await
            .map_err(|e| ProbeError::new(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::new(format!("HTTP {status}")));
        }

        let mut received = 0usize;
        let mut body = response.bytes_stream();
        while received < MAX_PROBE_BYTES && started.elapsed() < MAX_PROBE_DURATION {
            match body.next().await {
                Some(Ok(chunk)) => received += chunk.len(),
                Some(Err(err)) => return Err(ProbeError::new(err.to_string())),
                None => break,
            }
        }

        let secs = started.elapsed().as_secs_f64();
        if received == 0 || secs <= 0.0 {
            return Err(ProbeError::new("probe transferred no data"));
        }

        let download_mbps = received as f64 * 8.0 / 1_000_000.0 / secs;
        debug!(received, secs, download_mbps, "bandwidth probe complete");
        Ok(Bandwidth {
            download_mbps,
            // Upload is not exercised by quality selection.
            upload_mbps: 0.0,
        })
    }
}
