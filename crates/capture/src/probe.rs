use async_trait::async_trait;

use crate::error::ProbeError;

/// A point-in-time throughput measurement in megabits per second.
///
/// Only the download figure drives quality selection; upload is carried
/// for completeness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bandwidth {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

/// Measures current link throughput on demand.
///
/// Measurements may take seconds, so the engine calls this only when it
/// needs to (re)select a fallback quality.
#[async_trait]
pub trait BandwidthProbe: Send + Sync {
    async fn measure(&self) -> Result<Bandwidth, ProbeError>;
}
