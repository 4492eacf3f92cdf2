use bytes::Bytes;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A playable stream endpoint.
///
/// Immutable once constructed; a fresh `StreamSource` is built on every
/// reconnection or quality re-resolution. The quality label is set only
/// for fallback sources.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub url: String,
    pub quality: Option<String>,
}

impl StreamSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: None,
        }
    }

    pub fn with_quality(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: Some(quality.into()),
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.quality {
            Some(quality) => write!(f, "{} ({quality})", self.url),
            None => write!(f, "{}", self.url),
        }
    }
}

/// Quality label ("1080p", "best", ...) to source mapping, refreshed on
/// every re-resolution and never cached across fallback initialisations.
pub type VariantMap = FxHashMap<String, StreamSource>;

/// A frame accepted for emission, stamped post-interval-gate.
///
/// The buffer ownership transfers to the consumer on emit; the engine
/// keeps no copy beyond the single frame currently in flight.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: Bytes,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_quality_label_when_present() {
        let primary = StreamSource::new("https://example.com/live");
        assert_eq!(primary.to_string(), "https://example.com/live");

        let fallback = StreamSource::with_quality("https://example.com/720", "720p");
        assert_eq!(fallback.to_string(), "https://example.com/720 (720p)");
    }
}
