//! Bandwidth-keyed quality selection.
//!
//! Selection is a strict preference ladder over quality labels: the
//! measured download speed picks a ladder and the first label present in
//! the resolved variant set wins. Deterministic given (speed, labels).

use crate::source::{StreamSource, VariantMap};

/// Labels tried when the link measures above 10 Mbps.
pub const FAST_LADDER: &[&str] = &["best", "1080p", "720p", "480p", "360p", "240p", "worst"];

/// Labels tried between 5 (exclusive) and 10 (inclusive) Mbps.
pub const MEDIUM_LADDER: &[&str] = &["720p", "480p", "360p", "240p", "worst"];

/// Labels tried at 5 Mbps and below.
pub const SLOW_LADDER: &[&str] = &["480p", "360p", "240p", "worst"];

/// The preference ladder for a measured download speed.
pub fn preferred_labels(download_mbps: f64) -> &'static [&'static str] {
    if download_mbps > 10.0 {
        FAST_LADDER
    } else if download_mbps > 5.0 {
        MEDIUM_LADDER
    } else {
        SLOW_LADDER
    }
}

/// Pick the first ladder label present in `variants`.
///
/// Returns the winning label together with a fresh [`StreamSource`]
/// carrying that label, or `None` when no candidate is available, which
/// the caller must treat as an unrecoverable resolution failure for this
/// attempt.
pub fn select_variant(
    download_mbps: f64,
    variants: &VariantMap,
) -> Option<(&'static str, StreamSource)> {
    for label in preferred_labels(download_mbps) {
        if let Some(source) = variants.get(*label) {
            return Some((label, StreamSource::with_quality(&source.url, *label)));
        }
    }
    None
}
