use thiserror::Error;

/// A single failed read from an open stream handle.
///
/// Transient by definition: the engine recovers by tearing the handle
/// down and reconnecting, never by retrying the same handle.
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error("stream closed")]
    Closed,

    #[error("decode error: {reason}")]
    Decode { reason: String },

    #[error("read timed out")]
    Timeout,
}

impl ReadFailure {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// Failure to open a stream handle against a source URL.
#[derive(Debug, Error)]
#[error("failed to open stream `{url}`: {reason}")]
pub struct OpenError {
    pub url: String,
    pub reason: String,
}

impl OpenError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to resolve quality variants for a stream identifier.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("invalid stream identifier `{stream_id}`")]
    InvalidStream { stream_id: String },

    #[error("no quality variants currently available")]
    NoVariants,

    #[error("no preferred quality matches the available variants: {available:?}")]
    NoCompatibleVariant { available: Vec<String> },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },
}

impl ResolutionError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }
}

/// Failure of an on-demand bandwidth measurement.
#[derive(Debug, Error)]
#[error("bandwidth probe failed: {reason}")]
pub struct ProbeError {
    pub reason: String,
}

impl ProbeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Terminal outcomes of an engine run.
///
/// Sustained read failures never terminate the engine on their own; the
/// only error exits are consumer cancellation and a fallback entry that
/// cannot resolve any quality variant at all.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture cancelled")]
    Cancelled,

    #[error("quality resolution failed: {source}")]
    Resolution {
        #[from]
        source: ResolutionError,
    },

    #[error("bandwidth probe failed: {source}")]
    Probe {
        #[from]
        source: ProbeError,
    },
}
