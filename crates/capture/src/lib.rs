//! # Capture Engine
//!
//! Continuously samples frames from a live video stream under unreliable
//! network conditions. The engine pulls frames from a [`StreamReader`],
//! gates them by a (runtime-adjustable) capture interval, and emits
//! `(frame, timestamp)` pairs onto a bounded channel so the consumer
//! controls pacing.
//!
//! Failure handling is availability-first: every read failure tears the
//! connection down and reconnects, and after five consecutive failures
//! without a single prior success the engine permanently hands off to a
//! bandwidth-adaptive fallback path that selects a quality variant via a
//! [`BandwidthProbe`] and a [`QualityResolver`]. The handoff is one-way;
//! once in fallback the primary source is never read again.
//!
//! The three external capabilities (reader, resolver, probe) are traits so
//! callers can plug in their own transports.

pub mod config;
pub mod error;
mod engine;
mod fallback;
pub mod probe;
pub mod quality;
pub mod reader;
pub mod resolver;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CaptureConfig;
pub use engine::{CaptureEngine, IntervalHandle};
pub use error::{CaptureError, OpenError, ProbeError, ReadFailure, ResolutionError};
pub use probe::{Bandwidth, BandwidthProbe};
pub use quality::{preferred_labels, select_variant};
pub use reader::{FrameHandle, StreamReader};
pub use resolver::QualityResolver;
pub use source::{CapturedFrame, StreamSource, VariantMap};
