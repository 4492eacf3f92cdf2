//! Generic-stream capture entered after sustained primary failure.
//!
//! Selects a quality variant from the measured link speed, then runs its
//! own read/gate/emit cycle. Control never returns to the primary loop.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::engine::{CaptureState, release};
use crate::error::{CaptureError, ReadFailure};
use crate::probe::BandwidthProbe;
use crate::quality::select_variant;
use crate::reader::{FrameHandle, StreamReader};
use crate::resolver::QualityResolver;
use crate::source::{CapturedFrame, StreamSource};

pub(crate) struct FallbackController<'a, R, Q, B> {
    reader: &'a R,
    resolver: &'a Q,
    probe: &'a B,
    stream_id: &'a str,
    config: &'a CaptureConfig,
    interval: watch::Receiver<Duration>,
}

impl<'a, R, Q, B> FallbackController<'a, R, Q, B>
where
    R: StreamReader,
    Q: QualityResolver,
    B: BandwidthProbe,
{
    pub fn new(
        reader: &'a R,
        resolver: &'a Q,
        probe: &'a B,
        stream_id: &'a str,
        config: &'a CaptureConfig,
        interval: watch::Receiver<Duration>,
    ) -> Self {
        Self {
            reader,
            resolver,
            probe,
            stream_id,
            config,
            interval,
        }
    }

    /// Probe the link, resolve the variant set and walk the preference
    /// ladder. Errors here are fatal only for the initial entry; the
    /// re-resolution path logs and retries instead.
    async fn select_source(&self) -> Result<StreamSource, CaptureError> {
        let bandwidth = self.probe.measure().await?;
        let variants = self.resolver.resolve(self.stream_id).await?;
        debug!(
            download_mbps = bandwidth.download_mbps,
            available = ?variants.keys().collect::<Vec<_>>(),
            "resolved fallback variants"
        );
        match select_variant(bandwidth.download_mbps, &variants) {
            Some((label, source)) => {
                info!(quality = label, download_mbps = bandwidth.download_mbps, "selected fallback quality");
                Ok(source)
            }
            None => Err(crate::error::ResolutionError::NoCompatibleVariant {
                available: variants.keys().cloned().collect(),
            }
            .into()),
        }
    }

    /// Run the generic capture loop until cancellation.
    ///
    /// Terminates early only when the very first resolution finds no
    /// usable variant; later re-resolution failures are reported and
    /// retried, favouring availability over fast-fail.
    pub async fn run(
        mut self,
        tx: &mpsc::Sender<CapturedFrame>,
        token: &CancellationToken,
    ) -> Result<(), CaptureError> {
        let source = self.select_source().await?;
        let mut handle = match self.reader.open(&source).await {
            Ok(h) => Some(h),
            Err(err) => {
                warn!(error = %err, "failed to open fallback stream");
                None
            }
        };

        // Gate resets at the handoff boundary: the first fallback frame
        // waits a full interval.
        let mut state = CaptureState::fallback_entry();

        loop {
            if token.is_cancelled() {
                release(&mut handle).await;
                return Err(CaptureError::Cancelled);
            }

            let outcome = match handle.as_mut() {
                Some(h) => tokio::select! {
                    _ = token.cancelled() => {
                        release(&mut handle).await;
                        return Err(CaptureError::Cancelled);
                    }
                    outcome = h.read() => outcome,
                },
                // A missing handle (failed open or failed re-resolution)
                // reads as a failure so the threshold path retries it.
                None => Err(ReadFailure::Closed),
            };

            match outcome {
                Err(failure) => {
                    let failures = state.record_failure();
                    warn!(failures, error = %failure, "failed to read frame from generic stream");

                    // Re-resolution engages on the same threshold as the
                    // primary handoff, and like it only while no read has
                    // ever succeeded. The counter resets only on a
                    // successful re-resolution, so a failing one is
                    // retried on the next pass.
                    if state.should_hand_off(self.config.failure_threshold) {
                        release(&mut handle).await;
                        info!("reinitialising generic stream");
                        tokio::select! {
                            _ = token.cancelled() => return Err(CaptureError::Cancelled),
                            _ = tokio::time::sleep(self.config.reopen_delay) => {}
                        }
                        match self.select_source().await {
                            Ok(source) => {
                                match self.reader.open(&source).await {
                                    Ok(h) => handle = Some(h),
                                    Err(err) => {
                                        warn!(error = %err, "failed to open re-resolved fallback stream");
                                    }
                                }
                                state.consecutive_failures = 0;
                            }
                            Err(err) => {
                                warn!(error = %err, "failed to re-resolve fallback quality");
                            }
                        }
                    }
                }
                Ok(frame) => {
                    state.record_success();
                    if state.gate(*self.interval.borrow_and_update()) {
                        let captured = CapturedFrame {
                            frame,
                            captured_at: Utc::now(),
                        };
                        tokio::select! {
                            _ = token.cancelled() => {
                                release(&mut handle).await;
                                return Err(CaptureError::Cancelled);
                            }
                            sent = tx.send(captured) => {
                                if sent.is_err() {
                                    release(&mut handle).await;
                                    return Ok(());
                                }
                            }
                        }
                    }
                }
            }

            tokio::select! {
                _ = token.cancelled() => {
                    release(&mut handle).await;
                    return Err(CaptureError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.idle_sleep) => {}
            }
        }
    }
}
