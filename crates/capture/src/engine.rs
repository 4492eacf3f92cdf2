//! Primary capture loop and the one-way handoff into fallback.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::fallback::FallbackController;
use crate::probe::BandwidthProbe;
use crate::reader::{FrameHandle, StreamReader};
use crate::resolver::QualityResolver;
use crate::source::{CapturedFrame, StreamSource};

/// Runtime control over the capture interval.
///
/// Updates take effect at the engine's next gate check, never
/// retroactively.
#[derive(Debug, Clone)]
pub struct IntervalHandle {
    tx: Arc<watch::Sender<Duration>>,
}

impl IntervalHandle {
    pub fn set(&self, interval: Duration) {
        let _ = self.tx.send(interval);
    }

    pub fn get(&self) -> Duration {
        *self.tx.borrow()
    }
}

/// Per-loop mutable capture state.
///
/// `last_emit == None` means no frame has been emitted yet and the next
/// successful read is immediately eligible; the fallback loop instead
/// seeds `last_emit` with its entry time so the gate resets across the
/// handoff boundary.
pub(crate) struct CaptureState {
    pub consecutive_failures: u32,
    pub has_ever_succeeded: bool,
    last_emit: Option<Instant>,
}

impl CaptureState {
    pub fn primary() -> Self {
        Self {
            consecutive_failures: 0,
            has_ever_succeeded: false,
            last_emit: None,
        }
    }

    pub fn fallback_entry() -> Self {
        Self {
            consecutive_failures: 0,
            has_ever_succeeded: false,
            last_emit: Some(Instant::now()),
        }
    }

    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.has_ever_succeeded = true;
    }

    /// Fallback engages only while the source has never proven viable.
    pub fn should_hand_off(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold && !self.has_ever_succeeded
    }

    /// True when the interval has elapsed since the last emission; marks
    /// the emission time on acceptance.
    pub fn gate(&mut self, interval: Duration) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(at) => at.elapsed() >= interval,
        };
        if due {
            self.last_emit = Some(Instant::now());
        }
        due
    }
}

/// Single teardown path for the active handle.
///
/// Closes the connection and drops the box so retained frame buffers are
/// reclaimed with it. Idempotent: the option is taken, so a second call
/// is a no-op.
pub(crate) async fn release(handle: &mut Option<Box<dyn FrameHandle>>) {
    if let Some(mut h) = handle.take() {
        h.close().await;
    }
}

enum PrimaryExit {
    Handoff,
    Done(Result<(), CaptureError>),
}

/// Resilient frame capture engine over a primary stream source.
///
/// Runs as a single cooperatively-suspending task: read, gate by
/// interval, emit onto the caller's channel. Every read failure tears
/// the connection down and reconnects; after `failure_threshold`
/// consecutive failures with no prior success the run permanently hands
/// off to the bandwidth-adaptive fallback controller.
pub struct CaptureEngine<R, Q, B> {
    reader: R,
    resolver: Q,
    probe: B,
    source: StreamSource,
    config: CaptureConfig,
    interval_tx: Arc<watch::Sender<Duration>>,
    interval_rx: watch::Receiver<Duration>,
}

impl<R, Q, B> CaptureEngine<R, Q, B>
where
    R: StreamReader,
    Q: QualityResolver,
    B: BandwidthProbe,
{
    pub fn new(reader: R, resolver: Q, probe: B, source: StreamSource, config: CaptureConfig) -> Self {
        let (interval_tx, interval_rx) = watch::channel(config.capture_interval);
        Self {
            reader,
            resolver,
            probe,
            source,
            config,
            interval_tx: Arc::new(interval_tx),
            interval_rx,
        }
    }

    /// Handle for adjusting the capture interval while the engine runs.
    pub fn interval_handle(&self) -> IntervalHandle {
        IntervalHandle {
            tx: self.interval_tx.clone(),
        }
    }

    /// Run the capture loop, pushing emitted frames onto `tx`.
    ///
    /// Create the channel with capacity 1 so the consumer controls
    /// pacing: the engine does not acquire frame N+1 while frame N is
    /// still waiting to be taken. Returns `Ok(())` when the consumer
    /// drops the receiver, `Err(Cancelled)` when the token fires, and a
    /// resolution/probe error only when fallback can never start.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<CapturedFrame>,
        token: CancellationToken,
    ) -> Result<(), CaptureError> {
        match self.run_primary(&tx, &token).await {
            PrimaryExit::Done(result) => result,
            PrimaryExit::Handoff => {
                info!(source = %self.source, "sustained primary failure, switching to generic capture");
                let fallback = FallbackController::new(
                    &self.reader,
                    &self.resolver,
                    &self.probe,
                    &self.source.url,
                    &self.config,
                    self.interval_rx.clone(),
                );
                fallback.run(&tx, &token).await
            }
        }
    }

    /// Spawn the engine and return the emitted frames as a stream.
    pub fn into_stream(self, token: CancellationToken) -> ReceiverStream<CapturedFrame>
    where
        R: 'static,
        Q: 'static,
        B: 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            match self.run(tx, token).await {
                Ok(()) => debug!("capture engine finished"),
                Err(CaptureError::Cancelled) => debug!("capture engine cancelled"),
                Err(err) => error!(error = %err, "capture engine stopped"),
            }
        });
        ReceiverStream::new(rx)
    }

    async fn run_primary(
        &mut self,
        tx: &mpsc::Sender<CapturedFrame>,
        token: &CancellationToken,
    ) -> PrimaryExit {
        // One-shot startup grace: a failed initial open gets a single
        // delayed retry that does not count toward the failure streak.
        let mut handle = match self.reader.open(&self.source).await {
            Ok(h) => Some(h),
            Err(err) => {
                warn!(error = %err, "initial stream open failed, retrying once");
                tokio::select! {
                    _ = token.cancelled() => return PrimaryExit::Done(Err(CaptureError::Cancelled)),
                    _ = tokio::time::sleep(self.config.reopen_delay) => {}
                }
                match self.reader.open(&self.source).await {
                    Ok(h) => Some(h),
                    Err(err) => {
                        warn!(error = %err, "stream open retry failed");
                        None
                    }
                }
            }
        };

        let mut state = CaptureState::primary();

        loop {
            if token.is_cancelled() {
                release(&mut handle).await;
                return PrimaryExit::Done(Err(CaptureError::Cancelled));
            }

            // Reconnect with a fresh connection; open failures past the
            // startup grace count toward the failure streak like reads.
            if handle.is_none() {
                match self.reader.open(&self.source).await {
                    Ok(h) => handle = Some(h),
                    Err(err) => {
                        let failures = state.record_failure();
                        warn!(failures, error = %err, "failed to reopen primary stream");
                        if state.should_hand_off(self.config.failure_threshold) {
                            return PrimaryExit::Handoff;
                        }
                    }
                }
            }

            if let Some(h) = handle.as_mut() {
                let outcome = tokio::select! {
                    _ = token.cancelled() => {
                        release(&mut handle).await;
                        return PrimaryExit::Done(Err(CaptureError::Cancelled));
                    }
                    outcome = h.read() => outcome,
                };

                match outcome {
                    Err(failure) => {
                        let failures = state.record_failure();
                        warn!(failures, error = %failure, "failed to read frame, reinitialising stream");
                        release(&mut handle).await;
                        if state.should_hand_off(self.config.failure_threshold) {
                            return PrimaryExit::Handoff;
                        }
                    }
                    Ok(frame) => {
                        state.record_success();
                        if state.gate(*self.interval_rx.borrow()) {
                            let captured = CapturedFrame {
                                frame,
                                captured_at: Utc::now(),
                            };
                            tokio::select! {
                                _ = token.cancelled() => {
                                    release(&mut handle).await;
                                    return PrimaryExit::Done(Err(CaptureError::Cancelled));
                                }
                                sent = tx.send(captured) => {
                                    if sent.is_err() {
                                        release(&mut handle).await;
                                        return PrimaryExit::Done(Ok(()));
                                    }
                                }
                            }
                        }
                    }
                }
            }

            // Brief yield keeps the loop hot enough to drain the
            // reader's single-frame buffer without starving other work.
            tokio::select! {
                _ = token.cancelled() => {
                    release(&mut handle).await;
                    return PrimaryExit::Done(Err(CaptureError::Cancelled));
                }
                _ = tokio::time::sleep(self.config.idle_sleep) => {}
            }
        }
    }
}
