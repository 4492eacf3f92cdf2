//! Scripted capability doubles shared by the engine and fallback tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use rustc_hash::FxHashMap;

use crate::error::{OpenError, ProbeError, ReadFailure, ResolutionError};
use crate::probe::{Bandwidth, BandwidthProbe};
use crate::reader::{FrameHandle, StreamReader};
use crate::resolver::QualityResolver;
use crate::source::{StreamSource, VariantMap};

/// One scripted read outcome. `Repeat` stays at the queue front and
/// yields the same frame forever; an exhausted script hangs, which lets
/// tests park the loop and drive it via cancellation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReadStep {
    Frame(&'static str),
    Repeat(&'static str),
    Fail,
    Hang,
}

type Script = Arc<Mutex<VecDeque<ReadStep>>>;

/// Reader double with per-URL scripts and open/close accounting.
pub(crate) struct ScriptedReader {
    scripts: Mutex<FxHashMap<String, Script>>,
    open_failures: Mutex<FxHashMap<String, usize>>,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub url_opens: Arc<Mutex<FxHashMap<String, usize>>>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(FxHashMap::default()),
            open_failures: Mutex::new(FxHashMap::default()),
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            url_opens: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    pub fn script(&self, url: &str, steps: Vec<ReadStep>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Arc::new(Mutex::new(steps.into())));
    }

    /// Make the next `count` opens of `url` fail.
    pub fn fail_opens(&self, url: &str, count: usize) {
        self.open_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
    }
}

#[async_trait]
impl StreamReader for ScriptedReader {
    async fn open(&self, source: &StreamSource) -> Result<Box<dyn FrameHandle>, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self
            .url_opens
            .lock()
            .unwrap()
            .entry(source.url.clone())
            .or_insert(0) += 1;

        if let Some(remaining) = self.open_failures.lock().unwrap().get_mut(&source.url)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(OpenError::new(&source.url, "open refused by script"));
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .entry(source.url.clone())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone();
        Ok(Box::new(ScriptedHandle {
            script,
            closes: self.closes.clone(),
            closed: false,
        }))
    }
}

struct ScriptedHandle {
    script: Script,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl FrameHandle for ScriptedHandle {
    async fn read(&mut self) -> Result<Bytes, ReadFailure> {
        let step = {
            let mut queue = self.script.lock().unwrap();
            match queue.front().copied() {
                Some(step @ ReadStep::Repeat(_)) => step,
                _ => queue.pop_front().unwrap_or(ReadStep::Hang),
            }
        };
        match step {
            ReadStep::Frame(data) | ReadStep::Repeat(data) => Ok(Bytes::from_static(data.as_bytes())),
            ReadStep::Fail => Err(ReadFailure::Closed),
            ReadStep::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Resolver double returning queued responses in order; an exhausted
/// queue reports no variants.
pub(crate) struct ScriptedResolver {
    responses: Mutex<VecDeque<VariantMap>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn respond_with(&self, variants: &[(&str, &str)]) {
        let map: VariantMap = variants
            .iter()
            .map(|(label, url)| ((*label).to_string(), StreamSource::new(*url)))
            .collect();
        self.responses.lock().unwrap().push_back(map);
    }
}

#[async_trait]
impl QualityResolver for ScriptedResolver {
    async fn resolve(&self, _stream_id: &str) -> Result<VariantMap, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ResolutionError::NoVariants)
    }
}

/// Probe double reporting a fixed download speed (or always failing).
pub(crate) struct ScriptedProbe {
    download_mbps: f64,
    fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(download_mbps: f64) -> Self {
        Self {
            download_mbps,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            download_mbps: 0.0,
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl BandwidthProbe for ScriptedProbe {
    async fn measure(&self) -> Result<Bandwidth, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProbeError::new("probe refused by script"));
        }
        Ok(Bandwidth {
            download_mbps: self.download_mbps,
            upload_mbps: self.download_mbps / 4.0,
        })
    }
}
