//! HTTP stream reader capability.
//!
//! Opens a streaming GET against the source URL and forwards body
//! chunks through a capacity-1 channel, so at most one frame is ever
//! buffered between the network and the capture loop.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use capture_engine::{FrameHandle, OpenError, ReadFailure, StreamReader, StreamSource};
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct HttpFrameReader {
    client: Client,
    read_timeout: Duration,
}

impl HttpFrameReader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            read_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

#[async_trait]
impl StreamReader for HttpFrameReader {
    async fn open(&self, source: &StreamSource) -> Result<Box<dyn FrameHandle>, OpenError> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| OpenError::new(&source.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OpenError::new(&source.url, format!("HTTP {status}")));
        }
        debug!(url = %source.url, "stream opened");

        let mut byte_stream = response.bytes_stream();
        // Capacity 1: the forwarder stalls until the previous chunk is
        // consumed, keeping emitted frames at most one read-cycle stale.
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let forward_token = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = forward_token.cancelled() => break,
                    chunk = byte_stream.next() => match chunk {
                        Some(Ok(bytes)) => {
                            if tx.send(Ok(bytes)).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "stream body error");
                            let _ = tx.send(Err(err)).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(Box::new(HttpFrameHandle {
            rx,
            token,
            read_timeout: self.read_timeout,
        }))
    }
}

struct HttpFrameHandle {
    rx: mpsc::Receiver<Result<Bytes, reqwest::Error>>,
    token: CancellationToken,
    read_timeout: Duration,
}

#[async_trait]
impl FrameHandle for HttpFrameHandle {
    async fn read(&mut self) -> Result<Bytes, ReadFailure> {
        match tokio::time::timeout(self.read_timeout, self.rx.recv()).await {
            Err(_) => Err(ReadFailure::Timeout),
            Ok(None) => Err(ReadFailure::Closed),
            Ok(Some(Ok(bytes))) => Ok(bytes),
            Ok(Some(Err(err))) if err.is_timeout() => Err(ReadFailure::Timeout),
            Ok(Some(Err(err))) => Err(ReadFailure::decode(err.to_string())),
        }
    }

    async fn close(&mut self) {
        self.token.cancel();
        self.rx.close();
    }
}

impl Drop for HttpFrameHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
