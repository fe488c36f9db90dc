//! Throughput measurement
//!
//! Picks the first reachable download endpoint, then runs a fixed
//! number of parallel workers against it for a bounded window: ranged
//! GETs at random offsets for download, fixed-size PUT bodies for
//! upload. Throughput is megabits per second over the window.

use crate::{
    defaults,
    error::{AppError, Result},
    models::SpeedResult,
};
use futures::StreamExt;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Parallel HTTP throughput engine.
#[derive(Clone)]
pub struct SpeedEngine {
    client: reqwest::Client,
    download_urls: Vec<String>,
    upload_url: String,
    parallelism: usize,
    download_duration: Duration,
    upload_duration: Duration,
}

impl SpeedEngine {
    pub fn new(parallelism: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(defaults::HTTP_TIMEOUT)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            download_urls: defaults::DOWNLOAD_URLS.iter().map(|s| s.to_string()).collect(),
            upload_url: defaults::UPLOAD_URL.to_string(),
            parallelism: parallelism.max(1),
            download_duration: defaults::DOWNLOAD_DURATION,
            upload_duration: defaults::UPLOAD_DURATION,
        })
    }

    /// Point the engine at different endpoints (tests use a local server).
    pub fn with_endpoints(mut self, download_urls: Vec<String>, upload_url: String) -> Self {
        self.download_urls = download_urls;
        self.upload_url = upload_url;
        self
    }

    /// Shrink the measurement windows (tests keep them short).
    pub fn with_windows(mut self, download: Duration, upload: Duration) -> Self {
        self.download_duration = download;
        self.upload_duration = upload;
        self
    }

    /// Run the download phase then the upload phase.
    ///
    /// When no download endpoint answers a HEAD request the whole
    /// measurement is reported as unreachable rather than failing.
    pub async fn measure(&self, token: &CancellationToken) -> SpeedResult {
        let endpoint = match self.select_endpoint(token).await {
            Some(url) => url,
            None => {
                warn!("no download endpoint reachable");
                return SpeedResult::unreachable();
            }
        };
        debug!(%endpoint, "selected download endpoint");

        let started = Instant::now();
        let download_bytes = self.run_download(&endpoint, token).await;
        let download_secs = started.elapsed().as_secs_f64();

        let upload_started = Instant::now();
        let upload_bytes = self.run_upload(token).await;
        // A cancelled upload window can be arbitrarily short; floor the
        // divisor so the rate stays meaningful.
        let upload_secs = upload_started.elapsed().as_secs_f64().max(1.0);

        SpeedResult {
            download_mbps: to_mbps(download_bytes, download_secs),
            upload_mbps: to_mbps(upload_bytes, upload_secs),
            elapsed: started.elapsed(),
            server: endpoint,
        }
    }

    /// First endpoint whose HEAD request succeeds, in configured order.
    async fn select_endpoint(&self, token: &CancellationToken) -> Option<String> {
        for url in &self.download_urls {
            if token.is_cancelled() {
                return None;
            }
            match self.client.head(url).send().await {
                Ok(resp) if resp.status().is_success() => return Some(url.clone()),
                Ok(resp) => debug!(%url, status = %resp.status(), "endpoint rejected HEAD"),
                Err(err) => debug!(%url, %err, "endpoint unreachable"),
            }
        }
        None
    }

    async fn run_download(&self, url: &str, token: &CancellationToken) -> u64 {
        let total = Arc::new(AtomicU64::new(0));
        let deadline = Instant::now() + self.download_duration;

        let workers = (0..self.parallelism).map(|worker| {
            let client = self.client.clone();
            let url = url.to_string();
            let total = Arc::clone(&total);
            let token = token.clone();
            async move {
                while Instant::now() < deadline && !token.is_cancelled() {
                    let offset = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(0..defaults::RANGE_SPAN)
                    };
                    let range = format!("bytes={}-{}", offset, offset + defaults::RANGE_CHUNK - 1);
                    let resp = match client.get(&url).header(reqwest::header::RANGE, range).send().await {
                        Ok(resp) => resp,
                        Err(err) => {
                            debug!(worker, %err, "download request failed");
                            continue;
                        }
                    };
                    let mut stream = resp.bytes_stream();
                    while let Some(chunk) = stream.next().await {
                        match chunk {
                            Ok(bytes) => {
                                total.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                            }
                            Err(err) => {
                                debug!(worker, %err, "download stream interrupted");
                                break;
                            }
                        }
                        if Instant::now() >= deadline || token.is_cancelled() {
                            break;
                        }
                    }
                }
            }
        });
        futures::future::join_all(workers).await;

        total.load(Ordering::Relaxed)
    }

    async fn run_upload(&self, token: &CancellationToken) -> u64 {
        let total = Arc::new(AtomicU64::new(0));
        let deadline = Instant::now() + self.upload_duration;
        let payload: Vec<u8> = {
            let mut rng = rand::thread_rng();
            (0..defaults::UPLOAD_PAYLOAD_BYTES).map(|_| rng.gen()).collect()
        };

        let workers = (0..self.parallelism).map(|worker| {
            let client = self.client.clone();
            let url = self.upload_url.clone();
            let total = Arc::clone(&total);
            let token = token.clone();
            let payload = payload.clone();
            async move {
                while Instant::now() < deadline && !token.is_cancelled() {
                    match client.put(&url).body(payload.clone()).send().await {
                        Ok(resp) if resp.status().is_success() => {
                            // Only bytes the server acknowledged count.
                            total.fetch_add(payload.len() as u64, Ordering::Relaxed);
                        }
                        Ok(resp) => debug!(worker, status = %resp.status(), "upload rejected"),
                        Err(err) => debug!(worker, %err, "upload request failed"),
                    }
                }
            }
        });
        futures::future::join_all(workers).await;

        total.load(Ordering::Relaxed)
    }
}

/// Bytes over seconds to megabits per second, rounded to two decimals.
fn to_mbps(bytes: u64, secs: f64) -> f64 {
    if secs <= 0.0 {
        return 0.0;
    }
    let mbps = bytes as f64 * 8.0 / secs / 1e6;
    (mbps * 100.0).round() / 100.0
}
