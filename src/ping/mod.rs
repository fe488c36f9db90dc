//! Ping statistics engine
//!
//! Samples round-trip latency against one host for a fixed wall-clock
//! duration and reduces the samples to average/min/max/jitter/loss.
//! The engine never raises: a host that cannot be resolved, or a run
//! without a single successful probe, yields zeroed statistics.

use crate::{
    defaults, dns,
    models::PingStatistics,
    probe::Prober,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Repeatedly probes a host and reduces the sample set.
#[derive(Clone)]
pub struct PingEngine {
    prober: Arc<dyn Prober>,
    probe_timeout: Duration,
    probe_interval: Duration,
}

impl PingEngine {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            probe_timeout: defaults::PROBE_TIMEOUT,
            probe_interval: defaults::PROBE_INTERVAL,
        }
    }

    /// Override probe pacing (tests use short intervals).
    pub fn with_timing(mut self, probe_timeout: Duration, probe_interval: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self.probe_interval = probe_interval;
        self
    }

    /// Sample `host` for `total_duration`, then reduce.
    ///
    /// One probe per iteration with a fixed per-probe timeout, followed
    /// by an inter-probe delay that rate-limits the engine. Cancellation
    /// mid-loop stops immediately and reduces whatever samples exist.
    pub async fn measure(
        &self,
        host: &str,
        total_duration: Duration,
        token: &CancellationToken,
    ) -> PingStatistics {
        let addr = match dns::resolve_ipv4(host).await {
            Ok(addrs) => IpAddr::V4(addrs[0]),
            Err(err) => {
                warn!(host, %err, "ping target did not resolve, returning empty statistics");
                return PingStatistics::empty();
            }
        };

        let start = Instant::now();
        let mut samples: Vec<f64> = Vec::new();
        let mut sent: u32 = 0;
        let mut received: u32 = 0;

        while start.elapsed() < total_duration && !token.is_cancelled() {
            sent += 1;
            let outcome = self.prober.probe(addr, None, self.probe_timeout).await;
            if let Some(rtt_ms) = outcome.rtt_ms() {
                samples.push(rtt_ms);
                received += 1;
            } else {
                debug!(host, %addr, ?outcome, "probe lost");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.probe_interval) => {}
                _ = token.cancelled() => break,
            }
        }

        PingStatistics::from_samples(&samples, sent, received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeOutcome;
    use async_trait::async_trait;

    /// Prober that always answers with a fixed round-trip time.
    struct SteadyProber(Duration);

    #[async_trait]
    impl Prober for SteadyProber {
        async fn probe(&self, addr: IpAddr, _ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::Reply { from: addr, rtt: self.0 }
        }
    }

    /// Prober that never answers.
    struct SilentProber;

    #[async_trait]
    impl Prober for SilentProber {
        async fn probe(&self, _addr: IpAddr, _ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::Timeout
        }
    }

    fn fast_engine(prober: Arc<dyn Prober>) -> PingEngine {
        PingEngine::new(prober).with_timing(Duration::from_millis(50), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_steady_probes_have_no_loss() {
        let engine = fast_engine(Arc::new(SteadyProber(Duration::from_millis(10))));
        let token = CancellationToken::new();
        let stats = engine
            .measure("127.0.0.1", Duration::from_millis(60), &token)
            .await;

        assert!(stats.sample_count > 0);
        assert_eq!(stats.loss_percent, 0.0);
        assert_eq!(stats.average_ms, 10.0);
        assert_eq!(stats.jitter_ms, 0.0);
    }

    #[tokio::test]
    async fn test_silent_probes_are_total_loss() {
        let engine = fast_engine(Arc::new(SilentProber));
        let token = CancellationToken::new();
        let stats = engine
            .measure("127.0.0.1", Duration::from_millis(40), &token)
            .await;

        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.loss_percent, 100.0);
        assert_eq!(stats.average_ms, 0.0);
    }

    #[tokio::test]
    async fn test_cancelled_run_reduces_immediately() {
        let engine = fast_engine(Arc::new(SteadyProber(Duration::from_millis(10))));
        let token = CancellationToken::new();
        token.cancel();

        let stats = engine
            .measure("127.0.0.1", Duration::from_secs(60), &token)
            .await;
        assert_eq!(stats, PingStatistics::empty());
    }

    #[tokio::test]
    async fn test_unresolvable_host_yields_empty_statistics() {
        let engine = fast_engine(Arc::new(SteadyProber(Duration::from_millis(10))));
        let token = CancellationToken::new();
        let stats = engine
            .measure("definitely-not-a-real-host.invalid", Duration::from_millis(40), &token)
            .await;
        assert_eq!(stats, PingStatistics::empty());
    }
}
