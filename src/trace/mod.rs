//! Hop-by-hop path discovery
//!
//! Sends TTL-limited probes toward a destination and records, per hop,
//! the responding router address, an optional reverse-DNS name, and the
//! mean round-trip time across the probes that answered.

use crate::{
    defaults, dns,
    error::{AppError, Result},
    models::TracerouteHop,
    probe::Prober,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// TTL-stepping path discovery engine.
#[derive(Clone)]
pub struct TracerouteEngine {
    prober: Arc<dyn Prober>,
    max_hops: u8,
    probes_per_hop: usize,
    probe_timeout: Duration,
    resolve_names: bool,
}

impl TracerouteEngine {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            max_hops: defaults::MAX_HOPS,
            probes_per_hop: defaults::PROBES_PER_HOP,
            probe_timeout: defaults::PROBE_TIMEOUT,
            resolve_names: true,
        }
    }

    /// Disable reverse-DNS lookups for discovered hops.
    pub fn without_name_resolution(mut self) -> Self {
        self.resolve_names = false;
        self
    }

    /// Walk the path toward `hostname`, one TTL step at a time.
    ///
    /// Stops early once a hop answers from one of the destination's
    /// addresses. A hostname that does not resolve at all is an error;
    /// individual silent hops are not.
    pub async fn discover(
        &self,
        hostname: &str,
        token: &CancellationToken,
    ) -> Result<Vec<TracerouteHop>> {
        let candidates = dns::resolve_ipv4(hostname).await?;
        let destinations: Vec<IpAddr> = candidates.into_iter().map(IpAddr::V4).collect();
        let target = *destinations
            .first()
            .ok_or_else(|| AppError::dns_resolution(format!("no IPv4 address for {hostname}")))?;

        let mut hops = Vec::new();

        for ttl in 1..=self.max_hops {
            if token.is_cancelled() {
                debug!(hostname, ttl, "path discovery cancelled");
                break;
            }

            let mut responder: Option<IpAddr> = None;
            let mut rtts: Vec<f64> = Vec::new();

            for _ in 0..self.probes_per_hop {
                let outcome = self.prober.probe(target, Some(ttl), self.probe_timeout).await;
                if let Some(from) = outcome.responder() {
                    // When probes disagree, the most recent answer wins.
                    responder = Some(from);
                }
                if let Some(ms) = outcome.rtt_ms() {
                    rtts.push(ms);
                }
            }

            match responder {
                None => hops.push(TracerouteHop::unresponsive(u32::from(ttl))),
                Some(addr) => {
                    let avg = if rtts.is_empty() {
                        None
                    } else {
                        Some(rtts.iter().sum::<f64>() / rtts.len() as f64)
                    };
                    // Reverse lookup is best effort; an address without a
                    // PTR record names itself.
                    let hostname = if self.resolve_names {
                        Some(
                            dns::reverse_hostname(addr)
                                .await
                                .unwrap_or_else(|| addr.to_string()),
                        )
                    } else {
                        None
                    };
                    hops.push(TracerouteHop {
                        hop: u32::from(ttl),
                        address: addr.to_string(),
                        hostname,
                        avg_rtt_ms: avg,
                    });

                    if destinations.contains(&addr) {
                        debug!(hostname = %addr, ttl, "destination reached");
                        return Ok(hops);
                    }
                }
            }
        }

        Ok(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SILENT_HOP_SENTINEL;
    use crate::types::ProbeOutcome;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    /// Scripted path: hop N answers from 10.0.0.N until the destination
    /// is reached at `reach_at`, where the destination itself replies.
    struct ScriptedPath {
        destination: IpAddr,
        reach_at: u32,
        silent_hops: Vec<u32>,
    }

    #[async_trait]
    impl Prober for ScriptedPath {
        async fn probe(&self, _addr: IpAddr, ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            let ttl = u32::from(ttl.unwrap_or(0));
            if self.silent_hops.contains(&ttl) {
                return ProbeOutcome::Timeout;
            }
            let rtt = Duration::from_millis(u64::from(ttl) * 2);
            if ttl >= self.reach_at {
                ProbeOutcome::Reply { from: self.destination, rtt }
            } else {
                ProbeOutcome::HopExceeded {
                    from: IpAddr::V4(Ipv4Addr::new(10, 0, 0, ttl as u8)),
                    rtt,
                }
            }
        }
    }

    fn engine(prober: Arc<dyn Prober>) -> TracerouteEngine {
        TracerouteEngine::new(prober).without_name_resolution()
    }

    #[tokio::test]
    async fn test_stops_when_destination_answers() {
        let dest: IpAddr = "192.0.2.8".parse().unwrap();
        let eng = engine(Arc::new(ScriptedPath {
            destination: dest,
            reach_at: 8,
            silent_hops: vec![],
        }));
        let hops = eng
            .discover("192.0.2.8", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hops.len(), 8);
        assert_eq!(hops[7].address, "192.0.2.8");
        for (i, hop) in hops.iter().enumerate() {
            assert_eq!(hop.hop, (i + 1) as u32);
            assert!(hop.avg_rtt_ms.is_some());
        }
    }

    #[tokio::test]
    async fn test_silent_hop_is_recorded_and_walk_continues() {
        let dest: IpAddr = "192.0.2.8".parse().unwrap();
        let eng = engine(Arc::new(ScriptedPath {
            destination: dest,
            reach_at: 5,
            silent_hops: vec![3],
        }));
        let hops = eng
            .discover("192.0.2.8", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hops.len(), 5);
        assert_eq!(hops[2].address, SILENT_HOP_SENTINEL);
        assert_eq!(hops[2].avg_rtt_ms, None);
        assert_eq!(hops[4].address, "192.0.2.8");
    }

    /// First probe answered by one router, second by another: the later
    /// answer is the one reported.
    struct Alternating {
        first: IpAddr,
        second: IpAddr,
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl Prober for Alternating {
        async fn probe(&self, _addr: IpAddr, _ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let from = if n % 2 == 0 { self.first } else { self.second };
            ProbeOutcome::Reply { from, rtt: Duration::from_millis(5) }
        }
    }

    #[tokio::test]
    async fn test_last_answer_wins_when_probes_disagree() {
        let dest: IpAddr = "192.0.2.8".parse().unwrap();
        let eng = engine(Arc::new(Alternating {
            first: "10.0.0.1".parse().unwrap(),
            second: dest,
            calls: std::sync::atomic::AtomicU32::new(0),
        }));
        let hops = eng
            .discover("192.0.2.8", &CancellationToken::new())
            .await
            .unwrap();

        // Second probe of hop 1 answered from the destination.
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].address, "192.0.2.8");
    }

    #[tokio::test]
    async fn test_unresolvable_hostname_is_an_error() {
        let eng = engine(Arc::new(ScriptedPath {
            destination: "192.0.2.8".parse().unwrap(),
            reach_at: 1,
            silent_hops: vec![],
        }));
        let err = eng
            .discover("definitely-not-a-real-host.invalid", &CancellationToken::new())
            .await;
        assert!(err.is_err());
    }
}
