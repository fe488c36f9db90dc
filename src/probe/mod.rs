//! Latency prober: single echo probes with optional hop limits
//!
//! The [`Prober`] trait is the seam between the measurement engines and
//! the wire: ping and traceroute only ever see the tri-state
//! [`ProbeOutcome`], so they can be exercised with scripted probers in
//! tests while production runs ride on ICMP echo requests.

use crate::types::ProbeOutcome;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, SurgeError, ICMP};
use tracing::debug;

/// Echo payload sent with every probe.
const PROBE_PAYLOAD: [u8; 32] = [0; 32];

/// Sends one echo probe and classifies the answer.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `addr` once.
    ///
    /// Without a `ttl` this is a plain reachability probe: an echo reply
    /// before `timeout` is a [`ProbeOutcome::Reply`]. With a `ttl` the
    /// probe participates in path discovery: a hop-limit-exceeded answer
    /// from an intermediate router is a [`ProbeOutcome::HopExceeded`]
    /// whose address and round-trip time are valid measurements.
    async fn probe(&self, addr: IpAddr, ttl: Option<u8>, timeout: Duration) -> ProbeOutcome;
}

/// Production prober issuing ICMP echo requests.
#[derive(Debug, Clone, Default)]
pub struct IcmpProber;

impl IcmpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, addr: IpAddr, ttl: Option<u8>, timeout: Duration) -> ProbeOutcome {
        let mut builder = Config::builder().kind(ICMP::V4);
        if let Some(ttl) = ttl {
            builder = builder.ttl(u32::from(ttl));
        }

        let client = match Client::new(&builder.build()) {
            Ok(client) => client,
            Err(err) => {
                debug!(%addr, %err, "failed to open ICMP socket");
                return ProbeOutcome::Error;
            }
        };

        let mut pinger = client.pinger(addr, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(0), &PROBE_PAYLOAD).await {
            Ok((packet, rtt)) => {
                let from = match packet {
                    IcmpPacket::V4(pkt) => IpAddr::V4(pkt.get_source()),
                    IcmpPacket::V6(pkt) => IpAddr::V6(pkt.get_source()),
                };
                // A reply from anywhere other than the probed destination
                // is a router reporting an expired hop limit.
                if from == addr {
                    ProbeOutcome::Reply { from, rtt }
                } else {
                    ProbeOutcome::HopExceeded { from, rtt }
                }
            }
            Err(SurgeError::Timeout { .. }) => ProbeOutcome::Timeout,
            Err(err) => {
                debug!(%addr, ?ttl, %err, "probe failed");
                ProbeOutcome::Error
            }
        }
    }
}
