//! Concurrent measurement orchestration
//!
//! Spawns every measurement unit the requested mode asks for, fans the
//! results in as they complete, and enforces one shared wall-clock
//! deadline over the whole run. A unit that fails or never finishes
//! costs its slot in the report, never the run: missing slots are
//! default-filled so renderers always see a complete record.

use crate::{
    defaults,
    dns::DnsEngine,
    error::{AppError, Result},
    lookup::{GeoService, IpService},
    models::{
        DnsResult, GeoInfo, IpInfo, PingStatistics, Report, SpeedResult, TracerouteHop,
    },
    ping::PingEngine,
    probe::{IcmpProber, Prober},
    speed::SpeedEngine,
    trace::TracerouteEngine,
    types::ReportMode,
};
use colored::Colorize;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Value produced by one completed measurement unit.
enum UnitResult {
    Ip(IpInfo),
    Geo(GeoInfo),
    Ping(PingStatistics),
    Speed(SpeedResult),
    Dns(DnsResult),
    Trace(Vec<TracerouteHop>),
}

/// Receives unit lifecycle events as the run progresses.
pub trait ProgressSink: Send + Sync {
    fn unit_started(&self, _unit: &str) {}
    fn unit_completed(&self, _unit: &str) {}
    fn unit_failed(&self, _unit: &str, _error: &AppError) {}
}

/// Prints unit progress to stderr so stdout stays machine-readable.
pub struct ConsoleProgress {
    color: bool,
}

impl ConsoleProgress {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl ProgressSink for ConsoleProgress {
    fn unit_started(&self, unit: &str) {
        eprintln!("  measuring {unit}...");
    }

    fn unit_completed(&self, unit: &str) {
        let mark = if self.color {
            "ok".green().to_string()
        } else {
            "ok".to_string()
        };
        eprintln!("  {unit}: {mark}");
    }

    fn unit_failed(&self, unit: &str, error: &AppError) {
        let mark = if self.color {
            "failed".red().to_string()
        } else {
            "failed".to_string()
        };
        eprintln!("  {unit}: {mark} ({error})");
    }
}

/// Sink that swallows every event.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Everything a finished run produced.
pub struct RunOutcome {
    pub report: Report,
    /// True when the deadline expired before every unit finished.
    pub timed_out: bool,
    /// Names of units that returned an error.
    pub failed_units: Vec<String>,
}

type UnitFuture = Pin<Box<dyn Future<Output = (&'static str, Result<UnitResult>)> + Send>>;

/// Assembles reports by running measurement units concurrently.
pub struct ReportRunner {
    ip: IpService,
    geo: GeoService,
    ping: PingEngine,
    speed: SpeedEngine,
    dns: DnsEngine,
    trace: TracerouteEngine,
    target: String,
    ping_duration: Duration,
    progress: Arc<dyn ProgressSink>,
}

impl ReportRunner {
    pub fn new(target: impl Into<String>, parallelism: usize) -> Result<Self> {
        let prober: Arc<dyn Prober> = Arc::new(IcmpProber::new());
        Ok(Self {
            ip: IpService::new()?,
            geo: GeoService::new()?,
            ping: PingEngine::new(Arc::clone(&prober)),
            speed: SpeedEngine::new(parallelism)?,
            dns: DnsEngine::new(),
            trace: TracerouteEngine::new(prober),
            target: target.into(),
            ping_duration: defaults::PING_DURATION,
            progress: Arc::new(ConsoleProgress::new(true)),
        })
    }

    /// Assemble a runner from pre-built engines (tests wire in mocks).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        target: impl Into<String>,
        ip: IpService,
        geo: GeoService,
        ping: PingEngine,
        speed: SpeedEngine,
        dns: DnsEngine,
        trace: TracerouteEngine,
    ) -> Self {
        Self {
            ip,
            geo,
            ping,
            speed,
            dns,
            trace,
            target: target.into(),
            ping_duration: defaults::PING_DURATION,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_ping_duration(mut self, duration: Duration) -> Self {
        self.ping_duration = duration;
        self
    }

    /// Run every unit the mode asks for under one shared deadline.
    ///
    /// Results are folded in as units complete. When the deadline fires
    /// the fan-in stops immediately; detached units observe the
    /// cancellation token and wind down on their own.
    pub async fn run(&self, mode: ReportMode, deadline: Duration) -> RunOutcome {
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            }
        });

        let mut pending: FuturesUnordered<UnitFuture> = FuturesUnordered::new();

        // Geolocation depends on the public address the IP unit found.
        let (addr_tx, addr_rx) = oneshot::channel::<Option<String>>();

        if mode.wants_ip() {
            let ip = self.ip.clone();
            let token = token.clone();
            self.spawn_unit(&mut pending, "public-ip", async move {
                let result = ip.public_ip_info(&token).await;
                let addr = result.as_ref().ok().and_then(|info| info.query.clone());
                let _ = addr_tx.send(addr);
                result.map(UnitResult::Ip)
            });
        }

        if mode.wants_geo() {
            let geo = self.geo.clone();
            let token = token.clone();
            self.spawn_unit(&mut pending, "geolocation", async move {
                let addr = addr_rx.await.ok().flatten().ok_or_else(|| {
                    AppError::network("public IP unit produced no address to geolocate")
                })?;
                geo.geo_for_ip(&addr, &token).await.map(UnitResult::Geo)
            });
        }

        if mode.wants_ping() {
            let ping = self.ping.clone();
            let host = self.target.clone();
            let duration = self.ping_duration;
            let token = token.clone();
            self.spawn_unit(&mut pending, "ping", async move {
                Ok(UnitResult::Ping(ping.measure(&host, duration, &token).await))
            });
        }

        if mode.wants_speed() {
            let speed = self.speed.clone();
            let token = token.clone();
            self.spawn_unit(&mut pending, "speed", async move {
                Ok(UnitResult::Speed(speed.measure(&token).await))
            });
        }

        if mode.wants_dns() {
            let dns = self.dns.clone();
            let host = self.target.clone();
            let token = token.clone();
            self.spawn_unit(&mut pending, "dns", async move {
                Ok(UnitResult::Dns(dns.diagnose(&host, &token).await))
            });
        }

        if mode.wants_trace() {
            let trace = self.trace.clone();
            let host = self.target.clone();
            let token = token.clone();
            self.spawn_unit(&mut pending, "traceroute", async move {
                trace.discover(&host, &token).await.map(UnitResult::Trace)
            });
        }

        let mut report = Report::new();
        let mut timed_out = false;
        let mut failed_units = Vec::new();

        while !pending.is_empty() {
            tokio::select! {
                maybe = pending.next() => {
                    let Some((unit, result)) = maybe else { break };
                    match result {
                        Ok(value) => {
                            self.progress.unit_completed(unit);
                            store(&mut report, value);
                        }
                        Err(err) => {
                            warn!(unit, %err, "measurement unit failed");
                            self.progress.unit_failed(unit, &err);
                            failed_units.push(unit.to_string());
                        }
                    }
                }
                _ = token.cancelled() => {
                    debug!("run deadline expired, abandoning unfinished units");
                    timed_out = true;
                    break;
                }
            }
        }
        timer.abort();

        self.default_fill(&mut report, mode);
        RunOutcome {
            report,
            timed_out,
            failed_units,
        }
    }

    fn spawn_unit(
        &self,
        pending: &mut FuturesUnordered<UnitFuture>,
        unit: &'static str,
        fut: impl Future<Output = Result<UnitResult>> + Send + 'static,
    ) {
        self.progress.unit_started(unit);
        let handle = tokio::spawn(fut);
        pending.push(Box::pin(async move {
            match handle.await {
                Ok(result) => (unit, result),
                Err(_) => (unit, Err(AppError::internal("measurement task panicked"))),
            }
        }));
    }

    /// Fill every slot the mode asked for that no unit delivered.
    fn default_fill(&self, report: &mut Report, mode: ReportMode) {
        if mode.wants_ip() && report.ip.is_none() {
            report.ip = Some(IpInfo::unknown());
        }
        if mode.wants_geo() && report.geo.is_none() {
            let addr = report
                .ip
                .as_ref()
                .and_then(|info| info.query.clone())
                .unwrap_or_else(|| "unknown".to_string());
            report.geo = Some(GeoInfo::unknown_for(&addr));
        }
        if mode.wants_ping() && report.ping.is_none() {
            report.ping = Some(PingStatistics::empty());
        }
        if mode.wants_speed() && report.speed.is_none() {
            report.speed = Some(SpeedResult::zeroed());
        }
        if mode.wants_dns() && report.dns.is_none() {
            report.dns = Some(DnsResult::default_for(&self.target));
        }
        if mode.wants_trace() && report.traceroute.is_none() {
            report.traceroute = Some(Vec::new());
        }
    }
}

fn store(report: &mut Report, value: UnitResult) {
    match value {
        UnitResult::Ip(info) => report.ip = Some(info),
        UnitResult::Geo(geo) => report.geo = Some(geo),
        UnitResult::Ping(stats) => report.ping = Some(stats),
        UnitResult::Speed(speed) => report.speed = Some(speed),
        UnitResult::Dns(dns) => report.dns = Some(dns),
        UnitResult::Trace(hops) => report.traceroute = Some(hops),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeOutcome;
    use async_trait::async_trait;
    use std::net::IpAddr;

    /// Prober that never answers within any useful window.
    struct StuckProber;

    #[async_trait]
    impl Prober for StuckProber {
        async fn probe(&self, _addr: IpAddr, _ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ProbeOutcome::Timeout
        }
    }

    /// Prober where the destination answers the first probe directly.
    struct InstantProber;

    #[async_trait]
    impl Prober for InstantProber {
        async fn probe(&self, addr: IpAddr, _ttl: Option<u8>, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::Reply {
                from: addr,
                rtt: Duration::from_millis(1),
            }
        }
    }

    // Closed port: connection attempts fail fast without touching the network.
    const DEAD_BASE: &str = "http://127.0.0.1:9";

    fn runner_with_prober(prober: Arc<dyn Prober>) -> ReportRunner {
        let speed = SpeedEngine::new(1)
            .unwrap()
            .with_endpoints(vec![format!("{DEAD_BASE}/down")], format!("{DEAD_BASE}/up"))
            .with_windows(Duration::from_millis(50), Duration::from_millis(50));
        ReportRunner::from_parts(
            "127.0.0.1",
            IpService::new().unwrap().with_base_url(DEAD_BASE.to_string()),
            GeoService::new().unwrap().with_base_url(DEAD_BASE.to_string()),
            PingEngine::new(Arc::clone(&prober))
                .with_timing(Duration::from_millis(20), Duration::from_millis(5)),
            speed,
            DnsEngine::new(),
            TracerouteEngine::new(prober).without_name_resolution(),
        )
        .with_ping_duration(Duration::from_millis(40))
    }

    #[tokio::test]
    async fn test_deadline_expiry_default_fills_every_slot() {
        let runner = runner_with_prober(Arc::new(StuckProber));
        let outcome = runner.run(ReportMode::All, Duration::from_millis(100)).await;

        assert!(outcome.timed_out);
        let report = outcome.report;
        assert!(report.ip.is_some());
        assert!(report.geo.is_some());
        assert!(report.ping.is_some());
        assert!(report.speed.is_some());
        assert!(report.dns.is_some());
        assert!(report.traceroute.is_some());
        // Units the stuck prober kept from finishing carry their defaults.
        assert_eq!(report.ping, Some(PingStatistics::empty()));
        assert_eq!(report.traceroute, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_zero_deadline_default_fills_without_panicking() {
        let runner = runner_with_prober(Arc::new(StuckProber));
        let outcome = runner.run(ReportMode::All, Duration::ZERO).await;

        assert!(outcome.timed_out);
        let report = outcome.report;
        // Stuck units are deterministic: their slots carry the exact
        // documented defaults.
        assert_eq!(report.ping, Some(PingStatistics::empty()));
        assert_eq!(report.traceroute, Some(Vec::new()));
        // Fast-failing units may or may not beat the cancellation to the
        // fan-in; either way every slot holds a no-data value.
        assert_eq!(
            report.ip.as_ref().and_then(|i| i.query.as_deref()),
            Some("unknown")
        );
        assert_eq!(report.geo, Some(GeoInfo::unknown_for("unknown")));
        let speed = report.speed.expect("speed slot filled");
        assert_eq!(speed.download_mbps, 0.0);
        assert_eq!(speed.upload_mbps, 0.0);
        let dns = report.dns.expect("dns slot filled");
        assert_eq!(dns.public_comparison.len(), 3);
    }

    #[tokio::test]
    async fn test_unit_failure_is_recorded_not_fatal() {
        let runner = runner_with_prober(Arc::new(InstantProber));
        let outcome = runner.run(ReportMode::Ip, Duration::from_secs(10)).await;

        // The lookup endpoint is a closed port, so the unit fails and
        // its slot is default-filled.
        assert!(outcome.failed_units.contains(&"public-ip".to_string()));
        assert_eq!(
            outcome.report.ip.as_ref().and_then(|i| i.query.as_deref()),
            Some("unknown")
        );
    }

    #[tokio::test]
    async fn test_mode_scopes_spawned_units() {
        let runner = runner_with_prober(Arc::new(InstantProber));
        let outcome = runner.run(ReportMode::Speed, Duration::from_secs(10)).await;

        let report = outcome.report;
        assert!(report.ping.is_some());
        assert!(report.speed.is_some());
        assert!(report.ip.is_none());
        assert!(report.geo.is_none());
        assert!(report.dns.is_none());
        assert!(report.traceroute.is_none());
    }

    #[tokio::test]
    async fn test_geolocation_fails_without_public_address() {
        let runner = runner_with_prober(Arc::new(InstantProber));
        let outcome = runner.run(ReportMode::Geo, Duration::from_secs(10)).await;

        assert!(outcome.failed_units.contains(&"public-ip".to_string()));
        assert!(outcome.failed_units.contains(&"geolocation".to_string()));
        assert_eq!(
            outcome.report.geo.as_ref().map(|g| g.ip.as_str()),
            Some("unknown")
        );
    }
}
