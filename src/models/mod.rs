//! Result records produced by the measurement engines
//!
//! Every record is a plain serializable value: engines create them once,
//! the runner owns them during report assembly, and the renderers only
//! read them. "No data" conditions are always representable (zeroed
//! statistics, the `"*"` hop sentinel, [`QueryTime::Unreachable`], the
//! unreachable-server marker) so renderers need no special-case branching.

use crate::types::QueryTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Sentinel server identifier when no download endpoint was reachable.
pub const NO_ENDPOINT_SENTINEL: &str = "(no endpoints reachable)";

/// Address recorded for a hop where no probe produced a response.
pub const SILENT_HOP_SENTINEL: &str = "*";

/// Reduced statistics from one ping sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingStatistics {
    /// Average round-trip time of successful probes (milliseconds).
    pub average_ms: f64,
    /// Fastest successful round trip (milliseconds).
    pub min_ms: f64,
    /// Slowest successful round trip (milliseconds).
    pub max_ms: f64,
    /// Population standard deviation of successful round trips.
    pub jitter_ms: f64,
    /// Lost probes as a percentage of probes sent (0–100).
    pub loss_percent: f64,
    /// Number of successful samples included in the statistics.
    pub sample_count: usize,
}

impl PingStatistics {
    /// Statistics for a run that produced no samples at all.
    pub fn empty() -> Self {
        Self {
            average_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
            jitter_ms: 0.0,
            loss_percent: 0.0,
            sample_count: 0,
        }
    }

    /// Reduce a sample set to its representative statistics.
    ///
    /// Latency fields cover successful samples only; loss is derived from
    /// the sent/received counters. A run without samples yields all-zero
    /// latency fields, never NaN. The reduction is a pure function of its
    /// inputs.
    pub fn from_samples(samples: &[f64], sent: u32, received: u32) -> Self {
        let loss_percent = if sent > 0 {
            (f64::from(sent - received) / f64::from(sent)) * 100.0
        } else {
            0.0
        };

        if samples.is_empty() {
            return Self {
                loss_percent,
                ..Self::empty()
            };
        }

        let count = samples.len() as f64;
        let average = samples.iter().sum::<f64>() / count;
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let variance = samples.iter().map(|s| (s - average).powi(2)).sum::<f64>() / count;

        Self {
            average_ms: average,
            min_ms: min,
            max_ms: max,
            jitter_ms: variance.sqrt(),
            loss_percent,
            sample_count: samples.len(),
        }
    }
}

/// One entry of a discovered network path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteHop {
    /// 1-based hop index; strictly increasing along the path.
    pub hop: u32,
    /// Responder address, or `"*"` when every probe went unanswered.
    pub address: String,
    /// Reverse-resolved name; falls back to the address itself.
    pub hostname: Option<String>,
    /// Mean round-trip time of answered probes at this TTL.
    pub avg_rtt_ms: Option<f64>,
}

impl TracerouteHop {
    /// Hop where no probe produced any address.
    pub fn unresponsive(hop: u32) -> Self {
        Self {
            hop,
            address: SILENT_HOP_SENTINEL.to_string(),
            hostname: None,
            avg_rtt_ms: None,
        }
    }
}

/// Timing of one public-resolver trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicDnsTiming {
    pub server: IpAddr,
    pub time: QueryTime,
}

/// Comparative DNS diagnostics for one queried host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsResult {
    /// Host whose A record was queried.
    pub queried_host: String,
    /// Elapsed time of the query against the system resolvers.
    pub system_query_time: QueryTime,
    /// System-configured resolvers, platform order, deduplicated.
    pub system_servers: Vec<IpAddr>,
    /// Public-resolver trials in fixed order (always three entries).
    pub public_comparison: Vec<PublicDnsTiming>,
}

impl DnsResult {
    /// Default-filled result for a unit that never ran: every timing is
    /// unreachable but the public comparison keeps its three fixed slots.
    pub fn default_for(host: &str) -> Self {
        Self {
            queried_host: host.to_string(),
            system_query_time: QueryTime::Unreachable,
            system_servers: Vec::new(),
            public_comparison: crate::defaults::PUBLIC_DNS_SERVERS
                .iter()
                .map(|&server| PublicDnsTiming {
                    server,
                    time: QueryTime::Unreachable,
                })
                .collect(),
        }
    }
}

/// Throughput estimate from one speed-test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedResult {
    /// Download rate in megabits per second, rounded to 2 decimals.
    pub download_mbps: f64,
    /// Upload rate in megabits per second, rounded to 2 decimals.
    pub upload_mbps: f64,
    /// Wall-clock duration of the download phase.
    pub elapsed: Duration,
    /// Endpoint that served the test, or a sentinel marker.
    pub server: String,
}

impl SpeedResult {
    /// Result when no candidate endpoint answered the existence check.
    pub fn unreachable() -> Self {
        Self {
            download_mbps: 0.0,
            upload_mbps: 0.0,
            elapsed: Duration::ZERO,
            server: NO_ENDPOINT_SENTINEL.to_string(),
        }
    }

    /// Default-filled result for a unit that never ran.
    pub fn zeroed() -> Self {
        Self {
            download_mbps: 0.0,
            upload_mbps: 0.0,
            elapsed: Duration::ZERO,
            server: "-".to_string(),
        }
    }
}

/// Public-IP lookup record as returned by the lookup service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// The public address itself.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    /// Autonomous-system string.
    #[serde(default, rename = "as")]
    pub asn: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "regionName")]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub mobile: bool,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub hosting: bool,
    /// When the record was retrieved.
    #[serde(default = "Utc::now")]
    pub retrieved_at: DateTime<Utc>,
}

impl IpInfo {
    /// Default-filled record for a lookup that never resolved.
    pub fn unknown() -> Self {
        Self {
            status: None,
            message: None,
            query: Some("unknown".to_string()),
            isp: Some("unknown".to_string()),
            asn: Some("unknown".to_string()),
            country: None,
            region_name: None,
            city: None,
            lat: None,
            lon: None,
            timezone: None,
            mobile: false,
            proxy: false,
            hosting: false,
            retrieved_at: Utc::now(),
        }
    }
}

/// Geolocation record for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub provider: Option<String>,
}

impl GeoInfo {
    /// Default-filled record keyed by whatever address is known.
    pub fn unknown_for(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            country: String::new(),
            region: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            timezone: String::new(),
            provider: None,
        }
    }
}

/// Combined report aggregating every measurement the run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub ip: Option<IpInfo>,
    pub geo: Option<GeoInfo>,
    pub speed: Option<SpeedResult>,
    pub ping: Option<PingStatistics>,
    pub dns: Option<DnsResult>,
    pub traceroute: Option<Vec<TracerouteHop>>,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            ip: None,
            geo: None,
            speed: None,
            ping: None,
            dns: None,
            traceroute: None,
            generated_at: Utc::now(),
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
