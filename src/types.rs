//! Shared enums used across the measurement engines

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Outcome of a single echo probe.
///
/// A hop-limit-exceeded answer is a successful probe of an intermediate
/// hop: its responder address and round-trip time are valid. Everything
/// that is not a reply folds into `Timeout` or `Error`; a probe never
/// surfaces a control-flow failure to its caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    /// Echo reply from the probed destination.
    Reply { from: IpAddr, rtt: Duration },
    /// Hop-limit exceeded en route; `from` is the intermediate router.
    HopExceeded { from: IpAddr, rtt: Duration },
    /// No answer before the per-probe timeout.
    Timeout,
    /// Unreachable destination or OS-level failure.
    Error,
}

impl ProbeOutcome {
    /// Whether the probe produced a valid round-trip time.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reply { .. } | Self::HopExceeded { .. })
    }

    /// Round-trip time in milliseconds, if the probe was answered.
    pub fn rtt_ms(&self) -> Option<f64> {
        match self {
            Self::Reply { rtt, .. } | Self::HopExceeded { rtt, .. } => {
                Some(rtt.as_secs_f64() * 1000.0)
            }
            Self::Timeout | Self::Error => None,
        }
    }

    /// Address that answered the probe, if any.
    pub fn responder(&self) -> Option<IpAddr> {
        match self {
            Self::Reply { from, .. } | Self::HopExceeded { from, .. } => Some(*from),
            Self::Timeout | Self::Error => None,
        }
    }
}

/// Elapsed time of a DNS query, with an explicit no-data marker.
///
/// Replaces the NaN/infinity sentinels of older diagnostics tools: the
/// discrimination survives serialization and display, while
/// [`QueryTime::as_millis`] still maps `Unreachable` to `f64::INFINITY`
/// so timings stay ordered for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTime {
    /// Query answered within the timeout; elapsed milliseconds.
    Measured(f64),
    /// Query failed or timed out after all retries.
    Unreachable,
}

impl QueryTime {
    /// Elapsed milliseconds, `f64::INFINITY` when unreachable.
    pub fn as_millis(&self) -> f64 {
        match self {
            Self::Measured(ms) => *ms,
            Self::Unreachable => f64::INFINITY,
        }
    }

    /// Whether a measurement was actually taken.
    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }
}

impl fmt::Display for QueryTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(ms) => write!(f, "{:.1} ms", ms),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Requested report mode; determines the set of measurement units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Public IP information only.
    Ip,
    /// Geolocation (implies the public-IP unit as a dependency).
    Geo,
    /// Ping statistics and throughput.
    Speed,
    /// Every measurement unit.
    All,
}

impl ReportMode {
    pub fn wants_ip(&self) -> bool {
        matches!(self, Self::Ip | Self::Geo | Self::All)
    }

    pub fn wants_geo(&self) -> bool {
        matches!(self, Self::Geo | Self::All)
    }

    pub fn wants_ping(&self) -> bool {
        matches!(self, Self::Speed | Self::All)
    }

    pub fn wants_speed(&self) -> bool {
        matches!(self, Self::Speed | Self::All)
    }

    pub fn wants_dns(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn wants_trace(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ip => "ip",
            Self::Geo => "geo",
            Self::Speed => "speed",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

/// Output rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    Csv,
    #[value(alias = "md")]
    Markdown,
}
