//! netstats
//!
//! A network diagnostics tool that measures public-IP information,
//! geolocation, latency statistics, hop-by-hop path, DNS resolver
//! performance and bulk-transfer throughput, and renders the results
//! as plain text, JSON, CSV or Markdown.

pub mod cli;
pub mod dns;
pub mod error;
pub mod lookup;
pub mod models;
pub mod output;
pub mod ping;
pub mod probe;
pub mod runner;
pub mod speed;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{DnsResult, GeoInfo, IpInfo, PingStatistics, Report, SpeedResult, TracerouteHop};
pub use runner::{ReportRunner, RunOutcome};
pub use types::{OutputFormat, ProbeOutcome, QueryTime, ReportMode};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values and measurement constants
pub mod defaults {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    /// Host measured by the ping, DNS and traceroute units.
    pub const DEFAULT_TARGET_HOST: &str = "google.com";

    /// Overall run deadline shared by every measurement unit.
    pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 15_000;

    /// Wall-clock duration of one ping sampling run.
    pub const PING_DURATION: Duration = Duration::from_secs(5);
    /// Per-probe echo timeout.
    pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);
    /// Delay between consecutive ping probes (rate limit).
    pub const PROBE_INTERVAL: Duration = Duration::from_millis(200);

    /// Hop ceiling for path discovery.
    pub const MAX_HOPS: u8 = 30;
    /// Echo probes issued per TTL.
    pub const PROBES_PER_HOP: usize = 2;

    /// Timeout for the system-resolver timing query.
    pub const SYSTEM_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
    /// Retries after a failed system-resolver query (the resolver's
    /// `attempts` counts retries on top of the initial send).
    pub const SYSTEM_QUERY_RETRIES: usize = 1;
    /// Timeout for each public-resolver trial.
    pub const PUBLIC_QUERY_TIMEOUT: Duration = Duration::from_secs(3);
    /// Retries after a failed public-resolver trial.
    pub const PUBLIC_QUERY_RETRIES: usize = 0;

    /// Public resolvers compared against the system configuration,
    /// in fixed trial order.
    pub const PUBLIC_DNS_SERVERS: [IpAddr; 3] = [
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
        IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
    ];

    /// Resolvers used when the platform reports no configured DNS servers.
    pub const FALLBACK_DNS_SERVERS: [IpAddr; 2] = [
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
    ];

    /// Candidate download endpoints, in priority order.
    pub const DOWNLOAD_URLS: &[&str] = &[
        "https://speed.cloudflare.com/__down?bytes=10485760",
        "https://ipv4.download.thinkbroadband.com/10MB.zip",
    ];
    /// Upload endpoint for the throughput test.
    pub const UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

    /// Wall-clock duration of the download phase.
    pub const DOWNLOAD_DURATION: Duration = Duration::from_secs(8);
    /// Wall-clock duration of the upload phase.
    pub const UPLOAD_DURATION: Duration = Duration::from_secs(12);
    /// Concurrent transfer workers per phase.
    pub const TRANSFER_PARALLELISM: usize = 4;
    /// Addressable span for randomized range requests (first 10 MB).
    pub const RANGE_SPAN: u64 = 10_000_000;
    /// Bytes requested per ranged download (128 KiB).
    pub const RANGE_CHUNK: u64 = 131_072;
    /// Random payload size per upload request (256 KiB).
    pub const UPLOAD_PAYLOAD_BYTES: usize = 256 * 1024;

    /// Transfer client timeout.
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
    /// Lookup-service client timeout.
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
    /// Base URL of the IP/geolocation lookup service.
    pub const IP_API_BASE: &str = "http://ip-api.com";
}
