//! DNS diagnostics and shared resolution helpers
//!
//! Times an A-record query against the system-configured resolvers and
//! races the same query against a fixed set of public resolvers. Every
//! trial is isolated: a resolver that fails or times out degrades to
//! [`QueryTime::Unreachable`] without touching any other trial. The
//! module also hosts the forward/reverse resolution helpers shared by
//! the ping and traceroute engines.

use crate::{
    defaults,
    error::{AppError, Result},
    models::{DnsResult, PublicDnsTiming},
    types::QueryTime,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trust_dns_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Comparative DNS diagnostics engine.
#[derive(Debug, Clone, Default)]
pub struct DnsEngine;

impl DnsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run the full diagnostics for `host`.
    ///
    /// Never fails: a missing system configuration falls back to the
    /// documented default pair, and failed queries record
    /// [`QueryTime::Unreachable`]. The public comparison preserves the
    /// fixed trial order regardless of which trials fail.
    pub async fn diagnose(&self, host: &str, token: &CancellationToken) -> DnsResult {
        let system_servers = system_dns_servers();

        let system_query_time = if token.is_cancelled() {
            QueryTime::Unreachable
        } else {
            time_query(
                &system_servers,
                host,
                defaults::SYSTEM_QUERY_TIMEOUT,
                defaults::SYSTEM_QUERY_RETRIES,
            )
            .await
        };

        let mut public_comparison = Vec::with_capacity(defaults::PUBLIC_DNS_SERVERS.len());
        for &server in defaults::PUBLIC_DNS_SERVERS.iter() {
            let time = if token.is_cancelled() {
                QueryTime::Unreachable
            } else {
                time_query(
                    &[server],
                    host,
                    defaults::PUBLIC_QUERY_TIMEOUT,
                    defaults::PUBLIC_QUERY_RETRIES,
                )
                .await
            };
            public_comparison.push(PublicDnsTiming { server, time });
        }

        DnsResult {
            queried_host: host.to_string(),
            system_query_time,
            system_servers,
            public_comparison,
        }
    }
}

/// Time one A-record query against the given resolvers.
async fn time_query(servers: &[IpAddr], host: &str, timeout: Duration, retries: usize) -> QueryTime {
    let resolver = make_resolver(servers, timeout, retries);
    let start = Instant::now();
    match resolver.ipv4_lookup(host).await {
        Ok(_) => QueryTime::Measured(start.elapsed().as_secs_f64() * 1000.0),
        Err(err) => {
            debug!(host, ?servers, %err, "DNS trial failed");
            QueryTime::Unreachable
        }
    }
}

/// Build a resolver pinned to specific servers with explicit timing.
///
/// `ResolverOpts::attempts` counts retries after the initial send, so
/// it takes the retry budget unchanged.
fn make_resolver(servers: &[IpAddr], timeout: Duration, retries: usize) -> TokioAsyncResolver {
    let mut config = ResolverConfig::new();
    for &server in servers {
        let socket_addr = SocketAddr::new(server, 53);
        config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
    }

    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = retries;

    TokioAsyncResolver::tokio(config, opts)
}

/// System-configured resolver addresses across all interfaces,
/// deduplicated in enumeration order. Falls back to the documented
/// default pair when nothing is configured.
pub fn system_dns_servers() -> Vec<IpAddr> {
    match system_conf::read_system_conf() {
        Ok((config, _)) => {
            let servers = dedup_preserving_order(
                config.name_servers().iter().map(|ns| ns.socket_addr.ip()),
            );
            if servers.is_empty() {
                defaults::FALLBACK_DNS_SERVERS.to_vec()
            } else {
                servers
            }
        }
        Err(err) => {
            warn!(%err, "could not read system DNS configuration, using fallback servers");
            defaults::FALLBACK_DNS_SERVERS.to_vec()
        }
    }
}

/// Drop duplicate addresses while keeping first-seen order.
fn dedup_preserving_order(addrs: impl Iterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut servers: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if !servers.contains(&addr) {
            servers.push(addr);
        }
    }
    servers
}

/// Resolve `host` to its IPv4 candidate addresses.
///
/// IP literals short-circuit without touching the network. Total
/// resolution failure is a hard error; callers decide whether that is a
/// unit-level failure or a degraded path.
pub async fn resolve_ipv4(host: &str) -> Result<Vec<Ipv4Addr>> {
    if let Ok(literal) = host.parse::<Ipv4Addr>() {
        return Ok(vec![literal]);
    }

    let resolver = system_resolver();
    let lookup = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| AppError::dns_resolution(format!("failed to resolve {host}: {e}")))?;

    let addrs: Vec<Ipv4Addr> = lookup
        .iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();

    if addrs.is_empty() {
        Err(AppError::dns_resolution(format!(
            "{host} resolved to no IPv4 addresses"
        )))
    } else {
        Ok(addrs)
    }
}

/// Best-effort reverse lookup; `None` when the address has no PTR record.
pub async fn reverse_hostname(addr: IpAddr) -> Option<String> {
    let resolver = system_resolver();
    match resolver.reverse_lookup(addr).await {
        Ok(lookup) => lookup
            .iter()
            .next()
            .map(|ptr| ptr.0.to_string().trim_end_matches('.').to_string()),
        Err(err) => {
            debug!(%addr, %err, "reverse lookup failed");
            None
        }
    }
}

/// System resolver, or the library default when the platform
/// configuration cannot be read.
fn system_resolver() -> TokioAsyncResolver {
    match system_conf::read_system_conf() {
        Ok((config, opts)) => TokioAsyncResolver::tokio(config, opts),
        Err(err) => {
            warn!(%err, "could not read system DNS configuration, using library defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budgets_bound_trial_duration() {
        // One retry for the system query, none for public trials. The
        // resolver's `attempts` option already means retries-after-first,
        // so a failing public trial never exceeds one timeout window.
        assert_eq!(defaults::SYSTEM_QUERY_RETRIES, 1);
        assert_eq!(defaults::PUBLIC_QUERY_RETRIES, 0);

        let mut opts = ResolverOpts::default();
        opts.attempts = defaults::PUBLIC_QUERY_RETRIES;
        opts.timeout = defaults::PUBLIC_QUERY_TIMEOUT;
        assert_eq!(opts.attempts, 0);
        assert_eq!(opts.timeout, defaults::PUBLIC_QUERY_TIMEOUT);
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let addrs = vec![
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
            "10.0.0.3".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        ];
        let deduped = dedup_preserving_order(addrs.into_iter());
        let rendered: Vec<String> = deduped.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal_short_circuits() {
        let addrs = resolve_ipv4("192.0.2.7").await.unwrap();
        assert_eq!(addrs, vec!["192.0.2.7".parse::<Ipv4Addr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_cancelled_diagnose_keeps_fixed_trial_slots() {
        let token = CancellationToken::new();
        token.cancel();

        let result = DnsEngine::new().diagnose("example.com", &token).await;
        assert_eq!(result.queried_host, "example.com");
        assert_eq!(result.system_query_time, QueryTime::Unreachable);
        assert_eq!(result.public_comparison.len(), 3);
        let order: Vec<String> = result
            .public_comparison
            .iter()
            .map(|t| t.server.to_string())
            .collect();
        assert_eq!(order, vec!["8.8.8.8", "1.1.1.1", "9.9.9.9"]);
        assert!(result
            .public_comparison
            .iter()
            .all(|t| t.time == QueryTime::Unreachable));
    }
}
