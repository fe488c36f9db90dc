//! Markdown rendering.

use super::{format_query_time, join_servers, opt, OutputFormatter, TRACE_DISPLAY_LIMIT};
use crate::{
    error::Result,
    models::{DnsResult, GeoInfo, IpInfo, PingStatistics, Report, SpeedResult, TracerouteHop},
};
use std::fmt::Write;

pub struct MarkdownFormatter;

fn ip_section(out: &mut String, ip: &IpInfo) {
    let _ = writeln!(out, "# IP Information\n");
    let _ = writeln!(out, "- **IP**: {}", opt(&ip.query));
    let _ = writeln!(out, "- **ISP**: {}", opt(&ip.isp));
    let _ = writeln!(out, "- **ASN**: {}", opt(&ip.asn));
    let _ = writeln!(out, "- **Proxy**: {}", ip.proxy);
    let _ = writeln!(out, "- **Mobile**: {}", ip.mobile);
    let _ = writeln!(out, "- **Hosting**: {}", ip.hosting);
}

fn geo_section(out: &mut String, geo: &GeoInfo) {
    let _ = writeln!(out, "# Geolocation\n");
    let _ = writeln!(out, "- **IP**: {}", geo.ip);
    let _ = writeln!(out, "- **Country**: {}", geo.country);
    let _ = writeln!(out, "- **Region**: {}", geo.region);
    let _ = writeln!(out, "- **City**: {}", geo.city);
    let _ = writeln!(out, "- **Coordinates**: {}, {}", geo.latitude, geo.longitude);
    let _ = writeln!(out, "- **Timezone**: {}", geo.timezone);
    if let Some(provider) = geo.provider.as_deref().filter(|p| !p.trim().is_empty()) {
        let _ = writeln!(out, "- **Provider**: {provider}");
    }
}

fn speed_section(out: &mut String, speed: &SpeedResult, ping: &PingStatistics) {
    let _ = writeln!(out, "# Speed Test\n");
    let _ = writeln!(out, "- **Download**: {} Mbps", speed.download_mbps);
    let _ = writeln!(out, "- **Upload**: {} Mbps", speed.upload_mbps);
    let _ = writeln!(out, "- **Ping (avg)**: {:.1} ms", ping.average_ms);
    let _ = writeln!(out, "- **Jitter**: {:.1} ms", ping.jitter_ms);
    let _ = writeln!(out, "- **Loss**: {:.1}%", ping.loss_percent);
    let _ = writeln!(out, "- **Server**: {}", speed.server);
}

fn dns_section(out: &mut String, dns: &DnsResult) {
    let _ = writeln!(out, "## DNS\n");
    let _ = writeln!(out, "- Queried Host: {}", dns.queried_host);
    let _ = writeln!(out, "- Query Time: {}", format_query_time(dns.system_query_time));
    let _ = writeln!(out, "- System DNS: {}", join_servers(&dns.system_servers));
    let _ = writeln!(out, "\n### Public DNS comparison\n");
    if dns.public_comparison.is_empty() {
        let _ = writeln!(out, "- (no data)");
    } else {
        for trial in &dns.public_comparison {
            let _ = writeln!(out, "- {}: {}", trial.server, format_query_time(trial.time));
        }
    }
}

fn trace_section(out: &mut String, hops: &[TracerouteHop]) {
    let _ = writeln!(out, "## Traceroute (top {TRACE_DISPLAY_LIMIT})\n");
    let _ = writeln!(out, "| Hop | Address | Hostname | Avg RTT (ms) |");
    let _ = writeln!(out, "|-----|---------|----------|--------------|");
    if hops.is_empty() {
        let _ = writeln!(out, "| - | - | - | - |");
        return;
    }
    for hop in hops.iter().take(TRACE_DISPLAY_LIMIT) {
        let rtt = hop
            .avg_rtt_ms
            .map(|ms| format!("{ms:.0}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            hop.hop,
            hop.address,
            opt(&hop.hostname),
            rtt
        );
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_ip(&self, ip: &IpInfo) -> Result<String> {
        let mut out = String::new();
        ip_section(&mut out, ip);
        Ok(out)
    }

    fn format_geo(&self, geo: &GeoInfo, _ip: Option<&IpInfo>) -> Result<String> {
        let mut out = String::new();
        geo_section(&mut out, geo);
        Ok(out)
    }

    fn format_speed(&self, speed: &SpeedResult, ping: &PingStatistics) -> Result<String> {
        let mut out = String::new();
        speed_section(&mut out, speed, ping);
        Ok(out)
    }

    fn format_report(&self, report: &Report) -> Result<String> {
        let ip = report.ip.clone().unwrap_or_else(IpInfo::unknown);
        let geo = report
            .geo
            .clone()
            .unwrap_or_else(|| GeoInfo::unknown_for(opt(&ip.query)));
        let speed = report.speed.clone().unwrap_or_else(SpeedResult::zeroed);
        let ping = report.ping.clone().unwrap_or_else(PingStatistics::empty);
        let dns = report
            .dns
            .clone()
            .unwrap_or_else(|| DnsResult::default_for(""));
        let hops = report.traceroute.clone().unwrap_or_default();

        let mut out = String::new();
        ip_section(&mut out, &ip);
        out.push('\n');
        geo_section(&mut out, &geo);
        out.push('\n');
        speed_section(&mut out, &speed, &ping);
        out.push('\n');
        dns_section(&mut out, &dns);
        out.push('\n');
        trace_section(&mut out, &hops);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_renders_placeholder_row() {
        let mut report = Report::new();
        report.traceroute = Some(Vec::new());
        let md = MarkdownFormatter.format_report(&report).unwrap();
        assert!(md.contains("| - | - | - | - |"));
    }

    #[test]
    fn test_long_path_is_truncated_for_display() {
        let mut report = Report::new();
        report.traceroute = Some((1..=30).map(TracerouteHop::unresponsive).collect());
        let md = MarkdownFormatter.format_report(&report).unwrap();
        assert!(md.contains("| 12 |"));
        assert!(!md.contains("| 13 |"));
    }

    #[test]
    fn test_blank_provider_is_omitted() {
        let mut geo = GeoInfo::unknown_for("203.0.113.9");
        geo.provider = Some("  ".to_string());
        let md = MarkdownFormatter.format_geo(&geo, None).unwrap();
        assert!(!md.contains("Provider"));
    }
}
