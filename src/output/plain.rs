//! Human-oriented text rendering with optional color.

use super::{format_query_time, join_servers, opt, OutputFormatter, TRACE_DISPLAY_LIMIT};
use crate::{
    error::Result,
    models::{DnsResult, GeoInfo, IpInfo, PingStatistics, Report, SpeedResult, TracerouteHop},
};
use colored::Colorize;
use std::fmt::Write;

pub struct PlainFormatter {
    color: bool,
}

impl PlainFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn ip_section(&self, out: &mut String, ip: &IpInfo) {
        let _ = writeln!(out, "{}", self.heading("IP Information"));
        let _ = writeln!(out, "IP: {}", opt(&ip.query));
        let _ = writeln!(out, "ISP: {}  ASN: {}", opt(&ip.isp), opt(&ip.asn));
        let _ = writeln!(out, "Proxy: {}  Mobile: {}", ip.proxy, ip.mobile);
    }

    fn geo_section(&self, out: &mut String, geo: &GeoInfo) {
        let _ = writeln!(out, "{}", self.heading("Geolocation"));
        let _ = writeln!(out, "IP: {}", geo.ip);
        let _ = writeln!(out, "Country: {}", geo.country);
        let _ = writeln!(out, "Region: {}", geo.region);
        let _ = writeln!(out, "City: {}", geo.city);
        let _ = writeln!(out, "Lat,Lon: {}, {}", geo.latitude, geo.longitude);
        let _ = writeln!(out, "Timezone: {}", geo.timezone);
    }

    fn speed_section(&self, out: &mut String, speed: &SpeedResult, ping: &PingStatistics) {
        let _ = writeln!(out, "{}", self.heading("Speed Test"));
        let _ = writeln!(out, "Download: {} Mbps", speed.download_mbps);
        let _ = writeln!(out, "Upload: {} Mbps", speed.upload_mbps);
        let _ = writeln!(out, "Server: {}", speed.server);
        let _ = writeln!(out, "{}", self.heading("Ping"));
        let _ = writeln!(
            out,
            "Avg: {:.1} ms  Jitter: {:.1} ms  Loss: {:.1}%",
            ping.average_ms, ping.jitter_ms, ping.loss_percent
        );
    }

    fn dns_section(&self, out: &mut String, dns: &DnsResult) {
        let _ = writeln!(out, "{}", self.heading("DNS"));
        let _ = writeln!(
            out,
            "Queried: {}  Time: {}",
            dns.queried_host,
            format_query_time(dns.system_query_time)
        );
        let _ = writeln!(out, "System DNS: {}", join_servers(&dns.system_servers));
        let _ = writeln!(out, "Public DNS comparison:");
        for trial in &dns.public_comparison {
            let _ = writeln!(out, " - {}: {}", trial.server, format_query_time(trial.time));
        }
    }

    fn trace_section(&self, out: &mut String, hops: &[TracerouteHop]) {
        let _ = writeln!(out, "{}", self.heading("Traceroute (first hops)"));
        if hops.is_empty() {
            let _ = writeln!(out, "- - (-) - -");
            return;
        }
        for hop in hops.iter().take(TRACE_DISPLAY_LIMIT) {
            let rtt = hop
                .avg_rtt_ms
                .map(|ms| format!("{ms:.0} ms"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{} {} ({}) - {}",
                hop.hop,
                hop.address,
                opt(&hop.hostname),
                rtt
            );
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_ip(&self, ip: &IpInfo) -> Result<String> {
        let mut out = String::new();
        self.ip_section(&mut out, ip);
        Ok(out)
    }

    fn format_geo(&self, geo: &GeoInfo, _ip: Option<&IpInfo>) -> Result<String> {
        let mut out = String::new();
        self.geo_section(&mut out, geo);
        Ok(out)
    }

    fn format_speed(&self, speed: &SpeedResult, ping: &PingStatistics) -> Result<String> {
        let mut out = String::new();
        self.speed_section(&mut out, speed, ping);
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
        self.ip_section(&mut out, &ip);
        out.push('\n');
        self.geo_section(&mut out, &geo);
        out.push('\n');
        self.speed_section(&mut out, &speed, &ping);
        out.push('\n');
        self.dns_section(&mut out, &dns);
        out.push('\n');
        self.trace_section(&mut out, &hops);
        Ok(out)
    }
}
