//! CSV rendering, one header+row block per section.

use super::OutputFormatter;
use crate::{
    error::Result,
    models::{DnsResult, GeoInfo, IpInfo, PingStatistics, Report, SpeedResult, TracerouteHop},
    types::QueryTime,
};
use std::fmt::Write;

pub struct CsvFormatter;

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt_escape(value: &Option<String>) -> String {
    escape(value.as_deref().unwrap_or(""))
}

fn opt_num<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn time_cell(time: QueryTime) -> String {
    match time {
        QueryTime::Measured(ms) => format!("{ms}"),
        QueryTime::Unreachable => "unreachable".to_string(),
    }
}

fn ip_block(out: &mut String, ip: &IpInfo) {
    let _ = writeln!(out, "ip,isp,asn,country,region,city,lat,lon,timezone");
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{},{},{}",
        opt_escape(&ip.query),
        opt_escape(&ip.isp),
        opt_escape(&ip.asn),
        opt_escape(&ip.country),
        opt_escape(&ip.region_name),
        opt_escape(&ip.city),
        opt_num(&ip.lat),
        opt_num(&ip.lon),
        opt_escape(&ip.timezone),
    );
}

fn geo_block(out: &mut String, geo: &GeoInfo) {
    let _ = writeln!(out, "ip,country,region,city,lat,lon,timezone,provider");
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{},{}",
        escape(&geo.ip),
        escape(&geo.country),
        escape(&geo.region),
        escape(&geo.city),
        geo.latitude,
        geo.longitude,
        escape(&geo.timezone),
        opt_escape(&geo.provider),
    );
}

fn speed_block(out: &mut String, speed: &SpeedResult, ping: &PingStatistics) {
    let _ = writeln!(out, "download_mbps,upload_mbps,duration_s,server");
    let _ = writeln!(
        out,
        "{},{},{},{}",
        speed.download_mbps,
        speed.upload_mbps,
        speed.elapsed.as_secs_f64(),
        escape(&speed.server),
    );
    let _ = writeln!(out, "ping_avg_ms,ping_jitter_ms,packet_loss_pct");
    let _ = writeln!(
        out,
        "{},{},{}",
        ping.average_ms, ping.jitter_ms, ping.loss_percent
    );
}

fn dns_block(out: &mut String, dns: &DnsResult) {
    let _ = writeln!(out, "dns_host,dns_time_ms,system_dns,public_dns,time_ms");
    let system = dns
        .system_servers
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("|");
    for trial in &dns.public_comparison {
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            escape(&dns.queried_host),
            time_cell(dns.system_query_time),
            escape(&system),
            trial.server,
            time_cell(trial.time),
        );
    }
}

fn trace_block(out: &mut String, hops: &[TracerouteHop]) {
    let _ = writeln!(out, "hop,address,hostname,avg_rtt_ms");
    for hop in hops {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            hop.hop,
            escape(&hop.address),
            opt_escape(&hop.hostname),
            opt_num(&hop.avg_rtt_ms),
        );
    }
}

impl OutputFormatter for CsvFormatter {
    fn format_ip(&self, ip: &IpInfo) -> Result<String> {
        let mut out = String::new();
        ip_block(&mut out, ip);
        Ok(out)
    }

    fn format_geo(&self, geo: &GeoInfo, _ip: Option<&IpInfo>) -> Result<String> {
        let mut out = String::new();
        geo_block(&mut out, geo);
        Ok(out)
    }

    fn format_speed(&self, speed: &SpeedResult, ping: &PingStatistics) -> Result<String> {
        let mut out = String::new();
        speed_block(&mut out, speed, ping);
        Ok(out)
    }

    fn format_report(&self, report: &Report) -> Result<String> {
        let mut out = String::new();
        if let Some(ip) = &report.ip {
            ip_block(&mut out, ip);
            out.push('\n');
        }
        if let Some(geo) = &report.geo {
            geo_block(&mut out, geo);
            out.push('\n');
        }
        if let (Some(speed), Some(ping)) = (&report.speed, &report.ping) {
            speed_block(&mut out, speed, ping);
            out.push('\n');
        }
        if let Some(dns) = &report.dns {
            dns_block(&mut out, dns);
            out.push('\n');
        }
        if let Some(hops) = &report.traceroute {
            trace_block(&mut out, hops);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let mut geo = GeoInfo::unknown_for("203.0.113.9");
        geo.city = "Washington, D.C.".to_string();
        let csv = CsvFormatter.format_geo(&geo, None).unwrap();
        assert!(csv.contains("\"Washington, D.C.\""));
    }

    #[test]
    fn test_dns_block_emits_one_row_per_public_server() {
        let dns = DnsResult::default_for("example.com");
        let mut out = String::new();
        dns_block(&mut out, &dns);
        // Header plus the three fixed trials.
        assert_eq!(out.lines().count(), 4);
        assert!(out.contains("8.8.8.8"));
        assert!(out.contains("unreachable"));
    }

    #[test]
    fn test_trace_block_keeps_full_path() {
        let hops: Vec<TracerouteHop> = (1..=30).map(TracerouteHop::unresponsive).collect();
        let mut out = String::new();
        trace_block(&mut out, &hops);
        assert_eq!(out.lines().count(), 31);
    }
}
