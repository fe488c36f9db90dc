//! Report rendering
//!
//! One formatter per output format, all behind [`OutputFormatter`].
//! Formatters are pure: they turn records into strings and never touch
//! the network, the filesystem, or the measurement engines.

use crate::{
    error::Result,
    models::{GeoInfo, IpInfo, PingStatistics, Report, SpeedResult},
    types::{OutputFormat, QueryTime},
};
use std::net::IpAddr;

mod csv;
mod json;
mod markdown;
mod plain;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use markdown::MarkdownFormatter;
pub use plain::PlainFormatter;

/// Hops shown by the human-oriented renderers; CSV and JSON keep the
/// full path.
const TRACE_DISPLAY_LIMIT: usize = 12;

/// Renders measurement records into one of the output formats.
pub trait OutputFormatter {
    fn format_ip(&self, ip: &IpInfo) -> Result<String>;
    fn format_geo(&self, geo: &GeoInfo, ip: Option<&IpInfo>) -> Result<String>;
    fn format_speed(&self, speed: &SpeedResult, ping: &PingStatistics) -> Result<String>;
    fn format_report(&self, report: &Report) -> Result<String>;
}

/// Formatter instance for the requested format.
pub fn formatter_for(format: OutputFormat, color: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Plain => Box::new(PlainFormatter::new(color)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

fn format_query_time(time: QueryTime) -> String {
    match time {
        QueryTime::Measured(ms) => format!("{ms:.0} ms"),
        QueryTime::Unreachable => "unreachable".to_string(),
    }
}

fn join_servers(servers: &[IpAddr]) -> String {
    servers
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DnsResult;
    use crate::types::ReportMode;

    fn full_report() -> Report {
        let mut report = Report::new();
        report.ip = Some(IpInfo::unknown());
        report.geo = Some(GeoInfo::unknown_for("unknown"));
        report.speed = Some(SpeedResult::zeroed());
        report.ping = Some(PingStatistics::empty());
        report.dns = Some(DnsResult::default_for("example.com"));
        report.traceroute = Some(Vec::new());
        report
    }

    #[test]
    fn test_every_formatter_renders_a_default_filled_report() {
        for format in [
            OutputFormat::Plain,
            OutputFormat::Json,
            OutputFormat::Csv,
            OutputFormat::Markdown,
        ] {
            let formatter = formatter_for(format, false);
            let rendered = formatter.format_report(&full_report()).unwrap();
            assert!(!rendered.is_empty(), "{format:?} produced nothing");
        }
    }

    #[test]
    fn test_query_time_rendering() {
        assert_eq!(format_query_time(QueryTime::Measured(12.4)), "12 ms");
        assert_eq!(format_query_time(QueryTime::Unreachable), "unreachable");
    }

    #[test]
    fn test_mode_scoped_surfaces_render() {
        let report = full_report();
        let formatter = formatter_for(OutputFormat::Plain, false);
        for mode in [ReportMode::Ip, ReportMode::Geo, ReportMode::Speed] {
            let rendered = match mode {
                ReportMode::Ip => formatter.format_ip(report.ip.as_ref().unwrap()),
                ReportMode::Geo => {
                    formatter.format_geo(report.geo.as_ref().unwrap(), report.ip.as_ref())
                }
                _ => formatter.format_speed(
                    report.speed.as_ref().unwrap(),
                    report.ping.as_ref().unwrap(),
                ),
            };
            assert!(!rendered.unwrap().is_empty());
        }
    }
}
