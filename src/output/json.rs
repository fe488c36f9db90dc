//! JSON rendering via serde.

use super::OutputFormatter;
use crate::{
    error::{AppError, Result},
    models::{GeoInfo, IpInfo, PingStatistics, Report, SpeedResult},
};
use serde::Serialize;

pub struct JsonFormatter;

fn to_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::parse(format!("report serialization failed: {e}")))
}

#[derive(Serialize)]
struct SpeedSection<'a> {
    speed: &'a SpeedResult,
    ping: &'a PingStatistics,
}

impl OutputFormatter for JsonFormatter {
    fn format_ip(&self, ip: &IpInfo) -> Result<String> {
        to_pretty(ip)
    }

    fn format_geo(&self, geo: &GeoInfo, _ip: Option<&IpInfo>) -> Result<String> {
        to_pretty(geo)
    }

    fn format_speed(&self, speed: &SpeedResult, ping: &PingStatistics) -> Result<String> {
        to_pretty(&SpeedSection { speed, ping })
    }

    fn format_report(&self, report: &Report) -> Result<String> {
        to_pretty(report)
    }
}
