//! netstats - concurrent network diagnostics CLI

use clap::Parser;
use netstats::{
    cli::Cli,
    error::{AppError, Result},
    models::{GeoInfo, IpInfo, PingStatistics, SpeedResult},
    output::formatter_for,
    runner::{ConsoleProgress, ReportRunner},
    types::ReportMode,
    PKG_NAME, VERSION,
};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {panic_info}");
        process::exit(1);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(message) = cli.validate() {
        eprintln!("Error: {message}");
        process::exit(1);
    }

    if let Err(e) = run_application(cli).await {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    let Some(mode) = cli.mode else {
        println!("{PKG_NAME} v{VERSION}");
        println!("Usage: netstats <ip|geo|speed|all> [--format plain|json|csv|md]");
        return Ok(());
    };

    let runner = ReportRunner::new(&cli.target, cli.parallel)?
        .with_progress(Arc::new(ConsoleProgress::new(cli.use_colors())));
    let outcome = runner.run(mode, Duration::from_millis(cli.timeout)).await;

    let formatter = formatter_for(cli.effective_format(), cli.use_colors());
    let report = &outcome.report;
    let rendered = match mode {
        ReportMode::Ip => {
            let ip = report.ip.clone().unwrap_or_else(IpInfo::unknown);
            formatter.format_ip(&ip)?
        }
        ReportMode::Geo => {
            let geo = report
                .geo
                .clone()
                .unwrap_or_else(|| GeoInfo::unknown_for("unknown"));
            formatter.format_geo(&geo, report.ip.as_ref())?
        }
        ReportMode::Speed => {
            let speed = report.speed.clone().unwrap_or_else(SpeedResult::zeroed);
            let ping = report.ping.clone().unwrap_or_else(PingStatistics::empty);
            formatter.format_speed(&speed, &ping)?
        }
        ReportMode::All => formatter.format_report(report)?,
    };
    println!("{rendered}");

    if !outcome.failed_units.is_empty() {
        eprintln!("Incomplete units: {}", outcome.failed_units.join(", "));
    }
    if outcome.timed_out {
        return Err(AppError::timeout(format!(
            "run deadline of {} ms expired before every unit finished",
            cli.timeout
        )));
    }
    Ok(())
}
