//! Command-line interface

use crate::types::{OutputFormat, ReportMode};
use clap::Parser;

/// netstats - concurrent network diagnostics from the command line
#[derive(Parser, Debug, Clone)]
#[command(name = "netstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Report mode: ip, geo, speed or all
    #[arg(value_enum)]
    pub mode: Option<ReportMode>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long)]
    pub json: bool,

    /// Overall run deadline in milliseconds
    #[arg(short, long, env = "NETSTATS_TIMEOUT_MS", default_value_t = crate::defaults::DEFAULT_RUN_TIMEOUT_MS)]
    pub timeout: u64,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Host used for ping, DNS and traceroute measurements
    #[arg(long, env = "NETSTATS_TARGET", default_value = crate::defaults::DEFAULT_TARGET_HOST)]
    pub target: String,

    /// Parallel connections used by the speed test
    #[arg(long, default_value_t = crate::defaults::TRANSFER_PARALLELISM)]
    pub parallel: usize,
}

impl Cli {
    /// Validate arguments for conflicts and out-of-range values
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("--timeout must be greater than zero".to_string());
        }
        if self.parallel == 0 {
            return Err("--parallel must be at least 1".to_string());
        }
        if self.target.trim().is_empty() {
            return Err("--target must not be empty".to_string());
        }
        Ok(())
    }

    /// Requested format; `--json` overrides `--format`.
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Colors apply only to plain output on a terminal.
    pub fn use_colors(&self) -> bool {
        !self.no_color && self.effective_format() == OutputFormat::Plain
    }
}
