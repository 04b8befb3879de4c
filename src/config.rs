use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Parser, Clone, Debug)]
#[command(about = "Terminal dashboard for hourly time-bias analysis and open positions")]
pub struct CliParams {
    /// Base URL of the analysis backend
    #[clap(
        long = "api-base",
        env = "BIAS_API_BASE",
        default_value = DEFAULT_API_BASE
    )]
    pub api_base: String,

    /// File holding persisted dashboard preferences (theme)
    #[clap(
        long = "state-file",
        env = "BIAS_STATE_FILE",
        default_value = "dashboard_state.json"
    )]
    pub state_file: PathBuf,

    /// Directory the CSV export is written into
    #[clap(long = "export-dir", default_value = ".")]
    pub export_dir: PathBuf,

    /// Append-only log of failed operations
    #[clap(long = "error-log", default_value = "error_logs.jsonl")]
    pub error_log: PathBuf,

    /// Total timeout for a single backend request (e.g., 20s, 1m)
    #[clap(long = "timeout", value_name = "DURATION", default_value = "20s")]
    pub timeout: DurationSpec,

    /// Symbol to preselect once the symbol list arrives
    #[clap(short = 's', long = "symbol")]
    pub symbol: Option<String>,

    /// Leave the symbol refresh key unbound
    #[clap(long = "no-refresh")]
    pub no_refresh: bool,

    /// Leave the CSV export key unbound
    #[clap(long = "no-export")]
    pub no_export: bool,

    /// Leave the table search key unbound
    #[clap(long = "no-search")]
    pub no_search: bool,
}

impl CliParams {
    pub fn request_timeout(&self) -> Duration {
        self.timeout.as_duration()
    }

    pub fn api_base(&self) -> String {
        match self.api_base.trim().trim_end_matches('/') {
            "" => DEFAULT_API_BASE.to_string(),
            base => base.to_string(),
        }
    }

    pub fn controls(&self) -> OptionalControls {
        OptionalControls {
            refresh: !self.no_refresh,
            export: !self.no_export,
            search: !self.no_search,
        }
    }
}

/// Controls that may be left unwired; an absent control is simply not bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptionalControls {
    pub refresh: bool,
    pub export: bool,
    pub search: bool,
}

impl Default for OptionalControls {
    fn default() -> Self {
        OptionalControls {
            refresh: true,
            export: true,
            search: true,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DurationSpec(Duration);

impl DurationSpec {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for DurationSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        request_timeout_from(s).map(DurationSpec)
    }
}

const TIMEOUT_UNITS: &[(&[&str], f64)] = &[
    (&["ms", "millis"], 0.001),
    (&["s", "sec", "secs"], 1.0),
    (&["m", "min", "mins"], 60.0),
];

// A request timeout is a positive number followed by one of TIMEOUT_UNITS.
fn request_timeout_from(input: &str) -> Result<Duration, String> {
    let spec = input.trim();
    let unit = spec.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    let number = &spec[..spec.len() - unit.len()];
    if number.is_empty() || unit.is_empty() {
        return Err(format!("timeout `{spec}` must look like 500ms, 20s or 1m"));
    }
    let amount: f64 = number
        .parse()
        .map_err(|_| format!("timeout `{spec}` has an unreadable amount"))?;
    let unit = unit.trim().to_ascii_lowercase();
    let scale = TIMEOUT_UNITS
        .iter()
        .find(|(names, _)| names.contains(&unit.as_str()))
        .map(|(_, scale)| *scale)
        .ok_or_else(|| format!("timeout unit `{unit}` is not one of ms, s, m"))?;
    let seconds = amount * scale;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("timeout `{spec}` must be positive"));
    }
    Ok(Duration::from_secs_f64(seconds))
}
