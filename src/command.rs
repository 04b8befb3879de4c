use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub enum Command {
    SymbolsLoaded {
        ticket: u64,
        symbols: Vec<String>,
    },
    AnalysisLoaded {
        ticket: u64,
        symbol: String,
        stats: Vec<HourlyStat>,
    },
    PositionsLoaded {
        ticket: u64,
        positions: Vec<Position>,
    },
    BacktestLoaded {
        ticket: u64,
        records: Vec<BacktestRecord>,
    },
    LoadFailed {
        operation: Operation,
        ticket: u64,
        message: String,
    },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Symbols,
    Analysis(String),
    Positions,
    Backtest,
}

impl Operation {
    pub fn label(&self) -> String {
        match self {
            Operation::Symbols => "symbol list".to_string(),
            Operation::Analysis(symbol) => format!("analysis for {symbol}"),
            Operation::Positions => "open positions".to_string(),
            Operation::Backtest => "backtest results".to_string(),
        }
    }
}

/// Hands out tickets for one view's loads. Only the most recently issued
/// ticket may replace what the view shows.
#[derive(Debug, Default, Clone)]
pub struct RequestSeq {
    issued: u64,
}

impl RequestSeq {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.issued != 0 && ticket == self.issued
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyStat {
    #[serde(deserialize_with = "deserialize_hour")]
    pub hour_utc: u8,
    pub avg_volume: f64,
    pub avg_range: f64,
}

// The analysis CSVs are read through a dataframe, so an hour may arrive as 3.0.
fn deserialize_hour<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.fract() != 0.0 || !(0.0..=23.0).contains(&raw) {
        return Err(serde::de::Error::custom(format!(
            "hour_utc must be an integer in 0..=23, got {raw}"
        )));
    }
    Ok(raw as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCategory {
    Success,
    Warning,
    Muted,
}

impl BadgeCategory {
    pub fn from_status(status: &str) -> BadgeCategory {
        let status = status.to_lowercase();
        let has_any = |keywords: &[&str]| keywords.iter().any(|kw| status.contains(kw));
        if has_any(&["open", "active", "live"]) {
            BadgeCategory::Success
        } else if has_any(&["closed", "filled", "cancel"]) {
            BadgeCategory::Muted
        } else if has_any(&["partial", "warning", "risk"]) {
            BadgeCategory::Warning
        } else {
            BadgeCategory::Muted
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPosition {
    #[serde(default)]
    pub symbol: Option<Value>,
    #[serde(default)]
    pub side: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub entry_price: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    pub side: String,
    pub size: String,
    pub entry_price: String,
    pub status: String,
}

impl Position {
    pub fn badge(&self) -> BadgeCategory {
        BadgeCategory::from_status(&self.status)
    }
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        Position {
            symbol: display_value(raw.symbol.as_ref()),
            side: display_value(raw.side.as_ref()),
            size: display_value(raw.size.as_ref()),
            entry_price: display_value(raw.entry_price.as_ref()),
            status: display_value(raw.status.as_ref()),
        }
    }
}

pub type BacktestRecord = Map<String, Value>;

/// Renders a JSON scalar the way the browser prints it. Null and absence
/// are empty.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                number.as_f64().map(format_number).unwrap_or_default()
            }
        }
        Some(other) => other.to_string(),
    }
}

pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    // `{:e}` yields the same shortest digits as `{}`; only the layout differs.
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{value}");
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return format!("{value}");
    };
    if (-7..21).contains(&exponent) {
        format!("{value}")
    } else if exponent < 0 {
        format!("{mantissa}e{exponent}")
    } else {
        format!("{mantissa}e+{exponent}")
    }
}
