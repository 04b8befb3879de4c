use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::{Client, ClientBuilder, Url};
use serde::de::DeserializeOwned;

use crate::command::{BacktestRecord, HourlyStat, Position, RawPosition};

const SYMBOLS_PATH: &[&str] = &["api", "analysis_files"];
const ANALYSIS_PATH: &[&str] = &["api", "analysis"];
const POSITIONS_PATH: &[&str] = &["api", "positions"];
const BACKTEST_PATH: &[&str] = &["api", "backtest"];

#[derive(Clone, Debug)]
pub struct DashboardClient {
    http: Client,
    base: Url,
}

impl DashboardClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<DashboardClient, anyhow::Error> {
        let base = Url::parse(base_url).with_context(|| format!("invalid api base `{base_url}`"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("api base `{base_url}` cannot carry a path"));
        }
        Ok(DashboardClient {
            http: build_http_client(timeout)?,
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub async fn fetch_symbols(&self) -> Result<Vec<String>, anyhow::Error> {
        let url = self.endpoint(SYMBOLS_PATH, None)?;
        self.get_json(url, "symbol list").await
    }

    pub async fn fetch_analysis(&self, symbol: &str) -> Result<Vec<HourlyStat>, anyhow::Error> {
        let url = self.endpoint(ANALYSIS_PATH, Some(symbol))?;
        self.get_json(url, &format!("analysis for {symbol}")).await
    }

    pub async fn fetch_positions(&self) -> Result<Vec<Position>, anyhow::Error> {
        let url = self.endpoint(POSITIONS_PATH, None)?;
        let raw: Vec<RawPosition> = self.get_json(url, "open positions").await?;
        Ok(raw.into_iter().map(Position::from).collect())
    }

    pub async fn fetch_backtest(&self) -> Result<Vec<BacktestRecord>, anyhow::Error> {
        let url = self.endpoint(BACKTEST_PATH, None)?;
        self.get_json(url, "backtest results").await
    }

    // `tail` is escaped as a single segment
    fn endpoint(&self, segments: &[&str], tail: Option<&str>) -> Result<Url, anyhow::Error> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("api base cannot carry a path"))?;
            path.pop_if_empty();
            path.extend(segments);
            if let Some(tail) = tail {
                path.push(tail);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        what: &str,
    ) -> Result<T, anyhow::Error> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {what}"))?
            .error_for_status()
            .with_context(|| format!("{what} response status"))?
            .json::<T>()
            .await
            .with_context(|| format!("decoding {what}"))
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, anyhow::Error> {
    let connect_timeout = timeout.min(Duration::from_secs(5));
    Ok(ClientBuilder::new()
        .connect_timeout(connect_timeout)
        .read_timeout(timeout)
        .timeout(timeout)
        .build()?)
}
