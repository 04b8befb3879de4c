mod analysis;
mod api;
mod backtest;
mod bindings;
mod catalog;
mod chart;
mod command;
mod config;
mod error_log;
mod positions;
mod settings;
mod table;
mod theme;
mod toolbar;
mod tui;

use anyhow::anyhow;
use clap::Parser;
use tokio::sync::broadcast;

use crate::api::DashboardClient;
use crate::command::Command;
use crate::error_log::ErrorLogStore;
use crate::settings::JsonFileStore;
use crate::theme::ThemePreference;
use crate::tui::{AppSettings, TuiApp};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let param = config::CliParams::parse();

    let (tx, mut rx) = broadcast::channel::<Command>(64);
    let client = DashboardClient::new(&param.api_base(), param.request_timeout())?;
    let theme = ThemePreference::load(Box::new(JsonFileStore::new(param.state_file.clone())));
    let error_log = ErrorLogStore::new(param.error_log.clone());

    let mut app = TuiApp::new(
        AppSettings {
            controls: param.controls(),
            export_dir: param.export_dir.clone(),
            preferred_symbol: param.symbol.clone(),
        },
        client,
        theme,
        tx.clone(),
        error_log,
    );
    app.refresh_symbols();

    let app_result = tokio::select! {
        result = app.run(&mut rx) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    let _ = tx.send(Command::Exit);
    app.dispose();
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
