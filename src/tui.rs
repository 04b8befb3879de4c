use std::path::PathBuf;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Wrap};
use tokio::sync::broadcast;

use crate::analysis::AnalysisView;
use crate::api::DashboardClient;
use crate::backtest::BacktestView;
use crate::bindings::{Action, Bindings};
use crate::catalog::SymbolCatalog;
use crate::command::{Command, Operation};
use crate::config::OptionalControls;
use crate::error_log::ErrorLogStore;
use crate::positions::PositionsView;
use crate::table::{DisplayTable, TableId};
use crate::theme::{Palette, ThemePreference};
use crate::toolbar::{CSV_MIME, TableToolbar};

const SYMBOL_COLUMN_WIDTH: u16 = 22;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pane {
    Analysis,
    Positions,
    Backtest,
}

impl Pane {
    fn index(&self) -> usize {
        match self {
            Pane::Analysis => 0,
            Pane::Positions => 1,
            Pane::Backtest => 2,
        }
    }

    fn table_id(&self) -> TableId {
        match self {
            Pane::Analysis => TableId::Analysis,
            Pane::Positions => TableId::Positions,
            Pane::Backtest => TableId::Backtest,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Alert {
    title: String,
    message: String,
}

pub struct AppSettings {
    pub controls: OptionalControls,
    pub export_dir: PathBuf,
    pub preferred_symbol: Option<String>,
}

pub struct TuiApp {
    client: DashboardClient,
    tx: broadcast::Sender<Command>,
    bindings: Bindings,
    theme: ThemePreference,
    catalog: SymbolCatalog,
    analysis: AnalysisView,
    positions: PositionsView,
    backtest: BacktestView,
    toolbar: TableToolbar,
    search_active: bool,
    export_dir: PathBuf,
    error_log: ErrorLogStore,
    focus: Pane,
    scroll: [usize; 3],
    page_height: [usize; 3],
    alert: Option<Alert>,
    exit_confirmation: bool,
    status_message: Option<String>,
    status_visible_until: Option<Instant>,
    status_is_error: bool,
    last_draw: Instant,
    min_redraw_gap: Duration,
    dirty: bool,
}

impl TuiApp {
    pub fn new(
        settings: AppSettings,
        client: DashboardClient,
        theme: ThemePreference,
        tx: broadcast::Sender<Command>,
        error_log: ErrorLogStore,
    ) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(100);
        let mut app = TuiApp {
            client,
            tx,
            bindings: Bindings::new(settings.controls),
            theme,
            catalog: SymbolCatalog::new(settings.preferred_symbol),
            analysis: AnalysisView::default(),
            positions: PositionsView::default(),
            backtest: BacktestView::default(),
            toolbar: TableToolbar::default(),
            search_active: false,
            export_dir: settings.export_dir,
            error_log,
            focus: Pane::Analysis,
            scroll: [0; 3],
            page_height: [1; 3],
            alert: None,
            exit_confirmation: false,
            status_message: None,
            status_visible_until: None,
            status_is_error: false,
            last_draw: Instant::now() - min_redraw_gap,
            min_redraw_gap,
            dirty: true,
        };
        if let Some(message) = app.theme.take_load_error() {
            app.record_failure("theme", &message);
            app.set_error_status_message(format!("Theme not restored: {message}"));
        }
        app
    }

    pub fn dispose(&self) {
        ratatui::restore();
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(3));
        self.status_is_error = false;
        self.dirty = true;
    }

    fn set_error_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(5));
        self.status_is_error = true;
        self.dirty = true;
    }

    fn clear_status_if_allowed(&mut self) {
        if self.status_message.is_none() {
            return;
        }
        if let Some(visible_until) = self.status_visible_until {
            if Instant::now() < visible_until {
                return;
            }
        }
        self.status_message = None;
        self.status_visible_until = None;
        self.status_is_error = false;
        self.dirty = true;
    }

    fn show_alert(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.alert = Some(Alert {
            title: title.into(),
            message: message.into(),
        });
        self.dirty = true;
    }

    fn record_failure(&mut self, operation: &str, message: &str) {
        if let Err(err) = self.error_log.append_message(operation, message) {
            self.set_error_status_message(format!("failed to write error log: {err}"));
        }
    }

    pub async fn run(&mut self, rx: &mut broadcast::Receiver<Command>) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        self.dirty = false;
        loop {
            tokio::select! {
                biased;
                _ = input_tick.tick() => {
                    if self.poll_input()? {
                        return Ok(());
                    }
                    self.clear_status_if_allowed();
                }
                result = rx.recv() => {
                    if self.handle_received(result) {
                        return Ok(());
                    }
                }
            }
            if self.dirty && self.last_draw.elapsed() >= self.min_redraw_gap {
                terminal.draw(|frame| self.render(frame))?;
                self.last_draw = Instant::now();
                self.dirty = false;
            }
        }
    }

    fn handle_received(&mut self, result: Result<Command, broadcast::error::RecvError>) -> bool {
        match result {
            Ok(command) => self.apply_command(command),
            Err(broadcast::error::RecvError::Closed) => true,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                let message = format!("missed {skipped} updates");
                self.record_failure("event bus", &message);
                self.set_error_status_message(format!(
                    "Dashboard {message}; reload the panes that did not change"
                ));
                false
            }
        }
    }

    /// Folds one fetch result into the views. Returns true when the app
    /// should exit.
    fn apply_command(&mut self, command: Command) -> bool {
        match command {
            Command::SymbolsLoaded { ticket, symbols } => {
                let count = symbols.len();
                if self.catalog.accept(ticket, symbols) {
                    self.set_status_message(format!("Loaded {count} symbols"));
                }
            }
            Command::AnalysisLoaded {
                ticket,
                symbol,
                stats,
            } => {
                let count = stats.len();
                let message = format!("Loaded {count} hourly rows for {symbol}");
                if self.analysis.accept(ticket, symbol, stats) {
                    self.scroll[Pane::Analysis.index()] = 0;
                    self.set_status_message(message);
                }
            }
            Command::PositionsLoaded { ticket, positions } => {
                if self.positions.accept(ticket, &positions) {
                    self.scroll[Pane::Positions.index()] = 0;
                    self.set_status_message(format!("Loaded {} positions", positions.len()));
                }
            }
            Command::BacktestLoaded { ticket, records } => {
                if self.backtest.accept(ticket, &records) {
                    self.scroll[Pane::Backtest.index()] = 0;
                    self.set_status_message(format!("Loaded {} backtest rows", records.len()));
                }
            }
            Command::LoadFailed {
                operation,
                ticket,
                message,
            } => {
                let label = operation.label();
                self.record_failure(&label, &message);
                let current = match &operation {
                    Operation::Symbols => self.catalog.is_current(ticket),
                    Operation::Analysis(_) => self.analysis.is_current(ticket),
                    Operation::Positions => self.positions.is_current(ticket),
                    Operation::Backtest => self.backtest.is_current(ticket),
                };
                if !current {
                    return false;
                }
                match operation {
                    // The symbol list has no dedicated error path; it only
                    // reaches the status line.
                    Operation::Symbols => {
                        self.set_error_status_message(format!("Failed to load {label}: {message}"))
                    }
                    _ => self.show_alert(
                        "Request failed",
                        format!("Failed to load {label}: {message}"),
                    ),
                }
            }
            Command::Exit => return true,
        }
        false
    }

    pub fn dispatch(&mut self, action: Action) {
        self.dirty = true;
        match action {
            Action::PrevSymbol => self.catalog.select_prev(),
            Action::NextSymbol => self.catalog.select_next(),
            Action::LoadAnalysis => self.load_analysis(),
            Action::LoadPositions => self.load_positions(),
            Action::LoadBacktest => self.load_backtest(),
            Action::RefreshSymbols => self.refresh_symbols(),
            Action::ToggleTheme => self.toggle_theme(),
            Action::Search => {
                self.search_active = true;
                self.set_status_message("Search: type to filter, Enter to keep, Esc to clear");
            }
            Action::Export => self.export_csv(),
            Action::FocusNext => self.cycle_focus(),
            Action::ScrollUp => self.scroll_focused(-1),
            Action::ScrollDown => self.scroll_focused(1),
            Action::Quit => self.prompt_exit_confirmation(),
        }
    }

    pub fn refresh_symbols(&mut self) {
        let ticket = self.catalog.begin_refresh();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let command = match client.fetch_symbols().await {
                Ok(symbols) => Command::SymbolsLoaded { ticket, symbols },
                Err(err) => Command::LoadFailed {
                    operation: Operation::Symbols,
                    ticket,
                    message: format!("{err:#}"),
                },
            };
            let _ = tx.send(command);
        });
    }

    fn load_analysis(&mut self) {
        let Some(symbol) = self.catalog.selected().map(|symbol| symbol.to_string()) else {
            let message = if self.catalog.options().is_empty() {
                "No symbols loaded yet"
            } else {
                "No symbol selected"
            };
            self.set_error_status_message(message);
            return;
        };
        let ticket = self.analysis.begin_load();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let command = match client.fetch_analysis(&symbol).await {
                Ok(stats) => Command::AnalysisLoaded {
                    ticket,
                    symbol,
                    stats,
                },
                Err(err) => Command::LoadFailed {
                    operation: Operation::Analysis(symbol),
                    ticket,
                    message: format!("{err:#}"),
                },
            };
            let _ = tx.send(command);
        });
    }

    fn load_positions(&mut self) {
        let ticket = self.positions.begin_load();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let command = match client.fetch_positions().await {
                Ok(positions) => Command::PositionsLoaded { ticket, positions },
                Err(err) => Command::LoadFailed {
                    operation: Operation::Positions,
                    ticket,
                    message: format!("{err:#}"),
                },
            };
            let _ = tx.send(command);
        });
    }

    fn load_backtest(&mut self) {
        let ticket = self.backtest.begin_load();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let command = match client.fetch_backtest().await {
                Ok(records) => Command::BacktestLoaded { ticket, records },
                Err(err) => Command::LoadFailed {
                    operation: Operation::Backtest,
                    ticket,
                    message: format!("{err:#}"),
                },
            };
            let _ = tx.send(command);
        });
    }

    fn toggle_theme(&mut self) {
        let result = self.theme.toggle();
        let setting = self.theme.setting().as_str();
        match result {
            Ok(()) => self.set_status_message(format!("Theme: {setting}")),
            Err(err) => {
                let message = format!("{err:#}");
                self.record_failure("theme", &message);
                self.set_error_status_message(format!(
                    "Theme: {setting} (not saved: {message})"
                ));
            }
        }
    }

    fn export_csv(&mut self) {
        let Some(table) = self.analysis.table() else {
            self.show_alert("Export", "There is no analysis table to export.");
            return;
        };
        match self.toolbar.export_csv(Some(table), &self.export_dir) {
            Ok(path) => {
                self.set_status_message(format!("Exported {} ({CSV_MIME})", path.display()))
            }
            Err(err) => {
                let message = format!("{err:#}");
                self.record_failure("export", &message);
                self.show_alert("Export", format!("Export failed: {message}"));
            }
        }
    }

    fn rendered_tables(&mut self) -> Vec<&mut DisplayTable> {
        [
            self.analysis.table_mut(),
            self.positions.table_mut(),
            self.backtest.table_mut(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn apply_search(&mut self) {
        let toolbar = self.toolbar.clone();
        toolbar.filter(self.rendered_tables());
        self.scroll = [0; 3];
        self.dirty = true;
    }

    fn available_panes(&self) -> Vec<Pane> {
        let mut panes = vec![Pane::Analysis, Pane::Positions];
        if self.backtest.is_loaded() {
            panes.push(Pane::Backtest);
        }
        panes
    }

    fn cycle_focus(&mut self) {
        let panes = self.available_panes();
        let idx = panes
            .iter()
            .position(|pane| *pane == self.focus)
            .unwrap_or(0);
        self.focus = panes[(idx + 1) % panes.len()];
    }

    fn focused_table(&self) -> Option<&DisplayTable> {
        match self.focus {
            Pane::Analysis => self.analysis.table(),
            Pane::Positions => self.positions.table(),
            Pane::Backtest => self.backtest.table(),
        }
    }

    fn scroll_focused(&mut self, pages: isize) {
        let idx = self.focus.index();
        let len = self
            .focused_table()
            .map(|table| table.visible_count())
            .unwrap_or(0);
        let page = self.page_height[idx].max(1) as isize;
        let max_start = len.saturating_sub(self.page_height[idx].max(1)) as isize;
        let next = (self.scroll[idx] as isize + pages * page).clamp(0, max_start.max(0));
        self.scroll[idx] = next as usize;
    }

    fn poll_input(&mut self) -> Result<bool> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if self.handle_key_event(key) {
                        return Ok(true);
                    }
                }
                Event::Resize(_, _) => self.dirty = true,
                _ => {}
            }
        }
        Ok(false)
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            if self.exit_confirmation {
                return true;
            }
            self.prompt_exit_confirmation();
            return false;
        }
        if self.alert.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.alert = None;
                self.dirty = true;
            }
            return false;
        }
        if self.exit_confirmation {
            return self.handle_exit_confirmation_key(key);
        }
        if self.search_active {
            self.handle_search_key(key);
            return false;
        }
        if let Some(action) = self.bindings.action_for(&key) {
            self.dispatch(action);
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(ch) => {
                self.toolbar.push_char(ch);
                self.apply_search();
            }
            KeyCode::Backspace => {
                self.toolbar.pop_char();
                self.apply_search();
            }
            KeyCode::Enter => {
                self.search_active = false;
                self.dirty = true;
            }
            KeyCode::Esc => {
                self.search_active = false;
                self.toolbar.clear();
                self.apply_search();
            }
            _ => {}
        }
    }

    fn prompt_exit_confirmation(&mut self) {
        if self.exit_confirmation {
            return;
        }
        self.exit_confirmation = true;
        self.set_status_message("Quit? Y/Enter to confirm · N/Esc to cancel");
    }

    fn handle_exit_confirmation_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Enter => {
                self.exit_confirmation = false;
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.exit_confirmation = false;
                self.set_status_message("Quit cancelled");
                false
            }
            _ => false,
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let palette = self.theme.palette();
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base()), area);
        let has_status = self.status_message.is_some() && area.height >= 12;
        let mut constraints = vec![
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ];
        if has_status {
            constraints.push(Constraint::Length(3));
        }
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);
        self.render_header(frame, rows[0], &palette);
        self.render_body(frame, rows[1], &palette);
        frame.render_widget(
            Paragraph::new(self.bindings.help_line()).style(Style::default().fg(palette.muted)),
            rows[2],
        );
        if has_status {
            self.render_status(frame, rows[3], &palette);
        }
        if let Some(alert) = &self.alert {
            Self::render_alert(frame, alert, &palette);
        }
        if self.exit_confirmation {
            Self::render_exit_confirmation(frame, &palette);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let checkbox = if self.theme.toggle_checked() { "[x]" } else { "[ ]" };
        let marker = if self.theme.has_light_marker() {
            "light"
        } else {
            "dark"
        };
        let theme_badge = format!("{checkbox} light theme ({marker})");
        let mut spans = vec![
            Span::styled(
                "Time-bias dashboard",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(self.client.base_url().to_string(), Style::default().fg(palette.muted)),
            Span::raw("  "),
            Span::styled(theme_badge, Style::default().fg(palette.text)),
        ];
        if self.search_active || !self.toolbar.query().is_empty() {
            let cursor = if self.search_active { "▏" } else { "" };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("search: {}{cursor}", self.toolbar.query()),
                Style::default()
                    .fg(palette.warning)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_body(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SYMBOL_COLUMN_WIDTH), Constraint::Min(20)])
            .split(area);
        self.catalog.render(frame, columns[0], palette);

        let main_constraints = if self.backtest.is_loaded() {
            vec![
                Constraint::Percentage(40),
                Constraint::Percentage(35),
                Constraint::Percentage(25),
            ]
        } else {
            vec![Constraint::Percentage(45), Constraint::Percentage(55)]
        };
        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints(main_constraints)
            .split(columns[1]);
        self.analysis.render_charts(frame, main[0], palette);

        let tables = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(main[1]);
        self.remember_page_height(Pane::Analysis, tables[0]);
        self.remember_page_height(Pane::Positions, tables[1]);
        self.analysis.render_table(
            frame,
            tables[0],
            self.section_block(Pane::Analysis, palette),
            palette,
            self.scroll[Pane::Analysis.index()],
        );
        self.positions.render(
            frame,
            tables[1],
            self.section_block(Pane::Positions, palette),
            palette,
            self.scroll[Pane::Positions.index()],
        );
        if self.backtest.is_loaded() {
            self.remember_page_height(Pane::Backtest, main[2]);
            self.backtest.render(
                frame,
                main[2],
                self.section_block(Pane::Backtest, palette),
                palette,
                self.scroll[Pane::Backtest.index()],
            );
        }
    }

    fn remember_page_height(&mut self, pane: Pane, area: Rect) {
        // borders and header line
        self.page_height[pane.index()] = area.height.saturating_sub(3).max(1) as usize;
    }

    fn section_block(&self, pane: Pane, palette: &Palette) -> Block<'static> {
        let title = pane.table_id().title();
        let table = match pane {
            Pane::Analysis => self.analysis.table(),
            Pane::Positions => self.positions.table(),
            Pane::Backtest => self.backtest.table(),
        };
        let title = match table {
            Some(table) if table.visible_count() != table.rows().len() => format!(
                "{title} ({}/{})",
                table.visible_count(),
                table.rows().len()
            ),
            Some(table) => format!("{title} ({})", table.rows().len()),
            None => title.to_string(),
        };
        let border = if self.focus == pane {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.muted)
        };
        Block::bordered()
            .title(title)
            .style(palette.base())
            .border_style(border)
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        if let Some(message) = &self.status_message {
            let color = if self.status_is_error {
                palette.loss_bar
            } else {
                palette.warning
            };
            let block = Block::bordered().title("Status");
            let status = Paragraph::new(message.as_str())
                .style(Style::default().fg(color))
                .alignment(Alignment::Left)
                .block(block);
            frame.render_widget(status, area);
        }
    }

    fn render_alert(frame: &mut Frame, alert: &Alert, palette: &Palette) {
        let area = frame.area();
        if area.width < 24 || area.height < 5 {
            return;
        }
        let popup_width = area.width.saturating_sub(10).clamp(30, 70);
        let popup_height = 7.min(area.height);
        let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
        let popup = Rect::new(left, top, popup_width, popup_height);
        let lines = vec![
            Line::from(Span::styled(
                alert.message.clone(),
                Style::default()
                    .fg(palette.loss_bar)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::styled("Enter/Esc to dismiss", Style::default().fg(palette.muted)),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true })
            .style(palette.base())
            .block(Block::bordered().title(alert.title.clone()));
        frame.render_widget(Clear, popup);
        frame.render_widget(paragraph, popup);
    }

    fn render_exit_confirmation(frame: &mut Frame, palette: &Palette) {
        let area = frame.area();
        if area.width < 24 || area.height < 5 {
            return;
        }
        let popup_width = area.width.saturating_sub(20).clamp(28, 50);
        let popup_height = 5;
        let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
        let popup = Rect::new(left, top, popup_width, popup_height);
        let lines = vec![
            Line::from(Span::styled(
                "Quit the dashboard?",
                Style::default()
                    .fg(palette.loss_bar)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from("Y/Enter to quit · N/Esc to cancel"),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .style(palette.base())
            .block(Block::bordered().title("Quit"));
        frame.render_widget(Clear, popup);
        frame.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{HourlyStat, Position};
    use crate::settings::{JsonFileStore, MemoryStore};
    use crate::toolbar::EXPORT_FILE_NAME;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn test_app(export_dir: PathBuf) -> (TuiApp, tempfile::TempDir) {
        let theme = ThemePreference::load(Box::new(MemoryStore::default()));
        test_app_with_theme(export_dir, theme)
    }

    fn test_app_with_theme(
        export_dir: PathBuf,
        theme: ThemePreference,
    ) -> (TuiApp, tempfile::TempDir) {
        let log_dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = broadcast::channel(16);
        let client =
            DashboardClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let app = TuiApp::new(
            AppSettings {
                controls: OptionalControls::default(),
                export_dir,
                preferred_symbol: None,
            },
            client,
            theme,
            tx,
            ErrorLogStore::new(log_dir.path().join("errors.jsonl")),
        );
        (app, log_dir)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn position(symbol: &str, status: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: "long".to_string(),
            size: "1".to_string(),
            entry_price: "100".to_string(),
            status: status.to_string(),
        }
    }

    fn load_analysis(app: &mut TuiApp, symbol: &str, stats: Vec<HourlyStat>) {
        let ticket = app.analysis.begin_load();
        app.apply_command(Command::AnalysisLoaded {
            ticket,
            symbol: symbol.to_string(),
            stats,
        });
    }

    fn load_positions(app: &mut TuiApp, positions: Vec<Position>) {
        let ticket = app.positions.begin_load();
        app.apply_command(Command::PositionsLoaded { ticket, positions });
    }

    #[test]
    fn positions_failure_alerts_and_keeps_previous_table() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        load_positions(&mut app, vec![position("BTC/USD", "OPEN")]);
        let before = app.positions.table().cloned();

        let ticket = app.positions.begin_load();
        app.apply_command(Command::LoadFailed {
            operation: Operation::Positions,
            ticket,
            message: "HTTP status server error (500 Internal Server Error)".to_string(),
        });

        let alert = app.alert.clone().expect("alert shown");
        assert!(alert.message.contains("open positions"));
        assert_eq!(app.positions.table().cloned(), before);
    }

    #[test]
    fn positions_failure_before_any_load_renders_nothing() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        let ticket = app.positions.begin_load();
        app.apply_command(Command::LoadFailed {
            operation: Operation::Positions,
            ticket,
            message: "500".to_string(),
        });
        assert!(app.alert.is_some());
        assert!(app.positions.table().is_none());
    }

    #[test]
    fn superseded_failure_is_not_shown() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        let stale = app.analysis.begin_load();
        let _fresh = app.analysis.begin_load();
        app.apply_command(Command::LoadFailed {
            operation: Operation::Analysis("BTC_USD".to_string()),
            ticket: stale,
            message: "404".to_string(),
        });
        assert!(app.alert.is_none());
    }

    #[test]
    fn symbol_failure_goes_to_status_line() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        let ticket = app.catalog.begin_refresh();
        app.apply_command(Command::LoadFailed {
            operation: Operation::Symbols,
            ticket,
            message: "connection refused".to_string(),
        });
        assert!(app.alert.is_none());
        assert!(app.status_is_error);
    }

    #[test]
    fn unreadable_theme_state_is_reported() {
        let state_dir = tempfile::tempdir().unwrap();
        let state_path = state_dir.path().join("dashboard_state.json");
        std::fs::write(&state_path, "{not json").unwrap();
        let theme = ThemePreference::load(Box::new(JsonFileStore::new(&state_path)));

        let (app, logs) = test_app_with_theme(PathBuf::from("."), theme);
        assert!(app.status_is_error);
        assert!(
            app.status_message
                .as_deref()
                .unwrap()
                .starts_with("Theme not restored")
        );
        assert!(!app.theme.has_light_marker());
        let log = std::fs::read_to_string(logs.path().join("errors.jsonl")).unwrap();
        assert!(log.contains("\"operation\":\"theme\""));
    }

    #[tokio::test]
    async fn lagging_behind_the_event_bus_is_reported() {
        let (mut app, logs) = test_app(PathBuf::from("."));
        let (tx, mut rx) = broadcast::channel(1);
        for ticket in [7, 8] {
            tx.send(Command::SymbolsLoaded {
                ticket,
                symbols: Vec::new(),
            })
            .unwrap();
        }

        let lagged = rx.recv().await;
        assert!(!app.handle_received(lagged));
        assert!(app.status_is_error);
        assert!(app.status_message.as_deref().unwrap().contains("missed 1 updates"));
        let log = std::fs::read_to_string(logs.path().join("errors.jsonl")).unwrap();
        assert!(log.contains("event bus"));

        let closed: Result<Command, broadcast::error::RecvError> =
            Err(broadcast::error::RecvError::Closed);
        assert!(app.handle_received(closed));
    }

    #[test]
    fn search_filters_both_tables_and_clears() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        load_analysis(
            &mut app,
            "BTC_USD",
            vec![HourlyStat {
                hour_utc: 0,
                avg_volume: 10.0,
                avg_range: 1.0,
            }],
        );
        load_positions(
            &mut app,
            vec![position("BTC/USD", "OPEN"), position("ETH/USD", "OPEN")],
        );

        app.handle_key_event(press(KeyCode::Char('/')));
        for ch in "btc".chars() {
            app.handle_key_event(press(KeyCode::Char(ch)));
        }
        assert_eq!(app.toolbar.query(), "btc");
        assert_eq!(app.analysis.table().unwrap().visible_count(), 0);
        assert_eq!(app.positions.table().unwrap().visible_count(), 1);

        app.handle_key_event(press(KeyCode::Esc));
        assert!(!app.search_active);
        assert_eq!(app.analysis.table().unwrap().visible_count(), 1);
        assert_eq!(app.positions.table().unwrap().visible_count(), 2);
    }

    #[test]
    fn export_without_table_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _logs) = test_app(dir.path().to_path_buf());
        app.handle_key_event(press(KeyCode::Char('e')));
        assert!(app.alert.is_some());
        assert!(!dir.path().join(EXPORT_FILE_NAME).exists());
    }

    #[test]
    fn export_writes_current_analysis_table() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _logs) = test_app(dir.path().to_path_buf());
        load_analysis(
            &mut app,
            "BTC_USD",
            vec![HourlyStat {
                hour_utc: 3,
                avg_volume: 120.5,
                avg_range: 0.02,
            }],
        );
        app.handle_key_event(press(KeyCode::Char('e')));
        assert!(app.alert.is_none());
        let csv = std::fs::read_to_string(dir.path().join(EXPORT_FILE_NAME)).unwrap();
        assert_eq!(
            csv,
            "\"hour_utc\",\"avg_volume\",\"avg_range\"\n\"3\",\"120.5\",\"0.02\"\n"
        );
    }

    #[test]
    fn alert_blocks_other_keys_until_dismissed() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        app.show_alert("Request failed", "boom");
        app.handle_key_event(press(KeyCode::Char('t')));
        assert!(!app.theme.has_light_marker());
        app.handle_key_event(press(KeyCode::Enter));
        assert!(app.alert.is_none());
        app.handle_key_event(press(KeyCode::Char('t')));
        assert!(app.theme.has_light_marker());
    }

    #[test]
    fn quit_requires_confirmation() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        assert!(!app.handle_key_event(press(KeyCode::Char('q'))));
        assert!(app.exit_confirmation);
        assert!(app.handle_key_event(press(KeyCode::Char('y'))));
        assert!(app.apply_command(Command::Exit));
    }

    #[test]
    fn renders_every_pane_under_both_themes() {
        let (mut app, _logs) = test_app(PathBuf::from("."));
        load_analysis(
            &mut app,
            "BTC_USD",
            (0..24)
                .map(|hour| HourlyStat {
                    hour_utc: hour,
                    avg_volume: 100.0 + hour as f64,
                    avg_range: 0.01 * hour as f64,
                })
                .collect(),
        );
        load_positions(&mut app, vec![position("BTC/USD", "OPEN")]);
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        for _ in 0..2 {
            terminal.draw(|frame| app.render(frame)).unwrap();
            let buffer = terminal.backend().buffer();
            let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
            assert!(text.contains("Hourly analysis"));
            assert!(text.contains("Open positions"));
            assert!(text.contains("BTC/USD"));
            app.dispatch(Action::ToggleTheme);
        }
    }
}
