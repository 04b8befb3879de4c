use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use serde_json::Value;

use crate::chart::{BarPoint, render_bar_chart};
use crate::command::{BacktestRecord, RequestSeq, display_value};
use crate::table::{ColumnAlign, DisplayTable, TableCell, TableId};
use crate::theme::Palette;

const PNL_COLUMN: &str = "pnl_usd";

#[derive(Debug, Default)]
pub struct BacktestView {
    seq: RequestSeq,
    table: Option<DisplayTable>,
    pnl: Vec<f64>,
}

impl BacktestView {
    pub fn begin_load(&mut self) -> u64 {
        self.seq.issue()
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.seq.is_current(ticket)
    }

    pub fn accept(&mut self, ticket: u64, records: &[BacktestRecord]) -> bool {
        if !self.seq.is_current(ticket) {
            return false;
        }
        let columns = column_names(records);
        let aligned: Vec<(&str, ColumnAlign)> = columns
            .iter()
            .map(|name| (name.as_str(), column_align(records, name)))
            .collect();
        let mut table = DisplayTable::new(TableId::Backtest, &aligned);
        for record in records {
            table.push_row(
                columns
                    .iter()
                    .map(|name| TableCell::plain(display_value(record.get(name))))
                    .collect(),
            );
        }
        self.pnl = if columns.iter().any(|name| name == PNL_COLUMN) {
            records
                .iter()
                .map(|record| {
                    record
                        .get(PNL_COLUMN)
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0)
                })
                .collect()
        } else {
            Vec::new()
        };
        self.table = Some(table);
        true
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&DisplayTable> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut DisplayTable> {
        self.table.as_mut()
    }

    pub fn total_pnl(&self) -> Option<f64> {
        if self.pnl.is_empty() {
            None
        } else {
            Some(self.pnl.iter().sum())
        }
    }

    pub fn pnl_series(&self) -> Vec<BarPoint> {
        self.pnl
            .iter()
            .enumerate()
            .map(|(idx, value)| BarPoint {
                label: idx.to_string(),
                value: *value,
            })
            .collect()
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        block: Block,
        palette: &Palette,
        scroll: usize,
    ) {
        let Some(table) = &self.table else {
            return;
        };
        let (table_area, chart_area) = if self.pnl.is_empty() || area.width < 60 {
            (area, None)
        } else {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        };
        let height = table_area.height.saturating_sub(2) as usize;
        let mut lines = Vec::new();
        if let Some(total) = self.total_pnl() {
            let color = if total < 0.0 {
                palette.loss_bar
            } else {
                palette.success
            };
            lines.push(Line::from(vec![
                Span::styled("PnL total: ", Style::default().fg(palette.text)),
                Span::styled(
                    format!("${total:.2}"),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
            ]));
        }
        let remaining = height.saturating_sub(lines.len());
        lines.extend(table.lines(palette, scroll, remaining));
        frame.render_widget(Paragraph::new(lines).block(block), table_area);
        if let Some(chart_area) = chart_area {
            render_bar_chart(
                frame,
                chart_area,
                "PnL per trade",
                &self.pnl_series(),
                palette.pnl_bar,
                palette.loss_bar,
                palette,
            );
        }
    }
}

fn column_names(records: &[BacktestRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|existing| existing == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn column_align(records: &[BacktestRecord], name: &str) -> ColumnAlign {
    let numeric = records
        .iter()
        .filter_map(|record| record.get(name))
        .all(|value| value.is_number() || value.is_null());
    if numeric {
        ColumnAlign::Right
    } else {
        ColumnAlign::Left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<BacktestRecord> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn pnl_total_and_series() {
        let rows = records(json!([
            {"symbol": "BTC/USD", "exit_reason": "TP", "pnl_usd": 12.5},
            {"symbol": "ETH/USD", "exit_reason": "SL", "pnl_usd": -4.25}
        ]));
        let mut view = BacktestView::default();
        let ticket = view.begin_load();
        assert!(view.accept(ticket, &rows));
        assert_eq!(view.total_pnl(), Some(8.25));
        let series = view.pnl_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].label, "1");
        assert_eq!(series[1].value, -4.25);
        let table = view.table().unwrap();
        assert!(table.header().iter().any(|name| name == "pnl_usd"));
        assert_eq!(table.rows().len(), 2);
    }

    #[test]
    fn columns_are_the_union_of_keys() {
        let rows = records(json!([{"a": 1}, {"b": "x"}]));
        let mut view = BacktestView::default();
        let ticket = view.begin_load();
        view.accept(ticket, &rows);
        let table = view.table().unwrap();
        assert_eq!(table.header(), ["a", "b"]);
        assert_eq!(table.rows()[0].text(), "1\t");
        assert_eq!(table.rows()[1].text(), "\tx");
        assert_eq!(view.total_pnl(), None);
    }

    #[test]
    fn empty_results_still_render_a_table() {
        let mut view = BacktestView::default();
        let ticket = view.begin_load();
        view.accept(ticket, &[]);
        assert!(view.is_loaded());
        assert!(view.table().unwrap().rows().is_empty());
    }
}
