use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Paragraph};

use crate::chart::{BarPoint, render_bar_chart};
use crate::command::{HourlyStat, RequestSeq, format_number};
use crate::table::{ColumnAlign, DisplayTable, TableCell, TableId};
use crate::theme::Palette;

const COLUMNS: &[(&str, ColumnAlign)] = &[
    ("hour_utc", ColumnAlign::Right),
    ("avg_volume", ColumnAlign::Right),
    ("avg_range", ColumnAlign::Right),
];

#[derive(Debug, Default)]
pub struct AnalysisView {
    seq: RequestSeq,
    symbol: Option<String>,
    stats: Vec<HourlyStat>,
    table: Option<DisplayTable>,
}

impl AnalysisView {
    pub fn begin_load(&mut self) -> u64 {
        self.seq.issue()
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.seq.is_current(ticket)
    }

    // stats stay in the order received
    pub fn accept(&mut self, ticket: u64, symbol: String, stats: Vec<HourlyStat>) -> bool {
        if !self.seq.is_current(ticket) {
            return false;
        }
        let mut table = DisplayTable::new(TableId::Analysis, COLUMNS);
        for stat in &stats {
            table.push_row(vec![
                TableCell::plain(stat.hour_utc.to_string()),
                TableCell::plain(format_number(stat.avg_volume)),
                TableCell::plain(format_number(stat.avg_range)),
            ]);
        }
        self.symbol = Some(symbol);
        self.stats = stats;
        self.table = Some(table);
        true
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn table(&self) -> Option<&DisplayTable> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut DisplayTable> {
        self.table.as_mut()
    }

    pub fn x_values(&self) -> Vec<u8> {
        self.stats.iter().map(|stat| stat.hour_utc).collect()
    }

    pub fn volume_series(&self) -> Vec<BarPoint> {
        self.series(|stat| stat.avg_volume)
    }

    pub fn range_series(&self) -> Vec<BarPoint> {
        self.series(|stat| stat.avg_range)
    }

    fn series(&self, value: impl Fn(&HourlyStat) -> f64) -> Vec<BarPoint> {
        self.x_values()
            .into_iter()
            .zip(&self.stats)
            .map(|(hour, stat)| BarPoint {
                label: hour.to_string(),
                value: value(stat),
            })
            .collect()
    }

    pub fn render_charts(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        let suffix = self
            .symbol()
            .map(|symbol| format!(" · {symbol}"))
            .unwrap_or_default();
        render_bar_chart(
            frame,
            chunks[0],
            &format!("Avg volume by UTC hour{suffix}"),
            &self.volume_series(),
            palette.volume_bar,
            palette.volume_bar,
            palette,
        );
        render_bar_chart(
            frame,
            chunks[1],
            &format!("Avg range by UTC hour{suffix}"),
            &self.range_series(),
            palette.range_bar,
            palette.range_bar,
            palette,
        );
    }

    pub fn render_table(
        &self,
        frame: &mut Frame,
        area: Rect,
        block: Block,
        palette: &Palette,
        scroll: usize,
    ) {
        let height = area.height.saturating_sub(2) as usize;
        let lines = match &self.table {
            Some(table) => table.lines(palette, scroll, height),
            None => vec!["select a symbol and press Enter".into()],
        };
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(hour_utc: u8, avg_volume: f64, avg_range: f64) -> HourlyStat {
        HourlyStat {
            hour_utc,
            avg_volume,
            avg_range,
        }
    }

    #[test]
    fn renders_rows_in_input_order() {
        let mut view = AnalysisView::default();
        let ticket = view.begin_load();
        assert!(view.accept(
            ticket,
            "BTC_USD".to_string(),
            vec![stat(0, 10.0, 1.0), stat(1, 20.0, 2.0)]
        ));
        let table = view.table().unwrap();
        assert_eq!(table.header(), ["hour_utc", "avg_volume", "avg_range"]);
        let rows: Vec<String> = table.rows().iter().map(|row| row.text()).collect();
        assert_eq!(rows, vec!["0\t10\t1".to_string(), "1\t20\t2".to_string()]);
        assert_eq!(view.x_values(), vec![0, 1]);
        assert_eq!(view.symbol(), Some("BTC_USD"));
    }

    #[test]
    fn no_client_side_sorting() {
        let mut view = AnalysisView::default();
        let ticket = view.begin_load();
        view.accept(
            ticket,
            "ETH_USD".to_string(),
            vec![stat(13, 5.0, 0.5), stat(2, 7.5, 0.25)],
        );
        assert_eq!(view.x_values(), vec![13, 2]);
        let volumes: Vec<f64> = view.volume_series().iter().map(|p| p.value).collect();
        assert_eq!(volumes, vec![5.0, 7.5]);
        let ranges: Vec<f64> = view.range_series().iter().map(|p| p.value).collect();
        assert_eq!(ranges, vec![0.5, 0.25]);
    }

    #[test]
    fn older_response_does_not_overwrite_newer() {
        let mut view = AnalysisView::default();
        let first = view.begin_load();
        let second = view.begin_load();
        assert!(view.accept(second, "ETH_USD".to_string(), vec![stat(1, 2.0, 3.0)]));
        assert!(!view.accept(first, "BTC_USD".to_string(), vec![stat(0, 1.0, 1.0)]));
        assert_eq!(view.symbol(), Some("ETH_USD"));
        assert_eq!(view.x_values(), vec![1]);
    }

    #[test]
    fn empty_collection_renders_empty_table() {
        let mut view = AnalysisView::default();
        let ticket = view.begin_load();
        view.accept(ticket, "BTC_USD".to_string(), Vec::new());
        assert_eq!(view.table().unwrap().rows().len(), 0);
        assert!(view.x_values().is_empty());
    }
}
