use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Paragraph};

use crate::command::{Position, RequestSeq};
use crate::table::{ColumnAlign, DisplayTable, TableCell, TableId};
use crate::theme::Palette;

const COLUMNS: &[(&str, ColumnAlign)] = &[
    ("symbol", ColumnAlign::Left),
    ("side", ColumnAlign::Left),
    ("size", ColumnAlign::Right),
    ("entry_price", ColumnAlign::Right),
    ("status", ColumnAlign::Left),
];

#[derive(Debug, Default)]
pub struct PositionsView {
    seq: RequestSeq,
    table: Option<DisplayTable>,
}

impl PositionsView {
    pub fn begin_load(&mut self) -> u64 {
        self.seq.issue()
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.seq.is_current(ticket)
    }

    pub fn accept(&mut self, ticket: u64, positions: &[Position]) -> bool {
        if !self.seq.is_current(ticket) {
            return false;
        }
        let mut table = DisplayTable::new(TableId::Positions, COLUMNS);
        for position in positions {
            table.push_row(vec![
                TableCell::plain(position.symbol.as_str()),
                TableCell::plain(position.side.as_str()),
                TableCell::plain(position.size.as_str()),
                TableCell::plain(position.entry_price.as_str()),
                TableCell::badged(position.status.as_str(), position.badge()),
            ]);
        }
        self.table = Some(table);
        true
    }

    pub fn table(&self) -> Option<&DisplayTable> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut DisplayTable> {
        self.table.as_mut()
    }

    pub fn render(
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
            None => vec!["press p to load open positions".into()],
        };
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::BadgeCategory;

    fn position(symbol: &str, status: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: "long".to_string(),
            size: "0.5".to_string(),
            entry_price: "64000".to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn status_cell_carries_badge() {
        let mut view = PositionsView::default();
        let ticket = view.begin_load();
        view.accept(
            ticket,
            &[position("BTC/USD", "OPEN"), position("ETH/USD", "partial fill")],
        );
        let table = view.table().unwrap();
        assert_eq!(
            table.header(),
            ["symbol", "side", "size", "entry_price", "status"]
        );
        let badges: Vec<Option<BadgeCategory>> = table
            .rows()
            .iter()
            .map(|row| row.cells[4].badge)
            .collect();
        assert_eq!(
            badges,
            vec![Some(BadgeCategory::Success), Some(BadgeCategory::Warning)]
        );
        assert!(table.rows()[0].cells[0].badge.is_none());
    }

    #[test]
    fn empty_status_is_muted() {
        let mut view = PositionsView::default();
        let ticket = view.begin_load();
        view.accept(ticket, &[position("SOL/USD", "")]);
        let row = &view.table().unwrap().rows()[0];
        assert_eq!(row.cells[4].text, "");
        assert_eq!(row.cells[4].badge, Some(BadgeCategory::Muted));
    }

    #[test]
    fn stale_load_keeps_current_table() {
        let mut view = PositionsView::default();
        let stale = view.begin_load();
        let fresh = view.begin_load();
        view.accept(fresh, &[position("BTC/USD", "OPEN")]);
        assert!(!view.accept(stale, &[]));
        assert_eq!(view.table().unwrap().rows().len(), 1);
    }
}
