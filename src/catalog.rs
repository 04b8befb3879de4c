use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};

use crate::command::RequestSeq;
use crate::table::visible_range;
use crate::theme::Palette;

#[derive(Debug, Default)]
pub struct SymbolCatalog {
    options: Vec<String>,
    selected: usize,
    preferred: Option<String>,
    seq: RequestSeq,
}

impl SymbolCatalog {
    pub fn new(preferred: Option<String>) -> Self {
        SymbolCatalog {
            preferred,
            ..SymbolCatalog::default()
        }
    }

    pub fn begin_refresh(&mut self) -> u64 {
        self.seq.issue()
    }

    pub fn accept(&mut self, ticket: u64, symbols: Vec<String>) -> bool {
        if !self.seq.is_current(ticket) {
            return false;
        }
        let keep = self
            .selected()
            .map(|symbol| symbol.to_string())
            .or_else(|| self.preferred.take());
        self.options = symbols;
        self.selected = keep
            .and_then(|symbol| self.options.iter().position(|option| *option == symbol))
            .unwrap_or(0);
        true
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.seq.is_current(ticket)
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.options.get(self.selected).map(|symbol| symbol.as_str())
    }

    pub fn select_next(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + 1) % self.options.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + self.options.len() - 1) % self.options.len();
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let block = Block::bordered()
            .title(format!("Symbols ({})", self.options.len()))
            .style(palette.base())
            .border_style(Style::default().fg(palette.muted));
        let height = area.height.saturating_sub(2) as usize;
        let mut lines = Vec::new();
        if self.options.is_empty() {
            lines.push(Line::styled("no symbols", Style::default().fg(palette.muted)));
        } else {
            let first = self.selected.saturating_sub(height.saturating_sub(1));
            let (start, end) = visible_range(self.options.len(), height, first);
            for (idx, symbol) in self.options.iter().enumerate().take(end).skip(start) {
                let style = if idx == self.selected {
                    Style::default()
                        .fg(palette.background)
                        .bg(palette.accent)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(palette.text)
                };
                lines.push(Line::styled(symbol.clone(), style));
            }
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
