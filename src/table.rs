use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::command::BadgeCategory;
use crate::theme::Palette;

const MAX_COLUMN_WIDTH: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableId {
    Analysis,
    Positions,
    Backtest,
}

impl TableId {
    pub fn title(&self) -> &'static str {
        match self {
            TableId::Analysis => "Hourly analysis",
            TableId::Positions => "Open positions",
            TableId::Backtest => "Backtest / closed trades",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnAlign {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub text: String,
    pub badge: Option<BadgeCategory>,
}

impl TableCell {
    pub fn plain(text: impl Into<String>) -> Self {
        TableCell {
            text: text.into(),
            badge: None,
        }
    }

    pub fn badged(text: impl Into<String>, badge: BadgeCategory) -> Self {
        TableCell {
            text: text.into(),
            badge: Some(badge),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    visible: bool,
}

impl TableRow {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayTable {
    id: TableId,
    header: Vec<String>,
    aligns: Vec<ColumnAlign>,
    rows: Vec<TableRow>,
}

impl DisplayTable {
    pub fn new(id: TableId, columns: &[(&str, ColumnAlign)]) -> Self {
        DisplayTable {
            id,
            header: columns.iter().map(|(name, _)| name.to_string()).collect(),
            aligns: columns.iter().map(|(_, align)| *align).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<TableCell>) {
        self.rows.push(TableRow {
            cells,
            visible: true,
        });
    }

    #[cfg(test)]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter(|row| row.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows().count()
    }

    /// Hides every body row whose text does not contain `query`,
    /// case-insensitively. An empty query shows everything.
    pub fn apply_filter(&mut self, query: &str) {
        let query = query.to_lowercase();
        for row in &mut self.rows {
            row.visible = query.is_empty() || row.text().to_lowercase().contains(&query);
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, self.header.iter().map(String::as_str));
        for row in &self.rows {
            push_csv_line(&mut out, row.cells.iter().map(|cell| cell.text.as_str()));
        }
        out
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .header
            .iter()
            .map(|name| UnicodeWidthStr::width(name.as_str()))
            .collect();
        for row in &self.rows {
            for (idx, cell) in row.cells.iter().enumerate() {
                let width = UnicodeWidthStr::width(cell.text.as_str());
                match widths.get_mut(idx) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
            .into_iter()
            .map(|width| width.clamp(1, MAX_COLUMN_WIDTH))
            .collect()
    }

    pub fn lines(&self, palette: &Palette, scroll: usize, height: usize) -> Vec<Line<'static>> {
        if height == 0 {
            return Vec::new();
        }
        let widths = self.column_widths();
        let mut lines = Vec::with_capacity(height);
        let header_style = Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD);
        let header_cells: Vec<TableCell> = self.header.iter().map(TableCell::plain).collect();
        lines.push(self.styled_row(&header_cells, &widths, palette, Some(header_style)));
        let visible: Vec<&TableRow> = self.visible_rows().collect();
        if visible.is_empty() {
            let message = if self.rows.is_empty() {
                match self.id {
                    TableId::Analysis => "no hourly rows",
                    TableId::Positions => "no open positions",
                    TableId::Backtest => "no closed trades",
                }
            } else {
                "no rows match the search"
            };
            lines.push(Line::styled(message, Style::default().fg(palette.muted)));
            return lines;
        }
        let (start, end) = visible_range(visible.len(), height - 1, scroll);
        for row in &visible[start..end] {
            lines.push(self.styled_row(&row.cells, &widths, palette, None));
        }
        lines
    }

    fn styled_row(
        &self,
        cells: &[TableCell],
        widths: &[usize],
        palette: &Palette,
        row_style: Option<Style>,
    ) -> Line<'static> {
        let mut spans = Vec::with_capacity(cells.len() * 2);
        for (idx, width) in widths.iter().enumerate() {
            let align = self.aligns.get(idx).copied().unwrap_or(ColumnAlign::Left);
            let cell = cells.get(idx);
            let text = cell.map(|cell| cell.text.as_str()).unwrap_or("");
            let padded = format_column_value(text, align, *width);
            let style = match (row_style, cell.and_then(|cell| cell.badge)) {
                (Some(style), _) => style,
                (None, Some(badge)) => palette.badge(badge),
                (None, None) => Style::default().fg(palette.text),
            };
            if idx > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(padded, style));
        }
        Line::from(spans)
    }
}

fn push_csv_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let quoted: Vec<String> = cells
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}

pub fn format_column_value(value: &str, align: ColumnAlign, width: usize) -> String {
    let clipped = clip_to_width(value, width);
    pad_to_width(&clipped, width, align)
}

fn clip_to_width(value: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(value) <= width {
        return value.to_string();
    }
    let mut result = String::new();
    let mut remaining = width.saturating_sub(1);
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if ch_width > remaining {
            break;
        }
        result.push(ch);
        remaining = remaining.saturating_sub(ch_width);
    }
    result.push('…');
    result
}

fn pad_to_width(value: &str, width: usize, align: ColumnAlign) -> String {
    let current = UnicodeWidthStr::width(value);
    if current >= width {
        return value.to_string();
    }
    let padding = " ".repeat(width - current);
    match align {
        ColumnAlign::Left => format!("{value}{padding}"),
        ColumnAlign::Right => format!("{padding}{value}"),
    }
}

pub fn clamp_index(idx: usize, len: usize) -> usize {
    if len == 0 { 0 } else { idx.min(len - 1) }
}

pub fn visible_range(len: usize, visible: usize, first: usize) -> (usize, usize) {
    if len == 0 || visible == 0 {
        return (0, 0);
    }
    if len <= visible {
        return (0, len);
    }
    let max_start = len - visible;
    let start = clamp_index(first, len).min(max_start);
    (start, start + visible)
}
