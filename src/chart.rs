use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Paragraph};

use crate::command::format_number;
use crate::theme::Palette;

// bar heights are integers, scaled against the largest magnitude
const BAR_SCALE: u64 = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct BarPoint {
    pub label: String,
    pub value: f64,
}

pub fn scale_bars(values: &[f64]) -> Vec<u64> {
    let max_abs = values
        .iter()
        .filter(|value| value.is_finite())
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    values
        .iter()
        .map(|value| {
            if !value.is_finite() || max_abs == 0.0 {
                0
            } else {
                ((value.abs() / max_abs) * BAR_SCALE as f64).round() as u64
            }
        })
        .collect()
}

pub fn bar_geometry(inner_width: u16, count: usize) -> (u16, u16) {
    if count == 0 {
        return (1, 0);
    }
    let count = count.min(u16::MAX as usize) as u16;
    let with_gap = (inner_width.saturating_add(1) / count).saturating_sub(1);
    if with_gap >= 1 {
        (with_gap, 1)
    } else {
        ((inner_width / count).max(1), 0)
    }
}

// negative values are drawn by magnitude in `negative_color`
pub fn render_bar_chart(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    points: &[BarPoint],
    color: Color,
    negative_color: Color,
    palette: &Palette,
) {
    let block = Block::bordered()
        .title(title.to_string())
        .style(palette.base())
        .border_style(Style::default().fg(palette.muted));
    if points.is_empty() {
        let empty = Paragraph::new(Line::styled(
            "nothing loaded",
            Style::default().fg(palette.muted),
        ))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }
    let values: Vec<f64> = points.iter().map(|point| point.value).collect();
    let heights = scale_bars(&values);
    let bars: Vec<Bar> = points
        .iter()
        .zip(heights)
        .map(|(point, height)| {
            let bar_color = if point.value < 0.0 {
                negative_color
            } else {
                color
            };
            Bar::default()
                .value(height)
                .text_value(format_number(point.value))
                .label(Line::from(point.label.clone()))
                .style(Style::default().fg(bar_color))
                .value_style(Style::default().fg(palette.background).bg(bar_color))
        })
        .collect();
    let (bar_width, bar_gap) = bar_geometry(area.width.saturating_sub(2), bars.len());
    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(bar_gap)
        .max(BAR_SCALE)
        .label_style(Style::default().fg(palette.text));
    frame.render_widget(chart, area);
}
