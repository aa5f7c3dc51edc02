// Panel rendering: only the virtualizer's window is materialized.
// Row heights come from wrapping cell text into the column widths and are fed
// back to the virtualizer before the frame is drawn.

use ratatui::{
    layout::{Constraint, Margin},
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState, Table},
};
use std::ops::Range;

use crate::data::columns::ColumnDef;
use crate::data::row_model::{DisplayCell, DisplayRow, SortOrder};
use crate::ui::grid_panel::GridPanel;
use crate::utils::text::{fit, wrap};

/// Columns kept on screen while scrolling sideways (the teacher name)
pub const PINNED_COLUMNS: usize = 1;

/// Tallest a wrapped row may grow
pub const MAX_ROW_LINES: u32 = 3;

/// Everything the renderer needs besides the panel itself
pub struct PanelRenderContext<'a> {
    /// Visible columns, in the same order as each row's cells
    pub columns: Vec<&'a ColumnDef>,
    pub focused: bool,
    /// (source row key, course id) of the carried payload
    pub carried: Option<(&'a str, &'a str)>,
    pub use_glyphs: bool,
    pub course_width: u16,
}

pub fn column_width(column: &ColumnDef, course_width: u16) -> u16 {
    if column.is_course_column() {
        return course_width.max(3);
    }
    match column.id.as_str() {
        "name" => 18,
        "otherRoles" => 14,
        "availablePeriods" | "students" => 9,
        "division" | "maxLoad" => 8,
        "preps" => 6,
        _ => 10,
    }
}

pub fn sort_indicator(order: SortOrder, sortable: bool, use_glyphs: bool) -> &'static str {
    match (order, use_glyphs) {
        (SortOrder::Ascending, true) => " ▲",
        (SortOrder::Descending, true) => " ▼",
        (SortOrder::Ascending, false) => " ^",
        (SortOrder::Descending, false) => " v",
        (SortOrder::None, true) if sortable => " ⇅",
        (SortOrder::None, _) => "",
    }
}

/// Columns (by index) that fit into `available` cells. The first `pinned`
/// columns are always included; the rest start late enough for `focus` to show.
pub fn fit_columns(widths: &[u16], available: u16, pinned: usize, focus: usize) -> Vec<usize> {
    let pinned = pinned.min(widths.len());
    let mut budget = available as i32 + 1;
    let mut fixed = Vec::new();
    for (idx, width) in widths.iter().enumerate().take(pinned) {
        budget -= *width as i32 + 1;
        fixed.push(idx);
    }

    let take_from = |start: usize| -> Vec<usize> {
        let mut left = budget;
        let mut out = Vec::new();
        for (idx, width) in widths.iter().enumerate().skip(start) {
            let cost = *width as i32 + 1;
            if cost > left {
                break;
            }
            left -= cost;
            out.push(idx);
        }
        out
    };

    let mut start = pinned;
    let mut scrolling = take_from(start);
    while focus >= pinned && focus < widths.len() && !scrolling.contains(&focus) && start < focus {
        start += 1;
        scrolling = take_from(start);
    }

    fixed.extend(scrolling);
    fixed
}

/// Lines needed to show `row` with every cell wrapped into its column width
pub fn measure_row(row: &DisplayRow, widths: &[u16]) -> u32 {
    row.cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| wrap(&cell.value.to_string(), *width as usize).len() as u32)
        .max()
        .unwrap_or(1)
        .clamp(1, MAX_ROW_LINES)
}

/// Where something was drawn, for translating mouse positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    Title,
    Header { column: usize },
    Cell { row: usize, column: usize },
}

#[derive(Debug, Clone, Default)]
pub struct HitMap {
    area: Rect,
    header_y: Option<u16>,
    /// x range → index into the visible columns
    columns: Vec<(Range<u16>, usize)>,
    /// y range → row index in the panel
    rows: Vec<(Range<u16>, usize)>,
}

impl HitMap {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            ..Self::default()
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.area.x
            && x < self.area.x + self.area.width
            && y >= self.area.y
            && y < self.area.y + self.area.height
    }

    pub fn hit(&self, x: u16, y: u16) -> Option<Hit> {
        if !self.contains(x, y) {
            return None;
        }
        if y == self.area.y {
            return Some(Hit::Title);
        }
        let column = self
            .columns
            .iter()
            .find(|(range, _)| range.contains(&x))
            .map(|(_, idx)| *idx)?;
        if self.header_y == Some(y) {
            return Some(Hit::Header { column });
        }
        self.rows
            .iter()
            .find(|(range, _)| range.contains(&y))
            .map(|(_, row)| Hit::Cell { row: *row, column })
    }
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

fn cell_style(cell: &DisplayCell, is_cursor: bool, is_carried: bool) -> Style {
    if is_cursor {
        return Style::default()
            .bg(Color::Yellow)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD);
    }
    if is_carried {
        return Style::default()
            .bg(Color::Magenta)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
    }
    match cell.course {
        Some(meta) if cell.value.is_zero() => Style::default()
            .bg(rgb(meta.color))
            .fg(Color::DarkGray),
        Some(meta) => Style::default()
            .bg(rgb(meta.color))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
        None => Style::default(),
    }
}

/// Draw `panel` into `area` and report where rows and columns landed
pub fn render_panel(f: &mut Frame, area: Rect, panel: &mut GridPanel, ctx: &PanelRenderContext) -> HitMap {
    let mut hits = HitMap::new(area);

    let marker = match (panel.is_collapsed(), ctx.use_glyphs) {
        (true, true) => "▶",
        (false, true) => "▼",
        (true, false) => "+",
        (false, false) => "-",
    };
    let border_style = if ctx.focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    // a collapsed panel is just its title bar
    let borders = if panel.is_collapsed() {
        Borders::TOP
    } else {
        Borders::ALL
    };
    let block = Block::default()
        .borders(borders)
        .border_style(border_style)
        .title(format!(" {} {} ({}) ", marker, panel.title(), panel.rows().len()));

    if panel.is_collapsed() || area.height < 4 {
        f.render_widget(block, area);
        return hits;
    }

    let inner = block.inner(area);
    f.render_widget(block, area);

    if panel.rows().is_empty() {
        let empty = Paragraph::new("No teachers").style(Style::default().fg(Color::Yellow));
        f.render_widget(empty, inner);
        return hits;
    }

    let widths: Vec<u16> = ctx
        .columns
        .iter()
        .map(|c| column_width(c, ctx.course_width))
        .collect();
    let drawn = fit_columns(&widths, inner.width.saturating_sub(1), PINNED_COLUMNS, panel.cursor_col());

    let body_height = inner.height.saturating_sub(1) as u32;
    panel.virtualizer_mut().set_viewport_height(body_height);

    // measure the materialized rows (overscan included), then settle the window
    let mut window = panel.window();
    let measured: Vec<(String, u32)> = window
        .items
        .iter()
        .filter_map(|item| panel.row(item.index))
        .map(|row| (row.key.clone(), measure_row(row, &widths)))
        .collect();
    let mut changed = false;
    for (key, lines) in measured {
        changed |= panel.virtualizer_mut().measure(&key, lines);
    }
    if changed {
        window = panel.window();
    }

    let sort = panel.sort().clone();
    let header_cells: Vec<Cell> = drawn
        .iter()
        .map(|&j| {
            let column = ctx.columns[j];
            let indicator = sort_indicator(sort.order_for(&column.id), column.sortable, ctx.use_glyphs);
            let room = (widths[j] as usize).saturating_sub(indicator.chars().count());
            let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
            if ctx.carried.is_some_and(|(_, course)| course == column.id) {
                style = style.fg(Color::Green).add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(format!("{}{}", fit(&column.header, room), indicator)).style(style)
        })
        .collect();

    let cursor_row = panel.cursor_row();
    let mut rows = Vec::new();
    let mut y = inner.y + 1;
    let bottom = inner.y + inner.height;
    for idx in window.visible.clone() {
        let Some(row) = panel.row(idx) else { break };
        let height = panel.virtualizer().size_of_key(&row.key);
        let cells: Vec<Cell> = drawn
            .iter()
            .filter_map(|&j| row.cells.get(j).map(|cell| (j, cell)))
            .map(|(j, cell)| {
                let text = wrap(&cell.value.to_string(), widths[j] as usize)
                    .into_iter()
                    .take(height as usize)
                    .collect::<Vec<_>>()
                    .join("\n");
                let is_cursor = ctx.focused && cursor_row == Some(idx) && panel.cursor_col() == j;
                let is_carried = ctx
                    .carried
                    .is_some_and(|(source, course)| source == row.key && course == cell.column_id);
                Cell::from(text).style(cell_style(cell, is_cursor, is_carried))
            })
            .collect();
        rows.push(Row::new(cells).height(height as u16));

        if y < bottom {
            let end = (y + height as u16).min(bottom);
            hits.rows.push((y..end, idx));
            y = end;
        }
    }

    hits.header_y = Some(inner.y);
    let mut x = inner.x;
    for &j in &drawn {
        hits.columns.push((x..x + widths[j], j));
        x += widths[j] + 1;
    }

    let constraints: Vec<Constraint> = drawn.iter().map(|&j| Constraint::Length(widths[j])).collect();
    let table = Table::new(rows, constraints)
        .header(Row::new(header_cells))
        .column_spacing(1);
    f.render_widget(table, inner);

    let total = window.total_size as usize;
    if total > body_height as usize {
        let mut state = ScrollbarState::new(total.saturating_sub(body_height as usize))
            .position(panel.virtualizer().scroll_offset() as usize)
            .viewport_content_length(body_height as usize);
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut state,
        );
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cell_value::CellValue;

    #[test]
    fn test_fit_columns_keeps_pinned_and_focus() {
        let widths = vec![18, 8, 8, 8, 8, 8];
        // 18+1 pinned, room for two 8-wide columns
        assert_eq!(fit_columns(&widths, 36, 1, 0), vec![0, 1, 2]);
        assert_eq!(fit_columns(&widths, 36, 1, 4), vec![0, 3, 4]);
        assert_eq!(fit_columns(&widths, 200, 1, 5), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(fit_columns(&widths, 10, 1, 3), vec![0]);
    }

    #[test]
    fn test_sort_indicators() {
        assert_eq!(sort_indicator(SortOrder::Ascending, true, true), " ▲");
        assert_eq!(sort_indicator(SortOrder::Descending, true, false), " v");
        assert_eq!(sort_indicator(SortOrder::None, true, true), " ⇅");
        assert_eq!(sort_indicator(SortOrder::None, false, true), "");
        assert_eq!(sort_indicator(SortOrder::None, true, false), "");
    }

    #[test]
    fn test_measure_row_wraps_long_text() {
        let row = DisplayRow {
            key: "t1".into(),
            cells: vec![
                DisplayCell {
                    column_id: "name".into(),
                    value: CellValue::from("Ms Alexandra Featherstonehaugh"),
                    course: None,
                },
                DisplayCell {
                    column_id: "preps".into(),
                    value: CellValue::Integer(3),
                    course: None,
                },
            ],
        };
        assert_eq!(measure_row(&row, &[18, 6]), 2);
        assert_eq!(measure_row(&row, &[5, 6]), MAX_ROW_LINES);
        assert_eq!(measure_row(&row, &[40, 6]), 1);
    }

    #[test]
    fn test_hit_map() {
        let mut hits = HitMap::new(Rect::new(0, 0, 40, 10));
        hits.header_y = Some(1);
        hits.columns = vec![(1..19, 0), (20..28, 1)];
        hits.rows = vec![(2..4, 0), (4..5, 1)];

        assert_eq!(hits.hit(5, 0), Some(Hit::Title));
        assert_eq!(hits.hit(21, 1), Some(Hit::Header { column: 1 }));
        assert_eq!(hits.hit(3, 3), Some(Hit::Cell { row: 0, column: 0 }));
        assert_eq!(hits.hit(25, 4), Some(Hit::Cell { row: 1, column: 1 }));
        assert_eq!(hits.hit(19, 4), None);
        assert_eq!(hits.hit(50, 4), None);
    }
}
