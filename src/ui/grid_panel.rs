//! One collapsible teacher panel per division
//!
//! A panel owns its sort directive, its virtualizer and its cursor. Column
//! visibility and the records themselves are shared and passed in on refresh.

use tracing::debug;

use crate::config::DisplayConfig;
use crate::data::columns::{ColumnDef, ColumnVisibility};
use crate::data::records::{in_division, Division, Teacher};
use crate::data::row_model::{project, DisplayCell, DisplayRow, SortState};
use crate::data::store::Snapshot;
use crate::ui::virtualizer::{MeasureMode, VirtualWindow, Virtualizer};

pub fn panel_title(division: Division) -> &'static str {
    match division {
        Division::MS => "MS Teachers",
        Division::HS => "HS Teachers",
    }
}

#[derive(Debug)]
pub struct GridPanel {
    division: Division,
    sort: SortState,
    virtualizer: Virtualizer,
    rows: Vec<DisplayRow>,
    collapsed: bool,
    /// Row key under the cursor; follows the teacher across re-sorts
    cursor_key: Option<String>,
    cursor_col: usize,
}

impl GridPanel {
    pub fn new(division: Division, display: &DisplayConfig, collapsed: bool) -> Self {
        let mode = if display.measure_rows {
            MeasureMode::Dynamic
        } else {
            MeasureMode::Static
        };
        Self {
            division,
            sort: SortState::unsorted(),
            virtualizer: Virtualizer::new(display.estimated_row_height, display.overscan, mode),
            rows: Vec::new(),
            collapsed,
            cursor_key: None,
            cursor_col: 0,
        }
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn title(&self) -> &'static str {
        panel_title(self.division)
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&DisplayRow> {
        self.rows.get(index)
    }

    /// Teachers of this panel's division, in snapshot order
    pub fn records<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a Teacher> {
        snapshot
            .teachers
            .iter()
            .filter(|t| in_division(t, self.division))
            .collect()
    }

    /// Re-project from `snapshot`. Called after loads, sorts, drops and
    /// visibility changes.
    pub fn refresh(&mut self, snapshot: &Snapshot, columns: &[ColumnDef], visibility: &ColumnVisibility) {
        let records: Vec<Teacher> = self.records(snapshot).into_iter().cloned().collect();
        self.rows = project(&records, &self.sort, columns, visibility);
        self.virtualizer
            .set_rows(self.rows.iter().map(|r| r.key.clone()).collect());

        let column_count = self.column_count();
        if self.cursor_col >= column_count {
            self.cursor_col = column_count.saturating_sub(1);
        }
        let cursor_valid = self
            .cursor_key
            .as_deref()
            .is_some_and(|key| self.virtualizer.index_of_key(key).is_some());
        if !cursor_valid {
            self.cursor_key = self.rows.first().map(|r| r.key.clone());
        }
        debug!(
            target: "projection",
            "{}: {} rows, {} columns", self.title(), self.rows.len(), column_count
        );
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.cells.len()).unwrap_or(0)
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    /// Header toggle; the caller refreshes when this returns true
    pub fn toggle_sort(&mut self, column: &ColumnDef) -> bool {
        self.sort.toggle(column)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    pub fn cursor_row(&self) -> Option<usize> {
        self.cursor_key
            .as_deref()
            .and_then(|key| self.virtualizer.index_of_key(key))
    }

    pub fn cursor_col(&self) -> usize {
        self.cursor_col
    }

    pub fn current_row(&self) -> Option<&DisplayRow> {
        self.cursor_row().and_then(|idx| self.rows.get(idx))
    }

    pub fn current_cell(&self) -> Option<&DisplayCell> {
        self.current_row().and_then(|row| row.cells.get(self.cursor_col))
    }

    pub fn set_cursor(&mut self, row: usize, col: usize) {
        if let Some(key) = self.virtualizer.key_at(row) {
            self.cursor_key = Some(key.to_string());
            self.virtualizer.scroll_to_index(row);
        }
        self.cursor_col = col.min(self.column_count().saturating_sub(1));
    }

    pub fn move_cursor(&mut self, rows: i64, cols: i64) {
        if self.rows.is_empty() {
            return;
        }
        let row = self.cursor_row().unwrap_or(0) as i64 + rows;
        let row = row.clamp(0, self.rows.len() as i64 - 1) as usize;
        let col = (self.cursor_col as i64 + cols).clamp(0, self.column_count() as i64 - 1) as usize;
        self.set_cursor(row, col);
    }

    /// Move by a screenful of rows
    pub fn page(&mut self, down: bool) {
        let rows = self.virtualizer.window().visible.len().max(1) as i64;
        self.move_cursor(if down { rows } else { -rows }, 0);
    }

    pub fn scroll_by(&mut self, lines: i64) {
        self.virtualizer.scroll_by(lines);
    }

    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    pub fn virtualizer_mut(&mut self) -> &mut Virtualizer {
        &mut self.virtualizer
    }

    pub fn window(&mut self) -> VirtualWindow {
        self.virtualizer.window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::build_columns;
    use crate::data::records::fixtures::{assignment, course, teacher};
    use crate::data::records::CourseGroup;
    use crate::data::row_model::SortOrder;
    use crate::data::store::ScheduleStore;

    fn setup() -> (ScheduleStore, Vec<ColumnDef>) {
        let courses = vec![course("C6-Math", CourseGroup::C6)];
        let columns = build_columns(&courses);
        let store = ScheduleStore::with_data(
            vec![
                teacher("m1", Some(Division::MS), vec![assignment("C6-Math", CourseGroup::C6, 8)]),
                teacher("h1", Some(Division::HS), vec![]),
                teacher("n1", None, vec![assignment("C6-Math", CourseGroup::C6, 2)]),
            ],
            courses,
        );
        (store, columns)
    }

    #[test]
    fn test_null_division_lands_in_ms_panel() {
        let (store, columns) = setup();
        let visibility = ColumnVisibility::new();
        let mut ms = GridPanel::new(Division::MS, &DisplayConfig::default(), false);
        let mut hs = GridPanel::new(Division::HS, &DisplayConfig::default(), false);
        ms.refresh(&store.current(), &columns, &visibility);
        hs.refresh(&store.current(), &columns, &visibility);

        let ms_keys: Vec<_> = ms.rows().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(ms_keys, vec!["m1", "n1"]);
        assert_eq!(hs.rows().len(), 1);
        assert_eq!(ms.title(), "MS Teachers");
    }

    #[test]
    fn test_cursor_follows_teacher_across_sort() {
        let (store, columns) = setup();
        let visibility = ColumnVisibility::new();
        let mut ms = GridPanel::new(Division::MS, &DisplayConfig::default(), false);
        ms.refresh(&store.current(), &columns, &visibility);
        ms.set_cursor(0, 0);
        assert_eq!(ms.current_row().unwrap().key, "m1");

        // m1 has 10 available periods, n1 has 16
        let available = columns.iter().find(|c| c.id == "availablePeriods").unwrap();
        assert!(ms.toggle_sort(available));
        assert!(ms.toggle_sort(available));
        assert_eq!(ms.sort().order, SortOrder::Descending);
        ms.refresh(&store.current(), &columns, &visibility);

        assert_eq!(ms.rows()[0].key, "n1");
        assert_eq!(ms.cursor_row(), Some(1));
        assert_eq!(ms.current_row().unwrap().key, "m1");
    }

    #[test]
    fn test_cursor_is_clamped() {
        let (store, columns) = setup();
        let visibility = ColumnVisibility::new();
        let mut ms = GridPanel::new(Division::MS, &DisplayConfig::default(), false);
        ms.refresh(&store.current(), &columns, &visibility);

        ms.move_cursor(10, 100);
        assert_eq!(ms.cursor_row(), Some(1));
        assert_eq!(ms.cursor_col(), columns.len() - 1);
        assert_eq!(ms.current_cell().unwrap().column_id, "C6-Math");

        ms.move_cursor(-10, -100);
        assert_eq!(ms.cursor_row(), Some(0));
        assert_eq!(ms.cursor_col(), 0);
    }

    #[test]
    fn test_static_mode_when_measuring_disabled() {
        let display = DisplayConfig {
            measure_rows: false,
            ..DisplayConfig::default()
        };
        let panel = GridPanel::new(Division::HS, &display, true);
        assert_eq!(panel.virtualizer().mode(), MeasureMode::Static);
        assert!(panel.is_collapsed());
    }
}
