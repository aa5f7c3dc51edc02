//! Projection of teacher records into ordered display rows
//!
//! records (already partitioned by division)
//!     → sorted by the single active sort column (stable)
//!         → cells for the visible columns only
//!
//! Row identity is the teacher id so that anything keyed by row (measured heights,
//! the cursor) survives a re-sort.

use tracing::debug;

use crate::data::cell_value::{compare_cell_values, CellValue};
use crate::data::columns::{ColumnDef, ColumnVisibility, CourseColumnMeta};
use crate::data::records::Teacher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortOrder {
    /// unsorted → ascending → descending → unsorted
    pub fn next(self) -> Self {
        match self {
            SortOrder::None => SortOrder::Ascending,
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::None,
        }
    }
}

/// The single active sort directive of a grid panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<String>,
    pub order: SortOrder,
}

impl SortState {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(column: impl Into<String>, order: SortOrder) -> Self {
        let column = match order {
            SortOrder::None => None,
            _ => Some(column.into()),
        };
        Self { column, order }
    }

    /// Header click. Non-sortable columns are ignored and `false` is returned.
    /// Clicking a different column starts its cycle from ascending.
    pub fn toggle(&mut self, column: &ColumnDef) -> bool {
        if !column.sortable {
            return false;
        }

        let current = match &self.column {
            Some(id) if *id == column.id => self.order,
            _ => SortOrder::None,
        };
        let next = current.next();
        *self = SortState::by(column.id.clone(), next);

        debug!(target: "projection", "sort on '{}' is now {:?}", column.id, next);
        true
    }

    pub fn order_for(&self, column_id: &str) -> SortOrder {
        match &self.column {
            Some(id) if id == column_id => self.order,
            _ => SortOrder::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCell {
    pub column_id: String,
    pub value: CellValue,
    pub course: Option<CourseColumnMeta>,
}

impl DisplayCell {
    /// Course cells with periods are the only drag sources
    pub fn is_draggable(&self) -> bool {
        self.course.is_some() && !self.value.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    /// Teacher id; stable across sorts
    pub key: String,
    pub cells: Vec<DisplayCell>,
}

impl DisplayRow {
    pub fn cell(&self, column_id: &str) -> Option<&DisplayCell> {
        self.cells.iter().find(|c| c.column_id == column_id)
    }
}

/// Sort `records` by the active directive and project the visible columns
pub fn project(
    records: &[Teacher],
    sort: &SortState,
    columns: &[ColumnDef],
    visibility: &ColumnVisibility,
) -> Vec<DisplayRow> {
    let order = sort_order(records, sort, columns);
    let visible = visibility.visible_columns(columns);

    order
        .into_iter()
        .map(|idx| {
            let teacher = &records[idx];
            DisplayRow {
                key: teacher.id.clone(),
                cells: visible
                    .iter()
                    .map(|column| DisplayCell {
                        column_id: column.id.clone(),
                        value: column.value(teacher),
                        course: column.course,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Indices into `records` in display order
pub fn sort_order(records: &[Teacher], sort: &SortState, columns: &[ColumnDef]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();

    let column = match (&sort.column, sort.order) {
        (Some(id), SortOrder::Ascending | SortOrder::Descending) => {
            columns.iter().find(|c| &c.id == id)
        }
        _ => None,
    };

    if let Some(column) = column {
        let keys: Vec<CellValue> = records.iter().map(|t| column.value(t)).collect();
        let descending = sort.order == SortOrder::Descending;
        // sort_by is stable; reversing the comparator keeps ties in input order
        order.sort_by(|&a, &b| {
            let cmp = compare_cell_values(&keys[a], &keys[b]);
            if descending {
                cmp.reverse()
            } else {
                cmp
            }
        });
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::build_columns;
    use crate::data::records::fixtures::{assignment, course, teacher};
    use crate::data::records::{CourseGroup, Division};

    fn records() -> Vec<Teacher> {
        let mut a = teacher("a", Some(Division::MS), vec![assignment("C6-Math", CourseGroup::C6, 4)]);
        a.max_load = 10;
        let mut b = teacher("b", None, vec![]);
        b.max_load = 20;
        let mut c = teacher("c", Some(Division::MS), vec![]);
        c.max_load = 10;
        vec![a, b, c]
    }

    fn keys(rows: &[DisplayRow]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_sort_cycle() {
        let columns = build_columns(&[]);
        let max_load = columns.iter().find(|c| c.id == "maxLoad").unwrap();
        let mut sort = SortState::unsorted();

        assert!(sort.toggle(max_load));
        assert_eq!(sort.order, SortOrder::Ascending);
        assert!(sort.toggle(max_load));
        assert_eq!(sort.order, SortOrder::Descending);
        assert!(sort.toggle(max_load));
        assert_eq!(sort, SortState::unsorted());
    }

    #[test]
    fn test_non_sortable_column_ignores_toggle() {
        let columns = build_columns(&[course("C6-Math", CourseGroup::C6)]);
        let course_col = columns.last().unwrap();
        let mut sort = SortState::unsorted();
        assert!(!sort.toggle(course_col));
        assert_eq!(sort, SortState::unsorted());
    }

    #[test]
    fn test_stable_sort_keeps_ties_in_input_order() {
        let columns = build_columns(&[]);
        let records = records();

        let asc = project(&records, &SortState::by("maxLoad", SortOrder::Ascending), &columns, &ColumnVisibility::new());
        assert_eq!(keys(&asc), vec!["a", "c", "b"]);

        let desc = project(&records, &SortState::by("maxLoad", SortOrder::Descending), &columns, &ColumnVisibility::new());
        assert_eq!(keys(&desc), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let columns = build_columns(&[]);
        let named: Vec<Teacher> = [("1", "alice"), ("2", "Bob"), ("3", "Zed")]
            .into_iter()
            .map(|(id, name)| {
                let mut t = teacher(id, Some(Division::MS), vec![]);
                t.name = name.to_string();
                t
            })
            .collect();

        let asc = project(&named, &SortState::by("name", SortOrder::Ascending), &columns, &ColumnVisibility::new());
        assert_eq!(keys(&asc), vec!["1", "2", "3"]);

        let desc = project(&named, &SortState::by("name", SortOrder::Descending), &columns, &ColumnVisibility::new());
        assert_eq!(keys(&desc), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let columns = build_columns(&[]);
        let sort = SortState::by("availablePeriods", SortOrder::Descending);
        let vis = ColumnVisibility::new();

        let once = project(&records(), &sort, &columns, &vis);
        let reordered: Vec<Teacher> = once
            .iter()
            .map(|row| records().into_iter().find(|t| t.id == row.key).unwrap())
            .collect();
        let twice = project(&reordered, &sort, &columns, &vis);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_hidden_columns_are_not_projected() {
        let columns = build_columns(&[course("C6-Math", CourseGroup::C6)]);
        let mut vis = ColumnVisibility::new();
        vis.set("division", false);

        let rows = project(&records(), &SortState::unsorted(), &columns, &vis);
        assert_eq!(keys(&rows), vec!["a", "b", "c"]);
        assert!(rows[0].cell("division").is_none());
        let math = rows[0].cell("C6-Math").unwrap();
        assert!(math.is_draggable());
        assert!(!rows[1].cell("C6-Math").unwrap().is_draggable());
        assert!(!rows[0].cell("name").unwrap().is_draggable());
    }
}
