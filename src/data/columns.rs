//! Column definitions for the teacher grid and the shared visibility map
//!
//! The grid has a fixed set of teacher columns followed by one column per course.
//! A course column carries the course group, which is what the group checkboxes
//! toggle together.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::data::cell_value::CellValue;
use crate::data::records::{Course, CourseGroup, Teacher};

/// Columns that respond to a header sort toggle
pub const SORTABLE_COLUMNS: &[&str] = &[
    "availablePeriods",
    "preps",
    "students",
    "maxLoad",
    "otherRoles",
    "name",
    "division",
];

pub type Accessor = Arc<dyn Fn(&Teacher) -> CellValue + Send + Sync>;

/// Marks a column as representing a course
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseColumnMeta {
    pub group: CourseGroup,
    pub color: (u8, u8, u8),
}

#[derive(Clone)]
pub struct ColumnDef {
    pub id: String,
    pub header: String,
    pub sortable: bool,
    pub course: Option<CourseColumnMeta>,
    accessor: Accessor,
}

impl ColumnDef {
    pub fn new<F>(id: impl Into<String>, header: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&Teacher) -> CellValue + Send + Sync + 'static,
    {
        let id = id.into();
        let sortable = SORTABLE_COLUMNS.contains(&id.as_str());
        Self {
            id,
            header: header.into(),
            sortable,
            course: None,
            accessor: Arc::new(accessor),
        }
    }

    pub fn for_course(course: &Course) -> Self {
        let course_id = course.id.clone();
        let mut column = Self::new(course.id.clone(), course.name.clone(), move |t: &Teacher| {
            CellValue::Integer(t.periods_of(&course_id))
        });
        column.sortable = false;
        column.course = Some(CourseColumnMeta {
            group: course.group,
            color: course.group.color(),
        });
        column
    }

    pub fn value(&self, teacher: &Teacher) -> CellValue {
        (self.accessor)(teacher)
    }

    pub fn is_course_column(&self) -> bool {
        self.course.is_some()
    }

    pub fn group(&self) -> Option<CourseGroup> {
        self.course.map(|meta| meta.group)
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("sortable", &self.sortable)
            .field("course", &self.course)
            .finish()
    }
}

/// Fixed teacher columns followed by one column per course, in course order
pub fn build_columns(courses: &[Course]) -> Vec<ColumnDef> {
    let mut columns = vec![
        ColumnDef::new("name", "Teacher", |t: &Teacher| CellValue::from(t.name.as_str())),
        ColumnDef::new("division", "Division", |t: &Teacher| match t.division {
            Some(d) => CellValue::Text(d.to_string()),
            None => CellValue::Null,
        }),
        ColumnDef::new("otherRoles", "Other Roles", |t: &Teacher| {
            CellValue::Text(t.roles_label())
        }),
        ColumnDef::new("maxLoad", "Max Load", |t: &Teacher| {
            CellValue::Integer(t.max_load)
        }),
        ColumnDef::new("availablePeriods", "Available Periods", |t: &Teacher| {
            CellValue::Integer(t.available_periods())
        }),
        ColumnDef::new("preps", "Preps", |t: &Teacher| {
            CellValue::Integer(t.preps() as i64)
        }),
        ColumnDef::new("students", "# of Students", |t: &Teacher| {
            CellValue::Float(t.students())
        }),
    ];

    columns.extend(courses.iter().map(ColumnDef::for_course));
    columns
}

/// Column id -> visible. Columns never mentioned are visible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnVisibility {
    states: HashMap<String, bool>,
}

impl ColumnVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, column_id: &str) -> bool {
        self.states.get(column_id).copied().unwrap_or(true)
    }

    pub fn set(&mut self, column_id: impl Into<String>, visible: bool) {
        self.states.insert(column_id.into(), visible);
    }

    pub fn visible_columns<'a>(&self, columns: &'a [ColumnDef]) -> Vec<&'a ColumnDef> {
        columns.iter().filter(|c| self.is_visible(&c.id)).collect()
    }

    /// Checked means every member column of the group is visible
    pub fn is_group_visible(&self, columns: &[ColumnDef], group: CourseGroup) -> bool {
        columns
            .iter()
            .filter(|c| c.group() == Some(group))
            .all(|c| self.is_visible(&c.id))
    }

    /// Sets every member of `group` to the negation of "all members visible".
    /// Returns the state that was applied.
    pub fn toggle_group(&mut self, columns: &[ColumnDef], group: CourseGroup) -> bool {
        let next = !self.is_group_visible(columns, group);
        for column in columns.iter().filter(|c| c.group() == Some(group)) {
            self.states.insert(column.id.clone(), next);
        }
        next
    }
}

/// One checkbox in the group visibility bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCheckbox {
    pub group: CourseGroup,
    pub checked: bool,
}

/// Distinct course groups in first-appearance order
pub fn course_groups(columns: &[ColumnDef]) -> Vec<CourseGroup> {
    let mut groups = Vec::new();
    for group in columns.iter().filter_map(ColumnDef::group) {
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    groups
}

pub fn group_checkboxes(columns: &[ColumnDef], visibility: &ColumnVisibility) -> Vec<GroupCheckbox> {
    course_groups(columns)
        .into_iter()
        .map(|group| GroupCheckbox {
            group,
            checked: visibility.is_group_visible(columns, group),
        })
        .collect()
}
