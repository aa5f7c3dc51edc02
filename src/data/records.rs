//! Teacher and course records as served by the backend
//!
//! Field names follow the wire format (`maxLoad`, `otherRoles`, `courses`), and an
//! assignment is the full course record flattened together with its `periods`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Division {
    MS,
    HS,
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Division::MS => write!(f, "MS"),
            Division::HS => write!(f, "HS"),
        }
    }
}

/// Classification of a course, drives both cell colour and bulk show/hide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CourseGroup {
    C6,
    C7,
    C8,
    C9,
    C10,
    HL1,
    HL2,
    Other,
}

impl CourseGroup {
    /// Background colour of the group's course cells as RGB
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            CourseGroup::C6 => (0xF0, 0xDD, 0x86),
            CourseGroup::C7 => (0xA7, 0xD8, 0x83),
            CourseGroup::C8 => (0xF4, 0xC0, 0xDB),
            CourseGroup::C9 => (0xFE, 0xF0, 0x09),
            CourseGroup::C10 => (0x58, 0xA1, 0x68),
            CourseGroup::HL1 => (0x48, 0x82, 0xE1),
            CourseGroup::HL2 => (0x00, 0xAA, 0x00),
            CourseGroup::Other => (0x4D, 0x9B, 0xF7),
        }
    }

    pub fn hex(&self) -> String {
        let (r, g, b) = self.color();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CourseGroup::C6 => "C6",
            CourseGroup::C7 => "C7",
            CourseGroup::C8 => "C8",
            CourseGroup::C9 => "C9",
            CourseGroup::C10 => "C10",
            CourseGroup::HL1 => "HL1",
            CourseGroup::HL2 => "HL2",
            CourseGroup::Other => "Other",
        }
    }
}

impl fmt::Display for CourseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub total_students: Option<f64>,
    #[serde(default)]
    pub total_sections: Option<f64>,
    #[serde(default)]
    pub total_periods: Option<f64>,
    #[serde(default)]
    pub periods_per_cycle: Option<f64>,
    #[serde(default)]
    pub students_per_section: Option<f64>,
    pub group: CourseGroup,
}

/// A course held by a teacher together with how many of its periods they cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(flatten)]
    pub course: Course,
    pub periods: i64,
}

impl Assignment {
    pub fn course_id(&self) -> &str {
        &self.course.id
    }

    /// Students taught through this assignment; zero unless the course carries
    /// both `periods_per_cycle` and `students_per_section`
    pub fn students(&self) -> f64 {
        match (self.course.periods_per_cycle, self.course.students_per_section) {
            (Some(per_cycle), Some(per_section)) if per_cycle != 0.0 && per_section != 0.0 => {
                (self.periods as f64 / per_cycle) * per_section
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub division: Option<Division>,
    #[serde(rename = "otherRoles", default)]
    pub other_roles: Vec<String>,
    #[serde(rename = "maxLoad")]
    pub max_load: i64,
    #[serde(default)]
    pub courses: Vec<Assignment>,
}

impl Teacher {
    pub fn assigned_periods(&self) -> i64 {
        self.courses.iter().map(|a| a.periods).sum()
    }

    /// Capacity left over; negative when over-assigned
    pub fn available_periods(&self) -> i64 {
        self.max_load - self.assigned_periods()
    }

    pub fn preps(&self) -> usize {
        self.courses.len()
    }

    pub fn students(&self) -> f64 {
        self.courses.iter().map(Assignment::students).sum()
    }

    pub fn assignment(&self, course_id: &str) -> Option<&Assignment> {
        self.courses.iter().find(|a| a.course_id() == course_id)
    }

    pub fn periods_of(&self, course_id: &str) -> i64 {
        self.assignment(course_id).map(|a| a.periods).unwrap_or(0)
    }

    pub fn roles_label(&self) -> String {
        if self.other_roles.is_empty() {
            "-".to_string()
        } else {
            self.other_roles.join(" + ")
        }
    }
}

/// Which division panel a teacher belongs in; teachers without a division land in MS
pub fn in_division(teacher: &Teacher, division: Division) -> bool {
    match division {
        Division::MS => matches!(teacher.division, Some(Division::MS) | None),
        Division::HS => teacher.division == Some(Division::HS),
    }
}
