//! Drag-and-drop reassignment of a course between two teacher rows
//!
//! ```text
//!   Idle ──begin_drag──▶ Carrying ──drop_on──▶ Persisting ──finish──▶ Idle
//!     ▲                     │  (invalid drop / cancel)
//!     └─────────────────────┘
//! ```
//!
//! The carried payload is a single slot owned by the coordinator. A valid drop
//! stages the moved records in the [`ScheduleStore`] as a shadow snapshot and
//! hands back a [`PersistJob`]; the outcome of that job either commits or rolls
//! back the shadow.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::records::Teacher;
use crate::data::row_model::DisplayCell;
use crate::data::store::{ScheduleStore, Snapshot};
use crate::error::{GridError, GridResult};

/// What travels with the pointer: the source row as it was when the drag began
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarriedPayload {
    pub source: Teacher,
    #[serde(rename = "courseId")]
    pub course_id: String,
}

impl CarriedPayload {
    /// JSON form for a text transfer channel
    pub fn encode(&self) -> GridResult<String> {
        serde_json::to_string(self).map_err(|e| GridError::MalformedPayload(e.to_string()))
    }

    pub fn decode(text: &str) -> GridResult<Self> {
        serde_json::from_str(text).map_err(|e| GridError::MalformedPayload(e.to_string()))
    }
}

/// The computed effect of one valid drop
#[derive(Debug, Clone, PartialEq)]
pub struct Reassignment {
    pub course_id: String,
    pub moved_periods: i64,
    pub source: Teacher,
    pub target: Teacher,
}

impl Reassignment {
    pub fn is_same_teacher(&self) -> bool {
        self.source.id == self.target.id
    }

    /// Records to stage locally; a same-row drop touches a single record
    pub fn updated_records(&self) -> Vec<Teacher> {
        if self.is_same_teacher() {
            vec![self.target.clone()]
        } else {
            vec![self.source.clone(), self.target.clone()]
        }
    }

    /// Backend writes in issue order: source first, then target
    pub fn writes(&self) -> Vec<Teacher> {
        vec![self.source.clone(), self.target.clone()]
    }
}

/// Move every assignment of the carried course from the payload's source onto `target`.
///
/// The target keeps at most one assignment per course: if it already covers the
/// course, the moved periods are added to that assignment.
pub fn plan_reassignment(
    payload: &CarriedPayload,
    target: &Teacher,
    drop_column: &str,
    enforce_capacity: bool,
) -> GridResult<Reassignment> {
    if drop_column != payload.course_id {
        return Err(GridError::InvalidColumn {
            carried: payload.course_id.clone(),
            target: drop_column.to_string(),
        });
    }

    let (assignable, remaining): (Vec<_>, Vec<_>) = payload
        .source
        .courses
        .iter()
        .cloned()
        .partition(|a| a.course_id() == payload.course_id);

    if assignable.is_empty() {
        return Err(GridError::NothingToMove {
            teacher_id: payload.source.id.clone(),
            course_id: payload.course_id.clone(),
        });
    }
    let moved_periods = assignable.iter().map(|a| a.periods).sum();

    let mut source = payload.source.clone();
    source.courses = remaining;

    let mut updated_target = if target.id == source.id {
        source.clone()
    } else {
        target.clone()
    };
    for moved in assignable {
        match updated_target
            .courses
            .iter_mut()
            .find(|a| a.course_id() == moved.course_id())
        {
            Some(existing) => existing.periods += moved.periods,
            None => updated_target.courses.push(moved),
        }
    }

    if target.id == source.id {
        source = updated_target.clone();
    } else if enforce_capacity && updated_target.available_periods() < 0 {
        return Err(GridError::ExceedsCapacity {
            teacher_id: updated_target.id.clone(),
            available: updated_target.available_periods(),
        });
    }

    Ok(Reassignment {
        course_id: payload.course_id.clone(),
        moved_periods,
        source,
        target: updated_target,
    })
}

/// Backend work for one staged reassignment
#[derive(Debug, Clone, PartialEq)]
pub struct PersistJob {
    pub change_id: u64,
    pub course_id: String,
    pub writes: Vec<Teacher>,
}

/// Result of running a [`PersistJob`]; every write is attempted
#[derive(Debug)]
pub struct PersistOutcome {
    pub change_id: u64,
    /// Writes the backend accepted
    pub applied: usize,
    pub failures: Vec<GridError>,
}

impl PersistOutcome {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Some writes landed and some did not; the backend now differs from both snapshots
    pub fn is_partial(&self) -> bool {
        self.applied > 0 && !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Carrying(CarriedPayload),
    Persisting { change_id: u64, course_id: String },
}

#[derive(Debug)]
pub struct DragDropCoordinator {
    state: DragState,
    enforce_capacity: bool,
}

impl Default for DragDropCoordinator {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DragDropCoordinator {
    pub fn new(enforce_capacity: bool) -> Self {
        Self {
            state: DragState::Idle,
            enforce_capacity,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    pub fn carried(&self) -> Option<&CarriedPayload> {
        match &self.state {
            DragState::Carrying(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_persisting(&self) -> bool {
        matches!(self.state, DragState::Persisting { .. })
    }

    /// Pick up the course under `cell` from `source`
    pub fn begin_drag(&mut self, source: &Teacher, cell: &DisplayCell) -> GridResult<&CarriedPayload> {
        if self.is_persisting() {
            return Err(GridError::Busy);
        }
        if cell.course.is_none() {
            return Err(GridError::NotCourseColumn(cell.column_id.clone()));
        }
        if cell.value.is_zero() {
            return Err(GridError::NothingToMove {
                teacher_id: source.id.clone(),
                course_id: cell.column_id.clone(),
            });
        }

        debug!(target: "dragdrop", "picked up '{}' from '{}'", cell.column_id, source.id);
        self.state = DragState::Carrying(CarriedPayload {
            source: source.clone(),
            course_id: cell.column_id.clone(),
        });
        match &self.state {
            DragState::Carrying(payload) => Ok(payload),
            _ => Err(GridError::NotCarrying),
        }
    }

    /// Drag ended without a drop
    pub fn cancel(&mut self) {
        if let DragState::Carrying(payload) = &self.state {
            debug!(target: "dragdrop", "dropped '{}' nowhere", payload.course_id);
            self.state = DragState::Idle;
        }
    }

    /// Drop the carried course on `column_id` of teacher `target_id`.
    ///
    /// The slot is cleared whatever happens. On success the moved records are
    /// staged in `store` and the writes to perform are returned.
    pub fn drop_on(
        &mut self,
        store: &mut ScheduleStore,
        target_id: &str,
        column_id: &str,
    ) -> GridResult<PersistJob> {
        let payload = match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Carrying(payload) => payload,
            other => {
                self.state = other;
                return Err(GridError::NotCarrying);
            }
        };
        self.stage_drop(store, payload, target_id, column_id)
    }

    /// Drop using a payload that arrived as text; undecodable payloads are rejected
    pub fn drop_transfer(
        &mut self,
        store: &mut ScheduleStore,
        transfer: &str,
        target_id: &str,
        column_id: &str,
    ) -> GridResult<PersistJob> {
        if self.is_persisting() {
            return Err(GridError::Busy);
        }
        self.state = DragState::Idle;
        let payload = CarriedPayload::decode(transfer).inspect_err(|e| {
            warn!(target: "dragdrop", "rejected drop: {}", e);
        })?;
        self.stage_drop(store, payload, target_id, column_id)
    }

    fn stage_drop(
        &mut self,
        store: &mut ScheduleStore,
        payload: CarriedPayload,
        target_id: &str,
        column_id: &str,
    ) -> GridResult<PersistJob> {
        let snapshot = store.current();
        let target = snapshot
            .teacher(target_id)
            .ok_or_else(|| GridError::UnknownTeacher(target_id.to_string()))?;

        let plan = plan_reassignment(&payload, target, column_id, self.enforce_capacity)
            .inspect_err(|e| warn!(target: "dragdrop", "rejected drop: {}", e))?;

        let (change_id, _) = store.stage(plan.updated_records())?;
        info!(
            target: "dragdrop",
            "moving {} periods of '{}' from '{}' to '{}' (change #{})",
            plan.moved_periods, plan.course_id, plan.source.id, plan.target.id, change_id
        );

        self.state = DragState::Persisting {
            change_id,
            course_id: plan.course_id.clone(),
        };
        Ok(PersistJob {
            change_id,
            course_id: plan.course_id.clone(),
            writes: plan.writes(),
        })
    }

    /// Apply the backend outcome: commit on joint success, roll back otherwise.
    /// Always returns to idle.
    pub fn finish(
        &mut self,
        store: &mut ScheduleStore,
        outcome: PersistOutcome,
    ) -> GridResult<Arc<Snapshot>> {
        if let DragState::Persisting { change_id, .. } = self.state {
            if change_id == outcome.change_id {
                self.state = DragState::Idle;
            }
        }

        let mut failures = outcome.failures.into_iter();
        match failures.next() {
            None => store
                .commit(outcome.change_id)
                .ok_or(GridError::NotCarrying),
            Some(first) => {
                for extra in failures {
                    warn!(target: "dragdrop", "additional write failure: {}", extra);
                }
                store.rollback(outcome.change_id);
                Err(first)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cell_value::CellValue;
    use crate::data::columns::CourseColumnMeta;
    use crate::data::records::fixtures::{assignment, teacher};
    use crate::data::records::CourseGroup;
    use crate::error::SyncOperation;

    fn course_cell(id: &str, periods: i64) -> DisplayCell {
        DisplayCell {
            column_id: id.to_string(),
            value: CellValue::Integer(periods),
            course: Some(CourseColumnMeta {
                group: CourseGroup::C6,
                color: CourseGroup::C6.color(),
            }),
        }
    }

    fn store() -> ScheduleStore {
        ScheduleStore::with_data(
            vec![
                teacher(
                    "A",
                    None,
                    vec![
                        assignment("C6-Math", CourseGroup::C6, 4),
                        assignment("C7-History", CourseGroup::C7, 3),
                    ],
                ),
                teacher("B", None, vec![assignment("C8-Art", CourseGroup::C8, 2)]),
            ],
            vec![],
        )
    }

    fn pick_up(coord: &mut DragDropCoordinator, store: &ScheduleStore, from: &str, course: &str) {
        let snap = store.current();
        let source = snap.teacher(from).unwrap();
        let cell = course_cell(course, source.periods_of(course));
        coord.begin_drag(source, &cell).unwrap();
    }

    #[test]
    fn test_zero_and_non_course_cells_are_not_draggable() {
        let store = store();
        let snap = store.current();
        let b = snap.teacher("B").unwrap();
        let mut coord = DragDropCoordinator::default();

        assert!(matches!(
            coord.begin_drag(b, &course_cell("C6-Math", 0)),
            Err(GridError::NothingToMove { .. })
        ));
        let name_cell = DisplayCell {
            column_id: "name".into(),
            value: CellValue::from("Teacher B"),
            course: None,
        };
        assert!(matches!(
            coord.begin_drag(b, &name_cell),
            Err(GridError::NotCourseColumn(_))
        ));
        assert!(coord.is_idle());
    }

    #[test]
    fn test_cross_column_drop_never_mutates() {
        let mut store = store();
        let before = store.current();
        let mut coord = DragDropCoordinator::default();
        pick_up(&mut coord, &store, "A", "C6-Math");

        let err = coord.drop_on(&mut store, "B", "C7-History").unwrap_err();
        assert_eq!(err.notice(), "Invalid column");
        assert!(coord.is_idle());
        assert!(!store.has_pending());
        assert_eq!(store.current().teachers, before.teachers);
    }

    #[test]
    fn test_valid_drop_moves_exactly_one_assignment() {
        let mut store = store();
        let mut coord = DragDropCoordinator::default();
        pick_up(&mut coord, &store, "A", "C6-Math");

        let job = coord.drop_on(&mut store, "B", "C6-Math").unwrap();
        assert!(coord.is_persisting());
        assert_eq!(job.writes[0].id, "A");
        assert_eq!(job.writes[1].id, "B");

        let shadow = store.current();
        let a = shadow.teacher("A").unwrap();
        let b = shadow.teacher("B").unwrap();
        assert!(a.assignment("C6-Math").is_none());
        assert_eq!(a.periods_of("C7-History"), 3);
        assert_eq!(b.periods_of("C6-Math"), 4);
        assert_eq!(b.periods_of("C8-Art"), 2);
        assert_eq!(b.courses.len(), 2);

        // confirmed state untouched until the backend agrees
        assert_eq!(store.confirmed().teacher("A").unwrap().periods_of("C6-Math"), 4);

        let confirmed = coord
            .finish(&mut store, PersistOutcome { change_id: job.change_id, applied: 2, failures: vec![] })
            .unwrap();
        assert_eq!(confirmed.teacher("B").unwrap().periods_of("C6-Math"), 4);
        assert!(coord.is_idle());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = store();
        let before = store.confirmed();
        let mut coord = DragDropCoordinator::default();
        pick_up(&mut coord, &store, "A", "C6-Math");
        let job = coord.drop_on(&mut store, "B", "C6-Math").unwrap();

        let err = coord
            .finish(
                &mut store,
                PersistOutcome {
                    change_id: job.change_id,
                    applied: 1,
                    failures: vec![GridError::network(
                        SyncOperation::UpdateTeacher("B".into()),
                        "connection refused",
                    )],
                },
            )
            .unwrap_err();
        assert_eq!(err.notice(), "Failed to assign course");
        assert!(coord.is_idle());
        assert_eq!(store.current().teachers, before.teachers);
    }

    #[test]
    fn test_target_already_holding_course_is_merged() {
        let payload = CarriedPayload {
            source: teacher("A", None, vec![assignment("C6-Math", CourseGroup::C6, 4)]),
            course_id: "C6-Math".into(),
        };
        let target = teacher("B", None, vec![assignment("C6-Math", CourseGroup::C6, 2)]);
        let plan = plan_reassignment(&payload, &target, "C6-Math", false).unwrap();
        assert_eq!(plan.target.courses.len(), 1);
        assert_eq!(plan.target.periods_of("C6-Math"), 6);
    }

    #[test]
    fn test_same_cell_drop_is_idempotent_but_still_writes() {
        let payload = CarriedPayload {
            source: teacher(
                "A",
                None,
                vec![
                    assignment("C6-Math", CourseGroup::C6, 4),
                    assignment("C7-History", CourseGroup::C7, 3),
                ],
            ),
            course_id: "C6-Math".into(),
        };
        let plan = plan_reassignment(&payload, &payload.source, "C6-Math", false).unwrap();
        assert!(plan.is_same_teacher());
        assert_eq!(plan.target.periods_of("C6-Math"), 4);
        assert_eq!(plan.target.periods_of("C7-History"), 3);
        assert_eq!(plan.updated_records().len(), 1);
        assert_eq!(plan.writes().len(), 2);
    }

    #[test]
    fn test_capacity_is_only_enforced_when_enabled() {
        let payload = CarriedPayload {
            source: teacher("A", None, vec![assignment("C6-Math", CourseGroup::C6, 4)]),
            course_id: "C6-Math".into(),
        };
        let target = teacher("B", None, vec![assignment("C8-Art", CourseGroup::C8, 16)]);

        let advisory = plan_reassignment(&payload, &target, "C6-Math", false).unwrap();
        assert_eq!(advisory.target.available_periods(), -2);

        let err = plan_reassignment(&payload, &target, "C6-Math", true).unwrap_err();
        assert!(matches!(err, GridError::ExceedsCapacity { available: -2, .. }));
    }

    #[test]
    fn test_malformed_transfer_fails_closed() {
        let mut store = store();
        let before = store.current();
        let mut coord = DragDropCoordinator::default();

        let err = coord
            .drop_transfer(&mut store, "{not json", "B", "C6-Math")
            .unwrap_err();
        assert!(matches!(err, GridError::MalformedPayload(_)));
        assert_eq!(store.current().teachers, before.teachers);
        assert!(coord.is_idle());
    }

    #[test]
    fn test_transfer_payload_uses_course_id_key() {
        let payload = CarriedPayload {
            source: teacher("A", None, vec![assignment("C6-Math", CourseGroup::C6, 4)]),
            course_id: "C6-Math".into(),
        };
        let text = payload.encode().unwrap();
        assert!(text.contains("\"courseId\":\"C6-Math\""));

        let mut store = store();
        let mut coord = DragDropCoordinator::default();
        let job = coord.drop_transfer(&mut store, &text, "B", "C6-Math").unwrap();
        assert_eq!(job.writes.len(), 2);
    }

    #[test]
    fn test_new_drag_is_refused_while_saving() {
        let mut store = store();
        let mut coord = DragDropCoordinator::default();
        pick_up(&mut coord, &store, "A", "C6-Math");
        coord.drop_on(&mut store, "B", "C6-Math").unwrap();

        let snap = store.current();
        let b = snap.teacher("B").unwrap();
        assert!(matches!(
            coord.begin_drag(b, &course_cell("C8-Art", 2)),
            Err(GridError::Busy)
        ));
    }
}
