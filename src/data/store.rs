//! Single owner of the teacher and course collections
//!
//! Readers get immutable `Arc<Snapshot>`s. A reassignment is staged as a shadow
//! snapshot and only becomes the confirmed state after the backend accepted both
//! writes; on failure the shadow is dropped and the confirmed state is untouched.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::records::{Course, Teacher};
use crate::error::{GridError, GridResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub teachers: Vec<Teacher>,
    pub courses: Vec<Course>,
    pub version: u64,
}

impl Snapshot {
    pub fn teacher(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    /// Copy of this snapshot with `updated` records replacing those with the same id
    fn with_teachers(&self, updated: &[Teacher], version: u64) -> Snapshot {
        let teachers = self
            .teachers
            .iter()
            .map(|t| {
                updated
                    .iter()
                    .find(|u| u.id == t.id)
                    .cloned()
                    .unwrap_or_else(|| t.clone())
            })
            .collect();
        Snapshot {
            teachers,
            courses: self.courses.clone(),
            version,
        }
    }
}

#[derive(Debug)]
struct PendingChange {
    id: u64,
    updated: Vec<Teacher>,
    shadow: Arc<Snapshot>,
}

#[derive(Debug, Default)]
pub struct ScheduleStore {
    confirmed: Arc<Snapshot>,
    pending: Option<PendingChange>,
    next_version: u64,
    next_change: u64,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(teachers: Vec<Teacher>, courses: Vec<Course>) -> Self {
        let mut store = Self::new();
        store.replace_courses(courses);
        store.replace_teachers(teachers);
        store
    }

    /// Last state the backend confirmed
    pub fn confirmed(&self) -> Arc<Snapshot> {
        Arc::clone(&self.confirmed)
    }

    /// What the grid renders: the staged shadow while a write is in flight,
    /// otherwise the confirmed state
    pub fn current(&self) -> Arc<Snapshot> {
        match &self.pending {
            Some(pending) => Arc::clone(&pending.shadow),
            None => self.confirmed(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Wholesale load from the backend
    pub fn replace_teachers(&mut self, teachers: Vec<Teacher>) -> Arc<Snapshot> {
        let version = self.bump_version();
        self.confirmed = Arc::new(Snapshot {
            teachers,
            courses: self.confirmed.courses.clone(),
            version,
        });
        self.rebase_pending();
        info!(target: "store", "loaded {} teachers (v{})", self.confirmed.teachers.len(), version);
        self.current()
    }

    pub fn replace_courses(&mut self, courses: Vec<Course>) -> Arc<Snapshot> {
        let version = self.bump_version();
        self.confirmed = Arc::new(Snapshot {
            teachers: self.confirmed.teachers.clone(),
            courses,
            version,
        });
        self.rebase_pending();
        info!(target: "store", "loaded {} courses (v{})", self.confirmed.courses.len(), version);
        self.current()
    }

    /// A reload while a write is in flight keeps the staged records on top
    fn rebase_pending(&mut self) {
        let version = self.next_version;
        if let Some(pending) = &mut self.pending {
            pending.shadow = Arc::new(self.confirmed.with_teachers(&pending.updated, version));
        }
    }

    /// Stage updated records as a shadow snapshot. Only one change may be staged.
    pub fn stage(&mut self, updated: Vec<Teacher>) -> GridResult<(u64, Arc<Snapshot>)> {
        if self.pending.is_some() {
            return Err(GridError::Busy);
        }
        for record in &updated {
            if self.confirmed.teacher(&record.id).is_none() {
                return Err(GridError::UnknownTeacher(record.id.clone()));
            }
        }

        self.next_change += 1;
        let id = self.next_change;
        let version = self.bump_version();
        let shadow = Arc::new(self.confirmed.with_teachers(&updated, version));
        debug!(target: "store", "staged change #{} touching {} teachers", id, updated.len());

        self.pending = Some(PendingChange {
            id,
            updated,
            shadow: Arc::clone(&shadow),
        });
        Ok((id, shadow))
    }

    /// Publish the staged change as confirmed. Unknown or stale ids are ignored.
    pub fn commit(&mut self, change_id: u64) -> Option<Arc<Snapshot>> {
        match self.pending.take() {
            Some(pending) if pending.id == change_id => {
                let version = self.bump_version();
                self.confirmed = Arc::new(self.confirmed.with_teachers(&pending.updated, version));
                info!(target: "store", "committed change #{} (v{})", change_id, version);
                Some(self.confirmed())
            }
            other => {
                warn!(target: "store", "commit for unknown change #{}", change_id);
                self.pending = other;
                None
            }
        }
    }

    /// Drop the staged change; the confirmed state is what the grid shows again
    pub fn rollback(&mut self, change_id: u64) -> Option<Arc<Snapshot>> {
        match self.pending.take() {
            Some(pending) if pending.id == change_id => {
                warn!(target: "store", "rolled back change #{}", change_id);
                Some(self.confirmed())
            }
            other => {
                self.pending = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::fixtures::{assignment, teacher};
    use crate::data::records::CourseGroup;

    fn store() -> ScheduleStore {
        ScheduleStore::with_data(
            vec![
                teacher("a", None, vec![assignment("C6-Math", CourseGroup::C6, 4)]),
                teacher("b", None, vec![]),
            ],
            vec![],
        )
    }

    #[test]
    fn test_stage_shows_shadow_until_commit() {
        let mut store = store();
        let mut moved = store.confirmed().teacher("a").unwrap().clone();
        moved.courses.clear();

        let (id, shadow) = store.stage(vec![moved]).unwrap();
        assert!(shadow.teacher("a").unwrap().courses.is_empty());
        assert_eq!(store.confirmed().teacher("a").unwrap().courses.len(), 1);
        assert!(store.current().teacher("a").unwrap().courses.is_empty());

        let confirmed = store.commit(id).unwrap();
        assert!(confirmed.teacher("a").unwrap().courses.is_empty());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_rollback_restores_confirmed_state() {
        let mut store = store();
        let before = store.confirmed();
        let mut moved = before.teacher("a").unwrap().clone();
        moved.courses.clear();

        let (id, _) = store.stage(vec![moved]).unwrap();
        let after = store.rollback(id).unwrap();
        assert_eq!(after.teachers, before.teachers);
        assert_eq!(store.current().teachers, before.teachers);
    }

    #[test]
    fn test_only_one_change_may_be_staged() {
        let mut store = store();
        let a = store.confirmed().teacher("a").unwrap().clone();
        store.stage(vec![a.clone()]).unwrap();
        assert!(matches!(store.stage(vec![a]), Err(GridError::Busy)));
    }

    #[test]
    fn test_stale_commit_is_ignored() {
        let mut store = store();
        let a = store.confirmed().teacher("a").unwrap().clone();
        let (id, _) = store.stage(vec![a]).unwrap();
        assert!(store.commit(id + 1).is_none());
        assert!(store.has_pending());
    }

    #[test]
    fn test_reload_during_pending_keeps_staged_records() {
        let mut store = store();
        let mut moved = store.confirmed().teacher("a").unwrap().clone();
        moved.courses.clear();
        let (id, _) = store.stage(vec![moved]).unwrap();

        let mut reloaded = store.confirmed().teachers.clone();
        reloaded.push(teacher("c", None, vec![]));
        store.replace_teachers(reloaded);

        let current = store.current();
        assert_eq!(current.teachers.len(), 3);
        assert!(current.teacher("a").unwrap().courses.is_empty());
        assert_eq!(store.confirmed().teacher("a").unwrap().courses.len(), 1);
        assert!(store.rollback(id).is_some());
    }
}
