use thiserror::Error;

/// Which backend call an I/O failure belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    FetchTeachers,
    FetchCourses,
    UpdateTeacher(String),
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOperation::FetchTeachers => write!(f, "GET /teachers"),
            SyncOperation::FetchCourses => write!(f, "GET /courses"),
            SyncOperation::UpdateTeacher(id) => write!(f, "PUT /teachers/{}", id),
        }
    }
}

/// Coarse classification used to decide how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    MalformedPayload,
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Invalid column: carrying '{carried}', dropped on '{target}'")]
    InvalidColumn { carried: String, target: String },

    #[error("Column '{0}' is not a course column")]
    NotCourseColumn(String),

    #[error("Nothing to move: teacher '{teacher_id}' has no periods of '{course_id}'")]
    NothingToMove {
        teacher_id: String,
        course_id: String,
    },

    #[error("Exceeds capacity: teacher '{teacher_id}' would have {available} available periods")]
    ExceedsCapacity { teacher_id: String, available: i64 },

    #[error("No drag in progress")]
    NotCarrying,

    #[error("A reassignment is already being saved")]
    Busy,

    #[error("Unknown teacher '{0}'")]
    UnknownTeacher(String),

    #[error("Malformed drag payload: {0}")]
    MalformedPayload(String),

    #[error("{operation} failed: {message}")]
    Network {
        operation: SyncOperation,
        status: Option<u16>,
        message: String,
    },
}

impl GridError {
    pub fn network(operation: SyncOperation, message: impl Into<String>) -> Self {
        GridError::Network {
            operation,
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::Network { .. } => ErrorKind::Network,
            GridError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            _ => ErrorKind::Validation,
        }
    }

    /// One-line text shown to the user; never carries structured detail
    pub fn notice(&self) -> String {
        let text = match self.kind() {
            // an unreadable payload fails closed like a drop on the wrong column
            ErrorKind::MalformedPayload => "Invalid column",
            ErrorKind::Network => match self {
                GridError::Network {
                    operation: SyncOperation::UpdateTeacher(_),
                    ..
                } => "Failed to assign course",
                _ => "Failed to load data",
            },
            ErrorKind::Validation => match self {
                GridError::InvalidColumn { .. } => "Invalid column",
                GridError::NotCourseColumn(_) | GridError::NothingToMove { .. } => "Nothing to move",
                GridError::ExceedsCapacity { .. } => "Exceeds capacity",
                GridError::NotCarrying => "No course picked up",
                GridError::Busy => "Still saving the previous move",
                _ => "Teacher no longer exists",
            },
        };
        text.to_string()
    }
}

pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_payload_is_reported_like_invalid_column() {
        let err = GridError::MalformedPayload("expected value at line 1".into());
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
        assert_eq!(err.notice(), "Invalid column");
    }

    #[test]
    fn test_write_failure_notice_is_generic() {
        let err = GridError::Network {
            operation: SyncOperation::UpdateTeacher("t-1".into()),
            status: Some(500),
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.notice(), "Failed to assign course");
        assert!(err.to_string().contains("PUT /teachers/t-1"));
    }

    #[test]
    fn test_notice_follows_kind() {
        let read = GridError::network(SyncOperation::FetchTeachers, "connection refused");
        assert_eq!(read.kind(), ErrorKind::Network);
        assert_eq!(read.notice(), "Failed to load data");

        let wrong_column = GridError::InvalidColumn {
            carried: "C6-Math".into(),
            target: "C7-History".into(),
        };
        assert_eq!(wrong_column.kind(), ErrorKind::Validation);
        assert_eq!(wrong_column.notice(), "Invalid column");
        assert_eq!(GridError::Busy.kind(), ErrorKind::Validation);
        assert_eq!(GridError::UnknownTeacher("t-9".into()).notice(), "Teacher no longer exists");
    }
}
