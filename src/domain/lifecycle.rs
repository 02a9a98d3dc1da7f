use crate::error::CatalogError;
use crate::models::{Course, CourseStatus, VariantDetails};

/// Check that `course` may move to `target`.
///
/// Any status may move to `Available`, `Unavailable` or `Archived`; only the
/// move to `Available` is guarded by content readiness. Nothing moves back to
/// `Draft`.
pub fn check_transition(course: &Course, target: CourseStatus) -> Result<(), CatalogError> {
    if target == CourseStatus::Draft && course.status != CourseStatus::Draft {
        return Err(CatalogError::Validation(format!(
            "course cannot return to draft from {}",
            course.status
        )));
    }
    if target == CourseStatus::Available {
        check_publish_ready(course)?;
    }
    Ok(())
}

/// Mandatory content for a publicly available course.
pub fn check_publish_ready(course: &Course) -> Result<(), CatalogError> {
    if course.core.description.trim().is_empty() {
        return Err(CatalogError::PublishGuard("description is required".to_string()));
    }

    match &course.details {
        VariantDetails::Online(_) if course.core.outline.is_empty() => Err(
            CatalogError::PublishGuard("at least one outline section is required".to_string()),
        ),
        VariantDetails::Offline(d) if d.batches.is_empty() => Err(CatalogError::PublishGuard(
            "at least one batch is required".to_string(),
        )),
        VariantDetails::Free(d) if d.modules.is_empty() => Err(CatalogError::PublishGuard(
            "at least one module is required".to_string(),
        )),
        _ => Ok(()),
    }
}
