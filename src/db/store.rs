use crate::{
    error::AppResult,
    models::{Course, Interaction},
};

/// Read-only access to the platform's course catalog and interaction relations
///
/// Only consulted while a snapshot is being built; recommendation requests never
/// touch storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CourseStore: Send + Sync {
    /// All courses with their descriptions
    async fn list_courses(&self) -> AppResult<Vec<Course>>;

    /// Every enrollment and like, one entry per signal
    async fn list_interactions(&self) -> AppResult<Vec<Interaction>>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}
