mod course;
mod recommendation;

pub use course::{Course, CourseId, Interaction, InteractionRow, SignalKind};
pub use recommendation::{HistoryStatus, Recommendations, ScoredCourse, SnapshotInfo};
