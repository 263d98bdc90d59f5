use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CourseId;

/// A candidate course with its aggregated similarity score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoredCourse {
    pub course_id: CourseId,
    pub score: f64,
}

/// Whether the user had interaction history in the snapshot that served the request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    /// The user has at least one interaction; the list is ranked from it
    Ranked,
    /// The user has no interactions; the list is empty
    NoHistory,
}

/// Result of a recommendation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendations {
    pub user: String,
    pub status: HistoryStatus,
    pub snapshot_version: u64,
    pub recommendations: Vec<ScoredCourse>,
}

/// Summary of a published snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotInfo {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub course_count: usize,
    pub student_count: usize,
    pub interaction_columns: usize,
    pub embedding_model: String,
    pub blend_alpha: f64,
}
