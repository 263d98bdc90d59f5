use serde::{Deserialize, Serialize};

/// Stable integer identifier of a course
pub type CourseId = i64;

/// A course as seen by the recommender: its id and the text its content vector is built from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Course {
    pub id: CourseId,
    pub description: String,
}

impl Course {
    pub fn new(id: CourseId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// Kind of signal linking a student to a course
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Enrolled,
    Liked,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [SignalKind::Enrolled, SignalKind::Liked];

    /// Position of this signal inside a course's collaborative feature vector
    pub fn offset(self) -> usize {
        match self {
            SignalKind::Enrolled => 0,
            SignalKind::Liked => 1,
        }
    }
}

/// One recorded enrollment or like
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Interaction {
    pub student: String,
    pub course_id: CourseId,
    pub kind: SignalKind,
}

impl Interaction {
    pub fn new(student: impl Into<String>, course_id: CourseId, kind: SignalKind) -> Self {
        Self {
            student: student.into(),
            course_id,
            kind,
        }
    }

    pub fn enrolled(student: impl Into<String>, course_id: CourseId) -> Self {
        Self::new(student, course_id, SignalKind::Enrolled)
    }

    pub fn liked(student: impl Into<String>, course_id: CourseId) -> Self {
        Self::new(student, course_id, SignalKind::Liked)
    }
}

/// Interaction row as read from storage, with the signal split into 0/1 indicator columns
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InteractionRow {
    pub student: String,
    pub course_id: CourseId,
    pub enrolled: i32,
    pub liked: i32,
}

impl InteractionRow {
    /// Decomposes the indicator columns into one interaction per set signal
    pub fn into_interactions(self) -> Vec<Interaction> {
        let mut interactions = Vec::with_capacity(2);
        if self.enrolled != 0 {
            interactions.push(Interaction::enrolled(self.student.clone(), self.course_id));
        }
        if self.liked != 0 {
            interactions.push(Interaction::liked(self.student, self.course_id));
        }
        interactions
    }
}
