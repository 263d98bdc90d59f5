use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayView1};

use crate::models::{CourseId, Interaction, SignalKind};

/// Column label of the interaction matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionColumn {
    pub course_id: CourseId,
    pub kind: SignalKind,
}

/// Dense student × (course, signal) indicator matrix
///
/// Rows are the distinct students with at least one interaction, in lexicographic
/// order. Columns are the (course, signal) pairs present in the data, ordered by
/// course id then signal. Cells are 1.0 when the interaction exists, 0.0 otherwise;
/// repeated events never push a cell above 1.0.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    students: Vec<String>,
    student_index: HashMap<String, usize>,
    columns: Vec<InteractionColumn>,
    values: Array2<f64>,
}

impl InteractionMatrix {
    pub fn build(interactions: &[Interaction]) -> Self {
        let students: Vec<String> = interactions
            .iter()
            .map(|i| i.student.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns: Vec<InteractionColumn> = interactions
            .iter()
            .map(|i| InteractionColumn {
                course_id: i.course_id,
                kind: i.kind,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let student_index: HashMap<String, usize> = students
            .iter()
            .enumerate()
            .map(|(row, student)| (student.clone(), row))
            .collect();

        let column_index: HashMap<InteractionColumn, usize> = columns
            .iter()
            .enumerate()
            .map(|(col, column)| (*column, col))
            .collect();

        let mut values = Array2::<f64>::zeros((students.len(), columns.len()));
        for interaction in interactions {
            let row = student_index[&interaction.student];
            let col = column_index[&InteractionColumn {
                course_id: interaction.course_id,
                kind: interaction.kind,
            }];
            values[[row, col]] = 1.0;
        }

        Self {
            students,
            student_index,
            columns,
            values,
        }
    }

    pub fn students(&self) -> &[String] {
        &self.students
    }

    pub fn columns(&self) -> &[InteractionColumn] {
        &self.columns
    }

    /// The student's row, if they have any interaction
    pub fn row(&self, student: &str) -> Option<ArrayView1<'_, f64>> {
        self.student_index
            .get(student)
            .map(|&row| self.values.row(row))
    }

    /// Courses with a nonzero entry in the student's row, collapsed across signals
    pub fn interacted_courses(&self, student: &str) -> Option<BTreeSet<CourseId>> {
        self.row(student).map(|row| {
            row.iter()
                .zip(&self.columns)
                .filter(|(value, _)| **value > 0.0)
                .map(|(_, column)| column.course_id)
                .collect()
        })
    }

    /// Collaborative feature vectors, one row per course in `courses` order
    ///
    /// A course's vector is its "enrolled" column followed by its "liked" column,
    /// so both signals count toward the same course. Courses with no interactions
    /// get an all-zero row; columns for courses not in `courses` are ignored.
    pub fn course_features(&self, courses: &[CourseId]) -> Array2<f64> {
        let student_count = self.students.len();
        let positions: HashMap<CourseId, usize> = courses
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let mut features =
            Array2::<f64>::zeros((courses.len(), SignalKind::ALL.len() * student_count));

        for (col, column) in self.columns.iter().enumerate() {
            let Some(&position) = positions.get(&column.course_id) else {
                continue;
            };
            let offset = column.kind.offset() * student_count;
            for (student, value) in self.values.column(col).iter().enumerate() {
                features[[position, offset + student]] = *value;
            }
        }

        features
    }
}
