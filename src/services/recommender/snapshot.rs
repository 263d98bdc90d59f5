use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::Array2;

use crate::{
    error::{AppError, AppResult},
    models::{
        Course, CourseId, HistoryStatus, Interaction, Recommendations, ScoredCourse, SnapshotInfo,
    },
    services::embedding::{Embedding, TextEmbedder},
};

use super::{
    blend::{blend, BlendWeight},
    interactions::InteractionMatrix,
    similarity::{cosine_similarity_matrix, embeddings_to_matrix},
};

/// Immutable, point-in-time bundle of everything needed to serve recommendations
///
/// Built once from a storage read and never mutated afterwards; a rebuild
/// produces a new snapshot that replaces this one wholesale.
#[derive(Debug)]
pub struct RecommenderSnapshot {
    version: u64,
    built_at: DateTime<Utc>,
    embedding_model: String,
    weight: BlendWeight,
    course_ids: Vec<CourseId>,
    course_index: HashMap<CourseId, usize>,
    interactions: InteractionMatrix,
    collaborative: Array2<f64>,
    content: Array2<f64>,
    blended: Array2<f64>,
}

/// Embeds the corpus and assembles a snapshot from it
///
/// The corpus is put in ascending course-id order (duplicates dropped) before
/// embedding, so vectors, matrices and ids all share that ordering.
pub async fn build_snapshot(
    version: u64,
    corpus: Vec<Course>,
    interactions: Vec<Interaction>,
    embedder: &dyn TextEmbedder,
    weight: BlendWeight,
) -> AppResult<RecommenderSnapshot> {
    let start = Instant::now();
    let courses = normalize_corpus(corpus);

    let descriptions: Vec<String> = courses.iter().map(|c| c.description.clone()).collect();
    let embeddings = embedder.embed(&descriptions).await?;

    let snapshot = RecommenderSnapshot::from_parts(
        version,
        &courses,
        &embeddings,
        interactions,
        weight,
        embedder.model_name(),
    )?;

    tracing::info!(
        version,
        course_count = snapshot.course_ids.len(),
        student_count = snapshot.interactions.students().len(),
        interaction_columns = snapshot.interactions.columns().len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Recommender snapshot built"
    );

    Ok(snapshot)
}

/// Sorts by id and keeps the first record of each id
fn normalize_corpus(mut corpus: Vec<Course>) -> Vec<Course> {
    corpus.sort_by_key(|c| c.id);
    let before = corpus.len();
    corpus.dedup_by_key(|c| c.id);

    if corpus.len() != before {
        tracing::warn!(
            dropped = before - corpus.len(),
            "Duplicate course ids in corpus, keeping the first record of each"
        );
    }

    corpus
}

impl RecommenderSnapshot {
    /// Assembles a snapshot from already-embedded courses
    ///
    /// `courses` and `embeddings` must be aligned and `courses` sorted by id with
    /// unique ids. Interactions with courses outside the corpus are dropped.
    pub fn from_parts(
        version: u64,
        courses: &[Course],
        embeddings: &[Embedding],
        interactions: Vec<Interaction>,
        weight: BlendWeight,
        embedding_model: &str,
    ) -> AppResult<Self> {
        if courses.len() != embeddings.len() {
            return Err(AppError::Embedding(format!(
                "Got {} embeddings for {} courses",
                embeddings.len(),
                courses.len()
            )));
        }

        let course_ids: Vec<CourseId> = courses.iter().map(|c| c.id).collect();
        if course_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(AppError::Internal(
                "Snapshot courses must be sorted by unique id".to_string(),
            ));
        }

        let course_index: HashMap<CourseId, usize> = course_ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let total = interactions.len();
        let known: Vec<Interaction> = interactions
            .into_iter()
            .filter(|i| course_index.contains_key(&i.course_id))
            .collect();
        if known.len() != total {
            tracing::warn!(
                dropped = total - known.len(),
                known_courses = course_ids.len(),
                "Dropping interactions with courses missing from the corpus"
            );
        }

        let interactions = InteractionMatrix::build(&known);

        let collaborative =
            cosine_similarity_matrix(interactions.course_features(&course_ids).view());
        let content = cosine_similarity_matrix(embeddings_to_matrix(embeddings)?.view());
        let blended = blend(&collaborative, &content, weight)?;

        let degenerate = embeddings.iter().filter(|e| e.is_degenerate()).count();
        if degenerate > 0 {
            tracing::warn!(
                count = degenerate,
                "Courses with empty descriptions have zero content similarity"
            );
        }

        Ok(Self {
            version,
            built_at: Utc::now(),
            embedding_model: embedding_model.to_string(),
            weight,
            course_ids,
            course_index,
            interactions,
            collaborative,
            content,
            blended,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn course_ids(&self) -> &[CourseId] {
        &self.course_ids
    }

    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }

    pub fn collaborative(&self) -> &Array2<f64> {
        &self.collaborative
    }

    pub fn content(&self) -> &Array2<f64> {
        &self.content
    }

    pub fn blended(&self) -> &Array2<f64> {
        &self.blended
    }

    /// Blended similarity between two courses, if both are in the snapshot
    pub fn similarity(&self, a: CourseId, b: CourseId) -> Option<f64> {
        let i = *self.course_index.get(&a)?;
        let j = *self.course_index.get(&b)?;
        Some(self.blended[[i, j]])
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            version: self.version,
            built_at: self.built_at,
            course_count: self.course_ids.len(),
            student_count: self.interactions.students().len(),
            interaction_columns: self.interactions.columns().len(),
            embedding_model: self.embedding_model.clone(),
            blend_alpha: self.weight.alpha(),
        }
    }

    /// Ranks unseen courses for `user` by summed blended similarity
    ///
    /// Each candidate scores the sum of its blended similarity to every course
    /// the user interacted with. Interacted courses are never returned. Results
    /// are ordered by score descending, then course id ascending, and truncated
    /// to `num_recommendations`. A user without interactions gets
    /// `HistoryStatus::NoHistory` and an empty list.
    pub fn recommend(&self, user: &str, num_recommendations: usize) -> Recommendations {
        let Some(interacted) = self.interactions.interacted_courses(user) else {
            tracing::debug!(user = %user, version = self.version, "No interaction history");
            return Recommendations {
                user: user.to_string(),
                status: HistoryStatus::NoHistory,
                snapshot_version: self.version,
                recommendations: Vec::new(),
            };
        };

        let seeds: Vec<usize> = interacted
            .iter()
            .filter_map(|id| self.course_index.get(id).copied())
            .collect();

        let mut candidates: Vec<ScoredCourse> = self
            .course_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !interacted.contains(*id))
            .map(|(position, id)| ScoredCourse {
                course_id: *id,
                score: seeds
                    .iter()
                    .map(|&seed| self.blended[[position, seed]])
                    .sum(),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.course_id.cmp(&b.course_id))
        });
        candidates.truncate(num_recommendations);

        Recommendations {
            user: user.to_string(),
            status: HistoryStatus::Ranked,
            snapshot_version: self.version,
            recommendations: candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::HashingEmbedder;

    fn algebra_and_painting_corpus() -> Vec<Course> {
        vec![
            Course::new(1, "intro to algebra"),
            Course::new(2, "advanced algebra"),
            Course::new(3, "painting basics"),
        ]
    }

    async fn build(corpus: Vec<Course>, interactions: Vec<Interaction>) -> RecommenderSnapshot {
        build_snapshot(
            1,
            corpus,
            interactions,
            &HashingEmbedder::new(384),
            BlendWeight::default(),
        )
        .await
        .unwrap()
    }

    fn larger_catalog() -> (Vec<Course>, Vec<Interaction>) {
        let corpus = vec![
            Course::new(10, "intro to algebra"),
            Course::new(11, "advanced algebra and number theory"),
            Course::new(12, "painting basics"),
            Course::new(13, "oil painting techniques"),
            Course::new(14, "linear algebra for machine learning"),
            Course::new(15, "music theory"),
        ];
        let interactions = vec![
            Interaction::enrolled("alice", 10),
            Interaction::liked("alice", 10),
            Interaction::enrolled("alice", 12),
            Interaction::enrolled("bob", 10),
            Interaction::enrolled("bob", 11),
            Interaction::liked("bob", 14),
            Interaction::enrolled("carol", 12),
            Interaction::enrolled("carol", 13),
            Interaction::liked("dave", 15),
        ];
        (corpus, interactions)
    }

    #[tokio::test]
    async fn test_never_returns_interacted_courses() {
        let snapshot = build(
            algebra_and_painting_corpus(),
            vec![Interaction::enrolled("alice", 1), Interaction::liked("alice", 2)],
        )
        .await;

        let result = snapshot.recommend("alice", 1);

        assert_eq!(result.status, HistoryStatus::Ranked);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].course_id, 3);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_history() {
        let snapshot = build(algebra_and_painting_corpus(), vec![Interaction::enrolled("alice", 1)]).await;

        let result = snapshot.recommend("new_student", 5);

        assert_eq!(result.status, HistoryStatus::NoHistory);
        assert!(result.recommendations.is_empty());
        assert_eq!(result.user, "new_student");
    }

    #[test]
    fn test_identical_descriptions_without_interactions() {
        let courses = vec![
            Course::new(1, "intro to algebra"),
            Course::new(2, "intro to algebra"),
        ];
        let embedder = HashingEmbedder::new(384);
        let embeddings: Vec<Embedding> = courses
            .iter()
            .map(|c| embedder.embed_text(&c.description))
            .collect();

        let snapshot = RecommenderSnapshot::from_parts(
            1,
            &courses,
            &embeddings,
            Vec::new(),
            BlendWeight::default(),
            "test",
        )
        .unwrap();

        assert!((snapshot.content()[[0, 1]] - 1.0).abs() < 1e-9);
        assert_eq!(snapshot.collaborative()[[0, 1]], 0.0);
        assert!((snapshot.similarity(1, 2).unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_exclusion_invariant_for_every_user() {
        let (corpus, interactions) = larger_catalog();
        let snapshot = build(corpus, interactions).await;

        for student in snapshot.interactions().students().to_vec() {
            let seen = snapshot.interactions().interacted_courses(&student).unwrap();
            let result = snapshot.recommend(&student, 10);
            assert!(result
                .recommendations
                .iter()
                .all(|r| !seen.contains(&r.course_id)));
        }
    }

    #[tokio::test]
    async fn test_results_sorted_and_size_bounded() {
        let (corpus, interactions) = larger_catalog();
        let snapshot = build(corpus, interactions).await;

        for k in 1..=6 {
            let result = snapshot.recommend("bob", k);
            // bob interacted with 10, 11, 14: three candidates remain
            assert_eq!(result.recommendations.len(), k.min(3));
            for pair in result.recommendations.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[tokio::test]
    async fn test_scores_sum_blended_similarity_over_interacted_courses() {
        let (corpus, interactions) = larger_catalog();
        let snapshot = build(corpus, interactions).await;

        let result = snapshot.recommend("alice", 10);
        for scored in &result.recommendations {
            let expected = snapshot.similarity(scored.course_id, 10).unwrap()
                + snapshot.similarity(scored.course_id, 12).unwrap();
            assert!((scored.score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ties_break_by_ascending_course_id() {
        let courses = vec![
            Course::new(1, "d"),
            Course::new(3, "b"),
            Course::new(5, "a"),
            Course::new(9, "c"),
        ];
        // every course shares one direction so every candidate scores the same
        let embeddings = vec![Embedding::new(vec![1.0, 0.0]); 4];

        let snapshot = RecommenderSnapshot::from_parts(
            1,
            &courses,
            &embeddings,
            vec![Interaction::enrolled("erin", 5)],
            BlendWeight::default(),
            "test",
        )
        .unwrap();

        let ids: Vec<CourseId> = snapshot
            .recommend("erin", 10)
            .recommendations
            .iter()
            .map(|r| r.course_id)
            .collect();
        assert_eq!(ids, vec![1, 3, 9]);
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_empty_recommendations() {
        let snapshot = build(Vec::new(), vec![Interaction::enrolled("alice", 1)]).await;

        assert!(snapshot.course_ids().is_empty());
        // the interaction pointed at a course outside the corpus and was dropped
        let result = snapshot.recommend("alice", 5);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_interactions_are_dropped() {
        let snapshot = build(
            algebra_and_painting_corpus(),
            vec![Interaction::enrolled("alice", 1), Interaction::enrolled("alice", 99)],
        )
        .await;

        assert_eq!(snapshot.interactions().columns().len(), 1);
        let result = snapshot.recommend("alice", 5);
        assert_eq!(result.recommendations.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_course_ids_keep_first() {
        let snapshot = build(
            vec![
                Course::new(2, "advanced algebra"),
                Course::new(1, "intro to algebra"),
                Course::new(2, "duplicate record"),
            ],
            Vec::new(),
        )
        .await;

        assert_eq!(snapshot.course_ids(), &[1, 2]);
    }

    #[tokio::test]
    async fn test_similarity_matrices_are_symmetric() {
        let (corpus, interactions) = larger_catalog();
        let snapshot = build(corpus, interactions).await;
        let n = snapshot.course_ids().len();

        for matrix in [snapshot.collaborative(), snapshot.content(), snapshot.blended()] {
            assert_eq!(matrix.dim(), (n, n));
            for i in 0..n {
                for j in 0..n {
                    assert_eq!(matrix[[i, j]], matrix[[j, i]]);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_collaborative_self_similarity() {
        let (corpus, interactions) = larger_catalog();
        let snapshot = build(corpus, interactions).await;

        // every catalog course has at least one interaction
        for i in 0..snapshot.course_ids().len() {
            assert_eq!(snapshot.collaborative()[[i, i]], 1.0);
            assert_eq!(snapshot.content()[[i, i]], 1.0);
        }
    }

    #[test]
    fn test_mismatched_embedding_count_rejected() {
        let courses = vec![Course::new(1, "a"), Course::new(2, "b")];
        let result = RecommenderSnapshot::from_parts(
            1,
            &courses,
            &[Embedding::zeros(2)],
            Vec::new(),
            BlendWeight::default(),
            "test",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_snapshot_info() {
        let snapshot =
            RecommenderSnapshot::from_parts(0, &[], &[], Vec::new(), BlendWeight::default(), "test")
                .unwrap();
        let info = snapshot.info();
        assert_eq!(info.version, 0);
        assert_eq!(info.course_count, 0);
        assert_eq!(info.student_count, 0);
        assert_eq!(info.blend_alpha, 0.5);
    }
}
