use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::{
    config::Config,
    db::CourseStore,
    error::{AppError, AppResult},
    models::{Recommendations, SnapshotInfo},
    services::embedding::TextEmbedder,
};

use super::{
    blend::BlendWeight,
    snapshot::{build_snapshot, RecommenderSnapshot},
};

/// Request limits and blend weight of the recommender
#[derive(Debug, Clone, Copy)]
pub struct RecommenderSettings {
    pub weight: BlendWeight,
    pub default_recommendations: usize,
    pub max_recommendations: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            weight: BlendWeight::default(),
            default_recommendations: 5,
            max_recommendations: 50,
        }
    }
}

impl RecommenderSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            weight: BlendWeight::new(config.blend_alpha)?,
            default_recommendations: config.default_recommendations,
            max_recommendations: config.max_recommendations,
        })
    }
}

/// Serves recommendations from the current snapshot and rebuilds it on demand
///
/// The published snapshot is an `Arc` behind a lock that is only held long
/// enough to clone or replace the pointer. Readers keep whichever snapshot they
/// grabbed for the whole request, so a rebuild never exposes a half-built state.
pub struct RecommenderService {
    store: Arc<dyn CourseStore>,
    embedder: Arc<dyn TextEmbedder>,
    settings: RecommenderSettings,
    current: RwLock<Arc<RecommenderSnapshot>>,
    rebuild_lock: Mutex<()>,
}

impl RecommenderService {
    /// Builds the first snapshot
    ///
    /// Any failure is returned as-is; callers treat it as fatal since no snapshot
    /// exists to fall back to.
    pub async fn initialize(
        store: Arc<dyn CourseStore>,
        embedder: Arc<dyn TextEmbedder>,
        settings: RecommenderSettings,
    ) -> AppResult<Self> {
        if settings.max_recommendations == 0
            || settings.default_recommendations == 0
            || settings.default_recommendations > settings.max_recommendations
        {
            return Err(AppError::Configuration(format!(
                "Invalid recommendation limits: default {}, max {}",
                settings.default_recommendations, settings.max_recommendations
            )));
        }

        let snapshot = Self::load(store.as_ref(), embedder.as_ref(), settings.weight, 1).await?;

        tracing::info!(
            store = store.name(),
            model = embedder.model_name(),
            "Initial recommender snapshot published"
        );

        Ok(Self {
            store,
            embedder,
            settings,
            current: RwLock::new(Arc::new(snapshot)),
            rebuild_lock: Mutex::new(()),
        })
    }

    async fn load(
        store: &dyn CourseStore,
        embedder: &dyn TextEmbedder,
        weight: BlendWeight,
        version: u64,
    ) -> AppResult<RecommenderSnapshot> {
        let courses = store.list_courses().await?;
        let interactions = store.list_interactions().await?;

        if courses.is_empty() {
            tracing::warn!(version, "Course corpus is empty, snapshot will recommend nothing");
        }

        build_snapshot(version, courses, interactions, embedder, weight).await
    }

    /// The currently published snapshot
    pub async fn current(&self) -> Arc<RecommenderSnapshot> {
        self.current.read().await.clone()
    }

    /// Builds a fresh snapshot from storage and publishes it
    ///
    /// Rebuilds run one at a time and each published snapshot is numbered one
    /// past its predecessor. If the build fails the previous snapshot stays
    /// published, its version is not consumed, and the error is returned.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> AppResult<SnapshotInfo> {
        let _guard = self.rebuild_lock.lock().await;
        let version = self.current().await.version() + 1;

        let snapshot = match Self::load(
            self.store.as_ref(),
            self.embedder.as_ref(),
            self.settings.weight,
            version,
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, version, "Snapshot rebuild failed, keeping current snapshot");
                return Err(e);
            }
        };

        let info = snapshot.info();
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, Arc::new(snapshot))
        };

        tracing::info!(
            version = info.version,
            previous_version = previous.version(),
            course_count = info.course_count,
            student_count = info.student_count,
            "Recommender snapshot published"
        );

        Ok(info)
    }

    /// Top courses for `user` from the current snapshot
    ///
    /// `num_recommendations` defaults to the configured count when omitted and
    /// must lie in `[1, max_recommendations]`.
    pub async fn recommend_courses_with_content(
        &self,
        user: &str,
        num_recommendations: Option<usize>,
    ) -> AppResult<Recommendations> {
        if user.trim().is_empty() {
            return Err(AppError::InvalidInput("User must not be empty".to_string()));
        }

        let count = num_recommendations.unwrap_or(self.settings.default_recommendations);
        if count == 0 || count > self.settings.max_recommendations {
            return Err(AppError::InvalidInput(format!(
                "Number of recommendations must lie in [1, {}], got {}",
                self.settings.max_recommendations, count
            )));
        }

        let snapshot = self.current().await;
        Ok(snapshot.recommend(user, count))
    }

    /// Rebuilds the snapshot every `interval` until the task is aborted
    ///
    /// Failed rebuilds are logged and retried at the next tick.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately and the initial snapshot is fresh
            ticker.tick().await;

            tracing::info!(interval_secs = interval.as_secs(), "Snapshot refresh task started");

            loop {
                ticker.tick().await;
                if let Err(e) = self.rebuild().await {
                    tracing::warn!(error = %e, "Scheduled snapshot rebuild failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MockCourseStore,
        models::{Course, HistoryStatus, Interaction},
        services::embedding::HashingEmbedder,
    };

    fn catalog() -> Vec<Course> {
        vec![
            Course::new(1, "intro to algebra"),
            Course::new(2, "advanced algebra"),
            Course::new(3, "painting basics"),
        ]
    }

    fn history() -> Vec<Interaction> {
        vec![
            Interaction::enrolled("alice", 1),
            Interaction::liked("alice", 2),
            Interaction::enrolled("bob", 1),
        ]
    }

    fn working_store() -> MockCourseStore {
        let mut store = MockCourseStore::new();
        store.expect_list_courses().returning(|| Ok(catalog()));
        store.expect_list_interactions().returning(|| Ok(history()));
        store.expect_name().return_const("mock");
        store
    }

    async fn service_with(store: MockCourseStore) -> AppResult<RecommenderService> {
        RecommenderService::initialize(
            Arc::new(store),
            Arc::new(HashingEmbedder::new(384)),
            RecommenderSettings::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_initialize_publishes_first_snapshot() {
        let service = service_with(working_store()).await.unwrap();
        let snapshot = service.current().await;

        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.course_ids(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_storage_fails() {
        let mut store = MockCourseStore::new();
        store
            .expect_list_courses()
            .returning(|| Err(AppError::Internal("storage down".to_string())));
        store.expect_list_interactions().returning(|| Ok(Vec::new()));
        store.expect_name().return_const("mock");

        let result = service_with(store).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recommend_uses_default_count() {
        let service = service_with(working_store()).await.unwrap();

        let result = service
            .recommend_courses_with_content("bob", None)
            .await
            .unwrap();

        assert_eq!(result.status, HistoryStatus::Ranked);
        assert_eq!(result.recommendations.len(), 2);
        assert!(result.recommendations.iter().all(|r| r.course_id != 1));
        // advanced algebra shares vocabulary with intro to algebra
        assert_eq!(result.recommendations[0].course_id, 2);
    }

    #[tokio::test]
    async fn test_recommend_rejects_bad_input() {
        let service = service_with(working_store()).await.unwrap();

        for count in [Some(0), Some(51)] {
            let result = service.recommend_courses_with_content("alice", count).await;
            assert!(matches!(result, Err(AppError::InvalidInput(_))));
        }

        let result = service.recommend_courses_with_content("  ", Some(3)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_is_no_history() {
        let service = service_with(working_store()).await.unwrap();

        let result = service
            .recommend_courses_with_content("new_student", Some(5))
            .await
            .unwrap();

        assert_eq!(result.status, HistoryStatus::NoHistory);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_swaps_in_new_version() {
        let service = service_with(working_store()).await.unwrap();
        let before = service.current().await;

        let info = service.rebuild().await.unwrap();
        let after = service.current().await;

        assert_eq!(info.version, 2);
        assert_eq!(after.version(), 2);
        // readers holding the old snapshot keep a complete, unchanged view
        assert_eq!(before.version(), 1);
        assert_eq!(before.course_ids(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let mut store = MockCourseStore::new();
        let mut calls = 0;
        store.expect_list_courses().returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(catalog())
            } else {
                Err(AppError::Internal("storage down".to_string()))
            }
        });
        store.expect_list_interactions().returning(|| Ok(history()));
        store.expect_name().return_const("mock");

        let service = service_with(store).await.unwrap();
        assert!(service.rebuild().await.is_err());

        let snapshot = service.current().await;
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.course_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_rebuild_does_not_consume_a_version() {
        let mut store = MockCourseStore::new();
        let mut calls = 0;
        store.expect_list_courses().returning(move || {
            calls += 1;
            if calls == 2 {
                Err(AppError::Internal("storage down".to_string()))
            } else {
                Ok(catalog())
            }
        });
        store.expect_list_interactions().returning(|| Ok(history()));
        store.expect_name().return_const("mock");

        let service = service_with(store).await.unwrap();
        assert!(service.rebuild().await.is_err());

        let info = service.rebuild().await.unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(service.current().await.version(), 2);
    }

    #[tokio::test]
    async fn test_user_id_is_matched_exactly() {
        let service = service_with(working_store()).await.unwrap();

        let padded = service
            .recommend_courses_with_content("bob ", Some(5))
            .await
            .unwrap();
        assert_eq!(padded.user, "bob ");
        assert_eq!(padded.status, HistoryStatus::NoHistory);
        assert!(padded.recommendations.is_empty());

        let exact = service
            .recommend_courses_with_content("bob", Some(5))
            .await
            .unwrap();
        assert_eq!(exact.status, HistoryStatus::Ranked);
    }

    #[tokio::test]
    async fn test_invalid_limits_rejected() {
        let settings = RecommenderSettings {
            default_recommendations: 10,
            max_recommendations: 5,
            ..RecommenderSettings::default()
        };

        let result = RecommenderService::initialize(
            Arc::new(working_store()),
            Arc::new(HashingEmbedder::new(16)),
            settings,
        )
        .await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            blend_alpha: 0.3,
            default_recommendations: 7,
            ..Config::default()
        };
        let settings = RecommenderSettings::from_config(&config).unwrap();
        assert_eq!(settings.weight.alpha(), 0.3);
        assert_eq!(settings.default_recommendations, 7);
        assert_eq!(settings.max_recommendations, 50);
    }
}
