use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::instrument;

use crate::{
    db::CourseStore,
    error::AppResult,
    models::{Course, Interaction, InteractionRow},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Course store backed by the platform's PostgreSQL tables
#[derive(Clone)]
pub struct PgCourseStore {
    pool: PgPool,
}

impl PgCourseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CourseStore for PgCourseStore {
    #[instrument(skip(self))]
    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT id::BIGINT AS id, COALESCE(description, '') AS description
            FROM courses
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = courses.len(), "Loaded courses");

        Ok(courses)
    }

    #[instrument(skip(self))]
    async fn list_interactions(&self) -> AppResult<Vec<Interaction>> {
        // Enrollments and likes arrive as indicator columns and are split per signal
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT student, course_id::BIGINT AS course_id, 1::INT4 AS enrolled, 0::INT4 AS liked
            FROM course_students
            UNION
            SELECT student, course_id::BIGINT AS course_id, 0::INT4 AS enrolled, 1::INT4 AS liked
            FROM course_likes
            ORDER BY student, course_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let interactions: Vec<Interaction> = rows
            .into_iter()
            .flat_map(InteractionRow::into_interactions)
            .collect();

        tracing::debug!(count = interactions.len(), "Loaded interactions");

        Ok(interactions)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
