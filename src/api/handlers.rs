use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{Recommendations, SnapshotInfo},
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ranked course recommendations for a student
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Recommendations>> {
    let recommendations = state
        .recommender
        .recommend_courses_with_content(&user, query.limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        user = %recommendations.user,
        status = ?recommendations.status,
        returned = recommendations.recommendations.len(),
        snapshot_version = recommendations.snapshot_version,
        "Served recommendations"
    );

    Ok(Json(recommendations))
}

/// Metadata of the snapshot currently serving requests
pub async fn get_snapshot(State(state): State<AppState>) -> Json<SnapshotInfo> {
    Json(state.recommender.current().await.info())
}

/// Rebuilds the snapshot from storage and publishes it
pub async fn rebuild_snapshot(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<SnapshotInfo>> {
    tracing::info!(request_id = %request_id, "Snapshot rebuild requested");

    let info = state.recommender.rebuild().await?;
    Ok(Json(info))
}
