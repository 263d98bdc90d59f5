use std::sync::Arc;

use crate::services::RecommenderService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<RecommenderService>,
}

impl AppState {
    pub fn new(recommender: Arc<RecommenderService>) -> Self {
        Self { recommender }
    }
}
