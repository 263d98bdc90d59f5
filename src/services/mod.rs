pub mod embedding;
pub mod recommender;

pub use recommender::{RecommenderService, RecommenderSettings};
