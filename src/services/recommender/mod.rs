//! Course recommendation engine
//!
//! Combines collaborative similarity (which students enrolled in or liked which
//! courses) with content similarity (embedded course descriptions) into one
//! course-course matrix, and ranks unseen courses for a student against it.

pub mod blend;
pub mod interactions;
pub mod service;
pub mod similarity;
pub mod snapshot;

pub use blend::{blend, BlendWeight};
pub use interactions::{InteractionColumn, InteractionMatrix};
pub use service::{RecommenderService, RecommenderSettings};
pub use similarity::{cosine_similarity_matrix, embeddings_to_matrix};
pub use snapshot::{build_snapshot, RecommenderSnapshot};
