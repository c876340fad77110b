pub mod cancel;
pub mod candidates;
pub mod cold_start;
pub mod content;
pub mod pipeline;
pub mod recommender;
pub mod stop_words;
pub mod trainer;

pub use cancel::CancellationToken;
pub use content::ContentIndex;
pub use pipeline::{Pipeline, RecommendationRequest, Stage};
