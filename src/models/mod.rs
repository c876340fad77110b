mod content;
mod movie;
mod rating;
mod recommendation;

pub use content::{MovieMetadata, SimilarMovie};
pub use movie::{Movie, MovieCatalog};
pub use rating::{ItemId, Rating, TrainingSet, UserId};
pub use recommendation::{Recommendation, RecommendationOutcome};
