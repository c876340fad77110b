//! One recommendation request, start to finish
//!
//! `LOADING → PREPROCESSING → (COLD_START_INJECTION) → TRAINING →
//! CANDIDATE_GENERATION → SCORING → RESOLVING`. A failing stage ends the run with
//! its error; nothing is retried. CPU-heavy stages run on the blocking pool.

use std::{fmt::Display, sync::Arc};

use tokio::task;

use crate::{
    cache::{CacheKey, ModelStore},
    data::{parse_ratings, DataSource, RawData},
    error::{AppError, AppResult},
    models::{ItemId, RecommendationOutcome, TrainingSet, UserId},
    services::{
        cancel::CancellationToken,
        candidates::CandidateSet,
        cold_start::ColdStartProfile,
        recommender,
        trainer::{AlsParams, AlsTrainer, FactorModel},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Preprocessing,
    ColdStartInjection,
    Training,
    CandidateGeneration,
    Scoring,
    Resolving,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Preprocessing => "preprocessing",
            Stage::ColdStartInjection => "cold start injection",
            Stage::Training => "training",
            Stage::CandidateGeneration => "candidate generation",
            Stage::Scoring => "scoring",
            Stage::Resolving => "resolving",
        };
        f.write_str(name)
    }
}

/// What the caller wants recommendations for
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationRequest {
    ExistingUser { user_id: UserId, n: usize },
    ColdStart { favorites: Vec<String>, n: usize },
}

impl RecommendationRequest {
    fn n(&self) -> usize {
        match self {
            RecommendationRequest::ExistingUser { n, .. }
            | RecommendationRequest::ColdStart { n, .. } => *n,
        }
    }
}

/// Runs requests against a data source, optionally reusing cached models
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn DataSource>,
    params: AlsParams,
    store: Option<Arc<dyn ModelStore>>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn DataSource>, params: AlsParams) -> Self {
        Self {
            source,
            params,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(
        &self,
        request: RecommendationRequest,
        cancel: &CancellationToken,
    ) -> AppResult<RecommendationOutcome> {
        tracing::info!(source = self.source.name(), ?request, "Recommendation pipeline started");

        let outcome = self.execute(request, cancel).await?;
        match &outcome {
            RecommendationOutcome::Ranked(recs) => {
                tracing::info!(recommendations = recs.len(), "Recommendation pipeline done")
            }
            other => tracing::info!(outcome = ?other, "Recommendation pipeline done"),
        }
        Ok(outcome)
    }

    async fn execute(
        &self,
        request: RecommendationRequest,
        cancel: &CancellationToken,
    ) -> AppResult<RecommendationOutcome> {
        let n = request.n();

        cancel.check(Stage::Loading).map_err(failed(Stage::Loading))?;
        let source = Arc::clone(&self.source);
        let RawData {
            catalog,
            ratings_text,
        } = blocking(move || source.load())
            .await
            .map_err(failed(Stage::Loading))?;

        let mut training_set = blocking(move || parse_ratings(&ratings_text).map(TrainingSet::from))
            .await
            .map_err(failed(Stage::Preprocessing))?;
        tracing::debug!(
            ratings = training_set.len(),
            movies = catalog.len(),
            "Ratings preprocessed"
        );

        let (user_id, rated): (UserId, Vec<ItemId>) = match request {
            RecommendationRequest::ExistingUser { user_id, .. } => {
                if !training_set.contains_user(user_id) {
                    tracing::info!(user_id, "User has no ratings");
                    return Ok(RecommendationOutcome::UserNotFound);
                }
                (user_id, training_set.items_rated_by(user_id).collect())
            }
            RecommendationRequest::ColdStart { favorites, .. } => {
                let profile = ColdStartProfile::build(&favorites, &catalog, &training_set)
                    .map_err(failed(Stage::ColdStartInjection))?;
                if profile.is_empty() {
                    tracing::info!(?favorites, "No favorite matched a movie");
                    return Ok(RecommendationOutcome::NoFavoritesMatched);
                }
                profile.inject(&mut training_set);
                tracing::debug!(
                    user_id = profile.user_id,
                    items = profile.items.len(),
                    rating = profile.rating,
                    "Cold-start profile injected"
                );
                (profile.user_id, profile.items)
            }
        };

        cancel.check(Stage::Training).map_err(failed(Stage::Training))?;
        let model = self
            .model_for(training_set, cancel)
            .await
            .map_err(failed(Stage::Training))?;

        let candidates = CandidateSet::generate(user_id, &catalog, rated);
        tracing::debug!(
            user_id = candidates.user_id(),
            candidates = candidates.len(),
            "Candidates generated"
        );

        cancel.check(Stage::Scoring).map_err(failed(Stage::Scoring))?;
        let ranked = blocking(move || {
            Ok(recommender::rank(
                recommender::score(&model, &candidates),
                n,
            ))
        })
        .await
        .map_err(failed(Stage::Scoring))?;

        let recommendations = recommender::resolve(ranked, &catalog);
        Ok(RecommendationOutcome::Ranked(recommendations))
    }

    /// Cached model for `training_set`, or a freshly trained one
    async fn model_for(
        &self,
        training_set: TrainingSet,
        cancel: &CancellationToken,
    ) -> AppResult<Arc<FactorModel>> {
        let key = CacheKey::fingerprint(&training_set, &self.params);

        if let Some(store) = &self.store {
            match store.get(&key).await {
                Ok(Some(model)) => {
                    tracing::info!(
                        %key,
                        store = store.name(),
                        trained_at = %model.trained_at(),
                        params = ?model.params(),
                        "Using cached model"
                    );
                    return Ok(model);
                }
                Ok(None) => tracing::debug!(%key, store = store.name(), "Model cache miss"),
                Err(e) => {
                    tracing::warn!(error = %e, %key, store = store.name(), "Model cache read failed")
                }
            }
        }

        let trainer = AlsTrainer::new(self.params);
        let token = cancel.clone();
        let model = Arc::new(blocking(move || trainer.fit(&training_set, &token)).await?);
        tracing::info!(
            users = model.num_users(),
            items = model.num_items(),
            rank = model.rank(),
            "Model trained"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.put(&key, Arc::clone(&model)).await {
                tracing::error!(error = %e, %key, store = store.name(), "Model cache write failed");
            }
        }

        Ok(model)
    }
}

/// Logs the failing stage and passes the error through
fn failed(stage: Stage) -> impl FnOnce(AppError) -> AppError {
    move |err| {
        tracing::error!(%stage, error = %err, "Recommendation pipeline failed");
        err
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}
