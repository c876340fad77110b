//! Trained-model caching
//!
//! Models are keyed by a fingerprint of everything that determines them: the
//! training set (in order) and the ALS hyperparameters. Two requests that would
//! train on the same input share one model.

use std::{
    collections::hash_map::DefaultHasher,
    fmt::Display,
    hash::{Hash, Hasher},
    sync::Arc,
};

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::TrainingSet,
    services::trainer::{AlsParams, FactorModel},
};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{create_redis_client, CacheWriterHandle, RedisStore};

/// Fingerprint of a training set and the hyperparameters used to fit it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn fingerprint(training_set: &TrainingSet, params: &AlsParams) -> Self {
        let mut hasher = DefaultHasher::new();
        training_set.len().hash(&mut hasher);
        for rating in training_set.ratings() {
            rating.user_id.hash(&mut hasher);
            rating.item_id.hash(&mut hasher);
            rating.rating.to_bits().hash(&mut hasher);
        }
        params.iterations.hash(&mut hasher);
        params.rank.hash(&mut hasher);
        params.regularization.to_bits().hash(&mut hasher);
        params.seed.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "als-model:{:016x}", self.0)
    }
}

/// Storage for trained models
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<FactorModel>>>;

    async fn put(&self, key: &CacheKey, model: Arc<FactorModel>) -> AppResult<()>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}
