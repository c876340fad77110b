use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheKey, ModelStore};
use crate::{error::AppResult, services::trainer::FactorModel};

/// In-process model cache holding at most `capacity` models, oldest evicted first
pub struct MemoryStore {
    capacity: usize,
    entries: RwLock<VecDeque<(CacheKey, Arc<FactorModel>)>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<FactorModel>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, model)| Arc::clone(model)))
    }

    async fn put(&self, key: &CacheKey, model: Arc<FactorModel>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|(k, _)| k != key);
        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_front() {
                tracing::debug!(key = %evicted, "Evicted cached model");
            }
        }
        entries.push_back((*key, model));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
