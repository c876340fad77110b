use std::sync::Arc;

use crate::{config::Config, services::{ContentIndex, Pipeline}};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    /// Present when content metadata was loaded at startup
    pub content: Option<Arc<ContentIndex>>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline, content: Option<ContentIndex>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            content: content.map(Arc::new),
        }
    }
}
