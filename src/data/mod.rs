//! Data loading and preprocessing
//!
//! A [`DataSource`] hands the pipeline the movie catalog and the raw ratings text.
//! [`PreloadedSource`] reads the files once at startup; [`FileSource`] reads them on
//! every request so edits to the files are picked up without a restart.

use std::{path::PathBuf, sync::Arc};

use crate::{error::AppResult, models::MovieCatalog};

pub mod loader;
pub mod preprocess;

pub use preprocess::parse_ratings;

/// Inputs of a single pipeline run, before preprocessing
#[derive(Debug, Clone)]
pub struct RawData {
    pub catalog: Arc<MovieCatalog>,
    pub ratings_text: Arc<str>,
}

/// Provider of movies and raw ratings
pub trait DataSource: Send + Sync {
    fn load(&self) -> AppResult<RawData>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Data held in memory for the lifetime of the process
pub struct PreloadedSource {
    data: RawData,
}

impl PreloadedSource {
    pub fn new(catalog: MovieCatalog, ratings_text: impl Into<Arc<str>>) -> Self {
        Self {
            data: RawData {
                catalog: Arc::new(catalog),
                ratings_text: ratings_text.into(),
            },
        }
    }

    /// Reads both files once
    pub fn from_files(source: &FileSource) -> AppResult<Self> {
        let data = source.load()?;
        Ok(Self { data })
    }
}

impl DataSource for PreloadedSource {
    fn load(&self) -> AppResult<RawData> {
        Ok(self.data.clone())
    }

    fn name(&self) -> &'static str {
        "preloaded"
    }
}

/// Data read from disk on every call
#[derive(Debug, Clone)]
pub struct FileSource {
    movies_path: PathBuf,
    ratings_path: PathBuf,
}

impl FileSource {
    pub fn new(movies_path: impl Into<PathBuf>, ratings_path: impl Into<PathBuf>) -> Self {
        Self {
            movies_path: movies_path.into(),
            ratings_path: ratings_path.into(),
        }
    }
}

impl DataSource for FileSource {
    fn load(&self) -> AppResult<RawData> {
        let catalog = loader::load_movies(&self.movies_path)?;
        let ratings_text = loader::load_ratings_text(&self.ratings_path)?;
        Ok(RawData {
            catalog: Arc::new(catalog),
            ratings_text: ratings_text.into(),
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
