use serde::Deserialize;

use crate::services::trainer::AlsParams;

/// Where trained models are cached between requests
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelCacheMode {
    /// Retrain on every request
    #[default]
    None,
    /// Keep recent models in process memory
    Memory,
    /// Share models through Redis
    Redis,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Movies table (movieId,title,genres)
    #[serde(default = "default_movies_path")]
    pub movies_path: String,

    /// Ratings table (userId,movieId,rating,timestamp)
    #[serde(default = "default_ratings_path")]
    pub ratings_path: String,

    /// Metadata used by the content-based engine; the `title` query is disabled when unset
    #[serde(default)]
    pub content_data_path: Option<String>,

    /// Read the data files once at startup instead of on every request
    #[serde(default = "default_preload_data")]
    pub preload_data: bool,

    #[serde(default = "default_als_iterations")]
    pub als_iterations: usize,

    #[serde(default = "default_als_rank")]
    pub als_rank: usize,

    #[serde(default = "default_als_regularization")]
    pub als_regularization: f64,

    #[serde(default = "default_als_seed")]
    pub als_seed: u64,

    /// Recommendations returned when the request does not ask for a count
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Upper bound for the `n` query parameter
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,

    /// Similar movies returned by the content-based engine
    #[serde(default = "default_similar_top_n")]
    pub similar_top_n: usize,

    #[serde(default)]
    pub model_cache: ModelCacheMode,

    /// Models kept by the in-memory cache
    #[serde(default = "default_model_cache_capacity")]
    pub model_cache_capacity: usize,

    /// Expiry of models stored in Redis
    #[serde(default = "default_model_cache_ttl_secs")]
    pub model_cache_ttl_secs: u64,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Requests still running after this long are cancelled
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_movies_path() -> String {
    "dataset/movies.csv".to_string()
}

fn default_ratings_path() -> String {
    "dataset/ratings.csv".to_string()
}

fn default_preload_data() -> bool {
    true
}

fn default_als_iterations() -> usize {
    10
}

fn default_als_rank() -> usize {
    14
}

fn default_als_regularization() -> f64 {
    0.05
}

fn default_als_seed() -> u64 {
    99
}

fn default_top_n() -> usize {
    10
}

fn default_max_top_n() -> usize {
    100
}

fn default_similar_top_n() -> usize {
    20
}

fn default_model_cache_capacity() -> usize {
    4
}

fn default_model_cache_ttl_secs() -> u64 {
    86_400
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            movies_path: default_movies_path(),
            ratings_path: default_ratings_path(),
            content_data_path: None,
            preload_data: default_preload_data(),
            als_iterations: default_als_iterations(),
            als_rank: default_als_rank(),
            als_regularization: default_als_regularization(),
            als_seed: default_als_seed(),
            top_n: default_top_n(),
            max_top_n: default_max_top_n(),
            similar_top_n: default_similar_top_n(),
            model_cache: ModelCacheMode::default(),
            model_cache_capacity: default_model_cache_capacity(),
            model_cache_ttl_secs: default_model_cache_ttl_secs(),
            redis_url: default_redis_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_pairs(std::env::vars())
    }

    /// Load configuration from explicit key/value pairs
    pub fn from_pairs<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Hyperparameters handed to the ALS trainer
    pub fn als_params(&self) -> AlsParams {
        AlsParams {
            iterations: self.als_iterations,
            rank: self.als_rank,
            regularization: self.als_regularization,
            seed: self.als_seed,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.top_n == 0 || self.top_n > self.max_top_n {
            anyhow::bail!(
                "TOP_N must be between 1 and MAX_TOP_N ({}), got {}",
                self.max_top_n,
                self.top_n
            );
        }
        if self.similar_top_n == 0 || self.similar_top_n > self.max_top_n {
            anyhow::bail!(
                "SIMILAR_TOP_N must be between 1 and MAX_TOP_N ({}), got {}",
                self.max_top_n,
                self.similar_top_n
            );
        }
        if !self.als_regularization.is_finite() || self.als_regularization <= 0.0 {
            anyhow::bail!(
                "ALS_REGULARIZATION must be a positive number, got {}",
                self.als_regularization
            );
        }
        if self.als_rank == 0 || self.als_iterations == 0 {
            anyhow::bail!("ALS_RANK and ALS_ITERATIONS must be positive");
        }
        if self.model_cache == ModelCacheMode::Memory && self.model_cache_capacity == 0 {
            anyhow::bail!("MODEL_CACHE_CAPACITY must be positive when MODEL_CACHE=memory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_hyperparameters() {
        let config = Config::from_pairs(Vec::new()).unwrap();
        let params = config.als_params();

        assert_eq!(params.iterations, 10);
        assert_eq!(params.rank, 14);
        assert!((params.regularization - 0.05).abs() < f64::EPSILON);
        assert_eq!(params.seed, 99);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.port, 5000);
        assert_eq!(config.model_cache, ModelCacheMode::None);
        assert!(config.content_data_path.is_none());
    }

    #[test]
    fn test_overrides_from_env_pairs() {
        let config = Config::from_pairs(vars(&[
            ("PORT", "8080"),
            ("ALS_RANK", "8"),
            ("MODEL_CACHE", "redis"),
            ("CONTENT_DATA_PATH", "dataset/movie_data.csv"),
            ("PRELOAD_DATA", "false"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.als_rank, 8);
        assert_eq!(config.model_cache, ModelCacheMode::Redis);
        assert_eq!(
            config.content_data_path.as_deref(),
            Some("dataset/movie_data.csv")
        );
        assert!(!config.preload_data);
    }

    #[test]
    fn test_rejects_top_n_above_max() {
        let result = Config::from_pairs(vars(&[("TOP_N", "50"), ("MAX_TOP_N", "20")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_cache_mode() {
        let result = Config::from_pairs(vars(&[("MODEL_CACHE", "disk")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_similar_top_n_above_max() {
        let result = Config::from_pairs(vars(&[("SIMILAR_TOP_N", "30"), ("MAX_TOP_N", "20")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_positive_regularization() {
        for value in ["0", "-0.1", "NaN"] {
            let result = Config::from_pairs(vars(&[("ALS_REGULARIZATION", value)]));
            assert!(result.is_err(), "{value}");
        }
    }
}
