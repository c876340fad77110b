use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{RecommendationOutcome, UserId},
    services::{CancellationToken, RecommendationRequest},
};

/// A `/movie` query after validation
#[derive(Debug, Clone, PartialEq)]
pub enum MovieQuery {
    Recommend(RecommendationRequest),
    Similar { title: String, n: usize },
}

impl MovieQuery {
    /// Exactly one of `user`, `favorite` (repeatable) or `title`, plus an optional `n`
    pub fn parse(params: Vec<(String, String)>, state: &AppState) -> AppResult<Self> {
        let mut user: Option<String> = None;
        let mut title: Option<String> = None;
        let mut favorites: Vec<String> = Vec::new();
        let mut n: Option<String> = None;

        for (key, value) in params {
            let slot = match key.as_str() {
                "favorite" => {
                    favorites.push(value);
                    continue;
                }
                "user" => &mut user,
                "title" => &mut title,
                "n" => &mut n,
                other => {
                    return Err(AppError::InvalidInput(format!(
                        "unknown query parameter '{}'",
                        other
                    )))
                }
            };
            if slot.replace(value).is_some() {
                return Err(AppError::InvalidInput(format!(
                    "query parameter '{}' given more than once",
                    key
                )));
            }
        }

        let modes = [user.is_some(), !favorites.is_empty(), title.is_some()]
            .iter()
            .filter(|present| **present)
            .count();
        if modes != 1 {
            return Err(AppError::InvalidInput(
                "exactly one of 'user', 'favorite' or 'title' is required".to_string(),
            ));
        }

        let config = &state.config;
        let n = match n {
            Some(raw) => {
                let n: usize = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::InvalidInput(format!("'n' is not a count: {}", raw)))?;
                if n == 0 || n > config.max_top_n {
                    return Err(AppError::InvalidInput(format!(
                        "'n' must be between 1 and {}",
                        config.max_top_n
                    )));
                }
                Some(n)
            }
            None => None,
        };

        if let Some(raw) = user {
            let user_id: UserId = raw
                .trim()
                .parse()
                .map_err(|_| AppError::InvalidInput(format!("'user' is not an id: {}", raw)))?;
            return Ok(MovieQuery::Recommend(RecommendationRequest::ExistingUser {
                user_id,
                n: n.unwrap_or(config.top_n),
            }));
        }

        if let Some(title) = title {
            return Ok(MovieQuery::Similar {
                title,
                n: n.unwrap_or(config.similar_top_n),
            });
        }

        Ok(MovieQuery::Recommend(RecommendationRequest::ColdStart {
            favorites,
            n: n.unwrap_or(config.top_n),
        }))
    }
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Handler for the movie endpoint: collaborative, cold-start or content-based
pub async fn movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Response> {
    match MovieQuery::parse(params, &state)? {
        MovieQuery::Recommend(request) => recommend(&state, request, &request_id).await,
        MovieQuery::Similar { title, n } => similar(&state, title, n).await,
    }
}

async fn recommend(
    state: &AppState,
    request: RecommendationRequest,
    request_id: &RequestId,
) -> AppResult<Response> {
    let limit = Duration::from_secs(state.config.request_timeout_secs);
    let outcome = run_with_limit(state, request, limit, &CancellationToken::new())
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::Cancelled(_)) {
                tracing::warn!(%request_id, error = %e, "Recommendation cancelled");
            }
        })?;

    match outcome {
        RecommendationOutcome::UserNotFound => Err(AppError::NotFound("User not found".to_string())),
        RecommendationOutcome::NoFavoritesMatched => Err(AppError::NotFound(
            "None of the favorite movies are in the database".to_string(),
        )),
        ranked => {
            let titles = ranked.ranked_titles().unwrap_or_default();
            Ok(Json(titles).into_response())
        }
    }
}

/// Runs the pipeline under `limit`
///
/// `cancel` fires when the limit elapses or when this future is dropped before
/// finishing, so blocking work still in flight stops at its next check.
async fn run_with_limit(
    state: &AppState,
    request: RecommendationRequest,
    limit: Duration,
    cancel: &CancellationToken,
) -> AppResult<RecommendationOutcome> {
    let guard = cancel.drop_guard();
    let result = tokio::time::timeout(limit, state.pipeline.run(request, cancel)).await;
    guard.disarm();

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            cancel.cancel();
            Err(AppError::Cancelled(format!("the {:?} time limit", limit)))
        }
    }
}

async fn similar(state: &AppState, title: String, n: usize) -> AppResult<Response> {
    let index = state
        .content
        .clone()
        .ok_or_else(|| AppError::Unavailable("content data is not loaded".to_string()))?;

    let movies = tokio::task::spawn_blocking(move || index.similar_to(&title, n))
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))??;

    Ok(Json(movies).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        data::{DataSource, PreloadedSource, RawData},
        models::MovieCatalog,
        services::Pipeline,
    };
    use std::sync::Arc;

    fn state() -> AppState {
        state_with(Arc::new(PreloadedSource::new(MovieCatalog::new(Vec::new()), "")))
    }

    fn state_with(source: Arc<dyn DataSource>) -> AppState {
        let config = Config::default();
        let pipeline = Pipeline::new(source, config.als_params());
        AppState::new(config, pipeline, None)
    }

    /// Takes `delay` to load an empty data set
    struct SlowSource {
        delay: Duration,
    }

    impl DataSource for SlowSource {
        fn load(&self) -> AppResult<RawData> {
            std::thread::sleep(self.delay);
            PreloadedSource::new(MovieCatalog::new(Vec::new()), "").load()
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn slow_state() -> AppState {
        state_with(Arc::new(SlowSource {
            delay: Duration::from_millis(300),
        }))
    }

    #[tokio::test]
    async fn test_time_limit_cancels_and_fails() {
        let state = slow_state();
        let cancel = CancellationToken::new();

        let err = run_with_limit(
            &state,
            RecommendationRequest::ExistingUser { user_id: 1, n: 1 },
            Duration::from_millis(20),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Cancelled(_)));
        assert!(cancel.is_cancelled());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_dropped_request_cancels_pipeline() {
        let state = slow_state();
        let cancel = CancellationToken::new();

        let run = run_with_limit(
            &state,
            RecommendationRequest::ExistingUser { user_id: 1, n: 1 },
            Duration::from_secs(60),
            &cancel,
        );
        // The client goes away while the data is still loading
        assert!(tokio::time::timeout(Duration::from_millis(20), run)
            .await
            .is_err());

        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_finished_request_leaves_token_untouched() {
        let state = state();
        let cancel = CancellationToken::new();

        let outcome = run_with_limit(
            &state,
            RecommendationRequest::ExistingUser { user_id: 1, n: 1 },
            Duration::from_secs(60),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, RecommendationOutcome::UserNotFound);
        assert!(!cancel.is_cancelled());
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_user_with_default_count() {
        let query = MovieQuery::parse(params(&[("user", "7")]), &state()).unwrap();
        assert_eq!(
            query,
            MovieQuery::Recommend(RecommendationRequest::ExistingUser { user_id: 7, n: 10 })
        );
    }

    #[test]
    fn test_parse_repeated_favorites() {
        let query = MovieQuery::parse(
            params(&[("favorite", "Heat"), ("favorite", "Alien"), ("n", "3")]),
            &state(),
        )
        .unwrap();
        assert_eq!(
            query,
            MovieQuery::Recommend(RecommendationRequest::ColdStart {
                favorites: vec!["Heat".to_string(), "Alien".to_string()],
                n: 3,
            })
        );
    }

    #[test]
    fn test_parse_title_uses_similar_count() {
        let query = MovieQuery::parse(params(&[("title", "heat")]), &state()).unwrap();
        assert_eq!(
            query,
            MovieQuery::Similar {
                title: "heat".to_string(),
                n: 20
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_combinations() {
        let state = state();
        for bad in [
            params(&[]),
            params(&[("user", "1"), ("title", "heat")]),
            params(&[("user", "1"), ("user", "2")]),
            params(&[("user", "abc")]),
            params(&[("user", "1"), ("n", "0")]),
            params(&[("user", "1"), ("n", "101")]),
            params(&[("user", "1"), ("limit", "5")]),
        ] {
            assert!(matches!(
                MovieQuery::parse(bad.clone(), &state),
                Err(AppError::InvalidInput(_))
            ));
        }
    }
}
