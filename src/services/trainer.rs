//! Matrix factorization using Alternating Least Squares (ALS)
//!
//! Explicit-feedback ALS: the rating matrix `R` is approximated by `U · Vᵀ` where
//! each row of `U` (users) and `V` (items) has `rank` latent factors. Each half-step
//! fixes one side and solves a regularized least squares problem per row:
//!
//! `(Yᵀ Y + λ · n · I) x = Yᵀ r`
//!
//! with `n` the number of observations in that row (weighted-λ regularization).
//! Rows are indexed in ascending id order and factors are drawn from a seeded RNG,
//! so a fixed seed and a fixed training set always produce the same model.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{AppError, AppResult},
    models::{ItemId, TrainingSet, UserId},
    services::cancel::CancellationToken,
};

/// ALS hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlsParams {
    pub iterations: usize,
    /// Number of latent factors
    pub rank: usize,
    /// Lambda
    pub regularization: f64,
    pub seed: u64,
}

impl Default for AlsParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            rank: 14,
            regularization: 0.05,
            seed: 99,
        }
    }
}

impl AlsParams {
    fn validate(&self) -> AppResult<()> {
        if self.rank == 0 {
            return Err(AppError::Training("rank must be positive".to_string()));
        }
        if self.iterations == 0 {
            return Err(AppError::Training(
                "iterations must be positive".to_string(),
            ));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(AppError::Training(format!(
                "regularization must be a non-negative number, got {}",
                self.regularization
            )));
        }
        Ok(())
    }
}

/// Trained latent-factor model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorModel {
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    /// [num_users x rank]
    user_factors: Array2<f64>,
    /// [num_items x rank]
    item_factors: Array2<f64>,
    params: AlsParams,
    trained_at: DateTime<Utc>,
}

impl FactorModel {
    /// Predicted rating, or `None` when either side was absent from the training set
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let u = *self.user_index.get(&user_id)?;
        let i = *self.item_index.get(&item_id)?;
        Some(self.user_factors.row(u).dot(&self.item_factors.row(i)))
    }

    pub fn rank(&self) -> usize {
        self.params.rank
    }

    pub fn params(&self) -> &AlsParams {
        &self.params
    }

    pub fn num_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

/// Fits [`FactorModel`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsTrainer {
    params: AlsParams,
}

impl AlsTrainer {
    pub fn new(params: AlsParams) -> Self {
        Self { params }
    }

    /// Trains a model, checking `cancel` before every iteration
    pub fn fit(
        &self,
        training_set: &TrainingSet,
        cancel: &CancellationToken,
    ) -> AppResult<FactorModel> {
        self.params.validate()?;
        if training_set.is_empty() {
            return Err(AppError::Training("training set is empty".to_string()));
        }
        if let Some(bad) = training_set.ratings().iter().find(|r| !r.rating.is_finite()) {
            return Err(AppError::Training(format!(
                "rating for user {} item {} is not a finite number",
                bad.user_id, bad.item_id
            )));
        }

        let matrix = ObservationMatrix::build(training_set);
        let k = self.params.rank;
        let lambda = self.params.regularization;

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let scale = 1.0 / (k as f64).sqrt();
        let mut user_factors =
            Array2::from_shape_fn((matrix.by_user.len(), k), |_| rng.gen::<f64>() * scale);
        let mut item_factors =
            Array2::from_shape_fn((matrix.by_item.len(), k), |_| rng.gen::<f64>() * scale);

        for iteration in 0..self.params.iterations {
            cancel.check("training")?;

            user_factors = solve_side(&matrix.by_user, &item_factors, lambda)
                .ok_or_else(|| not_positive_definite("user"))?;
            item_factors = solve_side(&matrix.by_item, &user_factors, lambda)
                .ok_or_else(|| not_positive_definite("item"))?;

            tracing::debug!(
                iteration,
                rmse = rmse(&matrix.by_user, &user_factors, &item_factors),
                "ALS iteration complete"
            );
        }

        Ok(FactorModel {
            user_index: matrix.user_index.into_iter().collect(),
            item_index: matrix.item_index.into_iter().collect(),
            user_factors,
            item_factors,
            params: self.params,
            trained_at: Utc::now(),
        })
    }
}

fn not_positive_definite(side: &str) -> AppError {
    AppError::Training(format!(
        "{} factor system is not positive definite; increase regularization",
        side
    ))
}

/// Ratings grouped both ways, with rows in ascending id order
struct ObservationMatrix {
    user_index: BTreeMap<UserId, usize>,
    item_index: BTreeMap<ItemId, usize>,
    /// user row -> [(item row, rating)]
    by_user: Vec<Vec<(usize, f64)>>,
    /// item row -> [(user row, rating)]
    by_item: Vec<Vec<(usize, f64)>>,
}

impl ObservationMatrix {
    fn build(training_set: &TrainingSet) -> Self {
        let mut user_index: BTreeMap<UserId, usize> = BTreeMap::new();
        let mut item_index: BTreeMap<ItemId, usize> = BTreeMap::new();
        for r in training_set.ratings() {
            user_index.insert(r.user_id, 0);
            item_index.insert(r.item_id, 0);
        }
        for (row, idx) in user_index.values_mut().enumerate() {
            *idx = row;
        }
        for (row, idx) in item_index.values_mut().enumerate() {
            *idx = row;
        }

        let mut by_user = vec![Vec::new(); user_index.len()];
        let mut by_item = vec![Vec::new(); item_index.len()];
        for r in training_set.ratings() {
            let u = user_index[&r.user_id];
            let i = item_index[&r.item_id];
            by_user[u].push((i, r.rating));
            by_item[i].push((u, r.rating));
        }

        Self {
            user_index,
            item_index,
            by_user,
            by_item,
        }
    }
}

/// Recomputes every row of one side with the other side held fixed
fn solve_side(rows: &[Vec<(usize, f64)>], fixed: &Array2<f64>, lambda: f64) -> Option<Array2<f64>> {
    let k = fixed.ncols();
    let mut solved = Array2::<f64>::zeros((rows.len(), k));

    for (row, observations) in rows.iter().enumerate() {
        let mut a = Array2::<f64>::zeros((k, k));
        let mut b = Array1::<f64>::zeros(k);

        for &(other, rating) in observations {
            let y = fixed.row(other);
            for i in 0..k {
                for j in 0..k {
                    a[[i, j]] += y[i] * y[j];
                }
                b[i] += rating * y[i];
            }
        }

        let reg = lambda * observations.len() as f64;
        for i in 0..k {
            a[[i, i]] += reg;
        }

        solved.row_mut(row).assign(&cholesky_solve(&a, &b)?);
    }

    Some(solved)
}

/// Solves `A x = b` for symmetric positive definite `A`
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn rmse(by_user: &[Vec<(usize, f64)>], users: &Array2<f64>, items: &Array2<f64>) -> f64 {
    let mut squared = 0.0;
    let mut count = 0usize;
    for (u, observations) in by_user.iter().enumerate() {
        for &(i, rating) in observations {
            let err = rating - users.row(u).dot(&items.row(i));
            squared += err * err;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (squared / count as f64).sqrt()
    }
}
