use std::cmp::Ordering;

use crate::{
    models::{ItemId, MovieCatalog, Recommendation},
    services::{candidates::CandidateSet, trainer::FactorModel},
};

/// A candidate item with its predicted rating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub predicted_rating: Option<f64>,
}

/// Predicts a rating for every candidate
pub fn score(model: &FactorModel, candidates: &CandidateSet) -> Vec<ScoredItem> {
    candidates
        .pairs()
        .map(|(user_id, item_id)| ScoredItem {
            item_id,
            predicted_rating: model.predict(user_id, item_id),
        })
        .collect()
}

/// Highest predicted rating first, ties by ascending item id. Unscored items go last.
pub fn rank(mut scored: Vec<ScoredItem>, n: usize) -> Vec<ScoredItem> {
    scored.sort_by(compare);
    scored.truncate(n);
    scored
}

fn compare(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    let by_score = match (a.predicted_rating, b.predicted_rating) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.item_id.cmp(&b.item_id))
}

/// Attaches titles, keeping rank order
pub fn resolve(ranked: Vec<ScoredItem>, catalog: &MovieCatalog) -> Vec<Recommendation> {
    ranked
        .into_iter()
        .filter_map(|scored| {
            catalog.title(scored.item_id).map(|title| Recommendation {
                item_id: scored.item_id,
                title: title.to_string(),
                predicted_rating: scored.predicted_rating,
            })
        })
        .collect()
}
