use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ItemId;

/// A scored, title-resolved recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    /// `None` when the model learned no factors for the item
    pub predicted_rating: Option<f64>,
}

/// Result of a collaborative-filtering request
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationOutcome {
    /// Best first
    Ranked(Vec<Recommendation>),
    /// The requested user has no ratings
    UserNotFound,
    /// None of the favorite titles matched a movie
    NoFavoritesMatched,
}

impl RecommendationOutcome {
    /// Rank position (starting at 1) to title
    pub fn ranked_titles(&self) -> Option<BTreeMap<usize, String>> {
        match self {
            RecommendationOutcome::Ranked(recs) => Some(
                recs.iter()
                    .enumerate()
                    .map(|(i, rec)| (i + 1, rec.title.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_titles_start_at_one() {
        let outcome = RecommendationOutcome::Ranked(vec![
            Recommendation {
                item_id: 11,
                title: "B".to_string(),
                predicted_rating: Some(3.2),
            },
            Recommendation {
                item_id: 12,
                title: "C".to_string(),
                predicted_rating: None,
            },
        ]);

        let titles = outcome.ranked_titles().unwrap();
        assert_eq!(titles.get(&1).map(String::as_str), Some("B"));
        assert_eq!(titles.get(&2).map(String::as_str), Some("C"));

        let json = serde_json::to_string(&titles).unwrap();
        assert_eq!(json, r#"{"1":"B","2":"C"}"#);
    }

    #[test]
    fn test_not_found_has_no_titles() {
        assert!(RecommendationOutcome::UserNotFound.ranked_titles().is_none());
        assert!(RecommendationOutcome::NoFavoritesMatched
            .ranked_titles()
            .is_none());
    }
}
