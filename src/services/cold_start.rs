use std::collections::BTreeSet;

use crate::{
    error::{AppError, AppResult},
    models::{ItemId, MovieCatalog, Rating, TrainingSet, UserId},
};

/// A synthetic user built from favorite titles
#[derive(Debug, Clone, PartialEq)]
pub struct ColdStartProfile {
    pub user_id: UserId,
    /// Matched items, ascending and de-duplicated
    pub items: Vec<ItemId>,
    /// Rating given to every matched item
    pub rating: f64,
}

impl ColdStartProfile {
    /// Matches favorites against catalog titles and picks the new user's id and rating
    ///
    /// Each favorite matches every title containing it as a case-sensitive substring.
    /// Empty favorites are ignored and favorites matching nothing are dropped silently.
    /// The new user id is one past the largest existing id and every match is rated at
    /// the highest rating seen in `training_set`, a stand-in for strong preference.
    pub fn build<S: AsRef<str>>(
        favorites: &[S],
        catalog: &MovieCatalog,
        training_set: &TrainingSet,
    ) -> AppResult<Self> {
        let mut items = BTreeSet::new();
        for favorite in favorites {
            let favorite = favorite.as_ref();
            if favorite.is_empty() {
                continue;
            }
            let before = items.len();
            items.extend(catalog.find_by_title_fragment(favorite));
            tracing::debug!(
                favorite,
                matched = items.len() - before,
                "Matched favorite title"
            );
        }

        let user_id = match training_set.max_user_id() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                AppError::Internal("no user id left for a new user".to_string())
            })?,
            None => 1,
        };

        Ok(Self {
            user_id,
            items: items.into_iter().collect(),
            rating: training_set.max_rating().unwrap_or(0.0),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One rating per matched item
    pub fn synthetic_ratings(&self) -> impl Iterator<Item = Rating> + '_ {
        self.items
            .iter()
            .map(move |&item| Rating::new(self.user_id, item, self.rating))
    }

    /// Adds the synthetic ratings to `training_set`
    pub fn inject(&self, training_set: &mut TrainingSet) {
        training_set.extend(self.synthetic_ratings());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Movie;

    fn catalog() -> MovieCatalog {
        MovieCatalog::new(
            [
                (1, "Toy Story (1995)"),
                (2, "Jumanji (1995)"),
                (3, "Toy Story 2 (1999)"),
                (4, "Heat (1995)"),
            ]
            .into_iter()
            .map(|(id, title)| Movie {
                item_id: id,
                title: title.to_string(),
                genres: String::new(),
            })
            .collect(),
        )
    }

    fn training_set() -> TrainingSet {
        TrainingSet::new(vec![
            Rating::new(1, 1, 4.0),
            Rating::new(7, 2, 4.5),
            Rating::new(3, 4, 2.0),
        ])
    }

    #[test]
    fn test_builds_profile_from_matches() {
        let profile =
            ColdStartProfile::build(&["Toy Story", "Heat", "Toy Story 2"], &catalog(), &training_set())
                .unwrap();

        assert_eq!(profile.user_id, 8);
        assert_eq!(profile.items, vec![1, 3, 4]);
        assert_eq!(profile.rating, 4.5);
    }

    #[test]
    fn test_matching_is_case_sensitive_and_soft() {
        let profile =
            ColdStartProfile::build(&["toy story", "Nonexistent", ""], &catalog(), &training_set())
                .unwrap();
        assert!(profile.is_empty());
        assert_eq!(profile.synthetic_ratings().count(), 0);
    }

    #[test]
    fn test_inject_appends_synthetic_ratings() {
        let mut set = training_set();
        let profile = ColdStartProfile::build(&["Jumanji"], &catalog(), &set).unwrap();
        profile.inject(&mut set);

        assert_eq!(set.len(), 4);
        assert_eq!(set.ratings()[3], Rating::new(8, 2, 4.5));
    }

    #[test]
    fn test_empty_training_set_starts_ids_at_one() {
        let profile =
            ColdStartProfile::build(&["Heat"], &catalog(), &TrainingSet::default()).unwrap();
        assert_eq!(profile.user_id, 1);
        assert_eq!(profile.items, vec![4]);
    }

    #[test]
    fn test_user_id_overflow_is_an_error() {
        let set = TrainingSet::new(vec![Rating::new(UserId::MAX, 1, 1.0)]);
        assert!(ColdStartProfile::build(&["Heat"], &catalog(), &set).is_err());
    }
}
