use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ItemId = i64;

/// A single (user, item, rating) observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// The ratings used to fit one model
///
/// Built per request and extended with synthetic ratings on the cold-start path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    ratings: Vec<Rating>,
}

impl TrainingSet {
    pub fn new(ratings: Vec<Rating>) -> Self {
        Self { ratings }
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn extend(&mut self, extra: impl IntoIterator<Item = Rating>) {
        self.ratings.extend(extra);
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.ratings.iter().any(|r| r.user_id == user_id)
    }

    /// Items the user has rated, in rating order and possibly repeated
    pub fn items_rated_by(&self, user_id: UserId) -> impl Iterator<Item = ItemId> + '_ {
        self.ratings
            .iter()
            .filter(move |r| r.user_id == user_id)
            .map(|r| r.item_id)
    }

    pub fn max_user_id(&self) -> Option<UserId> {
        self.ratings.iter().map(|r| r.user_id).max()
    }

    pub fn max_rating(&self) -> Option<f64> {
        self.ratings
            .iter()
            .map(|r| r.rating)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |m| m.max(r))))
    }
}

impl From<Vec<Rating>> for TrainingSet {
    fn from(ratings: Vec<Rating>) -> Self {
        Self::new(ratings)
    }
}
