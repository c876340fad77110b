use std::collections::HashSet;

use crate::models::{ItemId, MovieCatalog, UserId};

/// (user, item) pairs to score for one user, in ascending item order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    user_id: UserId,
    items: Vec<ItemId>,
}

impl CandidateSet {
    /// Every catalog item the user has not rated
    pub fn generate(
        user_id: UserId,
        catalog: &MovieCatalog,
        rated: impl IntoIterator<Item = ItemId>,
    ) -> Self {
        let rated: HashSet<ItemId> = rated.into_iter().collect();
        let items = catalog
            .item_ids()
            .into_iter()
            .filter(|item| !rated.contains(item))
            .collect();

        Self { user_id, items }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (UserId, ItemId)> + '_ {
        self.items.iter().map(move |&item| (self.user_id, item))
    }
}
