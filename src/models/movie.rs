use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ItemId;

/// A row of the movies table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    #[serde(rename = "movieId")]
    pub item_id: ItemId,
    pub title: String,
    #[serde(default)]
    pub genres: String,
}

/// Read-only movie table with an id index
///
/// Keeps file order. When an id appears more than once the first row wins the index.
#[derive(Debug, Clone, Default)]
pub struct MovieCatalog {
    movies: Vec<Movie>,
    by_id: HashMap<ItemId, usize>,
}

impl MovieCatalog {
    pub fn new(movies: Vec<Movie>) -> Self {
        let mut by_id = HashMap::with_capacity(movies.len());
        for (idx, movie) in movies.iter().enumerate() {
            by_id.entry(movie.item_id).or_insert(idx);
        }
        Self { movies, by_id }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Movie> {
        self.by_id.get(&item_id).map(|&idx| &self.movies[idx])
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.get(item_id).map(|m| m.title.as_str())
    }

    /// Distinct item ids in ascending order
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Items whose title contains `fragment` (case-sensitive)
    pub fn find_by_title_fragment<'a>(
        &'a self,
        fragment: &'a str,
    ) -> impl Iterator<Item = ItemId> + 'a {
        self.movies
            .iter()
            .filter(move |m| m.title.contains(fragment))
            .map(|m| m.item_id)
    }
}
