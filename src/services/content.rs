//! Content-based similarity over movie metadata
//!
//! Every movie gets two sparse feature blocks: raw token counts over its cast and
//! genres, and an L2-normalized TF-IDF vector over its plot. Similarity between two
//! movies is the cosine of the concatenated blocks, which only needs the per-block
//! dot products and norms, so the blocks are never materialized together.

use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{MovieMetadata, SimilarMovie},
    services::stop_words::is_stop_word,
};

/// Sparse vector as (term index, weight) pairs sorted by term index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f64)>,
}

impl SparseVector {
    fn from_map(map: HashMap<u32, f64>) -> Self {
        let mut entries: Vec<(u32, f64)> = map.into_iter().collect();
        entries.sort_unstable_by_key(|&(term, _)| term);
        Self { entries }
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_term, a_val) = self.entries[i];
            let (b_term, b_val) = other.entries[j];
            match a_term.cmp(&b_term) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_val * b_val;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn squared_norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn normalized(mut self) -> Self {
        let norm = self.squared_norm().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut self.entries {
                *v /= norm;
            }
        }
        self
    }
}

/// Lowercased word tokens of two or more characters, English stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|token| !is_stop_word(token))
        .collect()
}

/// Vocabulary shared by all documents of one feature block
#[derive(Debug, Default)]
struct Vocabulary {
    terms: HashMap<String, u32>,
}

impl Vocabulary {
    fn term_counts(&mut self, tokens: Vec<String>) -> HashMap<u32, f64> {
        let mut counts = HashMap::new();
        for token in tokens {
            let next = self.terms.len() as u32;
            let term = *self.terms.entry(token).or_insert(next);
            *counts.entry(term).or_insert(0.0) += 1.0;
        }
        counts
    }

    fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Raw term counts per document
fn count_vectors<'a>(documents: impl Iterator<Item = &'a str>) -> (Vec<SparseVector>, usize) {
    let mut vocabulary = Vocabulary::default();
    let vectors = documents
        .map(|doc| SparseVector::from_map(vocabulary.term_counts(tokenize(doc))))
        .collect();
    (vectors, vocabulary.len())
}

/// TF-IDF with smoothed IDF `ln((1 + n) / (1 + df)) + 1`, rows L2-normalized
fn tfidf_vectors<'a>(documents: impl Iterator<Item = &'a str>) -> (Vec<SparseVector>, usize) {
    let mut vocabulary = Vocabulary::default();
    let counts: Vec<HashMap<u32, f64>> = documents
        .map(|doc| vocabulary.term_counts(tokenize(doc)))
        .collect();

    let mut doc_freq = vec![0usize; vocabulary.len()];
    for doc in &counts {
        for &term in doc.keys() {
            doc_freq[term as usize] += 1;
        }
    }

    let n = counts.len() as f64;
    let idf: Vec<f64> = doc_freq
        .iter()
        .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    let vectors = counts
        .into_iter()
        .map(|mut doc| {
            for (term, weight) in doc.iter_mut() {
                *weight *= idf[*term as usize];
            }
            SparseVector::from_map(doc).normalized()
        })
        .collect();

    (vectors, vocabulary.len())
}

struct MovieFeatures {
    counts: SparseVector,
    tfidf: SparseVector,
    norm: f64,
}

/// Precomputed feature vectors for every movie in the metadata table
pub struct ContentIndex {
    movies: Vec<MovieMetadata>,
    features: Vec<MovieFeatures>,
    by_title: HashMap<String, usize>,
}

impl ContentIndex {
    pub fn build(movies: Vec<MovieMetadata>) -> Self {
        let combined: Vec<String> = movies.iter().map(MovieMetadata::combined_features).collect();
        let (count_vecs, count_terms) = count_vectors(combined.iter().map(String::as_str));
        let (tfidf_vecs, tfidf_terms) =
            tfidf_vectors(movies.iter().map(|m| m.plot.as_deref().unwrap_or_default()));

        let features = count_vecs
            .into_iter()
            .zip(tfidf_vecs)
            .map(|(counts, tfidf)| {
                let norm = (counts.squared_norm() + tfidf.squared_norm()).sqrt();
                MovieFeatures {
                    counts,
                    tfidf,
                    norm,
                }
            })
            .collect();

        let mut by_title = HashMap::with_capacity(movies.len());
        for (idx, movie) in movies.iter().enumerate() {
            by_title
                .entry(movie.original_title.to_lowercase())
                .or_insert(idx);
        }

        tracing::info!(
            movies = movies.len(),
            count_terms,
            tfidf_terms,
            "Content index built"
        );

        Self {
            movies,
            features,
            by_title,
        }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.by_title.contains_key(&title.to_lowercase())
    }

    fn similarity(&self, a: usize, b: usize) -> f64 {
        let (fa, fb) = (&self.features[a], &self.features[b]);
        if fa.norm == 0.0 || fb.norm == 0.0 {
            return 0.0;
        }
        (fa.counts.dot(&fb.counts) + fa.tfidf.dot(&fb.tfidf)) / (fa.norm * fb.norm)
    }

    /// The `n` movies most similar to `title` (case-insensitive), best first
    ///
    /// The queried movie itself is never returned. Ties keep table order.
    pub fn similar_to(&self, title: &str, n: usize) -> AppResult<Vec<SimilarMovie>> {
        let anchor = *self
            .by_title
            .get(&title.to_lowercase())
            .ok_or_else(|| AppError::NotFound("Movie not in Database".to_string()))?;

        let mut scored: Vec<(usize, f64)> = (0..self.movies.len())
            .filter(|&idx| idx != anchor)
            .map(|idx| (idx, self.similarity(anchor, idx)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n);

        Ok(scored
            .into_iter()
            .map(|(idx, _)| {
                let movie = &self.movies[idx];
                SimilarMovie {
                    movie_id: movie.movie_id,
                    name: movie.original_title.clone(),
                    genres: movie.genres.clone(),
                }
            })
            .collect())
    }
}
