use serde::{Deserialize, Serialize};

/// A row of the movie metadata table used for content similarity
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MovieMetadata {
    pub movie_id: i64,
    pub original_title: String,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
}

impl MovieMetadata {
    /// Cast and genres joined the way they are fed to the count features
    pub fn combined_features(&self) -> String {
        [self.cast.as_deref(), self.genres.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A movie returned by the content-based engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarMovie {
    #[serde(rename = "Movie_Id")]
    pub movie_id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Genres")]
    pub genres: Option<String>,
}
