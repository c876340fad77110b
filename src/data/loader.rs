use std::{fs::File, io::Read, path::Path};

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieCatalog, MovieMetadata},
};

/// Reads the movies table (`movieId,title,genres`, with header)
pub fn read_movies<R: Read>(reader: R) -> AppResult<MovieCatalog> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true)
        .from_reader(reader);

    let mut movies = Vec::new();
    for record in csv.deserialize::<Movie>() {
        movies.push(record?);
    }

    Ok(MovieCatalog::new(movies))
}

pub fn load_movies(path: impl AsRef<Path>) -> AppResult<MovieCatalog> {
    let path = path.as_ref();
    let catalog = read_movies(File::open(path)?)?;
    tracing::debug!(path = %path.display(), movies = catalog.len(), "Loaded movies");
    Ok(catalog)
}

/// Reads the ratings file as raw text; parsing happens in the preprocessing stage
pub fn load_ratings_text(path: impl AsRef<Path>) -> AppResult<String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "Loaded ratings text");
    Ok(text)
}

/// Reads the movie metadata table, lowercasing titles
pub fn read_metadata<R: Read>(reader: R) -> AppResult<Vec<MovieMetadata>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv.deserialize::<MovieMetadata>() {
        let mut row = record?;
        row.original_title = row.original_title.to_lowercase();
        rows.push(row);
    }

    Ok(rows)
}

/// Loads the metadata table from a CSV file, or from the first CSV entry of a `.zip`
pub fn load_metadata(path: impl AsRef<Path>) -> AppResult<Vec<MovieMetadata>> {
    let path = path.as_ref();
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let rows = if is_zip {
        read_zipped_metadata(File::open(path)?)?
    } else {
        read_metadata(File::open(path)?)?
    };
    tracing::debug!(path = %path.display(), movies = rows.len(), "Loaded movie metadata");
    Ok(rows)
}

fn read_zipped_metadata(file: File) -> AppResult<Vec<MovieMetadata>> {
    let mut archive = zip::ZipArchive::new(file).map_err(archive_error)?;
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(archive_error)?;
        if entry.is_file() && entry.name().to_lowercase().ends_with(".csv") {
            tracing::debug!(entry = entry.name(), "Reading zipped metadata");
            return read_metadata(entry);
        }
    }
    Err(AppError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "archive holds no .csv entry",
    )))
}

fn archive_error(err: zip::result::ZipError) -> AppError {
    AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}
