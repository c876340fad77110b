use csv::StringRecord;

use crate::{
    error::{AppError, AppResult},
    models::Rating,
};

/// Parses raw ratings CSV into typed ratings
///
/// The first record is the header; any record identical to it is dropped, as are
/// blank lines. Remaining records are `user_id,item_id,rating` with an optional
/// trailing timestamp column. A malformed record fails the whole parse.
pub fn parse_ratings(text: &str) -> AppResult<Vec<Rating>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = csv.records();
    let header = match records.next() {
        Some(header) => header?,
        None => return Ok(Vec::new()),
    };

    let mut ratings = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().eq(header.iter()) || record.iter().all(str::is_empty) {
            continue;
        }
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or_default();
        ratings.push(parse_record(&record, line)?);
    }

    Ok(ratings)
}

fn parse_record(record: &StringRecord, line: usize) -> AppResult<Rating> {
    if !(3..=4).contains(&record.len()) {
        return Err(AppError::Parse {
            line,
            message: format!("expected 3 or 4 fields, found {}", record.len()),
        });
    }

    let field_error = |name: &str, value: &str, err: &dyn std::fmt::Display| AppError::Parse {
        line,
        message: format!("invalid {} {:?}: {}", name, value, err),
    };

    let user_id = record[0]
        .parse::<i64>()
        .map_err(|e| field_error("user id", &record[0], &e))?;
    let item_id = record[1]
        .parse::<i64>()
        .map_err(|e| field_error("item id", &record[1], &e))?;
    let rating = record[2]
        .parse::<f64>()
        .map_err(|e| field_error("rating", &record[2], &e))?;
    if !rating.is_finite() {
        return Err(field_error("rating", &record[2], &"not a finite number"));
    }

    Ok(Rating::new(user_id, item_id, rating))
}
