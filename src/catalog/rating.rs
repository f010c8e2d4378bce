use serde::{Deserialize, Serialize};

/// One rating from one source (TMDB, IMDb, Letterboxd, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub source: String,
    pub rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<i64>,
}

/// Median of `values`, or `default` when there are none.
///
/// Values are not filtered here. Callers drop "absent" ratings (<= 0)
/// before calling.
pub fn median_rating(values: &[f64], default: f64) -> f64 {
    if values.is_empty() {
        return default;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
