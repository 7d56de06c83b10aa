use crate::datasets::RatingStore;
use crate::error::RecError;
use crate::types::RatingVector;

// Two squared u32 stars already exceed u64::MAX.
fn squared_norm(vector: &RatingVector) -> u128 {
    vector.values().map(|&r| u128::from(r) * u128::from(r)).sum()
}

/// Dot product over businesses rated by both users. Businesses rated by only
/// one side do not contribute.
fn dot_product(a: &RatingVector, b: &RatingVector) -> u128 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(business, &ra)| {
            large
                .get(business)
                .map(|&rb| u128::from(ra) * u128::from(rb))
        })
        .sum()
}

/// Cosine similarity of two sparse rating vectors. 0.0 when either vector has
/// zero norm.
pub fn cosine(a: &RatingVector, b: &RatingVector) -> f64 {
    let norm_a = squared_norm(a);
    let norm_b = squared_norm(b);
    if norm_a == 0 || norm_b == 0 {
        return 0.0;
    }
    // single sqrt keeps cosine(a, a) exactly 1.0
    dot_product(a, b) as f64 / (norm_a as f64 * norm_b as f64).sqrt()
}

pub fn similarity(store: &RatingStore, user_a: &str, user_b: &str) -> Result<f64, RecError> {
    let a = store
        .get(user_a)
        .ok_or_else(|| RecError::UserNotFound(user_a.to_string()))?;
    let b = store
        .get(user_b)
        .ok_or_else(|| RecError::UserNotFound(user_b.to_string()))?;
    Ok(cosine(a, b))
}
