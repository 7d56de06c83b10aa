use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// business_id -> stars. A missing business means "not rated", never zero.
pub type RatingVector = HashMap<String, u32>;

/// One line of the ratings file. Extra fields of the Yelp review dump
/// (review_id, text, date, votes...) are ignored by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub business_id: String,
    pub stars: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub user_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecommendation {
    pub user_id: String,
    /// Ranked best first.
    pub neighbors: Vec<Neighbor>,
    pub business_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborRow<'a> {
    pub user_id: &'a str,
    pub rank: usize,
    pub neighbor_id: &'a str,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationRow<'a> {
    pub user_id: &'a str,
    pub recommended_business_id: &'a str,
    pub score: f64,
}
