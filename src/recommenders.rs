use std::collections::HashMap;

use clap::ValueEnum;

use crate::datasets::RatingStore;
use crate::error::RecError;
use crate::neighbors::top_k;
use crate::similarity::cosine;
use crate::types::{Neighbor, UserRecommendation};

pub const DEFAULT_NEIGHBORS: usize = 20;

pub trait Recommender {
    fn recommend(&self, user_id: &str) -> Result<UserRecommendation, RecError>;
}

/// How neighbor ratings are combined per business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Aggregation {
    /// Plain sum of stars. Favors businesses many neighbors have rated.
    #[default]
    Sum,
    /// Sum divided by the number of neighbors who rated the business.
    Mean,
}

/// Combine the ratings of `neighbors` and pick the best business. Ties go to
/// the lexicographically smallest business id.
pub fn aggregate(
    store: &RatingStore,
    user_id: &str,
    neighbors: &[Neighbor],
    aggregation: Aggregation,
) -> Result<(String, f64), RecError> {
    let mut totals: HashMap<&str, (u64, u32)> = HashMap::new();
    for neighbor in neighbors {
        let ratings = store
            .get(&neighbor.user_id)
            .ok_or_else(|| RecError::UserNotFound(neighbor.user_id.clone()))?;
        for (business, &stars) in ratings {
            let entry = totals.entry(business.as_str()).or_insert((0, 0));
            entry.0 += u64::from(stars);
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(business, (sum, count))| {
            let score = match aggregation {
                Aggregation::Sum => sum as f64,
                Aggregation::Mean => sum as f64 / f64::from(count),
            };
            (business, score)
        })
        .min_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .map(|(business, score)| (business.to_string(), score))
        .ok_or_else(|| RecError::NoRecommendation(user_id.to_string()))
}

/// User-based collaborative filtering: rank every other user by cosine
/// similarity, keep the top `k`, and recommend from their ratings.
pub struct UserBasedRecommender<'a> {
    pub store: &'a RatingStore,
    pub k: usize,
    pub aggregation: Aggregation,
}

impl<'a> UserBasedRecommender<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self {
            store,
            k: DEFAULT_NEIGHBORS,
            aggregation: Aggregation::Sum,
        }
    }

    /// Similarity of `user_id` against every other user in the store.
    pub fn similarities(&self, user_id: &str) -> Result<Vec<Neighbor>, RecError> {
        let target = self
            .store
            .get(user_id)
            .ok_or_else(|| RecError::UserNotFound(user_id.to_string()))?;
        Ok(self
            .store
            .iter()
            .filter(|(other, _)| *other != user_id)
            .map(|(other, ratings)| Neighbor {
                user_id: other.to_string(),
                score: cosine(target, ratings),
            })
            .collect())
    }

    pub fn neighbors(&self, user_id: &str) -> Result<Vec<Neighbor>, RecError> {
        Ok(top_k(self.similarities(user_id)?, self.k))
    }
}

impl Recommender for UserBasedRecommender<'_> {
    fn recommend(&self, user_id: &str) -> Result<UserRecommendation, RecError> {
        let neighbors = self.neighbors(user_id)?;
        let (business_id, score) = aggregate(self.store, user_id, &neighbors, self.aggregation)?;
        Ok(UserRecommendation {
            user_id: user_id.to_string(),
            neighbors,
            business_id,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::rating;

    fn neighbor(user_id: &str, score: f64) -> Neighbor {
        Neighbor {
            user_id: user_id.to_string(),
            score,
        }
    }

    fn example_store() -> RatingStore {
        RatingStore::from_ratings(vec![
            rating("U1", "B1", 5),
            rating("U1", "B2", 3),
            rating("U2", "B1", 4),
            rating("U2", "B2", 5),
            rating("U3", "B3", 5),
        ])
    }

    #[test]
    fn test_end_to_end_example() -> Result<(), RecError> {
        let store = example_store();
        let recommender = UserBasedRecommender {
            store: &store,
            k: 2,
            aggregation: Aggregation::Sum,
        };

        let actual = recommender.recommend("U1")?;
        let neighbor_ids: Vec<&str> = actual
            .neighbors
            .iter()
            .map(|n| n.user_id.as_str())
            .collect();

        assert_eq!(neighbor_ids, vec!["U2", "U3"]);
        assert_eq!(actual.neighbors[1].score, 0.0);
        // B2 and B3 both total 5
        assert_eq!(actual.business_id, "B2");
        assert_eq!(actual.score, 5.0);
        Ok(())
    }

    #[test]
    fn test_similarities_exclude_self() -> Result<(), RecError> {
        let store = example_store();
        let recommender = UserBasedRecommender::new(&store);
        let sims = recommender.similarities("U2")?;

        assert_eq!(sims.len(), store.len() - 1);
        assert!(sims.iter().all(|n| n.user_id != "U2"));
        Ok(())
    }

    #[test]
    fn test_sum_prefers_popular_mean_prefers_rating() -> Result<(), RecError> {
        let store = RatingStore::from_ratings(vec![
            rating("n1", "popular", 3),
            rating("n2", "popular", 3),
            rating("n1", "niche", 5),
        ]);
        let neighbors = vec![neighbor("n1", 1.0), neighbor("n2", 1.0)];

        let (sum_pick, sum_score) = aggregate(&store, "t", &neighbors, Aggregation::Sum)?;
        assert_eq!((sum_pick.as_str(), sum_score), ("popular", 6.0));

        let (mean_pick, mean_score) = aggregate(&store, "t", &neighbors, Aggregation::Mean)?;
        assert_eq!((mean_pick.as_str(), mean_score), ("niche", 5.0));
        Ok(())
    }

    #[test]
    fn test_recommendation_comes_from_neighbors() -> Result<(), RecError> {
        let store = example_store();
        let neighbors = vec![neighbor("U3", 0.0)];
        let (business, _) = aggregate(&store, "U1", &neighbors, Aggregation::Sum)?;
        assert_eq!(business, "B3");
        Ok(())
    }

    #[test]
    fn test_extreme_stars_sum_without_overflow() -> Result<(), RecError> {
        let store = RatingStore::from_ratings(vec![
            rating("n1", "b1", u32::MAX),
            rating("n2", "b1", u32::MAX),
            rating("n3", "b1", u32::MAX),
            rating("n3", "b2", 5),
        ]);
        let neighbors = vec![neighbor("n1", 1.0), neighbor("n2", 1.0), neighbor("n3", 1.0)];

        let (business, score) = aggregate(&store, "t", &neighbors, Aggregation::Sum)?;
        assert_eq!(business, "b1");
        assert_eq!(score, 3.0 * f64::from(u32::MAX));

        let (_, mean) = aggregate(&store, "t", &neighbors, Aggregation::Mean)?;
        assert_eq!(mean, f64::from(u32::MAX));
        Ok(())
    }

    #[test]
    fn test_no_neighbors() {
        let store = RatingStore::from_ratings(vec![rating("alone", "B1", 4)]);
        let recommender = UserBasedRecommender::new(&store);
        assert_eq!(
            recommender.recommend("alone"),
            Err(RecError::NoRecommendation("alone".to_string()))
        );
    }

    #[test]
    fn test_unknown_user() {
        let store = example_store();
        let recommender = UserBasedRecommender::new(&store);
        assert_eq!(
            recommender.recommend("ghost"),
            Err(RecError::UserNotFound("ghost".to_string()))
        );

        let neighbors = vec![neighbor("ghost", 1.0)];
        assert_eq!(
            aggregate(&store, "U1", &neighbors, Aggregation::Sum),
            Err(RecError::UserNotFound("ghost".to_string()))
        );
    }
}
