//! User-based collaborative filtering over sparse star ratings.
//!
//! A [`RatingStore`](datasets::RatingStore) is loaded once from a ratings
//! file. For each user the [`Pipeline`](pipeline::Pipeline) ranks every other
//! user by cosine similarity, keeps the top K, and recommends the business
//! with the highest combined rating among those neighbors.

pub mod datasets;
pub mod error;
pub mod neighbors;
pub mod output;
pub mod pipeline;
pub mod recommenders;
pub mod similarity;
pub mod types;
