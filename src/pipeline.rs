use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::datasets::RatingStore;
use crate::error::RecError;
use crate::output::ResultSink;
use crate::recommenders::{Aggregation, Recommender, UserBasedRecommender, DEFAULT_NEIGHBORS};
use crate::types::UserRecommendation;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub k: usize,
    pub aggregation: Aggregation,
    /// Compute users on the rayon pool instead of the calling thread.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_NEIGHBORS,
            aggregation: Aggregation::Sum,
            parallel: true,
        }
    }
}

/// A user id paired with the outcome of its pipeline.
pub type UserResult<'u> = (&'u str, Result<UserRecommendation, RecError>);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub recommended: usize,
    pub skipped: usize,
}

/// Runs neighbor selection and aggregation for a set of users over a
/// read-only store. Every user is independent, so the batch can be split
/// across threads without locking.
pub struct Pipeline<'a> {
    recommender: UserBasedRecommender<'a>,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a RatingStore, config: PipelineConfig) -> Self {
        Self {
            recommender: UserBasedRecommender {
                store,
                k: config.k,
                aggregation: config.aggregation,
            },
            config,
        }
    }

    pub fn recommend_for(&self, user_id: &str) -> Result<UserRecommendation, RecError> {
        debug!(user_id, "Computing neighbors");
        self.recommender.recommend(user_id)
    }

    /// Sequential stream over every user in store order.
    pub fn iter(&self) -> impl Iterator<Item = UserResult<'a>> + '_ {
        let store = self.recommender.store;
        store
            .users()
            .map(move |user_id| (user_id, self.recommend_for(user_id)))
    }

    /// Every user computed on the rayon pool. Results keep store order.
    pub fn run_parallel(&self) -> Vec<UserResult<'a>> {
        let users: Vec<&'a str> = self.recommender.store.users().collect();
        self.run_users_parallel(&users)
    }

    fn run_users_parallel<'u>(&self, users: &[&'u str]) -> Vec<UserResult<'u>> {
        users
            .par_iter()
            .map(|&user_id| (user_id, self.recommend_for(user_id)))
            .collect()
    }

    /// Drive the whole store into `sink`.
    pub fn run(&self, sink: &mut dyn ResultSink) -> anyhow::Result<RunSummary> {
        let users: Vec<&str> = self.recommender.store.users().collect();
        self.run_users(&users, sink)
    }

    /// Drive the given users into `sink`. Users that fail are logged and
    /// skipped; only sink errors abort the run.
    pub fn run_users(
        &self,
        users: &[&str],
        sink: &mut dyn ResultSink,
    ) -> anyhow::Result<RunSummary> {
        info!(
            users = users.len(),
            k = self.config.k,
            aggregation = ?self.config.aggregation,
            parallel = self.config.parallel,
            "Starting recommendation run"
        );

        let mut summary = RunSummary::default();
        let mut emit = |(user_id, result): UserResult<'_>| -> anyhow::Result<()> {
            summary.users += 1;
            match result {
                Ok(rec) => {
                    sink.write(&rec)?;
                    summary.recommended += 1;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Skipping user");
                    summary.skipped += 1;
                }
            }
            Ok(())
        };

        if self.config.parallel {
            for result in self.run_users_parallel(users) {
                emit(result)?;
            }
        } else {
            for &user_id in users {
                emit((user_id, self.recommend_for(user_id)))?;
            }
        }
        sink.finish()?;

        info!(
            recommended = summary.recommended,
            skipped = summary.skipped,
            "Recommendation run finished"
        );
        Ok(summary)
    }
}
