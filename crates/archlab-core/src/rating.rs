//! Result set and rating tracker for one open question.
//!
//! The tracker owns the currently displayed result set and the partial
//! mapping from display position to rating. Ratings are positional: a new
//! result set invalidates everything, which is why installation goes through
//! a generation handle. `begin_search` is called when a search is issued and
//! `install`/`clear` only take effect while their generation is still the
//! newest one, so a slow response from a superseded search can never
//! overwrite the results (or silently un-reset the ratings) of a newer one.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::endpoints::RatingPayload;
use crate::search::types::SearchResult;

/// Handle identifying one issued search against the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Errors from recording a rating.
#[derive(Debug, Clone, Error)]
pub enum RatingError {
    #[error("No result at position {position} (result count {count})")]
    OutOfRange { position: usize, count: usize },
    /// The result at this position is not the one the rating was made for;
    /// the result set changed between display and rating.
    #[error("Result at position {position} changed since it was displayed")]
    StaleResult { position: usize },
}

/// Tracks the active result set and its per-position ratings.
#[derive(Debug, Default)]
pub struct RatingTracker {
    generation: u64,
    results: Vec<SearchResult>,
    ratings: BTreeMap<usize, RatingPayload>,
}

impl RatingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a new search as issued and returns its generation.
    ///
    /// Any generation handed out earlier becomes stale immediately.
    pub fn begin_search(&mut self) -> Generation {
        self.generation += 1;
        Generation(self.generation)
    }

    /// Installs a result set and resets all ratings.
    ///
    /// Returns `false` without touching any state when `generation` is no
    /// longer the newest issued search.
    pub fn install(&mut self, generation: Generation, results: Vec<SearchResult>) -> bool {
        if generation.0 != self.generation {
            return false;
        }
        self.results = results;
        self.ratings.clear();
        true
    }

    /// Clears the result set after a failed search, same staleness rule as
    /// [`install`](Self::install).
    pub fn clear(&mut self, generation: Generation) -> bool {
        self.install(generation, Vec::new())
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn rating_count(&self) -> usize {
        self.ratings.len()
    }

    /// Rating recorded at a position, if any.
    pub fn rating(&self, position: usize) -> Option<&RatingPayload> {
        self.ratings.get(&position)
    }

    /// Inserts or overwrites the rating at `position`.
    ///
    /// The scale value is not validated here (the presentation layer only
    /// offers scale values), but the issue identifier must still match the
    /// result displayed at that position: a mismatch means the rating was
    /// made against a result set that has since been replaced.
    pub fn rate(
        &mut self,
        position: usize,
        issue_id: i64,
        value: impl Into<String>,
    ) -> Result<(), RatingError> {
        let result = self
            .results
            .get(position)
            .ok_or(RatingError::OutOfRange {
                position,
                count: self.results.len(),
            })?;
        if result.id != issue_id {
            return Err(RatingError::StaleResult { position });
        }
        self.ratings.insert(
            position,
            RatingPayload {
                issue_id,
                rating: value.into(),
            },
        );
        Ok(())
    }

    /// True iff every displayed result has a rating and there is at least
    /// one result. Submission is gated strictly on this.
    pub fn is_complete(&self) -> bool {
        !self.results.is_empty() && self.ratings.len() == self.results.len()
    }

    /// Ratings in display-position order, for submission.
    pub fn ordered_ratings(&self) -> Vec<RatingPayload> {
        self.ratings.values().cloned().collect()
    }
}
