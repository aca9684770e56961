//! Votes on candidate venues.
//!
//! Authoritative statistics arrive only through a full snapshot or a
//! statistics-replace event and live in the replica store. Local casts and
//! removals are optimistic overlays on top, managed by [`VoteAggregator`].
//!
//! # Rules
//!
//! - At most one vote per (participant, venue); casting twice is a no-op
//! - Removing a vote that does not exist is a no-op
//! - A duplicate-vote conflict from the service counts as success
//! - Nothing is accepted once the event has a published venue

mod aggregator;
mod error;
mod types;

pub use aggregator::{PendingVote, RequestId, VoteAggregator, VoteIntent};
pub use error::{VoteError, VoteResult};
pub use types::{VoteAction, VoteOutcome, VoteRecord, VoteStatistics};
