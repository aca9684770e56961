//! Vote data types.

use serde::{Deserialize, Serialize};

use crate::meeting::{ParticipantId, VenueId};

/// One participant's vote for one venue.
///
/// Existence means "this participant currently votes for this venue".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Venue voted for
    pub venue_id: VenueId,
    /// Voter
    pub participant_id: ParticipantId,
}

/// Aggregate votes for one venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatistics {
    /// Venue
    pub venue_id: VenueId,
    /// Number of votes
    pub vote_count: u32,
    /// Who voted, in service order
    #[serde(default)]
    pub voter_participant_ids: Vec<ParticipantId>,
}

impl VoteStatistics {
    /// Creates statistics from a voter list, deriving the count.
    #[must_use]
    pub fn from_voters(venue_id: impl Into<VenueId>, voters: Vec<ParticipantId>) -> Self {
        Self {
            venue_id: venue_id.into(),
            vote_count: u32::try_from(voters.len()).unwrap_or(u32::MAX),
            voter_participant_ids: voters,
        }
    }

    /// Returns whether `participant_id` is among the voters.
    #[must_use]
    pub fn has_voter(&self, participant_id: &ParticipantId) -> bool {
        self.voter_participant_ids.contains(participant_id)
    }

    /// Adds a voter if absent. Returns whether it was added.
    pub fn add_voter(&mut self, participant_id: &ParticipantId) -> bool {
        if self.has_voter(participant_id) {
            return false;
        }
        self.voter_participant_ids.push(participant_id.clone());
        self.vote_count = self.vote_count.saturating_add(1);
        true
    }

    /// Removes a voter if present. Returns whether it was removed.
    pub fn remove_voter(&mut self, participant_id: &ParticipantId) -> bool {
        let before = self.voter_participant_ids.len();
        self.voter_participant_ids.retain(|id| id != participant_id);
        if self.voter_participant_ids.len() == before {
            return false;
        }
        self.vote_count = self.vote_count.saturating_sub(1);
        true
    }

    /// Returns every vote as a [`VoteRecord`].
    #[must_use]
    pub fn records(&self) -> Vec<VoteRecord> {
        self.voter_participant_ids
            .iter()
            .map(|participant_id| VoteRecord {
                venue_id: self.venue_id.clone(),
                participant_id: participant_id.clone(),
            })
            .collect()
    }
}

/// Which way a vote mutation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    /// Add a vote.
    Cast,
    /// Withdraw a vote.
    Remove,
}

/// Successful result of a vote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The service accepted the change.
    Recorded,
    /// The desired state already held; nothing changed.
    Unchanged,
}
