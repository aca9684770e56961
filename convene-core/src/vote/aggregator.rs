//! Optimistic vote overlays.
//!
//! The [`VoteAggregator`] never edits the authoritative statistics held by
//! the [`ReplicaStore`]. It keeps a small overlay per (venue, participant)
//! that is applied on top when building display statistics:
//!
//! ```text
//! begin()    -> overlay added (in flight), display count moves at once
//! complete() -> success: overlay settled, kept until the next replacement
//!               failure: overlay reverted
//! replaced   -> overlays for covered venues and all settled overlays dropped
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use super::error::{VoteError, VoteResult};
use super::types::{VoteAction, VoteOutcome, VoteStatistics};
use crate::meeting::{ParticipantId, VenueId};
use crate::replica::ReplicaStore;
use crate::service::{ServiceError, ServiceResult};

/// Identifier tying a request completion back to its overlay.
pub type RequestId = u64;

/// A vote mutation waiting for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVote {
    /// Matches the overlay created by [`VoteAggregator::begin`]
    pub request_id: RequestId,
    /// Cast or remove
    pub action: VoteAction,
    /// Voter
    pub participant_id: ParticipantId,
    /// Venue
    pub venue_id: VenueId,
}

/// What the caller must do after [`VoteAggregator::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteIntent {
    /// Send the request, then report back with [`VoteAggregator::complete`].
    Request(PendingVote),
    /// The desired state already holds; send nothing.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overlay {
    action: VoteAction,
    request_id: RequestId,
    settled: bool,
}

type OverlayKey = (VenueId, ParticipantId);

/// Local optimistic vote state layered over authoritative statistics.
#[derive(Debug, Default)]
pub struct VoteAggregator {
    overlays: HashMap<OverlayKey, Overlay>,
    next_request_id: RequestId,
}

impl VoteAggregator {
    /// Creates an aggregator with no overlays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a cast or remove.
    ///
    /// Applies the optimistic overlay immediately and returns the request
    /// to send, or [`VoteIntent::Unchanged`] if the participant is already
    /// in the desired state.
    ///
    /// # Errors
    ///
    /// - [`VoteError::VotingClosed`] if the event is published
    /// - [`VoteError::UnknownParticipant`] if the voter is not in the event
    pub fn begin(
        &mut self,
        store: &ReplicaStore,
        action: VoteAction,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> VoteResult<VoteIntent> {
        if store.event().is_published() {
            return Err(VoteError::VotingClosed);
        }
        if store.participant(participant_id).is_none() {
            return Err(VoteError::UnknownParticipant(participant_id.clone()));
        }

        let voted = self.has_voted(store, participant_id, venue_id);
        let already_there = match action {
            VoteAction::Cast => voted,
            VoteAction::Remove => !voted,
        };
        if already_there {
            return Ok(VoteIntent::Unchanged);
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.overlays.insert(
            (venue_id.clone(), participant_id.clone()),
            Overlay {
                action,
                request_id,
                settled: false,
            },
        );

        Ok(VoteIntent::Request(PendingVote {
            request_id,
            action,
            participant_id: participant_id.clone(),
            venue_id: venue_id.clone(),
        }))
    }

    /// Finishes a request started by [`begin`](Self::begin).
    ///
    /// A conflict on cast, or not-found on remove, means the service
    /// already holds the desired state and counts as success. If the
    /// overlay was already discarded by a replacement, only the result is
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns the mapped service error after reverting the overlay.
    pub fn complete(
        &mut self,
        pending: &PendingVote,
        result: ServiceResult<()>,
    ) -> VoteResult<VoteOutcome> {
        let already_held = match (&result, pending.action) {
            (Err(ServiceError::Conflict(_)), VoteAction::Cast)
            | (Err(ServiceError::NotFound(_)), VoteAction::Remove) => true,
            _ => false,
        };

        let key = (pending.venue_id.clone(), pending.participant_id.clone());
        let owned = self
            .overlays
            .get(&key)
            .is_some_and(|overlay| overlay.request_id == pending.request_id);

        match result {
            Ok(()) => {
                if owned {
                    self.settle(&key);
                }
                Ok(VoteOutcome::Recorded)
            }
            Err(_) if already_held => {
                if owned {
                    self.settle(&key);
                }
                Ok(VoteOutcome::Unchanged)
            }
            Err(err) => {
                if owned {
                    self.overlays.remove(&key);
                }
                Err(err.into())
            }
        }
    }

    /// Drops overlays made stale by a wholesale statistics replacement.
    ///
    /// Overlays for covered venues are discarded whether or not their
    /// request finished; settled overlays are discarded everywhere.
    pub fn on_statistics_replaced(&mut self, covered: &HashSet<VenueId>) {
        self.overlays
            .retain(|(venue_id, _), overlay| !overlay.settled && !covered.contains(venue_id));
    }

    /// Drops the overlay an authoritative vote delta has superseded.
    pub fn on_vote_delta(&mut self, venue_id: &VenueId, participant_id: &ParticipantId) {
        self.overlays
            .remove(&(venue_id.clone(), participant_id.clone()));
    }

    /// Drops every overlay belonging to a removed participant.
    pub fn forget_participant(&mut self, participant_id: &ParticipantId) {
        self.overlays.retain(|(_, voter), _| voter != participant_id);
    }

    /// Number of requests still in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.overlays.values().filter(|o| !o.settled).count()
    }

    /// Whether the participant currently votes for the venue, overlays
    /// included.
    #[must_use]
    pub fn has_voted(
        &self,
        store: &ReplicaStore,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> bool {
        let key = (venue_id.clone(), participant_id.clone());
        self.overlays.get(&key).map_or_else(
            || {
                store
                    .statistics()
                    .get(venue_id)
                    .is_some_and(|stats| stats.has_voter(participant_id))
            },
            |overlay| overlay.action == VoteAction::Cast,
        )
    }

    /// Venues the participant currently votes for, overlays included.
    #[must_use]
    pub fn votes_of(&self, store: &ReplicaStore, participant_id: &ParticipantId) -> Vec<VenueId> {
        self.display_statistics(store)
            .into_iter()
            .filter(|stats| stats.has_voter(participant_id))
            .map(|stats| stats.venue_id)
            .collect()
    }

    /// Authoritative statistics with overlays applied, ordered by venue.
    #[must_use]
    pub fn display_statistics(&self, store: &ReplicaStore) -> Vec<VoteStatistics> {
        let mut merged: BTreeMap<VenueId, VoteStatistics> = store.statistics().clone();

        for ((venue_id, participant_id), overlay) in &self.overlays {
            match overlay.action {
                VoteAction::Cast => {
                    merged
                        .entry(venue_id.clone())
                        .or_insert_with(|| VoteStatistics::from_voters(venue_id.clone(), Vec::new()))
                        .add_voter(participant_id);
                }
                VoteAction::Remove => {
                    if let Some(stats) = merged.get_mut(venue_id) {
                        stats.remove_voter(participant_id);
                    }
                }
            }
        }

        merged.into_values().collect()
    }

    fn settle(&mut self, key: &OverlayKey) {
        if let Some(overlay) = self.overlays.get_mut(key) {
            overlay.settled = true;
        }
    }
}
