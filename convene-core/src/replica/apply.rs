//! Applying change events and snapshots to the replica.
//!
//! [`Replica`] is the single application point: every [`ChangeEvent`] goes
//! through one exhaustive match in [`Replica::apply_change_event`], and every
//! authoritative snapshot through [`Replica::apply_snapshot`]. All rules are
//! idempotent, so replaying an event leaves the replica unchanged.

use tracing::debug;

use super::store::ReplicaStore;
use super::view::{ParticipantView, ReplicaSnapshot};
use crate::geometry::Circle;
use crate::location::{FuzzConfig, FuzzPolicy};
use crate::meeting::{ChangeEvent, EventId, MeetingEvent, ParticipantId, VenueId};
use crate::service::ServiceResult;
use crate::vote::{
    PendingVote, VoteAction, VoteAggregator, VoteIntent, VoteOutcome, VoteResult, VoteStatistics,
};

/// Why a change event left the replica untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event belongs to another meeting.
    ForeignEvent(EventId),
    /// A participant with this id already exists.
    DuplicateParticipant(ParticipantId),
    /// No participant with this id exists.
    UnknownParticipant(ParticipantId),
    /// A vote delta at or below the last applied sequence number.
    StaleSequence {
        /// Last applied sequence number
        last: u64,
        /// Sequence number received
        received: u64,
    },
}

/// Result of applying one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The replica was updated.
    Applied,
    /// The event was a no-op.
    Ignored(IgnoreReason),
    /// One or more vote deltas were missed. The delta was dropped and the
    /// replica needs a reconciliation.
    GapDetected {
        /// Sequence number that should have come next
        expected: u64,
        /// Sequence number received
        received: u64,
    },
}

impl ApplyOutcome {
    /// Returns whether the replica changed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The client replica of one meeting event.
///
/// Combines the [`ReplicaStore`] with the optimistic [`VoteAggregator`] and
/// the vote delta sequence tracker. One replica exists per subscription.
///
/// # Example
///
/// ```
/// use convene_core::meeting::{ChangeEvent, EventId, Participant};
/// use convene_core::replica::{ApplyOutcome, Replica};
///
/// let mut replica = Replica::empty(EventId::new("e1"));
/// let event = ChangeEvent::ParticipantAdded {
///     event_id: EventId::new("e1"),
///     participant: Participant::new("p1", "Ada", "#e91e63"),
/// };
///
/// assert_eq!(replica.apply_change_event(event.clone()), ApplyOutcome::Applied);
/// assert!(!replica.apply_change_event(event).is_applied());
/// ```
#[derive(Debug)]
pub struct Replica {
    store: ReplicaStore,
    votes: VoteAggregator,
    last_vote_seq: Option<u64>,
    reconciled: bool,
}

impl Replica {
    /// Creates a replica holding `event`.
    #[must_use]
    pub fn new(event: MeetingEvent) -> Self {
        Self::from_store(ReplicaStore::new(event))
    }

    /// Creates a replica for an event that has not been fetched yet.
    #[must_use]
    pub fn empty(event_id: EventId) -> Self {
        Self::from_store(ReplicaStore::empty(event_id))
    }

    /// Wraps an existing store.
    #[must_use]
    pub fn from_store(store: ReplicaStore) -> Self {
        Self {
            store,
            votes: VoteAggregator::new(),
            last_vote_seq: None,
            reconciled: false,
        }
    }

    /// Sets the fuzz band and offset policy.
    #[must_use]
    pub fn with_fuzz(mut self, config: FuzzConfig, policy: FuzzPolicy) -> Self {
        self.store = self.store.with_fuzz(config, policy);
        self
    }

    /// Seeds the RNG used for fuzzing and the MEC shuffle.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.store = self.store.with_rng_seed(seed);
        self
    }

    // ==================== Change Application ====================

    /// Applies one change event.
    ///
    /// Events for a different meeting are ignored. Vote deltas are
    /// sequence-checked: the first delta after a reconciliation sets the
    /// baseline, older ones are dropped, and a skipped number is reported
    /// as [`ApplyOutcome::GapDetected`].
    pub fn apply_change_event(&mut self, event: ChangeEvent) -> ApplyOutcome {
        if event.event_id() != self.store.event_id() {
            let outcome =
                ApplyOutcome::Ignored(IgnoreReason::ForeignEvent(event.event_id().clone()));
            debug!(kind = event.kind(), event_id = %event.event_id(), "Ignoring foreign event");
            return outcome;
        }

        let event_kind = event.kind();
        let outcome = match event {
            ChangeEvent::EventUpdated { metadata, .. } => {
                self.store.set_metadata(metadata);
                ApplyOutcome::Applied
            }
            ChangeEvent::EventPublished {
                published_venue_id,
                published_at,
                ..
            } => {
                self.store.set_publication(published_venue_id, published_at);
                ApplyOutcome::Applied
            }
            ChangeEvent::ParticipantAdded { participant, .. } => {
                let id = participant.id.clone();
                if self.store.add_participant(participant) {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Ignored(IgnoreReason::DuplicateParticipant(id))
                }
            }
            ChangeEvent::ParticipantUpdated {
                participant_id,
                update,
                ..
            } => match self.store.update_participant(&participant_id, &update) {
                Some(_) => ApplyOutcome::Applied,
                None => ApplyOutcome::Ignored(IgnoreReason::UnknownParticipant(participant_id)),
            },
            ChangeEvent::ParticipantRemoved { participant_id, .. } => {
                if self.store.remove_participant(&participant_id) {
                    self.votes.forget_participant(&participant_id);
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Ignored(IgnoreReason::UnknownParticipant(participant_id))
                }
            }
            ChangeEvent::VoteStatisticsReplaced { statistics, .. } => {
                self.replace_statistics(statistics);
                ApplyOutcome::Applied
            }
            ChangeEvent::VoteDelta {
                seq,
                venue_id,
                participant_id,
                kind,
                ..
            } => match self.check_sequence(seq) {
                Some(rejected) => rejected,
                None => {
                    self.store.apply_vote_delta(&venue_id, &participant_id, kind);
                    self.votes.on_vote_delta(&venue_id, &participant_id);
                    ApplyOutcome::Applied
                }
            },
        };

        debug!(kind = event_kind, ?outcome, "Applied change event");
        outcome
    }

    /// Replaces event and vote state with an authoritative snapshot.
    ///
    /// Resets the vote sequence baseline. Overlays for venues the snapshot
    /// covers are discarded, as are all settled overlays.
    pub fn apply_snapshot(&mut self, event: MeetingEvent, statistics: Vec<VoteStatistics>) {
        let removed: Vec<ParticipantId> = self
            .store
            .event()
            .participants
            .iter()
            .filter(|p| event.participant(&p.id).is_none())
            .map(|p| p.id.clone())
            .collect();
        for id in &removed {
            self.votes.forget_participant(id);
        }

        self.store.replace_event(event);
        self.replace_statistics(statistics);
        self.last_vote_seq = None;
        self.reconciled = true;
    }

    fn replace_statistics(&mut self, statistics: Vec<VoteStatistics>) {
        let covered = self.store.replace_statistics(statistics);
        self.votes.on_statistics_replaced(&covered);
    }

    /// Returns `None` if the delta may be applied.
    fn check_sequence(&mut self, seq: u64) -> Option<ApplyOutcome> {
        if let Some(last) = self.last_vote_seq {
            if seq <= last {
                return Some(ApplyOutcome::Ignored(IgnoreReason::StaleSequence {
                    last,
                    received: seq,
                }));
            }
            let expected = last.saturating_add(1);
            if seq > expected {
                return Some(ApplyOutcome::GapDetected {
                    expected,
                    received: seq,
                });
            }
        }
        self.last_vote_seq = Some(seq);
        None
    }

    // ==================== Votes ====================

    /// Starts an optimistic cast or remove. See [`VoteAggregator::begin`].
    ///
    /// # Errors
    ///
    /// Returns [`VoteError`](crate::vote::VoteError) if voting is closed or
    /// the participant is unknown.
    pub fn begin_vote(
        &mut self,
        action: VoteAction,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> VoteResult<VoteIntent> {
        self.votes
            .begin(&self.store, action, participant_id, venue_id)
    }

    /// Finishes a vote request. See [`VoteAggregator::complete`].
    ///
    /// # Errors
    ///
    /// Returns the mapped service error after reverting the overlay.
    pub fn complete_vote(
        &mut self,
        pending: &PendingVote,
        result: ServiceResult<()>,
    ) -> VoteResult<VoteOutcome> {
        self.votes.complete(pending, result)
    }

    // ==================== Local State ====================

    /// Selects a participant in the UI. Returns `false` for unknown ids.
    pub fn select_participant(&mut self, id: Option<ParticipantId>) -> bool {
        self.store.select_participant(id)
    }

    /// Records which participant is the local user.
    pub fn set_own_participant(&mut self, id: Option<ParticipantId>) {
        self.store.set_own_participant(id);
    }

    // ==================== Accessors ====================

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &ReplicaStore {
        &self.store
    }

    /// The subscribed event's id.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        self.store.event_id()
    }

    /// Whether at least one snapshot has been applied.
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    /// Last applied vote delta sequence number.
    #[must_use]
    pub const fn last_vote_seq(&self) -> Option<u64> {
        self.last_vote_seq
    }

    /// Participant views with privacy applied.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantView> {
        self.store.participant_views()
    }

    /// The fairness circle, `None` when no participant has a location.
    #[must_use]
    pub fn circle(&self) -> Option<Circle> {
        self.store.circle().copied()
    }

    /// Vote statistics with optimistic overlays applied.
    #[must_use]
    pub fn vote_statistics(&self) -> Vec<VoteStatistics> {
        self.votes.display_statistics(&self.store)
    }

    /// Builds an immutable snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ReplicaSnapshot {
        let event = self.store.event();
        let own_participant_id = self.store.own_participant_id().cloned();
        let own_votes = own_participant_id
            .as_ref()
            .map(|id| self.votes.votes_of(&self.store, id))
            .unwrap_or_default();

        ReplicaSnapshot {
            event_id: event.id.clone(),
            title: event.title.clone(),
            meeting_time: event.meeting_time,
            settings: event.settings.clone(),
            published_venue_id: event.published_venue_id.clone(),
            published_at: event.published_at,
            participants: self.participants(),
            circle: self.circle(),
            vote_statistics: self.vote_statistics(),
            own_participant_id,
            own_votes,
            selected_participant: self.store.selected_participant().cloned(),
            pending_votes: self.votes.pending_count(),
            reconciled: self.reconciled,
        }
    }
}
