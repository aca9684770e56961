//! The local replica store.
//!
//! [`ReplicaStore`] owns the client's copy of one meeting event: the event
//! graph, the authoritative vote statistics, the UI selection, and the fuzz
//! offsets that stand in for fuzzy participants' true locations. Every
//! mutation is a method taking explicit inputs; nothing is global.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::view::ParticipantView;
use crate::geometry::{compute_mec_with_rng, Circle, Location};
use crate::location::{fuzz_address, FuzzConfig, FuzzOffset, FuzzPolicy};
use crate::meeting::{
    EventId, EventMetadata, MeetingEvent, Participant, ParticipantId, ParticipantUpdate,
    VenueId, VoteDeltaKind,
};
use crate::vote::VoteStatistics;

/// Client-held state for one subscribed meeting event.
///
/// Exactly one store exists per subscription. It is owned by the sync
/// worker; callers only ever see [`ReplicaSnapshot`](super::ReplicaSnapshot)s.
#[derive(Debug)]
pub struct ReplicaStore {
    event: MeetingEvent,
    statistics: BTreeMap<VenueId, VoteStatistics>,
    own_participant_id: Option<ParticipantId>,
    selected_participant: Option<ParticipantId>,
    fuzz_config: FuzzConfig,
    fuzz_policy: FuzzPolicy,
    fuzz_offsets: HashMap<ParticipantId, FuzzOffset>,
    rng: StdRng,
}

impl ReplicaStore {
    /// Creates a store holding `event` with default fuzzing.
    #[must_use]
    pub fn new(event: MeetingEvent) -> Self {
        let mut store = Self {
            event,
            statistics: BTreeMap::new(),
            own_participant_id: None,
            selected_participant: None,
            fuzz_config: FuzzConfig::default(),
            fuzz_policy: FuzzPolicy::default(),
            fuzz_offsets: HashMap::new(),
            rng: StdRng::from_entropy(),
        };
        store.refresh_locations();
        store
    }

    /// Creates a store for an event whose contents are not yet known.
    #[must_use]
    pub fn empty(event_id: EventId) -> Self {
        Self::new(MeetingEvent::new(event_id, String::new()))
    }

    /// Sets the fuzz band and offset policy.
    #[must_use]
    pub fn with_fuzz(mut self, config: FuzzConfig, policy: FuzzPolicy) -> Self {
        self.fuzz_config = config;
        self.fuzz_policy = policy;
        self.fuzz_offsets.clear();
        self.refresh_locations();
        self
    }

    /// Seeds the RNG used for fuzzing and the MEC shuffle.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.fuzz_offsets.clear();
        self.refresh_locations();
        self
    }

    // ==================== Accessors ====================

    /// The event graph.
    #[must_use]
    pub const fn event(&self) -> &MeetingEvent {
        &self.event
    }

    /// The subscribed event's id.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event.id
    }

    /// Finds a participant by id.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.event.participant(id)
    }

    /// Authoritative vote statistics keyed by venue.
    #[must_use]
    pub const fn statistics(&self) -> &BTreeMap<VenueId, VoteStatistics> {
        &self.statistics
    }

    /// The cached fairness circle, `None` when no participant has a location.
    #[must_use]
    pub const fn circle(&self) -> Option<&Circle> {
        self.event.mec.as_ref()
    }

    /// The local participant, if identity has been restored.
    #[must_use]
    pub const fn own_participant_id(&self) -> Option<&ParticipantId> {
        self.own_participant_id.as_ref()
    }

    /// The participant currently selected in the UI.
    #[must_use]
    pub const fn selected_participant(&self) -> Option<&ParticipantId> {
        self.selected_participant.as_ref()
    }

    // ==================== Participants ====================

    /// Appends a participant. Returns `false` if the id already exists.
    pub fn add_participant(&mut self, participant: Participant) -> bool {
        if self.participant(&participant.id).is_some() {
            return false;
        }
        self.event.participants.push(participant);
        self.refresh_locations();
        true
    }

    /// Merges `update` into an existing participant.
    ///
    /// Returns `None` if the participant is absent, otherwise whether the
    /// displayed location changed.
    pub fn update_participant(
        &mut self,
        id: &ParticipantId,
        update: &ParticipantUpdate,
    ) -> Option<bool> {
        let participant = self.event.participants.iter_mut().find(|p| &p.id == id)?;
        let location_changed = participant.merge(update);
        if location_changed {
            if self.fuzz_policy == FuzzPolicy::Jitter {
                self.fuzz_offsets.remove(id);
            }
            self.refresh_locations();
        }
        Some(location_changed)
    }

    /// Removes a participant. Returns `false` if absent.
    ///
    /// Clears the UI selection if it pointed at the removed participant.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> bool {
        let before = self.event.participants.len();
        self.event.participants.retain(|p| &p.id != id);
        if self.event.participants.len() == before {
            return false;
        }

        if self.selected_participant.as_ref() == Some(id) {
            self.selected_participant = None;
        }
        self.fuzz_offsets.remove(id);
        self.refresh_locations();
        true
    }

    /// Selects a participant in the UI. Returns `false` for unknown ids.
    pub fn select_participant(&mut self, id: Option<ParticipantId>) -> bool {
        match id {
            Some(id) if self.participant(&id).is_none() => false,
            other => {
                self.selected_participant = other;
                true
            }
        }
    }

    /// Records which participant is the local user.
    ///
    /// The local participant always sees their own true location.
    pub fn set_own_participant(&mut self, id: Option<ParticipantId>) {
        if self.own_participant_id != id {
            self.own_participant_id = id;
            self.refresh_locations();
        }
    }

    // ==================== Event Metadata ====================

    /// Overwrites title, time, and settings.
    pub fn set_metadata(&mut self, metadata: EventMetadata) {
        self.event.title = metadata.title;
        self.event.meeting_time = metadata.meeting_time;
        self.event.settings = metadata.settings;
    }

    /// Overwrites the publication fields.
    pub fn set_publication(
        &mut self,
        venue_id: Option<VenueId>,
        published_at: Option<DateTime<Utc>>,
    ) {
        self.event.published_venue_id = venue_id;
        self.event.published_at = published_at;
    }

    /// Replaces the whole event graph with an authoritative copy.
    ///
    /// Selection survives only if the selected participant still exists.
    pub fn replace_event(&mut self, event: MeetingEvent) {
        self.event = event;

        let present: HashSet<&ParticipantId> =
            self.event.participants.iter().map(|p| &p.id).collect();
        if let Some(selected) = &self.selected_participant {
            if !present.contains(selected) {
                self.selected_participant = None;
            }
        }
        match self.fuzz_policy {
            FuzzPolicy::PerSession => self.fuzz_offsets.retain(|id, _| present.contains(id)),
            FuzzPolicy::Jitter => self.fuzz_offsets.clear(),
        }
        self.refresh_locations();
    }

    // ==================== Votes ====================

    /// Wholesale replaces the vote statistics.
    ///
    /// Returns the venues the new statistics cover.
    pub fn replace_statistics(&mut self, statistics: Vec<VoteStatistics>) -> HashSet<VenueId> {
        self.statistics = statistics
            .into_iter()
            .map(|stats| (stats.venue_id.clone(), stats))
            .collect();
        self.statistics.keys().cloned().collect()
    }

    /// Applies one authoritative vote change. Returns whether it changed
    /// anything.
    pub fn apply_vote_delta(
        &mut self,
        venue_id: &VenueId,
        participant_id: &ParticipantId,
        kind: VoteDeltaKind,
    ) -> bool {
        match kind {
            VoteDeltaKind::Cast => self
                .statistics
                .entry(venue_id.clone())
                .or_insert_with(|| VoteStatistics::from_voters(venue_id.clone(), Vec::new()))
                .add_voter(participant_id),
            VoteDeltaKind::Removed => self
                .statistics
                .get_mut(venue_id)
                .is_some_and(|stats| stats.remove_voter(participant_id)),
        }
    }

    // ==================== Derived State ====================

    /// The location other participants are allowed to see.
    ///
    /// Fuzzy participants show their offset location; the local participant
    /// sees their own true location.
    #[must_use]
    pub fn visible_location(&self, participant: &Participant) -> Option<Location> {
        let location = participant.location?;
        if !self.is_hidden(participant) {
            return Some(location);
        }
        // No offset yet means nothing safe to show
        self.fuzz_offsets
            .get(&participant.id)
            .map(|offset| offset.apply(&location))
    }

    /// Builds the views handed to the rendering layer.
    #[must_use]
    pub fn participant_views(&self) -> Vec<ParticipantView> {
        self.event
            .participants
            .iter()
            .map(|participant| {
                let hidden = self.is_hidden(participant);
                let address = participant.address.as_deref().map(|address| {
                    if hidden {
                        fuzz_address(address)
                    } else {
                        address.to_string()
                    }
                });

                ParticipantView {
                    id: participant.id.clone(),
                    name: participant.name.clone(),
                    color: participant.color.clone(),
                    fuzzy_location: participant.fuzzy_location,
                    location: self.visible_location(participant),
                    address,
                    is_self: self.is_self(&participant.id),
                    is_selected: self.selected_participant.as_ref() == Some(&participant.id),
                }
            })
            .collect()
    }

    fn is_self(&self, id: &ParticipantId) -> bool {
        self.own_participant_id.as_ref() == Some(id)
    }

    fn is_hidden(&self, participant: &Participant) -> bool {
        participant.fuzzy_location && !self.is_self(&participant.id)
    }

    /// Draws missing fuzz offsets and recomputes the fairness circle.
    ///
    /// The circle is taken over true locations so that every replica of the
    /// event agrees on it and it encloses every participant. Fuzzing applies
    /// to participant views only.
    fn refresh_locations(&mut self) {
        for participant in &self.event.participants {
            if participant.fuzzy_location && !self.fuzz_offsets.contains_key(&participant.id) {
                let offset = FuzzOffset::random(&self.fuzz_config, &mut self.rng);
                self.fuzz_offsets.insert(participant.id.clone(), offset);
            }
        }

        let points: Vec<Location> = self
            .event
            .participants
            .iter()
            .filter_map(|p| p.location)
            .collect();

        self.event.mec = if points.is_empty() {
            None
        } else {
            Some(compute_mec_with_rng(&points, &mut self.rng))
        };
    }
}
