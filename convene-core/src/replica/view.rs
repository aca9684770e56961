//! Read-only views handed to the rendering layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geometry::{Circle, Location};
use crate::meeting::{EventId, EventSettings, ParticipantId, VenueId};
use crate::vote::VoteStatistics;

/// What the rendering layer may know about a participant.
///
/// For fuzzy participants (other than the local user) `location` and
/// `address` are the fuzzed values; the true ones never appear here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantView {
    /// Participant id
    pub id: ParticipantId,
    /// Display name
    pub name: String,
    /// Display color
    pub color: String,
    /// Whether the participant asked for a fuzzy location
    pub fuzzy_location: bool,
    /// Location to draw, `None` until geocoded
    pub location: Option<Location>,
    /// Address to show
    pub address: Option<String>,
    /// Whether this is the local participant
    pub is_self: bool,
    /// Whether the UI has this participant selected
    pub is_selected: bool,
}

/// A settled, immutable copy of the replica.
///
/// Published by the sync worker after every applied change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaSnapshot {
    /// Subscribed event
    pub event_id: EventId,
    /// Event title
    pub title: String,
    /// Scheduled time
    pub meeting_time: Option<DateTime<Utc>>,
    /// Event settings
    pub settings: EventSettings,
    /// Published venue, if voting is closed
    pub published_venue_id: Option<VenueId>,
    /// Publication time
    pub published_at: Option<DateTime<Utc>>,
    /// Participants in join order
    pub participants: Vec<ParticipantView>,
    /// Fairness circle over participants' true locations
    pub circle: Option<Circle>,
    /// Vote statistics with optimistic overlays applied
    pub vote_statistics: Vec<VoteStatistics>,
    /// Local participant
    pub own_participant_id: Option<ParticipantId>,
    /// Venues the local participant currently votes for
    pub own_votes: Vec<VenueId>,
    /// UI selection
    pub selected_participant: Option<ParticipantId>,
    /// Vote requests still awaiting a response
    pub pending_votes: usize,
    /// Whether at least one authoritative snapshot has been applied
    pub reconciled: bool,
}

impl ReplicaSnapshot {
    /// An empty snapshot for an event that has not been fetched yet.
    #[must_use]
    pub fn empty(event_id: EventId) -> Self {
        Self {
            event_id,
            title: String::new(),
            meeting_time: None,
            settings: EventSettings::default(),
            published_venue_id: None,
            published_at: None,
            participants: Vec::new(),
            circle: None,
            vote_statistics: Vec::new(),
            own_participant_id: None,
            own_votes: Vec::new(),
            selected_participant: None,
            pending_votes: 0,
            reconciled: false,
        }
    }

    /// Finds a participant view by id.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Returns the displayed vote count for a venue (zero if unknown).
    #[must_use]
    pub fn vote_count(&self, venue_id: &VenueId) -> u32 {
        self.vote_statistics
            .iter()
            .find(|s| &s.venue_id == venue_id)
            .map_or(0, |s| s.vote_count)
    }

    /// Returns whether voting is closed.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        self.published_venue_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_unreconciled() {
        let snapshot = ReplicaSnapshot::empty(EventId::new("e1"));
        assert!(!snapshot.reconciled);
        assert!(!snapshot.is_published());
        assert_eq!(snapshot.vote_count(&VenueId::new("v1")), 0);
    }

    #[test]
    fn snapshot_json_has_no_true_location_field() {
        let mut snapshot = ReplicaSnapshot::empty(EventId::new("e1"));
        snapshot.participants.push(ParticipantView {
            id: ParticipantId::new("p1"),
            name: "Ada".to_string(),
            color: "#fff".to_string(),
            fuzzy_location: true,
            location: Some(Location::new(1.0, 2.0)),
            address: Some("Near Main St, Town".to_string()),
            is_self: false,
            is_selected: false,
        });
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("access_token"));
        assert!(json.contains("Near Main St"));
    }
}
