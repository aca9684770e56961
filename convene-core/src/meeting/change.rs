//! Change events pushed by the meeting service.
//!
//! Each event names the meeting it belongs to and carries a typed payload.
//! On the wire an event is a JSON object with a snake_case `type` tag:
//!
//! ```json
//! {"type": "participant_removed", "event_id": "e1", "participant_id": "p2"}
//! ```
//!
//! Events are consumed exactly once by the sync worker and then discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, ParticipantId, VenueId};
use super::types::{EventMetadata, Participant, ParticipantUpdate};
use crate::vote::VoteStatistics;

/// Direction of a single vote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDeltaKind {
    /// The participant now votes for the venue.
    Cast,
    /// The participant no longer votes for the venue.
    Removed,
}

/// An incremental change to one meeting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Title, time, or settings changed.
    EventUpdated {
        /// Target event
        event_id: EventId,
        /// New scalar fields
        metadata: EventMetadata,
    },

    /// A venue was published, or unpublished when `published_venue_id` is null.
    EventPublished {
        /// Target event
        event_id: EventId,
        /// Published venue, `None` to reopen voting
        published_venue_id: Option<VenueId>,
        /// Publication time
        #[serde(default)]
        published_at: Option<DateTime<Utc>>,
    },

    /// A participant joined.
    ParticipantAdded {
        /// Target event
        event_id: EventId,
        /// The new participant
        participant: Participant,
    },

    /// A participant changed name, location, color, or privacy.
    ParticipantUpdated {
        /// Target event
        event_id: EventId,
        /// Participant being updated
        participant_id: ParticipantId,
        /// Fields to merge
        update: ParticipantUpdate,
    },

    /// A participant left.
    ParticipantRemoved {
        /// Target event
        event_id: EventId,
        /// Participant that left
        participant_id: ParticipantId,
    },

    /// Authoritative vote statistics, replacing whatever the client holds.
    VoteStatisticsReplaced {
        /// Target event
        event_id: EventId,
        /// Per-venue statistics
        statistics: Vec<VoteStatistics>,
    },

    /// A single vote change, numbered by the service.
    VoteDelta {
        /// Target event
        event_id: EventId,
        /// Monotonic sequence number per event
        seq: u64,
        /// Venue voted on
        venue_id: VenueId,
        /// Voter
        participant_id: ParticipantId,
        /// Cast or removed
        kind: VoteDeltaKind,
    },
}

impl ChangeEvent {
    /// Returns the meeting event this change belongs to.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        match self {
            Self::EventUpdated { event_id, .. }
            | Self::EventPublished { event_id, .. }
            | Self::ParticipantAdded { event_id, .. }
            | Self::ParticipantUpdated { event_id, .. }
            | Self::ParticipantRemoved { event_id, .. }
            | Self::VoteStatisticsReplaced { event_id, .. }
            | Self::VoteDelta { event_id, .. } => event_id,
        }
    }

    /// Returns the wire tag, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EventUpdated { .. } => "event_updated",
            Self::EventPublished { .. } => "event_published",
            Self::ParticipantAdded { .. } => "participant_added",
            Self::ParticipantUpdated { .. } => "participant_updated",
            Self::ParticipantRemoved { .. } => "participant_removed",
            Self::VoteStatisticsReplaced { .. } => "vote_statistics_replaced",
            Self::VoteDelta { .. } => "vote_delta",
        }
    }

    /// Parses a change event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, the tag is unknown, or a
    /// required payload field is missing.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes this change event to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (extremely rare).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
