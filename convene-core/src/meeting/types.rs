//! Core types for meeting events.
//!
//! This module defines the meeting event graph held by the replica: the
//! event itself, its participants, and the venues they vote on.
//!
//! # Privacy Model
//!
//! A participant's true location lives only inside [`Participant`]. The
//! rendering layer never sees a `Participant`; it sees
//! [`ParticipantView`](crate::replica::ParticipantView), which carries the
//! fuzzed coordinate and address for participants with `fuzzy_location` set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::ids::{EventId, ParticipantId, VenueId};
use crate::geometry::{Circle, Location};

/// Per-participant credential issued by the meeting service.
///
/// Owned by that participant only. Never serialized, redacted from `Debug`,
/// wiped from memory on drop, and compared in constant time.
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Returns the raw token for use in a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for AccessToken {}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Event-level settings, carried through the core untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventSettings {
    /// Whether newly added participants start with fuzzy location enabled
    #[serde(default)]
    pub default_fuzzy_location: bool,

    /// Venue categories the organizer wants to search
    #[serde(default)]
    pub venue_categories: Vec<String>,
}

/// A person taking part in a meeting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique within the event
    pub id: ParticipantId,

    /// Display name
    pub name: String,

    /// True location, `None` until geocoded
    #[serde(default)]
    pub location: Option<Location>,

    /// Full street address, if known
    #[serde(default)]
    pub address: Option<String>,

    /// Whether others may only see a fuzzed location
    #[serde(default)]
    pub fuzzy_location: bool,

    /// Display color (e.g. `#3b82f6`)
    pub color: String,

    // Never serialized: only the owning participant ever holds it
    /// Access token, present only for the local participant
    #[serde(skip)]
    pub access_token: Option<AccessToken>,
}

impl Participant {
    /// Creates a participant with no location.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: None,
            address: None,
            fuzzy_location: false,
            color: color.into(),
            access_token: None,
        }
    }

    /// Sets the true location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the street address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Enables or disables fuzzy location.
    #[must_use]
    pub fn with_fuzzy_location(mut self, fuzzy: bool) -> Self {
        self.fuzzy_location = fuzzy;
        self
    }

    /// Merges the fields present in `update` into this participant.
    ///
    /// Returns whether anything that affects the displayed location
    /// (coordinates or the fuzzy flag) changed.
    pub fn merge(&mut self, update: &ParticipantUpdate) -> bool {
        let mut location_changed = false;

        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(location) = update.location {
            location_changed |= self.location != Some(location);
            self.location = Some(location);
        }
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
        if let Some(fuzzy) = update.fuzzy_location {
            location_changed |= self.fuzzy_location != fuzzy;
            self.fuzzy_location = fuzzy;
        }
        if let Some(color) = &update.color {
            self.color.clone_from(color);
        }

        location_changed
    }
}

/// Partial participant update. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParticipantUpdate {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New true location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// New street address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// New fuzzy-location flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_location: Option<bool>,

    /// New display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ParticipantUpdate {
    /// Returns whether this update would move the participant's marker.
    #[must_use]
    pub const fn affects_location(&self) -> bool {
        self.location.is_some() || self.fuzzy_location.is_some()
    }
}

/// Scalar event fields that `EventUpdated` overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventMetadata {
    /// Event title
    pub title: String,

    /// Scheduled time, if set
    #[serde(default)]
    pub meeting_time: Option<DateTime<Utc>>,

    /// Event settings
    #[serde(default)]
    pub settings: EventSettings,
}

/// A meeting event: the group, its participants, and its outcome.
///
/// Once `published_venue_id` is set, the event is frozen for voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingEvent {
    /// Event identifier
    pub id: EventId,

    /// Event title
    pub title: String,

    /// Scheduled time, if set
    #[serde(default)]
    pub meeting_time: Option<DateTime<Utc>>,

    /// Participants in join order
    #[serde(default)]
    pub participants: Vec<Participant>,

    /// Venue chosen by the organizer; freezes voting when set
    #[serde(default)]
    pub published_venue_id: Option<VenueId>,

    /// When the venue was published
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Cached fairness circle, derived locally and never sent on the wire
    #[serde(skip)]
    pub mec: Option<Circle>,

    /// Event settings
    #[serde(default)]
    pub settings: EventSettings,
}

impl MeetingEvent {
    /// Creates an empty, unpublished event.
    #[must_use]
    pub fn new(id: impl Into<EventId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            meeting_time: None,
            participants: Vec::new(),
            published_venue_id: None,
            published_at: None,
            mec: None,
            settings: EventSettings::default(),
        }
    }

    /// Returns whether voting is closed.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        self.published_venue_id.is_some()
    }

    /// Finds a participant by id.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Returns the scalar metadata of this event.
    #[must_use]
    pub fn metadata(&self) -> EventMetadata {
        EventMetadata {
            title: self.title.clone(),
            meeting_time: self.meeting_time,
            settings: self.settings.clone(),
        }
    }
}

/// A candidate venue. Owned by the external venue catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Venue identifier
    pub id: VenueId,

    /// Venue name
    pub name: String,

    /// Venue location
    pub location: Location,

    /// Category (e.g. `cafe`, `restaurant`)
    pub category: String,

    /// Average rating, if known
    #[serde(default)]
    pub rating: Option<f64>,

    /// Number of reviews behind `rating`
    #[serde(default)]
    pub review_count: Option<u32>,
}
