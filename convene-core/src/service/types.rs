//! Request and stream payloads for the meeting service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Location;
use crate::meeting::{AccessToken, EventSettings, Participant};

/// One message from an event's push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// The channel is live. Change messages before this are stale.
    Connected,
    /// A raw JSON-encoded [`ChangeEvent`](crate::meeting::ChangeEvent).
    Change(String),
}

/// Request to create a meeting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeetingEvent {
    /// Event title
    pub title: String,
    /// Scheduled time
    #[serde(default)]
    pub meeting_time: Option<DateTime<Utc>>,
    /// Event settings
    #[serde(default)]
    pub settings: EventSettings,
}

/// Request to join a meeting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    /// Display name
    pub name: String,
    /// True location, if already geocoded
    #[serde(default)]
    pub location: Option<Location>,
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
    /// Whether to hide the true location from others
    #[serde(default)]
    pub fuzzy_location: bool,
    /// Display color
    pub color: String,
}

/// Partial event update. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventUpdate {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New scheduled time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<DateTime<Utc>>,
    /// New settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<EventSettings>,
}

/// A participant returned by a successful join, with the credential that
/// authorizes their own mutations.
#[derive(Debug, Clone)]
pub struct JoinedParticipant {
    /// The participant as stored by the service
    pub participant: Participant,
    /// Credential for the new participant
    pub access_token: AccessToken,
}
