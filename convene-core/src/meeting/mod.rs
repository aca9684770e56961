//! Meeting event model.
//!
//! Defines the data the replica holds for one meeting event and the
//! change events that mutate it.
//!
//! # Types
//!
//! - [`MeetingEvent`]: The event, its participants and its outcome
//! - [`Participant`]: A person with a (possibly fuzzy) location
//! - [`Venue`]: A candidate venue from the external catalog
//! - [`ChangeEvent`]: One incremental change pushed by the service

mod change;
mod ids;
mod types;

pub use change::{ChangeEvent, VoteDeltaKind};
pub use ids::{EventId, ParticipantId, VenueId};
pub use types::{
    AccessToken, EventMetadata, EventSettings, MeetingEvent, Participant, ParticipantUpdate,
    Venue,
};
