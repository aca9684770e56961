//! Contracts for the external meeting service.
//!
//! The core never talks to a network directly. A host application supplies
//! a [`MeetingService`] (HTTP, in-process, or a test double) and the sync
//! layer drives it.

use async_trait::async_trait;

use super::error::ServiceResult;
use super::types::{EventUpdate, JoinedParticipant, NewMeetingEvent, NewParticipant, StreamMessage};
use crate::meeting::{
    AccessToken, EventId, MeetingEvent, Participant, ParticipantId, ParticipantUpdate, VenueId,
};
use crate::vote::VoteStatistics;

/// Request/response access to the authoritative meeting state.
///
/// Mutations that act on behalf of a participant take that participant's
/// token. Implementations report a missing or stale token as
/// [`ServiceError::Unauthorized`](super::ServiceError::Unauthorized) and a
/// duplicate vote as [`ServiceError::Conflict`](super::ServiceError::Conflict).
///
/// [`create_event`](Self::create_event), [`delete_event`](Self::delete_event)
/// and [`add_participant`](Self::add_participant) happen before a session
/// exists or after it ends, so the host application calls them directly.
/// Everything else is driven through a [`SyncSession`](crate::sync::SyncSession).
#[async_trait]
pub trait MeetingService: Send + Sync + 'static {
    // ==================== Events ====================

    /// Creates a meeting event.
    async fn create_event(&self, request: NewMeetingEvent) -> ServiceResult<MeetingEvent>;

    /// Fetches the full event graph.
    async fn get_event(&self, event_id: &EventId) -> ServiceResult<MeetingEvent>;

    /// Updates title, time, or settings.
    async fn update_event(
        &self,
        event_id: &EventId,
        update: EventUpdate,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Deletes an event.
    async fn delete_event(&self, event_id: &EventId, token: Option<&AccessToken>)
        -> ServiceResult<()>;

    /// Publishes the chosen venue, closing voting.
    async fn publish_venue(
        &self,
        event_id: &EventId,
        venue_id: &VenueId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Clears the published venue, reopening voting.
    async fn unpublish_venue(
        &self,
        event_id: &EventId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    // ==================== Participants ====================

    /// Joins the event as a new participant.
    async fn add_participant(
        &self,
        event_id: &EventId,
        participant: NewParticipant,
    ) -> ServiceResult<JoinedParticipant>;

    /// Updates a participant.
    async fn update_participant(
        &self,
        event_id: &EventId,
        participant_id: &ParticipantId,
        update: ParticipantUpdate,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Removes a participant.
    async fn remove_participant(
        &self,
        event_id: &EventId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Resolves a token to the participant it belongs to.
    async fn fetch_me(&self, event_id: &EventId, token: &AccessToken) -> ServiceResult<Participant>;

    // ==================== Votes ====================

    /// Records a vote.
    async fn cast_vote(
        &self,
        event_id: &EventId,
        venue_id: &VenueId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Withdraws a vote.
    async fn remove_vote(
        &self,
        event_id: &EventId,
        venue_id: &VenueId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()>;

    /// Fetches authoritative per-venue vote statistics.
    async fn fetch_vote_statistics(&self, event_id: &EventId)
        -> ServiceResult<Vec<VoteStatistics>>;

    // ==================== Push Channel ====================

    /// Opens the event's change channel.
    async fn subscribe(&self, event_id: &EventId) -> ServiceResult<Box<dyn ChangeStream>>;
}

/// One event's push channel.
#[async_trait]
pub trait ChangeStream: Send {
    /// Waits for the next message.
    ///
    /// `None` means the channel closed; an error means it broke. Either way
    /// the caller reconnects.
    ///
    /// Each stream is polled to completion by a dedicated reader task, so
    /// implementations need not be cancel-safe.
    async fn next(&mut self) -> Option<ServiceResult<StreamMessage>>;
}
