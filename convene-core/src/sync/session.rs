//! The caller-facing handle for one subscribed meeting event.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::SyncConfig;
use super::error::{SyncError, SyncResult};
use super::types::{ConnectionStatus, SyncNotice};
use super::worker::{Command, Mutation, Outputs, Worker};
use crate::geometry::Circle;
use crate::meeting::{AccessToken, EventId, ParticipantId, ParticipantUpdate, VenueId};
use crate::replica::{ParticipantView, Replica, ReplicaSnapshot};
use crate::service::{EventUpdate, MeetingService};
use crate::vote::{VoteAction, VoteError, VoteOutcome, VoteResult, VoteStatistics};

/// A live subscription to one meeting event.
///
/// Spawns a worker task that owns the replica, keeps the push channel
/// connected, and reconciles against the service. The handle only sends
/// commands and reads published snapshots.
///
/// Dropping the handle stops the worker, as does [`unsubscribe`](Self::unsubscribe).
///
/// # Example
///
/// ```rust,ignore
/// use convene_core::sync::{SyncConfig, SyncSession};
///
/// let session = SyncSession::spawn(service, EventId::new("e1"), SyncConfig::default())?;
///
/// let mut snapshots = session.watch_snapshot();
/// while snapshots.changed().await.is_ok() {
///     let snapshot = snapshots.borrow().clone();
///     render(&snapshot.participants, snapshot.circle);
/// }
/// ```
#[derive(Debug)]
pub struct SyncSession {
    event_id: EventId,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
    snapshot: watch::Receiver<ReplicaSnapshot>,
    notices: broadcast::Sender<SyncNotice>,
    worker: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// Subscribes to `event_id` and starts the worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` fails validation.
    pub fn spawn<S: MeetingService>(
        service: Arc<S>,
        event_id: EventId,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        config.validate()?;

        let replica =
            Replica::empty(event_id.clone()).with_fuzz(config.fuzz, config.fuzz_policy);

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (snapshot_tx, snapshot_rx) = watch::channel(replica.snapshot());
        let (notice_tx, _) = broadcast::channel(config.notice_buffer);

        let worker = Worker::new(
            service,
            config,
            replica,
            command_rx,
            shutdown_rx,
            Outputs {
                status: status_tx,
                snapshot: snapshot_tx,
                notices: notice_tx.clone(),
            },
        );
        let handle = tokio::spawn(worker.run());
        debug!(%event_id, "Sync session spawned");

        Ok(Self {
            event_id,
            commands: command_tx,
            shutdown: shutdown_tx,
            status: status_rx,
            snapshot: snapshot_rx,
            notices: notice_tx,
            worker: Some(handle),
        })
    }

    /// The subscribed event.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }

    // ==================== Observation ====================

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that wakes on every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The latest settled replica snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ReplicaSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that wakes on every published snapshot.
    #[must_use]
    pub fn watch_snapshot(&self) -> watch::Receiver<ReplicaSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribes to reconciliation, gap, and dropped-event notices.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// Participant views from the latest snapshot.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantView> {
        self.snapshot.borrow().participants.clone()
    }

    /// Fairness circle from the latest snapshot.
    #[must_use]
    pub fn circle(&self) -> Option<Circle> {
        self.snapshot.borrow().circle
    }

    /// Vote statistics (with optimistic overlays) from the latest snapshot.
    #[must_use]
    pub fn vote_statistics(&self) -> Vec<VoteStatistics> {
        self.snapshot.borrow().vote_statistics.clone()
    }

    // ==================== Votes ====================

    /// Casts a vote, optimistically.
    ///
    /// The displayed count moves before the service answers and is
    /// reverted if the request fails.
    ///
    /// # Errors
    ///
    /// - [`VoteError::VotingClosed`] if a venue is published (no request is sent)
    /// - [`VoteError::UnknownParticipant`] if the voter is not in the event
    /// - [`VoteError::Unauthorized`] if the service rejects the token
    /// - [`VoteError::Service`] for any other failure
    /// - [`VoteError::SessionClosed`] if the session has stopped
    pub async fn cast_vote(
        &self,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> VoteResult<VoteOutcome> {
        self.vote(VoteAction::Cast, participant_id, venue_id).await
    }

    /// Withdraws a vote, optimistically. Withdrawing a vote that does not
    /// exist succeeds with [`VoteOutcome::Unchanged`].
    ///
    /// # Errors
    ///
    /// Same as [`cast_vote`](Self::cast_vote).
    pub async fn remove_vote(
        &self,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> VoteResult<VoteOutcome> {
        self.vote(VoteAction::Remove, participant_id, venue_id).await
    }

    async fn vote(
        &self,
        action: VoteAction,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
    ) -> VoteResult<VoteOutcome> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Vote {
                action,
                participant_id: participant_id.clone(),
                venue_id: venue_id.clone(),
                reply,
            })
            .await
            .map_err(|_| VoteError::SessionClosed)?;
        response.await.map_err(|_| VoteError::SessionClosed)?
    }

    // ==================== Replica Control ====================

    /// Fetches and applies an authoritative snapshot now.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Reconciliation`] if either fetch fails.
    pub async fn reconcile(&self) -> SyncResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Reconcile { reply }).await?;
        response.await.map_err(|_| SyncError::SessionClosed)?
    }

    /// Resolves `token` to a participant and makes them the local user.
    ///
    /// The token then accompanies that participant's votes and forwarded
    /// mutations, and their own view shows their true location.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the token.
    pub async fn restore_identity(&self, token: AccessToken) -> SyncResult<ParticipantId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::RestoreIdentity { token, reply }).await?;
        response.await.map_err(|_| SyncError::SessionClosed)?
    }

    /// Forgets the local identity and its token.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SessionClosed`] if the session has stopped.
    pub async fn clear_identity(&self) -> SyncResult<()> {
        self.send(Command::ClearIdentity).await
    }

    /// Selects a participant in the UI, or clears the selection.
    ///
    /// Returns `false` if the participant is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SessionClosed`] if the session has stopped.
    pub async fn select_participant(
        &self,
        participant_id: Option<ParticipantId>,
    ) -> SyncResult<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SelectParticipant {
            participant_id,
            reply,
        })
        .await?;
        response.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Restarts the connection cycle with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SessionClosed`] if the session has stopped.
    pub async fn reconnect(&self) -> SyncResult<()> {
        self.send(Command::Reconnect).await
    }

    // ==================== Forwarded Mutations ====================

    /// Asks the service to change the event's title, time, or settings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the request.
    pub async fn update_event(&self, update: EventUpdate) -> SyncResult<()> {
        self.forward(Mutation::UpdateEvent { update }).await
    }

    /// Asks the service to update a participant.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the request.
    pub async fn update_participant(
        &self,
        participant_id: ParticipantId,
        update: ParticipantUpdate,
    ) -> SyncResult<()> {
        self.forward(Mutation::UpdateParticipant {
            participant_id,
            update,
        })
        .await
    }

    /// Asks the service to remove a participant.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the request.
    pub async fn remove_participant(&self, participant_id: ParticipantId) -> SyncResult<()> {
        self.forward(Mutation::RemoveParticipant { participant_id })
            .await
    }

    /// Asks the service to publish a venue, closing voting.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the request.
    pub async fn publish_venue(&self, venue_id: VenueId) -> SyncResult<()> {
        self.forward(Mutation::PublishVenue { venue_id }).await
    }

    /// Asks the service to clear the published venue.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service rejects the request.
    pub async fn unpublish_venue(&self) -> SyncResult<()> {
        self.forward(Mutation::UnpublishVenue).await
    }

    async fn forward(&self, mutation: Mutation) -> SyncResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Forward { mutation, reply }).await?;
        response.await.map_err(|_| SyncError::SessionClosed)?
    }

    async fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }

    // ==================== Shutdown ====================

    /// Stops the worker and waits for it to exit.
    ///
    /// No change event is applied after this returns.
    pub async fn unsubscribe(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(event_id = %self.event_id, error = %err, "Sync worker ended abnormally");
            }
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
