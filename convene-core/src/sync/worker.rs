//! The single writer task behind a [`SyncSession`](super::SyncSession).
//!
//! The worker owns the [`Replica`] outright. Everything that touches it
//! (stream messages, caller commands, and completions of requests running
//! in spawned tasks) is funneled through one `tokio::select!` loop, so
//! change events are applied strictly in arrival order and no lock is
//! needed.
//!
//! The push channel is drained by a reader task of its own and handed over
//! through an `mpsc` queue. The select loop therefore only ever cancels a
//! queue receive, and a message taken off the wire is never lost when a
//! command or completion wins the race.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::error::{SyncError, SyncResult};
use super::types::{ConnectionStatus, SyncNotice};
use crate::meeting::{
    AccessToken, ChangeEvent, Participant, ParticipantId, ParticipantUpdate, VenueId,
};
use crate::replica::{ApplyOutcome, Replica, ReplicaSnapshot};
use crate::service::{
    ChangeStream, EventUpdate, MeetingService, ServiceError, ServiceResult, StreamMessage,
};
use crate::vote::{PendingVote, VoteAction, VoteIntent, VoteOutcome, VoteResult};

/// A request from the session handle.
pub(crate) enum Command {
    Vote {
        action: VoteAction,
        participant_id: ParticipantId,
        venue_id: VenueId,
        reply: oneshot::Sender<VoteResult<VoteOutcome>>,
    },
    Reconcile {
        reply: oneshot::Sender<SyncResult<()>>,
    },
    RestoreIdentity {
        token: AccessToken,
        reply: oneshot::Sender<SyncResult<ParticipantId>>,
    },
    ClearIdentity,
    SelectParticipant {
        participant_id: Option<ParticipantId>,
        reply: oneshot::Sender<bool>,
    },
    Reconnect,
    Forward {
        mutation: Mutation,
        reply: oneshot::Sender<SyncResult<()>>,
    },
}

/// A mutation forwarded to the service as-is. The replica only changes
/// when the resulting change event arrives.
pub(crate) enum Mutation {
    UpdateEvent {
        update: EventUpdate,
    },
    UpdateParticipant {
        participant_id: ParticipantId,
        update: ParticipantUpdate,
    },
    RemoveParticipant {
        participant_id: ParticipantId,
    },
    PublishVenue {
        venue_id: VenueId,
    },
    UnpublishVenue,
}

/// A spawned request reporting back.
enum Completion {
    Vote {
        pending: PendingVote,
        result: ServiceResult<()>,
        reply: oneshot::Sender<VoteResult<VoteOutcome>>,
    },
    Identity {
        token: AccessToken,
        result: ServiceResult<Participant>,
        reply: oneshot::Sender<SyncResult<ParticipantId>>,
    },
}

struct Identity {
    participant_id: ParticipantId,
    token: AccessToken,
}

/// Where the connection cycle stands.
enum Phase {
    /// Open the push channel.
    Connecting { attempt: u32 },
    /// Wait out the backoff before retry `attempt`.
    Backoff { attempt: u32, until: Instant },
    /// Read the push channel. Messages are discarded until `live`.
    Streaming {
        reader: StreamReader,
        live: bool,
        attempt: u32,
    },
    /// Retries exhausted; serve commands until asked to reconnect.
    Idle,
    Stopped,
}

/// Owns the task that drains one push channel.
///
/// Dropping the reader aborts the task, which drops the stream.
struct StreamReader {
    messages: mpsc::Receiver<ServiceResult<StreamMessage>>,
    task: JoinHandle<()>,
}

impl StreamReader {
    fn spawn(mut stream: Box<dyn ChangeStream>, buffer: usize) -> Self {
        let (tx, messages) = mpsc::channel(buffer);
        let task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let broken = message.is_err();
                if tx.send(message).await.is_err() || broken {
                    break;
                }
            }
        });
        Self { messages, task }
    }

    /// Next forwarded message; `None` once the channel has closed.
    async fn next(&mut self) -> Option<ServiceResult<StreamMessage>> {
        self.messages.recv().await
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What woke the select loop.
enum Wake {
    Shutdown,
    Completion(Completion),
    Command(Option<Command>),
    Message(Option<ServiceResult<StreamMessage>>),
    BackoffElapsed,
}

/// How command handling affects the connection cycle.
enum Flow {
    Continue,
    Reconnect,
    Stop,
}

/// Channel ends the worker publishes through.
pub(crate) struct Outputs {
    pub status: watch::Sender<ConnectionStatus>,
    pub snapshot: watch::Sender<ReplicaSnapshot>,
    pub notices: broadcast::Sender<SyncNotice>,
}

pub(crate) struct Worker<S: MeetingService> {
    service: Arc<S>,
    config: SyncConfig,
    replica: Replica,
    identity: Option<Identity>,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    shutdown: watch::Receiver<bool>,
    outputs: Outputs,
    rng: StdRng,
}

impl<S: MeetingService> Worker<S> {
    pub(crate) fn new(
        service: Arc<S>,
        config: SyncConfig,
        replica: Replica,
        commands: mpsc::Receiver<Command>,
        shutdown: watch::Receiver<bool>,
        outputs: Outputs,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            service,
            config,
            replica,
            identity: None,
            commands,
            completions_tx,
            completions_rx,
            shutdown,
            outputs,
            rng: StdRng::from_entropy(),
        }
    }

    /// Runs until unsubscribed.
    pub(crate) async fn run(mut self) {
        info!(event_id = %self.replica.event_id(), "Sync worker started");

        let mut phase = Phase::Connecting { attempt: 0 };
        loop {
            phase = match phase {
                Phase::Stopped => break,
                Phase::Connecting { attempt } => self.connect(attempt).await,
                other => self.serve(other).await,
            };
        }

        self.set_status(ConnectionStatus::Disconnected { gave_up: false });
        info!(event_id = %self.replica.event_id(), "Sync worker stopped");
    }

    // ==================== Connection Cycle ====================

    async fn connect(&mut self, attempt: u32) -> Phase {
        if attempt == 0 {
            self.set_status(ConnectionStatus::Connecting);
        } else {
            self.set_status(ConnectionStatus::Reconnecting { attempt });
        }

        let service = Arc::clone(&self.service);
        let event_id = self.replica.event_id().clone();
        let result = tokio::select! {
            biased;
            () = shutdown_signal(&mut self.shutdown) => return Phase::Stopped,
            result = service.subscribe(&event_id) => result,
        };

        match result {
            Ok(stream) => {
                debug!(%event_id, attempt, "Push channel opened");
                Phase::Streaming {
                    reader: StreamReader::spawn(stream, self.config.stream_buffer),
                    live: false,
                    attempt,
                }
            }
            Err(err) => {
                warn!(%event_id, attempt, error = %err, "Failed to open push channel");
                self.retry_after(attempt)
            }
        }
    }

    /// Schedules the retry following `attempt`, or gives up.
    fn retry_after(&mut self, attempt: u32) -> Phase {
        let next = attempt.saturating_add(1);
        if next > self.config.backoff.max_attempts {
            warn!(
                event_id = %self.replica.event_id(),
                attempts = attempt,
                "Giving up on push channel"
            );
            self.set_status(ConnectionStatus::Disconnected { gave_up: true });
            return Phase::Idle;
        }

        let delay = self.config.backoff.delay(next, &mut self.rng);
        debug!(attempt = next, ?delay, "Scheduling reconnect");
        self.set_status(ConnectionStatus::Reconnecting { attempt: next });
        Phase::Backoff {
            attempt: next,
            until: Instant::now() + delay,
        }
    }

    /// Waits for one input and handles it.
    async fn serve(&mut self, mut phase: Phase) -> Phase {
        let wake = {
            let (reader, deadline) = match &mut phase {
                Phase::Streaming { reader, .. } => (Some(reader), None),
                Phase::Backoff { until, .. } => (None, Some(*until)),
                _ => (None, None),
            };

            tokio::select! {
                biased;
                () = shutdown_signal(&mut self.shutdown) => Wake::Shutdown,
                Some(completion) = self.completions_rx.recv() => Wake::Completion(completion),
                command = self.commands.recv() => Wake::Command(command),
                message = next_message(reader) => Wake::Message(message),
                () = sleep_until(deadline) => Wake::BackoffElapsed,
            }
        };

        match wake {
            Wake::Shutdown | Wake::Command(None) => Phase::Stopped,
            Wake::Completion(completion) => {
                self.handle_completion(completion);
                phase
            }
            Wake::Command(Some(command)) => match self.handle_command(command).await {
                Flow::Continue => phase,
                Flow::Reconnect => Phase::Connecting { attempt: 0 },
                Flow::Stop => Phase::Stopped,
            },
            Wake::Message(message) => self.handle_message(message, phase).await,
            Wake::BackoffElapsed => match phase {
                Phase::Backoff { attempt, .. } => Phase::Connecting { attempt },
                other => other,
            },
        }
    }

    async fn handle_message(
        &mut self,
        message: Option<ServiceResult<StreamMessage>>,
        phase: Phase,
    ) -> Phase {
        let (reader, live, attempt) = match phase {
            Phase::Streaming {
                reader,
                live,
                attempt,
            } => (reader, live, attempt),
            other => return other,
        };
        let event_id = self.replica.event_id().clone();
        // A channel that was live earns a fresh retry budget
        let budget_used = if live { 0 } else { attempt };

        match message {
            None => {
                warn!(%event_id, "Push channel closed");
                self.retry_after(budget_used)
            }
            Some(Err(err)) => {
                warn!(%event_id, error = %err, "Push channel failed");
                self.retry_after(budget_used)
            }
            Some(Ok(StreamMessage::Connected)) => {
                info!(%event_id, "Push channel connected");
                self.set_status(ConnectionStatus::Connected);
                match self.reconcile().await {
                    Ok(()) => Phase::Streaming {
                        reader,
                        live: true,
                        attempt,
                    },
                    Err(SyncError::SessionClosed) => Phase::Stopped,
                    Err(_) => self.retry_after(attempt),
                }
            }
            Some(Ok(StreamMessage::Change(_))) if !live => {
                debug!(%event_id, "Discarding change received before connected");
                Phase::Streaming {
                    reader,
                    live,
                    attempt,
                }
            }
            Some(Ok(StreamMessage::Change(raw))) => match self.apply_raw(&raw).await {
                Flow::Continue => Phase::Streaming {
                    reader,
                    live,
                    attempt,
                },
                Flow::Reconnect => self.retry_after(0),
                Flow::Stop => Phase::Stopped,
            },
        }
    }

    // ==================== Change Application ====================

    async fn apply_raw(&mut self, raw: &str) -> Flow {
        let event = match ChangeEvent::from_json(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "Dropping malformed change event");
                self.notify(SyncNotice::EventDropped {
                    reason: err.to_string(),
                });
                return Flow::Continue;
            }
        };

        match self.replica.apply_change_event(event) {
            ApplyOutcome::Applied => {
                self.publish_snapshot();
                Flow::Continue
            }
            ApplyOutcome::Ignored(_) => Flow::Continue,
            ApplyOutcome::GapDetected { expected, received } => {
                warn!(expected, received, "Vote delta gap, reconciling");
                self.notify(SyncNotice::GapDetected { expected, received });
                match self.reconcile().await {
                    Ok(()) => Flow::Continue,
                    Err(SyncError::SessionClosed) => Flow::Stop,
                    Err(_) => Flow::Reconnect,
                }
            }
        }
    }

    /// Fetches event and vote statistics concurrently and applies them.
    async fn reconcile(&mut self) -> SyncResult<()> {
        let service = Arc::clone(&self.service);
        let event_id = self.replica.event_id().clone();

        let fetched = tokio::select! {
            biased;
            () = shutdown_signal(&mut self.shutdown) => return Err(SyncError::SessionClosed),
            fetched = async {
                futures::try_join!(
                    service.get_event(&event_id),
                    service.fetch_vote_statistics(&event_id),
                )
            } => fetched,
        };

        let result = fetched.and_then(|(event, statistics)| {
            if event.id == event_id {
                Ok((event, statistics))
            } else {
                Err(ServiceError::InvalidResponse(format!(
                    "requested event {event_id}, got {}",
                    event.id
                )))
            }
        });

        match result {
            Ok((event, statistics)) => {
                self.replica.apply_snapshot(event, statistics);
                self.publish_snapshot();
                info!(%event_id, "Replica reconciled");
                self.notify(SyncNotice::Reconciled);
                Ok(())
            }
            Err(err) => {
                warn!(%event_id, error = %err, "Reconciliation failed");
                self.notify(SyncNotice::ReconciliationFailed(err.clone()));
                Err(SyncError::Reconciliation(err))
            }
        }
    }

    // ==================== Commands ====================

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Vote {
                action,
                participant_id,
                venue_id,
                reply,
            } => {
                self.start_vote(action, &participant_id, &venue_id, reply);
                Flow::Continue
            }
            Command::Reconcile { reply } => {
                let result = self.reconcile().await;
                let closed = matches!(result, Err(SyncError::SessionClosed));
                let _ = reply.send(result);
                if closed {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
            Command::RestoreIdentity { token, reply } => {
                self.start_restore_identity(token, reply);
                Flow::Continue
            }
            Command::ClearIdentity => {
                self.identity = None;
                self.replica.set_own_participant(None);
                self.publish_snapshot();
                Flow::Continue
            }
            Command::SelectParticipant {
                participant_id,
                reply,
            } => {
                let selected = self.replica.select_participant(participant_id);
                if selected {
                    self.publish_snapshot();
                }
                let _ = reply.send(selected);
                Flow::Continue
            }
            Command::Reconnect => {
                info!(event_id = %self.replica.event_id(), "Reconnect requested");
                Flow::Reconnect
            }
            Command::Forward { mutation, reply } => {
                self.forward(mutation, reply);
                Flow::Continue
            }
        }
    }

    fn start_vote(
        &mut self,
        action: VoteAction,
        participant_id: &ParticipantId,
        venue_id: &VenueId,
        reply: oneshot::Sender<VoteResult<VoteOutcome>>,
    ) {
        let pending = match self.replica.begin_vote(action, participant_id, venue_id) {
            Ok(VoteIntent::Request(pending)) => pending,
            Ok(VoteIntent::Unchanged) => {
                let _ = reply.send(Ok(VoteOutcome::Unchanged));
                return;
            }
            Err(err) => {
                debug!(%participant_id, %venue_id, error = %err, "Vote refused locally");
                let _ = reply.send(Err(err));
                return;
            }
        };
        self.publish_snapshot();

        let service = Arc::clone(&self.service);
        let event_id = self.replica.event_id().clone();
        let token = self.token_for(participant_id);
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = match pending.action {
                VoteAction::Cast => {
                    service
                        .cast_vote(
                            &event_id,
                            &pending.venue_id,
                            &pending.participant_id,
                            token.as_ref(),
                        )
                        .await
                }
                VoteAction::Remove => {
                    service
                        .remove_vote(
                            &event_id,
                            &pending.venue_id,
                            &pending.participant_id,
                            token.as_ref(),
                        )
                        .await
                }
            };
            let _ = completions.send(Completion::Vote {
                pending,
                result,
                reply,
            });
        });
    }

    fn start_restore_identity(
        &self,
        token: AccessToken,
        reply: oneshot::Sender<SyncResult<ParticipantId>>,
    ) {
        let service = Arc::clone(&self.service);
        let event_id = self.replica.event_id().clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = service.fetch_me(&event_id, &token).await;
            let _ = completions.send(Completion::Identity {
                token,
                result,
                reply,
            });
        });
    }

    fn forward(&self, mutation: Mutation, reply: oneshot::Sender<SyncResult<()>>) {
        let service = Arc::clone(&self.service);
        let event_id = self.replica.event_id().clone();
        let token = self.identity.as_ref().map(|identity| identity.token.clone());

        tokio::spawn(async move {
            let token = token.as_ref();
            let result = match mutation {
                Mutation::UpdateEvent { update } => {
                    service.update_event(&event_id, update, token).await
                }
                Mutation::UpdateParticipant {
                    participant_id,
                    update,
                } => {
                    service
                        .update_participant(&event_id, &participant_id, update, token)
                        .await
                }
                Mutation::RemoveParticipant { participant_id } => {
                    service
                        .remove_participant(&event_id, &participant_id, token)
                        .await
                }
                Mutation::PublishVenue { venue_id } => {
                    service.publish_venue(&event_id, &venue_id, token).await
                }
                Mutation::UnpublishVenue => service.unpublish_venue(&event_id, token).await,
            };
            if let Err(err) = &result {
                warn!(%event_id, error = %err, "Forwarded mutation failed");
            }
            let _ = reply.send(result.map_err(SyncError::from));
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Vote {
                pending,
                result,
                reply,
            } => {
                let outcome = self.replica.complete_vote(&pending, result);
                if let Err(err) = &outcome {
                    warn!(
                        venue_id = %pending.venue_id,
                        participant_id = %pending.participant_id,
                        error = %err,
                        "Vote request failed, reverted"
                    );
                }
                self.publish_snapshot();
                let _ = reply.send(outcome);
            }
            Completion::Identity {
                token,
                result,
                reply,
            } => match result {
                Ok(participant) => {
                    let participant_id = participant.id;
                    info!(%participant_id, "Identity restored");
                    self.identity = Some(Identity {
                        participant_id: participant_id.clone(),
                        token,
                    });
                    self.replica.set_own_participant(Some(participant_id.clone()));
                    self.publish_snapshot();
                    let _ = reply.send(Ok(participant_id));
                }
                Err(err) => {
                    warn!(error = %err, "Identity restore failed");
                    let _ = reply.send(Err(SyncError::from(err)));
                }
            },
        }
    }

    // ==================== Outputs ====================

    /// The stored token, if it belongs to `participant_id`.
    fn token_for(&self, participant_id: &ParticipantId) -> Option<AccessToken> {
        self.identity
            .as_ref()
            .filter(|identity| &identity.participant_id == participant_id)
            .map(|identity| identity.token.clone())
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.outputs.status.send_replace(status);
        if previous != status {
            info!(event_id = %self.replica.event_id(), ?status, "Connection status changed");
        }
    }

    fn publish_snapshot(&self) {
        self.outputs.snapshot.send_replace(self.replica.snapshot());
    }

    fn notify(&self, notice: SyncNotice) {
        // No receivers is fine
        let _ = self.outputs.notices.send(notice);
    }
}

/// Resolves once shutdown has been requested or the handle is gone.
async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn next_message(reader: Option<&mut StreamReader>) -> Option<ServiceResult<StreamMessage>> {
    match reader {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
