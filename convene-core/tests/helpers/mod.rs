//! Reusable test helpers for sync session tests.
//!
//! [`MockService`] is an in-memory meeting service. It records every call
//! in order, hands out scripted push channels, and can be told to fail
//! specific requests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use convene_core::geometry::Location;
use convene_core::meeting::{
    AccessToken, ChangeEvent, EventId, MeetingEvent, Participant, ParticipantId,
    ParticipantUpdate, VenueId,
};
use convene_core::replica::ReplicaSnapshot;
use convene_core::service::{
    ChangeStream, EventUpdate, JoinedParticipant, MeetingService, NewMeetingEvent,
    NewParticipant, ServiceError, ServiceResult, StreamMessage,
};
use convene_core::sync::{BackoffConfig, ConnectionStatus, SyncConfig, SyncNotice, SyncSession};
use convene_core::vote::VoteStatistics;
use tokio::sync::{broadcast, mpsc};

/// How long any single wait may take before the test fails.
pub const WAIT: Duration = Duration::from_secs(5);

/// One recorded service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe,
    GetEvent,
    FetchVoteStatistics,
    FetchMe { token: String },
    CastVote { venue_id: VenueId, participant_id: ParticipantId, token: Option<String> },
    RemoveVote { venue_id: VenueId, participant_id: ParticipantId, token: Option<String> },
    UpdateParticipant { participant_id: ParticipantId, token: Option<String> },
    RemoveParticipant { participant_id: ParticipantId, token: Option<String> },
    PublishVenue { venue_id: VenueId, token: Option<String> },
    UnpublishVenue { token: Option<String> },
    UpdateEvent { token: Option<String> },
    Other(&'static str),
}

/// In-memory meeting service with scripted behavior.
pub struct MockService {
    event: Mutex<MeetingEvent>,
    statistics: Mutex<Vec<VoteStatistics>>,
    calls: Mutex<Vec<Call>>,
    streams: Mutex<VecDeque<MockStream>>,
    vote_results: Mutex<VecDeque<ServiceResult<()>>>,
    failing_event_fetches: AtomicUsize,
    tokens: Mutex<Vec<(String, ParticipantId)>>,
}

impl MockService {
    /// Creates a service holding `event` and no vote statistics.
    pub fn new(event: MeetingEvent) -> Arc<Self> {
        Arc::new(Self {
            event: Mutex::new(event),
            statistics: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            streams: Mutex::new(VecDeque::new()),
            vote_results: Mutex::new(VecDeque::new()),
            failing_event_fetches: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        })
    }

    /// Queues a push channel for the next `subscribe` call.
    pub fn push_stream(&self) -> StreamFeed {
        self.queue_stream(false)
    }

    /// Like [`push_stream`](Self::push_stream), but the stream yields
    /// again after taking each message off its queue. Dropping a pending
    /// `next()` on it loses the message.
    pub fn push_lossy_stream(&self) -> StreamFeed {
        self.queue_stream(true)
    }

    fn queue_stream(&self, yield_after_recv: bool) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(MockStream {
            rx,
            yield_after_recv,
        });
        StreamFeed { tx }
    }

    /// Replaces the authoritative event returned by `get_event`.
    pub fn set_event(&self, event: MeetingEvent) {
        *self.event.lock().unwrap() = event;
    }

    /// Replaces the authoritative statistics.
    pub fn set_statistics(&self, statistics: Vec<VoteStatistics>) {
        *self.statistics.lock().unwrap() = statistics;
    }

    /// Queues the result of the next cast or remove vote call.
    pub fn push_vote_result(&self, result: ServiceResult<()>) {
        self.vote_results.lock().unwrap().push_back(result);
    }

    /// Makes the next `count` event fetches fail with a transport error.
    pub fn fail_event_fetches(&self, count: usize) {
        self.failing_event_fetches.store(count, Ordering::SeqCst);
    }

    /// Registers a token that `fetch_me` resolves.
    pub fn register_token(&self, token: &str, participant_id: &str) {
        self.tokens
            .lock()
            .unwrap()
            .push((token.to_string(), ParticipantId::new(participant_id)));
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Number of event fetches, i.e. reconciliations attempted.
    pub fn reconciliations(&self) -> usize {
        self.count(|call| matches!(call, Call::GetEvent))
    }

    /// Number of cast and remove vote requests.
    pub fn vote_requests(&self) -> usize {
        self.count(|call| matches!(call, Call::CastVote { .. } | Call::RemoveVote { .. }))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_vote_result(&self) -> ServiceResult<()> {
        self.vote_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

fn raw(token: Option<&AccessToken>) -> Option<String> {
    token.map(|t| t.expose().to_string())
}

#[async_trait]
impl MeetingService for MockService {
    async fn create_event(&self, _request: NewMeetingEvent) -> ServiceResult<MeetingEvent> {
        self.record(Call::Other("create_event"));
        Ok(self.event.lock().unwrap().clone())
    }

    async fn get_event(&self, _event_id: &EventId) -> ServiceResult<MeetingEvent> {
        self.record(Call::GetEvent);
        let failing = self.failing_event_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_event_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(ServiceError::Transport("fetch failed".to_string()));
        }
        Ok(self.event.lock().unwrap().clone())
    }

    async fn update_event(
        &self,
        _event_id: &EventId,
        _update: EventUpdate,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::UpdateEvent { token: raw(token) });
        Ok(())
    }

    async fn delete_event(
        &self,
        _event_id: &EventId,
        _token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::Other("delete_event"));
        Ok(())
    }

    async fn publish_venue(
        &self,
        _event_id: &EventId,
        venue_id: &VenueId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::PublishVenue {
            venue_id: venue_id.clone(),
            token: raw(token),
        });
        if token.is_none() {
            return Err(ServiceError::Unauthorized("token required".to_string()));
        }
        Ok(())
    }

    async fn unpublish_venue(
        &self,
        _event_id: &EventId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::UnpublishVenue { token: raw(token) });
        Ok(())
    }

    async fn add_participant(
        &self,
        _event_id: &EventId,
        participant: NewParticipant,
    ) -> ServiceResult<JoinedParticipant> {
        self.record(Call::Other("add_participant"));
        Ok(JoinedParticipant {
            participant: Participant::new("new", participant.name, participant.color),
            access_token: AccessToken::new("new-token"),
        })
    }

    async fn update_participant(
        &self,
        _event_id: &EventId,
        participant_id: &ParticipantId,
        _update: ParticipantUpdate,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::UpdateParticipant {
            participant_id: participant_id.clone(),
            token: raw(token),
        });
        Ok(())
    }

    async fn remove_participant(
        &self,
        _event_id: &EventId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::RemoveParticipant {
            participant_id: participant_id.clone(),
            token: raw(token),
        });
        Ok(())
    }

    async fn fetch_me(&self, _event_id: &EventId, token: &AccessToken) -> ServiceResult<Participant> {
        self.record(Call::FetchMe {
            token: token.expose().to_string(),
        });
        let participant_id = self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|(known, _)| known == token.expose())
            .map(|(_, id)| id.clone())
            .ok_or_else(|| ServiceError::Unauthorized("unknown token".to_string()))?;
        self.event
            .lock()
            .unwrap()
            .participant(&participant_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(participant_id.to_string()))
    }

    async fn cast_vote(
        &self,
        _event_id: &EventId,
        venue_id: &VenueId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::CastVote {
            venue_id: venue_id.clone(),
            participant_id: participant_id.clone(),
            token: raw(token),
        });
        self.next_vote_result()
    }

    async fn remove_vote(
        &self,
        _event_id: &EventId,
        venue_id: &VenueId,
        participant_id: &ParticipantId,
        token: Option<&AccessToken>,
    ) -> ServiceResult<()> {
        self.record(Call::RemoveVote {
            venue_id: venue_id.clone(),
            participant_id: participant_id.clone(),
            token: raw(token),
        });
        self.next_vote_result()
    }

    async fn fetch_vote_statistics(&self, _event_id: &EventId) -> ServiceResult<Vec<VoteStatistics>> {
        self.record(Call::FetchVoteStatistics);
        Ok(self.statistics.lock().unwrap().clone())
    }

    async fn subscribe(&self, _event_id: &EventId) -> ServiceResult<Box<dyn ChangeStream>> {
        self.record(Call::Subscribe);
        let stream = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ServiceError::Transport("no stream available".to_string()))?;
        Ok(Box::new(stream))
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<ServiceResult<StreamMessage>>,
    yield_after_recv: bool,
}

#[async_trait]
impl ChangeStream for MockStream {
    async fn next(&mut self) -> Option<ServiceResult<StreamMessage>> {
        let message = self.rx.recv().await;
        if self.yield_after_recv {
            tokio::task::yield_now().await;
        }
        message
    }
}

/// The sending side of a scripted push channel. Dropping it closes the
/// channel.
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<ServiceResult<StreamMessage>>,
}

impl StreamFeed {
    /// Sends the connected signal.
    pub fn connected(&self) -> bool {
        self.tx.send(Ok(StreamMessage::Connected)).is_ok()
    }

    /// Sends a change event.
    pub fn change(&self, event: &ChangeEvent) -> bool {
        self.raw(&event.to_json().unwrap())
    }

    /// Sends raw text as a change message.
    pub fn raw(&self, json: &str) -> bool {
        self.tx.send(Ok(StreamMessage::Change(json.to_string()))).is_ok()
    }

    /// Breaks the channel with a transport error.
    pub fn fail(&self) -> bool {
        self.tx
            .send(Err(ServiceError::Transport("stream reset".to_string())))
            .is_ok()
    }
}

// ==================== Fixtures ====================

pub fn event_id() -> EventId {
    EventId::new("evt-1")
}

pub fn located(id: &str, lat: f64, lng: f64) -> Participant {
    Participant::new(id, id.to_uppercase(), "#2196f3").with_location(Location::new(lat, lng))
}

/// An event with participants `alice` and `bob`.
pub fn sample_event() -> MeetingEvent {
    let mut event = MeetingEvent::new(event_id(), "Friday dinner");
    event.participants = vec![
        located("alice", 40.70, -74.00),
        located("bob", 40.75, -73.98),
    ];
    event
}

/// Default config with millisecond backoff so retries run quickly.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        backoff: BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            max_attempts: 3,
        },
        ..SyncConfig::default()
    }
}

// ==================== Waiting ====================

/// Waits until the published snapshot satisfies `predicate`.
pub async fn wait_for_snapshot(
    session: &SyncSession,
    predicate: impl Fn(&ReplicaSnapshot) -> bool,
) -> ReplicaSnapshot {
    let mut rx = session.watch_snapshot();
    tokio::time::timeout(WAIT, async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("sync worker stopped");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

/// Waits until the connection status satisfies `predicate`.
pub async fn wait_for_status(
    session: &SyncSession,
    predicate: impl Fn(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let mut rx = session.watch_status();
    tokio::time::timeout(WAIT, async {
        loop {
            let status = *rx.borrow_and_update();
            if predicate(&status) {
                return status;
            }
            rx.changed().await.expect("sync worker stopped");
        }
    })
    .await
    .expect("timed out waiting for status")
}

/// Waits for the next notice satisfying `predicate`.
pub async fn wait_for_notice(
    notices: &mut broadcast::Receiver<SyncNotice>,
    predicate: impl Fn(&SyncNotice) -> bool,
) -> SyncNotice {
    tokio::time::timeout(WAIT, async {
        loop {
            let notice = notices.recv().await.expect("notice channel closed");
            if predicate(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("timed out waiting for notice")
}

/// Waits until the mock has recorded a call satisfying `predicate`.
pub async fn wait_for_call(service: &MockService, predicate: impl Fn(&Call) -> bool) {
    tokio::time::timeout(WAIT, async {
        while service.count(&predicate) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for service call");
}
