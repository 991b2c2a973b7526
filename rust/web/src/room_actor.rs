//! One task per room.
//!
//! A [`RoomActor`] is the single owner of a [`Room`]. Requests reach it through an mpsc
//! inbox and are answered on oneshot channels, so intents for one room are applied
//! strictly in arrival order and never concurrently. Rooms share nothing with each
//! other apart from the [`EventBus`].

use crate::errors::{IntoErrorResponse, RoomError};
use crate::events::{EventBus, RoomFrame, RoomUpdate};
use pokeroom_engine::errors::GameError;
use pokeroom_engine::intent::PlayerIntent;
use pokeroom_engine::player::SeatId;
use pokeroom_engine::room::{Phase, Room, RoomConfig, RoomEvent};
use pokeroom_engine::snapshot::RoomStateSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

pub type RoomId = String;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// How often the action clock looks at the seat on turn.
const CLOCK_RESOLUTION: Duration = Duration::from_millis(250);

/// A seat id together with the secret handed out when the seat joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatToken {
    pub seat_id: SeatId,
    pub token: String,
}

impl SeatToken {
    pub fn new(seat_id: SeatId, token: impl Into<String>) -> Self {
        Self {
            seat_id,
            token: token.into(),
        }
    }
}

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        display_name: String,
        starting_chips: u32,
        reply: Reply<SeatToken>,
    },
    Leave {
        seat: SeatToken,
        reply: Reply<()>,
    },
    Intent {
        seat: SeatToken,
        sequence: Option<u64>,
        intent: PlayerIntent,
        reply: Reply<RoomUpdate>,
    },
    /// The transport lost the seat's last stream.
    Disconnect { seat: SeatId, reply: Reply<()> },
    Reconnect { seat: SeatToken, reply: Reply<()> },
    Snapshot {
        viewer: Option<SeatToken>,
        reply: Reply<RoomStateSnapshot>,
    },
    /// Expire the action clock now.
    Tick { reply: Reply<Vec<RoomEvent>> },
    Close { reply: Reply<()> },
}

/// Per-room options that live outside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOptions {
    pub config: RoomConfig,
    pub action_timeout: Option<Duration>,
    pub inbox_capacity: usize,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            config: RoomConfig::default(),
            action_timeout: None,
            inbox_capacity: 64,
        }
    }
}

/// Cheap, cloneable sender side of a room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
    config: RoomConfig,
    runtime: Option<Handle>,
}

impl RoomHandle {
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(&self, display_name: &str, starting_chips: u32) -> Result<SeatToken, RoomError> {
        let display_name = display_name.to_string();
        self.request(|reply| RoomCommand::Join {
            display_name,
            starting_chips,
            reply,
        })
        .await
    }

    pub async fn leave(&self, seat: SeatToken) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { seat, reply }).await
    }

    pub async fn intent(
        &self,
        seat: SeatToken,
        sequence: Option<u64>,
        intent: PlayerIntent,
    ) -> Result<RoomUpdate, RoomError> {
        self.request(|reply| RoomCommand::Intent {
            seat,
            sequence,
            intent,
            reply,
        })
        .await
    }

    pub async fn disconnect(&self, seat: SeatId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Disconnect { seat, reply }).await
    }

    pub async fn reconnect(&self, seat: SeatToken) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reconnect { seat, reply }).await
    }

    pub async fn snapshot(&self, viewer: Option<SeatToken>) -> Result<RoomStateSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { viewer, reply }).await
    }

    pub async fn tick(&self) -> Result<Vec<RoomEvent>, RoomError> {
        self.request(|reply| RoomCommand::Tick { reply }).await
    }

    pub async fn close(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Close { reply }).await
    }

    /// Fire-and-forget disconnect for contexts that cannot await, such as `Drop`.
    /// A full inbox hands the command to a task that waits for room.
    pub fn notify_disconnect(&self, seat: SeatId) {
        let (reply, _) = oneshot::channel();
        let command = match self.sender.try_send(RoomCommand::Disconnect { seat, reply }) {
            Ok(()) => return,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(room_id = %self.id, seat_id = seat, "room closed before disconnect");
                return;
            }
            Err(TrySendError::Full(command)) => command,
        };
        let Some(runtime) = &self.runtime else {
            tracing::warn!(room_id = %self.id, seat_id = seat, "inbox full and no runtime, disconnect lost");
            return;
        };
        let sender = self.sender.clone();
        let room_id = self.id.clone();
        runtime.spawn(async move {
            if sender.send(command).await.is_err() {
                tracing::debug!(room_id = %room_id, seat_id = seat, "room closed before disconnect");
            }
        });
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| RoomError::Closed(self.id.clone()))?;
        response
            .await
            .map_err(|_| RoomError::Closed(self.id.clone()))?
    }
}

/// Identifies whose turn it is, so the action clock restarts when the turn moves.
type TurnKey = (u64, Phase, Option<usize>);

pub struct RoomActor {
    id: RoomId,
    room: Room,
    inbox: mpsc::Receiver<RoomCommand>,
    bus: Arc<EventBus>,
    tokens: HashMap<SeatId, String>,
    last_sequence: HashMap<SeatId, u64>,
    action_timeout: Option<Duration>,
    turn: Option<(TurnKey, Instant)>,
}

impl RoomActor {
    pub fn new(
        id: RoomId,
        options: RoomOptions,
        bus: Arc<EventBus>,
    ) -> Result<(Self, RoomHandle), GameError> {
        let room = Room::new(options.config.clone())?;
        let (sender, inbox) = mpsc::channel(options.inbox_capacity.max(1));
        let handle = RoomHandle {
            id: id.clone(),
            sender,
            config: options.config,
            runtime: Handle::try_current().ok(),
        };
        let actor = Self {
            id,
            room,
            inbox,
            bus,
            tokens: HashMap::new(),
            last_sequence: HashMap::new(),
            action_timeout: options.action_timeout,
            turn: None,
        };
        Ok((actor, handle))
    }

    /// Runs until the room is closed, every handle is dropped, or an invariant breaks.
    pub async fn run(mut self) {
        tracing::info!(
            room_id = %self.id,
            small_blind = self.room.config().small_blind,
            big_blind = self.room.config().big_blind,
            max_seats = self.room.config().max_seats,
            "room opened"
        );

        let mut clock = self.action_timeout.map(|_| {
            let mut clock = interval(CLOCK_RESOLUTION);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
            clock
        });

        let reason = loop {
            tokio::select! {
                command = self.inbox.recv() => {
                    let Some(command) = command else {
                        break "abandoned";
                    };
                    if let ControlFlow::Break(reason) = self.handle(command) {
                        break reason;
                    }
                }
                _ = next_tick(&mut clock) => {
                    if let ControlFlow::Break(reason) = self.on_clock() {
                        break reason;
                    }
                }
            }
        };

        self.bus.close_room(&self.id, reason);
        tracing::info!(room_id = %self.id, reason, "room stopped");
    }

    fn handle(&mut self, command: RoomCommand) -> ControlFlow<&'static str> {
        match command {
            RoomCommand::Join {
                display_name,
                starting_chips,
                reply,
            } => {
                let result = self.on_join(&display_name, starting_chips);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { seat, reply } => {
                let result = self
                    .authorize(&seat)
                    .and_then(|()| self.mutate(|room| room.leave(seat.seat_id)))
                    .map(drop);
                return self.respond(reply, result);
            }
            RoomCommand::Intent {
                seat,
                sequence,
                intent,
                reply,
            } => {
                let result = self.on_intent(&seat, sequence, intent);
                if let Err(err) = &result {
                    if err.is_protocol_rejection() {
                        self.bus.send_to(
                            &self.id,
                            seat.seat_id,
                            RoomFrame::Rejected {
                                error: err.to_error_response(),
                            },
                        );
                    }
                }
                return self.respond(reply, result);
            }
            RoomCommand::Disconnect { seat, reply } => {
                tracing::info!(room_id = %self.id, seat_id = seat, "seat disconnected");
                let result = self.mutate(|room| room.disconnect(seat)).map(drop);
                return self.respond(reply, result);
            }
            RoomCommand::Reconnect { seat, reply } => {
                let result = self
                    .authorize(&seat)
                    .and_then(|()| self.mutate(|room| room.reconnect(seat.seat_id)))
                    .map(drop);
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { viewer, reply } => {
                let result = match &viewer {
                    Some(seat) => self
                        .authorize(seat)
                        .map(|()| self.room.snapshot_for(Some(seat.seat_id))),
                    None => Ok(self.room.snapshot_for(None)),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Tick { reply } => {
                let result = self.mutate(Room::apply_timeout);
                return self.respond(reply, result);
            }
            RoomCommand::Close { reply } => {
                let _ = reply.send(Ok(()));
                return ControlFlow::Break("closed");
            }
        }
        ControlFlow::Continue(())
    }

    /// Answers the caller, then stops the loop if the room broke.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, RoomError>) -> ControlFlow<&'static str> {
        let fatal = matches!(&result, Err(RoomError::Game(err)) if err.is_invariant_violation());
        let _ = reply.send(result);
        if fatal {
            ControlFlow::Break("invariant_violation")
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_join(&mut self, display_name: &str, starting_chips: u32) -> Result<SeatToken, RoomError> {
        let (seat_id, events) = self.room.join(display_name, starting_chips)?;
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(seat_id, token.clone());
        self.publish(events);
        Ok(SeatToken { seat_id, token })
    }

    fn on_intent(
        &mut self,
        seat: &SeatToken,
        sequence: Option<u64>,
        intent: PlayerIntent,
    ) -> Result<RoomUpdate, RoomError> {
        self.authorize(seat)?;
        let seat_id = seat.seat_id;
        if let (Some(sequence), Some(&last)) = (sequence, self.last_sequence.get(&seat_id)) {
            if sequence <= last {
                return Err(RoomError::DuplicateIntent {
                    seat: seat_id,
                    sequence,
                    last,
                });
            }
        }

        tracing::debug!(
            room_id = %self.id,
            seat_id,
            intent = intent.name(),
            phase = %self.room.phase(),
            "applying intent"
        );
        let events = self.mutate(|room| room.apply(seat_id, intent))?;
        if let Some(sequence) = sequence {
            // the seat may have left as part of this mutation
            if self.tokens.contains_key(&seat_id) {
                self.last_sequence.insert(seat_id, sequence);
            }
        }
        Ok(RoomUpdate {
            snapshot: self.room.snapshot_for(Some(seat_id)),
            events,
        })
    }

    fn on_clock(&mut self) -> ControlFlow<&'static str> {
        let (Some(timeout), Some((_, since))) = (self.action_timeout, self.turn) else {
            return ControlFlow::Continue(());
        };
        if since.elapsed() < timeout {
            return ControlFlow::Continue(());
        }
        tracing::info!(
            room_id = %self.id,
            seat_id = ?self.room.active_seat(),
            hand_number = self.room.hand_number(),
            "action clock expired"
        );
        match self.mutate(Room::apply_timeout) {
            Err(RoomError::Game(err)) if err.is_invariant_violation() => {
                ControlFlow::Break("invariant_violation")
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn authorize(&self, seat: &SeatToken) -> Result<(), RoomError> {
        match self.tokens.get(&seat.seat_id) {
            Some(token) if *token == seat.token => Ok(()),
            _ => Err(RoomError::InvalidToken(seat.seat_id)),
        }
    }

    /// Runs a room mutation and publishes what it produced. Invariant violations are
    /// logged here; the caller stops the loop.
    fn mutate<F>(&mut self, change: F) -> Result<Vec<RoomEvent>, RoomError>
    where
        F: FnOnce(&mut Room) -> Result<Vec<RoomEvent>, GameError>,
    {
        match change(&mut self.room) {
            Ok(events) => {
                self.publish(events.clone());
                Ok(events)
            }
            Err(err) if err.is_invariant_violation() => {
                tracing::error!(
                    room_id = %self.id,
                    hand_number = self.room.hand_number(),
                    phase = %self.room.phase(),
                    error = %err,
                    "room invariant violated, closing room"
                );
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn publish(&mut self, events: Vec<RoomEvent>) {
        self.restart_clock();
        if events.is_empty() {
            return;
        }
        for event in &events {
            self.log_event(event);
            if let RoomEvent::SeatLeft { seat_id, .. } = event {
                self.tokens.remove(seat_id);
                self.last_sequence.remove(seat_id);
            }
        }
        let room = &self.room;
        self.bus.publish(&self.id, |viewer| {
            RoomFrame::State(RoomUpdate {
                snapshot: room.snapshot_for(viewer),
                events: events.clone(),
            })
        });
    }

    fn restart_clock(&mut self) {
        if self.action_timeout.is_none() {
            return;
        }
        let key = (self.room.hand_number(), self.room.phase(), self.room.active_index());
        self.turn = match self.turn {
            _ if !self.room.phase().is_betting() => None,
            Some((current, since)) if current == key => Some((current, since)),
            _ => Some((key, Instant::now())),
        };
    }

    fn log_event(&self, event: &RoomEvent) {
        let room_id = &self.id;
        match event {
            RoomEvent::SeatJoined {
                seat_id,
                display_name,
                chips,
            } => tracing::info!(%room_id, seat_id, display_name = %display_name, chips, "seat joined"),
            RoomEvent::SeatLeft { seat_id, chips } => {
                tracing::info!(%room_id, seat_id, chips, "seat left")
            }
            RoomEvent::HandStarted {
                hand_number,
                dealer_seat_id,
                seat_ids,
            } => tracing::info!(
                %room_id,
                hand_number,
                dealer_seat_id,
                seats = seat_ids.len(),
                "hand started"
            ),
            RoomEvent::PotAwarded {
                seat_id,
                amount,
                pot_index,
                uncontested,
            } => tracing::info!(%room_id, seat_id, amount, pot_index, uncontested, "pot awarded"),
            RoomEvent::HandEnded { hand_number } => {
                tracing::debug!(%room_id, hand_number, "hand ended")
            }
            other => tracing::trace!(%room_id, event = ?other, "room event"),
        }
    }
}

async fn next_tick(clock: &mut Option<Interval>) {
    match clock {
        Some(clock) => {
            clock.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Creates the actor for a new room and runs it on the current runtime.
pub fn spawn_room(
    id: RoomId,
    options: RoomOptions,
    bus: Arc<EventBus>,
) -> Result<(RoomHandle, tokio::task::JoinHandle<()>), GameError> {
    let (actor, handle) = RoomActor::new(id, options, bus)?;
    let task = tokio::spawn(actor.run());
    Ok((handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RoomOptions {
        RoomOptions {
            config: RoomConfig {
                seed: Some(8),
                ..RoomConfig::default()
            },
            ..RoomOptions::default()
        }
    }

    async fn two_ready_seats(handle: &RoomHandle) -> (SeatToken, SeatToken) {
        let a = handle.join("ann", 1000).await.unwrap();
        let b = handle.join("bob", 1000).await.unwrap();
        handle.intent(a.clone(), None, PlayerIntent::Ready).await.unwrap();
        handle.intent(b.clone(), None, PlayerIntent::Ready).await.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn wrong_token_is_refused_without_mutation() {
        let bus = Arc::new(EventBus::new());
        let (handle, _task) = spawn_room("r1".into(), options(), bus).unwrap();
        let (a, _) = two_ready_seats(&handle).await;

        let forged = SeatToken::new(a.seat_id, "not-the-token");
        let err = handle.intent(forged, None, PlayerIntent::Fold).await.unwrap_err();
        assert_eq!(err, RoomError::InvalidToken(a.seat_id));
        let snap = handle.snapshot(None).await.unwrap();
        assert_eq!(snap.phase, Phase::Preflop);
    }

    #[tokio::test]
    async fn repeated_sequence_is_applied_once() {
        let bus = Arc::new(EventBus::new());
        let (handle, _task) = spawn_room("r2".into(), options(), bus).unwrap();
        let (a, _) = two_ready_seats(&handle).await;

        let update = handle.intent(a.clone(), Some(1), PlayerIntent::Call).await.unwrap();
        let pot_after = update.snapshot.pot + update.snapshot.players.iter().map(|p| p.current_bet).sum::<u32>();
        let err = handle.intent(a.clone(), Some(1), PlayerIntent::Call).await.unwrap_err();
        assert!(matches!(err, RoomError::DuplicateIntent { sequence: 1, last: 1, .. }));

        let snap = handle.snapshot(Some(a)).await.unwrap();
        let committed = snap.pot + snap.players.iter().map(|p| p.current_bet).sum::<u32>();
        assert_eq!(committed, pot_after);
    }

    #[tokio::test]
    async fn close_stops_the_actor() {
        let bus = Arc::new(EventBus::new());
        let (handle, task) = spawn_room("r3".into(), options(), bus).unwrap();
        handle.close().await.unwrap();
        task.await.unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.snapshot(None).await, Err(RoomError::Closed("r3".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn action_clock_folds_a_seat_facing_a_bet() {
        let bus = Arc::new(EventBus::new());
        let opts = RoomOptions {
            action_timeout: Some(Duration::from_secs(5)),
            ..options()
        };
        let (handle, _task) = spawn_room("r4".into(), opts, bus).unwrap();
        let (a, b) = two_ready_seats(&handle).await;

        // heads-up: the dealer (a) posts the small blind and acts first
        tokio::time::sleep(Duration::from_secs(6)).await;
        let snap = handle.snapshot(Some(b)).await.unwrap();
        assert_eq!(snap.phase, Phase::Waiting);
        let ann = snap.players.iter().find(|p| p.id == a.seat_id).unwrap();
        assert_eq!(ann.chips, 995);
    }

    #[tokio::test]
    async fn disconnect_waits_for_room_in_a_full_inbox() {
        let (sender, mut inbox) = mpsc::channel(1);
        let handle = RoomHandle {
            id: "r5".into(),
            sender,
            config: RoomConfig::default(),
            runtime: Handle::try_current().ok(),
        };
        let (close_reply, _) = oneshot::channel();
        handle
            .sender
            .try_send(RoomCommand::Close { reply: close_reply })
            .unwrap();

        handle.notify_disconnect(4);

        assert!(matches!(inbox.recv().await, Some(RoomCommand::Close { .. })));
        let next = tokio::time::timeout(Duration::from_secs(1), inbox.recv()).await.unwrap();
        assert!(matches!(next, Some(RoomCommand::Disconnect { seat: 4, .. })));
    }
}
