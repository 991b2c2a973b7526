use crate::errors::ErrorResponse;
use crate::room_actor::RoomId;
use pokeroom_engine::player::SeatId;
use pokeroom_engine::room::RoomEvent;
use pokeroom_engine::snapshot::RoomStateSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// Bounded so a stalled client cannot grow memory; a full channel drops the subscriber.
const EVENT_CHANNEL_BUFFER: usize = 256;

pub type FrameSender = mpsc::Sender<RoomFrame>;
pub type FrameReceiver = mpsc::Receiver<RoomFrame>;

/// The state one viewer sees after a mutation, plus what happened to get there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdate {
    pub snapshot: RoomStateSnapshot,
    pub events: Vec<RoomEvent>,
}

/// One message on a room stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomFrame {
    State(RoomUpdate),
    /// Sent only to the seat whose intent was refused.
    Rejected { error: ErrorResponse },
    RoomClosed { reason: String },
}

pub struct EventSubscription {
    bus: EventBus,
    room_id: RoomId,
    subscriber_id: usize,
    viewer: Option<SeatId>,
    pub receiver: FrameReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut FrameReceiver {
        &mut self.receiver
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn viewer(&self) -> Option<SeatId> {
        self.viewer
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.room_id, self.subscriber_id);
    }
}

#[derive(Debug, Clone)]
struct Subscriber {
    id: usize,
    viewer: Option<SeatId>,
    sender: FrameSender,
}

/// Fan-out of room frames to stream subscribers, keyed by room.
///
/// Every subscriber is bound to a viewer seat (or none for a public view) and only
/// ever receives frames built for that viewer.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<HashMap<RoomId, Vec<Subscriber>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, room_id: RoomId, viewer: Option<SeatId>) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(room_id.clone(), viewer);
        EventSubscription {
            bus: self.clone(),
            room_id,
            subscriber_id,
            viewer,
            receiver,
        }
    }

    fn subscribe_raw(&self, room_id: RoomId, viewer: Option<SeatId>) -> (usize, FrameReceiver) {
        let (sender, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.write()
            .entry(room_id.clone())
            .or_default()
            .push(Subscriber { id, viewer, sender });

        tracing::info!(
            room_id = %room_id,
            subscriber_id = id,
            seat_id = ?viewer,
            "client subscribed to room"
        );

        (id, rx)
    }

    /// Sends every subscriber of the room the frame built for its own viewer.
    pub fn publish<F>(&self, room_id: &RoomId, build: F)
    where
        F: Fn(Option<SeatId>) -> RoomFrame,
    {
        let Some(list) = self.read().get(room_id).cloned() else {
            tracing::trace!(room_id = %room_id, "no subscribers for room");
            return;
        };

        let mut frames: HashMap<Option<SeatId>, RoomFrame> = HashMap::new();
        let mut failed = Vec::new();
        for sub in list {
            let frame = frames.entry(sub.viewer).or_insert_with(|| build(sub.viewer));
            if let Err(e) = sub.sender.try_send(frame.clone()) {
                tracing::warn!(
                    room_id = %room_id,
                    subscriber_id = sub.id,
                    error = %e,
                    "dropping subscriber"
                );
                failed.push(sub.id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(room_id, &failed);
        }
    }

    /// Sends a frame only to the streams bound to `seat`.
    pub fn send_to(&self, room_id: &RoomId, seat: SeatId, frame: RoomFrame) {
        let targets: Vec<Subscriber> = match self.read().get(room_id) {
            Some(list) => list.iter().filter(|s| s.viewer == Some(seat)).cloned().collect(),
            None => return,
        };
        let mut failed = Vec::new();
        for sub in targets {
            if sub.sender.try_send(frame.clone()).is_err() {
                failed.push(sub.id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(room_id, &failed);
        }
    }

    /// Tells every subscriber the room is gone and forgets them, which ends their streams.
    pub fn close_room(&self, room_id: &RoomId, reason: &str) {
        let removed = self.write().remove(room_id);
        if let Some(list) = removed {
            tracing::debug!(room_id = %room_id, subscribers = list.len(), "closing room streams");
            let frame = RoomFrame::RoomClosed {
                reason: reason.to_string(),
            };
            for sub in list {
                let _ = sub.sender.try_send(frame.clone());
            }
        }
    }

    pub fn unsubscribe(&self, room_id: &RoomId, subscriber_id: usize) {
        self.remove_subscribers(room_id, &[subscriber_id]);
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().values().map(|list| list.len()).sum()
    }

    pub fn room_subscriber_count(&self, room_id: &RoomId) -> usize {
        self.read().get(room_id).map_or(0, |list| list.len())
    }

    /// Open streams bound to `seat` in the room.
    pub fn viewer_count(&self, room_id: &RoomId, seat: SeatId) -> usize {
        self.read().get(room_id).map_or(0, |list| {
            list.iter().filter(|s| s.viewer == Some(seat)).count()
        })
    }

    fn remove_subscribers(&self, room_id: &RoomId, ids: &[usize]) {
        let mut guard = self.write();
        if let Some(list) = guard.get_mut(room_id) {
            list.retain(|s| !ids.contains(&s.id));
            if list.is_empty() {
                guard.remove(room_id);
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RoomId, Vec<Subscriber>>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, Vec<Subscriber>>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
