use crate::errors::RoomError;
use crate::events::EventBus;
use crate::room_actor::{spawn_room, RoomHandle, RoomId, RoomOptions};
use pokeroom_engine::room::Phase;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lobby view of one room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub phase: Phase,
    pub seated: usize,
    pub max_seats: usize,
    pub small_blind: u32,
    pub big_blind: u32,
    pub min_buy_in: u32,
    pub max_buy_in: u32,
    pub hand_number: u64,
}

/// Registry of running rooms.
///
/// Each room runs in its own task; the registry only holds handles. A room whose
/// task ends, for whatever reason, removes itself from the registry.
#[derive(Debug, Clone)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    bus: Arc<EventBus>,
    defaults: RoomOptions,
}

impl RoomManager {
    pub fn new(bus: Arc<EventBus>, defaults: RoomOptions) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            bus,
            defaults,
        }
    }

    pub fn defaults(&self) -> &RoomOptions {
        &self.defaults
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Starts a room. The configuration is validated before anything is spawned.
    pub async fn create(&self, options: RoomOptions) -> Result<RoomHandle, RoomError> {
        let id = Uuid::new_v4().to_string();
        let (handle, task) = spawn_room(id.clone(), options, Arc::clone(&self.bus))?;
        self.rooms.write().await.insert(id.clone(), handle.clone());

        let rooms = Arc::clone(&self.rooms);
        tokio::spawn(async move {
            if let Err(err) = task.await {
                tracing::error!(room_id = %id, error = %err, "room task failed");
            }
            rooms.write().await.remove(&id);
        });

        Ok(handle)
    }

    pub async fn get(&self, id: &str) -> Result<RoomHandle, RoomError> {
        match self.rooms.read().await.get(id) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            Some(_) => Err(RoomError::Closed(id.to_string())),
            None => Err(RoomError::NotFound(id.to_string())),
        }
    }

    pub async fn list(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            // a room may close between the read and the request
            if let Ok(snapshot) = handle.snapshot(None).await {
                let config = handle.config();
                summaries.push(RoomSummary {
                    room_id: handle.id().clone(),
                    phase: snapshot.phase,
                    seated: snapshot.players.len(),
                    max_seats: config.max_seats,
                    small_blind: config.small_blind,
                    big_blind: config.big_blind,
                    min_buy_in: config.min_buy_in,
                    max_buy_in: config.max_buy_in,
                    hand_number: snapshot.hand_number,
                });
            }
        }
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    pub async fn close(&self, id: &str) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(id)
            .ok_or_else(|| RoomError::NotFound(id.to_string()))?;
        tracing::info!(room_id = %id, "closing room");
        match handle.close().await {
            Ok(()) | Err(RoomError::Closed(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokeroom_engine::errors::GameError;
    use pokeroom_engine::room::RoomConfig;

    fn manager() -> RoomManager {
        RoomManager::new(Arc::new(EventBus::new()), RoomOptions::default())
    }

    #[tokio::test]
    async fn create_list_and_close() {
        let rooms = manager();
        let handle = rooms.create(RoomOptions::default()).await.unwrap();
        handle.join("ann", 500).await.unwrap();

        let listed = rooms.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].seated, 1);
        assert_eq!(listed[0].phase, Phase::Waiting);

        rooms.close(handle.id()).await.unwrap();
        assert!(rooms.is_empty().await);
        assert!(matches!(
            rooms.get(handle.id()).await,
            Err(RoomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_spawning() {
        let rooms = manager();
        let options = RoomOptions {
            config: RoomConfig {
                small_blind: 10,
                big_blind: 10,
                ..RoomConfig::default()
            },
            ..RoomOptions::default()
        };
        let err = rooms.create(options).await.unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::InvalidConfig(_))));
        assert!(rooms.is_empty().await);
    }

    #[tokio::test]
    async fn closing_unknown_room_is_not_found() {
        let rooms = manager();
        assert_eq!(
            rooms.close("nope").await,
            Err(RoomError::NotFound("nope".into()))
        );
    }
}
