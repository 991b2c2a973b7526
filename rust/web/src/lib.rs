//! Network transport for poker rooms.
//!
//! Each room is owned by one [`RoomActor`] task. HTTP requests become commands on
//! that actor's inbox, and every accepted mutation is pushed to the room's stream
//! subscribers, each receiving the snapshot built for its own seat.

pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod room_actor;
pub mod rooms;
pub mod server;
pub mod settings;

pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse, RoomError};
pub use events::{EventBus, EventSubscription, RoomFrame, RoomUpdate};
pub use logging::{init_logging, CaptureLayer, LogEntry, TestLogSubscriber};
pub use room_actor::{RoomActor, RoomCommand, RoomHandle, RoomId, RoomOptions, SeatToken};
pub use rooms::{RoomManager, RoomSummary};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use settings::{AppSettings, ResolvedSettings, SettingsError, SettingsOverrides, ValueSource};
