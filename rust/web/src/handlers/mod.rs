pub mod health;
pub mod rooms;
pub mod sse;

pub use health::health;
pub use rooms::{
    close_room, create_room, join_seat, leave_seat, list_rooms, parse_intent, room_state,
    submit_intent, CreateRoomRequest, JoinRequest, TokenQuery, ViewerQuery,
};
pub use sse::stream_room;
