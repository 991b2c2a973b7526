use crate::errors::{IntoErrorResponse, RoomError};
use crate::events::{EventBus, EventSubscription, RoomFrame, RoomUpdate};
use crate::handlers::rooms::ViewerQuery;
use crate::room_actor::RoomHandle;
use crate::rooms::RoomManager;
use pokeroom_engine::player::SeatId;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

/// Opens a room stream for one viewer.
///
/// The first frame is the viewer's current snapshot. A seated viewer is reconnected
/// on open, and when its last stream goes away the room is told it disconnected.
pub async fn stream_room(
    rooms: Arc<RoomManager>,
    event_bus: Arc<EventBus>,
    room_id: String,
    query: ViewerQuery,
) -> Response {
    let opened = async {
        let viewer = query.viewer()?;
        let handle = rooms.get(&room_id).await?;
        if let Some(seat) = &viewer {
            handle.reconnect(seat.clone()).await?;
        }
        // subscribe before reading the snapshot so no update falls in between
        let subscription = event_bus.subscribe(room_id.clone(), viewer.as_ref().map(|s| s.seat_id));
        let snapshot = handle.snapshot(viewer).await?;
        Ok::<_, RoomError>((handle, subscription, snapshot))
    }
    .await;

    let (handle, subscription, snapshot) = match opened {
        Ok(parts) => parts,
        Err(err) => return err.into_http_response(),
    };

    let first = RoomFrame::State(RoomUpdate {
        snapshot,
        events: Vec::new(),
    });
    let stream = tokio_stream::iter(vec![Ok(render_frame(&first))])
        .chain(subscription_stream(subscription, handle));
    let keep_alive = sse::keep_alive()
        .interval(Duration::from_secs(15))
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(stream));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

/// Keeps the subscription alive for as long as the stream is, and reports the seat
/// as disconnected once its last stream is dropped.
struct StreamGuard {
    subscription: Option<EventSubscription>,
    room: RoomHandle,
    seat: Option<SeatId>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        let bus = subscription.bus().clone();
        let room_id = subscription.room_id().clone();
        drop(subscription);
        if let Some(seat) = self.seat {
            if bus.viewer_count(&room_id, seat) == 0 && !self.room.is_closed() {
                tracing::debug!(room_id = %room_id, seat_id = seat, "last stream for seat closed");
                self.room.notify_disconnect(seat);
            }
        }
    }
}

fn subscription_stream(
    mut subscription: EventSubscription,
    room: RoomHandle,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    let (_, placeholder_rx) = mpsc::channel(1);
    let receiver = std::mem::replace(&mut subscription.receiver, placeholder_rx);
    let guard = Arc::new(StreamGuard {
        seat: subscription.viewer(),
        subscription: Some(subscription),
        room,
    });

    ReceiverStream::new(receiver).map(move |frame| {
        let _keep_alive = Arc::clone(&guard);
        Ok(render_frame(&frame))
    })
}

fn render_frame(frame: &RoomFrame) -> sse::Event {
    match serde_json::to_string(frame) {
        Ok(json) => sse::Event::default().event("room_frame").data(json),
        Err(err) => {
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize room frame: {err}")
            })
            .to_string();
            sse::Event::default().event("room_frame").data(fallback)
        }
    }
}
