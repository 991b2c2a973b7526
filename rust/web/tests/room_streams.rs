use pokeroom_engine::intent::PlayerIntent;
use pokeroom_engine::player::SeatStatus;
use pokeroom_engine::room::{Phase, RoomConfig, RoomEvent};
use pokeroom_engine::snapshot::HoleCardsView;
use pokeroom_web::handlers::{self, ViewerQuery};
use pokeroom_web::{
    AppContext, EventSubscription, RoomError, RoomFrame, RoomHandle, RoomOptions, SeatToken,
};
use std::time::Duration;
use tokio::time::timeout;
use warp::http::StatusCode;
use warp::hyper::body::HttpBody;

fn seeded(seed: u64) -> RoomOptions {
    RoomOptions {
        config: RoomConfig {
            seed: Some(seed),
            ..RoomConfig::default()
        },
        ..RoomOptions::default()
    }
}

fn drain(subscription: &mut EventSubscription) -> Vec<RoomFrame> {
    let mut frames = Vec::new();
    while let Ok(frame) = subscription.receiver.try_recv() {
        frames.push(frame);
    }
    frames
}

async fn seat_two(room: &RoomHandle) -> (SeatToken, SeatToken) {
    let ann = room.join("ann", 1000).await.expect("ann joins");
    let bob = room.join("bob", 1000).await.expect("bob joins");
    (ann, bob)
}

async fn ready(room: &RoomHandle, seat: &SeatToken) {
    room.intent(seat.clone(), None, PlayerIntent::Ready)
        .await
        .expect("ready accepted");
}

#[tokio::test]
async fn each_subscriber_sees_only_its_own_cards() {
    let ctx = AppContext::new_for_tests();
    let bus = ctx.event_bus();
    let room = ctx.rooms().create(seeded(5)).await.expect("create room");
    let (ann, bob) = seat_two(&room).await;

    let mut ann_stream = bus.subscribe(room.id().clone(), Some(ann.seat_id));
    let mut bob_stream = bus.subscribe(room.id().clone(), Some(bob.seat_id));
    let mut spectator = bus.subscribe(room.id().clone(), None);

    ready(&room, &ann).await;
    ready(&room, &bob).await;

    let last_state = |frames: Vec<RoomFrame>| match frames.into_iter().last() {
        Some(RoomFrame::State(update)) => update,
        other => panic!("expected a state frame, got {other:?}"),
    };

    let for_ann = last_state(drain(&mut ann_stream));
    assert_eq!(for_ann.snapshot.phase, Phase::Preflop);
    assert!(for_ann
        .events
        .iter()
        .any(|e| matches!(e, RoomEvent::HandStarted { hand_number: 1, .. })));
    assert!(for_ann.snapshot.players[0].cards.is_visible());
    assert_eq!(for_ann.snapshot.players[1].cards, HoleCardsView::Hidden(2));

    let for_bob = last_state(drain(&mut bob_stream));
    assert_eq!(for_bob.snapshot.players[0].cards, HoleCardsView::Hidden(2));
    assert!(for_bob.snapshot.players[1].cards.is_visible());
    assert_eq!(for_ann.events, for_bob.events);

    let public = last_state(drain(&mut spectator));
    assert!(public.snapshot.players.iter().all(|p| !p.cards.is_visible()));
}

#[tokio::test]
async fn rejections_reach_only_the_sender() {
    let ctx = AppContext::new_for_tests();
    let bus = ctx.event_bus();
    let room = ctx.rooms().create(seeded(6)).await.expect("create room");
    let (ann, bob) = seat_two(&room).await;
    ready(&room, &ann).await;
    ready(&room, &bob).await;

    let mut ann_stream = bus.subscribe(room.id().clone(), Some(ann.seat_id));
    let mut bob_stream = bus.subscribe(room.id().clone(), Some(bob.seat_id));

    let err = room
        .intent(bob.clone(), None, PlayerIntent::Check)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::Game(_)));

    match drain(&mut bob_stream).as_slice() {
        [RoomFrame::Rejected { error }] => assert_eq!(error.error, "not_your_turn"),
        other => panic!("expected one rejection, got {other:?}"),
    }
    assert!(drain(&mut ann_stream).is_empty());

    // a forged token is answered to the caller but never pushed to the seat's stream
    let forged = SeatToken::new(ann.seat_id, "forged");
    let err = room.intent(forged, None, PlayerIntent::Fold).await.unwrap_err();
    assert_eq!(err, RoomError::InvalidToken(ann.seat_id));
    assert!(drain(&mut ann_stream).is_empty());
}

#[tokio::test]
async fn closing_a_room_ends_every_stream() {
    let ctx = AppContext::new_for_tests();
    let bus = ctx.event_bus();
    let rooms = ctx.rooms();
    let room = rooms.create(seeded(7)).await.expect("create room");
    let id = room.id().clone();
    let (ann, _) = seat_two(&room).await;

    let mut ann_stream = bus.subscribe(id.clone(), Some(ann.seat_id));
    let mut spectator = bus.subscribe(id.clone(), None);

    rooms.close(&id).await.expect("close room");

    for stream in [&mut ann_stream, &mut spectator] {
        let frame = timeout(Duration::from_secs(1), stream.receiver.recv())
            .await
            .expect("frame in time");
        assert!(matches!(frame, Some(RoomFrame::RoomClosed { ref reason }) if reason == "closed"));
        let end = timeout(Duration::from_secs(1), stream.receiver.recv())
            .await
            .expect("end in time");
        assert!(end.is_none());
    }
    assert_eq!(bus.room_subscriber_count(&id), 0);
}

#[tokio::test]
async fn stream_opens_with_the_viewers_snapshot() {
    let ctx = AppContext::new_for_tests();
    let room = ctx.rooms().create(seeded(8)).await.expect("create room");
    let (ann, _) = seat_two(&room).await;

    let query = ViewerQuery {
        seat: Some(ann.seat_id),
        token: Some(ann.token.clone()),
    };
    let response =
        handlers::stream_room(ctx.rooms(), ctx.event_bus(), room.id().clone(), query).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let chunk = timeout(Duration::from_secs(1), body.data())
        .await
        .expect("first frame in time")
        .expect("stream open")
        .expect("frame bytes");
    let text = String::from_utf8(chunk.to_vec()).expect("utf8");
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .expect("data line");
    let frame: serde_json::Value = serde_json::from_str(data).expect("frame json");
    assert_eq!(frame["type"], "state");
    assert_eq!(frame["snapshot"]["phase"], "waiting");
    assert_eq!(frame["snapshot"]["players"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn stream_with_a_forged_token_is_refused() {
    let ctx = AppContext::new_for_tests();
    let room = ctx.rooms().create(seeded(9)).await.expect("create room");
    let (ann, _) = seat_two(&room).await;

    let query = ViewerQuery {
        seat: Some(ann.seat_id),
        token: Some("forged".into()),
    };
    let response =
        handlers::stream_room(ctx.rooms(), ctx.event_bus(), room.id().clone(), query).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.event_bus().room_subscriber_count(room.id()), 0);

    let response = handlers::stream_room(
        ctx.rooms(),
        ctx.event_bus(),
        "missing".into(),
        ViewerQuery::default(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dropping_the_last_stream_sits_the_seat_out() {
    let ctx = AppContext::new_for_tests();
    let bus = ctx.event_bus();
    let room = ctx.rooms().create(seeded(10)).await.expect("create room");
    let id = room.id().clone();
    let (ann, _) = seat_two(&room).await;
    ready(&room, &ann).await;

    let open = |token: String| ViewerQuery {
        seat: Some(ann.seat_id),
        token: Some(token),
    };
    let first = handlers::stream_room(ctx.rooms(), bus.clone(), id.clone(), open(ann.token.clone())).await;
    let second = handlers::stream_room(ctx.rooms(), bus.clone(), id.clone(), open(ann.token.clone())).await;
    assert_eq!(bus.viewer_count(&id, ann.seat_id), 2);

    drop(first);
    let snapshot = room.snapshot(None).await.expect("snapshot");
    assert_eq!(snapshot.players[0].status, SeatStatus::Active);
    assert!(snapshot.players[0].is_ready);

    drop(second);
    assert_eq!(bus.viewer_count(&id, ann.seat_id), 0);
    let snapshot = room.snapshot(None).await.expect("snapshot");
    assert_eq!(snapshot.phase, Phase::Waiting);
    assert_eq!(snapshot.players[0].status, SeatStatus::SittingOut);
    assert!(!snapshot.players[0].is_ready);
}
