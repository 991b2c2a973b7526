use pokeroom_web::{AppContext, WebServer};
use serde_json::{json, Value};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;

type Routes = BoxedFilter<(Response,)>;

fn routes() -> Routes {
    WebServer::routes(&AppContext::new_for_tests())
}

async fn send(routes: &Routes, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = warp::test::request().method(method).path(path);
    let request = match body {
        Some(body) => request.json(&body),
        None => request.body(""),
    };
    let response = request.reply(routes).await;
    let status = response.status();
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).expect("response body should be JSON")
    };
    (status, body)
}

struct Seat {
    id: u64,
    token: String,
}

impl Seat {
    fn query(&self) -> String {
        format!("seat={}&token={}", self.id, self.token)
    }
}

async fn create_room(routes: &Routes, body: Value) -> String {
    let (status, created) = send(routes, "POST", "/api/rooms", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["roomId"].as_str().expect("room id").to_string()
}

async fn join(routes: &Routes, room: &str, name: &str, chips: u32) -> Seat {
    let (status, grant) = send(
        routes,
        "POST",
        &format!("/api/rooms/{room}/seats"),
        Some(json!({ "displayName": name, "startingChips": chips })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{grant}");
    Seat {
        id: grant["seatId"].as_u64().expect("seat id"),
        token: grant["token"].as_str().expect("token").to_string(),
    }
}

async fn intent(routes: &Routes, room: &str, seat: &Seat, body: Value) -> (StatusCode, Value) {
    send(
        routes,
        "POST",
        &format!("/api/rooms/{room}/seats/{}/intents?token={}", seat.id, seat.token),
        Some(body),
    )
    .await
}

#[tokio::test]
async fn health_reports_room_count() {
    let routes = routes();
    let (status, body) = send(&routes, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 0);

    create_room(&routes, json!({})).await;
    let (_, body) = send(&routes, "GET", "/health", None).await;
    assert_eq!(body["rooms"], 1);
}

#[tokio::test]
async fn create_room_applies_overrides_and_lists_it() {
    let routes = routes();
    let (status, created) = send(
        &routes,
        "POST",
        "/api/rooms",
        Some(json!({ "smallBlind": 10, "bigBlind": 20, "maxSeats": 4, "seed": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["bigBlind"], 20);
    assert_eq!(created["maxSeats"], 4);
    assert_eq!(created["seed"], 3);

    let (status, listed) = send(&routes, "GET", "/api/rooms", None).await;
    assert_eq!(status, StatusCode::OK);
    let rooms = listed.as_array().expect("room list");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["roomId"], created["roomId"]);
    assert_eq!(rooms[0]["phase"], "waiting");
    assert_eq!(rooms[0]["seated"], 0);
}

#[tokio::test]
async fn create_room_without_body_uses_defaults() {
    let routes = routes();
    let (status, created) = send(&routes, "POST", "/api/rooms", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["smallBlind"], 5);
    assert_eq!(created["bigBlind"], 10);
    assert_eq!(created["maxSeats"], 6);
}

#[tokio::test]
async fn invalid_room_config_is_rejected() {
    let routes = routes();
    let (status, body) = send(
        &routes,
        "POST",
        "/api/rooms",
        Some(json!({ "smallBlind": 20, "bigBlind": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_config");

    let (status, body) = send(&routes, "POST", "/api/rooms", Some(json!({ "blinds": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_body");
}

#[tokio::test]
async fn hole_cards_are_only_visible_to_their_owner() {
    let routes = routes();
    let room = create_room(&routes, json!({ "seed": 42 })).await;
    let ann = join(&routes, &room, "ann", 1000).await;
    let bob = join(&routes, &room, "bob", 1000).await;

    let (status, _) = intent(&routes, &room, &ann, json!({ "type": "ready" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, update) = intent(&routes, &room, &bob, json!({ "type": "ready" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["snapshot"]["phase"], "preflop");

    let (status, mine) = send(&routes, "GET", &format!("/api/rooms/{room}/state?{}", ann.query()), None).await;
    assert_eq!(status, StatusCode::OK);
    let players = mine["players"].as_array().unwrap();
    assert_eq!(players[0]["id"], ann.id);
    assert_eq!(players[0]["cards"].as_array().map(Vec::len), Some(2));
    assert_eq!(players[1]["cards"], 2);

    let (status, public) = send(&routes, "GET", &format!("/api/rooms/{room}/state"), None).await;
    assert_eq!(status, StatusCode::OK);
    for player in public["players"].as_array().unwrap() {
        assert_eq!(player["cards"], 2);
    }
}

#[tokio::test]
async fn state_with_a_forged_token_is_forbidden() {
    let routes = routes();
    let room = create_room(&routes, json!({})).await;
    let ann = join(&routes, &room, "ann", 500).await;

    let path = format!("/api/rooms/{room}/state?seat={}&token=forged", ann.id);
    let (status, body) = send(&routes, "GET", &path, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_token");

    let path = format!("/api/rooms/{room}/state?seat={}", ann.id);
    let (status, _) = send(&routes, "GET", &path, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn intents_are_validated_before_they_reach_the_room() {
    let routes = routes();
    let room = create_room(&routes, json!({ "seed": 7 })).await;
    let ann = join(&routes, &room, "ann", 1000).await;
    let bob = join(&routes, &room, "bob", 1000).await;
    intent(&routes, &room, &ann, json!({ "type": "ready" })).await;
    intent(&routes, &room, &bob, json!({ "type": "ready" })).await;

    // heads-up: the dealer (first seat) acts first preflop
    let (status, body) = intent(&routes, &room, &bob, json!({ "type": "call" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_your_turn");

    let forged = Seat {
        id: ann.id,
        token: bob.token.clone(),
    };
    let (status, body) = intent(&routes, &room, &forged, json!({ "type": "call" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_token");

    let (status, body) = intent(&routes, &room, &ann, json!({ "type": "bet" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_intent");

    let (status, body) = intent(&routes, &room, &ann, json!({ "type": "raise", "amount": 10 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "raise_too_small");

    let (status, body) = intent(&routes, &room, &ann, json!({ "type": "call", "sequence": 1 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = intent(&routes, &room, &ann, json!({ "type": "call", "sequence": 1 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_intent");
    assert_eq!(body["details"]["last"], 1);
}

#[tokio::test]
async fn leaving_mid_hand_folds_when_the_turn_comes() {
    let routes = routes();
    let room = create_room(&routes, json!({ "seed": 11 })).await;
    let ann = join(&routes, &room, "ann", 1000).await;
    let bob = join(&routes, &room, "bob", 1000).await;
    intent(&routes, &room, &ann, json!({ "type": "ready" })).await;
    intent(&routes, &room, &bob, json!({ "type": "ready" })).await;

    intent(&routes, &room, &ann, json!({ "type": "call" })).await;
    let (status, update) = intent(&routes, &room, &bob, json!({ "type": "check" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["snapshot"]["phase"], "flop");
    assert_eq!(update["snapshot"]["communityCards"].as_array().map(Vec::len), Some(3));

    let path = format!("/api/rooms/{room}/seats/{}?token={}", ann.id, ann.token);
    let (status, _) = send(&routes, "DELETE", &path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, update) = intent(&routes, &room, &bob, json!({ "type": "bet", "amount": 20 })).await;
    assert_eq!(status, StatusCode::OK, "{update}");
    let snapshot = &update["snapshot"];
    assert_eq!(snapshot["phase"], "waiting");
    let players = snapshot["players"].as_array().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["chips"], 1010);

    let events = update["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["kind"] == "seat_left" && e["chips"] == 990));

    // the departed seat's token no longer works
    let (status, _) = intent(&routes, &room, &ann, json!({ "type": "ready" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn closed_room_is_gone() {
    let routes = routes();
    let room = create_room(&routes, json!({})).await;

    let (status, _) = send(&routes, "DELETE", &format!("/api/rooms/{room}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&routes, "GET", &format!("/api/rooms/{room}/state"), None).await;
    assert!(status == StatusCode::NOT_FOUND || status == StatusCode::GONE, "{status}");
    assert!(body["error"] == "room_not_found" || body["error"] == "room_closed");

    let (status, body) = send(&routes, "GET", "/api/rooms/nope/state", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "room_not_found");
}

#[tokio::test]
async fn unknown_paths_and_bad_queries_get_json_errors() {
    let routes = routes();
    let (status, body) = send(&routes, "GET", "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let room = create_room(&routes, json!({})).await;
    let (status, body) = send(&routes, "GET", &format!("/api/rooms/{room}/state?seat=abc"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_query");
}
