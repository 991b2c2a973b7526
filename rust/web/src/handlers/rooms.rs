use crate::errors::{ErrorResponse, IntoErrorResponse, RoomError};
use crate::room_actor::{RoomOptions, SeatToken};
use crate::rooms::RoomManager;
use pokeroom_engine::errors::GameError;
use pokeroom_engine::intent::PlayerIntent;
use pokeroom_engine::player::SeatId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Optional overrides of the server's room defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub small_blind: Option<u32>,
    pub big_blind: Option<u32>,
    pub max_seats: Option<usize>,
    pub min_buy_in: Option<u32>,
    pub max_buy_in: Option<u32>,
    pub seed: Option<u64>,
    pub action_timeout_secs: Option<u64>,
}

impl CreateRoomRequest {
    pub fn into_options(self, defaults: &RoomOptions) -> Result<RoomOptions, GameError> {
        let mut options = defaults.clone();
        let config = &mut options.config;
        if let Some(v) = self.small_blind {
            config.small_blind = v;
        }
        if let Some(v) = self.big_blind {
            config.big_blind = v;
        }
        if let Some(v) = self.max_seats {
            config.max_seats = v;
        }
        if let Some(v) = self.min_buy_in {
            config.min_buy_in = v;
        }
        if let Some(v) = self.max_buy_in {
            config.max_buy_in = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        match self.action_timeout_secs {
            Some(0) => {
                return Err(GameError::InvalidConfig(
                    "actionTimeoutSecs must be greater than 0".into(),
                ))
            }
            Some(secs) => options.action_timeout = Some(Duration::from_secs(secs)),
            None => {}
        }
        Ok(options)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomCreated {
    room_id: String,
    small_blind: u32,
    big_blind: u32,
    max_seats: usize,
    min_buy_in: u32,
    max_buy_in: u32,
    seed: Option<u64>,
    action_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub display_name: String,
    pub starting_chips: u32,
}

/// `?seat=&token=`: who is looking. Without a seat the public view is returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewerQuery {
    pub seat: Option<SeatId>,
    pub token: Option<String>,
}

impl ViewerQuery {
    pub fn viewer(self) -> Result<Option<SeatToken>, RoomError> {
        match (self.seat, self.token) {
            (Some(seat), Some(token)) => Ok(Some(SeatToken::new(seat, token))),
            (Some(seat), None) => Err(RoomError::InvalidToken(seat)),
            (None, _) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

impl TokenQuery {
    fn for_seat(self, seat: SeatId) -> SeatToken {
        // an empty token never matches a issued one
        SeatToken::new(seat, self.token.unwrap_or_default())
    }
}

/// Decodes an intent body: the `PlayerIntent` wire form plus an optional `sequence`.
pub fn parse_intent(body: &[u8]) -> Result<(PlayerIntent, Option<u64>), GameError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| GameError::MalformedIntent(e.to_string()))?;
    let sequence = match value.get("sequence") {
        None | Some(serde_json::Value::Null) => None,
        Some(raw) => Some(raw.as_u64().ok_or_else(|| {
            GameError::MalformedIntent("sequence must be a non-negative integer".into())
        })?),
    };
    let intent = serde_json::from_value(value).map_err(|e| GameError::MalformedIntent(e.to_string()))?;
    Ok((intent, sequence))
}

fn json_response<T: Serialize>(body: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(body), status).into_response()
}

pub async fn list_rooms(rooms: Arc<RoomManager>) -> Response {
    json_response(&rooms.list().await, StatusCode::OK)
}

pub async fn create_room(rooms: Arc<RoomManager>, body: &[u8]) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateRoomRequest::default()
    } else {
        match serde_json::from_slice::<CreateRoomRequest>(body) {
            Ok(request) => request,
            Err(err) => {
                return ErrorResponse::new("malformed_body", err.to_string())
                    .into_response(StatusCode::BAD_REQUEST)
            }
        }
    };

    let options = match request.into_options(rooms.defaults()) {
        Ok(options) => options,
        Err(err) => return RoomError::from(err).into_http_response(),
    };
    let action_timeout_secs = options.action_timeout.map(|d| d.as_secs());
    match rooms.create(options).await {
        Ok(handle) => {
            let config = handle.config();
            let created = RoomCreated {
                room_id: handle.id().clone(),
                small_blind: config.small_blind,
                big_blind: config.big_blind,
                max_seats: config.max_seats,
                min_buy_in: config.min_buy_in,
                max_buy_in: config.max_buy_in,
                seed: config.seed,
                action_timeout_secs,
            };
            json_response(&created, StatusCode::CREATED)
        }
        Err(err) => err.into_http_response(),
    }
}

pub async fn room_state(rooms: Arc<RoomManager>, room_id: String, query: ViewerQuery) -> Response {
    let result = async {
        let viewer = query.viewer()?;
        rooms.get(&room_id).await?.snapshot(viewer).await
    }
    .await;
    match result {
        Ok(snapshot) => json_response(&snapshot, StatusCode::OK),
        Err(err) => err.into_http_response(),
    }
}

pub async fn close_room(rooms: Arc<RoomManager>, room_id: String) -> Response {
    match rooms.close(&room_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_http_response(),
    }
}

pub async fn join_seat(rooms: Arc<RoomManager>, room_id: String, request: JoinRequest) -> Response {
    let result = async {
        rooms
            .get(&room_id)
            .await?
            .join(&request.display_name, request.starting_chips)
            .await
    }
    .await;
    match result {
        Ok(grant) => json_response(&grant, StatusCode::CREATED),
        Err(err) => err.into_http_response(),
    }
}

pub async fn leave_seat(
    rooms: Arc<RoomManager>,
    room_id: String,
    seat: SeatId,
    query: TokenQuery,
) -> Response {
    let result = async { rooms.get(&room_id).await?.leave(query.for_seat(seat)).await }.await;
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_http_response(),
    }
}

pub async fn submit_intent(
    rooms: Arc<RoomManager>,
    room_id: String,
    seat: SeatId,
    query: TokenQuery,
    body: &[u8],
) -> Response {
    let result = async {
        let (intent, sequence) = parse_intent(body)?;
        rooms
            .get(&room_id)
            .await?
            .intent(query.for_seat(seat), sequence, intent)
            .await
    }
    .await;
    match result {
        Ok(update) => json_response(&update, StatusCode::OK),
        Err(err) => err.into_http_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_body_with_sequence() {
        let (intent, sequence) = parse_intent(br#"{"type":"raise","amount":60,"sequence":7}"#).unwrap();
        assert_eq!(intent, PlayerIntent::Raise { amount: 60 });
        assert_eq!(sequence, Some(7));

        let (intent, sequence) = parse_intent(br#"{"type":"check"}"#).unwrap();
        assert_eq!(intent, PlayerIntent::Check);
        assert_eq!(sequence, None);
    }

    #[test]
    fn malformed_intent_bodies() {
        for body in [
            &br#"{"type":"bet"}"#[..],
            br#"{"type":"bet","amount":-5}"#,
            br#"{"type":"shove"}"#,
            br#"{"type":"call","sequence":"one"}"#,
            b"not json",
        ] {
            assert!(
                matches!(parse_intent(body), Err(GameError::MalformedIntent(_))),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn create_request_overrides_defaults() {
        let request: CreateRoomRequest =
            serde_json::from_str(r#"{"bigBlind":40,"smallBlind":20,"seed":9,"actionTimeoutSecs":15}"#)
                .unwrap();
        let options = request.into_options(&RoomOptions::default()).unwrap();
        assert_eq!(options.config.small_blind, 20);
        assert_eq!(options.config.big_blind, 40);
        assert_eq!(options.config.seed, Some(9));
        assert_eq!(options.action_timeout, Some(Duration::from_secs(15)));
        assert_eq!(options.config.max_seats, RoomOptions::default().config.max_seats);
    }

    #[test]
    fn seat_without_token_is_refused() {
        let query = ViewerQuery {
            seat: Some(3),
            token: None,
        };
        assert_eq!(query.viewer(), Err(RoomError::InvalidToken(3)));
        assert_eq!(ViewerQuery::default().viewer(), Ok(None));
    }
}
