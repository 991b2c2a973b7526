/// Error handling for the room transport.
///
/// This module provides:
/// - The JSON error body shared by every endpoint and by `rejected` stream frames
/// - HTTP status code mappings for room and engine errors
/// - Severity-based logging through `tracing`
use pokeroom_engine::errors::GameError;
use pokeroom_engine::player::SeatId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use crate::room_actor::RoomId;

/// Standard error response format for all API endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "room_not_found")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Error classification for logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Rejected requests; normal operation.
    Client,
    /// Unexpected failures in the server itself.
    Server,
    /// Money or card state of a room can no longer be trusted.
    Critical,
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error code.
    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// Convert to HTTP response, logging according to severity.
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let severity = self.severity();
        let error_response = self.to_error_response();

        match severity {
            ErrorSeverity::Client => tracing::info!(
                error = %error_response.error,
                status = status.as_u16(),
                "request rejected: {}",
                error_response.message
            ),
            ErrorSeverity::Server => tracing::error!(
                error = %error_response.error,
                status = status.as_u16(),
                "server error: {}",
                error_response.message
            ),
            ErrorSeverity::Critical => tracing::error!(
                error = %error_response.error,
                status = status.as_u16(),
                critical = true,
                "critical error: {}",
                error_response.message
            ),
        }

        error_response.into_response(status)
    }
}

/// Why a request against a room could not be served.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room `{0}` was not found")]
    NotFound(RoomId),
    #[error("room `{0}` is closed")]
    Closed(RoomId),
    #[error("seat token is missing or does not match seat {0}")]
    InvalidToken(SeatId),
    #[error("intent sequence {sequence} for seat {seat} is not newer than {last}")]
    DuplicateIntent { seat: SeatId, sequence: u64, last: u64 },
    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// True when the error is worth echoing on the sender's own stream.
    pub fn is_protocol_rejection(&self) -> bool {
        match self {
            RoomError::DuplicateIntent { .. } => true,
            RoomError::Game(err) => !err.is_invariant_violation(),
            _ => false,
        }
    }
}

impl IntoErrorResponse for RoomError {
    fn status_code(&self) -> StatusCode {
        match self {
            RoomError::NotFound(_) => StatusCode::NOT_FOUND,
            RoomError::Closed(_) => StatusCode::GONE,
            RoomError::InvalidToken(_) => StatusCode::FORBIDDEN,
            RoomError::DuplicateIntent { .. } => StatusCode::CONFLICT,
            RoomError::Game(err) => game_status(err),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "room_not_found",
            RoomError::Closed(_) => "room_closed",
            RoomError::InvalidToken(_) => "invalid_token",
            RoomError::DuplicateIntent { .. } => "duplicate_intent",
            RoomError::Game(err) => game_code(err),
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            RoomError::DuplicateIntent { seat, sequence, last } => Some(serde_json::json!({
                "seatId": seat,
                "sequence": sequence,
                "lastApplied": last,
            })),
            RoomError::Game(GameError::InsufficientChips {
                required,
                available,
            }) => Some(serde_json::json!({
                "required": required,
                "available": available,
            })),
            RoomError::Game(GameError::RaiseTooSmall {
                amount,
                current_bet,
            }) => Some(serde_json::json!({
                "amount": amount,
                "currentBet": current_bet,
            })),
            RoomError::Game(GameError::InvalidBuyIn { amount, min, max }) => {
                Some(serde_json::json!({ "amount": amount, "min": min, "max": max }))
            }
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            RoomError::Game(err) if err.is_invariant_violation() => ErrorSeverity::Critical,
            _ => ErrorSeverity::Client,
        }
    }
}

fn game_status(err: &GameError) -> StatusCode {
    use GameError::*;
    match err {
        UnknownSeat(_) => StatusCode::NOT_FOUND,
        TableFull { .. } | WrongPhase { .. } | AlreadyReady(_) | Busted(_) | NotYourTurn { .. } => {
            StatusCode::CONFLICT
        }
        CannotCheck { .. }
        | NothingToCall
        | BetNotAllowed { .. }
        | NoBetToRaise
        | RaiseTooSmall { .. }
        | InsufficientChips { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InvalidName { .. }
        | InvalidBuyIn { .. }
        | InvalidConfig(_)
        | InvalidAmount
        | MalformedIntent(_)
        | InvalidCard(_)
        | InvalidHandSize(_) => StatusCode::BAD_REQUEST,
        EmptyDeck
        | DuplicateCard(_)
        | LedgerSize(_)
        | ChipConservation { .. }
        | PotMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn game_code(err: &GameError) -> &'static str {
    use GameError::*;
    match err {
        UnknownSeat(_) => "unknown_seat",
        TableFull { .. } => "table_full",
        InvalidName { .. } => "invalid_name",
        InvalidBuyIn { .. } => "invalid_buy_in",
        InvalidConfig(_) => "invalid_config",
        WrongPhase { .. } => "wrong_phase",
        AlreadyReady(_) => "already_ready",
        Busted(_) => "busted",
        NotYourTurn { .. } => "not_your_turn",
        CannotCheck { .. } => "cannot_check",
        NothingToCall => "nothing_to_call",
        BetNotAllowed { .. } => "bet_not_allowed",
        NoBetToRaise => "no_bet_to_raise",
        RaiseTooSmall { .. } => "raise_too_small",
        InvalidAmount => "invalid_amount",
        InsufficientChips { .. } => "insufficient_chips",
        MalformedIntent(_) => "malformed_intent",
        InvalidCard(_) => "invalid_card",
        InvalidHandSize(_) => "invalid_hand_size",
        EmptyDeck | DuplicateCard(_) | LedgerSize(_) | ChipConservation { .. } | PotMismatch { .. } => {
            "invariant_violation"
        }
    }
}
