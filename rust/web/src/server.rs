use crate::errors::ErrorResponse;
use crate::events::EventBus;
use crate::handlers;
use crate::room_actor::RoomOptions;
use crate::rooms::RoomManager;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::hyper::body::Bytes;
use warp::http::StatusCode;
use warp::reply::Reply;
use warp::{Filter, Rejection};

/// Largest request body accepted by any endpoint.
const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    room_defaults: RoomOptions,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            room_defaults: RoomOptions::default(),
        }
    }

    pub fn with_room_defaults(mut self, room_defaults: RoomOptions) -> Self {
        self.room_defaults = room_defaults;
        self
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn room_defaults(&self) -> &RoomOptions {
        &self.room_defaults
    }
}

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    event_bus: Arc<EventBus>,
    rooms: Arc<RoomManager>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config
            .room_defaults()
            .config
            .validate()
            .map_err(|err| ServerError::ConfigError(err.to_string()))?;
        let event_bus = Arc::new(EventBus::new());
        let rooms = Arc::new(RoomManager::new(
            Arc::clone(&event_bus),
            config.room_defaults().clone(),
        ));
        Ok(Self::new_with_dependencies(config, event_bus, rooms))
    }

    pub fn new_with_dependencies(
        config: ServerConfig,
        event_bus: Arc<EventBus>,
        rooms: Arc<RoomManager>,
    ) -> Self {
        Self {
            config,
            event_bus,
            rooms,
        }
    }

    pub fn new_for_tests() -> Self {
        let config = ServerConfig::for_tests();
        let event_bus = Arc::new(EventBus::new());
        let rooms = Arc::new(RoomManager::new(
            Arc::clone(&event_bus),
            config.room_defaults().clone(),
        ));
        Self::new_with_dependencies(config, event_bus, rooms)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn rooms(&self) -> Arc<RoomManager> {
        Arc::clone(&self.rooms)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let context = AppContext::new(config)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.config())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "room server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every endpoint, with rejections turned into JSON error bodies.
    pub fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = Self::health_route(context);
        let rooms = Self::room_routes(context);
        let seats = Self::seat_routes(context);
        let stream = Self::stream_route(context);

        health
            .or(rooms)
            .unify()
            .or(seats)
            .unify()
            .or(stream)
            .unify()
            .recover(handle_rejection)
            .unify()
            .boxed()
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::with_rooms(context.rooms()))
            .and_then(|rooms: Arc<RoomManager>| async move {
                let response = handlers::health(rooms.len().await).into_response();
                Ok::<_, Infallible>(response)
            })
            .boxed()
    }

    fn room_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let rooms = context.rooms();

        let list = warp::path!("api" / "rooms")
            .and(warp::get())
            .and(Self::with_rooms(rooms.clone()))
            .and_then(|rooms: Arc<RoomManager>| async move {
                Ok::<_, Infallible>(handlers::list_rooms(rooms).await)
            });

        let create = warp::path!("api" / "rooms")
            .and(warp::post())
            .and(Self::with_rooms(rooms.clone()))
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::bytes())
            .and_then(|rooms: Arc<RoomManager>, body: Bytes| async move {
                Ok::<_, Infallible>(handlers::create_room(rooms, &body).await)
            });

        let state = warp::path!("api" / "rooms" / String / "state")
            .and(warp::get())
            .and(warp::query::<handlers::ViewerQuery>())
            .and(Self::with_rooms(rooms.clone()))
            .and_then(
                |room_id: String, query: handlers::ViewerQuery, rooms: Arc<RoomManager>| async move {
                    Ok::<_, Infallible>(handlers::room_state(rooms, room_id, query).await)
                },
            );

        let close = warp::path!("api" / "rooms" / String)
            .and(warp::delete())
            .and(Self::with_rooms(rooms))
            .and_then(|room_id: String, rooms: Arc<RoomManager>| async move {
                Ok::<_, Infallible>(handlers::close_room(rooms, room_id).await)
            });

        list.or(create)
            .unify()
            .or(state)
            .unify()
            .or(close)
            .unify()
            .boxed()
    }

    fn seat_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let rooms = context.rooms();

        let join = warp::path!("api" / "rooms" / String / "seats")
            .and(warp::post())
            .and(Self::with_rooms(rooms.clone()))
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and_then(
                |room_id: String, rooms: Arc<RoomManager>, request: handlers::JoinRequest| async move {
                    Ok::<_, Infallible>(handlers::join_seat(rooms, room_id, request).await)
                },
            );

        let leave = warp::path!("api" / "rooms" / String / "seats" / u32)
            .and(warp::delete())
            .and(warp::query::<handlers::TokenQuery>())
            .and(Self::with_rooms(rooms.clone()))
            .and_then(
                |room_id: String, seat: u32, query: handlers::TokenQuery, rooms: Arc<RoomManager>| async move {
                    Ok::<_, Infallible>(handlers::leave_seat(rooms, room_id, seat, query).await)
                },
            );

        let intent = warp::path!("api" / "rooms" / String / "seats" / u32 / "intents")
            .and(warp::post())
            .and(warp::query::<handlers::TokenQuery>())
            .and(Self::with_rooms(rooms))
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::bytes())
            .and_then(
                |room_id: String,
                 seat: u32,
                 query: handlers::TokenQuery,
                 rooms: Arc<RoomManager>,
                 body: Bytes| async move {
                    Ok::<_, Infallible>(
                        handlers::submit_intent(rooms, room_id, seat, query, &body).await,
                    )
                },
            );

        join.or(leave).unify().or(intent).unify().boxed()
    }

    fn stream_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        warp::path!("api" / "rooms" / String / "events")
            .and(warp::get())
            .and(warp::query::<handlers::ViewerQuery>())
            .and(Self::with_rooms(context.rooms()))
            .and(Self::with_event_bus(context.event_bus()))
            .and_then(
                |room_id: String,
                 query: handlers::ViewerQuery,
                 rooms: Arc<RoomManager>,
                 event_bus: Arc<EventBus>| async move {
                    let response = handlers::stream_room(rooms, event_bus, room_id, query).await;
                    Ok::<_, Infallible>(response)
                },
            )
            .boxed()
    }

    fn with_rooms(
        rooms: Arc<RoomManager>,
    ) -> impl Filter<Extract = (Arc<RoomManager>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&rooms))
    }

    fn with_event_bus(
        event_bus: Arc<EventBus>,
    ) -> impl Filter<Extract = (Arc<EventBus>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&event_bus))
    }
}

/// Turns warp's rejections (unknown path, bad query, bad body) into the common error body.
async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Rejection> {
    let (status, code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such endpoint".to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "invalid_query", e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "malformed_body", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::LengthRequired>() {
        (StatusCode::LENGTH_REQUIRED, "length_required", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", e.to_string())
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "unhandled rejection".to_string(),
        )
    };
    Ok(ErrorResponse::new(code, message).into_response(status))
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
