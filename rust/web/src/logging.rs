use pokeroom_engine::player::SeatId;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,pokeroom_web=debug";

/// Installs the process-wide subscriber. `json` switches to one JSON object per line.
pub fn init_logging(json: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// One captured event. The room fields every room log line carries are pulled out
/// into typed slots; anything else lands in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub room_id: Option<String>,
    pub seat_id: Option<SeatId>,
    pub hand_number: Option<u64>,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Collects events for assertions in tests.
///
/// ```
/// use pokeroom_web::TestLogSubscriber;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = TestLogSubscriber::new();
/// let subscriber = tracing_subscriber::Registry::default().with(capture.clone().into_layer());
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(room_id = "r1", seat_id = 2, "seat joined");
/// });
/// assert_eq!(capture.for_seat(2)[0].room_id.as_deref(), Some("r1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TestLogSubscriber {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entries whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Vec<LogEntry> {
        self.matching(|e| e.message.contains(needle))
    }

    pub fn for_room(&self, room_id: &str) -> Vec<LogEntry> {
        self.matching(|e| e.room_id.as_deref() == Some(room_id))
    }

    pub fn for_seat(&self, seat: SeatId) -> Vec<LogEntry> {
        self.matching(|e| e.seat_id == Some(seat))
    }

    pub fn into_layer(self) -> CaptureLayer {
        CaptureLayer { capture: self }
    }

    fn matching(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        self.lock().iter().filter(|e| keep(e)).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct CaptureLayer {
    capture: TestLogSubscriber,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut entry = LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: String::new(),
            room_id: None,
            seat_id: None,
            hand_number: None,
            fields: Vec::new(),
        };
        event.record(&mut EntryVisitor(&mut entry));
        self.capture.lock().push(entry);
    }
}

struct EntryVisitor<'a>(&'a mut LogEntry);

impl EntryVisitor<'_> {
    fn text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.0.message = value,
            "room_id" => self.0.room_id = Some(value),
            name => self.0.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for EntryVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "seat_id" => self.0.seat_id = SeatId::try_from(value).ok(),
            "hand_number" => self.0.hand_number = Some(value),
            _ => self.text(field, value.to_string()),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match u64::try_from(value) {
            Ok(value) => self.record_u64(field, value),
            Err(_) => self.text(field, value.to_string()),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.text(field, format!("{value:?}"));
    }
}
