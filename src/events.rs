//! Event types and the main event loop driver for the enrichment form.
//!
//! This module defines the [`Event`] enum (keyboard input, ticks, and the
//! completions of the three enrichment requests), the [`Command`] enum the
//! app emits for `main` to execute, and the [`EventHandler`], which runs a
//! background task that polls crossterm for key events and emits periodic
//! [`Event::Tick`]s. The main loop in `main.rs` receives events via
//! [`EventHandler::next`] and the spawned enrichment tasks send their
//! completions via a cloned [`EventHandler::tx`].

use crate::location::{Position, SensorError};
use crate::models::{EnrichmentRecord, ReverseGeocodeResponse};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Events processed by the application event loop.
///
/// The completion variants carry `Err(String)` for transport/parse
/// failures, which are logged and never shown to the user.
pub enum Event {
    /// Periodic tick used for UI refresh and gauge animation.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Completion of a location-fix request.
    SensorResult(Result<Position, SensorError>),
    /// Completion of a reverse-geocoding request.
    GeocodeResult(Result<ReverseGeocodeResponse, String>),
    /// Completion of the public-IP lookup; `Ok` carries the reported
    /// address, empty when the service omitted it.
    IpResult(Result<String, String>),
    /// Completion of the persistence POST; `Ok` carries the record that
    /// was submitted.
    PersistResult(Result<EnrichmentRecord, String>),
}

/// Side effects requested by the app state machine.
///
/// The app never performs I/O itself; it pushes these onto an internal
/// queue and `main` drains them after each event, spawning tasks for the
/// network operations and running the local ones inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Query the public-IP service.
    FetchIp,
    /// Ask the location-fix provider for the current position.
    ReadSensor,
    /// Reverse-geocode the given coordinate.
    ReverseGeocode { lat: f64, lon: f64 },
    /// Submit a completed record to the persistence endpoint.
    Persist(EnrichmentRecord),
    /// Append a successfully persisted record to the local history store.
    RecordHistory(EnrichmentRecord),
    /// Export the local history to CSV.
    ExportHistory,
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// Holds an unbounded channel: the sender ([`tx`](EventHandler::tx)) can be
/// cloned and given to the enrichment tasks, while the receiver is consumed
/// by [`next`](EventHandler::next) in the main loop. A background task
/// polls crossterm with a timeout and sends [`Event::Input`] on key press
/// and [`Event::Tick`] at the configured interval.
pub struct EventHandler {
    /// Sender for posting events (e.g. from the spawned enrichment tasks).
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The spawned task runs until the process exits. It polls crossterm
    /// with a timeout of `tick_rate_ms`; when a key is pressed it sends
    /// [`Event::Input`], and when the tick interval elapses it sends
    /// [`Event::Tick`].
    ///
    /// # Panics
    ///
    /// The background task may panic if crossterm `poll` or `read` fails
    /// (e.g. terminal disconnected). The main loop does not protect
    /// against this.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                if event::poll(timeout).expect("Poll failed") {
                    if let CrosstermEvent::Key(key) = event::read().expect("Read failed") {
                        event_tx.send(Event::Input(key)).ok();
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    event_tx.send(Event::Tick).ok();
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    ///
    /// Returns `None` when all senders have been dropped (e.g. the input
    /// task exited).
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
