use crate::config::Config;
use crate::db::HistoryEntry;
use crate::events::{Command, Event};
use crate::location::{Position, SensorError};
use crate::models::{
    EnrichmentRecord, FieldId, ResolvedAddress, ReverseGeocodeResponse, NOT_AVAILABLE,
};
use crossterm::event::{KeyCode, KeyEvent};
use tracing::{error, info, warn};

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum ViewMode {
    #[default]
    Form,
    Map,
    History,
}

/// All mutable state for the enrichment workflow. Events are applied here;
/// side effects come back out as [`Command`]s for `main` to execute.
pub struct App {
    pub config: Config,
    pub view_mode: ViewMode,

    // One enrichment cycle's worth of state
    pub form: EnrichmentRecord,
    pub address: Option<ResolvedAddress>,
    pending_ops: u8,
    persist_fired: bool,

    // UI state
    pub alert: Option<String>,
    pub status: Option<String>,
    pub focused_field: FieldId,
    pub map_center: (f64, f64),
    pub map_span: f64,
    pub history: Vec<HistoryEntry>,
    pub history_index: usize,
    pub tick_count: usize,
    pub should_quit: bool,

    commands: Vec<Command>,
}

impl App {
    pub fn new(config: Config, history: Vec<HistoryEntry>) -> Self {
        let map_span = span_for_zoom(config.ui.map_zoom);
        Self {
            config,
            view_mode: ViewMode::Form,
            form: EnrichmentRecord::default(),
            address: None,
            pending_ops: 0,
            // Latched until the first acquisition cycle starts, so edits
            // alone can never trigger a submission.
            persist_fired: true,
            alert: None,
            status: None,
            focused_field: FieldId::Latitude,
            map_center: (0.0, 0.0),
            map_span,
            history,
            history_index: 0,
            tick_count: 0,
            should_quit: false,
            commands: Vec::new(),
        }
    }

    /// True while any operation of the current cycle is outstanding. The
    /// UI swaps every field input for a progress indicator while this holds.
    pub fn is_loading(&self) -> bool {
        self.pending_ops > 0
    }

    /// Drains the queued side effects for `main` to execute.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Both coordinate fields parsed, only when they form a usable point.
    pub fn coords(&self) -> Option<(f64, f64)> {
        let lat = self.form.latitude.parse::<f64>().ok()?;
        let lon = self.form.longitude.parse::<f64>().ok()?;
        (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.on_tick(),
            Event::Input(key) => self.handle_key(key),
            Event::SensorResult(result) => self.on_sensor(result),
            Event::GeocodeResult(result) => self.on_geocode(result),
            Event::IpResult(result) => self.on_ip(result),
            Event::PersistResult(result) => self.on_persist(result),
        }
    }

    pub fn on_tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        // A modal alert swallows the next key press, whatever it is.
        if self.alert.is_some() {
            self.alert = None;
            return;
        }

        match self.view_mode {
            ViewMode::Form => self.handle_form_key(key),
            ViewMode::Map => self.handle_map_key(key),
            ViewMode::History => self.handle_history_key(key),
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('f') => self.begin_fetch(),
            KeyCode::Char('m') => {
                if let Some(center) = self.coords() {
                    self.map_center = (center.0, center.1);
                    self.map_span = span_for_zoom(self.config.ui.map_zoom);
                    self.view_mode = ViewMode::Map;
                }
            }
            KeyCode::Char('h') => {
                self.history_index = 0;
                self.view_mode = ViewMode::History;
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => self.toggle_focus(),
            KeyCode::Backspace => {
                if !self.is_loading() {
                    self.focused_value_mut().pop();
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+') => {
                if !self.is_loading() {
                    self.focused_value_mut().push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_map_key(&mut self, key: KeyEvent) {
        let step = self.map_span * 0.2;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc | KeyCode::Char('m') => self.view_mode = ViewMode::Form,
            KeyCode::Up => self.map_center.0 += step,
            KeyCode::Down => self.map_center.0 -= step,
            KeyCode::Right => self.map_center.1 += step,
            KeyCode::Left => self.map_center.1 -= step,
            KeyCode::Char('+') | KeyCode::Char('=') => self.map_span *= 0.5,
            KeyCode::Char('-') => self.map_span = (self.map_span * 2.0).min(90.0),
            _ => {}
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc | KeyCode::Char('h') => self.view_mode = ViewMode::Form,
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.history.is_empty() {
                    self.history_index = (self.history_index + 1) % self.history.len();
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if !self.history.is_empty() {
                    self.history_index = self
                        .history_index
                        .checked_sub(1)
                        .unwrap_or(self.history.len() - 1);
                }
            }
            KeyCode::Char('e') => self.commands.push(Command::ExportHistory),
            _ => {}
        }
    }

    /// Starts one enrichment cycle: clears the derived fields, opens a
    /// fresh outstanding-operation count, and dispatches the IP lookup
    /// unconditionally plus either a geocode (coordinates already typed),
    /// a sensor read, or an "unsupported" alert.
    pub fn begin_fetch(&mut self) {
        self.form.clear_derived();
        self.address = None;
        self.status = None;
        self.persist_fired = false;
        self.pending_ops = 0;

        self.commands.push(Command::FetchIp);
        self.pending_ops += 1;

        if !self.form.latitude.is_empty() && !self.form.longitude.is_empty() {
            // No range validation: unparseable input becomes NaN and comes
            // back from the geocoder as its error response.
            let lat = self.form.latitude.parse::<f64>().unwrap_or(f64::NAN);
            let lon = self.form.longitude.parse::<f64>().unwrap_or(f64::NAN);
            self.commands.push(Command::ReverseGeocode { lat, lon });
            self.pending_ops += 1;
        } else if self.config.sensor.enabled {
            self.commands.push(Command::ReadSensor);
            self.pending_ops += 1;
        } else {
            self.alert = Some("Geolocation is not supported in this environment.".to_string());
        }
    }

    fn on_sensor(&mut self, result: Result<Position, SensorError>) {
        match result {
            Ok(pos) => {
                self.form.latitude = pos.latitude.to_string();
                self.form.longitude = pos.longitude.to_string();
                // The sensor operation resolves into the geocode operation,
                // so the outstanding count is unchanged.
                self.commands.push(Command::ReverseGeocode {
                    lat: pos.latitude,
                    lon: pos.longitude,
                });
            }
            Err(SensorError::PermissionDenied) => {
                self.retire_op();
                self.alert = Some(
                    "Geolocation permission denied. Please reset location permission and try again."
                        .to_string(),
                );
            }
            Err(e) => {
                self.retire_op();
                warn!("Location fix failed: {}", e);
            }
        }
        self.maybe_persist();
    }

    fn on_geocode(&mut self, result: Result<ReverseGeocodeResponse, String>) {
        match result {
            Ok(resp) => {
                if resp.error.is_some() {
                    self.alert =
                        Some("Please enter valid latitude and longitude values".to_string());
                    self.form = EnrichmentRecord::default();
                    self.address = None;
                } else {
                    let addr = resp.address.unwrap_or_default();
                    self.form.apply_address(&addr);
                    self.address = Some(addr);
                }
            }
            Err(e) => error!("Reverse geocoding error: {}", e),
        }
        self.retire_op();
        self.maybe_persist();
    }

    fn on_ip(&mut self, result: Result<String, String>) {
        match result {
            Ok(ip) => {
                self.form.ip_address = if ip.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    ip
                };
            }
            Err(e) => error!("Error fetching IP address: {}", e),
        }
        self.retire_op();
        self.maybe_persist();
    }

    fn on_persist(&mut self, result: Result<EnrichmentRecord, String>) {
        match result {
            Ok(record) => {
                info!("Form data submitted successfully");
                self.commands.push(Command::RecordHistory(record));
            }
            Err(e) => error!("Failed to submit form data: {}", e),
        }
    }

    fn toggle_focus(&mut self) {
        self.focused_field = match self.focused_field {
            FieldId::Latitude => FieldId::Longitude,
            _ => FieldId::Latitude,
        };
    }

    fn focused_value_mut(&mut self) -> &mut String {
        match self.focused_field {
            FieldId::Longitude => &mut self.form.longitude,
            _ => &mut self.form.latitude,
        }
    }

    /// Saturating: a completion from an abandoned cycle must not underflow
    /// the current cycle's count.
    fn retire_op(&mut self) {
        self.pending_ops = self.pending_ops.saturating_sub(1);
    }

    /// The change-observer: once the cycle has settled and every field is
    /// populated, submit exactly once.
    fn maybe_persist(&mut self) {
        if self.pending_ops == 0 && !self.persist_fired && self.form.is_complete() {
            self.persist_fired = true;
            self.commands.push(Command::Persist(self.form.clone()));
        }
    }
}

/// Degrees of latitude spanned by the map view at a leaflet-style zoom level.
fn span_for_zoom(zoom: u32) -> f64 {
    360.0 / 2f64.powi(zoom.min(18) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolvedAddress;
    use crossterm::event::KeyModifiers;

    fn new_app() -> App {
        App::new(Config::default(), Vec::new())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn full_address() -> ReverseGeocodeResponse {
        ReverseGeocodeResponse {
            error: None,
            address: Some(ResolvedAddress {
                suburb: Some("Mitte".into()),
                city: Some("Berlin".into()),
                county: None,
                state_district: Some("Berlin Urban".into()),
                state: Some("Berlin".into()),
                postcode: Some("10117".into()),
                country: Some("Germany".into()),
            }),
        }
    }

    #[test]
    fn typed_coordinates_take_precedence_over_the_sensor() {
        let mut app = new_app();
        app.form.latitude = "12.5".into();
        app.form.longitude = "77.6".into();
        app.begin_fetch();

        let commands = app.take_commands();
        assert!(commands.contains(&Command::FetchIp));
        assert!(commands.contains(&Command::ReverseGeocode { lat: 12.5, lon: 77.6 }));
        assert!(!commands.contains(&Command::ReadSensor));
        assert!(app.is_loading());
    }

    #[test]
    fn sensor_fix_fills_fields_and_geocodes_the_same_values() {
        let mut app = new_app();
        app.begin_fetch();
        let commands = app.take_commands();
        assert!(commands.contains(&Command::ReadSensor));
        assert!(commands.contains(&Command::FetchIp));

        app.handle_event(Event::SensorResult(Ok(Position {
            latitude: 1.25,
            longitude: 103.8,
        })));
        assert_eq!(app.form.latitude, "1.25");
        assert_eq!(app.form.longitude, "103.8");
        let commands = app.take_commands();
        assert!(commands.contains(&Command::ReverseGeocode { lat: 1.25, lon: 103.8 }));
        assert!(app.is_loading());
    }

    #[test]
    fn sensor_disabled_with_no_coordinates_alerts_unsupported() {
        let mut app = new_app();
        app.config.sensor.enabled = false;
        app.begin_fetch();

        let commands = app.take_commands();
        assert_eq!(commands, vec![Command::FetchIp]);
        assert!(app.alert.as_deref().unwrap().contains("not supported"));
    }

    #[test]
    fn permission_denied_alerts_and_retires_the_operation() {
        let mut app = new_app();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::SensorResult(Err(SensorError::PermissionDenied)));
        assert!(app.alert.as_deref().unwrap().contains("permission denied"));

        // Only the IP lookup remains outstanding.
        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));
        assert!(!app.is_loading());
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn other_sensor_failures_abort_silently() {
        let mut app = new_app();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::SensorResult(Err(SensorError::Other("timeout".into()))));
        assert!(app.alert.is_none());
    }

    #[test]
    fn geocode_error_response_resets_the_record_and_alerts_once() {
        let mut app = new_app();
        app.form.latitude = "999".into();
        app.form.longitude = "999".into();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::GeocodeResult(Ok(ReverseGeocodeResponse {
            error: Some(serde_json::json!("Unable to geocode")),
            address: None,
        })));
        assert_eq!(app.form, EnrichmentRecord::default());
        assert!(app.alert.is_some());
        assert!(app.address.is_none());
    }

    #[test]
    fn error_reset_leaves_the_cycle_without_a_persist() {
        let mut app = new_app();
        app.form.latitude = "999".into();
        app.form.longitude = "999".into();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::GeocodeResult(Ok(ReverseGeocodeResponse {
            error: Some(serde_json::json!("Unable to geocode")),
            address: None,
        })));
        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));

        assert!(!app.is_loading());
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn exactly_one_persist_per_completed_cycle() {
        let mut app = new_app();
        app.form.latitude = "52.52".into();
        app.form.longitude = "13.405".into();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::GeocodeResult(Ok(full_address())));
        // Geocode settled first; the cycle is still open.
        assert!(app.take_commands().is_empty());
        assert!(app.is_loading());

        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));
        let commands = app.take_commands();
        let persists = commands
            .iter()
            .filter(|c| matches!(c, Command::Persist(_)))
            .count();
        assert_eq!(persists, 1);
        assert!(!app.is_loading());

        // A straggling completion must not re-fire the submission.
        app.handle_event(Event::IpResult(Ok("203.0.113.8".into())));
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn transport_failures_keep_partial_state_and_stay_silent() {
        let mut app = new_app();
        app.form.latitude = "52.52".into();
        app.form.longitude = "13.405".into();
        app.begin_fetch();
        app.take_commands();

        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));
        app.handle_event(Event::GeocodeResult(Err("connection refused".into())));

        assert!(app.alert.is_none());
        assert_eq!(app.form.ip_address, "203.0.113.7");
        assert!(!app.is_loading());
        // Derived address fields never arrived, so no persist either.
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn missing_ip_maps_to_the_sentinel() {
        let mut app = new_app();
        app.begin_fetch();
        app.take_commands();
        app.handle_event(Event::IpResult(Ok(String::new())));
        assert_eq!(app.form.ip_address, NOT_AVAILABLE);
    }

    #[test]
    fn begin_fetch_clears_previous_cycle_results() {
        let mut app = new_app();
        app.form.latitude = "52.52".into();
        app.form.longitude = "13.405".into();
        app.begin_fetch();
        app.take_commands();
        app.handle_event(Event::GeocodeResult(Ok(full_address())));
        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));
        app.take_commands();

        app.begin_fetch();
        assert!(app.form.country.is_empty());
        assert!(app.form.ip_address.is_empty());
        assert!(app.address.is_none());
        assert_eq!(app.form.latitude, "52.52");
    }

    #[test]
    fn editing_is_blocked_while_loading() {
        let mut app = new_app();
        app.handle_key(key(KeyCode::Char('5')));
        assert_eq!(app.form.latitude, "5");

        app.begin_fetch();
        app.take_commands();
        app.handle_key(key(KeyCode::Char('9')));
        assert_eq!(app.form.latitude, "5");
    }

    #[test]
    fn focus_toggles_between_the_editable_fields() {
        let mut app = new_app();
        app.handle_key(key(KeyCode::Char('1')));
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('2')));
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Char('3')));
        assert_eq!(app.form.latitude, "1");
        assert_eq!(app.form.longitude, "3");
    }

    #[test]
    fn alert_swallows_the_dismissing_key() {
        let mut app = new_app();
        app.alert = Some("notice".into());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.alert.is_none());
        assert!(!app.should_quit);
    }

    #[test]
    fn unparseable_coordinates_propagate_as_nan() {
        let mut app = new_app();
        app.form.latitude = "12.5.1".into();
        app.form.longitude = "abc".into();
        app.begin_fetch();

        let geocode = app
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                Command::ReverseGeocode { lat, lon } => Some((lat, lon)),
                _ => None,
            })
            .unwrap();
        assert!(geocode.0.is_nan());
        assert!(geocode.1.is_nan());
    }

    #[test]
    fn map_view_requires_a_parseable_coordinate() {
        let mut app = new_app();
        app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(app.view_mode, ViewMode::Form);

        app.form.latitude = "52.52".into();
        app.form.longitude = "13.405".into();
        app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(app.view_mode, ViewMode::Map);
        assert_eq!(app.map_center, (52.52, 13.405));
    }

    #[test]
    fn map_pans_and_zooms() {
        let mut app = new_app();
        app.form.latitude = "10".into();
        app.form.longitude = "20".into();
        app.handle_key(key(KeyCode::Char('m')));
        let span = app.map_span;

        app.handle_key(key(KeyCode::Up));
        assert!(app.map_center.0 > 10.0);
        app.handle_key(key(KeyCode::Char('+')));
        assert!(app.map_span < span);
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.view_mode, ViewMode::Form);
    }

    #[test]
    fn successful_persist_is_recorded_to_history() {
        let mut app = new_app();
        let record = EnrichmentRecord {
            latitude: "1".into(),
            ..Default::default()
        };
        app.handle_event(Event::PersistResult(Ok(record.clone())));
        assert_eq!(app.take_commands(), vec![Command::RecordHistory(record)]);

        app.handle_event(Event::PersistResult(Err("500".into())));
        assert!(app.take_commands().is_empty());
        assert!(app.alert.is_none());
    }
}
