use color_eyre::Result;
use geoform_tui::{
    api::ApiClient,
    app::App,
    config::Config,
    db::HistoryStore,
    events::{Command, Event, EventHandler},
    location, logging, ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load();
    let store = HistoryStore::open("enrichments.db")?;
    let history = store.load()?;

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new(config.clone(), history);
    let mut events = EventHandler::new(config.ui.tick_rate_ms);
    let api = ApiClient::new(config.endpoints.clone());

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        if let Some(event) = events.next().await {
            app.handle_event(event);
        }
        for command in app.take_commands() {
            dispatch(command, &api, &store, &config, &events.tx, &mut app);
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Executes one side effect requested by the app: network operations are
/// spawned as tasks that post their completion back onto the event channel,
/// local history operations run inline.
fn dispatch(
    command: Command,
    api: &ApiClient,
    store: &HistoryStore,
    config: &Config,
    tx: &UnboundedSender<Event>,
    app: &mut App,
) {
    match command {
        Command::FetchIp => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match api.fetch_ip().await {
                    Ok(resp) => Ok(resp.ip.unwrap_or_default()),
                    Err(e) => Err(e.to_string()),
                };
                let _ = tx.send(Event::IpResult(result));
            });
        }
        Command::ReadSensor => {
            let probe_ip = config.sensor.probe_ip.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = location::read_position(&probe_ip).await;
                let _ = tx.send(Event::SensorResult(result));
            });
        }
        Command::ReverseGeocode { lat, lon } => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = api.reverse_geocode(lat, lon).await.map_err(|e| e.to_string());
                let _ = tx.send(Event::GeocodeResult(result));
            });
        }
        Command::Persist(record) => {
            let api = api.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match api.submit_record(&record).await {
                    Ok(()) => Ok(record),
                    Err(e) => Err(e.to_string()),
                };
                let _ = tx.send(Event::PersistResult(result));
            });
        }
        Command::RecordHistory(record) => match store.insert(&record) {
            Ok(entry) => app.push_history(entry),
            Err(e) => error!("Failed to record submission history: {}", e),
        },
        Command::ExportHistory => match store.export_csv("enrichment-history.csv") {
            Ok(count) => {
                app.status = Some(format!("Exported {} records to enrichment-history.csv", count));
            }
            Err(e) => {
                error!("History export failed: {}", e);
                app.status = Some("Export failed; see logs.".to_string());
            }
        },
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )
        .ok();
        original_hook(panic_info);
    }));
}
