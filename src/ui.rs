//! TUI rendering for the enrichment form.
//!
//! This module handles all UI rendering logic using the `ratatui` crate:
//! the form view (field rows, address card, inline map), the interactive
//! map view, the submission history view, and the modal alert popup.

use crate::app::{App, ViewMode};
use crate::models::FIELDS;
use ratatui::{
    prelude::*,
    widgets::{block::Position as TitlePosition, block::Title, canvas::*, *},
};

use ratatui::text::Line;

/// Renders one frame based on current application state.
///
/// Selects the view from [`App::view_mode`] (form, map, or history) and
/// draws the modal alert on top when one is pending.
pub fn render(f: &mut Frame, app: &App) {
    match app.view_mode {
        ViewMode::Form => render_form_view(f, app),
        ViewMode::Map => render_map_view(f, app),
        ViewMode::History => render_history_view(f, app),
    }

    if let Some(msg) = &app.alert {
        render_alert(f, msg);
    }
}

/// Form view: header, eight field rows, resolved-address card, inline map.
///
/// While the current cycle is loading, every field cell and the address
/// card show an animated progress gauge instead of a text control. The map
/// panel appears only once both coordinate fields parse as a usable point.
fn render_form_view(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                    // Header
            Constraint::Length(FIELDS.len() as u16 + 2), // Form rows
            Constraint::Length(5),                    // Address card
            Constraint::Min(8),                       // Map / hint
            Constraint::Length(1),                    // Footer
        ])
        .split(f.size());

    render_header(f, chunks[0]);
    render_form_fields(f, app, chunks[1]);
    render_address_card(f, app, chunks[2]);

    if let Some(center) = app.coords() {
        let popup = app.address.as_ref().map(|a| a.summary());
        draw_map_canvas(f, chunks[3], center, app.map_span, popup);
    } else {
        let hint = Paragraph::new("Enter a coordinate or press f to fetch one; the map appears here.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
        f.render_widget(hint, chunks[3]);
    }

    render_footer(
        f,
        app,
        chunks[4],
        " f Fetch Location │ Tab switch field │ type digits . + - │ m Map │ h History │ q Quit",
    );
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(22)])
        .split(area);

    let title = Paragraph::new("Geolocation POC")
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(title, header[0]);

    // The one trigger the form has, styled as a button.
    let button = Paragraph::new(" Fetch Location [f] ")
        .style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(button, header[1]);
}

fn render_form_fields(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Enrichment Form ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); FIELDS.len()])
        .split(inner);

    for (field, row) in FIELDS.iter().zip(rows.iter()) {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(14), Constraint::Min(0)])
            .split(*row);

        let label = Paragraph::new(format!(" {}", field.label))
            .style(Style::default().fg(Color::Gray));
        f.render_widget(label, cells[0]);

        if app.is_loading() {
            f.render_widget(loading_gauge(app), cells[1]);
            continue;
        }

        let focused = field.editable && field.id == app.focused_field;
        let mut value = app.form.value(field.id).to_string();
        if focused {
            value.push('▏');
        }
        let style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else if field.editable {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        f.render_widget(Paragraph::new(value).style(style), cells[1]);
    }
}

fn render_address_card(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Resolved Address ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.is_loading() {
        f.render_widget(loading_gauge(app), inner);
        return;
    }

    if let Some(addr) = &app.address {
        let card = Paragraph::new(addr.summary())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(card, inner);
    }
}

/// Indeterminate progress indicator shown in place of every input while
/// the cycle's requests are outstanding. The tick counter drives the sweep.
fn loading_gauge(app: &App) -> Gauge<'static> {
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Rgb(20, 20, 20)))
        .percent(((app.tick_count * 9) % 100) as u16)
        .label("Please Wait...")
}

/// Map view: full-screen canvas, arrow keys pan, +/- zoom.
fn render_map_view(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.size());

    let popup = app.address.as_ref().map(|a| a.summary());
    draw_map_canvas(f, chunks[0], app.map_center, app.map_span, popup);
    render_footer(f, app, chunks[1], " ↑↓←→ pan │ +/- zoom │ Esc back │ q Quit");
}

/// Draws the world-outline canvas with one marker at `center` and an
/// optional popup label above it.
fn draw_map_canvas(f: &mut Frame, area: Rect, center: (f64, f64), span: f64, popup: Option<String>) {
    let (lat, lon) = center;
    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(format!(" Map ({:.4}, {:.4}) ", lat, lon))
                .borders(Borders::ALL),
        )
        .marker(symbols::Marker::Braille)
        // Terminal cells are taller than wide; double the longitude span
        // so the view doesn't look squashed.
        .x_bounds([lon - span * 2.0, lon + span * 2.0])
        .y_bounds([lat - span, lat + span])
        .paint(move |ctx| {
            ctx.draw(&Map {
                color: Color::Rgb(50, 50, 50),
                resolution: MapResolution::High,
            });

            if let Some(text) = &popup {
                ctx.print(
                    lon,
                    lat + span * 0.15,
                    Line::from(Span::styled(
                        format!(" {} ", text),
                        Style::default().fg(Color::Black).bg(Color::Yellow),
                    )),
                );
            }
            ctx.print(
                lon,
                lat,
                Line::from(Span::styled(
                    " ⌖ ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
            );
        });
    f.render_widget(canvas, area);
}

/// History view: previously submitted records, newest first.
fn render_history_view(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.size());

    let items: Vec<ListItem> = app
        .history
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == app.history_index {
                Style::default()
                    .fg(Color::Cyan)
                    .bg(Color::Rgb(30, 30, 60))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let r = &entry.record;
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {} ", entry.saved_at.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("│ {}, {} ", r.city, r.country), style),
                Span::styled(
                    format!("│ {} │ {} ", r.postal_code, r.ip_address),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Submitted Records ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(list, chunks[0]);

    render_footer(f, app, chunks[1], " j/k select │ e Export CSV │ Esc back │ q Quit");
}

fn render_footer(f: &mut Frame, app: &App, area: Rect, help: &str) {
    let text = match &app.status {
        Some(status) => format!("{}   {}", help, status),
        None => help.to_string(),
    };
    let footer = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, area);
}

/// Modal alert popup; any key dismisses it.
fn render_alert(f: &mut Frame, msg: &str) {
    let area = centered_rect(60, 5, f.size());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(msg)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .title(" Notice ")
                .title(
                    Title::from(" press any key ")
                        .position(TitlePosition::Bottom)
                        .alignment(Alignment::Right),
                )
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
    f.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::Event;
    use crate::models::{ResolvedAddress, ReverseGeocodeResponse};
    use ratatui::backend::TestBackend;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn loading_replaces_inputs_with_indicators_until_the_cycle_settles() {
        let backend = TestBackend::new(100, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = App::new(Config::default(), Vec::new());
        app.form.latitude = "52.52".into();
        app.form.longitude = "13.405".into();

        app.begin_fetch();
        app.take_commands();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Please Wait..."));

        app.handle_event(Event::GeocodeResult(Ok(ReverseGeocodeResponse {
            error: None,
            address: Some(ResolvedAddress {
                city: Some("Berlin".into()),
                state: Some("Berlin".into()),
                postcode: Some("10117".into()),
                country: Some("Germany".into()),
                ..Default::default()
            }),
        })));
        app.handle_event(Event::IpResult(Ok("203.0.113.7".into())));
        app.take_commands();

        terminal.draw(|f| render(f, &app)).unwrap();
        let text = buffer_text(&terminal);
        assert!(!text.contains("Please Wait..."));
        assert!(text.contains("Germany"));
        assert!(text.contains("203.0.113.7"));
    }

    #[test]
    fn alert_popup_renders_over_the_form() {
        let backend = TestBackend::new(100, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = App::new(Config::default(), Vec::new());
        app.alert = Some("Please enter valid latitude and longitude values".into());

        terminal.draw(|f| render(f, &app)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Please enter valid latitude"));
        assert!(text.contains("Notice"));
    }
}
