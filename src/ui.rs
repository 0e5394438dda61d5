use crate::app::App;
use crate::legend::{self, intensity_color, palette_color};
use crate::map::MapLayers;
use crate::viz::{Marker, MarkerShade, ShadeMode};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

const SIDEBAR_WIDTH: u16 = 34;

/// Render the UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Split into main area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map (+ optional sidebar)
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    if app.show_legend {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(SIDEBAR_WIDTH)])
            .split(chunks[0]);
        render_map(frame, app, cols[0]);
        render_sidebar(frame, app, cols[1]);
    } else {
        render_map(frame, app, chunks[0]);
    }

    render_status_bar(frame, app, chunks[1]);
}

/// Terminal color for a marker's visual attribute
fn shade_color(shade: &MarkerShade) -> Color {
    match shade {
        MarkerShade::Color(c) => palette_color(*c),
        MarkerShade::Intensity(opacity) => intensity_color(*opacity),
    }
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Earthquakes ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Sync the viewport to this frame's pane so mouse math matches the screen
    app.set_map_area(inner);

    let layers = app.map_renderer.render(
        inner.width as usize,
        inner.height as usize,
        &app.viewport,
        &app.model,
        app.selected,
    );

    frame.render_widget(MapWidget { layers }, inner);
}

/// Widget that composites the braille layers back to front
struct MapWidget {
    layers: MapLayers,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(
        &self,
        canvas: &crate::braille::BrailleCanvas,
        color: Color,
        area: Rect,
        buf: &mut Buffer,
    ) {
        for (row_idx, row_str) in canvas.rows().enumerate() {
            if row_idx >= area.height as usize {
                break;
            }
            let y = area.y + row_idx as u16;

            for (col_idx, ch) in row_str.chars().enumerate() {
                if col_idx >= area.width as usize {
                    break;
                }
                // Skip empty braille characters (U+2800)
                if ch == '\u{2800}' {
                    continue;
                }
                let x = area.x + col_idx as u16;
                buf[(x, y)].set_char(ch).set_fg(color);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Coastlines at the back
        self.render_layer(&self.layers.coastlines, Color::Cyan, area, buf);

        // Marker layers in bucket order, so higher buckets paint on top
        for layer in &self.layers.markers {
            self.render_layer(&layer.canvas, shade_color(&layer.shade), area, buf);
        }

        // Selection ring on top of everything
        if let Some(ref ring) = self.layers.selection {
            self.render_layer(ring, Color::White, area, buf);
        }
    }
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let legend_height = (app.model.buckets.len() as u16 + 3).min(area.height);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(legend_height), Constraint::Min(0)])
        .split(area);

    let legend_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Legend ", Style::default().fg(Color::Cyan)));
    let legend = Paragraph::new(legend::legend_lines(&app.model)).block(legend_block);
    frame.render_widget(legend, rows[0]);

    let detail_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Event ", Style::default().fg(Color::Cyan)));
    let detail = Paragraph::new(detail_lines(app)).block(detail_block);
    frame.render_widget(detail, rows[1]);
}

/// Popup-equivalent detail text for the selected event
fn detail_lines(app: &App) -> Vec<Line<'static>> {
    let Some(marker) = app.selected.and_then(|i| app.model.markers.get(i)) else {
        return vec![Line::from(Span::styled(
            "n/p or right-click to select",
            Style::default().fg(Color::DarkGray),
        ))];
    };
    marker_detail(marker)
}

fn marker_detail(marker: &Marker) -> Vec<Line<'static>> {
    let q = &marker.quake;
    let occurred = q
        .time
        .map(|t| t.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut lines = vec![
        Line::from(Span::styled(
            q.place.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Occurred: {occurred}")),
        Line::from(format!("Magnitude: {}", q.magnitude)),
        Line::from(format!(
            "Location: {:.2}°{}, {:.2}°{}",
            q.lat.abs(),
            if q.lat >= 0.0 { "N" } else { "S" },
            q.lon.abs(),
            if q.lon >= 0.0 { "E" } else { "W" },
        )),
    ];
    if let Some(depth) = q.depth_km {
        lines.push(Line::from(format!("Depth: {depth:.1} km")));
    }
    lines
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.map_renderer.settings;

    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.source.clone(), Style::default().fg(Color::Magenta)),
        Span::styled(
            format!(" {} events", app.model.markers.len()),
            Style::default().fg(Color::Green),
        ),
    ];

    if let Some(range) = app.model.range {
        spans.push(Span::styled(
            format!(" M {:.1}-{:.1}", range.min, range.max),
            Style::default().fg(Color::Green),
        ));
    }

    if app.model.skipped > 0 {
        spans.push(Span::styled(
            format!(" ({} skipped)", app.model.skipped),
            Style::default().fg(Color::Yellow),
        ));
    }

    if let Some(ref err) = app.fetch_error {
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            format!("FETCH FAILED: {err}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
        if app.model.shade == ShadeMode::Color { "color" } else { "opacity" },
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::styled(
        if settings.show_markers { " [M]arkers" } else { " [m]arkers" },
        Style::default().fg(if settings.show_markers { Color::Green } else { Color::DarkGray }),
    ));
    spans.push(Span::styled(
        if app.show_legend { " [G]legend" } else { " [g]legend" },
        Style::default().fg(if app.show_legend { Color::Green } else { Color::DarkGray }),
    ));
    spans.push(Span::styled(
        " | hjkl:pan +/-:zoom n/p:select r:reset q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
