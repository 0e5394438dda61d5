use crate::map::{MapRenderer, Viewport};
use crate::viz::VizModel;
use ratatui::layout::Rect;

/// Application state: viewport, basemap renderer, the visualization model
/// built once at startup, and UI selection/toggles
pub struct App {
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub model: VizModel,
    /// Where the events came from, for the status bar ("usgs feed", file name)
    pub source: String,
    /// Set when the one-shot fetch failed; the map renders empty
    pub fetch_error: Option<String>,
    pub show_legend: bool,
    /// Index into `model.markers`
    pub selected: Option<usize>,
    /// Marker indices ordered by descending magnitude, for n/p cycling
    magnitude_order: Vec<usize>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Inner rect of the map pane, recorded each draw. The sidebar shrinks
    /// the pane, so mouse math must use this rect, not the terminal size.
    map_area: Rect,
}

impl App {
    pub fn new(
        width: usize,
        height: usize,
        model: VizModel,
        source: String,
        fetch_error: Option<String>,
    ) -> Self {
        // Braille gives 2x4 resolution per character.
        // Account for border (2 chars horizontal, 2 vertical) plus status bar.
        let inner_width = width.saturating_sub(2);
        let inner_height = height.saturating_sub(3);
        let pixel_width = inner_width * 2;
        let pixel_height = inner_height * 4;

        let mut magnitude_order: Vec<usize> = (0..model.markers.len()).collect();
        magnitude_order.sort_by(|&a, &b| {
            model.markers[b]
                .quake
                .magnitude
                .partial_cmp(&model.markers[a].quake.magnitude)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Self {
            viewport: Viewport::initial(pixel_width, pixel_height),
            map_renderer: MapRenderer::new(),
            model,
            source,
            fetch_error,
            show_legend: true,
            selected: None,
            magnitude_order,
            should_quit: false,
            last_mouse: None,
            // Estimate until the first draw records the real pane
            map_area: Rect::new(1, 1, inner_width as u16, inner_height as u16),
        }
    }

    /// Record where the map pane landed this frame and match the viewport's
    /// pixel dimensions to it. Called from the draw path, before any mouse
    /// event for that frame is handled.
    pub fn set_map_area(&mut self, area: Rect) {
        self.map_area = area;
        self.viewport.width = area.width as usize * 2;
        self.viewport.height = area.height as usize * 4;
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let inner_width = width.saturating_sub(2);
        let inner_height = height.saturating_sub(3);
        self.viewport.width = inner_width * 2;
        self.viewport.height = inner_height * 4;
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.terminal_to_pixels(col, row);
        self.viewport.zoom_in_at(px, py);
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.terminal_to_pixels(col, row);
        self.viewport.zoom_out_at(px, py);
    }

    /// Convert terminal coords to braille pixel coords within the map pane.
    /// Each terminal cell is 2 braille pixels wide, 4 tall; the pane origin
    /// accounts for the border and anything drawn left of the map.
    fn terminal_to_pixels(&self, col: u16, row: u16) -> (i32, i32) {
        let px = (col as i32 - self.map_area.x as i32) * 2;
        let py = (row as i32 - self.map_area.y as i32) * 4;
        (px, py)
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Toggle the legend sidebar
    pub fn toggle_legend(&mut self) {
        self.show_legend = !self.show_legend;
    }

    /// Select the next event in descending-magnitude order
    pub fn select_next(&mut self) {
        if self.magnitude_order.is_empty() {
            return;
        }
        let pos = self
            .selected
            .and_then(|s| self.magnitude_order.iter().position(|&i| i == s));
        let next = match pos {
            Some(p) => (p + 1) % self.magnitude_order.len(),
            None => 0,
        };
        self.selected = Some(self.magnitude_order[next]);
    }

    /// Select the previous event in descending-magnitude order
    pub fn select_prev(&mut self) {
        if self.magnitude_order.is_empty() {
            return;
        }
        let pos = self
            .selected
            .and_then(|s| self.magnitude_order.iter().position(|&i| i == s));
        let prev = match pos {
            Some(0) | None => self.magnitude_order.len() - 1,
            Some(p) => p - 1,
        };
        self.selected = Some(self.magnitude_order[prev]);
    }

    /// Select the marker nearest to a screen position, if any is within
    /// clicking distance. Clears the selection on a miss.
    pub fn select_at(&mut self, col: u16, row: u16) {
        const MAX_PICK_DISTANCE_PX: i32 = 8;

        let (px, py) = self.terminal_to_pixels(col, row);

        let mut best: Option<(usize, i32)> = None;
        for (idx, marker) in self.model.markers.iter().enumerate() {
            let (mx, my) = self.viewport.project(marker.quake.lon, marker.quake.lat);
            if !self.viewport.is_visible(mx, my) {
                continue;
            }
            let d2 = (mx - px).pow(2) + (my - py).pow(2);
            if best.map_or(true, |(_, bd)| d2 < bd) {
                best = Some((idx, d2));
            }
        }

        self.selected = match best {
            Some((idx, d2)) if d2 <= MAX_PICK_DISTANCE_PX.pow(2) => Some(idx),
            _ => None,
        };
    }

    /// Handle mouse drag panning
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            // Scale based on zoom: less sensitive when zoomed out
            let scale = if self.viewport.zoom < 2.0 {
                2
            } else if self.viewport.zoom < 4.0 {
                3
            } else {
                4
            };
            self.pan(dx * scale, dy * scale);
        }
        self.last_mouse = Some((x, y));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}
