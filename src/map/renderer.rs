use crate::braille::BrailleCanvas;
use crate::map::geometry::{draw_circle, draw_line, draw_ring};
use crate::map::projection::Viewport;
use crate::viz::{MarkerShade, VizModel};

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Meters per degree of latitude, close enough for marker sizing
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Largest marker radius in braille pixels, so deep zooms don't flood the canvas
const MAX_MARKER_PIXELS: i32 = 60;

/// Level of detail for basemap coastline data
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Lod {
    Low,    // 110m - world view
    Medium, // 50m - continental
    High,   // 10m - regional
}

impl Lod {
    /// Select LOD based on zoom level
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom < 2.0 {
            Lod::Low
        } else if zoom < 8.0 {
            Lod::Medium
        } else {
            Lod::High
        }
    }
}

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_coastlines: bool,
    pub show_markers: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_coastlines: true,
            show_markers: true,
        }
    }
}

/// One canvas of earthquake circles sharing a visual attribute, drawn in
/// bucket order so higher buckets paint over lower ones
pub struct MarkerLayer {
    pub canvas: BrailleCanvas,
    pub shade: MarkerShade,
}

/// Everything one frame needs: the basemap plus marker layers and the
/// selection highlight position (in braille pixels)
pub struct MapLayers {
    pub coastlines: BrailleCanvas,
    pub markers: Vec<MarkerLayer>,
    pub selection: Option<BrailleCanvas>,
}

/// Convert a circle radius in meters to braille pixels at the current zoom,
/// floored at one pixel so markers survive world-level zoom
pub fn marker_pixel_radius(radius_m: f64, viewport: &Viewport) -> i32 {
    let degrees = radius_m / METERS_PER_DEGREE;
    let px = (degrees * viewport.pixels_per_degree()).round() as i32;
    px.clamp(1, MAX_MARKER_PIXELS)
}

/// Map renderer: multi-resolution coastline basemap plus earthquake markers
pub struct MapRenderer {
    pub coastlines_low: Vec<LineString>,
    pub coastlines_medium: Vec<LineString>,
    pub coastlines_high: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            coastlines_low: Vec::new(),
            coastlines_medium: Vec::new(),
            coastlines_high: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    /// Get coastlines for the given LOD, falling back to coarser data
    fn get_coastlines(&self, lod: Lod) -> &Vec<LineString> {
        match lod {
            Lod::High => {
                if !self.coastlines_high.is_empty() {
                    &self.coastlines_high
                } else if !self.coastlines_medium.is_empty() {
                    &self.coastlines_medium
                } else {
                    &self.coastlines_low
                }
            }
            Lod::Medium => {
                if !self.coastlines_medium.is_empty() {
                    &self.coastlines_medium
                } else {
                    &self.coastlines_low
                }
            }
            Lod::Low => &self.coastlines_low,
        }
    }

    /// Render the basemap and the classified earthquake markers.
    ///
    /// `width`/`height` are character dimensions; the viewport carries the
    /// matching braille pixel dimensions. `selected` is an index into
    /// `model.markers`.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        viewport: &Viewport,
        model: &VizModel,
        selected: Option<usize>,
    ) -> MapLayers {
        let lod = Lod::from_zoom(viewport.zoom);

        let mut coastlines = BrailleCanvas::new(width, height);
        if self.settings.show_coastlines {
            for line in self.get_coastlines(lod) {
                self.draw_linestring(&mut coastlines, line, viewport);
            }
        }

        // One layer per bucket, lazily created, emitted in bucket order
        let mut layers: Vec<Option<BrailleCanvas>> = Vec::new();
        layers.resize_with(model.buckets.len(), || None);

        if self.settings.show_markers {
            for marker in &model.markers {
                let (px, py) = viewport.project(marker.quake.lon, marker.quake.lat);
                if !viewport.is_visible(px, py) {
                    continue;
                }
                let radius = marker_pixel_radius(marker.radius_m, viewport);
                let canvas = layers[marker.bucket]
                    .get_or_insert_with(|| BrailleCanvas::new(width, height));
                draw_circle(canvas, px, py, radius);
            }
        }

        let markers = layers
            .into_iter()
            .enumerate()
            .filter_map(|(idx, canvas)| {
                let canvas = canvas?;
                let shade = model.buckets.shade(idx)?;
                Some(MarkerLayer { canvas, shade })
            })
            .collect();

        // Ring highlight around the selected marker
        let selection = selected
            .and_then(|idx| model.markers.get(idx))
            .and_then(|marker| {
                let (px, py) = viewport.project(marker.quake.lon, marker.quake.lat);
                if !viewport.is_visible(px, py) {
                    return None;
                }
                let radius = marker_pixel_radius(marker.radius_m, viewport) + 2;
                let mut canvas = BrailleCanvas::new(width, height);
                draw_ring(&mut canvas, px, py, radius);
                Some(canvas)
            });

        MapLayers {
            coastlines,
            markers,
            selection,
        }
    }

    /// Draw a linestring with viewport culling
    fn draw_linestring(&self, canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
        if line.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;

        for &(lon, lat) in line {
            let (px, py) = viewport.project(lon, lat);

            if let Some((prev_x, prev_y)) = prev {
                let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
                if dist < viewport.width && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                    draw_line(canvas, prev_x, prev_y, px, py);
                }
            }

            prev = Some((px, py));
        }
    }

    /// Add coastline data at a specific LOD
    pub fn add_coastline(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::Low => self.coastlines_low.push(line),
            Lod::Medium => self.coastlines_medium.push(line),
            Lod::High => self.coastlines_high.push(line),
        }
    }

    /// Check if any basemap data is loaded
    pub fn has_data(&self) -> bool {
        !self.coastlines_low.is_empty()
            || !self.coastlines_medium.is_empty()
            || !self.coastlines_high.is_empty()
    }

    /// Toggle coastline basemap
    pub fn toggle_coastlines(&mut self) {
        self.settings.show_coastlines = !self.settings.show_coastlines;
    }

    /// Toggle earthquake markers
    pub fn toggle_markers(&mut self) {
        self.settings.show_markers = !self.settings.show_markers;
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Earthquake, Feed};
    use crate::viz::{VizModel, VizOptions};

    fn model_with(mags_at: &[(f64, f64, f64)]) -> VizModel {
        let feed = Feed {
            generated: None,
            title: None,
            quakes: mags_at
                .iter()
                .map(|&(magnitude, lon, lat)| Earthquake {
                    magnitude,
                    lon,
                    lat,
                    depth_km: None,
                    place: "test".to_string(),
                    time: None,
                })
                .collect(),
            skipped: 0,
        };
        VizModel::build(&feed, VizOptions::default())
    }

    #[test]
    fn marker_radius_floors_at_one_pixel() {
        let vp = Viewport::new(0.0, 0.0, 1.0, 100, 100);
        assert_eq!(marker_pixel_radius(18_000.0, &vp), 1);
    }

    #[test]
    fn marker_radius_grows_with_zoom() {
        let near = Viewport::new(0.0, 0.0, 18.0, 4000, 2000);
        let far = Viewport::new(0.0, 0.0, 1.0, 4000, 2000);
        assert!(
            marker_pixel_radius(78_000.0, &near) > marker_pixel_radius(78_000.0, &far)
        );
    }

    #[test]
    fn empty_model_renders_no_marker_layers() {
        let renderer = MapRenderer::new();
        let vp = Viewport::new(0.0, 0.0, 1.0, 200, 100);
        let model = model_with(&[]);
        let layers = renderer.render(100, 25, &vp, &model, None);
        assert!(layers.markers.is_empty());
        assert!(layers.selection.is_none());
    }

    #[test]
    fn markers_render_into_bucket_layers() {
        let renderer = MapRenderer::new();
        let vp = Viewport::new(0.0, 0.0, 1.0, 200, 100);
        let model = model_with(&[(0.0, 0.0, 0.0), (6.0, 10.0, 10.0)]);
        let layers = renderer.render(100, 25, &vp, &model, None);
        // Two events in distinct buckets: two layers, all drawn
        assert_eq!(layers.markers.len(), 2);
        for layer in &layers.markers {
            assert!(!layer.canvas.is_blank());
        }
    }

    #[test]
    fn selection_produces_a_ring_layer() {
        let renderer = MapRenderer::new();
        let vp = Viewport::new(0.0, 0.0, 1.0, 200, 100);
        let model = model_with(&[(3.0, 0.0, 0.0)]);
        let layers = renderer.render(100, 25, &vp, &model, Some(0));
        assert!(layers.selection.is_some());
        assert!(!layers.selection.unwrap().is_blank());
    }

    #[test]
    fn hidden_markers_render_nothing() {
        let mut renderer = MapRenderer::new();
        renderer.toggle_markers();
        let vp = Viewport::new(0.0, 0.0, 1.0, 200, 100);
        let model = model_with(&[(3.0, 0.0, 0.0)]);
        let layers = renderer.render(100, 25, &vp, &model, None);
        assert!(layers.markers.is_empty());
    }
}
