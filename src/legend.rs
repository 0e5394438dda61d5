//! Legend rendering: one line per bucket plus the feed timestamp.
//! Pure formatting; no business logic beyond rounding bounds for display.

use crate::viz::{BucketSet, MarkerColor, VizModel};
use chrono::{DateTime, Utc};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

const SWATCH: &str = "██";

/// Terminal color for a palette entry
pub fn palette_color(color: MarkerColor) -> Color {
    match color {
        MarkerColor::Yellow => Color::Yellow,
        MarkerColor::Purple => Color::Magenta,
        MarkerColor::Orange => Color::LightRed,
        MarkerColor::Green => Color::Green,
        MarkerColor::Red => Color::Red,
        MarkerColor::Blue => Color::Blue,
    }
}

/// Terminals have no alpha channel; stand in for fill opacity with a
/// brightness ramp
pub fn intensity_color(opacity: f64) -> Color {
    if opacity < 0.2 {
        Color::DarkGray
    } else if opacity < 0.4 {
        Color::Gray
    } else {
        Color::White
    }
}

/// Human-readable feed generation date, `Sat Aug 23 2026` style
pub fn format_updated(generated: Option<DateTime<Utc>>) -> String {
    match generated {
        Some(ts) => format!("Last Updated: {}", ts.format("%a %b %d %Y")),
        None => "Last Updated: unknown".to_string(),
    }
}

/// Build the legend: timestamp line, then one row per bucket with its
/// magnitude range and swatch. An empty model yields just the timestamp.
pub fn legend_lines(model: &VizModel) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format_updated(model.generated))];

    match &model.buckets {
        BucketSet::Color(buckets) => {
            for b in buckets {
                lines.push(Line::from(vec![
                    Span::raw(format!("Magnitude: {:.2} - {:.2} ", b.lower, b.upper)),
                    Span::styled(SWATCH, Style::default().fg(palette_color(b.color))),
                ]));
            }
        }
        BucketSet::Opacity(buckets) => {
            for b in buckets {
                lines.push(Line::from(vec![
                    Span::raw(format!(
                        "Magnitude <= {:.2} ({:.0}%) ",
                        b.upper,
                        b.opacity * 100.0
                    )),
                    Span::styled(SWATCH, Style::default().fg(intensity_color(b.opacity))),
                ]));
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Earthquake, Feed};
    use crate::viz::{ShadeMode, VizModel, VizOptions};
    use chrono::TimeZone;

    fn feed(mags: &[f64]) -> Feed {
        Feed {
            generated: Utc.timestamp_millis_opt(1_700_000_000_000).single(),
            title: None,
            quakes: mags
                .iter()
                .map(|&magnitude| Earthquake {
                    magnitude,
                    lon: 0.0,
                    lat: 0.0,
                    depth_km: None,
                    place: "test".to_string(),
                    time: None,
                })
                .collect(),
            skipped: 0,
        }
    }

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.clone()).collect()
    }

    #[test]
    fn timestamp_line_uses_date_string() {
        // 1700000000000 ms = 2023-11-14 UTC
        let model = VizModel::build(&feed(&[1.0]), VizOptions::default());
        let lines = legend_lines(&model);
        assert_eq!(line_text(&lines[0]), "Last Updated: Tue Nov 14 2023");
    }

    #[test]
    fn color_legend_has_one_row_per_bucket() {
        let model = VizModel::build(&feed(&[1.0, 3.0, 5.0]), VizOptions::default());
        let lines = legend_lines(&model);
        assert_eq!(lines.len(), 1 + 6);
        assert!(line_text(&lines[1]).starts_with("Magnitude: 1.00 - 1.67"));
        assert!(line_text(&lines[4]).starts_with("Magnitude: 3.01"));
    }

    #[test]
    fn opacity_legend_has_three_rows() {
        let model = VizModel::build(
            &feed(&[1.0, 3.0, 5.0]),
            VizOptions {
                shade: ShadeMode::Opacity,
                adjust_radius_for_latitude: false,
            },
        );
        let lines = legend_lines(&model);
        assert_eq!(lines.len(), 1 + 3);
        assert!(line_text(&lines[1]).contains("(10%)"));
        assert!(line_text(&lines[3]).contains("(50%)"));
    }

    #[test]
    fn empty_model_renders_timestamp_only() {
        let model = VizModel::build(&feed(&[]), VizOptions::default());
        let lines = legend_lines(&model);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn missing_timestamp_is_labeled_unknown() {
        let mut f = feed(&[]);
        f.generated = None;
        let model = VizModel::build(&f, VizOptions::default());
        assert_eq!(line_text(&legend_lines(&model)[0]), "Last Updated: unknown");
    }
}
