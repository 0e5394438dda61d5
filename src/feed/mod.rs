use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use geojson::{GeoJson, Value};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Past-week summary feed from the USGS earthquake hazards program
pub const DEFAULT_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_week.geojson";

/// One earthquake event from the feed
#[derive(Debug, Clone, PartialEq)]
pub struct Earthquake {
    pub magnitude: f64,
    pub lon: f64,
    pub lat: f64,
    pub depth_km: Option<f64>,
    pub place: String,
    pub time: Option<DateTime<Utc>>,
}

/// Top-level `metadata` object of the USGS feed (foreign member of the
/// FeatureCollection, not part of the GeoJSON spec)
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMetadata {
    pub generated: Option<i64>,
    pub title: Option<String>,
    pub count: Option<u64>,
}

/// A parsed feed: generation timestamp plus the usable events
#[derive(Debug, Clone)]
pub struct Feed {
    pub generated: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub quakes: Vec<Earthquake>,
    /// Features dropped during parsing (missing magnitude or geometry)
    pub skipped: usize,
}

/// Fetch the feed over HTTP. One shot: no retry, no backoff.
pub async fn fetch_feed(url: &str) -> Result<Feed> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("quakemap/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let text = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?
        .text()
        .await?;
    parse_feed(&text)
}

/// Load a feed from a local GeoJSON file (offline mode)
pub fn load_feed_file(path: &Path) -> Result<Feed> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_feed(&text)
}

/// Parse a GeoJSON FeatureCollection into a `Feed`.
///
/// Features without a numeric `properties.mag` or without Point geometry are
/// skipped with a diagnostic; a single bad feature never fails the feed.
pub fn parse_feed(text: &str) -> Result<Feed> {
    let geojson: GeoJson = text.parse().context("parsing feed GeoJSON")?;
    let fc = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => bail!("feed is not a GeoJSON FeatureCollection"),
    };

    let metadata = fc
        .foreign_members
        .as_ref()
        .and_then(|m| m.get("metadata"))
        .cloned()
        .and_then(|v| serde_json::from_value::<FeedMetadata>(v).ok());

    let generated = metadata
        .as_ref()
        .and_then(|m| m.generated)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    let title = metadata.as_ref().and_then(|m| m.title.clone());

    let mut quakes = Vec::with_capacity(fc.features.len());
    let mut skipped = 0usize;

    for feature in fc.features {
        let props = feature.properties.as_ref();

        let magnitude = props.and_then(|p| p.get("mag")).and_then(|v| v.as_f64());

        let coords = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(coords)) if coords.len() >= 2 => coords.clone(),
            _ => {
                skipped += 1;
                tracing::warn!("skipping feature without point geometry");
                continue;
            }
        };

        let Some(magnitude) = magnitude else {
            skipped += 1;
            tracing::warn!(
                lon = coords[0],
                lat = coords[1],
                "skipping feature without magnitude"
            );
            continue;
        };

        let place = props
            .and_then(|p| p.get("place"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown location")
            .to_string();

        let time = props
            .and_then(|p| p.get("time"))
            .and_then(|v| v.as_i64())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        quakes.push(Earthquake {
            magnitude,
            lon: coords[0],
            lat: coords[1],
            depth_km: coords.get(2).copied(),
            place,
            time,
        });
    }

    tracing::info!(
        events = quakes.len(),
        skipped,
        declared = metadata.as_ref().and_then(|m| m.count),
        generated = ?generated,
        "feed parsed"
    );

    Ok(Feed {
        generated,
        title,
        quakes,
        skipped,
    })
}
