//! Magnitude-to-visual-encoding transform.
//!
//! Everything here is a pure function of its inputs: the feed is scanned
//! once for the magnitude range, the range is partitioned into buckets
//! carrying a visual attribute (color + radius, or fill intensity), and each
//! event is classified into the first bucket whose upper bound covers its
//! magnitude. No process-wide state; the whole product is a [`VizModel`]
//! built once per fetch.

use crate::feed::{Earthquake, Feed};
use chrono::{DateTime, Utc};

/// Min/max over all magnitudes of a feed. Recomputed on every fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

impl MagnitudeRange {
    /// Scan a magnitude sequence once. `None` for an empty sequence: the
    /// defined "no data" state, so no NaN step sizes ever propagate.
    pub fn of(magnitudes: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut range: Option<MagnitudeRange> = None;
        for m in magnitudes {
            range = Some(match range {
                None => MagnitudeRange { min: m, max: m },
                Some(r) => MagnitudeRange {
                    min: r.min.min(m),
                    max: r.max.max(m),
                },
            });
        }
        range
    }
}

/// Marker colors, in bucket order (lowest magnitude first)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Yellow,
    Purple,
    Orange,
    Green,
    Red,
    Blue,
}

/// Fixed palette driving the color variant: one bucket per color
pub const PALETTE: [MarkerColor; 6] = [
    MarkerColor::Yellow,
    MarkerColor::Purple,
    MarkerColor::Orange,
    MarkerColor::Green,
    MarkerColor::Red,
    MarkerColor::Blue,
];

/// How many opacity tiers the opacity variant produces. Fixed by contract,
/// not by loop termination against a drifting float cursor.
pub const OPACITY_TIERS: usize = 3;

/// Base circle radius for opacity-shaded markers, which carry no per-bucket
/// radius of their own
pub const OPACITY_RADIUS_M: f64 = 30_000.0;

/// Radius floor when latitude adjustment is enabled
const MIN_ADJUSTED_RADIUS_M: f64 = 15_000.0;

/// A magnitude sub-range mapped to a color and a circle radius in meters
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBucket {
    pub lower: f64,
    pub upper: f64,
    pub color: MarkerColor,
    pub radius_m: f64,
}

/// A magnitude tier mapped to a fill intensity in `[0.0, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct OpacityBucket {
    pub upper: f64,
    pub opacity: f64,
}

/// Anything the classifier can scan: an ordered sequence of upper bounds
pub trait MagnitudeBucket {
    fn upper_bound(&self) -> f64;
}

impl MagnitudeBucket for ColorBucket {
    fn upper_bound(&self) -> f64 {
        self.upper
    }
}

impl MagnitudeBucket for OpacityBucket {
    fn upper_bound(&self) -> f64 {
        self.upper
    }
}

/// Partition `[min, max]` into one bucket per palette color.
///
/// Bucket 0 spans `[min, min + step]`; each later bucket starts 0.01 above
/// the previous upper bound, leaving a deliberate hairline gap so a
/// magnitude sitting exactly on a boundary belongs to exactly one bucket.
/// Upper bounds accumulate sequentially (`upper += step`), so they drift the
/// same way the feed math always has; display rounds to two decimals, but
/// classification uses the raw values.
pub fn build_color_buckets(range: MagnitudeRange) -> Vec<ColorBucket> {
    let step = (range.max - range.min) / PALETTE.len() as f64;

    let mut lower = range.min;
    let mut upper = range.min + step;
    let mut buckets = Vec::with_capacity(PALETTE.len());

    for (i, &color) in PALETTE.iter().enumerate() {
        if i != 0 {
            lower = upper + 0.01;
            upper += step;
        }
        buckets.push(ColorBucket {
            lower,
            upper,
            color,
            radius_m: (i * 12_000 + 18_000) as f64,
        });
    }
    buckets
}

/// Partition `[min, max]` into exactly [`OPACITY_TIERS`] tiers, closed form.
///
/// Tier `i` ends at `min + (i + 1) * step`, except the last tier which ends
/// at `max` exactly, so the maximum magnitude always classifies. Opacities
/// run 0.10, 0.30, 0.50.
pub fn build_opacity_buckets(range: MagnitudeRange) -> Vec<OpacityBucket> {
    let step = (range.max - range.min) / OPACITY_TIERS as f64;

    (0..OPACITY_TIERS)
        .map(|i| OpacityBucket {
            upper: if i + 1 == OPACITY_TIERS {
                range.max
            } else {
                range.min + step * (i + 1) as f64
            },
            opacity: (20 * i + 10) as f64 / 100.0,
        })
        .collect()
}

/// Find the first bucket whose upper bound covers the magnitude.
///
/// `None` means unclassified: the magnitude exceeds every bound, or there
/// are no buckets. Callers skip that one event and keep going.
pub fn classify<B: MagnitudeBucket>(buckets: &[B], magnitude: f64) -> Option<usize> {
    buckets.iter().position(|b| b.upper_bound() >= magnitude)
}

/// Shrink a circle radius with increasing absolute latitude, floored at
/// 15 km. Optional strategy, off by default; see [`VizOptions`].
pub fn adjusted_radius_m(radius_m: f64, lat: f64) -> f64 {
    let lat = lat.abs();
    let multiplier = if lat > 80.0 {
        2250.0
    } else if lat > 70.0 {
        2100.0
    } else if lat > 60.0 {
        2000.0
    } else {
        1800.0
    };
    (radius_m - lat * multiplier).max(MIN_ADJUSTED_RADIUS_M)
}

/// Which shading variant a run uses. The two never coexist in one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeMode {
    Color,
    Opacity,
}

/// Options for building the visualization model
#[derive(Debug, Clone, Copy)]
pub struct VizOptions {
    pub shade: ShadeMode,
    /// Latitude-based radius correction (color variant only)
    pub adjust_radius_for_latitude: bool,
}

impl Default for VizOptions {
    fn default() -> Self {
        Self {
            shade: ShadeMode::Color,
            adjust_radius_for_latitude: false,
        }
    }
}

/// The bucket set for one run: one variant, never both
#[derive(Debug, Clone)]
pub enum BucketSet {
    Color(Vec<ColorBucket>),
    Opacity(Vec<OpacityBucket>),
}

impl BucketSet {
    pub fn len(&self) -> usize {
        match self {
            BucketSet::Color(b) => b.len(),
            BucketSet::Opacity(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn classify(&self, magnitude: f64) -> Option<usize> {
        match self {
            BucketSet::Color(b) => classify(b, magnitude),
            BucketSet::Opacity(b) => classify(b, magnitude),
        }
    }

    /// Visual attribute of bucket `idx`
    pub fn shade(&self, idx: usize) -> Option<MarkerShade> {
        match self {
            BucketSet::Color(b) => b.get(idx).map(|b| MarkerShade::Color(b.color)),
            BucketSet::Opacity(b) => b.get(idx).map(|b| MarkerShade::Intensity(b.opacity)),
        }
    }
}

/// Visual attribute a classified marker carries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerShade {
    Color(MarkerColor),
    Intensity(f64),
}

/// One classified, renderable earthquake
#[derive(Debug, Clone)]
pub struct Marker {
    pub quake: Earthquake,
    pub bucket: usize,
    pub radius_m: f64,
    pub shade: MarkerShade,
}

/// The full render model for one fetch: range, buckets, classified markers,
/// legend timestamp. Threaded as a value; nothing global.
#[derive(Debug, Clone)]
pub struct VizModel {
    pub range: Option<MagnitudeRange>,
    pub buckets: BucketSet,
    pub markers: Vec<Marker>,
    pub generated: Option<DateTime<Utc>>,
    /// Events dropped because no bucket covered their magnitude
    pub skipped: usize,
    pub shade: ShadeMode,
}

impl VizModel {
    /// Base-map-only model, used when the fetch fails outright
    pub fn empty(shade: ShadeMode) -> Self {
        Self {
            range: None,
            buckets: match shade {
                ShadeMode::Color => BucketSet::Color(Vec::new()),
                ShadeMode::Opacity => BucketSet::Opacity(Vec::new()),
            },
            markers: Vec::new(),
            generated: None,
            skipped: 0,
            shade,
        }
    }

    /// Run the whole pipeline: range, buckets, per-event classification.
    ///
    /// An empty feed short-circuits to an empty model. Unclassifiable events
    /// are skipped individually with a diagnostic; the rest still render.
    pub fn build(feed: &Feed, opts: VizOptions) -> Self {
        let range = MagnitudeRange::of(feed.quakes.iter().map(|q| q.magnitude));

        let Some(range) = range else {
            tracing::info!("feed has no events; rendering base map only");
            let mut model = Self::empty(opts.shade);
            model.generated = feed.generated;
            return model;
        };

        let buckets = match opts.shade {
            ShadeMode::Color => BucketSet::Color(build_color_buckets(range)),
            ShadeMode::Opacity => BucketSet::Opacity(build_opacity_buckets(range)),
        };
        tracing::debug!(min = range.min, max = range.max, buckets = buckets.len(), "buckets built");

        let mut markers = Vec::with_capacity(feed.quakes.len());
        let mut skipped = 0usize;

        for quake in &feed.quakes {
            let Some(idx) = buckets.classify(quake.magnitude) else {
                skipped += 1;
                tracing::warn!(
                    magnitude = quake.magnitude,
                    place = %quake.place,
                    "no bucket covers this magnitude; skipping event"
                );
                continue;
            };

            let radius_m = match &buckets {
                BucketSet::Color(b) => {
                    let base = b[idx].radius_m;
                    if opts.adjust_radius_for_latitude {
                        adjusted_radius_m(base, quake.lat)
                    } else {
                        base
                    }
                }
                BucketSet::Opacity(_) => OPACITY_RADIUS_M,
            };

            markers.push(Marker {
                quake: quake.clone(),
                bucket: idx,
                radius_m,
                // classify() only returns indices into the set
                shade: buckets.shade(idx).unwrap_or(MarkerShade::Intensity(1.0)),
            });
        }

        Self {
            range: Some(range),
            buckets,
            markers,
            generated: feed.generated,
            skipped,
            shade: opts.shade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quake(magnitude: f64, lon: f64, lat: f64) -> Earthquake {
        Earthquake {
            magnitude,
            lon,
            lat,
            depth_km: Some(10.0),
            place: format!("M{magnitude} test event"),
            time: Utc.timestamp_millis_opt(1_700_000_000_000).single(),
        }
    }

    fn feed_of(mags: &[f64]) -> Feed {
        Feed {
            generated: Utc.timestamp_millis_opt(1_700_000_000_000).single(),
            title: None,
            quakes: mags.iter().map(|&m| quake(m, 0.0, 0.0)).collect(),
            skipped: 0,
        }
    }

    #[test]
    fn range_covers_all_magnitudes() {
        let mags = [2.3, -0.4, 5.1, 0.0, 3.3];
        let r = MagnitudeRange::of(mags.iter().copied()).unwrap();
        assert_eq!(r.min, -0.4);
        assert_eq!(r.max, 5.1);
        for m in mags {
            assert!(r.min <= m && m <= r.max);
        }
    }

    #[test]
    fn range_of_empty_is_none() {
        assert_eq!(MagnitudeRange::of(std::iter::empty()), None);
    }

    #[test]
    fn range_of_single_value() {
        let r = MagnitudeRange::of([4.2]).unwrap();
        assert_eq!(r.min, 4.2);
        assert_eq!(r.max, 4.2);
    }

    #[test]
    fn color_buckets_count_and_attributes() {
        let buckets = build_color_buckets(MagnitudeRange { min: 0.0, max: 6.0 });
        assert_eq!(buckets.len(), 6);
        for (i, b) in buckets.iter().enumerate() {
            assert!(b.upper > b.lower);
            assert_eq!(b.color, PALETTE[i]);
            assert_eq!(b.radius_m, (i * 12_000 + 18_000) as f64);
        }
        // Strict gap between consecutive buckets
        for pair in buckets.windows(2) {
            assert!(pair[1].lower > pair[0].upper);
        }
    }

    #[test]
    fn color_buckets_integer_step() {
        let buckets = build_color_buckets(MagnitudeRange { min: 0.0, max: 6.0 });
        assert_eq!(buckets[0].lower, 0.0);
        assert_eq!(buckets[0].upper, 1.0);
        assert_eq!(buckets[1].lower, 1.01);
        assert_eq!(buckets[5].upper, 6.0);
    }

    #[test]
    fn classifier_picks_lowest_covering_bucket() {
        let buckets = build_color_buckets(MagnitudeRange { min: 0.0, max: 6.0 });
        assert_eq!(classify(&buckets, 0.5), Some(0));
        assert_eq!(classify(&buckets, 2.5), Some(2));
        assert_eq!(classify(&buckets, 6.0), Some(5));
    }

    #[test]
    fn boundary_magnitude_goes_to_that_bucket_not_the_next() {
        let buckets = build_color_buckets(MagnitudeRange { min: 0.0, max: 6.0 });
        // Exactly on bucket 0's upper bound
        assert_eq!(classify(&buckets, 1.0), Some(0));
        // Inside the hairline gap above it: next bucket catches it
        assert_eq!(classify(&buckets, 1.005), Some(1));
    }

    #[test]
    fn classifier_reports_unclassified() {
        let buckets = build_color_buckets(MagnitudeRange { min: 0.0, max: 6.0 });
        assert_eq!(classify(&buckets, 6.5), None);
        let empty: Vec<ColorBucket> = Vec::new();
        assert_eq!(classify(&empty, 1.0), None);
    }

    #[test]
    fn scenario_one_three_five() {
        // Range {1, 5}, step 4/6: accumulated drift leaves bucket 2's upper
        // bound a hair below 3.0, so magnitude 3.0 lands in bucket 3.
        let range = MagnitudeRange::of([1.0, 3.0, 5.0]).unwrap();
        assert_eq!(range.min, 1.0);
        assert_eq!(range.max, 5.0);

        let buckets = build_color_buckets(range);
        assert_eq!(buckets.len(), 6);
        assert_eq!(classify(&buckets, 3.0), Some(3));
        assert_eq!(format!("{:.2}", buckets[3].lower), "3.01");
    }

    #[test]
    fn opacity_buckets_fixed_count_and_ramp() {
        let range = MagnitudeRange { min: 1.0, max: 5.0 };
        let buckets = build_opacity_buckets(range);
        assert_eq!(buckets.len(), OPACITY_TIERS);
        assert_eq!(buckets[0].opacity, 0.10);
        assert_eq!(buckets[1].opacity, 0.30);
        assert_eq!(buckets[2].opacity, 0.50);
        for pair in buckets.windows(2) {
            assert!(pair[1].opacity >= pair[0].opacity);
            assert!(pair[1].upper >= pair[0].upper);
        }
        for b in &buckets {
            assert!(b.opacity >= 0.1 && b.opacity <= 1.0);
        }
        // Last bound is the max exactly, so the largest event classifies
        assert_eq!(buckets[2].upper, 5.0);
        assert_eq!(classify(&buckets, 5.0), Some(2));
    }

    #[test]
    fn adjusted_radius_tiers_and_floor() {
        // Below 60 degrees: base multiplier
        assert_eq!(adjusted_radius_m(78_000.0, 10.0), 78_000.0 - 10.0 * 1800.0);
        // Tier boundaries on |lat|
        assert_eq!(adjusted_radius_m(200_000.0, 65.0), 200_000.0 - 65.0 * 2000.0);
        assert_eq!(adjusted_radius_m(200_000.0, -75.0), 200_000.0 - 75.0 * 2100.0);
        assert_eq!(adjusted_radius_m(300_000.0, 85.0), 300_000.0 - 85.0 * 2250.0);
        // Floor at 15km
        assert_eq!(adjusted_radius_m(18_000.0, 50.0), 15_000.0);
    }

    #[test]
    fn model_empty_feed_short_circuits() {
        let feed = feed_of(&[]);
        let model = VizModel::build(&feed, VizOptions::default());
        assert!(model.range.is_none());
        assert!(model.buckets.is_empty());
        assert!(model.markers.is_empty());
        assert_eq!(model.skipped, 0);
        assert!(model.generated.is_some());
    }

    #[test]
    fn model_classifies_or_skips_every_event() {
        let feed = feed_of(&[1.0, 3.0, 5.0]);
        let model = VizModel::build(&feed, VizOptions::default());
        // Every event either renders or is counted as skipped, never lost
        assert_eq!(model.markers.len() + model.skipped, 3);
        let m3 = model
            .markers
            .iter()
            .find(|m| m.quake.magnitude == 3.0)
            .unwrap();
        assert_eq!(m3.bucket, 3);
        assert_eq!(m3.shade, MarkerShade::Color(MarkerColor::Green));
        assert_eq!(m3.radius_m, (3 * 12_000 + 18_000) as f64);
    }

    #[test]
    fn model_opacity_variant_classifies_everything() {
        let feed = feed_of(&[1.0, 3.0, 5.0]);
        let model = VizModel::build(
            &feed,
            VizOptions {
                shade: ShadeMode::Opacity,
                adjust_radius_for_latitude: false,
            },
        );
        assert_eq!(model.markers.len(), 3);
        assert_eq!(model.skipped, 0);
        for m in &model.markers {
            assert_eq!(m.radius_m, OPACITY_RADIUS_M);
            assert!(matches!(m.shade, MarkerShade::Intensity(_)));
        }
    }

    #[test]
    fn model_latitude_adjustment_is_opt_in() {
        let mut feed = feed_of(&[]);
        feed.quakes.push(quake(2.0, 0.0, 70.0));
        feed.quakes.push(quake(2.0, 0.0, 0.0));

        let plain = VizModel::build(&feed, VizOptions::default());
        assert_eq!(plain.markers[0].radius_m, plain.markers[1].radius_m);

        let adjusted = VizModel::build(
            &feed,
            VizOptions {
                shade: ShadeMode::Color,
                adjust_radius_for_latitude: true,
            },
        );
        assert!(adjusted.markers[0].radius_m < adjusted.markers[1].radius_m);
    }
}
