//! Density overlay built from weighted spatial cells.
//!
//! Weights are normalized against the 5th..95th percentile band so a few
//! extreme cells cannot wash out the rest of the map; values outside the band
//! saturate at the palette ends. The layer is rebuilt wholesale on every
//! refresh.

use crowd_schema::{DensityResponse, DensityTile};
use tracing::debug;

use crate::gateway::OutboundRequest;
use crate::geo::LatLon;
use crate::schedule::{RequestStamp, StampSequencer};
use crate::style::Rgb;

/// Smallest normalization range; keeps near-uniform inputs finite.
pub const MIN_RANGE: f64 = 1e-9;
pub const LOW_PERCENTILE: f64 = 0.05;
pub const HIGH_PERCENTILE: f64 = 0.95;
/// Rough metres per degree, good enough for circle radii near the venue.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCell {
    pub cell_id: Option<String>,
    pub position: Option<LatLon>,
    pub weight: f64,
}

impl WeightedCell {
    /// Converts a predictor tile; tiles with neither a code nor a full
    /// coordinate are rejected.
    pub fn from_tile(tile: &DensityTile) -> Option<Self> {
        let cell_id = tile
            .h3_index
            .as_ref()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());
        let position = match (tile.lat, tile.lon) {
            (Some(lat), Some(lon)) => Some(LatLon::new(lat, lon)).filter(LatLon::is_finite),
            _ => None,
        };
        if cell_id.is_none() && position.is_none() {
            return None;
        }
        Some(Self {
            cell_id,
            position,
            weight: tile.weight,
        })
    }
}

/// Decodes spatial-index codes into cell geometry.
pub trait CellIndex {
    fn boundary(&self, code: &str) -> Option<Vec<LatLon>>;

    fn centroid(&self, code: &str) -> Option<LatLon> {
        let boundary = self.boundary(code)?;
        if boundary.is_empty() {
            return None;
        }
        let n = boundary.len() as f64;
        let (lat, lon) = boundary
            .iter()
            .fold((0.0, 0.0), |(lat, lon), point| (lat + point.lat, lon + point.lon));
        Some(LatLon::new(lat / n, lon / n))
    }
}

/// Used when no index decoder is available; every cell falls back to its
/// inline coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCellIndex;

impl CellIndex for NoCellIndex {
    fn boundary(&self, _code: &str) -> Option<Vec<LatLon>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityPalette {
    pub low: Rgb,
    pub mid: Rgb,
    pub high: Rgb,
}

impl Default for DensityPalette {
    fn default() -> Self {
        Self {
            low: Rgb::new(34, 197, 94),
            mid: Rgb::new(250, 204, 21),
            high: Rgb::new(220, 38, 38),
        }
    }
}

impl DensityPalette {
    pub fn color(&self, normalized: f64) -> Rgb {
        let t = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if t <= 0.5 {
            self.low.lerp(self.mid, t * 2.0)
        } else {
            self.mid.lerp(self.high, (t - 0.5) * 2.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityStyle {
    pub palette: DensityPalette,
    pub min_radius_m: f64,
    pub max_radius_m: f64,
}

impl Default for DensityStyle {
    fn default() -> Self {
        Self {
            palette: DensityPalette::default(),
            min_radius_m: 40.0,
            max_radius_m: 220.0,
        }
    }
}

impl DensityStyle {
    pub fn radius_for(&self, normalized: f64) -> f64 {
        let t = normalized.clamp(0.0, 1.0);
        self.min_radius_m + (self.max_radius_m - self.min_radius_m) * t
    }
}

/// Percentile clip band computed from the ascending weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRange {
    pub lo: f64,
    pub hi: f64,
    pub range: f64,
}

impl ClipRange {
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let last = sorted.len() - 1;
        let index = |fraction: f64| -> usize {
            ((fraction * last as f64).floor() as usize).min(last)
        };
        let lo = sorted[index(LOW_PERCENTILE)];
        let hi = sorted[index(HIGH_PERCENTILE)];
        Some(Self {
            lo,
            hi,
            range: (hi - lo).max(MIN_RANGE),
        })
    }

    pub fn normalize(&self, weight: f64) -> f64 {
        ((weight - self.lo) / self.range).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DensityShape {
    Polygon(Vec<LatLon>),
    Circle { center: LatLon, radius_m: f64 },
}

impl DensityShape {
    pub fn contains(&self, point: LatLon) -> bool {
        match self {
            DensityShape::Circle { center, radius_m } => {
                center.approx_distance_deg(&point) * METERS_PER_DEGREE <= *radius_m
            }
            DensityShape::Polygon(ring) => {
                // Even-odd crossing count over the closed ring.
                let mut inside = false;
                for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
                    if (a.lat > point.lat) != (b.lat > point.lat) {
                        let lon_at = a.lon + (point.lat - a.lat) / (b.lat - a.lat) * (b.lon - a.lon);
                        if point.lon < lon_at {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityFeature {
    pub shape: DensityShape,
    pub fill: Rgb,
    pub weight: f64,
    pub normalized: f64,
    pub percentile: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityStatus {
    NoData,
    Rendered { cells: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityLayer {
    pub features: Vec<DensityFeature>,
    pub clip: Option<ClipRange>,
    /// Cells that had no usable geometry or a non-finite weight.
    pub skipped: usize,
    pub status: DensityStatus,
}

impl DensityLayer {
    /// Topmost feature under `point`. Later features are drawn over earlier ones.
    pub fn feature_at(&self, point: LatLon) -> Option<&DensityFeature> {
        self.features.iter().rev().find(|feature| feature.shape.contains(point))
    }

    pub fn peak(&self) -> Option<&DensityFeature> {
        self.features
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
    }
}

impl Default for DensityLayer {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            clip: None,
            skipped: 0,
            status: DensityStatus::NoData,
        }
    }
}

pub struct DensityLayerRenderer {
    index: Box<dyn CellIndex + Send>,
    style: DensityStyle,
    layer: DensityLayer,
    sequencer: StampSequencer,
}

impl std::fmt::Debug for DensityLayerRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DensityLayerRenderer")
            .field("style", &self.style)
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

impl Default for DensityLayerRenderer {
    fn default() -> Self {
        Self::new(DensityStyle::default())
    }
}

impl DensityLayerRenderer {
    pub fn new(style: DensityStyle) -> Self {
        Self::with_index(style, NoCellIndex)
    }

    pub fn with_index(style: DensityStyle, index: impl CellIndex + Send + 'static) -> Self {
        Self {
            index: Box::new(index),
            style,
            layer: DensityLayer::default(),
            sequencer: StampSequencer::new(),
        }
    }

    pub fn layer(&self) -> &DensityLayer {
        &self.layer
    }

    pub fn style(&self) -> &DensityStyle {
        &self.style
    }

    /// Drops the layer. Fetches already in flight are ignored when they land.
    pub fn clear(&mut self) {
        self.layer = DensityLayer::default();
        self.sequencer.invalidate();
    }

    pub fn refresh_request(&mut self) -> OutboundRequest {
        OutboundRequest::FetchDensity {
            stamp: self.sequencer.issue(),
        }
    }

    /// Applies a predictor response unless a newer one was already rendered.
    pub fn apply_response(&mut self, stamp: RequestStamp, response: &DensityResponse) -> bool {
        if !self.sequencer.accept(stamp) {
            return false;
        }
        let mut rejected = 0;
        let cells: Vec<WeightedCell> = response
            .tiles
            .iter()
            .filter_map(|tile| {
                let cell = WeightedCell::from_tile(tile);
                if cell.is_none() {
                    rejected += 1;
                }
                cell
            })
            .collect();
        self.render(&cells);
        self.layer.skipped += rejected;
        true
    }

    /// Rebuilds the whole layer from `cells`.
    pub fn render(&mut self, cells: &[WeightedCell]) {
        let usable: Vec<&WeightedCell> = cells.iter().filter(|cell| cell.weight.is_finite()).collect();
        let mut skipped = cells.len() - usable.len();

        let mut sorted: Vec<f64> = usable.iter().map(|cell| cell.weight).collect();
        sorted.sort_by(f64::total_cmp);
        let Some(clip) = ClipRange::from_sorted(&sorted) else {
            self.layer = DensityLayer {
                skipped,
                ..DensityLayer::default()
            };
            debug!(target: "crowd_console::density", "density.no_data");
            return;
        };

        let last = (sorted.len() - 1) as f64;
        let mut features = Vec::with_capacity(usable.len());
        for cell in usable {
            let normalized = clip.normalize(cell.weight);
            let Some(shape) = self.shape_for(cell, normalized) else {
                skipped += 1;
                continue;
            };
            let rank = sorted.partition_point(|weight| *weight < cell.weight) as f64;
            let percentile = if last > 0.0 { rank / last * 100.0 } else { 100.0 };
            let label = format!(
                "weight {:.3} | p{:.0} | cell {}",
                cell.weight,
                percentile,
                cell.cell_id.as_deref().unwrap_or("not available")
            );
            features.push(DensityFeature {
                shape,
                fill: self.style.palette.color(normalized),
                weight: cell.weight,
                normalized,
                percentile,
                label,
            });
        }

        let status = if features.is_empty() {
            DensityStatus::NoData
        } else {
            DensityStatus::Rendered {
                cells: features.len(),
            }
        };
        debug!(
            target: "crowd_console::density",
            rendered = features.len(),
            skipped,
            lo = clip.lo,
            hi = clip.hi,
            "density.rendered"
        );
        self.layer = DensityLayer {
            features,
            clip: Some(clip),
            skipped,
            status,
        };
    }

    /// The index boundary wins only when the code resolves to a real polygon;
    /// otherwise the inline coordinate, then the index centroid, is drawn as a
    /// circle.
    fn shape_for(&self, cell: &WeightedCell, normalized: f64) -> Option<DensityShape> {
        if let Some(code) = cell.cell_id.as_deref() {
            if let Some(boundary) = self.index.boundary(code).filter(|ring| ring.len() >= 3) {
                return Some(DensityShape::Polygon(boundary));
            }
        }
        let center = cell.position.or_else(|| {
            cell.cell_id
                .as_deref()
                .and_then(|code| self.index.centroid(code))
        })?;
        Some(DensityShape::Circle {
            center,
            radius_m: self.style.radius_for(normalized),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SquareIndex;

    impl CellIndex for SquareIndex {
        fn boundary(&self, code: &str) -> Option<Vec<LatLon>> {
            let (lat, lon) = code.split_once(':')?;
            let lat: f64 = lat.parse().ok()?;
            let lon: f64 = lon.parse().ok()?;
            Some(vec![
                LatLon::new(lat, lon),
                LatLon::new(lat + 0.01, lon),
                LatLon::new(lat + 0.01, lon + 0.01),
                LatLon::new(lat, lon + 0.01),
            ])
        }
    }

    fn cell_at(weight: f64) -> WeightedCell {
        WeightedCell {
            cell_id: None,
            position: Some(LatLon::new(23.18, 75.77)),
            weight,
        }
    }

    #[test]
    fn percentile_clip_saturates_tails() {
        let weights: Vec<f64> = (1..=100).map(f64::from).collect();
        let clip = ClipRange::from_sorted(&weights).unwrap();
        assert_eq!(clip.lo, 5.0);
        assert_eq!(clip.hi, 95.0);
        assert_eq!(clip.normalize(1.0), 0.0);
        assert_eq!(clip.normalize(100.0), 1.0);
        assert_eq!(clip.normalize(5.0), 0.0);
        assert_eq!(clip.normalize(95.0), 1.0);
        assert!((clip.normalize(50.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn uniform_weights_stay_finite() {
        let clip = ClipRange::from_sorted(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(clip.range, MIN_RANGE);
        assert_eq!(clip.normalize(3.0), 0.0);
    }

    #[test]
    fn single_cell_clamps_indices() {
        let clip = ClipRange::from_sorted(&[7.0]).unwrap();
        assert_eq!(clip.lo, 7.0);
        assert_eq!(clip.hi, 7.0);
    }

    #[test]
    fn palette_blends_through_three_anchors() {
        let palette = DensityPalette::default();
        assert_eq!(palette.color(0.0), palette.low);
        assert_eq!(palette.color(0.5), palette.mid);
        assert_eq!(palette.color(1.0), palette.high);
        assert_eq!(palette.color(0.25), palette.low.lerp(palette.mid, 0.5));
    }

    #[test]
    fn empty_input_reports_no_data() {
        let mut renderer = DensityLayerRenderer::default();
        renderer.render(&[cell_at(1.0)]);
        renderer.render(&[]);
        assert_eq!(renderer.layer().status, DensityStatus::NoData);
        assert!(renderer.layer().features.is_empty());
    }

    #[test]
    fn circles_scale_with_normalized_weight() {
        let mut renderer = DensityLayerRenderer::default();
        let cells: Vec<WeightedCell> = (1..=100).map(|w| cell_at(w as f64)).collect();
        renderer.render(&cells);
        let layer = renderer.layer();
        assert_eq!(layer.status, DensityStatus::Rendered { cells: 100 });
        let first = &layer.features[0];
        let last = &layer.features[99];
        assert_eq!(
            first.shape,
            DensityShape::Circle {
                center: LatLon::new(23.18, 75.77),
                radius_m: 40.0
            }
        );
        assert_eq!(
            last.shape,
            DensityShape::Circle {
                center: LatLon::new(23.18, 75.77),
                radius_m: 220.0
            }
        );
        assert_eq!(first.percentile, 0.0);
        assert_eq!(last.percentile, 100.0);
        assert_eq!(first.label, "weight 1.000 | p0 | cell not available");
    }

    #[test]
    fn resolvable_code_beats_inline_coordinate() {
        let mut renderer = DensityLayerRenderer::with_index(DensityStyle::default(), SquareIndex);
        renderer.render(&[
            WeightedCell {
                cell_id: Some("23.1:75.7".into()),
                position: Some(LatLon::new(23.18, 75.77)),
                weight: 2.0,
            },
            WeightedCell {
                cell_id: Some("8828308281fffff".into()),
                position: Some(LatLon::new(23.19, 75.78)),
                weight: 4.0,
            },
        ]);
        let features = &renderer.layer().features;
        assert!(matches!(features[0].shape, DensityShape::Polygon(ref ring) if ring.len() == 4));
        assert!(matches!(features[1].shape, DensityShape::Circle { center, .. } if center == LatLon::new(23.19, 75.78)));
        assert_eq!(features[1].label, "weight 4.000 | p100 | cell 8828308281fffff");
    }

    #[test]
    fn unresolvable_code_without_position_falls_back_to_centroid_or_skips() {
        let mut renderer = DensityLayerRenderer::default();
        renderer.render(&[
            WeightedCell {
                cell_id: Some("8828308281fffff".into()),
                position: None,
                weight: 1.0,
            },
            cell_at(2.0),
        ]);
        assert_eq!(renderer.layer().features.len(), 1);
        assert_eq!(renderer.layer().skipped, 1);
    }

    #[test]
    fn stale_density_response_is_ignored() {
        let mut renderer = DensityLayerRenderer::default();
        let OutboundRequest::FetchDensity { stamp: early } = renderer.refresh_request() else {
            panic!("expected density fetch");
        };
        let OutboundRequest::FetchDensity { stamp: late } = renderer.refresh_request() else {
            panic!("expected density fetch");
        };
        let response = DensityResponse {
            generated_at: 0.0,
            total_weight: 3.0,
            tiles: vec![DensityTile {
                h3_index: None,
                lon: Some(75.77),
                lat: Some(23.18),
                weight: 3.0,
                norm_weight: Some(1.0),
            }],
        };
        assert!(renderer.apply_response(late, &response));
        assert!(!renderer.apply_response(early, &DensityResponse::default()));
        assert_eq!(renderer.layer().features.len(), 1);
    }

    #[test]
    fn cleared_layer_ignores_fetches_in_flight() {
        let mut renderer = DensityLayerRenderer::default();
        let OutboundRequest::FetchDensity { stamp } = renderer.refresh_request() else {
            panic!("expected density fetch");
        };
        renderer.clear();
        let response = DensityResponse {
            tiles: vec![DensityTile {
                h3_index: None,
                lon: Some(75.77),
                lat: Some(23.18),
                weight: 1.0,
                norm_weight: None,
            }],
            ..DensityResponse::default()
        };
        assert!(!renderer.apply_response(stamp, &response));
        assert_eq!(renderer.layer().status, DensityStatus::NoData);

        let OutboundRequest::FetchDensity { stamp } = renderer.refresh_request() else {
            panic!("expected density fetch");
        };
        assert!(renderer.apply_response(stamp, &response));
    }

    #[test]
    fn hovered_feature_exposes_its_label() {
        let mut renderer = DensityLayerRenderer::with_index(DensityStyle::default(), SquareIndex);
        renderer.render(&[
            WeightedCell {
                cell_id: Some("23.1:75.7".into()),
                position: None,
                weight: 2.0,
            },
            cell_at(5.0),
        ]);
        let layer = renderer.layer();

        let square = layer.feature_at(LatLon::new(23.105, 75.705)).expect("inside square");
        assert!(square.label.starts_with("weight 2.000"), "{}", square.label);
        let circle = layer.feature_at(LatLon::new(23.1801, 75.7701)).expect("inside circle");
        assert!(circle.label.starts_with("weight 5.000"), "{}", circle.label);
        assert!(layer.feature_at(LatLon::new(23.3, 75.9)).is_none());

        assert_eq!(layer.peak().map(|feature| feature.weight), Some(5.0));
        assert!(DensityLayer::default().peak().is_none());
    }
}
