// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature extraction: general image features plus a per-type structural
// feature set selected by the classification.

use diagramlens_core::diagram::{
    ArrowDirections, BarChartFeatures, BarOrientation, ChemicalFeatures, ColorMode,
    DiagramAnalysis, DiagramClassification, DiagramFeatures, DiagramType, FlowChartFeatures,
    GeneralFeatures, LineGraphFeatures, NetworkComplexity, NetworkFeatures, PieChartFeatures,
    ScatterPlotFeatures, SpecificFeatures, TrendTally,
};
use diagramlens_core::error::{DiagramLensError, Result};
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use tracing::{debug, instrument, warn};

use super::classifier::try_classify_diagram;
use super::signals::{self, structure_edges};
use crate::color::rgb_to_hsv;
use crate::guard::guarded;
use crate::image::geometry::{self, Blob, LineSegment, SegmentOptions};
use crate::image::{DecodedImage, filters};

/// Hue × saturation bins of the colour-count histogram.
const HUE_BINS: usize = 36;
const SATURATION_BINS: usize = 32;
/// Normalised bin weight above which a bin counts as a colour.
const COLOR_BIN_THRESHOLD: f64 = 0.01;
const COLORFUL_MIN_COLORS: usize = 10;

/// Gray level above which a sampled pixel counts as light.
const LIGHT_LEVEL: u8 = 200;

/// Scatter points closer than this belong to the same cluster.
// TODO: 30 px is not scale-aware; derive it from the image size once there is
// labelled data to tune against.
const CLUSTER_DISTANCE: f32 = 30.0;

/// Share of the minor image dimension within which a pie spoke must pass the
/// image centre.
const PIE_CENTRE_TOLERANCE: f32 = 0.1;

/// Classify and extract features in one go.
///
/// Any failure in either stage collapses to `(Unknown, 0.0)` with the error
/// recorded in the features and no specific set.
pub fn analyze_diagram(image: &DecodedImage) -> DiagramAnalysis {
    let analysis = try_classify_diagram(image).and_then(|classification| {
        try_extract_features(image, &classification).map(|features| DiagramAnalysis {
            classification,
            features,
        })
    });
    analysis.unwrap_or_else(|err| {
        warn!(error = %err, "Diagram analysis failed");
        DiagramAnalysis::failed(err.to_string())
    })
}

/// Features for an already classified image. Never fails: errors are recorded
/// in [`DiagramFeatures::error`].
pub fn extract_features(
    image: &DecodedImage,
    classification: &DiagramClassification,
) -> DiagramFeatures {
    try_extract_features(image, classification).unwrap_or_else(|err| {
        warn!(error = %err, "Feature extraction failed");
        DiagramFeatures::failed(err.to_string())
    })
}

/// Like [`extract_features`] but reports the failure.
#[instrument(skip_all, fields(diagram_type = %classification.diagram_type))]
pub fn try_extract_features(
    image: &DecodedImage,
    classification: &DiagramClassification,
) -> Result<DiagramFeatures> {
    guarded("feature extraction", || {
        let general = general_features(image)?;
        let specific = specific_features(image.gray(), classification.diagram_type);
        debug!(?specific, "Specific features extracted");
        Ok(DiagramFeatures {
            general: Some(general),
            error: None,
            specific,
        })
    })
}

// -- General -------------------------------------------------------------------

/// Type-independent features.
pub fn general_features(image: &DecodedImage) -> Result<GeneralFeatures> {
    if !image.has_pixels() {
        return Err(DiagramLensError::Validation("image has no pixels".into()));
    }
    let gray = image.gray();
    let (width, height) = gray.dimensions();

    let (color_mode, color_count) = if image.is_color() {
        (ColorMode::Color, color_count(image))
    } else {
        (ColorMode::Grayscale, 0)
    };

    Ok(GeneralFeatures {
        width,
        height,
        aspect_ratio: width as f64 / height as f64,
        color_mode,
        color_count,
        is_colorful: color_count > COLORFUL_MIN_COLORS,
        has_light_background: has_light_background(gray),
        edge_density: geometry::edge_density(gray, 100.0, 200.0),
        estimated_text_area: filters::foreground_fraction(&filters::otsu_binary_inv(gray)),
    })
}

/// Hue/saturation bins holding more than 1 % of the L2-normalised histogram.
fn color_count(image: &DecodedImage) -> usize {
    let mut histogram = vec![0u64; HUE_BINS * SATURATION_BINS];
    for pixel in image.to_rgb().pixels() {
        let [h, s, _] = rgb_to_hsv(pixel.0);
        let hue = (h.round() as usize % 180) * HUE_BINS / 180;
        let saturation = (s.round() as usize).min(255) * SATURATION_BINS / 256;
        histogram[hue * SATURATION_BINS + saturation] += 1;
    }
    let norm = histogram
        .iter()
        .map(|&c| (c as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return 0;
    }
    histogram
        .iter()
        .filter(|&&c| c as f64 / norm > COLOR_BIN_THRESHOLD)
        .count()
}

/// At least three of the four corners and the centre are light.
pub fn has_light_background(gray: &GrayImage) -> bool {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return false;
    }
    let samples = [
        (0, 0),
        (width - 1, 0),
        (0, height - 1),
        (width - 1, height - 1),
        (width / 2, height / 2),
    ];
    samples
        .iter()
        .filter(|&&(x, y)| gray.get_pixel(x, y).0[0] > LIGHT_LEVEL)
        .count()
        >= 3
}

// -- Specific ------------------------------------------------------------------

/// Structural features for `diagram_type`.
pub fn specific_features(gray: &GrayImage, diagram_type: DiagramType) -> SpecificFeatures {
    match diagram_type {
        DiagramType::BarChart => SpecificFeatures::BarChart(bar_chart(gray)),
        DiagramType::LineGraph => SpecificFeatures::LineGraph(line_graph(gray)),
        DiagramType::ScatterPlot => SpecificFeatures::ScatterPlot(scatter_plot(gray)),
        DiagramType::PieChart => SpecificFeatures::PieChart(pie_chart(gray)),
        DiagramType::FlowChart => SpecificFeatures::FlowChart(flow_chart(gray)),
        DiagramType::NetworkDiagram => SpecificFeatures::NetworkDiagram(network(gray)),
        DiagramType::ChemicalStructure => SpecificFeatures::ChemicalStructure(chemical(gray)),
        DiagramType::VennDiagram | DiagramType::Unknown => SpecificFeatures::None,
    }
}

fn bar_chart(gray: &GrayImage) -> BarChartFeatures {
    let edges = structure_edges(gray);
    let vertical = signals::bar_count(&edges, BarOrientation::Vertical);
    let horizontal = signals::bar_count(&edges, BarOrientation::Horizontal);
    let (orientation, bar_count) = if vertical > horizontal {
        (BarOrientation::Vertical, vertical)
    } else {
        (BarOrientation::Horizontal, horizontal)
    };

    // Extent along the dominant axis of every rectangular outline.
    let sizes: Vec<f64> = signals::rectangles(gray)
        .iter()
        .map(|contour| {
            let (_, _, w, h) = geometry::bounding_box(&contour.points);
            match orientation {
                BarOrientation::Vertical => h as f64,
                BarOrientation::Horizontal => w as f64,
            }
        })
        .collect();

    BarChartFeatures {
        orientation,
        bar_count,
        min_bar_size: sizes.iter().copied().reduce(f64::min),
        max_bar_size: sizes.iter().copied().reduce(f64::max),
        avg_bar_size: mean(&sizes),
        has_grid_lines: signals::has_grid_lines(gray),
    }
}

fn line_graph(gray: &GrayImage) -> LineGraphFeatures {
    let lines = signals::significant_lines(&structure_edges(gray));
    LineGraphFeatures {
        line_count: lines.len(),
        has_markers: signals::points(gray).len() > 10,
        has_grid_lines: signals::has_grid_lines(gray),
        trends: tally_trends(&lines),
    }
}

/// Direction of each non-vertical segment read left to right. Image y grows
/// downward, so a falling y is an increasing trend.
pub fn tally_trends(segments: &[LineSegment]) -> TrendTally {
    let mut tally = TrendTally::default();
    for segment in segments.iter().filter(|s| !s.is_vertical()) {
        let (first_y, last_y) = if segment.x1 <= segment.x2 {
            (segment.y1.round(), segment.y2.round())
        } else {
            (segment.y2.round(), segment.y1.round())
        };
        if last_y < first_y {
            tally.increasing += 1;
        } else if last_y > first_y {
            tally.decreasing += 1;
        } else {
            tally.flat += 1;
        }
    }
    tally
}

fn scatter_plot(gray: &GrayImage) -> ScatterPlotFeatures {
    let points = signals::point_locations(gray);
    ScatterPlotFeatures {
        point_count: points.len(),
        has_grid_lines: signals::has_grid_lines(gray),
        estimated_cluster_count: (points.len() > 10)
            .then(|| estimate_clusters(&points, CLUSTER_DISTANCE)),
    }
}

/// Connected groups of points under single-linkage at `distance`.
pub fn estimate_clusters(points: &[Blob], distance: f32) -> usize {
    let mut visited = vec![false; points.len()];
    let mut clusters = 0;
    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        clusters += 1;
        visited[start] = true;
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let here = points[current];
            for (other, seen) in visited.iter_mut().enumerate() {
                if !*seen && (points[other].x - here.x).hypot(points[other].y - here.y) < distance {
                    *seen = true;
                    stack.push(other);
                }
            }
        }
    }
    clusters
}

fn pie_chart(gray: &GrayImage) -> PieChartFeatures {
    PieChartFeatures {
        segment_count: pie_segment_count(gray),
        has_labels: text_regions(gray) > 2,
    }
}

/// Spokes passing close to the image centre, at least three; zero when the
/// image has no pie pattern at all.
pub fn pie_segment_count(gray: &GrayImage) -> usize {
    let edges = structure_edges(gray);
    if !signals::has_pie_segments(gray, &edges) {
        return 0;
    }
    let (width, height) = gray.dimensions();
    let (cx, cy) = ((width / 2) as f32, (height / 2) as f32);
    let tolerance = width.min(height) as f32 * PIE_CENTRE_TOLERANCE;
    let spokes = geometry::detect_segments(
        &edges,
        SegmentOptions {
            vote_threshold: 50,
            min_length: 20.0,
            max_gap: 10,
        },
    )
    .iter()
    .filter(|s| s.distance_to_point(cx, cy) < tolerance)
    .count();
    spokes.max(3)
}

/// Text-like blobs: inverse-Otsu ink closed with a 5×5 square, kept when the
/// bounding box is wider than 10 px, taller than 5 px, and not extremely
/// elongated.
pub fn text_regions(gray: &GrayImage) -> usize {
    let closed = close(&filters::otsu_binary_inv(gray), Norm::LInf, 2);
    geometry::external_contours(&closed)
        .iter()
        .filter(|contour| {
            let (_, _, w, h) = geometry::bounding_box(&contour.points);
            let aspect = w as f64 / h.max(1) as f64;
            aspect > 0.1 && aspect < 10.0 && w > 10 && h > 5
        })
        .count()
}

fn flow_chart(gray: &GrayImage) -> FlowChartFeatures {
    let box_sizes: Vec<f64> = signals::rectangles(gray)
        .iter()
        .map(|contour| geometry::polygon_area(&contour.points) as f64)
        .collect();
    // No arrow detector exists; arrow-derived fields stay absent.
    FlowChartFeatures {
        box_count: box_sizes.len(),
        arrow_count: 0,
        avg_box_size: mean(&box_sizes),
        varied_box_sizes: varied_sizes(&box_sizes),
        arrow_directions: None,
        flow_complexity: None,
    }
}

/// Whether the largest positive area is more than twice the smallest.
/// Degenerate (zero-area) outlines are ignored; `None` when none remain.
pub fn varied_sizes(areas: &[f64]) -> Option<bool> {
    let positive = || areas.iter().copied().filter(|&area| area > 0.0);
    let max = positive().reduce(f64::max)?;
    let min = positive().reduce(f64::min)?;
    Some(max / min > 2.0)
}

/// `1 + (vertical + diagonal) / max(1, arrows)`.
pub fn flow_complexity(directions: &ArrowDirections) -> f64 {
    let total = directions.horizontal + directions.vertical + directions.diagonal;
    1.0 + (directions.vertical + directions.diagonal) as f64 / total.max(1) as f64
}

fn network(gray: &GrayImage) -> NetworkFeatures {
    let node_count = signals::points(gray).len();
    let edge_count = signals::significant_lines(&structure_edges(gray)).len();
    NetworkFeatures {
        node_count,
        edge_count,
        node_edge_ratio: node_count as f64 / edge_count.max(1) as f64,
        complexity: network_complexity(node_count, edge_count),
    }
}

/// Edges per node: below 1 low, below 2 medium, otherwise high.
pub fn network_complexity(nodes: usize, edges: usize) -> NetworkComplexity {
    let per_node = edges as f64 / nodes.max(1) as f64;
    if per_node < 1.0 {
        NetworkComplexity::Low
    } else if per_node < 2.0 {
        NetworkComplexity::Medium
    } else {
        NetworkComplexity::High
    }
}

fn chemical(gray: &GrayImage) -> ChemicalFeatures {
    ChemicalFeatures {
        atom_count: signals::points(gray).len(),
        bond_count: signals::bond_segments(&structure_edges(gray)).len(),
        ring_count: ring_count(gray),
    }
}

/// Round foreground outlines: circularity in (0.6, 1.0), area above 100.
pub fn ring_count(gray: &GrayImage) -> usize {
    signals::foreground_contours(gray)
        .iter()
        .filter(|contour| {
            let circularity = geometry::circularity(&contour.points);
            circularity > 0.6
                && circularity < 1.0
                && geometry::polygon_area(&contour.points) > 100.0
        })
        .count()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
