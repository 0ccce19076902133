// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric signal detectors feeding the diagram classifier and the feature
// extractor.

use diagramlens_core::diagram::{BarOrientation, DiagramSignals};
use image::GrayImage;
use imageproc::contours::Contour;
use imageproc::edges::canny;
use tracing::{debug, instrument};

use crate::image::filters;
use crate::image::geometry::{
    self, Blob, BlobOptions, Circle, CircleOptions, LineSegment, SegmentOptions,
};

/// Canny thresholds of the structural edge map.
const STRUCTURE_CANNY: (f32, f32) = (50.0, 150.0);

/// Canny thresholds used when looking for grid lines.
const GRID_CANNY: (f32, f32) = (30.0, 100.0);

/// Edge map shared by the bar, line, pie and bond detectors.
pub fn structure_edges(gray: &GrayImage) -> GrayImage {
    canny(gray, STRUCTURE_CANNY.0, STRUCTURE_CANNY.1)
}

/// Compute every classifier signal from a grayscale image.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn extract_signals(gray: &GrayImage) -> DiagramSignals {
    let edges = structure_edges(gray);
    let points = points(gray).len();
    let lines = significant_lines(&edges).len();

    let signals = DiagramSignals {
        vertical_bars: bar_count(&edges, BarOrientation::Vertical),
        horizontal_bars: bar_count(&edges, BarOrientation::Horizontal),
        lines,
        points,
        circles: circles(gray).len(),
        arrows: 0,
        boxes: rectangles(gray).len(),
        network_pattern: points > 3 && lines > points,
        pie_segments: has_pie_segments(gray, &edges),
        overlapping_circles: has_overlapping_circles(gray),
        chemical_bonds: points >= 3 && bond_segments(&edges).len() > points,
    };
    debug!(?signals, "Diagram signals extracted");
    signals
}

/// Bars along one axis: long edges in that direction, two per bar.
pub fn bar_count(edges: &GrayImage, orientation: BarOrientation) -> usize {
    bar_edges(edges, orientation).len() / 2
}

fn bar_edges(edges: &GrayImage, orientation: BarOrientation) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    let (min_length, keep): (u32, fn(&LineSegment) -> bool) = match orientation {
        BarOrientation::Vertical => (height / 3, LineSegment::is_vertical),
        BarOrientation::Horizontal => (width / 3, LineSegment::is_horizontal),
    };
    geometry::detect_segments(
        edges,
        SegmentOptions {
            vote_threshold: 100,
            min_length: min_length as f32,
            max_gap: 20,
        },
    )
    .into_iter()
    .filter(|segment| keep(segment))
    .collect()
}

/// Segments longer than a tenth of the larger image dimension.
pub fn significant_lines(edges: &GrayImage) -> Vec<LineSegment> {
    let longest_side = edges.width().max(edges.height());
    let min_length = (longest_side / 10) as f32;
    geometry::detect_segments(
        edges,
        SegmentOptions {
            vote_threshold: 80,
            min_length: (longest_side / 5) as f32,
            max_gap: 20,
        },
    )
    .into_iter()
    .filter(|segment| segment.length() > min_length)
    .collect()
}

/// Round dark markers.
pub fn points(gray: &GrayImage) -> Vec<Blob> {
    geometry::detect_blobs(gray, BlobOptions::default())
}

/// Dark regions of marker size regardless of shape.
pub fn point_locations(gray: &GrayImage) -> Vec<Blob> {
    geometry::detect_blobs(
        gray,
        BlobOptions {
            min_circularity: None,
            ..BlobOptions::default()
        },
    )
}

pub fn circles(gray: &GrayImage) -> Vec<Circle> {
    geometry::detect_circles(
        gray,
        CircleOptions {
            min_dist: 20.0,
            canny_high: 50.0,
            accumulator_threshold: 30,
            min_radius: 10,
            max_radius: 100,
        },
    )
}

/// Outer contours of the inverse-Otsu foreground.
pub fn foreground_contours(gray: &GrayImage) -> Vec<Contour<i32>> {
    geometry::external_contours(&filters::otsu_binary_inv(gray))
}

/// Foreground outlines that simplify to four vertices.
pub fn rectangles(gray: &GrayImage) -> Vec<Contour<i32>> {
    foreground_contours(gray)
        .into_iter()
        .filter(|contour| geometry::approx_vertex_count(&contour.points) == 4)
        .collect()
}

/// Whether at least three segments run through the centre of the largest
/// circle.
pub fn has_pie_segments(gray: &GrayImage, edges: &GrayImage) -> bool {
    let largest = geometry::detect_circles(
        gray,
        CircleOptions {
            min_dist: 50.0,
            canny_high: 50.0,
            accumulator_threshold: 30,
            min_radius: 30,
            max_radius: 200,
        },
    )
    .into_iter()
    .max_by(|a, b| a.radius.total_cmp(&b.radius));
    let Some(pie) = largest else {
        return false;
    };

    let spokes = geometry::detect_segments(
        edges,
        SegmentOptions {
            vote_threshold: 50,
            min_length: pie.radius * 0.5,
            max_gap: 10,
        },
    );
    spokes
        .iter()
        .filter(|s| s.distance_to_point(pie.x, pie.y) < pie.radius * 0.2)
        .count()
        >= 3
}

/// Whether some pair of circles crosses.
pub fn has_overlapping_circles(gray: &GrayImage) -> bool {
    let circles = geometry::detect_circles(
        gray,
        CircleOptions {
            min_dist: 20.0,
            canny_high: 50.0,
            accumulator_threshold: 30,
            min_radius: 20,
            max_radius: 150,
        },
    );
    circles
        .iter()
        .enumerate()
        .any(|(i, a)| circles[i + 1..].iter().any(|b| a.overlaps(b)))
}

/// Short straight strokes, 10 to 50 px long.
pub fn bond_segments(edges: &GrayImage) -> Vec<LineSegment> {
    geometry::detect_segments(
        edges,
        SegmentOptions {
            vote_threshold: 50,
            min_length: 10.0,
            max_gap: 5,
        },
    )
    .into_iter()
    .filter(|s| s.length() > 10.0 && s.length() < 50.0)
    .collect()
}

/// At least three horizontal and three vertical long lines.
pub fn has_grid_lines(gray: &GrayImage) -> bool {
    let edges = canny(gray, GRID_CANNY.0, GRID_CANNY.1);
    let segments = geometry::detect_segments(
        &edges,
        SegmentOptions {
            vote_threshold: 50,
            min_length: (gray.width() / 4) as f32,
            max_gap: 10,
        },
    );
    let horizontal = segments.iter().filter(|s| s.is_horizontal()).count();
    let vertical = segments.iter().filter(|s| s.is_vertical()).count();
    horizontal >= 3 && vertical >= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
    use imageproc::rect::Rect;

    fn white(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    #[test]
    fn blank_image_has_no_signals() {
        let signals = extract_signals(&white(200, 150));
        assert_eq!(signals, DiagramSignals::default());
    }

    #[test]
    fn tall_bars_count_as_vertical_bars() {
        let mut gray = white(400, 300);
        for i in 0..4 {
            draw_filled_rect_mut(
                &mut gray,
                Rect::at(40 + i * 90, 50).of_size(40, 200),
                Luma([0]),
            );
        }
        let edges = structure_edges(&gray);
        assert_eq!(bar_count(&edges, BarOrientation::Vertical), 4);
        assert_eq!(bar_count(&edges, BarOrientation::Horizontal), 0);
        assert_eq!(rectangles(&gray).len(), 4);
    }

    #[test]
    fn grid_needs_both_directions() {
        let mut gray = white(300, 300);
        for i in 0..4 {
            let y = 40.0 + i as f32 * 70.0;
            draw_line_segment_mut(&mut gray, (20.0, y), (280.0, y), Luma([0]));
        }
        assert!(!has_grid_lines(&gray));

        for i in 0..4 {
            let x = 40.0 + i as f32 * 70.0;
            draw_line_segment_mut(&mut gray, (x, 20.0), (x, 280.0), Luma([0]));
        }
        assert!(has_grid_lines(&gray));
    }

    #[test]
    fn dots_are_points_but_not_bonds() {
        let mut gray = white(300, 200);
        for &(x, y) in &[(40, 40), (120, 60), (200, 40), (80, 140), (220, 150)] {
            draw_filled_circle_mut(&mut gray, (x, y), 4, Luma([0]));
        }
        assert_eq!(points(&gray).len(), 5);
        assert_eq!(point_locations(&gray).len(), 5);
        assert!(bond_segments(&structure_edges(&gray)).is_empty());
    }
}
