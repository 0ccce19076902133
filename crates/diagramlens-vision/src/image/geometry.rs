// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shape detectors over grayscale images: finite line segments, gradient-voted
// circles, dark blobs, and contour measurements.
//
// Line segments are recovered from `imageproc`'s polar Hough lines by walking
// each line across the edge map and cutting it where the gap between edge
// pixels grows too large. Circles and blobs have no `imageproc` counterpart and
// are implemented here.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use imageproc::point::Point;

use super::filters;

// -- Line segments -------------------------------------------------------------

/// A finite line segment in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        (self.x2 - self.x1).hypot(self.y2 - self.y1)
    }

    /// Absolute direction angle in degrees, in [0, 180].
    pub fn angle_degrees(&self) -> f32 {
        (self.y2 - self.y1).atan2(self.x2 - self.x1).to_degrees().abs()
    }

    /// Strictly between 80° and 100°.
    pub fn is_vertical(&self) -> bool {
        let angle = self.angle_degrees();
        angle > 80.0 && angle < 100.0
    }

    /// Below 10° or above 170°.
    pub fn is_horizontal(&self) -> bool {
        let angle = self.angle_degrees();
        !(10.0..=170.0).contains(&angle)
    }

    /// Perpendicular distance from `(x, y)` to the infinite line through the
    /// segment. Infinite for a degenerate segment.
    pub fn distance_to_point(&self, x: f32, y: f32) -> f32 {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        let norm = dx.hypot(dy);
        if norm == 0.0 {
            return f32::INFINITY;
        }
        (dy * x - dx * y + self.x2 * self.y1 - self.y2 * self.x1).abs() / norm
    }
}

/// Parameters for [`detect_segments`].
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Minimum Hough votes for a candidate line.
    pub vote_threshold: u32,
    /// Shortest segment kept, in pixels.
    pub min_length: f32,
    /// Largest run of missing edge pixels bridged within one segment.
    pub max_gap: u32,
}

/// Non-maximum suppression radius in the Hough accumulator.
const LINE_SUPPRESSION_RADIUS: u32 = 8;

/// Find finite line segments in a binary edge map.
pub fn detect_segments(edges: &GrayImage, options: SegmentOptions) -> Vec<LineSegment> {
    if edges.width() == 0 || edges.height() == 0 {
        return Vec::new();
    }
    let lines = detect_lines(
        edges,
        LineDetectionOptions {
            vote_threshold: options.vote_threshold,
            suppression_radius: LINE_SUPPRESSION_RADIUS,
        },
    );
    lines
        .iter()
        .flat_map(|line| trace_polar_line(edges, line, options))
        .collect()
}

/// Walk along `line` and split it into segments of supported edge pixels.
fn trace_polar_line(edges: &GrayImage, line: &PolarLine, options: SegmentOptions) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    let (sin, cos) = (line.angle_in_degrees as f32).to_radians().sin_cos();

    // Foot of the perpendicular from the origin, and the direction along the
    // line.
    let (ox, oy) = (line.r * cos, line.r * sin);
    let (dx, dy) = (-sin, cos);
    let reach = (width as f32).hypot(height as f32).ceil() as i32;

    let mut segments = Vec::new();
    let mut start: Option<(f32, f32)> = None;
    let mut last = (0.0f32, 0.0f32);
    let mut gap = 0u32;

    let close_run = |start: (f32, f32), end: (f32, f32), segments: &mut Vec<LineSegment>| {
        let segment = LineSegment {
            x1: start.0,
            y1: start.1,
            x2: end.0,
            y2: end.1,
        };
        if segment.length() >= options.min_length {
            segments.push(segment);
        }
    };

    for t in -reach..=reach {
        let x = ox + t as f32 * dx;
        let y = oy + t as f32 * dy;
        if edge_near(edges, x, y, cos, sin) {
            if start.is_none() {
                start = Some((x, y));
            }
            last = (x, y);
            gap = 0;
        } else if let Some(run_start) = start {
            gap += 1;
            if gap > options.max_gap {
                close_run(run_start, last, &mut segments);
                start = None;
            }
        }
    }
    if let Some(run_start) = start {
        close_run(run_start, last, &mut segments);
    }
    segments
}

/// Whether an edge pixel lies within one pixel of `(x, y)` across the line.
fn edge_near(edges: &GrayImage, x: f32, y: f32, nx: f32, ny: f32) -> bool {
    (-1i32..=1).any(|k| {
        let sx = (x + k as f32 * nx).round();
        let sy = (y + k as f32 * ny).round();
        sx >= 0.0
            && sy >= 0.0
            && (sx as u32) < edges.width()
            && (sy as u32) < edges.height()
            && edges.get_pixel(sx as u32, sy as u32).0[0] > 0
    })
}

// -- Circles -------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl Circle {
    pub fn distance_to(&self, other: &Circle) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Boundaries cross: `|r1 - r2| < d < r1 + r2`.
    pub fn overlaps(&self, other: &Circle) -> bool {
        let d = self.distance_to(other);
        d < self.radius + other.radius && d > (self.radius - other.radius).abs()
    }
}

/// Parameters for [`detect_circles`].
#[derive(Debug, Clone, Copy)]
pub struct CircleOptions {
    /// Minimum distance between accepted centres.
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Votes a centre needs in the accumulator.
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

/// Share of the circumference that must be backed by edge pixels.
const CIRCLE_MIN_SUPPORT: f32 = 0.35;
/// Centre candidates examined per image.
const MAX_CIRCLE_CANDIDATES: usize = 256;

/// Gradient Hough circle detection.
///
/// Each edge pixel votes for centres along its gradient direction (both ways)
/// at every radius in range. Local accumulator maxima above the threshold are
/// visited strongest first; each one gets the radius best supported by edge
/// pixels and is accepted if it is far enough from every accepted centre.
pub fn detect_circles(gray: &GrayImage, options: CircleOptions) -> Vec<Circle> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 || options.min_radius > options.max_radius {
        return Vec::new();
    }

    let edges = canny(gray, options.canny_high / 2.0, options.canny_high);
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let mut edge_points = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let dx = gx.get_pixel(x, y).0[0] as f32;
        let dy = gy.get_pixel(x, y).0[0] as f32;
        let magnitude = dx.hypot(dy);
        if magnitude > 0.0 {
            edge_points.push((x as f32, y as f32, dx / magnitude, dy / magnitude));
        }
    }
    if edge_points.is_empty() {
        return Vec::new();
    }

    let mut accumulator = vec![0u32; (width * height) as usize];
    for &(x, y, ux, uy) in &edge_points {
        for sign in [1.0f32, -1.0] {
            for r in options.min_radius..=options.max_radius {
                let cx = (x + sign * r as f32 * ux).round();
                let cy = (y + sign * r as f32 * uy).round();
                if cx < 0.0 || cy < 0.0 || cx >= width as f32 || cy >= height as f32 {
                    break;
                }
                accumulator[(cy as u32 * width + cx as u32) as usize] += 1;
            }
        }
    }

    let at = |x: u32, y: u32| accumulator[(y * width + x) as usize];
    let mut candidates = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let votes = at(x, y);
            if votes > options.accumulator_threshold
                && votes > at(x - 1, y)
                && votes >= at(x + 1, y)
                && votes > at(x, y - 1)
                && votes >= at(x, y + 1)
            {
                candidates.push((votes, y, x));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    candidates.truncate(MAX_CIRCLE_CANDIDATES);

    let mut circles: Vec<Circle> = Vec::new();
    for (_, cy, cx) in candidates {
        let (cx, cy) = (cx as f32, cy as f32);
        if circles
            .iter()
            .any(|c| (c.x - cx).hypot(c.y - cy) < options.min_dist)
        {
            continue;
        }
        if let Some(radius) = best_radius(&edge_points, cx, cy, options) {
            circles.push(Circle { x: cx, y: cy, radius });
        }
    }
    circles
}

/// Radius with the most edge pixels in a ±1 px band around `(cx, cy)`, if
/// that band holds enough of the circumference.
fn best_radius(
    edge_points: &[(f32, f32, f32, f32)],
    cx: f32,
    cy: f32,
    options: CircleOptions,
) -> Option<f32> {
    let max_r = options.max_radius as usize + 1;
    let mut histogram = vec![0u32; max_r + 2];
    for &(x, y, _, _) in edge_points {
        let distance = (x - cx).hypot(y - cy).round() as usize;
        if distance <= max_r {
            histogram[distance] += 1;
        }
    }

    let mut best: Option<(u32, u32)> = None;
    for r in options.min_radius.max(1)..=options.max_radius {
        let i = r as usize;
        let support = histogram[i - 1] + histogram[i] + histogram[i + 1];
        if best.is_none_or(|(_, s)| support > s) {
            best = Some((r, support));
        }
    }

    let (radius, support) = best?;
    let needed = (CIRCLE_MIN_SUPPORT * std::f32::consts::TAU * radius as f32)
        .max(options.accumulator_threshold as f32);
    (support as f32 >= needed).then_some(radius as f32)
}

// -- Blobs ---------------------------------------------------------------------

/// A detected dark blob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub x: f32,
    pub y: f32,
    pub area: f32,
}

/// Parameters for [`detect_blobs`].
#[derive(Debug, Clone, Copy)]
pub struct BlobOptions {
    pub min_threshold: u8,
    pub max_threshold: u8,
    pub threshold_step: u8,
    pub min_area: f32,
    pub max_area: f32,
    /// `None` disables the circularity filter.
    pub min_circularity: Option<f32>,
    /// Blob centres closer than this are the same blob.
    pub min_dist: f32,
    /// Threshold levels a blob must appear at.
    pub min_repeatability: usize,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            min_threshold: 10,
            max_threshold: 200,
            threshold_step: 10,
            min_area: 5.0,
            max_area: 500.0,
            min_circularity: Some(0.5),
            min_dist: 10.0,
            min_repeatability: 2,
        }
    }
}

/// Multi-threshold dark blob detection.
///
/// The image is binarised at every threshold in `[min, max)`; dark connected
/// regions passing the area and circularity filters at one level are grouped
/// with blobs from other levels by centre distance. Groups seen at enough
/// levels become blobs, located at the mean of their centres.
pub fn detect_blobs(gray: &GrayImage, options: BlobOptions) -> Vec<Blob> {
    // (sum_x, sum_y, sum_area, count, last_x, last_y)
    let mut groups: Vec<(f32, f32, f32, usize, f32, f32)> = Vec::new();
    let step = options.threshold_step.max(1) as usize;

    for threshold in (options.min_threshold as usize..options.max_threshold as usize).step_by(step) {
        let dark = filters::threshold_binary_inv(gray, threshold as u8 - 1);
        for blob in blobs_at_level(&dark, options) {
            match groups
                .iter_mut()
                .find(|g| (g.4 - blob.x).hypot(g.5 - blob.y) < options.min_dist)
            {
                Some(group) => {
                    group.0 += blob.x;
                    group.1 += blob.y;
                    group.2 += blob.area;
                    group.3 += 1;
                    group.4 = blob.x;
                    group.5 = blob.y;
                }
                None => groups.push((blob.x, blob.y, blob.area, 1, blob.x, blob.y)),
            }
        }
    }

    groups
        .into_iter()
        .filter(|g| g.3 >= options.min_repeatability)
        .map(|(sx, sy, sa, n, _, _)| Blob {
            x: sx / n as f32,
            y: sy / n as f32,
            area: sa / n as f32,
        })
        .collect()
}

/// Blobs among the outer contours of one binarised level.
fn blobs_at_level(dark: &GrayImage, options: BlobOptions) -> Vec<Blob> {
    find_contours::<i32>(dark)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|contour| {
            let area = polygon_area(&contour.points);
            if area < options.min_area || area >= options.max_area {
                return None;
            }
            if let Some(min_circularity) = options.min_circularity {
                if circularity(&contour.points) < min_circularity {
                    return None;
                }
            }
            let (x, y) = centroid(&contour.points);
            let (px, py) = (x.round() as u32, y.round() as u32);
            let dark_centre = px < dark.width()
                && py < dark.height()
                && dark.get_pixel(px, py).0[0] > 0;
            dark_centre.then_some(Blob { x, y, area })
        })
        .collect()
}

// -- Contours ------------------------------------------------------------------

/// Outermost contours of the non-zero regions of a binary image.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// Area of a closed polygon via the shoelace formula.
pub fn polygon_area(points: &[Point<i32>]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    (area.abs() / 2.0) as f32
}

/// Closed perimeter length.
pub fn perimeter(points: &[Point<i32>]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    arc_length(points, true) as f32
}

/// `4πA / P²`; 0 for degenerate contours.
pub fn circularity(points: &[Point<i32>]) -> f32 {
    let p = perimeter(points);
    if p <= 0.0 {
        return 0.0;
    }
    4.0 * std::f32::consts::PI * polygon_area(points) / (p * p)
}

/// Vertex count after Douglas-Peucker simplification with a tolerance of 4 %
/// of the perimeter.
pub fn approx_vertex_count(points: &[Point<i32>]) -> usize {
    if points.len() < 3 {
        return points.len();
    }
    let epsilon = 0.04 * perimeter(points) as f64;
    let mut approx = approximate_polygon_dp(points, epsilon, true);
    if approx.len() > 1 && approx.first() == approx.last() {
        approx.pop();
    }
    approx.len()
}

/// Axis-aligned bounding box as `(x, y, width, height)`.
pub fn bounding_box(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
    let Some(first) = points.first() else {
        return (0, 0, 0, 0);
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

fn centroid(points: &[Point<i32>]) -> (f32, f32) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let n = points.len() as f64;
    ((sx / n) as f32, (sy / n) as f32)
}

/// Fraction of Canny edge pixels.
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f64 {
    filters::foreground_fraction(&canny(gray, low, high))
}
