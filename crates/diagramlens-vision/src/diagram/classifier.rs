// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rule-based diagram type classification.

use diagramlens_core::diagram::{DiagramClassification, DiagramSignals, DiagramType, TypeScore};
use diagramlens_core::error::Result;
use tracing::{info, instrument, warn};

use super::signals::extract_signals;
use crate::guard::guarded;
use crate::image::DecodedImage;

/// One candidate type: when it applies and what it scores.
struct Rule {
    diagram_type: DiagramType,
    applies: fn(&DiagramSignals) -> bool,
    score: fn(&DiagramSignals) -> f64,
}

/// Every rule, in declaration (tie-break) order.
const RULES: [Rule; 9] = [
    Rule {
        diagram_type: DiagramType::BarChart,
        applies: |s| s.vertical_bars > 3 || s.horizontal_bars > 3,
        score: |s| 0.6 + s.vertical_bars.min(s.horizontal_bars) as f64 * 0.02,
    },
    Rule {
        diagram_type: DiagramType::LineGraph,
        applies: |s| s.lines > 2 && s.points > 0,
        score: |s| 0.5 + (s.lines as f64 * 0.1).min(0.4),
    },
    Rule {
        diagram_type: DiagramType::ScatterPlot,
        applies: |s| s.points > 15 && s.lines == 0,
        score: |s| 0.5 + (s.points as f64 * 0.005).min(0.4),
    },
    Rule {
        diagram_type: DiagramType::PieChart,
        applies: |s| s.circles > 0 && s.pie_segments,
        score: |s| 0.7 + (s.circles as f64 * 0.1).min(0.2),
    },
    Rule {
        diagram_type: DiagramType::FlowChart,
        applies: |s| s.boxes > 3 && s.arrows > 2,
        score: |s| 0.6 + ((s.boxes + s.arrows) as f64 * 0.02).min(0.3),
    },
    Rule {
        diagram_type: DiagramType::NetworkDiagram,
        applies: |s| s.network_pattern && s.points > 5,
        score: |_| 0.7,
    },
    Rule {
        diagram_type: DiagramType::VennDiagram,
        applies: |s| (2..=5).contains(&s.circles) && s.overlapping_circles,
        score: |_| 0.8,
    },
    Rule {
        diagram_type: DiagramType::ChemicalStructure,
        applies: |s| s.chemical_bonds && s.points > 3,
        score: |_| 0.75,
    },
    Rule {
        diagram_type: DiagramType::Unknown,
        applies: |_| true,
        score: |_| 0.2,
    },
];

/// Score every rule against `signals` and pick the winner.
///
/// Rules whose condition does not hold score 0. The highest score wins; on a
/// tie the rule declared first is kept. `Unknown` always scores 0.2, so it wins
/// whenever nothing else clears that.
pub fn classify_signals(signals: &DiagramSignals) -> DiagramClassification {
    let scores: Vec<TypeScore> = RULES
        .iter()
        .map(|rule| TypeScore {
            diagram_type: rule.diagram_type,
            score: if (rule.applies)(signals) {
                (rule.score)(signals)
            } else {
                0.0
            },
        })
        .collect();

    let winner = scores
        .iter()
        .fold(None::<&TypeScore>, |best, candidate| match best {
            Some(current) if candidate.score <= current.score => Some(current),
            _ => Some(candidate),
        })
        .copied()
        .unwrap_or(TypeScore {
            diagram_type: DiagramType::Unknown,
            score: 0.2,
        });

    DiagramClassification {
        diagram_type: winner.diagram_type,
        confidence: winner.score,
        scores,
        signals: Some(*signals),
    }
}

/// Classify a decoded image. Never fails: any internal error yields
/// `(Unknown, 0.0)`.
pub fn classify_diagram(image: &DecodedImage) -> DiagramClassification {
    try_classify_diagram(image).unwrap_or_else(|err| {
        warn!(error = %err, "Diagram classification failed; reporting unknown");
        DiagramClassification::unknown()
    })
}

/// Like [`classify_diagram`] but reports the failure.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn try_classify_diagram(image: &DecodedImage) -> Result<DiagramClassification> {
    guarded("diagram classification", || {
        let classification = classify_signals(&extract_signals(image.gray()));
        info!(
            diagram_type = %classification.diagram_type,
            confidence = classification.confidence,
            "Diagram classified"
        );
        Ok(classification)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use imageproc::drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
    };
    use imageproc::rect::Rect;

    use crate::diagram::features::pie_segment_count;

    fn classify(signals: DiagramSignals) -> (DiagramType, f64) {
        let result = classify_signals(&signals);
        (result.diagram_type, result.confidence)
    }

    fn white(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    /// Three-pixel ring centred on a 300x300 canvas with five spokes.
    fn pie(radius: i32) -> GrayImage {
        let mut gray = white(300, 300);
        for r in radius - 1..=radius + 1 {
            draw_hollow_circle_mut(&mut gray, (150, 150), r, Luma([0]));
        }
        for k in 0..5 {
            let angle = (9.0 + 72.0 * k as f32).to_radians();
            let rim = (
                150.0 + radius as f32 * angle.cos(),
                150.0 + radius as f32 * angle.sin(),
            );
            draw_line_segment_mut(&mut gray, (150.0, 150.0), rim, Luma([0]));
        }
        gray
    }

    #[test]
    fn no_signals_is_unknown() {
        assert_eq!(classify(DiagramSignals::default()), (DiagramType::Unknown, 0.2));
    }

    #[test]
    fn bar_rule() {
        let (kind, confidence) = classify(DiagramSignals {
            vertical_bars: 5,
            horizontal_bars: 2,
            ..Default::default()
        });
        assert_eq!(kind, DiagramType::BarChart);
        assert!((confidence - 0.64).abs() < 1e-9);
    }

    #[test]
    fn scatter_rule_needs_no_lines() {
        let scatter = DiagramSignals {
            points: 20,
            ..Default::default()
        };
        let (kind, confidence) = classify(scatter);
        assert_eq!(kind, DiagramType::ScatterPlot);
        assert!((confidence - 0.6).abs() < 1e-9);

        let with_lines = DiagramSignals { lines: 1, ..scatter };
        assert_eq!(classify(with_lines).0, DiagramType::Unknown);
    }

    #[test]
    fn capped_scores() {
        let (kind, confidence) = classify(DiagramSignals {
            lines: 12,
            points: 1,
            ..Default::default()
        });
        assert_eq!(kind, DiagramType::LineGraph);
        assert!((confidence - 0.9).abs() < 1e-9);

        let (kind, confidence) = classify(DiagramSignals {
            points: 500,
            ..Default::default()
        });
        assert_eq!(kind, DiagramType::ScatterPlot);
        assert!((confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn highest_score_wins() {
        // Pie (0.7 + 0.2) beats Venn (0.8).
        let signals = DiagramSignals {
            circles: 3,
            pie_segments: true,
            overlapping_circles: true,
            ..Default::default()
        };
        let (kind, confidence) = classify(signals);
        assert_eq!(kind, DiagramType::PieChart);
        assert!((confidence - 0.9).abs() < 1e-9);

        let signals = DiagramSignals { circles: 1, ..signals };
        assert_eq!(classify(signals).0, DiagramType::PieChart);
    }

    #[test]
    fn ties_follow_declaration_order() {
        // Bar chart 0.6 + 0.1 = 0.7 ties with the network rule.
        let signals = DiagramSignals {
            vertical_bars: 5,
            horizontal_bars: 5,
            points: 6,
            lines: 7,
            network_pattern: true,
            ..Default::default()
        };
        let result = classify_signals(&signals);
        assert_eq!(result.diagram_type, DiagramType::BarChart);
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn flow_chart_needs_arrows() {
        let signals = DiagramSignals {
            boxes: 6,
            ..Default::default()
        };
        assert_eq!(classify(signals).0, DiagramType::Unknown);
        let signals = DiagramSignals { arrows: 3, ..signals };
        let (kind, confidence) = classify(signals);
        assert_eq!(kind, DiagramType::FlowChart);
        assert!((confidence - 0.78).abs() < 1e-9);
    }

    #[test]
    fn score_table_is_complete() {
        let result = classify_signals(&DiagramSignals::default());
        let kinds: Vec<_> = result.scores.iter().map(|s| s.diagram_type).collect();
        assert_eq!(kinds, DiagramType::ALL);
        assert!(result.signals.is_some());
    }

    #[test]
    fn classifies_a_drawn_bar_chart() {
        let mut gray = white(400, 300);
        for i in 0..4 {
            draw_filled_rect_mut(
                &mut gray,
                Rect::at(40 + i * 90, 50).of_size(40, 200),
                Luma([0]),
            );
        }
        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        let result = classify_diagram(&image);
        assert_eq!(result.diagram_type, DiagramType::BarChart);
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn classifies_a_drawn_venn_diagram() {
        let mut gray = white(400, 300);
        for centre in [(150, 150), (230, 150)] {
            for r in 59..=61 {
                draw_hollow_circle_mut(&mut gray, centre, r, Luma([0]));
            }
        }
        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        let result = classify_diagram(&image);
        assert_eq!(result.diagram_type, DiagramType::VennDiagram);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn classifies_a_drawn_scatter_plot() {
        let mut gray = white(400, 300);
        let dots = [
            (31, 42), (77, 25), (140, 61), (212, 33), (268, 78),
            (344, 29), (52, 118), (119, 137), (183, 104), (247, 151),
            (322, 122), (371, 176), (38, 204), (96, 231), (161, 196),
            (229, 254), (290, 214), (356, 262), (71, 272), (195, 281),
        ];
        for (x, y) in dots {
            draw_filled_circle_mut(&mut gray, (x, y), 4, Luma([0]));
        }
        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        let result = classify_diagram(&image);
        assert_eq!(result.diagram_type, DiagramType::ScatterPlot);
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn classifies_a_drawn_pie_chart() {
        let gray = pie(80);
        assert!(pie_segment_count(&gray) >= 3);

        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        let result = classify_diagram(&image);
        assert_eq!(result.diagram_type, DiagramType::PieChart);
        assert!(result.confidence >= 0.8);
    }

    #[test]
    fn pie_beyond_the_circle_radius_cap_is_unknown() {
        // `circles` stops at radius 100 while the pie detector reaches 200, so
        // a larger pie keeps its segment pattern but fails the pie rule.
        let gray = pie(120);
        let signals = extract_signals(&gray);
        assert!(signals.pie_segments);
        assert_eq!(signals.circles, 0);
        assert!(pie_segment_count(&gray) >= 3);

        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        assert_eq!(classify_diagram(&image).diagram_type, DiagramType::Unknown);
    }

    #[test]
    fn classifies_a_drawn_line_graph_with_separate_markers() {
        let mut gray = white(400, 300);
        let trace = [(30.0, 250.0), (150.0, 80.0), (260.0, 200.0), (380.0, 40.0)];
        for pair in trace.windows(2) {
            let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
            draw_line_segment_mut(&mut gray, (x1, y1), (x2, y2), Luma([0]));
            draw_line_segment_mut(&mut gray, (x1, y1 + 1.0), (x2, y2 + 1.0), Luma([0]));
        }
        // Markers that touch the strokes merge into one outline and vanish.
        for centre in [(60, 60), (200, 40), (330, 260), (100, 280)] {
            draw_filled_circle_mut(&mut gray, centre, 4, Luma([0]));
        }
        let signals = extract_signals(&gray);
        assert_eq!(signals.points, 4);
        assert!(signals.lines > 2);

        let image = DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        assert_eq!(classify_diagram(&image).diagram_type, DiagramType::LineGraph);
    }
}
