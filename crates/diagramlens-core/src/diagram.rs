// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagram classification and feature types.

use serde::{Deserialize, Serialize};

/// The closed set of diagram types.
///
/// Declaration order matters: it is the tie-break order when two types score
/// the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    BarChart,
    LineGraph,
    ScatterPlot,
    PieChart,
    FlowChart,
    NetworkDiagram,
    VennDiagram,
    ChemicalStructure,
    Unknown,
}

impl DiagramType {
    /// Every type, in declaration (tie-break) order.
    pub const ALL: [DiagramType; 9] = [
        DiagramType::BarChart,
        DiagramType::LineGraph,
        DiagramType::ScatterPlot,
        DiagramType::PieChart,
        DiagramType::FlowChart,
        DiagramType::NetworkDiagram,
        DiagramType::VennDiagram,
        DiagramType::ChemicalStructure,
        DiagramType::Unknown,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BarChart => "bar_chart",
            Self::LineGraph => "line_graph",
            Self::ScatterPlot => "scatter_plot",
            Self::PieChart => "pie_chart",
            Self::FlowChart => "flow_chart",
            Self::NetworkDiagram => "network_diagram",
            Self::VennDiagram => "venn_diagram",
            Self::ChemicalStructure => "chemical_structure",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DiagramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw geometric signals extracted from the grayscale image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSignals {
    pub vertical_bars: usize,
    pub horizontal_bars: usize,
    pub lines: usize,
    pub points: usize,
    pub circles: usize,
    /// Arrow detection is not implemented; always 0.
    pub arrows: usize,
    pub boxes: usize,
    pub network_pattern: bool,
    pub pie_segments: bool,
    pub overlapping_circles: bool,
    pub chemical_bonds: bool,
}

/// Score computed by one classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeScore {
    pub diagram_type: DiagramType,
    pub score: f64,
}

/// Result of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramClassification {
    pub diagram_type: DiagramType,
    /// Score of the winning rule; heuristic scale, not calibrated.
    pub confidence: f64,
    /// Every rule's score, in declaration order.
    pub scores: Vec<TypeScore>,
    /// Signals the scores were computed from (absent on failure).
    pub signals: Option<DiagramSignals>,
}

impl DiagramClassification {
    /// Result used when classification could not run.
    pub fn unknown() -> Self {
        Self {
            diagram_type: DiagramType::Unknown,
            confidence: 0.0,
            scores: Vec::new(),
            signals: None,
        }
    }
}

// -- Features ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Color,
    Grayscale,
}

/// Type-independent features, computed for every raster image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralFeatures {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub color_mode: ColorMode,
    /// Hue/saturation histogram bins above the 0.01 threshold.
    pub color_count: usize,
    pub is_colorful: bool,
    pub has_light_background: bool,
    pub edge_density: f64,
    /// Fraction of inverse-Otsu foreground pixels (rough text proxy).
    pub estimated_text_area: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarOrientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChartFeatures {
    pub orientation: BarOrientation,
    pub bar_count: usize,
    /// Bar extent along the dominant axis (height for vertical bars, width for
    /// horizontal ones), measured from rectangular contours. `None` when no
    /// bar outline could be measured.
    pub min_bar_size: Option<f64>,
    pub max_bar_size: Option<f64>,
    pub avg_bar_size: Option<f64>,
    pub has_grid_lines: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendTally {
    pub increasing: usize,
    pub decreasing: usize,
    pub flat: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGraphFeatures {
    pub line_count: usize,
    pub has_markers: bool,
    pub has_grid_lines: bool,
    pub trends: TrendTally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlotFeatures {
    pub point_count: usize,
    pub has_grid_lines: bool,
    /// Only estimated when more than ten points were found.
    pub estimated_cluster_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieChartFeatures {
    pub segment_count: usize,
    pub has_labels: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowDirections {
    pub horizontal: usize,
    pub vertical: usize,
    pub diagonal: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowChartFeatures {
    pub box_count: usize,
    pub arrow_count: usize,
    pub avg_box_size: Option<f64>,
    pub varied_box_sizes: Option<bool>,
    /// Only present when arrows were detected.
    pub arrow_directions: Option<ArrowDirections>,
    pub flow_complexity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkComplexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFeatures {
    pub node_count: usize,
    pub edge_count: usize,
    pub node_edge_ratio: f64,
    pub complexity: NetworkComplexity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalFeatures {
    pub atom_count: usize,
    pub bond_count: usize,
    pub ring_count: usize,
}

/// Features specific to the classified diagram type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecificFeatures {
    BarChart(BarChartFeatures),
    LineGraph(LineGraphFeatures),
    ScatterPlot(ScatterPlotFeatures),
    PieChart(PieChartFeatures),
    FlowChart(FlowChartFeatures),
    NetworkDiagram(NetworkFeatures),
    ChemicalStructure(ChemicalFeatures),
    /// Venn diagrams, unknown images, and failures.
    None,
}

/// General plus type-specific features of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramFeatures {
    pub general: Option<GeneralFeatures>,
    /// Set when extraction failed; `general` is then `None`.
    pub error: Option<String>,
    pub specific: SpecificFeatures,
}

impl DiagramFeatures {
    /// No features (vector input or disabled classification).
    pub fn empty() -> Self {
        Self {
            general: None,
            error: None,
            specific: SpecificFeatures::None,
        }
    }

    /// Collapsed result after a failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            general: None,
            error: Some(message.into()),
            specific: SpecificFeatures::None,
        }
    }
}

/// Classification plus features, as stored in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramAnalysis {
    pub classification: DiagramClassification,
    pub features: DiagramFeatures,
}

impl DiagramAnalysis {
    /// `(Unknown, 0.0)` with no features.
    pub fn skipped() -> Self {
        Self {
            classification: DiagramClassification::unknown(),
            features: DiagramFeatures::empty(),
        }
    }

    /// `(Unknown, 0.0, {error}, {})`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            classification: DiagramClassification::unknown(),
            features: DiagramFeatures::failed(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_is_tie_break_order() {
        let mut sorted = DiagramType::ALL;
        sorted.sort();
        assert_eq!(sorted, DiagramType::ALL);
        assert_eq!(DiagramType::ALL[0], DiagramType::BarChart);
        assert_eq!(DiagramType::ALL[8], DiagramType::Unknown);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&DiagramType::ChemicalStructure).unwrap();
        assert_eq!(json, "\"chemical_structure\"");
        assert_eq!(DiagramType::VennDiagram.to_string(), "venn_diagram");
    }

    #[test]
    fn failed_analysis_shape() {
        let failed = DiagramAnalysis::failed("boom");
        assert_eq!(failed.classification.diagram_type, DiagramType::Unknown);
        assert_eq!(failed.classification.confidence, 0.0);
        assert_eq!(failed.features.error.as_deref(), Some("boom"));
        assert!(failed.features.general.is_none());
        assert_eq!(failed.features.specific, SpecificFeatures::None);
    }

    #[test]
    fn specific_features_are_tagged() {
        let specific = SpecificFeatures::PieChart(PieChartFeatures {
            segment_count: 4,
            has_labels: true,
        });
        let value = serde_json::to_value(&specific).unwrap();
        assert_eq!(value["kind"], "pie_chart");
        assert_eq!(value["segment_count"], 4);
    }
}
