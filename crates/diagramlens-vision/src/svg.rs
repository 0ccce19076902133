// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction from SVG markup.

use diagramlens_core::error::{DiagramLensError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, instrument};

/// Contents of every `<text>` element, nested `<tspan>` runs included.
///
/// Runs inside one `<text>` are joined with a space; separate `<text>`
/// elements are joined with a newline. Elements with no visible text are
/// skipped.
#[instrument(skip_all, fields(markup_len = markup.len()))]
pub fn extract_svg_text(markup: &str) -> Result<String> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut depth = 0usize;
    let mut runs: Vec<String> = Vec::new();
    let mut elements: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) if element.local_name().as_ref() == b"text" => {
                depth += 1;
            }
            Ok(Event::End(element)) if element.local_name().as_ref() == b"text" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let text = runs.join(" ");
                    runs.clear();
                    if !text.is_empty() {
                        elements.push(text);
                    }
                }
            }
            Ok(Event::Text(text)) if depth > 0 => {
                let run = text.unescape().map_err(|err| {
                    DiagramLensError::Markup(format!(
                        "bad text at byte {}: {}",
                        reader.buffer_position(),
                        err
                    ))
                })?;
                let run = run.trim();
                if !run.is_empty() {
                    runs.push(run.to_string());
                }
            }
            Ok(Event::CData(data)) if depth > 0 => {
                let run = String::from_utf8_lossy(&data).trim().to_string();
                if !run.is_empty() {
                    runs.push(run);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(DiagramLensError::Markup(format!(
                    "malformed SVG at byte {}: {}",
                    reader.buffer_position(),
                    err
                )));
            }
            _ => {}
        }
    }

    debug!(elements = elements.len(), "SVG text extracted");
    Ok(elements.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_text_elements_in_order() {
        let svg = r#"<?xml version="1.0"?>
            <svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
              <rect x="0" y="0" width="200" height="100" fill="white"/>
              <text x="10" y="20">Revenue</text>
              <g><text x="10" y="60">Q1 &amp; Q2</text></g>
            </svg>"#;
        assert_eq!(extract_svg_text(svg).unwrap(), "Revenue\nQ1 & Q2");
    }

    #[test]
    fn tspans_are_joined() {
        let svg = r#"<svg><text><tspan>x</tspan><tspan dy="5">= 2</tspan></text></svg>"#;
        assert_eq!(extract_svg_text(svg).unwrap(), "x = 2");
    }

    #[test]
    fn ignores_text_outside_text_elements() {
        let svg = r#"<svg><title>Chart</title><desc>ignored</desc><text/></svg>"#;
        assert_eq!(extract_svg_text(svg).unwrap(), "");
    }

    #[test]
    fn namespaced_elements() {
        let svg = r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"><svg:text>A</svg:text></svg:svg>"#;
        assert_eq!(extract_svg_text(svg).unwrap(), "A");
    }

    #[test]
    fn malformed_markup_is_an_error() {
        let err = extract_svg_text("<svg><text>open</svg>").unwrap_err();
        assert!(matches!(err, DiagramLensError::Markup(_)));
    }
}
