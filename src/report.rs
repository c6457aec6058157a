//! PDF report of the profile, latest readings and an optional AI summary,
//! plus plain-text chat log export.
//!
//! `report_blocks` fixes the section order; `render_pdf` only lays blocks out
//! on A4 pages via `printpdf`. Neither touches session state.

use std::io::BufWriter;

use printpdf::*;
use thiserror::Error;

use crate::models::{MetricEntry, MetricKind, Profile};
use crate::pipeline::history::ConversationHistory;

pub const REPORT_TITLE: &str = "Health Report Summary";
pub const REPORT_FOOTER: &str = "Generated by CarePilot. Not a substitute for professional medical advice.";
pub const NOT_AVAILABLE: &str = "N/A";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const TOP_MM: f32 = 280.0;
const BOTTOM_MM: f32 = 25.0;
const FOOTER_MM: f32 = 12.0;
const LEFT_MM: f32 = 20.0;
const WRAP_CHARS: usize = 85;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

/// Typed layout block handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBlock {
    Heading(String),
    Section(String),
    KeyValue(String, String),
    Paragraph(String),
    Footer(String),
}

/// Ordered blocks: title, profile fields (empty ones skipped), latest value
/// of each metric ("N/A" if absent), optional summary, footer.
pub fn report_blocks(
    profile: Option<&Profile>,
    latest: &[(MetricKind, Option<&MetricEntry>)],
    summary: Option<&str>,
) -> Vec<ReportBlock> {
    let mut blocks = vec![ReportBlock::Heading(REPORT_TITLE.to_string())];

    blocks.push(ReportBlock::Section("Patient Profile".to_string()));
    match profile {
        Some(profile) => {
            for (label, value) in profile.display_fields() {
                if !value.trim().is_empty() {
                    blocks.push(ReportBlock::KeyValue(label.to_string(), value));
                }
            }
        }
        None => blocks.push(ReportBlock::Paragraph("No profile saved.".to_string())),
    }

    blocks.push(ReportBlock::Section("Latest Metrics".to_string()));
    for (kind, entry) in latest {
        let value = entry
            .map(|e| e.reading())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        blocks.push(ReportBlock::KeyValue(kind.label().to_string(), value));
    }

    if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
        blocks.push(ReportBlock::Section("AI Report Summary".to_string()));
        for line in summary.lines().map(str::trim).filter(|l| !l.is_empty()) {
            blocks.push(ReportBlock::Paragraph(line.to_string()));
        }
    }

    blocks.push(ReportBlock::Footer(REPORT_FOOTER.to_string()));
    blocks
}

/// Build the report blocks and render them to PDF bytes.
pub fn render(
    profile: Option<&Profile>,
    latest: &[(MetricKind, Option<&MetricEntry>)],
    summary: Option<&str>,
) -> Result<Vec<u8>, ReportError> {
    render_pdf(&report_blocks(profile, latest, summary))
}

/// Lay out blocks on A4 pages. Long text wraps; pages are added as needed.
pub fn render_pdf(blocks: &[ReportBlock]) -> Result<Vec<u8>, ReportError> {
    let (doc, page1, layer1) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::ExportFailed(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::ExportFailed(format!("PDF font error: {e}")))?;
    let italic = doc
        .add_builtin_font(BuiltinFont::HelveticaOblique)
        .map_err(|e| ReportError::ExportFailed(format!("PDF font error: {e}")))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = TOP_MM;
    let mut pages = 1;

    for block in blocks {
        let (lines, size, indent, face, gap_before, line_height) = match block {
            ReportBlock::Heading(text) => (vec![text.clone()], 16.0, 0.0, &bold, 0.0, 10.0),
            ReportBlock::Section(text) => (vec![text.clone()], 12.0, 0.0, &bold, 6.0, 7.0),
            ReportBlock::KeyValue(key, value) => (
                wrap_text(&format!("{key}: {value}"), WRAP_CHARS),
                10.0,
                5.0,
                &font,
                0.0,
                5.0,
            ),
            ReportBlock::Paragraph(text) => {
                (wrap_text(text, WRAP_CHARS), 10.0, 5.0, &font, 0.0, 5.0)
            }
            ReportBlock::Footer(text) => {
                layer.use_text(text.as_str(), 8.0, Mm(LEFT_MM), Mm(FOOTER_MM), &italic);
                continue;
            }
        };

        y -= gap_before;
        for line in lines {
            if y < BOTTOM_MM {
                let (page, page_layer) = doc.add_page(
                    Mm(PAGE_WIDTH_MM),
                    Mm(PAGE_HEIGHT_MM),
                    format!("Layer {}", pages + 1),
                );
                layer = doc.get_page(page).get_layer(page_layer);
                pages += 1;
                y = TOP_MM;
            }
            layer.use_text(line, size, Mm(LEFT_MM + indent), Mm(y), face);
            y -= line_height;
        }
    }

    tracing::debug!(pages, blocks = blocks.len(), "Rendered report PDF");

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::ExportFailed(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::ExportFailed(format!("PDF buffer error: {e}")))
}

/// Plain-text transcript of the chat for download.
pub fn export_chat_log(history: &ConversationHistory) -> String {
    history.transcript()
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
