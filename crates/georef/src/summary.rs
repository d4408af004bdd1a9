//! Human-readable rendering of a georeference document.

use std::fmt::Write;

use crate::GeoreferenceDocument;

const WKT_PREVIEW_CHARS: usize = 80;
const GCP_PREVIEW_COUNT: usize = 5;

/// Multi-line summary: size, transform, shortened spatial references, GCP
/// count and the first few GCPs.
pub fn summarize(doc: &GeoreferenceDocument) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_summary(&mut out, doc);
    out
}

fn write_summary(out: &mut String, doc: &GeoreferenceDocument) -> std::fmt::Result {
    writeln!(out, "Format:         {}", doc.format)?;
    if let Some(source) = &doc.source_file {
        writeln!(out, "Source file:    {}", source)?;
    }
    match doc.raster_size.as_slice() {
        [w, h] => writeln!(out, "Raster size:    {} x {}", w, h)?,
        other => writeln!(out, "Raster size:    {:?}", other)?,
    }
    match &doc.geotransform {
        Some(gt) => {
            writeln!(out, "Geotransform:")?;
            writeln!(out, "  origin:       ({}, {})", gt[0], gt[3])?;
            writeln!(out, "  pixel size:   ({}, {})", gt[1], gt[5])?;
            writeln!(out, "  rotation:     ({}, {})", gt[2], gt[4])?;
        }
        None => writeln!(out, "Geotransform:   none")?,
    }
    writeln!(out, "Projection:     {}", shorten(&doc.projection_wkt))?;
    writeln!(out, "GCP projection: {}", shorten(&doc.gcp_projection_wkt))?;
    writeln!(out, "GCPs:           {}", doc.gcps.len())?;
    for gcp in doc.gcps.iter().take(GCP_PREVIEW_COUNT) {
        let id = if gcp.id.is_empty() { "-" } else { gcp.id.as_str() };
        writeln!(
            out,
            "  [{}] pixel={}, line={} -> x={}, y={}, z={}",
            id, gcp.pixel, gcp.line, gcp.x, gcp.y, gcp.z
        )?;
    }
    if doc.gcps.len() > GCP_PREVIEW_COUNT {
        writeln!(out, "  ... and {} more", doc.gcps.len() - GCP_PREVIEW_COUNT)?;
    }
    Ok(())
}

fn shorten(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "(none)".to_string();
    }
    let single_line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= WKT_PREVIEW_CHARS {
        single_line
    } else {
        let head: String = single_line.chars().take(WKT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
