//! Output formatting for plaque query results.
//!
//! JSON output uses exactly the bodies the HTTP services return; text output
//! is one line per plaque for quick inspection in a terminal.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;

use plaques_lib::{Location, LocationSource, Plaque};
use plaques_service_shared::{ListResponse, SearchResponse};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON, identical to the HTTP response bodies.
    #[default]
    Json,
    /// One line per plaque.
    Text,
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

fn format_location(location: Option<&Location>) -> String {
    match location {
        Some(loc) => {
            let marker = match loc.source {
                LocationSource::Projected => "",
                LocationSource::Camera => " (camera)",
            };
            format!("{:.5},{:.5}{}", loc.latitude, loc.longitude, marker)
        }
        None => "-".to_string(),
    }
}

/// Render one plaque as a single text line.
pub fn format_plaque_line(plaque: &Plaque) -> String {
    format!(
        "{}  {:.2}  {}  {}",
        plaque.id,
        plaque.confidence,
        format_location(plaque.location.as_ref()),
        plaque.text.replace('\n', " ")
    )
}

/// Print a single plaque.
pub fn write_detail<W: Write>(
    out: &mut W,
    plaque: &Plaque,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, plaque),
        OutputFormat::Text => {
            writeln!(out, "{}", format_plaque_line(plaque))?;
            if let Some(images) = &plaque.images {
                if let Some(url) = images.original.as_deref() {
                    writeln!(out, "  image: {}", url)?;
                }
            }
            if let Some(created_at) = plaque.created_at.as_deref() {
                writeln!(out, "  created: {}", created_at)?;
            }
            Ok(())
        }
    }
}

/// Print a page of plaques.
pub fn write_list<W: Write>(
    out: &mut W,
    list: &ListResponse,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, list),
        OutputFormat::Text => {
            for plaque in &list.plaques {
                writeln!(out, "{}", format_plaque_line(plaque))?;
            }
            writeln!(
                out,
                "{} of {} plaques (offset {})",
                list.count, list.total, list.offset
            )
        }
    }
}

/// Print search hits.
pub fn write_search<W: Write>(
    out: &mut W,
    search: &SearchResponse,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, search),
        OutputFormat::Text => {
            for plaque in &search.plaques {
                writeln!(out, "{}", format_plaque_line(plaque))?;
            }
            writeln!(
                out,
                "{} plaques matching '{}' (offset {})",
                search.count, search.query, search.offset
            )
        }
    }
}
