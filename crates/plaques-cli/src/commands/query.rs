//! `detail`, `list` and `search` subcommands.
//!
//! These run the same repository queries as the HTTP services and print the
//! same bodies, so a local SQLite copy can be inspected without a server.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use plaques_lib::{Filter, GeoBounds, Page, PlaqueRepository, StoreConfig};
use plaques_service_shared::{ListResponse, SearchResponse};

use plaques_cli::output::{write_detail, write_list, write_search, OutputFormat};

/// Paging and filter flags shared by `list` and `search`.
#[derive(Debug, Clone)]
pub struct WindowArgs {
    pub limit: u32,
    pub offset: u32,
    pub min_confidence: Option<f64>,
    pub bbox: Option<GeoBounds>,
}

impl WindowArgs {
    fn filter(&self) -> Filter {
        Filter {
            min_confidence: self.min_confidence,
            bbox: self.bbox,
        }
    }

    fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn open(config: &StoreConfig) -> Result<PlaqueRepository> {
    PlaqueRepository::from_config(config).context("failed to open the plaque store")
}

pub async fn handle_detail(config: &StoreConfig, id: &str, format: OutputFormat) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        bail!("plaque id must not be empty");
    }

    let repository = open(config)?;
    let plaque = repository
        .detail(id)
        .await
        .with_context(|| format!("failed to load plaque '{}'", id))?;

    let Some(plaque) = plaque else {
        bail!("no plaque found with id '{}'", id);
    };

    let mut out = io::stdout().lock();
    write_detail(&mut out, &plaque, format)?;
    out.flush()?;
    Ok(())
}

pub async fn handle_list(
    config: &StoreConfig,
    window: &WindowArgs,
    format: OutputFormat,
) -> Result<()> {
    let repository = open(config)?;
    let page = window.page();
    let result = repository
        .list(&window.filter(), page)
        .await
        .context("failed to list plaques")?;

    let body = ListResponse {
        count: result.plaques.len(),
        plaques: result.plaques,
        total: result.total,
        limit: page.limit,
        offset: page.offset,
    };

    let mut out = io::stdout().lock();
    write_list(&mut out, &body, format)?;
    out.flush()?;
    Ok(())
}

pub async fn handle_search(
    config: &StoreConfig,
    text: &str,
    window: &WindowArgs,
    format: OutputFormat,
) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("search text must not be empty");
    }

    let repository = open(config)?;
    let page = window.page();
    let plaques = repository
        .search(text, &window.filter(), page)
        .await
        .with_context(|| format!("failed to search plaques for '{}'", text))?;

    let body = SearchResponse {
        query: text.to_string(),
        count: plaques.len(),
        plaques,
        limit: page.limit,
        offset: page.offset,
    };

    let mut out = io::stdout().lock();
    write_search(&mut out, &body, format)?;
    out.flush()?;
    Ok(())
}
