use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CatalogClient, CatalogRecord, CharacterRow, EpisodeRow, ListDataSource, LoadOutcome,
    LocationRow, ResourceListController, SearchConfig, SearchQuery, SearchResults, SearchSession,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Character, Episode, Location, ResourceKind},
    protocol::Resource,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "browser", about = "Browse the Rick and Morty catalog")]
struct Args {
    /// Catalog API root, e.g. https://rickandmortyapi.com/api
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List characters, episodes or locations.
    List {
        kind: ResourceKind,
        #[arg(long)]
        pages: Option<usize>,
    },
    /// Search one collection by name and filters.
    Search {
        kind: ResourceKind,
        text: Option<String>,
        /// Repeatable `key=value` filter, e.g. `--filter status=alive`.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        pages: Option<usize>,
    },
    /// Print the record at a row index as JSON.
    Select {
        kind: ResourceKind,
        index: usize,
        #[arg(long)]
        pages: Option<usize>,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

trait RenderRow {
    fn render(&self) -> String;
}

impl RenderRow for LocationRow {
    fn render(&self) -> String {
        format!(
            "{}  |  {}  |  {}",
            self.name(),
            self.type_label(),
            self.dimension_label()
        )
    }
}

impl RenderRow for CharacterRow {
    fn render(&self) -> String {
        format!("{}  |  {}", self.name(), self.status_label())
    }
}

impl RenderRow for EpisodeRow {
    fn render(&self) -> String {
        format!(
            "{}  |  {}  |  {}",
            self.name(),
            self.episode_label(),
            self.air_date_label()
        )
    }
}

fn print_rows<L>(title: &str, list: &L)
where
    L: ListDataSource,
    L::Row: RenderRow,
{
    println!("{title} ({} rows)", list.row_count());
    for index in 0..list.row_count() {
        println!("{index:>4}  {}", list.row(index).render());
    }
}

/// Loads the first page, then follows cursors until `pages` pages are in.
async fn fill<T>(list: &ResourceListController<T>, pages: usize) -> Result<()>
where
    T: Resource + CatalogRecord + DeserializeOwned + Clone + Send + Sync + 'static,
{
    if let LoadOutcome::Failed(err) = list.load_first_page().await {
        bail!("failed to load {}: {err}", T::KIND.title());
    }
    extend(list, pages).await
}

async fn extend<T>(list: &ResourceListController<T>, pages: usize) -> Result<()>
where
    T: Resource + CatalogRecord + DeserializeOwned + Clone + Send + Sync + 'static,
{
    for _ in 1..pages {
        match list.load_next_page().await {
            LoadOutcome::Loaded(_) => {}
            LoadOutcome::Skipped(_) => break,
            LoadOutcome::Failed(err) => {
                bail!("failed to load more {}: {err}", T::KIND.title())
            }
        }
    }
    Ok(())
}

fn open<T>(client: &CatalogClient) -> Arc<ResourceListController<T>>
where
    T: Resource + CatalogRecord + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let list = Arc::new(ResourceListController::new(client.pages::<T>()));
    list.register_on_load_failed(|stage, err| {
        warn!(?stage, retryable = err.is_retryable(), "browser: load failed: {err}");
    });
    list
}

async fn list_kind<T>(client: &CatalogClient, pages: usize) -> Result<()>
where
    T: Resource + CatalogRecord + DeserializeOwned + Clone + Send + Sync + 'static,
    T::Row: RenderRow,
{
    let list = open::<T>(client);
    fill(&list, pages).await?;
    print_rows(T::KIND.title(), list.as_ref());
    if list.should_show_load_more_indicator() {
        println!("more rows available; pass --pages to load them");
    }
    Ok(())
}

async fn select_kind<T>(client: &CatalogClient, index: usize, pages: usize) -> Result<()>
where
    T: Resource + CatalogRecord + DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
{
    let list = open::<T>(client);
    fill(&list, pages).await?;
    if index >= list.row_count() {
        bail!(
            "row {index} is not loaded; {} rows available",
            list.row_count()
        );
    }
    let item = list.did_select(index);
    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(())
}

async fn search(
    client: CatalogClient,
    kind: ResourceKind,
    query: SearchQuery,
    pages: usize,
) -> Result<()> {
    let session = SearchSession::new(client, SearchConfig::new(kind));
    let results = session
        .execute(&query)
        .await
        .with_context(|| format!("search in {} failed", kind.title()))?;

    let title = session.config().title();
    match &results {
        SearchResults::NoResults => println!("{title}: no results"),
        SearchResults::Characters(list) => {
            extend(list, pages).await?;
            print_rows(&title, list.as_ref());
        }
        SearchResults::Episodes(list) => {
            extend(list, pages).await?;
            print_rows(&title, list.as_ref());
        }
        SearchResults::Locations(list) => {
            extend(list, pages).await?;
            print_rows(&title, list.as_ref());
        }
    }
    results.close();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_url = args.base_url.unwrap_or(settings.base_url);
    let client = CatalogClient::new(base_url);

    match args.command {
        Command::List { kind, pages } => {
            let pages = pages.unwrap_or(settings.pages).max(1);
            match kind {
                ResourceKind::Character => list_kind::<Character>(&client, pages).await,
                ResourceKind::Episode => list_kind::<Episode>(&client, pages).await,
                ResourceKind::Location => list_kind::<Location>(&client, pages).await,
            }
        }
        Command::Search {
            kind,
            text,
            filters,
            pages,
        } => {
            let pages = pages.unwrap_or(settings.pages).max(1);
            let mut query = SearchQuery::new(text.unwrap_or_default());
            for (key, value) in filters {
                query = query.with_filter(key, value);
            }
            search(client, kind, query, pages).await
        }
        Command::Select { kind, index, pages } => {
            let pages = pages.unwrap_or(settings.pages).max(1);
            match kind {
                ResourceKind::Character => select_kind::<Character>(&client, index, pages).await,
                ResourceKind::Episode => select_kind::<Episode>(&client, index, pages).await,
                ResourceKind::Location => select_kind::<Location>(&client, index, pages).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_flag_splits_on_first_equals() {
        assert_eq!(
            parse_filter("type=Planet=X").expect("filter"),
            ("type".to_string(), "Planet=X".to_string())
        );
        assert!(parse_filter("status").is_err());
        assert!(parse_filter("=alive").is_err());
    }

    #[test]
    fn cli_accepts_repeated_filters() {
        let args = Args::try_parse_from([
            "browser",
            "search",
            "characters",
            "rick",
            "--filter",
            "status=alive",
            "--filter",
            "gender=male",
            "--base-url",
            "http://localhost:9000/api",
        ])
        .expect("parse");
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:9000/api"));
        let Command::Search {
            kind,
            text,
            filters,
            pages,
        } = args.command
        else {
            panic!("expected search command");
        };
        assert_eq!(kind, ResourceKind::Character);
        assert_eq!(text.as_deref(), Some("rick"));
        assert_eq!(filters.len(), 2);
        assert_eq!(pages, None);
    }

    #[test]
    fn cli_rejects_unknown_kind() {
        assert!(Args::try_parse_from(["browser", "list", "planets"]).is_err());
    }
}
