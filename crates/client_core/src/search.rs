//! Search screen backing: validates a query for one resource kind and opens a
//! paginated result list for it.

use std::{collections::BTreeMap, sync::Arc};

use serde::de::DeserializeOwned;
use shared::{
    domain::{Character, Episode, Location, ResourceKind},
    protocol::Resource,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    error::FetchError,
    pagination::{LoadOutcome, PaginatedListController},
    view_models::CatalogRecord,
    CatalogClient, ResourceListController,
};

/// A filter the catalog accepts for a kind. Empty `choices` means free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOption {
    pub key: &'static str,
    pub choices: &'static [&'static str],
}

const CHARACTER_FILTERS: &[FilterOption] = &[
    FilterOption {
        key: "status",
        choices: &["alive", "dead", "unknown"],
    },
    FilterOption {
        key: "gender",
        choices: &["female", "male", "genderless", "unknown"],
    },
    FilterOption {
        key: "species",
        choices: &[],
    },
    FilterOption {
        key: "type",
        choices: &[],
    },
];

const EPISODE_FILTERS: &[FilterOption] = &[FilterOption {
    key: "episode",
    choices: &[],
}];

const LOCATION_FILTERS: &[FilterOption] = &[
    FilterOption {
        key: "type",
        choices: &[],
    },
    FilterOption {
        key: "dimension",
        choices: &[],
    },
];

pub fn filter_options(kind: ResourceKind) -> &'static [FilterOption] {
    match kind {
        ResourceKind::Character => CHARACTER_FILTERS,
        ResourceKind::Episode => EPISODE_FILTERS,
        ResourceKind::Location => LOCATION_FILTERS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub kind: ResourceKind,
}

impl SearchConfig {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }

    pub fn title(&self) -> String {
        format!("Search {}", self.kind.title())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub filters: BTreeMap<String, String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search needs a name or at least one filter")]
    EmptyQuery,
    #[error("invalid filter {key}={value:?} for {kind:?}: {reason}")]
    InvalidFilter {
        kind: ResourceKind,
        key: String,
        value: String,
        reason: String,
    },
    #[error("search request failed: {0}")]
    Fetch(Arc<FetchError>),
}

/// Results of one executed search.
pub enum SearchResults {
    NoResults,
    Characters(Arc<ResourceListController<Character>>),
    Episodes(Arc<ResourceListController<Episode>>),
    Locations(Arc<ResourceListController<Location>>),
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::NoResults => 0,
            Self::Characters(list) => list.row_count(),
            Self::Episodes(list) => list.row_count(),
            Self::Locations(list) => list.row_count(),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        match self {
            Self::NoResults => false,
            Self::Characters(list) => list.has_more_pages(),
            Self::Episodes(list) => list.has_more_pages(),
            Self::Locations(list) => list.has_more_pages(),
        }
    }

    /// Loads the next page of whichever list is showing.
    pub async fn load_next_page(&self) -> Option<LoadOutcome> {
        match self {
            Self::NoResults => None,
            Self::Characters(list) => Some(list.load_next_page().await),
            Self::Episodes(list) => Some(list.load_next_page().await),
            Self::Locations(list) => Some(list.load_next_page().await),
        }
    }

    /// Tears down the result list when the search screen goes away.
    pub fn close(&self) {
        match self {
            Self::NoResults => {}
            Self::Characters(list) => list.close(),
            Self::Episodes(list) => list.close(),
            Self::Locations(list) => list.close(),
        }
    }
}

pub struct SearchSession {
    config: SearchConfig,
    client: CatalogClient,
}

impl SearchSession {
    pub fn new(client: CatalogClient, config: SearchConfig) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }

    pub fn filter_options(&self) -> &'static [FilterOption] {
        filter_options(self.config.kind)
    }

    /// Query string pairs for `query`, with keys and choice values normalized.
    pub fn query_pairs(&self, query: &SearchQuery) -> Result<Vec<(String, String)>, SearchError> {
        let kind = self.config.kind;
        let mut pairs = Vec::new();

        let text = query.text.trim();
        if !text.is_empty() {
            pairs.push(("name".to_string(), text.to_string()));
        }

        for (key, value) in &query.filters {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            let invalid = |reason: &str| SearchError::InvalidFilter {
                kind,
                key: key.clone(),
                value: value.to_string(),
                reason: reason.to_string(),
            };

            let Some(option) = self.filter_options().iter().find(|opt| opt.key == key) else {
                return Err(invalid("unknown filter"));
            };
            if value.is_empty() {
                return Err(invalid("value must not be empty"));
            }
            let value = if option.choices.is_empty() {
                value.to_string()
            } else {
                let lowered = value.to_ascii_lowercase();
                if !option.choices.contains(&lowered.as_str()) {
                    return Err(invalid(&format!(
                        "expected one of {}",
                        option.choices.join(", ")
                    )));
                }
                lowered
            };
            pairs.push((key, value));
        }

        if pairs.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        Ok(pairs)
    }

    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        let pairs = self.query_pairs(query)?;
        debug!(kind = ?self.config.kind, ?pairs, "search: executing");

        let results = match self.config.kind {
            ResourceKind::Character => self
                .open::<Character>(pairs)
                .await?
                .map(SearchResults::Characters),
            ResourceKind::Episode => self
                .open::<Episode>(pairs)
                .await?
                .map(SearchResults::Episodes),
            ResourceKind::Location => self
                .open::<Location>(pairs)
                .await?
                .map(SearchResults::Locations),
        };
        let results = results.unwrap_or(SearchResults::NoResults);
        info!(
            kind = ?self.config.kind,
            rows = results.row_count(),
            "search: first page ready"
        );
        Ok(results)
    }

    async fn open<T>(
        &self,
        pairs: Vec<(String, String)>,
    ) -> Result<Option<Arc<ResourceListController<T>>>, SearchError>
    where
        T: Resource + CatalogRecord + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let list = Arc::new(PaginatedListController::new(
            self.client.filtered_pages::<T>(pairs),
        ));
        if let LoadOutcome::Failed(err) = list.load_first_page().await {
            return Err(SearchError::Fetch(err));
        }
        if list.row_count() == 0 {
            return Ok(None);
        }
        Ok(Some(list))
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
