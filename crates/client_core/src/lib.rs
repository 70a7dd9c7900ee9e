use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::ResourceKind,
    error::{ApiError, NOTHING_HERE},
    protocol::{ListResponse, Resource},
};
use tracing::debug;
use url::Url;

pub mod episode_card;
pub mod error;
pub mod pagination;
pub mod search;
pub mod view_models;

pub use episode_card::EpisodeCard;
pub use error::FetchError;
pub use pagination::{
    ListEvent, LoadOutcome, LoadStage, Page, PageCursor, PageSource, PageSummary,
    PaginatedListController, SkipReason,
};
pub use search::{SearchConfig, SearchError, SearchQuery, SearchResults, SearchSession};
pub use view_models::{CatalogRecord, CharacterRow, EpisodeRow, ListDataSource, LocationRow};

pub const DEFAULT_BASE_URL: &str = "https://rickandmortyapi.com/api";

/// Controller over one catalog endpoint.
pub type ResourceListController<T> = PaginatedListController<ResourcePages<T>>;

/// HTTP access to the catalog REST API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the first page of `kind`, with `query` appended as filters.
    pub fn endpoint_url(
        &self,
        kind: ResourceKind,
        query: &[(String, String)],
    ) -> Result<Url, FetchError> {
        let raw = format!("{}/{}", self.base_url, kind.endpoint());
        let mut url = Url::parse(&raw).map_err(|source| FetchError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Page source over every record of `T`.
    pub fn pages<T: Resource>(&self) -> ResourcePages<T> {
        self.filtered_pages(Vec::new())
    }

    /// Page source over the records of `T` matching `query`.
    pub fn filtered_pages<T: Resource>(&self, query: Vec<(String, String)>) -> ResourcePages<T> {
        ResourcePages {
            client: self.clone(),
            query,
            _marker: PhantomData,
        }
    }

    /// Fetches a single record by its absolute resource URL.
    pub async fn fetch_by_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match self.get_json(parsed).await? {
            Some(record) => Ok(record),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: NOTHING_HERE.to_string(),
            }),
        }
    }

    /// `Ok(None)` is the catalog's "nothing here" reply to a query without matches.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, FetchError> {
        debug!(%url, "catalog: GET");
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            let api_error = serde_json::from_str::<ApiError>(&body).ok();
            if status == StatusCode::NOT_FOUND
                && api_error.as_ref().is_some_and(ApiError::is_nothing_here)
            {
                debug!(%url, "catalog: no matching records");
                return Ok(None);
            }
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: api_error.map(|err| err.error).unwrap_or(body),
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

/// [`PageSource`] for one catalog endpoint; cursors are the API's `info.next` URLs.
#[derive(Debug, Clone)]
pub struct ResourcePages<T> {
    client: CatalogClient,
    query: Vec<(String, String)>,
    _marker: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> PageSource for ResourcePages<T>
where
    T: Resource + DeserializeOwned + Send + 'static,
{
    type Item = T;

    async fn fetch_page(&self, cursor: Option<&PageCursor>) -> Result<Page<T>, FetchError> {
        let url = match cursor {
            None => self.client.endpoint_url(T::KIND, &self.query)?,
            Some(cursor) => Url::parse(cursor.as_str()).map_err(|source| {
                FetchError::InvalidUrl {
                    url: cursor.to_string(),
                    source,
                }
            })?,
        };
        let Some(body) = self.client.get_json::<ListResponse<T>>(url).await? else {
            return Ok(Page::last(Vec::new()));
        };
        let next = body
            .info
            .next
            .filter(|next| !next.is_empty())
            .map(PageCursor::new);
        Ok(Page::new(body.results, next))
    }

    fn label(&self) -> &str {
        T::KIND.endpoint()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
