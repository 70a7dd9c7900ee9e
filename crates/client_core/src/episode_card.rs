use shared::domain::{Character, Episode};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{error::FetchError, view_models::EpisodeRow, CatalogClient};

/// One episode tile on a character detail screen. The episode is fetched on
/// first use and cached for the life of the card.
pub struct EpisodeCard {
    client: CatalogClient,
    url: String,
    episode: OnceCell<Episode>,
}

impl EpisodeCard {
    pub fn new(client: CatalogClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            episode: OnceCell::new(),
        }
    }

    /// Cards for every episode the character appears in, in listing order.
    pub fn for_character(client: &CatalogClient, character: &Character) -> Vec<Self> {
        character
            .episode
            .iter()
            .map(|url| Self::new(client.clone(), url.clone()))
            .collect()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cached(&self) -> Option<&Episode> {
        self.episode.get()
    }

    /// Returns the episode, fetching it only if no earlier call succeeded.
    pub async fn load(&self) -> Result<&Episode, FetchError> {
        self.episode
            .get_or_try_init(|| async {
                debug!(url = %self.url, "episode card: fetching");
                self.client.fetch_by_url::<Episode>(&self.url).await
            })
            .await
    }

    pub async fn row(&self) -> Result<EpisodeRow, FetchError> {
        self.load().await.map(EpisodeRow::new)
    }
}
