//! Display-ready row projections of catalog records.
//!
//! Rows compare structurally: two rows are equal when the record id and every
//! displayed field match.

use std::hash::Hash;

use shared::domain::{
    Character, CharacterId, CharacterStatus, Episode, EpisodeId, Location, LocationId,
};

/// A record that can be listed and projected into a row view-model.
pub trait CatalogRecord {
    type Row: Clone + PartialEq + Eq + Hash + Send;

    fn record_id(&self) -> i64;
    fn to_row(&self) -> Self::Row;
}

/// What a rendering layer needs from a list: counts, rows and selection.
pub trait ListDataSource {
    type Row;
    type Item;

    fn row_count(&self) -> usize;
    fn row(&self, index: usize) -> Self::Row;
    fn did_select(&self, index: usize) -> Self::Item;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationRow {
    id: LocationId,
    name: String,
    kind: String,
    dimension: String,
}

impl LocationRow {
    pub fn new(location: &Location) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            kind: location.kind.clone(),
            dimension: location.dimension.clone(),
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_label(&self) -> String {
        format!("Type: {}", self.kind)
    }

    pub fn dimension_label(&self) -> String {
        format!("Dimension: {}", self.dimension)
    }
}

impl CatalogRecord for Location {
    type Row = LocationRow;

    fn record_id(&self) -> i64 {
        self.id.0
    }

    fn to_row(&self) -> LocationRow {
        LocationRow::new(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacterRow {
    id: CharacterId,
    name: String,
    status: CharacterStatus,
}

impl CharacterRow {
    pub fn new(character: &Character) -> Self {
        Self {
            id: character.id,
            name: character.name.clone(),
            status: character.status,
        }
    }

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status_label(&self) -> String {
        format!("Status: {}", self.status)
    }
}

impl CatalogRecord for Character {
    type Row = CharacterRow;

    fn record_id(&self) -> i64 {
        self.id.0
    }

    fn to_row(&self) -> CharacterRow {
        CharacterRow::new(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpisodeRow {
    id: EpisodeId,
    name: String,
    code: String,
    air_date: String,
}

impl EpisodeRow {
    pub fn new(episode: &Episode) -> Self {
        Self {
            id: episode.id,
            name: episode.name.clone(),
            code: episode.episode.clone(),
            air_date: episode.air_date.clone(),
        }
    }

    pub fn id(&self) -> EpisodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn episode_label(&self) -> String {
        format!("Episode: {}", self.code)
    }

    pub fn air_date_label(&self) -> String {
        format!("Aired on {}", self.air_date)
    }
}

impl CatalogRecord for Episode {
    type Row = EpisodeRow;

    fn record_id(&self) -> i64 {
        self.id.0
    }

    fn to_row(&self) -> EpisodeRow {
        EpisodeRow::new(self)
    }
}
