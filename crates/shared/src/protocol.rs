use serde::{Deserialize, Serialize};

use crate::domain::{Character, Episode, Location, ResourceKind};

/// Pagination block returned with every list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub count: u64,
    pub pages: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub info: PageInfo,
    pub results: Vec<T>,
}

/// A record type served from one catalog endpoint.
pub trait Resource {
    const KIND: ResourceKind;
}

impl Resource for Character {
    const KIND: ResourceKind = ResourceKind::Character;
}

impl Resource for Episode {
    const KIND: ResourceKind = ResourceKind::Episode;
}

impl Resource for Location {
    const KIND: ResourceKind = ResourceKind::Location;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CharacterGender, CharacterStatus, LocationId};

    #[test]
    fn decodes_location_page() {
        let raw = r#"{
            "info": {
                "count": 126,
                "pages": 7,
                "next": "https://rickandmortyapi.com/api/location?page=2",
                "prev": null
            },
            "results": [{
                "id": 1,
                "name": "Earth (C-137)",
                "type": "Planet",
                "dimension": "Dimension C-137",
                "residents": ["https://rickandmortyapi.com/api/character/38"],
                "url": "https://rickandmortyapi.com/api/location/1",
                "created": "2017-11-10T12:42:04.162Z"
            }]
        }"#;
        let page: ListResponse<Location> = serde_json::from_str(raw).expect("decode");
        assert_eq!(page.info.pages, 7);
        assert_eq!(
            page.info.next.as_deref(),
            Some("https://rickandmortyapi.com/api/location?page=2")
        );
        assert_eq!(page.info.prev, None);
        assert_eq!(page.results[0].id, LocationId(1));
        assert_eq!(page.results[0].kind, "Planet");
        assert_eq!(Location::KIND.endpoint(), "location");
    }

    #[test]
    fn decodes_character_with_lowercase_unknowns() {
        let raw = r#"{
            "id": 8,
            "name": "Adjudicator Rick",
            "status": "unknown",
            "species": "Human",
            "type": "",
            "gender": "unknown",
            "origin": { "name": "unknown", "url": "" },
            "location": { "name": "Citadel of Ricks", "url": "https://rickandmortyapi.com/api/location/3" },
            "image": "https://rickandmortyapi.com/api/character/avatar/8.jpeg",
            "episode": ["https://rickandmortyapi.com/api/episode/28"],
            "url": "https://rickandmortyapi.com/api/character/8",
            "created": "2017-11-04T20:03:34.737Z"
        }"#;
        let character: Character = serde_json::from_str(raw).expect("decode");
        assert_eq!(character.status, CharacterStatus::Unknown);
        assert_eq!(character.gender, CharacterGender::Unknown);
        assert_eq!(character.status.to_string(), "unknown");
        assert_eq!(
            "Characters".parse::<ResourceKind>(),
            Ok(ResourceKind::Character)
        );
    }
}
