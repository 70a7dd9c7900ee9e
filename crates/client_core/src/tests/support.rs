//! In-process stand-in for the catalog API used by the HTTP tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

pub const PAGE_SIZE: usize = 20;
pub const LOCATION_COUNT: i64 = 45;
pub const CHARACTER_COUNT: i64 = 50;
pub const EPISODE_COUNT: i64 = 3;

const CREATED: &str = "2017-11-10T12:42:04.162Z";

#[derive(Clone)]
struct CatalogState {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

pub struct CatalogServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl CatalogServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_catalog_server() -> anyhow::Result<CatalogServer> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let base_url = format!("http://{addr}/api");
    let hits = Arc::new(AtomicUsize::new(0));
    let state = CatalogState {
        base_url: base_url.clone(),
        hits: Arc::clone(&hits),
    };
    let app = Router::new()
        .route("/api/location", get(list_locations))
        .route("/api/character", get(list_characters))
        .route("/api/episode", get(list_episodes))
        .route("/api/episode/:id", get(get_episode))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(CatalogServer { base_url, hits })
}

pub fn location_json(base_url: &str, id: i64) -> Value {
    let name = if id == 1 {
        "Earth (C-137)".to_string()
    } else {
        format!("Location {id}")
    };
    json!({
        "id": id,
        "name": name,
        "type": "Planet",
        "dimension": "Dimension C-137",
        "residents": [format!("{base_url}/character/1")],
        "url": format!("{base_url}/location/{id}"),
        "created": CREATED,
    })
}

pub fn character_json(base_url: &str, id: i64) -> Value {
    let name = if id % 2 == 1 {
        format!("Rick {id}")
    } else {
        format!("Morty {id}")
    };
    let status = if id % 4 == 1 { "Alive" } else { "Dead" };
    json!({
        "id": id,
        "name": name,
        "status": status,
        "species": "Human",
        "type": "",
        "gender": "Male",
        "origin": { "name": "Earth (C-137)", "url": format!("{base_url}/location/1") },
        "location": { "name": "Citadel of Ricks", "url": format!("{base_url}/location/3") },
        "image": format!("{base_url}/character/avatar/{id}.jpeg"),
        "episode": [format!("{base_url}/episode/1"), format!("{base_url}/episode/2")],
        "url": format!("{base_url}/character/{id}"),
        "created": CREATED,
    })
}

pub fn episode_json(base_url: &str, id: i64) -> Value {
    let name = match id {
        1 => "Pilot",
        2 => "Lawnmower Dog",
        _ => "Anatomy Park",
    };
    json!({
        "id": id,
        "name": name,
        "air_date": "December 2, 2013",
        "episode": format!("S01E{id:02}"),
        "characters": [format!("{base_url}/character/1")],
        "url": format!("{base_url}/episode/{id}"),
        "created": CREATED,
    })
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn name_matches(record: &Value, params: &HashMap<String, String>) -> bool {
    let Some(wanted) = params.get("name") else {
        return true;
    };
    record["name"]
        .as_str()
        .is_some_and(|name| name.to_lowercase().contains(&wanted.to_lowercase()))
}

fn paged(
    state: &CatalogState,
    endpoint: &str,
    records: Vec<Value>,
    params: &HashMap<String, String>,
) -> Response {
    if records.is_empty() {
        return error_body(StatusCode::NOT_FOUND, "There is nothing here");
    }
    let page: usize = params
        .get("page")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    let pages = records.len().div_ceil(PAGE_SIZE);
    if page == 0 || page > pages {
        return error_body(StatusCode::NOT_FOUND, "There is nothing here");
    }

    let count = records.len();
    let results: Vec<Value> = records
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();
    let next = (page < pages).then(|| page_url(state, endpoint, params, page + 1));
    let prev = (page > 1).then(|| page_url(state, endpoint, params, page - 1));
    Json(json!({
        "info": { "count": count, "pages": pages, "next": next, "prev": prev },
        "results": results,
    }))
    .into_response()
}

fn page_url(
    state: &CatalogState,
    endpoint: &str,
    params: &HashMap<String, String>,
    page: usize,
) -> String {
    let mut url = Url::parse(&format!("{}/{endpoint}", state.base_url)).expect("base url");
    let filters: BTreeMap<_, _> = params.iter().filter(|(key, _)| *key != "page").collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("page", &page.to_string());
        for (key, value) in filters {
            pairs.append_pair(key, value);
        }
    }
    url.to_string()
}

async fn list_locations(
    State(state): State<CatalogState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match params.get("name").map(String::as_str) {
        Some("boom") => return error_body(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        Some("garbled") => return (StatusCode::OK, "not json").into_response(),
        _ => {}
    }
    let records = (1..=LOCATION_COUNT)
        .map(|id| location_json(&state.base_url, id))
        .filter(|record| name_matches(record, &params))
        .collect();
    paged(&state, "location", records, &params)
}

async fn list_characters(
    State(state): State<CatalogState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let records = (1..=CHARACTER_COUNT)
        .map(|id| character_json(&state.base_url, id))
        .filter(|record| name_matches(record, &params))
        .filter(|record| match params.get("status") {
            Some(status) => record["status"]
                .as_str()
                .is_some_and(|value| value.eq_ignore_ascii_case(status)),
            None => true,
        })
        .collect();
    paged(&state, "character", records, &params)
}

async fn list_episodes(
    State(state): State<CatalogState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let records = (1..=EPISODE_COUNT)
        .map(|id| episode_json(&state.base_url, id))
        .filter(|record| name_matches(record, &params))
        .filter(|record| match params.get("episode") {
            Some(code) => record["episode"].as_str() == Some(code.as_str()),
            None => true,
        })
        .collect();
    paged(&state, "episode", records, &params)
}

async fn get_episode(State(state): State<CatalogState>, Path(id): Path<i64>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if (1..=EPISODE_COUNT).contains(&id) {
        Json(episode_json(&state.base_url, id)).into_response()
    } else {
        error_body(StatusCode::NOT_FOUND, "Episode not found")
    }
}
