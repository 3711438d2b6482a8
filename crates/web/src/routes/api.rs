//! JSON API handlers used by the search box, the map, and heart buttons.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use delicious_core::{GeoPoint, Slug, StoreId};

use crate::db::{HeartRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Location, Store};
use crate::state::AppState;

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Query parameters for the nearby-stores lookup.
#[derive(Debug, Deserialize)]
pub struct NearQuery {
    pub lat: f64,
    pub lng: f64,
}

/// Store fields returned by the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct StoreSummary {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub location: Location,
    pub photo: Option<String>,
}

impl From<Store> for StoreSummary {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            name: store.name,
            slug: store.slug,
            description: store.description,
            location: store.location,
            photo: store.photo,
        }
    }
}

/// Hearts after a toggle.
#[derive(Debug, Serialize)]
pub struct HeartsResponse {
    pub hearts: Vec<StoreId>,
}

fn summaries(stores: Vec<Store>) -> Vec<StoreSummary> {
    stores.into_iter().map(StoreSummary::from).collect()
}

/// Full-text search over store names and descriptions.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StoreSummary>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let stores = StoreRepository::new(state.pool()).search(q).await?;
    Ok(Json(summaries(stores)))
}

/// Stores near a point, nearest first.
pub async fn near(
    State(state): State<AppState>,
    Query(query): Query<NearQuery>,
) -> Result<Json<Vec<StoreSummary>>> {
    let point =
        GeoPoint::new(query.lng, query.lat).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let stores = StoreRepository::new(state.pool()).near(point).await?;
    Ok(Json(summaries(stores)))
}

/// Heart or un-heart a store for the current user.
pub async fn heart(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> Result<Json<HeartsResponse>> {
    let hearts = HeartRepository::new(state.pool()).toggle(user.id, id).await?;
    tracing::info!(user_id = %user.id, store_id = %id, hearted = hearts.contains(&id), "Heart toggled");
    Ok(Json(HeartsResponse { hearts }))
}
