//! Administrative CRUD surface over the catalog
//!
//! Ordinary request handlers; all the interesting behavior lives in the
//! catalog's validation and the routing core. Credential material never
//! leaves the server unmasked.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use http::StatusCode;
use relay_catalog::{
    NewProvider, NewRoute, Provider, ProviderHealth, ProviderId, ProviderUpdate, RouteId, RouteUpdate, mask_api_key,
};
use relay_llm::handler::error_response;
use relay_llm::{GatewayError, GatewayState};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Build the admin router
pub fn admin_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/providers", routing::get(list_providers).post(create_provider))
        .route(
            "/api/providers/{id}",
            routing::get(get_provider).put(update_provider).delete(delete_provider),
        )
        .route("/api/providers/{id}/test", routing::post(test_provider))
        .route("/api/providers/{id}/health", routing::put(set_provider_health))
        .route("/api/routes", routing::get(list_routes).post(create_route))
        .route(
            "/api/routes/{id}",
            routing::get(get_route).put(update_route).delete(delete_route),
        )
        .route("/api/routes/{id}/select", routing::post(select_route))
        .with_state(state)
}

/// Provider as rendered to admin clients; the key is masked
#[derive(Serialize)]
struct ProviderView {
    id: ProviderId,
    name: String,
    base_url: String,
    api_key_masked: String,
    models: Vec<String>,
    active: bool,
    health: ProviderHealth,
}

fn provider_view(state: &GatewayState, provider: Provider) -> ProviderView {
    let api_key_masked = state
        .catalog()
        .decrypt(&provider.api_key_encrypted)
        .map_or_else(|_| "***".to_owned(), |key| mask_api_key(key.expose_secret()));

    ProviderView {
        id: provider.id,
        name: provider.name,
        base_url: provider.base_url,
        api_key_masked,
        models: provider.models,
        active: provider.active,
        health: provider.health,
    }
}

fn catalog_error(e: relay_catalog::CatalogError) -> Response {
    error_response(&GatewayError::from(e))
}

// -- Providers --

async fn list_providers(State(state): State<GatewayState>) -> Response {
    let views: Vec<ProviderView> = state
        .catalog()
        .list_providers()
        .into_iter()
        .map(|p| provider_view(&state, p))
        .collect();
    Json(views).into_response()
}

async fn create_provider(State(state): State<GatewayState>, Json(new): Json<NewProvider>) -> Response {
    match state.catalog().create_provider(new) {
        Ok(provider) => (StatusCode::CREATED, Json(provider_view(&state, provider))).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn get_provider(State(state): State<GatewayState>, Path(id): Path<ProviderId>) -> Response {
    match state.catalog().get_provider(id) {
        Ok(provider) => Json(provider_view(&state, provider)).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn update_provider(
    State(state): State<GatewayState>,
    Path(id): Path<ProviderId>,
    Json(update): Json<ProviderUpdate>,
) -> Response {
    match state.catalog().update_provider(id, update) {
        Ok(provider) => Json(provider_view(&state, provider)).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn delete_provider(State(state): State<GatewayState>, Path(id): Path<ProviderId>) -> Response {
    match state.catalog().delete_provider(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => catalog_error(e),
    }
}

/// Run the health probe on demand
async fn test_provider(State(state): State<GatewayState>, Path(id): Path<ProviderId>) -> Response {
    match state.prober().test_provider(id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct SetHealth {
    healthy: bool,
}

/// Manual health override; the next probe result is authoritative
async fn set_provider_health(
    State(state): State<GatewayState>,
    Path(id): Path<ProviderId>,
    Json(body): Json<SetHealth>,
) -> Response {
    match state.registry().set_health(id, body.healthy) {
        Ok(health) => Json(health).into_response(),
        Err(e) => catalog_error(e),
    }
}

// -- Routes --

async fn list_routes(State(state): State<GatewayState>) -> Response {
    Json(state.catalog().list_routes()).into_response()
}

async fn create_route(State(state): State<GatewayState>, Json(new): Json<NewRoute>) -> Response {
    match state.catalog().create_route(new) {
        Ok(route) => (StatusCode::CREATED, Json(route)).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn get_route(State(state): State<GatewayState>, Path(id): Path<RouteId>) -> Response {
    match state.catalog().get_route(id) {
        Ok(route) => Json(route).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn update_route(
    State(state): State<GatewayState>,
    Path(id): Path<RouteId>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let update = match RouteUpdate::from_value(body) {
        Ok(update) => update,
        Err(e) => return catalog_error(e),
    };
    match state.catalog().update_route(id, update) {
        Ok(route) => Json(route).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn delete_route(State(state): State<GatewayState>, Path(id): Path<RouteId>) -> Response {
    match state.catalog().delete_route(id) {
        Ok(()) => {
            // Cursors die with their route
            state.selector().rotation().forget_route(id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => catalog_error(e),
    }
}

#[derive(Deserialize)]
struct SelectQuery {
    model: Option<String>,
}

/// Selector debug endpoint: run one selection and show the pick
async fn select_route(
    State(state): State<GatewayState>,
    Path(id): Path<RouteId>,
    Query(query): Query<SelectQuery>,
) -> Response {
    match state.selector().select(id, query.model.as_deref(), &HashSet::new()) {
        Ok(selection) => Json(selection).into_response(),
        Err(e) => error_response(&e),
    }
}
