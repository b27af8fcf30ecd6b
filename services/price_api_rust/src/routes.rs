use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use card_arb_core::lookup::{LookupService, ServiceStatus};
use card_arb_core::presentation::{
    CardPricesResponse, ErrorResponse, SetView, SetsResponse, SuggestionsResponse,
};
use card_arb_core::{CardQuery, LookupError, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lookup: LookupService,
}

/// Create the API router
pub fn create_router(lookup: LookupService) -> Router {
    let state = AppState { lookup };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/card_prices", post(card_prices))
        .route("/api/search", get(search_cards))
        .route("/api/sets", get(list_sets))
        .route("/api/sets/:id", get(get_set))
        .route("/api/cards/:id/prices", get(card_prices_by_id))
        .route("/api/product", get(product_prices))
        .route("/api/status", get(status))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Compare one card across all markets
async fn card_prices(
    State(state): State<AppState>,
    body: Result<Json<CardQuery>, JsonRejection>,
) -> Result<Json<CardPricesResponse>, ApiError> {
    let Json(query) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let report = state.lookup.compare(&query).await?;
    Ok(Json(CardPricesResponse::from(&report)))
}

/// Autocomplete; fewer than three characters returns no suggestions
async fn search_cards(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let q = params.q.unwrap_or_default();
    let cards = state.lookup.search_cards(&q).await?;
    Ok(Json(SuggestionsResponse::from_cards(&cards)))
}

async fn list_sets(State(state): State<AppState>) -> Result<Json<SetsResponse>, ApiError> {
    let sets = state.lookup.list_sets().await?;
    Ok(Json(SetsResponse::from_sets(&sets)))
}

async fn get_set(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SetView>, ApiError> {
    let set = state.lookup.get_set(&id).await?;
    Ok(Json(SetView::from(&set)))
}

async fn card_prices_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CardPricesResponse>, ApiError> {
    let report = state.lookup.card_prices_by_id(&id).await?;
    Ok(Json(CardPricesResponse::from(&report)))
}

/// Price guide product by `id` or barcode `upc`
async fn product_prices(
    State(state): State<AppState>,
    Query(params): Query<ProductParams>,
) -> Result<Json<CardPricesResponse>, ApiError> {
    let report = match (params.id, params.upc) {
        (Some(id), _) => state.lookup.product_prices_by_id(&id).await?,
        (None, Some(upc)) => state.lookup.product_prices_by_upc(&upc).await?,
        (None, None) => {
            return Err(ApiError::BadRequest("id or upc is required".to_string()));
        }
    };
    Ok(Json(CardPricesResponse::from(&report)))
}

async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.lookup.status().await)
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
struct ProductParams {
    id: Option<String>,
    upc: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Lookup(LookupError),
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        ApiError::Lookup(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Lookup(err) => {
                let status = match err {
                    LookupError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
                    LookupError::NotFound => StatusCode::NOT_FOUND,
                    LookupError::Upstream(upstream) => match upstream {
                        UpstreamError::NotFound { .. } => StatusCode::NOT_FOUND,
                        UpstreamError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
                        UpstreamError::RateLimited { .. } | UpstreamError::Unavailable { .. } => {
                            StatusCode::SERVICE_UNAVAILABLE
                        }
                        UpstreamError::Decode { .. } => StatusCode::BAD_GATEWAY,
                    },
                };
                (status, err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected ({}): {}", status, message);
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
