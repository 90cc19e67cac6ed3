use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use read_model::Lookup;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Get a single order by its OrderUID.
///
/// The body is the order document exactly as it was published.
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Response {
    info!("Fetching order: {}", order_uid);

    match state.query.lookup(&order_uid).await {
        Lookup::Found(record) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            record.payload().to_vec(),
        )
            .into_response(),
        Lookup::NotFound => {
            info!("Order not found: {}", order_uid);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Order not found: {}", order_uid),
                }),
            )
                .into_response()
        }
    }
}
