use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use common::metrics;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::from("Failed to gather metrics"))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))

        // Order lookups
        .route("/order/:order_uid", get(handlers::get_order::get_order_handler))
        .route("/api/v1/orders/:order_uid", get(handlers::get_order::get_order_handler))

        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use domain::OrderRecord;
    use order_store::{InMemoryOrderStore, OrderStore};
    use read_model::OrderCache;
    use std::sync::Arc;
    use tower::ServiceExt;

    const PAYLOAD: &[u8] = br#"{"OrderUID":"abc123","TrackNumber":"WBILMTESTTRACK","Locale":"en"}"#;

    fn app_with(store: Arc<InMemoryOrderStore>) -> (Router, Arc<OrderCache>) {
        let cache = Arc::new(OrderCache::new(store));
        (create_router(AppState::new(cache.clone())), cache)
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_order_returns_stored_bytes() {
        let (app, cache) = app_with(Arc::new(InMemoryOrderStore::new()));
        cache.put(OrderRecord::from_payload(PAYLOAD.to_vec()).unwrap()).await;

        let response = get(app, "/order/abc123").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], PAYLOAD);
    }

    #[tokio::test]
    async fn test_versioned_route_serves_from_store_on_miss() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert("abc123", PAYLOAD).await.unwrap();
        let (app, cache) = app_with(store);

        let response = get(app, "/api/v1/orders/abc123").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(cache.contains("abc123").await);
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() {
        let (app, _cache) = app_with(Arc::new(InMemoryOrderStore::new()));

        let response = get(app, "/order/does-not-exist").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Order not found: does-not-exist");
    }

    #[tokio::test]
    async fn test_store_outage_is_404() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert("abc123", PAYLOAD).await.unwrap();
        store.set_available(false);
        let (app, _cache) = app_with(store);

        let response = get(app, "/order/abc123").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_cache_size() {
        let (app, cache) = app_with(Arc::new(InMemoryOrderStore::new()));
        cache.put(OrderRecord::from_payload(PAYLOAD.to_vec()).unwrap()).await;

        let response = get(app, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cached_orders"], 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _cache) = app_with(Arc::new(InMemoryOrderStore::new()));

        let response = get(app, "/metrics").await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}
