use read_model::{OrderCache, QueryService};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub cache: Arc<OrderCache>,
}

impl AppState {
    pub fn new(cache: Arc<OrderCache>) -> Self {
        Self {
            query: QueryService::new(cache.clone()),
            cache,
        }
    }
}
