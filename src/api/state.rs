use std::sync::Arc;

use crate::service::FeedService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FeedService>,
}

impl AppState {
    pub fn new(service: Arc<FeedService>) -> Self {
        Self { service }
    }
}
