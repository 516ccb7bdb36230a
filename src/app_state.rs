use std::sync::Arc;

use crate::availability::AvailabilityService;
use crate::booking::BookingLifecycle;
use crate::config;
use crate::db::BookingStore;

#[derive(Clone)]
pub struct AppState {
    pub env: config::Config,
    pub store: Arc<dyn BookingStore>,
    pub availability: Arc<AvailabilityService>,
    pub lifecycle: Arc<BookingLifecycle>,
}

impl AppState {
    pub fn new(
        env: config::Config,
        store: Arc<dyn BookingStore>,
        availability: Arc<AvailabilityService>,
        lifecycle: Arc<BookingLifecycle>,
    ) -> Self {
        Self {
            env,
            store,
            availability,
            lifecycle,
        }
    }
}
